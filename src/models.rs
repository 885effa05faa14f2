use serde::{Deserialize, Serialize};
use crate::schema::{audit_logs, reservations, rooms, users};
use chrono::{NaiveDateTime, NaiveTime};
use diesel::{deserialize::{self, FromSql}, pg::{Pg, PgValue}, serialize::{self, Output, ToSql}, sql_types::Text, Insertable, Selectable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = crate::schema::sql_types::RoomType)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    Public,
    Admin,
    Service,
}

impl ToSql<crate::schema::sql_types::RoomType, Pg> for RoomType {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match *self {
            RoomType::Public => "public",
            RoomType::Admin => "admin",
            RoomType::Service => "service",
        };
        <str as ToSql<Text, Pg>>::to_sql(s, out)
    }
}

impl FromSql<crate::schema::sql_types::RoomType, Pg> for RoomType {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "public" => Ok(RoomType::Public),
            "admin" => Ok(RoomType::Admin),
            "service" => Ok(RoomType::Service),
            s => Err(format!("Unrecognized room type: {}", s).into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = crate::schema::sql_types::ReservationStatus)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Active,
    Finished,
    Cancelled,
}

impl ToSql<crate::schema::sql_types::ReservationStatus, Pg> for ReservationStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match *self {
            ReservationStatus::Active => "active",
            ReservationStatus::Finished => "finished",
            ReservationStatus::Cancelled => "cancelled",
        };
        <str as ToSql<Text, Pg>>::to_sql(s, out)
    }
}

impl FromSql<crate::schema::sql_types::ReservationStatus, Pg> for ReservationStatus {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "active" => Ok(ReservationStatus::Active),
            "finished" => Ok(ReservationStatus::Finished),
            "cancelled" => Ok(ReservationStatus::Cancelled),
            s => Err(format!("Unrecognized reservation status: {}", s).into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = crate::schema::sql_types::UserRole)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student,
    Teacher,
    Admin,
}

impl ToSql<crate::schema::sql_types::UserRole, Pg> for UserRole {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match *self {
            UserRole::Student => "student",
            UserRole::Teacher => "teacher",
            UserRole::Admin => "admin",
        };
        <str as ToSql<Text, Pg>>::to_sql(s, out)
    }
}

impl FromSql<crate::schema::sql_types::UserRole, Pg> for UserRole {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "student" => Ok(UserRole::Student),
            "teacher" => Ok(UserRole::Teacher),
            "admin" => Ok(UserRole::Admin),
            s => Err(format!("Unrecognized user role: {}", s).into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsExpression, FromSqlRow)]
#[diesel(sql_type = crate::schema::sql_types::AuditAction)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CreateReservation,
    CancelReservation,
    UpdateReservation,
    UpdateRoom,
    CreateUser,
}

impl ToSql<crate::schema::sql_types::AuditAction, Pg> for AuditAction {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        let s = match *self {
            AuditAction::CreateReservation => "create_reservation",
            AuditAction::CancelReservation => "cancel_reservation",
            AuditAction::UpdateReservation => "update_reservation",
            AuditAction::UpdateRoom => "update_room",
            AuditAction::CreateUser => "create_user",
        };
        <str as ToSql<Text, Pg>>::to_sql(s, out)
    }
}

impl FromSql<crate::schema::sql_types::AuditAction, Pg> for AuditAction {
    fn from_sql(bytes: PgValue) -> deserialize::Result<Self> {
        match <String as FromSql<Text, Pg>>::from_sql(bytes)?.as_str() {
            "create_reservation" => Ok(AuditAction::CreateReservation),
            "cancel_reservation" => Ok(AuditAction::CancelReservation),
            "update_reservation" => Ok(AuditAction::UpdateReservation),
            "update_room" => Ok(AuditAction::UpdateRoom),
            "create_user" => Ok(AuditAction::CreateUser),
            s => Err(format!("Unrecognized audit action: {}", s).into()),
        }
    }
}

#[derive(Debug, Clone, Queryable, Serialize, Deserialize, Selectable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: i32,
    pub name: String,
    pub role: UserRole,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Queryable, Serialize, Deserialize, Selectable)]
#[diesel(table_name = rooms)]
pub struct Room {
    pub id: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: RoomType,
    pub is_blocked: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub booking_start: Option<NaiveTime>,
    pub booking_end: Option<NaiveTime>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = rooms)]
pub struct NewRoom {
    pub name: String,
    pub type_: RoomType,
    pub booking_start: Option<NaiveTime>,
    pub booking_end: Option<NaiveTime>,
}

// Partial update for PATCH /rooms/{id}. The nested options distinguish
// "leave unchanged" (outer None) from "clear the bound" (Some(None)).
#[derive(Debug, Clone, Default, AsChangeset)]
#[diesel(table_name = rooms)]
pub struct RoomChanges {
    pub name: Option<String>,
    pub type_: Option<RoomType>,
    pub is_blocked: Option<bool>,
    pub booking_start: Option<Option<NaiveTime>>,
    pub booking_end: Option<Option<NaiveTime>>,
}

#[derive(Debug, Clone, Queryable, Serialize, Deserialize, Selectable)]
#[diesel(table_name = reservations)]
pub struct Reservation {
    pub id: i32,
    pub room_id: i32,
    pub user_id: i32,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: ReservationStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = reservations)]
pub struct NewReservation {
    pub room_id: i32,
    pub user_id: i32,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, Queryable, Serialize, Selectable)]
#[diesel(table_name = audit_logs)]
pub struct AuditLog {
    pub id: i32,
    pub actor_id: Option<i32>,
    pub action: AuditAction,
    pub description: Option<String>,
    pub payload: Option<serde_json::Value>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = audit_logs)]
pub struct NewAuditLog {
    pub actor_id: Option<i32>,
    pub action: AuditAction,
    pub description: Option<String>,
    pub payload: Option<serde_json::Value>,
}

// Request/Response models for API
#[derive(Debug, Clone, Deserialize)]
pub struct NewUserRequest {
    pub name: String,
    pub role: UserRole,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewRoomRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: RoomType,
    pub booking_start: Option<String>,
    pub booking_end: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateRoomRequest {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub type_: Option<RoomType>,
    pub is_blocked: Option<bool>,
    #[serde(default, deserialize_with = "double_option")]
    pub booking_start: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub booking_end: Option<Option<String>>,
}

fn double_option<'de, T, D>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    Deserialize::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkBlockRequest {
    pub ids: Vec<i32>,
    pub is_blocked: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReserveRoomRequest {
    pub user_id: i32,
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateReservationRequest {
    pub start_time: String,
    pub end_time: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReassignRequest {
    pub user_id: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetStatusRequest {
    pub status: ReservationStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkCancelRequest {
    pub ids: Vec<i32>,
}
