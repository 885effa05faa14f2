#[macro_use]
extern crate diesel;

use actix_web::{delete, error, get, middleware, patch, post, web, App, HttpResponse, HttpServer, Responder};
use chrono::{DateTime, NaiveDateTime, NaiveTime, SecondsFormat, Utc};
use diesel::{prelude::*, r2d2};
use diesel::result::DatabaseErrorKind;
use dotenvy;
use regex::Regex;
mod actions;
mod errors;
mod models;
mod schema;
mod slots;

use errors::EngineError;
use models::AuditAction;

type DbPool = r2d2::Pool<r2d2::ConnectionManager<PgConnection>>;

#[derive(Debug, serde::Serialize)]
struct Res {
    message: String,
}

#[derive(Debug, serde::Deserialize)]
struct AuditQuery {
    limit: Option<i64>,
}

/// Strict ISO8601 with trailing Z; timestamps are stored as naive UTC.
fn as_utc_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn format_time_of_day(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

/// Callers may send offset-aware or naive ISO 8601; everything is
/// normalized to naive UTC before it reaches the engine.
fn parse_datetime(value: &str) -> Result<NaiveDateTime, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc).naive_utc());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .map_err(|_| "Invalid datetime format. Use ISO 8601.".to_string())
}

fn parse_time_of_day(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|_| "Invalid time format. Use HH:MM.".to_string())
}

fn engine_error_response(context: &str, e: EngineError) -> actix_web::Error {
    log::error!("Failed to {}: {:?}", context, e);
    let detail = e.to_string();
    let response = match &e {
        EngineError::InvalidRange
        | EngineError::PastReservation
        | EngineError::OutsideBookingHours
        | EngineError::InvalidState => HttpResponse::BadRequest().json(Res { message: detail }),
        EngineError::Conflict => HttpResponse::Conflict().json(Res { message: detail }),
        EngineError::Database(diesel::result::Error::NotFound) => {
            HttpResponse::NotFound().json(Res { message: "not found".to_string() })
        }
        EngineError::Database(diesel::result::Error::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            _,
        )) => HttpResponse::Conflict().json(Res { message: detail }),
        _ if e.is_transient() => HttpResponse::ServiceUnavailable().json(Res {
            message: "temporary storage error, safe to retry".to_string(),
        }),
        _ => HttpResponse::InternalServerError().json(Res { message: detail }),
    };
    error::InternalError::from_response(e, response).into()
}

fn reservation_payload(r: &models::Reservation) -> serde_json::Value {
    serde_json::json!({
        "id": r.id,
        "room_id": r.room_id,
        "user_id": r.user_id,
        "start_time": as_utc_iso(r.start_time),
        "end_time": as_utc_iso(r.end_time),
        "status": r.status,
    })
}

fn room_payload(
    conn: &mut PgConnection,
    room: &models::Room,
    now: NaiveDateTime,
) -> Result<serde_json::Value, EngineError> {
    let active = actions::current_occupant(conn, room.id, now)?;
    let upcoming = actions::next_reservation(conn, room.id, now)?;

    let status = if room.is_blocked {
        "blocked"
    } else if active.is_some() {
        "occupied"
    } else {
        "available"
    };

    Ok(serde_json::json!({
        "id": room.id,
        "name": room.name,
        "type": room.type_,
        "is_blocked": room.is_blocked,
        "status": status,
        "current_reservation": active.map(|(r, user_name)| serde_json::json!({
            "id": r.id,
            "user_id": r.user_id,
            "user_name": user_name,
            "end_time": as_utc_iso(r.end_time),
        })),
        "next_reservation": upcoming.map(|(r, user_name)| serde_json::json!({
            "id": r.id,
            "start_time": as_utc_iso(r.start_time),
            "user_name": user_name,
        })),
        "booking_window": {
            "start": room.booking_start.map(format_time_of_day),
            "end": room.booking_end.map(format_time_of_day),
        },
    }))
}

#[get("/health")]
async fn health_check(pool: web::Data<DbPool>) -> actix_web::Result<impl Responder> {
    let probe = web::block(move || -> Result<(), EngineError> {
        let mut conn = pool.get()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    })
    .await?;

    Ok(match probe {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({
            "status": "healthy",
            "database": "connected",
        })),
        Err(e) => {
            log::error!("Health check failed: {:?}", e);
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "unhealthy",
                "database": "disconnected",
            }))
        }
    })
}

#[post("/users")]
async fn add_user(
    pool: web::Data<DbPool>,
    form: web::Json<models::NewUserRequest>,
) -> actix_web::Result<impl Responder> {
    let re = Regex::new(r"^[a-zA-Z0-9 ]+$").unwrap();

    if re.captures(&form.name).is_none() {
        return Ok(HttpResponse::BadRequest().json(Res {
            message: "name should be an alphanumeric string; spaces are the only special character allowed".to_string(),
        }));
    }

    let form = form.into_inner();
    let user = web::block(move || -> Result<models::User, EngineError> {
        let mut conn = pool.get()?;

        let created = actions::create_user(
            &mut conn,
            &models::NewUser {
                name: form.name.clone(),
                role: form.role,
            },
        )?;

        actions::record_action(
            &mut conn,
            Some(created.id),
            AuditAction::CreateUser,
            "User created",
            serde_json::json!({ "user_id": created.id, "name": created.name }),
        )?;

        Ok(created)
    })
    .await?
    .map_err(|e| {
        if matches!(
            &e,
            EngineError::Database(diesel::result::Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _
            ))
        ) {
            error::InternalError::from_response(
                e,
                HttpResponse::Conflict().json(Res {
                    message: "user already exists".to_string(),
                }),
            )
            .into()
        } else {
            engine_error_response("add user", e)
        }
    })?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "user": {
            "id": user.id,
            "name": user.name,
            "role": user.role,
            "created_at": as_utc_iso(user.created_at),
        }
    })))
}

#[get("/users")]
async fn list_users(pool: web::Data<DbPool>) -> actix_web::Result<impl Responder> {
    let users = web::block(move || -> Result<Vec<serde_json::Value>, EngineError> {
        let mut conn = pool.get()?;

        let data = actions::list_users(&mut conn)?
            .iter()
            .map(|u| {
                serde_json::json!({
                    "id": u.id,
                    "name": u.name,
                    "role": u.role,
                    "created_at": as_utc_iso(u.created_at),
                    "updated_at": as_utc_iso(u.updated_at),
                })
            })
            .collect();

        Ok(data)
    })
    .await?
    .map_err(|e| engine_error_response("list users", e))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "users": users })))
}

#[post("/rooms")]
async fn add_room(
    pool: web::Data<DbPool>,
    form: web::Json<models::NewRoomRequest>,
) -> actix_web::Result<impl Responder> {
    let re = Regex::new(r"^[a-zA-Z0-9 \-]+$").unwrap();

    if re.captures(&form.name).is_none() {
        return Ok(HttpResponse::BadRequest().json(Res {
            message: "room name should be alphanumeric; spaces and dashes are allowed".to_string(),
        }));
    }

    let booking_start = match form.booking_start.as_deref().map(parse_time_of_day) {
        None => None,
        Some(Ok(t)) => Some(t),
        Some(Err(msg)) => return Ok(HttpResponse::BadRequest().json(Res { message: msg })),
    };
    let booking_end = match form.booking_end.as_deref().map(parse_time_of_day) {
        None => None,
        Some(Ok(t)) => Some(t),
        Some(Err(msg)) => return Ok(HttpResponse::BadRequest().json(Res { message: msg })),
    };

    let form = form.into_inner();
    let room = web::block(move || -> Result<models::Room, EngineError> {
        let mut conn = pool.get()?;

        actions::create_room(
            &mut conn,
            &models::NewRoom {
                name: form.name.clone(),
                type_: form.type_,
                booking_start,
                booking_end,
            },
        )
    })
    .await?
    .map_err(|e| {
        if matches!(
            &e,
            EngineError::Database(diesel::result::Error::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _
            ))
        ) {
            error::InternalError::from_response(
                e,
                HttpResponse::Conflict().json(Res {
                    message: "room already exists".to_string(),
                }),
            )
            .into()
        } else {
            engine_error_response("add room", e)
        }
    })?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "room": {
            "id": room.id,
            "name": room.name,
            "type": room.type_,
            "is_blocked": room.is_blocked,
            "booking_window": {
                "start": room.booking_start.map(format_time_of_day),
                "end": room.booking_end.map(format_time_of_day),
            },
        }
    })))
}

#[get("/rooms")]
async fn list_rooms(pool: web::Data<DbPool>) -> actix_web::Result<impl Responder> {
    let rooms = web::block(move || -> Result<Vec<serde_json::Value>, EngineError> {
        let mut conn = pool.get()?;
        let now = Utc::now().naive_utc();

        let mut data = Vec::new();
        for room in actions::list_rooms(&mut conn)? {
            data.push(room_payload(&mut conn, &room, now)?);
        }

        Ok(data)
    })
    .await?
    .map_err(|e| engine_error_response("list rooms", e))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "rooms": rooms })))
}

#[get("/rooms/{room_id}")]
async fn room_detail(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> actix_web::Result<impl Responder> {
    let target_room = path.into_inner();

    let detail = web::block(move || -> Result<Option<serde_json::Value>, EngineError> {
        let mut conn = pool.get()?;

        let room = match actions::get_room(&mut conn, target_room)? {
            Some(room) => room,
            None => return Ok(None),
        };

        let now = Utc::now().naive_utc();

        let schedule: Vec<serde_json::Value> = actions::room_schedule(&mut conn, room.id)?
            .iter()
            .map(|(r, user_name)| {
                let mut payload = reservation_payload(r);
                payload["user_name"] = serde_json::json!(user_name);
                payload
            })
            .collect();

        let free_slots: Vec<serde_json::Value> =
            actions::upcoming_free_windows(&mut conn, room.id, now, slots::RESERVATION_LOOKAHEAD_HOURS)?
                .iter()
                .map(|w| {
                    serde_json::json!({
                        "start": as_utc_iso(w.start),
                        "end": as_utc_iso(w.end),
                    })
                })
                .collect();

        Ok(Some(serde_json::json!({
            "room": room_payload(&mut conn, &room, now)?,
            "schedule": schedule,
            "free_slots": free_slots,
        })))
    })
    .await?
    .map_err(|e| engine_error_response("get room detail", e))?;

    Ok(match detail {
        Some(payload) => HttpResponse::Ok().json(payload),
        None => HttpResponse::NotFound().json(Res {
            message: "room not found".to_string(),
        }),
    })
}

#[patch("/rooms/{room_id}")]
async fn update_room(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    form: web::Json<models::UpdateRoomRequest>,
) -> actix_web::Result<impl Responder> {
    let target_room = path.into_inner();

    if let Some(name) = &form.name {
        let re = Regex::new(r"^[a-zA-Z0-9 \-]+$").unwrap();
        if re.captures(name).is_none() {
            return Ok(HttpResponse::BadRequest().json(Res {
                message: "room name should be alphanumeric; spaces and dashes are allowed".to_string(),
            }));
        }
    }

    // Outer None leaves the bound unchanged; an explicit null clears it.
    let booking_start = match &form.booking_start {
        None => None,
        Some(None) => Some(None),
        Some(Some(v)) => match parse_time_of_day(v) {
            Ok(t) => Some(Some(t)),
            Err(msg) => return Ok(HttpResponse::BadRequest().json(Res { message: msg })),
        },
    };
    let booking_end = match &form.booking_end {
        None => None,
        Some(None) => Some(None),
        Some(Some(v)) => match parse_time_of_day(v) {
            Ok(t) => Some(Some(t)),
            Err(msg) => return Ok(HttpResponse::BadRequest().json(Res { message: msg })),
        },
    };

    let form = form.into_inner();
    let updated = web::block(move || -> Result<Option<models::Room>, EngineError> {
        let mut conn = pool.get()?;

        if actions::get_room(&mut conn, target_room)?.is_none() {
            return Ok(None);
        }

        let changes = models::RoomChanges {
            name: form.name.clone(),
            type_: form.type_,
            is_blocked: form.is_blocked,
            booking_start,
            booking_end,
        };

        let room = actions::update_room(&mut conn, target_room, &changes)?;

        actions::record_action(
            &mut conn,
            None,
            AuditAction::UpdateRoom,
            "Room updated",
            serde_json::json!({ "room_id": room.id }),
        )?;

        Ok(Some(room))
    })
    .await?
    .map_err(|e| engine_error_response("update room", e))?;

    Ok(match updated {
        Some(room) => HttpResponse::Ok().json(serde_json::json!({
            "room": {
                "id": room.id,
                "name": room.name,
                "type": room.type_,
                "is_blocked": room.is_blocked,
                "booking_window": {
                    "start": room.booking_start.map(format_time_of_day),
                    "end": room.booking_end.map(format_time_of_day),
                },
            }
        })),
        None => HttpResponse::NotFound().json(Res {
            message: "room not found".to_string(),
        }),
    })
}

#[post("/rooms/bulk-block")]
async fn bulk_block_rooms(
    pool: web::Data<DbPool>,
    form: web::Json<models::BulkBlockRequest>,
) -> actix_web::Result<impl Responder> {
    let form = form.into_inner();

    let updated = web::block(move || -> Result<usize, EngineError> {
        let mut conn = pool.get()?;

        let count = actions::bulk_set_block_status(&mut conn, &form.ids, form.is_blocked)?;

        actions::record_action(
            &mut conn,
            None,
            AuditAction::UpdateRoom,
            "Bulk room block update",
            serde_json::json!({
                "ids": form.ids,
                "is_blocked": form.is_blocked,
                "updated": count,
            }),
        )?;

        Ok(count)
    })
    .await?
    .map_err(|e| engine_error_response("bulk block rooms", e))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "updated": updated })))
}

enum ReserveOutcome {
    RoomMissing,
    UserMissing,
    NotBookable,
    Blocked,
    Created(models::Reservation, models::Room),
}

#[post("/rooms/{room_id}/reserve")]
async fn reserve_room(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    form: web::Json<models::ReserveRoomRequest>,
) -> actix_web::Result<impl Responder> {
    let target_room = path.into_inner();

    let start = match parse_datetime(&form.start_time) {
        Ok(dt) => dt,
        Err(msg) => return Ok(HttpResponse::BadRequest().json(Res { message: msg })),
    };
    let end = match parse_datetime(&form.end_time) {
        Ok(dt) => dt,
        Err(msg) => return Ok(HttpResponse::BadRequest().json(Res { message: msg })),
    };

    let form = form.into_inner();
    let outcome = web::block(move || -> Result<ReserveOutcome, EngineError> {
        let mut conn = pool.get()?;

        let room = match actions::get_room(&mut conn, target_room)? {
            Some(room) => room,
            None => return Ok(ReserveOutcome::RoomMissing),
        };
        // Only public rooms are self-service bookable.
        if room.type_ != models::RoomType::Public {
            return Ok(ReserveOutcome::NotBookable);
        }
        if room.is_blocked {
            return Ok(ReserveOutcome::Blocked);
        }
        if actions::get_user(&mut conn, form.user_id)?.is_none() {
            return Ok(ReserveOutcome::UserMissing);
        }

        let now = Utc::now().naive_utc();
        let reservation =
            actions::create_reservation(&mut conn, &room, form.user_id, start, end, now)?;

        actions::record_action(
            &mut conn,
            Some(form.user_id),
            AuditAction::CreateReservation,
            "Created reservation",
            serde_json::json!({
                "reservation_id": reservation.id,
                "room_id": room.id,
                "start_time": as_utc_iso(reservation.start_time),
                "end_time": as_utc_iso(reservation.end_time),
            }),
        )?;

        Ok(ReserveOutcome::Created(reservation, room))
    })
    .await?
    .map_err(|e| engine_error_response("reserve room", e))?;

    Ok(match outcome {
        ReserveOutcome::RoomMissing => HttpResponse::NotFound().json(Res {
            message: "room not found".to_string(),
        }),
        ReserveOutcome::UserMissing => HttpResponse::NotFound().json(Res {
            message: "user not found".to_string(),
        }),
        ReserveOutcome::NotBookable => HttpResponse::Forbidden().json(Res {
            message: "room is not available for booking".to_string(),
        }),
        ReserveOutcome::Blocked => HttpResponse::Conflict().json(Res {
            message: "room is temporarily unavailable".to_string(),
        }),
        ReserveOutcome::Created(reservation, room) => {
            let mut payload = reservation_payload(&reservation);
            payload["room_name"] = serde_json::json!(room.name);
            HttpResponse::Created().json(serde_json::json!({ "reservation": payload }))
        }
    })
}

#[get("/rooms/{room_id}/history")]
async fn room_history(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> actix_web::Result<impl Responder> {
    let target_room = path.into_inner();

    let history = web::block(move || -> Result<Option<Vec<serde_json::Value>>, EngineError> {
        let mut conn = pool.get()?;

        if actions::get_room(&mut conn, target_room)?.is_none() {
            return Ok(None);
        }

        let data = actions::room_schedule(&mut conn, target_room)?
            .iter()
            .map(|(r, user_name)| {
                let mut payload = reservation_payload(r);
                payload["user_name"] = serde_json::json!(user_name);
                payload
            })
            .collect();

        Ok(Some(data))
    })
    .await?
    .map_err(|e| engine_error_response("get room history", e))?;

    Ok(match history {
        Some(data) => HttpResponse::Ok().json(serde_json::json!({ "reservations": data })),
        None => HttpResponse::NotFound().json(Res {
            message: "room not found".to_string(),
        }),
    })
}

#[get("/reservations/user/{user_id}")]
async fn user_reservations(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> actix_web::Result<impl Responder> {
    let owner = path.into_inner();

    let history = web::block(move || -> Result<Option<Vec<serde_json::Value>>, EngineError> {
        let mut conn = pool.get()?;

        if actions::get_user(&mut conn, owner)?.is_none() {
            return Ok(None);
        }

        let data = actions::reservations_for_user(&mut conn, owner)?
            .iter()
            .map(|(r, room_name)| {
                let mut payload = reservation_payload(r);
                payload["room_name"] = serde_json::json!(room_name);
                payload
            })
            .collect();

        Ok(Some(data))
    })
    .await?
    .map_err(|e| engine_error_response("list user reservations", e))?;

    Ok(match history {
        Some(data) => HttpResponse::Ok().json(serde_json::json!({ "reservations": data })),
        None => HttpResponse::NotFound().json(Res {
            message: "user not found".to_string(),
        }),
    })
}

#[patch("/reservations/{reservation_id}")]
async fn update_reservation(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    form: web::Json<models::UpdateReservationRequest>,
) -> actix_web::Result<impl Responder> {
    let reservation_id = path.into_inner();

    let start = match parse_datetime(&form.start_time) {
        Ok(dt) => dt,
        Err(msg) => return Ok(HttpResponse::BadRequest().json(Res { message: msg })),
    };
    let end = match parse_datetime(&form.end_time) {
        Ok(dt) => dt,
        Err(msg) => return Ok(HttpResponse::BadRequest().json(Res { message: msg })),
    };

    let updated = web::block(move || -> Result<Option<models::Reservation>, EngineError> {
        let mut conn = pool.get()?;

        let reservation = match actions::get_reservation(&mut conn, reservation_id)? {
            Some(reservation) => reservation,
            None => return Ok(None),
        };

        let now = Utc::now().naive_utc();
        let updated = actions::update_reservation_times(&mut conn, &reservation, start, end, now)?;

        actions::record_action(
            &mut conn,
            None,
            AuditAction::UpdateReservation,
            "Reservation updated",
            serde_json::json!({
                "reservation_id": updated.id,
                "room_id": updated.room_id,
            }),
        )?;

        Ok(Some(updated))
    })
    .await?
    .map_err(|e| engine_error_response("update reservation", e))?;

    Ok(match updated {
        Some(reservation) => HttpResponse::Ok().json(serde_json::json!({
            "reservation": reservation_payload(&reservation)
        })),
        None => HttpResponse::NotFound().json(Res {
            message: "reservation not found".to_string(),
        }),
    })
}

#[delete("/reservations/{reservation_id}")]
async fn cancel_reservation(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> actix_web::Result<impl Responder> {
    let reservation_id = path.into_inner();

    let cancelled = web::block(move || -> Result<Option<models::Reservation>, EngineError> {
        let mut conn = pool.get()?;

        if actions::get_reservation(&mut conn, reservation_id)?.is_none() {
            return Ok(None);
        }

        let cancelled = actions::cancel_reservation(&mut conn, reservation_id)?;

        actions::record_action(
            &mut conn,
            None,
            AuditAction::CancelReservation,
            "Reservation cancelled",
            serde_json::json!({
                "reservation_id": cancelled.id,
                "room_id": cancelled.room_id,
            }),
        )?;

        Ok(Some(cancelled))
    })
    .await?
    .map_err(|e| engine_error_response("cancel reservation", e))?;

    Ok(match cancelled {
        Some(reservation) => {
            HttpResponse::Ok().json(serde_json::json!({ "status": reservation.status }))
        }
        None => HttpResponse::NotFound().json(Res {
            message: "reservation not found".to_string(),
        }),
    })
}

#[post("/reservations/{reservation_id}/reassign")]
async fn reassign_reservation(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    form: web::Json<models::ReassignRequest>,
) -> actix_web::Result<impl Responder> {
    let reservation_id = path.into_inner();
    let new_owner = form.user_id;

    let updated = web::block(move || -> Result<Option<models::Reservation>, EngineError> {
        let mut conn = pool.get()?;

        if actions::get_reservation(&mut conn, reservation_id)?.is_none() {
            return Ok(None);
        }
        if actions::get_user(&mut conn, new_owner)?.is_none() {
            return Err(EngineError::Database(diesel::result::Error::NotFound));
        }

        let updated = actions::reassign_reservation(&mut conn, reservation_id, new_owner)?;
        Ok(Some(updated))
    })
    .await?
    .map_err(|e| engine_error_response("reassign reservation", e))?;

    Ok(match updated {
        Some(reservation) => HttpResponse::Ok().json(serde_json::json!({
            "reservation": reservation_payload(&reservation)
        })),
        None => HttpResponse::NotFound().json(Res {
            message: "reservation not found".to_string(),
        }),
    })
}

#[post("/reservations/{reservation_id}/status")]
async fn set_reservation_status(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    form: web::Json<models::SetStatusRequest>,
) -> actix_web::Result<impl Responder> {
    let reservation_id = path.into_inner();
    let new_status = form.status;

    let updated = web::block(move || -> Result<Option<models::Reservation>, EngineError> {
        let mut conn = pool.get()?;

        if actions::get_reservation(&mut conn, reservation_id)?.is_none() {
            return Ok(None);
        }

        let updated = actions::set_reservation_status(&mut conn, reservation_id, new_status)?;
        Ok(Some(updated))
    })
    .await?
    .map_err(|e| engine_error_response("set reservation status", e))?;

    Ok(match updated {
        Some(reservation) => HttpResponse::Ok().json(serde_json::json!({
            "reservation": reservation_payload(&reservation)
        })),
        None => HttpResponse::NotFound().json(Res {
            message: "reservation not found".to_string(),
        }),
    })
}

#[post("/reservations/bulk-cancel")]
async fn bulk_cancel_reservations(
    pool: web::Data<DbPool>,
    form: web::Json<models::BulkCancelRequest>,
) -> actix_web::Result<impl Responder> {
    let form = form.into_inner();

    let updated = web::block(move || -> Result<usize, EngineError> {
        let mut conn = pool.get()?;

        let count = actions::bulk_cancel_reservations(&mut conn, &form.ids)?;

        actions::record_action(
            &mut conn,
            None,
            AuditAction::CancelReservation,
            "Bulk reservation cancel",
            serde_json::json!({ "ids": form.ids, "updated": count }),
        )?;

        Ok(count)
    })
    .await?
    .map_err(|e| engine_error_response("bulk cancel reservations", e))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "updated": updated })))
}

#[get("/audit")]
async fn audit_trail(
    pool: web::Data<DbPool>,
    query: web::Query<AuditQuery>,
) -> actix_web::Result<impl Responder> {
    let limit = query.limit.unwrap_or(100).clamp(1, 1000);

    let logs = web::block(move || -> Result<Vec<serde_json::Value>, EngineError> {
        let mut conn = pool.get()?;

        let data = actions::list_audit_logs(&mut conn, limit)?
            .iter()
            .map(|l| {
                serde_json::json!({
                    "id": l.id,
                    "actor_id": l.actor_id,
                    "action": l.action,
                    "description": l.description,
                    "payload": l.payload,
                    "created_at": as_utc_iso(l.created_at),
                })
            })
            .collect();

        Ok(data)
    })
    .await?
    .map_err(|e| engine_error_response("list audit logs", e))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "audit_logs": logs })))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    // initialize DB pool outside of `HttpServer::new` so that it is shared across all workers
    let pool = initialize_db_pool();

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
    log::info!("starting HTTP server at http://{}", bind_addr);

    HttpServer::new(move || {
        App::new()
            // add DB pool handle to app data; enables use of `web::Data<DbPool>` extractor
            .app_data(web::Data::new(pool.clone()))
            .wrap(middleware::Logger::default())
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                let detail = err.to_string();
                let response = match err {
                    error::JsonPayloadError::ContentType => {
                        HttpResponse::UnsupportedMediaType().body("Unsupported Media Type")
                    }
                    error::JsonPayloadError::Deserialize(ref err) => {
                        HttpResponse::BadRequest().json(Res { message: err.to_string() })
                    }
                    _ => HttpResponse::BadRequest().json(Res { message: detail }),
                };
                error::InternalError::from_response(err, response).into()
            }))
            .service(health_check)
            .service(add_user)
            .service(list_users)
            .service(add_room)
            .service(list_rooms)
            .service(bulk_block_rooms)
            .service(room_detail)
            .service(update_room)
            .service(reserve_room)
            .service(room_history)
            .service(user_reservations)
            .service(bulk_cancel_reservations)
            .service(update_reservation)
            .service(cancel_reservation)
            .service(reassign_reservation)
            .service(set_reservation_status)
            .service(audit_trail)
    })
    .bind(bind_addr)?
    .run()
    .await
}

fn initialize_db_pool() -> DbPool {
    let conn_spec = std::env::var("DATABASE_URL").expect("DATABASE_URL should be set");
    let manager = r2d2::ConnectionManager::<PgConnection>::new(conn_spec);
    r2d2::Pool::builder()
        .build(manager)
        .expect("DATABASE_URL should point at a reachable Postgres database")
}
