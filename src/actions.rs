use diesel::prelude::*;
use chrono::{Duration, NaiveDateTime};

use crate::errors::{unique_violation_as_conflict, EngineError};
use crate::models::{
    AuditAction, AuditLog, NewAuditLog, NewReservation, NewRoom, NewUser, Reservation,
    ReservationStatus, Room, RoomChanges, User,
};
use crate::slots::{self, FreeWindow};

type EngineResult<T> = Result<T, EngineError>;

// ---------------------------------------------------------------------------
// Conflict detection
// ---------------------------------------------------------------------------

/// Scan the room's active reservations for one overlapping
/// `[range_start, range_end)`, taking a row lock on every matching row.
/// Must run inside the transaction that subsequently writes, so a racing
/// writer on the same room either blocks here or sees our committed row.
pub fn find_conflict(
    conn: &mut PgConnection,
    target_room: i32,
    range_start: NaiveDateTime,
    range_end: NaiveDateTime,
    exclude: Option<i32>,
) -> EngineResult<Option<i32>> {
    use crate::schema::reservations::dsl::*;

    let scan = reservations
        .filter(room_id.eq(target_room))
        .filter(status.eq(ReservationStatus::Active))
        .filter(start_time.lt(range_end))
        .filter(end_time.gt(range_start))
        .select(id)
        .order(start_time.asc());

    let found = match exclude {
        // An update never conflicts with its own row.
        Some(own_id) => scan
            .filter(id.ne(own_id))
            .for_update()
            .first::<i32>(conn)
            .optional()?,
        None => scan.for_update().first::<i32>(conn).optional()?,
    };

    Ok(found)
}

pub fn assert_no_conflict(
    conn: &mut PgConnection,
    target_room: i32,
    range_start: NaiveDateTime,
    range_end: NaiveDateTime,
    exclude: Option<i32>,
) -> EngineResult<()> {
    match find_conflict(conn, target_room, range_start, range_end, exclude)? {
        Some(_) => Err(EngineError::Conflict),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Reservation lifecycle
// ---------------------------------------------------------------------------

pub fn create_reservation(
    conn: &mut PgConnection,
    room: &Room,
    owner_id: i32,
    start: NaiveDateTime,
    end: NaiveDateTime,
    now: NaiveDateTime,
) -> EngineResult<Reservation> {
    use crate::schema::reservations::dsl::*;

    slots::validate_time_range(start, end, now)?;
    slots::check_booking_window(room.booking_start, room.booking_end, start, end)?;

    let result = conn.transaction::<Reservation, EngineError, _>(|conn| {
        assert_no_conflict(conn, room.id, start, end, None)?;

        let new_reservation = NewReservation {
            room_id: room.id,
            user_id: owner_id,
            start_time: start,
            end_time: end,
            status: ReservationStatus::Active,
        };

        let reservation = diesel::insert_into(reservations)
            .values(&new_reservation)
            .get_result::<Reservation>(conn)?;

        Ok(reservation)
    });

    result.map_err(unique_violation_as_conflict)
}

pub fn update_reservation_times(
    conn: &mut PgConnection,
    reservation: &Reservation,
    start: NaiveDateTime,
    end: NaiveDateTime,
    now: NaiveDateTime,
) -> EngineResult<Reservation> {
    use crate::schema::reservations::dsl::*;

    if reservation.status != ReservationStatus::Active {
        return Err(EngineError::InvalidState);
    }
    slots::validate_time_range(start, end, now)?;

    let result = conn.transaction::<Reservation, EngineError, _>(|conn| {
        assert_no_conflict(conn, reservation.room_id, start, end, Some(reservation.id))?;

        let updated = diesel::update(reservations.find(reservation.id))
            .set((
                start_time.eq(start),
                end_time.eq(end),
                updated_at.eq(diesel::dsl::now),
            ))
            .get_result::<Reservation>(conn)?;

        Ok(updated)
    });

    result.map_err(unique_violation_as_conflict)
}

/// Idempotent `-> cancelled` transition. Freeing a slot cannot conflict,
/// so no scan is taken; cancelling twice is a no-op.
pub fn cancel_reservation(conn: &mut PgConnection, reservation_id: i32) -> EngineResult<Reservation> {
    use crate::schema::reservations::dsl::*;

    conn.transaction::<Reservation, EngineError, _>(|conn| {
        let reservation = reservations
            .find(reservation_id)
            .first::<Reservation>(conn)?;

        if reservation.status == ReservationStatus::Cancelled {
            return Ok(reservation);
        }

        let updated = diesel::update(reservations.find(reservation_id))
            .set((
                status.eq(ReservationStatus::Cancelled),
                updated_at.eq(diesel::dsl::now),
            ))
            .get_result::<Reservation>(conn)?;

        Ok(updated)
    })
}

/// Administrative status overwrite (e.g. manual `finished`). No conflict
/// re-check; occupancy is always computed live from active rows.
pub fn set_reservation_status(
    conn: &mut PgConnection,
    reservation_id: i32,
    new_status: ReservationStatus,
) -> EngineResult<Reservation> {
    use crate::schema::reservations::dsl::*;

    let updated = diesel::update(reservations.find(reservation_id))
        .set((status.eq(new_status), updated_at.eq(diesel::dsl::now)))
        .get_result::<Reservation>(conn)?;

    Ok(updated)
}

pub fn reassign_reservation(
    conn: &mut PgConnection,
    reservation_id: i32,
    new_owner: i32,
) -> EngineResult<Reservation> {
    use crate::schema::reservations::dsl::*;

    let updated = diesel::update(reservations.find(reservation_id))
        .set((user_id.eq(new_owner), updated_at.eq(diesel::dsl::now)))
        .get_result::<Reservation>(conn)?;

    Ok(updated)
}

/// Set-based cancellation; ids with no matching row are silently skipped.
pub fn bulk_cancel_reservations(conn: &mut PgConnection, ids: &[i32]) -> EngineResult<usize> {
    use crate::schema::reservations::dsl::*;

    if ids.is_empty() {
        return Ok(0);
    }

    let updated = diesel::update(reservations.filter(id.eq_any(ids)))
        .set((
            status.eq(ReservationStatus::Cancelled),
            updated_at.eq(diesel::dsl::now),
        ))
        .execute(conn)?;

    Ok(updated)
}

pub fn get_reservation(
    conn: &mut PgConnection,
    reservation_id: i32,
) -> EngineResult<Option<Reservation>> {
    use crate::schema::reservations::dsl::*;

    let reservation = reservations
        .find(reservation_id)
        .first::<Reservation>(conn)
        .optional()?;

    Ok(reservation)
}

// ---------------------------------------------------------------------------
// Schedule views
// ---------------------------------------------------------------------------

/// Every reservation for the room, all statuses, start ascending, with the
/// owning user's name for display.
pub fn room_schedule(
    conn: &mut PgConnection,
    target_room: i32,
) -> EngineResult<Vec<(Reservation, String)>> {
    use crate::schema::{reservations, users};

    let schedule = reservations::table
        .inner_join(users::table)
        .filter(reservations::room_id.eq(target_room))
        .order(reservations::start_time.asc())
        .select((reservations::all_columns, users::name))
        .load::<(Reservation, String)>(conn)?;

    Ok(schedule)
}

pub fn reservations_for_user(
    conn: &mut PgConnection,
    owner_id: i32,
) -> EngineResult<Vec<(Reservation, String)>> {
    use crate::schema::{reservations, rooms};

    let history = reservations::table
        .inner_join(rooms::table)
        .filter(reservations::user_id.eq(owner_id))
        .order(reservations::start_time.desc())
        .select((reservations::all_columns, rooms::name))
        .load::<(Reservation, String)>(conn)?;

    Ok(history)
}

/// The active reservation covering `at`, if any. Conflict prevention keeps
/// this unique; the earliest start wins if the store ever disagrees.
pub fn current_occupant(
    conn: &mut PgConnection,
    target_room: i32,
    at: NaiveDateTime,
) -> EngineResult<Option<(Reservation, String)>> {
    use crate::schema::{reservations, users};

    let occupant = reservations::table
        .inner_join(users::table)
        .filter(reservations::room_id.eq(target_room))
        .filter(reservations::status.eq(ReservationStatus::Active))
        .filter(reservations::start_time.le(at))
        .filter(reservations::end_time.gt(at))
        .order(reservations::start_time.asc())
        .select((reservations::all_columns, users::name))
        .first::<(Reservation, String)>(conn)
        .optional()?;

    Ok(occupant)
}

pub fn next_reservation(
    conn: &mut PgConnection,
    target_room: i32,
    after: NaiveDateTime,
) -> EngineResult<Option<(Reservation, String)>> {
    use crate::schema::{reservations, users};

    let upcoming = reservations::table
        .inner_join(users::table)
        .filter(reservations::room_id.eq(target_room))
        .filter(reservations::status.eq(ReservationStatus::Active))
        .filter(reservations::start_time.gt(after))
        .order(reservations::start_time.asc())
        .select((reservations::all_columns, users::name))
        .first::<(Reservation, String)>(conn)
        .optional()?;

    Ok(upcoming)
}

pub fn active_reservations_for_room(
    conn: &mut PgConnection,
    target_room: i32,
) -> EngineResult<Vec<Reservation>> {
    use crate::schema::reservations::dsl::*;

    let active = reservations
        .filter(room_id.eq(target_room))
        .filter(status.eq(ReservationStatus::Active))
        .order(start_time.asc())
        .load::<Reservation>(conn)?;

    Ok(active)
}

pub fn upcoming_free_windows(
    conn: &mut PgConnection,
    target_room: i32,
    now: NaiveDateTime,
    lookahead_hours: i64,
) -> EngineResult<Vec<FreeWindow>> {
    let horizon = now + Duration::hours(lookahead_hours);

    let intervals: Vec<(NaiveDateTime, NaiveDateTime)> =
        active_reservations_for_room(conn, target_room)?
            .iter()
            .map(|r| (r.start_time, r.end_time))
            .collect();

    Ok(slots::free_windows(&intervals, now, horizon))
}

// ---------------------------------------------------------------------------
// Rooms
// ---------------------------------------------------------------------------

pub fn get_room(conn: &mut PgConnection, target_room: i32) -> EngineResult<Option<Room>> {
    use crate::schema::rooms::dsl::*;

    let room = rooms.find(target_room).first::<Room>(conn).optional()?;
    Ok(room)
}

pub fn list_rooms(conn: &mut PgConnection) -> EngineResult<Vec<Room>> {
    use crate::schema::rooms::dsl::*;

    let all = rooms.order(name.asc()).load::<Room>(conn)?;
    Ok(all)
}

pub fn create_room(conn: &mut PgConnection, new_room: &NewRoom) -> EngineResult<Room> {
    use crate::schema::rooms::dsl::*;

    let room = diesel::insert_into(rooms)
        .values(new_room)
        .get_result::<Room>(conn)?;
    Ok(room)
}

pub fn update_room(
    conn: &mut PgConnection,
    target_room: i32,
    changes: &RoomChanges,
) -> EngineResult<Room> {
    use crate::schema::rooms::dsl::*;

    let room = diesel::update(rooms.find(target_room))
        .set((changes.clone(), updated_at.eq(diesel::dsl::now)))
        .get_result::<Room>(conn)?;
    Ok(room)
}

/// Blocking only removes booking capacity, so a set-based update without
/// per-row locks is enough. Unknown ids are skipped.
pub fn bulk_set_block_status(
    conn: &mut PgConnection,
    ids: &[i32],
    blocked: bool,
) -> EngineResult<usize> {
    use crate::schema::rooms::dsl::*;

    if ids.is_empty() {
        return Ok(0);
    }

    let updated = diesel::update(rooms.filter(id.eq_any(ids)))
        .set((is_blocked.eq(blocked), updated_at.eq(diesel::dsl::now)))
        .execute(conn)?;

    Ok(updated)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub fn get_user(conn: &mut PgConnection, target_user: i32) -> EngineResult<Option<User>> {
    use crate::schema::users::dsl::*;

    let user = users.find(target_user).first::<User>(conn).optional()?;
    Ok(user)
}

pub fn create_user(conn: &mut PgConnection, new_user: &NewUser) -> EngineResult<User> {
    use crate::schema::users::dsl::*;

    let user = diesel::insert_into(users)
        .values(new_user)
        .get_result::<User>(conn)?;
    Ok(user)
}

pub fn list_users(conn: &mut PgConnection) -> EngineResult<Vec<User>> {
    use crate::schema::users::dsl::*;

    let all = users.order(name.asc()).load::<User>(conn)?;
    Ok(all)
}

// ---------------------------------------------------------------------------
// Audit trail
// ---------------------------------------------------------------------------

pub fn record_action(
    conn: &mut PgConnection,
    actor: Option<i32>,
    audit_action: AuditAction,
    note: &str,
    details: serde_json::Value,
) -> EngineResult<AuditLog> {
    use crate::schema::audit_logs::dsl::*;

    let entry = NewAuditLog {
        actor_id: actor,
        action: audit_action,
        description: Some(note.to_owned()),
        payload: Some(details),
    };

    let log = diesel::insert_into(audit_logs)
        .values(&entry)
        .get_result::<AuditLog>(conn)?;

    Ok(log)
}

pub fn list_audit_logs(conn: &mut PgConnection, limit: i64) -> EngineResult<Vec<AuditLog>> {
    use crate::schema::audit_logs::dsl::*;

    let logs = audit_logs
        .order(created_at.desc())
        .limit(limit)
        .load::<AuditLog>(conn)?;

    Ok(logs)
}
