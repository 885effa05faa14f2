use diesel::result::DatabaseErrorKind;
use thiserror::Error;

/// Failure kinds surfaced by the scheduling engine. Everything except
/// `Database`/`Pool` is a terminal verdict on the request itself; store
/// errors may be transient (see [`EngineError::is_transient`]).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid time range: start must be before end")]
    InvalidRange,
    #[error("cannot create reservation in the past")]
    PastReservation,
    #[error("reservation is outside the room's booking hours")]
    OutsideBookingHours,
    #[error("reservation conflicts with existing booking")]
    Conflict,
    #[error("reservation status does not allow this operation")]
    InvalidState,
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),
}

impl EngineError {
    /// Lock-wait and serialization failures roll back cleanly and are safe
    /// to retry from the caller.
    pub fn is_transient(&self) -> bool {
        match self {
            EngineError::Pool(_) => true,
            EngineError::Database(diesel::result::Error::DatabaseError(kind, _)) => matches!(
                kind,
                DatabaseErrorKind::SerializationFailure | DatabaseErrorKind::ClosedConnection
            ),
            _ => false,
        }
    }

}

/// Collapse a commit-time unique violation on `uq_room_time` into the
/// conflict verdict. The row lock makes this case rare, not impossible;
/// the constraint is the second line of defense.
pub fn unique_violation_as_conflict(err: EngineError) -> EngineError {
    match err {
        EngineError::Database(diesel::result::Error::DatabaseError(
            DatabaseErrorKind::UniqueViolation,
            _,
        )) => EngineError::Conflict,
        other => other,
    }
}
