use rocket::http::Status;
use rocket::serde::json::Json;

/// Error kinds surfaced by the core. Gateway maps these onto `error` frames
/// for the originating socket; REST routes map them onto HTTP statuses;
/// background workers log them, bump an error counter, and keep going.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    /// Uniqueness collision. The row the caller wanted already exists, so the
    /// state is correct; callers treat this as success.
    #[error("conflict")]
    Conflict,
    #[error("blocked")]
    Blocked,
    /// Blind-date PII filter rejection, with the detected categories.
    #[error("pii detected: {0:?}")]
    PiiDetected(Vec<String>),
    #[error("expired")]
    Expired,
    #[error("not found: {0}")]
    NotFound(&'static str),
    #[error("store error: {0}")]
    TransientStore(#[from] rusqlite::Error),
    #[error("bad request: {0}")]
    BadRequest(&'static str),
}

impl CoreError {
    /// Stable machine-readable code used in socket `error` frames.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Unauthorized => "unauthorized",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::Conflict => "conflict",
            CoreError::Blocked => "blocked",
            CoreError::PiiDetected(_) => "pii_detected",
            CoreError::Expired => "expired",
            CoreError::NotFound(_) => "not_found",
            CoreError::TransientStore(_) => "transient_store",
            CoreError::BadRequest(_) => "bad_request",
        }
    }

    /// True when the error came from the store itself rather than a policy
    /// decision. Workers use this to count consecutive transient failures.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::TransientStore(_))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Map onto the (Status, Json) tuple shape the REST routes return.
pub fn to_http(e: &CoreError) -> (Status, Json<serde_json::Value>) {
    let status = match e {
        CoreError::Unauthorized => Status::Unauthorized,
        CoreError::Forbidden(_) => Status::Forbidden,
        CoreError::Conflict => Status::Conflict,
        CoreError::Blocked => Status::Forbidden,
        CoreError::PiiDetected(_) => Status::UnprocessableEntity,
        CoreError::Expired => Status::Gone,
        CoreError::NotFound(_) => Status::NotFound,
        CoreError::TransientStore(_) => Status::InternalServerError,
        CoreError::BadRequest(_) => Status::BadRequest,
    };
    (status, Json(serde_json::json!({"error": e.to_string()})))
}

/// Classify a rusqlite failure: unique-constraint hits become `Conflict`
/// (the losing writer treats the row as already present), everything else
/// stays transient.
pub fn classify_sqlite(e: rusqlite::Error) -> CoreError {
    if let rusqlite::Error::SqliteFailure(err, _) = &e
        && err.code == rusqlite::ErrorCode::ConstraintViolation
    {
        return CoreError::Conflict;
    }
    CoreError::TransientStore(e)
}
