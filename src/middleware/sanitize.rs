use thiserror::Error;

/// Why a query was refused. Never carries the query itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryViolation {
    #[error("query contains control characters")]
    ControlCharacter,

    #[error("query exceeds {max} characters")]
    TooLong { max: usize },

    #[error("query string could not be parsed")]
    Unparseable,
}

/// Validate a raw search query before it leaves the gateway.
///
/// Control characters (CR/LF included) are rejected outright rather than
/// stripped, so what reaches the backend is exactly what the user typed.
/// An empty query is valid; the backend decides what to do with it.
pub fn sanitize_query(raw: &str, max_chars: usize) -> Result<&str, QueryViolation> {
    if raw.chars().any(char::is_control) {
        return Err(QueryViolation::ControlCharacter);
    }
    if raw.chars().count() > max_chars {
        return Err(QueryViolation::TooLong { max: max_chars });
    }
    Ok(raw)
}
