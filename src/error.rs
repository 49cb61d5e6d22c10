use rocket::{http::Status, response::Responder};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can go wrong while servicing a request.
///
/// The five string variants are the business-level failure kinds; the API
/// surface maps each to a distinct HTTP status class, so they must never be
/// collapsed into one another. `Db` covers transient store failures and is
/// the only retryable kind; constraint violations coming back from the store
/// are translated into `Conflict` before they ever reach a handler.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
    #[error(transparent)]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Conflict: {0}")]
    Conflict(String),
}

impl Error {
    /// Shorthand for a `NotFound` describing the given entity.
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, _: &'r rocket::Request<'_>) -> rocket::response::Result<'o> {
        match self {
            Self::Db(_) => error!("{self}"),
            _ => warn!("{self}"),
        }
        Err(match self {
            Self::InvalidArgument(_) => Status::BadRequest,
            Self::NotFound(_) => Status::NotFound,
            Self::Unauthorized(_) => Status::Forbidden,
            Self::InvalidState(_) | Self::Conflict(_) => Status::Conflict,
            Self::Jwt(_) => Status::Unauthorized,
            // Transient store trouble; the caller may retry.
            Self::Db(_) => Status::ServiceUnavailable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rocket::local::blocking::Client;

    #[get("/invalid-state")]
    fn fail_invalid_state() -> Result<()> {
        Err(Error::InvalidState("election is not open".to_string()))
    }

    #[get("/unauthorized")]
    fn fail_unauthorized() -> Result<()> {
        Err(Error::Unauthorized("requires OWNER or ADMIN role".to_string()))
    }

    #[test]
    fn status_mapping() {
        let rocket = rocket::build().mount("/", routes![fail_invalid_state, fail_unauthorized]);
        let client = Client::untracked(rocket).unwrap();
        assert_eq!(
            client.get("/invalid-state").dispatch().status(),
            Status::Conflict
        );
        assert_eq!(
            client.get("/unauthorized").dispatch().status(),
            Status::Forbidden
        );
    }
}
