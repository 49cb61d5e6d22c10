use chrono::{serde::ts_seconds, DateTime, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation};
use rocket::{
    http::Status,
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    Request, State,
};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::Error;
use crate::logging::RequestId;
use crate::model::mongodb::Id;
use crate::store::ActorContext;

pub const AUTH_TOKEN_COOKIE: &str = "auth_token";

/// A verified access token for one user.
///
/// Token *issuance* (sign-in, refresh) belongs to the identity provider;
/// this server only verifies tokens signed with its configured secret.
#[derive(Debug, Clone, Copy)]
pub struct AuthToken {
    pub user_id: Id,
}

/// JWT claims: the subject user and an expiry.
#[derive(Serialize, Deserialize)]
struct Claims {
    sub: String,
    #[serde(with = "ts_seconds")]
    exp: DateTime<Utc>,
}

impl AuthToken {
    pub fn new(user_id: Id) -> Self {
        Self { user_id }
    }

    /// Sign this token with the server's secret. Production tokens come from
    /// the identity provider; this exists so tests and tooling can mint
    /// compatible ones.
    pub fn sign(&self, config: &Config) -> String {
        let claims = Claims {
            sub: self.user_id.to_string(),
            exp: Utc::now() + config.auth_ttl(),
        };
        jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(config.jwt_secret()),
        )
        .expect("JWT encoding is infallible with default settings")
    }

    /// Verify a token string and extract the subject user.
    pub fn verify(token: &str, config: &Config) -> Result<Self, Error> {
        let data: TokenData<Claims> = jsonwebtoken::decode(
            token,
            &DecodingKey::from_secret(config.jwt_secret()),
            &Validation::default(),
        )?;
        let user_id = data
            .claims
            .sub
            .parse::<Id>()
            .map_err(|_| Error::Unauthorized("malformed token subject".to_string()))?;
        Ok(Self { user_id })
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthToken {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as `Config` is always managed.
        let config = req.guard::<&State<Config>>().await.unwrap();

        // Accept the token from the auth cookie or a bearer header.
        let token = req
            .cookies()
            .get(AUTH_TOKEN_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .or_else(|| {
                req.headers()
                    .get_one("Authorization")
                    .and_then(|header| header.strip_prefix("Bearer "))
                    .map(str::to_string)
            });

        match token {
            Some(token) => match Self::verify(&token, config) {
                Ok(token) => Outcome::Success(token),
                Err(e) => Outcome::Failure((Status::Unauthorized, e)),
            },
            None => Outcome::Failure((
                Status::Unauthorized,
                Error::Unauthorized("missing access token".to_string()),
            )),
        }
    }
}

/// Build the per-request actor context from the verified token plus the
/// request's log ID, so store-side audit entries can be correlated with the
/// request log.
#[rocket::async_trait]
impl<'r> FromRequest<'r> for ActorContext {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = try_outcome!(req.guard::<AuthToken>().await);
        let request_id = req.local_cache(RequestId::next);
        Outcome::Success(ActorContext {
            user_id: token.user_id,
            request_id: format!("req{request_id}"),
        })
    }
}
