use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Claims carried by every bearer token issued by the authentication
/// collaborator. The core services verify these; they never mint tokens.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub user_id: uuid::Uuid,
    pub role: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

#[derive(Clone)]
pub struct JwtVerifier {
    secret: Vec<u8>,
    issuer: String,
    audience: Option<String>,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<Vec<u8>>, issuer: impl Into<String>, audience: Option<String>) -> Self {
        JwtVerifier {
            secret: secret.into(),
            issuer: issuer.into(),
            audience,
        }
    }

    /// Verifies an HMAC-signed bearer token and returns its claims.
    /// A token failing verification yields `Unauthorized`.
    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.clone()]);
        if let Some(aud) = &self.audience {
            validation.set_audience(&[aud.clone()]);
        } else {
            validation.validate_aud = false;
        }
        let key = DecodingKey::from_secret(&self.secret);
        decode::<Claims>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("invalid token: {e}")))
    }
}

/// Rocket request guard: extracts and verifies the bearer token from the
/// `Authorization` header, failing the route with `Unauthorized` if absent
/// or invalid.
pub struct AuthenticatedUser(pub Claims);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthenticatedUser {
    type Error = AppError;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let verifier = match req.rocket().state::<JwtVerifier>() {
            Some(v) => v,
            None => {
                return Outcome::Error((
                    Status::InternalServerError,
                    AppError::Internal("jwt verifier not configured".to_string()),
                ))
            }
        };
        let token = match req
            .headers()
            .get_one("Authorization")
            .and_then(|h| h.strip_prefix("Bearer "))
        {
            Some(t) => t,
            None => {
                return Outcome::Error((
                    Status::Unauthorized,
                    AppError::Unauthorized("missing bearer token".to_string()),
                ))
            }
        };
        match verifier.verify(token) {
            Ok(claims) => Outcome::Success(AuthenticatedUser(claims)),
            Err(e) => Outcome::Error((Status::Unauthorized, e)),
        }
    }
}

/// Verifies a token presented out-of-band (e.g. the message hub's one-time
/// WebSocket handshake frame rather than an HTTP header).
pub fn verify_handshake_token(verifier: &JwtVerifier, token: &str) -> Result<Claims, AppError> {
    verifier.verify(token)
}
