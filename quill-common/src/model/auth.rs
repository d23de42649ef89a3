//! Passwords and session tokens.
//!
//! Passwords are stored as argon2 PHC strings. Sessions are stateless: a
//! signed token carrying the user id, valid for a fixed window after
//! issuance. Nothing is stored server side, so a token stays valid until it
//! expires.

use crate::{
    model::{Id, user::UserMarker},
    util::PositiveDuration,
};
use argon2::{
    Argon2, PasswordHasher, PasswordVerifier,
    password_hash::{self, SaltString},
};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind as JwtErrorKind,
};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::debug;

pub const SESSION_COOKIE_NAME: &str = "jwt";
pub const SESSION_VALIDITY: Duration = Duration::days(7);
pub const PASSWORD_SALT_LEN: usize = 16;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
#[error("Hashing password failed: {0}")]
pub struct PasswordHashError(password_hash::Error);

/// An argon2 hash in PHC string format.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct PasswordHash(String);

impl PasswordHash {
    pub fn generate(password: &str) -> Result<Self, PasswordHashError> {
        let salt_bytes: [u8; PASSWORD_SALT_LEN] = rand::random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(PasswordHashError)?;

        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(PasswordHashError)?;

        Ok(Self(hash.to_string()))
    }

    /// Wraps a hash read back from storage.
    #[must_use]
    pub fn from_stored(phc: String) -> Self {
        Self(phc)
    }

    /// Returns `Ok(false)` on a wrong password and an error only when the
    /// stored hash itself is unusable.
    pub fn verify(&self, password: &str) -> Result<bool, PasswordHashError> {
        let parsed = password_hash::PasswordHash::new(&self.0).map_err(PasswordHashError)?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed) {
            Ok(()) => Ok(true),
            Err(password_hash::Error::Password) => Ok(false),
            Err(err) => Err(PasswordHashError(err)),
        }
    }

    #[must_use]
    pub fn as_phc_str(&self) -> &str {
        &self.0
    }
}

impl Debug for PasswordHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PasswordHash").field(&"[redacted]").finish()
    }
}

/// The shared secret sessions are signed with.
#[derive(Clone, Eq, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct SessionSecret(String);

impl SessionSecret {
    #[must_use]
    pub fn new(secret: String) -> Self {
        Self(secret)
    }
}

impl Debug for SessionSecret {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionSecret").field(&"[redacted]").finish()
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub user_id: Id<UserMarker>,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone, Eq, PartialEq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Debug for SessionToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SessionToken").field(&"[redacted]").finish()
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Signing the session token failed: {0}")]
    Encode(jsonwebtoken::errors::Error),
    #[error("The session token has expired")]
    Expired,
    #[error("The session token is invalid: {0}")]
    Invalid(jsonwebtoken::errors::Error),
}

#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    validity: PositiveDuration,
}

impl SessionKeys {
    #[must_use]
    pub fn new(secret: &SessionSecret) -> Self {
        let validity =
            PositiveDuration::new(SESSION_VALIDITY).expect("Session validity is positive.");

        Self::with_validity(secret, validity)
    }

    #[must_use]
    pub fn with_validity(secret: &SessionSecret, validity: PositiveDuration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "iat"]);

        Self {
            encoding: EncodingKey::from_secret(secret.0.as_bytes()),
            decoding: DecodingKey::from_secret(secret.0.as_bytes()),
            validation,
            validity,
        }
    }

    #[must_use]
    pub fn validity(&self) -> PositiveDuration {
        self.validity
    }

    pub fn issue(&self, user_id: Id<UserMarker>) -> Result<SessionToken, SessionError> {
        self.issue_at(user_id, OffsetDateTime::now_utc())
    }

    pub fn issue_at(
        &self,
        user_id: Id<UserMarker>,
        issued_at: OffsetDateTime,
    ) -> Result<SessionToken, SessionError> {
        let claims = SessionClaims {
            user_id,
            iat: issued_at.unix_timestamp(),
            exp: (issued_at + self.validity.get()).unix_timestamp(),
        };
        debug!(%user_id, expires_at = claims.exp, "Issuing session token");

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map(SessionToken)
            .map_err(SessionError::Encode)
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                debug!(error = %err, "Rejected session token");
                match err.kind() {
                    JwtErrorKind::ExpiredSignature => SessionError::Expired,
                    _ => SessionError::Invalid(err),
                }
            })
    }
}

impl Debug for SessionKeys {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("secret", &"[redacted]")
            .field("validity", &self.validity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        model::{
            Id,
            auth::{PasswordHash, SESSION_VALIDITY, SessionError, SessionKeys, SessionSecret},
        },
        util::PositiveDuration,
    };
    use std::{
        io::{self, Write},
        sync::{Arc, Mutex},
    };
    use time::{Duration, OffsetDateTime};

    fn keys(secret: &str) -> SessionKeys {
        SessionKeys::new(&SessionSecret::new(secret.into()))
    }

    #[test]
    fn password_hash_verifies_only_the_original() {
        let hash = PasswordHash::generate("Secr3t!pass").unwrap();

        assert_ne!(hash.as_phc_str(), "Secr3t!pass");
        assert!(hash.as_phc_str().starts_with("$argon2"));
        assert_eq!(hash.verify("Secr3t!pass"), Ok(true));
        assert_eq!(hash.verify("secr3t!pass"), Ok(false));
    }

    #[test]
    fn password_hashes_are_salted() {
        let first = PasswordHash::generate("Secr3t!pass").unwrap();
        let second = PasswordHash::generate("Secr3t!pass").unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn corrupt_stored_hash_is_an_error() {
        let hash = PasswordHash::from_stored("not a phc string".into());

        assert!(hash.verify("anything").is_err());
    }

    #[test]
    fn session_round_trip() {
        let keys = keys("top secret");
        let user_id = Id::generate();
        let issued_at = OffsetDateTime::now_utc();

        let token = keys.issue_at(user_id, issued_at).unwrap();
        let claims = keys.verify(token.as_str()).unwrap();

        assert_eq!(claims.user_id, user_id);
        assert_eq!(claims.iat, issued_at.unix_timestamp());
        assert_eq!(
            claims.exp - claims.iat,
            SESSION_VALIDITY.whole_seconds()
        );
    }

    #[test]
    fn session_from_other_secret_is_rejected() {
        let token = keys("one secret").issue(Id::generate()).unwrap();

        assert!(matches!(
            keys("another secret").verify(token.as_str()),
            Err(SessionError::Invalid(_))
        ));
    }

    #[test]
    fn expired_session_is_rejected() {
        let keys = SessionKeys::with_validity(
            &SessionSecret::new("top secret".into()),
            PositiveDuration::new(Duration::hours(1)).unwrap(),
        );
        let issued_at = OffsetDateTime::now_utc() - Duration::days(1);

        let token = keys.issue_at(Id::generate(), issued_at).unwrap();

        assert!(matches!(
            keys.verify(token.as_str()),
            Err(SessionError::Expired)
        ));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            keys("top secret").verify("not.a.token"),
            Err(SessionError::Invalid(_))
        ));
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn rejected_sessions_are_logged() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        let result = tracing::subscriber::with_default(subscriber, || {
            keys("top secret").verify("not.a.token")
        });

        assert!(result.is_err());
        let logs = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(logs.contains("Rejected session token"));
        assert!(!logs.contains("top secret"));
    }

    #[test]
    fn secrets_are_not_printed() {
        let secret = SessionSecret::new("hunter2".into());
        let hash = PasswordHash::generate("hunter2").unwrap();

        assert!(!format!("{secret:?}").contains("hunter2"));
        assert!(!format!("{:?}", keys("hunter2")).contains("hunter2"));
        assert!(!format!("{hash:?}").contains("argon2"));
    }
}
