use crate::model::{Id, auth::PasswordHash};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;
use time::OffsetDateTime;

pub const USER_NAME_MAX_LEN: usize = 50;
pub const EMAIL_MAX_LEN: usize = 254;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

/// A user as it is shown to clients. Never carries the password hash.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id<UserMarker>,
    pub email: Email,
    pub user_name: UserName,
    pub full_name: String,
    pub profile_pic: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A user together with the stored password hash, for login only.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct UserCredentials {
    pub user: User,
    pub password_hash: PasswordHash,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateUser {
    pub email: Email,
    pub user_name: UserName,
    pub full_name: String,
    pub password_hash: PasswordHash,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The email address is invalid: {0}")]
pub struct InvalidEmailError(String);

impl Email {
    pub fn new(email: String) -> Result<Self, InvalidEmailError> {
        if is_plausible_email(&email) {
            Ok(Self(email))
        } else {
            Err(InvalidEmailError(email))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

fn is_plausible_email(email: &str) -> bool {
    if email.len() > EMAIL_MAX_LEN || email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && domain
            .split('.')
            .all(|label| !label.is_empty() && !label.starts_with('-') && !label.ends_with('-'))
        && domain.contains('.')
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize)]
#[serde(transparent)]
pub struct UserName(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The user name is invalid: {0}")]
pub struct InvalidUserNameError(String);

impl UserName {
    pub fn new(user_name: String) -> Result<Self, InvalidUserNameError> {
        let len = user_name.chars().count();
        if (1..=USER_NAME_MAX_LEN).contains(&len) && !user_name.chars().any(char::is_whitespace) {
            Ok(Self(user_name))
        } else {
            Err(InvalidUserNameError(user_name))
        }
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Email::new(inner).map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"Email"))
    }
}

impl<'de> Deserialize<'de> for UserName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        UserName::new(inner)
            .map_err(|err| Error::invalid_value(Unexpected::Str(&err.0), &"UserName"))
    }
}

#[cfg(test)]
mod tests {
    use crate::model::user::{Email, USER_NAME_MAX_LEN, UserName};

    #[test]
    fn email_shapes() {
        let legal = ["alice@example.com", "a.b+c@mail.example.org", "x@y.io"];
        let illegal = [
            "",
            "alice",
            "alice@",
            "@example.com",
            "alice@example",
            "alice@@example.com",
            "alice @example.com",
            "alice@example..com",
            "alice@-example.com",
        ];

        for email in legal {
            assert!(Email::new(email.into()).is_ok(), "{email} should be legal");
        }
        for email in illegal {
            assert!(Email::new(email.into()).is_err(), "{email} should be illegal");
        }
    }

    #[test]
    fn user_name_shapes() {
        assert!(UserName::new("alice".into()).is_ok());
        assert!(UserName::new("a".repeat(USER_NAME_MAX_LEN)).is_ok());
        assert!(UserName::new("a".repeat(USER_NAME_MAX_LEN + 1)).is_err());
        assert!(UserName::new(String::new()).is_err());
        assert!(UserName::new("al ice".into()).is_err());
    }

    #[test]
    fn user_name_deserialization_validates() {
        assert!(serde_json::from_str::<UserName>("\"bob\"").is_ok());
        assert!(serde_json::from_str::<UserName>("\"\"").is_err());
    }
}
