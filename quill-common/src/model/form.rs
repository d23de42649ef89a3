//! Request bodies and their validation.
//!
//! Every field is optional on the wire so that a missing field is reported
//! with the same message as an empty one instead of a JSON rejection.

use crate::{
    model::{
        image::{ImagePayload, InvalidImagePayloadError},
        user::{Email, UserName},
    },
    util::non_blank,
};
use serde::Deserialize;
use thiserror::Error;

pub const PASSWORD_MIN_LEN: usize = 8;

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum FormError {
    #[error("All fields are required")]
    MissingFields,
    #[error("Invalid email address")]
    InvalidEmail,
    #[error("Invalid username")]
    InvalidUserName,
    #[error("The password you entered is not a strong password")]
    WeakPassword,
    #[error("Passwords did not match")]
    PasswordMismatch,
    #[error("Invalid featured image: {0}")]
    InvalidImage(#[from] InvalidImagePayloadError),
}

/// Lowercase, uppercase, digit and symbol, at least [`PASSWORD_MIN_LEN`] long.
#[must_use]
pub fn is_strong_password(password: &str) -> bool {
    password.chars().count() >= PASSWORD_MIN_LEN
        && password.chars().any(char::is_lowercase)
        && password.chars().any(char::is_uppercase)
        && password.chars().any(|c| c.is_ascii_digit())
        && password
            .chars()
            .any(|c| !c.is_alphanumeric() && !c.is_whitespace())
}

fn present_password(password: Option<String>) -> Option<String> {
    password.filter(|password| !password.trim().is_empty())
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupForm {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub user_name: Option<String>,
    pub password: Option<String>,
    pub confirm_password: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Signup {
    pub email: Email,
    pub full_name: String,
    pub user_name: UserName,
    pub password: String,
}

impl SignupForm {
    /// Checks presence, email shape, password strength and confirmation, in
    /// that order. Uniqueness is left to the caller since it needs storage.
    pub fn validate(self) -> Result<Signup, FormError> {
        let (
            Some(email),
            Some(full_name),
            Some(user_name),
            Some(password),
            Some(confirm_password),
        ) = (
            non_blank(self.email),
            non_blank(self.full_name),
            non_blank(self.user_name),
            present_password(self.password),
            present_password(self.confirm_password),
        )
        else {
            return Err(FormError::MissingFields);
        };

        let email = Email::new(email).map_err(|_| FormError::InvalidEmail)?;

        if !is_strong_password(&password) {
            return Err(FormError::WeakPassword);
        }
        if password != confirm_password {
            return Err(FormError::PasswordMismatch);
        }

        let user_name = UserName::new(user_name).map_err(|_| FormError::InvalidUserName)?;

        Ok(Signup {
            email,
            full_name,
            user_name,
            password,
        })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
pub struct LoginForm {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Login {
    pub email: Email,
    pub password: String,
}

impl LoginForm {
    pub fn validate(self) -> Result<Login, FormError> {
        let (Some(email), Some(password)) = (non_blank(self.email), present_password(self.password))
        else {
            return Err(FormError::MissingFields);
        };

        let email = Email::new(email).map_err(|_| FormError::InvalidEmail)?;

        Ok(Login { email, password })
    }
}

#[derive(Clone, Eq, PartialEq, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostForm {
    pub title: Option<String>,
    pub content: Option<String>,
    pub featured_img: Option<String>,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct NewPost {
    pub title: String,
    pub content: String,
    pub featured_img: Option<ImagePayload>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct PostEdit {
    pub title: Option<String>,
    pub content: Option<String>,
    pub featured_img: Option<ImagePayload>,
}

impl PostForm {
    /// Validation for creating a post: title and content are required.
    pub fn validate_new(self) -> Result<NewPost, FormError> {
        let (Some(title), Some(content)) = (non_blank(self.title), non_blank(self.content)) else {
            return Err(FormError::MissingFields);
        };

        let featured_img = non_blank(self.featured_img)
            .map(ImagePayload::parse)
            .transpose()?;

        Ok(NewPost {
            title,
            content,
            featured_img,
        })
    }

    /// Validation for editing a post: blank or missing fields are kept as they are.
    pub fn validate_edit(self) -> Result<PostEdit, FormError> {
        let featured_img = non_blank(self.featured_img)
            .map(ImagePayload::parse)
            .transpose()?;

        Ok(PostEdit {
            title: non_blank(self.title),
            content: non_blank(self.content),
            featured_img,
        })
    }
}
