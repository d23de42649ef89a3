pub mod auth;
pub mod form;
pub mod image;
pub mod like;
pub mod post;
pub mod user;

use crate::model::{
    image::InvalidImageUrlError,
    user::{InvalidEmailError, InvalidUserNameError},
};
use derive_where::derive_where;
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData, str::FromStr};
use thiserror::Error;
use uuid::Uuid;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Email(#[from] InvalidEmailError),
    #[error(transparent)]
    UserName(#[from] InvalidUserNameError),
    #[error(transparent)]
    ImageUrl(#[from] InvalidImageUrlError),
}

/// A uuid tagged with the kind of entity it identifies.
#[derive_where(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<Marker>(Uuid, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(uuid: Uuid) -> Self {
        Self(uuid, PhantomData)
    }

    /// Generates a fresh, time-ordered id.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(Uuid::now_v7())
    }

    #[must_use]
    pub fn uuid(self) -> Uuid {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> FromStr for Id<Marker> {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self::new)
    }
}

impl<Marker> From<Uuid> for Id<Marker> {
    fn from(value: Uuid) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<Id<Marker>> for Uuid {
    fn from(value: Id<Marker>) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{Id, post::PostMarker, user::UserMarker};

    #[test]
    fn ids_serialize_as_plain_uuids() {
        let id = Id::<PostMarker>::generate();

        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.uuid()));

        let parsed: Id<PostMarker> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn generated_ids_are_ordered() {
        let first = Id::<UserMarker>::generate();
        let second = Id::<UserMarker>::generate();

        assert!(first < second);
        assert_eq!(first.to_string().parse::<Id<UserMarker>>().unwrap(), first);
    }
}
