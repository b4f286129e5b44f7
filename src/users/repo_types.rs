use bson::{oid::ObjectId, serde_helpers::serialize_object_id_as_hex_string};
use serde::Serialize;
use time::OffsetDateTime;

/// User record as stored in the `users` collection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    #[serde(serialize_with = "serialize_object_id_as_hex_string")]
    pub id: ObjectId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, never exposed in JSON
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<OffsetDateTime>,
}

/// Fields of a user that is about to be inserted. The store assigns the id.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
}

/// Partial update: only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none() && self.password_hash.is_none()
    }
}

impl User {
    pub fn from_new(id: ObjectId, new: NewUser) -> Self {
        Self {
            id,
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            created_at: new.created_at,
            updated_at: None,
        }
    }

    /// Applies `changes` in place, stamping `updated_at`.
    pub fn apply(&mut self, changes: UserChanges, at: OffsetDateTime) {
        if let Some(name) = changes.name {
            self.name = Some(name);
        }
        if let Some(email) = changes.email {
            self.email = Some(email);
        }
        if let Some(hash) = changes.password_hash {
            self.password_hash = hash;
        }
        self.updated_at = Some(at);
    }
}
