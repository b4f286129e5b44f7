use async_trait::async_trait;
use bson::{doc, oid::ObjectId, Bson, DateTime, Document};
use futures::TryStreamExt;
use mongodb::{options::ClientOptions, Client, Collection};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::{
    config::MongoConfig,
    users::repo_types::{NewUser, User, UserChanges},
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database: {0}")]
    Database(#[from] mongodb::error::Error),
    #[error("malformed user document: {0}")]
    Malformed(String),
}

/// Access to the user collection. Handlers only see this trait.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts `user` under a freshly generated id and returns that id.
    async fn create(&self, user: NewUser) -> Result<ObjectId, StoreError>;
    /// All users in store order.
    async fn list_all(&self) -> Result<Vec<User>, StoreError>;
    /// Merges `changes` into the user with `id`. Returns the matched count.
    async fn update_by_id(&self, id: ObjectId, changes: UserChanges) -> Result<u64, StoreError>;
    /// Removes the user with `id`. Returns the deleted count.
    async fn delete_by_id(&self, id: ObjectId) -> Result<u64, StoreError>;
    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub struct MongoUserStore {
    client: Client,
    database: String,
    users: Collection<Document>,
}

impl MongoUserStore {
    pub async fn connect(cfg: &MongoConfig) -> Result<Self, StoreError> {
        let mut options = ClientOptions::parse(&cfg.uri).await?;
        options.app_name = Some(env!("CARGO_PKG_NAME").into());
        let client = Client::with_options(options)?;
        let users = client
            .database(&cfg.database)
            .collection::<Document>(&cfg.collection);
        Ok(Self {
            client,
            database: cfg.database.clone(),
            users,
        })
    }
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn create(&self, user: NewUser) -> Result<ObjectId, StoreError> {
        let id = ObjectId::new();
        self.users.insert_one(new_user_document(id, &user), None).await?;
        debug!(user_id = %id, "user document inserted");
        Ok(id)
    }

    async fn list_all(&self) -> Result<Vec<User>, StoreError> {
        let docs: Vec<Document> = self.users.find(doc! {}, None).await?.try_collect().await?;
        docs.into_iter().map(user_from_document).collect()
    }

    async fn update_by_id(&self, id: ObjectId, changes: UserChanges) -> Result<u64, StoreError> {
        let update = doc! { "$set": changes_document(&changes, OffsetDateTime::now_utc()) };
        let res = self
            .users
            .update_one(doc! { "_id": id }, update, None)
            .await?;
        debug!(user_id = %id, matched = res.matched_count, "user document updated");
        Ok(res.matched_count)
    }

    async fn delete_by_id(&self, id: ObjectId) -> Result<u64, StoreError> {
        let res = self.users.delete_one(doc! { "_id": id }, None).await?;
        debug!(user_id = %id, deleted = res.deleted_count, "user document deleted");
        Ok(res.deleted_count)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.client
            .database(&self.database)
            .run_command(doc! { "ping": 1 }, None)
            .await?;
        Ok(())
    }
}

fn new_user_document(id: ObjectId, user: &NewUser) -> Document {
    let mut d = doc! {
        "_id": id,
        "password": user.password_hash.as_str(),
        "created_at": DateTime::from_time_0_3(user.created_at),
    };
    if let Some(name) = &user.name {
        d.insert("name", name.as_str());
    }
    if let Some(email) = &user.email {
        d.insert("email", email.as_str());
    }
    d
}

fn changes_document(changes: &UserChanges, at: OffsetDateTime) -> Document {
    let mut set = doc! { "updated_at": DateTime::from_time_0_3(at) };
    if let Some(name) = &changes.name {
        set.insert("name", name.as_str());
    }
    if let Some(email) = &changes.email {
        set.insert("email", email.as_str());
    }
    if let Some(hash) = &changes.password_hash {
        set.insert("password", hash.as_str());
    }
    set
}

fn user_from_document(d: Document) -> Result<User, StoreError> {
    let id = d
        .get_object_id("_id")
        .map_err(|e| StoreError::Malformed(format!("_id: {e}")))?;
    let password_hash = d
        .get_str("password")
        .map_err(|e| StoreError::Malformed(format!("{id}: password: {e}")))?
        .to_owned();
    let created_at = d
        .get_datetime("created_at")
        .map_err(|e| StoreError::Malformed(format!("{id}: created_at: {e}")))?
        .to_time_0_3();
    let updated_at = match d.get("updated_at") {
        None | Some(Bson::Null) => None,
        Some(Bson::DateTime(at)) => Some(at.to_time_0_3()),
        Some(other) => {
            return Err(StoreError::Malformed(format!(
                "{id}: updated_at has type {:?}",
                other.element_type()
            )))
        }
    };
    Ok(User {
        id,
        name: optional_str(&d, "name", id)?,
        email: optional_str(&d, "email", id)?,
        password_hash,
        created_at,
        updated_at,
    })
}

fn optional_str(d: &Document, key: &str, id: ObjectId) -> Result<Option<String>, StoreError> {
    match d.get(key) {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::String(s)) if s.is_empty() => Ok(None),
        Some(Bson::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(StoreError::Malformed(format!(
            "{id}: {key} has type {:?}",
            other.element_type()
        ))),
    }
}
