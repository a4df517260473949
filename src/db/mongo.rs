//! MongoDB client and collection wrapper

use bson::{doc, oid::ObjectId, DateTime, Document};
use futures_util::{Stream, TryStreamExt};
use mongodb::{
    options::{FindOptions, IndexOptions, UpdateModifications},
    results::UpdateResult,
    Client, Collection, IndexModel,
};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Display;
use tracing::{error, info};

use crate::db::schemas::Metadata;
use crate::types::ProfileError;

/// Trait for schemas that provide index definitions
pub trait IntoIndexes {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)>;
}

/// Trait for schemas with mutable metadata
pub trait MutMetadata {
    fn mut_metadata(&mut self) -> &mut Metadata;
}

/// Map a failed write, turning unique-index violations into `Conflict`
fn write_error(op: &str, e: mongodb::error::Error) -> ProfileError {
    let message = e.to_string();
    if message.contains("E11000") || message.contains("duplicate key") {
        return ProfileError::Conflict(format!("{} rejected: duplicate key", op));
    }
    ProfileError::Database(format!("{} failed: {}", op, message))
}

/// Drain a cursor, failing on the first document that cannot be read
pub(crate) async fn collect_documents<T, E, S>(cursor: S) -> Result<Vec<T>, ProfileError>
where
    E: Display,
    S: Stream<Item = Result<T, E>>,
{
    cursor
        .map_err(|e| {
            error!("Error reading document: {}", e);
            ProfileError::Database(format!("Error reading document: {}", e))
        })
        .try_collect()
        .await
}

/// MongoDB client wrapper
#[derive(Clone)]
pub struct MongoClient {
    client: Client,
    db_name: String,
}

impl MongoClient {
    /// Connect and ping the database
    pub async fn new(uri: &str, db_name: &str) -> Result<Self, ProfileError> {
        info!("Connecting to MongoDB at {}", uri);

        // Fail fast when the server is unreachable
        let timeout_uri = if uri.contains('?') {
            format!("{}&serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        } else {
            format!("{}?serverSelectionTimeoutMS=3000&connectTimeoutMS=3000", uri)
        };

        let client = Client::with_uri_str(&timeout_uri)
            .await
            .map_err(|e| ProfileError::Database(format!("Failed to connect to MongoDB: {}", e)))?;

        client
            .database(db_name)
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| ProfileError::Database(format!("MongoDB ping failed: {}", e)))?;

        info!("Connected to MongoDB database '{}'", db_name);

        Ok(Self {
            client,
            db_name: db_name.to_string(),
        })
    }

    /// Get a typed collection, applying its indexes
    pub async fn collection<T>(&self, name: &str) -> Result<MongoCollection<T>, ProfileError>
    where
        T: Serialize + DeserializeOwned + Unpin + Send + Sync + Default + IntoIndexes + MutMetadata,
    {
        MongoCollection::new(&self.client, &self.db_name, name).await
    }

    pub fn db_name(&self) -> &str {
        &self.db_name
    }
}

/// Typed MongoDB collection with soft-delete aware reads
#[derive(Debug, Clone)]
pub struct MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync,
{
    inner: Collection<T>,
}

impl<T> MongoCollection<T>
where
    T: Serialize + DeserializeOwned + Unpin + Send + Sync + Default + IntoIndexes + MutMetadata,
{
    pub async fn new(
        client: &Client,
        db_name: &str,
        collection_name: &str,
    ) -> Result<Self, ProfileError> {
        let collection = client.database(db_name).collection::<T>(collection_name);
        let mongo_collection = MongoCollection { inner: collection };

        mongo_collection.apply_indexes().await?;

        Ok(mongo_collection)
    }

    async fn apply_indexes(&self) -> Result<(), ProfileError> {
        let schema_indices = T::into_indices();

        if schema_indices.is_empty() {
            return Ok(());
        }

        let indices: Vec<IndexModel> = schema_indices
            .into_iter()
            .map(|(keys, opts)| IndexModel::builder().keys(keys).options(opts).build())
            .collect();

        self.inner
            .create_indexes(indices)
            .await
            .map_err(|e| ProfileError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(())
    }

    /// Insert a document, setting metadata timestamps
    pub async fn insert_one(&self, mut item: T) -> Result<ObjectId, ProfileError> {
        item.mut_metadata().stamp_created();

        let result = self
            .inner
            .insert_one(item)
            .await
            .map_err(|e| write_error("Insert", e))?;

        result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| ProfileError::Database("Failed to get inserted ID".into()))
    }

    /// Find one live document by filter
    pub async fn find_one(&self, filter: Document) -> Result<Option<T>, ProfileError> {
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        self.inner
            .find_one(full_filter)
            .await
            .map_err(|e| ProfileError::Database(format!("Find failed: {}", e)))
    }

    /// Find live documents by filter with optional sort/limit
    pub async fn find_many(
        &self,
        filter: Document,
        options: Option<FindOptions>,
    ) -> Result<Vec<T>, ProfileError> {
        let mut full_filter = filter;
        full_filter.insert("metadata.is_deleted", doc! { "$ne": true });

        let cursor = self
            .inner
            .find(full_filter)
            .with_options(options)
            .await
            .map_err(|e| ProfileError::Database(format!("Find failed: {}", e)))?;

        collect_documents(cursor).await
    }

    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
    ) -> Result<UpdateResult, ProfileError> {
        self.inner
            .update_one(filter, update.into())
            .await
            .map_err(|e| write_error("Update", e))
    }

    /// Replace the whole document iff `filter` still matches.
    ///
    /// Returns the number of matched documents (0 or 1). Callers put the
    /// expected version in `filter` to get a compare-and-swap. `item` is
    /// stamped in place, so it matches what was written.
    pub async fn replace_one(&self, filter: Document, item: &mut T) -> Result<u64, ProfileError> {
        item.mut_metadata().updated_at = Some(DateTime::now());

        let result = self
            .inner
            .replace_one(filter, &*item)
            .await
            .map_err(|e| write_error("Replace", e))?;

        Ok(result.matched_count)
    }
}
