use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, DateTime as BsonDateTime, Document},
    error::{ErrorKind, WriteFailure},
    options::{
        ClientOptions, FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument,
    },
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use std::future::Future;
use std::time::Duration;

use super::repository::{AccountRepository, RepositoryError};
use crate::models::{Account, AccountPatch, AccountView, NewAccount};

pub const ACCOUNTS_COLLECTION: &str = "accounts";
pub const LIVE_EMAIL_INDEX: &str = "uniq_live_email";
const DUPLICATE_KEY_CODE: i32 = 11000;

/// Restricts `filter` to live documents. The partial unique index is built
/// from the same predicate.
pub fn live_filter(mut filter: Document) -> Document {
    filter.insert("deleted_at", doc! { "$eq": Bson::Null });
    filter
}

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str, timeout: Duration) -> Result<Self, AppError> {
        let mut options = ClientOptions::parse(uri).await.map_err(|e| {
            tracing::error!("Failed to parse MongoDB connection string: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        options.app_name = Some("account-service".to_string());
        options.server_selection_timeout = Some(timeout);
        options.connect_timeout = Some(timeout);

        let client = MongoClient::with_options(options).map_err(|e| {
            tracing::error!("Failed to create MongoDB client: {}", e);
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for account-service");

        let live_email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(
                IndexOptions::builder()
                    .name(LIVE_EMAIL_INDEX.to_string())
                    .unique(true)
                    .partial_filter_expression(live_filter(doc! {}))
                    .build(),
            )
            .build();

        self.accounts()
            .create_index(live_email_index, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create {} index: {}", LIVE_EMAIL_INDEX, e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;

        tracing::info!("Successfully created all MongoDB indexes");
        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
            })?;
        Ok(())
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }

    pub fn accounts(&self) -> Collection<Account> {
        self.db.collection(ACCOUNTS_COLLECTION)
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY_CODE,
        _ => false,
    }
}

fn classify(op: &'static str, err: mongodb::error::Error) -> RepositoryError {
    if is_duplicate_key(&err) {
        return RepositoryError::DuplicateKey;
    }
    tracing::error!(operation = op, error = %err, "MongoDB operation failed");
    RepositoryError::Backend(err.to_string())
}

fn parse_id(id: &str) -> Result<ObjectId, RepositoryError> {
    ObjectId::parse_str(id).map_err(|_| RepositoryError::NotFound)
}

/// Document-store backend. Each call is bounded by `timeout`; dropping the
/// returned future abandons the driver operation with it.
#[derive(Clone)]
pub struct MongoAccountRepository {
    db: MongoDb,
    timeout: Duration,
}

impl MongoAccountRepository {
    pub fn new(db: MongoDb, timeout: Duration) -> Self {
        Self { db, timeout }
    }
}

/// Runs a driver call under `limit`, mapping an elapsed limit to
/// `RepositoryError::Timeout` and driver errors through `classify`.
pub(crate) async fn bounded<T, F>(
    limit: Duration,
    op: &'static str,
    fut: F,
) -> Result<T, RepositoryError>
where
    F: Future<Output = Result<T, mongodb::error::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(|e| classify(op, e)),
        Err(_) => {
            tracing::warn!(operation = op, timeout = ?limit, "MongoDB operation timed out");
            Err(RepositoryError::Timeout)
        }
    }
}

#[async_trait]
impl AccountRepository for MongoAccountRepository {
    async fn find_all(&self) -> Result<Vec<AccountView>, RepositoryError> {
        let accounts = self.db.accounts();
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();

        let records: Vec<Account> = bounded(self.timeout, "find_all", async {
            let cursor = accounts.find(live_filter(doc! {}), options).await?;
            cursor.try_collect().await
        })
        .await?;

        Ok(records.iter().map(Account::view).collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<AccountView, RepositoryError> {
        let oid = parse_id(id)?;
        bounded(
            self.timeout,
            "find_by_id",
            self.db
                .accounts()
                .find_one(live_filter(doc! { "_id": oid }), None),
        )
        .await?
        .map(|account| account.view())
        .ok_or(RepositoryError::NotFound)
    }

    async fn find_by_email(&self, email: &str) -> Result<Account, RepositoryError> {
        bounded(
            self.timeout,
            "find_by_email",
            self.db
                .accounts()
                .find_one(live_filter(doc! { "email": email }), None),
        )
        .await?
        .ok_or(RepositoryError::NotFound)
    }

    async fn create(&self, account: NewAccount) -> Result<AccountView, RepositoryError> {
        let mut record = Account::from_new(account, Utc::now());

        let result = bounded(
            self.timeout,
            "create",
            self.db.accounts().insert_one(&record, None),
        )
        .await?;

        let oid = result.inserted_id.as_object_id().ok_or_else(|| {
            RepositoryError::Backend("insert returned a non-ObjectId identifier".to_string())
        })?;
        record.id = Some(oid);
        tracing::debug!(account_id = %oid, "Account inserted");
        Ok(record.view())
    }

    async fn update(&self, id: &str, patch: AccountPatch) -> Result<AccountView, RepositoryError> {
        let oid = parse_id(id)?;

        let mut set = doc! { "updated_at": BsonDateTime::from_chrono(Utc::now()) };
        if let Some(name) = &patch.name {
            set.insert("name", name.clone());
        }
        if let Some(email) = &patch.email {
            set.insert("email", email.clone());
        }
        if let Some(credential) = &patch.credential {
            set.insert("credential", credential.clone());
        }

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        bounded(
            self.timeout,
            "update",
            self.db.accounts().find_one_and_update(
                live_filter(doc! { "_id": oid }),
                doc! { "$set": set },
                options,
            ),
        )
        .await?
        .map(|account| account.view())
        .ok_or(RepositoryError::NotFound)
    }

    async fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        let oid = parse_id(id)?;
        let now = BsonDateTime::from_chrono(Utc::now());

        let result = bounded(
            self.timeout,
            "delete",
            self.db.accounts().update_one(
                live_filter(doc! { "_id": oid }),
                doc! { "$set": { "deleted_at": now, "updated_at": now } },
                None,
            ),
        )
        .await?;

        if result.matched_count == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        match tokio::time::timeout(self.timeout, self.db.health_check()).await {
            Ok(result) => result.map_err(|e| RepositoryError::Backend(e.to_string())),
            Err(_) => Err(RepositoryError::Timeout),
        }
    }
}
