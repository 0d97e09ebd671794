//! Storage interfaces and implementations for persisting emitted opportunities.

mod observer;
mod sqlite;

pub use observer::StorageObserver;
pub use sqlite::{SqliteStorage, SqliteStorageConfig};

use crate::domain::Opportunity;
use async_trait::async_trait;

/// OpportunityStorage defines the interface for storing opportunities.
#[async_trait]
pub trait OpportunityStorage: Send + Sync {
    /// Save persists an opportunity to storage.
    /// Returns true if the opportunity was saved (new), false if it repeats a
    /// recent one.
    async fn save(&self, opp: &Opportunity) -> Result<bool, StorageError>;

    /// GetByID retrieves an opportunity by its ID.
    #[allow(dead_code)]
    async fn get_by_id(&self, id: &str) -> Result<Option<Opportunity>, StorageError>;

    /// GetAll retrieves all stored opportunities, newest first.
    #[allow(dead_code)]
    async fn get_all(&self) -> Result<Vec<Opportunity>, StorageError>;

    /// GetBySymbol retrieves opportunities for one base asset, newest first.
    #[allow(dead_code)]
    async fn get_by_symbol(&self, symbol: &str) -> Result<Vec<Opportunity>, StorageError>;

    /// Count returns the total number of stored opportunities.
    async fn count(&self) -> Result<i64, StorageError>;

    /// Close closes the storage connection.
    async fn close(&self) -> Result<(), StorageError>;
}

/// StorageError represents errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
