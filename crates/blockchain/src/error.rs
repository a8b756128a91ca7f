use thiserror::Error;

/// Errors surfaced by the header store and the chain facade.
///
/// *Not found* is never an error: lookups return `Ok(None)`. Anything in
/// here means the store itself misbehaved, which callers treat as fatal.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("failed to decode stored record: {0}")]
    Decode(#[from] alloy_rlp::Error),

    #[error("failed to join on task: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),

    #[error("genesis mismatch: stored {stored}, computed {computed}")]
    GenesisMismatch { stored: cinnabar_types::aliases::B256, computed: cinnabar_types::aliases::B256 },

    #[error("store corrupted: {0}")]
    Corrupt(String),
}
