//! Durable header storage on top of redb.
//!
//! Two hash-keyed tables (headers, bodies), the canonical number→hash map,
//! per-hash total difficulty, and a small metadata table holding the head
//! pointer and the fork-tip set. All writes that must be visible together
//! go through a single write transaction; readers never observe a partial
//! canonical advance.

use std::{path::Path, sync::Arc};

use alloy_rlp::Decodable;
use cinnabar_types::{
    aliases::{B256, U256},
    header::{Body, Header},
};
use redb::TableDefinition;

use crate::error::StoreError;

const CANONICAL_TABLE: TableDefinition<u64, [u8; 32]> = TableDefinition::new("canonical_hashes");
const HEADERS_TABLE: TableDefinition<[u8; 32], Vec<u8>> = TableDefinition::new("headers");
const BODIES_TABLE: TableDefinition<[u8; 32], Vec<u8>> = TableDefinition::new("bodies");
const DIFFICULTY_TABLE: TableDefinition<[u8; 32], Vec<u8>> =
    TableDefinition::new("total_difficulty");
const METADATA_TABLE: TableDefinition<&str, Vec<u8>> = TableDefinition::new("metadata");

const HEAD_HASH_KEY: &str = "head_hash";
const HEAD_NUMBER_KEY: &str = "head_number";
const FORKS_KEY: &str = "forks";

struct Db {
    db: redb::Database,
}

impl Db {
    fn new(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self { db: redb::Database::create(path)? })
    }

    fn create_tables(&self) -> Result<(), StoreError> {
        let tx = self.db.begin_write()?;

        // Implicitly creates the tables if they do not exist yet
        let _ = tx.open_table(CANONICAL_TABLE)?;
        let _ = tx.open_table(HEADERS_TABLE)?;
        let _ = tx.open_table(BODIES_TABLE)?;
        let _ = tx.open_table(DIFFICULTY_TABLE)?;
        let _ = tx.open_table(METADATA_TABLE)?;

        tx.commit()?;
        Ok(())
    }

    fn write_header(&self, header: &Header) -> Result<(), StoreError> {
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(HEADERS_TABLE)?;
            table.insert(header.hash.0, alloy_rlp::encode(header))?;
        }
        tx.commit()?;
        Ok(())
    }

    fn read_header(&self, hash: B256) -> Result<Option<Header>, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(HEADERS_TABLE)?;
        let Some(raw) = table.get(&hash.0)? else { return Ok(None) };
        let header = Header::decode(&mut raw.value().as_slice())?;
        Ok(Some(header))
    }

    fn write_body(&self, hash: B256, body: &Body) -> Result<(), StoreError> {
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(BODIES_TABLE)?;
            table.insert(hash.0, alloy_rlp::encode(body))?;
        }
        tx.commit()?;
        Ok(())
    }

    fn read_body(&self, hash: B256) -> Result<Option<Body>, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(BODIES_TABLE)?;
        let Some(raw) = table.get(&hash.0)? else { return Ok(None) };
        let body = Body::decode(&mut raw.value().as_slice())?;
        Ok(Some(body))
    }

    fn read_canonical_hash(&self, number: u64) -> Result<Option<B256>, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(CANONICAL_TABLE)?;
        Ok(table.get(&number)?.map(|raw| B256::from(raw.value())))
    }

    fn read_head_hash(&self) -> Result<Option<B256>, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(METADATA_TABLE)?;
        let Some(raw) = table.get(HEAD_HASH_KEY)? else { return Ok(None) };
        decode_hash(&raw.value()).map(Some)
    }

    fn read_head_number(&self) -> Result<Option<u64>, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(METADATA_TABLE)?;
        let Some(raw) = table.get(HEAD_NUMBER_KEY)? else { return Ok(None) };
        let value = raw.value();
        let bytes: [u8; 8] = value
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Corrupt("head number is not 8 bytes".into()))?;
        Ok(Some(u64::from_be_bytes(bytes)))
    }

    fn read_total_difficulty(&self, hash: B256) -> Result<Option<U256>, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(DIFFICULTY_TABLE)?;
        Ok(table.get(&hash.0)?.map(|raw| U256::from_be_slice(&raw.value())))
    }

    fn write_forks(&self, forks: &[B256]) -> Result<(), StoreError> {
        let tx = self.db.begin_write()?;
        {
            let mut table = tx.open_table(METADATA_TABLE)?;
            table.insert(FORKS_KEY, encode_forks(forks))?;
        }
        tx.commit()?;
        Ok(())
    }

    fn read_forks(&self) -> Result<Vec<B256>, StoreError> {
        let tx = self.db.begin_read()?;
        let table = tx.open_table(METADATA_TABLE)?;
        let Some(raw) = table.get(FORKS_KEY)? else { return Ok(Vec::new()) };
        decode_forks(&raw.value())
    }

    /// Persists the header and advances the canonical pointers in one
    /// transaction. On failure nothing is visible to readers.
    fn write_canonical_header(&self, header: &Header, td: U256) -> Result<(), StoreError> {
        let tx = self.db.begin_write()?;
        {
            let mut headers = tx.open_table(HEADERS_TABLE)?;
            headers.insert(header.hash.0, alloy_rlp::encode(header))?;

            let mut canonical = tx.open_table(CANONICAL_TABLE)?;
            canonical.insert(header.number, header.hash.0)?;

            let mut difficulty = tx.open_table(DIFFICULTY_TABLE)?;
            difficulty.insert(header.hash.0, td.to_be_bytes_vec())?;

            let mut metadata = tx.open_table(METADATA_TABLE)?;
            metadata.insert(HEAD_HASH_KEY, header.hash.0.to_vec())?;
            metadata.insert(HEAD_NUMBER_KEY, header.number.to_be_bytes().to_vec())?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Full block insert: header, body, total difficulty, canonical
    /// mapping, head pointer and the fork-tip set, atomically.
    fn write_block(
        &self,
        header: &Header,
        body: &Body,
        td: U256,
        forks: &[B256],
    ) -> Result<(), StoreError> {
        let tx = self.db.begin_write()?;
        {
            let mut headers = tx.open_table(HEADERS_TABLE)?;
            headers.insert(header.hash.0, alloy_rlp::encode(header))?;

            let mut bodies = tx.open_table(BODIES_TABLE)?;
            bodies.insert(header.hash.0, alloy_rlp::encode(body))?;

            let mut difficulty = tx.open_table(DIFFICULTY_TABLE)?;
            difficulty.insert(header.hash.0, td.to_be_bytes_vec())?;

            let mut canonical = tx.open_table(CANONICAL_TABLE)?;
            canonical.insert(header.number, header.hash.0)?;

            let mut metadata = tx.open_table(METADATA_TABLE)?;
            metadata.insert(HEAD_HASH_KEY, header.hash.0.to_vec())?;
            metadata.insert(HEAD_NUMBER_KEY, header.number.to_be_bytes().to_vec())?;
            metadata.insert(FORKS_KEY, encode_forks(forks))?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn encode_forks(forks: &[B256]) -> Vec<u8> {
    let mut out = Vec::with_capacity(forks.len() * 32);
    for hash in forks {
        out.extend_from_slice(hash.as_slice());
    }
    out
}

fn decode_forks(raw: &[u8]) -> Result<Vec<B256>, StoreError> {
    if raw.len() % 32 != 0 {
        return Err(StoreError::Corrupt("fork set is not a multiple of 32 bytes".into()));
    }
    Ok(raw.chunks_exact(32).map(B256::from_slice).collect())
}

fn decode_hash(raw: &[u8]) -> Result<B256, StoreError> {
    if raw.len() != 32 {
        return Err(StoreError::Corrupt("stored hash is not 32 bytes".into()));
    }
    Ok(B256::from_slice(raw))
}

/// Cloneable async handle over the database. Reads may run concurrently;
/// redb serializes writers internally.
#[derive(Clone)]
pub struct Storage {
    db: Arc<Db>,
}

impl Storage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Db::new(path)?;
        db.create_tables()?;

        Ok(Self { db: Arc::new(db) })
    }

    pub async fn write_header(&self, header: Header) -> Result<(), StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.write_header(&header)).await?
    }

    pub async fn read_header(&self, hash: B256) -> Result<Option<Header>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.read_header(hash)).await?
    }

    pub async fn write_body(&self, hash: B256, body: Body) -> Result<(), StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.write_body(hash, &body)).await?
    }

    pub async fn read_body(&self, hash: B256) -> Result<Option<Body>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.read_body(hash)).await?
    }

    pub async fn read_canonical_hash(&self, number: u64) -> Result<Option<B256>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.read_canonical_hash(number)).await?
    }

    pub async fn read_head_hash(&self) -> Result<Option<B256>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.read_head_hash()).await?
    }

    pub async fn read_head_number(&self) -> Result<Option<u64>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.read_head_number()).await?
    }

    pub async fn read_total_difficulty(&self, hash: B256) -> Result<Option<U256>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.read_total_difficulty(hash)).await?
    }

    pub async fn write_forks(&self, forks: Vec<B256>) -> Result<(), StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.write_forks(&forks)).await?
    }

    pub async fn read_forks(&self) -> Result<Vec<B256>, StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.read_forks()).await?
    }

    pub async fn write_canonical_header(&self, header: Header, td: U256) -> Result<(), StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.write_canonical_header(&header, td)).await?
    }

    pub async fn write_block(
        &self,
        header: Header,
        body: Body,
        td: U256,
        forks: Vec<B256>,
    ) -> Result<(), StoreError> {
        let db = Arc::clone(&self.db);
        tokio::task::spawn_blocking(move || db.write_block(&header, &body, td, &forks)).await?
    }
}
