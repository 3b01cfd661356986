pub mod batch;
pub mod csv;
pub mod error;
pub mod indexer;
pub mod object_store;
pub mod s3;

pub use batch::BatchStore;
pub use error::{Result, StorageError};
pub use indexer::{HttpIndexer, Indexer, NoopIndexer};
pub use object_store::{MemoryStore, ObjectStore, PutResult};
pub use s3::S3Store;

use sha2::{Digest, Sha256};

/// Hex SHA-256 of arbitrary bytes. Used for content-addressed file names.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
