#![forbid(unsafe_code)]

pub mod local;
pub mod remote;
pub mod repository;
pub mod sqlite;

pub use repository::{
    BackendKind, BlobStore, InMemoryBlobStore, InMemoryProgressBackend, ProgressBackend,
    ProgressMap, Storage, StorageError,
};
