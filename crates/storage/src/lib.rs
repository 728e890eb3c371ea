//! Storage abstraction and implementations for ritual progress.
//!
//! This crate provides a namespaced key-value interface with atomic
//! read-modify-write transactions, an in-memory backend and a JSON file
//! backend, plus the codec that maps [`ritual_core::UserProgress`] onto flat
//! keys.

#![warn(missing_docs)]

pub mod trait_;
pub mod memory;
pub mod json_storage;
pub mod record;

pub use trait_::{
    NamespaceLocks, Result, Storage, StorageError, StorageExt, Transaction, TransactionParts,
};
pub use memory::MemoryStorage;
pub use json_storage::JsonStorage;
pub use record::{keys, load_progress, save_progress};
