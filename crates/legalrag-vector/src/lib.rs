//! LanceDB-backed vector store for embedded chunks.

pub mod schema;
pub mod store;
pub mod table;

pub use store::{content_hash, VectorStore, META_TABLE};
