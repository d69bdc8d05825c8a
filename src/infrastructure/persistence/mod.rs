pub mod database;
pub mod document_repository;

pub use database::Database;
pub use document_repository::SqliteDocumentStore;
