//! Durable local store for Quill

mod connection;
mod migrations;
mod operation_repository;
mod post_repository;

pub use connection::Database;
pub use migrations::CURRENT_VERSION;
pub use operation_repository::{LibSqlOperationRepository, OperationRepository};
pub use post_repository::{LibSqlPostRepository, PostRepository};
