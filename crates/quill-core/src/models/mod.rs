//! Data models for Quill

mod operation;
mod post;

pub use operation::{NewOperation, OperationId, OperationStatus, OperationType, PendingOperation};
pub use post::Post;
