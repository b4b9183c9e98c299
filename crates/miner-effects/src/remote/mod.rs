//! Remote document store handlers
//!
//! Both handlers implement `{ merge: true }` writes as a top-level field merge, the
//! behaviour of the document database the engine mirrors into.

mod filesystem;
mod memory;

pub use filesystem::FilesystemDocumentHandler;
pub use memory::MemoryDocumentHandler;

use miner_core::effects::RemoteError;

/// Document paths are `{collection}/{id}`; neither part may contain separators.
pub(crate) fn validate_path(collection: &str, id: &str) -> Result<(), RemoteError> {
    for (label, part) in [("collection", collection), ("id", id)] {
        if part.is_empty() || part.contains('/') || part.contains("..") || part.contains('\0') {
            return Err(RemoteError::Rejected {
                reason: format!("invalid document {label}: '{part}'"),
            });
        }
    }
    Ok(())
}
