//! Document-store backend (MongoDB-style filters, Extended JSON values)

pub mod codec;
pub mod dialect;

pub use codec::{from_document, to_document};
pub use dialect::{DOCUMENT_ID, DocumentDialect, identifier, like_to_regex};
