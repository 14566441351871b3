//! Link rewriting for documents copied into the public bucket.
//!
//! Everything here is pure: a document body goes in and a new body comes out.

mod document;
mod rewrite;

pub use document::{Document, DocumentError, Node};
pub use rewrite::{rewrite_application, rewrite_conversation, RewriteMapping, METADATA_PREFIX};
