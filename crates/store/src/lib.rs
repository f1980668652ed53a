//! Flat-file JSON persistence for the operator console.
//!
//! Both stores are keyed arrays rewritten wholesale on every mutation.
//! Reads of a missing or unreadable file yield an empty collection; there is
//! no locking, so concurrent writers are last-writer-wins. That is an
//! accepted property of a single-operator tool.

mod error;
mod failed;
mod templates;

pub use error::{StoreError, StoreResult};
pub use failed::{FailedMessageStore, FailedSendRecord};
pub use templates::{AttachmentRef, MessageTemplate, TemplateStore};
