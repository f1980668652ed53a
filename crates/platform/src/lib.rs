//! Chat-platform client abstraction.
//!
//! The console core never talks to the chat platform directly; it goes
//! through the [`PlatformConnector`] / [`PlatformHandle`] trait pair defined
//! here. The production implementation ([`bridge`]) speaks HTTP to a local
//! bridge process that wraps the vendor client library; [`mock`] provides a
//! scriptable in-memory implementation for tests.

mod error;
mod types;

pub mod bridge;
pub mod mock;

pub use error::{PlatformError, PlatformResult};
pub use types::{
    CookieCredentials, Friend, GroupInfo, OutgoingMessage, PlatformContext, PlatformEvent,
    ThreadKind,
};

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

/// Entry point for establishing an authenticated platform session.
#[async_trait]
pub trait PlatformConnector: Send + Sync {
    /// Begin a QR login. The implementation writes the QR image to `qr_path`
    /// as soon as the platform issues it; the future itself resolves only
    /// once the operator has scanned the code and the platform confirms the
    /// login, so callers race it against their own timeout.
    async fn login_qr(&self, qr_path: &Path) -> PlatformResult<Arc<dyn PlatformHandle>>;

    /// Re-establish a session from persisted cookie credentials.
    async fn login_with_credentials(
        &self,
        credentials: &CookieCredentials,
    ) -> PlatformResult<Arc<dyn PlatformHandle>>;
}

/// An authenticated platform session.
#[async_trait]
pub trait PlatformHandle: Send + Sync {
    /// The account's friend list, in platform order.
    async fn list_friends(&self) -> PlatformResult<Vec<Friend>>;

    /// Ids of every group the account belongs to, in platform order.
    async fn list_group_ids(&self) -> PlatformResult<Vec<String>>;

    /// Resolve metadata for the given group ids.
    async fn group_details(&self, ids: &[String]) -> PlatformResult<Vec<GroupInfo>>;

    /// Deliver one message to one recipient.
    async fn send_message(
        &self,
        message: &OutgoingMessage,
        recipient_id: &str,
        kind: ThreadKind,
    ) -> PlatformResult<()>;

    /// The session's cookie credentials, for persistence.
    async fn context(&self) -> PlatformResult<PlatformContext>;

    /// Start the long-lived event listener. Events arrive on the returned
    /// channel until [`PlatformHandle::stop_listener`] is called or the
    /// handle is dropped.
    async fn start_listener(&self) -> PlatformResult<mpsc::Receiver<PlatformEvent>>;

    /// Stop the event listener, if one is running. Safe to call when no
    /// listener was ever started.
    async fn stop_listener(&self);
}
