//! Session state machine for the operator console.
//!
//! [`SessionStore`] owns the process-wide login state: status, the live
//! platform handle, the login-attempt epoch, and the recipient roster.
//! [`AuthGate`] revalidates persisted cookie credentials on every protected
//! request; [`LoginFlow`] drives the asynchronous QR handshake and the
//! long-lived listener; [`roster`] normalises friends and groups into
//! [`Recipient`] entries.

mod auth_gate;
mod credentials;
mod error;
mod events;
mod login;
pub mod roster;
mod store;

pub use auth_gate::AuthGate;
pub use credentials::{CredentialFile, StoredCredentials};
pub use error::{SessionError, SessionResult};
pub use events::{StatusBroadcaster, StatusEvent};
pub use login::{LoginFlow, LoginOptions, QrLoginStarted};
pub use store::{LoginStatus, Recipient, SessionStore};
