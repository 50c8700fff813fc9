//! Vault module: the transactional lifecycle around one archive.
//!
//! This module provides:
//! - Credential record types (`credential`)
//! - CRUD over the records of an open workspace (`store`)
//! - The per-archive advisory lock (`lock`)
//! - The unpacked working copy of an archive (`workspace`)
//! - Open / commit / abort of a session (`session`)
//! - Creation of a new vault (`init`)

pub mod credential;
pub mod init;
pub mod lock;
pub mod session;
pub mod store;
pub mod workspace;

// Re-export the most commonly used items.
pub use credential::{Credential, CredentialChanges, NewCredential};
pub use init::{init, InitOptions};
pub use lock::ArchiveLock;
pub use session::{with_session, CloseOutcome, Session};
pub use store::CredentialStore;
pub use workspace::Workspace;
