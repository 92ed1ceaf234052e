//! git2cc core library.
//!
//! Mirrors pushes to a Git repository into a ClearCase view: revision
//! queries, push filtering, the `cleartool` element state machine, checkout
//! ledgers and the transactional sync engine.

pub mod clearcase;
pub mod comment;
pub mod config;
pub mod deletion;
pub mod errors;
pub mod git;
pub mod hook;
pub mod labels;
pub mod models;
pub mod path_policy;
pub mod policy;
pub mod process;
pub mod sync_engine;

// Re-exports for convenience.
pub use clearcase::{CheckoutLedger, ClearCase};
pub use config::BridgeConfig;
pub use git::{GitClient, ViewPuller};
pub use hook::{HookHandler, HookMode, HookOutcome, RefUpdate};
pub use policy::SyncPolicy;
pub use process::{CommandRunner, SystemRunner};
pub use sync_engine::{SyncEngine, SyncReport};
