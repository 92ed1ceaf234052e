//! ClearCase CLI wrapper for git2cc.

pub mod client;
pub mod ledger;
mod saga;

pub use client::ClearCase;
pub use ledger::{CheckoutLedger, CleanupReport};
