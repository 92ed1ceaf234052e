//! Git operations for git2cc.

pub mod client;
pub mod view;

pub use client::GitClient;
pub use view::ViewPuller;
