//! dupfind - staged duplicate file finder
//!
//! Files of one directory tree, or of two trees compared against each other,
//! are narrowed down in stages: equal size, equal digest of the first bytes,
//! equal digest of the whole content. Confirmed duplicates can be moved out
//! of the tree, keeping one copy in place.

pub mod actions;
pub mod app;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

pub use app::run_app;
