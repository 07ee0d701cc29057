// src/watch/mod.rs

//! File change detection.
//!
//! This module is responsible for:
//! - Content hashing of file artifacts (`hash`).
//! - Invalidating cached file artifacts whose content changed (`invalidate`).
//! - Rebuilding a target whenever a watched artifact changes (`rebuilder`).

pub mod hash;
pub mod invalidate;
pub mod rebuilder;

pub use hash::{compute_file_hash, hash_str};
pub use invalidate::invalidate_changed_files;
pub use rebuilder::{BuildEvent, DEFAULT_SETTLE_DELAY, WatchRebuilder};
