//! Background Tasks Module
//!
//! Contains background tasks that run alongside a store.
//!
//! # Tasks
//! - Shrink: Runs an eviction pass at a configured interval

mod shrink;

pub use shrink::spawn_shrink_task;
