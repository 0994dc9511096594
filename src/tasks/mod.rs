//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Journal flush: syncs the disk cache journal at configured intervals

mod flush;

pub use flush::spawn_flush_task;
