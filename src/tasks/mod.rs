//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - TTL Reaper: Reclaims expired cache entries at configured intervals

mod reaper;

pub use reaper::spawn_reaper_task;
