//! Background Tasks Module
//!
//! Contains background tasks that run periodically on behalf of a cache.
//!
//! # Tasks
//! - Expiry sweep: expires cache items at the configured interval

mod expiry;

pub(crate) use expiry::spawn_expiry_task;
