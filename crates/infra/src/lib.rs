//! Infrastructure layer: job stores, distributed locks, config, and the
//! start pipeline wired on top of them.

pub mod config;
pub mod jobs;
pub mod locks;
