pub mod board;
pub mod config;
pub mod deal;
pub mod derived;
pub mod error;
pub mod gate;
pub mod http;
pub mod io;
pub mod links;
pub mod notion;
pub mod paths;
pub mod pipedrive;
pub mod readiness;
pub mod report;
pub mod stage_map;
pub mod sync;
pub mod types;

pub use error::{Result, SyncError};
