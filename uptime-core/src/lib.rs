pub mod alert;
pub mod buckets;
pub mod checker;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod store;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tracker;

pub use config::Config;
pub use engine::MonitorEngine;
pub use error::{Error, Result};

#[cfg(test)]
mod engine_test;
