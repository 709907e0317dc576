pub mod backtest;
pub mod config;
pub mod data;
pub mod error;
pub mod gateway;
pub mod live;
pub mod metrics;
pub mod models;
pub mod paper;
pub mod risk;
pub mod strategy;
pub mod sweep;
pub mod venue;

#[cfg(test)]
mod test_util;

pub use error::{Error, Result};
pub use models::*;
