pub mod actors;
pub mod agent;
pub mod api;
pub mod compiler;
pub mod config;
pub mod core;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod store;

pub use error::{Error, Result};
