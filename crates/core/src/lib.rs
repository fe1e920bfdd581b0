pub mod config;
pub mod error;
pub mod export;
pub mod models;
pub mod naming;
pub mod overlay;
pub mod pipeline;
pub mod sampling;
pub mod session;
pub mod similarity;
pub mod staging;
pub mod video;

pub use crate::config::RunConfig;
pub use crate::error::{Error, Result};
pub use crate::models::*;
