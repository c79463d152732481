pub mod config;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod read;
pub mod source;
pub mod storage;
pub mod track;
pub mod types;

pub use config::Config;
pub use engine::TrackEngine;
pub use error::{Error, Result};
