pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod heuristic;
pub mod input;
pub mod normalize;
pub mod property;
pub mod resolve;
pub mod structured;

pub use error::{Result, ScrapeError};
