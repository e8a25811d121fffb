//! Command implementations for the zscrape CLI

mod offline;
mod run;

pub use offline::*;
pub use run::*;
