pub mod clean;
pub mod config;
pub mod error;
pub mod neighbourhood;
pub mod output;
pub mod parser;
pub mod registry;
pub mod stats;

pub use error::{RaterError, Result};
