pub mod config;
pub mod error;
pub mod ids;
pub mod types;

pub use error::{EscribaError, Result};
pub use ids::*;
