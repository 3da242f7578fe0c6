pub mod client;
pub mod error;
pub mod protocol;
pub mod worker;

pub use client::Client;
pub use error::{BusError, Result};
pub use worker::Worker;
