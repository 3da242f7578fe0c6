use thiserror::Error;

/// Errors raised by the broker, worker, and client transports.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("zmq error: {0}")]
    Zmq(#[from] zmq::Error),

    #[error("protocol violation: {0}")]
    Protocol(String),

    #[error("request timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, BusError>;
