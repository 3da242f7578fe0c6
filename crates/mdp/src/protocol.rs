//! RFC-7 Majordomo Protocol v0.1 frame tags and commands (C1).
//!
//! Frames are opaque byte strings, never parsed textually. A "message" is
//! an ordered list of frames (`Message`).

/// One opaque wire frame.
pub type Frame = Vec<u8>;
/// An ordered list of frames, as sent/received on one ROUTER/DEALER hop.
pub type Message = Vec<Frame>;

/// Protocol-family tag for the client side of MDP.
pub const C_CLIENT: &[u8] = b"MDPC01";
/// Protocol-family tag for the worker side of MDP.
pub const W_WORKER: &[u8] = b"MDPW01";

/// Worker command bytes, as single-byte frames.
pub const W_READY: &[u8] = b"\x01";
pub const W_REQUEST: &[u8] = b"\x02";
pub const W_REPLY: &[u8] = b"\x03";
pub const W_HEARTBEAT: &[u8] = b"\x04";
pub const W_DISCONNECT: &[u8] = b"\x05";

/// Prefix marking a service name as broker-internal (`mmi.*`); such
/// services never reach a worker.
pub const INTERNAL_SERVICE_PREFIX: &[u8] = b"mmi.";

/// Broker-assigned liveness/heartbeat timing, shared by broker and worker.
pub const HEARTBEAT_LIVENESS: u32 = 3;
pub const HEARTBEAT_INTERVAL_MS: u64 = 2500;
pub const HEARTBEAT_EXPIRY_MS: u64 = HEARTBEAT_INTERVAL_MS * HEARTBEAT_LIVENESS as u64;
pub const RECONNECT_DELAY_MS: u64 = 2500;
/// Default client receive timeout (spec.md §4.4).
pub const DEFAULT_CLIENT_TIMEOUT_MS: i64 = 2500;

/// A single worker command byte, decoded from the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerCommand {
    Ready,
    Request,
    Reply,
    Heartbeat,
    Disconnect,
}

impl WorkerCommand {
    pub fn as_frame(&self) -> &'static [u8] {
        match self {
            Self::Ready => W_READY,
            Self::Request => W_REQUEST,
            Self::Reply => W_REPLY,
            Self::Heartbeat => W_HEARTBEAT,
            Self::Disconnect => W_DISCONNECT,
        }
    }

    pub fn from_frame(frame: &[u8]) -> Option<Self> {
        match frame {
            f if f == W_READY => Some(Self::Ready),
            f if f == W_REQUEST => Some(Self::Request),
            f if f == W_REPLY => Some(Self::Reply),
            f if f == W_HEARTBEAT => Some(Self::Heartbeat),
            f if f == W_DISCONNECT => Some(Self::Disconnect),
            _ => None,
        }
    }
}

pub fn is_internal_service(service: &[u8]) -> bool {
    service.starts_with(INTERNAL_SERVICE_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_bytes_round_trip() {
        for cmd in [
            WorkerCommand::Ready,
            WorkerCommand::Request,
            WorkerCommand::Reply,
            WorkerCommand::Heartbeat,
            WorkerCommand::Disconnect,
        ] {
            assert_eq!(WorkerCommand::from_frame(cmd.as_frame()), Some(cmd));
        }
    }

    #[test]
    fn heartbeat_expiry_is_liveness_times_interval() {
        assert_eq!(HEARTBEAT_EXPIRY_MS, 7500);
    }

    #[test]
    fn internal_prefix_detection() {
        assert!(is_internal_service(b"mmi.service"));
        assert!(!is_internal_service(b"curl"));
    }
}
