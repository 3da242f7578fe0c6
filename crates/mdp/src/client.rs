//! Client library (C4): fire a single service-addressed request, await one
//! reply with a timeout. Blocking — short-lived, meant to be constructed
//! per request and run on a blocking thread (e.g. `tokio::task::spawn_blocking`).

use crate::error::{BusError, Result};
use crate::protocol::{Message, C_CLIENT, DEFAULT_CLIENT_TIMEOUT_MS};

pub struct Client {
    _ctx: zmq::Context,
    socket: zmq::Socket,
    timeout_ms: i64,
}

impl Client {
    /// Connect to the broker with the default 2.5s receive timeout.
    pub fn connect(broker_endpoint: &str) -> Result<Self> {
        Self::connect_with_timeout(broker_endpoint, DEFAULT_CLIENT_TIMEOUT_MS)
    }

    pub fn connect_with_timeout(broker_endpoint: &str, timeout_ms: i64) -> Result<Self> {
        let ctx = zmq::Context::new();
        let socket = ctx.socket(zmq::DEALER)?;
        socket.set_linger(0)?;
        socket.connect(broker_endpoint)?;
        Ok(Self {
            _ctx: ctx,
            socket,
            timeout_ms,
        })
    }

    /// Send a request to `service`. Reconnection is implicit on
    /// construction; this library never retries automatically.
    pub fn send(&self, service: &str, request: Message) -> Result<()> {
        let mut msg = vec![b"".to_vec(), C_CLIENT.to_vec(), service.as_bytes().to_vec()];
        msg.extend(request);
        self.socket.send_multipart(msg, 0)?;
        Ok(())
    }

    /// Await one reply. Returns `None` on timeout (caller treats as failure).
    pub fn recv(&self) -> Result<Option<Message>> {
        let mut items = [self.socket.as_poll_item(zmq::POLLIN)];
        let ready = zmq::poll(&mut items, self.timeout_ms)?;
        if ready == 0 || !items[0].is_readable() {
            return Ok(None);
        }

        let mut msg = self.socket.recv_multipart(0)?;
        if msg.len() < 3 {
            return Err(BusError::Protocol("short reply from broker".into()));
        }
        let empty = msg.remove(0);
        if !empty.is_empty() {
            return Err(BusError::Protocol("expected empty delimiter".into()));
        }
        let header = msg.remove(0);
        if header != C_CLIENT {
            return Err(BusError::Protocol("expected C_CLIENT header".into()));
        }
        let _service = msg.remove(0);
        Ok(Some(msg))
    }

    /// Send a request and await its reply in one call, the shape the
    /// snapshot-dispatch loop (C8) uses for each short-lived client.
    pub fn request(&self, service: &str, request: Message) -> Result<Option<Message>> {
        self.send(service, request)?;
        self.recv()
    }
}
