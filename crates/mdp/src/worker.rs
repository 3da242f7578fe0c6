//! Worker library (C3): binds to a single service, maintains liveness,
//! reconnects on heartbeat loss. Blocking — intended to run on its own OS
//! thread (one per Agent listener), not inside an async runtime.

use std::time::{Duration, Instant};

use crate::error::{BusError, Result};
use crate::protocol::{
    Frame, Message, WorkerCommand, HEARTBEAT_INTERVAL_MS, HEARTBEAT_LIVENESS, RECONNECT_DELAY_MS,
    W_WORKER,
};

pub struct Worker {
    ctx: zmq::Context,
    socket: zmq::Socket,
    broker_endpoint: String,
    service: Frame,
    liveness: u32,
    heartbeat_at: Instant,
    expect_reply: bool,
    reply_to: Option<Frame>,
}

impl Worker {
    /// Connect to `broker_endpoint` and register under `service`.
    pub fn connect(broker_endpoint: &str, service: &str) -> Result<Self> {
        let ctx = zmq::Context::new();
        let socket = ctx.socket(zmq::DEALER)?;
        let mut worker = Self {
            ctx,
            socket,
            broker_endpoint: broker_endpoint.to_string(),
            service: service.as_bytes().to_vec(),
            liveness: HEARTBEAT_LIVENESS,
            heartbeat_at: Instant::now(),
            expect_reply: false,
            reply_to: None,
        };
        worker.reconnect_to_broker()?;
        Ok(worker)
    }

    fn reconnect_to_broker(&mut self) -> Result<()> {
        self.socket = self.ctx.socket(zmq::DEALER)?;
        self.socket.set_linger(0)?;
        self.socket.connect(&self.broker_endpoint)?;
        tracing::debug!(broker = %self.broker_endpoint, "worker connecting to broker");

        self.send_to_broker(WorkerCommand::Ready, Some(self.service.clone()), Vec::new())?;

        self.liveness = HEARTBEAT_LIVENESS;
        self.heartbeat_at = Instant::now() + Duration::from_millis(HEARTBEAT_INTERVAL_MS);
        Ok(())
    }

    fn send_to_broker(
        &mut self,
        command: WorkerCommand,
        option: Option<Frame>,
        mut msg: Message,
    ) -> Result<()> {
        if let Some(option) = option {
            msg.insert(0, option);
        }
        let mut out = vec![b"".to_vec(), W_WORKER.to_vec(), command.as_frame().to_vec()];
        out.append(&mut msg);
        self.socket.send_multipart(out, 0)?;
        Ok(())
    }

    /// Send `reply` (if any — `None` only valid on the first call) and
    /// block for the next request. Returns `None` only when the worker
    /// could not recover a connection to the broker.
    pub fn recv(&mut self, reply: Option<Message>) -> Result<Option<Message>> {
        if reply.is_none() && self.expect_reply {
            return Err(BusError::Protocol(
                "recv(None) is only valid on the first call".into(),
            ));
        }

        if let Some(reply) = reply {
            let reply_to = self
                .reply_to
                .clone()
                .ok_or_else(|| BusError::Protocol("no pending reply_to address".into()))?;
            let mut msg = vec![reply_to, b"".to_vec()];
            msg.extend(reply);
            self.send_to_broker(WorkerCommand::Reply, None, msg)?;
        }

        self.expect_reply = true;

        loop {
            let timeout_ms = HEARTBEAT_INTERVAL_MS as i64;
            let mut items = [self.socket.as_poll_item(zmq::POLLIN)];
            let ready = zmq::poll(&mut items, timeout_ms)?;

            if ready == 0 || !items[0].is_readable() {
                self.liveness -= 1;
                if self.liveness == 0 {
                    tracing::debug!("worker disconnected from broker, retrying");
                    std::thread::sleep(Duration::from_millis(RECONNECT_DELAY_MS));
                    self.reconnect_to_broker()?;
                }
            } else {
                let mut msg = self.socket.recv_multipart(0)?;
                self.liveness = HEARTBEAT_LIVENESS;

                if msg.len() < 3 {
                    return Err(BusError::Protocol("short message from broker".into()));
                }
                let empty = msg.remove(0);
                if !empty.is_empty() {
                    return Err(BusError::Protocol("expected empty delimiter".into()));
                }
                let header = msg.remove(0);
                if header != W_WORKER {
                    return Err(BusError::Protocol("expected W_WORKER header".into()));
                }
                let command_frame = msg.remove(0);
                match WorkerCommand::from_frame(&command_frame) {
                    Some(WorkerCommand::Request) => {
                        if msg.len() < 2 {
                            return Err(BusError::Protocol("malformed REQUEST".into()));
                        }
                        self.reply_to = Some(msg.remove(0));
                        let empty = msg.remove(0);
                        if !empty.is_empty() {
                            return Err(BusError::Protocol("expected empty delimiter".into()));
                        }
                        return Ok(Some(msg));
                    }
                    Some(WorkerCommand::Heartbeat) => {}
                    Some(WorkerCommand::Disconnect) => {
                        self.reconnect_to_broker()?;
                    }
                    _ => {
                        tracing::error!("invalid message from broker");
                    }
                }
            }

            if Instant::now() >= self.heartbeat_at {
                self.send_to_broker(WorkerCommand::Heartbeat, None, Vec::new())?;
                self.heartbeat_at = Instant::now() + Duration::from_millis(HEARTBEAT_INTERVAL_MS);
            }
        }
    }
}
