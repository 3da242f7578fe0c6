//! Broker (C2): single-threaded ROUTER event loop. Owns all mutable bus
//! state; no locking. Grounded on `original_source/escriba/messaging/broker.py`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use escriba_mdp::error::Result;
use escriba_mdp::protocol::{
    is_internal_service, Frame, Message, WorkerCommand, C_CLIENT, HEARTBEAT_EXPIRY_MS,
    HEARTBEAT_INTERVAL_MS, W_WORKER,
};

type Identity = Frame;

struct ServiceState {
    request_queue: VecDeque<Message>,
    /// Idle workers currently registered to this service, oldest-idle-first.
    waiting: VecDeque<Identity>,
    /// Every worker ever bound to this service that hasn't been deleted,
    /// idle or busy — drives `mmi.service`.
    registered: HashSet<Identity>,
    /// Requests dispatched to a worker but not yet replied to — drives the
    /// in-flight request gauge (spec.md §4.2's "[ADD]" observability note).
    in_flight: usize,
}

impl ServiceState {
    fn new() -> Self {
        Self {
            request_queue: VecDeque::new(),
            waiting: VecDeque::new(),
            registered: HashSet::new(),
            in_flight: 0,
        }
    }
}

struct WorkerState {
    address: Frame,
    expiry: Instant,
    service: Option<Frame>,
}

pub struct Broker {
    socket: zmq::Socket,
    services: HashMap<Frame, ServiceState>,
    workers: HashMap<Identity, WorkerState>,
    /// Broker-wide idle queue, ordered oldest-first — monotone by expiry,
    /// so purge can stop scanning at the first non-expired worker.
    waiting: VecDeque<Identity>,
    heartbeat_at: Instant,
}

impl Broker {
    pub fn new(ctx: &zmq::Context) -> Result<Self> {
        let socket = ctx.socket(zmq::ROUTER)?;
        socket.set_linger(0)?;
        Ok(Self {
            socket,
            services: HashMap::new(),
            workers: HashMap::new(),
            waiting: VecDeque::new(),
            heartbeat_at: Instant::now() + Duration::from_millis(HEARTBEAT_INTERVAL_MS),
        })
    }

    pub fn bind(&self, endpoint: &str) -> Result<()> {
        self.socket.bind(endpoint)?;
        tracing::info!(endpoint, "broker bound");
        Ok(())
    }

    /// Run the event loop forever.
    pub fn run(&mut self) -> Result<()> {
        loop {
            self.mediate()?;
        }
    }

    /// One iteration of the event loop (spec.md §4.2).
    pub fn mediate(&mut self) -> Result<()> {
        let mut items = [self.socket.as_poll_item(zmq::POLLIN)];
        let ready = zmq::poll(&mut items, HEARTBEAT_INTERVAL_MS as i64)?;

        if ready > 0 && items[0].is_readable() {
            let mut msg = self.socket.recv_multipart(0)?;
            if msg.len() < 2 {
                tracing::warn!("dropping short message");
            } else {
                let sender = msg.remove(0);
                let empty = msg.remove(0);
                if !empty.is_empty() {
                    tracing::warn!("dropping message with non-empty delimiter");
                } else if msg.is_empty() {
                    tracing::warn!("dropping message with no protocol-family frame");
                } else {
                    let header = msg.remove(0);
                    if header == C_CLIENT {
                        self.process_client(sender, msg)?;
                    } else if header == W_WORKER {
                        self.process_worker(sender, msg)?;
                    } else {
                        tracing::warn!("dropping message with unknown protocol family");
                    }
                }
            }
        }

        self.purge_workers();

        if Instant::now() >= self.heartbeat_at {
            for identity in self.waiting.clone() {
                if let Some(worker) = self.workers.get(&identity) {
                    let msg = vec![
                        worker.address.clone(),
                        b"".to_vec(),
                        W_WORKER.to_vec(),
                        WorkerCommand::Heartbeat.as_frame().to_vec(),
                    ];
                    self.socket.send_multipart(msg, 0)?;
                }
            }
            self.heartbeat_at = Instant::now() + Duration::from_millis(HEARTBEAT_INTERVAL_MS);
        }

        Ok(())
    }

    fn process_client(&mut self, sender: Frame, mut msg: Message) -> Result<()> {
        if msg.len() < 2 {
            tracing::warn!("dropping malformed client request");
            return Ok(());
        }
        let service = msg.remove(0);
        let mut envelope = vec![sender, b"".to_vec()];
        envelope.extend(msg);

        if is_internal_service(&service) {
            let status: &[u8] = if service == b"mmi.service" {
                let queried = envelope.last().cloned().unwrap_or_default();
                if self.service_has_registered_worker(&queried) {
                    b"200"
                } else {
                    b"404"
                }
            } else {
                b"501"
            };
            let last = envelope.len() - 1;
            envelope[last] = status.to_vec();

            let mut out = envelope[..2].to_vec();
            out.push(C_CLIENT.to_vec());
            out.push(service);
            out.extend_from_slice(&envelope[2..]);
            self.socket.send_multipart(out, 0)?;
        } else {
            self.require_service(service.clone());
            self.dispatch(&service, Some(envelope));
            self.flush_dispatch(&service)?;
        }
        Ok(())
    }

    fn service_has_registered_worker(&self, name: &[u8]) -> bool {
        self.services
            .get(name)
            .map(|s| !s.registered.is_empty())
            .unwrap_or(false)
    }

    fn require_service(&mut self, name: Frame) {
        self.services.entry(name).or_insert_with(ServiceState::new);
    }

    /// Queue `msg` (if any) then pop matching (worker, request) pairs as
    /// long as both sides of the queue are non-empty.
    fn dispatch(&mut self, service_name: &[u8], msg: Option<Message>) {
        if let Some(msg) = msg {
            if let Some(service) = self.services.get_mut(service_name) {
                service.request_queue.push_back(msg);
                metrics::counter!("broker.request.queued", "service" => String::from_utf8_lossy(service_name).into_owned()).increment(1);
            }
        }
    }

    /// Actually send queued requests to idle workers. Split from `dispatch`
    /// because sending needs `&self.socket` while `dispatch` mutates
    /// `self.services` — avoids overlapping borrows.
    fn flush_dispatch(&mut self, service_name: &[u8]) -> Result<()> {
        loop {
            let next = {
                let service = match self.services.get_mut(service_name) {
                    Some(s) => s,
                    None => return Ok(()),
                };
                if service.waiting.is_empty() || service.request_queue.is_empty() {
                    None
                } else {
                    let identity = service.waiting.pop_front().unwrap();
                    let request = service.request_queue.pop_front().unwrap();
                    Some((identity, request))
                }
            };

            let (identity, request) = match next {
                Some(pair) => pair,
                None => return Ok(()),
            };

            self.waiting.retain(|id| id != &identity);

            if let Some(worker) = self.workers.get(&identity) {
                let mut out = vec![
                    worker.address.clone(),
                    b"".to_vec(),
                    W_WORKER.to_vec(),
                    WorkerCommand::Request.as_frame().to_vec(),
                ];
                out.extend(request);
                self.socket.send_multipart(out, 0)?;
                metrics::counter!("broker.request.dispatched", "service" => String::from_utf8_lossy(service_name).into_owned()).increment(1);

                if let Some(service) = self.services.get_mut(service_name) {
                    service.in_flight += 1;
                    metrics::gauge!("broker.service.in_flight", "service" => String::from_utf8_lossy(service_name).into_owned())
                        .set(service.in_flight as f64);
                }
            }
        }
    }

    fn purge_workers(&mut self) {
        let now = Instant::now();
        while let Some(identity) = self.waiting.front().cloned() {
            let expired = self
                .workers
                .get(&identity)
                .map(|w| w.expiry <= now)
                .unwrap_or(true);
            if !expired {
                break;
            }
            tracing::debug!(?identity, "purging expired worker");
            metrics::counter!("broker.worker.expired").increment(1);
            self.waiting.pop_front();
            self.delete_worker(&identity, false);
        }
    }

    fn process_worker(&mut self, sender: Frame, mut msg: Message) -> Result<()> {
        if msg.is_empty() {
            tracing::warn!("dropping empty worker message");
            return Ok(());
        }
        let command_frame = msg.remove(0);
        let identity = sender.clone();
        let worker_ready = self.workers.contains_key(&identity);

        self.workers.entry(identity.clone()).or_insert_with(|| WorkerState {
            address: sender,
            expiry: Instant::now() + Duration::from_millis(HEARTBEAT_EXPIRY_MS),
            service: None,
        });

        match WorkerCommand::from_frame(&command_frame) {
            Some(WorkerCommand::Ready) => {
                if msg.is_empty() {
                    tracing::warn!("READY with no service name");
                    return Ok(());
                }
                let service_name = msg.remove(0);
                if worker_ready || is_internal_service(&service_name) {
                    self.delete_worker(&identity, true);
                } else {
                    self.require_service(service_name.clone());
                    let mut registered_count = 0;
                    if let Some(service) = self.services.get_mut(&service_name) {
                        service.registered.insert(identity.clone());
                        registered_count = service.registered.len();
                    }
                    if let Some(worker) = self.workers.get_mut(&identity) {
                        worker.service = Some(service_name.clone());
                    }
                    metrics::gauge!("broker.service.workers", "service" => String::from_utf8_lossy(&service_name).into_owned())
                        .set(registered_count as f64);
                    self.worker_waiting(&identity)?;
                }
            }
            Some(WorkerCommand::Reply) => {
                if worker_ready {
                    if msg.len() < 2 {
                        tracing::warn!("malformed REPLY");
                        return Ok(());
                    }
                    let client = msg.remove(0);
                    let empty = msg.remove(0);
                    if !empty.is_empty() {
                        tracing::warn!("REPLY missing empty delimiter");
                        return Ok(());
                    }
                    let service_name = self
                        .workers
                        .get(&identity)
                        .and_then(|w| w.service.clone())
                        .unwrap_or_default();
                    let mut out = vec![client, b"".to_vec(), C_CLIENT.to_vec(), service_name.clone()];
                    out.extend(msg);
                    self.socket.send_multipart(out, 0)?;

                    if let Some(service) = self.services.get_mut(&service_name) {
                        service.in_flight = service.in_flight.saturating_sub(1);
                        metrics::gauge!("broker.service.in_flight", "service" => String::from_utf8_lossy(&service_name).into_owned())
                            .set(service.in_flight as f64);
                    }
                    self.worker_waiting(&identity)?;
                } else {
                    self.delete_worker(&identity, true);
                }
            }
            Some(WorkerCommand::Heartbeat) => {
                if worker_ready {
                    if let Some(worker) = self.workers.get_mut(&identity) {
                        worker.expiry = Instant::now() + Duration::from_millis(HEARTBEAT_EXPIRY_MS);
                    }
                } else {
                    self.delete_worker(&identity, true);
                }
            }
            Some(WorkerCommand::Disconnect) => {
                self.delete_worker(&identity, false);
            }
            None => {
                tracing::warn!("invalid command from worker");
            }
        }
        Ok(())
    }

    fn worker_waiting(&mut self, identity: &Identity) -> Result<()> {
        self.waiting.push_back(identity.clone());
        let service_name = self.workers.get(identity).and_then(|w| w.service.clone());
        if let Some(service_name) = &service_name {
            if let Some(service) = self.services.get_mut(service_name) {
                service.waiting.push_back(identity.clone());
            }
        }
        if let Some(worker) = self.workers.get_mut(identity) {
            worker.expiry = Instant::now() + Duration::from_millis(HEARTBEAT_EXPIRY_MS);
        }
        if let Some(service_name) = service_name {
            self.flush_dispatch(&service_name)?;
        }
        Ok(())
    }

    fn delete_worker(&mut self, identity: &Identity, disconnect: bool) {
        if disconnect {
            metrics::counter!("broker.worker.protocol_violation").increment(1);
            if let Some(worker) = self.workers.get(identity) {
                let msg = vec![
                    worker.address.clone(),
                    b"".to_vec(),
                    W_WORKER.to_vec(),
                    WorkerCommand::Disconnect.as_frame().to_vec(),
                ];
                let _ = self.socket.send_multipart(msg, 0);
            }
        }

        if let Some(worker) = self.workers.remove(identity) {
            if let Some(service_name) = worker.service {
                if let Some(service) = self.services.get_mut(&service_name) {
                    service.waiting.retain(|id| id != identity);
                    service.registered.remove(identity);
                    metrics::gauge!("broker.service.workers", "service" => String::from_utf8_lossy(&service_name).into_owned())
                        .set(service.registered.len() as f64);
                }
            }
        }
        self.waiting.retain(|id| id != identity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_state_starts_empty() {
        let s = ServiceState::new();
        assert!(s.waiting.is_empty());
        assert!(s.request_queue.is_empty());
        assert!(s.registered.is_empty());
        assert_eq!(s.in_flight, 0);
    }
}
