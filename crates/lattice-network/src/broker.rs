//! Broker session state machine.
//!
//! One session per peer, serialized: events arrive one at a time and each
//! produces a list of actions for the driver to execute. The machine
//! moves `HandShaking -> Exchanging -> Closed`; `Closed` is terminal.
//!
//! In `Exchanging` two conversations interleave:
//! - sync: intra-clique peers get our full holdings once; inter-clique
//!   peers run locator/inventory round trips and pull blocks by hash
//! - ping/pong: a ping per tick; a pong still pending at the next tick
//!   closes the session, a pong with an unknown nonce is reported

use crate::{NetworkError, NetworkResult, NetworkSettings, Offense, Payload};
use lattice_types::BrokerInfo;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Duration};
use tracing::{debug, info, warn};

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerState {
    HandShaking,
    Exchanging,
    Closed,
}

/// Input to the state machine.
#[derive(Debug, Clone)]
pub enum BrokerEvent {
    /// A payload arrived from the peer.
    Payload(Payload),
    /// The handshake timer fired.
    HandshakeTimeout,
    /// The ping timer fired.
    PingTick { now: u64 },
}

/// Output of the state machine, executed by the session driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerAction {
    /// Send a payload to the peer.
    Send(Payload),
    /// Report an offense against the peer.
    Report(Offense),
    /// Hand a sync payload to the node's sync layer. The second field
    /// tells the layer whether the peer shares our clique.
    Deliver { payload: Payload, intra_clique: bool },
    /// Kick off the sync conversation with this peer.
    StartSync { intra_clique: bool },
    /// Tear the session down.
    Close,
}

/// The per-peer protocol state machine.
pub struct BrokerHandler {
    local: BrokerInfo,
    state: BrokerState,
    remote: Option<BrokerInfo>,
    next_nonce: u64,
    pending_ping: Option<u64>,
}

impl BrokerHandler {
    /// Create a handler and the opening actions: send `Hello`, arm the
    /// handshake timer (the driver owns the clock).
    pub fn new(local: BrokerInfo) -> (Self, Vec<BrokerAction>) {
        let handler = Self {
            local,
            state: BrokerState::HandShaking,
            remote: None,
            next_nonce: 0,
            pending_ping: None,
        };
        let hello = BrokerAction::Send(Payload::Hello {
            clique_id: local.clique_id,
            broker_info: local,
        });
        (handler, vec![hello])
    }

    pub fn state(&self) -> BrokerState {
        self.state
    }

    pub fn remote(&self) -> Option<&BrokerInfo> {
        self.remote.as_ref()
    }

    /// Whether the connected peer belongs to our clique.
    pub fn is_intra_clique(&self) -> bool {
        self.remote
            .map(|info| info.clique_id == self.local.clique_id)
            .unwrap_or(false)
    }

    /// Feed one event; returns the actions to execute, in order. A
    /// closed session accepts no further events.
    pub fn handle(&mut self, event: BrokerEvent) -> NetworkResult<Vec<BrokerAction>> {
        match self.state {
            BrokerState::Closed => Err(NetworkError::Closed),
            BrokerState::HandShaking => Ok(self.handle_handshaking(event)),
            BrokerState::Exchanging => Ok(self.handle_exchanging(event)),
        }
    }

    fn handle_handshaking(&mut self, event: BrokerEvent) -> Vec<BrokerAction> {
        match event {
            BrokerEvent::Payload(Payload::Hello {
                clique_id: _,
                broker_info,
            }) => {
                self.remote = Some(broker_info);
                self.state = BrokerState::Exchanging;
                info!(
                    intra = self.is_intra_clique(),
                    "handshake complete, exchanging"
                );
                vec![BrokerAction::StartSync {
                    intra_clique: self.is_intra_clique(),
                }]
            }
            BrokerEvent::Payload(payload) => {
                warn!(kind = payload.kind(), "payload before hello");
                self.state = BrokerState::Closed;
                vec![BrokerAction::Report(Offense::Spamming), BrokerAction::Close]
            }
            BrokerEvent::HandshakeTimeout => {
                self.state = BrokerState::Closed;
                vec![
                    BrokerAction::Report(Offense::RequestTimeout),
                    BrokerAction::Close,
                ]
            }
            BrokerEvent::PingTick { .. } => Vec::new(),
        }
    }

    fn handle_exchanging(&mut self, event: BrokerEvent) -> Vec<BrokerAction> {
        match event {
            BrokerEvent::Payload(Payload::Hello { .. }) => {
                // A second hello is protocol abuse.
                self.state = BrokerState::Closed;
                vec![BrokerAction::Report(Offense::Spamming), BrokerAction::Close]
            }
            BrokerEvent::Payload(Payload::Ping { nonce, .. }) => {
                vec![BrokerAction::Send(Payload::Pong { nonce })]
            }
            BrokerEvent::Payload(Payload::Pong { nonce }) => {
                if self.pending_ping == Some(nonce) {
                    self.pending_ping = None;
                    debug!(nonce, "pong matched");
                    Vec::new()
                } else {
                    vec![BrokerAction::Report(Offense::InvalidPingPong)]
                }
            }
            BrokerEvent::Payload(payload) => {
                vec![BrokerAction::Deliver {
                    payload,
                    intra_clique: self.is_intra_clique(),
                }]
            }
            BrokerEvent::PingTick { now } => {
                if self.pending_ping.is_some() {
                    // The previous ping was never answered.
                    self.state = BrokerState::Closed;
                    return vec![
                        BrokerAction::Report(Offense::RequestTimeout),
                        BrokerAction::Close,
                    ];
                }
                self.next_nonce += 1;
                let nonce = self.next_nonce;
                self.pending_ping = Some(nonce);
                vec![BrokerAction::Send(Payload::Ping {
                    nonce,
                    timestamp: now,
                })]
            }
            BrokerEvent::HandshakeTimeout => Vec::new(),
        }
    }
}

/// Channel-driven session: one task per peer, serialized.
pub struct BrokerSession {
    handler: BrokerHandler,
    opening: Vec<BrokerAction>,
    settings: NetworkSettings,
    /// Payloads from the peer.
    inbound: mpsc::Receiver<Payload>,
    /// Payloads to the peer.
    outbound: mpsc::Sender<Payload>,
    /// Offense reports for the misbehavior layer.
    reports: mpsc::Sender<Offense>,
    /// Sync payloads for the node's sync layer, with the intra-clique
    /// flag.
    deliveries: mpsc::Sender<(Payload, bool)>,
    /// Fired once per session when the sync conversation should start.
    sync_starts: mpsc::Sender<bool>,
}

impl BrokerSession {
    pub fn new(
        local: BrokerInfo,
        settings: NetworkSettings,
        inbound: mpsc::Receiver<Payload>,
        outbound: mpsc::Sender<Payload>,
        reports: mpsc::Sender<Offense>,
        deliveries: mpsc::Sender<(Payload, bool)>,
        sync_starts: mpsc::Sender<bool>,
    ) -> Self {
        let (handler, opening) = BrokerHandler::new(local);
        Self {
            handler,
            opening,
            settings,
            inbound,
            outbound,
            reports,
            deliveries,
            sync_starts,
        }
    }

    /// Execute one action; `Ok(false)` means the session closed cleanly.
    /// Losing the peer channel is a transport failure, not a protocol
    /// close.
    async fn execute(&mut self, action: BrokerAction) -> NetworkResult<bool> {
        match action {
            BrokerAction::Send(payload) => {
                if self.outbound.send(payload).await.is_err() {
                    return Err(NetworkError::ChannelDropped);
                }
                Ok(true)
            }
            BrokerAction::Report(offense) => {
                let _ = self.reports.send(offense).await;
                Ok(true)
            }
            BrokerAction::Deliver {
                payload,
                intra_clique,
            } => {
                let _ = self.deliveries.send((payload, intra_clique)).await;
                Ok(true)
            }
            BrokerAction::StartSync { intra_clique } => {
                let _ = self.sync_starts.send(intra_clique).await;
                Ok(true)
            }
            BrokerAction::Close => Ok(false),
        }
    }

    /// Drive the session to its end: `Ok` on a protocol close, `Err`
    /// when the transport vanished underneath it.
    pub async fn run(mut self) -> NetworkResult<()> {
        for action in std::mem::take(&mut self.opening) {
            if !self.execute(action).await? {
                return Ok(());
            }
        }

        let handshake = sleep(Duration::from_millis(self.settings.retry_timeout_ms));
        tokio::pin!(handshake);
        let mut ping = interval(Duration::from_millis(self.settings.ping_frequency_ms));
        // An interval's first tick fires immediately; skip it so the
        // first ping goes out one full period into the exchange.
        ping.tick().await;

        loop {
            let event = tokio::select! {
                _ = &mut handshake, if self.handler.state() == BrokerState::HandShaking => {
                    BrokerEvent::HandshakeTimeout
                }
                _ = ping.tick(), if self.handler.state() == BrokerState::Exchanging => {
                    BrokerEvent::PingTick { now: now_ms() }
                }
                payload = self.inbound.recv() => match payload {
                    Some(payload) => BrokerEvent::Payload(payload),
                    None => return Err(NetworkError::ChannelDropped),
                },
            };

            let actions = match self.handler.handle(event) {
                Ok(actions) => actions,
                Err(NetworkError::Closed) => return Ok(()),
                Err(e) => return Err(e),
            };
            for action in actions {
                if !self.execute(action).await? {
                    return Ok(());
                }
            }
        }
    }
}

fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
