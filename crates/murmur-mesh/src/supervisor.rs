// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection supervisor: owns the connection lifecycle state machine.
//!
//! One event-loop task per supervisor: connect, verify the identity
//! handshake, pump frames, watch keepalives, and reconnect with capped
//! exponential backoff. Connection loss is reported as a state transition,
//! never raised as a fatal error -- the bridge keeps attempting reconnection
//! indefinitely until explicitly stopped.

use std::sync::{Mutex, PoisonError};

use futures::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::codec::{Framed, LinesCodec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use murmur_config::model::MeshConfig;
use murmur_core::traits::MeshLink;
use murmur_core::types::{
    ConnectionState, ConnectionStatus, ContextKey, MeshMessage, NodeId, NodeIdentity, SendTarget,
};
use murmur_core::MurmurError;

use crate::backoff::{backoff_delay, with_jitter};
use crate::frames::Frame;
use crate::transport::{LinkConnector, RawLink};

/// Upper bound on one wire line; anything longer is a protocol violation.
const MAX_LINE_BYTES: usize = 16 * 1024;

/// Supervision timings, lifted from the `[mesh]` config section.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub handshake_timeout: std::time::Duration,
    pub keepalive_interval: std::time::Duration,
    pub keepalive_miss_allowance: u32,
    pub degraded_grace: std::time::Duration,
    pub backoff_base: std::time::Duration,
    pub backoff_max: std::time::Duration,
}

impl SupervisorSettings {
    pub fn from_config(cfg: &MeshConfig) -> Self {
        use std::time::Duration;
        Self {
            handshake_timeout: Duration::from_secs(cfg.handshake_timeout_secs),
            keepalive_interval: Duration::from_secs(cfg.keepalive_interval_secs),
            keepalive_miss_allowance: cfg.keepalive_miss_allowance,
            degraded_grace: Duration::from_secs(cfg.degraded_grace_secs),
            backoff_base: Duration::from_secs(cfg.backoff_base_secs),
            backoff_max: Duration::from_secs(cfg.backoff_max_secs),
        }
    }
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self::from_config(&MeshConfig::default())
    }
}

/// Validates connection state transitions.
///
/// Stopping is always allowed; everything else follows the lifecycle graph.
pub fn valid_transition(old: ConnectionState, new: ConnectionState) -> bool {
    use ConnectionState::*;
    if new == Disconnected {
        return true;
    }
    match old {
        Disconnected => matches!(new, Connecting),
        Connecting => matches!(new, Connected | Reconnecting),
        Connected => matches!(new, Degraded | Reconnecting),
        Degraded => matches!(new, Connected | Reconnecting),
        Reconnecting => matches!(new, Connecting),
    }
}

/// One outbound send routed through the event loop, so all writes to the
/// transport are serialized.
struct TxCommand {
    target: SendTarget,
    text: String,
    done: oneshot::Sender<Result<(), MurmurError>>,
}

/// The connection supervisor. Implements [`MeshLink`] for the engine and
/// dispatcher; inbound messages flow out of the receiver returned by
/// [`MeshSupervisor::start`].
pub struct MeshSupervisor {
    status_tx: watch::Sender<ConnectionStatus>,
    identity: Mutex<Option<NodeIdentity>>,
    cmd_tx: mpsc::Sender<TxCommand>,
    cancel: CancellationToken,
}

impl MeshSupervisor {
    /// Starts supervision over the given connector.
    ///
    /// `rng_seed` makes backoff jitter deterministic in tests; pass `None`
    /// in production.
    pub fn start(
        connector: LinkConnector,
        settings: SupervisorSettings,
        rng_seed: Option<u64>,
    ) -> (Arc<Self>, mpsc::Receiver<MeshMessage>) {
        let (status_tx, _) = watch::channel(ConnectionStatus::default());
        let (cmd_tx, cmd_rx) = mpsc::channel(64);
        let (inbound_tx, inbound_rx) = mpsc::channel(256);
        let cancel = CancellationToken::new();

        let supervisor = Arc::new(Self {
            status_tx,
            identity: Mutex::new(None),
            cmd_tx,
            cancel,
        });

        let task_sup = supervisor.clone();
        tokio::spawn(async move {
            run_loop(task_sup, connector, settings, cmd_rx, inbound_tx, rng_seed).await;
        });

        (supervisor, inbound_rx)
    }

    fn set_state(&self, new: ConnectionState, retry_count: u32, last_error: Option<String>) {
        self.status_tx.send_modify(|status| {
            if status.state == new {
                status.retry_count = retry_count;
                if last_error.is_some() {
                    status.last_error = last_error.clone();
                }
                return;
            }
            if !valid_transition(status.state, new) {
                debug!(old = %status.state, new = %new, "rejecting invalid state transition");
                return;
            }
            info!(old = %status.state, new = %new, retry_count, "connection state changed");
            status.state = new;
            status.retry_count = retry_count;
            status.last_error = last_error.clone();
        });
    }

    fn store_identity(&self, identity: NodeIdentity) {
        *self
            .identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(identity);
    }
}

#[async_trait::async_trait]
impl MeshLink for MeshSupervisor {
    async fn send(&self, target: SendTarget, text: &str) -> Result<(), MurmurError> {
        let state = self.status().state;
        if !matches!(
            state,
            ConnectionState::Connected | ConnectionState::Degraded
        ) {
            return Err(MurmurError::transport(format!(
                "cannot send while {state}"
            )));
        }

        let (done, done_rx) = oneshot::channel();
        self.cmd_tx
            .send(TxCommand {
                target,
                text: text.to_string(),
                done,
            })
            .await
            .map_err(|_| MurmurError::transport("supervisor stopped"))?;

        // A dropped responder means the session died mid-send; the frame may
        // or may not have left the radio, so report it as a transport error
        // and let the dispatcher retry.
        done_rx
            .await
            .map_err(|_| MurmurError::transport("send interrupted by reconnect"))?
    }

    fn status(&self) -> ConnectionStatus {
        self.status_tx.borrow().clone()
    }

    fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status_tx.subscribe()
    }

    fn identity(&self) -> Option<NodeIdentity> {
        self.identity
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn stop(&self) {
        self.cancel.cancel();
    }
}

enum SessionEnd {
    /// Explicit stop; no reconnection.
    Stopped,
    /// Connection lost; reconnect after backoff.
    Lost(String),
}

async fn run_loop(
    sup: Arc<MeshSupervisor>,
    connector: LinkConnector,
    settings: SupervisorSettings,
    mut cmd_rx: mpsc::Receiver<TxCommand>,
    inbound_tx: mpsc::Sender<MeshMessage>,
    rng_seed: Option<u64>,
) {
    let mut rng = rng_seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
    let mut retry_count: u32 = 0;

    loop {
        if sup.cancel.is_cancelled() {
            break;
        }
        sup.set_state(ConnectionState::Connecting, retry_count, None);

        match session(
            &sup,
            &connector,
            &settings,
            &mut cmd_rx,
            &inbound_tx,
            &mut retry_count,
        )
        .await
        {
            SessionEnd::Stopped => break,
            SessionEnd::Lost(reason) => {
                retry_count += 1;
                sup.set_state(ConnectionState::Reconnecting, retry_count, Some(reason));

                let delay = with_jitter(
                    backoff_delay(retry_count, settings.backoff_base, settings.backoff_max),
                    &mut rng,
                );
                debug!(retry_count, delay_ms = delay.as_millis() as u64, "reconnect backoff");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = sup.cancel.cancelled() => break,
                }
            }
        }
    }

    sup.set_state(ConnectionState::Disconnected, 0, None);
    debug!("supervisor loop ended");
}

/// Runs one connected session: connect, handshake, pump frames until loss.
async fn session(
    sup: &MeshSupervisor,
    connector: &LinkConnector,
    settings: &SupervisorSettings,
    cmd_rx: &mut mpsc::Receiver<TxCommand>,
    inbound_tx: &mpsc::Sender<MeshMessage>,
    retry_count: &mut u32,
) -> SessionEnd {
    let link = tokio::select! {
        result = (connector)() => match result {
            Ok(link) => link,
            Err(e) => return SessionEnd::Lost(e.to_string()),
        },
        _ = sup.cancel.cancelled() => return SessionEnd::Stopped,
    };

    let mut framed = Framed::new(link, LinesCodec::new_with_max_length(MAX_LINE_BYTES));

    let hello = tokio::select! {
        result = tokio::time::timeout(settings.handshake_timeout, wait_hello(&mut framed)) => result,
        _ = sup.cancel.cancelled() => return SessionEnd::Stopped,
    };
    let identity = match hello {
        Ok(Ok(identity)) => identity,
        Ok(Err(reason)) => return SessionEnd::Lost(reason),
        Err(_) => return SessionEnd::Lost("handshake timed out".into()),
    };

    let own_id = identity.node_id;
    info!(node_id = %own_id, node_name = identity.node_name.as_str(), "mesh handshake complete");
    sup.store_identity(identity);
    *retry_count = 0;
    sup.set_state(ConnectionState::Connected, 0, None);

    // First tick after one full interval, not immediately.
    let mut keepalive = tokio::time::interval_at(
        Instant::now() + settings.keepalive_interval,
        settings.keepalive_interval,
    );
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut missed: u32 = 0;
    let mut degraded_since: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = sup.cancel.cancelled() => return SessionEnd::Stopped,

            frame = framed.next() => {
                let line = match frame {
                    None => return SessionEnd::Lost("connection closed by radio".into()),
                    Some(Err(e)) => return SessionEnd::Lost(format!("read failed: {e}")),
                    Some(Ok(line)) => line,
                };

                // Any traffic proves the link is alive.
                missed = 0;
                if degraded_since.take().is_some() {
                    sup.set_state(ConnectionState::Connected, 0, None);
                }

                match Frame::decode(&line) {
                    Ok(Frame::Ping) => {
                        if let Err(e) = send_frame(&mut framed, &Frame::Pong).await {
                            warn!(error = %e, "pong write failed");
                        }
                    }
                    Ok(Frame::Rx { id, from, from_name, to, channel, text, rssi, snr }) => {
                        if let Some(msg) =
                            normalize_rx(id, from, from_name, to, channel, text, rssi, snr, own_id)
                            && inbound_tx.send(msg).await.is_err()
                        {
                            // Engine gone; nothing left to supervise for.
                            return SessionEnd::Stopped;
                        }
                    }
                    Ok(Frame::Ack { id }) => debug!(id = id.as_str(), "delivery acknowledged"),
                    Ok(Frame::Nak { id, reason }) => {
                        warn!(id = id.as_str(), reason = reason.as_str(), "delivery failed")
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "dropping undecodable frame"),
                }
            }

            _ = keepalive.tick() => {
                if let Some(since) = degraded_since
                    && since.elapsed() >= settings.degraded_grace
                {
                    return SessionEnd::Lost("degraded past grace period".into());
                }
                if missed >= settings.keepalive_miss_allowance && degraded_since.is_none() {
                    warn!(missed, "keepalive lost, marking link degraded");
                    degraded_since = Some(Instant::now());
                    sup.set_state(ConnectionState::Degraded, 0, Some("keepalive missed".into()));
                }
                missed += 1;
                if let Err(e) = send_frame(&mut framed, &Frame::Ping).await {
                    warn!(error = %e, "keepalive write failed");
                    if degraded_since.is_none() {
                        degraded_since = Some(Instant::now());
                        sup.set_state(ConnectionState::Degraded, 0, Some(e.to_string()));
                    }
                }
            }

            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { return SessionEnd::Stopped };
                let frame = match cmd.target {
                    SendTarget::Channel(channel) => Frame::Tx {
                        to: None,
                        channel,
                        text: cmd.text,
                        want_ack: false,
                    },
                    // Direct messages request an ack, broadcasts do not.
                    SendTarget::Node(node) => Frame::Tx {
                        to: Some(node.0),
                        channel: 0,
                        text: cmd.text,
                        want_ack: true,
                    },
                };
                let result = send_frame(&mut framed, &frame).await;
                if let Err(ref e) = result
                    && degraded_since.is_none()
                {
                    degraded_since = Some(Instant::now());
                    sup.set_state(ConnectionState::Degraded, 0, Some(e.to_string()));
                }
                let _ = cmd.done.send(result);
            }
        }
    }
}

/// Waits for the identity handshake, skipping any early frames.
async fn wait_hello(
    framed: &mut Framed<Box<dyn RawLink>, LinesCodec>,
) -> Result<NodeIdentity, String> {
    while let Some(item) = framed.next().await {
        match item {
            Ok(line) => match Frame::decode(&line) {
                Ok(Frame::Hello {
                    node_id,
                    node_name,
                    channels,
                }) => {
                    return Ok(NodeIdentity {
                        node_id: NodeId(node_id),
                        node_name,
                        channels,
                    });
                }
                Ok(other) => debug!(frame = ?other, "ignoring pre-handshake frame"),
                Err(e) => warn!(error = %e, "undecodable pre-handshake line"),
            },
            Err(e) => return Err(format!("read failed during handshake: {e}")),
        }
    }
    Err("connection closed during handshake".into())
}

async fn send_frame(
    framed: &mut Framed<Box<dyn RawLink>, LinesCodec>,
    frame: &Frame,
) -> Result<(), MurmurError> {
    let line = frame.encode()?;
    framed.send(line).await.map_err(|e| MurmurError::Transport {
        message: format!("write failed: {e}"),
        source: Some(Box::new(e)),
    })
}

/// Normalizes an `rx` frame into a [`MeshMessage`], filtering own echoes.
#[allow(clippy::too_many_arguments)]
fn normalize_rx(
    id: Option<String>,
    from: u32,
    from_name: Option<String>,
    to: Option<u32>,
    channel: Option<u8>,
    text: String,
    rssi: Option<i32>,
    snr: Option<f32>,
    own_id: NodeId,
) -> Option<MeshMessage> {
    if from == own_id.0 {
        debug!("ignoring echo of own transmission");
        return None;
    }

    let sender = NodeId(from);
    let is_direct = to == Some(own_id.0);
    let key = if is_direct {
        ContextKey::Direct(sender)
    } else {
        ContextKey::Channel(channel.unwrap_or(0))
    };
    let sender_name = from_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| format!("Node-{sender}"));

    Some(MeshMessage {
        id: id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        key,
        sender,
        sender_name,
        text,
        received_at: Instant::now(),
        is_direct,
        rssi,
        snr,
    })
}
