// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The message orchestration engine.
//!
//! The [`Engine`] is the central coordinator that:
//! - Receives normalized messages from the connection supervisor
//! - Journals and records them into the context store
//! - Answers utility commands deterministically
//! - Runs the triage policy and schedules cancellable reply jobs
//! - Dispatches generated replies through the per-target dispatcher
//! - Serves the control surface (force/status/persona/provider/channel)

pub mod commands;
pub mod control;
pub mod providers;
pub mod reply_filter;
pub mod shutdown;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use murmur_config::model::MurmurConfig;
use murmur_context::ContextStore;
use murmur_core::prompts;
use murmur_core::types::{ContextKey, Decision, JournalEntry, MeshMessage, NodeId, Role};
use murmur_core::{Journal, MeshLink, MurmurError, SendTarget};
use murmur_dispatch::Dispatcher;
use murmur_triage::{ReplyScheduler, TriagePolicy};

use crate::control::{EngineCommand, EngineStatus};
pub use crate::control::EngineHandle;
pub use crate::providers::ProviderRegistry;
pub use crate::shutdown::install_signal_handler;

/// Engine identity and initial runtime state, lifted from config.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub bridge_name: String,
    pub active_channel: u8,
    pub persona: String,
}

impl EngineSettings {
    pub fn from_config(cfg: &MurmurConfig) -> Self {
        Self {
            bridge_name: cfg.bridge.name.clone(),
            active_channel: cfg.bridge.active_channel,
            persona: cfg.gateway.persona.clone(),
        }
    }
}

/// State shared between the engine loop and its spawned reply jobs.
struct EngineShared {
    link: Arc<dyn MeshLink>,
    store: Arc<ContextStore>,
    policy: Arc<TriagePolicy>,
    scheduler: Arc<ReplyScheduler>,
    dispatcher: Arc<Dispatcher>,
    journal: Option<Arc<dyn Journal>>,
    providers: Arc<ProviderRegistry>,
    persona: RwLock<String>,
    active_channel: AtomicU8,
    bridge_name: String,
}

/// The message orchestration engine.
pub struct Engine {
    shared: Arc<EngineShared>,
    inbound: mpsc::Receiver<MeshMessage>,
    control_rx: mpsc::Receiver<EngineCommand>,
    // Keeps the control channel open even when every front-end handle is
    // dropped, so the select loop never sees a closed receiver.
    _handle: EngineHandle,
    cancel: CancellationToken,
}

impl Engine {
    /// Wires up the engine. The returned handle is the control surface.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        link: Arc<dyn MeshLink>,
        inbound: mpsc::Receiver<MeshMessage>,
        store: Arc<ContextStore>,
        policy: Arc<TriagePolicy>,
        scheduler: Arc<ReplyScheduler>,
        dispatcher: Arc<Dispatcher>,
        journal: Option<Arc<dyn Journal>>,
        providers: Arc<ProviderRegistry>,
        settings: EngineSettings,
        cancel: CancellationToken,
    ) -> (Self, EngineHandle) {
        let (control_tx, control_rx) = mpsc::channel(32);
        let handle = EngineHandle::new(control_tx);

        let shared = Arc::new(EngineShared {
            link,
            store,
            policy,
            scheduler,
            dispatcher,
            journal,
            providers,
            persona: RwLock::new(settings.persona),
            active_channel: AtomicU8::new(settings.active_channel),
            bridge_name: settings.bridge_name,
        });

        let engine = Self {
            shared,
            inbound,
            control_rx,
            _handle: handle.clone(),
            cancel,
        };
        (engine, handle)
    }

    /// Runs the engine until cancellation or transport shutdown.
    ///
    /// On exit, all pending replies and in-flight generation are cancelled
    /// before the transport connection is released.
    pub async fn run(mut self) -> Result<(), MurmurError> {
        info!(bridge = self.shared.bridge_name.as_str(), "engine running");

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("shutdown requested, stopping engine");
                    break;
                }
                msg = self.inbound.recv() => match msg {
                    Some(msg) => handle_inbound(&self.shared, msg).await,
                    None => {
                        warn!("inbound stream ended, stopping engine");
                        break;
                    }
                },
                cmd = self.control_rx.recv() => {
                    if let Some(cmd) = cmd {
                        handle_command(&self.shared, cmd).await;
                    }
                }
            }
        }

        self.shared.scheduler.cancel_all().await;
        self.shared.link.stop().await;
        info!("engine stopped");
        Ok(())
    }
}

/// Processes one inbound mesh message end to end.
async fn handle_inbound(shared: &Arc<EngineShared>, msg: MeshMessage) {
    debug!(
        key = %msg.key,
        sender = %msg.sender_name,
        direct = msg.is_direct,
        "inbound message"
    );

    journal_record(
        shared,
        msg.key,
        Role::User,
        Some(msg.sender),
        Some(&msg.sender_name),
        &msg.text,
    )
    .await;
    shared.store.record_inbound(&msg).await;

    // Utility commands are answered deterministically, without the AI and
    // without touching cooldowns.
    let identity = shared.link.identity();
    if let Some(reply) = commands::utility_reply(&shared.bridge_name, identity.as_ref(), &msg) {
        info!(key = %msg.key, "answering utility command");
        if let Err(e) = shared.dispatcher.enqueue(SendTarget::from(msg.key), &reply).await {
            warn!(key = %msg.key, error = %e, "failed to queue utility reply");
            return;
        }
        journal_record(shared, msg.key, Role::Assistant, None, None, &reply).await;
        return;
    }

    let active_channel = shared.active_channel.load(Ordering::Relaxed);
    let provider = shared.providers.current().await;
    let persona = shared.persona.read().await.clone();

    let decision = shared
        .policy
        .decide(&msg, active_channel, &shared.store, provider.as_ref(), &persona)
        .await;

    match decision {
        Decision::Skip(reason) => {
            debug!(key = %msg.key, reason = %reason, "not replying");
        }
        Decision::RespondAfter(delay) => {
            info!(
                key = %msg.key,
                delay_ms = delay.as_millis() as u64,
                "reply approved and scheduled"
            );
            let key = msg.key;
            let job_shared = shared.clone();
            shared
                .scheduler
                .schedule(key, delay, move |token| reply_job(job_shared, msg, token))
                .await;
        }
    }
}

/// One scheduled reply: generate, filter, dispatch.
///
/// Cancellation is re-checked immediately before the generation call and
/// immediately before the send, so a superseded or stopped reply leaves no
/// side effects.
async fn reply_job(shared: Arc<EngineShared>, msg: MeshMessage, token: CancellationToken) {
    if token.is_cancelled() {
        return;
    }

    let provider = shared.providers.current().await;
    let persona = shared.persona.read().await.clone();

    // Best-effort compaction before assembling the window.
    shared.store.compact_if_needed(msg.key, provider.as_ref()).await;
    let window = shared.store.get_window(msg.key).await;

    let generated = tokio::select! {
        _ = token.cancelled() => {
            debug!(key = %msg.key, "reply cancelled during generation");
            return;
        }
        result = provider.generate_reply(&persona, &window, &msg) => result,
    };

    let reply = match generated {
        Ok(text) => text,
        Err(e) => {
            warn!(key = %msg.key, error = %e, "generation failed, skipping reply");
            return;
        }
    };

    if reply_filter::is_non_answer(&reply, msg.is_direct) {
        info!(key = %msg.key, "suppressing non-answer from provider");
        return;
    }

    if token.is_cancelled() {
        return;
    }

    if let Err(e) = shared.dispatcher.enqueue(SendTarget::from(msg.key), &reply).await {
        warn!(key = %msg.key, error = %e, "failed to queue reply");
        return;
    }

    shared.store.record_reply(msg.key, &reply).await;
    shared.store.mark_responded(msg.key, Instant::now()).await;
    journal_record(&shared, msg.key, Role::Assistant, None, None, &reply).await;
    info!(key = %msg.key, chars = reply.len(), "reply dispatched");
}

/// Serves one control-surface command.
async fn handle_command(shared: &Arc<EngineShared>, cmd: EngineCommand) {
    match cmd {
        EngineCommand::ForceResponse { key, done } => {
            info!(key = %key, "forced response requested");
            let msg = forced_prompt(key, shared.link.identity().map(|i| i.node_id));
            let job_shared = shared.clone();
            shared
                .scheduler
                .schedule(key, std::time::Duration::ZERO, move |token| {
                    reply_job(job_shared, msg, token)
                })
                .await;
            let _ = done.send(());
        }
        EngineCommand::SetActiveChannel { idx } => {
            info!(channel = idx, "active channel changed");
            shared.active_channel.store(idx, Ordering::Relaxed);
        }
        EngineCommand::SetPersona { persona } => {
            info!(chars = persona.len(), "persona updated");
            *shared.persona.write().await = persona;
        }
        EngineCommand::SetProvider { name, done } => {
            let _ = done.send(shared.providers.select(&name).await);
        }
        EngineCommand::GetStatus { done } => {
            let persona = shared.persona.read().await.clone();
            let status = EngineStatus {
                connection: shared.link.status(),
                identity: shared.link.identity(),
                active_channel: shared.active_channel.load(Ordering::Relaxed),
                provider: shared.providers.current_name().await,
                persona_preview: prompts::truncate_chars(&persona, 100),
                credential_warning: shared.providers.credential_warning(),
                dropped_sends: shared.dispatcher.dropped_sends(),
                pending_replies: shared.scheduler.pending_count().await,
                cooldowns: shared.store.cooldowns().await,
            };
            let _ = done.send(status);
        }
    }
}

/// Synthetic approval used by `force_response`: zero delay, bypasses the
/// policy, still subject to supersession.
fn forced_prompt(key: ContextKey, own_node: Option<NodeId>) -> MeshMessage {
    MeshMessage {
        id: uuid::Uuid::new_v4().to_string(),
        key,
        sender: own_node.unwrap_or(NodeId(0)),
        sender_name: "operator".into(),
        text: "Please provide a natural response to the recent conversation.".into(),
        received_at: Instant::now(),
        is_direct: matches!(key, ContextKey::Direct(_)),
        rssi: None,
        snr: None,
    }
}

async fn journal_record(
    shared: &Arc<EngineShared>,
    key: ContextKey,
    role: Role,
    node: Option<NodeId>,
    name: Option<&str>,
    text: &str,
) {
    let Some(journal) = &shared.journal else {
        return;
    };
    let entry = JournalEntry {
        ts: chrono::Utc::now(),
        role,
        node,
        name: name.map(str::to_string),
        text: text.to_string(),
    };
    if let Err(e) = journal.record(&key, &entry).await {
        warn!(key = %key, error = %e, "journal write failed");
    }
}
