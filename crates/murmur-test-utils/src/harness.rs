// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end engine testing.
//!
//! `TestHarness` assembles a complete engine stack over mock transport and
//! provider adapters, with a seeded random source so every run is
//! deterministic. `inject()` drives the full pipeline exactly as the
//! connection supervisor would.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use murmur_agent::{Engine, EngineHandle, EngineSettings, ProviderRegistry};
use murmur_context::{ContextSettings, ContextStore};
use murmur_core::types::{ContextKey, MeshMessage, NodeId};
use murmur_core::{AiProvider, MurmurError};
use murmur_dispatch::{DispatchSettings, Dispatcher};
use murmur_triage::{ReplyScheduler, TriagePolicy, TriageSettings};

use crate::mock_link::MockLink;
use crate::mock_provider::MockProvider;

/// Builder for the test engine stack.
pub struct TestHarnessBuilder {
    probability: f64,
    min_delay: Duration,
    max_delay: Duration,
    cooldown: Duration,
    triage_enabled: bool,
    active_channel: u8,
    max_payload_bytes: usize,
    max_send_retries: u32,
    summarize_threshold_tokens: usize,
    replies: Vec<String>,
    rng_seed: u64,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            probability: 1.0,
            min_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            cooldown: Duration::ZERO,
            triage_enabled: false,
            active_channel: 0,
            max_payload_bytes: 200,
            max_send_retries: 5,
            summarize_threshold_tokens: 10_000,
            replies: Vec::new(),
            rng_seed: 42,
        }
    }

    pub fn with_probability(mut self, p: f64) -> Self {
        self.probability = p;
        self
    }

    pub fn with_delays(mut self, min: Duration, max: Duration) -> Self {
        self.min_delay = min;
        self.max_delay = max;
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_triage(mut self) -> Self {
        self.triage_enabled = true;
        self
    }

    pub fn with_active_channel(mut self, idx: u8) -> Self {
        self.active_channel = idx;
        self
    }

    pub fn with_payload_budget(mut self, bytes: usize) -> Self {
        self.max_payload_bytes = bytes;
        self
    }

    pub fn with_send_retries(mut self, retries: u32) -> Self {
        self.max_send_retries = retries;
        self
    }

    pub fn with_summarize_threshold(mut self, tokens: usize) -> Self {
        self.summarize_threshold_tokens = tokens;
        self
    }

    pub fn with_replies(mut self, replies: Vec<&str>) -> Self {
        self.replies = replies.into_iter().map(String::from).collect();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }

    /// Builds the stack and spawns the engine loop.
    pub async fn build(self) -> Result<TestHarness, MurmurError> {
        let cancel = CancellationToken::new();

        let (link, inbound_tx, inbound_rx) = MockLink::with_inbound();

        let provider = Arc::new(if self.replies.is_empty() {
            MockProvider::new()
        } else {
            MockProvider::with_replies(self.replies.iter().map(String::as_str).collect())
        });
        let providers = Arc::new(ProviderRegistry::new(
            vec![provider.clone() as Arc<dyn AiProvider>],
            "mock",
        )?);

        let store = Arc::new(ContextStore::new(ContextSettings {
            max_history_messages: 20,
            summarize_threshold_tokens: self.summarize_threshold_tokens,
            recent_to_keep: 3,
            summary_max_chars: 100,
            cooldown: self.cooldown,
        }));

        let policy = Arc::new(TriagePolicy::new(
            TriageSettings {
                response_probability: self.probability,
                min_delay: self.min_delay,
                max_delay: self.max_delay,
                triage_enabled: self.triage_enabled,
                apply_probability_after_triage: false,
                triage_context_messages: 3,
            },
            Some(self.rng_seed),
        ));

        let scheduler = Arc::new(ReplyScheduler::new(cancel.child_token()));
        let dispatcher = Arc::new(Dispatcher::new(
            link.clone(),
            DispatchSettings {
                max_payload_bytes: self.max_payload_bytes,
                max_send_retries: self.max_send_retries,
                retry_backoff: Duration::from_millis(100),
            },
            cancel.child_token(),
        ));

        let settings = EngineSettings {
            bridge_name: "murmur".into(),
            active_channel: self.active_channel,
            persona: "You are a test persona.".into(),
        };

        let (engine, handle) = Engine::new(
            link.clone(),
            inbound_rx,
            store.clone(),
            policy,
            scheduler.clone(),
            dispatcher,
            None,
            providers,
            settings,
            cancel.clone(),
        );
        tokio::spawn(engine.run());

        Ok(TestHarness {
            link,
            provider,
            handle,
            store,
            scheduler,
            inbound_tx,
            cancel,
        })
    }
}

/// A complete engine environment over mock adapters.
pub struct TestHarness {
    /// The mock mesh link capturing outbound sends.
    pub link: Arc<MockLink>,
    /// The mock AI provider.
    pub provider: Arc<MockProvider>,
    /// Control surface of the running engine.
    pub handle: EngineHandle,
    /// The context store, for direct assertions.
    pub store: Arc<ContextStore>,
    /// The pending-reply scheduler, for invariant assertions.
    pub scheduler: Arc<ReplyScheduler>,
    inbound_tx: mpsc::Sender<MeshMessage>,
    /// Root cancellation token; cancel to stop the engine.
    pub cancel: CancellationToken,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Injects one inbound message, as the supervisor would deliver it.
    pub async fn inject(&self, msg: MeshMessage) {
        self.inbound_tx
            .send(msg)
            .await
            .expect("engine inbound channel closed");
    }
}

/// Builds a broadcast message on `channel`.
pub fn broadcast(channel: u8, sender: u32, name: &str, text: &str) -> MeshMessage {
    MeshMessage {
        id: uuid::Uuid::new_v4().to_string(),
        key: ContextKey::Channel(channel),
        sender: NodeId(sender),
        sender_name: name.to_string(),
        text: text.to_string(),
        received_at: Instant::now(),
        is_direct: false,
        rssi: Some(-90),
        snr: Some(6.0),
    }
}

/// Builds a direct message to the bridge's node.
pub fn direct(sender: u32, name: &str, text: &str) -> MeshMessage {
    MeshMessage {
        id: uuid::Uuid::new_v4().to_string(),
        key: ContextKey::Direct(NodeId(sender)),
        sender: NodeId(sender),
        sender_name: name.to_string(),
        text: text.to_string(),
        received_at: Instant::now(),
        is_direct: true,
        rssi: Some(-85),
        snr: Some(7.5),
    }
}
