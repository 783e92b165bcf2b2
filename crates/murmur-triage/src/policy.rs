// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The triage policy: decides, for every inbound message, whether the
//! persona should reply and after what delay.
//!
//! Policy order: direct messages always pass (bypassing every other
//! filter, cooldown included); then cooldown; then either the probability
//! gate or the AI triage classifier, depending on configuration. Triage
//! failures skip -- an unreachable triage service must never cause
//! unwanted chatter.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use murmur_config::model::ReplyConfig;
use murmur_context::ContextStore;
use murmur_core::types::{ContextKey, Decision, MeshMessage, SkipReason, TriageVerdict};
use murmur_core::AiProvider;

/// Policy knobs, lifted from the `[reply]` config section.
#[derive(Debug, Clone)]
pub struct TriageSettings {
    pub response_probability: f64,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub triage_enabled: bool,
    pub apply_probability_after_triage: bool,
    pub triage_context_messages: usize,
}

impl TriageSettings {
    pub fn from_config(cfg: &ReplyConfig) -> Self {
        Self {
            response_probability: cfg.response_probability,
            min_delay: Duration::from_secs(cfg.min_delay_secs),
            max_delay: Duration::from_secs(cfg.max_delay_secs),
            triage_enabled: cfg.triage_enabled,
            apply_probability_after_triage: cfg.apply_probability_after_triage,
            triage_context_messages: cfg.triage_context_messages,
        }
    }
}

/// The triage decision policy. Randomness flows through a seedable RNG so
/// tests are deterministic.
pub struct TriagePolicy {
    settings: TriageSettings,
    rng: Mutex<StdRng>,
}

impl TriagePolicy {
    /// Creates a policy; `rng_seed` pins the random source for tests.
    pub fn new(settings: TriageSettings, rng_seed: Option<u64>) -> Self {
        Self {
            settings,
            rng: Mutex::new(rng_seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)),
        }
    }

    /// Applies the policy to one inbound message.
    pub async fn decide(
        &self,
        msg: &MeshMessage,
        active_channel: u8,
        store: &ContextStore,
        provider: &dyn AiProvider,
        persona: &str,
    ) -> Decision {
        // 1. Direct messages bypass every other filter, cooldown included,
        //    to guarantee private-message responsiveness.
        if msg.is_direct {
            return Decision::RespondAfter(self.draw_delay().await);
        }

        // 2. Broadcasts only count on the active channel.
        if let ContextKey::Channel(idx) = msg.key
            && idx != active_channel
        {
            return Decision::Skip(SkipReason::InactiveChannel);
        }

        // 3. Cooldown.
        let remaining = store.cooldown_remaining(msg.key).await;
        if !remaining.is_zero() {
            debug!(key = %msg.key, remaining_secs = remaining.as_secs(), "cooldown active");
            return Decision::Skip(SkipReason::Cooldown);
        }

        // 4. Probability gate or AI triage.
        if self.settings.triage_enabled {
            let mut recent = store
                .recent_user_lines(msg.key, self.settings.triage_context_messages + 1)
                .await;
            // The newest message is passed separately, not as history.
            recent.pop();

            match provider.classify_triage(persona, &recent, msg).await {
                Ok(TriageVerdict::Yes) => {
                    info!(key = %msg.key, sender = %msg.sender_name, "triage approved");
                }
                Ok(TriageVerdict::No) => {
                    info!(key = %msg.key, sender = %msg.sender_name, "triage declined");
                    return Decision::Skip(SkipReason::TriageNo);
                }
                Err(e) => {
                    warn!(key = %msg.key, error = %e, "triage failed, skipping (fail closed)");
                    return Decision::Skip(SkipReason::TriageError);
                }
            }

            if self.settings.apply_probability_after_triage && !self.pass_probability().await {
                return Decision::Skip(SkipReason::Probability);
            }
        } else if !self.pass_probability().await {
            debug!(key = %msg.key, "probability gate declined");
            return Decision::Skip(SkipReason::Probability);
        }

        Decision::RespondAfter(self.draw_delay().await)
    }

    async fn pass_probability(&self) -> bool {
        let draw: f64 = self.rng.lock().await.gen_range(0.0..1.0);
        draw < self.settings.response_probability
    }

    /// Uniform delay in `[min_delay, max_delay]`.
    async fn draw_delay(&self) -> Duration {
        let min = self.settings.min_delay;
        let max = self.settings.max_delay;
        if max <= min {
            return min;
        }
        let secs = self
            .rng
            .lock()
            .await
            .gen_range(min.as_secs_f64()..=max.as_secs_f64());
        Duration::from_secs_f64(secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use murmur_context::ContextSettings;
    use murmur_core::types::ContextWindow;
    use murmur_core::{GatewayError, NodeId};
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;
    use tokio::time::Instant;

    const KEY: ContextKey = ContextKey::Channel(0);

    fn settings() -> TriageSettings {
        TriageSettings {
            response_probability: 1.0,
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(8),
            triage_enabled: false,
            apply_probability_after_triage: false,
            triage_context_messages: 3,
        }
    }

    fn store(cooldown_secs: u64) -> ContextStore {
        ContextStore::new(ContextSettings {
            max_history_messages: 20,
            summarize_threshold_tokens: 10_000,
            recent_to_keep: 3,
            summary_max_chars: 100,
            cooldown: Duration::from_secs(cooldown_secs),
        })
    }

    fn broadcast(text: &str) -> MeshMessage {
        MeshMessage {
            id: "m".into(),
            key: KEY,
            sender: NodeId(0xbb),
            sender_name: "alice".into(),
            text: text.into(),
            received_at: Instant::now(),
            is_direct: false,
            rssi: None,
            snr: None,
        }
    }

    fn direct(text: &str) -> MeshMessage {
        MeshMessage {
            key: ContextKey::Direct(NodeId(0xbb)),
            is_direct: true,
            ..broadcast(text)
        }
    }

    /// Triage stub with a scripted verdict queue; other calls unused.
    struct ScriptedTriage {
        verdicts: StdMutex<VecDeque<Result<TriageVerdict, GatewayError>>>,
        last_recent: StdMutex<Vec<String>>,
    }

    impl ScriptedTriage {
        fn new(verdicts: Vec<Result<TriageVerdict, GatewayError>>) -> Self {
            Self {
                verdicts: StdMutex::new(verdicts.into()),
                last_recent: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AiProvider for ScriptedTriage {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate_reply(
            &self,
            _persona: &str,
            _context: &ContextWindow,
            _message: &MeshMessage,
        ) -> Result<String, GatewayError> {
            unimplemented!("not used by the policy")
        }

        async fn classify_triage(
            &self,
            _persona: &str,
            recent: &[String],
            _newest: &MeshMessage,
        ) -> Result<TriageVerdict, GatewayError> {
            *self.last_recent.lock().unwrap() = recent.to_vec();
            self.verdicts
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(TriageVerdict::Yes))
        }

        async fn summarize(&self, _text: &str, _max_chars: usize) -> Result<String, GatewayError> {
            unimplemented!("not used by the policy")
        }
    }

    fn yes() -> ScriptedTriage {
        ScriptedTriage::new(vec![Ok(TriageVerdict::Yes)])
    }

    #[tokio::test]
    async fn full_probability_zero_cooldown_responds_within_bounds() {
        let policy = TriagePolicy::new(settings(), Some(1));
        let store = store(0);
        let decision = policy
            .decide(&broadcast("hello?"), 0, &store, &yes(), "persona")
            .await;
        match decision {
            Decision::RespondAfter(delay) => {
                assert!(delay >= Duration::from_secs(2), "delay {delay:?} below min");
                assert!(delay <= Duration::from_secs(8), "delay {delay:?} above max");
            }
            other => panic!("expected RespondAfter, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_probability_always_skips_broadcasts() {
        let policy = TriagePolicy::new(
            TriageSettings {
                response_probability: 0.0,
                ..settings()
            },
            Some(1),
        );
        let store = store(0);
        for _ in 0..10 {
            let decision = policy
                .decide(&broadcast("hello?"), 0, &store, &yes(), "persona")
                .await;
            assert_eq!(decision, Decision::Skip(SkipReason::Probability));
        }
    }

    #[tokio::test]
    async fn direct_message_bypasses_cooldown_and_probability() {
        let policy = TriagePolicy::new(
            TriageSettings {
                response_probability: 0.0,
                ..settings()
            },
            Some(1),
        );
        let store = store(60);
        // Active cooldown on the DM conversation.
        store
            .mark_responded(ContextKey::Direct(NodeId(0xbb)), Instant::now())
            .await;

        let decision = policy
            .decide(&direct("you there?"), 0, &store, &yes(), "persona")
            .await;
        assert!(matches!(decision, Decision::RespondAfter(_)));
    }

    #[tokio::test]
    async fn cooldown_skips_non_direct() {
        let policy = TriagePolicy::new(settings(), Some(1));
        let store = store(60);
        store.mark_responded(KEY, Instant::now()).await;

        let decision = policy
            .decide(&broadcast("hello again"), 0, &store, &yes(), "persona")
            .await;
        assert_eq!(decision, Decision::Skip(SkipReason::Cooldown));
    }

    #[tokio::test]
    async fn inactive_channel_skips() {
        let policy = TriagePolicy::new(settings(), Some(1));
        let store = store(0);
        let decision = policy
            .decide(&broadcast("hi"), 2, &store, &yes(), "persona")
            .await;
        assert_eq!(decision, Decision::Skip(SkipReason::InactiveChannel));
    }

    #[tokio::test]
    async fn triage_yes_approves_and_no_skips() {
        let policy = TriagePolicy::new(
            TriageSettings {
                triage_enabled: true,
                ..settings()
            },
            Some(1),
        );
        let store = store(0);

        let provider = ScriptedTriage::new(vec![Ok(TriageVerdict::Yes), Ok(TriageVerdict::No)]);
        let d1 = policy
            .decide(&broadcast("what's the weather?"), 0, &store, &provider, "p")
            .await;
        assert!(matches!(d1, Decision::RespondAfter(_)));

        let d2 = policy
            .decide(&broadcast("lol"), 0, &store, &provider, "p")
            .await;
        assert_eq!(d2, Decision::Skip(SkipReason::TriageNo));
    }

    #[tokio::test]
    async fn triage_error_fails_closed() {
        let policy = TriagePolicy::new(
            TriageSettings {
                triage_enabled: true,
                ..settings()
            },
            Some(1),
        );
        let store = store(0);
        let provider = ScriptedTriage::new(vec![Err(GatewayError::Timeout {
            duration: Duration::from_secs(30),
        })]);

        let decision = policy
            .decide(&broadcast("anyone?"), 0, &store, &provider, "p")
            .await;
        assert_eq!(decision, Decision::Skip(SkipReason::TriageError));
    }

    #[tokio::test]
    async fn triage_context_excludes_newest_message() {
        let policy = TriagePolicy::new(
            TriageSettings {
                triage_enabled: true,
                ..settings()
            },
            Some(1),
        );
        let store = store(0);
        store.record_inbound(&broadcast("older line")).await;
        let newest = broadcast("newest line");
        store.record_inbound(&newest).await;

        let provider = yes();
        policy.decide(&newest, 0, &store, &provider, "p").await;

        let recent = provider.last_recent.lock().unwrap().clone();
        assert_eq!(recent, vec!["alice: older line".to_string()]);
    }

    #[tokio::test]
    async fn probability_can_chain_after_triage() {
        let policy = TriagePolicy::new(
            TriageSettings {
                triage_enabled: true,
                apply_probability_after_triage: true,
                response_probability: 0.0,
                ..settings()
            },
            Some(1),
        );
        let store = store(0);
        let decision = policy
            .decide(&broadcast("question?"), 0, &store, &yes(), "p")
            .await;
        assert_eq!(decision, Decision::Skip(SkipReason::Probability));
    }

    #[tokio::test]
    async fn equal_delay_bounds_are_exact() {
        let policy = TriagePolicy::new(
            TriageSettings {
                min_delay: Duration::from_secs(5),
                max_delay: Duration::from_secs(5),
                ..settings()
            },
            Some(1),
        );
        let store = store(0);
        let decision = policy
            .decide(&broadcast("hi"), 0, &store, &yes(), "p")
            .await;
        assert_eq!(decision, Decision::RespondAfter(Duration::from_secs(5)));
    }

    #[tokio::test]
    async fn seeded_policies_are_deterministic() {
        let store = store(0);
        let mut delays = Vec::new();
        for _ in 0..2 {
            let policy = TriagePolicy::new(settings(), Some(99));
            match policy
                .decide(&broadcast("hi"), 0, &store, &yes(), "p")
                .await
            {
                Decision::RespondAfter(d) => delays.push(d),
                other => panic!("expected RespondAfter, got {other:?}"),
            }
        }
        assert_eq!(delays[0], delays[1]);
    }
}
