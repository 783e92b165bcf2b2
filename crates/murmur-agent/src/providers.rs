// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime provider selection and credential observation.
//!
//! Providers register by name; the active one is a runtime parameter
//! switchable through the control surface. Every registered adapter is
//! wrapped so that a rejected credential anywhere (generation, triage,
//! summarization) raises the engine's sticky warning without stopping
//! message ingestion.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{info, warn};

use murmur_core::types::{ContextWindow, MeshMessage, TriageVerdict};
use murmur_core::{AiProvider, GatewayError, MurmurError};

/// Delegating adapter that flips the credential warning flag on
/// `InvalidCredentials` from any call.
struct CredentialWatch {
    inner: Arc<dyn AiProvider>,
    warning: Arc<AtomicBool>,
}

impl CredentialWatch {
    fn observe<T>(&self, result: Result<T, GatewayError>) -> Result<T, GatewayError> {
        if matches!(result, Err(GatewayError::InvalidCredentials))
            && !self.warning.swap(true, Ordering::SeqCst)
        {
            warn!(
                provider = self.inner.name(),
                "credentials rejected; check the configured API key"
            );
        }
        result
    }
}

#[async_trait]
impl AiProvider for CredentialWatch {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn generate_reply(
        &self,
        persona: &str,
        context: &ContextWindow,
        message: &MeshMessage,
    ) -> Result<String, GatewayError> {
        let result = self.inner.generate_reply(persona, context, message).await;
        self.observe(result)
    }

    async fn classify_triage(
        &self,
        persona: &str,
        recent: &[String],
        newest: &MeshMessage,
    ) -> Result<TriageVerdict, GatewayError> {
        let result = self.inner.classify_triage(persona, recent, newest).await;
        self.observe(result)
    }

    async fn summarize(&self, text: &str, max_chars: usize) -> Result<String, GatewayError> {
        let result = self.inner.summarize(text, max_chars).await;
        self.observe(result)
    }
}

/// Named provider registry with one active selection.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn AiProvider>>,
    current: RwLock<String>,
    credential_warning: Arc<AtomicBool>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &names_of(&self.providers))
            .finish_non_exhaustive()
    }
}

impl ProviderRegistry {
    /// Builds a registry from named adapters, activating `initial`.
    pub fn new(
        adapters: Vec<Arc<dyn AiProvider>>,
        initial: &str,
    ) -> Result<Self, MurmurError> {
        if adapters.is_empty() {
            return Err(MurmurError::Config(
                "no AI providers configured; set an API key".into(),
            ));
        }

        let credential_warning = Arc::new(AtomicBool::new(false));
        let mut providers: HashMap<String, Arc<dyn AiProvider>> = HashMap::new();
        for adapter in adapters {
            let name = adapter.name().to_string();
            providers.insert(
                name,
                Arc::new(CredentialWatch {
                    inner: adapter,
                    warning: credential_warning.clone(),
                }),
            );
        }

        if !providers.contains_key(initial) {
            return Err(MurmurError::Config(format!(
                "gateway.provider `{initial}` is not available; configured: {}",
                names_of(&providers).join(", ")
            )));
        }

        Ok(Self {
            providers,
            current: RwLock::new(initial.to_string()),
            credential_warning,
        })
    }

    /// The currently selected adapter.
    pub async fn current(&self) -> Arc<dyn AiProvider> {
        let name = self.current.read().await;
        // The invariant that `current` names a registered provider is
        // maintained by `new` and `select`.
        self.providers[name.as_str()].clone()
    }

    /// Name of the currently selected adapter.
    pub async fn current_name(&self) -> String {
        self.current.read().await.clone()
    }

    /// Switches the active provider by name.
    pub async fn select(&self, name: &str) -> Result<(), MurmurError> {
        if !self.providers.contains_key(name) {
            return Err(MurmurError::Config(format!(
                "unknown AI provider `{name}`; configured: {}",
                names_of(&self.providers).join(", ")
            )));
        }
        *self.current.write().await = name.to_string();
        info!(provider = name, "AI provider switched");
        Ok(())
    }

    /// Whether any call has observed rejected credentials.
    pub fn credential_warning(&self) -> bool {
        self.credential_warning.load(Ordering::SeqCst)
    }
}

fn names_of(providers: &HashMap<String, Arc<dyn AiProvider>>) -> Vec<String> {
    let mut names: Vec<String> = providers.keys().cloned().collect();
    names.sort();
    names
}
