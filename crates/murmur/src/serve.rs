// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `serve` command: wires the full bridge and runs it until a shutdown
//! signal arrives.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use murmur_agent::{install_signal_handler, Engine, EngineSettings, ProviderRegistry};
use murmur_config::MurmurConfig;
use murmur_context::{ContextSettings, ContextStore};
use murmur_core::{AiProvider, Journal, MeshLink, MurmurError};
use murmur_dispatch::{DispatchSettings, Dispatcher};
use murmur_gemini::GeminiProvider;
use murmur_journal::JsonlJournal;
use murmur_mesh::{connector, MeshSupervisor, SupervisorSettings, TransportSpec};
use murmur_openai::OpenAiProvider;
use murmur_triage::{ReplyScheduler, TriagePolicy, TriageSettings};

/// Builds every configured provider adapter.
fn build_providers(config: &MurmurConfig) -> Result<Arc<ProviderRegistry>, MurmurError> {
    let mut adapters: Vec<Arc<dyn AiProvider>> = Vec::new();

    if config.openai.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) {
        adapters.push(Arc::new(OpenAiProvider::from_config(
            &config.openai,
            &config.gateway,
        )?));
        info!(model = config.openai.model.as_str(), "openai provider configured");
    }
    if config.gemini.api_key.as_deref().is_some_and(|k| !k.trim().is_empty()) {
        adapters.push(Arc::new(GeminiProvider::from_config(
            &config.gemini,
            &config.gateway,
        )?));
        info!(model = config.gemini.model.as_str(), "gemini provider configured");
    }

    ProviderRegistry::new(adapters, &config.gateway.provider).map(Arc::new)
}

/// Runs the bridge until SIGINT/SIGTERM.
pub async fn run(config: MurmurConfig) -> Result<(), MurmurError> {
    let cancel = install_signal_handler();

    let spec = TransportSpec::from_config(&config.mesh)?;
    info!(transport = %spec, "starting mesh supervisor");
    let (link, inbound) = MeshSupervisor::start(
        connector(spec),
        SupervisorSettings::from_config(&config.mesh),
        None,
    );
    let link: Arc<dyn MeshLink> = link;

    let providers = build_providers(&config)?;
    let store = Arc::new(ContextStore::new(ContextSettings::from_config(
        &config.context,
        Duration::from_secs(config.reply.cooldown_secs),
    )));
    let policy = Arc::new(TriagePolicy::new(
        TriageSettings::from_config(&config.reply),
        None,
    ));
    let scheduler = Arc::new(ReplyScheduler::new(cancel.child_token()));
    let dispatcher = Arc::new(Dispatcher::new(
        link.clone(),
        DispatchSettings::from_config(&config.dispatch),
        cancel.child_token(),
    ));

    let journal: Option<Arc<dyn Journal>> = if config.journal.enabled {
        let journal = JsonlJournal::new(config.journal.dir.clone()).await?;
        info!(dir = %journal.dir().display(), "conversation journal enabled");
        Some(Arc::new(journal))
    } else {
        None
    };

    let (engine, _handle) = Engine::new(
        link,
        inbound,
        store,
        policy,
        scheduler,
        dispatcher,
        journal,
        providers,
        EngineSettings::from_config(&config),
        cancel,
    );

    engine.run().await
}
