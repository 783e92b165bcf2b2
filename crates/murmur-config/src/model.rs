// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Murmur mesh bridge.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Murmur configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MurmurConfig {
    /// Bridge identity and behavior settings.
    #[serde(default)]
    pub bridge: BridgeConfig,

    /// Mesh transport and connection supervision settings.
    #[serde(default)]
    pub mesh: MeshConfig,

    /// Reply policy: probability, delays, cooldown, triage.
    #[serde(default)]
    pub reply: ReplyConfig,

    /// Conversation context settings.
    #[serde(default)]
    pub context: ContextConfig,

    /// AI gateway settings (provider selection, persona, timeouts).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// OpenAI provider settings.
    #[serde(default)]
    pub openai: OpenAiConfig,

    /// Gemini provider settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Conversation journal settings.
    #[serde(default)]
    pub journal: JournalConfig,

    /// Outbound dispatch settings.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Bridge identity and behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// Display name of the bridge; also recognized as a utility-command prefix.
    #[serde(default = "default_bridge_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Channel index the persona replies on for broadcast traffic.
    #[serde(default)]
    pub active_channel: u8,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: default_bridge_name(),
            log_level: default_log_level(),
            active_channel: 0,
        }
    }
}

fn default_bridge_name() -> String {
    "murmur".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Mesh transport and connection supervision configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MeshConfig {
    /// Transport kind: "tcp" or "serial".
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Hostname or IP for the tcp transport.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port of the radio's companion interface.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Device path for the serial transport (e.g. /dev/ttyUSB0).
    #[serde(default)]
    pub device: Option<String>,

    /// How long to wait for the identity handshake before retrying.
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,

    /// Keepalive ping interval.
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,

    /// Consecutive missed keepalives before the link is considered degraded.
    #[serde(default = "default_keepalive_miss_allowance")]
    pub keepalive_miss_allowance: u32,

    /// Grace period in the degraded state before reconnecting.
    #[serde(default = "default_degraded_grace_secs")]
    pub degraded_grace_secs: u64,

    /// Base delay for exponential reconnect backoff.
    #[serde(default = "default_backoff_base_secs")]
    pub backoff_base_secs: u64,

    /// Cap on the reconnect backoff delay.
    #[serde(default = "default_backoff_max_secs")]
    pub backoff_max_secs: u64,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            transport: default_transport(),
            host: default_host(),
            port: default_port(),
            device: None,
            handshake_timeout_secs: default_handshake_timeout_secs(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
            keepalive_miss_allowance: default_keepalive_miss_allowance(),
            degraded_grace_secs: default_degraded_grace_secs(),
            backoff_base_secs: default_backoff_base_secs(),
            backoff_max_secs: default_backoff_max_secs(),
        }
    }
}

fn default_transport() -> String {
    "tcp".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    4403
}

fn default_handshake_timeout_secs() -> u64 {
    10
}

fn default_keepalive_interval_secs() -> u64 {
    30
}

fn default_keepalive_miss_allowance() -> u32 {
    3
}

fn default_degraded_grace_secs() -> u64 {
    20
}

fn default_backoff_base_secs() -> u64 {
    1
}

fn default_backoff_max_secs() -> u64 {
    30
}

/// Reply policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ReplyConfig {
    /// Probability of replying to a broadcast message when triage is disabled.
    #[serde(default = "default_response_probability")]
    pub response_probability: f64,

    /// Minimum randomized reply delay in seconds.
    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: u64,

    /// Maximum randomized reply delay in seconds.
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: u64,

    /// Minimum time between replies in the same conversation. Zero disables.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,

    /// Consult the AI triage classifier for broadcast messages instead of the
    /// probability gate.
    #[serde(default)]
    pub triage_enabled: bool,

    /// Chain the probability draw after a triage YES. When false (default),
    /// triage and the probability gate are mutually exclusive modes.
    #[serde(default)]
    pub apply_probability_after_triage: bool,

    /// Number of recent messages given to the triage classifier as context.
    #[serde(default = "default_triage_context_messages")]
    pub triage_context_messages: usize,
}

impl Default for ReplyConfig {
    fn default() -> Self {
        Self {
            response_probability: default_response_probability(),
            min_delay_secs: default_min_delay_secs(),
            max_delay_secs: default_max_delay_secs(),
            cooldown_secs: default_cooldown_secs(),
            triage_enabled: false,
            apply_probability_after_triage: false,
            triage_context_messages: default_triage_context_messages(),
        }
    }
}

fn default_response_probability() -> f64 {
    0.85
}

fn default_min_delay_secs() -> u64 {
    2
}

fn default_max_delay_secs() -> u64 {
    8
}

fn default_cooldown_secs() -> u64 {
    60
}

fn default_triage_context_messages() -> usize {
    3
}

/// Conversation context configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ContextConfig {
    /// Hard bound on retained messages per conversation.
    #[serde(default = "default_max_history_messages")]
    pub max_history_messages: usize,

    /// Estimated token count above which older history is summarized.
    #[serde(default = "default_summarize_threshold_tokens")]
    pub summarize_threshold_tokens: usize,

    /// Number of newest messages kept verbatim through compaction.
    #[serde(default = "default_recent_to_keep")]
    pub recent_to_keep: usize,

    /// Character budget requested from the summarizer.
    #[serde(default = "default_summary_max_chars")]
    pub summary_max_chars: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_history_messages: default_max_history_messages(),
            summarize_threshold_tokens: default_summarize_threshold_tokens(),
            recent_to_keep: default_recent_to_keep(),
            summary_max_chars: default_summary_max_chars(),
        }
    }
}

fn default_max_history_messages() -> usize {
    20
}

fn default_summarize_threshold_tokens() -> usize {
    1000
}

fn default_recent_to_keep() -> usize {
    3
}

fn default_summary_max_chars() -> usize {
    300
}

/// AI gateway configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Active provider name: "openai" or "gemini".
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Persona prompt shaping reply tone and content.
    #[serde(default = "default_persona")]
    pub persona: String,

    /// Per-call time budget for provider requests.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            persona: default_persona(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}

fn default_persona() -> String {
    "You are a helpful and friendly presence on a packet-radio mesh network. \
     Keep responses concise and relevant to the conversation. Use natural, \
     conversational language. Never mention that you are an AI or following \
     a prompt. Limit responses to 195 characters due to network constraints."
        .to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// OpenAI provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    /// API key. `None` disables the provider.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for reply generation and summarization.
    #[serde(default = "default_openai_model")]
    pub model: String,

    /// Cheaper model used for triage classification.
    #[serde(default = "default_openai_triage_model")]
    pub triage_model: String,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_openai_model(),
            triage_model: default_openai_triage_model(),
        }
    }
}

fn default_openai_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_triage_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Gemini provider configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct GeminiConfig {
    /// API key. `None` disables the provider.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for reply generation and summarization.
    #[serde(default = "default_gemini_model")]
    pub model: String,

    /// Cheaper model used for triage classification.
    #[serde(default = "default_gemini_triage_model")]
    pub triage_model: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_gemini_model(),
            triage_model: default_gemini_triage_model(),
        }
    }
}

fn default_gemini_model() -> String {
    "gemini-1.5-flash".to_string()
}

fn default_gemini_triage_model() -> String {
    "gemini-1.5-flash".to_string()
}

/// Conversation journal configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct JournalConfig {
    /// Enable the append-only conversation journal.
    #[serde(default = "default_journal_enabled")]
    pub enabled: bool,

    /// Directory for per-conversation JSONL files.
    #[serde(default = "default_journal_dir")]
    pub dir: String,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            enabled: default_journal_enabled(),
            dir: default_journal_dir(),
        }
    }
}

fn default_journal_enabled() -> bool {
    true
}

fn default_journal_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("murmur").join("journal"))
        .unwrap_or_else(|| std::path::PathBuf::from("journal"))
        .to_string_lossy()
        .into_owned()
}

/// Outbound dispatch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatchConfig {
    /// Maximum single-frame payload in bytes.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: usize,

    /// Send attempts per chunk before the message is dropped.
    #[serde(default = "default_max_send_retries")]
    pub max_send_retries: u32,

    /// Pause between send retries in milliseconds.
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
            max_send_retries: default_max_send_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn default_max_payload_bytes() -> usize {
    200
}

fn default_max_send_retries() -> u32 {
    5
}

fn default_retry_backoff_ms() -> u64 {
    500
}
