// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `status` command: a human-readable summary of the resolved
//! configuration and transport target, without touching the radio.

use murmur_config::MurmurConfig;
use murmur_mesh::TransportSpec;

pub fn print_status(config: &MurmurConfig) {
    println!("murmur status");
    println!("  bridge name:     {}", config.bridge.name);
    println!("  active channel:  {}", config.bridge.active_channel);

    match TransportSpec::from_config(&config.mesh) {
        Ok(spec) => println!("  transport:       {spec}"),
        Err(e) => println!("  transport:       INVALID ({e})"),
    }

    let openai = key_state(config.openai.api_key.as_deref());
    let gemini = key_state(config.gemini.api_key.as_deref());
    println!(
        "  provider:        {} (openai: {openai}, gemini: {gemini})",
        config.gateway.provider
    );

    println!(
        "  reply policy:    p={:.2}, delay {}-{}s, cooldown {}s, triage {}",
        config.reply.response_probability,
        config.reply.min_delay_secs,
        config.reply.max_delay_secs,
        config.reply.cooldown_secs,
        if config.reply.triage_enabled { "on" } else { "off" },
    );

    println!(
        "  context:         {} msgs max, summarize over ~{} tokens",
        config.context.max_history_messages, config.context.summarize_threshold_tokens
    );

    if config.journal.enabled {
        println!("  journal:         {}", config.journal.dir);
    } else {
        println!("  journal:         disabled");
    }
}

fn key_state(key: Option<&str>) -> &'static str {
    match key {
        Some(k) if !k.trim().is_empty() => "key set",
        _ => "no key",
    }
}
