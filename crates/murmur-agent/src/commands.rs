// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic utility commands answered without the AI gateway.
//!
//! `ping`/`qsl` and `info`/`test` are answered directly from link metadata,
//! either bare or prefixed with the bridge's name ("murmur ping"). Utility
//! replies skip triage and cooldowns entirely.

use murmur_core::types::{MeshMessage, NodeIdentity};

/// A recognized utility command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtilityCommand {
    /// Link check: answer with the sender's signal report.
    Ping,
    /// Bridge status: answer with the bridge's own identity.
    Info,
}

/// Parses `text` as a utility command, bare or `<bridge_name> <command>`.
pub fn parse_command(bridge_name: &str, text: &str) -> Option<UtilityCommand> {
    let lower = text.trim().to_lowercase();
    let mut tokens = lower.split_whitespace();

    let mut first = tokens.next()?;
    if first == bridge_name.to_lowercase() {
        first = tokens.next()?;
    }
    if tokens.next().is_some() {
        return None;
    }

    match first {
        "ping" | "qsl" => Some(UtilityCommand::Ping),
        "info" | "test" => Some(UtilityCommand::Info),
        _ => None,
    }
}

/// Builds the reply for a utility command, if `msg` is one.
pub fn utility_reply(
    bridge_name: &str,
    identity: Option<&NodeIdentity>,
    msg: &MeshMessage,
) -> Option<String> {
    let command = parse_command(bridge_name, &msg.text)?;
    Some(match command {
        UtilityCommand::Ping => format_ping(msg),
        UtilityCommand::Info => format_info(bridge_name, identity, msg),
    })
}

fn signal_report(msg: &MeshMessage) -> (String, String) {
    let rssi = msg
        .rssi
        .map_or_else(|| "N/A".to_string(), |r| format!("{r} dBm"));
    let snr = msg
        .snr
        .map_or_else(|| "N/A".to_string(), |s| format!("{s:.1} dB"));
    (rssi, snr)
}

fn format_ping(msg: &MeshMessage) -> String {
    let (rssi, snr) = signal_report(msg);
    format!(
        "[PING] pong from !{} ({}) | RSSI {rssi} | SNR {snr}",
        msg.sender, msg.sender_name
    )
}

fn format_info(bridge_name: &str, identity: Option<&NodeIdentity>, msg: &MeshMessage) -> String {
    let (rssi, snr) = signal_report(msg);
    match identity {
        Some(id) => format!(
            "{bridge_name}: node !{} ({}) online | heard you at RSSI {rssi} | SNR {snr}",
            id.node_id, id.node_name
        ),
        None => format!("{bridge_name}: online | heard you at RSSI {rssi} | SNR {snr}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::types::ContextKey;
    use murmur_core::NodeId;
    use tokio::time::Instant;

    fn msg(text: &str, rssi: Option<i32>, snr: Option<f32>) -> MeshMessage {
        MeshMessage {
            id: "m".into(),
            key: ContextKey::Channel(0),
            sender: NodeId(0xbb),
            sender_name: "KC1ABC".into(),
            text: text.into(),
            received_at: Instant::now(),
            is_direct: false,
            rssi,
            snr,
        }
    }

    fn identity() -> NodeIdentity {
        NodeIdentity {
            node_id: NodeId(0xaa),
            node_name: "murmur-base".into(),
            channels: vec![],
        }
    }

    #[test]
    fn parses_bare_and_prefixed_commands() {
        assert_eq!(parse_command("murmur", "ping"), Some(UtilityCommand::Ping));
        assert_eq!(parse_command("murmur", "QSL"), Some(UtilityCommand::Ping));
        assert_eq!(parse_command("murmur", "info"), Some(UtilityCommand::Info));
        assert_eq!(parse_command("murmur", "test"), Some(UtilityCommand::Info));
        assert_eq!(
            parse_command("murmur", "Murmur ping"),
            Some(UtilityCommand::Ping)
        );
        assert_eq!(
            parse_command("murmur", "  murmur INFO "),
            Some(UtilityCommand::Info)
        );
    }

    #[test]
    fn ordinary_chatter_is_not_a_command() {
        assert_eq!(parse_command("murmur", "ping me later ok?"), None);
        assert_eq!(parse_command("murmur", "what is this"), None);
        assert_eq!(parse_command("murmur", "murmur"), None);
        assert_eq!(parse_command("murmur", ""), None);
        assert_eq!(parse_command("murmur", "murmur ping now"), None);
    }

    #[test]
    fn ping_reply_carries_signal_report() {
        let reply = utility_reply("murmur", Some(&identity()), &msg("ping", Some(-92), Some(5.25)))
            .unwrap();
        assert!(reply.starts_with("[PING] pong from !bb (KC1ABC)"));
        assert!(reply.contains("-92 dBm"));
        assert!(reply.contains("5.2 dB"), "got: {reply}");
        assert!(reply.len() <= 200, "must fit one mesh frame");
    }

    #[test]
    fn ping_reply_degrades_without_signal_data() {
        let reply = utility_reply("murmur", None, &msg("ping", None, None)).unwrap();
        assert!(reply.contains("RSSI N/A"));
        assert!(reply.contains("SNR N/A"));
    }

    #[test]
    fn info_reply_names_the_bridge_node() {
        let reply =
            utility_reply("murmur", Some(&identity()), &msg("info", Some(-80), None)).unwrap();
        assert!(reply.contains("node !aa (murmur-base) online"));
        assert!(reply.len() <= 200);
    }

    #[test]
    fn non_commands_return_none() {
        assert!(utility_reply("murmur", None, &msg("hello there", None, None)).is_none());
    }
}
