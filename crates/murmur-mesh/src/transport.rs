// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Concrete transports producing the raw byte stream the supervisor frames.
//!
//! Two transports are supported: a networked radio endpoint (host:port) and
//! a local serial device path. Both yield the same `AsyncRead + AsyncWrite`
//! object; everything above the byte level is transport-agnostic.

use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::info;

use murmur_config::model::MeshConfig;
use murmur_core::MurmurError;

/// A raw bidirectional byte stream to the radio.
pub trait RawLink: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> RawLink for T {}

/// Where the radio lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportSpec {
    /// Networked companion interface.
    Tcp { host: String, port: u16 },
    /// Local serial device node.
    Serial { device: PathBuf },
}

impl TransportSpec {
    /// Builds the spec from the `[mesh]` config section.
    pub fn from_config(cfg: &MeshConfig) -> Result<Self, MurmurError> {
        match cfg.transport.as_str() {
            "tcp" => Ok(TransportSpec::Tcp {
                host: cfg.host.clone(),
                port: cfg.port,
            }),
            "serial" => {
                let device = cfg.device.as_deref().ok_or_else(|| {
                    MurmurError::Config("mesh.device is required for the serial transport".into())
                })?;
                Ok(TransportSpec::Serial {
                    device: PathBuf::from(device),
                })
            }
            other => Err(MurmurError::Config(format!(
                "unsupported mesh.transport `{other}`"
            ))),
        }
    }
}

impl std::fmt::Display for TransportSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportSpec::Tcp { host, port } => write!(f, "tcp://{host}:{port}"),
            TransportSpec::Serial { device } => write!(f, "serial://{}", device.display()),
        }
    }
}

/// A factory the supervisor calls on every (re)connection attempt.
pub type LinkConnector =
    Arc<dyn Fn() -> BoxFuture<'static, Result<Box<dyn RawLink>, MurmurError>> + Send + Sync>;

/// Opens one raw link for the given spec.
pub async fn open(spec: &TransportSpec) -> Result<Box<dyn RawLink>, MurmurError> {
    match spec {
        TransportSpec::Tcp { host, port } => {
            let stream = tokio::net::TcpStream::connect((host.as_str(), *port))
                .await
                .map_err(|e| MurmurError::Transport {
                    message: format!("tcp connect to {host}:{port} failed: {e}"),
                    source: Some(Box::new(e)),
                })?;
            stream.set_nodelay(true).ok();
            info!(host = host.as_str(), port, "mesh tcp transport connected");
            Ok(Box::new(stream))
        }
        TransportSpec::Serial { device } => {
            // Baud and framing are the OS's concern; the device node is
            // treated as a plain bidirectional byte stream.
            let file = tokio::fs::OpenOptions::new()
                .read(true)
                .write(true)
                .open(device)
                .await
                .map_err(|e| MurmurError::Transport {
                    message: format!("serial open of {} failed: {e}", device.display()),
                    source: Some(Box::new(e)),
                })?;
            info!(device = %device.display(), "mesh serial transport opened");
            Ok(Box::new(file))
        }
    }
}

/// Wraps a spec into the connector the supervisor consumes.
pub fn connector(spec: TransportSpec) -> LinkConnector {
    Arc::new(move || -> BoxFuture<'static, Result<Box<dyn RawLink>, MurmurError>> {
        let spec = spec.clone();
        Box::pin(async move { open(&spec).await })
    })
}
