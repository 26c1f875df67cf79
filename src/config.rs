//! Environment-driven configuration for the document provenance engine
//!
//! The host process is responsible for loading environment variables and
//! startup arguments; this module only reads the environment once it
//! exists and exposes a validated, serializable snapshot the rest of the
//! engine can consult.

use serde::{Deserialize, Serialize};
use std::env;

/// Transport the host RPC surface is configured for. The transport itself
/// is out of scope for this crate; the engine only needs to recognize the
/// value so configuration round-trips cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum McpTransport {
    Stdio,
    Http,
}

impl Default for McpTransport {
    fn default() -> Self {
        Self::Stdio
    }
}

impl std::str::FromStr for McpTransport {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdio" => Ok(Self::Stdio),
            "http" => Ok(Self::Http),
            other => Err(format!("unrecognized MCP_TRANSPORT: {other}")),
        }
    }
}

/// Embedding device preference for the embedding worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingDevice {
    Auto,
    Cuda,
    Cpu,
    Mps,
}

impl Default for EmbeddingDevice {
    fn default() -> Self {
        Self::Auto
    }
}

impl std::str::FromStr for EmbeddingDevice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cuda" => Ok(Self::Cuda),
            "cpu" => Ok(Self::Cpu),
            "mps" => Ok(Self::Mps),
            other => Err(format!("unrecognized EMBEDDING_DEVICE: {other}")),
        }
    }
}

/// Default DATALAB_TIMEOUT when unset or non-numeric: 15 minutes, in ms.
pub const DEFAULT_DATALAB_TIMEOUT_MS: u64 = 15 * 60 * 1000;

/// Snapshot of the engine's environment-driven configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// `OCR_PROVENANCE_DATABASES_PATH` — storage root for database files.
    pub databases_path: String,

    /// `MCP_TRANSPORT`
    #[serde(default)]
    pub mcp_transport: McpTransport,

    /// `MCP_HTTP_PORT`
    pub mcp_http_port: Option<u16>,

    /// `MCP_SESSION_TTL` (seconds)
    pub mcp_session_ttl: Option<u64>,

    /// `DATALAB_API_KEY` — never logged or serialized back out verbatim.
    #[serde(skip_serializing)]
    pub datalab_api_key: Option<String>,

    /// `GEMINI_API_KEY` — never logged or serialized back out verbatim.
    #[serde(skip_serializing)]
    pub gemini_api_key: Option<String>,

    /// `EMBEDDING_DEVICE`
    #[serde(default)]
    pub embedding_device: EmbeddingDevice,

    /// `DATALAB_TIMEOUT` in milliseconds. Non-numeric values fall back to
    /// [`DEFAULT_DATALAB_TIMEOUT_MS`] rather than propagating as NaN.
    pub datalab_timeout_ms: u64,
}

fn default_databases_path() -> String {
    "./data/docprov".to_string()
}

impl EngineConfig {
    /// Load configuration from the process environment. Unset variables take
    /// documented defaults; malformed values fail closed to a default rather
    /// than panicking, except where a hard validation error is required
    /// (handled in `validate`).
    pub fn from_env() -> Self {
        let databases_path =
            env::var("OCR_PROVENANCE_DATABASES_PATH").unwrap_or_else(|_| default_databases_path());

        let mcp_transport = env::var("MCP_TRANSPORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        let mcp_http_port = env::var("MCP_HTTP_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok());

        let mcp_session_ttl = env::var("MCP_SESSION_TTL")
            .ok()
            .and_then(|v| v.parse::<u64>().ok());

        let datalab_api_key = env::var("DATALAB_API_KEY").ok().filter(|s| !s.is_empty());
        let gemini_api_key = env::var("GEMINI_API_KEY").ok().filter(|s| !s.is_empty());

        let embedding_device = env::var("EMBEDDING_DEVICE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();

        // Non-numeric DATALAB_TIMEOUT must fall back to the default, never
        // propagate as NaN.
        let datalab_timeout_ms = env::var("DATALAB_TIMEOUT")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(DEFAULT_DATALAB_TIMEOUT_MS);

        Self {
            databases_path,
            mcp_transport,
            mcp_http_port,
            mcp_session_ttl,
            datalab_api_key,
            gemini_api_key,
            embedding_device,
            datalab_timeout_ms,
        }
    }

    /// Validate cross-field invariants. URLs/paths that can't be checked
    /// until a filesystem call is made are left to the caller.
    pub fn validate(&self) -> Result<(), String> {
        if self.databases_path.trim().is_empty() {
            return Err("databases_path cannot be empty".to_string());
        }
        if self.datalab_timeout_ms == 0 {
            return Err("datalab_timeout_ms must be greater than 0".to_string());
        }
        if self.mcp_transport == McpTransport::Http && self.mcp_http_port.is_none() {
            return Err("MCP_HTTP_PORT is required when MCP_TRANSPORT=http".to_string());
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            databases_path: default_databases_path(),
            mcp_transport: McpTransport::default(),
            mcp_http_port: None,
            mcp_session_ttl: None,
            datalab_api_key: None,
            gemini_api_key: None,
            embedding_device: EmbeddingDevice::default(),
            datalab_timeout_ms: DEFAULT_DATALAB_TIMEOUT_MS,
        }
    }
}
