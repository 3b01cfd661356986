//! Wire envelope for scrape requests.
//!
//! Caller and callee metadata travel in `bt_header_dendrite_*` and
//! `bt_header_axon_*` HTTP headers so admission can run before the body is
//! read. The JSON body carries only the request payload.

use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use scraping_common::{ScrapInput, Version};

pub const DENDRITE_PREFIX: &str = "bt_header_dendrite_";
pub const AXON_PREFIX: &str = "bt_header_axon_";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(12);

/// Largest accepted `timeout` header, as a multiple of the default.
const MAX_TIMEOUT_FACTOR: u32 = 10;

/// One end of a call: the validator (dendrite) or this miner (axon).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TerminalInfo {
    pub status_code: Option<u16>,
    pub status_message: Option<String>,
    pub process_time: Option<f64>,
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub version: Option<u64>,
    pub nonce: Option<u64>,
    pub uuid: Option<String>,
    pub hotkey: Option<String>,
    pub signature: Option<String>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn header_parse<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
    header_str(headers, name).and_then(|v| v.parse().ok())
}

impl TerminalInfo {
    pub fn from_headers(headers: &HeaderMap, prefix: &str) -> Self {
        let key = |field: &str| format!("{prefix}{field}");
        Self {
            status_code: header_parse(headers, &key("status_code")),
            status_message: header_str(headers, &key("status_message")).map(String::from),
            process_time: header_parse(headers, &key("process_time")),
            ip: header_str(headers, &key("ip")).map(String::from),
            port: header_parse(headers, &key("port")),
            version: header_parse(headers, &key("version")),
            nonce: header_parse(headers, &key("nonce")),
            uuid: header_str(headers, &key("uuid")).map(String::from),
            hotkey: header_str(headers, &key("hotkey")).map(String::from),
            signature: header_str(headers, &key("signature")).map(String::from),
        }
    }

    /// Write every populated field as `{prefix}{field}`. Values that are not
    /// valid header text are skipped.
    pub fn write_headers(&self, prefix: &str, headers: &mut HeaderMap) {
        let fields: [(&str, Option<String>); 10] = [
            ("status_code", self.status_code.map(|v| v.to_string())),
            ("status_message", self.status_message.clone()),
            ("process_time", self.process_time.map(|v| v.to_string())),
            ("ip", self.ip.clone()),
            ("port", self.port.map(|v| v.to_string())),
            ("version", self.version.map(|v| v.to_string())),
            ("nonce", self.nonce.map(|v| v.to_string())),
            ("uuid", self.uuid.clone()),
            ("hotkey", self.hotkey.clone()),
            ("signature", self.signature.clone()),
        ];
        for (field, value) in fields {
            let Some(value) = value else { continue };
            let (Ok(name), Ok(value)) = (
                HeaderName::try_from(format!("{prefix}{field}")),
                HeaderValue::try_from(value),
            ) else {
                continue;
            };
            headers.insert(name, value);
        }
    }
}

/// Everything admission needs, parsed from request headers.
#[derive(Debug, Clone, PartialEq)]
pub struct SynapseHeader {
    pub name: String,
    pub timeout: Duration,
    pub dendrite: TerminalInfo,
    pub axon: TerminalInfo,
}

impl SynapseHeader {
    /// `name` comes from the route; a `timeout` header (seconds, may be
    /// fractional) overrides `default_timeout`. Values that are not positive
    /// or exceed ten times the default fall back to the default.
    pub fn from_headers(name: &str, headers: &HeaderMap, default_timeout: Duration) -> Self {
        let max_timeout = default_timeout.saturating_mul(MAX_TIMEOUT_FACTOR);
        let timeout = header_parse::<f64>(headers, "timeout")
            .filter(|secs| *secs > 0.0)
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .filter(|timeout| *timeout <= max_timeout)
            .unwrap_or(default_timeout);

        Self {
            name: name.to_string(),
            timeout,
            dendrite: TerminalInfo::from_headers(headers, DENDRITE_PREFIX),
            axon: TerminalInfo::from_headers(headers, AXON_PREFIX),
        }
    }

    /// Hotkey of the calling validator.
    pub fn caller_hotkey(&self) -> Option<&str> {
        self.dendrite.hotkey.as_deref()
    }
}

/// Request and response body for both synapse types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrapeSynapse {
    #[serde(default)]
    pub version: Option<Version>,
    #[serde(default)]
    pub scrap_input: Option<ScrapInput>,
    #[serde(default)]
    pub scrap_output: Option<Vec<Value>>,
}

impl ScrapeSynapse {
    pub fn search_keys(&self) -> &[String] {
        self.scrap_input
            .as_ref()
            .map(|input| input.search_key.as_slice())
            .unwrap_or_default()
    }
}
