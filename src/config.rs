use crate::sonos::DEFAULT_PORT;
use clap::Parser;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Arguments the Stream Deck application launches the plugin with
#[derive(Debug, Parser, Clone, PartialEq, Eq)]
#[command(name = "sonos-deck")]
#[command(about = "Stream Deck plugin for controlling Sonos speakers")]
pub struct LaunchArgs {
    /// WebSocket port of the Stream Deck application
    #[arg(long)]
    pub port: u16,

    /// Unique id used to register the plugin
    #[arg(long = "pluginUUID")]
    pub plugin_uuid: String,

    /// Event name to register with
    #[arg(long = "registerEvent")]
    pub register_event: String,

    /// Host application information (JSON)
    #[arg(long)]
    pub info: String,
}

impl LaunchArgs {
    /// Parse host-style arguments (`-port 28196 -pluginUUID ...`)
    pub fn from_host_args<I>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self::try_parse_from(normalize_args(args))
    }
}

/// Rewrite the host's single-dash flags into the double-dash form clap expects
pub fn normalize_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator,
    I::Item: Into<String>,
{
    args.into_iter()
        .map(Into::into)
        .enumerate()
        .map(|(i, arg)| {
            let is_flag = i > 0
                && arg.len() > 2
                && arg.starts_with('-')
                && !arg.starts_with("--")
                && arg[1..].starts_with(|c: char| c.is_ascii_alphabetic());
            if is_flag {
                format!("-{}", arg)
            } else {
                arg
            }
        })
        .collect()
}

/// Plugin-wide settings written by the property inspector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalSettings {
    /// Address of the Sonos player to control
    #[serde(deserialize_with = "lenient_host")]
    pub host: Option<String>,
    #[serde(deserialize_with = "lenient_port")]
    pub port: u16,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
        }
    }
}

impl GlobalSettings {
    /// Read settings from a `didReceiveGlobalSettings` payload; malformed input yields defaults
    pub fn from_value(value: Value) -> Self {
        match serde_json::from_value(value) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("Ignoring malformed global settings: {}", e);
                Self::default()
            }
        }
    }
}

fn lenient_host<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(host)) => Some(host.trim().to_string()).filter(|h| !h.is_empty()),
        _ => None,
    })
}

/// Port as number or text; anything unusable falls back to the default port
fn lenient_port<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u16, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    let port = match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Some(Value::String(s)) => {
            let digits: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
            digits.parse::<u16>().ok()
        }
        _ => None,
    };
    Ok(port.filter(|p| *p != 0).unwrap_or(DEFAULT_PORT))
}
