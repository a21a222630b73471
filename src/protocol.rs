use crate::types::Settings;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Inbound event names sent by the Stream Deck application
pub mod events {
    pub const CONNECTED: &str = "connected";
    pub const DID_RECEIVE_SETTINGS: &str = "didReceiveSettings";
    pub const DID_RECEIVE_GLOBAL_SETTINGS: &str = "didReceiveGlobalSettings";
    pub const WILL_APPEAR: &str = "willAppear";
    pub const WILL_DISAPPEAR: &str = "willDisappear";
    pub const KEY_DOWN: &str = "keyDown";
    pub const KEY_UP: &str = "keyUp";
    pub const DIAL_DOWN: &str = "dialDown";
    pub const DIAL_ROTATE: &str = "dialRotate";
    pub const DIAL_UP: &str = "dialUp";
    pub const TOUCH_TAP: &str = "touchTap";
    pub const TITLE_PARAMETERS_DID_CHANGE: &str = "titleParametersDidChange";
    pub const DEVICE_DID_CONNECT: &str = "deviceDidConnect";
    pub const DEVICE_DID_DISCONNECT: &str = "deviceDidDisconnect";
    pub const APPLICATION_DID_LAUNCH: &str = "applicationDidLaunch";
    pub const APPLICATION_DID_TERMINATE: &str = "applicationDidTerminate";
    pub const SYSTEM_DID_WAKE_UP: &str = "systemDidWakeUp";
    pub const SEND_TO_PLUGIN: &str = "sendToPlugin";
    pub const PROPERTY_INSPECTOR_DID_APPEAR: &str = "propertyInspectorDidAppear";
    pub const PROPERTY_INSPECTOR_DID_DISAPPEAR: &str = "propertyInspectorDidDisappear";

    /// Events scoped to a single action placement
    pub const ACTION_EVENTS: &[&str] = &[
        DID_RECEIVE_SETTINGS,
        WILL_APPEAR,
        WILL_DISAPPEAR,
        KEY_DOWN,
        KEY_UP,
        DIAL_DOWN,
        DIAL_ROTATE,
        DIAL_UP,
        TOUCH_TAP,
        TITLE_PARAMETERS_DID_CHANGE,
        SEND_TO_PLUGIN,
        PROPERTY_INSPECTOR_DID_APPEAR,
        PROPERTY_INSPECTOR_DID_DISAPPEAR,
    ];
}

/// Message received from the Stream Deck application
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InboundMessage {
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

impl InboundMessage {
    /// Create a message with the given event name and payload
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
            ..Default::default()
        }
    }

    /// Scope the message to an action placement
    pub fn with_action(mut self, action: impl Into<String>, context: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self.context = Some(context.into());
        self
    }

    /// Key under which action-type handlers are registered, e.g. `com.example.mute.keyDown`
    pub fn scoped_event(&self) -> Option<String> {
        self.action
            .as_deref()
            .filter(|action| !action.is_empty())
            .map(|action| scoped_event(action, &self.event))
    }

    /// Settings carried in `payload.settings`
    pub fn settings(&self) -> Settings {
        self.payload
            .get("settings")
            .cloned()
            .map(Settings::from_value)
            .unwrap_or_default()
    }

    /// Current key state (`payload.state`)
    pub fn state(&self) -> Option<u64> {
        self.payload.get("state").and_then(Value::as_u64)
    }

    /// Dial rotation (`payload.ticks`), 0 when absent
    pub fn ticks(&self) -> i64 {
        self.payload.get("ticks").and_then(Value::as_i64).unwrap_or(0)
    }

    /// Title parameters (`payload.titleParameters`)
    pub fn title_parameters(&self) -> Option<Value> {
        self.payload.get("titleParameters").cloned()
    }
}

/// Compose the per-action-type event key
pub fn scoped_event(action: &str, event: &str) -> String {
    format!("{}.{}", action, event)
}

/// Outbound event names understood by the Stream Deck application
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum OutboundEvent {
    SetSettings,
    GetSettings,
    SetGlobalSettings,
    GetGlobalSettings,
    OpenUrl,
    LogMessage,
    SetTitle,
    SetImage,
    ShowAlert,
    ShowOk,
    SetState,
    SwitchToProfile,
    SendToPropertyInspector,
    SendToPlugin,
}

/// Message sent to the Stream Deck application
#[derive(Debug, Clone, Serialize)]
pub struct OutboundMessage {
    pub event: OutboundEvent,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Registration handshake sent right after the socket opens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub event: String,
    pub uuid: String,
}

/// Where an image or title applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Target {
    #[default]
    Both,
    Hardware,
    Software,
}

impl Target {
    pub fn code(self) -> u8 {
        match self {
            Target::Both => 0,
            Target::Hardware => 1,
            Target::Software => 2,
        }
    }
}

/// Information about the Stream Deck application passed with `-info`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    #[serde(default)]
    pub application: ApplicationInfo,
    #[serde(default)]
    pub colors: BTreeMap<String, String>,
    #[serde(default)]
    pub devices: Vec<DeviceInfo>,
    #[serde(default)]
    pub device_pixel_ratio: Option<f64>,
}

impl HostInfo {
    /// Display language, if the host reported one
    pub fn language(&self) -> Option<&str> {
        self.application.language.as_deref()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplicationInfo {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

/// A control surface attached to the host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub device_type: Option<u32>,
}

/// Initiating action passed to property inspectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionInfo {
    pub action: String,
    pub context: String,
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub payload: Value,
}

/// Payload of the internal `connected` event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedInfo {
    pub port: u16,
    pub uuid: String,
    pub register_event: String,
    pub host_info: HostInfo,
    pub action_info: Option<ActionInfo>,
}
