use crate::connection::Connection;
use crate::correlation::{CorrelationKey, CorrelationTable, DEFAULT_TIMEOUT};
use crate::error::{DeckError, Result};
use crate::protocol::{
    events, ActionInfo, ConnectedInfo, HostInfo, InboundMessage, OutboundEvent, OutboundMessage,
    Registration, Target,
};
use crate::subscription::{EventHub, Subscription};
use crate::types::Settings;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;

/// Client for the Stream Deck plugin protocol
///
/// `StreamDeck` owns the WebSocket to the Stream Deck application, fans
/// incoming events out to registered handlers and offers the outgoing
/// commands (titles, images, states, settings). It is cheap to clone; all
/// clones share one connection.
#[derive(Clone)]
pub struct StreamDeck {
    inner: Arc<Inner>,
}

struct Inner {
    hub: EventHub,
    pending: CorrelationTable,
    connection: Mutex<Option<Connection>>,
    identity: Mutex<Identity>,
}

#[derive(Default)]
struct Identity {
    uuid: String,
    host_info: HostInfo,
    action_info: Option<ActionInfo>,
}

impl Default for StreamDeck {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDeck {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                hub: EventHub::new(),
                pending: CorrelationTable::new(),
                connection: Mutex::new(None),
                identity: Mutex::new(Identity::default()),
            }),
        }
    }

    /// Connect to the Stream Deck application on `127.0.0.1:{port}`
    ///
    /// Any existing connection is closed first. Once the socket is open the
    /// registration message is sent and a `connected` event is emitted with
    /// the parsed host information.
    pub async fn connect(
        &self,
        port: u16,
        plugin_uuid: impl Into<String>,
        register_event: impl Into<String>,
        info: &str,
        action_info: Option<&str>,
    ) -> Result<()> {
        self.connect_url(format!("ws://127.0.0.1:{}", port), port, plugin_uuid, register_event, info, action_info)
            .await
    }

    /// Like [`StreamDeck::connect`] but against an explicit URL
    pub async fn connect_url(
        &self,
        url: impl Into<String>,
        port: u16,
        plugin_uuid: impl Into<String>,
        register_event: impl Into<String>,
        info: &str,
        action_info: Option<&str>,
    ) -> Result<()> {
        let uuid = plugin_uuid.into();
        let register_event = register_event.into();
        let host_info: HostInfo = serde_json::from_str(info)?;
        let action_info: Option<ActionInfo> = match action_info {
            Some(raw) if !raw.is_empty() => Some(serde_json::from_str(raw)?),
            _ => None,
        };

        self.disconnect();

        {
            let mut identity = self.inner.identity.lock().unwrap();
            identity.uuid = uuid.clone();
            identity.host_info = host_info.clone();
            identity.action_info = action_info.clone();
        }

        let weak = Arc::downgrade(&self.inner);
        let connection = Connection::connect(url, move |text| Self::on_text(&weak, text)).await?;

        let registration = Registration {
            event: register_event.clone(),
            uuid: uuid.clone(),
        };
        connection.send_text(serde_json::to_string(&registration)?)?;
        *self.inner.connection.lock().unwrap() = Some(connection);

        let connected = ConnectedInfo {
            port,
            uuid,
            register_event,
            host_info,
            action_info,
        };
        let message = InboundMessage::new(events::CONNECTED, serde_json::to_value(&connected)?);
        let deck = self.clone();
        tokio::spawn(async move { deck.dispatch(message).await });

        Ok(())
    }

    /// Close the current connection, if any
    pub fn disconnect(&self) {
        if let Some(mut connection) = self.inner.connection.lock().unwrap().take() {
            tracing::info!("Closing existing Stream Deck connection");
            connection.close();
        }
        self.inner.pending.clear();
    }

    /// Whether a live connection exists
    pub fn is_connected(&self) -> bool {
        self.inner
            .connection
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|c| !c.is_closed())
    }

    /// Resolves once the current connection is gone
    pub async fn closed(&self) {
        let rx: Option<watch::Receiver<bool>> = self
            .inner
            .connection
            .lock()
            .unwrap()
            .as_ref()
            .map(Connection::closed);
        if let Some(mut rx) = rx {
            let _ = rx.wait_for(|closed| *closed).await;
        }
    }

    /// Plugin (or property inspector) uuid used for plugin-scoped events
    pub fn uuid(&self) -> String {
        self.inner.identity.lock().unwrap().uuid.clone()
    }

    /// Host application information received at launch
    pub fn host_info(&self) -> HostInfo {
        self.inner.identity.lock().unwrap().host_info.clone()
    }

    /// Initiating action, only present for property inspectors
    pub fn action_info(&self) -> Option<ActionInfo> {
        self.inner.identity.lock().unwrap().action_info.clone()
    }

    fn on_text(inner: &Weak<Inner>, text: String) {
        let Some(inner) = inner.upgrade() else {
            return;
        };
        tracing::debug!("Received: {}", text);

        let message: InboundMessage = match serde_json::from_str(&text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("Ignoring malformed message: {}", e);
                return;
            }
        };
        if message.event.is_empty() {
            return;
        }

        let deck = StreamDeck { inner };
        tokio::spawn(async move { deck.dispatch(message).await });
    }

    // ========== Events ==========

    /// Register a handler for an event name
    ///
    /// Names are either bare events (`keyDown`) or action-scoped ones
    /// (`com.genericmale.sonos.mute.keyDown`). A handler error is logged and
    /// shows an alert on the originating key; other handlers still run.
    pub fn on<F, Fut>(&self, name: impl Into<String>, handler: F) -> Subscription
    where
        F: Fn(InboundMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.inner.hub.subscribe(name, handler)
    }

    /// Deliver an inbound message to waiters and handlers
    ///
    /// Every handler runs on its own task; this returns once all of them
    /// have settled.
    pub async fn dispatch(&self, message: InboundMessage) {
        self.resolve_pending(&message);

        let mut handlers = self.inner.hub.handlers(&message.event);
        if let Some(scoped) = message.scoped_event() {
            handlers.extend(self.inner.hub.handlers(&scoped));
        }

        let tasks: Vec<_> = handlers
            .into_iter()
            .map(|handler| tokio::spawn(handler(message.clone())))
            .collect();

        for task in tasks {
            let failure = match task.await {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => e.to_string(),
                Err(e) => format!("handler panicked: {}", e),
            };
            tracing::error!("Handler for {} failed: {}", message.event, failure);
            self.log_message(&format!("{} failed: {}", message.event, failure));
            let context = message.context.clone().unwrap_or_else(|| self.uuid());
            self.show_alert(&context);
        }
    }

    fn resolve_pending(&self, message: &InboundMessage) {
        let key = match message.event.as_str() {
            events::DID_RECEIVE_SETTINGS => {
                CorrelationKey::new(events::DID_RECEIVE_SETTINGS, message.context.as_deref())
            }
            events::DID_RECEIVE_GLOBAL_SETTINGS => {
                CorrelationKey::new(events::DID_RECEIVE_GLOBAL_SETTINGS, None)
            }
            _ => return,
        };
        let settings = message.payload.get("settings").cloned().unwrap_or(Value::Null);
        self.inner.pending.resolve(&key, settings);
    }

    // ========== Sending ==========

    /// Push an event to the Stream Deck application
    ///
    /// Failures are logged; the plugin keeps running without a host link.
    pub fn send(&self, event: OutboundEvent, context: &str, payload: Option<Value>, extra: Map<String, Value>) {
        let message = OutboundMessage {
            event,
            context: context.to_string(),
            payload,
            extra,
        };
        let text = match serde_json::to_string(&message) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Failed to encode {:?}: {}", event, e);
                return;
            }
        };

        let connection = self.inner.connection.lock().unwrap();
        match connection.as_ref() {
            Some(connection) => {
                if let Err(e) = connection.send_text(text) {
                    tracing::warn!("Failed to send {:?}: {}", event, e);
                }
            }
            None => tracing::warn!("Not connected, dropping {:?}", event),
        }
    }

    fn send_plain(&self, event: OutboundEvent, context: &str, payload: Option<Value>) {
        self.send(event, context, payload, Map::new());
    }

    /// Save an action's persistent settings
    pub fn set_settings(&self, context: &str, settings: &Settings) {
        self.send_plain(OutboundEvent::SetSettings, context, Some(settings.clone().into_value()));
    }

    /// Ask for an action's settings without waiting; the reply arrives as `didReceiveSettings`
    pub fn get_settings(&self, context: &str) {
        self.send_plain(OutboundEvent::GetSettings, context, None);
    }

    /// Request an action's settings and wait for the reply (default timeout 5 s)
    pub async fn request_settings(&self, context: &str, timeout: Option<Duration>) -> Result<Settings> {
        let key = CorrelationKey::new(events::DID_RECEIVE_SETTINGS, Some(context));
        let pending = self.inner.pending.register(key, timeout.unwrap_or(DEFAULT_TIMEOUT));
        self.get_settings(context);
        let value = self.inner.pending.wait(pending).await?;
        Ok(Settings::from_value(value))
    }

    /// Save the plugin's global settings
    pub fn set_global_settings(&self, settings: &Value) {
        self.send_plain(OutboundEvent::SetGlobalSettings, &self.uuid(), Some(settings.clone()));
    }

    /// Request the plugin's global settings and wait for the reply (default timeout 5 s)
    pub async fn request_global_settings(&self, timeout: Option<Duration>) -> Result<Value> {
        let key = CorrelationKey::new(events::DID_RECEIVE_GLOBAL_SETTINGS, None);
        let pending = self.inner.pending.register(key, timeout.unwrap_or(DEFAULT_TIMEOUT));
        self.send_plain(OutboundEvent::GetGlobalSettings, &self.uuid(), None);
        self.inner.pending.wait(pending).await
    }

    /// Open a URL in the default browser
    pub fn open_url(&self, url: &str) {
        self.send_plain(OutboundEvent::OpenUrl, &self.uuid(), Some(json!({ "url": url })));
    }

    /// Write to the Stream Deck log file
    pub fn log_message(&self, message: &str) {
        self.send_plain(OutboundEvent::LogMessage, &self.uuid(), Some(json!({ "message": message })));
    }

    /// Set the title of a key; `None` restores the user's title
    pub fn set_title(&self, context: &str, title: Option<&str>, target: Target, state: Option<u8>) {
        let payload = json!({ "title": title, "target": target.code(), "state": state });
        self.send_plain(OutboundEvent::SetTitle, context, Some(payload));
    }

    /// Set the image of a key (base64 data URL or SVG); `None` restores the default
    pub fn set_image(&self, context: &str, image: Option<&str>, target: Target, state: Option<u8>) {
        let payload = json!({ "image": image, "target": target.code(), "state": state });
        self.send_plain(OutboundEvent::SetImage, context, Some(payload));
    }

    /// Show the alert triangle on a key
    pub fn show_alert(&self, context: &str) {
        self.send_plain(OutboundEvent::ShowAlert, context, None);
    }

    /// Show the check mark on a key
    pub fn show_ok(&self, context: &str) {
        self.send_plain(OutboundEvent::ShowOk, context, None);
    }

    /// Switch a multi-state action to `state`
    pub fn set_state(&self, context: &str, state: u8) {
        self.send_plain(OutboundEvent::SetState, context, Some(json!({ "state": state })));
    }

    /// Switch the active profile on a device
    pub fn switch_to_profile(&self, profile: &str, device: &str) {
        let mut extra = Map::new();
        extra.insert("device".into(), json!(device));
        self.send(OutboundEvent::SwitchToProfile, &self.uuid(), Some(json!({ "profile": profile })), extra);
    }

    /// Send a payload to the property inspector of `context`
    pub fn send_to_property_inspector(&self, context: &str, action: &str, payload: Value) {
        let mut extra = Map::new();
        extra.insert("action".into(), json!(action));
        self.send(OutboundEvent::SendToPropertyInspector, context, Some(payload), extra);
    }

    /// Send a payload from a property inspector to the plugin
    pub fn send_to_plugin(&self, payload: Value, action: Option<&str>) {
        let action = action
            .map(str::to_string)
            .or_else(|| self.action_info().map(|info| info.action));
        let mut extra = Map::new();
        if let Some(action) = action {
            extra.insert("action".into(), json!(action));
        }
        self.send(OutboundEvent::SendToPlugin, &self.uuid(), Some(payload), extra);
    }

    /// Attach a channel-backed connection so tests can observe outgoing frames
    #[cfg(test)]
    pub(crate) fn attach_test_channel(
        &self,
        uuid: &str,
    ) -> tokio::sync::mpsc::UnboundedReceiver<tokio_tungstenite::tungstenite::Message> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        self.inner.identity.lock().unwrap().uuid = uuid.to_string();
        *self.inner.connection.lock().unwrap() = Some(Connection::detached(tx));
        rx
    }
}

impl std::fmt::Debug for StreamDeck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamDeck").field("uuid", &self.uuid()).finish()
    }
}

/// Surface an error raised outside a handler as an alert on `context`
pub(crate) fn report(deck: &StreamDeck, context: &str, error: &DeckError) {
    tracing::warn!("Action {} failed: {}", context, error);
    deck.show_alert(context);
}

#[cfg(test)]
pub(crate) mod test_support {
    use serde_json::Value;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio_tungstenite::tungstenite::Message;

    /// Drain every queued outgoing frame as JSON
    pub fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<Value> {
        let mut sent = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            sent.push(serde_json::from_str(&text).unwrap());
        }
        sent
    }

    /// Events (by name) among drained frames
    pub fn events_named<'a>(sent: &'a [Value], event: &str) -> Vec<&'a Value> {
        sent.iter().filter(|m| m["event"] == event).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{drain, events_named};
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key_down(context: &str) -> InboundMessage {
        InboundMessage::new(events::KEY_DOWN, json!({ "state": 0 }))
            .with_action("com.genericmale.sonos.mute", context)
    }

    #[tokio::test]
    async fn failing_handler_does_not_block_sibling_and_shows_alert() {
        let deck = StreamDeck::new();
        let mut rx = deck.attach_test_channel("plugin-uuid");
        let calls = Arc::new(AtomicUsize::new(0));

        deck.on(events::KEY_DOWN, |_| async { Err(DeckError::ContentValidation("boom".into())) });
        let counter = calls.clone();
        deck.on(events::KEY_DOWN, move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        deck.dispatch(key_down("ctx-1")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let sent = drain(&mut rx);
        let alerts = events_named(&sent, "showAlert");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["context"], "ctx-1");
        let logs = events_named(&sent, "logMessage");
        assert_eq!(logs[0]["payload"]["message"], "keyDown failed: Invalid content: boom");
    }

    #[tokio::test]
    async fn panicking_handler_is_isolated() {
        let deck = StreamDeck::new();
        let mut rx = deck.attach_test_channel("plugin-uuid");
        let calls = Arc::new(AtomicUsize::new(0));

        deck.on(events::KEY_DOWN, |message: InboundMessage| async move {
            assert!(message.context.is_none(), "handler bug");
            Ok(())
        });
        let counter = calls.clone();
        deck.on(events::KEY_DOWN, move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        deck.dispatch(key_down("ctx-2")).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(events_named(&drain(&mut rx), "showAlert").len(), 1);
    }

    #[tokio::test]
    async fn emits_bare_and_scoped_events() {
        let deck = StreamDeck::new();
        let _rx = deck.attach_test_channel("plugin-uuid");
        let seen = Arc::new(Mutex::new(Vec::new()));

        for name in ["keyDown", "com.genericmale.sonos.mute.keyDown", "com.genericmale.sonos.shuffle.keyDown"] {
            let seen = seen.clone();
            deck.on(name, move |_| {
                let seen = seen.clone();
                async move {
                    seen.lock().unwrap().push(name);
                    Ok(())
                }
            });
        }

        deck.dispatch(key_down("ctx")).await;

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec!["com.genericmale.sonos.mute.keyDown", "keyDown"]);
    }

    #[tokio::test(start_paused = true)]
    async fn request_settings_resolves_with_matching_context() {
        let deck = StreamDeck::new();
        let mut rx = deck.attach_test_channel("plugin-uuid");

        let requester = deck.clone();
        let request = tokio::spawn(async move { requester.request_settings("ctx-a", None).await });
        tokio::task::yield_now().await;

        let sent = drain(&mut rx);
        assert_eq!(events_named(&sent, "getSettings")[0]["context"], "ctx-a");

        let other = InboundMessage::new(events::DID_RECEIVE_SETTINGS, json!({ "settings": { "v": "other" } }))
            .with_action("com.genericmale.sonos.mute", "ctx-b");
        deck.dispatch(other).await;
        let reply = InboundMessage::new(events::DID_RECEIVE_SETTINGS, json!({ "settings": { "v": "mine" } }))
            .with_action("com.genericmale.sonos.mute", "ctx-a");
        deck.dispatch(reply).await;

        let settings = request.await.unwrap().unwrap();
        assert_eq!(settings.text("v").as_deref(), Some("mine"));
    }

    #[tokio::test(start_paused = true)]
    async fn request_global_settings_times_out() {
        let deck = StreamDeck::new();
        let mut rx = deck.attach_test_channel("plugin-uuid");

        let err = deck
            .request_global_settings(Some(Duration::from_millis(5000)))
            .await
            .unwrap_err();
        assert!(matches!(err, DeckError::Timeout { .. }));

        let sent = drain(&mut rx);
        assert_eq!(events_named(&sent, "getGlobalSettings")[0]["context"], "plugin-uuid");

        // a late reply reaches ordinary handlers but no waiter
        let late = Arc::new(AtomicUsize::new(0));
        let counter = late.clone();
        deck.on(events::DID_RECEIVE_GLOBAL_SETTINGS, move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        deck.dispatch(InboundMessage::new(events::DID_RECEIVE_GLOBAL_SETTINGS, json!({ "settings": {} })))
            .await;
        assert_eq!(late.load(Ordering::SeqCst), 1);
        assert!(deck.inner.pending.is_empty());
    }

    #[tokio::test]
    async fn outgoing_commands_use_expected_shape() {
        let deck = StreamDeck::new();
        let mut rx = deck.attach_test_channel("plugin-uuid");

        deck.set_state("ctx", 1);
        deck.set_title("ctx", Some("Hi"), Target::Both, None);
        deck.open_url("https://example.com");
        deck.send_to_property_inspector("ctx", "com.genericmale.sonos.playfavorites", json!({ "a": 1 }));

        let sent = drain(&mut rx);
        assert_eq!(sent[0], json!({ "event": "setState", "context": "ctx", "payload": { "state": 1 } }));
        assert_eq!(sent[1]["payload"]["title"], "Hi");
        assert_eq!(sent[1]["payload"]["target"], 0);
        assert_eq!(sent[2]["context"], "plugin-uuid");
        assert_eq!(sent[2]["payload"]["url"], "https://example.com");
        assert_eq!(sent[3]["action"], "com.genericmale.sonos.playfavorites");
    }

    #[tokio::test]
    async fn send_without_connection_is_silent() {
        let deck = StreamDeck::new();
        deck.show_ok("ctx");
        assert!(!deck.is_connected());
    }
}
