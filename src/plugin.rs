use crate::action::{ActionContext, ActionInstance, ActionKind};
use crate::client::StreamDeck;
use crate::config::GlobalSettings;
use crate::error::Result;
use crate::protocol::{events, scoped_event, InboundMessage};
use crate::render::KeyRenderer;
use crate::sonos::Sonos;
use crate::subscription::Subscription;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

/// The plugin: routes host events to one [`ActionInstance`] per key placement
///
/// Instances are created on the first event for an unseen context (normally
/// `willAppear`) and live until the plugin is dropped.
pub struct Plugin {
    shared: Arc<Shared>,
    subscriptions: Vec<Subscription>,
}

struct Shared {
    deck: StreamDeck,
    sonos: Sonos,
    renderer: Arc<dyn KeyRenderer>,
    instances: Mutex<HashMap<String, Arc<ActionInstance>>>,
}

impl Plugin {
    /// Register the plugin's handlers on `deck`
    pub fn install(deck: StreamDeck, sonos: Sonos, renderer: Arc<dyn KeyRenderer>) -> Self {
        let shared = Arc::new(Shared {
            deck: deck.clone(),
            sonos,
            renderer,
            instances: Mutex::new(HashMap::new()),
        });
        let mut subscriptions = Vec::new();

        let weak = Arc::downgrade(&shared);
        subscriptions.push(deck.on(events::CONNECTED, move |_| {
            let weak = weak.clone();
            async move {
                match weak.upgrade() {
                    Some(shared) => shared.load_global_settings().await,
                    None => Ok(()),
                }
            }
        }));

        let weak = Arc::downgrade(&shared);
        subscriptions.push(deck.on(events::DID_RECEIVE_GLOBAL_SETTINGS, move |message: InboundMessage| {
            let weak = weak.clone();
            async move {
                if let Some(shared) = weak.upgrade() {
                    let settings = message.payload.get("settings").cloned().unwrap_or(Value::Null);
                    shared.apply_global_settings(GlobalSettings::from_value(settings));
                }
                Ok(())
            }
        }));

        for kind in ActionKind::ALL {
            for event in events::ACTION_EVENTS {
                let weak: Weak<Shared> = Arc::downgrade(&shared);
                let name = scoped_event(&kind.uuid(), event);
                subscriptions.push(deck.on(name, move |message| {
                    let weak = weak.clone();
                    async move {
                        match weak.upgrade() {
                            Some(shared) => shared.route(kind, message).await,
                            None => Ok(()),
                        }
                    }
                }));
            }
        }

        tracing::info!("Registered {} action types", ActionKind::ALL.len());
        Self { shared, subscriptions }
    }

    pub fn deck(&self) -> &StreamDeck {
        &self.shared.deck
    }

    pub fn sonos(&self) -> &Sonos {
        &self.shared.sonos
    }

    /// Number of key placements seen so far
    pub fn instance_count(&self) -> usize {
        self.shared.instances.lock().unwrap().len()
    }

    pub fn instance(&self, context: &str) -> Option<Arc<ActionInstance>> {
        self.shared.instances.lock().unwrap().get(context).cloned()
    }

    /// Remove the plugin's handlers and drop every instance
    pub fn shutdown(self) {
        for subscription in self.subscriptions {
            subscription.unsubscribe();
        }
        self.shared.instances.lock().unwrap().clear();
    }
}

impl Shared {
    async fn load_global_settings(&self) -> Result<()> {
        let settings = self.deck.request_global_settings(None).await?;
        self.apply_global_settings(GlobalSettings::from_value(settings));
        Ok(())
    }

    fn apply_global_settings(&self, settings: GlobalSettings) {
        let host = settings.host.unwrap_or_default();
        if self.sonos.address() == Some((host.clone(), settings.port)) {
            return;
        }
        self.sonos.connect(host, settings.port);
    }

    async fn route(&self, kind: ActionKind, message: InboundMessage) -> Result<()> {
        let Some(context) = message.context.clone() else {
            return Ok(());
        };

        let existing = self.instances.lock().unwrap().get(&context).cloned();
        let instance = match existing {
            Some(instance) => instance,
            // a hidden key that was never seen has nothing to stop
            None if message.event == events::WILL_DISAPPEAR => return Ok(()),
            None => self.instance_for(kind, &context, &message),
        };

        instance.handle(&message).await
    }

    fn instance_for(&self, kind: ActionKind, context: &str, message: &InboundMessage) -> Arc<ActionInstance> {
        let mut instances = self.instances.lock().unwrap();
        instances
            .entry(context.to_string())
            .or_insert_with(|| {
                tracing::debug!("New {} action on {}", kind.name(), context);
                let cx = ActionContext::new(
                    self.deck.clone(),
                    self.sonos.clone(),
                    self.renderer.clone(),
                    kind.uuid(),
                    context,
                    message.settings(),
                );
                Arc::new(ActionInstance::new(kind, cx))
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::test_support::{reply, Recorder};
    use crate::client::test_support::{drain, events_named};
    use serde_json::json;
    use wiremock::MockServer;

    fn message(kind: ActionKind, event: &str, context: &str, payload: Value) -> InboundMessage {
        InboundMessage::new(event, payload).with_action(kind.uuid(), context)
    }

    fn plugin() -> (Plugin, tokio::sync::mpsc::UnboundedReceiver<tokio_tungstenite::tungstenite::Message>) {
        let deck = StreamDeck::new();
        let rx = deck.attach_test_channel("plugin-uuid");
        let plugin = Plugin::install(deck, Sonos::new(), Arc::new(Recorder::default()));
        (plugin, rx)
    }

    #[tokio::test]
    async fn connected_loads_global_settings() {
        let (plugin, mut rx) = plugin();

        let deck = plugin.deck().clone();
        let connected = tokio::spawn(async move {
            deck.dispatch(InboundMessage::new(events::CONNECTED, json!({}))).await;
        });
        let mut sent = Vec::new();
        for _ in 0..10 {
            tokio::task::yield_now().await;
            sent.extend(drain(&mut rx));
        }
        assert_eq!(events_named(&sent, "getGlobalSettings").len(), 1);

        plugin
            .deck()
            .dispatch(InboundMessage::new(
                events::DID_RECEIVE_GLOBAL_SETTINGS,
                json!({ "settings": { "host": "192.168.1.20", "port": "1400" } }),
            ))
            .await;
        connected.await.unwrap();

        assert_eq!(plugin.sonos().address(), Some(("192.168.1.20".to_string(), 1400)));
    }

    #[tokio::test]
    async fn instances_are_created_per_context() {
        let (plugin, mut rx) = plugin();
        let deck = plugin.deck().clone();

        deck.dispatch(message(ActionKind::Volume, events::WILL_APPEAR, "a", json!({ "settings": {} })))
            .await;
        deck.dispatch(message(ActionKind::Volume, events::WILL_APPEAR, "b", json!({ "settings": {} })))
            .await;
        deck.dispatch(message(ActionKind::PlayFavorites, events::WILL_APPEAR, "c", json!({ "settings": {} })))
            .await;
        deck.dispatch(message(ActionKind::Volume, events::WILL_DISAPPEAR, "a", json!({})))
            .await;
        deck.dispatch(message(ActionKind::Mute, events::WILL_DISAPPEAR, "unseen", json!({})))
            .await;

        assert_eq!(plugin.instance_count(), 3);
        assert_eq!(plugin.instance("c").map(|i| i.kind()), Some(ActionKind::PlayFavorites));
        assert!(plugin.instance("unseen").is_none());

        // favorites ask for their settings right away
        let sent = drain(&mut rx);
        let requests = events_named(&sent, "getSettings");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0]["context"], "c");
    }

    #[tokio::test]
    async fn key_errors_show_an_alert() {
        let (plugin, mut rx) = plugin();
        let deck = plugin.deck().clone();

        // no player configured yet
        deck.dispatch(message(ActionKind::Volume, events::KEY_DOWN, "k", json!({ "settings": {} })))
            .await;

        let sent = drain(&mut rx);
        let alerts = events_named(&sent, "showAlert");
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0]["context"], "k");
    }

    #[tokio::test]
    async fn polling_follows_visibility() {
        let server = MockServer::start().await;
        reply(&server, "RenderingControl", "GetMute", &[("CurrentMute", "1")]).await;

        let (plugin, mut rx) = plugin();
        plugin.sonos().connect("127.0.0.1", server.address().port());
        let deck = plugin.deck().clone();

        let settings = json!({ "settings": { "refreshInterval": "0" } });
        deck.dispatch(message(ActionKind::Mute, events::WILL_APPEAR, "m", settings.clone()))
            .await;
        deck.dispatch(message(ActionKind::Mute, events::DID_RECEIVE_SETTINGS, "m", settings))
            .await;

        let instance = plugin.instance("m").unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), async {
            while instance.is_polling() {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();

        let sent = drain(&mut rx);
        let states = events_named(&sent, "setState");
        assert!(!states.is_empty());
        assert!(states.iter().all(|s| s["context"] == "m" && s["payload"]["state"] == 1));

        deck.dispatch(message(ActionKind::Mute, events::WILL_DISAPPEAR, "m", json!({})))
            .await;
        assert!(!instance.is_polling());
        assert_eq!(instance.context().settings().refresh_interval(), 0);
    }

    #[tokio::test]
    async fn shutdown_drops_instances_and_handlers() {
        let (plugin, _rx) = plugin();
        let deck = plugin.deck().clone();
        deck.dispatch(message(ActionKind::Mute, events::WILL_APPEAR, "x", json!({ "settings": {} })))
            .await;
        assert_eq!(plugin.instance_count(), 1);
        let instance = plugin.instance("x").unwrap();

        plugin.shutdown();
        deck.dispatch(message(ActionKind::Mute, events::WILL_APPEAR, "y", json!({ "settings": {} })))
            .await;
        assert_eq!(Arc::strong_count(&instance), 1);
    }
}
