use crate::actions;
use crate::client::{self, StreamDeck};
use crate::error::{DeckError, Result};
use crate::protocol::{events, InboundMessage};
use crate::render::KeyRenderer;
use crate::scheduler::{PollTarget, Poller};
use crate::sonos::Sonos;
use crate::types::Settings;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Common prefix of every action uuid in the plugin manifest
pub const ACTION_PREFIX: &str = "com.genericmale.sonos.";

/// Everything an action needs to act on one key placement
pub struct ActionContext {
    pub deck: StreamDeck,
    pub sonos: Sonos,
    pub renderer: Arc<dyn KeyRenderer>,
    /// Action uuid, e.g. `com.genericmale.sonos.mute`
    pub action: String,
    /// Placement token
    pub context: String,
    settings: Mutex<Settings>,
}

impl ActionContext {
    pub fn new(
        deck: StreamDeck,
        sonos: Sonos,
        renderer: Arc<dyn KeyRenderer>,
        action: impl Into<String>,
        context: impl Into<String>,
        settings: Settings,
    ) -> Self {
        Self {
            deck,
            sonos,
            renderer,
            action: action.into(),
            context: context.into(),
            settings: Mutex::new(settings),
        }
    }

    /// Last known settings
    pub fn settings(&self) -> Settings {
        self.settings.lock().unwrap().clone()
    }

    pub fn store_settings(&self, settings: Settings) {
        *self.settings.lock().unwrap() = settings;
    }

    /// Switch this key to `state`
    pub fn set_state(&self, state: u8) {
        self.deck.set_state(&self.context, state);
    }
}

/// Behaviour of one action type
///
/// Every hook defaults to doing nothing. Errors returned from a hook are
/// logged and shown as an alert on the key.
#[async_trait]
#[allow(unused_variables)]
pub trait Action: Send + Sync + 'static {
    /// Whether the key mirrors device state through periodic refresh
    fn polls(&self) -> bool {
        false
    }

    /// Whether the action wants its settings pushed right after creation
    fn wants_settings(&self) -> bool {
        false
    }

    /// Read device state and show it on the key
    async fn refresh(&self, cx: &ActionContext) -> Result<()> {
        Ok(())
    }

    async fn on_key_down(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        Ok(())
    }

    async fn on_key_up(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        Ok(())
    }

    async fn on_dial_down(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        Ok(())
    }

    async fn on_dial_rotate(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        Ok(())
    }

    async fn on_dial_up(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        Ok(())
    }

    async fn on_touch_tap(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        Ok(())
    }

    async fn on_did_receive_settings(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        Ok(())
    }

    async fn on_will_appear(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        Ok(())
    }

    async fn on_will_disappear(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        Ok(())
    }

    async fn on_title_parameters_did_change(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        Ok(())
    }

    async fn on_property_inspector_did_appear(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        Ok(())
    }

    async fn on_property_inspector_did_disappear(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        Ok(())
    }

    async fn on_send_to_plugin(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        Ok(())
    }
}

/// The action types shipped with the plugin
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    PlayPause,
    Mute,
    Repeat,
    Shuffle,
    Volume,
    VolumeDown,
    AdjustVolume,
    ChangeSource,
    PlayFavorites,
    PlayUri,
}

impl ActionKind {
    pub const ALL: [ActionKind; 10] = [
        ActionKind::PlayPause,
        ActionKind::Mute,
        ActionKind::Repeat,
        ActionKind::Shuffle,
        ActionKind::Volume,
        ActionKind::VolumeDown,
        ActionKind::AdjustVolume,
        ActionKind::ChangeSource,
        ActionKind::PlayFavorites,
        ActionKind::PlayUri,
    ];

    /// Last segment of the action uuid
    pub fn name(self) -> &'static str {
        match self {
            ActionKind::PlayPause => "playpause",
            ActionKind::Mute => "mute",
            ActionKind::Repeat => "repeat",
            ActionKind::Shuffle => "shuffle",
            ActionKind::Volume => "volume",
            ActionKind::VolumeDown => "volumedown",
            ActionKind::AdjustVolume => "adjustvolume",
            ActionKind::ChangeSource => "changesource",
            ActionKind::PlayFavorites => "playfavorites",
            ActionKind::PlayUri => "playuri",
        }
    }

    /// Full action uuid as declared in the manifest
    pub fn uuid(self) -> String {
        format!("{}{}", ACTION_PREFIX, self.name())
    }

    /// Look up an action type by its uuid; the type is the last dotted segment
    pub fn from_uuid(uuid: &str) -> Option<Self> {
        let name = uuid.rsplit('.').next()?;
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn create(self) -> Arc<dyn Action> {
        match self {
            ActionKind::PlayPause => Arc::new(actions::PlayPause),
            ActionKind::Mute => Arc::new(actions::Mute),
            ActionKind::Repeat => Arc::new(actions::RepeatMode),
            ActionKind::Shuffle => Arc::new(actions::Shuffle),
            ActionKind::Volume => Arc::new(actions::Volume),
            ActionKind::VolumeDown => Arc::new(actions::VolumeDown),
            ActionKind::AdjustVolume => Arc::new(actions::AdjustVolume),
            ActionKind::ChangeSource => Arc::new(actions::ChangeSource),
            ActionKind::PlayFavorites => Arc::new(actions::PlayFavorites),
            ActionKind::PlayUri => Arc::new(actions::PlayUri),
        }
    }
}

/// Adapter letting the scheduler refresh an action
struct Refresher {
    cx: Arc<ActionContext>,
    action: Arc<dyn Action>,
}

#[async_trait]
impl PollTarget for Refresher {
    fn is_connected(&self) -> bool {
        self.cx.sonos.is_connected()
    }

    async fn refresh(&self) -> Result<()> {
        self.action.refresh(&self.cx).await
    }

    fn report_failure(&self, error: &DeckError) {
        client::report(&self.cx.deck, &self.cx.context, error);
    }
}

/// One action placed on a key: its behaviour, context and refresh loop
pub struct ActionInstance {
    kind: ActionKind,
    cx: Arc<ActionContext>,
    action: Arc<dyn Action>,
    poller: Option<Mutex<Poller>>,
}

impl ActionInstance {
    pub fn new(kind: ActionKind, cx: ActionContext) -> Self {
        let cx = Arc::new(cx);
        let action = kind.create();
        let poller = action.polls().then(|| {
            let mut poller = Poller::new(Arc::new(Refresher {
                cx: cx.clone(),
                action: action.clone(),
            }));
            poller.set_interval(cx.settings().refresh_interval());
            Mutex::new(poller)
        });

        if action.wants_settings() {
            cx.deck.get_settings(&cx.context);
        }

        Self {
            kind,
            cx,
            action,
            poller,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.kind
    }

    pub fn context(&self) -> &ActionContext {
        &self.cx
    }

    /// Whether the scheduler currently has a loop for this instance
    pub fn is_polling(&self) -> bool {
        self.poller
            .as_ref()
            .is_some_and(|poller| poller.lock().unwrap().is_running())
    }

    fn with_poller(&self, f: impl FnOnce(&mut Poller)) {
        if let Some(poller) = &self.poller {
            f(&mut *poller.lock().unwrap());
        }
    }

    /// Route an action-scoped event to the matching hook
    pub async fn handle(&self, event: &InboundMessage) -> Result<()> {
        let cx = self.cx.as_ref();
        match event.event.as_str() {
            events::DID_RECEIVE_SETTINGS => {
                let settings = event.settings();
                let interval = settings.refresh_interval();
                cx.store_settings(settings);
                self.with_poller(|poller| {
                    poller.set_interval(interval);
                    poller.start();
                });
                self.action.on_did_receive_settings(cx, event).await
            }
            events::WILL_APPEAR => {
                self.with_poller(Poller::appear);
                self.action.on_will_appear(cx, event).await
            }
            events::WILL_DISAPPEAR => {
                self.with_poller(Poller::disappear);
                self.action.on_will_disappear(cx, event).await
            }
            events::KEY_DOWN => self.action.on_key_down(cx, event).await,
            events::KEY_UP => self.action.on_key_up(cx, event).await,
            events::DIAL_DOWN => self.action.on_dial_down(cx, event).await,
            events::DIAL_ROTATE => self.action.on_dial_rotate(cx, event).await,
            events::DIAL_UP => self.action.on_dial_up(cx, event).await,
            events::TOUCH_TAP => self.action.on_touch_tap(cx, event).await,
            events::TITLE_PARAMETERS_DID_CHANGE => self.action.on_title_parameters_did_change(cx, event).await,
            events::PROPERTY_INSPECTOR_DID_APPEAR => self.action.on_property_inspector_did_appear(cx, event).await,
            events::PROPERTY_INSPECTOR_DID_DISAPPEAR => {
                self.action.on_property_inspector_did_disappear(cx, event).await
            }
            events::SEND_TO_PLUGIN => self.action.on_send_to_plugin(cx, event).await,
            other => {
                tracing::debug!("{} ignores {}", self.kind.name(), other);
                Ok(())
            }
        }
    }
}
