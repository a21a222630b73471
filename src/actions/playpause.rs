use super::key_state;
use crate::action::{Action, ActionContext};
use crate::error::Result;
use crate::protocol::InboundMessage;
use crate::sonos::PositionInfo;
use crate::types::{KeyTexts, Settings, TitleParameters};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static TIME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d?\d:\d\d:\d\d$").unwrap());
static LEADING_ZERO_HOURS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0+:").unwrap());

/// Play/pause toggle that can show the current album art with track details
///
/// State 1 means playing.
pub struct PlayPause;

fn seconds(time: &str) -> i64 {
    time.split(':')
        .fold(0, |total, part| total * 60 + part.parse::<i64>().unwrap_or(0))
}

/// `HH:MM:SS` within one day
fn clock(seconds: i64) -> String {
    let seconds = seconds.max(0) % 86_400;
    format!("{:02}:{:02}:{:02}", seconds / 3600, seconds % 3600 / 60, seconds % 60)
}

fn trim_hours(time: &str) -> String {
    LEADING_ZERO_HOURS.replace(time, "").into_owned()
}

/// Track details a text slot can show
#[derive(Debug, Default, PartialEq, Eq)]
struct TrackInfo {
    artist: Option<String>,
    title: Option<String>,
    duration: Option<String>,
    elapsed: Option<String>,
    remaining: Option<String>,
}

impl TrackInfo {
    fn from_position(position: &PositionInfo) -> Self {
        let metadata = &position.metadata;
        let mut info = TrackInfo {
            artist: metadata.creator.clone(),
            title: metadata.display_title().map(str::to_string),
            ..Default::default()
        };

        if let (Some(elapsed), Some(duration)) = (position.rel_time.as_deref(), position.duration.as_deref()) {
            if TIME.is_match(elapsed) && TIME.is_match(duration) {
                let remaining = clock(seconds(duration) - seconds(elapsed));
                info.duration = Some(trim_hours(duration));
                info.elapsed = Some(trim_hours(elapsed));
                info.remaining = Some(trim_hours(&remaining));
            }
        }
        info
    }

    fn field(&self, name: Option<String>) -> Option<String> {
        match name.as_deref()? {
            "artist" => self.artist.clone(),
            "title" => self.title.clone(),
            "duration" => self.duration.clone(),
            "elapsed" => self.elapsed.clone(),
            "remaining" => self.remaining.clone(),
            _ => None,
        }
    }
}

/// Text lines for the key: the `paused` text alone while paused, else the
/// fields chosen for the top, middle and bottom slots
fn key_texts(settings: &Settings, state: u8, info: &TrackInfo) -> KeyTexts {
    if state == 0 {
        if let Some(paused) = settings.non_empty("paused") {
            return KeyTexts {
                bottom: Some(paused),
                ..Default::default()
            };
        }
    }
    KeyTexts {
        top: info.field(settings.text("top")),
        middle: info.field(settings.text("middle")),
        bottom: info.field(settings.text("bottom")),
    }
}

fn title_parameters(settings: &Settings) -> TitleParameters {
    settings
        .get("titleParameters")
        .cloned()
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default()
}

impl PlayPause {
    async fn draw_state(&self, cx: &ActionContext, state: u8) -> Result<()> {
        let settings = cx.settings();
        if !settings.flag("showAlbumArt") {
            return cx.renderer.clear(&cx.context).await;
        }

        let position = cx.sonos.get_position_info().await?;
        let Some(art) = position.metadata.album_art_uri.as_deref() else {
            return cx.renderer.clear(&cx.context).await;
        };

        let params = title_parameters(&settings);
        let texts = params
            .show_title
            .then(|| key_texts(&settings, state, &TrackInfo::from_position(&position)));
        cx.renderer
            .draw(&cx.context, art, texts.as_ref(), Some(&params))
            .await
    }
}

#[async_trait]
impl Action for PlayPause {
    fn polls(&self) -> bool {
        true
    }

    async fn on_key_down(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        if key_state(event) == 0 {
            cx.sonos.play().await?;
            self.draw_state(cx, 1).await
        } else {
            cx.sonos.pause().await?;
            self.draw_state(cx, 0).await
        }
    }

    async fn on_title_parameters_did_change(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        let mut settings = event.settings();
        settings.insert("titleParameters", event.title_parameters().unwrap_or(Value::Null));
        cx.deck.set_settings(&cx.context, &settings);
        cx.store_settings(settings);
        self.refresh(cx).await
    }

    async fn refresh(&self, cx: &ActionContext) -> Result<()> {
        let state = u8::from(cx.sonos.get_transport_info().await?.is_playing());
        cx.set_state(state);
        self.draw_state(cx, state).await
    }
}
