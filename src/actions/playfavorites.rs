use crate::action::{Action, ActionContext};
use crate::error::{DeckError, Result};
use crate::protocol::InboundMessage;
use crate::types::{BrowseItem, Settings};
use async_trait::async_trait;
use serde_json::json;

/// Plays a Sonos favorite picked in the property inspector
pub struct PlayFavorites;

/// Favorite stored as JSON text in the `favorite` setting
///
/// An unset favorite (missing, empty or `null`) is `None`.
fn favorite(settings: &Settings) -> Result<Option<BrowseItem>> {
    match settings.non_empty("favorite") {
        Some(raw) => Ok(serde_json::from_str(&raw)?),
        None => Ok(None),
    }
}

impl PlayFavorites {
    async fn send_favorites(&self, cx: &ActionContext) -> Result<()> {
        let favorites = cx.sonos.favorites().await?;
        tracing::debug!("Sending {} favorites to the property inspector", favorites.len());
        cx.deck
            .send_to_property_inspector(&cx.context, &cx.action, json!({ "favorites": favorites }));
        Ok(())
    }
}

#[async_trait]
impl Action for PlayFavorites {
    fn wants_settings(&self) -> bool {
        true
    }

    async fn on_key_down(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        let settings = event.settings();
        let Some(favorite) = favorite(&settings)? else {
            return Ok(());
        };
        let uri = favorite
            .uri
            .as_deref()
            .ok_or_else(|| DeckError::ContentValidation("Favorite has no URI".to_string()))?;

        cx.sonos.set_service_uri(uri, favorite.metadata.as_deref()).await?;
        if settings.flag("play") {
            cx.sonos.play().await?;
        }
        Ok(())
    }

    async fn on_did_receive_settings(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        let settings = event.settings();
        let art = favorite(&settings)?
            .filter(|_| settings.flag("showAlbumArt"))
            .and_then(|favorite| favorite.album_art_uri);
        match art {
            Some(art) => cx.renderer.draw(&cx.context, &art, None, None).await,
            None => cx.renderer.clear(&cx.context).await,
        }
    }

    async fn on_property_inspector_did_appear(&self, cx: &ActionContext, _event: &InboundMessage) -> Result<()> {
        self.send_favorites(cx).await
    }

    async fn on_send_to_plugin(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        match event.payload.get("request").and_then(|r| r.as_str()) {
            Some("favorites") => self.send_favorites(cx).await,
            _ => Ok(()),
        }
    }
}
