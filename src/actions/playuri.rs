use crate::action::{Action, ActionContext};
use crate::error::{DeckError, Result};
use crate::music_service::MusicService;
use crate::protocol::InboundMessage;
use async_trait::async_trait;

/// Plays a streaming service link (Spotify, Tidal, Deezer, Apple Music, TuneIn)
pub struct PlayUri;

#[async_trait]
impl Action for PlayUri {
    async fn on_key_down(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        let settings = event.settings();
        let uri = settings.text("uri").unwrap_or_default();
        let service = MusicService::parse(&uri)
            .ok_or_else(|| DeckError::ContentValidation(format!("Invalid media URI \"{}\"", uri)))?;

        cx.sonos.set_service_uri(&service.uri(), Some(&service.metadata())).await?;
        if settings.flag("play") {
            cx.sonos.play().await?;
        }
        Ok(())
    }
}
