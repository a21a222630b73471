use crate::action::{Action, ActionContext};
use crate::error::Result;
use crate::protocol::InboundMessage;
use async_trait::async_trait;

/// Dial action: rotate to change the volume, press to toggle mute
pub struct AdjustVolume;

#[async_trait]
impl Action for AdjustVolume {
    async fn on_dial_rotate(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        let volume = cx.sonos.get_volume().await?;
        cx.sonos.set_volume(volume + event.ticks()).await
    }

    async fn on_dial_down(&self, cx: &ActionContext, _event: &InboundMessage) -> Result<()> {
        let muted = cx.sonos.get_mute().await?;
        cx.sonos.set_mute(!muted).await
    }
}
