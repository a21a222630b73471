use crate::action::{Action, ActionContext};
use crate::error::Result;
use crate::protocol::InboundMessage;
use async_trait::async_trait;

const DEFAULT_STEP: i64 = 10;

/// Lowers the volume by a configurable step
pub struct VolumeDown;

#[async_trait]
impl Action for VolumeDown {
    async fn on_key_down(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        let step = event
            .settings()
            .int("volume")
            .filter(|step| *step != 0)
            .unwrap_or(DEFAULT_STEP);
        let volume = cx.sonos.get_volume().await?;
        cx.sonos.set_volume(volume - step).await
    }
}
