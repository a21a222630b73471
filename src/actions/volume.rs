use crate::action::{Action, ActionContext};
use crate::error::Result;
use crate::protocol::InboundMessage;
use async_trait::async_trait;

const DEFAULT_VOLUME: i64 = 50;

/// Sets a fixed volume
pub struct Volume;

#[async_trait]
impl Action for Volume {
    async fn on_key_down(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        let volume = event.settings().int("volume").unwrap_or(DEFAULT_VOLUME);
        cx.sonos.set_volume(volume).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::test_support::{expect_call, fixture, key_event};
    use serde_json::json;

    #[tokio::test]
    async fn uses_configured_volume() {
        let f = fixture("volume", json!({})).await;
        expect_call(&f.server, "SetVolume", "<DesiredVolume>25</DesiredVolume>").await;

        let event = key_event("keyDown", json!({ "settings": { "volume": "25" } }));
        Volume.on_key_down(&f.cx, &event).await.unwrap();
    }

    #[tokio::test]
    async fn defaults_to_fifty() {
        let f = fixture("volume", json!({})).await;
        expect_call(&f.server, "SetVolume", "<DesiredVolume>50</DesiredVolume>").await;

        Volume
            .on_key_down(&f.cx, &key_event("keyDown", json!({ "settings": {} })))
            .await
            .unwrap();
    }
}
