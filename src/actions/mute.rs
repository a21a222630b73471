use super::key_state;
use crate::action::{Action, ActionContext};
use crate::error::Result;
use crate::protocol::InboundMessage;
use async_trait::async_trait;

/// Toggles mute; state 1 means muted
pub struct Mute;

#[async_trait]
impl Action for Mute {
    fn polls(&self) -> bool {
        true
    }

    async fn on_key_down(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        cx.sonos.set_mute(key_state(event) == 0).await
    }

    async fn refresh(&self, cx: &ActionContext) -> Result<()> {
        let muted = cx.sonos.get_mute().await?;
        cx.set_state(u8::from(muted));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::test_support::{expect_call, fixture, key_event, reply};
    use crate::client::test_support::{drain, events_named};
    use serde_json::json;

    #[tokio::test]
    async fn key_down_mutes_when_unmuted() {
        let f = fixture("mute", json!({})).await;
        expect_call(&f.server, "SetMute", "<DesiredMute>1</DesiredMute>").await;

        Mute.on_key_down(&f.cx, &key_event("keyDown", json!({ "state": 0 })))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn key_down_unmutes_when_muted() {
        let f = fixture("mute", json!({})).await;
        expect_call(&f.server, "SetMute", "<DesiredMute>0</DesiredMute>").await;

        Mute.on_key_down(&f.cx, &key_event("keyDown", json!({ "state": 1 })))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn refresh_mirrors_mute_state() {
        let mut f = fixture("mute", json!({})).await;
        reply(&f.server, "RenderingControl", "GetMute", &[("CurrentMute", "1")]).await;

        Mute.refresh(&f.cx).await.unwrap();

        let sent = drain(&mut f.sent);
        assert_eq!(events_named(&sent, "setState")[0]["payload"]["state"], 1);
    }
}
