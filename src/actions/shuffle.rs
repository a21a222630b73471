use super::key_state;
use crate::action::{Action, ActionContext};
use crate::error::Result;
use crate::protocol::InboundMessage;
use crate::types::PlayMode;
use async_trait::async_trait;

/// Toggles shuffle while keeping the repeat flavour; state 1 means shuffling
pub struct Shuffle;

#[async_trait]
impl Action for Shuffle {
    fn polls(&self) -> bool {
        true
    }

    async fn on_key_down(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        let mode = cx.sonos.get_transport_settings().await?.play_mode;
        let shuffle = key_state(event) == 0;
        cx.sonos.set_play_mode(PlayMode::from_parts(shuffle, mode.repeat())).await
    }

    async fn refresh(&self, cx: &ActionContext) -> Result<()> {
        let mode = cx.sonos.get_transport_settings().await?.play_mode;
        cx.set_state(u8::from(mode.is_shuffle()));
        Ok(())
    }
}
