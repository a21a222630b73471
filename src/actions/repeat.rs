use super::key_state;
use crate::action::{Action, ActionContext};
use crate::error::Result;
use crate::protocol::InboundMessage;
use crate::types::{PlayMode, Repeat};
use async_trait::async_trait;

/// Cycles repeat off, all and one while keeping the shuffle flag
///
/// Key states: 0 = no repeat, 1 = repeat all, 2 = repeat one.
pub struct RepeatMode;

fn state_of(repeat: Repeat) -> u8 {
    match repeat {
        Repeat::None => 0,
        Repeat::All => 1,
        Repeat::One => 2,
    }
}

/// Repeat flavour selected by pressing a key in `state`
fn next_repeat(state: u64) -> Option<Repeat> {
    match state {
        0 => Some(Repeat::All),
        1 => Some(Repeat::One),
        2 => Some(Repeat::None),
        _ => None,
    }
}

#[async_trait]
impl Action for RepeatMode {
    fn polls(&self) -> bool {
        true
    }

    async fn on_key_down(&self, cx: &ActionContext, event: &InboundMessage) -> Result<()> {
        let mode = cx.sonos.get_transport_settings().await?.play_mode;
        match next_repeat(key_state(event)) {
            Some(repeat) => cx.sonos.set_play_mode(PlayMode::from_parts(mode.is_shuffle(), repeat)).await,
            None => Ok(()),
        }
    }

    async fn refresh(&self, cx: &ActionContext) -> Result<()> {
        let mode = cx.sonos.get_transport_settings().await?.play_mode;
        cx.set_state(state_of(mode.repeat()));
        Ok(())
    }
}
