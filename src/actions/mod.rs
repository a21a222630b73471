//! Concrete key and dial actions.

mod adjustvolume;
mod changesource;
mod mute;
mod playfavorites;
mod playpause;
mod playuri;
mod repeat;
mod shuffle;
mod volume;
mod volumedown;

pub use adjustvolume::AdjustVolume;
pub use changesource::ChangeSource;
pub use mute::Mute;
pub use playfavorites::PlayFavorites;
pub use playpause::PlayPause;
pub use playuri::PlayUri;
pub use repeat::RepeatMode;
pub use shuffle::Shuffle;
pub use volume::Volume;
pub use volumedown::VolumeDown;

/// Key state reported with a key or dial event, 0 when absent
fn key_state(event: &crate::protocol::InboundMessage) -> u64 {
    event.state().unwrap_or(0)
}
