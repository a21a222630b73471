//! Stream Deck plugin core for controlling Sonos speakers
//!
//! This library implements the plugin side of the Stream Deck application's
//! WebSocket protocol and the Sonos UPnP/SOAP control surface the plugin's
//! keys need. It supports:
//!
//! - Registration with the Stream Deck application and event fan-out
//! - Request/reply correlation for settings round-trips
//! - Per-key action instances with visibility-aware state polling
//! - Transport, volume, mute and play mode control of a Sonos player
//! - Line-in, TV and queue sources, favorites and streaming service links
//!
//! # Quick Start
//!
//! ```no_run
//! use sonos_deck::{HostRenderer, Plugin, Sonos, StreamDeck};
//! use std::sync::Arc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let deck = StreamDeck::new();
//!     let renderer = Arc::new(HostRenderer::new(deck.clone()));
//!     let _plugin = Plugin::install(deck.clone(), Sonos::new(), renderer);
//!
//!     // Arguments normally come from the Stream Deck application
//!     deck.connect(28196, "PLUGIN-UUID", "registerPlugin", r#"{"application":{}}"#, None)
//!         .await?;
//!     deck.closed().await;
//!     Ok(())
//! }
//! ```
//!
//! # Talking to a player directly
//!
//! ```no_run
//! use sonos_deck::{MusicService, Sonos};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sonos = Sonos::new();
//!     sonos.connect("192.168.1.20", 1400);
//!
//!     let link = "https://open.spotify.com/album/4aawyAB9vmqN3uQ7FjRGTy";
//!     if let Some(service) = MusicService::parse(link) {
//!         sonos.set_service_uri(&service.uri(), Some(&service.metadata())).await?;
//!         sonos.play().await?;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **Client**: host connection, event routing and outgoing commands
//! - **Plugin**: one action instance per key placement
//! - **Scheduler**: periodic refresh of visible keys
//! - **Sonos**: SOAP commands against the configured player
//! - **Music service**: share links to playable URIs and metadata
//! - **Protocol**: JSON message structures

mod action;
mod actions;
mod client;
mod config;
mod connection;
mod correlation;
mod didl;
mod error;
mod music_service;
mod plugin;
mod protocol;
mod render;
mod scheduler;
mod soap;
mod sonos;
mod subscription;
mod topology;
mod types;

// Public exports
pub use action::{Action, ActionContext, ActionInstance, ActionKind, ACTION_PREFIX};
pub use client::StreamDeck;
pub use config::{normalize_args, GlobalSettings, LaunchArgs};
pub use didl::TrackMetadata;
pub use error::{DeckError, Result};
pub use music_service::{ContentType, MusicService};
pub use plugin::Plugin;
pub use protocol::{events, ActionInfo, HostInfo, InboundMessage, OutboundEvent, Target};
pub use render::{HostRenderer, KeyRenderer};
pub use scheduler::{PollTarget, Poller};
pub use soap::{ReplyFields, SonosService};
pub use sonos::{
    browse_type, PositionInfo, QueueResult, Sonos, TransportInfo, TransportSettings, BROWSE_PAGE_SIZE,
    DEFAULT_PORT,
};
pub use subscription::Subscription;
pub use topology::{ZoneGroup, ZoneMember, ZoneTopology};
pub use types::{BrowseItem, KeyTexts, PlayMode, Repeat, Settings, TitleParameters};
