use crate::didl::{self, TrackMetadata};
use crate::error::{DeckError, Result};
use crate::music_service::encode_uri_component;
use crate::soap::{self, ReplyFields, SonosService};
use crate::topology::{self, ZoneTopology};
use crate::types::{BrowseItem, PlayMode};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::OnceCell;

/// Default control port of a Sonos player
pub const DEFAULT_PORT: u16 = 1400;

const HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Page size of a browse request unless the caller asks for another
pub const BROWSE_PAGE_SIZE: u32 = 100;

/// Prefix of radio stream URIs, which bypass the queue
const STREAM_PREFIX: &str = "x-sonosapi-stream:";

/// Object ids accepted by `browse`
pub mod browse_type {
    pub const ARTISTS: &str = "A:ARTIST";
    pub const ARTIST_ALBUMS: &str = "A:ALBUMARTIST";
    pub const ALBUMS: &str = "A:ALBUM";
    pub const GENRES: &str = "A:GENRE";
    pub const COMPOSERS: &str = "A:COMPOSER";
    pub const TRACKS: &str = "A:TRACKS";
    pub const PLAYLISTS: &str = "A:PLAYLISTS";
    pub const SHARES: &str = "S:";
    pub const SONOS_PLAYLISTS: &str = "SQ:";
    pub const CATEGORIES: &str = "A:";
    pub const SONOS_FAVORITES: &str = "FV:2";
    pub const RADIO_STATIONS: &str = "R:0/0";
    pub const RADIO_SHOWS: &str = "R:0/1";
}

/// Reply of `GetTransportInfo`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportInfo {
    /// `PLAYING`, `PAUSED_PLAYBACK`, `STOPPED`, `TRANSITIONING`...
    pub state: String,
    pub status: Option<String>,
    pub speed: Option<String>,
}

impl TransportInfo {
    pub fn is_playing(&self) -> bool {
        self.state == "PLAYING"
    }
}

/// Reply of `GetTransportSettings`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSettings {
    pub play_mode: PlayMode,
}

/// Reply of `GetPositionInfo`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionInfo {
    pub track: i64,
    /// `H:MM:SS`
    pub duration: Option<String>,
    /// Elapsed time, `H:MM:SS`
    pub rel_time: Option<String>,
    pub uri: Option<String>,
    pub metadata: TrackMetadata,
}

/// Reply of `AddURIToQueue`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueResult {
    /// Queue position of the first added track; 0 when nothing was added
    pub first_track_number: i64,
    pub tracks_added: i64,
    pub queue_length: i64,
}

#[derive(Clone)]
struct Session {
    host: String,
    port: u16,
    // fetched once per session, never refreshed
    zone_topology: Arc<OnceCell<ZoneTopology>>,
}

/// Client for the UPnP services of one Sonos player
///
/// Calls fail with [`DeckError::NotConnected`] until [`Sonos::connect`] set
/// the player address. The handle is cheap to clone; clones share the session.
#[derive(Clone)]
pub struct Sonos {
    http: reqwest::Client,
    session: Arc<RwLock<Option<Session>>>,
}

impl Default for Sonos {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Sonos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sonos").field("address", &self.address()).finish()
    }
}

/// Integer field that is allowed to be missing, JavaScript style
fn lenient_int(fields: &ReplyFields, name: &str) -> i64 {
    fields.get(name).and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

impl Sonos {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            session: Arc::new(RwLock::new(None)),
        }
    }

    /// Point the client at a player
    ///
    /// An empty host or a zero port leaves the client disconnected.
    pub fn connect(&self, host: impl Into<String>, port: u16) {
        let host = host.into();
        let session = (!host.is_empty() && port != 0).then(|| Session {
            host,
            port,
            zone_topology: Arc::new(OnceCell::new()),
        });
        match &session {
            Some(s) => tracing::info!("Using Sonos player at {}:{}", s.host, s.port),
            None => tracing::warn!("No Sonos player configured"),
        }
        *self.session.write().unwrap() = session;
    }

    pub fn is_connected(&self) -> bool {
        self.session.read().unwrap().is_some()
    }

    /// Configured `(host, port)`, if any
    pub fn address(&self) -> Option<(String, u16)> {
        self.session
            .read()
            .unwrap()
            .as_ref()
            .map(|s| (s.host.clone(), s.port))
    }

    fn session(&self) -> Result<Session> {
        self.session.read().unwrap().clone().ok_or(DeckError::NotConnected)
    }

    /// Base URL for player-relative album art paths
    fn art_base(&self) -> Result<String> {
        let session = self.session()?;
        Ok(format!("http://{}:{}", session.host, session.port))
    }

    /// Invoke `action` on `service` and return the reply fields
    pub async fn execute(&self, service: &SonosService, action: &str, params: &[(&str, &str)]) -> Result<ReplyFields> {
        let session = self.session()?;
        let url = service.control_url(&session.host, session.port);
        let body = soap::build_envelope(service, action, &soap::with_instance_id(params));

        tracing::debug!("SOAP {}#{} -> {}", service.name, action, url);

        let response = self
            .http
            .post(&url)
            .timeout(HTTP_TIMEOUT)
            .header("SOAPAction", service.soap_action(action))
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=\"utf-8\"")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            tracing::warn!("SOAP {}#{} failed with HTTP {}", service.name, action, status);
            return Err(DeckError::Transport {
                status: status.as_u16(),
                body: text,
            });
        }

        soap::parse_reply(&text)
    }

    async fn av_transport(&self, action: &str, params: &[(&str, &str)]) -> Result<ReplyFields> {
        self.execute(&SonosService::AV_TRANSPORT, action, params).await
    }

    async fn rendering_control(&self, action: &str, params: &[(&str, &str)]) -> Result<ReplyFields> {
        self.execute(&SonosService::RENDERING_CONTROL, action, params).await
    }

    pub async fn get_transport_info(&self) -> Result<TransportInfo> {
        let fields = self.av_transport("GetTransportInfo", &[]).await?;
        Ok(TransportInfo {
            state: fields.require("CurrentTransportState")?.to_string(),
            status: fields.text("CurrentTransportStatus"),
            speed: fields.text("CurrentSpeed"),
        })
    }

    pub async fn get_transport_settings(&self) -> Result<TransportSettings> {
        let fields = self.av_transport("GetTransportSettings", &[]).await?;
        let play_mode = fields
            .require("PlayMode")?
            .parse::<PlayMode>()
            .map_err(DeckError::InvalidResponse)?;
        Ok(TransportSettings { play_mode })
    }

    pub async fn play(&self) -> Result<()> {
        self.av_transport("Play", &[("Speed", "1")]).await?;
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        self.av_transport("Pause", &[]).await?;
        Ok(())
    }

    pub async fn next(&self) -> Result<()> {
        self.av_transport("Next", &[]).await?;
        Ok(())
    }

    pub async fn previous(&self) -> Result<()> {
        self.av_transport("Previous", &[]).await?;
        Ok(())
    }

    /// Seek within the queue or track, e.g. `seek("TRACK_NR", "3")`
    pub async fn seek(&self, unit: &str, target: &str) -> Result<()> {
        self.av_transport("Seek", &[("Unit", unit), ("Target", target)]).await?;
        Ok(())
    }

    pub async fn set_play_mode(&self, mode: PlayMode) -> Result<()> {
        self.av_transport("SetPlayMode", &[("NewPlayMode", mode.as_str())]).await?;
        Ok(())
    }

    pub async fn set_av_transport_uri(&self, uri: &str, metadata: Option<&str>) -> Result<()> {
        self.av_transport(
            "SetAVTransportURI",
            &[("CurrentURI", uri), ("CurrentURIMetaData", metadata.unwrap_or(""))],
        )
        .await?;
        Ok(())
    }

    pub async fn get_position_info(&self) -> Result<PositionInfo> {
        let fields = self.av_transport("GetPositionInfo", &[]).await?;
        let art_base = self.art_base()?;
        let metadata = match fields.get("TrackMetaData") {
            Some(xml) => didl::parse_track(xml, &art_base)?,
            None => TrackMetadata::default(),
        };
        Ok(PositionInfo {
            track: lenient_int(&fields, "Track"),
            duration: fields.text("TrackDuration"),
            rel_time: fields.text("RelTime"),
            uri: fields.text("TrackURI"),
            metadata,
        })
    }

    pub async fn get_mute(&self) -> Result<bool> {
        self.rendering_control("GetMute", &[("Channel", "Master")])
            .await?
            .flag("CurrentMute")
    }

    pub async fn set_mute(&self, mute: bool) -> Result<()> {
        let desired = if mute { "1" } else { "0" };
        self.rendering_control("SetMute", &[("Channel", "Master"), ("DesiredMute", desired)])
            .await?;
        Ok(())
    }

    pub async fn get_volume(&self) -> Result<i64> {
        self.rendering_control("GetVolume", &[("Channel", "Master")])
            .await?
            .int("CurrentVolume")
    }

    /// Set the volume, clamped to `0..=100`
    pub async fn set_volume(&self, volume: i64) -> Result<()> {
        let desired = volume.clamp(0, 100).to_string();
        self.rendering_control("SetVolume", &[("Channel", "Master"), ("DesiredVolume", &desired)])
            .await?;
        Ok(())
    }

    /// Append `uri` to the queue (`position` 0 means at the end)
    pub async fn add_uri_to_queue(&self, uri: &str, metadata: Option<&str>, position: u32, next: bool) -> Result<QueueResult> {
        let position = position.to_string();
        let fields = self
            .av_transport(
                "AddURIToQueue",
                &[
                    ("EnqueuedURI", uri),
                    ("EnqueuedURIMetaData", metadata.unwrap_or("")),
                    ("DesiredFirstTrackNumberEnqueued", &position),
                    ("EnqueueAsNext", if next { "1" } else { "0" }),
                ],
            )
            .await?;
        Ok(QueueResult {
            first_track_number: lenient_int(&fields, "FirstTrackNumberEnqueued"),
            tracks_added: lenient_int(&fields, "NumTracksAdded"),
            queue_length: lenient_int(&fields, "NewQueueLength"),
        })
    }

    /// List the children of a content directory container
    ///
    /// `kind` is one of the [`browse_type`] ids; `categories` narrow it down
    /// (e.g. an artist name) and `term` searches within it. Paging starts at
    /// item 0 with [`BROWSE_PAGE_SIZE`] items unless `start`/`count` say otherwise.
    pub async fn browse(
        &self,
        kind: &str,
        term: Option<&str>,
        categories: &[&str],
        start: Option<u32>,
        count: Option<u32>,
    ) -> Result<Vec<BrowseItem>> {
        let object_id = browse_object_id(kind, term, categories);
        let start = start.unwrap_or(0).to_string();
        let count = count.unwrap_or(BROWSE_PAGE_SIZE).to_string();
        let fields = self
            .execute(
                &SonosService::CONTENT_DIRECTORY,
                "Browse",
                &[
                    ("ObjectID", &object_id),
                    ("BrowseFlag", "BrowseDirectChildren"),
                    ("Filter", "*"),
                    ("StartingIndex", &start),
                    ("RequestedCount", &count),
                    ("SortCriteria", ""),
                ],
            )
            .await?;
        didl::parse_items(fields.get("Result").unwrap_or(""), &self.art_base()?)
    }

    /// First page of the Sonos favorites
    pub async fn favorites(&self) -> Result<Vec<BrowseItem>> {
        self.browse(browse_type::SONOS_FAVORITES, None, &[], None, None).await
    }

    /// Zone groups of the household, fetched on first use
    pub async fn zone_topology(&self) -> Result<ZoneTopology> {
        let session = self.session()?;
        let topology = session
            .zone_topology
            .get_or_try_init(|| async {
                let fields = self
                    .execute(&SonosService::ZONE_GROUP_TOPOLOGY, "GetZoneGroupState", &[])
                    .await?;
                topology::parse_zone_groups(fields.require("ZoneGroupState")?)
            })
            .await?;
        Ok(topology.clone())
    }

    /// Player id of the coordinator of the configured player's group
    pub async fn coordinator(&self) -> Result<String> {
        let session = self.session()?;
        let topology = self.zone_topology().await?;
        topology
            .coordinator_for(&session.host)
            .map(str::to_string)
            .ok_or_else(|| DeckError::InvalidResponse("No zone group found".to_string()))
    }

    /// Switch to a source addressed through the coordinator, `{prefix}:{coordinator}{suffix}`
    pub async fn set_local_transport(&self, prefix: &str, suffix: &str) -> Result<()> {
        let coordinator = self.coordinator().await?;
        let uri = format!("{}:{}{}", prefix, coordinator, suffix);
        self.set_av_transport_uri(&uri, None).await
    }

    /// Make a service URI the current source
    ///
    /// Radio streams replace the transport URI directly. Anything else is
    /// appended to the queue, the queue becomes the source and playback
    /// jumps to the first added track.
    pub async fn set_service_uri(&self, uri: &str, metadata: Option<&str>) -> Result<()> {
        if uri.starts_with(STREAM_PREFIX) {
            return self.set_av_transport_uri(uri, metadata).await;
        }

        let queued = self.add_uri_to_queue(uri, metadata, 0, false).await?;
        if queued.first_track_number == 0 {
            return Err(DeckError::ContentValidation(format!(
                "Failed to add URI \"{}\" to queue",
                uri
            )));
        }

        self.set_local_transport("x-rincon-queue", "#0").await?;
        self.seek("TRACK_NR", &queued.first_track_number.to_string()).await
    }
}

/// Content directory object id for a browse request
fn browse_object_id(kind: &str, term: Option<&str>, categories: &[&str]) -> String {
    let mut object_id = kind.to_string();
    if !categories.is_empty() {
        let encoded: Vec<String> = categories.iter().map(|c| encode_uri_component(c)).collect();
        object_id.push('/');
        object_id.push_str(&encoded.join("/"));
    }
    if let Some(term) = term.filter(|t| !t.is_empty()) {
        object_id.push(':');
        object_id.push_str(&encode_uri_component(term));
    }
    object_id
}
