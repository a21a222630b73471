//! Mapping of streaming service links to Sonos playable URIs.
//!
//! A link such as `https://open.spotify.com/track/abc123` is matched against
//! a fixed list of service patterns. The first match yields a
//! [`MusicService`] reference which knows how to address the item on the
//! player (`uri`) and how to describe it (`metadata`, a DIDL-Lite fragment).
//! Nothing here touches the network.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;
use std::sync::LazyLock;

/// Characters left alone by JavaScript's `encodeURIComponent`
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a URI component the way browsers do
pub fn encode_uri_component(s: &str) -> String {
    utf8_percent_encode(s, URI_COMPONENT).to_string()
}

/// Sonos vocabulary for one kind of content
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UriType {
    /// Prefix of the playable URI
    pub prefix: &'static str,
    /// Prefix of the DIDL item id
    pub key: &'static str,
    /// UPnP object class
    pub class: &'static str,
}

/// Kind of content a link points to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Album,
    Episode,
    Track,
    Show,
    Song,
    Playlist,
    Radio,
}

impl ContentType {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "album" => Some(ContentType::Album),
            "episode" => Some(ContentType::Episode),
            "track" => Some(ContentType::Track),
            "show" => Some(ContentType::Show),
            "song" => Some(ContentType::Song),
            "playlist" => Some(ContentType::Playlist),
            "radio" => Some(ContentType::Radio),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ContentType::Album => "album",
            ContentType::Episode => "episode",
            ContentType::Track => "track",
            ContentType::Show => "show",
            ContentType::Song => "song",
            ContentType::Playlist => "playlist",
            ContentType::Radio => "radio",
        }
    }

    pub fn uri_type(self) -> UriType {
        match self {
            ContentType::Album => UriType {
                prefix: "x-rincon-cpcontainer:1004206c",
                key: "00040000",
                class: "object.container.album.musicAlbum",
            },
            ContentType::Episode | ContentType::Track => UriType {
                prefix: "",
                key: "00032020",
                class: "object.item.audioItem.musicTrack",
            },
            ContentType::Show | ContentType::Playlist => UriType {
                prefix: "x-rincon-cpcontainer:1006206c",
                key: "1006206c",
                class: "object.container.playlistContainer",
            },
            ContentType::Song => UriType {
                prefix: "",
                key: "10032020",
                class: "object.item.audioItem.musicTrack",
            },
            ContentType::Radio => UriType {
                prefix: "x-sonosapi-stream:",
                key: "F00092020",
                class: "object.item.audioItem.audioBroadcast",
            },
        }
    }
}

/// A streaming service item expressed in Sonos terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MusicService {
    service_id: u32,
    content_type: ContentType,
    encoded_uri: String,
    broadcast_id: Option<u32>,
}

type Matcher = fn(&str) -> Option<MusicService>;

const MATCHERS: &[Matcher] = &[spotify, tidal, deezer, apple_music, tunein];

static SPOTIFY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"spotify.*[:/](album|episode|playlist|show|track)[:/](\w+)").unwrap());
static TIDAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https://tidal.*[:/](album|track|playlist)[:/]([\w-]+)").unwrap());
static DEEZER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https://www\.deezer.*[:/](album|track|playlist)[:/]([\w-]+)").unwrap());
static APPLE_MUSIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://music\.apple\.com/\w+/(album|playlist)/[^/]+/(?:pl\.)?([-a-zA-Z0-9]+)(?:\?i=(\d+))?")
        .unwrap()
});
static TUNEIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https://tunein\.com/(radio)/.*(s\d+)").unwrap());

fn spotify(uri: &str) -> Option<MusicService> {
    let caps = SPOTIFY.captures(uri)?;
    MusicService::new(2311, &caps[1], &format!("spotify:{}:{}", &caps[1], &caps[2]), None)
}

fn tidal(uri: &str) -> Option<MusicService> {
    let caps = TIDAL.captures(uri)?;
    MusicService::new(44551, &caps[1], &format!("{}/{}", &caps[1], &caps[2]), None)
}

fn deezer(uri: &str) -> Option<MusicService> {
    let caps = DEEZER.captures(uri)?;
    MusicService::new(519, &caps[1], &format!("{}-{}", &caps[1], &caps[2]), None)
}

fn apple_music(uri: &str) -> Option<MusicService> {
    let caps = APPLE_MUSIC.captures(uri)?;
    // a `?i=` parameter selects one song of the album
    let (kind, id) = match caps.get(3) {
        Some(song) => ("song", song.as_str()),
        None => (&caps[1], &caps[2]),
    };
    MusicService::new(52231, kind, &format!("{}:{}", kind, id), None)
}

fn tunein(uri: &str) -> Option<MusicService> {
    let caps = TUNEIN.captures(uri)?;
    MusicService::new(65031, &caps[1], &caps[2], Some(254))
}

impl MusicService {
    fn new(service_id: u32, kind: &str, uri: &str, broadcast_id: Option<u32>) -> Option<Self> {
        Some(Self {
            service_id,
            content_type: ContentType::from_name(kind)?,
            encoded_uri: encode_uri_component(uri),
            broadcast_id,
        })
    }

    /// Resolve a streaming service link; `None` when no service recognizes it
    pub fn parse(uri: &str) -> Option<Self> {
        MATCHERS.iter().find_map(|matcher| matcher(uri))
    }

    /// Sonos music service id (e.g. 2311 for Spotify)
    pub fn service_id(&self) -> u32 {
        self.service_id
    }

    pub fn content_type(&self) -> ContentType {
        self.content_type
    }

    /// Percent-encoded service-specific id
    pub fn encoded_uri(&self) -> &str {
        &self.encoded_uri
    }

    pub fn broadcast_id(&self) -> Option<u32> {
        self.broadcast_id
    }

    /// URI to hand to `SetAVTransportURI` / `AddURIToQueue`
    pub fn uri(&self) -> String {
        let mut uri = format!("{}{}", self.content_type.uri_type().prefix, self.encoded_uri);
        if let Some(sid) = self.broadcast_id {
            uri.push_str(&format!("?sid={}", sid));
        }
        uri
    }

    /// DIDL-Lite metadata describing the item
    pub fn metadata(&self) -> String {
        let uri_type = self.content_type.uri_type();
        format!(
            concat!(
                r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/">"#,
                r#"<item id="{key}{id}" restricted="true">"#,
                r#"<dc:title>Stream Deck</dc:title><upnp:class>{class}</upnp:class>"#,
                r#"<desc id="cdudn" nameSpace="urn:schemas-rinconnetworks-com:metadata-1-0/">SA_RINCON{service}_</desc>"#,
                r#"</item></DIDL-Lite>"#
            ),
            key = uri_type.key,
            id = self.encoded_uri,
            class = uri_type.class,
            service = self.service_id
        )
    }
}
