//! DIDL-Lite fragments returned by the content directory and position info.

use crate::error::Result;
use crate::types::BrowseItem;
use quick_xml::events::Event;
use quick_xml::reader::Reader;

/// Metadata of the current track
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackMetadata {
    pub creator: Option<String>,
    pub title: Option<String>,
    /// Now-playing text of radio streams
    pub stream_content: Option<String>,
    pub album: Option<String>,
    pub album_art_uri: Option<String>,
}

impl TrackMetadata {
    /// Song title for tracks with an artist, the stream text otherwise
    pub fn display_title(&self) -> Option<&str> {
        if self.creator.is_some() {
            self.title.as_deref()
        } else {
            self.stream_content.as_deref()
        }
    }
}

/// Turn a player-relative album art path into an absolute URL
pub fn absolute_art_uri(uri: &str, base: &str) -> String {
    if uri.starts_with("http") {
        uri.to_string()
    } else {
        format!("{}{}", base, uri)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum ItemField {
    Title,
    Uri,
    Metadata,
    AlbumArt,
}

impl ItemField {
    fn from_name(name: &[u8]) -> Option<Self> {
        match name {
            b"dc:title" => Some(ItemField::Title),
            b"res" => Some(ItemField::Uri),
            b"r:resMD" => Some(ItemField::Metadata),
            b"upnp:albumArtURI" => Some(ItemField::AlbumArt),
            _ => None,
        }
    }

    fn slot(self, item: &mut BrowseItem) -> &mut Option<String> {
        match self {
            ItemField::Title => &mut item.title,
            ItemField::Uri => &mut item.uri,
            ItemField::Metadata => &mut item.metadata,
            ItemField::AlbumArt => &mut item.album_art_uri,
        }
    }
}

/// Parse the `<item>` entries of a browse result
///
/// Only the first occurrence of each field per item is kept. Relative
/// album art paths are resolved against `art_base` (`http://host:port`).
pub fn parse_items(xml: &str, art_base: &str) -> Result<Vec<BrowseItem>> {
    let mut reader = Reader::from_str(xml);
    let mut items = Vec::new();
    let mut item: Option<BrowseItem> = None;
    let mut capture: Option<(ItemField, String)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = e.name();
                if name.as_ref() == b"item" {
                    item = Some(BrowseItem::default());
                } else if let (Some(current), Some(field)) = (item.as_mut(), ItemField::from_name(name.as_ref())) {
                    if field.slot(current).is_none() && capture.is_none() {
                        capture = Some((field, String::new()));
                    }
                }
            }
            Event::Text(t) => {
                if let Some((_, text)) = capture.as_mut() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => {
                let name = e.name();
                if name.as_ref() == b"item" {
                    if let Some(done) = item.take() {
                        items.push(done);
                    }
                    capture = None;
                } else if let Some((field, text)) = capture.take() {
                    if ItemField::from_name(name.as_ref()) == Some(field) {
                        if let Some(current) = item.as_mut() {
                            *field.slot(current) = Some(text).filter(|t| !t.is_empty());
                        }
                    } else {
                        capture = Some((field, text));
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    for item in &mut items {
        if let Some(art) = item.album_art_uri.take() {
            item.album_art_uri = Some(absolute_art_uri(&art, art_base));
        }
    }

    Ok(items)
}

/// Parse track metadata (`TrackMetaData` of `GetPositionInfo`)
///
/// Values such as `NOT_IMPLEMENTED` or an empty string yield empty metadata.
pub fn parse_track(xml: &str, art_base: &str) -> Result<TrackMetadata> {
    const NAMES: [&[u8]; 5] = [
        b"dc:creator",
        b"dc:title",
        b"r:streamContent",
        b"upnp:album",
        b"upnp:albumArtURI",
    ];

    let mut values: [Option<String>; 5] = Default::default();
    let mut reader = Reader::from_str(xml);
    let mut capture: Option<(usize, String)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if capture.is_none() {
                    if let Some(i) = NAMES.iter().position(|n| *n == e.name().as_ref()) {
                        if values[i].is_none() {
                            capture = Some((i, String::new()));
                        }
                    }
                }
            }
            Event::Text(t) => {
                if let Some((_, text)) = capture.as_mut() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::End(e) => {
                if let Some((i, _)) = capture {
                    if NAMES[i] == e.name().as_ref() {
                        if let Some((i, text)) = capture.take() {
                            values[i] = Some(text).filter(|t| !t.is_empty());
                        }
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let [creator, title, stream_content, album, album_art_uri] = values;
    Ok(TrackMetadata {
        creator,
        title,
        stream_content,
        album,
        album_art_uri: album_art_uri.map(|art| absolute_art_uri(&art, art_base)),
    })
}
