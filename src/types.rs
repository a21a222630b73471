use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Default poll interval in seconds when `refreshInterval` is absent or not a number
pub const DEFAULT_REFRESH_INTERVAL: i64 = 1;

/// Per-action settings as stored by the Stream Deck application
///
/// The property inspector writes form values, so most entries arrive as
/// strings even when they hold numbers or flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(Map<String, Value>);

impl Settings {
    /// Build settings from a JSON value; anything but an object yields empty settings
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Text value of a setting; numbers and booleans are rendered as text
    pub fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Non-empty text value of a setting
    pub fn non_empty(&self, key: &str) -> Option<String> {
        self.text(key).filter(|s| !s.is_empty())
    }

    /// Checkbox-style flag: `"1"`, `1` or `true`
    pub fn flag(&self, key: &str) -> bool {
        match self.0.get(key) {
            Some(Value::String(s)) => s == "1",
            Some(Value::Number(n)) => n.as_i64() == Some(1),
            Some(Value::Bool(b)) => *b,
            _ => false,
        }
    }

    /// Leading integer of a setting, `None` when it does not start with a number
    pub fn int(&self, key: &str) -> Option<i64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
            Value::String(s) => parse_leading_int(s),
            _ => None,
        }
    }

    /// Poll interval in seconds; zero or negative disables polling
    pub fn refresh_interval(&self) -> i64 {
        self.int("refreshInterval").unwrap_or(DEFAULT_REFRESH_INTERVAL)
    }
}

/// Parse an optionally signed run of digits at the start of `s`
fn parse_leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return None;
    }
    rest[..digits].parse::<i64>().ok().map(|n| sign * n)
}

/// Title styling chosen by the user for a key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TitleParameters {
    pub font_family: String,
    pub font_size: u32,
    pub font_style: String,
    pub font_underline: bool,
    pub show_title: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_alignment: Option<String>,
    pub title_color: String,
}

impl Default for TitleParameters {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size: 10,
            font_style: "Bold".to_string(),
            font_underline: false,
            show_title: true,
            title_alignment: None,
            title_color: "#ffffff".to_string(),
        }
    }
}

/// Text lines drawn over a key image
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyTexts {
    pub top: Option<String>,
    pub middle: Option<String>,
    pub bottom: Option<String>,
}

impl KeyTexts {
    /// Non-empty lines from top to bottom
    pub fn lines(&self) -> Vec<&str> {
        [&self.top, &self.middle, &self.bottom]
            .into_iter()
            .filter_map(|line| line.as_deref())
            .filter(|line| !line.is_empty())
            .collect()
    }
}

/// Repeat flavour of a play mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    None,
    All,
    One,
}

/// Sonos play mode as reported by `GetTransportSettings`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayMode {
    Normal,
    RepeatAll,
    RepeatOne,
    ShuffleNoRepeat,
    Shuffle,
    ShuffleRepeatOne,
}

impl PlayMode {
    pub fn from_parts(shuffle: bool, repeat: Repeat) -> Self {
        match (shuffle, repeat) {
            (false, Repeat::None) => PlayMode::Normal,
            (false, Repeat::All) => PlayMode::RepeatAll,
            (false, Repeat::One) => PlayMode::RepeatOne,
            (true, Repeat::None) => PlayMode::ShuffleNoRepeat,
            (true, Repeat::All) => PlayMode::Shuffle,
            (true, Repeat::One) => PlayMode::ShuffleRepeatOne,
        }
    }

    pub fn is_shuffle(self) -> bool {
        matches!(
            self,
            PlayMode::ShuffleNoRepeat | PlayMode::Shuffle | PlayMode::ShuffleRepeatOne
        )
    }

    pub fn repeat(self) -> Repeat {
        match self {
            PlayMode::Normal | PlayMode::ShuffleNoRepeat => Repeat::None,
            PlayMode::RepeatAll | PlayMode::Shuffle => Repeat::All,
            PlayMode::RepeatOne | PlayMode::ShuffleRepeatOne => Repeat::One,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlayMode::Normal => "NORMAL",
            PlayMode::RepeatAll => "REPEAT_ALL",
            PlayMode::RepeatOne => "REPEAT_ONE",
            PlayMode::ShuffleNoRepeat => "SHUFFLE_NOREPEAT",
            PlayMode::Shuffle => "SHUFFLE",
            PlayMode::ShuffleRepeatOne => "SHUFFLE_REPEAT_ONE",
        }
    }
}

impl FromStr for PlayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NORMAL" => Ok(PlayMode::Normal),
            "REPEAT_ALL" => Ok(PlayMode::RepeatAll),
            "REPEAT_ONE" => Ok(PlayMode::RepeatOne),
            "SHUFFLE_NOREPEAT" => Ok(PlayMode::ShuffleNoRepeat),
            "SHUFFLE" => Ok(PlayMode::Shuffle),
            "SHUFFLE_REPEAT_ONE" => Ok(PlayMode::ShuffleRepeatOne),
            other => Err(format!("unknown play mode {}", other)),
        }
    }
}

impl fmt::Display for PlayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content directory entry; also the shape stored in the `favorite` setting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub metadata: Option<String>,
    #[serde(rename = "albumArtURI", default)]
    pub album_art_uri: Option<String>,
}
