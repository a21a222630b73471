//! SOAP envelope encoding and reply decoding for Sonos sub-services.

use crate::error::{DeckError, Result};
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::BTreeMap;

/// A UPnP service exposed by a Sonos player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SonosService {
    /// Service name as used in the service URN
    pub name: &'static str,
    /// Path prefix of the control endpoint
    pub base_path: &'static str,
}

impl SonosService {
    pub const AV_TRANSPORT: SonosService = SonosService {
        name: "AVTransport",
        base_path: "MediaRenderer/AVTransport",
    };
    pub const RENDERING_CONTROL: SonosService = SonosService {
        name: "RenderingControl",
        base_path: "MediaRenderer/RenderingControl",
    };
    pub const ZONE_GROUP_TOPOLOGY: SonosService = SonosService {
        name: "ZoneGroupTopology",
        base_path: "ZoneGroupTopology",
    };
    pub const CONTENT_DIRECTORY: SonosService = SonosService {
        name: "ContentDirectory",
        base_path: "MediaServer/ContentDirectory",
    };

    /// Service type URN, e.g. `urn:schemas-upnp-org:service:AVTransport:1`
    pub fn urn(&self) -> String {
        format!("urn:schemas-upnp-org:service:{}:1", self.name)
    }

    /// Value of the `SOAPAction` header for `action`
    pub fn soap_action(&self, action: &str) -> String {
        format!("\"{}#{}\"", self.urn(), action)
    }

    /// Control endpoint on a player
    pub fn control_url(&self, host: &str, port: u16) -> String {
        format!("http://{}:{}/{}/Control", host, port, self.base_path)
    }
}

/// Call arguments with `InstanceID=0` prepended unless the caller set one
pub fn with_instance_id<'a>(params: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
    let mut args = Vec::with_capacity(params.len() + 1);
    if !params.iter().any(|(name, _)| *name == "InstanceID") {
        args.push(("InstanceID", "0"));
    }
    args.extend_from_slice(params);
    args
}

/// Build the SOAP request body for `action`
pub fn build_envelope(service: &SonosService, action: &str, params: &[(&str, &str)]) -> String {
    let args: String = params
        .iter()
        .map(|(name, value)| format!("<{name}>{}</{name}>", escape(*value)))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
  <s:Body><u:{action} xmlns:u="{urn}">{args}</u:{action}></s:Body>
</s:Envelope>"#,
        action = action,
        urn = service.urn(),
        args = args
    )
}

/// Flat field map of a SOAP reply
///
/// Every value stays text; the accessors below hold the coercion rules used
/// for Sonos fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplyFields(BTreeMap<String, String>);

impl ReplyFields {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Field value, or `InvalidResponse` when missing
    pub fn require(&self, name: &str) -> Result<&str> {
        self.get(name)
            .ok_or_else(|| DeckError::InvalidResponse(format!("Missing {} in reply", name)))
    }

    /// Integer field such as `CurrentVolume`
    pub fn int(&self, name: &str) -> Result<i64> {
        let raw = self.require(name)?;
        raw.trim()
            .parse()
            .map_err(|_| DeckError::InvalidResponse(format!("{} is not a number: {}", name, raw)))
    }

    /// Boolean field such as `CurrentMute`, true only for `"1"`
    pub fn flag(&self, name: &str) -> Result<bool> {
        Ok(self.require(name)? == "1")
    }

    /// Non-empty text field
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name).filter(|v| !v.is_empty()).map(str::to_string)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.0
    }
}

impl FromIterator<(String, String)> for ReplyFields {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

fn qualified_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

/// Parse a SOAP reply into its output arguments
///
/// Children of the action response element (`<u:PlayResponse>`) become
/// fields; their text content is unescaped, so embedded XML documents such
/// as `ZoneGroupState` or `Result` come back as plain XML strings.
pub fn parse_reply(xml: &str) -> Result<ReplyFields> {
    let mut reader = Reader::from_str(xml);
    let mut depth = 0usize;
    let mut body_depth: Option<usize> = None;
    let mut field: Option<(String, String)> = None;
    let mut fields = BTreeMap::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                match body_depth {
                    None if e.local_name().as_ref() == b"Body" => body_depth = Some(depth),
                    Some(body) if depth == body + 2 => field = Some((qualified_name(&e), String::new())),
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if body_depth.is_some_and(|body| depth + 1 == body + 2) {
                    fields.insert(qualified_name(&e), String::new());
                }
            }
            Event::Text(t) => {
                if let Some((_, text)) = field.as_mut() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some((_, text)) = field.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::End(_) => {
                if body_depth.is_some_and(|body| depth == body + 2) {
                    if let Some((name, text)) = field.take() {
                        fields.insert(name, text);
                    }
                }
                if body_depth == Some(depth) {
                    break;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if body_depth.is_none() {
        return Err(DeckError::InvalidResponse("Reply has no SOAP body".to_string()));
    }

    Ok(ReplyFields(fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_carries_escaped_arguments() {
        let args = with_instance_id(&[("Channel", "Master"), ("DesiredMute", "1")]);
        let body = build_envelope(&SonosService::RENDERING_CONTROL, "SetMute", &args);

        assert!(body.contains(
            r#"<u:SetMute xmlns:u="urn:schemas-upnp-org:service:RenderingControl:1"><InstanceID>0</InstanceID><Channel>Master</Channel><DesiredMute>1</DesiredMute></u:SetMute>"#
        ));
        assert!(body.contains("<s:Body>"));

        let meta = build_envelope(&SonosService::AV_TRANSPORT, "SetAVTransportURI", &[("CurrentURIMetaData", r#"<a b="c">'&'</a>"#)]);
        assert!(meta.contains("&lt;a b=&quot;c&quot;&gt;&apos;&amp;&apos;&lt;/a&gt;"));
    }

    #[test]
    fn explicit_instance_id_is_kept() {
        let args = with_instance_id(&[("InstanceID", "3")]);
        assert_eq!(args, vec![("InstanceID", "3")]);
    }

    #[test]
    fn headers_and_urls() {
        let service = SonosService::AV_TRANSPORT;
        assert_eq!(service.soap_action("Play"), "\"urn:schemas-upnp-org:service:AVTransport:1#Play\"");
        assert_eq!(
            service.control_url("192.168.1.20", 1400),
            "http://192.168.1.20:1400/MediaRenderer/AVTransport/Control"
        );
    }

    #[test]
    fn parses_flat_reply_fields() {
        let xml = r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
<s:Body><u:GetMuteResponse xmlns:u="urn:schemas-upnp-org:service:RenderingControl:1"><CurrentMute>1</CurrentMute></u:GetMuteResponse></s:Body>
</s:Envelope>"#;
        let fields = parse_reply(xml).unwrap();
        assert_eq!(fields.get("CurrentMute"), Some("1"));
        assert!(fields.flag("CurrentMute").unwrap());
        assert_eq!(fields.len(), 1);
    }

    #[test]
    fn embedded_documents_are_unescaped() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body>
<u:GetZoneGroupStateResponse xmlns:u="urn:schemas-upnp-org:service:ZoneGroupTopology:1">
<ZoneGroupState>&lt;ZoneGroups&gt;&lt;ZoneGroup Coordinator=&quot;RINCON_1&quot;/&gt;&lt;/ZoneGroups&gt;</ZoneGroupState>
<Empty/>
</u:GetZoneGroupStateResponse></s:Body></s:Envelope>"#;
        let fields = parse_reply(xml).unwrap();
        assert_eq!(
            fields.get("ZoneGroupState"),
            Some(r#"<ZoneGroups><ZoneGroup Coordinator="RINCON_1"/></ZoneGroups>"#)
        );
        assert_eq!(fields.get("Empty"), Some(""));
    }

    #[test]
    fn empty_response_element_yields_no_fields() {
        let xml = r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body><u:PlayResponse xmlns:u="urn:schemas-upnp-org:service:AVTransport:1"></u:PlayResponse></s:Body></s:Envelope>"#;
        assert!(parse_reply(xml).unwrap().is_empty());
    }

    #[test]
    fn rejects_replies_without_body_or_with_broken_markup() {
        assert!(matches!(parse_reply("<html>oops</html>"), Err(DeckError::InvalidResponse(_))));
        assert!(parse_reply("<s:Envelope><s:Body><a></b></s:Body></s:Envelope>").is_err());
    }

    #[test]
    fn numeric_coercion_reports_bad_values() {
        let fields: ReplyFields = [("CurrentVolume".to_string(), "abc".to_string())].into_iter().collect();
        assert!(fields.int("CurrentVolume").is_err());
        assert!(fields.int("Missing").is_err());
    }
}
