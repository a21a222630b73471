//! Zone group topology as reported by `ZoneGroupTopology#GetZoneGroupState`.

use crate::error::Result;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// One player in a zone group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneMember {
    /// Player id, `RINCON_xxx`
    pub uuid: String,
    pub zone_name: Option<String>,
    pub location: Option<String>,
}

impl ZoneMember {
    /// Host part of the member's description URL
    pub fn host(&self) -> Option<String> {
        let location = self.location.as_deref()?;
        reqwest::Url::parse(location)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
    }
}

/// A group of players sharing one transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneGroup {
    pub id: String,
    /// Player id of the group coordinator
    pub coordinator: String,
    pub members: Vec<ZoneMember>,
}

/// Snapshot of every zone group in the household
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneTopology {
    pub groups: Vec<ZoneGroup>,
}

impl ZoneTopology {
    /// Coordinator of the group containing the player at `host`
    ///
    /// Falls back to the first group when no member matches.
    pub fn coordinator_for(&self, host: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|group| {
                group
                    .members
                    .iter()
                    .any(|member| member.host().as_deref() == Some(host))
            })
            .or_else(|| self.groups.first())
            .map(|group| group.coordinator.as_str())
    }
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.try_get_attribute(name)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.into_owned())
}

/// Parse the (already unescaped) `ZoneGroupState` document
pub fn parse_zone_groups(xml: &str) -> Result<ZoneTopology> {
    let mut reader = Reader::from_str(xml);
    let mut groups = Vec::new();
    let mut current: Option<ZoneGroup> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"ZoneGroup" => {
                if let Some(group) = current.take() {
                    groups.push(group);
                }
                current = attr(&e, b"Coordinator").map(|coordinator| ZoneGroup {
                    id: attr(&e, b"ID").unwrap_or_default(),
                    coordinator,
                    members: Vec::new(),
                });
            }
            Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"ZoneGroupMember" => {
                if let (Some(group), Some(uuid)) = (current.as_mut(), attr(&e, b"UUID")) {
                    group.members.push(ZoneMember {
                        uuid,
                        zone_name: attr(&e, b"ZoneName"),
                        location: attr(&e, b"Location"),
                    });
                }
            }
            Event::End(e) if e.name().as_ref() == b"ZoneGroup" => {
                if let Some(group) = current.take() {
                    groups.push(group);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(group) = current.take() {
        groups.push(group);
    }

    Ok(ZoneTopology { groups })
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATE: &str = r#"<ZoneGroupState><ZoneGroups>
<ZoneGroup Coordinator="RINCON_KITCHEN01400" ID="RINCON_KITCHEN01400:12">
  <ZoneGroupMember UUID="RINCON_KITCHEN01400" Location="http://192.168.1.30:1400/xml/device_description.xml" ZoneName="Kitchen"/>
</ZoneGroup>
<ZoneGroup Coordinator="RINCON_LIVING01400" ID="RINCON_LIVING01400:7">
  <ZoneGroupMember UUID="RINCON_LIVING01400" Location="http://192.168.1.20:1400/xml/device_description.xml" ZoneName="Living Room">
    <Satellite UUID="RINCON_SUB01400" Location="http://192.168.1.21:1400/xml/device_description.xml" ZoneName="Living Room"/>
  </ZoneGroupMember>
  <ZoneGroupMember UUID="RINCON_DEN01400" Location="http://192.168.1.22:1400/xml/device_description.xml" ZoneName="Den"/>
</ZoneGroup>
</ZoneGroups></ZoneGroupState>"#;

    #[test]
    fn parses_groups_and_members() {
        let topology = parse_zone_groups(STATE).unwrap();
        assert_eq!(topology.groups.len(), 2);
        assert_eq!(topology.groups[1].coordinator, "RINCON_LIVING01400");
        assert_eq!(topology.groups[1].members.len(), 2);
        assert_eq!(topology.groups[1].members[1].zone_name.as_deref(), Some("Den"));
        assert_eq!(topology.groups[1].members[1].host().as_deref(), Some("192.168.1.22"));
    }

    #[test]
    fn coordinator_follows_configured_player() {
        let topology = parse_zone_groups(STATE).unwrap();
        assert_eq!(topology.coordinator_for("192.168.1.22"), Some("RINCON_LIVING01400"));
        assert_eq!(topology.coordinator_for("192.168.1.30"), Some("RINCON_KITCHEN01400"));
        assert_eq!(topology.coordinator_for("10.0.0.1"), Some("RINCON_KITCHEN01400"));
    }

    #[test]
    fn empty_state_has_no_coordinator() {
        let topology = parse_zone_groups("<ZoneGroupState/>").unwrap();
        assert_eq!(topology.coordinator_for("192.168.1.22"), None);
    }
}
