//! Integration tests for the Sonos control client

use quick_xml::escape::escape;
use sonos_deck::{DeckError, MusicService, PlayMode, Sonos, SonosService};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ZONES: &str = r#"<ZoneGroupState><ZoneGroups><ZoneGroup Coordinator="RINCON_B1400" ID="g1"><ZoneGroupMember UUID="RINCON_B1400" Location="http://127.0.0.1:1400/xml/device_description.xml" ZoneName="Kitchen"/></ZoneGroup></ZoneGroups></ZoneGroupState>"#;

/// Build a SOAP reply envelope
fn envelope(action: &str, fields: &[(&str, &str)]) -> String {
    let body: String = fields
        .iter()
        .map(|(name, value)| format!("<{name}>{}</{name}>", escape(*value)))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?><s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/" s:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/"><s:Body><u:{action}Response xmlns:u="urn:schemas-upnp-org:service:AVTransport:1">{body}</u:{action}Response></s:Body></s:Envelope>"#
    )
}

async fn mock_action(server: &MockServer, action: &str, fields: &[(&str, &str)]) {
    Mock::given(method("POST"))
        .and(body_string_contains(format!("<u:{} ", action)))
        .respond_with(ResponseTemplate::new(200).set_body_string(envelope(action, fields)))
        .mount(server)
        .await;
}

async fn connected(server: &MockServer) -> Sonos {
    let sonos = Sonos::new();
    sonos.connect("127.0.0.1", server.address().port());
    sonos
}

async fn bodies(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .map(|request| String::from_utf8_lossy(&request.body).into_owned())
        .collect()
}

#[tokio::test]
async fn test_set_mute_request_shape() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/MediaRenderer/RenderingControl/Control"))
        .and(header(
            "SOAPAction",
            "\"urn:schemas-upnp-org:service:RenderingControl:1#SetMute\"",
        ))
        .and(body_string_contains(
            "<InstanceID>0</InstanceID><Channel>Master</Channel><DesiredMute>1</DesiredMute>",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(envelope("SetMute", &[])))
        .expect(1)
        .mount(&server)
        .await;

    let sonos = connected(&server).await;
    sonos.set_mute(true).await.unwrap();
}

#[tokio::test]
async fn test_reply_fields_are_decoded() {
    let server = MockServer::start().await;
    mock_action(&server, "GetMute", &[("CurrentMute", "1")]).await;
    mock_action(&server, "GetVolume", &[("CurrentVolume", "37")]).await;
    mock_action(&server, "GetTransportSettings", &[("PlayMode", "SHUFFLE_NOREPEAT")]).await;

    let sonos = connected(&server).await;
    assert!(sonos.get_mute().await.unwrap());
    assert_eq!(sonos.get_volume().await.unwrap(), 37);
    assert_eq!(
        sonos.get_transport_settings().await.unwrap().play_mode,
        PlayMode::ShuffleNoRepeat
    );
}

#[tokio::test]
async fn test_execute_returns_raw_fields() {
    let server = MockServer::start().await;
    mock_action(
        &server,
        "GetTransportInfo",
        &[("CurrentTransportState", "PAUSED_PLAYBACK"), ("CurrentSpeed", "1")],
    )
    .await;

    let sonos = connected(&server).await;
    let fields = sonos
        .execute(&SonosService::AV_TRANSPORT, "GetTransportInfo", &[])
        .await
        .unwrap();
    assert_eq!(fields.get("CurrentTransportState"), Some("PAUSED_PLAYBACK"));
    assert_eq!(fields.get("CurrentSpeed"), Some("1"));
    assert!(!sonos.get_transport_info().await.unwrap().is_playing());
}

#[tokio::test]
async fn test_http_failure_is_a_transport_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<UPnPError>701</UPnPError>"))
        .mount(&server)
        .await;

    let sonos = connected(&server).await;
    match sonos.play().await {
        Err(DeckError::Transport { status, body }) => {
            assert_eq!(status, 500);
            assert!(body.contains("701"));
        }
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_volume_is_clamped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_string_contains("<DesiredVolume>100</DesiredVolume>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(envelope("SetVolume", &[])))
        .expect(1)
        .mount(&server)
        .await;

    let sonos = connected(&server).await;
    sonos.set_volume(140).await.unwrap();
}

#[tokio::test]
async fn test_radio_stream_replaces_transport_uri() {
    let server = MockServer::start().await;
    mock_action(&server, "SetAVTransportURI", &[]).await;

    let sonos = connected(&server).await;
    sonos
        .set_service_uri("x-sonosapi-stream:s24896?sid=254", Some("<DIDL-Lite/>"))
        .await
        .unwrap();

    let sent = bodies(&server).await;
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("<CurrentURI>x-sonosapi-stream:s24896?sid=254</CurrentURI>"));
    assert!(sent[0].contains("&lt;DIDL-Lite/&gt;"));
}

#[tokio::test]
async fn test_service_link_is_queued_and_selected() {
    let server = MockServer::start().await;
    mock_action(
        &server,
        "AddURIToQueue",
        &[("FirstTrackNumberEnqueued", "3"), ("NumTracksAdded", "12"), ("NewQueueLength", "14")],
    )
    .await;
    mock_action(&server, "GetZoneGroupState", &[("ZoneGroupState", ZONES)]).await;
    mock_action(&server, "SetAVTransportURI", &[]).await;
    mock_action(&server, "Seek", &[]).await;

    let sonos = connected(&server).await;
    let service = MusicService::parse("https://tidal.com/browse/playlist/0fa6e6a3-36b5-4a5b-8b4e-2c1a4c1b3a6e")
        .expect("tidal playlist link");
    sonos
        .set_service_uri(&service.uri(), Some(&service.metadata()))
        .await
        .unwrap();

    let sent = bodies(&server).await;
    let order: Vec<&str> = sent
        .iter()
        .map(|body| {
            ["AddURIToQueue", "GetZoneGroupState", "SetAVTransportURI", "Seek"]
                .into_iter()
                .find(|action| body.contains(&format!("<u:{} ", action)))
                .unwrap_or("?")
        })
        .collect();
    assert_eq!(order, vec!["AddURIToQueue", "GetZoneGroupState", "SetAVTransportURI", "Seek"]);
    assert!(sent[2].contains("<CurrentURI>x-rincon-queue:RINCON_B1400#0</CurrentURI>"));
    assert!(sent[3].contains("<Unit>TRACK_NR</Unit><Target>3</Target>"));

    // topology is fetched once per session
    sonos.set_local_transport("x-rincon-stream", "").await.unwrap();
    let lookups = bodies(&server)
        .await
        .iter()
        .filter(|body| body.contains("<u:GetZoneGroupState "))
        .count();
    assert_eq!(lookups, 1);
}

#[tokio::test]
async fn test_nothing_queued_is_rejected() {
    let server = MockServer::start().await;
    mock_action(&server, "AddURIToQueue", &[("FirstTrackNumberEnqueued", "0")]).await;

    let sonos = connected(&server).await;
    let result = sonos
        .set_service_uri("x-rincon-cpcontainer:1006206cplaylist?sid=2311", None)
        .await;
    assert!(matches!(result, Err(DeckError::ContentValidation(_))));
    assert_eq!(bodies(&server).await.len(), 1);
}

#[tokio::test]
async fn test_favorites_resolve_album_art() {
    let server = MockServer::start().await;
    let didl = r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns:r="urn:schemas-rinconnetworks-com:metadata-1-0/" xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/"><item id="FV:2/3" parentID="FV:2" restricted="false"><dc:title>Morning Mix</dc:title><upnp:class>object.itemobject.item.sonos-favorite</upnp:class><upnp:albumArtURI>/getaa?s=1&amp;u=x</upnp:albumArtURI><res protocolInfo="x-rincon-cpcontainer:*:*:*">x-rincon-cpcontainer:1006206cplaylist?sid=2311</res><r:resMD>&lt;DIDL-Lite&gt;&lt;/DIDL-Lite&gt;</r:resMD></item></DIDL-Lite>"#;
    mock_action(&server, "Browse", &[("Result", didl), ("NumberReturned", "1"), ("TotalMatches", "1")]).await;

    let sonos = connected(&server).await;
    let favorites = sonos.favorites().await.unwrap();
    assert_eq!(favorites.len(), 1);
    assert_eq!(favorites[0].title.as_deref(), Some("Morning Mix"));
    assert_eq!(
        favorites[0].album_art_uri.as_deref(),
        Some(format!("http://127.0.0.1:{}/getaa?s=1&u=x", server.address().port()).as_str())
    );

    let sent = bodies(&server).await;
    assert!(sent[0].contains("<ObjectID>FV:2</ObjectID>"));
}
