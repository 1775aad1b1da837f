use soundgate::protocol::v2::{Protocol, Quality, Track};
use soundgate::stream::TrackResolvable;

// A track the way the v2 API returns it: an hq HLS variant listed before
// a standard-quality progressive one.
const TRACK_FIXTURE: &str = r#"{
    "id": 1096317103,
    "title": "Aire Tea Time (stereoman Remix)",
    "permalink_url": "https://soundcloud.com/5tereomanjpn/aire-tea-timestereoman-remix",
    "artwork_url": "https://i1.sndcdn.com/artworks-abc123-large.jpg",
    "duration": 253518,
    "user": {
        "id": 49,
        "username": "stereoman",
        "avatar_url": "https://i1.sndcdn.com/avatars-def456-large.jpg"
    },
    "media": {
        "transcodings": [
            {
                "url": "https://api-v2.soundcloud.com/media/soundcloud:tracks:1096317103/hls",
                "preset": "aac_256k",
                "duration": 253518,
                "snipped": false,
                "format": { "protocol": "hls", "mime_type": "audio/mp4" },
                "quality": "hq"
            },
            {
                "url": "https://api-v2.soundcloud.com/media/soundcloud:tracks:1096317103/progressive",
                "preset": "mp3_1_0",
                "duration": 253518,
                "snipped": false,
                "format": { "protocol": "progressive", "mime_type": "audio/mpeg" },
                "quality": "sq"
            }
        ]
    }
}"#;

fn fixture_track() -> Track {
    serde_json::from_str(TRACK_FIXTURE).expect("fixture track should parse")
}

#[test]
fn test_parse_track_fixture() {
    let track = fixture_track();

    assert_eq!(track.id, 1_096_317_103);
    assert_eq!(track.title, "Aire Tea Time (stereoman Remix)");
    assert_eq!(track.user.username, "stereoman");
    assert_eq!(track.media.transcodings.len(), 2);
    assert!(!track.is_stub());
}

#[test]
fn test_hq_sorts_first_without_filter() {
    let track = fixture_track();

    let sorted = track.transcodings(None);
    assert_eq!(sorted[0].quality, Quality::Hq);
    assert_eq!(sorted[0].format.protocol, Protocol::Hls);
}

#[test]
fn test_protocol_filter_selects_across_quality_tiers() {
    let track = fixture_track();

    // The progressive variant is only sq, but filtering for progressive
    // still surfaces it first; quality orders candidates, it never vetoes
    // a protocol.
    let progressive = track.transcodings(Some(Protocol::Progressive));
    assert_eq!(progressive.len(), 1);
    assert_eq!(progressive[0].quality, Quality::Sq);
    assert_eq!(progressive[0].preset, "mp3_1_0");

    let hls = track.transcodings(Some(Protocol::Hls));
    assert_eq!(hls.len(), 1);
    assert_eq!(hls[0].quality, Quality::Hq);
}

#[test]
fn test_signed_url_uses_question_mark_then_ampersand() {
    let track = fixture_track();
    let transcoding = &track.media.transcodings[1];

    let signed = transcoding.signed_url("abc123").expect("access url present");
    assert_eq!(
        signed.as_str(),
        "https://api-v2.soundcloud.com/media/soundcloud:tracks:1096317103/progressive?client_id=abc123"
    );

    let resigned = {
        let mut with_query = transcoding.clone();
        with_query.url = Some(signed);
        with_query.signed_url("def456").expect("access url present")
    };
    assert!(resigned.as_str().ends_with("?client_id=abc123&client_id=def456"));
}

#[test]
fn test_materialized_reference_keeps_the_record() {
    let track = fixture_track();
    let resolvable = TrackResolvable::from(track.clone());

    match resolvable {
        TrackResolvable::Track(inner) => assert_eq!(inner, track),
        TrackResolvable::Reference(_) => panic!("materialized track became a reference"),
    }
}
