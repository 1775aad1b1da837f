//! Entity and media types for SoundCloud's `api-v2` endpoints.
//!
//! This module models the subset of the v2 API that stream resolution
//! needs: tracks with their encoded variants ("transcodings"), the users
//! and playlists they hang off, and the signed stream location response.
//!
//! # Wire Format
//!
//! Track (abridged):
//! ```json
//! {
//!     "id": 1096317103,
//!     "title": "Aire Tea Time (stereoman Remix)",
//!     "artwork_url": "https://i1.sndcdn.com/artworks-abc123-large.jpg",
//!     "user": { "id": 49, "username": "stereoman", "avatar_url": "..." },
//!     "media": {
//!         "transcodings": [{
//!             "url": "https://api-v2.soundcloud.com/media/soundcloud:tracks:1096317103/abc/stream/hls",
//!             "preset": "mp3_1_0",
//!             "duration": 253518,
//!             "format": { "protocol": "hls", "mime_type": "audio/mpeg" },
//!             "quality": "sq"
//!         }]
//!     }
//! }
//! ```
//!
//! Stream location response:
//! ```json
//! { "url": "https://cf-media.sndcdn.com/abc123.128.mp3?Policy=...&Signature=..." }
//! ```
//!
//! # Tolerant Parsing
//!
//! The v2 API is undocumented and drifts. Parsing is sloppy where the
//! pipeline can tolerate it: malformed artwork and avatar URLs collapse
//! to `None`. Unknown quality tiers collapse to [`Quality::Sq`], and
//! unknown delivery protocols are carried as [`Protocol::Other`], so a
//! single exotic transcoding cannot fail a whole track.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnError};
use url::Url;
use veil::Redact;

/// A track as returned by the v2 API.
///
/// Playlists embed only the first few tracks fully; the rest appear as
/// stubs carrying little more than an `id`. Every field except `id` is
/// therefore defaulted, and [`Track::is_stub`] detects entries that still
/// need hydration through a `/tracks?ids=…` lookup.
#[serde_as]
#[derive(Clone, PartialEq, Deserialize, Serialize, Debug)]
pub struct Track {
    /// Unique track identifier
    pub id: u64,

    #[serde(default)]
    pub title: String,

    /// Public page of the track
    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    pub permalink_url: Option<Url>,

    /// Cover art location, absent for many uploads
    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    pub artwork_url: Option<Url>,

    /// Track length in milliseconds
    #[serde(default)]
    pub duration: u64,

    /// Uploading user, the avatar of which doubles as fallback artwork
    #[serde(default)]
    pub user: User,

    /// The encoded variants available for this track
    #[serde(default)]
    pub media: Media,
}

impl Track {
    /// Whether this entry is an unhydrated playlist stub.
    ///
    /// Stubs carry no media and must be re-fetched through the tracks
    /// endpoint before they can be resolved.
    #[must_use]
    pub fn is_stub(&self) -> bool {
        self.media.transcodings.is_empty()
    }

    /// Returns the transcodings ordered for selection.
    ///
    /// The ordering is a stable priority partition: `hq` entries come
    /// first, and entries within the same tier keep their original
    /// relative order. With a `protocol` filter, only matching entries
    /// survive, still in post-partition order.
    ///
    /// An empty result is not an error; it means the track has no
    /// (matching) encoded variant.
    #[must_use]
    pub fn transcodings(&self, protocol: Option<Protocol>) -> Vec<&Transcoding> {
        let mut transcodings: Vec<&Transcoding> = self.media.transcodings.iter().collect();

        // Stable sort: ties keep their original relative order, so this
        // partitions without reordering within either tier.
        transcodings.sort_by_key(|transcoding| transcoding.quality != Quality::Hq);

        if let Some(protocol) = protocol {
            transcodings.retain(|transcoding| transcoding.format.protocol == protocol);
        }

        transcodings
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: \"{} - {}\"", self.id, self.user.username, self.title)
    }
}

/// A user as embedded in tracks and playlists.
#[serde_as]
#[derive(Clone, Default, PartialEq, Deserialize, Serialize, Debug)]
pub struct User {
    #[serde(default)]
    pub id: u64,

    #[serde(default)]
    pub username: String,

    /// Avatar location, used as artwork fallback
    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    pub avatar_url: Option<Url>,
}

/// The media container of a track.
#[derive(Clone, Default, PartialEq, Deserialize, Serialize, Debug)]
pub struct Media {
    /// Encoded variants in the order the API returned them
    #[serde(default)]
    pub transcodings: Vec<Transcoding>,
}

/// One encoded variant of a track.
///
/// The `url` field is an access template, not a playable location: it must
/// be exchanged for a signed URL by appending a `client_id` credential and
/// requesting the result. See [`crate::stream`].
#[serde_as]
#[derive(Clone, PartialEq, Deserialize, Serialize, Redact)]
pub struct Transcoding {
    /// Access template URL (redacted in debug output)
    #[redact]
    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    pub url: Option<Url>,

    /// Encoder preset, e.g. `mp3_1_0` or `aac_160k`
    #[serde(default)]
    pub preset: String,

    /// Variant length in milliseconds
    #[serde(default)]
    pub duration: u64,

    /// Whether this variant is a preview cut, not the full track
    #[serde(default)]
    pub snipped: bool,

    /// Delivery protocol and container
    pub format: Format,

    /// Quality tier
    #[serde(default)]
    pub quality: Quality,
}

impl Transcoding {
    /// Builds the credential-signed form of the access template URL.
    ///
    /// Appends `client_id` with `&` when the template already carries a
    /// query string, `?` otherwise. Returns `None` when the transcoding
    /// has no access URL or the result does not parse.
    #[must_use]
    pub fn signed_url(&self, client_id: &str) -> Option<Url> {
        let access = self.url.as_ref()?;
        let separator = if access.query().is_some() { '&' } else { '?' };
        format!("{access}{separator}client_id={client_id}")
            .parse()
            .ok()
    }
}

/// Delivery format of a transcoding.
#[derive(Clone, Default, Eq, PartialEq, Deserialize, Serialize, Debug, Hash)]
pub struct Format {
    /// Delivery protocol
    #[serde(default)]
    pub protocol: Protocol,

    /// Container MIME type, e.g. `audio/mpeg`
    #[serde(default)]
    pub mime_type: String,
}

/// Delivery protocol of a transcoding.
///
/// * `Progressive` - single-file direct-download-style delivery
/// * `Hls` - segmented, playlist-based adaptive delivery
/// * `Other` - anything the API grows later (encrypted HLS variants have
///   been observed); carried through parsing but never selected
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize, Debug, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Single-file audio delivery
    #[default]
    Progressive,
    /// Segmented adaptive streaming
    Hls,
    /// Unrecognized delivery protocol
    #[serde(other)]
    Other,
}

impl fmt::Display for Protocol {
    /// Formats the protocol for display, matching the wire representation.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use soundgate::protocol::v2::Protocol;
    ///
    /// assert_eq!(Protocol::Progressive.to_string(), "progressive");
    /// assert_eq!(Protocol::Hls.to_string(), "hls");
    /// ```
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Progressive => write!(f, "progressive"),
            Self::Hls => write!(f, "hls"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Quality tier of a transcoding.
///
/// The API distinguishes `hq` from everything else; every unknown tier
/// deserializes as [`Quality::Sq`] so the selection partition stays total.
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Deserialize, Serialize, Debug, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    /// High quality, reserved for Go+ subscriptions
    Hq,
    /// Standard quality
    #[default]
    #[serde(other)]
    Sq,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hq => write!(f, "hq"),
            Self::Sq => write!(f, "sq"),
        }
    }
}

/// A playlist ("set") with its track listing.
#[serde_as]
#[derive(Clone, PartialEq, Deserialize, Serialize, Debug)]
pub struct Playlist {
    pub id: u64,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    #[serde_as(as = "DefaultOnError")]
    pub permalink_url: Option<Url>,

    /// Total number of tracks, which may exceed `tracks.len()` before
    /// hydration
    #[serde(default)]
    pub track_count: u64,

    #[serde(default)]
    pub tracks: Vec<Track>,
}

/// Collection envelope of a user's liked tracks.
#[derive(Clone, Default, PartialEq, Deserialize, Serialize, Debug)]
pub struct Likes {
    #[serde(default)]
    pub collection: Vec<Like>,
}

/// One entry in a likes collection.
#[derive(Clone, PartialEq, Deserialize, Serialize, Debug)]
pub struct Like {
    pub track: Track,
}

/// A signed, directly-playable stream location.
#[derive(Clone, PartialEq, Deserialize, Serialize, Redact)]
pub struct StreamUrl {
    /// Signed URL (redacted in debug output)
    #[redact]
    pub url: Url,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcoding(protocol: Protocol, quality: Quality, preset: &str) -> Transcoding {
        Transcoding {
            url: Some(
                format!("https://api-v2.soundcloud.com/media/soundcloud:tracks:1/{preset}/stream")
                    .parse()
                    .unwrap(),
            ),
            preset: preset.to_owned(),
            duration: 253_518,
            snipped: false,
            format: Format {
                protocol,
                mime_type: String::from("audio/mpeg"),
            },
            quality,
        }
    }

    fn track(transcodings: Vec<Transcoding>) -> Track {
        Track {
            id: 1,
            title: String::from("Aire Tea Time"),
            permalink_url: None,
            artwork_url: None,
            duration: 253_518,
            user: User::default(),
            media: Media { transcodings },
        }
    }

    #[test]
    fn hq_partitions_before_all_others() {
        let track = track(vec![
            transcoding(Protocol::Hls, Quality::Hq, "aac_256k"),
            transcoding(Protocol::Progressive, Quality::Sq, "mp3_1_0"),
            transcoding(Protocol::Progressive, Quality::Hq, "aac_160k"),
            transcoding(Protocol::Hls, Quality::Sq, "mp3_0_1"),
        ]);

        let sorted = track.transcodings(None);
        let presets: Vec<&str> = sorted.iter().map(|t| t.preset.as_str()).collect();

        // hq entries first, both tiers keeping their original relative order
        assert_eq!(presets, vec!["aac_256k", "aac_160k", "mp3_1_0", "mp3_0_1"]);
        assert_eq!(sorted[0].quality, Quality::Hq);
    }

    #[test]
    fn partition_is_stable_within_tiers() {
        let track = track(vec![
            transcoding(Protocol::Progressive, Quality::Sq, "first_sq"),
            transcoding(Protocol::Hls, Quality::Sq, "second_sq"),
            transcoding(Protocol::Progressive, Quality::Sq, "third_sq"),
        ]);

        let sorted = track.transcodings(None);
        let presets: Vec<&str> = sorted.iter().map(|t| t.preset.as_str()).collect();

        assert_eq!(presets, vec!["first_sq", "second_sq", "third_sq"]);
    }

    #[test]
    fn protocol_filter_preserves_partition_order() {
        let track = track(vec![
            transcoding(Protocol::Hls, Quality::Hq, "aac_256k"),
            transcoding(Protocol::Progressive, Quality::Sq, "mp3_1_0"),
            transcoding(Protocol::Progressive, Quality::Hq, "aac_160k"),
        ]);

        let progressive = track.transcodings(Some(Protocol::Progressive));
        let presets: Vec<&str> = progressive.iter().map(|t| t.preset.as_str()).collect();

        assert_eq!(presets, vec!["aac_160k", "mp3_1_0"]);
        assert!(progressive
            .iter()
            .all(|t| t.format.protocol == Protocol::Progressive));
    }

    #[test]
    fn no_transcodings_is_empty_not_an_error() {
        let track = track(vec![]);
        assert!(track.transcodings(None).is_empty());
        assert!(track.transcodings(Some(Protocol::Hls)).is_empty());
        assert!(track.is_stub());
    }

    #[test]
    fn signed_url_appends_query_separator() {
        let mut plain = transcoding(Protocol::Progressive, Quality::Sq, "mp3_1_0");
        let signed = plain.signed_url("abc123").unwrap();
        assert!(signed.as_str().ends_with("/stream?client_id=abc123"));

        plain.url = Some(
            "https://api-v2.soundcloud.com/media/stream?secret_token=s-xyz"
                .parse()
                .unwrap(),
        );
        let signed = plain.signed_url("abc123").unwrap();
        assert!(signed.as_str().ends_with("?secret_token=s-xyz&client_id=abc123"));
    }

    #[test]
    fn signed_url_without_access_url_is_none() {
        let mut plain = transcoding(Protocol::Progressive, Quality::Sq, "mp3_1_0");
        plain.url = None;
        assert_eq!(plain.signed_url("abc123"), None);
    }

    #[test]
    fn parses_track_with_unknown_tiers_and_protocols() {
        let body = r#"{
            "id": 1096317103,
            "title": "Aire Tea Time (stereoman Remix)",
            "artwork_url": null,
            "duration": 253518,
            "user": { "id": 49, "username": "stereoman", "avatar_url": "https://i1.sndcdn.com/avatars-abc-large.jpg" },
            "media": { "transcodings": [
                { "url": "https://api-v2.soundcloud.com/media/1/stream/hls",
                  "preset": "abr_sq",
                  "format": { "protocol": "ctr-encrypted-hls", "mime_type": "audio/mpeg" },
                  "quality": "abr" },
                { "url": "https://api-v2.soundcloud.com/media/1/stream/progressive",
                  "preset": "mp3_1_0",
                  "format": { "protocol": "progressive", "mime_type": "audio/mpeg" },
                  "quality": "sq" }
            ] }
        }"#;

        let track: Track = serde_json::from_str(body).unwrap();
        assert_eq!(track.id, 1_096_317_103);
        assert_eq!(track.artwork_url, None);
        assert!(track.user.avatar_url.is_some());

        // Unknown values degrade instead of failing the whole track.
        assert_eq!(track.media.transcodings[0].format.protocol, Protocol::Other);
        assert_eq!(track.media.transcodings[0].quality, Quality::Sq);
        assert_eq!(
            track.media.transcodings[1].format.protocol,
            Protocol::Progressive
        );
    }

    #[test]
    fn parses_playlist_with_stub_tracks() {
        let body = r#"{
            "id": 42,
            "title": "tea time",
            "track_count": 2,
            "tracks": [
                { "id": 1, "title": "full", "user": { "id": 9, "username": "u" },
                  "media": { "transcodings": [
                      { "url": "https://api-v2.soundcloud.com/media/1/stream/progressive",
                        "format": { "protocol": "progressive", "mime_type": "audio/mpeg" },
                        "quality": "sq" } ] } },
                { "id": 2, "kind": "track", "monetization_model": "NOT_APPLICABLE" }
            ]
        }"#;

        let playlist: Playlist = serde_json::from_str(body).unwrap();
        assert_eq!(playlist.tracks.len(), 2);
        assert!(!playlist.tracks[0].is_stub());
        assert!(playlist.tracks[1].is_stub());
    }

    #[test]
    fn transcoding_debug_redacts_access_url() {
        let transcoding = transcoding(Protocol::Progressive, Quality::Sq, "mp3_1_0");
        assert!(!format!("{transcoding:?}").contains("soundcloud:tracks"));
    }
}
