//! The stream resolution pipeline.
//!
//! Turning a track reference into something playable takes four steps,
//! each of which this module owns:
//!
//! 1. Resolve the reference into a full track record ([`TrackResolvable`])
//! 2. Select a transcoding (quality-partitioned, protocol-filtered; see
//!    [`Track::transcodings`])
//! 3. Exchange the transcoding's access template for a signed URL,
//!    retrying exactly once across a credential refresh
//!    ([`Gateway::stream_link`])
//! 4. Fall back across delivery protocols: progressive first, HLS second
//!    ([`Gateway::stream_source`])
//!
//! On top of the single-track pipeline sit the batch operations
//! ([`Gateway::playlist_playback`], [`Gateway::likes_playback`]), which
//! resolve every element of a collection concurrently and keep only the
//! playable survivors.
//!
//! # Failure Model
//!
//! Only reference and collection lookups fail hard. Everything that can
//! go wrong while exchanging a transcoding for a signed URL is a routine
//! condition (signed URLs expire routinely and must be re-signed) and
//! collapses to "no stream available", logged but never raised.

use futures_util::future::join_all;
use serde::Serialize;
use url::Url;
use veil::Redact;

use crate::{
    error::{Error, Result},
    gateway::Gateway,
    protocol::{
        self,
        v2::{Playlist, Protocol, StreamUrl, Track, Transcoding},
    },
};

/// A reference to a track: either still an identifier or already a record.
///
/// Resolution consumes the reference. A materialized track resolves to
/// itself without a network call.
#[derive(Clone, PartialEq, Debug)]
pub enum TrackResolvable {
    /// A numeric id or permalink URL that still needs a lookup
    Reference(String),
    /// A track record fetched earlier
    Track(Track),
}

impl TrackResolvable {
    /// Resolves this reference into a track record.
    ///
    /// # Errors
    ///
    /// Will return `Err` with kind `NotFound` if the remote lookup fails;
    /// there is no local recovery.
    pub async fn resolve(self, gateway: &Gateway) -> Result<Track> {
        match self {
            Self::Reference(reference) => gateway.track(&reference).await,
            Self::Track(track) => Ok(track),
        }
    }
}

impl From<&str> for TrackResolvable {
    fn from(reference: &str) -> Self {
        Self::Reference(reference.to_owned())
    }
}

impl From<String> for TrackResolvable {
    fn from(reference: String) -> Self {
        Self::Reference(reference)
    }
}

impl From<Track> for TrackResolvable {
    fn from(track: Track) -> Self {
        Self::Track(track)
    }
}

/// A resolved, directly-playable stream location.
#[derive(Clone, PartialEq, Serialize, Redact)]
pub struct StreamSource {
    /// Signed URL (redacted in debug output)
    #[redact]
    pub url: Url,

    /// Delivery protocol the URL serves
    pub protocol: Protocol,
}

/// A track bundled with its resolved stream, if any.
///
/// Stream URL and delivery protocol are both present or both absent: the
/// pair lives behind a single `Option`.
#[derive(Clone, PartialEq, Serialize, Debug)]
pub struct Playback {
    pub track: Track,
    pub stream: Option<StreamSource>,
}

/// The playable subset of a playlist.
#[derive(Clone, PartialEq, Serialize, Debug)]
pub struct PlaylistPlayback {
    /// The source playlist; its own track list is drained into `tracks`
    pub playlist: Playlist,

    /// Bundles that resolved with a stream, in playlist order
    pub tracks: Vec<Playback>,
}

/// State of the credential retry, advancing `Fresh -> Refreshed -> done`.
///
/// There is no state from which a second refresh can be requested.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Attempt {
    /// First try, using the cached credential
    Fresh,
    /// Second and final try, after a forced credential refresh
    Refreshed,
}

impl Attempt {
    /// Whether this attempt forces a credential refresh before fetching.
    fn refreshes(self) -> bool {
        self == Self::Refreshed
    }

    /// The follow-up attempt, if one remains.
    fn next(self) -> Option<Self> {
        match self {
            Self::Fresh => Some(Self::Refreshed),
            Self::Refreshed => None,
        }
    }
}

impl Gateway {
    /// Exchanges one transcoding for a signed stream URL.
    ///
    /// Returns `None` without touching the network when the transcoding
    /// carries no access URL. Otherwise signs the access template with
    /// the cached credential and fetches it; if that fails for any
    /// reason, refreshes the credential and retries exactly once.
    ///
    /// Failure is soft: the result is `None`, never an error.
    pub async fn stream_link(&self, transcoding: &Transcoding) -> Option<Url> {
        transcoding.url.as_ref()?;

        let mut attempt = Attempt::Fresh;
        loop {
            match self.fetch_stream_link(transcoding, attempt).await {
                Ok(url) => return Some(url),
                Err(e) => match attempt.next() {
                    Some(retry) => {
                        debug!(
                            "stream link fetch failed, retrying with fresh client id: {e}"
                        );
                        attempt = retry;
                    }
                    None => {
                        warn!(
                            "no stream link for {} ({}): {e}",
                            transcoding.preset, transcoding.format.protocol
                        );
                        return None;
                    }
                },
            }
        }
    }

    /// One signed-URL fetch under the given attempt's credential mode.
    async fn fetch_stream_link(&self, transcoding: &Transcoding, attempt: Attempt) -> Result<Url> {
        let client_id = self.client_id(attempt.refreshes()).await?;
        let url = transcoding
            .signed_url(client_id.as_str())
            .ok_or_else(|| Error::invalid_argument("transcoding has no usable access url"))?;

        let mut request = self.http_client().get(url);
        request.headers_mut().extend(self.headers().clone());

        let response = self
            .http_client()
            .execute(request)
            .await?
            .error_for_status()?;
        let body = response.text().await?;

        let stream: StreamUrl = protocol::json(&body, "stream link")?;
        Ok(stream.url)
    }

    /// Resolves a track reference to a stream location.
    ///
    /// Delivery protocols are tried in fixed order: progressive first,
    /// then HLS, taking the first-ranked transcoding of each. Progressive
    /// wins whenever it resolves, regardless of quality tier.
    ///
    /// # Errors
    ///
    /// Will return `Err` only if the track lookup itself fails. A track
    /// with no resolvable stream is `Ok(None)`.
    pub async fn stream_source(
        &self,
        resolvable: TrackResolvable,
    ) -> Result<Option<StreamSource>> {
        let track = resolvable.resolve(self).await?;
        Ok(self.source_for(&track).await)
    }

    async fn source_for(&self, track: &Track) -> Option<StreamSource> {
        for protocol in [Protocol::Progressive, Protocol::Hls] {
            let candidates = track.transcodings(Some(protocol));
            let Some(first) = candidates.first() else {
                continue;
            };

            if let Some(url) = self.stream_link(first).await {
                return Some(StreamSource { url, protocol });
            }
        }

        debug!("track {track} has no resolvable stream");
        None
    }

    /// Resolves a track reference into a playback bundle.
    ///
    /// # Errors
    ///
    /// Will return `Err` only if the track lookup fails; a missing stream
    /// leaves `stream` unset instead of raising.
    pub async fn playback(&self, resolvable: TrackResolvable) -> Result<Playback> {
        let track = resolvable.resolve(self).await?;
        let stream = self.source_for(&track).await;

        Ok(Playback { track, stream })
    }

    /// Resolves a playlist into its playable subset.
    ///
    /// An independent `limit` truncates the track list before resolution.
    /// Every remaining track is resolved concurrently; tracks that fail
    /// or resolve without a stream are dropped silently, preserving the
    /// playlist order of the survivors.
    ///
    /// # Errors
    ///
    /// Will return `Err` only if the playlist lookup fails. A playlist
    /// where nothing resolves yields an empty `tracks`.
    pub async fn playlist_playback(
        &self,
        reference: &str,
        limit: Option<usize>,
    ) -> Result<PlaylistPlayback> {
        let mut playlist = self.playlist(reference).await?;

        let mut tracks = std::mem::take(&mut playlist.tracks);
        if let Some(limit) = limit {
            tracks.truncate(limit);
        }

        let tracks = self.playback_all(tracks).await;
        Ok(PlaylistPlayback { playlist, tracks })
    }

    /// Resolves a user's liked tracks into playback bundles.
    ///
    /// The `limit` is forwarded to the likes lookup. Resolution behaves
    /// like [`Gateway::playlist_playback`]: concurrent, silently dropping
    /// failures, order-preserving.
    ///
    /// # Errors
    ///
    /// Will return `Err` only if the likes lookup fails.
    pub async fn likes_playback(
        &self,
        user: &str,
        limit: Option<usize>,
    ) -> Result<Vec<Playback>> {
        let tracks = self.user_likes(user, limit).await?;
        Ok(self.playback_all(tracks).await)
    }

    /// Resolves every track concurrently and keeps the playable ones.
    ///
    /// All resolutions are launched at once and all are awaited; the
    /// HTTP layer's rate limiter spaces the requests on the wire.
    async fn playback_all(&self, tracks: Vec<Track>) -> Vec<Playback> {
        let total = tracks.len();

        let results = join_all(
            tracks
                .into_iter()
                .map(|track| self.playback(TrackResolvable::Track(track))),
        )
        .await;

        let bundles = retain_playable(results);
        debug!("{} of {total} tracks have a playable stream", bundles.len());
        bundles
    }

    /// Returns the cover art URL of a track, scaled up for display.
    ///
    /// Falls back to the uploader's avatar when the track has no artwork;
    /// a track with neither yields `None`. The credential is appended so
    /// the URL can be fetched directly.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the track lookup fails or no credential can
    /// be obtained.
    pub async fn cover_url(&self, resolvable: TrackResolvable) -> Result<Option<Url>> {
        let track = resolvable.resolve(self).await?;

        let Some(artwork) = track.artwork_url.as_ref().or(track.user.avatar_url.as_ref())
        else {
            return Ok(None);
        };

        let artwork = artwork
            .as_str()
            .replace(".jpg", ".png")
            .replace("-large", "-t500x500");
        let client_id = self.client_id(false).await?;

        let url = format!("{artwork}?client_id={client_id}").parse()?;
        Ok(Some(url))
    }
}

/// Keeps the bundles that settled successfully and carry a stream.
///
/// Input order is preserved; dropped elements are logged and never
/// surfaced as errors, so an all-failure batch is an empty result.
fn retain_playable(results: Vec<Result<Playback>>) -> Vec<Playback> {
    results
        .into_iter()
        .filter_map(|result| match result {
            Ok(playback) if playback.stream.is_some() => Some(playback),
            Ok(playback) => {
                debug!("dropping track {}: no stream available", playback.track);
                None
            }
            Err(e) => {
                warn!("dropping track from batch: {e}");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::v2::{Media, User};

    fn track(id: u64, title: &str) -> Track {
        Track {
            id,
            title: title.to_owned(),
            permalink_url: None,
            artwork_url: None,
            duration: 0,
            user: User::default(),
            media: Media::default(),
        }
    }

    fn playable(id: u64, title: &str) -> Playback {
        Playback {
            track: track(id, title),
            stream: Some(StreamSource {
                url: "https://cf-media.sndcdn.com/abc.128.mp3?Policy=x"
                    .parse()
                    .unwrap(),
                protocol: Protocol::Progressive,
            }),
        }
    }

    fn streamless(id: u64, title: &str) -> Playback {
        Playback {
            track: track(id, title),
            stream: None,
        }
    }

    #[test]
    fn attempt_allows_exactly_one_refresh() {
        let first = Attempt::Fresh;
        assert!(!first.refreshes());

        let second = first.next().unwrap();
        assert!(second.refreshes());

        // No third attempt exists.
        assert_eq!(second.next(), None);
    }

    #[test]
    fn retain_playable_keeps_only_streamed_bundles_in_order() {
        let results = vec![
            Ok(playable(1, "one")),
            Ok(streamless(2, "two")),
            Ok(playable(3, "three")),
        ];

        let bundles = retain_playable(results);
        let ids: Vec<u64> = bundles.iter().map(|b| b.track.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn retain_playable_drops_failed_resolutions_silently() {
        // Element 2 fails hard inside its own resolution task; the batch
        // as a whole still succeeds with the survivors in source order.
        let results = vec![
            Ok(playable(1, "one")),
            Err(Error::not_found("track does not exist")),
            Ok(playable(3, "three")),
        ];

        let bundles = retain_playable(results);
        let ids: Vec<u64> = bundles.iter().map(|b| b.track.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn retain_playable_of_all_failures_is_empty() {
        let results = vec![
            Err(Error::not_found("gone")),
            Ok(streamless(2, "two")),
        ];
        assert!(retain_playable(results).is_empty());
    }

    #[test]
    fn resolvable_from_track_is_already_resolved() {
        let resolvable = TrackResolvable::from(track(7, "seven"));
        assert!(matches!(resolvable, TrackResolvable::Track(ref t) if t.id == 7));
    }

    #[test]
    fn resolvable_from_str_is_a_reference() {
        let resolvable = TrackResolvable::from("https://soundcloud.com/artist/title");
        assert!(matches!(resolvable, TrackResolvable::Reference(_)));
    }

    #[test]
    fn playback_serializes_stream_and_protocol_together() {
        let with_stream = serde_json::to_value(playable(1, "one")).unwrap();
        assert!(with_stream["stream"]["url"].is_string());
        assert_eq!(with_stream["stream"]["protocol"], "progressive");

        let without = serde_json::to_value(streamless(2, "two")).unwrap();
        assert!(without["stream"].is_null());
    }
}
