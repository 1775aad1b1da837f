//! Typed lookups against the `api-v2` endpoints.
//!
//! The [`Gateway`] owns the rate-limited HTTP client and the credential
//! cache, and maps the handful of entity endpoints stream resolution
//! needs onto typed results. Lookup failures here are hard failures: a
//! track or collection that cannot be fetched propagates as an error,
//! unlike the soft failures of the stream pipeline itself.

use std::{collections::HashMap, fmt::Debug};

use reqwest::{header::HeaderMap, StatusCode, Url};
use serde::Deserialize;

use crate::{
    auth::{ClientId, ClientIdCache},
    config::Config,
    error::{Error, Result},
    http::Client as HttpClient,
    protocol::{
        self,
        v2::{Likes, Playlist, Track, User},
    },
};

pub struct Gateway {
    http_client: HttpClient,
    client_id: ClientIdCache,
}

impl Gateway {
    /// The URL of the v2 API.
    const API_URL: &'static str = "https://api-v2.soundcloud.com";

    /// The URL of the public web frontend.
    ///
    /// Bare references like `artist/title` or `username` are resolved
    /// relative to this origin.
    const WEB_URL: &'static str = "https://soundcloud.com";

    /// Default number of liked tracks to fetch when no limit is given.
    const LIKES_LIMIT: usize = 50;

    /// Maximum number of track ids per hydration request.
    const TRACKS_PER_REQUEST: usize = 50;

    /// Creates a new gateway from the given configuration.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the HTTP client cannot be created.
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = HttpClient::new(config)?;

        Ok(Self {
            http_client,
            client_id: ClientIdCache::new(config.client_id.clone()),
        })
    }

    /// The rate-limited HTTP client behind this gateway.
    #[must_use]
    pub fn http_client(&self) -> &HttpClient {
        &self.http_client
    }

    /// The standard headers attached to every request.
    ///
    /// Fetches of signed media URLs carry the same set.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        self.http_client.headers()
    }

    /// Returns the `client_id` credential.
    ///
    /// With `force_refresh` the cached credential is discarded and a
    /// fresh one is scraped. See [`crate::auth`].
    pub async fn client_id(&self, force_refresh: bool) -> Result<ClientId> {
        self.client_id.get(&self.http_client, force_refresh).await
    }

    /// Builds a v2 API URL with the credential appended.
    fn v2_url(path: &str, query: &[(&str, &str)], client_id: &str) -> Result<Url> {
        let mut url = format!("{}{path}", Self::API_URL).parse::<Url>()?;

        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in query {
                pairs.append_pair(name, value);
            }
            pairs.append_pair("client_id", client_id);
        }

        Ok(url)
    }

    /// Performs a GET against a v2 endpoint and parses the JSON response.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - the HTTP request fails
    /// - the endpoint answers 404 (`NotFound`) or rejects the credential
    /// - the response cannot be parsed as `T`
    async fn request<T>(&self, path: &str, query: &[(&str, &str)]) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + Debug,
    {
        let client_id = self.client_id(false).await?;
        let url = Self::v2_url(path, query, client_id.as_str())?;

        let request = self.http_client.get(url);
        let response = self.http_client.execute(request).await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(Error::not_found(format!("{path} does not exist")));
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(Error::unauthenticated(format!(
                    "{path} rejected the client id"
                )));
            }
            _ => {}
        }

        let response = response.error_for_status()?;
        let body = response.text().await?;
        protocol::json(&body, path)
    }

    /// Resolves a web reference through the `/resolve` endpoint.
    ///
    /// References that are not absolute URLs are interpreted relative to
    /// the web frontend, so `artist/title` and `username` work as-is.
    async fn resolve<T>(&self, reference: &str) -> Result<T>
    where
        T: for<'de> Deserialize<'de> + Debug,
    {
        let url = if reference.starts_with("http://") || reference.starts_with("https://") {
            reference.to_owned()
        } else {
            format!("{}/{reference}", Self::WEB_URL)
        };

        self.request("/resolve", &[("url", &url)]).await
    }

    /// Fetches a track by numeric id or permalink URL.
    ///
    /// # Errors
    ///
    /// Will return `Err` with kind `NotFound` if the track does not exist.
    pub async fn track(&self, reference: &str) -> Result<Track> {
        match reference.parse::<u64>() {
            Ok(id) => self.request(&format!("/tracks/{id}"), &[]).await,
            Err(_) => self.resolve(reference).await,
        }
    }

    /// Fetches several tracks by id.
    ///
    /// Issues one request per [`Self::TRACKS_PER_REQUEST`] ids. The API
    /// does not guarantee result order; callers that care re-order by id.
    pub async fn tracks(&self, ids: &[u64]) -> Result<Vec<Track>> {
        let mut tracks = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(Self::TRACKS_PER_REQUEST) {
            let ids_param = chunk
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let mut batch: Vec<Track> = self.request("/tracks", &[("ids", &ids_param)]).await?;
            tracks.append(&mut batch);
        }

        Ok(tracks)
    }

    /// Fetches a user by numeric id or permalink.
    pub async fn user(&self, reference: &str) -> Result<User> {
        match reference.parse::<u64>() {
            Ok(id) => self.request(&format!("/users/{id}"), &[]).await,
            Err(_) => self.resolve(reference).await,
        }
    }

    /// Fetches a playlist by numeric id or permalink URL, hydrating any
    /// stub tracks it embeds.
    ///
    /// Playlists embed only their first few tracks in full; the rest are
    /// id-only stubs that are re-fetched through the tracks endpoint so
    /// every entry carries its transcodings.
    pub async fn playlist(&self, reference: &str) -> Result<Playlist> {
        let mut playlist: Playlist = match reference.parse::<u64>() {
            Ok(id) => self.request(&format!("/playlists/{id}"), &[]).await?,
            Err(_) => self.resolve(reference).await?,
        };

        self.hydrate(&mut playlist.tracks).await?;
        Ok(playlist)
    }

    /// Fetches the tracks a user has liked, most recent first.
    ///
    /// The `limit` is passed to the API; it defaults to
    /// [`Self::LIKES_LIMIT`].
    pub async fn user_likes(&self, user: &str, limit: Option<usize>) -> Result<Vec<Track>> {
        let user_id = match user.parse::<u64>() {
            Ok(id) => id,
            Err(_) => self.user(user).await?.id,
        };

        let limit = limit.unwrap_or(Self::LIKES_LIMIT).to_string();
        let likes: Likes = self
            .request(&format!("/users/{user_id}/track_likes"), &[("limit", &limit)])
            .await?;

        Ok(likes
            .collection
            .into_iter()
            .map(|like| like.track)
            .collect())
    }

    /// Replaces stub tracks with their full records, in place.
    ///
    /// Order is preserved: hydrated records are matched back to their
    /// original positions by id.
    async fn hydrate(&self, tracks: &mut [Track]) -> Result<()> {
        let stubs: Vec<u64> = tracks
            .iter()
            .filter(|track| track.is_stub())
            .map(|track| track.id)
            .collect();
        if stubs.is_empty() {
            return Ok(());
        }

        debug!("hydrating {} stub tracks", stubs.len());
        let mut full: HashMap<u64, Track> = self
            .tracks(&stubs)
            .await?
            .into_iter()
            .map(|track| (track.id, track))
            .collect();

        for track in tracks.iter_mut() {
            if let Some(hydrated) = full.remove(&track.id) {
                *track = hydrated;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v2_url_appends_client_id() {
        let url = Gateway::v2_url("/tracks/1096317103", &[], "abc123").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api-v2.soundcloud.com/tracks/1096317103?client_id=abc123"
        );
    }

    #[test]
    fn v2_url_keeps_query_order() {
        let url = Gateway::v2_url(
            "/resolve",
            &[("url", "https://soundcloud.com/artist/title")],
            "abc123",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api-v2.soundcloud.com/resolve?url=https%3A%2F%2Fsoundcloud.com%2Fartist%2Ftitle&client_id=abc123"
        );
    }
}
