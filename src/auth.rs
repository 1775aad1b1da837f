//! `client_id` credential acquisition and caching.
//!
//! SoundCloud's v2 API authorizes requests with a `client_id` query
//! parameter. The credential is not issued through any documented channel:
//! the web app embeds it in its JavaScript bundles, and it rotates without
//! notice. This module scrapes it the same way the web player obtains it:
//!
//! 1. Fetch the `soundcloud.com` homepage
//! 2. Extract the app asset script URLs (`a-v2.sndcdn.com/assets/*.js`)
//! 3. Scan the scripts, last first, for a `client_id:"…"` literal
//!
//! The credential is cached after the first acquisition. Callers that see
//! signed-URL requests fail (typically because the credential rotated)
//! request a forced refresh, which re-scrapes and replaces the cache.

use std::fmt;

use regex_lite::Regex;
use tokio::sync::Mutex;
use veil::Redact;

use crate::{
    error::{Error, Result},
    http,
};

/// An opaque `client_id` credential.
///
/// Redacted in debug output: a leaked credential is valid for anyone
/// until it rotates.
#[derive(Clone, Eq, PartialEq, Hash, Redact)]
pub struct ClientId(#[redact] String);

impl ClientId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ClientId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cache around the scraped credential.
///
/// The cache distinguishes two acquisition modes:
/// * cached - return the stored credential, scraping only on first use
/// * force-refreshed - discard the stored credential and re-scrape
///
/// A configured fixed credential short-circuits both modes.
pub struct ClientIdCache {
    fixed: Option<ClientId>,
    cached: Mutex<Option<ClientId>>,
}

impl ClientIdCache {
    /// The page whose scripts embed the credential.
    const HOMEPAGE: &'static str = "https://soundcloud.com/";

    #[must_use]
    pub fn new(fixed: Option<String>) -> Self {
        Self {
            fixed: fixed.map(ClientId),
            cached: Mutex::new(None),
        }
    }

    /// Returns the credential, scraping one if necessary.
    ///
    /// With `force_refresh` the cached value is discarded first. Holding
    /// the cache lock across the scrape serializes concurrent refreshes,
    /// so a batch of failing resolutions triggers one re-scrape, not one
    /// per task.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the homepage or its scripts cannot be fetched,
    /// or if no credential is found in any script.
    pub async fn get(&self, client: &http::Client, force_refresh: bool) -> Result<ClientId> {
        if let Some(ref fixed) = self.fixed {
            return Ok(fixed.clone());
        }

        let mut cached = self.cached.lock().await;
        if !force_refresh {
            if let Some(ref client_id) = *cached {
                return Ok(client_id.clone());
            }
        }

        let client_id = Self::scrape(client).await?;
        debug!("obtained client id");
        *cached = Some(client_id.clone());

        Ok(client_id)
    }

    /// Scrapes a fresh credential from the web app scripts.
    async fn scrape(client: &http::Client) -> Result<ClientId> {
        let url = Self::HOMEPAGE.parse::<reqwest::Url>()?;
        let request = client.get(url);
        let response = client.execute(request).await?.error_for_status()?;
        let homepage = response.text().await?;

        let scripts = script_urls(&homepage);
        if scripts.is_empty() {
            return Err(Error::not_found("no app scripts found on homepage"));
        }

        // The credential usually sits in one of the last bundles.
        for script in scripts.iter().rev() {
            let url = script.parse::<reqwest::Url>()?;
            let request = client.get(url);
            let body = match client.execute(request).await?.error_for_status() {
                Ok(response) => response.text().await?,
                Err(e) => {
                    warn!("skipping app script {script}: {e}");
                    continue;
                }
            };

            if let Some(client_id) = find_client_id(&body) {
                return Ok(ClientId(client_id));
            }
        }

        Err(Error::unauthenticated("no client id in any app script"))
    }
}

/// Extracts the app asset script URLs from the homepage markup.
fn script_urls(html: &str) -> Vec<String> {
    let pattern = Regex::new(r#"https://a-v2\.sndcdn\.com/assets/[0-9a-zA-Z_.-]+\.js"#)
        .expect("script pattern is invalid");
    pattern
        .find_iter(html)
        .map(|script| script.as_str().to_owned())
        .collect()
}

/// Extracts a `client_id` literal from a script body.
fn find_client_id(script: &str) -> Option<String> {
    let pattern = Regex::new(r#"client_id:"(\w+)""#).expect("client id pattern is invalid");
    pattern
        .captures(script)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_script_urls_in_document_order() {
        let html = r#"<html><body>
            <script crossorigin src="https://a-v2.sndcdn.com/assets/0-df6e8cd2.js"></script>
            <script crossorigin src="https://a-v2.sndcdn.com/assets/50-b1e3ad92.js"></script>
            </body></html>"#;

        let scripts = script_urls(html);
        assert_eq!(
            scripts,
            vec![
                "https://a-v2.sndcdn.com/assets/0-df6e8cd2.js",
                "https://a-v2.sndcdn.com/assets/50-b1e3ad92.js",
            ]
        );
    }

    #[test]
    fn ignores_foreign_scripts() {
        let html = r#"<script src="https://cdn.example.com/app.js"></script>"#;
        assert!(script_urls(html).is_empty());
    }

    #[test]
    fn finds_client_id_literal() {
        let script = r#"var e={client_application:null,client_id:"iZIs9mchVcX5lhVRyQGGAYlNPVldzAoX",env:"production"}"#;
        assert_eq!(
            find_client_id(script).as_deref(),
            Some("iZIs9mchVcX5lhVRyQGGAYlNPVldzAoX")
        );
    }

    #[test]
    fn missing_client_id_is_none() {
        assert_eq!(find_client_id("var e={env:\"production\"}"), None);
    }

    #[test]
    fn client_id_debug_is_redacted() {
        let client_id = ClientId::from(String::from("iZIs9mchVcX5lhVRyQGGAYlNPVldzAoX"));
        assert!(!format!("{client_id:?}").contains("iZIs9mch"));
    }
}
