//! Client library for resolving playable stream locations on SoundCloud.
//!
//! SoundCloud does not serve audio from stable URLs. Every track carries a
//! set of *transcodings* (encoded variants tagged with a delivery protocol
//! and quality tier), and each transcoding must be exchanged for a
//! short-lived signed URL using a `client_id` credential that itself expires
//! without notice. This crate negotiates that exchange:
//!
//! * [`gateway`] - typed lookups against the `api-v2` endpoints
//! * [`stream`] - the resolution pipeline: transcoding selection, link
//!   signing with credential refresh, progressive/HLS fallback, and batch
//!   resolution over playlists and likes
//! * [`auth`] - `client_id` acquisition and caching
//! * [`protocol`] - wire types for the v2 API
//!
//! # Example
//!
//! ```rust
//! use soundgate::{config::Config, gateway::Gateway, stream::TrackResolvable};
//!
//! let gateway = Gateway::new(&Config::new())?;
//! let playback = gateway
//!     .playback(TrackResolvable::from("https://soundcloud.com/artist/title"))
//!     .await?;
//! if let Some(source) = playback.stream {
//!     println!("{}: {}", source.protocol, source.url);
//! }
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod protocol;
pub mod stream;
