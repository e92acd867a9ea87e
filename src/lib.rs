//! mopidy - a reconnecting client for the Mopidy music server
//!
//! This is the convenience crate that re-exports the mopidy sub-crates, so a
//! single dependency gives you the session and the protocol types.
//!
//! # Architecture
//!
//! - **mopidy-core**: wire types, codec, naming rules, errors, observability
//! - **mopidy-client**: the [`Session`], its event bus, generated API and reconnect logic
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use mopidy::client::{SessionBuilder, STATE_ONLINE};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = SessionBuilder::new("ws://localhost:6680/mopidy/ws")
//!         .reconnect_delay(Duration::from_secs(2))
//!         .on(STATE_ONLINE, |_| println!("ready"))
//!         .on("event:trackPlaybackStarted", |payload| {
//!             println!("now playing {}", payload["tl_track"]["track"]["name"]);
//!         })
//!         .connect()
//!         .await?;
//!
//!     tokio::time::sleep(Duration::from_secs(1)).await;
//!     if let Some(api) = session.api().await {
//!         if let Some(play) = api.lookup("playback.play").and_then(|n| n.call(vec![])) {
//!             play.await?;
//!         }
//!         let tracks = api
//!             .lookup("tracklist.getTlTracks")
//!             .and_then(|n| n.call(vec![]));
//!         if let Some(tracks) = tracks {
//!             println!("{}", tracks.await?);
//!         }
//!     }
//!
//!     session.call("core.mixer.set_volume", json!({"volume": 40}).as_object().cloned()).await?;
//!     session.close().await;
//!     Ok(())
//! }
//! ```

pub use mopidy_client as client;
pub use mopidy_core as core;

pub use mopidy_client::{Session, SessionBuilder};
pub use mopidy_core::{Error, Result};
