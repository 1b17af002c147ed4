use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MetaError;

/// Morceau en cours de lecture.
///
/// Every field the service may omit is optional: ads and podcasts often
/// come without an item.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub title: Option<String>,
    /// First credited artist.
    pub artist: Option<String>,
    pub album: Option<String>,
    /// URL of the largest album cover.
    pub album_art: Option<String>,
    pub progress_ms: Option<u64>,
    pub duration_ms: Option<u64>,
    pub is_playing: bool,
}

impl TrackInfo {
    /// `"artist – title"`, with placeholders for missing parts.
    #[must_use]
    pub fn label(&self) -> String {
        format!(
            "{} – {}",
            self.artist.as_deref().unwrap_or("?"),
            self.title.as_deref().unwrap_or("?")
        )
    }

    /// Same song, regardless of playback position.
    #[must_use]
    pub fn same_track(&self, other: &Self) -> bool {
        self.title == other.title && self.artist == other.artist && self.album == other.album
    }
}

/// Source of now-playing information.
#[async_trait]
pub trait NowPlaying: Send + Sync {
    /// Fetch the current track.
    ///
    /// `Ok(None)` means nothing is playing or the service declined to
    /// answer; only transport and decoding failures are errors.
    ///
    /// # Errors
    /// [`MetaError::Http`] or [`MetaError::Decode`].
    async fn fetch_currently_playing(&self, token: &str) -> Result<Option<TrackInfo>, MetaError>;
}
