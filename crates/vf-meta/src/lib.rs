//! Now-playing track metadata.
//!
//! The [`NowPlaying`] trait is what the binary polls; [`SpotifyClient`]
//! implements it against the Spotify Web API with a user-supplied token.

pub mod error;
pub mod spotify;
pub mod track;

pub use error::MetaError;
pub use spotify::{SpotifyClient, authorize_url};
pub use track::{NowPlaying, TrackInfo};
