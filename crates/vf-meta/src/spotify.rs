use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Deserialize;

use crate::error::MetaError;
use crate::track::{NowPlaying, TrackInfo};

const AUTHORIZE_ENDPOINT: &str = "https://accounts.spotify.com/authorize";
const CURRENTLY_PLAYING_ENDPOINT: &str = "https://api.spotify.com/v1/me/player/currently-playing";
const SCOPES: &str = "user-read-currently-playing user-read-playback-state";

/// Build the implicit-grant authorization URL.
///
/// The user opens it in a browser; the access token comes back in the
/// redirect fragment and is then passed to the binary.
///
/// # Errors
/// [`MetaError::InvalidUrl`] if `client_id` is empty or `redirect_uri` is
/// not an absolute URL.
///
/// # Example
/// ```
/// let url = vf_meta::authorize_url("abc123", "http://localhost:8888/callback").unwrap();
/// assert_eq!(url.host_str(), Some("accounts.spotify.com"));
/// assert!(url.as_str().contains("response_type=token"));
/// ```
pub fn authorize_url(client_id: &str, redirect_uri: &str) -> Result<Url, MetaError> {
    if client_id.trim().is_empty() {
        return Err(MetaError::InvalidUrl("client_id vide".to_string()));
    }
    Url::parse(redirect_uri)
        .map_err(|e| MetaError::InvalidUrl(format!("redirect_uri '{redirect_uri}' : {e}")))?;

    Url::parse_with_params(
        AUTHORIZE_ENDPOINT,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("scope", SCOPES),
            ("response_type", "token"),
        ],
    )
    .map_err(|e| MetaError::InvalidUrl(e.to_string()))
}

/// Spotify Web API client for the currently-playing endpoint.
#[derive(Debug, Clone)]
pub struct SpotifyClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl SpotifyClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built (TLS backend).
    pub fn new() -> Result<Self, MetaError> {
        let endpoint = Url::parse(CURRENTLY_PLAYING_ENDPOINT)
            .map_err(|e| MetaError::InvalidUrl(e.to_string()))?;
        Self::with_endpoint(endpoint)
    }

    /// Point the client at another currently-playing endpoint.
    ///
    /// Loopback endpoints bypass any proxy set in the environment.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn with_endpoint(endpoint: Url) -> Result<Self, MetaError> {
        let mut builder = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(concat!("vizfeed/", env!("CARGO_PKG_VERSION")));
        if matches!(endpoint.host_str(), Some("127.0.0.1" | "localhost" | "[::1]")) {
            builder = builder.no_proxy();
        }
        let http = builder.build()?;
        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl NowPlaying for SpotifyClient {
    async fn fetch_currently_playing(&self, token: &str) -> Result<Option<TrackInfo>, MetaError> {
        let response = self
            .http
            .get(self.endpoint.clone())
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        if !status.is_success() {
            if status == StatusCode::UNAUTHORIZED {
                log::warn!("Token Spotify refusé ou expiré");
            } else {
                log::debug!("Spotify a répondu {status}");
            }
            return Ok(None);
        }

        let body = response.text().await?;
        parse_currently_playing(&body).map(Some)
    }
}

/// Decode a currently-playing response body.
///
/// # Errors
/// [`MetaError::Decode`] on malformed JSON.
pub fn parse_currently_playing(body: &str) -> Result<TrackInfo, MetaError> {
    let raw: CurrentlyPlaying = serde_json::from_str(body)?;
    Ok(raw.into())
}

#[derive(Deserialize)]
struct CurrentlyPlaying {
    progress_ms: Option<u64>,
    #[serde(default)]
    is_playing: bool,
    item: Option<Item>,
}

#[derive(Deserialize)]
struct Item {
    name: Option<String>,
    #[serde(default)]
    artists: Vec<Named>,
    album: Option<Album>,
    duration_ms: Option<u64>,
}

#[derive(Deserialize)]
struct Named {
    name: Option<String>,
}

#[derive(Deserialize)]
struct Album {
    name: Option<String>,
    #[serde(default)]
    images: Vec<Image>,
}

#[derive(Deserialize)]
struct Image {
    url: String,
}

impl From<CurrentlyPlaying> for TrackInfo {
    fn from(raw: CurrentlyPlaying) -> Self {
        let item = raw.item;
        let album = item.as_ref().and_then(|i| i.album.as_ref());
        Self {
            title: item.as_ref().and_then(|i| i.name.clone()),
            artist: item
                .as_ref()
                .and_then(|i| i.artists.first())
                .and_then(|a| a.name.clone()),
            album: album.and_then(|a| a.name.clone()),
            album_art: album.and_then(|a| a.images.first()).map(|img| img.url.clone()),
            progress_ms: raw.progress_ms,
            duration_ms: item.as_ref().and_then(|i| i.duration_ms),
            is_playing: raw.is_playing,
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;

    const TRACK: &str = r#"{
        "progress_ms": 42000,
        "is_playing": true,
        "currently_playing_type": "track",
        "item": {
            "name": "Teardrop",
            "duration_ms": 330000,
            "artists": [{ "name": "Massive Attack" }, { "name": "Elizabeth Fraser" }],
            "album": {
                "name": "Mezzanine",
                "images": [
                    { "url": "https://i.scdn.co/image/large", "width": 640 },
                    { "url": "https://i.scdn.co/image/small", "width": 64 }
                ]
            }
        }
    }"#;

    #[test]
    fn full_track_is_decoded() {
        let t = parse_currently_playing(TRACK).expect("valid body");
        assert_eq!(t.title.as_deref(), Some("Teardrop"));
        assert_eq!(t.artist.as_deref(), Some("Massive Attack"));
        assert_eq!(t.album.as_deref(), Some("Mezzanine"));
        assert_eq!(t.album_art.as_deref(), Some("https://i.scdn.co/image/large"));
        assert_eq!(t.progress_ms, Some(42000));
        assert_eq!(t.duration_ms, Some(330_000));
        assert!(t.is_playing);
    }

    #[test]
    fn missing_item_yields_empty_fields() {
        let t = parse_currently_playing(r#"{"is_playing": true, "item": null}"#)
            .expect("valid body");
        assert_eq!(t.title, None);
        assert_eq!(t.artist, None);
        assert_eq!(t.album_art, None);
        assert!(t.is_playing);
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let err = parse_currently_playing("<html>").expect_err("not json");
        assert!(matches!(err, MetaError::Decode(_)));
    }

    #[test]
    fn authorize_url_carries_scopes_and_grant() {
        let url = authorize_url("client-42", "http://localhost:8888/callback").expect("valid");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let get = |key: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("client_id"), Some("client-42"));
        assert_eq!(get("redirect_uri"), Some("http://localhost:8888/callback"));
        assert_eq!(get("scope"), Some(SCOPES));
        assert_eq!(get("response_type"), Some("token"));
        assert_eq!(url.path(), "/authorize");
    }

    #[test]
    fn authorize_url_rejects_bad_input() {
        assert!(matches!(
            authorize_url("", "http://localhost/cb"),
            Err(MetaError::InvalidUrl(_))
        ));
        assert!(matches!(
            authorize_url("id", "not a url"),
            Err(MetaError::InvalidUrl(_))
        ));
    }

    fn response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Serve one canned response on a loopback port; the task yields the
    /// request head it received.
    async fn serve_once(reply: String) -> (Url, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        let url = Url::parse(&format!("http://{addr}/v1/me/player/currently-playing"))
            .expect("valid url");

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.expect("read request");
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            socket.write_all(reply.as_bytes()).await.expect("write response");
            socket.shutdown().await.expect("shutdown");
            String::from_utf8_lossy(&head).into_owned()
        });

        (url, handle)
    }

    #[tokio::test]
    async fn playing_track_is_returned() {
        let (url, server) = serve_once(response("200 OK", TRACK)).await;
        let client = SpotifyClient::with_endpoint(url).expect("client");

        let track = client
            .fetch_currently_playing("secret-token")
            .await
            .expect("request succeeds")
            .expect("a track is playing");
        assert_eq!(track.title.as_deref(), Some("Teardrop"));
        assert_eq!(track.artist.as_deref(), Some("Massive Attack"));

        let head = server.await.expect("server task").to_ascii_lowercase();
        assert!(head.starts_with("get /v1/me/player/currently-playing"));
        assert!(head.contains("authorization: bearer secret-token"));
    }

    #[tokio::test]
    async fn no_content_means_nothing_playing() {
        let (url, server) = serve_once(response("204 No Content", "")).await;
        let client = SpotifyClient::with_endpoint(url).expect("client");

        let track = client.fetch_currently_playing("tok").await.expect("request succeeds");
        assert_eq!(track, None);
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn rejected_token_means_nothing_playing() {
        let body = r#"{"error":{"status":401,"message":"The access token expired"}}"#;
        let (url, server) = serve_once(response("401 Unauthorized", body)).await;
        let client = SpotifyClient::with_endpoint(url).expect("client");

        let track = client.fetch_currently_playing("stale").await.expect("request succeeds");
        assert_eq!(track, None);
        server.await.expect("server task");
    }
}
