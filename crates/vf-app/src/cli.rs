use std::path::PathBuf;

use clap::Parser;
use vf_core::config::VizConfig;
use vf_core::traits::SourceType;

/// vizfeed : négociation de source audio et features spectrales en direct.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Fichier de configuration TOML. Défaut : config/default.toml.
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Ordre de priorité des sources, ex. "system,microphone".
    #[arg(long, value_delimiter = ',')]
    pub sources: Option<Vec<SourceType>>,

    /// Ticks d'analyse par seconde (1–240).
    #[arg(long)]
    pub fps: Option<u32>,

    /// Taille de FFT (puissance de deux, 32–32768).
    #[arg(long)]
    pub fft_size: Option<usize>,

    /// Une ligne JSON par tick au lieu du texte.
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Stop after this many printed frames.
    #[arg(long)]
    pub ticks: Option<u64>,

    /// Token d'accès Spotify. Active le suivi du morceau en cours.
    #[arg(long, env = "VIZFEED_SPOTIFY_TOKEN", hide_env_values = true)]
    pub spotify_token: Option<String>,

    /// Afficher l'URL d'autorisation Spotify et quitter.
    #[arg(long, default_value_t = false, requires = "spotify_client_id")]
    pub print_auth_url: bool,

    /// Client ID de l'application Spotify.
    #[arg(long)]
    pub spotify_client_id: Option<String>,

    /// Redirect URI enregistrée pour l'application Spotify.
    #[arg(long, default_value = "http://127.0.0.1:8888/callback")]
    pub redirect_uri: String,

    /// Niveau de log : error, warn, info, debug, trace.
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut VizConfig) {
        if let Some(ref sources) = self.sources {
            config.capture.order.clone_from(sources);
        }
        if let Some(fps) = self.fps {
            config.analysis.target_fps = fps;
        }
        if let Some(size) = self.fft_size {
            config.analysis.fft_size = size;
        }
        if self.spotify_token.is_some() {
            config.metadata.enabled = true;
        }
    }
}
