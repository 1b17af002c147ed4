use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::traits::{AudioConstraints, SourceType};

/// Configuration complète de vizfeed.
///
/// Sérialisable en TOML. Chaque champ a une valeur par défaut saine.
///
/// # Example
/// ```
/// use vf_core::config::VizConfig;
/// let config = VizConfig::default();
/// assert_eq!(config.analysis.fft_size, 2048);
/// assert_eq!(config.capture.primary_sample_rate, 48000);
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
pub struct VizConfig {
    /// Négociation de la source.
    pub capture: CaptureConfig,
    /// Analyseur et cadence des ticks.
    pub analysis: AnalysisConfig,
    /// Now-playing polling.
    pub metadata: MetadataConfig,
}

/// Capture negotiation settings.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct CaptureConfig {
    /// Ordre de priorité des stratégies.
    pub order: Vec<SourceType>,
    /// Annulation d'écho plateforme.
    pub echo_cancellation: bool,
    /// Réduction de bruit plateforme.
    pub noise_suppression: bool,
    /// Contrôle automatique du gain.
    pub auto_gain_control: bool,
    /// Sample rate hint for the first strategy only. 0 = no hint.
    pub primary_sample_rate: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            order: SourceType::DEFAULT_ORDER.to_vec(),
            echo_cancellation: false,
            noise_suppression: false,
            auto_gain_control: false,
            primary_sample_rate: 48000,
        }
    }
}

impl CaptureConfig {
    /// Shared constraints, without the primary sample-rate hint.
    #[must_use]
    pub fn constraints(&self) -> AudioConstraints {
        AudioConstraints {
            echo_cancellation: self.echo_cancellation,
            noise_suppression: self.noise_suppression,
            auto_gain_control: self.auto_gain_control,
            sample_rate: None,
        }
    }

    /// Hint passé à la stratégie primaire, `None` si désactivé.
    #[must_use]
    pub fn primary_hint(&self) -> Option<u32> {
        (self.primary_sample_rate > 0).then_some(self.primary_sample_rate)
    }
}

/// Analyser settings, Web-Audio style.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct AnalysisConfig {
    /// Taille de la FFT (puissance de 2). Bins = fft_size / 2.
    pub fft_size: usize,
    /// Lissage temporel [0.0, 1.0]. 0 = brut.
    pub smoothing_time_constant: f32,
    /// dB mappé sur l'octet 0.
    pub min_decibels: f32,
    /// dB mappé sur l'octet 255.
    pub max_decibels: f32,
    /// Ticks d'analyse par seconde.
    pub target_fps: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
            target_fps: 60,
        }
    }
}

/// Now-playing metadata polling.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct MetadataConfig {
    /// Activer le polling (requiert un token).
    pub enabled: bool,
    /// Intervalle de polling en millisecondes.
    pub poll_interval_ms: u64,
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            poll_interval_ms: 1000,
        }
    }
}

impl VizConfig {
    /// Clamp all numeric fields to their valid ranges.
    /// Called after TOML deserialization to prevent out-of-range values.
    pub fn clamp_all(&mut self) {
        let a = &mut self.analysis;
        a.fft_size = a.fft_size.clamp(32, 32768).next_power_of_two().min(32768);
        a.smoothing_time_constant = a.smoothing_time_constant.clamp(0.0, 1.0);
        if a.max_decibels <= a.min_decibels {
            log::warn!(
                "max_decibels ({}) <= min_decibels ({}), valeurs par défaut restaurées",
                a.max_decibels,
                a.min_decibels
            );
            let d = AnalysisConfig::default();
            a.min_decibels = d.min_decibels;
            a.max_decibels = d.max_decibels;
        }
        a.target_fps = a.target_fps.clamp(1, 240);
        self.metadata.poll_interval_ms = self.metadata.poll_interval_ms.max(250);
        if self.capture.order.is_empty() {
            log::warn!("capture.order vide : aucune source ne sera tentée");
        }
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    capture: Option<CaptureSection>,
    analysis: Option<AnalysisSection>,
    metadata: Option<MetadataSection>,
}

/// Capture section, all fields optional for partial override.
#[derive(Deserialize)]
struct CaptureSection {
    order: Option<Vec<String>>,
    echo_cancellation: Option<bool>,
    noise_suppression: Option<bool>,
    auto_gain_control: Option<bool>,
    primary_sample_rate: Option<u32>,
}

/// Analysis section, all fields optional.
#[derive(Deserialize)]
struct AnalysisSection {
    fft_size: Option<usize>,
    smoothing_time_constant: Option<f32>,
    min_decibels: Option<f32>,
    max_decibels: Option<f32>,
    target_fps: Option<u32>,
}

/// Metadata section, all fields optional.
#[derive(Deserialize)]
struct MetadataSection {
    enabled: Option<bool>,
    poll_interval_ms: Option<u64>,
}

/// Parse une config TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the TOML is malformed or names an unknown source.
///
/// # Example
/// ```
/// use vf_core::config::parse_config;
/// use vf_core::traits::SourceType;
/// let config = parse_config("[capture]\norder = [\"mic\"]\n").unwrap();
/// assert_eq!(config.capture.order, vec![SourceType::Microphone]);
/// ```
pub fn parse_config(content: &str) -> Result<VizConfig> {
    let file: ConfigFile = toml::from_str(content).context("Erreur de parsing TOML")?;

    let mut config = VizConfig::default();

    if let Some(c) = file.capture {
        if let Some(order) = c.order {
            config.capture.order = order
                .iter()
                .map(|s| s.parse::<SourceType>())
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Some(v) = c.echo_cancellation {
            config.capture.echo_cancellation = v;
        }
        if let Some(v) = c.noise_suppression {
            config.capture.noise_suppression = v;
        }
        if let Some(v) = c.auto_gain_control {
            config.capture.auto_gain_control = v;
        }
        if let Some(v) = c.primary_sample_rate {
            config.capture.primary_sample_rate = v;
        }
    }

    if let Some(a) = file.analysis {
        if let Some(v) = a.fft_size {
            config.analysis.fft_size = v;
        }
        if let Some(v) = a.smoothing_time_constant {
            config.analysis.smoothing_time_constant = v;
        }
        if let Some(v) = a.min_decibels {
            config.analysis.min_decibels = v;
        }
        if let Some(v) = a.max_decibels {
            config.analysis.max_decibels = v;
        }
        if let Some(v) = a.target_fps {
            config.analysis.target_fps = v;
        }
    }

    if let Some(m) = file.metadata {
        if let Some(v) = m.enabled {
            config.metadata.enabled = v;
        }
        if let Some(v) = m.poll_interval_ms {
            config.metadata.poll_interval_ms = v;
        }
    }

    config.clamp_all();
    Ok(config)
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
///
/// # Example
/// ```no_run
/// use vf_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<VizConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Config invalide : {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse_config("").expect("empty toml is valid");
        assert_eq!(config, VizConfig::default());
    }

    #[test]
    fn partial_override_keeps_other_defaults() {
        let config = parse_config(
            "[analysis]\nfft_size = 1024\n\n[capture]\nprimary_sample_rate = 0\n",
        )
        .expect("valid toml");
        assert_eq!(config.analysis.fft_size, 1024);
        assert_eq!(config.analysis.target_fps, 60);
        assert_eq!(config.capture.primary_hint(), None);
        assert_eq!(config.capture.order, SourceType::DEFAULT_ORDER.to_vec());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let config = parse_config(
            "[analysis]\nfft_size = 1000\nsmoothing_time_constant = 3.0\ntarget_fps = 0\nmin_decibels = -10\nmax_decibels = -20\n\n[metadata]\npoll_interval_ms = 10\n",
        )
        .expect("valid toml");
        assert_eq!(config.analysis.fft_size, 1024);
        assert_eq!(config.analysis.smoothing_time_constant, 1.0);
        assert_eq!(config.analysis.target_fps, 1);
        assert_eq!(config.analysis.min_decibels, -100.0);
        assert_eq!(config.analysis.max_decibels, -30.0);
        assert_eq!(config.metadata.poll_interval_ms, 250);
    }

    #[test]
    fn unknown_source_is_rejected() {
        assert!(parse_config("[capture]\norder = [\"webcam\"]\n").is_err());
    }

    #[test]
    fn constraints_leave_processing_off_and_hint_to_primary() {
        let capture = CaptureConfig::default();
        let c = capture.constraints();
        assert!(!c.requests_processing());
        assert_eq!(c.sample_rate, None);
        assert_eq!(capture.primary_hint(), Some(48000));
    }

    #[test]
    fn load_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "[capture]\norder = [\"microphone\", \"system\"]").expect("write");
        let config = load_config(file.path()).expect("load");
        assert_eq!(
            config.capture.order,
            vec![SourceType::Microphone, SourceType::System]
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_config(Path::new("/nonexistent/vizfeed.toml")).is_err());
    }
}
