use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CoreError;

/// Identifiant d'une stratégie de capture.
///
/// # Example
/// ```
/// use vf_core::traits::SourceType;
/// let s: SourceType = "mic".parse().unwrap();
/// assert_eq!(s, SourceType::Microphone);
/// assert_eq!(SourceType::System.to_string(), "system");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Audio de sortie du système (loopback / display audio).
    System,
    /// Entrée micro (son ambiant).
    Microphone,
}

impl SourceType {
    /// Default priority: system output first, microphone as fallback.
    pub const DEFAULT_ORDER: [SourceType; 2] = [SourceType::System, SourceType::Microphone];

    /// Identifiant stable, tel qu'écrit dans la config.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Microphone => "microphone",
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" | "display" | "loopback" => Ok(Self::System),
            "microphone" | "mic" => Ok(Self::Microphone),
            other => Err(CoreError::UnknownSource {
                name: other.to_string(),
            }),
        }
    }
}

/// Contraintes passées à chaque tentative d'acquisition.
///
/// Echo cancellation, noise suppression and AGC distort spectral
/// measurements, so the default disables all three.
///
/// # Example
/// ```
/// use vf_core::traits::AudioConstraints;
/// let c = AudioConstraints::default().with_sample_rate(Some(48000));
/// assert!(!c.requests_processing());
/// assert_eq!(c.sample_rate, Some(48000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AudioConstraints {
    /// Annulation d'écho de la plateforme.
    pub echo_cancellation: bool,
    /// Réduction de bruit de la plateforme.
    pub noise_suppression: bool,
    /// Contrôle automatique du gain.
    pub auto_gain_control: bool,
    /// Fixed sample rate hint in Hz. `None` lets the device choose.
    pub sample_rate: Option<u32>,
}

impl AudioConstraints {
    /// Same constraints with a different sample-rate hint.
    #[must_use]
    pub fn with_sample_rate(mut self, sample_rate: Option<u32>) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// `true` if any platform-side processing is requested.
    #[must_use]
    pub fn requests_processing(&self) -> bool {
        self.echo_cancellation || self.noise_suppression || self.auto_gain_control
    }
}

/// Why a single capture strategy failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    /// The user or the OS refused access.
    #[error("permission refusée")]
    PermissionDenied,

    /// No matching device on this host.
    #[error("aucun périphérique disponible")]
    DeviceAbsent,

    /// The environment cannot provide this kind of capture.
    #[error("non supporté : {0}")]
    Unsupported(String),

    /// Any other backend failure.
    #[error("erreur backend : {0}")]
    Backend(String),
}

/// Échec d'une stratégie de capture. Absorbé par le négociateur.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("capture {source_type} refusée : {reason}")]
pub struct StrategyDenied {
    /// Strategy that failed.
    pub source_type: SourceType,
    /// Cause of the failure.
    pub reason: DenialReason,
}

impl StrategyDenied {
    /// Shorthand constructor.
    #[must_use]
    pub fn new(source_type: SourceType, reason: DenialReason) -> Self {
        Self {
            source_type,
            reason,
        }
    }
}

/// Acquiert un flux audio brut pour une source donnée.
///
/// Implémenté par : `CpalStrategy` (vf-audio), et des mocks dans les tests.
/// `acquire` may suspend for as long as the platform needs (permission
/// prompts included); implementations must not time out on their own.
/// A failed attempt must not leave any resource behind.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use vf_core::traits::{AudioConstraints, CaptureStrategy, DenialReason, SourceType, StrategyDenied};
///
/// struct Unplugged;
///
/// #[async_trait]
/// impl CaptureStrategy<()> for Unplugged {
///     fn source_type(&self) -> SourceType { SourceType::Microphone }
///     async fn acquire(&self, _c: &AudioConstraints) -> Result<(), StrategyDenied> {
///         Err(StrategyDenied::new(SourceType::Microphone, DenialReason::DeviceAbsent))
///     }
/// }
/// ```
#[async_trait]
pub trait CaptureStrategy<H: Send>: Send + Sync {
    /// Identifiant rapporté dans le `CaptureResult` en cas de succès.
    fn source_type(&self) -> SourceType;

    /// Tente d'ouvrir le flux.
    async fn acquire(&self, constraints: &AudioConstraints) -> Result<H, StrategyDenied>;
}
