use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::traits::SourceType;

/// Instantané fréquentiel produit par l'analyseur à chaque tick.
///
/// Emprunte le buffer d'octets de l'analyseur : tant que le `Snapshot`
/// existe, ce buffer ne peut pas être réécrit. `bin_count` est dérivé de
/// `bins.len()`, les deux ne peuvent donc pas diverger.
///
/// # Example
/// ```
/// use vf_core::frame::Snapshot;
/// let bins = [0u8, 128, 255];
/// let snap = Snapshot::new(&bins, 48000).unwrap();
/// assert_eq!(snap.bin_count(), 3);
/// assert!((snap.nyquist() - 24000.0).abs() < f32::EPSILON);
/// assert!(Snapshot::new(&bins, 0).is_err());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot<'a> {
    bins: &'a [u8],
    sample_rate: u32,
}

impl<'a> Snapshot<'a> {
    /// Wrap a byte spectrum (amplitudes 0–255, lowest frequency first).
    ///
    /// # Errors
    /// Returns [`CoreError::ZeroSampleRate`] if `sample_rate` is 0.
    pub fn new(bins: &'a [u8], sample_rate: u32) -> Result<Self, CoreError> {
        if sample_rate == 0 {
            return Err(CoreError::ZeroSampleRate);
        }
        Ok(Self { bins, sample_rate })
    }

    /// Infallible variant for callers that already hold a non-zero rate.
    #[inline]
    #[must_use]
    pub fn with_rate(bins: &'a [u8], sample_rate: NonZeroU32) -> Self {
        Self {
            bins,
            sample_rate: sample_rate.get(),
        }
    }

    /// Amplitudes par bin.
    #[inline]
    #[must_use]
    pub fn bins(&self) -> &'a [u8] {
        self.bins
    }

    /// Nombre de bins (== `bins().len()`).
    #[inline]
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    /// Sample rate of the analysed stream, in Hz.
    #[inline]
    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Half the sample rate.
    #[inline]
    #[must_use]
    pub fn nyquist(&self) -> f32 {
        self.sample_rate as f32 / 2.0
    }

    /// Largeur d'un bin en Hz, `nyquist / bin_count`. 0 pour un spectre vide.
    ///
    /// Computed in f64 so feature extraction can accumulate without an
    /// intermediate f32 rounding.
    #[inline]
    #[must_use]
    pub fn bin_hz(&self) -> f64 {
        if self.bins.is_empty() {
            0.0
        } else {
            f64::from(self.sample_rate) / 2.0 / self.bins.len() as f64
        }
    }
}

/// Features dérivées d'un `Snapshot`. Recalculées à chaque tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FeatureSet<'a> {
    /// Centroïde spectral en Hz (brillance perçue).
    pub spectral_centroid: f32,
    /// Fréquence du bin d'amplitude maximale, en Hz.
    pub peak_frequency: f32,
    /// RMS du spectre normalisé [0.0, 1.0].
    pub rms: f32,
    /// The unprocessed input bins.
    pub raw_data: &'a [u8],
}

impl FeatureSet<'_> {
    /// Copie possédée, pour traverser une frontière de thread.
    #[must_use]
    pub fn to_frame(&self, source: Option<SourceType>) -> FeatureFrame {
        FeatureFrame {
            source,
            spectral_centroid: self.spectral_centroid,
            peak_frequency: self.peak_frequency,
            rms: self.rms,
            bins: self.raw_data.to_vec(),
        }
    }
}

/// Owned, serializable copy of a `FeatureSet`.
///
/// Written by the analysis thread, read by the display loop.
///
/// # Example
/// ```
/// use vf_core::frame::FeatureFrame;
/// let f = FeatureFrame::default();
/// assert_eq!(f.rms, 0.0);
/// assert!(f.bins.is_empty());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureFrame {
    /// Source négociée, `None` avant la première analyse.
    pub source: Option<SourceType>,
    /// Centroïde spectral en Hz.
    pub spectral_centroid: f32,
    /// Fréquence de crête en Hz.
    pub peak_frequency: f32,
    /// RMS [0.0, 1.0].
    pub rms: f32,
    /// Spectre brut 0–255.
    pub bins: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_snapshot_has_zero_bin_width() {
        let snap = Snapshot::new(&[], 44100).expect("valid snapshot");
        assert_eq!(snap.bin_count(), 0);
        assert_eq!(snap.bin_hz(), 0.0);
    }

    #[test]
    fn bin_width_divides_nyquist() {
        let bins = [0u8; 3];
        let snap = Snapshot::new(&bins, 60).expect("valid snapshot");
        assert!((snap.bin_hz() - 10.0).abs() < 1e-6);
    }

    #[test]
    fn frame_copies_bins_and_source() {
        let bins = [1u8, 2, 3];
        let set = FeatureSet {
            spectral_centroid: 100.0,
            peak_frequency: 50.0,
            rms: 0.5,
            raw_data: &bins,
        };
        let frame = set.to_frame(Some(SourceType::Microphone));
        assert_eq!(frame.bins, vec![1, 2, 3]);
        assert_eq!(frame.source, Some(SourceType::Microphone));
        assert_eq!(frame.rms, 0.5);
    }
}
