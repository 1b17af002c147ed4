use vf_core::frame::{FeatureSet, Snapshot};

/// Extract spectral centroid, peak frequency and RMS from a byte spectrum.
///
/// Pure and total: a zero-length or silent snapshot yields zeros, never
/// NaN. Accumulation is done in f64 and rounded once at the end, so two
/// calls on the same snapshot are bit-identical.
///
/// # Example
/// ```
/// use vf_audio::features::extract;
/// use vf_core::frame::Snapshot;
///
/// let bins = [0u8, 0, 255, 0];
/// let snap = Snapshot::new(&bins, 800).unwrap();
/// let f = extract(&snap);
/// assert!((f.spectral_centroid - 200.0).abs() < 1e-3);
/// assert!((f.peak_frequency - 200.0).abs() < 1e-3);
/// assert!((f.rms - 0.5).abs() < 1e-6);
/// ```
#[must_use]
pub fn extract<'a>(snapshot: &Snapshot<'a>) -> FeatureSet<'a> {
    let bins = snapshot.bins();

    if bins.is_empty() {
        return FeatureSet {
            spectral_centroid: 0.0,
            peak_frequency: 0.0,
            rms: 0.0,
            raw_data: bins,
        };
    }

    let bin_count = bins.len() as f64;
    let bin_hz = snapshot.bin_hz();

    let mut weighted_sum = 0.0f64;
    let mut magnitude_sum = 0.0f64;
    let mut energy = 0.0f64;
    let mut peak_amp = 0u8;
    let mut peak_bin = 0usize;

    for (i, &amp) in bins.iter().enumerate() {
        let magnitude = f64::from(amp) / 255.0;
        weighted_sum += i as f64 * magnitude;
        magnitude_sum += magnitude;
        energy += magnitude * magnitude;

        // Strict > : en cas d'égalité le premier bin gagne.
        if amp > peak_amp {
            peak_amp = amp;
            peak_bin = i;
        }
    }

    let spectral_centroid = if magnitude_sum > 0.0 {
        weighted_sum / magnitude_sum * bin_hz
    } else {
        0.0
    };

    FeatureSet {
        spectral_centroid: spectral_centroid as f32,
        peak_frequency: (peak_bin as f64 * bin_hz) as f32,
        rms: (energy / bin_count).sqrt() as f32,
        raw_data: bins,
    }
}
