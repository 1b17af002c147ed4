use std::num::NonZeroU32;
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use vf_core::config::AnalysisConfig;
use vf_core::frame::Snapshot;

/// Frequency analyser with byte-spectrum output.
///
/// Keeps the last `fft_size` mono samples, applies a Blackman window, runs a
/// real FFT, smooths magnitudes over time and maps them from
/// `[min_decibels, max_decibels]` onto 0–255. Exposes `fft_size / 2` bins.
///
/// All buffers are allocated up front; `snapshot` does not allocate.
///
/// # Example
/// ```
/// use std::num::NonZeroU32;
/// use vf_audio::analyser::Analyser;
/// use vf_core::config::AnalysisConfig;
///
/// let rate = NonZeroU32::new(48000).unwrap();
/// let mut analyser = Analyser::new(&AnalysisConfig::default(), rate);
/// analyser.push_samples(&[0.0; 4096]);
/// let snap = analyser.snapshot();
/// assert_eq!(snap.bin_count(), 1024);
/// assert!(snap.bins().iter().all(|&b| b == 0));
/// ```
pub struct Analyser {
    fft_size: usize,
    sample_rate: NonZeroU32,
    smoothing: f32,
    min_db: f32,
    db_range: f32,
    /// Circular sample history, `write_pos` is the oldest slot.
    history: Vec<f32>,
    write_pos: usize,
    input_buf: Vec<f32>,
    spectrum_buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    plan: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    smoothed: Vec<f32>,
    bytes: Vec<u8>,
}

impl Analyser {
    /// Build an analyser from the `[analysis]` config section.
    ///
    /// # Panics
    /// Panics if `fft_size` is not a power of two of at least 32. A config
    /// that went through `clamp_all` always satisfies this.
    #[must_use]
    pub fn new(settings: &AnalysisConfig, sample_rate: NonZeroU32) -> Self {
        let size = settings.fft_size;
        assert!(
            size >= 32 && size.is_power_of_two(),
            "fft_size must be a power of two >= 32, got {size}"
        );

        let mut planner = RealFftPlanner::<f32>::new();
        let plan = planner.plan_fft_forward(size);

        let input_buf = plan.make_input_vec();
        let spectrum_buf = plan.make_output_vec();
        let scratch = plan.make_scratch_vec();

        // Blackman, forme périodique (dénominateur N).
        let n = size as f32;
        let window: Vec<f32> = (0..size)
            .map(|i| {
                let x = std::f32::consts::TAU * i as f32 / n;
                0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
            })
            .collect();

        let bins = size / 2;

        Self {
            fft_size: size,
            sample_rate,
            smoothing: settings.smoothing_time_constant.clamp(0.0, 1.0),
            min_db: settings.min_decibels,
            db_range: (settings.max_decibels - settings.min_decibels).max(f32::EPSILON),
            history: vec![0.0; size],
            write_pos: 0,
            input_buf,
            spectrum_buf,
            scratch,
            plan,
            window,
            smoothed: vec![0.0; bins],
            bytes: vec![0; bins],
        }
    }

    /// Append mono samples to the history. Older samples fall off.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let tail = if samples.len() > self.fft_size {
            &samples[samples.len() - self.fft_size..]
        } else {
            samples
        };
        for &s in tail {
            self.history[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % self.fft_size;
        }
    }

    /// Number of frequency bins, `fft_size / 2`.
    #[must_use]
    pub fn bin_count(&self) -> usize {
        self.bytes.len()
    }

    /// Analyse the current history and return the byte spectrum.
    ///
    /// Each call advances the temporal smoothing by one step. The returned
    /// snapshot borrows the analyser, so the bins cannot be overwritten
    /// while it is alive.
    pub fn snapshot(&mut self) -> Snapshot<'_> {
        let n = self.fft_size;
        for (i, slot) in self.input_buf.iter_mut().enumerate() {
            let sample = self.history[(self.write_pos + i) % n];
            *slot = sample * self.window[i];
        }

        if self
            .plan
            .process_with_scratch(&mut self.input_buf, &mut self.spectrum_buf, &mut self.scratch)
            .is_err()
        {
            log::warn!("FFT en échec, spectre inchangé");
            return Snapshot::with_rate(&self.bytes, self.sample_rate);
        }

        let scale = 1.0 / n as f32;
        let tau = self.smoothing;
        for (k, (smoothed, byte)) in self
            .smoothed
            .iter_mut()
            .zip(self.bytes.iter_mut())
            .enumerate()
        {
            let magnitude = self.spectrum_buf[k].norm() * scale;
            let value = tau * *smoothed + (1.0 - tau) * magnitude;
            *smoothed = if value.is_finite() { value } else { 0.0 };
            *byte = to_byte(*smoothed, self.min_db, self.db_range);
        }

        Snapshot::with_rate(&self.bytes, self.sample_rate)
    }
}

/// Magnitude → dB → 0–255, floored and clamped.
#[inline]
fn to_byte(magnitude: f32, min_db: f32, db_range: f32) -> u8 {
    if magnitude <= 0.0 {
        return 0;
    }
    let db = 20.0 * magnitude.log10();
    let scaled = (255.0 * (db - min_db) / db_range).floor();
    if scaled.is_nan() {
        0
    } else {
        scaled.clamp(0.0, 255.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::features::extract;

    fn rate(hz: u32) -> NonZeroU32 {
        NonZeroU32::new(hz).expect("non-zero")
    }

    fn raw_settings(fft_size: usize) -> AnalysisConfig {
        AnalysisConfig {
            fft_size,
            smoothing_time_constant: 0.0,
            min_decibels: -100.0,
            max_decibels: 0.0,
            ..AnalysisConfig::default()
        }
    }

    fn sine(freq: f32, amplitude: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| {
                amplitude
                    * (std::f32::consts::TAU * freq * i as f32 / sample_rate as f32).sin()
            })
            .collect()
    }

    #[test]
    fn silence_maps_to_zero_bytes() {
        let mut a = Analyser::new(&AnalysisConfig::default(), rate(44100));
        assert_eq!(a.bin_count(), 1024);
        a.push_samples(&[0.0; 2048]);
        let snap = a.snapshot();
        assert_eq!(snap.bin_count(), 1024);
        assert_eq!(snap.sample_rate(), 44100);
        assert!(snap.bins().iter().all(|&b| b == 0));
    }

    #[test]
    fn bin_centred_sine_lands_on_its_bin() {
        // 48000 / 1024 = 46.875 Hz par bin, 3000 Hz tombe pile sur le bin 64.
        let mut a = Analyser::new(&raw_settings(1024), rate(48000));
        a.push_samples(&sine(3000.0, 0.5, 48000, 1024));
        let snap = a.snapshot();

        // |X|/N = 0.5 * 0.5 * 0.42 → -19.6 dB → 205.
        assert_eq!(snap.bins()[64], 205);
        // Lobe voisin : 0.5 * 0.5 * 0.25 → -24.1 dB → 193.
        assert_eq!(snap.bins()[63], 193);
        assert_eq!(snap.bins()[65], 193);

        let f = extract(&snap);
        assert_relative_eq!(f.peak_frequency, 3000.0, epsilon = 1e-2);
    }

    #[test]
    fn smoothing_decays_towards_silence() {
        let settings = AnalysisConfig {
            fft_size: 512,
            ..AnalysisConfig::default()
        };
        let mut a = Analyser::new(&settings, rate(48000));
        a.push_samples(&sine(4500.0, 0.8, 48000, 512));
        let loud = a.snapshot().bins()[48];
        assert!(loud > 0);

        a.push_samples(&[0.0; 512]);
        let first = a.snapshot().bins()[48];
        let second = a.snapshot().bins()[48];
        assert!(first <= loud);
        assert!(second < first || second == 0);
    }

    #[test]
    fn push_keeps_only_the_latest_window() {
        let mut a = Analyser::new(&raw_settings(64), rate(8000));
        let mut samples = vec![1.0f32; 1000];
        samples.extend(std::iter::repeat_n(0.0, 64));
        a.push_samples(&samples);
        assert!(a.snapshot().bins().iter().all(|&b| b == 0));
    }

    #[test]
    fn byte_mapping_is_floored_and_clamped() {
        assert_eq!(to_byte(0.0, -100.0, 70.0), 0);
        assert_eq!(to_byte(1.0, -100.0, 70.0), 255);
        assert_eq!(to_byte(1e-9, -100.0, 70.0), 0);
        // -65 dB, au milieu de [-100, -30].
        let mid = 10f32.powf(-65.0 / 20.0);
        assert_eq!(to_byte(mid, -100.0, 70.0), 127);
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn rejects_non_power_of_two() {
        let _ = Analyser::new(&raw_settings(1000), rate(48000));
    }
}
