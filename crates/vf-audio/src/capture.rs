use std::fmt;
use std::num::NonZeroU32;
use std::thread::{self, JoinHandle};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BuildStreamError, DefaultStreamConfigError, Device, FromSample, Sample, SampleFormat,
    SampleRate, SizedSample, StreamConfig, SupportedStreamConfig, SupportedStreamConfigRange,
};
use rtrb::{Consumer, Producer, RingBuffer};
use vf_core::traits::{AudioConstraints, CaptureStrategy, DenialReason, SourceType, StrategyDenied};

/// Live mono capture stream.
///
/// The cpal stream lives on its own thread (it is not `Send` on every
/// backend); samples cross over through a lock-free ring buffer. Dropping
/// the handle stops the device.
pub struct CaptureStream {
    consumer: Consumer<f32>,
    sample_rate: NonZeroU32,
    channels: u16,
    device_name: String,
    source: SourceType,
    stop_tx: Option<flume::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureStream {
    /// Drain available samples into `out` (cleared first).
    ///
    /// Returns how many samples were read.
    pub fn read_samples(&mut self, out: &mut Vec<f32>) -> usize {
        let available = self.consumer.slots();
        out.clear();
        out.reserve(available);
        while let Ok(sample) = self.consumer.pop() {
            out.push(sample);
        }
        out.len()
    }

    /// Sample rate the device actually runs at.
    #[must_use]
    pub fn sample_rate(&self) -> NonZeroU32 {
        self.sample_rate
    }

    /// Channel count before downmix.
    #[must_use]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Backend device name.
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Strategy that opened this stream.
    #[must_use]
    pub fn source(&self) -> SourceType {
        self.source
    }

    /// Stop the device and wait for the capture thread.
    pub fn release(mut self) {
        self.shutdown();
        log::info!("Capture {} libérée ({})", self.source, self.device_name);
    }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            log::error!("Thread de capture {} paniqué", self.source);
        }
    }
}

impl Drop for CaptureStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for CaptureStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureStream")
            .field("source", &self.source)
            .field("device_name", &self.device_name)
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .finish_non_exhaustive()
    }
}

/// cpal-backed capture strategy for one source type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpalStrategy {
    source: SourceType,
}

impl CpalStrategy {
    #[must_use]
    pub fn new(source: SourceType) -> Self {
        Self { source }
    }

    /// One strategy per entry, same order.
    #[must_use]
    pub fn from_order(order: &[SourceType]) -> Vec<Box<dyn CaptureStrategy<CaptureStream>>> {
        order
            .iter()
            .map(|&source| Box::new(Self::new(source)) as Box<dyn CaptureStrategy<CaptureStream>>)
            .collect()
    }
}

/// What the capture thread hands back once the device is running.
struct Opened {
    consumer: Consumer<f32>,
    sample_rate: NonZeroU32,
    channels: u16,
    device_name: String,
}

#[async_trait]
impl CaptureStrategy<CaptureStream> for CpalStrategy {
    fn source_type(&self) -> SourceType {
        self.source
    }

    async fn acquire(&self, constraints: &AudioConstraints) -> Result<CaptureStream, StrategyDenied> {
        let source = self.source;
        let constraints = *constraints;

        if constraints.requests_processing() {
            log::debug!("cpal livre du PCM brut, traitements demandés ignorés pour {source}");
        }

        acquire_on_thread(source, move || open_stream(source, &constraints)).await
    }
}

/// Run `open` on a dedicated capture thread and wait for its answer.
///
/// The thread keeps whatever `open` returns alive until the resulting
/// `CaptureStream` is released. If the caller stops waiting first, the
/// opened stream is dropped as soon as `open` returns.
async fn acquire_on_thread<S, F>(source: SourceType, open: F) -> Result<CaptureStream, StrategyDenied>
where
    S: 'static,
    F: FnOnce() -> Result<(S, Opened), DenialReason> + Send + 'static,
{
    let (ready_tx, ready_rx) = flume::bounded::<Result<Opened, DenialReason>>(1);
    let (stop_tx, stop_rx) = flume::bounded::<()>(1);

    let thread = thread::Builder::new()
        .name(format!("vf-capture-{source}"))
        .spawn(move || run_capture_thread(source, open, &ready_tx, &stop_rx))
        .map_err(|e| StrategyDenied::new(source, DenialReason::Backend(e.to_string())))?;

    match ready_rx.recv_async().await {
        Ok(Ok(opened)) => {
            log::info!(
                "Capture {source} : {} @ {}Hz, {} canal/canaux",
                opened.device_name,
                opened.sample_rate,
                opened.channels
            );
            Ok(CaptureStream {
                consumer: opened.consumer,
                sample_rate: opened.sample_rate,
                channels: opened.channels,
                device_name: opened.device_name,
                source,
                stop_tx: Some(stop_tx),
                thread: Some(thread),
            })
        }
        Ok(Err(reason)) => Err(StrategyDenied::new(source, reason)),
        Err(_) => Err(StrategyDenied::new(
            source,
            DenialReason::Backend("thread de capture terminé sans réponse".to_string()),
        )),
    }
}

fn run_capture_thread<S>(
    source: SourceType,
    open: impl FnOnce() -> Result<(S, Opened), DenialReason>,
    ready_tx: &flume::Sender<Result<Opened, DenialReason>>,
    stop_rx: &flume::Receiver<()>,
) {
    let (stream, opened) = match open() {
        Ok(pair) => pair,
        Err(reason) => {
            let _ = ready_tx.send(Err(reason));
            return;
        }
    };

    if ready_tx.send(Ok(opened)).is_err() {
        // Négociation abandonnée pendant l'ouverture.
        log::debug!("Capture {source} ouverte trop tard, fermeture");
        return;
    }

    // Returns on explicit stop or when the handle is dropped.
    let _ = stop_rx.recv();
    drop(stream);
    log::debug!("Flux {source} fermé");
}

fn open_stream(
    source: SourceType,
    constraints: &AudioConstraints,
) -> Result<(cpal::Stream, Opened), DenialReason> {
    let host = cpal::default_host();
    let (device, loopback) = open_device(&host, source)?;
    let device_name = device.name().unwrap_or_else(|_| "inconnu".to_string());

    let (default, ranges): (_, Vec<SupportedStreamConfigRange>) = if loopback {
        let default = device.default_output_config().map_err(map_config_error)?;
        let ranges = device
            .supported_output_configs()
            .map(Iterator::collect)
            .unwrap_or_default();
        (default, ranges)
    } else {
        let default = device.default_input_config().map_err(map_config_error)?;
        let ranges = device
            .supported_input_configs()
            .map(Iterator::collect)
            .unwrap_or_default();
        (default, ranges)
    };

    let supported = select_config(&ranges, default, constraints.sample_rate);
    let sample_rate = NonZeroU32::new(supported.sample_rate().0)
        .ok_or_else(|| DenialReason::Unsupported("fréquence d'échantillonnage nulle".to_string()))?;
    let channels = supported.channels().max(1);
    let format = supported.sample_format();
    let config: StreamConfig = supported.into();

    // Deux secondes de marge.
    let (producer, consumer) = RingBuffer::new(sample_rate.get() as usize * 2);

    let stream = match format {
        SampleFormat::F32 => build_stream::<f32>(&device, &config, producer, channels),
        SampleFormat::I16 => build_stream::<i16>(&device, &config, producer, channels),
        SampleFormat::U16 => build_stream::<u16>(&device, &config, producer, channels),
        other => {
            return Err(DenialReason::Unsupported(format!(
                "format d'échantillon {other:?}"
            )));
        }
    }
    .map_err(map_build_error)?;

    stream
        .play()
        .map_err(|e| DenialReason::Backend(e.to_string()))?;

    Ok((
        stream,
        Opened {
            consumer,
            sample_rate,
            channels,
            device_name,
        },
    ))
}

/// Device for `source`, and whether it is an output opened in loopback.
fn open_device(host: &cpal::Host, source: SourceType) -> Result<(Device, bool), DenialReason> {
    match source {
        SourceType::Microphone => host
            .default_input_device()
            .map(|d| (d, false))
            .ok_or(DenialReason::DeviceAbsent),
        SourceType::System => open_system_device(host),
    }
}

#[cfg(windows)]
fn open_system_device(host: &cpal::Host) -> Result<(Device, bool), DenialReason> {
    // WASAPI ouvre un périphérique de sortie en entrée (loopback).
    host.default_output_device()
        .map(|d| (d, true))
        .ok_or(DenialReason::DeviceAbsent)
}

#[cfg(not(windows))]
fn open_system_device(host: &cpal::Host) -> Result<(Device, bool), DenialReason> {
    let devices = host
        .input_devices()
        .map_err(|e| DenialReason::Backend(e.to_string()))?;
    devices
        .into_iter()
        .find(|d| d.name().is_ok_and(|name| is_monitor_name(&name)))
        .map(|d| (d, false))
        .ok_or_else(|| {
            DenialReason::Unsupported("aucun périphérique monitor/loopback".to_string())
        })
}

/// PulseAudio/PipeWire monitor sources and virtual loopback drivers.
fn is_monitor_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("monitor") || lower.contains("loopback")
}

/// Honour a sample-rate hint when a supported range covers it.
///
/// The hint is a preference: if nothing matches, the device default wins.
fn select_config(
    ranges: &[SupportedStreamConfigRange],
    default: SupportedStreamConfig,
    hint: Option<u32>,
) -> SupportedStreamConfig {
    let Some(rate) = hint else {
        return default;
    };
    if default.sample_rate().0 == rate {
        return default;
    }

    let covers = |r: &&SupportedStreamConfigRange| {
        r.min_sample_rate().0 <= rate && rate <= r.max_sample_rate().0
    };
    let same_shape = ranges.iter().filter(covers).find(|r| {
        r.sample_format() == default.sample_format() && r.channels() == default.channels()
    });
    let chosen = same_shape.or_else(|| {
        ranges
            .iter()
            .filter(covers)
            .find(|r| r.sample_format() == default.sample_format())
    });

    match chosen {
        Some(range) => range.clone().with_sample_rate(SampleRate(rate)),
        None => {
            log::debug!(
                "{rate}Hz non supporté, fréquence par défaut {}Hz",
                default.sample_rate().0
            );
            default
        }
    }
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut producer: Producer<f32>,
    channels: u16,
) -> Result<cpal::Stream, BuildStreamError>
where
    T: Sample + SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let channels = usize::from(channels);
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            for frame in data.chunks(channels) {
                let sum: f32 = frame.iter().map(|&s| f32::from_sample(s)).sum();
                // Buffer plein : l'analyse a du retard, on jette.
                let _ = producer.push(sum / channels as f32);
            }
        },
        |err| {
            log::error!("Erreur du flux audio : {err}");
        },
        None,
    )
}

fn map_build_error(err: BuildStreamError) -> DenialReason {
    match err {
        BuildStreamError::DeviceNotAvailable => DenialReason::DeviceAbsent,
        BuildStreamError::StreamConfigNotSupported => {
            DenialReason::Unsupported("configuration de flux refusée".to_string())
        }
        other => DenialReason::Backend(other.to_string()),
    }
}

fn map_config_error(err: DefaultStreamConfigError) -> DenialReason {
    match err {
        DefaultStreamConfigError::DeviceNotAvailable => DenialReason::DeviceAbsent,
        DefaultStreamConfigError::StreamTypeNotSupported => {
            DenialReason::Unsupported("type de flux non supporté".to_string())
        }
        other => DenialReason::Backend(other.to_string()),
    }
}
