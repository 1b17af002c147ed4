use std::num::NonZeroU32;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use triple_buffer::TripleBuffer;
use vf_core::config::AnalysisConfig;
use vf_core::frame::FeatureFrame;
use vf_core::traits::SourceType;

use crate::analyser::Analyser;
use crate::capture::CaptureStream;
use crate::features;

/// Commandes envoyées au thread d'analyse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisCommand {
    Quit,
}

/// Spawn the analysis thread on a negotiated capture stream.
///
/// The thread owns the stream and releases it on `Quit` (or when every
/// command sender is dropped). The latest `FeatureFrame` is published
/// through the returned triple buffer.
///
/// # Errors
/// Returns an error if the thread cannot be spawned.
pub fn spawn_analysis_thread(
    mut stream: CaptureStream,
    settings: &AnalysisConfig,
    cmd_rx: flume::Receiver<AnalysisCommand>,
) -> anyhow::Result<(triple_buffer::Output<FeatureFrame>, JoinHandle<()>)> {
    let (mut buf_input, buf_output) = TripleBuffer::new(&FeatureFrame::default()).split();
    let settings = settings.clone();
    let sample_rate = stream.sample_rate();
    let source = stream.source();

    let handle = thread::Builder::new()
        .name("vf-analysis".to_string())
        .spawn(move || {
            run_analysis_loop(
                &mut buf_input,
                &settings,
                sample_rate,
                source,
                &cmd_rx,
                &mut |out| {
                    stream.read_samples(out);
                },
            );
            stream.release();
        })?;

    Ok((buf_output, handle))
}

/// Core analysis loop: read, analyse, extract, publish, sleep.
pub fn run_analysis_loop(
    buf_input: &mut triple_buffer::Input<FeatureFrame>,
    settings: &AnalysisConfig,
    sample_rate: NonZeroU32,
    source: SourceType,
    cmd_rx: &flume::Receiver<AnalysisCommand>,
    read_fn: &mut dyn FnMut(&mut Vec<f32>),
) {
    let mut analyser = Analyser::new(settings, sample_rate);
    let mut sample_buf: Vec<f32> = Vec::with_capacity(settings.fft_size * 2);

    let frame_period = Duration::from_secs_f64(1.0 / f64::from(settings.target_fps.max(1)));
    log::debug!(
        "Analyse {source} : fft {} ({} bins) @ {sample_rate}Hz, {} fps",
        settings.fft_size,
        analyser.bin_count(),
        settings.target_fps
    );

    loop {
        match cmd_rx.try_recv() {
            Ok(AnalysisCommand::Quit) | Err(flume::TryRecvError::Disconnected) => {
                log::debug!("Arrêt du thread d'analyse");
                return;
            }
            Err(flume::TryRecvError::Empty) => {}
        }

        read_fn(&mut sample_buf);
        analyser.push_samples(&sample_buf);

        let snapshot = analyser.snapshot();
        let frame = features::extract(&snapshot).to_frame(Some(source));
        buf_input.write(frame);

        thread::sleep(frame_period);
    }
}
