use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use vf_audio::capture::{CaptureStream, CpalStrategy};
use vf_audio::error::NegotiationError;
use vf_audio::negotiate::{CaptureNegotiator, CaptureResult};
use vf_core::config::CaptureConfig;
use vf_core::frame::FeatureFrame;
use vf_meta::{NowPlaying, TrackInfo};

/// Completes on Ctrl-C. Never completes if the handler cannot be installed.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Impossible d'écouter Ctrl-C : {e}");
        std::future::pending::<()>().await;
    }
}

/// Negotiate a capture stream in the configured order.
///
/// Returns `Ok(None)` if the user pressed Ctrl-C while an attempt was
/// pending.
///
/// # Errors
/// "no audio source available" when every strategy was denied.
pub async fn negotiate_source(
    config: &CaptureConfig,
) -> Result<Option<CaptureResult<CaptureStream>>> {
    let strategies = CpalStrategy::from_order(&config.order);
    let negotiator = CaptureNegotiator::from_config(config);

    match negotiator
        .negotiate_until(&strategies, shutdown_signal())
        .await
    {
        Ok(result) => Ok(Some(result)),
        Err(NegotiationError::Cancelled) => Ok(None),
        Err(err) => {
            if let NegotiationError::NoSourceAvailable { failures } = &err {
                for denied in failures {
                    log::debug!("  {denied}");
                }
            }
            Err(err.into())
        }
    }
}

/// Poll `source` every `period` and publish the current track.
///
/// Track changes are logged at info. The task ends when every receiver is
/// dropped.
pub fn spawn_now_playing<N>(
    source: N,
    token: String,
    period: Duration,
) -> (watch::Receiver<Option<TrackInfo>>, JoinHandle<()>)
where
    N: NowPlaying + 'static,
{
    let (tx, rx) = watch::channel(None);

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last: Option<TrackInfo> = None;

        loop {
            tokio::select! {
                () = tx.closed() => break,
                _ = ticker.tick() => {}
            }

            let current = match source.fetch_currently_playing(&token).await {
                Ok(track) => track,
                Err(e) => {
                    log::warn!("Métadonnées indisponibles : {e}");
                    continue;
                }
            };

            let changed = match (&last, &current) {
                (Some(a), Some(b)) => !a.same_track(b),
                (None, None) => false,
                _ => true,
            };
            if changed {
                match &current {
                    Some(track) => log::info!("Lecture : {}", track.label()),
                    None => log::info!("Aucune lecture en cours"),
                }
            }

            tx.send_replace(current.clone());
            last = current;
        }
        log::debug!("Suivi des métadonnées arrêté");
    });

    (rx, handle)
}

#[derive(Serialize)]
struct Line<'a> {
    #[serde(flatten)]
    frame: &'a FeatureFrame,
    #[serde(skip_serializing_if = "Option::is_none")]
    track: Option<&'a TrackInfo>,
}

/// Render one output line for a frame.
///
/// # Errors
/// Returns an error if JSON serialization fails.
pub fn format_line(frame: &FeatureFrame, json: bool, track: Option<&TrackInfo>) -> Result<String> {
    if json {
        return Ok(serde_json::to_string(&Line { frame, track })?);
    }

    let source = frame.source.map_or("-", |s| s.as_str());
    let mut line = format!(
        "[{source}] centroid {:>7.1} Hz | peak {:>7.1} Hz | rms {:.3}",
        frame.spectral_centroid, frame.peak_frequency, frame.rms
    );
    if let Some(track) = track {
        line.push_str(" | ");
        line.push_str(&track.label());
    }
    Ok(line)
}

/// Print the latest frame once per tick until Ctrl-C or `ticks` lines.
///
/// # Errors
/// Returns an error if a frame cannot be formatted.
pub async fn run_print_loop(
    features: &mut triple_buffer::Output<FeatureFrame>,
    fps: u32,
    json: bool,
    ticks: Option<u64>,
    track: Option<&watch::Receiver<Option<TrackInfo>>>,
) -> Result<()> {
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / f64::from(fps.max(1))));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);
    let mut printed = 0u64;

    loop {
        tokio::select! {
            biased;
            () = &mut shutdown => {
                log::info!("Ctrl-C reçu, arrêt");
                break;
            }
            _ = ticker.tick() => {}
        }

        let frame = features.read();
        // Rien d'analysé pour l'instant.
        if frame.source.is_none() {
            continue;
        }

        let current = track.and_then(|rx| rx.borrow().clone());
        println!("{}", format_line(frame, json, current.as_ref())?);

        printed += 1;
        if ticks.is_some_and(|limit| printed >= limit) {
            break;
        }
    }
    Ok(())
}
