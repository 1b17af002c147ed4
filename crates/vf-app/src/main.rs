use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use vf_audio::state::{AnalysisCommand, spawn_analysis_thread};
use vf_core::config::{MetadataConfig, VizConfig};
use vf_meta::{SpotifyClient, TrackInfo};

pub mod cli;
pub mod pipeline;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parser CLI
    let cli = cli::Cli::parse();

    // 2. Initialiser le logging
    env_logger::Builder::new()
        .filter_level(cli.log_level.parse().unwrap_or(log::LevelFilter::Warn))
        .init();

    if cli.print_auth_url {
        let client_id = cli
            .spotify_client_id
            .as_deref()
            .context("--print-auth-url requiert --spotify-client-id")?;
        println!("{}", vf_meta::authorize_url(client_id, &cli.redirect_uri)?);
        return Ok(());
    }

    // 3. Charger la config, appliquer les overrides CLI
    let mut config = resolve_config(&cli)?;
    cli.apply_overrides(&mut config);
    config.clamp_all();

    // 4. Négocier la source audio (Ctrl-C annule)
    let Some(captured) = pipeline::negotiate_source(&config.capture).await? else {
        log::info!("Négociation annulée, rien à capturer");
        return Ok(());
    };
    log::info!(
        "Capture via {} : {} ({} ch @ {} Hz)",
        captured.source_type,
        captured.stream.device_name(),
        captured.stream.channels(),
        captured.stream.sample_rate()
    );

    // 5. Thread d'analyse
    let (cmd_tx, cmd_rx) = flume::unbounded();
    let (mut features, analysis) =
        spawn_analysis_thread(captured.stream, &config.analysis, cmd_rx)?;

    // 6. Métadonnées (optionnel)
    let track_rx = start_metadata(cli.spotify_token.clone(), &config.metadata)?;

    // 7. Boucle d'affichage
    let result = pipeline::run_print_loop(
        &mut features,
        config.analysis.target_fps,
        cli.json,
        cli.ticks,
        track_rx.as_ref(),
    )
    .await;

    // 8. Arrêt (TOUJOURS, même en cas d'erreur)
    let _ = cmd_tx.send(AnalysisCommand::Quit);
    tokio::task::spawn_blocking(move || analysis.join())
        .await?
        .map_err(|_| anyhow::anyhow!("Le thread d'analyse a paniqué"))?;

    result
}

/// Start the now-playing poller when enabled and a token is available.
fn start_metadata(
    token: Option<String>,
    settings: &MetadataConfig,
) -> Result<Option<tokio::sync::watch::Receiver<Option<TrackInfo>>>> {
    if !settings.enabled {
        return Ok(None);
    }
    let Some(token) = token else {
        log::warn!("Métadonnées activées sans token Spotify, ignorées");
        return Ok(None);
    };

    let client = SpotifyClient::new()?;
    let period = Duration::from_millis(settings.poll_interval_ms);
    // La tâche s'arrête quand le receiver est libéré.
    let (rx, _task) = pipeline::spawn_now_playing(client, token, period);
    Ok(Some(rx))
}

/// Load `--config` if present, defaults otherwise.
fn resolve_config(cli: &cli::Cli) -> Result<VizConfig> {
    if cli.config.exists() {
        vf_core::config::load_config(&cli.config)
    } else {
        log::warn!(
            "Config introuvable : {}. Utilisation des défauts.",
            cli.config.display()
        );
        Ok(VizConfig::default())
    }
}
