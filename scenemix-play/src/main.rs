//! SceneMix player binary
//!
//! Loads a scene configuration, decodes every source into memory, and
//! either drives an interactive audio session (labels typed on stdin switch
//! scenes) or renders a sequence of labeled sources into a WAV file.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scenemix_engine::{duration_to_tz, wav, Region, Session, SharedSource, Source, Tz};
use scenemix_play::{load_source, AudioOutput, Config, Controller, Stream};

/// SceneMix - realtime ambience, music and effect sequencer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Scene configuration file
    #[arg(short, long, value_name = "FILE", default_value = "scenes.toml")]
    config: PathBuf,

    /// Output device name (overrides configuration)
    #[arg(long, value_name = "DEVICE")]
    device: Option<String>,

    /// List configured actions and exit
    #[arg(long)]
    list_actions: bool,

    /// Render the given labels to a WAV file instead of playing live
    #[arg(long, value_name = "FILE")]
    render: Option<PathBuf>,

    /// Seconds each label occupies in offline rendering
    #[arg(long, value_name = "SECS", default_value_t = 10.0)]
    step_secs: f64,

    /// Labels to render (offline mode)
    labels: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("scenemix_play={0},scenemix_engine={0}", log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    let sample_rate = config.sample_rate as Tz;
    let fade = duration_to_tz(Duration::from_millis(config.fade_ms), sample_rate);
    let ahead = duration_to_tz(Duration::from_millis(config.ahead_ms), sample_rate);
    let chunk_size = config.chunk_size as Tz;

    let mut controller = Controller::new(sample_rate, fade, ahead, chunk_size);
    for entry in &config.ambience {
        let source: SharedSource = Arc::new(load_source(&entry.path)?);
        controller.add_ambience(entry.label.clone(), source)?;
    }
    for entry in &config.music {
        let source: SharedSource = Arc::new(load_source(&entry.path)?);
        controller.add_music(entry.label.clone(), source, entry.after.clone())?;
    }
    for entry in &config.effect {
        let source: SharedSource = Arc::new(load_source(&entry.path)?);
        controller.add_effect(entry.label.clone(), source)?;
    }

    if args.list_actions {
        for group in controller.actions() {
            println!("{:?}:", group.kind);
            for label in group.labels {
                println!("  {}", label);
            }
        }
        return Ok(());
    }

    if let Some(out_path) = args.render {
        return render_offline(&args.labels, &config, fade, sample_rate, args.step_secs, out_path);
    }

    play_live(controller, &config, args.device.as_deref())
}

/// Place the labeled sources on one timeline, crossfading between steps,
/// and mix it to a WAV file.
fn render_offline(
    labels: &[String],
    config: &Config,
    fade: Tz,
    sample_rate: Tz,
    step_secs: f64,
    out_path: PathBuf,
) -> anyhow::Result<()> {
    anyhow::ensure!(!labels.is_empty(), "no labels given to render");

    let step = duration_to_tz(Duration::from_secs_f64(step_secs), sample_rate);
    let session = Session::new(sample_rate, false);

    let lookup = |label: &String| -> anyhow::Result<SharedSource> {
        let entry = config
            .ambience
            .iter()
            .chain(config.effect.iter())
            .find(|e| &e.label == label)
            .map(|e| e.path.clone())
            .or_else(|| {
                config
                    .music
                    .iter()
                    .find(|e| &e.label == label)
                    .map(|e| e.path.clone())
            })
            .with_context(|| format!("label '{}' not in configuration", label))?;
        Ok(Arc::new(load_source(entry)?))
    };

    let mut begin: Tz = 0;
    for label in labels {
        let source = lookup(label)?;
        let length = step.min(source.length());
        let fade = fade.min(length / 2);
        session.add_region(Region {
            source,
            begin,
            offset: 0,
            length,
            volume: 1.0,
            pan: 0.0,
            fade_in: fade,
            fade_out: fade,
        })?;
        // Next step starts inside this one's fade-out.
        begin += length - fade;
    }

    info!(
        frames = session.length(),
        path = %out_path.display(),
        "rendering arrangement"
    );
    let file = std::fs::File::create(&out_path)?;
    let mut writer = wav::WavWriter::new(file, sample_rate)?;
    wav::render(&session, &mut writer, 4096)?;
    writer.finalize()?;
    Ok(())
}

/// Interactive session: every stdin line is an action label.
fn play_live(
    mut controller: Controller,
    config: &Config,
    device_override: Option<&str>,
) -> anyhow::Result<()> {
    let device = device_override.or(config.device.as_deref());
    let mut output = AudioOutput::new(device, config.sample_rate, config.chunk_size)?;
    info!("output device: {}", output.device_name());
    if output.sample_rate() != config.sample_rate {
        warn!(
            device_rate = output.sample_rate(),
            configured = config.sample_rate,
            "device rate differs from configuration; playback will be detuned"
        );
    }

    let stream = Stream::new(config.sample_rate as Tz, config.chunk_size as Tz);
    output.start(stream.renderer())?;
    stream.start();

    let end = stream.end_signal();
    std::thread::spawn(move || {
        while end.recv().is_ok() {
            info!("stream reached end of timeline");
        }
    });

    println!("type an action label (or 'quit'):");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let label = line?;
        let label = label.trim();
        if label.is_empty() {
            continue;
        }
        if label == "quit" || label == "q" {
            break;
        }
        match controller.action(label) {
            Ok(mut mutator) => {
                stream.switch(mutator.as_mut());
                println!("playing: {}", label);
            }
            Err(err) => {
                warn!(%err, "action failed");
                println!("error: {}", err);
            }
        }
    }

    stream.stop();
    output.stop()?;
    Ok(())
}
