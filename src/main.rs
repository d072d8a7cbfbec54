//! patchwire: check, render or play a patch file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, SystemTime};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use log::{error, info, warn};

use patchwire::audio::AudioEngine;
use patchwire::config::{self, Config};
use patchwire::graph::project::PatchFile;
use patchwire::graph::{ControlId, GraphError};
use patchwire::lang::ast::ControlKind;
use patchwire::midi::MidiInput;
use patchwire::runtime::{Runtime, RuntimeError};

/// Frames rendered per block when writing a file.
const RENDER_BLOCK: usize = 512;

/// How often `play` checks the patch file for edits.
const WATCH_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser)]
#[command(name = "patchwire", version, about)]
struct Cli {
    /// Config file (default: ~/.patchwire/config.yaml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a patch and report errors per node.
    Check { patch: PathBuf },

    /// Render a patch to a WAV file.
    Render {
        patch: PathBuf,
        #[arg(long, default_value_t = 4.0)]
        seconds: f64,
        #[arg(long, short)]
        out: PathBuf,
    },

    /// Play a patch live, recompiling whenever the file changes.
    Play {
        patch: PathBuf,
        /// Feed the first (or configured) MIDI input into the patch.
        #[arg(long)]
        midi: bool,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => {
            if let Some(path) = config::config_path() {
                info!("config: {}", path.display());
            }
            Config::load()
        }
    };

    match cli.command {
        Command::Check { patch } => check(&config, &patch),
        Command::Render {
            patch,
            seconds,
            out,
        } => render(&config, &patch, seconds, &out),
        Command::Play { patch, midi } => play(&config, &patch, midi),
    }
}

/// Build a runtime from a patch file without compiling it.
fn load(config: &Config, path: &Path) -> anyhow::Result<Runtime> {
    let file = PatchFile::read(path).with_context(|| format!("reading {}", path.display()))?;
    let runtime = Runtime::new(config.engine.compile_context());
    file.apply(&runtime)
        .with_context(|| format!("building {}", path.display()))?;
    Ok(runtime)
}

/// Log compile failures by node name. Returns whether the compile succeeded.
fn report(runtime: &Runtime, result: Result<(), RuntimeError>) -> anyhow::Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(RuntimeError::Graph(GraphError::Compile(failures))) => {
            for (node, err) in failures {
                let name = runtime
                    .with_patch(|p| p.node(node).map(|n| n.name.clone()))
                    .unwrap_or_else(|| node.to_string());
                error!("{name}: {err}");
            }
            Ok(false)
        }
        Err(err) => Err(err.into()),
    }
}

fn check(config: &Config, path: &Path) -> anyhow::Result<()> {
    let runtime = load(config, path)?;
    if !report(&runtime, runtime.compile().map(drop))? {
        bail!("{} failed to compile", path.display());
    }
    let nodes = runtime.with_patch(|p| p.nodes().count());
    println!("{}: ok ({nodes} nodes)", path.display());
    Ok(())
}

fn render(config: &Config, path: &Path, seconds: f64, out: &Path) -> anyhow::Result<()> {
    let runtime = load(config, path)?;
    if !report(&runtime, runtime.compile().map(drop))? {
        bail!("{} failed to compile", path.display());
    }

    let sample_rate = config.engine.sample_rate;
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(out, spec)
        .with_context(|| format!("creating {}", out.display()))?;

    let total = (seconds.max(0.0) * sample_rate as f64).round() as usize;
    let mut block = vec![0.0f32; RENDER_BLOCK * 2];
    let mut written = 0;
    while written < total {
        let frames = RENDER_BLOCK.min(total - written);
        let buffer = &mut block[..frames * 2];
        runtime.fill_buffer(buffer, 2);
        for sample in buffer.iter() {
            writer.write_sample(*sample)?;
        }
        written += frames;
    }
    writer.finalize()?;
    println!("wrote {written} frames to {}", out.display());
    Ok(())
}

/// Root MIDI controls named like the configured input control.
fn midi_targets(runtime: &Runtime, name: &str) -> Vec<ControlId> {
    let root = runtime.root();
    let nodes = runtime.with_patch(|p| p.surface_nodes(root).to_vec());
    nodes
        .into_iter()
        .filter_map(|node| runtime.find_control(node, name, ControlKind::Midi))
        .collect()
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn play(config: &Config, path: &Path, with_midi: bool) -> anyhow::Result<()> {
    let runtime = Arc::new(load(config, path)?);
    report(&runtime, runtime.compile().map(drop))?;

    let mut engine = AudioEngine::start(runtime.clone(), &config.audio)?;

    let (sender, events) = mpsc::channel();
    let _input = if with_midi {
        let input = MidiInput::start(&config.midi, move |event| {
            let _ = sender.send(event);
        })?;
        println!("MIDI: {}", input.port_name());
        Some(input)
    } else {
        drop(sender);
        None
    };

    let running = Arc::new(AtomicBool::new(true));
    let flag = running.clone();
    ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))?;
    println!("playing {} (ctrl-c to stop)", path.display());

    let mut targets = midi_targets(&runtime, &config.midi.control);
    if with_midi && targets.is_empty() {
        warn!("no root MIDI control named '{}'", config.midi.control);
    }
    let mut stamp = modified(path);

    while running.load(Ordering::SeqCst) {
        match events.recv_timeout(WATCH_INTERVAL) {
            Ok(event) => {
                for control in &targets {
                    if let Err(err) = engine.send_midi(*control, event) {
                        warn!("{err}");
                    }
                }
                continue;
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => std::thread::sleep(WATCH_INTERVAL),
        }

        let current = modified(path);
        if current == stamp {
            continue;
        }
        stamp = current;
        match PatchFile::read(path) {
            Ok(file) => {
                let changed = file.update_sources(&runtime)?;
                info!("{changed} node(s) edited; recompiling");
                if report(&runtime, runtime.compile().map(drop))? {
                    targets = midi_targets(&runtime, &config.midi.control);
                }
            }
            Err(err) => warn!("{err}"),
        }
    }

    engine.set_muted(true)?;
    std::thread::sleep(Duration::from_millis(50));
    println!("stopped.");
    Ok(())
}
