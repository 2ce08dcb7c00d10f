//! `melsync` command-line host.
//!
//! ```text
//! melsync <input.wav> [options]
//! melsync --say "text" [--voice ACTOR/STYLE | --voice ID] [options]
//! melsync --list-voices
//!
//! options:
//!   --config PATH          JSON pipeline config (MELSYNC_* env vars override it)
//!   --workers N            featurize worker threads
//!   --out PATH             write tiles as a tensor dump
//!   --debug-json PATH      write per-tile summaries
//!   --save-normalized PATH write the 16 kHz mono audio as WAV
//! ```
//!
//! Prints pipeline diagnostics as JSON on success. Set `RUST_LOG` for more
//! detail (defaults to `melsync=info,melsync_core=info`).

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use melsync_core::{
    export, MelTile, Pipeline, PipelineConfig, StyleId, SynthHandle, ToneSynthesizer,
    VoiceCatalog,
};
use serde::Serialize;
use tracing::info;

#[derive(Debug)]
enum Input {
    Wav(PathBuf),
    Text { text: String, voice: StyleId },
    ListVoices,
}

#[derive(Debug)]
struct Args {
    input: Input,
    config: Option<PathBuf>,
    workers: Option<usize>,
    out: Option<PathBuf>,
    debug_json: Option<PathBuf>,
    save_normalized: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    tiles: usize,
    tile_shape: [usize; 2],
    diagnostics: melsync_core::DiagnosticsSnapshot,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut wav: Option<PathBuf> = None;
    let mut say: Option<String> = None;
    let catalog = ToneSynthesizer::voice_catalog();
    let mut voice = StyleId(0);
    let mut list_voices = false;
    let mut config = None;
    let mut workers = None;
    let mut out = None;
    let mut debug_json = None;
    let mut save_normalized = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |flag: &str| it.next().ok_or_else(|| anyhow!("{flag} needs a value"));
        match arg.as_str() {
            "--say" => say = Some(value("--say")?),
            "--voice" => {
                voice = parse_voice(&value("--voice")?, &catalog)?;
            }
            "--list-voices" => list_voices = true,
            "--config" => config = Some(PathBuf::from(value("--config")?)),
            "--workers" => {
                let raw = value("--workers")?;
                workers = Some(raw.parse().with_context(|| format!("bad --workers {raw}"))?);
            }
            "--out" => out = Some(PathBuf::from(value("--out")?)),
            "--debug-json" => debug_json = Some(PathBuf::from(value("--debug-json")?)),
            "--save-normalized" => {
                save_normalized = Some(PathBuf::from(value("--save-normalized")?))
            }
            flag if flag.starts_with("--") => bail!("unknown option {flag}"),
            path => {
                if wav.replace(PathBuf::from(path)).is_some() {
                    bail!("only one input file is accepted");
                }
            }
        }
    }

    let input = match (wav, say) {
        _ if list_voices => Input::ListVoices,
        (Some(path), None) => Input::Wav(path),
        (None, Some(text)) => Input::Text { text, voice },
        (Some(_), Some(_)) => bail!("pass either an input file or --say, not both"),
        (None, None) => bail!(
            "usage: melsync <input.wav> | --say TEXT [--voice ACTOR/STYLE] [options] | --list-voices"
        ),
    };
    Ok(Args {
        input,
        config,
        workers,
        out,
        debug_json,
        save_normalized,
    })
}

/// `actor/style` through the catalog, or a raw numeric style id.
fn parse_voice(raw: &str, catalog: &VoiceCatalog) -> anyhow::Result<StyleId> {
    if let Some((actor, style)) = raw.split_once('/') {
        return Ok(catalog.resolve(actor.trim(), style.trim())?);
    }
    let id = raw
        .trim()
        .parse()
        .with_context(|| format!("bad --voice {raw}: expected ACTOR/STYLE or a style id"))?;
    Ok(StyleId(id))
}

fn load_config(args: &Args) -> anyhow::Result<PipelineConfig> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PipelineConfig::default(),
    }
    .apply_env_overrides()
    .context("applying MELSYNC_* overrides")?;
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    Ok(config)
}

fn run(args: Args) -> anyhow::Result<()> {
    if let Input::ListVoices = args.input {
        println!("{}", ToneSynthesizer::voice_catalog().to_json()?);
        return Ok(());
    }
    let pipeline = Pipeline::new(load_config(&args)?)?;

    let tiles: Vec<MelTile> = match &args.input {
        Input::Wav(path) if args.save_normalized.is_some() => {
            let mut session = pipeline.session();
            session.load_file(path)?;
            session.normalize()?;
            if let Some(dest) = &args.save_normalized {
                session.save_processed_audio(dest)?;
            }
            session.chunk()?;
            session.featurize()?;
            session.into_tiles()?
        }
        Input::Wav(path) => pipeline
            .run_file(path)
            .with_context(|| format!("processing {}", path.display()))?,
        Input::Text { text, voice } => {
            if args.save_normalized.is_some() {
                bail!("--save-normalized needs an input file");
            }
            let tts = SynthHandle::new(ToneSynthesizer::default());
            pipeline.run_text(&tts, text, *voice)?
        }
        Input::ListVoices => return Ok(()),
    };
    info!(tiles = tiles.len(), "done");

    if let Some(path) = &args.out {
        export::save_tensor_dump(path, &tiles)?;
    }
    if let Some(path) = &args.debug_json {
        export::export_debug_json(path, &tiles)?;
    }

    let (bands, steps) = pipeline.config().mel_params().tile_shape();
    let report = Report {
        tiles: tiles.len(),
        tile_shape: [bands, steps],
        diagnostics: pipeline.diagnostics_snapshot(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("melsync=info,melsync_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = parse_args().and_then(run) {
        eprintln!("melsync failed: {e:#}");
        std::process::exit(1);
    }
}
