extern crate agostools;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use agostools::codepage::Language;
use agostools::config::Settings;
use agostools::toolkit::{self, Edits, GameDir};
use agostools::voice;

/// Rebuilds AGOS game files from edited strings, scripts and objects.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory holding the original game files
    #[arg(short = 'd', long, required = true)]
    game_dir: PathBuf,
    /// Directory the rebuilt files are written to, never the game directory
    #[arg(short, long, default_value = "rebuilt")]
    output: PathBuf,
    #[arg(short, long)]
    game: Option<String>,
    #[arg(short, long)]
    lang: Option<Language>,
    #[arg(short, long)]
    strings: Option<PathBuf>,
    #[arg(long)]
    scripts: Option<PathBuf>,
    #[arg(long)]
    objects: Option<PathBuf>,
    /// Soundbank to join from the samples in the voice directory
    #[arg(short, long)]
    voices: Option<PathBuf>,
    #[arg(long, default_value = "voices")]
    voice_dir: PathBuf,
}

fn settings(args: &Args) -> Result<Settings> {
    let mut settings = Settings::load(&args.game_dir)?;
    if args.game.is_some() {
        settings.game = args.game.clone();
    }
    if args.lang.is_some() {
        settings.language = args.lang;
    }
    if let Some(path) = &args.strings {
        settings.strings = path.clone();
    }
    if let Some(path) = &args.scripts {
        settings.scripts = path.clone();
    }
    if let Some(path) = &args.objects {
        settings.objects = path.clone();
    }
    if args.voices.is_some() {
        settings.voices = args.voices.clone();
    }
    Ok(settings)
}

/// Contents of an edited file, or `None` when there is none.
fn read_edit(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        warn!("{} not found, keeping the original data", path.display());
        return Ok(None);
    }
    let text = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    Ok(Some(text))
}

fn join_soundbank(bank: &Path, voice_dir: &Path) -> Result<Option<Vec<u8>>> {
    let name = bank.file_name().context("soundbank path has no file name")?;
    let source = voice_dir.join(name);
    if !source.is_dir() {
        return Ok(None);
    }
    let mut samples = BTreeMap::new();
    for entry in fs::read_dir(&source)? {
        let path = entry?.path();
        let ordinal = path.file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<usize>().ok());
        match ordinal {
            Some(ordinal) => { samples.insert(ordinal, fs::read(&path)?); },
            None => warn!("ignoring {}", path.display()),
        }
    }
    Ok(Some(voice::write_soundbank(&samples)?))
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let settings = settings(&args)?;
    let variant = settings.variant()?;
    let language = settings.language_for(variant);
    println!("{} ({})", variant.name, language);
    let output = toolkit::prepare_output(&args.game_dir, &args.output)?;

    let strings = read_edit(&settings.strings)?;
    let scripts = read_edit(&settings.scripts)?;
    let objects = read_edit(&settings.objects)?;
    let edits = Edits{ strings: strings.as_deref(), scripts: scripts.as_deref(), objects: objects.as_deref() };

    let game = toolkit::load_game(variant, &GameDir(args.game_dir.clone()))?;
    let rebuilt = toolkit::rebuild(&game, language, &edits)?;
    let soundbank = match &settings.voices {
        Some(bank) => join_soundbank(bank, &args.voice_dir)?.map(|data| (bank.clone(), data)),
        None => None,
    };

    let mut outputs = vec![ (variant.basefile.to_string(), rebuilt.basefile) ];
    if let (Some(name), Some(data)) = (variant.archive, rebuilt.archive) {
        outputs.push((name.to_string(), data));
    }
    outputs.extend(rebuilt.files);
    if let Some((bank, data)) = soundbank {
        if let Some(name) = bank.file_name().and_then(|n| n.to_str()) {
            outputs.push((name.to_string(), data));
        }
    }
    for path in toolkit::write_outputs(&output, &outputs).with_context(|| format!("cannot write to {}", output.display()))? {
        info!("wrote {}", path.display());
    }
    println!("{} files written to {}", outputs.len(), output.display());
    Ok(())
}
