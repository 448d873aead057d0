extern crate agostools;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use agostools::codepage::Language;
use agostools::config::Settings;
use agostools::toolkit::{self, GameDir};
use agostools::voice;

/// Extracts strings, scripts and objects from an AGOS game into editable text files.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Directory holding the game files
    #[arg(short = 'd', long, required = true)]
    game_dir: PathBuf,
    /// Game variant, e.g. simon1-talkie
    #[arg(short, long)]
    game: Option<String>,
    /// Text code page: en, he, pl, ru or raw
    #[arg(short, long)]
    lang: Option<Language>,
    #[arg(short, long)]
    strings: Option<PathBuf>,
    #[arg(long)]
    scripts: Option<PathBuf>,
    #[arg(long)]
    objects: Option<PathBuf>,
    /// Soundbank to split into samples
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

fn write(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

fn split_soundbank(bank: &Path, voice_dir: &Path) -> Result<()> {
    let data = fs::read(bank).with_context(|| format!("cannot read {}", bank.display()))?;
    let name = bank.file_name().context("soundbank path has no file name")?;
    let ext = bank.extension().and_then(|e| e.to_str()).unwrap_or("bin");
    let target = voice_dir.join(name);
    fs::create_dir_all(&target)?;
    let samples = voice::read_soundbank(&data)?;
    for sample in &samples {
        fs::write(target.join(format!("{:04}.{}", sample.ordinal, ext)), &sample.data)?;
    }
    println!("{}: {} samples", bank.display(), samples.len());
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let settings = settings(&args)?;
    let variant = settings.variant()?;
    let language = settings.language_for(variant);
    println!("{} ({})", variant.name, language);

    let game = toolkit::load_game(variant, &GameDir(args.game_dir.clone()))?;
    let extraction = toolkit::extract(&game, language)?;
    write(&settings.strings, &extraction.strings)?;
    write(&settings.scripts, &extraction.scripts)?;
    write(&settings.objects, &extraction.objects)?;
    for (name, error) in &extraction.failures {
        println!("{}: kept as raw bytes ({})", name, error);
    }

    if let Some(bank) = &settings.voices {
        split_soundbank(bank, &args.voice_dir)?;
    }
    Ok(())
}
