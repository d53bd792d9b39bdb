//! retro-hash CLI
//!
//! Computes canonical identifier hashes for PS1 disc images (CHD and
//! BIN/CUE), the same MD5 construction used by the established game
//! identification databases.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use retro_hash_core::util::format_bytes;
use retro_hash_core::DiscError;
use retro_hash_disc::{detect_disc_format, identify, BinBackend, ChdBackend, DiscFormat,
    ExecutableInfo};

mod settings;

#[derive(Parser)]
#[command(name = "retro-hash")]
#[command(about = "Compute canonical identifier hashes for PS1 disc images", long_about = None)]
struct Cli {
    /// Directory scanned for *.chd / *.cue when no FILE is given
    /// (defaults to the saved scan root, then the current directory)
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Remember --root as the default scan directory
    #[arg(long, requires = "root")]
    save_root: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Disc images to hash
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(if cli.verbose { "debug" } else { "warn" }),
    )
    .init();

    if cli.save_root
        && let Some(ref root) = cli.root
    {
        if let Err(e) = settings::save_scan_root(root) {
            eprintln!(
                "{} Failed to save scan root: {}",
                "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
                e,
            );
            return ExitCode::FAILURE;
        }
        println!("Saved scan root: {}", root.display());
    }

    let (files, scanning) = if cli.files.is_empty() {
        let root = settings::resolve_scan_root(cli.root);
        match scan_for_images(&root) {
            Ok(files) if files.is_empty() => {
                println!(
                    "{}",
                    format!("No disc images found in {}", root.display())
                        .if_supports_color(Stdout, |t| t.dimmed()),
                );
                return ExitCode::SUCCESS;
            }
            Ok(files) => (files, true),
            Err(e) => {
                eprintln!(
                    "{} Error reading {}: {}",
                    "\u{26A0}".if_supports_color(Stdout, |t| t.yellow()),
                    root.display(),
                    e,
                );
                return ExitCode::FAILURE;
            }
        }
    } else {
        (cli.files, false)
    };

    let progress = scanning.then(|| {
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] {msg}")
                .expect("progress template is valid"),
        );
        bar
    });

    let mut failures = 0usize;
    for path in &files {
        if let Some(ref bar) = progress {
            bar.set_message(display_name(path).to_string());
        }

        match hash_file(path) {
            Ok(info) => print_result(path, &info),
            Err(e) => {
                eprintln!(
                    "{} {}: {}",
                    "\u{2717}".if_supports_color(Stdout, |t| t.red()),
                    display_name(path),
                    e,
                );
                failures += 1;
            }
        }

        if let Some(ref bar) = progress {
            bar.inc(1);
        }
    }
    if let Some(bar) = progress {
        bar.finish_and_clear();
    }

    if failures == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Open the right backend for a file and run identification.
fn hash_file(path: &Path) -> Result<ExecutableInfo, DiscError> {
    let mut file = File::open(path)
        .map_err(|e| DiscError::archive_open(format!("{}: {}", path.display(), e)))?;
    let format = detect_disc_format(&mut file)?;
    drop(file);

    log::debug!("{}: detected {}", path.display(), format.name());
    match format {
        DiscFormat::Chd => {
            let mut backend = ChdBackend::open(path)?;
            identify(&mut backend)
        }
        DiscFormat::Cue => {
            let mut backend = BinBackend::open(path)?;
            identify(&mut backend)
        }
    }
}

/// Scan a directory (non-recursively) for *.chd and *.cue files.
fn scan_for_images(root: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(root)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && has_image_extension(path))
        .collect();
    files.sort();
    Ok(files)
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("chd") || e.eq_ignore_ascii_case("cue"))
        .unwrap_or(false)
}

fn display_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("?")
}

fn print_result(path: &Path, info: &ExecutableInfo) {
    println!(
        "{} {}",
        "\u{2713}".if_supports_color(Stdout, |t| t.green()),
        display_name(path).if_supports_color(Stdout, |t| t.bold()),
    );
    println!(
        "    Executable: {} ({} at LBA {})",
        info.name,
        format_bytes(info.size as u64),
        info.lba,
    );
    println!("    Boot path:  {}", info.canonical_path);
    if let Some(ref serial) = info.serial {
        match info.region {
            Some(region) => println!("    Serial:     {} [{}]", serial, region),
            None => println!("    Serial:     {}", serial),
        }
    }
    println!(
        "    MD5:        {}",
        info.md5.if_supports_color(Stdout, |t| t.cyan()),
    );
}
