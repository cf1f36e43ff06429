//! hlslgen — generate node-graph function artifacts from HLSL function
//! libraries.
//!
//! Two modes:
//!
//! - **generate mode**: `hlslgen -o artifacts libraries/*.hlsl`
//! - **remap mode**: `hlslgen --remap-error "<compiler message>"` turns a
//!   shader compiler error back into a source location and an editor
//!   command to jump there.

use anyhow::{bail, Context, Result};
use clap::Parser;
use hlslgen::artifact::JsonArtifactStore;
use hlslgen::deps::VirtualPathMap;
use hlslgen::diag::StderrDiagnostics;
use hlslgen::driver::{process_library, LibraryOptions};
use hlslgen::errmap::{editor_command, remap_error};
use std::fs;
use std::path::{Path, PathBuf};

const SUPPORTED_EXTENSIONS: &[&str] = &["hlsl", "usf", "ush"];

#[derive(Parser)]
#[command(
    name = "hlslgen",
    about = "Generate node-graph function artifacts from HLSL function libraries"
)]
struct Cli {
    /// Input library files (glob patterns supported)
    files: Vec<String>,

    /// Output directory for the generated artifacts
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Subdirectory of the output directory to generate into
    #[arg(long)]
    subdirectory: Option<String>,

    /// Embed #line directives so compiler errors point into the source
    /// file. Fingerprints then also cover function positions.
    #[arg(long)]
    accurate_errors: bool,

    /// Map a virtual include root to a disk directory, as VIRTUAL=DISK.
    /// Can be specified multiple times. E.g. -I /Project/=Shaders
    #[arg(short = 'I', long = "include-root")]
    include_roots: Vec<String>,

    /// Print the watched file list (sources and resolved includes) to
    /// stdout after generating, one path per line
    #[arg(long)]
    watch_list: bool,

    /// Remap a shader compiler error message to its source location and
    /// exit without generating anything
    #[arg(long)]
    remap_error: Option<String>,

    /// Editor executable used for the jump-to-error command.
    /// %NAME% environment references are expanded.
    #[arg(
        long,
        default_value = "%LOCALAPPDATA%/Programs/Microsoft VS Code/Code.exe"
    )]
    editor: String,

    /// Editor argument template; %FILE%, %LINE% and %CHAR% are replaced
    /// with the error location
    #[arg(long, default_value = "-g \"%FILE%:%LINE%:%CHAR%\"")]
    editor_args: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let path_map = parse_include_roots(&cli.include_roots)?;

    if let Some(message) = &cli.remap_error {
        return remap_mode(&cli, message, &path_map);
    }

    generate_mode(&cli, path_map)
}

/// remap mode: print the resolved location and the editor command.
fn remap_mode(cli: &Cli, message: &str, path_map: &VirtualPathMap) -> Result<()> {
    let Some(error) = remap_error(message, path_map) else {
        bail!("no source location recognized in: {message}");
    };
    println!("{error}");
    let (editor, args) = editor_command(&cli.editor, &cli.editor_args, &error);
    println!("{editor} {args}");
    Ok(())
}

/// generate mode: process every library file into the output directory.
fn generate_mode(cli: &Cli, path_map: VirtualPathMap) -> Result<()> {
    let output = cli
        .output
        .as_deref()
        .context("--output is required when files are given")?;
    let output = match &cli.subdirectory {
        Some(subdirectory) => output.join(subdirectory),
        None => output.to_path_buf(),
    };

    let input_files = expand_globs(&cli.files)?;
    if input_files.is_empty() {
        bail!("no input files");
    }

    let mut store = JsonArtifactStore::new(output);
    let mut diag = StderrDiagnostics;
    let options = LibraryOptions {
        accurate_errors: cli.accurate_errors,
        path_map,
    };

    let mut generated = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    let mut failed_files = 0usize;
    let mut watch_paths: Vec<PathBuf> = Vec::new();

    for file in &input_files {
        match process_library(file, &mut store, &options, &mut diag) {
            Ok(summary) => {
                generated += summary.generated;
                skipped += summary.skipped;
                failed += summary.failed;
                watch_paths.extend(summary.watch_paths);
            }
            Err(error) => {
                eprintln!("error: {error:#}");
                failed_files += 1;
            }
        }
    }

    if cli.watch_list {
        watch_paths.sort();
        watch_paths.dedup();
        for path in &watch_paths {
            println!("{}", path.display());
        }
    }

    eprintln!("{generated} generated, {skipped} up to date, {failed} failed");
    if failed_files > 0 {
        bail!("{failed_files} file(s) could not be processed");
    }
    Ok(())
}

/// Parse repeated `VIRTUAL=DISK` mappings into the path map.
fn parse_include_roots(roots: &[String]) -> Result<VirtualPathMap> {
    let mut map = VirtualPathMap::new();
    for root in roots {
        let (virtual_root, disk_root) = root
            .split_once('=')
            .with_context(|| format!("invalid include root (expected VIRTUAL=DISK): {root}"))?;
        map.add_root(virtual_root, disk_root);
    }
    Ok(map)
}

/// Expand the input arguments: plain files pass through, directories
/// are scanned non-recursively for library extensions, everything else
/// is tried as a glob pattern.
fn expand_globs(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let path = Path::new(pattern);
        if path.is_file() {
            files.push(path.to_path_buf());
            continue;
        }
        if path.is_dir() {
            let entries = fs::read_dir(path)
                .with_context(|| format!("failed to read directory: {}", path.display()))?;
            for entry in entries.flatten() {
                let p = entry.path();
                if p.is_file() {
                    if let Some(ext) = p.extension().and_then(|e| e.to_str()) {
                        if SUPPORTED_EXTENSIONS.contains(&ext) {
                            files.push(p);
                        }
                    }
                }
            }
            continue;
        }
        let matches: Vec<_> = glob::glob(pattern)
            .with_context(|| format!("invalid glob pattern: {}", pattern))?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();
        if matches.is_empty() {
            eprintln!("warning: no files matched: {}", pattern);
        }
        files.extend(matches);
    }
    // Sort for deterministic processing order
    files.sort();
    files.dedup();
    Ok(files)
}
