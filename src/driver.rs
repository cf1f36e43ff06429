//! Per-file pipeline: read, scan, resolve, fingerprint, and regenerate
//! whatever is out of date. Function-level failures are reported and
//! skipped so one broken function never blocks its siblings; file-level
//! failures abort the file.

use crate::artifact::{build_artifact, ArtifactStore, FunctionArtifact};
use crate::deps::{extract_defines, extract_includes, VirtualPathMap};
use crate::diag::Diagnostics;
use crate::fingerprint::{base_hash, fingerprint};
use crate::pin::{Pin, PinError, ResolvedArgument};
use crate::scanner::scan;
use crate::variant::{generate, GenerateOptions};
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Default)]
pub struct LibraryOptions {
    pub accurate_errors: bool,
    pub path_map: VirtualPathMap,
}

/// Outcome of processing one library file.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Anything written this run.
    pub modified: bool,
    /// Files whose changes should trigger a rerun: the source itself
    /// plus every resolved include.
    pub watch_paths: Vec<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconcile {
    Skip,
    Regenerate,
}

/// Decide whether a function needs regenerating by comparing its fresh
/// fingerprint against the stored artifact's.
pub fn reconcile(previous: Option<&FunctionArtifact>, fingerprint: &str) -> Reconcile {
    match previous {
        Some(artifact) if artifact.fingerprint == fingerprint => Reconcile::Skip,
        _ => Reconcile::Regenerate,
    }
}

/// Process one library file end to end.
pub fn process_library(
    file: &Path,
    store: &mut dyn ArtifactStore,
    options: &LibraryOptions,
    diag: &mut dyn Diagnostics,
) -> Result<RunSummary> {
    let file_name = file.display().to_string();
    let text = read_with_retry(file)?;

    let functions = scan(&text, options.accurate_errors)
        .with_context(|| format!("parsing {file_name}"))?;

    let file_virtual_dir = file
        .parent()
        .and_then(|parent| options.path_map.to_virtual(parent));
    let includes = extract_includes(
        file_virtual_dir.as_deref(),
        &text,
        &options.path_map,
        diag,
        &file_name,
    );
    let defines = extract_defines(&text);

    let mut summary = RunSummary {
        watch_paths: vec![file.to_path_buf()],
        ..Default::default()
    };

    let mut include_contents = Vec::new();
    for include in &includes {
        let Some(disk_path) = &include.disk_path else {
            continue;
        };
        // Every resolved include feeds the base hash, so a failed read
        // aborts the file rather than fingerprinting partial content
        let content = read_with_retry(disk_path)
            .with_context(|| format!("reading include of {file_name}"))?;
        include_contents.push(content);
        summary.watch_paths.push(disk_path.clone());
    }
    let base = base_hash(&include_contents, &defines);

    let mut seen_names = BTreeSet::new();
    for function in &functions {
        if !seen_names.insert(function.name.clone()) {
            diag.error(
                &file_name,
                &format!("duplicate function name: {}", function.name),
            );
            summary.failed += 1;
            continue;
        }
        if function.return_type != "void" {
            diag.error(
                &file_name,
                &format!(
                    "{}: {}",
                    function.name,
                    PinError::NonVoidReturn {
                        return_type: function.return_type.clone()
                    }
                ),
            );
            summary.failed += 1;
            continue;
        }

        let mut inputs: Vec<Pin> = Vec::new();
        let mut outputs: Vec<Pin> = Vec::new();
        let mut matrix_declarations = String::new();
        let mut resolve_failed = false;
        for raw in &function.arguments {
            match crate::pin::resolve_argument(raw, &function.comment) {
                Ok(ResolvedArgument::Dropped) => {}
                Ok(ResolvedArgument::Pin(pin)) => {
                    if pin.is_output {
                        outputs.push(pin);
                    } else {
                        inputs.push(pin);
                    }
                }
                Ok(ResolvedArgument::Matrix { pins, declaration }) => {
                    inputs.extend(pins);
                    matrix_declarations.push_str(&declaration);
                }
                Err(error) => {
                    diag.error(&file_name, &format!("{}: {error}", function.name));
                    summary.failed += 1;
                    resolve_failed = true;
                    break;
                }
            }
        }
        if resolve_failed {
            continue;
        }

        let tag = fingerprint(function, &base, options.accurate_errors);
        let previous = store.load(&function.name);
        if reconcile(previous.as_ref(), &tag) == Reconcile::Skip {
            diag.info(&file_name, &format!("{} already up to date", function.name));
            summary.skipped += 1;
            continue;
        }

        let generated = generate(
            function,
            &inputs,
            &outputs,
            &matrix_declarations,
            &tag,
            &GenerateOptions {
                accurate_errors: options.accurate_errors,
                source_file_path: file_name.clone(),
                artifact_hint: function.name.clone(),
            },
        );
        let artifact = build_artifact(
            &function.name,
            &function.comment,
            &file_name,
            &includes,
            &defines,
            &inputs,
            &outputs,
            generated,
            previous.as_ref(),
        );
        store
            .save(&artifact)
            .with_context(|| format!("saving artifact for {}", function.name))?;
        diag.info(&file_name, &format!("{} updated", function.name));
        summary.generated += 1;
        summary.modified = true;
    }

    Ok(summary)
}

// Library files are often saved by an editor moments before we read
// them; one short retry covers the save-in-progress window.
fn read_with_retry(file: &Path) -> Result<String> {
    match fs::read_to_string(file) {
        Ok(text) => Ok(text),
        Err(_) => {
            thread::sleep(Duration::from_millis(100));
            fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))
        }
    }
}
