//! Include and define extraction, plus the virtual→disk path map used
//! to resolve `#include` directives and to remap shader compiler errors.

use crate::diag::Diagnostics;
use crate::model::{Define, Include};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static RE_INCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?m)^\s*#include "([^"]+)""#).unwrap());

static RE_DEFINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*#define (\w+) (.+)$").unwrap());

/// Maps engine-namespaced virtual paths (`/Project/...`) to disk
/// directories. Longest matching root wins.
#[derive(Debug, Clone, Default)]
pub struct VirtualPathMap {
    roots: Vec<(String, PathBuf)>,
}

impl VirtualPathMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_root(&mut self, virtual_root: impl Into<String>, disk_root: impl Into<PathBuf>) {
        let mut virtual_root = virtual_root.into();
        if !virtual_root.ends_with('/') {
            virtual_root.push('/');
        }
        self.roots.push((virtual_root, disk_root.into()));
        // Keep longest prefixes first so lookups can take the first hit
        self.roots.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Resolve a virtual path to its on-disk location.
    pub fn to_disk(&self, virtual_path: &str) -> Option<PathBuf> {
        self.roots.iter().find_map(|(root, disk)| {
            virtual_path
                .strip_prefix(root.as_str())
                .map(|rest| disk.join(rest))
        })
    }

    /// Inverse lookup, used when remapping compiler errors back to files.
    pub fn to_virtual(&self, disk_path: &Path) -> Option<String> {
        self.roots.iter().find_map(|(root, disk)| {
            disk_path
                .strip_prefix(disk)
                .ok()
                .map(|rest| format!("{root}{}", rest.display().to_string().replace('\\', "/")))
        })
    }
}

/// Extract `#include "..."` directives in file order and resolve each
/// against the path map. Relative includes (no leading `/`) are joined
/// onto the including file's virtual directory. Unresolved paths keep a
/// `None` disk path and are reported as errors.
pub fn extract_includes(
    file_virtual_dir: Option<&str>,
    text: &str,
    map: &VirtualPathMap,
    diag: &mut dyn Diagnostics,
    file: &str,
) -> Vec<Include> {
    RE_INCLUDE
        .captures_iter(text)
        .map(|caps| {
            let raw = &caps[1];
            let virtual_path = if raw.starts_with('/') {
                raw.to_string()
            } else {
                match file_virtual_dir {
                    Some(dir) => format!("{}/{raw}", dir.trim_end_matches('/')),
                    None => raw.to_string(),
                }
            };

            let disk_path = map.to_disk(&virtual_path);
            if disk_path.is_none() {
                diag.error(file, &format!("cannot resolve include: {virtual_path}"));
            }
            Include {
                virtual_path,
                disk_path,
            }
        })
        .collect()
}

/// Extract file-scope `#define NAME VALUE` directives in file order.
/// Valueless defines are ignored; they cannot affect generated code
/// that does not re-preprocess.
pub fn extract_defines(text: &str) -> Vec<Define> {
    RE_DEFINE
        .captures_iter(text)
        .map(|caps| Define {
            name: caps[1].to_string(),
            value: caps[2].to_string(),
        })
        .collect()
}
