//! Shader compiler error remapping.
//!
//! Generated variants carry `#line` directives whose file name wraps
//! the source path in recognizable markers. Given a compiler message,
//! this module recovers the source file, line and column, and can
//! build an editor command line to jump there.

use crate::deps::VirtualPathMap;
use regex::Regex;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Markers around the source path inside `#line` file names.
pub const PATH_PREFIX: &str = "[HLSLMaterial]";
pub const PATH_SUFFIX: &str = "[/HLSLMaterial]";

// `(12,34)` or `(12,34-56)` after the path
static RE_LINE_COL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(([0-9]*),([0-9]*)(-([0-9]*))?\)(.*)$").unwrap());

// `(12): ` with an optional parenthesized column
static RE_LINE_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(([0-9]*)\): (\(([0-9]*)\))?(.*)$").unwrap());

// Messages without markers: `[SM5] /Project/File.ush(12): ...`
static RE_BARE_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\[.*\] )(/.*?)(\(.*\): .*)$").unwrap());

static RE_ENV_VAR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%(\w+)%").unwrap());

/// A compiler message resolved back to its source location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemappedError {
    /// Message text before the location.
    pub prefix: String,
    /// Message text after the location.
    pub suffix: String,
    pub file: PathBuf,
    /// 1-based source line.
    pub line: u32,
    pub char_start: Option<u32>,
    pub char_end: Option<u32>,
}

impl fmt::Display for RemappedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}:{}", self.prefix, self.file.display(), self.line)?;
        if let Some(start) = self.char_start {
            write!(f, ":{start}")?;
            if let Some(end) = self.char_end {
                write!(f, "-{end}")?;
            }
        }
        write!(f, "{}", self.suffix)
    }
}

/// Recover the source location from a compiler message. Returns `None`
/// when the message carries neither markers nor a recognizable
/// virtual-path location.
pub fn remap_error(message: &str, map: &VirtualPathMap) -> Option<RemappedError> {
    if let Some(start) = message.find(PATH_PREFIX) {
        let after_prefix = &message[start + PATH_PREFIX.len()..];
        let end = after_prefix.find(PATH_SUFFIX)?;
        let path = &after_prefix[..end];
        let rest = &after_prefix[end + PATH_SUFFIX.len()..];
        return parse_location(message[..start].to_string(), PathBuf::from(path), rest);
    }

    // Errors in included headers carry the raw virtual path instead
    let caps = RE_BARE_PATH.captures(message)?;
    let disk = map.to_disk(&caps[2])?;
    parse_location(caps[1].to_string(), disk, &caps[3])
}

fn parse_location(prefix: String, file: PathBuf, rest: &str) -> Option<RemappedError> {
    if let Some(caps) = RE_LINE_COL.captures(rest) {
        return Some(RemappedError {
            prefix,
            suffix: caps[5].to_string(),
            file,
            line: caps[1].parse().ok()?,
            char_start: caps[2].parse().ok(),
            char_end: caps.get(4).and_then(|m| m.as_str().parse().ok()),
        });
    }
    let caps = RE_LINE_ONLY.captures(rest)?;
    Some(RemappedError {
        prefix,
        suffix: caps[4].to_string(),
        file,
        line: caps[1].parse().ok()?,
        char_start: caps.get(3).and_then(|m| m.as_str().parse().ok()),
        char_end: None,
    })
}

/// Expand `%NAME%` environment references; unknown names stay as-is.
pub fn expand_env_vars(text: &str) -> String {
    RE_ENV_VAR
        .replace_all(text, |caps: &regex::Captures| {
            env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Build the editor invocation for a remapped error. `%FILE%`, `%LINE%`
/// and `%CHAR%` in the argument template are replaced with the error's
/// location; environment references in the editor path are expanded.
pub fn editor_command(editor: &str, args: &str, error: &RemappedError) -> (String, String) {
    let args = args
        .replace("%FILE%", &error.file.display().to_string())
        .replace("%LINE%", &error.line.to_string())
        .replace("%CHAR%", &error.char_start.unwrap_or(1).to_string());
    (expand_env_vars(editor), args)
}
