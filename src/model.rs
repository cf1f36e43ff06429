//! Data model for scanned source files — parser output, format-agnostic.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One function definition extracted from a library file.
///
/// All fields hold raw text as it appeared in the source; nothing is
/// interpreted at scan time. Argument strings keep their `[metadata]`
/// prefix, qualifiers and default values verbatim.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SourceFunction {
    /// Line of the opening brace (0-based). Only meaningful when the
    /// scanner ran with accurate errors enabled.
    pub start_line: usize,
    /// Raw `//` comment block immediately preceding the signature,
    /// may contain `@param name text` lines.
    pub comment: String,
    /// Return type token. Must be `void` for the function to generate.
    pub return_type: String,
    pub name: String,
    /// Raw argument strings, comma-split at top level only.
    pub arguments: Vec<String>,
    /// Raw text between the outermost braces, braces excluded.
    pub body: String,
}

/// An `#include "path"` directive resolved against the virtual path map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Include {
    /// Engine-namespaced path, e.g. `/Project/Common.ush`.
    pub virtual_path: String,
    /// On-disk location, `None` when the virtual path could not be mapped.
    pub disk_path: Option<PathBuf>,
}

/// A file-scope `#define NAME VALUE` directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Define {
    pub name: String,
    pub value: String,
}
