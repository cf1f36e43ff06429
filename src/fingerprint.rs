//! Content fingerprints for incremental regeneration.
//!
//! A function's fingerprint covers everything that feeds its generated
//! code: the format version, the signature and body text, and a base
//! hash over the file's resolved include contents and defines. The
//! fingerprint is embedded in generated code behind a tag prefix so a
//! later run can find it and skip up-to-date functions.

use crate::model::{Define, SourceFunction};
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Bumped whenever the generated code layout changes, so stale
/// artifacts regenerate even when their source did not move.
pub const FORMAT_VERSION: &str = "1";

/// Prefix in front of the embedded fingerprint in generated code.
pub const TAG_PREFIX: &str = "HLSL Hash: ";

/// Hash the parts of the file shared by every function in it: the
/// contents of each resolved include, then the defines.
pub fn base_hash(include_contents: &[String], defines: &[Define]) -> String {
    let mut hasher = Sha256::new();
    for content in include_contents {
        hasher.update(content.as_bytes());
    }
    for define in defines {
        hasher.update(define.name.as_bytes());
        hasher.update(b" ");
        hasher.update(define.value.as_bytes());
        hasher.update(b"\n");
    }
    fold_digest(&hasher.finalize())
}

/// Compute the tagged fingerprint of one function.
///
/// The start line participates only when accurate errors are enabled,
/// since moving a function then changes its `#line` directives.
pub fn fingerprint(function: &SourceFunction, base_hash: &str, accurate_errors: bool) -> String {
    let mut input = String::new();
    input.push_str(FORMAT_VERSION);
    input.push(' ');
    if accurate_errors {
        let _ = write!(input, "{} ", function.start_line);
    }
    input.push_str(&function.comment);
    input.push(' ');
    input.push_str(&function.return_type);
    input.push(' ');
    input.push_str(&function.name);
    input.push('(');
    input.push_str(&function.arguments.join(","));
    input.push(')');
    input.push_str(&function.body);
    input.push_str(base_hash);

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{TAG_PREFIX}{}", fold_digest(&hasher.finalize()))
}

// Fold a 32-byte digest down to 32 hex characters by xoring the two
// halves, keeping the embedded tag short.
fn fold_digest(digest: &[u8]) -> String {
    let (front, back) = digest.split_at(digest.len() / 2);
    front
        .iter()
        .zip(back)
        .fold(String::with_capacity(32), |mut out, (a, b)| {
            let _ = write!(out, "{:02X}", a ^ b);
            out
        })
}
