//! Core pipeline for turning HLSL function libraries into node-graph
//! function artifacts: scan the library, resolve each argument into a
//! typed pin, expand static bool combinations into code variants, and
//! persist the result behind a content fingerprint so unchanged
//! functions are never rebuilt.

pub mod artifact;
pub mod default_value;
pub mod deps;
pub mod diag;
pub mod driver;
pub mod errmap;
pub mod fingerprint;
pub mod model;
pub mod pin;
pub mod scanner;
pub mod variant;
