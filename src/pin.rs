//! Pin resolution — turns one raw argument string plus the owning
//! function's comment into a typed pin.
//!
//! The argument grammar is: optional `[Key=Value, ...]` metadata, optional
//! `const` or `out` qualifier, a type token with an ignored `<template>`
//! suffix, a name, and an optional `= default` expression.

use crate::default_value::parse_default_value;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

/// Metadata key marking a pin as an externally-editable parameter.
pub const META_EXPOSE: &str = "Expose";
/// Metadata key naming the parameter group of an exposed pin.
pub const META_CATEGORY: &str = "Category";

static RE_ARGUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\s*",                      // start
        r"(?:\[(.*)\])?",             // [Metadata]
        r"\s*",                       //
        r"(?:(const)\s+|(out)\s+)?",  // either const or out
        r"(\w+)",                     // type
        r"\s*(?:<\w+>)?",             // ignored template, eg Texture2D<float>
        r"\s+",                       //
        r"(\w+)",                     // name
        r"(?:\s*=\s*(.+?))?",         // optional default value
        r"\s*$",                      // end
    ))
    .unwrap()
});

static RE_METADATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\w+)\s*(?:=\s*("[^"]*"|\w+))?\s*(?:,|$)"#).unwrap());

static RE_PARAM_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)@param").unwrap());

/// Semantic type of a resolved pin, used to build the generated artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinKind {
    Scalar,
    Vector2,
    Vector3,
    Vector4,
    StaticBool,
    Texture2D,
    TextureCube,
    Texture2DArray,
    Texture3D,
    TextureExternal,
    MaterialAttributes,
}

impl PinKind {
    /// Dimension of the default-value expression this kind accepts.
    pub fn default_value_dimension(self) -> Option<usize> {
        match self {
            PinKind::Scalar => Some(1),
            PinKind::Vector2 => Some(2),
            PinKind::Vector3 => Some(3),
            PinKind::Vector4 => Some(4),
            _ => None,
        }
    }

    pub fn is_texture(self) -> bool {
        matches!(
            self,
            PinKind::Texture2D
                | PinKind::TextureCube
                | PinKind::Texture2DArray
                | PinKind::Texture3D
                | PinKind::TextureExternal
        )
    }

    /// Whether an `Expose`d input of this kind can become a parameter.
    fn can_be_exposed(self) -> bool {
        matches!(self, PinKind::Scalar | PinKind::Vector4) || self.is_texture()
    }
}

/// One resolved input or output of a function.
#[derive(Debug, Clone, PartialEq)]
pub struct Pin {
    pub name: String,
    /// Raw type token as written, e.g. `float3`.
    pub declared_type: String,
    pub is_const: bool,
    pub is_output: bool,
    /// Synthetic sub-pin, e.g. one row of an expanded `float4x4`.
    pub is_internal: bool,
    /// Ordered `[Key=Value]` metadata.
    pub metadata: Vec<(String, String)>,
    /// Extracted from the owning comment's `@param <name> ...` line.
    pub tool_tip: String,
    pub default_value_text: String,
    pub kind: PinKind,
    pub default_value_vector: Option<[f32; 4]>,
    pub default_value_bool: Option<bool>,
}

impl Pin {
    /// Name of the opaque input binding the generated code reads from.
    pub fn binding_name(&self) -> String {
        format!("INTERNAL_IN_{}", self.name)
    }

    pub fn is_exposed(&self) -> bool {
        self.metadata.iter().any(|(k, _)| k == META_EXPOSE)
    }

    pub fn category(&self) -> &str {
        self.metadata
            .iter()
            .find(|(k, _)| k == META_CATEGORY)
            .map(|(_, v)| v.as_str())
            .unwrap_or("")
    }
}

/// Outcome of resolving one raw argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedArgument {
    /// Context or sampler parameters that produce no pin of their own.
    Dropped,
    Pin(Pin),
    /// A `float4x4` argument: four internal vector4 pins plus the local
    /// HLSL declaration reassembling the matrix from them.
    Matrix { pins: Vec<Pin>, declaration: String },
}

/// Resolution failure for a single argument. Fatal for the owning
/// function only; sibling functions still generate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinError {
    InvalidSyntax { argument: String },
    UnknownType { name: String, declared_type: String },
    InvalidDefault { name: String, declared_type: String, text: String },
    InvalidSamplerName { name: String },
    MatrixOutput { name: String },
    MatrixDefault { name: String },
    MatrixNotExposed { name: String },
    InvalidOutputType { name: String, declared_type: String },
    InvalidExposedType { name: String, declared_type: String },
    NonVoidReturn { return_type: String },
}

impl fmt::Display for PinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PinError::InvalidSyntax { argument } => {
                write!(f, "invalid argument syntax: {argument}")
            }
            PinError::UnknownType { name, declared_type } => {
                write!(f, "{name}: invalid argument type: {declared_type}")
            }
            PinError::InvalidDefault { name, declared_type, text } => {
                write!(f, "{name}: invalid default value for type {declared_type}: {text}")
            }
            PinError::InvalidSamplerName { name } => write!(
                f,
                "invalid sampler parameter: {name}. Sampler parameters should be named [TextureParameterName]Sampler"
            ),
            PinError::MatrixOutput { name } => {
                write!(f, "cannot have a float4x4 as output: {name}")
            }
            PinError::MatrixDefault { name } => {
                write!(f, "cannot have a default value for a float4x4 pin: {name}")
            }
            PinError::MatrixNotExposed { name } => {
                write!(f, "float4x4 pins must be exposed: {name}")
            }
            PinError::InvalidOutputType { name, declared_type } => {
                write!(f, "{name}: invalid argument type for an output: {declared_type}")
            }
            PinError::InvalidExposedType { name, declared_type } => {
                write!(f, "{name}: cannot expose type {declared_type} as a parameter")
            }
            PinError::NonVoidReturn { return_type } => {
                write!(f, "return type needs to be void, got {return_type}")
            }
        }
    }
}

impl std::error::Error for PinError {}

/// Resolve one raw argument against its owning function's comment.
pub fn resolve_argument(raw: &str, comment: &str) -> Result<ResolvedArgument, PinError> {
    let caps = RE_ARGUMENT
        .captures(raw)
        .ok_or_else(|| PinError::InvalidSyntax {
            argument: raw.trim().to_string(),
        })?;

    let metadata_text = caps.get(1).map(|m| m.as_str()).unwrap_or("");
    let is_const = caps.get(2).is_some();
    let is_output = caps.get(3).is_some();
    let declared_type = caps[4].to_string();
    let name = caps[5].to_string();
    let default_value = caps.get(6).map(|m| m.as_str()).unwrap_or("").to_string();

    // Allow passing the per-pixel/per-vertex context explicitly; the
    // generated binding carries it implicitly
    if (declared_type == "FMaterialPixelParameters" || declared_type == "FMaterialVertexParameters")
        && name == "Parameters"
    {
        return Ok(ResolvedArgument::Dropped);
    }

    if declared_type == "SamplerState" {
        // Texture bindings implicitly carry their sampler
        if name.strip_suffix("Sampler").map_or(true, str::is_empty) {
            return Err(PinError::InvalidSamplerName { name });
        }
        return Ok(ResolvedArgument::Dropped);
    }

    let metadata = parse_metadata(metadata_text);
    let tool_tip = extract_tooltip(&name, comment);

    if declared_type == "float4x4" {
        if is_output {
            return Err(PinError::MatrixOutput { name });
        }
        if !default_value.is_empty() {
            return Err(PinError::MatrixDefault { name });
        }
        if !metadata.iter().any(|(k, _)| k == META_EXPOSE) {
            return Err(PinError::MatrixNotExposed { name });
        }

        let pins: Vec<Pin> = (0..4)
            .map(|row| Pin {
                name: format!("{name}{row}"),
                declared_type: "float4".to_string(),
                is_const: true,
                is_output: false,
                is_internal: true,
                metadata: metadata.clone(),
                tool_tip: tool_tip.clone(),
                default_value_text: String::new(),
                kind: PinKind::Vector4,
                default_value_vector: None,
                default_value_bool: None,
            })
            .collect();

        let declaration = format!(
            "{}float4x4 {name} = float4x4(INTERNAL_IN_{name}0, INTERNAL_IN_{name}1, INTERNAL_IN_{name}2, INTERNAL_IN_{name}3);\n",
            if is_const { "const " } else { "" },
        );

        return Ok(ResolvedArgument::Matrix { pins, declaration });
    }

    let kind = match declared_type.as_str() {
        "bool" => PinKind::StaticBool,
        "int" | "uint" | "float" => PinKind::Scalar,
        "float2" => PinKind::Vector2,
        "float3" => PinKind::Vector3,
        "float4" => PinKind::Vector4,
        "Texture2D" => PinKind::Texture2D,
        "TextureCube" => PinKind::TextureCube,
        "Texture2DArray" => PinKind::Texture2DArray,
        "Texture3D" => PinKind::Texture3D,
        "TextureExternal" => PinKind::TextureExternal,
        "FMaterialAttributes" => PinKind::MaterialAttributes,
        _ => return Err(PinError::UnknownType { name, declared_type }),
    };

    let invalid_default = |name: &str| PinError::InvalidDefault {
        name: name.to_string(),
        declared_type: declared_type.clone(),
        text: default_value.clone(),
    };

    let mut default_value_vector = None;
    let mut default_value_bool = None;
    if !default_value.is_empty() {
        if kind == PinKind::StaticBool {
            default_value_bool = Some(match default_value.as_str() {
                "true" => true,
                "false" => false,
                _ => return Err(invalid_default(&name)),
            });
        } else if let Some(dimension) = kind.default_value_dimension() {
            default_value_vector = Some(
                parse_default_value(&default_value, dimension)
                    .ok_or_else(|| invalid_default(&name))?,
            );
        } else {
            // Textures and attribute sets cannot carry defaults
            return Err(invalid_default(&name));
        }
    }

    // Outputs map to custom-output slots, which exist for the float
    // widths only; int and uint have none
    if is_output
        && !matches!(
            declared_type.as_str(),
            "float" | "float2" | "float3" | "float4"
        )
    {
        return Err(PinError::InvalidOutputType { name, declared_type });
    }

    let pin = Pin {
        name,
        declared_type,
        is_const,
        is_output,
        is_internal: false,
        metadata,
        tool_tip,
        default_value_text: default_value,
        kind,
        default_value_vector,
        default_value_bool,
    };

    if pin.is_exposed() && !kind.can_be_exposed() {
        return Err(PinError::InvalidExposedType {
            name: pin.name,
            declared_type: pin.declared_type,
        });
    }

    Ok(ResolvedArgument::Pin(pin))
}

/// Parse a `Key=Value, Flag, Key2="quoted"` metadata block into an
/// ordered key→value list. Flags get an empty value.
fn parse_metadata(text: &str) -> Vec<(String, String)> {
    RE_METADATA
        .captures_iter(text)
        .map(|caps| {
            let key = caps[1].to_string();
            let value = caps
                .get(2)
                .map(|m| m.as_str().trim_matches('"').to_string())
                .unwrap_or_default();
            (key, value)
        })
        .collect()
}

/// Find the `@param <name> <text>` line for a pin in the function
/// comment. The tag matches case-insensitively, the name exactly.
fn extract_tooltip(param_name: &str, comment: &str) -> String {
    for tag in RE_PARAM_TAG.find_iter(comment) {
        let rest = comment[tag.end()..].trim_start();
        let (name, rest) = match rest.split_once(char::is_whitespace) {
            Some(split) => split,
            None => (rest, ""),
        };
        if name != param_name {
            continue;
        }
        return rest
            .lines()
            .next()
            .unwrap_or("")
            .trim()
            .to_string();
    }
    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin(raw: &str) -> Pin {
        match resolve_argument(raw, "").unwrap() {
            ResolvedArgument::Pin(pin) => pin,
            other => panic!("expected a pin, got {other:?}"),
        }
    }

    #[test]
    fn resolve_input_vector() {
        let pin = pin("float3 Color");
        assert_eq!(pin.name, "Color");
        assert_eq!(pin.kind, PinKind::Vector3);
        assert!(!pin.is_output);
        assert!(!pin.is_const);
        assert_eq!(pin.default_value_vector, None);
    }

    #[test]
    fn resolve_output_with_default() {
        let pin = pin("out float4 Result = float4(1,2,3,4)");
        assert!(pin.is_output);
        assert_eq!(pin.kind, PinKind::Vector4);
        assert_eq!(pin.default_value_vector, Some([1.0, 2.0, 3.0, 4.0]));
    }

    #[test]
    fn resolve_const_scalar() {
        let pin = pin("const float Strength = 0.5");
        assert!(pin.is_const);
        assert_eq!(pin.kind, PinKind::Scalar);
        assert_eq!(pin.default_value_vector, Some([0.5, 0.0, 0.0, 0.0]));
    }

    #[test]
    fn resolve_int_is_scalar() {
        assert_eq!(pin("int Count").kind, PinKind::Scalar);
        assert_eq!(pin("uint Index").kind, PinKind::Scalar);
    }

    #[test]
    fn resolve_bool_defaults() {
        let pin = pin("bool UseFancy = true");
        assert_eq!(pin.kind, PinKind::StaticBool);
        assert_eq!(pin.default_value_bool, Some(true));

        let err = resolve_argument("bool UseFancy = 1", "").unwrap_err();
        assert!(matches!(err, PinError::InvalidDefault { .. }));
    }

    #[test]
    fn resolve_template_suffix_ignored() {
        let pin = pin("Texture2D<float> Heightmap");
        assert_eq!(pin.kind, PinKind::Texture2D);
        assert_eq!(pin.name, "Heightmap");
    }

    #[test]
    fn resolve_context_parameters_dropped() {
        assert_eq!(
            resolve_argument("FMaterialPixelParameters Parameters", "").unwrap(),
            ResolvedArgument::Dropped
        );
        assert_eq!(
            resolve_argument("FMaterialVertexParameters Parameters", "").unwrap(),
            ResolvedArgument::Dropped
        );
    }

    #[test]
    fn resolve_sampler_dropped_or_rejected() {
        assert_eq!(
            resolve_argument("SamplerState TexSampler", "").unwrap(),
            ResolvedArgument::Dropped
        );
        let err = resolve_argument("SamplerState Foo", "").unwrap_err();
        assert!(matches!(err, PinError::InvalidSamplerName { .. }));
        // "Sampler" alone names no texture
        let err = resolve_argument("SamplerState Sampler", "").unwrap_err();
        assert!(matches!(err, PinError::InvalidSamplerName { .. }));
    }

    #[test]
    fn resolve_matrix_expands() {
        let resolved = resolve_argument("[Expose] float4x4 WorldToLocal", "").unwrap();
        let ResolvedArgument::Matrix { pins, declaration } = resolved else {
            panic!("expected matrix expansion");
        };
        assert_eq!(pins.len(), 4);
        assert!(pins.iter().all(|p| p.is_internal && p.kind == PinKind::Vector4));
        assert_eq!(pins[0].name, "WorldToLocal0");
        assert_eq!(pins[3].name, "WorldToLocal3");
        assert!(declaration.contains(
            "float4x4 WorldToLocal = float4x4(INTERNAL_IN_WorldToLocal0, INTERNAL_IN_WorldToLocal1"
        ));
    }

    #[test]
    fn resolve_matrix_errors() {
        assert!(matches!(
            resolve_argument("float4x4 M", "").unwrap_err(),
            PinError::MatrixNotExposed { .. }
        ));
        assert!(matches!(
            resolve_argument("[Expose] out float4x4 M", "").unwrap_err(),
            PinError::MatrixOutput { .. }
        ));
        assert!(matches!(
            resolve_argument("[Expose] float4x4 M = 0", "").unwrap_err(),
            PinError::MatrixDefault { .. }
        ));
    }

    #[test]
    fn resolve_unknown_type() {
        let err = resolve_argument("matrix3x3 M", "").unwrap_err();
        assert!(matches!(err, PinError::UnknownType { .. }));
    }

    #[test]
    fn resolve_output_texture_rejected() {
        let err = resolve_argument("out Texture2D Tex", "").unwrap_err();
        assert!(matches!(err, PinError::InvalidOutputType { .. }));
        let err = resolve_argument("out bool Flag", "").unwrap_err();
        assert!(matches!(err, PinError::InvalidOutputType { .. }));
    }

    #[test]
    fn resolve_integer_outputs_rejected() {
        // int and uint are scalar inputs but have no output slot
        for raw in ["out int Count", "out uint Index"] {
            let err = resolve_argument(raw, "").unwrap_err();
            assert!(matches!(err, PinError::InvalidOutputType { .. }), "{raw}");
        }
        assert!(!pin("int Count").is_output);
        assert!(pin("out float Value").is_output);
    }

    #[test]
    fn resolve_exposed_allow_list() {
        assert!(pin("[Expose] float Strength").is_exposed());
        assert!(pin("[Expose] float4 Tint").is_exposed());
        assert!(pin("[Expose] Texture2D Tex").is_exposed());

        for raw in ["[Expose] float2 UV", "[Expose] float3 Color", "[Expose] bool Flag"] {
            let err = resolve_argument(raw, "").unwrap_err();
            assert!(matches!(err, PinError::InvalidExposedType { .. }), "{raw}");
        }
    }

    #[test]
    fn resolve_texture_default_rejected() {
        let err = resolve_argument("Texture2D Tex = 0", "").unwrap_err();
        assert!(matches!(err, PinError::InvalidDefault { .. }));
    }

    #[test]
    fn resolve_invalid_syntax() {
        let err = resolve_argument("???", "").unwrap_err();
        assert!(matches!(err, PinError::InvalidSyntax { .. }));
    }

    #[test]
    fn metadata_parsing() {
        let pin = pin("[Expose, Category=\"My Group\"] float Strength");
        assert_eq!(
            pin.metadata,
            vec![
                ("Expose".to_string(), String::new()),
                ("Category".to_string(), "My Group".to_string()),
            ]
        );
        assert_eq!(pin.category(), "My Group");
    }

    #[test]
    fn tooltip_extraction() {
        let comment = "// Blends two colors\n// @param Base the base color\n// @PARAM Blend the blend layer\n";
        let resolved = resolve_argument("float3 Base", comment).unwrap();
        let ResolvedArgument::Pin(pin) = resolved else { unreachable!() };
        assert_eq!(pin.tool_tip, "the base color");

        // Case-insensitive tag, case-sensitive name
        let resolved = resolve_argument("float3 Blend", comment).unwrap();
        let ResolvedArgument::Pin(pin) = resolved else { unreachable!() };
        assert_eq!(pin.tool_tip, "the blend layer");

        let resolved = resolve_argument("float3 base", comment).unwrap();
        let ResolvedArgument::Pin(pin) = resolved else { unreachable!() };
        assert_eq!(pin.tool_tip, "");
    }

    #[test]
    fn binding_name() {
        assert_eq!(pin("float3 Color").binding_name(), "INTERNAL_IN_Color");
    }
}
