//! Variant expansion — compiles one function into code for every
//! combination of its static bool inputs, plus the switch tree that
//! selects between them at graph-evaluation time.

use crate::model::SourceFunction;
use crate::pin::{Pin, PinKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static RE_TEXCOORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Parameters\.TexCoords\[([0-9]+)\]").unwrap());

/// Code for one combination of static bool values. `bool_values[i]`
/// pairs with the i-th static bool among the function's inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedVariant {
    pub bool_values: Vec<bool>,
    pub code: String,
}

/// Binary decision tree over the static bool inputs. Leaves index into
/// the variant list; switch nodes index the deciding input pin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwitchTree {
    Leaf(usize),
    Switch {
        pin: usize,
        if_true: Box<SwitchTree>,
        if_false: Box<SwitchTree>,
    },
}

impl SwitchTree {
    pub fn node_count(&self) -> usize {
        match self {
            SwitchTree::Leaf(_) => 1,
            SwitchTree::Switch { if_true, if_false, .. } => {
                1 + if_true.node_count() + if_false.node_count()
            }
        }
    }
}

/// Everything expansion produces for one function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedFunction {
    pub variants: Vec<GeneratedVariant>,
    /// One tree per output; identical in shape, kept per output so each
    /// output node can be evaluated independently.
    pub switch_trees: Vec<SwitchTree>,
    /// Highest texture coordinate index the code reads, if any.
    pub max_tex_coordinate: Option<u32>,
    pub fingerprint: String,
}

#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Wrap each variant body in `#line` directives so compiler errors
    /// point back into the source file.
    pub accurate_errors: bool,
    /// Source file path embedded in the `#line` directives.
    pub source_file_path: String,
    /// Name shown in the trailing out-of-body `#line` message.
    pub artifact_hint: String,
}

/// Expand a function into all of its static bool variants.
///
/// `inputs` is the resolved input pin list in declaration order,
/// internal matrix sub-pins included; `matrix_declarations` holds the
/// locals reassembling expanded matrices.
pub fn generate(
    function: &SourceFunction,
    inputs: &[Pin],
    outputs: &[Pin],
    matrix_declarations: &str,
    fingerprint: &str,
    options: &GenerateOptions,
) -> GeneratedFunction {
    let bool_pins: Vec<usize> = inputs
        .iter()
        .enumerate()
        .filter(|(_, pin)| pin.kind == PinKind::StaticBool)
        .map(|(index, _)| index)
        .collect();

    let variant_count = 1usize << bool_pins.len();
    let mut variants = Vec::with_capacity(variant_count);

    for width in 0..variant_count {
        // Bit clear means true: switches present their true pin first,
        // so variant 0 must be the all-true one
        let bool_values: Vec<bool> = (0..bool_pins.len())
            .map(|bit| width & (1 << bit) == 0)
            .collect();

        let mut declarations = String::new();
        for (value, &index) in bool_values.iter().zip(&bool_pins) {
            declarations.push_str(&format!(
                "const bool {} = {};\n",
                inputs[index].binding_name(),
                value
            ));
        }
        declarations.push_str(matrix_declarations);
        for pin in inputs.iter().filter(|pin| !pin.is_internal) {
            if pin.kind.is_texture() {
                // The sampler binding inherits the texture's constness
                declarations.push_str(&format!(
                    "{qualifier}SamplerState {name}Sampler = INTERNAL_IN_{name}Sampler;\n",
                    qualifier = if pin.is_const { "const " } else { "" },
                    name = pin.name
                ));
            }
            // Vectors need the cast since the graph carries every value
            // as a float4
            let cast = match pin.kind {
                PinKind::Scalar | PinKind::Vector2 | PinKind::Vector3 | PinKind::Vector4 => {
                    pin.declared_type.as_str()
                }
                _ => "",
            };
            declarations.push_str(&format!(
                "{}{} {} = {}({});\n",
                if pin.is_const { "const " } else { "" },
                pin.declared_type,
                pin.name,
                cast,
                pin.binding_name(),
            ));
        }

        // Void functions only ever hold bare `return;` statements, and
        // the surrounding node expects a scalar back
        let body = function.body.replace("return", "return 0.f");
        let code = if options.accurate_errors {
            format!(
                "#line {} \"{}{}{}\"\n{body}\n#line 10000 \"Error occurred outside of Custom HLSL node, line number will be inaccurate. Disable accurate errors on your library to fix this ({})\"",
                function.start_line + 1,
                crate::errmap::PATH_PREFIX,
                options.source_file_path,
                crate::errmap::PATH_SUFFIX,
                options.artifact_hint,
            )
        } else {
            body
        };

        variants.push(GeneratedVariant {
            bool_values,
            code: format!(
                "// START {name}\n\n{declarations}\n{code}\n\n// END {name}\n\nreturn 0.f;\n//{fingerprint}\n",
                name = function.name,
            ),
        });
    }

    let tree = build_switch_tree(&bool_pins);
    let switch_trees = outputs.iter().map(|_| tree.clone()).collect();

    let max_tex_coordinate = variants
        .iter()
        .flat_map(|variant| RE_TEXCOORD.captures_iter(&variant.code))
        .filter_map(|caps| caps[1].parse::<u32>().ok())
        .max();

    GeneratedFunction {
        variants,
        switch_trees,
        max_tex_coordinate,
        fingerprint: fingerprint.to_string(),
    }
}

/// Build the selection tree bottom-up: start with one leaf per variant,
/// then per bool pin collapse adjacent pairs into a switch on that pin.
/// Variant indices differ in bit `layer` exactly between pair members,
/// and the cleared bit is the true side.
fn build_switch_tree(bool_pins: &[usize]) -> SwitchTree {
    let mut nodes: Vec<SwitchTree> = (0..1usize << bool_pins.len()).map(SwitchTree::Leaf).collect();

    for &pin in bool_pins {
        nodes = nodes
            .chunks_exact(2)
            .map(|pair| SwitchTree::Switch {
                pin,
                if_true: Box::new(pair[0].clone()),
                if_false: Box::new(pair[1].clone()),
            })
            .collect();
    }

    debug_assert_eq!(nodes.len(), 1);
    nodes.remove(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::{resolve_argument, ResolvedArgument};

    fn pin(raw: &str) -> Pin {
        match resolve_argument(raw, "").unwrap() {
            ResolvedArgument::Pin(pin) => pin,
            other => panic!("expected pin, got {other:?}"),
        }
    }

    fn function(body: &str) -> SourceFunction {
        SourceFunction {
            start_line: 7,
            comment: String::new(),
            return_type: "void".to_string(),
            name: "Blend".to_string(),
            arguments: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn no_bools_single_variant() {
        let inputs = [pin("float3 Color")];
        let outputs = [pin("out float3 Result")];
        let generated = generate(
            &function("\nResult = Color;\n"),
            &inputs,
            &outputs,
            "",
            "HLSL Hash: ABCD",
            &GenerateOptions::default(),
        );
        assert_eq!(generated.variants.len(), 1);
        assert!(generated.variants[0].bool_values.is_empty());
        assert_eq!(generated.switch_trees, vec![SwitchTree::Leaf(0)]);
    }

    #[test]
    fn two_bools_four_variants_all_true_first() {
        let inputs = [pin("bool A"), pin("float X"), pin("bool B")];
        let outputs = [pin("out float R")];
        let generated = generate(
            &function("\nR = X;\n"),
            &inputs,
            &outputs,
            "",
            "HLSL Hash: ABCD",
            &GenerateOptions::default(),
        );
        assert_eq!(generated.variants.len(), 4);
        assert_eq!(generated.variants[0].bool_values, vec![true, true]);
        assert_eq!(generated.variants[1].bool_values, vec![false, true]);
        assert_eq!(generated.variants[2].bool_values, vec![true, false]);
        assert_eq!(generated.variants[3].bool_values, vec![false, false]);
        assert!(generated.variants[0]
            .code
            .contains("const bool INTERNAL_IN_A = true;"));
        assert!(generated.variants[1]
            .code
            .contains("const bool INTERNAL_IN_A = false;"));
    }

    #[test]
    fn switch_tree_structure() {
        let inputs = [pin("bool A"), pin("float X"), pin("bool B")];
        let outputs = [pin("out float R"), pin("out float S")];
        let generated = generate(
            &function("\nR = X; S = X;\n"),
            &inputs,
            &outputs,
            "",
            "",
            &GenerateOptions::default(),
        );
        assert_eq!(generated.switch_trees.len(), 2);

        // Outer switch decides the last bool, inner switches the first
        let SwitchTree::Switch { pin, if_true, if_false } = &generated.switch_trees[0] else {
            panic!("expected a switch at the root");
        };
        assert_eq!(*pin, 2);
        assert_eq!(
            **if_true,
            SwitchTree::Switch {
                pin: 0,
                if_true: Box::new(SwitchTree::Leaf(0)),
                if_false: Box::new(SwitchTree::Leaf(1)),
            }
        );
        assert_eq!(
            **if_false,
            SwitchTree::Switch {
                pin: 0,
                if_true: Box::new(SwitchTree::Leaf(2)),
                if_false: Box::new(SwitchTree::Leaf(3)),
            }
        );
        assert_eq!(generated.switch_trees[0].node_count(), 7);
    }

    #[test]
    fn declarations_and_framing() {
        let inputs = [pin("const float3 Color"), pin("Texture2D Tex")];
        let outputs = [pin("out float4 Result")];
        let generated = generate(
            &function("\nResult = Tex.Sample(TexSampler, Color.xy);\nreturn;\n"),
            &inputs,
            &outputs,
            "",
            "HLSL Hash: 1234",
            &GenerateOptions::default(),
        );
        let code = &generated.variants[0].code;
        assert!(code.starts_with("// START Blend\n"));
        assert!(code.contains("const float3 Color = float3(INTERNAL_IN_Color);\n"));
        assert!(code.contains("SamplerState TexSampler = INTERNAL_IN_TexSampler;\n"));
        assert!(code.contains("Texture2D Tex = (INTERNAL_IN_Tex);\n"));
        // Bare returns turn into scalar returns
        assert!(!code.contains("return;"));
        assert!(code.contains("// END Blend"));
        assert!(code.ends_with("return 0.f;\n//HLSL Hash: 1234\n"));
    }

    #[test]
    fn const_texture_binds_const_sampler() {
        let inputs = [pin("const Texture2D Tex")];
        let outputs = [pin("out float R")];
        let generated = generate(
            &function("\nR = Tex.Sample(TexSampler, float2(0, 0)).x;\n"),
            &inputs,
            &outputs,
            "",
            "",
            &GenerateOptions::default(),
        );
        let code = &generated.variants[0].code;
        assert!(code.contains("const SamplerState TexSampler = INTERNAL_IN_TexSampler;\n"));
        assert!(code.contains("const Texture2D Tex = (INTERNAL_IN_Tex);\n"));
    }

    #[test]
    fn matrix_declarations_included() {
        let resolved = resolve_argument("[Expose] float4x4 M", "").unwrap();
        let ResolvedArgument::Matrix { pins, declaration } = resolved else {
            unreachable!()
        };
        let outputs = [pin("out float R")];
        let generated = generate(
            &function("\nR = M[0].x;\n"),
            &pins,
            &outputs,
            &declaration,
            "",
            &GenerateOptions::default(),
        );
        let code = &generated.variants[0].code;
        assert!(code.contains("float4x4 M = float4x4(INTERNAL_IN_M0"));
        // Internal sub-pins get no individual locals
        assert!(!code.contains("float4 M0 ="));
    }

    #[test]
    fn accurate_errors_wraps_body() {
        let inputs = [pin("float X")];
        let outputs = [pin("out float R")];
        let options = GenerateOptions {
            accurate_errors: true,
            source_file_path: "/game/Lib.hlsl".to_string(),
            artifact_hint: "Blend".to_string(),
        };
        let generated =
            generate(&function("\nR = X;\n"), &inputs, &outputs, "", "", &options);
        let code = &generated.variants[0].code;
        assert!(code.contains("#line 8 \"[HLSLMaterial]/game/Lib.hlsl[/HLSLMaterial]\""));
        assert!(code.contains("#line 10000"));
    }

    #[test]
    fn max_tex_coordinate() {
        let inputs = [pin("float X")];
        let outputs = [pin("out float R")];
        let generated = generate(
            &function("\nR = Parameters.TexCoords[0].x + Parameters.TexCoords[3].y;\n"),
            &inputs,
            &outputs,
            "",
            "",
            &GenerateOptions::default(),
        );
        assert_eq!(generated.max_tex_coordinate, Some(3));

        let generated = generate(
            &function("\nR = X;\n"),
            &inputs,
            &outputs,
            "",
            "",
            &GenerateOptions::default(),
        );
        assert_eq!(generated.max_tex_coordinate, None);
    }
}
