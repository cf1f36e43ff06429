//! Persisted function artifacts.
//!
//! One artifact per source function, written as pretty JSON under the
//! output directory. Pin ids are stable across regenerations: an id is
//! minted once from the artifact name, pin name and fingerprint, then
//! carried forward by pin name on every rebuild so consumers keep
//! their wiring.

use crate::fingerprint::TAG_PREFIX;
use crate::model::{Define, Include};
use crate::pin::{Pin, PinKind};
use crate::variant::{GeneratedFunction, GeneratedVariant, SwitchTree};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

/// Everything a node-graph consumer needs to instantiate one function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionArtifact {
    pub name: String,
    pub description: String,
    /// Tagged fingerprint, `HLSL Hash: <hex>`.
    pub fingerprint: String,
    pub source_file: String,
    /// Virtual paths of the file's includes, in file order.
    pub include_paths: Vec<String>,
    pub defines: Vec<Define>,
    pub inputs: Vec<InputBinding>,
    pub outputs: Vec<OutputBinding>,
    pub variants: Vec<GeneratedVariant>,
    pub switch_trees: Vec<SwitchTree>,
    pub max_tex_coordinate: Option<u32>,
}

/// One input pin as exposed to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputBinding {
    pub id: String,
    pub name: String,
    /// Pin label; carries the default value when one exists.
    pub display_name: String,
    pub kind: PinKind,
    pub tool_tip: String,
    /// Editable parameter rather than a plain pin.
    pub exposed: bool,
    /// Parameter group of an exposed pin, empty when ungrouped.
    pub group: String,
    pub default_text: String,
    pub default_vector: Option<[f32; 4]>,
    pub default_bool: Option<bool>,
    /// Synthetic pin hidden from consumers, e.g. a matrix row.
    pub internal: bool,
}

/// One output pin as exposed to consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputBinding {
    pub id: String,
    pub name: String,
    pub kind: PinKind,
    pub tool_tip: String,
}

/// Hidden input carrying a texture coordinate into functions whose code
/// reads `Parameters.TexCoords`.
pub const DUMMY_COORDINATE_INPUT: &str = "DUMMY_COORDINATE_INPUT";

// -- Construction ------------------------------------------------------------

/// Assemble the artifact for one function, carrying pin ids over from
/// the previous build when pin names survived.
#[allow(clippy::too_many_arguments)]
pub fn build_artifact(
    name: &str,
    comment: &str,
    source_file: &str,
    includes: &[Include],
    defines: &[Define],
    inputs: &[Pin],
    outputs: &[Pin],
    generated: GeneratedFunction,
    previous: Option<&FunctionArtifact>,
) -> FunctionArtifact {
    let previous_ids: BTreeMap<&str, &str> = previous
        .map(|artifact| {
            artifact
                .inputs
                .iter()
                .map(|input| (input.name.as_str(), input.id.as_str()))
                .chain(
                    artifact
                        .outputs
                        .iter()
                        .map(|output| (output.name.as_str(), output.id.as_str())),
                )
                .collect()
        })
        .unwrap_or_default();

    let pin_id = |pin_name: &str| -> String {
        previous_ids
            .get(pin_name)
            .map(|id| id.to_string())
            .unwrap_or_else(|| stable_id(name, pin_name, &generated.fingerprint))
    };

    let mut inputs: Vec<InputBinding> = inputs
        .iter()
        .map(|pin| {
            let display_name = if pin.default_value_text.is_empty() {
                pin.name.clone()
            } else {
                format!("{} ( = {})", pin.name, pin.default_value_text)
            };
            let tool_tip = if pin.default_value_text.is_empty() {
                pin.tool_tip.clone()
            } else if pin.tool_tip.is_empty() {
                format!("Default Value = {}", pin.default_value_text)
            } else {
                format!("{}\nDefault Value = {}", pin.tool_tip, pin.default_value_text)
            };
            InputBinding {
                id: pin_id(&pin.name),
                name: pin.name.clone(),
                display_name,
                kind: pin.kind,
                tool_tip,
                exposed: pin.is_exposed(),
                group: pin.category().to_string(),
                default_text: pin.default_value_text.clone(),
                default_vector: pin.default_value_vector,
                default_bool: pin.default_value_bool,
                internal: pin.is_internal,
            }
        })
        .collect();

    // Code reading Parameters.TexCoords needs a coordinate wired into
    // the node even though no declared pin consumes it
    if generated.max_tex_coordinate.is_some() {
        inputs.push(InputBinding {
            id: pin_id(DUMMY_COORDINATE_INPUT),
            name: DUMMY_COORDINATE_INPUT.to_string(),
            display_name: DUMMY_COORDINATE_INPUT.to_string(),
            kind: PinKind::Vector2,
            tool_tip: String::new(),
            exposed: false,
            group: String::new(),
            default_text: String::new(),
            default_vector: None,
            default_bool: None,
            internal: true,
        });
    }

    let outputs = outputs
        .iter()
        .map(|pin| OutputBinding {
            id: pin_id(&pin.name),
            name: pin.name.clone(),
            kind: pin.kind,
            tool_tip: pin.tool_tip.clone(),
        })
        .collect();

    FunctionArtifact {
        name: name.to_string(),
        description: description_from_comment(comment),
        fingerprint: generated.fingerprint,
        source_file: source_file.to_string(),
        include_paths: includes
            .iter()
            .map(|include| include.virtual_path.clone())
            .collect(),
        defines: defines.to_vec(),
        inputs,
        outputs,
        variants: generated.variants,
        switch_trees: generated.switch_trees,
        max_tex_coordinate: generated.max_tex_coordinate,
    }
}

/// Mint a pin id: a truncated digest over the owning artifact, the pin
/// name and the fingerprint current at first sight of the pin.
fn stable_id(artifact_name: &str, pin_name: &str, fingerprint: &str) -> String {
    let tag = fingerprint.strip_prefix(TAG_PREFIX).unwrap_or(fingerprint);
    let mut hasher = Sha256::new();
    hasher.update(artifact_name.as_bytes());
    hasher.update(b" / ");
    hasher.update(pin_name.as_bytes());
    hasher.update(b" / ");
    hasher.update(tag.as_bytes());
    let digest = hasher.finalize();
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

/// Turn the raw `//` comment block into display prose: strip the
/// comment markers and `@param` tags, normalize whitespace.
pub fn description_from_comment(comment: &str) -> String {
    let mut text = comment
        .replace("// ", "")
        .replace("//", "")
        .replace('\t', " ")
        .replace("@param ", "");
    while text.contains("  ") {
        text = text.replace("  ", " ");
    }
    while text.contains("\n ") {
        text = text.replace("\n ", "\n");
    }
    text.trim().to_string()
}

// -- Storage -----------------------------------------------------------------

/// Where artifacts live between runs.
pub trait ArtifactStore {
    /// Previous build of the named artifact, if any. Unreadable or
    /// unparsable artifacts count as absent so they regenerate.
    fn load(&self, name: &str) -> Option<FunctionArtifact>;
    fn save(&mut self, artifact: &FunctionArtifact) -> Result<()>;
}

/// Stores each artifact as `<Name>.json` in a directory.
#[derive(Debug, Clone)]
pub struct JsonArtifactStore {
    dir: PathBuf,
}

impl JsonArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }
}

impl ArtifactStore for JsonArtifactStore {
    fn load(&self, name: &str) -> Option<FunctionArtifact> {
        let text = fs::read_to_string(self.path_for(name)).ok()?;
        serde_json::from_str(&text).ok()
    }

    fn save(&mut self, artifact: &FunctionArtifact) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("creating output directory {}", self.dir.display()))?;
        let path = self.path_for(&artifact.name);
        let json = serde_json::to_string_pretty(artifact)?;
        fs::write(&path, json).with_context(|| format!("writing {}", path.display()))
    }
}

/// In-memory store for tests.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
    pub artifacts: BTreeMap<String, FunctionArtifact>,
}

impl ArtifactStore for MemoryArtifactStore {
    fn load(&self, name: &str) -> Option<FunctionArtifact> {
        self.artifacts.get(name).cloned()
    }

    fn save(&mut self, artifact: &FunctionArtifact) -> Result<()> {
        self.artifacts.insert(artifact.name.clone(), artifact.clone());
        Ok(())
    }
}
