//! Patch files: YAML load/save for a whole patch.
//!
//! Nodes are referred to by name within their surface. Group nodes carry
//! their child surface inline, along with the inner controls it exposes.
//!
//! ```yaml
//! version: 1
//! nodes:
//!   - name: osc
//!     source: "out:output = sine(pitch:knob ~> [frequency]) * 0.2"
//!     controls:
//!       - { name: pitch, kind: knob, range: [110, 880], value: 0.5 }
//!       - { name: out, kind: output }
//! ```

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lang::ast::ControlKind;
use crate::runtime::{Runtime, RuntimeError};
use crate::value::{Sample, ARRAY_SIZE};

use super::control::{ControlKey, ControlValue};
use super::node::{NodeId, NodeKind, SurfaceId};
use super::patch::Patch;

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("invalid patch file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("unsupported patch file version {0}")]
    Version(u32),

    #[error("no node named '{0}'")]
    UnknownNode(String),

    #[error("two nodes named '{0}' on one surface")]
    DuplicateName(String),

    #[error("node '{node}' has no control '{key}'")]
    UnknownControl { node: String, key: ControlKey },

    #[error("value of '{key}' on '{node}' does not fit its kind")]
    BadValue { node: String, key: ControlKey },
}

pub type Result<T> = std::result::Result<T, ProjectError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchFile {
    pub version: u32,
    #[serde(flatten)]
    pub root: SurfaceFile,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurfaceFile {
    #[serde(default)]
    pub nodes: Vec<NodeFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<LinkFile>,
    /// Inner controls shown on the wrapping group node.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exposed: Vec<Endpoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeFile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<SurfaceFile>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub controls: Vec<ControlFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlFile {
    pub name: String,
    pub kind: ControlKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<(f64, f64)>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<StoredValue>,
}

/// Editor value of a knob, toggle or graph control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredValue {
    Mono(f32),
    Stereo([f32; 2]),
    Table(Vec<f32>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub node: String,
    pub control: String,
    pub kind: ControlKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkFile {
    pub from: Endpoint,
    pub to: Endpoint,
}

/// Default directory for patch files.
pub fn default_patch_dir() -> PathBuf {
    let mut path = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push(".patchwire");
    path.push("patches");
    path
}

impl StoredValue {
    fn from_value(value: &ControlValue) -> Option<Self> {
        match value {
            ControlValue::Num(s) if s.left == s.right => Some(StoredValue::Mono(s.left)),
            ControlValue::Num(s) => Some(StoredValue::Stereo([s.left, s.right])),
            ControlValue::Array(table) => {
                Some(StoredValue::Table(table.iter().map(|s| s.left).collect()))
            }
            ControlValue::Midi(_) => None,
        }
    }

    fn to_value(&self, kind: ControlKind) -> Option<ControlValue> {
        match (self, kind.storage_class()) {
            (StoredValue::Mono(v), super::StorageClass::Num) => Some(ControlValue::from(*v)),
            (StoredValue::Stereo([l, r]), super::StorageClass::Num) => {
                Some(ControlValue::Num(Sample::stereo(*l, *r)))
            }
            (StoredValue::Table(values), super::StorageClass::Array)
                if values.len() == ARRAY_SIZE =>
            {
                let mut table = [Sample::ZERO; ARRAY_SIZE];
                for (cell, v) in table.iter_mut().zip(values) {
                    *cell = Sample::splat(*v);
                }
                Some(ControlValue::Array(table))
            }
            _ => None,
        }
    }
}

impl PatchFile {
    pub fn read(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: PatchFile = serde_yaml::from_str(&content)?;
        if file.version != FORMAT_VERSION {
            return Err(ProjectError::Version(file.version));
        }
        Ok(file)
    }

    /// Write as YAML, creating parent directories as needed.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Describe the runtime's patch, with live control values.
    pub fn capture(runtime: &Runtime) -> Result<Self> {
        let patch = runtime.snapshot();
        Ok(Self {
            version: FORMAT_VERSION,
            root: capture_surface(&patch, patch.root())?,
        })
    }

    /// Build this patch into an empty runtime. Does not compile.
    pub fn apply(&self, runtime: &Runtime) -> Result<()> {
        build_surface(runtime, runtime.root(), &self.root)?;
        Ok(())
    }

    /// Push changed node sources into a runtime built from an earlier
    /// version of this file, matching nodes by name. Returns how many nodes
    /// changed. Structure (nodes, controls, links) is left alone.
    pub fn update_sources(&self, runtime: &Runtime) -> Result<usize> {
        update_surface(runtime, runtime.root(), &self.root)
    }
}

fn update_surface(runtime: &Runtime, surface: SurfaceId, file: &SurfaceFile) -> Result<usize> {
    let current: Vec<(NodeId, String, Option<String>, Option<SurfaceId>)> =
        runtime.with_patch(|patch| {
            patch
                .surface_nodes(surface)
                .iter()
                .filter_map(|id| patch.node(*id))
                .map(|n| (n.id, n.name.clone(), n.source().map(str::to_owned), n.child()))
                .collect()
        });

    let mut changed = 0;
    for entry in &file.nodes {
        let Some((id, _, source, child)) = current.iter().find(|(_, name, ..)| *name == entry.name)
        else {
            warn!("node '{}' is not in the running patch", entry.name);
            continue;
        };
        match (&entry.source, source, &entry.group, child) {
            (Some(new), Some(old), _, _) if new != old => {
                runtime.set_source(*id, new)?;
                changed += 1;
            }
            (_, _, Some(group), Some(child)) => changed += update_surface(runtime, *child, group)?,
            _ => {}
        }
    }
    Ok(changed)
}

/// Names of the nodes on one surface, rejecting duplicates.
fn node_names(patch: &Patch, surface: SurfaceId) -> Result<HashMap<NodeId, String>> {
    let mut names = HashMap::new();
    for id in patch.surface_nodes(surface) {
        let Some(node) = patch.node(*id) else {
            continue;
        };
        if names.values().any(|n| *n == node.name) {
            return Err(ProjectError::DuplicateName(node.name.clone()));
        }
        names.insert(*id, node.name.clone());
    }
    Ok(names)
}

fn capture_surface(patch: &Patch, surface: SurfaceId) -> Result<SurfaceFile> {
    let names = node_names(patch, surface)?;
    let endpoint = |control| {
        let c = patch.control(control)?;
        Some(Endpoint {
            node: names.get(&c.node)?.clone(),
            control: c.key.name.clone(),
            kind: c.kind(),
        })
    };

    let mut file = SurfaceFile::default();
    for id in patch.surface_nodes(surface) {
        let Some(node) = patch.node(*id) else {
            continue;
        };
        let mut entry = NodeFile {
            name: node.name.clone(),
            source: None,
            group: None,
            controls: Vec::new(),
        };
        match &node.kind {
            NodeKind::Expr { source } => entry.source = Some(source.clone()),
            NodeKind::Group { surface: child } => {
                entry.group = Some(capture_surface(patch, *child)?);
            }
        }
        for control in node.controls.iter().filter_map(|c| patch.control(*c)) {
            if control.forwards.is_some() {
                continue;
            }
            let kind = control.kind();
            entry.controls.push(ControlFile {
                name: control.key.name.clone(),
                kind,
                range: (kind == ControlKind::Knob).then_some(control.range),
                value: kind
                    .is_editable()
                    .then(|| StoredValue::from_value(&control.value))
                    .flatten(),
            });
        }
        file.nodes.push(entry);

        file.exposed.extend(
            node.controls
                .iter()
                .filter(|c| patch.is_exposed(**c))
                .filter_map(|c| endpoint(*c)),
        );
    }

    for (a, b) in patch.links() {
        let on_surface = patch
            .control(*a)
            .and_then(|c| patch.node(c.node))
            .is_some_and(|n| n.surface == surface);
        if !on_surface {
            continue;
        }
        if let (Some(from), Some(to)) = (endpoint(*a), endpoint(*b)) {
            file.links.push(LinkFile { from, to });
        }
    }
    Ok(file)
}

fn build_surface(
    runtime: &Runtime,
    surface: SurfaceId,
    file: &SurfaceFile,
) -> Result<HashMap<String, NodeId>> {
    let mut names = HashMap::new();
    for entry in &file.nodes {
        if names.contains_key(&entry.name) {
            return Err(ProjectError::DuplicateName(entry.name.clone()));
        }
        let id = match &entry.group {
            Some(child) => {
                let (id, inner) = runtime.create_group(surface, &entry.name)?;
                build_surface(runtime, inner, child)?;
                id
            }
            None => {
                let id = runtime.create_node(surface, &entry.name)?;
                if let Some(source) = &entry.source {
                    runtime.set_source(id, source)?;
                }
                for control in &entry.controls {
                    build_control(runtime, id, &entry.name, control)?;
                }
                id
            }
        };
        names.insert(entry.name.clone(), id);
    }

    let resolve = |endpoint: &Endpoint| {
        let node = *names
            .get(&endpoint.node)
            .ok_or_else(|| ProjectError::UnknownNode(endpoint.node.clone()))?;
        runtime
            .find_control(node, &endpoint.control, endpoint.kind)
            .ok_or_else(|| ProjectError::UnknownControl {
                node: endpoint.node.clone(),
                key: ControlKey::new(endpoint.control.clone(), endpoint.kind),
            })
    };

    for link in &file.links {
        runtime.connect(resolve(&link.from)?, resolve(&link.to)?)?;
    }
    for endpoint in &file.exposed {
        runtime.expose(resolve(endpoint)?)?;
    }
    Ok(names)
}

fn build_control(runtime: &Runtime, node: NodeId, node_name: &str, file: &ControlFile) -> Result<()> {
    let id = runtime.create_control(node, &file.name, file.kind)?;
    if let Some((min, max)) = file.range {
        runtime.set_knob_range(id, min, max)?;
    }
    if let Some(stored) = &file.value {
        let value = stored
            .to_value(file.kind)
            .ok_or_else(|| ProjectError::BadValue {
                node: node_name.to_string(),
                key: ControlKey::new(file.name.clone(), file.kind),
            })?;
        runtime.set_control(id, value)?;
    }
    Ok(())
}
