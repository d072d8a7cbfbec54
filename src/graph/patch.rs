//! The editable graph: arenas of surfaces, nodes and controls plus links.

use std::collections::BTreeMap;

use log::debug;

use crate::codegen::{CompileContext, ControlCatalog, NodeCode};
use crate::lang::ast::ControlKind;
use crate::lang::{CompileError, Compiler};
use crate::runtime::program::Program;

use super::control::{Control, ControlId, ControlKey, ControlValue};
use super::node::{Node, NodeId, NodeKind, Surface, SurfaceId};
use super::surface;
use super::GraphError;

type Result<T> = std::result::Result<T, GraphError>;

#[derive(Debug, Clone)]
pub struct Patch {
    surfaces: BTreeMap<SurfaceId, Surface>,
    nodes: BTreeMap<NodeId, Node>,
    controls: BTreeMap<ControlId, Control>,
    links: Vec<(ControlId, ControlId)>,
    root: SurfaceId,
    next_surface: u32,
    next_node: u32,
    next_control: u32,
}

impl Default for Patch {
    fn default() -> Self {
        Self::new()
    }
}

/// Knob ranges and noise salt for one node.
struct NodeCatalog<'a> {
    patch: &'a Patch,
    node: NodeId,
}

impl ControlCatalog for NodeCatalog<'_> {
    fn knob_range(&self, name: &str) -> Option<(f64, f64)> {
        let key = ControlKey::new(name, ControlKind::Knob);
        self.patch
            .find_control(self.node, &key)
            .and_then(|id| self.patch.control(id))
            .map(|c| c.range)
    }

    fn salt(&self) -> u64 {
        self.node.0 as u64
    }
}

impl Patch {
    pub fn new() -> Self {
        let root = SurfaceId(0);
        let mut surfaces = BTreeMap::new();
        surfaces.insert(root, Surface::new(root, None));
        Self {
            surfaces,
            nodes: BTreeMap::new(),
            controls: BTreeMap::new(),
            links: Vec::new(),
            root,
            next_surface: 1,
            next_node: 0,
            next_control: 0,
        }
    }

    // --- Lookup ---

    pub fn root(&self) -> SurfaceId {
        self.root
    }

    pub fn surface(&self, id: SurfaceId) -> Option<&Surface> {
        self.surfaces.get(&id)
    }

    pub fn surface_nodes(&self, id: SurfaceId) -> &[NodeId] {
        self.surfaces.get(&id).map_or(&[], |s| s.nodes.as_slice())
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn control(&self, id: ControlId) -> Option<&Control> {
        self.controls.get(&id)
    }

    pub fn controls(&self) -> impl Iterator<Item = &Control> {
        self.controls.values()
    }

    pub fn links(&self) -> &[(ControlId, ControlId)] {
        &self.links
    }

    pub fn find_control(&self, node: NodeId, key: &ControlKey) -> Option<ControlId> {
        self.nodes.get(&node)?.controls.iter().copied().find(|id| {
            self.controls
                .get(id)
                .is_some_and(|control| &control.key == key)
        })
    }

    /// The control on the wrapping group node that forwards `inner`.
    pub fn forwarder(&self, inner: ControlId) -> Option<ControlId> {
        self.controls
            .values()
            .find(|c| c.forwards == Some(inner))
            .map(|c| c.id)
    }

    pub fn is_exposed(&self, control: ControlId) -> bool {
        self.forwarder(control).is_some()
    }

    pub fn is_linked(&self, control: ControlId) -> bool {
        self.links
            .iter()
            .any(|(a, b)| *a == control || *b == control)
    }

    pub fn node_errors(&self, node: NodeId) -> Result<&[CompileError]> {
        self.nodes
            .get(&node)
            .map(|n| n.errors.as_slice())
            .ok_or(GraphError::UnknownNode(node))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes.get_mut(&id).ok_or(GraphError::UnknownNode(id))
    }

    fn control_mut(&mut self, id: ControlId) -> Result<&mut Control> {
        self.controls
            .get_mut(&id)
            .ok_or(GraphError::UnknownControl(id))
    }

    fn control_ref(&self, id: ControlId) -> Result<&Control> {
        self.controls.get(&id).ok_or(GraphError::UnknownControl(id))
    }

    // --- Nodes ---

    pub fn create_node(&mut self, surface: SurfaceId, name: impl Into<String>) -> Result<NodeId> {
        let id = self.alloc_node(surface)?;
        self.nodes.insert(id, Node::expr(id, name, surface));
        Ok(id)
    }

    /// Create a group node and the surface it wraps.
    pub fn create_group(
        &mut self,
        surface: SurfaceId,
        name: impl Into<String>,
    ) -> Result<(NodeId, SurfaceId)> {
        let id = self.alloc_node(surface)?;
        let child = SurfaceId(self.next_surface);
        self.next_surface += 1;
        self.surfaces.insert(child, Surface::new(child, Some(id)));
        self.nodes.insert(id, Node::group(id, name, surface, child));
        Ok((id, child))
    }

    fn alloc_node(&mut self, surface: SurfaceId) -> Result<NodeId> {
        let id = NodeId(self.next_node);
        self.surfaces
            .get_mut(&surface)
            .ok_or(GraphError::UnknownSurface(surface))?
            .nodes
            .push(id);
        self.next_node += 1;
        Ok(id)
    }

    /// Remove a node, its controls and links. Group nodes take their whole
    /// child surface with them.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let node = self.nodes.remove(&id).ok_or(GraphError::UnknownNode(id))?;
        if let Some(surface) = self.surfaces.get_mut(&node.surface) {
            surface.nodes.retain(|n| *n != id);
        }
        for control in &node.controls {
            self.drop_control(*control);
        }
        if let Some(child) = node.child() {
            let inner: Vec<NodeId> = self.surface_nodes(child).to_vec();
            for n in inner {
                self.remove_node(n)?;
            }
            self.surfaces.remove(&child);
        }
        debug!("removed node {id}");
        Ok(())
    }

    pub fn set_source(&mut self, id: NodeId, source: impl Into<String>) -> Result<()> {
        let node = self.node_mut(id)?;
        match &mut node.kind {
            NodeKind::Expr { source: current } => {
                *current = source.into();
                node.needs_compile = true;
                Ok(())
            }
            NodeKind::Group { .. } => Err(GraphError::NotExpression(id)),
        }
    }

    /// Force every node to recompile, e.g. after the sample rate changed.
    pub fn invalidate_all(&mut self) {
        for node in self.nodes.values_mut() {
            node.needs_compile = true;
        }
    }

    // --- Controls ---

    pub fn create_control(
        &mut self,
        node: NodeId,
        name: impl Into<String>,
        kind: ControlKind,
    ) -> Result<ControlId> {
        if self.node(node).ok_or(GraphError::UnknownNode(node))?.is_group() {
            return Err(GraphError::NotExpression(node));
        }
        let key = ControlKey::new(name, kind);
        self.add_control(node, key, false)
    }

    fn add_control(&mut self, node: NodeId, key: ControlKey, auto: bool) -> Result<ControlId> {
        if self.find_control(node, &key).is_some() {
            return Err(GraphError::DuplicateControl { node, key });
        }
        let id = ControlId(self.next_control);
        self.next_control += 1;
        self.node_mut(node)?.controls.push(id);
        self.controls.insert(id, Control::new(id, key, node, auto));
        Ok(id)
    }

    pub fn remove_control(&mut self, id: ControlId) -> Result<()> {
        let node = self.control_ref(id)?.node;
        self.drop_control(id);
        if let Some(node) = self.nodes.get_mut(&node) {
            node.needs_compile = node.code.is_some();
        }
        Ok(())
    }

    /// Remove a control, its links and anything forwarding it.
    fn drop_control(&mut self, id: ControlId) {
        let Some(control) = self.controls.remove(&id) else {
            return;
        };
        if let Some(node) = self.nodes.get_mut(&control.node) {
            node.controls.retain(|c| *c != id);
        }
        self.links.retain(|(a, b)| *a != id && *b != id);
        if let Some(forwarder) = self.forwarder(id) {
            self.drop_control(forwarder);
        }
    }

    /// Rename a control. Controls the node's source refers to are refused;
    /// renaming those means editing the source.
    pub fn rename_control(&mut self, id: ControlId, name: impl Into<String>) -> Result<()> {
        let control = self.control_ref(id)?;
        let node = control.node;
        let bound = self
            .node(node)
            .and_then(|n| n.code.as_ref())
            .is_some_and(|code| code.uses(&control.key));
        if bound {
            return Err(GraphError::BoundControl(control.key.clone()));
        }
        let key = ControlKey::new(name, control.kind());
        if self.find_control(node, &key).is_some() {
            return Err(GraphError::DuplicateControl { node, key });
        }
        let control = self.control_mut(id)?;
        control.key = key;
        control.auto = false;
        self.node_mut(node)?.needs_compile = true;
        Ok(())
    }

    pub fn set_knob_range(&mut self, id: ControlId, min: f64, max: f64) -> Result<()> {
        let control = self.control_mut(id)?;
        if control.kind() != ControlKind::Knob {
            return Err(GraphError::NotKnob(id));
        }
        control.range = (min, max);
        let node = control.node;
        // Knob reads carry the range in their form.
        self.node_mut(node)?.needs_compile = true;
        Ok(())
    }

    /// Record a control's editor value. Checked against the storage class.
    pub fn set_value(&mut self, id: ControlId, value: ControlValue) -> Result<()> {
        let control = self.control_mut(id)?;
        if control.kind().storage_class() != value.storage_class() {
            return Err(GraphError::ValueMismatch(id));
        }
        control.value = value;
        Ok(())
    }

    // --- Links ---

    pub fn connect(&mut self, a: ControlId, b: ControlId) -> Result<()> {
        let (ca, cb) = (self.control_ref(a)?, self.control_ref(b)?);
        let incompatible = |reason| GraphError::IncompatibleControls { a, b, reason };
        if a == b {
            return Err(incompatible("a control cannot link to itself"));
        }
        if ca.kind().storage_class() != cb.kind().storage_class() {
            return Err(incompatible("storage classes differ"));
        }
        let surface_of = |c: &Control| self.node(c.node).map(|n| n.surface);
        if surface_of(ca) != surface_of(cb) {
            return Err(incompatible("controls are on different surfaces"));
        }
        if !self.links.iter().any(|l| *l == (a, b) || *l == (b, a)) {
            self.links.push((a, b));
        }
        Ok(())
    }

    pub fn disconnect(&mut self, a: ControlId, b: ControlId) -> Result<()> {
        self.control_ref(a)?;
        self.control_ref(b)?;
        self.links.retain(|l| *l != (a, b) && *l != (b, a));
        Ok(())
    }

    // --- Exposure ---

    /// Make an inner control visible on the group node wrapping its surface.
    /// Returns the forwarding control, reusing an existing one.
    pub fn expose(&mut self, inner: ControlId) -> Result<ControlId> {
        if let Some(existing) = self.forwarder(inner) {
            return Ok(existing);
        }
        let control = self.control_ref(inner)?;
        let (key, range, value) = (control.key.clone(), control.range, control.value);
        let surface = self
            .node(control.node)
            .map(|n| n.surface)
            .ok_or(GraphError::UnknownNode(control.node))?;
        let owner = self
            .surface(surface)
            .and_then(|s| s.owner)
            .ok_or(GraphError::NotExposable(inner))?;

        let id = self.add_control(owner, key, false)?;
        let forwarder = self.control_mut(id)?;
        forwarder.forwards = Some(inner);
        forwarder.range = range;
        forwarder.value = value;
        debug!("exposed {inner} as {id} on {owner}");
        Ok(id)
    }

    pub fn unexpose(&mut self, inner: ControlId) -> Result<()> {
        self.control_ref(inner)?;
        if let Some(forwarder) = self.forwarder(inner) {
            self.drop_control(forwarder);
        }
        Ok(())
    }

    // --- Compile ---

    /// Recompile dirty nodes, then lay out the whole patch. Every failing
    /// node is reported; nothing is laid out unless all succeed.
    pub fn compile(&mut self, ctx: &mut CompileContext) -> Result<Program> {
        let failures = self.compile_nodes(ctx);
        if !failures.is_empty() {
            return Err(GraphError::Compile(failures));
        }
        let block = surface::build(self, self.root);
        let midi_inputs = block.host_midi_slots();

        let mut program = Program {
            steps: block.steps,
            layout: block.layout,
            regs: block.regs,
            control_slots: block.control_slots,
            outputs: Vec::new(),
            midi_inputs,
        };
        for group in &block.groups {
            let is_output = group.members.iter().any(|c| {
                self.control(*c)
                    .is_some_and(|c| c.kind() == ControlKind::Output)
            });
            if is_output {
                program.outputs.extend(group.slots.first());
            }
        }
        debug!(
            "compiled patch: {} nodes, {} slots, {} outputs",
            program.node_count(),
            program.layout.len(),
            program.outputs.len()
        );
        Ok(program)
    }

    fn compile_nodes(&mut self, ctx: &mut CompileContext) -> Vec<(NodeId, CompileError)> {
        let dirty: Vec<NodeId> = self
            .nodes
            .values()
            .filter(|n| n.needs_compile && !n.is_group())
            .map(|n| n.id)
            .collect();

        let mut failures = Vec::new();
        for id in dirty {
            let Some(source) = self.node(id).and_then(|n| n.source()).map(str::to_owned) else {
                continue;
            };
            let result = {
                let catalog = NodeCatalog {
                    patch: self,
                    node: id,
                };
                Compiler::compile(&source, ctx, &catalog)
            };
            match result {
                Ok(code) => {
                    self.sync_controls(id, &code);
                    if let Some(node) = self.nodes.get_mut(&id) {
                        node.code = Some(code);
                        node.errors.clear();
                        node.needs_compile = false;
                    }
                }
                Err(err) => {
                    debug!("{id} failed to compile: {err}");
                    if let Some(node) = self.nodes.get_mut(&id) {
                        node.errors = vec![err.clone()];
                    }
                    failures.push((id, err));
                }
            }
        }
        for node in self.nodes.values_mut().filter(|n| n.is_group()) {
            node.needs_compile = false;
        }
        failures
    }

    /// Create controls the code references and prune auto controls it no
    /// longer does (unless linked or exposed).
    fn sync_controls(&mut self, node: NodeId, code: &NodeCode) {
        for usage in &code.controls {
            if self.find_control(node, &usage.key).is_none() {
                // Cannot collide: the key was just looked up.
                let _ = self.add_control(node, usage.key.clone(), true);
            }
        }
        let stale: Vec<ControlId> = self
            .node(node)
            .map(|n| n.controls.clone())
            .unwrap_or_default()
            .into_iter()
            .filter(|id| {
                self.control(*id).is_some_and(|c| {
                    c.auto && !code.uses(&c.key) && !self.is_linked(*id) && !self.is_exposed(*id)
                })
            })
            .collect();
        for id in stale {
            debug!("pruning unused control {id}");
            self.drop_control(id);
        }
    }
}
