//! Graph nodes: expression nodes compiled from source, and group nodes that
//! wrap a child surface.

use std::fmt;

use crate::codegen::NodeCode;
use crate::lang::CompileError;

use super::control::ControlId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// A graph level: the root patch, or the inside of a group node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Expr { source: String },
    Group { surface: SurfaceId },
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    /// Surface this node lives on.
    pub surface: SurfaceId,
    pub kind: NodeKind,
    /// Controls in creation order.
    pub controls: Vec<ControlId>,
    /// Last successful compile.
    pub code: Option<NodeCode>,
    pub needs_compile: bool,
    /// Failures from the last compile attempt.
    pub errors: Vec<CompileError>,
}

impl Node {
    pub fn expr(id: NodeId, name: impl Into<String>, surface: SurfaceId) -> Self {
        Self::new(
            id,
            name,
            surface,
            NodeKind::Expr {
                source: String::new(),
            },
        )
    }

    pub fn group(id: NodeId, name: impl Into<String>, surface: SurfaceId, child: SurfaceId) -> Self {
        Self::new(id, name, surface, NodeKind::Group { surface: child })
    }

    fn new(id: NodeId, name: impl Into<String>, surface: SurfaceId, kind: NodeKind) -> Self {
        Self {
            id,
            name: name.into(),
            surface,
            kind,
            controls: Vec::new(),
            code: None,
            needs_compile: true,
            errors: Vec::new(),
        }
    }

    pub fn source(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Expr { source } => Some(source),
            NodeKind::Group { .. } => None,
        }
    }

    /// The wrapped surface, for group nodes.
    pub fn child(&self) -> Option<SurfaceId> {
        match self.kind {
            NodeKind::Group { surface } => Some(surface),
            NodeKind::Expr { .. } => None,
        }
    }

    pub fn is_group(&self) -> bool {
        self.child().is_some()
    }
}

/// One graph level and the nodes on it, in creation order.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub id: SurfaceId,
    /// The group node wrapping this surface; `None` for the root.
    pub owner: Option<NodeId>,
    pub nodes: Vec<NodeId>,
}

impl Surface {
    pub fn new(id: SurfaceId, owner: Option<NodeId>) -> Self {
        Self {
            id,
            owner,
            nodes: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.owner.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_nodes_need_compiling() {
        let node = Node::expr(NodeId(1), "osc", SurfaceId(0));
        assert!(node.needs_compile);
        assert_eq!(node.source(), Some(""));
        assert!(!node.is_group());

        let group = Node::group(NodeId(2), "voice", SurfaceId(0), SurfaceId(1));
        assert_eq!(group.child(), Some(SurfaceId(1)));
        assert_eq!(group.source(), None);
    }

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(NodeId(3).to_string(), "n3");
        assert_eq!(SurfaceId(0).to_string(), "s0");
    }
}
