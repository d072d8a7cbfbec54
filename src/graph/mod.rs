//! Node/control graph and its compiler.
//!
//! A [`Patch`] holds nodes on nested surfaces, their controls, and the
//! links between controls. Compiling a patch recompiles dirty nodes, orders
//! each surface by its data dependencies and lays everything out as one
//! [`Program`](crate::runtime::program::Program).

pub mod control;
pub mod group;
pub mod node;
pub mod patch;
pub mod project;
pub mod schedule;
pub mod surface;

pub use control::{Control, ControlId, ControlKey, ControlValue, StorageClass};
pub use node::{Node, NodeId, NodeKind, Surface, SurfaceId};
pub use patch::Patch;

use thiserror::Error;

use crate::lang::CompileError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("unknown control {0}")]
    UnknownControl(ControlId),

    #[error("unknown surface {0}")]
    UnknownSurface(SurfaceId),

    #[error("{0} is not an expression node")]
    NotExpression(NodeId),

    #[error("{node} already has a control '{key}'")]
    DuplicateControl { node: NodeId, key: ControlKey },

    #[error("cannot connect {a} and {b}: {reason}")]
    IncompatibleControls {
        a: ControlId,
        b: ControlId,
        reason: &'static str,
    },

    #[error("control '{0}' is bound by node source and cannot be renamed")]
    BoundControl(ControlKey),

    #[error("{0} is not a knob")]
    NotKnob(ControlId),

    #[error("{0} is on the root surface and cannot be exposed")]
    NotExposable(ControlId),

    #[error("value does not fit control {0}")]
    ValueMismatch(ControlId),

    #[error("{} node(s) failed to compile", .0.len())]
    Compile(Vec<(NodeId, CompileError)>),
}
