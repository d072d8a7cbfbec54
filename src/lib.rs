//! patchwire: a small signal language compiled live into a node graph.
//!
//! Source text goes through [`lang`] (lexer, parser) and [`codegen`] into
//! per-node register code. [`graph`] wires nodes together through typed
//! controls and lays a whole patch out as one program, which [`runtime`]
//! runs sample by sample and swaps on recompile without losing state.

pub mod audio;
pub mod builtins;
pub mod codegen;
pub mod config;
pub mod graph;
pub mod lang;
pub mod midi;
pub mod runtime;
pub mod value;
