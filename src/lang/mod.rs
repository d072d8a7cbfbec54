//! Language front end: source text → tokens → AST → node code.

pub mod ast;
pub mod error;
pub mod lexer;
pub mod note;
pub mod parser;
pub mod print;
pub mod token;

pub use ast::*;
pub use error::{CompileError, ErrorKind, Span};

use crate::codegen::{compile_program, CompileContext, ControlCatalog, NodeCode};
use parser::Parser;

/// The patch language compiler.
///
/// Parses node source into an AST, then generates code for one node.
pub struct Compiler;

impl Compiler {
    /// Parse node source into a Program AST.
    pub fn parse(source: &str) -> Result<Program, CompileError> {
        Parser::new(source).parse_program()
    }

    /// Parse and generate code for one node.
    pub fn compile(
        source: &str,
        ctx: &mut CompileContext,
        catalog: &dyn ControlCatalog,
    ) -> Result<NodeCode, CompileError> {
        let program = Self::parse(source)?;
        compile_program(&program, ctx, catalog)
    }
}
