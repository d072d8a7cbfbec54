//! Code generation: AST of one node → [`NodeCode`].

pub mod builder;
pub mod context;
pub mod expr;
pub mod fold;
pub mod ir;
pub mod scope;

pub use builder::NodeBuilder;
pub use context::CompileContext;
pub use expr::Generator;
pub use ir::{ControlUse, Instr, NodeCode, RegCounts, SlotKind, SlotRef};

use log::debug;

use crate::lang::ast::Program;
use crate::lang::error::CompileError;

/// What the generator needs to know about the node's existing controls.
pub trait ControlCatalog {
    /// Range of the knob named `name`, if the node defines one.
    fn knob_range(&self, name: &str) -> Option<(f64, f64)>;

    /// Distinguishes otherwise identical nodes (noise seeds).
    fn salt(&self) -> u64 {
        0
    }
}

/// A catalog with no controls; every knob gets the 0..1 range.
pub struct NoControls;

impl ControlCatalog for NoControls {
    fn knob_range(&self, _name: &str) -> Option<(f64, f64)> {
        None
    }
}

/// Generate code for a parsed node program.
pub fn compile_program(
    program: &Program,
    ctx: &mut CompileContext,
    catalog: &dyn ControlCatalog,
) -> Result<NodeCode, CompileError> {
    let mut generator = Generator::new(ctx, catalog);
    for statement in &program.statements {
        generator.statement(statement)?;
    }
    let code = generator.finish();
    debug!(
        "generated {} instructions, {} private slots, {} controls",
        code.instrs.len(),
        code.slots.len(),
        code.controls.len()
    );
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::control::ControlKey;
    use crate::lang::ast::ControlKind;
    use crate::lang::{Compiler, ErrorKind};
    use crate::value::Sample;

    fn compile(src: &str) -> Result<NodeCode, CompileError> {
        let mut ctx = CompileContext::default();
        Compiler::compile(src, &mut ctx, &NoControls)
    }

    fn stored_const(code: &NodeCode) -> Sample {
        // Constant results are materialized right before the store.
        let Some(Instr::Const { value, .. }) = code.instrs.first() else {
            panic!("expected a folded constant, got {:?}", code.instrs);
        };
        *value
    }

    #[test]
    fn constant_math_folds_to_one_store() {
        let code = compile("out:output = (1 + 2) * 4").unwrap();
        assert_eq!(code.instrs.len(), 2);
        assert_eq!(stored_const(&code).lanes(), [12.0, 12.0]);
        assert!(code.writes(&ControlKey::new("out", ControlKind::Output)));
    }

    #[test]
    fn variables_flow_between_statements() {
        let code = compile("x = 3\ny = x * 2\nout:output = y").unwrap();
        assert_eq!(stored_const(&code).lanes(), [6.0, 6.0]);
    }

    #[test]
    fn read_before_write_is_error() {
        let err = compile("out:output = y").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Codegen);
        assert!(err.message.contains("'y'"));
        assert_eq!(err.span.start, 13);
    }

    #[test]
    fn output_read_before_write_is_error() {
        assert!(compile("x = out:output").is_err());
        assert!(compile("out:output = 1\nx = out:output").is_ok());
    }

    #[test]
    fn output_requires_linear_form() {
        let err = compile("out:output = 440hz").unwrap_err();
        assert!(err.message.contains("linear"), "{}", err.message);
        assert!(compile("out:output = sine(440hz)").is_ok());
    }

    #[test]
    fn knob_cannot_be_assigned() {
        let err = compile("gain:knob = 1").unwrap_err();
        assert!(err.message.contains("cannot be assigned"));
    }

    #[test]
    fn knob_value_has_control_form_and_registers_read() {
        let code = compile("out:output = gain:knob ~> [linear]").unwrap();
        let key = ControlKey::new("gain", ControlKind::Knob);
        let gain = code.controls.iter().find(|c| c.key == key).unwrap();
        assert!(gain.reads);
        assert!(!gain.writes);
        assert!(code.instrs.iter().any(|i| matches!(i, Instr::Convert { .. })));
    }

    #[test]
    fn unknown_property_is_error() {
        let err = compile("x = a:knob.colour").unwrap_err();
        assert!(err.message.contains("colour"));
    }

    #[test]
    fn type_mismatch_names_both_types() {
        let err = compile("x = :midi + 1").unwrap_err();
        assert!(err.message.contains("num"));
        assert!(err.message.contains("midi"));
    }

    #[test]
    fn tuple_arity_mismatch() {
        let err = compile("(a, b) = (1, 2, 3)").unwrap_err();
        assert!(err.message.contains('2') && err.message.contains('3'));
    }

    #[test]
    fn compound_assignment_needs_single_target() {
        assert!(compile("a = 1\nb = 2\n(a, b) += 1").is_err());
        assert!(compile("a = 1\na += 1").is_ok());
    }

    #[test]
    fn cast_relabels_without_code() {
        let code = compile("x = 440 -> [frequency]\nout:output = sine(x)").unwrap();
        assert!(!code.instrs.iter().any(|i| matches!(i, Instr::Convert { .. })));
    }

    #[test]
    fn not_forces_linear() {
        assert!(compile("out:output = !(2hz)").is_ok());
        assert!(compile("out:output = -(2hz)").is_err());
    }
}
