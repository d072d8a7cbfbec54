//! Built-in function catalogue.
//!
//! Each built-in declares its parameter contract; [`call`] validates a call
//! against it before any code is emitted:
//!
//! 1. argument count,
//! 2. constancy of the supplied arguments,
//! 3. default filling,
//! 4. constancy again, so a non-constant *default* gets its own message,
//! 5. per-parameter type check and form conversion.
//!
//! Pure built-ins fold when every argument is constant. Stateful ones
//! reserve a private slot in the node and emit a dedicated instruction.

pub mod arrays;
pub mod delay;
pub mod filters;
pub mod gates;
pub mod math;
pub mod midi;
pub mod oscillators;

use std::collections::HashMap;

use crate::codegen::fold::PureFn;
use crate::codegen::ir::Instr;
use crate::codegen::Generator;
use crate::lang::ast::Expr;
use crate::lang::error::{CompileError, Span};
use crate::value::{Form, FormKind, Num, Sample, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Num,
    Midi,
    Array,
}

/// Value used when an optional argument is omitted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefaultArg {
    Const(f32),
    /// Copy of an earlier argument.
    Arg(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: &'static str,
    pub ty: ParamType,
    /// Form numeric arguments are brought into.
    pub form: Option<FormKind>,
    pub constant: bool,
    pub default: Option<DefaultArg>,
}

impl Param {
    pub fn num(name: &'static str) -> Self {
        Self {
            name,
            ty: ParamType::Num,
            form: None,
            constant: false,
            default: None,
        }
    }

    pub fn midi(name: &'static str) -> Self {
        Self {
            ty: ParamType::Midi,
            ..Self::num(name)
        }
    }

    pub fn array(name: &'static str) -> Self {
        Self {
            ty: ParamType::Array,
            ..Self::num(name)
        }
    }

    pub fn form(mut self, form: FormKind) -> Self {
        self.form = Some(form);
        self
    }

    pub fn constant(mut self) -> Self {
        self.constant = true;
        self
    }

    pub fn or(mut self, value: f32) -> Self {
        self.default = Some(DefaultArg::Const(value));
        self
    }

    pub fn or_arg(mut self, index: usize) -> Self {
        self.default = Some(DefaultArg::Arg(index));
        self
    }
}

pub type EmitFn = fn(&mut Generator<'_>, Vec<Value>, Span) -> Result<Value, CompileError>;

#[derive(Clone, Copy)]
pub enum BuiltinKind {
    Pure(PureFn),
    Emit(EmitFn),
}

#[derive(Clone)]
pub struct Builtin {
    pub name: &'static str,
    pub params: Vec<Param>,
    /// Repeats for any arguments past `params`.
    pub variadic: Option<Param>,
    pub kind: BuiltinKind,
}

impl Builtin {
    pub fn pure(name: &'static str, func: PureFn, params: Vec<Param>) -> Self {
        Self {
            name,
            params,
            variadic: None,
            kind: BuiltinKind::Pure(func),
        }
    }

    pub fn emit(name: &'static str, params: Vec<Param>, emit: EmitFn) -> Self {
        Self {
            name,
            params,
            variadic: None,
            kind: BuiltinKind::Emit(emit),
        }
    }

    pub fn variadic(mut self, param: Param) -> Self {
        self.variadic = Some(param);
        self
    }

    fn required(&self) -> usize {
        self.params.iter().filter(|p| p.default.is_none()).count()
    }

    fn param(&self, index: usize) -> Option<&Param> {
        self.params.get(index).or(self.variadic.as_ref())
    }

    fn arity_text(&self) -> String {
        let required = self.required();
        match (self.variadic.is_some(), self.params.len()) {
            (true, _) => format!("at least {required}"),
            (false, max) if max == required => format!("{required}"),
            (false, max) => format!("{required} to {max}"),
        }
    }
}

/// The fixed set of built-ins, keyed by name.
pub struct Catalogue {
    builtins: HashMap<&'static str, Builtin>,
}

impl Default for Catalogue {
    fn default() -> Self {
        Self::new()
    }
}

impl Catalogue {
    pub fn new() -> Self {
        let mut catalogue = Self {
            builtins: HashMap::new(),
        };
        math::register(&mut catalogue);
        arrays::register(&mut catalogue);
        oscillators::register(&mut catalogue);
        filters::register(&mut catalogue);
        delay::register(&mut catalogue);
        gates::register(&mut catalogue);
        midi::register(&mut catalogue);
        catalogue
    }

    pub fn add(&mut self, builtin: Builtin) {
        self.builtins.insert(builtin.name, builtin);
    }

    pub fn get(&self, name: &str) -> Option<&Builtin> {
        self.builtins.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.builtins.keys().copied()
    }
}

/// Validate and generate a call to the built-in `name`.
pub fn call(
    gen: &mut Generator<'_>,
    name: &str,
    args: &[Expr],
    span: Span,
) -> Result<Value, CompileError> {
    let builtin = gen
        .ctx
        .builtins
        .get(name)
        .cloned()
        .ok_or_else(|| CompileError::codegen(format!("unknown function '{name}'"), span))?;

    // 1. count
    let too_many = builtin.variadic.is_none() && args.len() > builtin.params.len();
    if args.len() < builtin.required() || too_many {
        return Err(CompileError::codegen(
            format!(
                "'{name}' expects {} arguments, found {}",
                builtin.arity_text(),
                args.len()
            ),
            span,
        ));
    }

    // 2. constancy of supplied arguments
    let mut values = Vec::with_capacity(args.len().max(builtin.params.len()));
    for (index, arg) in args.iter().enumerate() {
        let value = gen.expr(arg)?;
        if let Some(param) = builtin.param(index) {
            if param.constant && !value.is_const() {
                return Err(CompileError::codegen(
                    format!("argument '{}' of '{name}' must be constant", param.name),
                    arg.span,
                ));
            }
        }
        values.push(value);
    }

    // 3. defaults, 4. constancy of defaults
    for index in args.len()..builtin.params.len() {
        let param = &builtin.params[index];
        let value = match param.default {
            Some(DefaultArg::Const(v)) => Value::constant(v),
            Some(DefaultArg::Arg(source)) => values.get(source).cloned().ok_or_else(|| {
                CompileError::codegen(format!("'{name}' is missing '{}'", param.name), span)
            })?,
            None => {
                return Err(CompileError::codegen(
                    format!("'{name}' is missing '{}'", param.name),
                    span,
                ));
            }
        };
        if param.constant && !value.is_const() {
            return Err(CompileError::codegen(
                format!(
                    "default for '{}' of '{name}' is not constant; pass it explicitly",
                    param.name
                ),
                span,
            ));
        }
        values.push(value);
    }

    // 5. types and forms
    let mut checked = Vec::with_capacity(values.len());
    for (index, value) in values.into_iter().enumerate() {
        let arg_span = args.get(index).map_or(span, |a| a.span);
        let Some(param) = builtin.param(index) else {
            checked.push(value);
            continue;
        };
        let value = match param.ty {
            ParamType::Num => {
                let num = value.expect_num(arg_span)?;
                match param.form {
                    Some(form) => Value::Num(gen.coerce(num, form, arg_span)),
                    None => Value::Num(num),
                }
            }
            ParamType::Midi => Value::Midi(value.expect_midi(arg_span)?),
            ParamType::Array => Value::Array(value.expect_array(arg_span)?),
        };
        checked.push(value);
    }

    match builtin.kind {
        BuiltinKind::Pure(func) => pure(gen, func, checked, span),
        BuiltinKind::Emit(emit) => emit(gen, checked, span),
    }
}

/// Fold or emit a pure intrinsic. Variadic calls chain pairwise.
fn pure(
    gen: &mut Generator<'_>,
    func: PureFn,
    args: Vec<Value>,
    span: Span,
) -> Result<Value, CompileError> {
    let mut nums = args
        .into_iter()
        .map(|v| v.expect_num(span))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter();
    let Some(first) = nums.next() else {
        return Err(CompileError::codegen("missing arguments", span));
    };
    let arity = func.arity();
    let mut acc = first;
    loop {
        let rest: Vec<Num> = nums.by_ref().take(arity - 1).collect();
        if arity > 1 && rest.is_empty() {
            return Ok(acc.into());
        }
        let mut operands = vec![acc];
        operands.extend(rest);
        acc = apply_pure(gen, func, &operands);
        if arity == 1 {
            return Ok(acc.into());
        }
    }
}

pub fn apply_pure(gen: &mut Generator<'_>, func: PureFn, operands: &[Num]) -> Num {
    let form = if func.keeps_form() {
        operands[0].form
    } else {
        Form::LINEAR
    };

    let consts: Option<Vec<Sample>> = operands.iter().map(Num::as_const).collect();
    if let Some(consts) = consts {
        let mut args = [Sample::ZERO; 3];
        for (slot, value) in args.iter_mut().zip(consts) {
            *slot = value;
        }
        return Num::constant(func.eval(args), form);
    }

    let regs: Vec<_> = operands.iter().map(|n| gen.builder.materialize(n)).collect();
    let mut args = [regs[0]; 3];
    for (slot, reg) in args.iter_mut().zip(&regs) {
        *slot = *reg;
    }
    let dst = gen.builder.num_reg();
    gen.builder.emit(Instr::Pure { func, dst, args });
    Num::reg(dst, form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::{CompileContext, NoControls, NodeCode};
    use crate::lang::Compiler;

    fn compile(src: &str) -> Result<NodeCode, CompileError> {
        let mut ctx = CompileContext::default();
        Compiler::compile(src, &mut ctx, &NoControls)
    }

    #[test]
    fn unknown_function() {
        let err = compile("x = wobble(1)").unwrap_err();
        assert!(err.message.contains("wobble"));
    }

    #[test]
    fn wrong_count_names_expected_range() {
        let err = compile("x = abs(1, 2)").unwrap_err();
        assert!(err.message.contains("expects 1"), "{}", err.message);
        let err = compile("x = lowpass(1)").unwrap_err();
        assert!(err.message.contains("2 to 3"), "{}", err.message);
    }

    #[test]
    fn non_constant_argument_is_rejected() {
        let err = compile("d = sine(1hz)\nx = delay(1, d, d)").unwrap_err();
        assert!(err.message.contains("must be constant"), "{}", err.message);
    }

    #[test]
    fn non_constant_default_has_distinct_message() {
        let err = compile("d = sine(1hz)\nx = delay(1, d)").unwrap_err();
        assert!(err.message.contains("default"), "{}", err.message);
        assert!(compile("d = sine(1hz)\nx = delay(1, d, 1s)").is_ok());
    }

    #[test]
    fn pure_builtins_fold() {
        let code = compile("out:output = max(1, 5, 3) + abs(-2)").unwrap();
        let Some(Instr::Const { value, .. }) = code.instrs.first() else {
            panic!("expected folded constant");
        };
        assert_eq!(value.lanes(), [7.0, 7.0]);
        assert_eq!(code.instrs.len(), 2);
    }

    #[test]
    fn variadic_min_chains() {
        let code = compile("x = sine(1hz)\nout:output = min(x, 1, 2, 3)").unwrap();
        let pures = code
            .instrs
            .iter()
            .filter(|i| matches!(i, Instr::Pure { .. }))
            .count();
        assert_eq!(pures, 3);
    }

    #[test]
    fn argument_forms_convert() {
        let code = compile("out:output = sine(C4)").unwrap();
        assert!(code.instrs.iter().any(|i| matches!(i, Instr::Oscillator { .. })));
        // note → frequency folds, so no runtime conversion
        assert!(!code.instrs.iter().any(|i| matches!(i, Instr::Convert { .. })));
    }

    #[test]
    fn catalogue_has_everything() {
        let catalogue = Catalogue::new();
        for name in [
            "abs", "floor", "ceil", "sqrt", "exp", "ln", "sin", "cos", "tan", "pow", "min",
            "max", "clamp", "mix", "left", "right", "mono", "stereo", "pan", "active", "gate",
            "fill", "sum", "at", "sine", "saw", "square", "tri", "phasor", "noise", "lowpass",
            "highpass", "bandpass", "delay", "hold", "accum", "note", "voices", "transpose",
        ] {
            assert!(catalogue.get(name).is_some(), "{name}");
        }
    }
}
