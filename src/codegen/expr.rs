//! Expression code generator.
//!
//! Walks the AST of one node, resolves names against the [`Scope`], folds
//! constant operations and emits instructions into the [`NodeBuilder`].

use log::warn;

use crate::builtins;
use crate::graph::control::ControlKey;
use crate::lang::ast::*;
use crate::lang::error::{CompileError, Span};
use crate::value::{Array, Conversion, Form, FormKind, Midi, Num, Sample, Value, ARRAY_SIZE};

use super::builder::NodeBuilder;
use super::context::CompileContext;
use super::fold::{eval_binary, eval_unary};
use super::ir::{Instr, NodeCode, SlotRef};
use super::scope::Scope;
use super::ControlCatalog;

pub struct Generator<'a> {
    pub ctx: &'a mut CompileContext,
    pub builder: NodeBuilder,
    scope: Scope,
    catalog: &'a dyn ControlCatalog,
    noise_count: u64,
}

impl<'a> Generator<'a> {
    pub fn new(ctx: &'a mut CompileContext, catalog: &'a dyn ControlCatalog) -> Self {
        Self {
            ctx,
            builder: NodeBuilder::new(),
            scope: Scope::new(),
            catalog,
            noise_count: 0,
        }
    }

    pub fn finish(self) -> NodeCode {
        self.builder.finish()
    }

    pub fn statement(&mut self, expr: &Expr) -> Result<(), CompileError> {
        self.expr(expr).map(|_| ())
    }

    pub fn expr(&mut self, expr: &Expr) -> Result<Value, CompileError> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Number { value, unit } => {
                let form = unit.map(|u| Form::new(u.form())).unwrap_or(Form::LINEAR);
                Ok(Num::constant(Sample::splat(*value as f32), form).into())
            }
            ExprKind::Note(note) => {
                Ok(Num::constant(Sample::splat(*note as f32), Form::new(FormKind::Note)).into())
            }
            ExprKind::Tuple(items) => {
                let values = items
                    .iter()
                    .map(|item| self.expr(item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::Tuple(values))
            }
            ExprKind::Call { name, args } => builtins::call(self, name, args, span),
            ExprKind::Cast { expr: inner, form } => {
                let num = self.expr(inner)?.expect_num(inner.span)?;
                let form = self.form(form)?;
                Ok(num.with_form(form).into())
            }
            ExprKind::Convert { expr: inner, form } => {
                let num = self.expr(inner)?.expect_num(inner.span)?;
                let form = self.form(form)?;
                Ok(self.convert(num, form, span).into())
            }
            ExprKind::Control(control) => self.read_control(control, span),
            ExprKind::Variable(name) => self.scope.var(name).cloned().ok_or_else(|| {
                CompileError::codegen(format!("'{name}' is read before it is written"), span)
            }),
            ExprKind::Math { op, lhs, rhs } => {
                let a = self.expr(lhs)?.expect_num(lhs.span)?;
                let b = self.expr(rhs)?.expect_num(rhs.span)?;
                Ok(self.binary(*op, a, b).into())
            }
            ExprKind::Unary { op, expr: operand } => {
                let a = self.expr(operand)?.expect_num(operand.span)?;
                Ok(self.unary(*op, a).into())
            }
            ExprKind::Assign { op, target, value } => self.assign(*op, target, value, span),
            ExprKind::Postfix { op, target } => self.postfix(*op, target),
            ExprKind::LValue(_) => Err(CompileError::codegen(
                "assignment target used as a value",
                span,
            )),
        }
    }

    // --- Numbers ---

    pub fn binary(&mut self, op: BinaryOp, lhs: Num, rhs: Num) -> Num {
        let form = lhs.form;
        if let (Some(a), Some(b)) = (lhs.as_const(), rhs.as_const()) {
            return Num::constant(eval_binary(op, a, b), form);
        }
        let lhs = self.builder.materialize(&lhs);
        let rhs = self.builder.materialize(&rhs);
        let dst = self.builder.num_reg();
        self.builder.emit(Instr::Binary { op, dst, lhs, rhs });
        Num::reg(dst, form)
    }

    pub fn unary(&mut self, op: UnaryOp, operand: Num) -> Num {
        let form = match op {
            UnaryOp::Not => Form::LINEAR,
            UnaryOp::Neg => operand.form,
        };
        if let Some(a) = operand.as_const() {
            return Num::constant(eval_unary(op, a), form);
        }
        let src = self.builder.materialize(&operand);
        let dst = self.builder.num_reg();
        self.builder.emit(Instr::Unary { op, dst, src });
        Num::reg(dst, form)
    }

    /// Run the registered converter into `to`, or relabel when none exists.
    pub fn convert(&mut self, num: Num, to: Form, span: Span) -> Num {
        if num.form == to {
            return num;
        }
        let env = self.ctx.convert_env();
        match self.ctx.converters.resolve(&num.form, to.kind, &env) {
            Some(conversion) => self.apply(num, conversion, to),
            None => {
                warn!(
                    "no converter from {} to {} at {span}; relabelling without conversion",
                    num.form, to
                );
                num.with_form(to)
            }
        }
    }

    /// Bring a built-in argument into the parameter's form. Plain linear
    /// numbers are unitless and take the parameter's form as-is.
    pub fn coerce(&mut self, num: Num, kind: FormKind, span: Span) -> Num {
        if num.form.kind == kind {
            num
        } else if num.form.is_linear() {
            num.with_form(Form::new(kind))
        } else {
            self.convert(num, Form::new(kind), span)
        }
    }

    fn apply(&mut self, num: Num, conversion: Conversion, to: Form) -> Num {
        if let Some(value) = num.as_const() {
            return Num::constant(conversion.apply(value), to);
        }
        let src = self.builder.materialize(&num);
        let dst = self.builder.num_reg();
        self.builder.emit(Instr::Convert {
            conversion,
            dst,
            src,
        });
        Num::reg(dst, to)
    }

    fn form(&mut self, literal: &FormLiteral) -> Result<Form, CompileError> {
        let mut params = match literal.kind {
            FormKind::Control => [0.0, 1.0],
            _ => [0.0, 0.0],
        };
        for (param, arg) in params.iter_mut().zip(&literal.args) {
            let num = self.expr(arg)?.expect_num(arg.span)?;
            let value = num.as_const().ok_or_else(|| {
                CompileError::codegen("form parameters must be constant", arg.span)
            })?;
            *param = value.left as f64;
        }
        Ok(Form::with_params(literal.kind, params))
    }

    /// Seed for the next `noise()` instance in this node.
    pub fn noise_seed(&mut self) -> u64 {
        self.noise_count += 1;
        self.ctx.noise_seed_for(self.catalog.salt(), self.noise_count)
    }

    // --- Controls ---

    fn knob_range(&self, name: &str) -> (f64, f64) {
        self.catalog.knob_range(name).unwrap_or((0.0, 1.0))
    }

    fn read_control(&mut self, control: &ControlRef, span: Span) -> Result<Value, CompileError> {
        let key = ControlKey::new(control.name.clone(), control.kind);
        let index = self.builder.control(&key);
        let property = control.property.as_deref().unwrap_or("value");

        match (control.kind, property) {
            (_, "value") => self.control_value(&key, index, span),
            (ControlKind::Knob, "min") => Ok(Value::constant(self.knob_range(&key.name).0 as f32)),
            (ControlKind::Knob, "max") => Ok(Value::constant(self.knob_range(&key.name).1 as f32)),
            (ControlKind::Graph, "size") => Ok(Value::constant(ARRAY_SIZE as f32)),
            (ControlKind::Midi, "count") => {
                let midi = self.control_value(&key, index, span)?.expect_midi(span)?;
                let dst = self.builder.num_reg();
                self.builder.emit(Instr::MidiCount { dst, src: midi.reg });
                Ok(Num::reg(dst, Form::LINEAR).into())
            }
            (kind, other) => Err(CompileError::codegen(
                format!("{} controls have no property '{other}'", kind.name()),
                span,
            )),
        }
    }

    /// Current value of a control: the last write in this node, else a load
    /// from its slot (cached for later reads).
    fn control_value(
        &mut self,
        key: &ControlKey,
        index: u32,
        span: Span,
    ) -> Result<Value, CompileError> {
        if let Some(binding) = self.scope.control(key) {
            return Ok(binding.value.clone());
        }

        let slot = SlotRef::Control(index);
        let value = match key.kind {
            ControlKind::Output => {
                return Err(CompileError::codegen(
                    format!("output '{}' is read before it is written", key.name),
                    span,
                ));
            }
            ControlKind::Knob | ControlKind::Toggle | ControlKind::Num => {
                let form = if key.kind == ControlKind::Knob {
                    let (min, max) = self.knob_range(&key.name);
                    Form::control(min, max)
                } else {
                    Form::LINEAR
                };
                let dst = self.builder.num_reg();
                self.builder.emit(Instr::Load { dst, slot });
                Value::Num(Num::reg(dst, form))
            }
            ControlKind::Midi => {
                let dst = self.builder.midi_reg();
                self.builder.emit(Instr::LoadMidi { dst, slot });
                Value::Midi(Midi { reg: dst })
            }
            ControlKind::Graph => {
                let dst = self.builder.array_reg();
                self.builder.emit(Instr::LoadArray { dst, slot });
                Value::Array(Array {
                    reg: dst,
                    form: Form::LINEAR,
                })
            }
        };

        self.builder.mark_read(index);
        self.scope.cache_control(key, value.clone());
        Ok(value)
    }

    fn write_control(
        &mut self,
        control: &ControlRef,
        value: Value,
        span: Span,
    ) -> Result<(), CompileError> {
        if let Some(property) = control.property.as_deref().filter(|p| *p != "value") {
            return Err(CompileError::codegen(
                format!("property '{property}' of '{}' is read-only", control.name),
                span,
            ));
        }
        if !control.kind.is_writable() {
            return Err(CompileError::codegen(
                format!(
                    "{} '{}' is set from the editor and cannot be assigned",
                    control.kind.name(),
                    control.name
                ),
                span,
            ));
        }

        let key = ControlKey::new(control.name.clone(), control.kind);
        let index = self.builder.control(&key);
        let slot = SlotRef::Control(index);

        match control.kind {
            ControlKind::Midi => {
                let midi = value.clone().expect_midi(span)?;
                self.builder.emit(Instr::StoreMidi { slot, src: midi.reg });
            }
            kind => {
                let num = value.clone().expect_num(span)?;
                if kind == ControlKind::Output && !num.form.is_linear() {
                    return Err(CompileError::type_mismatch(
                        "num[linear]",
                        &value.describe(),
                        span,
                    ));
                }
                let src = self.builder.materialize(&num);
                self.builder.emit(Instr::Store { slot, src });
            }
        }

        self.builder.mark_write(index);
        self.scope.write_control(&key, value);
        Ok(())
    }

    // --- Assignment ---

    fn assign(
        &mut self,
        op: AssignOp,
        target: &Expr,
        value: &Expr,
        span: Span,
    ) -> Result<Value, CompileError> {
        let targets = lvalue_targets(target)?;
        match op {
            AssignOp::Set => {
                let value = self.expr(value)?;
                self.assign_all(targets, value.clone(), span)?;
                Ok(value)
            }
            AssignOp::Compound(bin) => {
                let [single] = targets else {
                    return Err(CompileError::codegen(
                        "compound assignment needs a single target",
                        target.span,
                    ));
                };
                let current = self.expr(single)?.expect_num(single.span)?;
                let rhs = self.expr(value)?.expect_num(value.span)?;
                let result = self.binary(bin, current, rhs);
                self.write_target(single, result.into())?;
                Ok(result.into())
            }
        }
    }

    fn assign_all(&mut self, targets: &[Expr], value: Value, span: Span) -> Result<(), CompileError> {
        if let [single] = targets {
            return self.write_target(single, value);
        }
        match value {
            Value::Tuple(items) => {
                if items.len() != targets.len() {
                    return Err(CompileError::arity_mismatch(targets.len(), items.len(), span));
                }
                for (target, item) in targets.iter().zip(items) {
                    self.write_target(target, item)?;
                }
            }
            broadcast => {
                for target in targets {
                    self.write_target(target, broadcast.clone())?;
                }
            }
        }
        Ok(())
    }

    fn write_target(&mut self, target: &Expr, value: Value) -> Result<(), CompileError> {
        match &target.kind {
            ExprKind::Variable(name) => {
                self.scope.set_var(name, value);
                Ok(())
            }
            ExprKind::Control(control) => self.write_control(control, value, target.span),
            _ => Err(CompileError::codegen("expression is not assignable", target.span)),
        }
    }

    fn postfix(&mut self, op: PostfixOp, target: &Expr) -> Result<Value, CompileError> {
        let targets = lvalue_targets(target)?;
        let bin = match op {
            PostfixOp::Increment => BinaryOp::Add,
            PostfixOp::Decrement => BinaryOp::Sub,
        };
        let mut previous = Vec::with_capacity(targets.len());
        for target in targets {
            let current = self.expr(target)?.expect_num(target.span)?;
            let one = Num::constant(Sample::splat(1.0), current.form);
            let next = self.binary(bin, current, one);
            self.write_target(target, next.into())?;
            previous.push(Value::Num(current));
        }
        if previous.len() == 1 {
            Ok(previous.remove(0))
        } else {
            Ok(Value::Tuple(previous))
        }
    }
}

fn lvalue_targets(target: &Expr) -> Result<&[Expr], CompileError> {
    match &target.kind {
        ExprKind::LValue(targets) => Ok(targets),
        _ => Err(CompileError::codegen("invalid assignment target", target.span)),
    }
}
