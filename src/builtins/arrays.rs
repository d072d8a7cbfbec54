//! Fixed-size array intrinsics.

use crate::codegen::ir::Instr;
use crate::codegen::Generator;
use crate::lang::error::{CompileError, Span};
use crate::value::{Array, Form, Num, Sample, Value, ARRAY_SIZE};

use super::{Builtin, Catalogue, Param};

pub fn register(catalogue: &mut Catalogue) {
    catalogue.add(Builtin::emit("fill", vec![Param::num("x")], fill));
    catalogue.add(Builtin::emit("sum", vec![Param::array("array")], sum));
    catalogue.add(Builtin::emit(
        "at",
        vec![Param::array("array"), Param::num("index")],
        at,
    ));
}

/// Element `index` of an array, wrapping in both directions.
pub fn wrap_index(index: f32) -> usize {
    let i = index.floor() as i64;
    i.rem_euclid(ARRAY_SIZE as i64) as usize
}

pub fn sum_elements(array: &[Sample; ARRAY_SIZE]) -> Sample {
    array.iter().fold(Sample::SILENT, |acc, x| {
        let lanes = [acc.left + x.left, acc.right + x.right];
        Sample::from_lanes(lanes, acc.active || x.active)
    })
}

fn fill(gen: &mut Generator<'_>, args: Vec<Value>, span: Span) -> Result<Value, CompileError> {
    let mut args = args.into_iter();
    let x = next_num(&mut args, span)?;
    let src = gen.builder.materialize(&x);
    let dst = gen.builder.array_reg();
    gen.builder.emit(Instr::Fill { dst, src });
    Ok(Value::Array(Array { reg: dst, form: x.form }))
}

fn sum(gen: &mut Generator<'_>, args: Vec<Value>, span: Span) -> Result<Value, CompileError> {
    let mut args = args.into_iter();
    let array = next_array(&mut args, span)?;
    let dst = gen.builder.num_reg();
    gen.builder.emit(Instr::Sum { dst, src: array.reg });
    Ok(Num::reg(dst, array.form).into())
}

fn at(gen: &mut Generator<'_>, args: Vec<Value>, span: Span) -> Result<Value, CompileError> {
    let mut args = args.into_iter();
    let array = next_array(&mut args, span)?;
    let index = next_num(&mut args, span)?;
    let index = gen.builder.materialize(&index);
    let dst = gen.builder.num_reg();
    gen.builder.emit(Instr::At {
        dst,
        array: array.reg,
        index,
    });
    Ok(Num::reg(dst, array.form).into())
}

pub(super) fn next_num(
    args: &mut impl Iterator<Item = Value>,
    span: Span,
) -> Result<Num, CompileError> {
    args.next()
        .unwrap_or_else(|| Value::Num(Num::constant(Sample::ZERO, Form::LINEAR)))
        .expect_num(span)
}

fn next_array(
    args: &mut impl Iterator<Item = Value>,
    span: Span,
) -> Result<Array, CompileError> {
    args.next().unwrap_or_else(Value::unit).expect_array(span)
}
