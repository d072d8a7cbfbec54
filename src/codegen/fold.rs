//! Evaluation of pure operations.
//!
//! The code generator folds constants with these functions and the machine
//! executes the same functions at runtime, so folded and runtime results are
//! identical.

use crate::lang::ast::{BinaryOp, UnaryOp};
use crate::value::Sample;

fn truth(x: bool) -> f32 {
    if x {
        1.0
    } else {
        0.0
    }
}

fn bits(x: f32) -> i32 {
    x as i32
}

/// Evaluate a binary operator lane by lane.
pub fn eval_binary(op: BinaryOp, a: Sample, b: Sample) -> Sample {
    match op {
        BinaryOp::Add => a.zip(b, |x, y| x + y),
        BinaryOp::Sub => a.zip(b, |x, y| x - y),
        BinaryOp::Mul => a.zip(b, |x, y| x * y),
        BinaryOp::Div => a.zip(b, |x, y| x / y),
        BinaryOp::Mod => a.zip(b, |x, y| x % y),
        BinaryOp::Pow => a.zip(b, f32::powf),
        BinaryOp::BitAnd => a.zip(b, |x, y| (bits(x) & bits(y)) as f32),
        BinaryOp::BitOr => a.zip(b, |x, y| (bits(x) | bits(y)) as f32),
        BinaryOp::BitXor => a.zip(b, |x, y| (bits(x) ^ bits(y)) as f32),
        BinaryOp::And => logical(a, b, |x, y| x != 0.0 && y != 0.0),
        BinaryOp::Or => logical(a, b, |x, y| x != 0.0 || y != 0.0),
        BinaryOp::Eq => logical(a, b, |x, y| x == y),
        BinaryOp::Ne => logical(a, b, |x, y| x != y),
        BinaryOp::Lt => logical(a, b, |x, y| x < y),
        BinaryOp::Gt => logical(a, b, |x, y| x > y),
        BinaryOp::Le => logical(a, b, |x, y| x <= y),
        BinaryOp::Ge => logical(a, b, |x, y| x >= y),
    }
}

/// Boolean lanes; the result is active when either lane is true.
fn logical(a: Sample, b: Sample, f: impl Fn(f32, f32) -> bool) -> Sample {
    let left = f(a.left, b.left);
    let right = f(a.right, b.right);
    Sample {
        left: truth(left),
        right: truth(right),
        active: left || right,
    }
}

pub fn eval_unary(op: UnaryOp, a: Sample) -> Sample {
    match op {
        UnaryOp::Neg => a.map(|x| -x),
        UnaryOp::Not => a.map(|x| truth(x == 0.0)),
    }
}

/// Pure intrinsics. Every one is lane-wise except the stereo helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PureFn {
    Abs,
    Floor,
    Ceil,
    Sqrt,
    Exp,
    Ln,
    Sin,
    Cos,
    Tan,
    Pow,
    Min,
    Max,
    Clamp,
    Mix,
    Left,
    Right,
    Mono,
    Stereo,
    Pan,
    Active,
    Gate,
}

impl PureFn {
    pub fn arity(self) -> usize {
        match self {
            PureFn::Abs
            | PureFn::Floor
            | PureFn::Ceil
            | PureFn::Sqrt
            | PureFn::Exp
            | PureFn::Ln
            | PureFn::Sin
            | PureFn::Cos
            | PureFn::Tan
            | PureFn::Left
            | PureFn::Right
            | PureFn::Mono
            | PureFn::Active => 1,
            PureFn::Pow | PureFn::Min | PureFn::Max | PureFn::Stereo | PureFn::Pan | PureFn::Gate => 2,
            PureFn::Clamp | PureFn::Mix => 3,
        }
    }

    /// Whether the result keeps the first argument's form.
    pub fn keeps_form(self) -> bool {
        !matches!(
            self,
            PureFn::Sqrt
                | PureFn::Exp
                | PureFn::Ln
                | PureFn::Sin
                | PureFn::Cos
                | PureFn::Tan
                | PureFn::Pow
                | PureFn::Active
        )
    }

    /// Evaluate with `args[..self.arity()]`.
    pub fn eval(self, args: [Sample; 3]) -> Sample {
        let [a, b, c] = args;
        match self {
            PureFn::Abs => a.map(f32::abs),
            PureFn::Floor => a.map(f32::floor),
            PureFn::Ceil => a.map(f32::ceil),
            PureFn::Sqrt => a.map(f32::sqrt),
            PureFn::Exp => a.map(f32::exp),
            PureFn::Ln => a.map(f32::ln),
            PureFn::Sin => a.map(f32::sin),
            PureFn::Cos => a.map(f32::cos),
            PureFn::Tan => a.map(f32::tan),
            PureFn::Pow => a.zip(b, f32::powf),
            PureFn::Min => a.zip(b, f32::min),
            PureFn::Max => a.zip(b, f32::max),
            PureFn::Clamp => {
                let lo = a.zip(b, f32::max);
                let clamped = lo.zip(c, f32::min);
                clamped.with_active(a.active)
            }
            PureFn::Mix => {
                let lanes = [
                    a.left + (b.left - a.left) * c.left,
                    a.right + (b.right - a.right) * c.right,
                ];
                Sample::from_lanes(lanes, a.active && b.active && c.active)
            }
            PureFn::Left => Sample::from_lanes([a.left, a.left], a.active),
            PureFn::Right => Sample::from_lanes([a.right, a.right], a.active),
            PureFn::Mono => {
                let mid = (a.left + a.right) * 0.5;
                Sample::from_lanes([mid, mid], a.active)
            }
            PureFn::Stereo => Sample::from_lanes([a.left, b.right], a.active && b.active),
            PureFn::Pan => {
                // Equal-power: -1 hard left, 1 hard right.
                let p = (b.left.clamp(-1.0, 1.0) + 1.0) * std::f32::consts::FRAC_PI_4;
                Sample::from_lanes([a.left * p.cos(), a.right * p.sin()], a.active)
            }
            PureFn::Active => Sample::splat(truth(a.active)),
            PureFn::Gate => a.with_active(b.left != 0.0 || b.right != 0.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn comparison_sets_active_from_lanes() {
        let a = Sample::stereo(1.0, 0.0);
        let b = Sample::splat(0.5);
        let gt = eval_binary(BinaryOp::Gt, a, b);
        assert_eq!(gt.lanes(), [1.0, 0.0]);
        assert!(gt.active);

        let none = eval_binary(BinaryOp::Lt, Sample::splat(2.0), b);
        assert_eq!(none.lanes(), [0.0, 0.0]);
        assert!(!none.active);
    }

    #[test]
    fn bitwise_truncates_to_integers() {
        let r = eval_binary(BinaryOp::BitAnd, Sample::splat(6.7), Sample::splat(3.2));
        assert_eq!(r.lanes(), [2.0, 2.0]);
        let r = eval_binary(BinaryOp::BitXor, Sample::splat(5.0), Sample::splat(1.0));
        assert_eq!(r.lanes(), [4.0, 4.0]);
    }

    #[test]
    fn arithmetic_active_needs_both() {
        let r = eval_binary(BinaryOp::Add, Sample::splat(1.0), Sample::SILENT);
        assert!(!r.active);
    }

    #[test]
    fn not_is_logical() {
        let r = eval_unary(UnaryOp::Not, Sample::stereo(0.0, 3.0));
        assert_eq!(r.lanes(), [1.0, 0.0]);
    }

    #[test]
    fn pan_centre_is_equal_power() {
        let r = PureFn::Pan.eval([Sample::splat(1.0), Sample::splat(0.0), Sample::ZERO]);
        assert_approx_eq!(r.left, r.right);
        assert_approx_eq!(r.left, std::f32::consts::FRAC_1_SQRT_2);
    }

    #[test]
    fn clamp_and_mix() {
        let x = PureFn::Clamp.eval([Sample::splat(3.0), Sample::splat(0.0), Sample::splat(1.0)]);
        assert_eq!(x.lanes(), [1.0, 1.0]);
        let m = PureFn::Mix.eval([Sample::splat(0.0), Sample::splat(10.0), Sample::splat(0.25)]);
        assert_eq!(m.lanes(), [2.5, 2.5]);
    }

    #[test]
    fn gate_sets_active() {
        let off = PureFn::Gate.eval([Sample::splat(1.0), Sample::splat(0.0), Sample::ZERO]);
        assert!(!off.active);
        let on = PureFn::Gate.eval([Sample::splat(1.0), Sample::stereo(0.0, 1.0), Sample::ZERO]);
        assert!(on.active);
    }
}
