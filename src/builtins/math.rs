//! Pure numeric intrinsics.

use crate::codegen::fold::PureFn;

use super::{Builtin, Catalogue, Param};

pub fn register(catalogue: &mut Catalogue) {
    let unary = [
        ("abs", PureFn::Abs),
        ("floor", PureFn::Floor),
        ("ceil", PureFn::Ceil),
        ("sqrt", PureFn::Sqrt),
        ("exp", PureFn::Exp),
        ("ln", PureFn::Ln),
        ("sin", PureFn::Sin),
        ("cos", PureFn::Cos),
        ("tan", PureFn::Tan),
        ("left", PureFn::Left),
        ("right", PureFn::Right),
        ("mono", PureFn::Mono),
        ("active", PureFn::Active),
    ];
    for (name, func) in unary {
        catalogue.add(Builtin::pure(name, func, vec![Param::num("x")]));
    }

    catalogue.add(Builtin::pure(
        "pow",
        PureFn::Pow,
        vec![Param::num("base"), Param::num("exponent")],
    ));
    catalogue.add(
        Builtin::pure("min", PureFn::Min, vec![Param::num("a"), Param::num("b")])
            .variadic(Param::num("rest")),
    );
    catalogue.add(
        Builtin::pure("max", PureFn::Max, vec![Param::num("a"), Param::num("b")])
            .variadic(Param::num("rest")),
    );
    catalogue.add(Builtin::pure(
        "clamp",
        PureFn::Clamp,
        vec![Param::num("x"), Param::num("lo").or(0.0), Param::num("hi").or(1.0)],
    ));
    catalogue.add(Builtin::pure(
        "mix",
        PureFn::Mix,
        vec![Param::num("a"), Param::num("b"), Param::num("t").or(0.5)],
    ));
    catalogue.add(Builtin::pure(
        "stereo",
        PureFn::Stereo,
        vec![Param::num("left"), Param::num("right")],
    ));
    catalogue.add(Builtin::pure(
        "pan",
        PureFn::Pan,
        vec![Param::num("x"), Param::num("position").or(0.0)],
    ));
    catalogue.add(Builtin::pure(
        "gate",
        PureFn::Gate,
        vec![Param::num("x"), Param::num("gate")],
    ));
}

#[cfg(test)]
mod tests {
    use crate::codegen::{CompileContext, Instr, NoControls, NodeCode};
    use crate::lang::Compiler;

    fn compile(src: &str) -> NodeCode {
        let mut ctx = CompileContext::default();
        Compiler::compile(src, &mut ctx, &NoControls).unwrap()
    }

    fn folded(src: &str) -> [f32; 2] {
        let code = compile(src);
        match code.instrs.first() {
            Some(Instr::Const { value, .. }) => value.lanes(),
            other => panic!("expected constant, got {other:?}"),
        }
    }

    #[test]
    fn defaults_fill_in() {
        assert_eq!(folded("out:output = clamp(4)"), [1.0, 1.0]);
        assert_eq!(folded("out:output = mix(2, 4)"), [3.0, 3.0]);
    }

    #[test]
    fn stereo_helpers() {
        assert_eq!(folded("out:output = stereo(1, 2)"), [1.0, 2.0]);
        assert_eq!(folded("out:output = mono(stereo(1, 3))"), [2.0, 2.0]);
        assert_eq!(folded("out:output = right(stereo(1, 3))"), [3.0, 3.0]);
    }

    #[test]
    fn form_of_first_argument_is_kept() {
        // abs keeps [frequency], which an output rejects
        let mut ctx = CompileContext::default();
        assert!(Compiler::compile("out:output = abs(440hz)", &mut ctx, &NoControls).is_err());
        assert!(Compiler::compile("out:output = sqrt(440hz)", &mut ctx, &NoControls).is_ok());
    }
}
