//! Language front end integration tests: source → AST → printed source → AST.

use patchwire::codegen::{CompileContext, NoControls};
use patchwire::lang::{Compiler, ErrorKind};

/// One source per expression kind.
const SOURCES: &[&str] = &[
    "x = 1 + 2 * 3 - 4 / 5 % 6",
    "x = 2 ^ 3 ^ 2",
    "x = (1 < 2) && (3 >= 2) || !(1 == 1) & 1 | 0",
    "x = -y",
    "x = 440hz + 2khz",
    "x = -6db * 10ms * 2beats * 64smp * 0.7q",
    "x = C4 + F#3 + A0",
    "(a, b) = (1, 2)",
    "x = ()",
    "x = (1,)",
    "x += 1; x -= 1; x *= 2; x /= 2; x %= 3; x ^= 2; x &= 1; x |= 0",
    "x++; x--",
    "out:output = sine(440hz) * 0.5",
    "x = 2 -> [control 0, 10]",
    "x = [seconds] 2",
    "x = A4 ~> [frequency]",
    "x = \"cut off\":knob.max + gain:knob.min + t:toggle",
    "x = :midi.count + table:graph.size",
    "a = b = c = 1",
    "y = mix(\n  a,\n  b,\n  0.25\n)",
];

#[test]
fn print_then_reparse_is_identical() {
    for src in SOURCES {
        let program = Compiler::parse(src).unwrap_or_else(|e| panic!("{src}: {e}"));
        let printed = program.to_string();
        let reparsed =
            Compiler::parse(&printed).unwrap_or_else(|e| panic!("{printed}: {e}"));
        assert_eq!(program, reparsed, "{src} printed as {printed}");
    }
}

#[test]
fn printing_is_stable() {
    for src in SOURCES {
        let once = Compiler::parse(src).unwrap().to_string();
        let twice = Compiler::parse(&once).unwrap().to_string();
        assert_eq!(once, twice);
    }
}

#[test]
fn errors_carry_kind_and_position() {
    let lex = Compiler::parse("x = 1 $ 2").unwrap_err();
    assert_eq!(lex.kind, ErrorKind::Lex);
    assert_eq!(lex.span.col, 7);

    let parse = Compiler::parse("x = (1 + 2").unwrap_err();
    assert_eq!(parse.kind, ErrorKind::Parse);

    let mut ctx = CompileContext::default();
    let codegen = Compiler::compile("x = 1\nout:output = nowhere", &mut ctx, &NoControls).unwrap_err();
    assert_eq!(codegen.kind, ErrorKind::Codegen);
    assert_eq!(codegen.span.line, 2);
}

#[test]
fn tuple_arity_is_checked() {
    let mut ctx = CompileContext::default();
    let err = Compiler::compile("(a, b, c) = (1, 2)", &mut ctx, &NoControls).unwrap_err();
    assert!(err.message.contains("2 values"), "{}", err.message);
    assert!(err.message.contains("3 targets"), "{}", err.message);

    let code = Compiler::compile("(a, b) = (1, 2)\nout:output = a + b", &mut ctx, &NoControls);
    assert!(code.is_ok());
}

#[test]
fn unknown_function_is_reported() {
    let mut ctx = CompileContext::default();
    let err = Compiler::compile("out:output = wobble(1)", &mut ctx, &NoControls).unwrap_err();
    assert!(err.message.contains("wobble"));
}
