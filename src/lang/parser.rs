//! Parser for the patch language.
//!
//! Precedence climbing over a lazily lexed token stream. Each statement is
//! one expression; statements end at a newline, `;` or end of input.
//! Newlines inside `(...)` and `[...]` are insignificant.

use crate::value::form::FormKind;

use super::ast::*;
use super::error::{CompileError, Span};
use super::lexer::Lexer;
use super::token::{Token, TokenKind};

pub struct Parser {
    lexer: Lexer,
    /// Bracket nesting depth; newlines are skipped while > 0.
    depth: usize,
    last_span: Span,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Self {
            lexer: Lexer::new(source),
            depth: 0,
            last_span: Span::default(),
        }
    }

    pub fn parse_program(&mut self) -> Result<Program, CompileError> {
        let mut statements = Vec::new();
        loop {
            self.skip_separators()?;
            if self.check(&TokenKind::Eof)? {
                break;
            }
            statements.push(self.parse_expression(Precedence::Lowest)?);

            let token = self.peek()?;
            match token.kind {
                TokenKind::Newline | TokenKind::Semicolon | TokenKind::Eof => {}
                other => {
                    return Err(CompileError::parse(
                        format!("expected end of statement, found {other}"),
                        token.span,
                    ));
                }
            }
        }
        Ok(Program { statements })
    }

    /// Parse an expression, folding operators that bind tighter than `max`.
    pub fn parse_expression(&mut self, max: Precedence) -> Result<Expr, CompileError> {
        let mut expr = self.parse_prefix()?;
        loop {
            let (folded, progressed) = self.fold_operator(expr, max)?;
            expr = folded;
            if !progressed {
                return Ok(expr);
            }
        }
    }

    // --- Token plumbing ---

    fn peek(&mut self) -> Result<Token, CompileError> {
        loop {
            let skip = self.depth > 0 && self.lexer.peek()?.kind == TokenKind::Newline;
            if !skip {
                return self.lexer.peek().cloned();
            }
            self.lexer.next_token()?;
        }
    }

    fn advance(&mut self) -> Result<Token, CompileError> {
        self.peek()?;
        let token = self.lexer.next_token()?;
        self.last_span = token.span;
        Ok(token)
    }

    fn check(&mut self, kind: &TokenKind) -> Result<bool, CompileError> {
        Ok(&self.peek()?.kind == kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> Result<bool, CompileError> {
        if self.check(kind)? {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, CompileError> {
        let token = self.peek()?;
        if token.kind == kind {
            self.advance()
        } else {
            Err(CompileError::parse(
                format!("expected {kind}, found {}", token.kind),
                token.span,
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<(String, Span), CompileError> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::Ident(name) => Ok((name, token.span)),
            other => Err(CompileError::parse(
                format!("expected identifier, found {other}"),
                token.span,
            )),
        }
    }

    fn skip_separators(&mut self) -> Result<(), CompileError> {
        while matches!(self.peek()?.kind, TokenKind::Newline | TokenKind::Semicolon) {
            self.advance()?;
        }
        Ok(())
    }

    fn span_from(&self, start: Span) -> Span {
        start.to(self.last_span)
    }

    // --- Prefix terms ---

    fn parse_prefix(&mut self) -> Result<Expr, CompileError> {
        let token = self.advance()?;
        let start = token.span;
        match token.kind {
            TokenKind::Number { value, unit } => {
                Ok(Expr::new(ExprKind::Number { value, unit }, start))
            }
            TokenKind::Note(note) => Ok(Expr::new(ExprKind::Note(note), start)),
            TokenKind::Quoted(name) => {
                let kind = if self.eat(&TokenKind::Colon)? {
                    self.parse_control_kind()?
                } else {
                    ControlKind::Knob
                };
                self.finish_control(name, kind, start)
            }
            TokenKind::Colon => {
                let kind = self.parse_control_kind()?;
                self.finish_control(kind.name().to_string(), kind, start)
            }
            TokenKind::Ident(name) => {
                if self.eat(&TokenKind::Colon)? {
                    let kind = self.parse_control_kind()?;
                    self.finish_control(name, kind, start)
                } else if self.check(&TokenKind::LParen)? {
                    let args = self.parse_parenthesized()?;
                    Ok(Expr::new(ExprKind::Call { name, args }, self.span_from(start)))
                } else {
                    Ok(Expr::new(ExprKind::Variable(name), start))
                }
            }
            TokenKind::LParen => {
                self.depth += 1;
                let items = self.parse_list(TokenKind::RParen)?;
                self.depth -= 1;
                self.expect(TokenKind::RParen)?;
                let span = self.span_from(start);
                match items {
                    Items { mut exprs, trailing_comma: false } if exprs.len() == 1 => {
                        Ok(exprs.remove(0))
                    }
                    Items { exprs, .. } => Ok(Expr::new(ExprKind::Tuple(exprs), span)),
                }
            }
            TokenKind::LBracket => {
                let form = self.parse_form_body()?;
                let expr = self.parse_expression(Precedence::Cast)?;
                let span = self.span_from(start);
                Ok(Expr::new(
                    ExprKind::Cast {
                        expr: Box::new(expr),
                        form,
                    },
                    span,
                ))
            }
            TokenKind::Minus => self.parse_unary(UnaryOp::Neg, start),
            TokenKind::Bang => self.parse_unary(UnaryOp::Not, start),
            other => Err(CompileError::parse(
                format!("expected an expression, found {other}"),
                start,
            )),
        }
    }

    fn parse_unary(&mut self, op: UnaryOp, start: Span) -> Result<Expr, CompileError> {
        let operand = self.parse_expression(Precedence::Cast)?;
        Ok(Expr::new(
            ExprKind::Unary {
                op,
                expr: Box::new(operand),
            },
            self.span_from(start),
        ))
    }

    fn parse_control_kind(&mut self) -> Result<ControlKind, CompileError> {
        let (name, span) = self.expect_ident()?;
        ControlKind::from_name(&name).ok_or_else(|| {
            CompileError::parse(format!("unknown control kind '{name}'"), span)
        })
    }

    fn finish_control(
        &mut self,
        name: String,
        kind: ControlKind,
        start: Span,
    ) -> Result<Expr, CompileError> {
        let property = if self.eat(&TokenKind::Dot)? {
            Some(self.expect_ident()?.0)
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::Control(ControlRef {
                name,
                kind,
                property,
            }),
            self.span_from(start),
        ))
    }

    /// `( a, b, ... )` for call arguments.
    fn parse_parenthesized(&mut self) -> Result<Vec<Expr>, CompileError> {
        self.expect(TokenKind::LParen)?;
        self.depth += 1;
        let items = self.parse_list(TokenKind::RParen)?;
        self.depth -= 1;
        self.expect(TokenKind::RParen)?;
        Ok(items.exprs)
    }

    /// Comma separated expressions up to (not including) `close`.
    fn parse_list(&mut self, close: TokenKind) -> Result<Items, CompileError> {
        let mut exprs = Vec::new();
        let mut trailing_comma = false;
        while !self.check(&close)? {
            exprs.push(self.parse_expression(Precedence::Lowest)?);
            trailing_comma = self.eat(&TokenKind::Comma)?;
            if !trailing_comma {
                break;
            }
        }
        Ok(Items {
            exprs,
            trailing_comma,
        })
    }

    /// The part of a form literal after `[`: `kind arg, ... ]`.
    fn parse_form_body(&mut self) -> Result<FormLiteral, CompileError> {
        self.depth += 1;
        let (name, span) = self.expect_ident()?;
        let kind = FormKind::from_name(&name)
            .ok_or_else(|| CompileError::parse(format!("unknown form '{name}'"), span))?;
        let items = self.parse_list(TokenKind::RBracket)?;
        self.depth -= 1;
        self.expect(TokenKind::RBracket)?;
        if items.exprs.len() > 2 {
            return Err(CompileError::parse(
                format!("form '{name}' takes at most 2 parameters"),
                self.span_from(span),
            ));
        }
        Ok(FormLiteral {
            kind,
            args: items.exprs,
        })
    }

    // --- Operators ---

    /// Try to fold one operator into `lhs`. Returns whether anything was folded.
    fn fold_operator(&mut self, lhs: Expr, max: Precedence) -> Result<(Expr, bool), CompileError> {
        let token = self.peek()?;
        let start = lhs.span;

        if let Some(op) = binary_op(&token.kind) {
            let precedence = op.precedence();
            if precedence >= max {
                return Ok((lhs, false));
            }
            self.advance()?;
            let limit = if op.is_right_assoc() {
                precedence.looser()
            } else {
                precedence
            };
            let rhs = self.parse_expression(limit)?;
            let span = self.span_from(start);
            let expr = Expr::new(
                ExprKind::Math {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
            return Ok((expr, true));
        }

        if let Some(op) = assign_op(&token.kind) {
            if Precedence::Assignment >= max {
                return Ok((lhs, false));
            }
            self.advance()?;
            let target = into_lvalue(lhs, token.span)?;
            let value = self.parse_expression(Precedence::Assignment.looser())?;
            let span = self.span_from(start);
            let expr = Expr::new(
                ExprKind::Assign {
                    op,
                    target: Box::new(target),
                    value: Box::new(value),
                },
                span,
            );
            return Ok((expr, true));
        }

        match token.kind {
            TokenKind::PlusPlus | TokenKind::MinusMinus if Precedence::Unary < max => {
                self.advance()?;
                let op = if token.kind == TokenKind::PlusPlus {
                    PostfixOp::Increment
                } else {
                    PostfixOp::Decrement
                };
                let target = into_lvalue(lhs, token.span)?;
                let span = self.span_from(start);
                let expr = Expr::new(
                    ExprKind::Postfix {
                        op,
                        target: Box::new(target),
                    },
                    span,
                );
                Ok((expr, true))
            }
            TokenKind::Arrow | TokenKind::Squiggle if Precedence::Cast < max => {
                self.advance()?;
                self.expect(TokenKind::LBracket)?;
                let form = self.parse_form_body()?;
                let span = self.span_from(start);
                let expr = Box::new(lhs);
                let kind = if token.kind == TokenKind::Arrow {
                    ExprKind::Cast { expr, form }
                } else {
                    ExprKind::Convert { expr, form }
                };
                Ok((Expr::new(kind, span), true))
            }
            _ => Ok((lhs, false)),
        }
    }
}

struct Items {
    exprs: Vec<Expr>,
    trailing_comma: bool,
}

fn binary_op(kind: &TokenKind) -> Option<BinaryOp> {
    Some(match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Star => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        TokenKind::Caret => BinaryOp::Pow,
        TokenKind::Amp => BinaryOp::BitAnd,
        TokenKind::Pipe => BinaryOp::BitOr,
        TokenKind::Tilde => BinaryOp::BitXor,
        TokenKind::AmpAmp => BinaryOp::And,
        TokenKind::PipePipe => BinaryOp::Or,
        TokenKind::EqEq => BinaryOp::Eq,
        TokenKind::BangEq => BinaryOp::Ne,
        TokenKind::Lt => BinaryOp::Lt,
        TokenKind::Gt => BinaryOp::Gt,
        TokenKind::Le => BinaryOp::Le,
        TokenKind::Ge => BinaryOp::Ge,
        _ => return None,
    })
}

fn assign_op(kind: &TokenKind) -> Option<AssignOp> {
    Some(match kind {
        TokenKind::Eq => AssignOp::Set,
        TokenKind::PlusEq => AssignOp::Compound(BinaryOp::Add),
        TokenKind::MinusEq => AssignOp::Compound(BinaryOp::Sub),
        TokenKind::StarEq => AssignOp::Compound(BinaryOp::Mul),
        TokenKind::SlashEq => AssignOp::Compound(BinaryOp::Div),
        TokenKind::PercentEq => AssignOp::Compound(BinaryOp::Mod),
        TokenKind::CaretEq => AssignOp::Compound(BinaryOp::Pow),
        TokenKind::AmpEq => AssignOp::Compound(BinaryOp::BitAnd),
        TokenKind::PipeEq => AssignOp::Compound(BinaryOp::BitOr),
        _ => return None,
    })
}

/// Validate an assignment target and wrap it as an [`ExprKind::LValue`].
fn into_lvalue(expr: Expr, op_span: Span) -> Result<Expr, CompileError> {
    let span = expr.span;
    let targets = match expr.kind {
        ExprKind::LValue(targets) => targets,
        ExprKind::Variable(_) | ExprKind::Control(_) => vec![expr],
        ExprKind::Tuple(items) if !items.is_empty() => {
            if let Some(bad) = items.iter().find(|item| !item.is_assignable()) {
                return Err(CompileError::parse(
                    "tuple targets must be variables or controls",
                    bad.span,
                ));
            }
            items
        }
        _ => {
            return Err(CompileError::parse(
                "left side of assignment is not assignable",
                span.to(op_span),
            ));
        }
    };
    Ok(Expr::new(ExprKind::LValue(targets), span))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::error::ErrorKind;

    fn parse(src: &str) -> Program {
        Parser::new(src).parse_program().unwrap()
    }

    fn parse_one(src: &str) -> Expr {
        let mut program = parse(src);
        assert_eq!(program.statements.len(), 1, "{src}");
        program.statements.remove(0)
    }

    fn var(name: &str) -> Expr {
        Expr::new(ExprKind::Variable(name.into()), Span::default())
    }

    fn num(value: f64) -> Expr {
        Expr::new(ExprKind::Number { value, unit: None }, Span::default())
    }

    fn math(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
        Expr::new(
            ExprKind::Math {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            Span::default(),
        )
    }

    #[test]
    fn multiply_binds_tighter_than_add() {
        assert_eq!(
            parse_one("a + b * c"),
            math(BinaryOp::Add, var("a"), math(BinaryOp::Mul, var("b"), var("c")))
        );
    }

    #[test]
    fn subtraction_is_left_associative() {
        assert_eq!(
            parse_one("a - b - c"),
            math(BinaryOp::Sub, math(BinaryOp::Sub, var("a"), var("b")), var("c"))
        );
    }

    #[test]
    fn power_is_right_associative() {
        assert_eq!(
            parse_one("a ^ b ^ c"),
            math(BinaryOp::Pow, var("a"), math(BinaryOp::Pow, var("b"), var("c")))
        );
    }

    #[test]
    fn unary_binds_tightest() {
        let expr = parse_one("-a * b");
        let ExprKind::Math { op, lhs, .. } = expr.kind else {
            panic!("expected math");
        };
        assert_eq!(op, BinaryOp::Mul);
        assert!(matches!(lhs.kind, ExprKind::Unary { op: UnaryOp::Neg, .. }));
    }

    #[test]
    fn assignment_is_right_associative() {
        let expr = parse_one("a = b = 1");
        let ExprKind::Assign { value, .. } = expr.kind else {
            panic!("expected assignment");
        };
        assert!(matches!(value.kind, ExprKind::Assign { .. }));
    }

    #[test]
    fn compound_assignment_is_distinct() {
        let expr = parse_one("x += 2");
        assert!(matches!(
            expr.kind,
            ExprKind::Assign {
                op: AssignOp::Compound(BinaryOp::Add),
                ..
            }
        ));
    }

    #[test]
    fn tuple_destructuring_target() {
        let expr = parse_one("(a, \"b\":num) = (1, 2)");
        let ExprKind::Assign { target, value, .. } = expr.kind else {
            panic!("expected assignment");
        };
        let ExprKind::LValue(targets) = target.kind else {
            panic!("expected lvalue");
        };
        assert_eq!(targets.len(), 2);
        assert!(matches!(value.kind, ExprKind::Tuple(ref items) if items.len() == 2));
    }

    #[test]
    fn single_element_parens_degrade() {
        assert_eq!(parse_one("(a)"), var("a"));
        assert!(matches!(parse_one("(a,)").kind, ExprKind::Tuple(ref v) if v.len() == 1));
        assert!(matches!(parse_one("()").kind, ExprKind::Tuple(ref v) if v.is_empty()));
    }

    #[test]
    fn assigning_to_call_is_parse_error() {
        let err = Parser::new("sine(1) = 2").parse_program().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        let err = Parser::new("(a, 1) = 2").parse_program().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        let err = Parser::new("3++").parse_program().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
    }

    #[test]
    fn control_references() {
        let ExprKind::Control(c) = parse_one("\"cutoff\"").kind else {
            panic!("expected control");
        };
        assert_eq!(c.kind, ControlKind::Knob);

        let ExprKind::Control(c) = parse_one("gain:knob.min").kind else {
            panic!("expected control");
        };
        assert_eq!(c.name, "gain");
        assert_eq!(c.property.as_deref(), Some("min"));

        let ExprKind::Control(c) = parse_one(":midi").kind else {
            panic!("expected control");
        };
        assert_eq!(c.name, "midi");
        assert_eq!(c.kind, ControlKind::Midi);
    }

    #[test]
    fn unknown_control_kind() {
        let err = Parser::new("x:slider").parse_program().unwrap_err();
        assert!(err.message.contains("slider"));
    }

    #[test]
    fn casts_and_conversions() {
        let ExprKind::Cast { form, .. } = parse_one("x->[control 20, 2000]").kind else {
            panic!("expected cast");
        };
        assert_eq!(form.kind, FormKind::Control);
        assert_eq!(form.args, vec![num(20.0), num(2000.0)]);

        assert!(matches!(parse_one("C4~>[frequency]").kind, ExprKind::Convert { .. }));
        assert!(matches!(parse_one("[seconds] 2").kind, ExprKind::Cast { .. }));
    }

    #[test]
    fn unknown_form_is_parse_error() {
        let err = Parser::new("x->[volts]").parse_program().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
    }

    #[test]
    fn statements_split_on_newlines_and_semicolons() {
        let program = parse("a = 1; b = 2\n\n// comment\nc = a + b\n");
        assert_eq!(program.statements.len(), 3);
    }

    #[test]
    fn newlines_inside_parens_are_ignored() {
        let program = parse("x = mix(\n  a,\n  b,\n  0.5\n)");
        assert_eq!(program.statements.len(), 1);
    }

    #[test]
    fn missing_paren_reports_position() {
        let err = Parser::new("x = (1 + 2").parse_program().unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert_eq!(err.span.line, 1);
    }

    #[test]
    fn spans_cover_whole_expression() {
        let expr = parse_one("a + b");
        assert_eq!(expr.span.start, 0);
        assert_eq!(expr.span.end, 5);
    }
}
