//! Abstract Syntax Tree for the patch language.
//!
//! Every node owns its children and carries the span it was parsed from.
//! Equality is structural: spans are diagnostic metadata and are ignored.

use crate::value::form::FormKind;

use super::error::Span;

/// A parsed node source: one expression statement per line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Expr>,
}

/// An expression with its source span.
#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Whether this expression may appear as an assignment target.
    pub fn is_assignable(&self) -> bool {
        matches!(self.kind, ExprKind::Variable(_) | ExprKind::Control(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Number { value: f64, unit: Option<Unit> },
    Note(u8),
    Tuple(Vec<Expr>),
    Call { name: String, args: Vec<Expr> },
    /// `expr->[form]` or `[form] expr`: relabel the form only.
    Cast { expr: Box<Expr>, form: FormLiteral },
    /// `expr~>[form]`: run the registered converter.
    Convert { expr: Box<Expr>, form: FormLiteral },
    Control(ControlRef),
    Variable(String),
    Math { op: BinaryOp, lhs: Box<Expr>, rhs: Box<Expr> },
    Unary { op: UnaryOp, expr: Box<Expr> },
    /// `target` is always an [`ExprKind::LValue`].
    Assign { op: AssignOp, target: Box<Expr>, value: Box<Expr> },
    /// `target` is always an [`ExprKind::LValue`].
    Postfix { op: PostfixOp, target: Box<Expr> },
    /// Ordered assignable targets; more than one for tuple destructuring.
    LValue(Vec<Expr>),
}

/// Unit suffix on a numeric literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Hz,
    Db,
    Seconds,
    Beats,
    Samples,
    Q,
}

impl Unit {
    pub fn from_suffix(suffix: &str) -> Option<Unit> {
        match suffix {
            "hz" => Some(Unit::Hz),
            "db" => Some(Unit::Db),
            "s" => Some(Unit::Seconds),
            "beats" => Some(Unit::Beats),
            "smp" => Some(Unit::Samples),
            "q" => Some(Unit::Q),
            _ => None,
        }
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Unit::Hz => "hz",
            Unit::Db => "db",
            Unit::Seconds => "s",
            Unit::Beats => "beats",
            Unit::Samples => "smp",
            Unit::Q => "q",
        }
    }

    pub fn form(self) -> FormKind {
        match self {
            Unit::Hz => FormKind::Frequency,
            Unit::Db => FormKind::Decibel,
            Unit::Seconds => FormKind::Seconds,
            Unit::Beats => FormKind::Beats,
            Unit::Samples => FormKind::Samples,
            Unit::Q => FormKind::Q,
        }
    }
}

/// `[kind arg, ...]`
#[derive(Debug, Clone, PartialEq)]
pub struct FormLiteral {
    pub kind: FormKind,
    pub args: Vec<Expr>,
}

/// Reference to a control: `"name":kind.property`.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlRef {
    pub name: String,
    pub kind: ControlKind,
    pub property: Option<String>,
}

/// What a control is for; decides its storage class and properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlKind {
    /// UI-editable value in 0..1 mapped onto a range.
    Knob,
    /// UI-editable on/off.
    Toggle,
    /// Numeric wire between nodes.
    Num,
    /// MIDI event stream.
    Midi,
    /// Audio sent to the host.
    Output,
    /// UI-editable breakpoint table.
    Graph,
}

impl ControlKind {
    pub fn from_name(name: &str) -> Option<ControlKind> {
        match name {
            "knob" => Some(ControlKind::Knob),
            "toggle" => Some(ControlKind::Toggle),
            "num" => Some(ControlKind::Num),
            "midi" => Some(ControlKind::Midi),
            "output" => Some(ControlKind::Output),
            "graph" => Some(ControlKind::Graph),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ControlKind::Knob => "knob",
            ControlKind::Toggle => "toggle",
            ControlKind::Num => "num",
            ControlKind::Midi => "midi",
            ControlKind::Output => "output",
            ControlKind::Graph => "graph",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl BinaryOp {
    pub fn precedence(self) -> Precedence {
        match self {
            BinaryOp::And | BinaryOp::Or => Precedence::Logical,
            BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::Lt
            | BinaryOp::Gt
            | BinaryOp::Le
            | BinaryOp::Ge => Precedence::Equality,
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => Precedence::Bitwise,
            BinaryOp::Add => Precedence::Add,
            BinaryOp::Sub => Precedence::Subtract,
            BinaryOp::Mul => Precedence::Multiply,
            BinaryOp::Div => Precedence::Divide,
            BinaryOp::Mod => Precedence::Modulo,
            BinaryOp::Pow => Precedence::Power,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "^",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "~",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
        }
    }

    pub fn is_right_assoc(self) -> bool {
        self == BinaryOp::Pow
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

/// `=` overwrites; compound forms read-modify-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Compound(BinaryOp),
}

impl AssignOp {
    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::Compound(BinaryOp::Add) => "+=",
            AssignOp::Compound(BinaryOp::Sub) => "-=",
            AssignOp::Compound(BinaryOp::Mul) => "*=",
            AssignOp::Compound(BinaryOp::Div) => "/=",
            AssignOp::Compound(BinaryOp::Mod) => "%=",
            AssignOp::Compound(BinaryOp::Pow) => "^=",
            AssignOp::Compound(BinaryOp::BitAnd) => "&=",
            AssignOp::Compound(BinaryOp::BitOr) => "|=",
            AssignOp::Compound(_) => "=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
    Increment,
    Decrement,
}

impl PostfixOp {
    pub fn symbol(self) -> &'static str {
        match self {
            PostfixOp::Increment => "++",
            PostfixOp::Decrement => "--",
        }
    }
}

/// Binding strength, tightest first. An operator folds into the current
/// expression only when its precedence is strictly below the caller's limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    Unary = 0,
    Cast,
    Power,
    Modulo,
    Divide,
    Multiply,
    Subtract,
    Add,
    Bitwise,
    Equality,
    Logical,
    Assignment,
    Lowest,
}

impl Precedence {
    /// The limit that lets operators of this level fold again (right associativity).
    pub fn looser(self) -> Precedence {
        match self {
            Precedence::Unary => Precedence::Cast,
            Precedence::Cast => Precedence::Power,
            Precedence::Power => Precedence::Modulo,
            Precedence::Modulo => Precedence::Divide,
            Precedence::Divide => Precedence::Multiply,
            Precedence::Multiply => Precedence::Subtract,
            Precedence::Subtract => Precedence::Add,
            Precedence::Add => Precedence::Bitwise,
            Precedence::Bitwise => Precedence::Equality,
            Precedence::Equality => Precedence::Logical,
            Precedence::Logical => Precedence::Assignment,
            Precedence::Assignment | Precedence::Lowest => Precedence::Lowest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_order_loosest_to_tightest() {
        let order = [
            Precedence::Assignment,
            Precedence::Logical,
            Precedence::Equality,
            Precedence::Bitwise,
            Precedence::Add,
            Precedence::Subtract,
            Precedence::Multiply,
            Precedence::Divide,
            Precedence::Modulo,
            Precedence::Power,
            Precedence::Cast,
            Precedence::Unary,
        ];
        for pair in order.windows(2) {
            assert!(pair[0] > pair[1], "{:?} should be looser than {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn equality_ignores_spans() {
        let a = Expr::new(ExprKind::Variable("x".into()), Span::new(0, 1, 1, 1));
        let b = Expr::new(ExprKind::Variable("x".into()), Span::new(5, 6, 2, 1));
        assert_eq!(a, b);
    }

    #[test]
    fn unit_suffixes_round_trip() {
        for unit in [Unit::Hz, Unit::Db, Unit::Seconds, Unit::Beats, Unit::Samples, Unit::Q] {
            assert_eq!(Unit::from_suffix(unit.suffix()), Some(unit));
        }
    }

    #[test]
    fn control_kind_names_round_trip() {
        for kind in [
            ControlKind::Knob,
            ControlKind::Toggle,
            ControlKind::Num,
            ControlKind::Midi,
            ControlKind::Output,
            ControlKind::Graph,
        ] {
            assert_eq!(ControlKind::from_name(kind.name()), Some(kind));
        }
    }
}
