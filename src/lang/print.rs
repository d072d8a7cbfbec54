//! Source printer. Output is fully parenthesized so that it parses back
//! into the same tree regardless of precedence.

use std::fmt;

use super::ast::*;
use super::note::note_name;

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for statement in &self.statements {
            writeln!(f, "{statement}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Number { value, unit } => {
                write!(f, "{value}")?;
                if let Some(unit) = unit {
                    f.write_str(unit.suffix())?;
                }
                Ok(())
            }
            ExprKind::Note(note) => match note_name(*note) {
                Some(name) => f.write_str(&name),
                None => write!(f, "{note}"),
            },
            ExprKind::Tuple(items) => {
                f.write_str("(")?;
                write_list(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            ExprKind::Call { name, args } => {
                write!(f, "{name}(")?;
                write_list(f, args)?;
                f.write_str(")")
            }
            ExprKind::Cast { expr, form } => write!(f, "({expr}->{form})"),
            ExprKind::Convert { expr, form } => write!(f, "({expr}~>{form})"),
            ExprKind::Control(control) => write!(f, "{control}"),
            ExprKind::Variable(name) => f.write_str(name),
            ExprKind::Math { op, lhs, rhs } => write!(f, "({lhs} {} {rhs})", op.symbol()),
            ExprKind::Unary { op, expr } => write!(f, "({}{expr})", op.symbol()),
            ExprKind::Assign { op, target, value } => {
                write!(f, "({target} {} {value})", op.symbol())
            }
            ExprKind::Postfix { op, target } => write!(f, "({target}{})", op.symbol()),
            ExprKind::LValue(targets) => match targets.as_slice() {
                [single] => write!(f, "{single}"),
                many => {
                    f.write_str("(")?;
                    write_list(f, many)?;
                    f.write_str(")")
                }
            },
        }
    }
}

impl fmt::Display for FormLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}", self.kind.name())?;
        if !self.args.is_empty() {
            f.write_str(" ")?;
            write_list(f, &self.args)?;
        }
        f.write_str("]")
    }
}

impl fmt::Display for ControlRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\":{}", self.name, self.kind.name())?;
        if let Some(property) = &self.property {
            write!(f, ".{property}")?;
        }
        Ok(())
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
