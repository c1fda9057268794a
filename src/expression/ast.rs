use std::fmt;

use crate::expression::EvalCtx;
use crate::expression::operand::{Operand, OperandKind};
use crate::foundation::opts::SessionOpts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UnaryOp {
    Not,
    Neg,
    Plus,
}

impl UnaryOp {
    pub(crate) fn from_glyph(glyph: &str) -> Option<Self> {
        match glyph {
            "!" => Some(Self::Not),
            "-" => Some(Self::Neg),
            "+" => Some(Self::Plus),
            _ => None,
        }
    }

    fn glyph(self) -> &'static str {
        match self {
            Self::Not => "!",
            Self::Neg => "-",
            Self::Plus => "+",
        }
    }

    fn apply(self, v: f32) -> f32 {
        match self {
            Self::Not => truth(v == 0.0),
            Self::Neg => -v,
            Self::Plus => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Pow,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Add,
    Sub,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    /// Bit-pattern equality, so `-0` and `0` differ.
    Ident,
    NotIdent,
    And,
    Or,
}

impl BinaryOp {
    pub(crate) fn from_glyph(glyph: &str) -> Option<Self> {
        Some(match glyph {
            "**" => Self::Pow,
            "*" => Self::Mul,
            "/" => Self::Div,
            "//" => Self::FloorDiv,
            "%" => Self::Mod,
            "+" => Self::Add,
            "-" => Self::Sub,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "===" => Self::Ident,
            "!==" => Self::NotIdent,
            "&&" => Self::And,
            "||" => Self::Or,
            _ => return None,
        })
    }

    fn glyph(self) -> &'static str {
        match self {
            Self::Pow => "**",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Ident => "===",
            Self::NotIdent => "!==",
            Self::And => "&&",
            Self::Or => "||",
        }
    }

    pub(crate) fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            Self::Pow => a.powf(b),
            Self::Mul => a * b,
            Self::Div => a / b,
            Self::FloorDiv => (a / b).floor(),
            Self::Mod => a % b,
            Self::Add => a + b,
            Self::Sub => a - b,
            Self::Lt => truth(a < b),
            Self::Le => truth(a <= b),
            Self::Gt => truth(a > b),
            Self::Ge => truth(a >= b),
            Self::Eq => truth(a == b),
            Self::Ne => truth(a != b),
            Self::Ident => truth(a.to_bits() == b.to_bits()),
            Self::NotIdent => truth(a.to_bits() != b.to_bits()),
            Self::And => truth(a != 0.0 && b != 0.0),
            Self::Or => truth(a != 0.0 || b != 0.0),
        }
    }

    /// Result decided by the left operand alone, for `&&` and `||`.
    fn short_circuit(self, left: f32) -> Option<f32> {
        match self {
            Self::And if left == 0.0 => Some(0.0),
            Self::Or if left != 0.0 => Some(1.0),
            _ => None,
        }
    }
}

fn truth(b: bool) -> f32 {
    if b { 1.0 } else { 0.0 }
}

/// Finalized expression tree. No raw tokens survive parsing.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Node {
    Operand(Operand),
    Unary {
        op: UnaryOp,
        arg: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    pub(crate) fn eval(&self, ctx: &EvalCtx<'_>) -> f32 {
        match self {
            Self::Operand(o) => o.eval(ctx),
            Self::Unary { op, arg } => op.apply(arg.eval(ctx)),
            Self::Binary { op, left, right } => {
                let l = left.eval(ctx);
                if let Some(v) = op.short_circuit(l) {
                    return v;
                }
                op.apply(l, right.eval(ctx))
            }
        }
    }

    /// Value of the tree if every leaf is statically known.
    pub(crate) fn static_eval(&self, opts: &SessionOpts) -> Option<f32> {
        match self {
            Self::Operand(o) => o.static_eval(opts),
            Self::Unary { op, arg } => Some(op.apply(arg.static_eval(opts)?)),
            Self::Binary { op, left, right } => {
                Some(op.apply(left.static_eval(opts)?, right.static_eval(opts)?))
            }
        }
    }

    pub(crate) fn is_literal(&self) -> bool {
        matches!(
            self,
            Self::Operand(Operand {
                kind: OperandKind::Literal(_),
                ..
            })
        )
    }

    /// Fold statically known sub-trees into literals. Returns whether anything changed.
    pub(crate) fn optimize(&mut self, opts: &SessionOpts) -> bool {
        if self.is_literal() {
            return false;
        }
        if let Some(v) = self.static_eval(opts) {
            *self = Self::Operand(Operand::literal(v));
            return true;
        }
        match self {
            Self::Operand(_) => false,
            Self::Unary { arg, .. } => arg.optimize(opts),
            Self::Binary { op, left, right } => {
                let mut changed = left.optimize(opts);
                changed |= right.optimize(opts);
                let decided = left.static_eval(opts).and_then(|l| op.short_circuit(l));
                if let Some(v) = decided {
                    *self = Self::Operand(Operand::literal(v));
                    return true;
                }
                changed
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Operand(o) => write!(f, "{o}"),
            Self::Unary { op, arg } => write!(f, "{}{arg}", op.glyph()),
            Self::Binary { op, left, right } => write!(f, "({left} {} {right})", op.glyph()),
        }
    }
}
