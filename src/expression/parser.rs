use crate::expression::Resolve;
use crate::expression::ast::{BinaryOp, Node, UnaryOp};
use crate::expression::error::SyntaxError;
use crate::expression::lexer::{Token, TokenKind, lex};
use crate::expression::operand::resolve_operand;
use crate::foundation::error::{ScriptError, ScriptResult};

/// Left-associative precedence classes, tightest first. Unary and `**` are swept before these.
const LEFT_ASSOCIATIVE: [&[&str]; 6] = [
    &["*", "/", "//", "%"],
    &["+", "-"],
    &["<", "<=", ">", ">="],
    &["==", "!=", "===", "!=="],
    &["&&"],
    &["||"],
];

#[derive(Debug)]
enum Item {
    Op { glyph: &'static str, offset: usize },
    Node { node: Node, offset: usize },
}

impl Item {
    fn is_node(&self) -> bool {
        matches!(self, Self::Node { .. })
    }

    fn offset(&self) -> usize {
        match self {
            Self::Op { offset, .. } | Self::Node { offset, .. } => *offset,
        }
    }

    fn op_in(&self, class: &[&str]) -> Option<&'static str> {
        match self {
            Self::Op { glyph, .. } if class.contains(glyph) => Some(*glyph),
            _ => None,
        }
    }
}

pub(crate) fn parse(src: &str, r: &mut dyn Resolve) -> ScriptResult<Node> {
    let tokens = lex(src)?;
    let mut tokens = tokens.into_iter();
    group(&mut tokens, r, None)
}

/// Collect items up to the matching `)` (or the end), then reduce them to one node.
fn group(
    tokens: &mut impl Iterator<Item = Token>,
    r: &mut dyn Resolve,
    open: Option<usize>,
) -> ScriptResult<Node> {
    let mut items = Vec::new();
    loop {
        let Some(Token { kind, offset }) = tokens.next() else {
            if let Some(at) = open {
                return Err(SyntaxError::new(at, "unmatched '('").into());
            }
            break;
        };
        match kind {
            TokenKind::Open => {
                let node = group(tokens, r, Some(offset))?;
                items.push(Item::Node { node, offset });
            }
            TokenKind::Close => {
                if open.is_none() {
                    return Err(SyntaxError::new(offset, "unmatched ')'").into());
                }
                break;
            }
            TokenKind::Operator(glyph) => items.push(Item::Op { glyph, offset }),
            operand => {
                let node = Node::Operand(resolve_operand(operand, offset, r)?);
                items.push(Item::Node { node, offset });
            }
        }
    }
    reduce(items, open.unwrap_or(0))
}

fn reduce(mut items: Vec<Item>, start: usize) -> ScriptResult<Node> {
    if items.is_empty() {
        return Err(SyntaxError::new(start, "empty expression").into());
    }

    sweep_unary(&mut items)?;
    sweep_right(&mut items, &["**"])?;
    for class in LEFT_ASSOCIATIVE {
        sweep_left(&mut items, class)?;
    }

    if items.len() == 1
        && items[0].is_node()
        && let Some(Item::Node { node, .. }) = items.pop()
    {
        return Ok(node);
    }
    let culprit = items
        .iter()
        .find(|i| !i.is_node())
        .or_else(|| items.get(1))
        .map(|i| (i.offset(), i));
    Err(match culprit {
        Some((at, Item::Op { glyph, .. })) => {
            SyntaxError::new(at, format!("unexpected operator '{glyph}'")).into()
        }
        Some((at, _)) => SyntaxError::new(at, "unexpected token").into(),
        None => ScriptError::internal("expression reduced to nothing"),
    })
}

fn take_node(items: &mut Vec<Item>, at: usize) -> ScriptResult<(Node, usize)> {
    match items.remove(at) {
        Item::Node { node, offset } => Ok((node, offset)),
        Item::Op { .. } => Err(ScriptError::internal("operator where an operand was checked")),
    }
}

/// `! - +` with no operand to their left, right to left so they nest.
fn sweep_unary(items: &mut Vec<Item>) -> ScriptResult<()> {
    let mut i = items.len();
    while i > 0 {
        i -= 1;
        let Item::Op { glyph, offset } = items[i] else {
            continue;
        };
        let Some(op) = UnaryOp::from_glyph(glyph) else {
            continue;
        };
        if i > 0 && items[i - 1].is_node() {
            continue;
        }
        if !items.get(i + 1).is_some_and(Item::is_node) {
            continue;
        }
        let (arg, _) = take_node(items, i + 1)?;
        items[i] = Item::Node {
            node: Node::Unary {
                op,
                arg: Box::new(arg),
            },
            offset,
        };
    }
    Ok(())
}

fn fold_binary(items: &mut Vec<Item>, at: usize, glyph: &str) -> ScriptResult<()> {
    let offset = items[at].offset();
    if at == 0 || !items[at - 1].is_node() {
        return Err(SyntaxError::new(offset, format!("expected operand before '{glyph}'")).into());
    }
    if !items.get(at + 1).is_some_and(Item::is_node) {
        return Err(SyntaxError::new(offset, format!("expected operand after '{glyph}'")).into());
    }
    let Some(op) = BinaryOp::from_glyph(glyph) else {
        return Err(ScriptError::internal(format!("no binary operator for '{glyph}'")));
    };
    let (right, _) = take_node(items, at + 1)?;
    items.remove(at);
    let (left, left_offset) = take_node(items, at - 1)?;
    items.insert(
        at - 1,
        Item::Node {
            node: Node::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            offset: left_offset,
        },
    );
    Ok(())
}

fn sweep_right(items: &mut Vec<Item>, class: &[&str]) -> ScriptResult<()> {
    let mut i = items.len();
    while i > 0 {
        i -= 1;
        let Some(glyph) = items[i].op_in(class) else {
            continue;
        };
        fold_binary(items, i, glyph)?;
        // The folded node now sits at i - 1.
        i -= 1;
    }
    Ok(())
}

fn sweep_left(items: &mut Vec<Item>, class: &[&str]) -> ScriptResult<()> {
    let mut i = 0;
    while i < items.len() {
        match items[i].op_in(class) {
            Some(glyph) => fold_binary(items, i, glyph)?,
            None => i += 1,
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/expression/parser.rs"]
mod tests;
