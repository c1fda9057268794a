use crate::expression::error::SyntaxError;
use crate::resource::target::is_target_syntax;

const OPERATORS_3: [&str; 2] = ["===", "!=="];
const OPERATORS_2: [&str; 8] = ["==", "!=", "//", "<=", ">=", "&&", "||", "**"];
const OPERATORS_1: [&str; 8] = ["<", ">", "+", "-", "*", "/", "%", "!"];

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TokenKind {
    Operator(&'static str),
    Open,
    Close,
    /// Bind target used as a texture filter lookup (`ps-t0`, `resource\name`).
    Target(String),
    /// `$name`, `$\ns\name`, `$arr[3]`, `$m[1][2]`.
    Variable(String),
    Ident(String),
    Number(f32),
}

impl TokenKind {
    fn is_operand(&self) -> bool {
        matches!(
            self,
            Self::Target(_) | Self::Variable(_) | Self::Ident(_) | Self::Number(_)
        )
    }
}

fn is_run_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'_' | b'-' | b'\\' | b'.')
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

pub(crate) fn lex(input: &str) -> Result<Vec<Token>, SyntaxError> {
    let bytes = input.as_bytes();
    let mut out: Vec<Token> = Vec::new();
    let mut i = 0usize;

    'outer: while i < bytes.len() {
        let c = bytes[i];
        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        let rest = &input[i..];

        if c == b'(' || c == b')' {
            let kind = if c == b'(' {
                TokenKind::Open
            } else {
                TokenKind::Close
            };
            out.push(Token {
                kind,
                offset: start,
            });
            i += 1;
            continue;
        }

        for ops in [&OPERATORS_3[..], &OPERATORS_2[..], &OPERATORS_1[..]] {
            if let Some(op) = ops.iter().find(|op| rest.starts_with(**op)) {
                out.push(Token {
                    kind: TokenKind::Operator(*op),
                    offset: start,
                });
                i += op.len();
                continue 'outer;
            }
        }

        // Longest run first, so `ps-t0` is not split at the dash.
        let run = bytes[i..].iter().take_while(|b| is_run_byte(**b)).count();
        if run > 0 && is_target_syntax(&input[i..i + run]) {
            out.push(Token {
                kind: TokenKind::Target(input[i..i + run].to_owned()),
                offset: start,
            });
            i += run;
            continue;
        }

        if c == b'$' {
            i += 1;
            while i < bytes.len() && (is_ident_byte(bytes[i]) || bytes[i] == b'\\') {
                i += 1;
            }
            if i == start + 1 {
                return Err(SyntaxError::new(start, "expected a variable name after '$'"));
            }
            while i < bytes.len() && bytes[i] == b'[' {
                let Some(close) = input[i..].find(']') else {
                    return Err(SyntaxError::new(i, "unterminated '['"));
                };
                i += close + 1;
            }
            out.push(Token {
                kind: TokenKind::Variable(input[start..i].to_owned()),
                offset: start,
            });
            continue;
        }

        if c.is_ascii_alphabetic() || c == b'_' {
            while i < bytes.len() && is_ident_byte(bytes[i]) {
                i += 1;
            }
            out.push(Token {
                kind: TokenKind::Ident(input[start..i].to_owned()),
                offset: start,
            });
            continue;
        }

        if c.is_ascii_digit() || (c == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_digit)) {
            i = scan_number(bytes, i)?;
            let v: f32 = input[start..i]
                .parse()
                .map_err(|_| SyntaxError::new(start, "invalid number"))?;
            out.push(Token {
                kind: TokenKind::Number(v),
                offset: start,
            });
            continue;
        }

        let ch = rest.chars().next().unwrap_or('?');
        return Err(SyntaxError::new(start, format!("unexpected character '{ch}'")));
    }

    check_adjacent(&out)?;
    Ok(out)
}

fn scan_number(bytes: &[u8], mut i: usize) -> Result<usize, SyntaxError> {
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        let e_pos = i;
        i += 1;
        if i < bytes.len() && matches!(bytes[i], b'+' | b'-') {
            i += 1;
        }
        let digits = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if digits == i {
            return Err(SyntaxError::new(e_pos, "invalid number exponent"));
        }
    }
    if i < bytes.len() && (bytes[i].is_ascii_alphabetic() || bytes[i] == b'_') {
        return Err(SyntaxError::new(i, "unexpected character after number"));
    }
    Ok(i)
}

/// Two operands (or a group and an operand) with nothing between them.
fn check_adjacent(tokens: &[Token]) -> Result<(), SyntaxError> {
    for pair in tokens.windows(2) {
        let ends_operand = pair[0].kind.is_operand() || pair[0].kind == TokenKind::Close;
        let starts_operand = pair[1].kind.is_operand() || pair[1].kind == TokenKind::Open;
        if ends_operand && starts_operand {
            return Err(SyntaxError::new(
                pair[1].offset,
                "unexpected operand (missing operator?)",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/expression/lexer.rs"]
mod tests;
