use super::*;

fn kinds(src: &str) -> Vec<TokenKind> {
    lex(src).unwrap().into_iter().map(|t| t.kind).collect()
}

#[test]
fn longest_operator_glyph_wins() {
    assert_eq!(
        kinds("0===-0"),
        vec![
            TokenKind::Number(0.0),
            TokenKind::Operator("==="),
            TokenKind::Operator("-"),
            TokenKind::Number(0.0),
        ]
    );
    assert_eq!(
        kinds("4**2//3"),
        vec![
            TokenKind::Number(4.0),
            TokenKind::Operator("**"),
            TokenKind::Number(2.0),
            TokenKind::Operator("//"),
            TokenKind::Number(3.0),
        ]
    );
}

#[test]
fn bind_targets_keep_their_dash() {
    assert_eq!(
        kinds("ps-t0 == 1"),
        vec![
            TokenKind::Target("ps-t0".to_owned()),
            TokenKind::Operator("=="),
            TokenKind::Number(1.0),
        ]
    );
    assert_eq!(
        kinds("x-1"),
        vec![
            TokenKind::Ident("x".to_owned()),
            TokenKind::Operator("-"),
            TokenKind::Number(1.0),
        ]
    );
}

#[test]
fn variables_carry_their_index_groups() {
    assert_eq!(
        kinds("$m[1][2] + $\\ns\\v"),
        vec![
            TokenKind::Variable("$m[1][2]".to_owned()),
            TokenKind::Operator("+"),
            TokenKind::Variable("$\\ns\\v".to_owned()),
        ]
    );
}

#[test]
fn numbers_accept_fractions_and_exponents() {
    assert_eq!(kinds(".5"), vec![TokenKind::Number(0.5)]);
    assert_eq!(kinds("1.5e2"), vec![TokenKind::Number(150.0)]);
    assert!(lex("1e").is_err());
}

#[test]
fn adjacent_operands_are_rejected_at_the_second_one() {
    let err = lex("1 2").unwrap_err();
    assert_eq!(err.offset, 2);
    let err = lex("(1)(2)").unwrap_err();
    assert_eq!(err.offset, 3);
    assert!(lex("$a x").is_err());
}

#[test]
fn unknown_characters_report_their_offset() {
    let err = lex("1 + #").unwrap_err();
    assert_eq!(err.offset, 4);
}
