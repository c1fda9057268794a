use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        ScriptError::unresolved("x")
            .to_string()
            .contains("unresolved reference:")
    );
    assert!(
        ScriptError::invalid("x")
            .to_string()
            .contains("invalid directive:")
    );
    assert!(
        ScriptError::internal("x")
            .to_string()
            .contains("internal error:")
    );
    assert!(
        ScriptError::from(SyntaxError::new(3, "boom"))
            .to_string()
            .contains("syntax error:")
    );
}

#[test]
fn syntax_errors_expose_their_offset() {
    let err = ScriptError::from(SyntaxError::new(7, "unexpected token"));
    assert_eq!(err.offset(), Some(7));
    assert_eq!(ScriptError::invalid("x").offset(), None);
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = ScriptError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}
