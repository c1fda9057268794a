use crate::expression::{Expression, Resolve};
use crate::foundation::error::ScriptError;
use crate::foundation::ids::{CustomResourceId, VarId};
use crate::foundation::opts::SessionOpts;
use crate::variables::store::{IniParams, VarInfo, VarShape, VarStore};

struct Globals {
    vars: VarStore,
    params: IniParams,
}

impl Globals {
    fn new() -> Self {
        let mut vars = VarStore::new();
        vars.declare_global("$a", VarShape::Scalar, false).unwrap();
        vars.declare_global("$arr", VarShape::Array(4), false).unwrap();
        Self {
            vars,
            params: IniParams::new(2, 64),
        }
    }
}

impl Resolve for Globals {
    fn variable(&self, name: &str) -> Option<VarId> {
        self.vars.global(name)
    }

    fn var_info(&self, id: VarId) -> &VarInfo {
        self.vars.info(id)
    }

    fn ini_param(&mut self, index: usize) -> Result<(), String> {
        self.params.ensure(index)
    }

    fn custom_resource(&self, _name: &str) -> Option<CustomResourceId> {
        None
    }
}

fn parse(src: &str) -> Result<Expression, ScriptError> {
    Expression::parse(src, &mut Globals::new())
}

fn value(src: &str) -> f32 {
    parse(src)
        .unwrap()
        .static_evaluate(&SessionOpts::default())
        .unwrap()
}

fn syntax_offset(src: &str) -> usize {
    match parse(src) {
        Err(ScriptError::Syntax(e)) => e.offset,
        other => panic!("expected a syntax error for {src:?}, got {other:?}"),
    }
}

#[test]
fn precedence_follows_the_sweep_order() {
    assert_eq!(value("2 + 3 * 4"), 14.0);
    assert_eq!(value("(2 + 3) * 4"), 20.0);
    assert_eq!(value("10 - 2 - 3"), 5.0);
    assert_eq!(value("8 / 4 / 2"), 1.0);
    assert_eq!(value("1 < 2 && 2 < 3"), 1.0);
    assert_eq!(value("0 || 1 && 0"), 0.0);
}

#[test]
fn unary_binds_tighter_than_exponent() {
    assert_eq!(value("4**-2"), 0.0625);
    assert_eq!(value("-2**2"), 4.0);
    assert_eq!(value("1 - -1"), 2.0);
    assert_eq!(value("!!3"), 1.0);
}

#[test]
fn exponent_is_right_associative() {
    assert_eq!(value("2**3**2"), 512.0);
}

#[test]
fn triple_equals_compares_bit_patterns() {
    assert_eq!(value("0===-0"), 0.0);
    assert_eq!(value("0==-0"), 1.0);
    assert_eq!(value("0!==-0"), 1.0);
    assert_eq!(value("-0===-0"), 1.0);
}

#[test]
fn division_family() {
    assert_eq!(value("7 // 2"), 3.0);
    assert_eq!(value("-7 // 2"), -4.0);
    assert_eq!(value("7 % 3"), 1.0);
}

#[test]
fn display_shows_the_tree_shape() {
    assert_eq!(parse("2+3*4").unwrap().to_string(), "(2 + (3 * 4))");
    assert_eq!(parse("-x1").unwrap().to_string(), "-x1");
}

#[test]
fn malformed_expressions_report_offsets() {
    assert_eq!(syntax_offset("1 +"), 2);
    assert_eq!(syntax_offset(""), 0);
    assert_eq!(syntax_offset("()"), 0);
    assert_eq!(syntax_offset("(1"), 0);
    assert_eq!(syntax_offset("1)"), 1);
    assert_eq!(syntax_offset("* 2"), 0);
    assert_eq!(syntax_offset("1 ! 2"), 2);
}

#[test]
fn unknown_names_are_unresolved_not_syntax_errors() {
    assert!(matches!(parse("$nope + 1"), Err(ScriptError::Unresolved(_))));
    assert!(matches!(parse("banana"), Err(ScriptError::Unresolved(_))));
}

#[test]
fn array_elements_need_an_index_in_range() {
    assert!(parse("$arr[3]").is_ok());
    assert!(matches!(parse("$arr[4]"), Err(ScriptError::Syntax(_))));
    assert!(matches!(parse("$arr"), Err(ScriptError::Syntax(_))));
}

#[test]
fn ini_params_grow_on_reference() {
    let mut g = Globals::new();
    let e = Expression::parse("y5 * 2", &mut g).unwrap();
    assert_eq!(g.params.count(), 6);
    assert_eq!(e.static_evaluate(&SessionOpts::default()), None);
    assert!(Expression::parse("x64", &mut g).is_err());
}

#[test]
fn optimize_folds_static_subtrees_once() {
    let opts = SessionOpts::default();
    let mut e = parse("hunting * 2 + $a").unwrap();
    assert!(e.optimize(&opts));
    assert_eq!(e.to_string(), "(0 + $a)");
    assert!(!e.optimize(&opts));

    let mut e = parse("0 && $a").unwrap();
    assert!(e.optimize(&opts));
    assert!(e.is_literal());

    let mut e = parse("(1 + 2) * (3 - 1)").unwrap();
    assert!(e.optimize(&opts));
    assert!(e.is_literal());
    assert_eq!(e.static_evaluate(&opts), Some(6.0));
}
