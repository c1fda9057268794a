use super::*;
use crate::command::parse::SectionParse;
use crate::engine::program::{Program, SectionKind};
use crate::device::SoftDevice;
use crate::engine::state::{CallInfo, State};
use crate::expression::EvalCtx;
use crate::foundation::opts::SessionOpts;

struct Fixture {
    program: Program,
    state: State,
    cx: SectionParse,
}

impl Fixture {
    fn new(namespace: &str) -> Self {
        let mut program = Program::default();
        let section = program.add_section("constants", namespace, SectionKind::Constants);
        let mut state = State::new(SessionOpts::default());
        state.vars.declare_global("$a", VarShape::Array(4), false).unwrap();
        state.vars.declare_global("$b", VarShape::Array(2), false).unwrap();
        state.vars.declare_global("$s", VarShape::Scalar, false).unwrap();
        Self {
            program,
            state,
            cx: SectionParse::new(section, namespace),
        }
    }

    fn with<T>(&mut self, f: impl FnOnce(&mut DirectiveParser<'_>) -> T) -> T {
        let mut p = DirectiveParser {
            program: &mut self.program,
            state: &mut self.state,
            cx: &mut self.cx,
        };
        f(&mut p)
    }
}

#[test]
fn declared_shapes() {
    let shape = |s: &str| declared_shape(&split_var_ref(s).unwrap());
    assert_eq!(shape("$v").unwrap(), VarShape::Scalar);
    assert_eq!(shape("$v[3]").unwrap(), VarShape::Array(3));
    assert_eq!(shape("$m[2][3]").unwrap(), VarShape::Matrix { rows: 2, cols: 3 });
    assert!(shape("$v[0]").is_err());
    assert!(shape("$v[1][2][3]").is_err());
    assert!(shape("$v[2]2").is_err());
}

#[test]
fn whole_array_from_array_copies_the_shorter_length() {
    let mut f = Fixture::new("");
    let kind = f.with(|p| variable(p, "$a", "$b")).unwrap();
    let CommandKind::CopyVars { dst, src } = kind else {
        panic!("expected a variable copy, got {kind:?}");
    };
    assert_eq!((dst.len, src.len), (2, 2));
}

#[test]
fn ranges_broadcast_an_expression() {
    let mut f = Fixture::new("");
    let kind = f.with(|p| variable(p, "$a[1]2", "$s * 2")).unwrap();
    let CommandKind::AssignVar { target, .. } = kind else {
        panic!("expected an assignment, got {kind:?}");
    };
    let a = f.state.vars.global("$a").unwrap();
    assert_eq!(target.start, f.state.vars.info(a).slot(1));
    assert_eq!(target.len, 2);

    assert!(f.with(|p| variable(p, "$a[4]", "1")).is_err());
    assert!(f.with(|p| variable(p, "$s[0]", "1")).is_err());
}

#[test]
fn readback_builds_a_copy_into_variables() {
    let mut f = Fixture::new("");
    let kind = f.with(|p| variable(p, "$b", "readback ps-t0")).unwrap();
    let CommandKind::Copy(copy) = kind else {
        panic!("expected a copy, got {kind:?}");
    };
    assert!(matches!(copy.dst, ResourceCopyTarget::CpuReadback(r) if r.len == 2));
    assert!(f.with(|p| variable(p, "$b", "readback ref ps-t0")).is_err());
}

#[test]
fn locals_cannot_be_redeclared_in_nested_scopes() {
    let mut f = Fixture::new("");
    assert!(f.with(|p| local(p, "local $t", "")).unwrap().is_none());
    f.cx.scope.push();
    assert!(f.with(|p| local(p, "local $t", "1")).is_err());
    assert!(f.with(|p| local(p, "local $u[2]", "3")).unwrap().is_some());
    assert!(f.with(|p| local(p, "local $\\ns\\v", "")).is_err());
}

#[test]
fn local_initialiser_reads_the_masked_global() {
    let mut f = Fixture::new("");
    let kind = f.with(|p| local(p, "local $s", "$s + 1")).unwrap().unwrap();
    let CommandKind::AssignVar { target, expr } = kind else {
        panic!("expected an assignment, got {kind:?}");
    };
    let global = f.state.vars.global("$s").unwrap();
    let local = f.cx.scope.lookup("$s").unwrap();
    assert_ne!(global, local);
    assert_eq!(target.var, local);

    let slot = f.state.vars.info(global).slot(0);
    f.state.vars.set(slot, 4.0);
    let device = SoftDevice::new();
    let call = CallInfo::default();
    let ctx = EvalCtx {
        state: &f.state,
        program: &f.program,
        device: &device,
        call: &call,
    };
    assert_eq!(expr.evaluate(&ctx), 5.0);
}

#[test]
fn globals_take_constant_initial_values() {
    let mut f = Fixture::new("");
    f.with(|p| global(p, "global persist $p", "2 * 3")).unwrap();
    let p = f.state.vars.global("$p").unwrap();
    assert_eq!(f.state.vars.value(p), &[6.0]);
    assert!(f.state.vars.take_dirty().is_empty());

    assert!(f.with(|p| global(p, "global $q", "$s")).is_err());
    assert!(f.with(|p| global(p, "global $p", "")).is_err());
    assert!(f.with(|p| global(p, "global persist", "")).is_err());
    assert!(f.with(|p| global(p, "global $x $y", "")).is_err());
}

#[test]
fn globals_are_namespaced() {
    let mut f = Fixture::new("mod");
    f.with(|p| global(p, "global $g[2]", "1")).unwrap();
    let g = f.state.vars.global("$\\mod\\g").unwrap();
    assert_eq!(f.state.vars.value(g), &[1.0, 1.0]);
    assert_eq!(f.with(|p| p.global("$g")), Some(g));
}

#[test]
fn preset_values_target_one_cell() {
    let mut f = Fixture::new("");
    assert_eq!(
        f.with(|p| preset_value(p, "y2", "0.5")).unwrap(),
        (PresetTarget::Param(flat_param(2, 1)), 0.5)
    );
    let s = f.state.vars.global("$s").unwrap();
    let slot = f.state.vars.info(s).slot(0);
    assert_eq!(
        f.with(|p| preset_value(p, "$s", "-1")).unwrap(),
        (PresetTarget::Var(slot), -1.0)
    );
    assert!(f.with(|p| preset_value(p, "$a", "1")).is_err());
    assert!(f.with(|p| preset_value(p, "$s", "time")).is_err());
    assert!(f.with(|p| preset_value(p, "speed", "1")).is_err());
}
