use super::*;
use crate::foundation::opts::SessionOpts;
use crate::variables::store::VarShape;

struct Fixture {
    program: Program,
    state: State,
    cx: SectionParse,
}

impl Fixture {
    fn new(namespace: &str) -> Self {
        let mut program = Program::default();
        program.add_section("commandlistother", "", SectionKind::CommandList);
        program.add_section("presetwarm", "", SectionKind::Preset(crate::foundation::ids::PresetId(0)));
        let section = program.add_section("commandlisttest", namespace, SectionKind::CommandList);
        Self {
            program,
            state: State::new(SessionOpts::default()),
            cx: SectionParse::new(section, namespace),
        }
    }

    fn parse(&mut self, key: &str, value: &str) -> ScriptResult<()> {
        DirectiveParser {
            program: &mut self.program,
            state: &mut self.state,
            cx: &mut self.cx,
        }
        .parse(key, value)
    }

    fn lines(&self, post: bool) -> Vec<&str> {
        let lists = self.program.section(self.cx.section).lists;
        self.program
            .list(lists.phase(post))
            .commands
            .iter()
            .map(|c| c.line.as_str())
            .collect()
    }
}

#[test]
fn commands_default_to_the_pre_phase() {
    let mut f = Fixture::new("");
    f.parse("x", "1").unwrap();
    f.parse("post y", "2").unwrap();
    f.parse("pre z", "3").unwrap();
    assert_eq!(f.lines(false), ["x = 1", "pre z = 3"]);
    assert_eq!(f.lines(true), ["post y = 2"]);
}

#[test]
fn run_and_checktextureoverride_go_to_both_phases() {
    let mut f = Fixture::new("");
    f.parse("run", "commandlistother").unwrap();
    f.parse("checktextureoverride", "ps-t0").unwrap();
    assert_eq!(f.lines(false).len(), 2);
    assert_eq!(f.lines(true).len(), 2);

    f.parse("pre run", "commandlistother").unwrap();
    assert_eq!(f.lines(false).len(), 3);
    assert_eq!(f.lines(true).len(), 2);
}

#[test]
fn run_targets_must_be_command_lists() {
    let mut f = Fixture::new("");
    assert!(matches!(
        f.parse("run", "commandlistmissing"),
        Err(ScriptError::Unresolved(_))
    ));
    assert!(f.parse("run", "presetwarm").is_err());
    assert!(f.lines(false).is_empty());
}

#[test]
fn unknown_directives_are_rejected() {
    let mut f = Fixture::new("");
    assert!(f.parse("frobnicate", "1").is_err());
    assert!(f.parse("handling", "sometimes").is_err());
    assert!(f.parse("$undeclared", "1").is_err());
    assert!(f.lines(false).is_empty());
}

#[test]
fn handling_and_presets_parse() {
    let mut f = Fixture::new("");
    f.parse("handling", "skip").unwrap();
    f.parse("exclude_preset", "presetwarm").unwrap();
    let lists = f.program.section(f.cx.section).lists;
    let kinds: Vec<_> = f
        .program
        .list(lists.pre)
        .commands
        .iter()
        .map(|c| c.kind.clone())
        .collect();
    assert_eq!(kinds[0], CommandKind::Handling(Handling::Skip));
    assert!(matches!(kinds[1], CommandKind::Preset { exclude: true, .. }));
}

#[test]
fn locals_end_with_their_block() {
    let mut f = Fixture::new("");
    f.parse("if 1", "").unwrap();
    f.parse("local $t", "1").unwrap();
    f.parse("$t", "$t + 1").unwrap();
    f.parse("endif", "").unwrap();
    assert!(matches!(f.parse("$t", "2"), Err(ScriptError::Unresolved(_))));
}

#[test]
fn namespaced_globals_resolve_from_their_namespace() {
    let mut f = Fixture::new("mod");
    let g = f
        .state
        .vars
        .declare_global("$\\mod\\g", VarShape::Scalar, false)
        .unwrap();
    let p = DirectiveParser {
        program: &mut f.program,
        state: &mut f.state,
        cx: &mut f.cx,
    };
    assert_eq!(p.global("$g"), Some(g));
    assert_eq!(p.global("$\\mod\\g"), Some(g));
    assert_eq!(p.global("$h"), None);
}

#[test]
fn finish_closes_unterminated_blocks() {
    let mut f = Fixture::new("");
    f.parse("if 1", "").unwrap();
    f.parse("if 0", "").unwrap();
    f.parse("x", "1").unwrap();
    DirectiveParser {
        program: &mut f.program,
        state: &mut f.state,
        cx: &mut f.cx,
    }
    .finish();
    assert!(f.cx.open.is_empty());
    assert_eq!(f.cx.scope.depth(), 0);
    assert_eq!(f.lines(false), ["if 1"]);
}
