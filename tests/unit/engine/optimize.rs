use super::*;
use crate::command::parse::{DirectiveParser, SectionParse};
use crate::engine::program::SectionKind;
use crate::engine::state::State;
use crate::foundation::ids::SectionId;
use crate::variables::store::VarShape;

struct Script {
    program: Program,
    state: State,
}

impl Script {
    fn new(opts: SessionOpts) -> Self {
        let mut state = State::new(opts);
        state.vars.declare_global("$x", VarShape::Scalar, false).unwrap();
        Self {
            program: Program::default(),
            state,
        }
    }

    fn section(&mut self, name: &str, lines: &[(&str, &str)]) -> SectionId {
        let id = self.program.add_section(name, "", SectionKind::CommandList);
        let mut cx = SectionParse::new(id, "");
        let mut p = DirectiveParser {
            program: &mut self.program,
            state: &mut self.state,
            cx: &mut cx,
        };
        for (k, v) in lines {
            p.parse(k, v).unwrap();
        }
        p.finish();
        id
    }

    fn lines(&self, id: SectionId, post: bool) -> Vec<&str> {
        let list = self.program.section(id).lists.phase(post);
        self.program
            .list(list)
            .commands
            .iter()
            .map(|c| c.line.as_str())
            .collect()
    }

    fn optimize(&mut self) -> OptimizeStats {
        optimize(&mut self.program, &self.state.opts)
    }
}

#[test]
fn constant_conditions_are_inlined() {
    let mut s = Script::new(SessionOpts::default());
    let id = s.section(
        "commandlistmain",
        &[("if 2 > 1", ""), ("$x", "1"), ("else", ""), ("$x", "2"), ("endif", "")],
    );
    let stats = s.optimize();
    assert_eq!(s.lines(id, false), ["$x = 1"]);
    assert!(s.lines(id, true).is_empty());
    assert_eq!(stats.inlined, 2);
}

#[test]
fn runtime_conditions_are_kept() {
    let mut s = Script::new(SessionOpts::default());
    let id = s.section("commandlistmain", &[("if $x", ""), ("$x", "0"), ("endif", "")]);
    s.optimize();
    assert_eq!(s.lines(id, false), ["if $x"]);
    // Empty in the post phase.
    assert!(s.lines(id, true).is_empty());
}

#[test]
fn a_second_run_changes_nothing() {
    let mut s = Script::new(SessionOpts::default());
    s.section("commandlistmain", &[("if hunting", ""), ("$x", "1"), ("endif", ""), ("$x", "1 + 1")]);
    let first = s.optimize();
    assert!(first.folded + first.inlined + first.removed > 0);
    let snapshot = s.program.lists.clone();

    let second = s.optimize();
    assert_eq!(
        second,
        OptimizeStats {
            passes: 1,
            ..OptimizeStats::default()
        }
    );
    assert_eq!(s.program.lists, snapshot);
}

#[test]
fn removals_cascade_to_callers() {
    let mut s = Script::new(SessionOpts::default());
    s.program.add_section("commandlistleaf", "", SectionKind::CommandList);
    let caller = s.section(
        "commandlistcaller",
        &[("run", "commandlistleaf"), ("checktextureoverride", "ps-t0")],
    );
    s.section("commandlistleaf", &[("if 0", ""), ("$x", "1"), ("endif", "")]);

    let stats = s.optimize();
    assert!(s.lines(caller, false).is_empty());
    assert!(s.lines(caller, true).is_empty());
    assert!(stats.removed >= 4);
    assert!(stats.passes >= 2);
}

#[test]
fn stereo_commands_vanish_when_stereo_is_off() {
    let opts = SessionOpts {
        stereo: false,
        ..SessionOpts::default()
    };
    let mut s = Script::new(opts);
    let id = s.section("commandlistmain", &[("separation", "50"), ("$x", "stereo_active")]);
    s.optimize();
    assert_eq!(s.lines(id, false), ["$x = stereo_active"]);
}
