use super::*;
use crate::command::parse::{DirectiveParser, SectionParse};
use crate::device::{BindSlot, Binding, DrawCall, ShaderStage, SoftDevice};
use crate::engine::program::{Override, SectionKind};
use crate::foundation::ids::SectionId;
use crate::foundation::opts::{ProfilingMode, SessionOpts};
use crate::resource::desc::{BindFlags, ResourceDesc};
use crate::variables::store::VarShape;

struct Script {
    program: Program,
    state: State,
}

impl Script {
    fn new(opts: SessionOpts) -> Self {
        let mut state = State::new(opts);
        for name in ["$x", "$y", "$n"] {
            state.vars.declare_global(name, VarShape::Scalar, false).unwrap();
        }
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

    fn run(&mut self, device: &mut SoftDevice, id: SectionId, call: &CallInfo, post: bool) -> RunState {
        let mut rs = RunState::default();
        let list = self.program.section(id).lists.phase(post);
        run_list(&self.program, &mut self.state, device, call, &mut rs, list);
        rs
    }

    fn var(&self, name: &str) -> f32 {
        self.state.vars.value(self.state.vars.global(name).unwrap())[0]
    }
}

#[test]
fn assignments_and_branches_run_in_order() {
    let mut s = Script::new(SessionOpts::default());
    let id = s.section(
        "commandlistmain",
        &[
            ("$x", "2 + 3 * 4"),
            ("if $x == 14", ""),
            ("$y", "20"),
            ("else", ""),
            ("$y", "-1"),
            ("endif", ""),
        ],
    );
    let mut dev = SoftDevice::new();
    s.run(&mut dev, id, &CallInfo::default(), false);
    assert_eq!(s.var("$x"), 14.0);
    assert_eq!(s.var("$y"), 20.0);
}

#[test]
fn post_commands_run_only_in_the_post_phase() {
    let mut s = Script::new(SessionOpts::default());
    let id = s.section("commandlistmain", &[("$x", "1"), ("post $y", "2")]);
    let mut dev = SoftDevice::new();
    s.run(&mut dev, id, &CallInfo::default(), true);
    assert_eq!((s.var("$x"), s.var("$y")), (0.0, 2.0));
}

#[test]
fn recursion_is_cut_off_with_one_warning() {
    let opts = SessionOpts {
        recursion_limit: 8,
        ..SessionOpts::default()
    };
    let mut s = Script::new(opts);
    s.program.add_section("commandlistloop", "", SectionKind::CommandList);
    let id = s.section("commandlistloop", &[("$n", "$n + 1"), ("run", "commandlistloop")]);
    let mut dev = SoftDevice::new();

    let rs = s.run(&mut dev, id, &CallInfo::default(), false);
    assert!(rs.abort);
    assert!(rs.limit_warned);
    assert_eq!(rs.depth, 0);
    assert_eq!(s.var("$n"), 8.0);
    assert_eq!(s.state.profiler.recursion_limit_hits, 1);
}

#[test]
fn handling_abort_stops_the_invocation() {
    let mut s = Script::new(SessionOpts::default());
    s.section("commandlistinner", &[("handling", "abort"), ("$y", "1")]);
    let id = s.section(
        "commandlistmain",
        &[("$x", "1"), ("run", "commandlistinner"), ("$x", "2")],
    );
    let mut dev = SoftDevice::new();
    let rs = s.run(&mut dev, id, &CallInfo::default(), false);
    assert!(rs.abort);
    assert_eq!((s.var("$x"), s.var("$y")), (1.0, 0.0));
}

#[test]
fn handling_skip_lets_the_list_finish() {
    let mut s = Script::new(SessionOpts::default());
    let id = s.section("commandlistmain", &[("handling", "skip"), ("$x", "3")]);
    let mut dev = SoftDevice::new();
    let rs = s.run(&mut dev, id, &CallInfo::default(), false);
    assert!(rs.skip);
    assert!(!rs.abort);
    assert_eq!(s.var("$x"), 3.0);
}

#[test]
fn draws_use_the_callers_arguments_or_their_own() {
    let mut s = Script::new(SessionOpts::default());
    let id = s.section(
        "commandlistmain",
        &[("draw", "from_caller"), ("draw", "vertex_count * 2, 0")],
    );
    let mut dev = SoftDevice::new();
    let call = CallInfo::draw(DrawCall::Draw {
        vertex_count: 6,
        start_vertex: 3,
    });
    s.run(&mut dev, id, &call, false);
    assert_eq!(
        dev.draws(),
        &[
            DrawCall::Draw {
                vertex_count: 6,
                start_vertex: 3
            },
            DrawCall::Draw {
                vertex_count: 12,
                start_vertex: 0
            },
        ]
    );
}

#[test]
fn texture_overrides_run_for_matching_resources() {
    let mut s = Script::new(SessionOpts::default());
    let tex = s.section("textureoverridefoo", &[("$y", "7")]);
    let lists = s.program.section(tex).lists;
    s.program.texture_overrides.insert(
        0xabcd,
        Override {
            section: tex,
            lists,
            filter_index: 1.0,
        },
    );
    let id = s.section("commandlistmain", &[("checktextureoverride", "ps-t0")]);

    let mut dev = SoftDevice::new();
    s.run(&mut dev, id, &CallInfo::default(), false);
    assert_eq!(s.var("$y"), 0.0);

    let res = dev
        .create_resource(&ResourceDesc::buffer(4, BindFlags::SHADER_RESOURCE), None)
        .unwrap();
    dev.set_resource_hash(res, 0xabcd);
    dev.bind(
        BindSlot::ShaderResource(ShaderStage::Pixel, 0),
        Some(Binding::resource(res)),
    );
    s.run(&mut dev, id, &CallInfo::default(), false);
    assert_eq!(s.var("$y"), 7.0);
}

#[test]
fn profiling_counts_lists_and_commands() {
    let opts = SessionOpts {
        profiling: ProfilingMode::Commands,
        ..SessionOpts::default()
    };
    let mut s = Script::new(opts);
    s.section("commandlistinner", &[("$y", "1")]);
    let id = s.section("commandlistmain", &[("$x", "1"), ("run", "commandlistinner")]);
    let mut dev = SoftDevice::new();
    s.run(&mut dev, id, &CallInfo::default(), false);
    s.run(&mut dev, id, &CallInfo::default(), false);

    let report = s.state.profiler.report(&s.program);
    assert_eq!(report.lists.len(), 2);
    let main = report
        .lists
        .iter()
        .find(|l| l.label == "commandlistmain")
        .unwrap();
    assert_eq!(main.invocations, 2);
    assert!(!main.post);
    assert_eq!(main.commands.len(), 2);
    assert_eq!(main.commands[1].line, "run = commandlistinner");
    assert!(main.exclusive_us <= main.cumulative_us);

    s.state.profiler.reset();
    assert!(s.state.profiler.report(&s.program).lists.is_empty());
}
