use super::*;
use crate::command::parse::SectionParse;
use crate::engine::program::SectionKind;
use crate::engine::state::State;
use crate::foundation::opts::SessionOpts;

struct Fixture {
    program: Program,
    state: State,
    cx: SectionParse,
}

impl Fixture {
    fn new() -> Self {
        let mut program = Program::default();
        let section = program.add_section("commandlisttest", "", SectionKind::CommandList);
        Self {
            program,
            state: State::new(SessionOpts::default()),
            cx: SectionParse::new(section, ""),
        }
    }

    fn parse(&mut self, line: &str) -> ScriptResult<()> {
        self.directive(line, "")
    }

    fn directive(&mut self, key: &str, value: &str) -> ScriptResult<()> {
        DirectiveParser {
            program: &mut self.program,
            state: &mut self.state,
            cx: &mut self.cx,
        }
        .parse(key, value)
    }

    fn pre(&self) -> &[Command] {
        let lists = self.program.section(self.cx.section).lists;
        &self.program.list(lists.pre).commands
    }
}

fn if_block(cmd: &Command) -> BlockId {
    match cmd.kind {
        CommandKind::If(b) => b,
        ref other => panic!("expected an if, got {other:?}"),
    }
}

#[test]
fn classify_recognises_flow_lines() {
    assert_eq!(Flow::classify("if $x", "= 1"), Some(Flow::If("$x== 1".into())));
    assert_eq!(Flow::classify("if(1)", ""), Some(Flow::If("(1)".into())));
    assert_eq!(Flow::classify("elif 0", ""), Some(Flow::ElseIf("0".into())));
    assert_eq!(Flow::classify("else if 0", ""), Some(Flow::ElseIf("0".into())));
    assert_eq!(Flow::classify("else", ""), Some(Flow::Else));
    assert_eq!(Flow::classify("endif", ""), Some(Flow::EndIf));
    assert_eq!(Flow::classify("iffy", "1"), None);
    assert_eq!(Flow::classify("elsewhere", ""), None);
}

#[test]
fn endif_splits_the_body_at_else() {
    let mut f = Fixture::new();
    f.parse("if 1").unwrap();
    f.directive("y", "2").unwrap();
    f.parse("else").unwrap();
    f.directive("z", "3").unwrap();
    f.parse("endif").unwrap();

    assert_eq!(f.pre().len(), 1);
    let block = f.program.block(if_block(&f.pre()[0]));
    let pre = block.pre.unwrap();
    assert_eq!(f.program.list(pre.then).commands[0].line, "y = 2");
    assert_eq!(f.program.list(pre.otherwise).commands[0].line, "z = 3");
    assert_eq!(f.program.list(pre.then).label, "commandlisttest [if 1]");
    assert_eq!(f.program.list(pre.otherwise).label, "commandlisttest [if 1] else");
    assert!(block.post.is_some());
}

#[test]
fn elif_chain_nests_under_one_if() {
    let mut f = Fixture::new();
    for line in ["if 0", "elif 0", "elif 1", "else", "endif"] {
        f.parse(line).unwrap();
    }
    assert!(f.cx.open.is_empty());
    assert_eq!(f.cx.scope.depth(), 0);
    assert_eq!(f.pre().len(), 1);

    let mut depth = 0;
    let mut block = if_block(&f.pre()[0]);
    loop {
        depth += 1;
        let otherwise = f.program.block(block).pre.unwrap().otherwise;
        match f.program.list(otherwise).commands.as_slice() {
            [cmd] if matches!(cmd.kind, CommandKind::If(_)) => block = if_block(cmd),
            _ => break,
        }
    }
    assert_eq!(depth, 3);
    assert!(f.program.block(block).synthetic);
}

#[test]
fn unmatched_flow_is_rejected() {
    let mut f = Fixture::new();
    assert!(f.parse("else").is_err());
    assert!(f.parse("elif 1").is_err());
    assert!(f.parse("endif").is_err());

    f.parse("if 1").unwrap();
    f.parse("else").unwrap();
    assert!(f.parse("else").is_err());
    assert!(f.parse("elif 1").is_err());
    f.parse("endif").unwrap();
    assert!(f.pre().iter().all(|c| c.kind != CommandKind::Else));
}

#[test]
fn broken_condition_opens_a_block_that_is_never_taken() {
    let mut f = Fixture::new();
    assert!(matches!(f.parse("if 1 +"), Err(ScriptError::Syntax(_))));
    assert_eq!(f.cx.open.len(), 1);
    f.parse("endif").unwrap();
    let block = f.program.block(if_block(&f.pre()[0]));
    assert_eq!(block.cond.static_evaluate(&SessionOpts::default()), Some(0.0));
}

#[test]
fn folding_twice_is_an_internal_error() {
    let mut f = Fixture::new();
    f.parse("if 1").unwrap();
    f.parse("endif").unwrap();
    let block = if_block(&f.pre()[0]);
    let pre = f.program.section(f.cx.section).lists.pre;
    assert!(matches!(
        fold(&mut f.program, pre, block, false),
        Err(ScriptError::Internal(_))
    ));
}
