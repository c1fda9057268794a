//! `if` / `elif` / `else` / `endif`.
//!
//! Flow control is parsed into a flat run of placeholder commands in both phase lists. When
//! `endif` arrives, each phase list is folded backward to the matching `If`: the commands after
//! it are split at the `Else` placeholder into two fresh branch lists, and the placeholder is
//! dropped. `elif` is an `else` followed by a synthetic nested `if` that the same `endif` closes.

use crate::command::parse::{DirectiveParser, OpenIf, Phase};
use crate::command::{Command, CommandKind};
use crate::engine::program::{Branches, IfBlock, Program};
use crate::expression::Expression;
use crate::foundation::error::{ScriptError, ScriptResult};
use crate::foundation::ids::{BlockId, ListId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Flow {
    If(String),
    ElseIf(String),
    Else,
    EndIf,
}

impl Flow {
    /// Recognise a flow-control line. The key carries the whole line; a loader that split a
    /// condition at its first `=` is undone by joining the value back on.
    pub(crate) fn classify(key: &str, value: &str) -> Option<Self> {
        let line = if value.is_empty() {
            key.trim().to_owned()
        } else {
            format!("{}={}", key.trim(), value)
        };
        let word_rest = |prefix: &str| {
            line.strip_prefix(prefix)
                .filter(|r| r.starts_with([' ', '\t', '(']))
                .map(|r| r.trim().to_owned())
        };
        if line == "else" {
            return Some(Self::Else);
        }
        if line == "endif" {
            return Some(Self::EndIf);
        }
        if let Some(cond) = word_rest("else if").or_else(|| word_rest("elif")) {
            return Some(Self::ElseIf(cond));
        }
        word_rest("if").map(Self::If)
    }
}

fn line_of(flow: &Flow) -> String {
    match flow {
        Flow::If(c) => format!("if {c}"),
        Flow::ElseIf(c) => format!("elif {c}"),
        Flow::Else => "else".to_owned(),
        Flow::EndIf => "endif".to_owned(),
    }
}

pub(crate) fn apply(p: &mut DirectiveParser<'_>, flow: Flow) -> ScriptResult<()> {
    let line = line_of(&flow);
    match flow {
        Flow::If(cond) => {
            let (cond, err) = parse_condition(p, &cond);
            open_block(p, cond, line, false);
            err.map_or(Ok(()), Err)
        }
        Flow::ElseIf(cond) => {
            begin_else(p, &line)?;
            // The condition belongs to the else branch, not to the enclosing if's body.
            let (cond, err) = parse_condition(p, &cond);
            open_block(p, cond, line, true);
            err.map_or(Ok(()), Err)
        }
        Flow::Else => begin_else(p, &line),
        Flow::EndIf => end_if(p),
    }
}

/// Parse a condition. A broken condition still opens a block that is never taken, so the body
/// does not leak into the enclosing list.
fn parse_condition(p: &mut DirectiveParser<'_>, src: &str) -> (Expression, Option<ScriptError>) {
    match Expression::parse(src, p) {
        Ok(e) => (e, None),
        Err(err) => (Expression::constant(0.0), Some(err)),
    }
}

fn open_block(p: &mut DirectiveParser<'_>, cond: Expression, line: String, synthetic: bool) {
    let block = p.program.new_block(IfBlock {
        cond,
        line: line.clone(),
        pre: None,
        post: None,
        synthetic,
    });
    p.push(Command::new(line.clone(), CommandKind::If(block)), Phase::Both);
    p.cx.open.push(OpenIf {
        block,
        has_else: false,
        line,
    });
    p.cx.scope.push();
}

fn begin_else(p: &mut DirectiveParser<'_>, line: &str) -> ScriptResult<()> {
    let Some(top) = p.cx.open.last_mut() else {
        return Err(ScriptError::invalid(format!("'{line}' without a matching if")));
    };
    if top.has_else {
        return Err(ScriptError::invalid(format!("'{line}' after else")));
    }
    top.has_else = true;
    p.push(Command::new(line, CommandKind::Else), Phase::Both);
    p.cx.scope.pop();
    p.cx.scope.push();
    Ok(())
}

fn end_if(p: &mut DirectiveParser<'_>) -> ScriptResult<()> {
    loop {
        let Some(open) = p.cx.open.pop() else {
            return Err(ScriptError::invalid("endif without a matching if"));
        };
        let lists = p.program.section(p.cx.section).lists;
        for post in [false, true] {
            fold(p.program, lists.phase(post), open.block, post)?;
        }
        p.cx.scope.pop();
        if !p.program.block(open.block).synthetic {
            return Ok(());
        }
    }
}

/// Move the commands after `If(block)` in `list` into the block's branch lists for this phase.
pub(crate) fn fold(program: &mut Program, list: ListId, block: BlockId, post: bool) -> ScriptResult<()> {
    if program.block(block).phase(post).is_some() {
        return Err(ScriptError::internal(format!(
            "if block {} folded twice",
            program.block(block).line
        )));
    }
    let commands = &mut program.list_mut(list).commands;
    let Some(at) = commands
        .iter()
        .rposition(|c| c.kind == CommandKind::If(block))
    else {
        return Err(ScriptError::internal("endif could not find its if"));
    };
    let mut then = commands.split_off(at + 1);
    let otherwise = match then.iter().position(|c| c.kind == CommandKind::Else) {
        Some(e) => {
            let rest = then.split_off(e + 1);
            then.pop();
            rest
        }
        None => Vec::new(),
    };

    let label = format!("{} [{}]", program.list(list).label, program.block(block).line);
    let then_id = program.new_list(label.clone(), post);
    let else_id = program.new_list(format!("{label} else"), post);
    program.list_mut(then_id).commands = then;
    program.list_mut(else_id).commands = otherwise;
    let branches = Some(Branches {
        then: then_id,
        otherwise: else_id,
    });
    let b = program.block_mut(block);
    if post {
        b.post = branches;
    } else {
        b.pre = branches;
    }
    Ok(())
}

#[cfg(test)]
#[path = "../../tests/unit/command/flow.rs"]
mod tests;
