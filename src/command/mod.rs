//! Commands: the executable units of a command list, and the directive parser that builds them.

pub(crate) mod assign;
pub(crate) mod draw;
pub(crate) mod flow;
pub(crate) mod parse;

use crate::engine::program::Program;
use crate::expression::Expression;
use crate::foundation::ids::{BlockId, CustomResourceId, ListPair, PresetId, SectionId};
use crate::foundation::opts::SessionOpts;
use crate::resource::copy::CopyCommand;
use crate::resource::target::ResourceCopyTarget;
use crate::variables::store::VarRange;

pub(crate) use draw::{ClearCommand, DrawCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StereoParam {
    Separation,
    Convergence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handling {
    Skip,
    Abort,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CommandKind {
    AssignParam {
        flat: u32,
        expr: Expression,
    },
    /// Broadcast one value into every cell of `target`.
    AssignVar {
        target: VarRange,
        expr: Expression,
    },
    CopyVars {
        dst: VarRange,
        src: VarRange,
    },
    SetStereo {
        param: StereoParam,
        expr: Expression,
    },
    Copy(CopyCommand),
    Clear(ClearCommand),
    If(BlockId),
    /// Placeholder between an `if` and its `endif`; never survives folding.
    Else,
    Run {
        section: SectionId,
        lists: ListPair,
    },
    CheckTextureOverride(ResourceCopyTarget),
    Preset {
        id: PresetId,
        exclude: bool,
    },
    Draw(DrawCommand),
    Handling(Handling),
    ResetPerFrameLimits(CustomResourceId),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    /// Directive the command was parsed from, for logs and profiling.
    pub(crate) line: String,
    pub(crate) kind: CommandKind,
}

impl Command {
    pub(crate) fn new(line: impl Into<String>, kind: CommandKind) -> Self {
        Self {
            line: line.into(),
            kind,
        }
    }

    /// Whether running the command in phase `post` can have no effect.
    pub(crate) fn is_noop(&self, program: &Program, opts: &SessionOpts, post: bool) -> bool {
        match &self.kind {
            CommandKind::Else => true,
            CommandKind::SetStereo { .. } => !opts.stereo,
            CommandKind::Run { lists, .. } => program.list(lists.phase(post)).commands.is_empty(),
            CommandKind::If(block) => match program.block(*block).phase(post) {
                Some(b) => {
                    program.list(b.then).commands.is_empty()
                        && program.list(b.otherwise).commands.is_empty()
                }
                None => false,
            },
            CommandKind::CheckTextureOverride(_) => program.texture_overrides_noop(post),
            _ => false,
        }
    }

    /// Fold constant expressions. Returns whether anything changed.
    pub(crate) fn optimize(&mut self, opts: &SessionOpts) -> bool {
        match &mut self.kind {
            CommandKind::AssignParam { expr, .. }
            | CommandKind::AssignVar { expr, .. }
            | CommandKind::SetStereo { expr, .. } => expr.optimize(opts),
            CommandKind::Draw(draw) => draw.optimize(opts),
            _ => false,
        }
    }
}
