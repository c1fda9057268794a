use crate::command::CommandKind;
use crate::engine::program::Program;
use crate::foundation::ids::ListId;
use crate::foundation::opts::SessionOpts;

/// What one optimizer run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct OptimizeStats {
    pub(crate) passes: u32,
    pub(crate) folded: u32,
    pub(crate) inlined: u32,
    pub(crate) removed: u32,
}

/// Fold, refresh the texture override flags and drop no-ops until nothing changes.
pub(crate) fn optimize(program: &mut Program, opts: &SessionOpts) -> OptimizeStats {
    let mut stats = OptimizeStats::default();
    loop {
        stats.passes += 1;
        let mut changed = false;

        for l in 0..program.lists.len() {
            changed |= fold_list(program, opts, ListId(l as u32), &mut stats);
        }
        changed |= program.refresh_texture_noop();
        for l in 0..program.lists.len() {
            changed |= remove_noops(program, opts, ListId(l as u32), &mut stats);
        }

        if !changed {
            break;
        }
    }
    if stats.folded + stats.inlined + stats.removed > 0 {
        tracing::info!(
            passes = stats.passes,
            folded = stats.folded,
            inlined = stats.inlined,
            removed = stats.removed,
            "command lists optimized"
        );
    }
    stats
}

/// Constant-fold every command in `list` and splice in `if` branches with static conditions.
fn fold_list(program: &mut Program, opts: &SessionOpts, list: ListId, stats: &mut OptimizeStats) -> bool {
    let post = program.list(list).post;
    let mut changed = false;
    let mut i = 0;
    while i < program.list(list).commands.len() {
        let cmd = &mut program.list_mut(list).commands[i];
        if cmd.optimize(opts) {
            stats.folded += 1;
            changed = true;
        }
        let CommandKind::If(block) = cmd.kind else {
            i += 1;
            continue;
        };

        let b = program.block_mut(block);
        if b.cond.optimize(opts) {
            stats.folded += 1;
            changed = true;
        }
        let (Some(value), Some(branches)) = (b.cond.static_evaluate(opts), b.phase(post)) else {
            i += 1;
            continue;
        };
        let taken = if value != 0.0 {
            branches.then
        } else {
            branches.otherwise
        };
        tracing::info!(
            list = %program.list(list).label,
            line = %program.block(block).line,
            taken = value != 0.0,
            "inlining if with a constant condition"
        );
        let body = std::mem::take(&mut program.list_mut(taken).commands);
        program.list_mut(list).commands.splice(i..=i, body);
        stats.inlined += 1;
        changed = true;
    }
    changed
}

fn remove_noops(program: &mut Program, opts: &SessionOpts, list: ListId, stats: &mut OptimizeStats) -> bool {
    let cl = program.list(list);
    let noop: Vec<bool> = cl
        .commands
        .iter()
        .map(|c| c.is_noop(program, opts, cl.post))
        .collect();
    if !noop.contains(&true) {
        return false;
    }
    let label = cl.label.clone();
    let mut flags = noop.into_iter();
    program.list_mut(list).commands.retain(|c| {
        let drop = flags.next().unwrap_or(false);
        if drop {
            tracing::info!(list = %label, line = %c.line, "removed no-op command");
            stats.removed += 1;
        }
        !drop
    });
    true
}

#[cfg(test)]
#[path = "../../tests/unit/engine/optimize.rs"]
mod tests;
