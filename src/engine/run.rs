use std::time::Instant;

use smallvec::SmallVec;

use crate::command::{Command, CommandKind, Handling, StereoParam};
use crate::device::Device;
use crate::engine::program::Program;
use crate::engine::state::{CallInfo, RunState, State};
use crate::expression::EvalCtx;
use crate::foundation::ids::ListId;
use crate::variables::store::Slot;

/// Run a list as a (possibly nested) invocation, subject to the recursion ceiling.
pub(crate) fn run_list(
    program: &Program,
    state: &mut State,
    device: &mut dyn Device,
    call: &CallInfo,
    rs: &mut RunState,
    list: ListId,
) {
    if rs.depth >= state.opts.recursion_limit {
        if !rs.limit_warned {
            tracing::warn!(
                list = %program.list(list).label,
                limit = state.opts.recursion_limit,
                "command list recursion limit exceeded; aborting invocation"
            );
            rs.limit_warned = true;
            state.profiler.recursion_limit_hits += 1;
        }
        rs.abort = true;
        return;
    }
    rs.depth += 1;
    run_body(program, state, device, call, rs, list);
    rs.depth -= 1;
}

/// Run the commands of `list` in order until they finish or an abort is raised.
pub(crate) fn run_body(
    program: &Program,
    state: &mut State,
    device: &mut dyn Device,
    call: &CallInfo,
    rs: &mut RunState,
    list: ListId,
) {
    let cl = program.list(list);
    if cl.commands.is_empty() {
        return;
    }
    let profiling = state.opts.profiling;
    let timer = profiling.lists().then(|| state.profiler.enter());

    for (i, cmd) in cl.commands.iter().enumerate() {
        if rs.abort {
            break;
        }
        let t0 = profiling.commands().then(Instant::now);
        run_command(program, state, device, call, rs, cmd, cl.post);
        if let Some(t0) = t0 {
            state.profiler.record_command(list, i, t0.elapsed());
        }
    }

    if let Some(timer) = timer {
        state.profiler.exit(list, timer);
    }
}

fn run_command(
    program: &Program,
    state: &mut State,
    device: &mut dyn Device,
    call: &CallInfo,
    rs: &mut RunState,
    cmd: &Command,
    post: bool,
) {
    macro_rules! eval {
        ($expr:expr) => {{
            let ctx = EvalCtx {
                state: &*state,
                program,
                device: &*device,
                call,
            };
            $expr.evaluate(&ctx)
        }};
    }

    match &cmd.kind {
        CommandKind::AssignParam { flat, expr } => {
            let v = eval!(expr);
            state.params.set(*flat, v);
        }
        CommandKind::AssignVar { target, expr } => {
            let v = eval!(expr);
            state.vars.set_range(*target, std::iter::repeat(v));
        }
        CommandKind::CopyVars { dst, src } => {
            let values: SmallVec<[f32; 16]> = (0..src.len)
                .map(|i| state.vars.get(Slot(src.start.0 + i)))
                .collect();
            state.vars.set_range(*dst, values);
        }
        CommandKind::SetStereo { param, expr } => {
            if !state.opts.stereo {
                return;
            }
            let v = eval!(expr);
            let Some(stereo) = device.stereo_mut() else {
                tracing::trace!(line = %cmd.line, "no stereo driver");
                return;
            };
            let result = match param {
                StereoParam::Separation => stereo.set_separation(v),
                StereoParam::Convergence => stereo.set_convergence(v),
            };
            if let Err(status) = result {
                tracing::debug!(line = %cmd.line, %status, "stereo parameter not set");
            }
        }
        CommandKind::Copy(copy) => copy.run(state, device, call),
        CommandKind::Clear(clear) => clear.run(state, device, call),
        CommandKind::If(id) => {
            let block = program.block(*id);
            let Some(branches) = block.phase(post) else {
                tracing::error!(line = %block.line, post, "BUG: if block was never finalized for this phase");
                return;
            };
            let taken = if eval!(block.cond) != 0.0 {
                branches.then
            } else {
                branches.otherwise
            };
            run_body(program, state, device, call, rs, taken);
        }
        CommandKind::Else => {}
        CommandKind::Run { lists, .. } => {
            run_list(program, state, device, call, rs, lists.phase(post));
        }
        CommandKind::CheckTextureOverride(target) => {
            let Some(bound) = target.get(state, device, call) else {
                return;
            };
            let Some(ov) = device
                .resource_hash(bound.resource)
                .and_then(|hash| program.texture_overrides.get(&hash))
            else {
                return;
            };
            let inner = CallInfo {
                this: Some(bound.resource),
                ..*call
            };
            run_list(program, state, device, &inner, rs, ov.lists.phase(post));
        }
        CommandKind::Preset { id, exclude } => {
            let preset = state.preset_mut(*id);
            if *exclude {
                preset.exclude();
            } else {
                preset.trigger();
            }
        }
        CommandKind::Draw(draw) => draw.run(program, state, device, call),
        CommandKind::Handling(Handling::Skip) => rs.skip = true,
        CommandKind::Handling(Handling::Abort) => rs.abort = true,
        CommandKind::ResetPerFrameLimits(id) => state.resource_mut(*id).copies_this_frame = 0,
    }
}

#[cfg(test)]
#[path = "../../tests/unit/engine/run.rs"]
mod tests;
