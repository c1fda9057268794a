use smallvec::SmallVec;

use crate::device::{ClearValue, Device, DrawCall, ResourceHandle, ViewHandle, ViewKind};
use crate::engine::program::Program;
use crate::engine::state::{CallInfo, State};
use crate::expression::{EvalCtx, Expression, Resolve};
use crate::foundation::error::{ScriptError, ScriptResult};
use crate::foundation::opts::SessionOpts;
use crate::resource::desc::BindFlags;
use crate::resource::target::{ResourceCopyTarget, parse_target};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrawKind {
    Draw,
    DrawIndexed,
    DrawInstanced,
    DrawIndexedInstanced,
    Dispatch,
}

impl DrawKind {
    fn from_key(key: &str) -> Option<Self> {
        Some(match key {
            "draw" => Self::Draw,
            "drawindexed" => Self::DrawIndexed,
            "drawinstanced" => Self::DrawInstanced,
            "drawindexedinstanced" => Self::DrawIndexedInstanced,
            "dispatch" => Self::Dispatch,
            _ => return None,
        })
    }

    fn arity(self) -> usize {
        match self {
            Self::Draw => 2,
            Self::DrawIndexed | Self::Dispatch => 3,
            Self::DrawInstanced => 4,
            Self::DrawIndexedInstanced => 5,
        }
    }

    fn call(self, a: &[f32]) -> DrawCall {
        let u = |i: usize| a[i].max(0.0) as u32;
        let i = |i: usize| a[i] as i32;
        match self {
            Self::Draw => DrawCall::Draw {
                vertex_count: u(0),
                start_vertex: u(1),
            },
            Self::DrawIndexed => DrawCall::DrawIndexed {
                index_count: u(0),
                start_index: u(1),
                base_vertex: i(2),
            },
            Self::DrawInstanced => DrawCall::DrawInstanced {
                vertex_count: u(0),
                instance_count: u(1),
                start_vertex: u(2),
                start_instance: u(3),
            },
            Self::DrawIndexedInstanced => DrawCall::DrawIndexedInstanced {
                index_count: u(0),
                instance_count: u(1),
                start_index: u(2),
                base_vertex: i(3),
                start_instance: u(4),
            },
            Self::Dispatch => DrawCall::Dispatch {
                x: u(0),
                y: u(1),
                z: u(2),
            },
        }
    }
}

/// A draw or dispatch issued from a command list.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum DrawCommand {
    /// Re-issue the caller's draw.
    FromCaller,
    Auto,
    Call {
        kind: DrawKind,
        args: SmallVec<[Expression; 5]>,
    },
}

impl DrawCommand {
    pub(crate) fn is_draw_key(key: &str) -> bool {
        key == "drawauto" || DrawKind::from_key(key).is_some()
    }

    pub(crate) fn parse(key: &str, value: &str, r: &mut dyn Resolve) -> ScriptResult<Self> {
        if key == "drawauto" {
            return Ok(Self::Auto);
        }
        let kind = DrawKind::from_key(key)
            .ok_or_else(|| ScriptError::invalid(format!("unknown draw directive '{key}'")))?;
        if value.trim() == "from_caller" {
            return Ok(Self::FromCaller);
        }
        let args = value
            .split(',')
            .map(|a| Expression::parse(a, r))
            .collect::<ScriptResult<SmallVec<[Expression; 5]>>>()?;
        if args.len() != kind.arity() {
            return Err(ScriptError::invalid(format!(
                "{key} takes {} arguments, got {}",
                kind.arity(),
                args.len()
            )));
        }
        Ok(Self::Call { kind, args })
    }

    pub(crate) fn optimize(&mut self, opts: &SessionOpts) -> bool {
        match self {
            Self::Call { args, .. } => args.iter_mut().fold(false, |c, a| a.optimize(opts) | c),
            _ => false,
        }
    }

    pub(crate) fn run(
        &self,
        program: &Program,
        state: &State,
        device: &mut dyn Device,
        call: &CallInfo,
    ) {
        let issued = match self {
            Self::FromCaller => match call.draw {
                Some(d) => d,
                None => {
                    tracing::debug!("draw = from_caller outside of a draw call");
                    return;
                }
            },
            Self::Auto => DrawCall::DrawAuto,
            Self::Call { kind, args } => {
                let values: SmallVec<[f32; 5]> = {
                    let ctx = EvalCtx {
                        state,
                        program,
                        device: &*device,
                        call,
                    };
                    args.iter().map(|a| a.evaluate(&ctx)).collect()
                };
                kind.call(&values)
            }
        };
        device.draw(&issued);
    }
}

/// `clear = <target> [values..] [depth] [stencil] [int]`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ClearCommand {
    pub(crate) target: ResourceCopyTarget,
    values: SmallVec<[f32; 4]>,
    depth: bool,
    stencil: bool,
    int: bool,
}

impl ClearCommand {
    pub(crate) fn parse(value: &str, r: &mut dyn Resolve) -> ScriptResult<Self> {
        let mut target = None;
        let mut values: SmallVec<[f32; 4]> = SmallVec::new();
        let (mut depth, mut stencil, mut int) = (false, false, false);
        for word in value.split_whitespace() {
            match word {
                "depth" => depth = true,
                "stencil" => stencil = true,
                "int" => int = true,
                _ => {
                    if let Some(v) = parse_clear_value(word) {
                        if values.len() == 4 {
                            return Err(ScriptError::invalid("clear takes at most four values"));
                        }
                        values.push(v);
                    } else if let Some(t) = parse_target(word, r)? {
                        if target.replace(t).is_some() {
                            return Err(ScriptError::invalid("clear takes a single target"));
                        }
                    } else {
                        return Err(ScriptError::invalid(format!("unknown clear argument '{word}'")));
                    }
                }
            }
        }
        let target = target.ok_or_else(|| ScriptError::invalid("clear needs a target"))?;
        if target.is_source_only() {
            return Err(ScriptError::invalid(format!("{target} cannot be cleared")));
        }
        Ok(Self {
            target,
            values,
            depth,
            stencil,
            int,
        })
    }

    fn value(&self, kind: ViewKind) -> ClearValue {
        let v = |i: usize| {
            self.values
                .get(i)
                .or(if self.values.len() == 1 { self.values.first() } else { None })
                .copied()
                .unwrap_or(0.0)
        };
        if kind == ViewKind::DepthStencil {
            let both = !self.depth && !self.stencil;
            return ClearValue::DepthStencil {
                depth: (both || self.depth).then(|| v(0)),
                stencil: (both || self.stencil).then(|| v(1) as u8),
            };
        }
        if self.int {
            ClearValue::Uint([0, 1, 2, 3].map(|i| v(i) as u32))
        } else {
            ClearValue::Float([0, 1, 2, 3].map(v))
        }
    }

    pub(crate) fn run(&self, state: &mut State, device: &mut dyn Device, call: &CallInfo) {
        if let ResourceCopyTarget::Custom(id) = self.target {
            let resolution = state.frame.resolution;
            state.resource_mut(id).substantiate(device, resolution);
        }
        let Some(bound) = self.target.get(state, device, call) else {
            return;
        };
        let Some((view, kind)) = self.view(state, device, bound.view, bound.resource) else {
            tracing::debug!(target = %self.target, "nothing to clear through");
            return;
        };
        device.clear_view(view, self.value(kind));
    }

    fn view(
        &self,
        state: &mut State,
        device: &mut dyn Device,
        bound: Option<ViewHandle>,
        res: ResourceHandle,
    ) -> Option<(ViewHandle, ViewKind)> {
        match self.target {
            ResourceCopyTarget::Slot(slot) => bound.map(|v| (v, slot.view_kind())),
            ResourceCopyTarget::Custom(id) => {
                let desc = device.desc(res)?;
                let kind = [
                    (BindFlags::RENDER_TARGET, ViewKind::RenderTarget),
                    (BindFlags::DEPTH_STENCIL, ViewKind::DepthStencil),
                    (BindFlags::UNORDERED_ACCESS, ViewKind::UnorderedAccess),
                ]
                .into_iter()
                .find(|(flag, _)| desc.bind.contains(*flag))
                .map(|(_, k)| k)?;
                let view = state
                    .resource_mut(id)
                    .views
                    .get(device, res, kind, false, true)?;
                Some((view, kind))
            }
            _ => None,
        }
    }
}

fn parse_clear_value(word: &str) -> Option<f32> {
    if let Some(hex) = word.strip_prefix("0x") {
        return u32::from_str_radix(hex, 16).ok().map(|v| v as f32);
    }
    word.parse().ok()
}
