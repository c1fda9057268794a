use std::fmt;

use smallvec::SmallVec;

use crate::device::{BindSlot, DrawCall, ShaderStage, SystemResource};
use crate::expression::error::SyntaxError;
use crate::expression::lexer::TokenKind;
use crate::expression::{EvalCtx, Resolve};
use crate::foundation::error::{ScriptError, ScriptResult};
use crate::foundation::opts::SessionOpts;
use crate::resource::target::{ResourceCopyTarget, parse_target};
use crate::variables::store::{Slot, VarShape, flat_param, parse_ini_param};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScissorEdge {
    Left,
    Top,
    Right,
    Bottom,
}

/// What an operand reads, resolved once at parse time.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum OperandKind {
    Literal(f32),
    IniParam(u32),
    Variable(Slot),
    Time,
    Hunting,
    FrameAnalysis,
    Sli,
    RtWidth,
    RtHeight,
    ResWidth,
    ResHeight,
    WindowWidth,
    WindowHeight,
    BackBufferWidth,
    BackBufferHeight,
    CursorX,
    CursorY,
    CursorScreenX,
    CursorScreenY,
    CursorWindowX,
    CursorWindowY,
    CursorShowing,
    CursorHotspotX,
    CursorHotspotY,
    StereoActive,
    StereoAvailable,
    Separation,
    Convergence,
    EffectiveDpi,
    VertexCount,
    IndexCount,
    InstanceCount,
    FirstVertex,
    FirstIndex,
    FirstInstance,
    ThreadGroupX,
    ThreadGroupY,
    ThreadGroupZ,
    Indirect,
    Scissor { index: u32, edge: ScissorEdge },
    TextureFilter(Box<ResourceCopyTarget>),
    ShaderFilter(ShaderStage),
}

fn keyword(ident: &str) -> Option<OperandKind> {
    let kind = match ident {
        "time" => OperandKind::Time,
        "hunting" => OperandKind::Hunting,
        "frame_analysis" => OperandKind::FrameAnalysis,
        "sli" => OperandKind::Sli,
        "rt_width" => OperandKind::RtWidth,
        "rt_height" => OperandKind::RtHeight,
        "res_width" => OperandKind::ResWidth,
        "res_height" => OperandKind::ResHeight,
        "window_width" => OperandKind::WindowWidth,
        "window_height" => OperandKind::WindowHeight,
        "bb_width" => OperandKind::BackBufferWidth,
        "bb_height" => OperandKind::BackBufferHeight,
        "cursor_x" => OperandKind::CursorX,
        "cursor_y" => OperandKind::CursorY,
        "cursor_screen_x" => OperandKind::CursorScreenX,
        "cursor_screen_y" => OperandKind::CursorScreenY,
        "cursor_window_x" => OperandKind::CursorWindowX,
        "cursor_window_y" => OperandKind::CursorWindowY,
        "cursor_showing" => OperandKind::CursorShowing,
        "cursor_hotspot_x" => OperandKind::CursorHotspotX,
        "cursor_hotspot_y" => OperandKind::CursorHotspotY,
        "stereo_active" => OperandKind::StereoActive,
        "stereo_available" => OperandKind::StereoAvailable,
        "separation" => OperandKind::Separation,
        "convergence" => OperandKind::Convergence,
        "effective_dpi" => OperandKind::EffectiveDpi,
        "vertex_count" => OperandKind::VertexCount,
        "index_count" => OperandKind::IndexCount,
        "instance_count" => OperandKind::InstanceCount,
        "first_vertex" => OperandKind::FirstVertex,
        "first_index" => OperandKind::FirstIndex,
        "first_instance" => OperandKind::FirstInstance,
        "thread_group_count_x" => OperandKind::ThreadGroupX,
        "thread_group_count_y" => OperandKind::ThreadGroupY,
        "thread_group_count_z" => OperandKind::ThreadGroupZ,
        "indirect" => OperandKind::Indirect,
        _ => return None,
    };
    Some(kind)
}

/// Expression leaf.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Operand {
    pub(crate) kind: OperandKind,
    /// Source text, kept for diagnostics and optimizer logs.
    pub(crate) text: String,
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl Operand {
    pub(crate) fn literal(value: f32) -> Self {
        Self {
            kind: OperandKind::Literal(value),
            text: format_literal(value),
        }
    }

    pub(crate) fn static_eval(&self, opts: &SessionOpts) -> Option<f32> {
        match self.kind {
            OperandKind::Literal(v) => Some(v),
            OperandKind::Hunting => Some(bool_f32(opts.hunting)),
            OperandKind::FrameAnalysis => Some(bool_f32(opts.frame_analysis)),
            OperandKind::Sli => Some(bool_f32(opts.sli)),
            OperandKind::StereoActive | OperandKind::StereoAvailable if !opts.stereo => Some(0.0),
            _ => None,
        }
    }

    pub(crate) fn eval(&self, ctx: &EvalCtx<'_>) -> f32 {
        let state = ctx.state;
        let frame = &state.frame;
        let draw = ctx.call.draw;
        match &self.kind {
            OperandKind::Literal(v) => *v,
            OperandKind::IniParam(flat) => state.params.get(*flat),
            OperandKind::Variable(slot) => state.vars.get(*slot),
            OperandKind::Time => frame.time,
            OperandKind::Hunting => bool_f32(state.opts.hunting),
            OperandKind::FrameAnalysis => bool_f32(state.opts.frame_analysis),
            OperandKind::Sli => bool_f32(state.opts.sli),
            OperandKind::RtWidth | OperandKind::RtHeight => {
                let desc = ctx
                    .device
                    .bound(BindSlot::RenderTarget(0))
                    .and_then(|b| ctx.device.desc(b.resource));
                desc.map_or(0.0, |d| {
                    if self.kind == OperandKind::RtWidth {
                        d.width as f32
                    } else {
                        d.height as f32
                    }
                })
            }
            OperandKind::ResWidth => frame.resolution.0 as f32,
            OperandKind::ResHeight => frame.resolution.1 as f32,
            OperandKind::WindowWidth => frame.window.0 as f32,
            OperandKind::WindowHeight => frame.window.1 as f32,
            OperandKind::BackBufferWidth | OperandKind::BackBufferHeight => {
                let desc = ctx
                    .device
                    .system_resource(SystemResource::BackBuffer)
                    .and_then(|r| ctx.device.desc(r));
                desc.map_or(0.0, |d| {
                    if self.kind == OperandKind::BackBufferWidth {
                        d.width as f32
                    } else {
                        d.height as f32
                    }
                })
            }
            OperandKind::CursorX => ratio(frame.cursor.window.0, frame.window.0),
            OperandKind::CursorY => ratio(frame.cursor.window.1, frame.window.1),
            OperandKind::CursorScreenX => frame.cursor.screen.0,
            OperandKind::CursorScreenY => frame.cursor.screen.1,
            OperandKind::CursorWindowX => frame.cursor.window.0,
            OperandKind::CursorWindowY => frame.cursor.window.1,
            OperandKind::CursorShowing => bool_f32(frame.cursor.showing),
            OperandKind::CursorHotspotX => frame.cursor.hotspot.0,
            OperandKind::CursorHotspotY => frame.cursor.hotspot.1,
            OperandKind::StereoActive => bool_f32(
                state.opts.stereo && ctx.device.stereo().is_some_and(|s| s.is_active()),
            ),
            OperandKind::StereoAvailable => {
                bool_f32(state.opts.stereo && ctx.device.stereo().is_some())
            }
            OperandKind::Separation => ctx
                .device
                .stereo()
                .and_then(|s| s.separation().ok())
                .unwrap_or(0.0),
            OperandKind::Convergence => ctx
                .device
                .stereo()
                .and_then(|s| s.convergence().ok())
                .unwrap_or(0.0),
            OperandKind::EffectiveDpi => frame.effective_dpi,
            OperandKind::VertexCount => match draw {
                Some(DrawCall::Draw { vertex_count, .. })
                | Some(DrawCall::DrawInstanced { vertex_count, .. }) => vertex_count as f32,
                _ => 0.0,
            },
            OperandKind::IndexCount => match draw {
                Some(DrawCall::DrawIndexed { index_count, .. })
                | Some(DrawCall::DrawIndexedInstanced { index_count, .. }) => index_count as f32,
                _ => 0.0,
            },
            OperandKind::InstanceCount => match draw {
                Some(DrawCall::DrawInstanced { instance_count, .. })
                | Some(DrawCall::DrawIndexedInstanced { instance_count, .. }) => {
                    instance_count as f32
                }
                _ => 0.0,
            },
            OperandKind::FirstVertex => match draw {
                Some(DrawCall::Draw { start_vertex, .. })
                | Some(DrawCall::DrawInstanced { start_vertex, .. }) => start_vertex as f32,
                Some(DrawCall::DrawIndexed { base_vertex, .. })
                | Some(DrawCall::DrawIndexedInstanced { base_vertex, .. }) => base_vertex as f32,
                _ => 0.0,
            },
            OperandKind::FirstIndex => match draw {
                Some(DrawCall::DrawIndexed { start_index, .. })
                | Some(DrawCall::DrawIndexedInstanced { start_index, .. }) => start_index as f32,
                _ => 0.0,
            },
            OperandKind::FirstInstance => match draw {
                Some(DrawCall::DrawInstanced { start_instance, .. })
                | Some(DrawCall::DrawIndexedInstanced { start_instance, .. }) => {
                    start_instance as f32
                }
                _ => 0.0,
            },
            OperandKind::ThreadGroupX | OperandKind::ThreadGroupY | OperandKind::ThreadGroupZ => {
                match draw {
                    Some(DrawCall::Dispatch { x, y, z }) => match self.kind {
                        OperandKind::ThreadGroupX => x as f32,
                        OperandKind::ThreadGroupY => y as f32,
                        _ => z as f32,
                    },
                    _ => 0.0,
                }
            }
            OperandKind::Indirect => bool_f32(matches!(draw, Some(DrawCall::Indirect))),
            OperandKind::Scissor { index, edge } => {
                let Some(rect) = ctx.device.scissor(*index) else {
                    return 0.0;
                };
                match edge {
                    ScissorEdge::Left => rect.left as f32,
                    ScissorEdge::Top => rect.top as f32,
                    ScissorEdge::Right => rect.right as f32,
                    ScissorEdge::Bottom => rect.bottom as f32,
                }
            }
            OperandKind::TextureFilter(target) => texture_filter(target, ctx),
            OperandKind::ShaderFilter(stage) => match ctx.device.shader_hash(*stage) {
                None => -0.0,
                Some(hash) => ctx
                    .program
                    .shader_overrides
                    .get(&hash)
                    .map_or(0.0, |o| o.filter_index),
            },
        }
    }
}

/// `-0` when nothing is bound, `0` when bound without a matching override, else its filter index.
fn texture_filter(target: &ResourceCopyTarget, ctx: &EvalCtx<'_>) -> f32 {
    let Some(src) = target.get(ctx.state, ctx.device, ctx.call) else {
        return -0.0;
    };
    ctx.device
        .resource_hash(src.resource)
        .and_then(|hash| ctx.program.texture_overrides.get(&hash))
        .map_or(0.0, |o| o.filter_index)
}

fn ratio(v: f32, extent: u32) -> f32 {
    if extent == 0 { 0.0 } else { v / extent as f32 }
}

fn bool_f32(b: bool) -> f32 {
    if b { 1.0 } else { 0.0 }
}

pub(crate) fn format_literal(v: f32) -> String {
    if v.is_sign_negative() && v == 0.0 {
        "-0".to_owned()
    } else {
        format!("{v}")
    }
}

/// `$name[i][j]n` split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct VarRef<'a> {
    pub(crate) name: &'a str,
    pub(crate) indices: SmallVec<[u32; 2]>,
    /// Element count following the last `]`, for range assignment.
    pub(crate) count: Option<u32>,
}

pub(crate) fn split_var_ref(text: &str) -> Result<VarRef<'_>, SyntaxError> {
    let name_end = text.find('[').unwrap_or(text.len());
    let name = &text[..name_end];
    if !name.starts_with('$') || name.len() < 2 {
        return Err(SyntaxError::new(0, format!("'{text}' is not a variable")));
    }
    let mut indices = SmallVec::new();
    let mut rest = &text[name_end..];
    let mut at = name_end;
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            return Err(SyntaxError::new(at, "unterminated '['"));
        };
        let idx: u32 = inner[..close]
            .trim()
            .parse()
            .map_err(|_| SyntaxError::new(at + 1, "array index must be a non-negative integer"))?;
        indices.push(idx);
        at += close + 2;
        rest = &inner[close + 1..];
    }
    let count = if rest.is_empty() {
        None
    } else {
        if indices.is_empty() {
            return Err(SyntaxError::new(at, "element count without an index"));
        }
        Some(
            rest.parse()
                .map_err(|_| SyntaxError::new(at, "element count must be an integer"))?,
        )
    };
    Ok(VarRef {
        name,
        indices,
        count,
    })
}

/// Flat element offset of `indices` within a variable of `shape`.
pub(crate) fn element_offset(shape: VarShape, indices: &[u32]) -> Result<u32, String> {
    match (shape, indices) {
        (VarShape::Scalar, []) => Ok(0),
        (VarShape::Scalar, _) => Err("is not an array".to_owned()),
        (VarShape::Array(_), []) | (VarShape::Matrix { .. }, []) => {
            Err("needs an element index".to_owned())
        }
        (VarShape::Array(n), [i]) if *i < n => Ok(*i),
        (VarShape::Array(n), [i]) => Err(format!("index {i} out of range for length {n}")),
        (VarShape::Matrix { rows, cols }, [r, c]) if *r < rows && *c < cols => Ok(r * cols + c),
        (VarShape::Matrix { rows, cols }, [r, c]) => {
            Err(format!("element [{r}][{c}] out of range for {rows}x{cols}"))
        }
        _ => Err("wrong number of indices".to_owned()),
    }
}

fn scissor_keyword(ident: &str) -> Option<OperandKind> {
    let rest = ident.strip_prefix("scissor")?;
    let (index, edge) = rest.split_once('_')?;
    let index = if index.is_empty() {
        0
    } else {
        index.parse().ok()?
    };
    let edge = match edge {
        "left" => ScissorEdge::Left,
        "top" => ScissorEdge::Top,
        "right" => ScissorEdge::Right,
        "bottom" => ScissorEdge::Bottom,
        _ => return None,
    };
    Some(OperandKind::Scissor { index, edge })
}

/// Classify one operand token and bind it to storage where possible.
pub(crate) fn resolve_operand(
    token: TokenKind,
    offset: usize,
    r: &mut dyn Resolve,
) -> ScriptResult<Operand> {
    let (kind, text) = match token {
        TokenKind::Number(v) => (OperandKind::Literal(v), format_literal(v)),
        TokenKind::Variable(text) => (resolve_variable(&text, offset, r)?, text),
        TokenKind::Target(text) => {
            let target = resolve_filter_target(&text, r)?;
            (OperandKind::TextureFilter(Box::new(target)), text)
        }
        TokenKind::Ident(text) => (resolve_ident(&text, offset, r)?, text),
        TokenKind::Operator(_) | TokenKind::Open | TokenKind::Close => {
            return Err(ScriptError::internal("operator token passed as an operand"));
        }
    };
    Ok(Operand { kind, text })
}

fn resolve_variable(text: &str, offset: usize, r: &mut dyn Resolve) -> ScriptResult<OperandKind> {
    let var_ref = split_var_ref(text).map_err(|e| e.shifted(offset))?;
    if var_ref.count.is_some() {
        return Err(SyntaxError::new(offset, "element ranges are not allowed in expressions").into());
    }
    let Some(id) = r.variable(var_ref.name) else {
        return Err(ScriptError::unresolved(format!("undeclared variable {}", var_ref.name)));
    };
    let info = r.var_info(id);
    let elem = element_offset(info.shape, &var_ref.indices)
        .map_err(|msg| SyntaxError::new(offset, format!("{}: {msg}", var_ref.name)))?;
    Ok(OperandKind::Variable(info.slot(elem)))
}

fn resolve_filter_target(text: &str, r: &mut dyn Resolve) -> ScriptResult<ResourceCopyTarget> {
    parse_target(text, r)?
        .ok_or_else(|| ScriptError::unresolved(format!("unknown bind target {text}")))
}

fn resolve_ident(text: &str, offset: usize, r: &mut dyn Resolve) -> ScriptResult<OperandKind> {
    if let Some(kind) = keyword(text) {
        return Ok(kind);
    }
    if let Some(kind) = scissor_keyword(text) {
        return Ok(kind);
    }
    if let Some((index, component)) = parse_ini_param(text) {
        r.ini_param(index)
            .map_err(|msg| SyntaxError::new(offset, msg))?;
        return Ok(OperandKind::IniParam(flat_param(index, component)));
    }
    if let Some(stage) = ShaderStage::from_prefix(text) {
        return Ok(OperandKind::ShaderFilter(stage));
    }
    if let Some(target) = parse_target(text, r)? {
        return Ok(OperandKind::TextureFilter(Box::new(target)));
    }
    Err(ScriptError::unresolved(format!("unknown identifier {text}")))
}
