use std::fmt;

use crate::device::{BindSlot, Device, ResourceHandle, ShaderStage, SystemResource, ViewHandle};
use crate::engine::state::{CallInfo, State};
use crate::expression::Resolve;
use crate::foundation::error::{ScriptError, ScriptResult};
use crate::foundation::ids::CustomResourceId;
use crate::resource::desc::BindFlags;
use crate::variables::store::VarRange;

const MAX_CONSTANT_BUFFERS: u32 = 14;
const MAX_SHADER_RESOURCES: u32 = 128;
const MAX_UNORDERED_ACCESS: u32 = 64;
const MAX_VERTEX_BUFFERS: u32 = 32;
const MAX_STREAM_OUTPUTS: u32 = 4;
const MAX_RENDER_TARGETS: u32 = 8;

/// Where a resource lives, as named in a directive.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ResourceCopyTarget {
    Slot(BindSlot),
    Custom(CustomResourceId),
    System(SystemResource),
    /// The resource the current texture override matched.
    This,
    /// Variables receiving a GPU to CPU readback. Destination only.
    CpuReadback(VarRange),
    Null,
}

/// A resolved resource together with how it was bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Bound {
    pub(crate) resource: ResourceHandle,
    pub(crate) view: Option<ViewHandle>,
    pub(crate) offset: u32,
    pub(crate) stride: u32,
}

impl Bound {
    fn whole(resource: ResourceHandle) -> Self {
        Self {
            resource,
            view: None,
            offset: 0,
            stride: 0,
        }
    }
}

/// Target syntax before custom resource names are resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Syntax<'a> {
    Fixed(Fixed),
    Custom(&'a str),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Fixed {
    Slot(BindSlot),
    System(SystemResource),
    This,
    Null,
}

fn index(digits: &str, max: u32) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().filter(|i| *i < max)
}

fn parse_syntax(s: &str) -> Option<Syntax<'_>> {
    use Fixed as K;
    let kind = match s {
        "ib" => K::Slot(BindSlot::IndexBuffer),
        "od" => K::Slot(BindSlot::DepthStencil),
        "stereoparams" => K::System(SystemResource::StereoParams),
        "cursor_mask" => K::System(SystemResource::CursorMask),
        "cursor_color" => K::System(SystemResource::CursorColor),
        "bb" => K::System(SystemResource::BackBuffer),
        "this" => K::This,
        "null" => K::Null,
        _ => {
            if s.len() > "resource".len() && s.starts_with("resource") {
                return Some(Syntax::Custom(s));
            }
            if let Some(i) = s.strip_prefix("vb").and_then(|d| index(d, MAX_VERTEX_BUFFERS)) {
                K::Slot(BindSlot::VertexBuffer(i))
            } else if let Some(i) = s.strip_prefix("so").and_then(|d| index(d, MAX_STREAM_OUTPUTS)) {
                K::Slot(BindSlot::StreamOutput(i))
            } else if let Some(i) = s.strip_prefix('o').and_then(|d| index(d, MAX_RENDER_TARGETS)) {
                K::Slot(BindSlot::RenderTarget(i))
            } else {
                let (stage, slot) = s.split_once('-')?;
                let stage = ShaderStage::from_prefix(stage)?;
                let slot = if let Some(i) = slot.strip_prefix("cb") {
                    BindSlot::ConstantBuffer(stage, index(i, MAX_CONSTANT_BUFFERS)?)
                } else if let Some(i) = slot.strip_prefix('t') {
                    BindSlot::ShaderResource(stage, index(i, MAX_SHADER_RESOURCES)?)
                } else if let Some(i) = slot.strip_prefix('u') {
                    BindSlot::UnorderedAccess(stage, index(i, MAX_UNORDERED_ACCESS)?)
                } else {
                    return None;
                };
                K::Slot(slot)
            }
        }
    };
    Some(Syntax::Fixed(kind))
}

/// Whether `s` names a bind target, without resolving custom resource names.
pub(crate) fn is_target_syntax(s: &str) -> bool {
    parse_syntax(s).is_some()
}

/// Parse a bind target. `Ok(None)` if `s` is not target syntax at all; an error if it names a
/// custom resource that does not exist.
pub(crate) fn parse_target(
    s: &str,
    r: &mut dyn Resolve,
) -> ScriptResult<Option<ResourceCopyTarget>> {
    use Fixed as K;
    let target = match parse_syntax(s) {
        None => return Ok(None),
        Some(Syntax::Custom(name)) => match r.custom_resource(name) {
            Some(id) => ResourceCopyTarget::Custom(id),
            None => {
                return Err(ScriptError::unresolved(format!(
                    "unknown custom resource {name}"
                )));
            }
        },
        Some(Syntax::Fixed(kind)) => match kind {
            K::Slot(slot) => ResourceCopyTarget::Slot(slot),
            K::System(sys) => ResourceCopyTarget::System(sys),
            K::This => ResourceCopyTarget::This,
            K::Null => ResourceCopyTarget::Null,
        },
    };
    Ok(Some(target))
}

impl ResourceCopyTarget {
    /// Resource currently at this target. Custom resources that were never created read as unbound.
    pub(crate) fn get(&self, state: &State, device: &dyn Device, call: &CallInfo) -> Option<Bound> {
        match self {
            Self::Slot(slot) => device.bound(*slot).map(|b| Bound {
                resource: b.resource,
                view: b.view,
                offset: b.offset,
                stride: b.stride,
            }),
            Self::Custom(id) => state.resource(*id).handle.map(Bound::whole),
            Self::System(sys) => device.system_resource(*sys).map(Bound::whole),
            Self::This => call.this.map(Bound::whole),
            Self::CpuReadback(_) | Self::Null => None,
        }
    }

    /// Targets that can be read but not written.
    pub(crate) fn is_source_only(&self) -> bool {
        matches!(self, Self::System(_) | Self::This | Self::Null)
    }

    pub(crate) fn is_output_merger(&self) -> bool {
        matches!(
            self,
            Self::Slot(BindSlot::RenderTarget(_)) | Self::Slot(BindSlot::DepthStencil)
        )
    }

    /// Same kind of bind location, ignoring stage and index.
    pub(crate) fn same_type(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Slot(a), Self::Slot(b)) => {
                std::mem::discriminant(a) == std::mem::discriminant(b)
            }
            _ => std::mem::discriminant(self) == std::mem::discriminant(other),
        }
    }

    /// Bind flags a resource needs to be bound here.
    pub(crate) fn bind_flags(&self) -> BindFlags {
        match self {
            Self::Slot(slot) => match slot {
                BindSlot::ConstantBuffer(..) => BindFlags::CONSTANT_BUFFER,
                BindSlot::ShaderResource(..) => BindFlags::SHADER_RESOURCE,
                BindSlot::UnorderedAccess(..) => BindFlags::UNORDERED_ACCESS,
                BindSlot::VertexBuffer(_) => BindFlags::VERTEX_BUFFER,
                BindSlot::IndexBuffer => BindFlags::INDEX_BUFFER,
                BindSlot::StreamOutput(_) => BindFlags::STREAM_OUTPUT,
                BindSlot::RenderTarget(_) => BindFlags::RENDER_TARGET,
                BindSlot::DepthStencil => BindFlags::DEPTH_STENCIL,
            },
            _ => BindFlags::default(),
        }
    }
}

impl fmt::Display for ResourceCopyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Slot(slot) => match slot {
                BindSlot::ConstantBuffer(st, i) => write!(f, "{}-cb{i}", st.prefix()),
                BindSlot::ShaderResource(st, i) => write!(f, "{}-t{i}", st.prefix()),
                BindSlot::UnorderedAccess(st, i) => write!(f, "{}-u{i}", st.prefix()),
                BindSlot::VertexBuffer(i) => write!(f, "vb{i}"),
                BindSlot::IndexBuffer => f.write_str("ib"),
                BindSlot::StreamOutput(i) => write!(f, "so{i}"),
                BindSlot::RenderTarget(i) => write!(f, "o{i}"),
                BindSlot::DepthStencil => f.write_str("od"),
            },
            Self::Custom(id) => write!(f, "custom resource #{}", id.0),
            Self::System(SystemResource::StereoParams) => f.write_str("stereoparams"),
            Self::System(SystemResource::CursorMask) => f.write_str("cursor_mask"),
            Self::System(SystemResource::CursorColor) => f.write_str("cursor_color"),
            Self::System(SystemResource::BackBuffer) => f.write_str("bb"),
            Self::This => f.write_str("this"),
            Self::CpuReadback(range) => write!(f, "readback into {} cells", range.len),
            Self::Null => f.write_str("null"),
        }
    }
}
