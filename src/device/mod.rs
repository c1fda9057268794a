//! The graphics collaborator the interpreter drives.
//!
//! The interpreter never talks to a graphics API directly. Bind-target lookups, resource creation,
//! copies, clears and draw re-issues all go through [`Device`]; stereo queries go through
//! [`Stereo`]. [`SoftDevice`] is an in-memory implementation used by tests and the CLI harness.

pub(crate) mod soft;
pub(crate) mod stereo;

use std::path::Path;

use crate::resource::desc::{Format, ResourceDesc};

pub use soft::{ClearRecord, SoftDevice};
pub use stereo::{SoftStereo, Stereo, StereoStatus, SurfaceCreationMode};

/// Opaque handle to a device resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceHandle(pub u64);

/// Opaque handle to a view of a device resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewHandle(pub u64);

/// Programmable pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader.
    Vertex,
    /// Hull shader.
    Hull,
    /// Domain shader.
    Domain,
    /// Geometry shader.
    Geometry,
    /// Pixel shader.
    Pixel,
    /// Compute shader.
    Compute,
}

impl ShaderStage {
    /// All stages, in pipeline order.
    pub const ALL: [Self; 6] = [
        Self::Vertex,
        Self::Hull,
        Self::Domain,
        Self::Geometry,
        Self::Pixel,
        Self::Compute,
    ];

    /// Two-letter prefix used in bind target names (`ps-t0`).
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Vertex => "vs",
            Self::Hull => "hs",
            Self::Domain => "ds",
            Self::Geometry => "gs",
            Self::Pixel => "ps",
            Self::Compute => "cs",
        }
    }

    /// Inverse of [`ShaderStage::prefix`].
    pub fn from_prefix(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|st| st.prefix() == s)
    }
}

/// A pipeline binding point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindSlot {
    /// Constant buffer slot of a stage.
    ConstantBuffer(ShaderStage, u32),
    /// Shader resource slot of a stage.
    ShaderResource(ShaderStage, u32),
    /// Unordered access slot of a stage.
    UnorderedAccess(ShaderStage, u32),
    /// Input assembler vertex buffer slot.
    VertexBuffer(u32),
    /// Input assembler index buffer.
    IndexBuffer,
    /// Stream output slot.
    StreamOutput(u32),
    /// Output merger render target.
    RenderTarget(u32),
    /// Output merger depth/stencil target.
    DepthStencil,
}

impl BindSlot {
    /// Kind of view this slot binds through, if any.
    pub fn view_kind(self) -> ViewKind {
        match self {
            Self::ShaderResource(..) => ViewKind::ShaderResource,
            Self::UnorderedAccess(..) => ViewKind::UnorderedAccess,
            Self::RenderTarget(_) => ViewKind::RenderTarget,
            Self::DepthStencil => ViewKind::DepthStencil,
            Self::ConstantBuffer(..)
            | Self::VertexBuffer(_)
            | Self::IndexBuffer
            | Self::StreamOutput(_) => ViewKind::None,
        }
    }
}

/// How a resource is viewed when bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// Bound directly, without a view object.
    None,
    /// Shader resource view.
    ShaderResource,
    /// Unordered access view.
    UnorderedAccess,
    /// Render target view.
    RenderTarget,
    /// Depth/stencil view.
    DepthStencil,
}

/// Resource bound at a slot, with the view and buffer offset it is bound through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    /// Bound resource.
    pub resource: ResourceHandle,
    /// View used for the binding, when the slot binds through views.
    pub view: Option<ViewHandle>,
    /// Byte offset for buffer bindings.
    pub offset: u32,
    /// Element stride for vertex buffer bindings.
    pub stride: u32,
}

impl Binding {
    /// Binding of a whole resource without a view.
    pub fn resource(resource: ResourceHandle) -> Self {
        Self {
            resource,
            view: None,
            offset: 0,
            stride: 0,
        }
    }
}

/// Resources owned by the host rather than by a pipeline slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemResource {
    /// Stereo parameter texture.
    StereoParams,
    /// Monochrome mask of the current cursor.
    CursorMask,
    /// Colour image of the current cursor.
    CursorColor,
    /// Current swap-chain back buffer.
    BackBuffer,
}

/// Draw or dispatch call, either the caller's or one issued by a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    /// Non-indexed draw.
    Draw {
        /// Vertices to draw.
        vertex_count: u32,
        /// First vertex.
        start_vertex: u32,
    },
    /// Indexed draw.
    DrawIndexed {
        /// Indices to draw.
        index_count: u32,
        /// First index.
        start_index: u32,
        /// Value added to each index.
        base_vertex: i32,
    },
    /// Instanced draw.
    DrawInstanced {
        /// Vertices per instance.
        vertex_count: u32,
        /// Instances to draw.
        instance_count: u32,
        /// First vertex.
        start_vertex: u32,
        /// First instance.
        start_instance: u32,
    },
    /// Indexed instanced draw.
    DrawIndexedInstanced {
        /// Indices per instance.
        index_count: u32,
        /// Instances to draw.
        instance_count: u32,
        /// First index.
        start_index: u32,
        /// Value added to each index.
        base_vertex: i32,
        /// First instance.
        start_instance: u32,
    },
    /// Draw with the vertex count taken from stream output.
    DrawAuto,
    /// Compute dispatch.
    Dispatch {
        /// Thread groups in x.
        x: u32,
        /// Thread groups in y.
        y: u32,
        /// Thread groups in z.
        z: u32,
    },
    /// Draw whose arguments live in a GPU buffer.
    Indirect,
}

/// Value written by a clear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Float colour for render targets and float UAVs.
    Float([f32; 4]),
    /// Integer value for UAVs.
    Uint([u32; 4]),
    /// Depth and/or stencil clear.
    DepthStencil {
        /// Depth value, when clearing depth.
        depth: Option<f32>,
        /// Stencil value, when clearing stencil.
        stencil: Option<u8>,
    },
}

/// Viewport rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
    /// Near depth.
    pub min_depth: f32,
    /// Far depth.
    pub max_depth: f32,
}

/// Scissor rectangle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScissorRect {
    /// Left edge.
    pub left: i32,
    /// Top edge.
    pub top: i32,
    /// Right edge (exclusive).
    pub right: i32,
    /// Bottom edge (exclusive).
    pub bottom: i32,
}

/// Result of polling a GPU to CPU transfer.
#[derive(Debug, Clone, PartialEq)]
pub enum Readback {
    /// The transfer finished; these are the resource bytes.
    Ready(Vec<u8>),
    /// The transfer is still in flight.
    Pending,
}

/// Failure reported by a [`Device`].
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum DeviceError {
    /// The device rejected a resource description.
    #[error("resource creation failed: {0}")]
    Create(String),
    /// The handle does not name a live resource.
    #[error("unknown resource handle {0:?}")]
    UnknownResource(ResourceHandle),
    /// The device could not create a view.
    #[error("view creation failed: {0}")]
    View(String),
    /// Loading a resource from disk failed.
    #[error("load failed: {0}")]
    Load(String),
}

/// Graphics operations the interpreter issues.
pub trait Device {
    /// Resource currently bound at `slot`.
    fn bound(&self, slot: BindSlot) -> Option<Binding>;
    /// Bind (or unbind with `None`) a resource at `slot`.
    fn bind(&mut self, slot: BindSlot, binding: Option<Binding>);
    /// Creation description of a live resource.
    fn desc(&self, res: ResourceHandle) -> Option<ResourceDesc>;
    /// Create a resource. The returned handle carries one reference owned by the caller.
    fn create_resource(
        &mut self,
        desc: &ResourceDesc,
        data: Option<&[u8]>,
    ) -> Result<ResourceHandle, DeviceError>;
    /// Create a resource from a file. `desc` carries overrides; zero fields are taken from the file.
    fn load_resource(
        &mut self,
        path: &Path,
        desc: &ResourceDesc,
    ) -> Result<ResourceHandle, DeviceError>;
    /// Take an additional reference.
    fn add_ref(&mut self, res: ResourceHandle);
    /// Drop a reference; the resource is destroyed with its last reference.
    fn release(&mut self, res: ResourceHandle);
    /// Create a view of `res`.
    fn create_view(
        &mut self,
        res: ResourceHandle,
        kind: ViewKind,
        raw: bool,
    ) -> Result<ViewHandle, DeviceError>;
    /// Resource a view refers to.
    fn view_resource(&self, view: ViewHandle) -> Option<ResourceHandle>;
    /// Destroy a view.
    fn release_view(&mut self, view: ViewHandle);
    /// Copy a whole resource.
    fn copy_resource(&mut self, dst: ResourceHandle, src: ResourceHandle);
    /// Copy `len` bytes between buffers.
    fn copy_region(
        &mut self,
        dst: ResourceHandle,
        dst_offset: u64,
        src: ResourceHandle,
        src_offset: u64,
        len: u64,
    );
    /// Resolve a multisampled resource into a single-sampled one.
    fn resolve(&mut self, dst: ResourceHandle, src: ResourceHandle, format: Format);
    /// Clear through a view.
    fn clear_view(&mut self, view: ViewHandle, value: ClearValue);
    /// Issue a draw or dispatch.
    fn draw(&mut self, call: &DrawCall);
    /// Set the first viewport.
    fn set_viewport(&mut self, viewport: Viewport);
    /// Scissor rectangle at `index`.
    fn scissor(&self, index: u32) -> Option<ScissorRect>;
    /// Content hash the host assigned to a resource, used for texture override matching.
    fn resource_hash(&self, res: ResourceHandle) -> Option<u32>;
    /// Hash of the shader bound to `stage`.
    fn shader_hash(&self, stage: ShaderStage) -> Option<u64>;
    /// Host-owned resource.
    fn system_resource(&self, which: SystemResource) -> Option<ResourceHandle>;
    /// Poll a CPU-readable resource; never blocks.
    fn read_back(&mut self, res: ResourceHandle) -> Result<Readback, DeviceError>;
    /// Stereo driver, when available.
    fn stereo(&self) -> Option<&dyn Stereo>;
    /// Mutable stereo driver, when available.
    fn stereo_mut(&mut self) -> Option<&mut dyn Stereo>;
}
