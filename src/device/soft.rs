use std::collections::HashMap;
use std::path::Path;

use crate::device::stereo::{SoftStereo, Stereo, SurfaceCreationMode};
use crate::device::{
    BindSlot, Binding, ClearValue, Device, DeviceError, DrawCall, Readback, ResourceHandle,
    ScissorRect, ShaderStage, SystemResource, ViewHandle, ViewKind, Viewport,
};
use crate::resource::desc::{BindFlags, Format, ResourceDesc, ResourceKind, Usage};

#[derive(Debug, Clone)]
struct SoftResource {
    desc: ResourceDesc,
    data: Vec<u8>,
    refs: u32,
    hash: Option<u32>,
    mode: SurfaceCreationMode,
    pending_polls: u32,
}

#[derive(Debug, Clone, Copy)]
struct SoftView {
    resource: ResourceHandle,
    kind: ViewKind,
    raw: bool,
}

/// A clear issued through [`SoftDevice`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClearRecord {
    /// Cleared resource.
    pub resource: ResourceHandle,
    /// View the clear went through.
    pub view: ViewHandle,
    /// Written value.
    pub value: ClearValue,
}

/// In-memory [`Device`]: resources are byte vectors, and draws and clears are recorded.
#[derive(Debug, Default)]
pub struct SoftDevice {
    next_handle: u64,
    resources: HashMap<ResourceHandle, SoftResource>,
    views: HashMap<ViewHandle, SoftView>,
    bindings: HashMap<BindSlot, Binding>,
    shaders: HashMap<ShaderStage, u64>,
    system: HashMap<SystemResource, ResourceHandle>,
    scissors: Vec<ScissorRect>,
    viewport: Option<Viewport>,
    draws: Vec<DrawCall>,
    clears: Vec<ClearRecord>,
    resources_created: u64,
    copies: u64,
    readback_latency: u32,
    max_resource_bytes: Option<u64>,
    stereo: Option<SoftStereo>,
}

impl SoftDevice {
    /// Device without a stereo driver.
    pub fn new() -> Self {
        Self {
            next_handle: 1,
            ..Self::default()
        }
    }

    /// Device with an active in-memory stereo driver.
    pub fn with_stereo() -> Self {
        Self {
            stereo: Some(SoftStereo::default()),
            ..Self::new()
        }
    }

    fn alloc_handle(&mut self) -> u64 {
        let h = self.next_handle.max(1);
        self.next_handle = h + 1;
        h
    }

    fn insert(&mut self, desc: ResourceDesc, data: Vec<u8>) -> ResourceHandle {
        let handle = ResourceHandle(self.alloc_handle());
        let mode = self
            .stereo
            .as_ref()
            .map(|s| s.creation_mode)
            .unwrap_or_default();
        self.resources.insert(
            handle,
            SoftResource {
                desc,
                data,
                refs: 1,
                hash: None,
                mode,
                pending_polls: 0,
            },
        );
        self.resources_created += 1;
        handle
    }

    /// Assign the content hash used for texture override matching.
    pub fn set_resource_hash(&mut self, res: ResourceHandle, hash: u32) {
        if let Some(r) = self.resources.get_mut(&res) {
            r.hash = Some(hash);
        }
    }

    /// Pretend a shader with `hash` is bound at `stage`.
    pub fn set_shader_hash(&mut self, stage: ShaderStage, hash: Option<u64>) {
        match hash {
            Some(h) => self.shaders.insert(stage, h),
            None => self.shaders.remove(&stage),
        };
    }

    /// Register a host-owned resource.
    pub fn set_system_resource(&mut self, which: SystemResource, res: ResourceHandle) {
        self.system.insert(which, res);
    }

    /// Set the scissor rectangle at `index`.
    pub fn set_scissor(&mut self, index: u32, rect: ScissorRect) {
        let i = index as usize;
        if self.scissors.len() <= i {
            self.scissors.resize(i + 1, ScissorRect::default());
        }
        self.scissors[i] = rect;
    }

    /// Number of polls a staging resource reports [`Readback::Pending`] after each copy into it.
    pub fn set_readback_latency(&mut self, polls: u32) {
        self.readback_latency = polls;
    }

    /// Reject resource creation above this size, to exercise creation failures.
    pub fn set_max_resource_bytes(&mut self, max: Option<u64>) {
        self.max_resource_bytes = max;
    }

    /// Bytes backing a resource.
    pub fn data(&self, res: ResourceHandle) -> Option<&[u8]> {
        self.resources.get(&res).map(|r| r.data.as_slice())
    }

    /// Overwrite the bytes backing a resource.
    pub fn write(&mut self, res: ResourceHandle, offset: usize, bytes: &[u8]) {
        if let Some(r) = self.resources.get_mut(&res) {
            let end = (offset + bytes.len()).min(r.data.len());
            if offset < end {
                r.data[offset..end].copy_from_slice(&bytes[..end - offset]);
            }
        }
    }

    /// Reference count of a live resource.
    pub fn refs(&self, res: ResourceHandle) -> u32 {
        self.resources.get(&res).map(|r| r.refs).unwrap_or(0)
    }

    /// Surface creation mode the resource was created under.
    pub fn creation_mode(&self, res: ResourceHandle) -> Option<SurfaceCreationMode> {
        self.resources.get(&res).map(|r| r.mode)
    }

    /// Number of live resources.
    pub fn live_resources(&self) -> usize {
        self.resources.len()
    }

    /// Number of live views.
    pub fn live_views(&self) -> usize {
        self.views.len()
    }

    /// Total resources ever created.
    pub fn resources_created(&self) -> u64 {
        self.resources_created
    }

    /// Total copy, region copy and resolve operations.
    pub fn copies(&self) -> u64 {
        self.copies
    }

    /// Draws issued so far.
    pub fn draws(&self) -> &[DrawCall] {
        &self.draws
    }

    /// Clears issued so far.
    pub fn clears(&self) -> &[ClearRecord] {
        &self.clears
    }

    /// Last viewport set.
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    /// Whether a view was created as a raw view.
    pub fn view_is_raw(&self, view: ViewHandle) -> Option<bool> {
        self.views.get(&view).map(|v| v.raw)
    }

    /// In-memory stereo driver, if present.
    pub fn soft_stereo(&self) -> Option<&SoftStereo> {
        self.stereo.as_ref()
    }

    /// Mutable in-memory stereo driver, if present.
    pub fn soft_stereo_mut(&mut self) -> Option<&mut SoftStereo> {
        self.stereo.as_mut()
    }

    fn copy_bytes(&mut self, dst: ResourceHandle, dst_off: usize, src: ResourceHandle, src_off: usize, len: usize) {
        let Some(src_bytes) = self.resources.get(&src).map(|r| r.data.clone()) else {
            return;
        };
        let latency = self.readback_latency;
        let Some(d) = self.resources.get_mut(&dst) else {
            return;
        };
        let len = len
            .min(src_bytes.len().saturating_sub(src_off))
            .min(d.data.len().saturating_sub(dst_off));
        d.data[dst_off..dst_off + len].copy_from_slice(&src_bytes[src_off..src_off + len]);
        if d.desc.usage == Usage::Staging {
            d.pending_polls = latency;
        }
        self.copies += 1;
    }
}

impl Device for SoftDevice {
    fn bound(&self, slot: BindSlot) -> Option<Binding> {
        self.bindings.get(&slot).copied()
    }

    fn bind(&mut self, slot: BindSlot, binding: Option<Binding>) {
        if let Some(b) = binding {
            self.add_ref(b.resource);
        }
        let old = match binding {
            Some(b) => self.bindings.insert(slot, b),
            None => self.bindings.remove(&slot),
        };
        if let Some(old) = old {
            self.release(old.resource);
        }
    }

    fn desc(&self, res: ResourceHandle) -> Option<ResourceDesc> {
        self.resources.get(&res).map(|r| r.desc)
    }

    fn create_resource(
        &mut self,
        desc: &ResourceDesc,
        data: Option<&[u8]>,
    ) -> Result<ResourceHandle, DeviceError> {
        if desc.width == 0 {
            return Err(DeviceError::Create(format!("zero width: {desc}")));
        }
        if desc.kind == ResourceKind::Buffer && desc.format != Format::Unknown && desc.stride != 0 {
            return Err(DeviceError::Create(format!(
                "structured buffer with a typed format: {desc}"
            )));
        }
        let size = desc.byte_size();
        if let Some(max) = self.max_resource_bytes
            && size > max
        {
            return Err(DeviceError::Create(format!(
                "{size} bytes exceeds device limit of {max}: {desc}"
            )));
        }
        let mut bytes = vec![0u8; size as usize];
        if let Some(init) = data {
            let n = init.len().min(bytes.len());
            bytes[..n].copy_from_slice(&init[..n]);
        }
        Ok(self.insert(*desc, bytes))
    }

    fn load_resource(
        &mut self,
        path: &Path,
        desc: &ResourceDesc,
    ) -> Result<ResourceHandle, DeviceError> {
        let bytes = std::fs::read(path)
            .map_err(|e| DeviceError::Load(format!("read '{}': {e}", path.display())))?;
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e.to_ascii_lowercase().as_str(), "png" | "dds"));
        if is_image {
            let img = image::load_from_memory(&bytes)
                .map_err(|e| DeviceError::Load(format!("decode '{}': {e}", path.display())))?
                .to_rgba8();
            let bind = if desc.bind.0 == 0 {
                BindFlags::SHADER_RESOURCE
            } else {
                desc.bind
            };
            let mut d = ResourceDesc::texture2d(img.width(), img.height(), Format::R8G8B8A8Unorm, bind);
            d.usage = desc.usage;
            return Ok(self.insert(d, img.into_raw()));
        }

        let mut d = *desc;
        d.kind = ResourceKind::Buffer;
        d.width = bytes.len() as u32;
        if d.bind.0 == 0 {
            d.bind = BindFlags::SHADER_RESOURCE;
        }
        Ok(self.insert(d, bytes))
    }

    fn add_ref(&mut self, res: ResourceHandle) {
        if let Some(r) = self.resources.get_mut(&res) {
            r.refs += 1;
        }
    }

    fn release(&mut self, res: ResourceHandle) {
        let destroy = match self.resources.get_mut(&res) {
            Some(r) => {
                r.refs = r.refs.saturating_sub(1);
                r.refs == 0
            }
            None => false,
        };
        if destroy {
            self.resources.remove(&res);
        }
    }

    fn create_view(
        &mut self,
        res: ResourceHandle,
        kind: ViewKind,
        raw: bool,
    ) -> Result<ViewHandle, DeviceError> {
        let desc = self
            .desc(res)
            .ok_or(DeviceError::UnknownResource(res))?;
        let needed = match kind {
            ViewKind::None => return Err(DeviceError::View("no view kind".to_owned())),
            ViewKind::ShaderResource => BindFlags::SHADER_RESOURCE,
            ViewKind::UnorderedAccess => BindFlags::UNORDERED_ACCESS,
            ViewKind::RenderTarget => BindFlags::RENDER_TARGET,
            ViewKind::DepthStencil => BindFlags::DEPTH_STENCIL,
        };
        if !desc.bind.contains(needed) {
            return Err(DeviceError::View(format!(
                "{kind:?} view of a resource without bind flag 0x{:x}: {desc}",
                needed.0
            )));
        }
        self.add_ref(res);
        let view = ViewHandle(self.alloc_handle());
        self.views.insert(
            view,
            SoftView {
                resource: res,
                kind,
                raw,
            },
        );
        Ok(view)
    }

    fn view_resource(&self, view: ViewHandle) -> Option<ResourceHandle> {
        self.views.get(&view).map(|v| v.resource)
    }

    fn release_view(&mut self, view: ViewHandle) {
        if let Some(v) = self.views.remove(&view) {
            self.release(v.resource);
        }
    }

    fn copy_resource(&mut self, dst: ResourceHandle, src: ResourceHandle) {
        self.copy_bytes(dst, 0, src, 0, usize::MAX);
    }

    fn copy_region(
        &mut self,
        dst: ResourceHandle,
        dst_offset: u64,
        src: ResourceHandle,
        src_offset: u64,
        len: u64,
    ) {
        self.copy_bytes(
            dst,
            dst_offset as usize,
            src,
            src_offset as usize,
            len as usize,
        );
    }

    fn resolve(&mut self, dst: ResourceHandle, src: ResourceHandle, _format: Format) {
        self.copy_bytes(dst, 0, src, 0, usize::MAX);
    }

    fn clear_view(&mut self, view: ViewHandle, value: ClearValue) {
        let Some(v) = self.views.get(&view).copied() else {
            return;
        };
        if let Some(r) = self.resources.get_mut(&v.resource) {
            match value {
                ClearValue::Float(f) => {
                    for (i, chunk) in r.data.chunks_exact_mut(4).enumerate() {
                        chunk.copy_from_slice(&f[i % 4].to_le_bytes());
                    }
                }
                ClearValue::Uint(u) => {
                    for (i, chunk) in r.data.chunks_exact_mut(4).enumerate() {
                        chunk.copy_from_slice(&u[i % 4].to_le_bytes());
                    }
                }
                ClearValue::DepthStencil { depth, .. } => {
                    if let Some(d) = depth {
                        for chunk in r.data.chunks_exact_mut(4) {
                            chunk.copy_from_slice(&d.to_le_bytes());
                        }
                    }
                }
            }
        }
        self.clears.push(ClearRecord {
            resource: v.resource,
            view,
            value,
        });
    }

    fn draw(&mut self, call: &DrawCall) {
        self.draws.push(*call);
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    fn scissor(&self, index: u32) -> Option<ScissorRect> {
        self.scissors.get(index as usize).copied()
    }

    fn resource_hash(&self, res: ResourceHandle) -> Option<u32> {
        self.resources.get(&res).and_then(|r| r.hash)
    }

    fn shader_hash(&self, stage: ShaderStage) -> Option<u64> {
        self.shaders.get(&stage).copied()
    }

    fn system_resource(&self, which: SystemResource) -> Option<ResourceHandle> {
        self.system.get(&which).copied()
    }

    fn read_back(&mut self, res: ResourceHandle) -> Result<Readback, DeviceError> {
        let r = self
            .resources
            .get_mut(&res)
            .ok_or(DeviceError::UnknownResource(res))?;
        if r.desc.usage != Usage::Staging {
            return Err(DeviceError::Create(format!(
                "read back from a non-staging resource: {}",
                r.desc
            )));
        }
        if r.pending_polls > 0 {
            r.pending_polls -= 1;
            return Ok(Readback::Pending);
        }
        Ok(Readback::Ready(r.data.clone()))
    }

    fn stereo(&self) -> Option<&dyn Stereo> {
        self.stereo.as_ref().map(|s| s as &dyn Stereo)
    }

    fn stereo_mut(&mut self) -> Option<&mut dyn Stereo> {
        self.stereo.as_mut().map(|s| s as &mut dyn Stereo)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/device/soft.rs"]
mod tests;
