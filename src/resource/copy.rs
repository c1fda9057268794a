use std::fmt;

use crate::device::{
    Binding, Device, Readback, ResourceHandle, SurfaceCreationMode, ViewHandle, ViewKind, Viewport,
};
use crate::engine::state::{CallInfo, State};
use crate::expression::Resolve;
use crate::foundation::error::{ScriptError, ScriptResult};
use crate::foundation::ids::CopyCacheId;
use crate::resource::custom::{ViewCache, with_creation_mode};
use crate::resource::desc::{BindFlags, CpuAccess, MiscFlags, ResourceDesc, ResourceKind, Usage};
use crate::resource::pool::ResourcePool;
use crate::resource::target::{Bound, ResourceCopyTarget, parse_target};
use crate::variables::store::VarRange;

/// Option bits of a resource copy directive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct CopyOptions(u32);

impl CopyOptions {
    pub(crate) const COPY: Self = Self(1 << 0);
    pub(crate) const REFERENCE: Self = Self(1 << 1);
    pub(crate) const UNLESS_NULL: Self = Self(1 << 2);
    pub(crate) const RESOLVE_MSAA: Self = Self(1 << 3);
    pub(crate) const STEREO: Self = Self(1 << 4);
    pub(crate) const MONO: Self = Self(1 << 5);
    pub(crate) const STEREO2MONO: Self = Self(1 << 6);
    pub(crate) const COPY_DESC: Self = Self(1 << 7);
    pub(crate) const SET_VIEWPORT: Self = Self(1 << 8);
    pub(crate) const RAW_VIEW: Self = Self(1 << 9);
    pub(crate) const NO_VIEW_CACHE: Self = Self(1 << 10);

    const TYPE_MASK: Self = Self(Self::COPY.0 | Self::REFERENCE.0 | Self::COPY_DESC.0);

    pub(crate) fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub(crate) fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    fn parse_word(word: &str) -> Option<Self> {
        Some(match word {
            "copy" => Self::COPY,
            "ref" | "reference" => Self::REFERENCE,
            "unless_null" => Self::UNLESS_NULL,
            "resolve_msaa" => Self::RESOLVE_MSAA,
            "stereo" => Self::STEREO,
            "mono" => Self::MONO,
            "stereo2mono" => Self::STEREO2MONO,
            "copy_desc" | "copy_description" => Self::COPY_DESC,
            "set_viewport" => Self::SET_VIEWPORT,
            "raw" => Self::RAW_VIEW,
            "no_view_cache" => Self::NO_VIEW_CACHE,
            _ => return None,
        })
    }
}

impl fmt::Display for CopyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(CopyOptions, &str); 11] = [
            (CopyOptions::COPY, "copy"),
            (CopyOptions::REFERENCE, "reference"),
            (CopyOptions::UNLESS_NULL, "unless_null"),
            (CopyOptions::RESOLVE_MSAA, "resolve_msaa"),
            (CopyOptions::STEREO, "stereo"),
            (CopyOptions::MONO, "mono"),
            (CopyOptions::STEREO2MONO, "stereo2mono"),
            (CopyOptions::COPY_DESC, "copy_desc"),
            (CopyOptions::SET_VIEWPORT, "set_viewport"),
            (CopyOptions::RAW_VIEW, "raw"),
            (CopyOptions::NO_VIEW_CACHE, "no_view_cache"),
        ];
        let mut first = true;
        for (flag, name) in NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Copy type used when a directive names none. The order of these checks is significant.
pub(crate) fn infer_copy_type(src: &ResourceCopyTarget, dst: &ResourceCopyTarget) -> CopyOptions {
    if matches!(dst, ResourceCopyTarget::Custom(_)) {
        CopyOptions::COPY
    } else if dst.is_output_merger() {
        CopyOptions::REFERENCE
    } else if matches!(src, ResourceCopyTarget::Custom(_)) {
        CopyOptions::REFERENCE
    } else if src.same_type(dst) {
        CopyOptions::REFERENCE
    } else {
        CopyOptions::COPY
    }
}

/// Bytes a region copy moves: bounded by both resources, whole elements only for structured
/// destinations.
pub(crate) fn region_len(src_remaining: u64, dst_capacity: u64, dst_stride: Option<u32>) -> u64 {
    let len = src_remaining.min(dst_capacity);
    match dst_stride {
        Some(stride) if stride > 0 => len - len % u64::from(stride),
        _ => len,
    }
}

/// Runtime state of one copy directive.
#[derive(Debug, Default)]
pub(crate) struct CopyCache {
    pool: ResourcePool,
    intermediates: ResourcePool,
    views: ViewCache,
    /// Views created with `no_view_cache`, released on the next run.
    transient: Vec<ViewHandle>,
    readback: Option<ResourceHandle>,
}

impl CopyCache {
    pub(crate) fn release(&mut self, device: &mut dyn Device) {
        self.views.clear(device);
        for v in self.transient.drain(..) {
            device.release_view(v);
        }
        self.readback = None;
        self.pool.release_all(device);
        self.intermediates.release_all(device);
    }

    pub(crate) fn pooled(&self) -> usize {
        self.pool.len()
    }
}

/// `<dst> = [options] <src>`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CopyCommand {
    pub(crate) src: ResourceCopyTarget,
    pub(crate) dst: ResourceCopyTarget,
    pub(crate) options: CopyOptions,
    pub(crate) cache: CopyCacheId,
}

impl CopyCommand {
    pub(crate) fn parse(
        dst: ResourceCopyTarget,
        value: &str,
        r: &mut dyn Resolve,
        cache: CopyCacheId,
    ) -> ScriptResult<Self> {
        if dst.is_source_only() {
            return Err(ScriptError::invalid(format!("{dst} cannot be a copy destination")));
        }
        let mut options = CopyOptions::default();
        let mut src = None;
        for word in value.split_whitespace() {
            if let Some(opt) = CopyOptions::parse_word(word) {
                options = options.with(opt);
                continue;
            }
            match parse_target(word, r)? {
                Some(t) if src.is_none() => src = Some(t),
                Some(_) => {
                    return Err(ScriptError::invalid(format!(
                        "more than one copy source in '{value}'"
                    )));
                }
                None => {
                    return Err(ScriptError::invalid(format!(
                        "unknown copy option or target '{word}'"
                    )));
                }
            }
        }
        let Some(src) = src else {
            return Err(ScriptError::invalid(format!("no copy source in '{value}'")));
        };

        if options.contains(CopyOptions::COPY.with(CopyOptions::REFERENCE)) {
            return Err(ScriptError::invalid("copy and reference are mutually exclusive"));
        }
        if options.contains(CopyOptions::STEREO.with(CopyOptions::MONO)) {
            return Err(ScriptError::invalid("stereo and mono are mutually exclusive"));
        }
        let needs_copy = matches!(dst, ResourceCopyTarget::CpuReadback(_))
            || options.intersects(CopyOptions::RESOLVE_MSAA.with(CopyOptions::STEREO2MONO));
        if needs_copy && options.contains(CopyOptions::REFERENCE) {
            return Err(ScriptError::invalid(format!("'{value}' cannot be done by reference")));
        }
        if !options.intersects(CopyOptions::TYPE_MASK) {
            let inferred = if needs_copy {
                CopyOptions::COPY
            } else {
                infer_copy_type(&src, &dst)
            };
            options = options.with(inferred);
        }

        Ok(Self {
            src,
            dst,
            options,
            cache,
        })
    }

    fn has(&self, opt: CopyOptions) -> bool {
        self.options.contains(opt)
    }

    pub(crate) fn run(&self, state: &mut State, device: &mut dyn Device, call: &CallInfo) {
        if let ResourceCopyTarget::Custom(id) = self.dst
            && state.resource(id).quota_exhausted()
        {
            tracing::trace!(resource = %state.resource(id).name, "per-frame copy limit reached");
            return;
        }

        let resolution = state.frame.resolution;
        for target in [&self.src, &self.dst] {
            if let ResourceCopyTarget::Custom(id) = target {
                state.resource_mut(*id).substantiate(device, resolution);
            }
        }
        {
            let cache = state.copy_cache_mut(self.cache);
            for v in cache.transient.drain(..) {
                device.release_view(v);
            }
        }

        let Some(src) = self.src.get(state, device, call) else {
            if !self.has(CopyOptions::UNLESS_NULL) {
                self.unbind(state, device);
            }
            return;
        };

        if let ResourceCopyTarget::CpuReadback(range) = self.dst {
            self.read_back(state, device, src, range);
            return;
        }

        let dst_res = if self.has(CopyOptions::REFERENCE) {
            device.add_ref(src.resource);
            src.resource
        } else {
            let Some(src_desc) = device.desc(src.resource) else {
                tracing::warn!(src = %self.src, "copy source vanished");
                return;
            };
            let desc = self.destination_desc(state, &src_desc, src);
            let Some(res) = self.acquire(state, device, &desc) else {
                return;
            };
            if !self.has(CopyOptions::COPY_DESC) {
                self.transfer(state, device, src, &src_desc, res, &desc);
            }
            res
        };
        self.store(state, device, src, dst_res);
    }

    fn unbind(&self, state: &mut State, device: &mut dyn Device) {
        match &self.dst {
            ResourceCopyTarget::Slot(slot) => device.bind(*slot, None),
            ResourceCopyTarget::Custom(id) => state.resource_mut(*id).assign(device, None),
            _ => {}
        }
    }

    fn destination_desc(&self, state: &State, src_desc: &ResourceDesc, src: Bound) -> ResourceDesc {
        let mut desc = *src_desc;
        desc.usage = Usage::Default;
        desc.cpu_access = CpuAccess::default();
        if desc.kind == ResourceKind::Buffer && src.offset > 0 {
            desc.width = desc.width.saturating_sub(src.offset);
        }
        if self.has(CopyOptions::RESOLVE_MSAA) {
            desc.samples = 1;
        }
        if self.has(CopyOptions::STEREO2MONO) {
            desc.width = desc.width.saturating_mul(2);
        }
        match &self.dst {
            ResourceCopyTarget::Custom(id) => {
                let res = state.resource(*id);
                if desc.format.is_depth() && res.overrides.bind.is_none() {
                    desc.bind = desc
                        .bind
                        .without(BindFlags::DEPTH_STENCIL)
                        .with(BindFlags::SHADER_RESOURCE);
                }
                res.overrides.apply(&mut desc, state.frame.resolution);
            }
            ResourceCopyTarget::Slot(_) => {
                desc.bind = self.dst.bind_flags();
                // Constant buffers cannot be structured or raw.
                if desc.bind == BindFlags::CONSTANT_BUFFER {
                    desc.misc = MiscFlags::default();
                    desc.stride = 0;
                }
            }
            _ => {}
        }
        if desc.format.is_depth() && !desc.bind.contains(BindFlags::DEPTH_STENCIL) {
            desc.format = desc.format.typeless();
        }
        desc
    }

    fn creation_mode(&self, state: &State) -> Option<SurfaceCreationMode> {
        if self.has(CopyOptions::STEREO) {
            Some(SurfaceCreationMode::ForceStereo)
        } else if self.has(CopyOptions::MONO) || self.has(CopyOptions::STEREO2MONO) {
            Some(SurfaceCreationMode::ForceMono)
        } else if let ResourceCopyTarget::Custom(id) = self.dst {
            state.resource(id).mode
        } else {
            None
        }
    }

    /// Destination resource for `desc`, with a reference owned by the caller.
    fn acquire(
        &self,
        state: &mut State,
        device: &mut dyn Device,
        desc: &ResourceDesc,
    ) -> Option<ResourceHandle> {
        let mode = self.creation_mode(state);
        let key_mode = mode.unwrap_or_default();
        let result = with_creation_mode(device, mode, |device| match self.dst {
            ResourceCopyTarget::Custom(id) => {
                let res = state.resource_mut(id);
                res.pool.get_or_create(device, desc, key_mode, true, &res.name)
            }
            _ => {
                let owner = self.dst.to_string();
                state
                    .copy_cache_mut(self.cache)
                    .pool
                    .get_or_create(device, desc, key_mode, true, &owner)
            }
        });
        match result {
            Ok(res) => Some(res),
            Err(err) => {
                tracing::warn!(dst = %self.dst, %desc, %err, "failed to create copy destination");
                None
            }
        }
    }

    fn transfer(
        &self,
        state: &mut State,
        device: &mut dyn Device,
        src: Bound,
        src_desc: &ResourceDesc,
        dst: ResourceHandle,
        dst_desc: &ResourceDesc,
    ) {
        if self.has(CopyOptions::RESOLVE_MSAA) && src_desc.samples > 1 {
            device.resolve(dst, src.resource, dst_desc.format);
        } else if self.has(CopyOptions::STEREO2MONO) {
            self.reverse_blit(state, device, src, src_desc, dst);
        } else if src_desc.kind == ResourceKind::Buffer && src.offset > 0 {
            let remaining = u64::from(src_desc.width.saturating_sub(src.offset));
            let stride = dst_desc.is_structured().then_some(dst_desc.stride);
            let len = region_len(remaining, dst_desc.byte_size(), stride);
            device.copy_region(dst, 0, src.resource, u64::from(src.offset), len);
        } else {
            device.copy_resource(dst, src.resource);
        }
    }

    /// Copy through a stereo intermediate, then blit both eyes side by side into `dst`.
    fn reverse_blit(
        &self,
        state: &mut State,
        device: &mut dyn Device,
        src: Bound,
        src_desc: &ResourceDesc,
        dst: ResourceHandle,
    ) {
        let mut desc = *src_desc;
        desc.usage = Usage::Default;
        desc.cpu_access = CpuAccess::default();
        let stereo = SurfaceCreationMode::ForceStereo;
        let cache = state.copy_cache_mut(self.cache);
        let inter = with_creation_mode(device, Some(stereo), |device| {
            cache
                .intermediates
                .get_or_create(device, &desc, stereo, false, "stereo2mono")
        });
        let inter = match inter {
            Ok(r) => r,
            Err(err) => {
                tracing::warn!(%desc, %err, "failed to create stereo2mono intermediate");
                return;
            }
        };
        device.copy_resource(inter, src.resource);

        let blit = match device.stereo_mut() {
            Some(st) => st.set_reverse_blit(true).is_ok(),
            None => false,
        };
        if !blit {
            tracing::debug!("reverse stereo blit unavailable; copying one eye");
        }
        device.copy_resource(dst, inter);
        if blit && let Some(st) = device.stereo_mut() {
            let _ = st.set_reverse_blit(false);
        }
    }

    /// Hand `res` (and the reference the caller holds on it) to the destination.
    fn store(&self, state: &mut State, device: &mut dyn Device, src: Bound, res: ResourceHandle) {
        let slot = match &self.dst {
            ResourceCopyTarget::Custom(id) => {
                let custom = state.resource_mut(*id);
                custom.assign(device, Some(res));
                custom.copies_this_frame += 1;
                return;
            }
            ResourceCopyTarget::Slot(slot) => *slot,
            _ => {
                device.release(res);
                return;
            }
        };

        let kind = slot.view_kind();
        let view = if kind == ViewKind::None {
            None
        } else {
            let reuse = self.has(CopyOptions::REFERENCE)
                && matches!(&self.src, ResourceCopyTarget::Slot(s) if s.view_kind() == kind)
                && !self.has(CopyOptions::RAW_VIEW);
            if reuse && src.view.is_some() {
                src.view
            } else {
                let raw = self.has(CopyOptions::RAW_VIEW);
                let cached = !self.has(CopyOptions::NO_VIEW_CACHE);
                let view = match (&self.src, self.has(CopyOptions::REFERENCE)) {
                    (ResourceCopyTarget::Custom(id), true) => state
                        .resource_mut(*id)
                        .views
                        .get(device, res, kind, raw, cached),
                    _ => {
                        let views = &mut state.copy_cache_mut(self.cache).views;
                        if cached {
                            views.keep_only(device, res);
                        }
                        views.get(device, res, kind, raw, cached)
                    }
                };
                if !cached && let Some(v) = view {
                    state.copy_cache_mut(self.cache).transient.push(v);
                }
                view
            }
        };
        if kind != ViewKind::None && view.is_none() {
            device.release(res);
            return;
        }

        let desc = device.desc(res);
        let stride = if src.stride != 0 {
            src.stride
        } else {
            desc.map_or(0, |d| d.stride)
        };
        device.bind(
            slot,
            Some(Binding {
                resource: res,
                view,
                offset: 0,
                stride,
            }),
        );
        device.release(res);

        if self.has(CopyOptions::SET_VIEWPORT)
            && self.dst.is_output_merger()
            && let Some(d) = desc
        {
            device.set_viewport(Viewport {
                x: 0.0,
                y: 0.0,
                width: d.width as f32,
                height: d.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            });
        }
    }

    /// Non-blocking GPU to CPU transfer into variables. Writes NaN while the transfer is pending.
    fn read_back(&self, state: &mut State, device: &mut dyn Device, src: Bound, range: VarRange) {
        let cache = state.copy_cache_mut(self.cache);
        if cache.readback.is_none() {
            let Some(mut desc) = device.desc(src.resource) else {
                return;
            };
            desc.usage = Usage::Staging;
            desc.bind = BindFlags::default();
            desc.cpu_access = CpuAccess::READ;
            desc.misc = MiscFlags::default();
            match cache.pool.get_or_create(
                device,
                &desc,
                SurfaceCreationMode::Auto,
                false,
                "readback",
            ) {
                Ok(staging) => {
                    device.copy_resource(staging, src.resource);
                    cache.readback = Some(staging);
                }
                Err(err) => {
                    tracing::warn!(%desc, %err, "failed to create readback staging resource");
                    return;
                }
            }
        }
        let Some(staging) = cache.readback else {
            return;
        };

        match device.read_back(staging) {
            Ok(Readback::Ready(bytes)) => {
                cache.readback = None;
                let values = bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]));
                state.vars.set_range(range, values);
            }
            Ok(Readback::Pending) => {
                tracing::debug!(src = %self.src, "transfer in progress");
                state.vars.set_range(range, std::iter::repeat(f32::NAN));
            }
            Err(err) => {
                cache.readback = None;
                tracing::warn!(src = %self.src, %err, "readback failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/resource/copy.rs"]
mod tests;
