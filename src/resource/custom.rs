use std::path::PathBuf;

use crate::device::{Device, ResourceHandle, SurfaceCreationMode, ViewHandle, ViewKind};
use crate::foundation::error::{ScriptError, ScriptResult};
use crate::resource::desc::{
    BindFlags, CpuAccess, Format, MiscFlags, ResourceDesc, ResourceKind, Usage, parse_uint,
};
use crate::resource::pool::ResourcePool;

/// Description fields a `[Resource*]` section pins, applied on top of whatever is copied in.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct DescOverrides {
    pub(crate) kind: Option<ResourceKind>,
    pub(crate) width: Option<u32>,
    pub(crate) height: Option<u32>,
    pub(crate) depth: Option<u32>,
    pub(crate) mips: Option<u32>,
    pub(crate) array_size: Option<u32>,
    pub(crate) format: Option<Format>,
    pub(crate) byte_width: Option<u32>,
    pub(crate) stride: Option<u32>,
    pub(crate) samples: Option<u32>,
    pub(crate) usage: Option<Usage>,
    pub(crate) bind: Option<BindFlags>,
    pub(crate) cpu_access: Option<CpuAccess>,
    pub(crate) misc: Option<MiscFlags>,
    pub(crate) width_multiply: Option<f32>,
    pub(crate) height_multiply: Option<f32>,
}

impl DescOverrides {
    pub(crate) fn apply(&self, desc: &mut ResourceDesc, resolution: (u32, u32)) {
        if let Some(kind) = self.kind {
            desc.kind = kind;
        }
        if desc.kind == ResourceKind::Buffer {
            if let Some(w) = self.byte_width.or(self.width) {
                desc.width = w;
            }
        } else if let Some(w) = self.width {
            desc.width = w;
        }
        if let Some(h) = self.height {
            desc.height = h;
        }
        if let Some(m) = self.width_multiply {
            desc.width = (resolution.0 as f32 * m) as u32;
        }
        if let Some(m) = self.height_multiply {
            desc.height = (resolution.1 as f32 * m) as u32;
        }
        if let Some(d) = self.depth {
            desc.depth = d;
        }
        if let Some(m) = self.mips {
            desc.mips = m;
        }
        if let Some(a) = self.array_size {
            desc.array_size = a;
        }
        if let Some(f) = self.format {
            desc.format = f;
        }
        if let Some(s) = self.stride {
            desc.stride = s;
            if desc.kind == ResourceKind::Buffer && s > 0 {
                desc.misc = desc.misc.with(MiscFlags::BUFFER_STRUCTURED);
            }
        }
        if let Some(s) = self.samples {
            desc.samples = s;
        }
        if let Some(u) = self.usage {
            desc.usage = u;
        }
        if let Some(b) = self.bind {
            desc.bind = b;
        }
        if let Some(c) = self.cpu_access {
            desc.cpu_access = c;
        }
        if let Some(m) = self.misc {
            desc.misc = m;
        }
        if desc.kind == ResourceKind::TextureCube {
            desc.misc = desc.misc.with(MiscFlags::TEXTURECUBE);
            desc.array_size = desc.array_size.max(6);
        }
    }
}

/// Views created for one resource, keyed by kind and rawness.
#[derive(Debug, Default)]
pub(crate) struct ViewCache {
    entries: Vec<(ResourceHandle, ViewKind, bool, ViewHandle)>,
}

impl ViewCache {
    /// View of `res`. With `cache` off the caller owns the returned view.
    pub(crate) fn get(
        &mut self,
        device: &mut dyn Device,
        res: ResourceHandle,
        kind: ViewKind,
        raw: bool,
        cache: bool,
    ) -> Option<ViewHandle> {
        if cache
            && let Some(&(_, _, _, v)) = self
                .entries
                .iter()
                .find(|(r, k, w, _)| *r == res && *k == kind && *w == raw)
        {
            return Some(v);
        }
        match device.create_view(res, kind, raw) {
            Ok(v) => {
                if cache {
                    self.entries.push((res, kind, raw, v));
                }
                Some(v)
            }
            Err(err) => {
                tracing::warn!(%err, ?kind, "failed to create view");
                None
            }
        }
    }

    /// Releases the views of every resource other than `res`.
    pub(crate) fn keep_only(&mut self, device: &mut dyn Device, res: ResourceHandle) {
        self.entries.retain(|&(r, _, _, v)| {
            if r == res {
                return true;
            }
            device.release_view(v);
            false
        });
    }

    pub(crate) fn clear(&mut self, device: &mut dyn Device) {
        for (_, _, _, v) in self.entries.drain(..) {
            device.release_view(v);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

/// A named `[Resource*]` section and its lazily created resource.
#[derive(Debug)]
pub(crate) struct CustomResource {
    pub(crate) name: String,
    pub(crate) overrides: DescOverrides,
    pub(crate) filename: Option<PathBuf>,
    pub(crate) data: Option<Vec<u8>>,
    /// Stereo creation mode forced for this resource, if any.
    pub(crate) mode: Option<SurfaceCreationMode>,
    /// 0 means unlimited.
    pub(crate) max_copies_per_frame: u32,
    pub(crate) copies_this_frame: u32,
    pub(crate) handle: Option<ResourceHandle>,
    pub(crate) views: ViewCache,
    pub(crate) pool: ResourcePool,
    substantiated: bool,
}

impl CustomResource {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            overrides: DescOverrides::default(),
            filename: None,
            data: None,
            mode: None,
            max_copies_per_frame: 0,
            copies_this_frame: 0,
            handle: None,
            views: ViewCache::default(),
            pool: ResourcePool::default(),
            substantiated: false,
        }
    }

    /// Apply one `key = value` line of the section.
    pub(crate) fn parse_key(&mut self, key: &str, value: &str) -> ScriptResult<()> {
        let bad = || ScriptError::invalid(format!("[{}] {key} = {value}", self.name));
        let uint = || parse_uint(value).ok_or_else(bad);
        let o = &mut self.overrides;
        match key {
            "type" => o.kind = Some(ResourceKind::parse(value).ok_or_else(bad)?),
            "width" => o.width = Some(uint()?),
            "height" => o.height = Some(uint()?),
            "depth" => o.depth = Some(uint()?),
            "mips" => o.mips = Some(uint()?),
            "array" => o.array_size = Some(uint()?),
            "byte_width" => o.byte_width = Some(uint()?),
            "stride" => o.stride = Some(uint()?),
            "msaa" => o.samples = Some(uint()?),
            "format" => o.format = Some(Format::parse(value).ok_or_else(bad)?),
            "usage" => o.usage = Some(Usage::parse(value).ok_or_else(bad)?),
            "bind_flags" => o.bind = Some(BindFlags::parse(value).ok_or_else(bad)?),
            "cpu_access_flags" => o.cpu_access = Some(CpuAccess::parse(value).ok_or_else(bad)?),
            "misc_flags" => o.misc = Some(MiscFlags::parse(value).ok_or_else(bad)?),
            "width_multiply" => o.width_multiply = Some(value.parse().map_err(|_| bad())?),
            "height_multiply" => o.height_multiply = Some(value.parse().map_err(|_| bad())?),
            "filename" => self.filename = Some(PathBuf::from(value)),
            "data" => {
                let floats = value
                    .split_whitespace()
                    .map(|w| w.parse::<f32>().map_err(|_| bad()))
                    .collect::<ScriptResult<Vec<_>>>()?;
                self.data = Some(floats.iter().flat_map(|f| f.to_le_bytes()).collect());
            }
            "mode" => {
                self.mode = match value {
                    "auto" => None,
                    "stereo" => Some(SurfaceCreationMode::ForceStereo),
                    "mono" => Some(SurfaceCreationMode::ForceMono),
                    _ => return Err(bad()),
                }
            }
            "max_copies_per_frame" => self.max_copies_per_frame = uint()?,
            _ => return Err(bad()),
        }
        Ok(())
    }

    /// Description to create the resource from scratch, if the section defines one.
    pub(crate) fn procedural_desc(&self, resolution: (u32, u32)) -> Option<ResourceDesc> {
        let o = &self.overrides;
        let kind = match o.kind {
            Some(k) => k,
            None if self.data.is_some() || o.byte_width.is_some() => ResourceKind::Buffer,
            None => return None,
        };
        let mut desc = match kind {
            ResourceKind::Buffer => {
                let len = self.data.as_ref().map_or(0, |d| d.len() as u32);
                ResourceDesc::buffer(len, BindFlags::SHADER_RESOURCE)
            }
            _ => ResourceDesc::texture2d(
                1,
                1,
                Format::R8G8B8A8Unorm,
                BindFlags::SHADER_RESOURCE.with(BindFlags::RENDER_TARGET),
            ),
        };
        o.apply(&mut desc, resolution);
        Some(desc)
    }

    /// Create the resource on first use. Failures are logged once and leave it unbound.
    pub(crate) fn substantiate(&mut self, device: &mut dyn Device, resolution: (u32, u32)) {
        if self.handle.is_some() || self.substantiated {
            return;
        }
        self.substantiated = true;

        let result = if let Some(path) = &self.filename {
            let mut desc = ResourceDesc::buffer(0, BindFlags::default());
            self.overrides.apply(&mut desc, resolution);
            device.load_resource(path, &desc)
        } else if let Some(desc) = self.procedural_desc(resolution) {
            let created = with_creation_mode(device, self.mode, |device| {
                device.create_resource(&desc, self.data.as_deref())
            });
            if let Err(err) = &created {
                tracing::warn!(resource = %self.name, %desc, %err, "failed to create custom resource");
            }
            created
        } else {
            return;
        };

        match result {
            Ok(res) => {
                tracing::debug!(resource = %self.name, "substantiated custom resource");
                self.handle = Some(res);
            }
            Err(err) => {
                tracing::warn!(resource = %self.name, %err, "custom resource is unavailable");
            }
        }
    }

    /// Replace the held resource. `res` must carry a reference owned by this resource.
    pub(crate) fn assign(&mut self, device: &mut dyn Device, res: Option<ResourceHandle>) {
        if self.handle == res {
            if let Some(r) = res {
                device.release(r);
            }
            return;
        }
        self.views.clear(device);
        if let Some(old) = std::mem::replace(&mut self.handle, res) {
            device.release(old);
        }
    }

    /// Whether the per-frame copy quota is used up.
    pub(crate) fn quota_exhausted(&self) -> bool {
        self.max_copies_per_frame > 0 && self.copies_this_frame >= self.max_copies_per_frame
    }

    pub(crate) fn release(&mut self, device: &mut dyn Device) {
        self.views.clear(device);
        if let Some(res) = self.handle.take() {
            device.release(res);
        }
        self.pool.release_all(device);
        self.substantiated = false;
        self.copies_this_frame = 0;
    }
}

/// Run `f` with the stereo driver's creation mode switched to `mode`, restoring it afterwards.
pub(crate) fn with_creation_mode<T>(
    device: &mut dyn Device,
    mode: Option<SurfaceCreationMode>,
    f: impl FnOnce(&mut dyn Device) -> T,
) -> T {
    let saved = match (mode, device.stereo_mut()) {
        (Some(mode), Some(stereo)) => {
            let saved = stereo.surface_creation_mode();
            match stereo.set_surface_creation_mode(mode) {
                Ok(()) => Some(saved),
                Err(status) => {
                    tracing::debug!(%status, "could not change surface creation mode");
                    None
                }
            }
        }
        _ => None,
    };
    let out = f(device);
    if let (Some(saved), Some(stereo)) = (saved, device.stereo_mut()) {
        let _ = stereo.set_surface_creation_mode(saved);
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/resource/custom.rs"]
mod tests;
