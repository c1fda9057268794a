use serde::{Deserialize, Serialize};

use crate::device::{DrawCall, ResourceHandle};
use crate::engine::profile::Profiler;
use crate::foundation::ids::{CopyCacheId, CustomResourceId, PresetId};
use crate::foundation::opts::SessionOpts;
use crate::preset::Preset;
use crate::resource::copy::CopyCache;
use crate::resource::custom::CustomResource;
use crate::variables::store::{IniParams, VarStore};

/// Cursor geometry for the current frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorState {
    /// Position in screen coordinates.
    pub screen: (f32, f32),
    /// Position relative to the game window's client area.
    pub window: (f32, f32),
    /// Hotspot of the cursor image.
    pub hotspot: (f32, f32),
    /// Whether the cursor is visible.
    pub showing: bool,
}

/// Per-frame host state readable from expressions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameState {
    /// Seconds since the host started.
    pub time: f32,
    /// Swap-chain resolution.
    pub resolution: (u32, u32),
    /// Client area of the game window.
    pub window: (u32, u32),
    /// Cursor geometry.
    pub cursor: CursorState,
    /// DPI of the monitor the window is on.
    pub effective_dpi: f32,
}

impl Default for FrameState {
    fn default() -> Self {
        Self {
            time: 0.0,
            resolution: (1280, 720),
            window: (1280, 720),
            cursor: CursorState::default(),
            effective_dpi: 96.0,
        }
    }
}

/// What the host was doing when it invoked a command list.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CallInfo {
    /// Draw or dispatch about to be issued, if any.
    pub draw: Option<DrawCall>,
    /// Resource `this` refers to, for resource and view command lists.
    pub this: Option<ResourceHandle>,
}

impl CallInfo {
    /// Invocation around a draw or dispatch.
    pub fn draw(call: DrawCall) -> Self {
        Self {
            draw: Some(call),
            this: None,
        }
    }

    /// Invocation on behalf of a resource.
    pub fn resource(res: ResourceHandle) -> Self {
        Self {
            draw: None,
            this: Some(res),
        }
    }
}

/// Signals raised while one top-level invocation runs.
#[derive(Debug, Default)]
pub(crate) struct RunState {
    pub(crate) depth: u32,
    pub(crate) abort: bool,
    pub(crate) skip: bool,
    pub(crate) limit_warned: bool,
}

/// Everything command lists mutate at run time.
#[derive(Debug)]
pub(crate) struct State {
    pub(crate) opts: SessionOpts,
    pub(crate) vars: VarStore,
    pub(crate) params: IniParams,
    pub(crate) frame: FrameState,
    pub(crate) resources: Vec<CustomResource>,
    pub(crate) copy_caches: Vec<CopyCache>,
    pub(crate) presets: Vec<Preset>,
    pub(crate) profiler: Profiler,
}

impl State {
    pub(crate) fn new(opts: SessionOpts) -> Self {
        let params = IniParams::new(opts.ini_params, opts.max_ini_params);
        Self {
            opts,
            vars: VarStore::new(),
            params,
            frame: FrameState::default(),
            resources: Vec::new(),
            copy_caches: Vec::new(),
            presets: Vec::new(),
            profiler: Profiler::default(),
        }
    }

    pub(crate) fn resource(&self, id: CustomResourceId) -> &CustomResource {
        &self.resources[id.0 as usize]
    }

    pub(crate) fn resource_mut(&mut self, id: CustomResourceId) -> &mut CustomResource {
        &mut self.resources[id.0 as usize]
    }

    pub(crate) fn add_resource(&mut self, res: CustomResource) -> CustomResourceId {
        self.resources.push(res);
        CustomResourceId(self.resources.len() as u32 - 1)
    }

    pub(crate) fn copy_cache_mut(&mut self, id: CopyCacheId) -> &mut CopyCache {
        &mut self.copy_caches[id.0 as usize]
    }

    pub(crate) fn new_copy_cache(&mut self) -> CopyCacheId {
        self.copy_caches.push(CopyCache::default());
        CopyCacheId(self.copy_caches.len() as u32 - 1)
    }

    pub(crate) fn preset_mut(&mut self, id: PresetId) -> &mut Preset {
        &mut self.presets[id.0 as usize]
    }

    pub(crate) fn add_preset(&mut self, preset: Preset) -> PresetId {
        self.presets.push(preset);
        PresetId(self.presets.len() as u32 - 1)
    }
}
