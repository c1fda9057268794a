//! drawscript: a command-list interpreter for per-draw-call shader modding.
//!
//! Configuration entries are parsed into command lists attached to shader overrides, texture
//! overrides, the present call and named `[CommandList*]` sections. Lists assign variables from a
//! small expression language, branch with `if`/`elif`/`else`/`endif`, invoke other lists, copy
//! and reference resources between pipeline slots and custom resources, and issue draws.
//!
//! The graphics API is reached only through the [`Device`] trait; [`SoftDevice`] is an in-memory
//! implementation used by tests and the command line runner.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub(crate) mod command;
pub mod device;
pub(crate) mod engine;
pub(crate) mod expression;
pub(crate) mod foundation;
pub(crate) mod preset;
pub(crate) mod resource;
pub mod session;
pub(crate) mod variables;

pub use device::{
    BindSlot, Binding, ClearRecord, ClearValue, Device, DeviceError, DrawCall, Readback,
    ResourceHandle, ScissorRect, ShaderStage, SoftDevice, SoftStereo, Stereo, StereoStatus,
    SurfaceCreationMode, SystemResource, ViewHandle, ViewKind, Viewport,
};
pub use engine::profile::{CommandProfile, ListProfile, ProfileReport};
pub use engine::state::{CallInfo, CursorState, FrameState};
pub use expression::error::SyntaxError;
pub use foundation::error::{ScriptError, ScriptResult};
pub use foundation::ids::SectionId;
pub use foundation::opts::{ProfilingMode, SessionOpts};
pub use resource::desc::{
    BindFlags, CpuAccess, Format, MiscFlags, ResourceDesc, ResourceKind, Usage,
};
pub use session::{ConfigEntry, LoadReport, RunOutcome, Session};
pub use variables::persist::{PersistedValue, PersistedValues};
