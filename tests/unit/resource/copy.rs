use std::collections::HashMap;

use super::*;
use crate::device::{BindSlot, ShaderStage, SoftDevice};
use crate::foundation::ids::{CustomResourceId, VarId};
use crate::foundation::opts::SessionOpts;
use crate::resource::custom::CustomResource;
use crate::resource::desc::Format;
use crate::resource::target::Bound;
use crate::variables::store::{VarInfo, VarShape, VarStore};

#[derive(Default)]
struct Names {
    vars: VarStore,
    resources: HashMap<String, CustomResourceId>,
}

impl Resolve for Names {
    fn variable(&self, name: &str) -> Option<VarId> {
        self.vars.global(name)
    }

    fn var_info(&self, id: VarId) -> &VarInfo {
        self.vars.info(id)
    }

    fn ini_param(&mut self, _index: usize) -> Result<(), String> {
        Ok(())
    }

    fn custom_resource(&self, name: &str) -> Option<CustomResourceId> {
        self.resources.get(name).copied()
    }
}

fn ps_t(i: u32) -> ResourceCopyTarget {
    ResourceCopyTarget::Slot(BindSlot::ShaderResource(ShaderStage::Pixel, i))
}

fn setup() -> (State, SoftDevice, CustomResourceId) {
    let mut state = State::new(SessionOpts::default());
    let id = state.add_resource(CustomResource::new("resourcedst"));
    (state, SoftDevice::new(), id)
}

fn bind_buffer(dev: &mut SoftDevice, slot: BindSlot, values: &[f32]) -> ResourceHandle {
    let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    let res = dev
        .create_resource(
            &ResourceDesc::buffer(bytes.len() as u32, BindFlags::SHADER_RESOURCE),
            Some(&bytes),
        )
        .unwrap();
    dev.bind(slot, Some(Binding::resource(res)));
    dev.release(res);
    res
}

fn command(state: &mut State, src: ResourceCopyTarget, dst: ResourceCopyTarget, options: CopyOptions) -> CopyCommand {
    CopyCommand {
        src,
        dst,
        options,
        cache: state.new_copy_cache(),
    }
}

#[test]
fn copy_type_inference_follows_priority() {
    let custom = ResourceCopyTarget::Custom(CustomResourceId(0));
    let o0 = ResourceCopyTarget::Slot(BindSlot::RenderTarget(0));
    let vb0 = ResourceCopyTarget::Slot(BindSlot::VertexBuffer(0));

    assert_eq!(infer_copy_type(&ps_t(0), &custom), CopyOptions::COPY);
    assert_eq!(infer_copy_type(&custom, &custom), CopyOptions::COPY);
    assert_eq!(infer_copy_type(&ps_t(0), &o0), CopyOptions::REFERENCE);
    assert_eq!(infer_copy_type(&custom, &vb0), CopyOptions::REFERENCE);
    assert_eq!(infer_copy_type(&ps_t(0), &ps_t(3)), CopyOptions::REFERENCE);
    assert_eq!(infer_copy_type(&ps_t(0), &vb0), CopyOptions::COPY);
}

#[test]
fn region_length_respects_both_sides_and_stride() {
    assert_eq!(region_len(100, 64, None), 64);
    assert_eq!(region_len(30, 64, None), 30);
    assert_eq!(region_len(30, 64, Some(8)), 24);
    assert_eq!(region_len(30, 64, Some(0)), 30);
}

#[test]
fn parse_rejects_conflicting_options() {
    let mut names = Names::default();
    let cache = CopyCacheId(0);
    assert!(CopyCommand::parse(ResourceCopyTarget::This, "ps-t0", &mut names, cache).is_err());
    assert!(CopyCommand::parse(ps_t(1), "copy ref ps-t0", &mut names, cache).is_err());
    assert!(CopyCommand::parse(ps_t(1), "stereo mono ps-t0", &mut names, cache).is_err());
    assert!(CopyCommand::parse(ps_t(1), "ref resolve_msaa ps-t0", &mut names, cache).is_err());
    assert!(CopyCommand::parse(ps_t(1), "ps-t0 vs-t0", &mut names, cache).is_err());
    assert!(CopyCommand::parse(ps_t(1), "sideways ps-t0", &mut names, cache).is_err());
    assert!(CopyCommand::parse(ps_t(1), "copy", &mut names, cache).is_err());
    assert!(CopyCommand::parse(ps_t(1), "resourcemissing", &mut names, cache).is_err());
}

#[test]
fn parse_fills_in_the_copy_type() {
    let mut names = Names::default();
    names.resources.insert("resourcefoo".into(), CustomResourceId(0));
    let cache = CopyCacheId(0);

    let cmd = CopyCommand::parse(ps_t(1), "ps-t0", &mut names, cache).unwrap();
    assert_eq!(cmd.options, CopyOptions::REFERENCE);

    let cmd = CopyCommand::parse(ps_t(1), "resolve_msaa ps-t0", &mut names, cache).unwrap();
    assert!(cmd.options.contains(CopyOptions::COPY));

    let cmd = CopyCommand::parse(ps_t(1), "unless_null resourcefoo", &mut names, cache).unwrap();
    assert_eq!(cmd.src, ResourceCopyTarget::Custom(CustomResourceId(0)));
    assert_eq!(cmd.options.to_string(), "reference unless_null");
}

#[test]
fn copy_into_custom_resource_reuses_the_pool() {
    let (mut state, mut dev, id) = setup();
    bind_buffer(&mut dev, BindSlot::ShaderResource(ShaderStage::Pixel, 0), &[1.0, 2.0]);
    let cmd = command(&mut state, ps_t(0), ResourceCopyTarget::Custom(id), CopyOptions::COPY);
    let call = CallInfo::default();

    cmd.run(&mut state, &mut dev, &call);
    let handle = state.resource(id).handle.unwrap();
    let src = dev.bound(BindSlot::ShaderResource(ShaderStage::Pixel, 0)).unwrap();
    assert_ne!(handle, src.resource);
    assert_eq!(dev.data(handle), dev.data(src.resource));
    assert_eq!(state.resource(id).copies_this_frame, 1);

    let created = dev.resources_created();
    cmd.run(&mut state, &mut dev, &call);
    assert_eq!(dev.resources_created(), created);
    assert_eq!(state.resource(id).handle, Some(handle));
    // Pool reference plus the one held by the custom resource.
    assert_eq!(dev.refs(handle), 2);
}

#[test]
fn reference_binds_the_same_resource() {
    let (mut state, mut dev, _) = setup();
    let src = bind_buffer(&mut dev, BindSlot::ShaderResource(ShaderStage::Pixel, 0), &[1.0]);
    let dst = ResourceCopyTarget::Slot(BindSlot::ShaderResource(ShaderStage::Vertex, 2));
    let cmd = command(&mut state, ps_t(0), dst, CopyOptions::REFERENCE);

    cmd.run(&mut state, &mut dev, &CallInfo::default());
    let bound = dev.bound(BindSlot::ShaderResource(ShaderStage::Vertex, 2)).unwrap();
    assert_eq!(bound.resource, src);
    // Both bindings plus the cached view of the destination.
    assert_eq!(dev.refs(src), 3);
    assert_eq!(dev.resources_created(), 1);
}

#[test]
fn referencing_changing_sources_keeps_one_cached_view() {
    let (mut state, mut dev, _) = setup();
    let cmd = command(&mut state, ResourceCopyTarget::This, ps_t(0), CopyOptions::REFERENCE);

    let mut last = None;
    for i in 0..20 {
        let res = dev
            .create_resource(&ResourceDesc::buffer(4, BindFlags::SHADER_RESOURCE), Some(&[0u8; 4][..]))
            .unwrap();
        cmd.run(&mut state, &mut dev, &CallInfo::resource(res));
        dev.release(res);
        assert!(dev.live_views() <= 1, "iteration {i}: {} views", dev.live_views());
        last = Some(res);
    }
    let bound = dev.bound(BindSlot::ShaderResource(ShaderStage::Pixel, 0)).unwrap();
    assert_eq!(Some(bound.resource), last);
    assert_eq!(dev.live_resources(), 1);
}

#[test]
fn null_source_unbinds_unless_asked_not_to() {
    let (mut state, mut dev, _) = setup();
    bind_buffer(&mut dev, BindSlot::ShaderResource(ShaderStage::Pixel, 1), &[1.0]);

    let keep = command(&mut state, ps_t(0), ps_t(1), CopyOptions::REFERENCE.with(CopyOptions::UNLESS_NULL));
    keep.run(&mut state, &mut dev, &CallInfo::default());
    assert!(dev.bound(BindSlot::ShaderResource(ShaderStage::Pixel, 1)).is_some());

    let clear = command(&mut state, ps_t(0), ps_t(1), CopyOptions::REFERENCE);
    clear.run(&mut state, &mut dev, &CallInfo::default());
    assert!(dev.bound(BindSlot::ShaderResource(ShaderStage::Pixel, 1)).is_none());
    assert_eq!(dev.live_resources(), 0);
}

#[test]
fn readback_writes_nan_until_the_transfer_completes() {
    let (mut state, mut dev, _) = setup();
    dev.set_readback_latency(1);
    bind_buffer(&mut dev, BindSlot::ShaderResource(ShaderStage::Pixel, 0), &[1.5, 2.5]);
    let var = state.vars.declare_global("$r", VarShape::Array(2), false).unwrap();
    let range = state.vars.range(var, 0, 2);
    let cmd = command(&mut state, ps_t(0), ResourceCopyTarget::CpuReadback(range), CopyOptions::COPY);

    cmd.run(&mut state, &mut dev, &CallInfo::default());
    assert!(state.vars.value(var).iter().all(|v| v.is_nan()));

    cmd.run(&mut state, &mut dev, &CallInfo::default());
    assert_eq!(state.vars.value(var), &[1.5, 2.5]);
}

#[test]
fn per_frame_quota_skips_further_copies() {
    let (mut state, mut dev, id) = setup();
    state.resource_mut(id).max_copies_per_frame = 1;
    bind_buffer(&mut dev, BindSlot::ShaderResource(ShaderStage::Pixel, 0), &[1.0]);
    let cmd = command(&mut state, ps_t(0), ResourceCopyTarget::Custom(id), CopyOptions::COPY);

    cmd.run(&mut state, &mut dev, &CallInfo::default());
    let copies = dev.copies();
    cmd.run(&mut state, &mut dev, &CallInfo::default());
    assert_eq!(dev.copies(), copies);
    assert_eq!(state.resource(id).copies_this_frame, 1);
}

#[test]
fn stereo2mono_blits_through_a_stereo_intermediate() {
    let mut state = State::new(SessionOpts::default());
    let id = state.add_resource(CustomResource::new("resourcedst"));
    let mut dev = SoftDevice::with_stereo();
    let src = dev
        .create_resource(
            &ResourceDesc::texture2d(4, 4, Format::R8G8B8A8Unorm, BindFlags::SHADER_RESOURCE),
            None,
        )
        .unwrap();
    dev.bind(
        BindSlot::ShaderResource(ShaderStage::Pixel, 0),
        Some(Binding::resource(src)),
    );
    let cmd = command(&mut state, ps_t(0), ResourceCopyTarget::Custom(id), CopyOptions::COPY.with(CopyOptions::STEREO2MONO));

    cmd.run(&mut state, &mut dev, &CallInfo::default());
    let handle = state.resource(id).handle.unwrap();
    assert_eq!(dev.desc(handle).unwrap().width, 8);
    assert_eq!(dev.creation_mode(handle), Some(SurfaceCreationMode::ForceMono));
    let stereo = dev.soft_stereo().unwrap();
    assert_eq!(stereo.reverse_blits, 1);
    assert!(!stereo.reverse_blit);
    assert_eq!(stereo.creation_mode, SurfaceCreationMode::Auto);
}

#[test]
fn releasing_the_cache_frees_pooled_resources() {
    let (mut state, mut dev, _) = setup();
    bind_buffer(&mut dev, BindSlot::ShaderResource(ShaderStage::Pixel, 0), &[1.0]);
    let dst = ResourceCopyTarget::Slot(BindSlot::VertexBuffer(0));
    let cmd = command(&mut state, ps_t(0), dst, CopyOptions::COPY);
    cmd.run(&mut state, &mut dev, &CallInfo::default());
    assert_eq!(state.copy_cache_mut(cmd.cache).pooled(), 1);

    dev.bind(BindSlot::VertexBuffer(0), None);
    dev.bind(BindSlot::ShaderResource(ShaderStage::Pixel, 0), None);
    state.copy_cache_mut(cmd.cache).release(&mut dev);
    assert_eq!(dev.live_resources(), 0);
}

#[test]
fn stereo2mono_width_saturates() {
    let mut state = State::new(SessionOpts::default());
    let cmd = command(&mut state, ps_t(0), ps_t(1), CopyOptions::COPY.with(CopyOptions::STEREO2MONO));
    let src_desc = ResourceDesc::texture2d(u32::MAX - 1, 4, Format::R8G8B8A8Unorm, BindFlags::SHADER_RESOURCE);
    let src = Bound {
        resource: ResourceHandle(1),
        view: None,
        offset: 0,
        stride: 0,
    };

    let desc = cmd.destination_desc(&state, &src_desc, src);
    assert_eq!(desc.width, u32::MAX);
}
