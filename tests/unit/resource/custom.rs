use super::*;
use crate::device::SoftDevice;

fn section(lines: &[(&str, &str)]) -> CustomResource {
    let mut res = CustomResource::new("resourcetest");
    for (k, v) in lines {
        res.parse_key(k, v).unwrap();
    }
    res
}

#[test]
fn unknown_keys_and_bad_values_are_rejected() {
    let mut res = CustomResource::new("resourcetest");
    assert!(res.parse_key("colour", "red").is_err());
    assert!(res.parse_key("format", "not_a_format").is_err());
    assert!(res.parse_key("width", "wide").is_err());
    assert!(res.parse_key("width", "0x40").is_ok());
    assert_eq!(res.overrides.width, Some(64));
}

#[test]
fn data_creates_a_buffer_sized_to_fit() {
    let res = section(&[("data", "1 2 3 4")]);
    let desc = res.procedural_desc((0, 0)).unwrap();
    assert_eq!(desc.kind, ResourceKind::Buffer);
    assert_eq!(desc.width, 16);
}

#[test]
fn multipliers_follow_the_resolution() {
    let res = section(&[
        ("type", "texture2d"),
        ("format", "r16g16b16a16_float"),
        ("width_multiply", "0.5"),
        ("height_multiply", "2"),
    ]);
    let desc = res.procedural_desc((1920, 1080)).unwrap();
    assert_eq!((desc.width, desc.height), (960, 2160));
    assert_eq!(desc.format, Format::R16G16B16A16Float);
}

#[test]
fn sections_without_a_shape_wait_for_a_copy() {
    let res = section(&[("bind_flags", "shader_resource")]);
    assert!(res.procedural_desc((0, 0)).is_none());
}

#[test]
fn failed_creation_is_attempted_once() {
    let mut dev = SoftDevice::new();
    dev.set_max_resource_bytes(Some(4));
    let mut res = section(&[("data", "1 2")]);
    res.substantiate(&mut dev, (0, 0));
    assert!(res.handle.is_none());

    dev.set_max_resource_bytes(None);
    res.substantiate(&mut dev, (0, 0));
    assert!(res.handle.is_none());

    res.release(&mut dev);
    res.substantiate(&mut dev, (0, 0));
    assert!(res.handle.is_some());
}

#[test]
fn initial_data_is_uploaded() {
    let mut dev = SoftDevice::new();
    let mut res = section(&[("data", "1.5")]);
    res.substantiate(&mut dev, (0, 0));
    let h = res.handle.unwrap();
    assert_eq!(dev.data(h).unwrap(), 1.5f32.to_le_bytes().as_slice());
}

#[test]
fn forced_mode_is_restored_after_creation() {
    let mut dev = SoftDevice::with_stereo();
    let mut res = section(&[("data", "0"), ("mode", "mono")]);
    res.substantiate(&mut dev, (0, 0));
    let h = res.handle.unwrap();
    assert_eq!(dev.creation_mode(h), Some(SurfaceCreationMode::ForceMono));
    assert_eq!(
        dev.soft_stereo().unwrap().creation_mode,
        SurfaceCreationMode::Auto
    );
}

#[test]
fn view_cache_reuses_views_until_cleared() {
    let mut dev = SoftDevice::new();
    let mut res = section(&[("type", "texture2d"), ("width", "4"), ("height", "4")]);
    res.substantiate(&mut dev, (0, 0));
    let h = res.handle.unwrap();
    let a = res.views.get(&mut dev, h, ViewKind::ShaderResource, false, true);
    let b = res.views.get(&mut dev, h, ViewKind::ShaderResource, false, true);
    assert_eq!(a, b);
    assert_eq!(res.views.len(), 1);

    res.release(&mut dev);
    assert_eq!(dev.live_views(), 0);
    assert_eq!(dev.live_resources(), 0);
}

#[test]
fn per_frame_quota() {
    let mut res = section(&[("max_copies_per_frame", "2")]);
    assert!(!res.quota_exhausted());
    res.copies_this_frame = 2;
    assert!(res.quota_exhausted());
}
