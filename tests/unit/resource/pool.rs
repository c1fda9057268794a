use super::*;
use crate::device::SoftDevice;
use crate::resource::desc::{BindFlags, Format};

fn tex(w: u32) -> ResourceDesc {
    ResourceDesc::texture2d(w, 4, Format::R8G8B8A8Unorm, BindFlags::SHADER_RESOURCE)
}

#[test]
fn identical_requests_share_one_resource() {
    let mut dev = SoftDevice::new();
    let mut pool = ResourcePool::default();
    let a = pool
        .get_or_create(&mut dev, &tex(8), SurfaceCreationMode::Auto, true, "t")
        .unwrap();
    let b = pool
        .get_or_create(&mut dev, &tex(8), SurfaceCreationMode::Auto, true, "t")
        .unwrap();
    assert_eq!(a, b);
    assert_eq!(pool.len(), 1);
    assert_eq!(dev.resources_created(), 1);
    // Pool's own reference plus one per request.
    assert_eq!(dev.refs(a), 3);
    assert_eq!(pool.stats(), PoolStats { hits: 1, misses: 1 });
}

#[test]
fn a_new_size_adds_an_entry_without_evicting() {
    let mut dev = SoftDevice::new();
    let mut pool = ResourcePool::default();
    let a = pool
        .get_or_create(&mut dev, &tex(8), SurfaceCreationMode::Auto, false, "t")
        .unwrap();
    let b = pool
        .get_or_create(&mut dev, &tex(16), SurfaceCreationMode::Auto, false, "t")
        .unwrap();
    assert_ne!(a, b);
    assert_eq!(pool.len(), 2);
    let again = pool
        .get_or_create(&mut dev, &tex(8), SurfaceCreationMode::Auto, false, "t")
        .unwrap();
    assert_eq!(again, a);
}

#[test]
fn creation_mode_is_part_of_the_key() {
    assert_ne!(
        pool_key(&tex(8), SurfaceCreationMode::ForceMono),
        pool_key(&tex(8), SurfaceCreationMode::ForceStereo)
    );
    assert_eq!(
        pool_key(&tex(8), SurfaceCreationMode::Auto),
        pool_key(&tex(8), SurfaceCreationMode::Auto)
    );
}

#[test]
fn release_all_drops_pool_references() {
    let mut dev = SoftDevice::new();
    let mut pool = ResourcePool::default();
    pool.get_or_create(&mut dev, &tex(8), SurfaceCreationMode::Auto, false, "t")
        .unwrap();
    pool.get_or_create(&mut dev, &tex(4), SurfaceCreationMode::Auto, false, "t")
        .unwrap();
    assert_eq!(dev.live_resources(), 2);
    pool.release_all(&mut dev);
    assert_eq!(dev.live_resources(), 0);
    assert_eq!(pool.len(), 0);
}

#[test]
fn creation_failures_leave_the_pool_unchanged() {
    let mut dev = SoftDevice::new();
    dev.set_max_resource_bytes(Some(16));
    let mut pool = ResourcePool::default();
    assert!(
        pool.get_or_create(&mut dev, &tex(64), SurfaceCreationMode::Auto, false, "t")
            .is_err()
    );
    assert_eq!(pool.len(), 0);
}
