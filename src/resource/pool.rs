use std::collections::HashMap;

use xxhash_rust::xxh3::Xxh3;

use crate::device::{Device, DeviceError, ResourceHandle, SurfaceCreationMode};
use crate::resource::desc::ResourceDesc;

const XXH3_SEED: u64 = 0x8b5ad4a0c7d8e9f1;

/// Field-by-field hasher so pool keys do not depend on struct layout.
struct StableHasher {
    inner: Xxh3,
}

impl StableHasher {
    fn new() -> Self {
        Self {
            inner: Xxh3::with_seed(XXH3_SEED),
        }
    }

    fn write_u8(&mut self, v: u8) {
        self.inner.update(&[v]);
    }

    fn write_u32(&mut self, v: u32) {
        self.inner.update(&v.to_le_bytes());
    }

    fn finish(self) -> u64 {
        self.inner.digest()
    }
}

/// Content hash of a creation description plus the stereo mode it is created under.
pub(crate) fn pool_key(desc: &ResourceDesc, mode: SurfaceCreationMode) -> u64 {
    let mut h = StableHasher::new();
    h.write_u8(desc.kind.tag());
    h.write_u32(desc.width);
    h.write_u32(desc.height);
    h.write_u32(desc.depth);
    h.write_u32(desc.array_size);
    h.write_u32(desc.mips);
    h.write_u8(desc.format.tag());
    h.write_u32(desc.samples);
    h.write_u8(desc.usage.tag());
    h.write_u32(desc.bind.0);
    h.write_u32(desc.cpu_access.0);
    h.write_u32(desc.misc.0);
    h.write_u32(desc.stride);
    h.write_u8(mode.tag());
    h.finish()
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolStats {
    pub(crate) hits: u64,
    pub(crate) misses: u64,
}

/// Resources keyed by the content hash of their description.
///
/// Lets one named destination hold resources of different shapes over time without creating a
/// new resource every time the source changes. Entries are never evicted; they are released
/// together on teardown.
#[derive(Debug, Default)]
pub(crate) struct ResourcePool {
    entries: HashMap<u64, ResourceHandle>,
    stats: PoolStats,
}

impl ResourcePool {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Cached resource for `desc`, creating it on a miss. With `add_ref` the caller receives its
    /// own reference; otherwise the pool keeps the only one.
    pub(crate) fn get_or_create(
        &mut self,
        device: &mut dyn Device,
        desc: &ResourceDesc,
        mode: SurfaceCreationMode,
        add_ref: bool,
        owner: &str,
    ) -> Result<ResourceHandle, DeviceError> {
        let key = pool_key(desc, mode);
        if let Some(&res) = self.entries.get(&key) {
            self.stats.hits += 1;
            if add_ref {
                device.add_ref(res);
            }
            return Ok(res);
        }

        self.stats.misses += 1;
        let res = device.create_resource(desc, None)?;
        self.entries.insert(key, res);
        if add_ref {
            device.add_ref(res);
        }
        if self.entries.len() > 1 {
            tracing::info!(
                owner,
                entries = self.entries.len(),
                %desc,
                "resource pool grew; the source is changing shape between copies"
            );
        }
        Ok(res)
    }

    pub(crate) fn release_all(&mut self, device: &mut dyn Device) {
        for (_, res) in self.entries.drain() {
            device.release(res);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/resource/pool.rs"]
mod tests;
