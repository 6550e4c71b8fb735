use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::effects::{BufferSlot, EffectKind};

/// Identity of one effect uniform buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct BufferKey {
    pub effect: EffectKind,
    pub slot: BufferSlot,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SyncOutcome {
    Created,
    Updated,
}

/// Create-or-update table. A key owns exactly one buffer for the lifetime of the map.
#[derive(Debug)]
pub(crate) struct SlotMap<B> {
    entries: HashMap<BufferKey, B>,
}

impl<B> Default for SlotMap<B> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<B> SlotMap<B> {
    pub fn sync(
        &mut self,
        key: BufferKey,
        create: impl FnOnce() -> B,
        update: impl FnOnce(&B),
    ) -> (&B, SyncOutcome) {
        use std::collections::hash_map::Entry;

        match self.entries.entry(key) {
            Entry::Occupied(entry) => {
                tracing::debug!(
                    effect = %key.effect,
                    slot = key.slot.label(),
                    "buffer already exists; updating"
                );
                let buffer = entry.into_mut();
                update(buffer);
                (buffer, SyncOutcome::Updated)
            }
            Entry::Vacant(entry) => (entry.insert(create()), SyncOutcome::Created),
        }
    }

    pub fn get(&self, key: &BufferKey) -> Option<&B> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

pub(crate) type BufferMap = SlotMap<wgpu::Buffer>;

impl BufferMap {
    /// Writes `bytes` into the buffer for `key`, allocating it on first use.
    pub fn sync_bytes(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        key: BufferKey,
        bytes: &[u8],
    ) -> &wgpu::Buffer {
        let label = format!("{} {}", key.effect, key.slot.label());
        let (buffer, _) = self.sync(
            key,
            || {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&label),
                    contents: bytes,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                })
            },
            |buffer| queue.write_buffer(buffer, 0, bytes),
        );
        buffer
    }
}
