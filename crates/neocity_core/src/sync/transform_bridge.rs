//! # Transform Bridge
//!
//! Double-buffered transform pages shared between a producer thread (a
//! physics worker) and the simulation thread.
//!
//! ## Layout
//!
//! ```text
//! word 0            active page (0 = A, 1 = B), read by the consumer
//! word 1            entity count published with the page
//! words 2 ..        page A: capacity x [px py pz rx ry rz rw]
//! words 2 + 7c ..   page B: same layout
//! ```
//!
//! Floats are stored as their bit patterns in `AtomicU32` words.
//!
//! ## Protocol
//!
//! - The writer only touches the inactive page, then publishes it with
//!   [`BridgeWriter::swap_page`] (one release store).
//! - The reader only reads the active page (acquire load) and never writes.
//! - Once a page is active the writer must not write it again until it
//!   swaps back. A page is only ever written by the writer while the
//!   reader is looking at the other one, so no lock is involved.
//!
//! Exactly one writer and one reader handle exist at a time.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Arc;

use crate::ecs::{ComponentKind, EntityId, TransformSample, World};
use crate::error::{CoreError, CoreResult};

/// Words per entity in a page.
pub const SAMPLE_WORDS: usize = 7;

const ACTIVE_WORD: usize = 0;
const COUNT_WORD: usize = 1;
const HEADER_WORDS: usize = 2;

const WRITER_ROLE: u8 = 1;
const READER_ROLE: u8 = 1 << 1;

/// The shared segment.
pub struct TransformBridge {
    words: Box<[AtomicU32]>,
    capacity: usize,
    roles: AtomicU8,
}

impl TransformBridge {
    /// Allocates a zeroed segment for `capacity` entities. Page A starts
    /// active.
    #[must_use]
    pub fn new(capacity: usize) -> Arc<Self> {
        let len = segment_len_words(capacity);
        Arc::new(Self {
            words: (0..len).map(|_| AtomicU32::new(0)).collect(),
            capacity,
            roles: AtomicU8::new(0),
        })
    }

    /// Entity slots per page.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    fn claim(&self, role: u8) -> CoreResult<()> {
        let previous = self.roles.fetch_or(role, Ordering::AcqRel);
        if previous & role != 0 {
            return Err(CoreError::BridgeRoleTaken);
        }
        Ok(())
    }

    fn release(&self, role: u8) {
        self.roles.fetch_and(!role, Ordering::AcqRel);
    }

    /// Takes the writer role.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BridgeRoleTaken`] while another writer exists.
    pub fn writer(self: &Arc<Self>) -> CoreResult<BridgeWriter> {
        self.claim(WRITER_ROLE)?;
        Ok(BridgeWriter {
            bridge: Arc::clone(self),
        })
    }

    /// Takes the reader role.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BridgeRoleTaken`] while another reader exists.
    pub fn reader(self: &Arc<Self>) -> CoreResult<BridgeReader> {
        self.claim(READER_ROLE)?;
        Ok(BridgeReader {
            bridge: Arc::clone(self),
        })
    }

    /// Takes both roles.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::BridgeRoleTaken`] if either role is held.
    pub fn split(self: &Arc<Self>) -> CoreResult<(BridgeWriter, BridgeReader)> {
        let writer = self.writer()?;
        let reader = self.reader()?;
        Ok((writer, reader))
    }

    #[inline]
    fn active(&self) -> usize {
        self.words[ACTIVE_WORD].load(Ordering::Acquire) as usize & 1
    }

    #[inline]
    fn slot_start(&self, page: usize, index: usize) -> usize {
        HEADER_WORDS + page * self.capacity * SAMPLE_WORDS + index * SAMPLE_WORDS
    }

    fn load_sample(&self, page: usize, index: usize) -> Option<TransformSample> {
        if index >= self.capacity {
            return None;
        }
        let start = self.slot_start(page, index);
        let mut values = [0.0_f32; SAMPLE_WORDS];
        for (value, word) in values.iter_mut().zip(&self.words[start..start + SAMPLE_WORDS]) {
            *value = f32::from_bits(word.load(Ordering::Relaxed));
        }
        Some(TransformSample::from_array(values))
    }

    fn store_sample(&self, page: usize, index: usize, sample: &TransformSample) -> bool {
        if index >= self.capacity {
            return false;
        }
        let start = self.slot_start(page, index);
        for (word, value) in self.words[start..start + SAMPLE_WORDS]
            .iter()
            .zip(sample.to_array())
        {
            word.store(value.to_bits(), Ordering::Relaxed);
        }
        true
    }

    /// Copies the whole segment, header included, as little-endian bytes.
    ///
    /// A diagnostic snapshot; pages may be mid-write.
    pub fn copy_segment_bytes(&self, out: &mut Vec<u8>) {
        out.clear();
        out.reserve(segment_len_bytes(self.capacity));
        for word in self.words.iter() {
            let value = word.load(Ordering::Relaxed).to_le();
            out.extend_from_slice(bytemuck::bytes_of(&value));
        }
    }
}

/// Words in a segment for `capacity` entities.
#[must_use]
pub const fn segment_len_words(capacity: usize) -> usize {
    HEADER_WORDS + 2 * capacity * SAMPLE_WORDS
}

/// Bytes in a segment for `capacity` entities.
#[must_use]
pub const fn segment_len_bytes(capacity: usize) -> usize {
    segment_len_words(capacity) * 4
}

/// Producer side: writes the inactive page and publishes it.
pub struct BridgeWriter {
    bridge: Arc<TransformBridge>,
}

impl BridgeWriter {
    /// Page currently being written (the inactive one).
    #[inline]
    #[must_use]
    pub fn write_page(&self) -> usize {
        self.bridge.active() ^ 1
    }

    /// Entity slots per page.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.bridge.capacity
    }

    /// Writes one entity's sample into the inactive page.
    ///
    /// Returns `false` if `index` is out of range.
    pub fn write(&mut self, index: usize, sample: &TransformSample) -> bool {
        self.bridge.store_sample(self.write_page(), index, sample)
    }

    /// Reads back a sample from the inactive page.
    #[must_use]
    pub fn read_back(&self, index: usize) -> Option<TransformSample> {
        self.bridge.load_sample(self.write_page(), index)
    }

    /// Sets the entity count published with the next swap.
    pub fn set_entity_count(&mut self, count: u32) {
        self.bridge.words[COUNT_WORD].store(count, Ordering::Release);
    }

    /// Makes the inactive page active. Everything written before this call
    /// is visible to the reader after it observes the flip.
    ///
    /// Returns the newly active page.
    pub fn swap_page(&mut self) -> usize {
        let next = self.write_page();
        #[allow(clippy::cast_possible_truncation)]
        self.bridge.words[ACTIVE_WORD].store(next as u32, Ordering::Release);
        next
    }

    /// Writes every Transform entity of `world` into the inactive page and
    /// sets the count to one past the highest index written.
    ///
    /// Returns the number of entities written.
    pub fn publish_from_world(&mut self, world: &World) -> u32 {
        let mut written = 0_u32;
        let mut extent = 0_usize;
        for id in world.iter_alive() {
            let Some(transform) = world.transform(id) else {
                continue;
            };
            if self.write(id.index(), &transform.sample()) {
                written += 1;
                extent = extent.max(id.index() + 1);
            }
        }
        #[allow(clippy::cast_possible_truncation)]
        self.set_entity_count(extent as u32);
        written
    }
}

impl Drop for BridgeWriter {
    fn drop(&mut self) {
        self.bridge.release(WRITER_ROLE);
    }
}

/// Consumer side: reads the active page.
pub struct BridgeReader {
    bridge: Arc<TransformBridge>,
}

impl BridgeReader {
    /// Page currently active.
    #[inline]
    #[must_use]
    pub fn read_page(&self) -> usize {
        self.bridge.active()
    }

    /// Entity count published with the active page.
    #[inline]
    #[must_use]
    pub fn entity_count(&self) -> u32 {
        self.bridge.words[COUNT_WORD].load(Ordering::Acquire)
    }

    /// Reads one entity's sample from the active page.
    #[must_use]
    pub fn read(&self, index: usize) -> Option<TransformSample> {
        self.bridge.load_sample(self.read_page(), index)
    }

    /// Copies the active page into the transforms of every live Transform
    /// entity below the published count.
    ///
    /// Returns the number of entities updated.
    pub fn apply_to_world(&self, world: &mut World) -> u32 {
        let page = self.read_page();
        let count = self.entity_count() as usize;
        let mut applied = 0_u32;

        for index in 0..count.min(self.bridge.capacity) {
            #[allow(clippy::cast_possible_truncation)]
            let id = EntityId::from_raw(index as u32);
            if !world.has_component(id, ComponentKind::Transform) {
                continue;
            }
            let Some(sample) = self.bridge.load_sample(page, index) else {
                continue;
            };
            world.set_position(id, sample.position);
            world.set_rotation(id, sample.rotation);
            applied += 1;
        }
        applied
    }
}

impl Drop for BridgeReader {
    fn drop(&mut self) {
        self.bridge.release(READER_ROLE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::ComponentMask;

    fn markers() -> TransformSample {
        TransformSample::from_array([1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0])
    }

    #[test]
    fn test_layout_size() {
        assert_eq!(segment_len_words(4), 2 + 2 * 4 * 7);
        assert_eq!(segment_len_bytes(4), (2 + 56) * 4);
    }

    #[test]
    fn test_write_swap_read() {
        let bridge = TransformBridge::new(8);
        let (mut writer, reader) = bridge.split().unwrap();

        assert_eq!(reader.read_page(), 0);
        assert_eq!(writer.write_page(), 1);

        writer.write(0, &markers());
        writer.set_entity_count(1);
        // Not visible before the swap
        assert_eq!(reader.read(0), Some(TransformSample::from_array([0.0; 7])));

        assert_eq!(writer.swap_page(), 1);
        assert_eq!(reader.read_page(), 1);
        assert_eq!(reader.read(0), Some(markers()));
        assert_eq!(reader.entity_count(), 1);

        // Next writes go to the other page
        assert_eq!(writer.write_page(), 0);
    }

    #[test]
    fn test_roles_are_exclusive() {
        let bridge = TransformBridge::new(1);
        let writer = bridge.writer().unwrap();
        assert!(matches!(bridge.writer(), Err(CoreError::BridgeRoleTaken)));
        assert!(matches!(bridge.split(), Err(CoreError::BridgeRoleTaken)));

        drop(writer);
        assert!(bridge.split().is_ok());
    }

    #[test]
    fn test_out_of_range() {
        let bridge = TransformBridge::new(2);
        let (mut writer, reader) = bridge.split().unwrap();
        assert!(!writer.write(2, &markers()));
        assert!(reader.read(2).is_none());
    }

    #[test]
    fn test_segment_bytes_header() {
        let bridge = TransformBridge::new(1);
        let (mut writer, _reader) = bridge.split().unwrap();
        writer.set_entity_count(1);
        writer.swap_page();

        let mut bytes = Vec::new();
        bridge.copy_segment_bytes(&mut bytes);
        assert_eq!(bytes.len(), segment_len_bytes(1));
        assert_eq!(&bytes[0..4], &1_u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &1_u32.to_le_bytes());
    }

    #[test]
    fn test_world_round_trip() {
        let mask = ComponentMask::from(ComponentKind::Transform);
        let mut source = World::new(8);
        let a = source.spawn(mask);
        let b = source.spawn(mask);
        source.set_position(a, [1.0, 2.0, 3.0]);
        source.set_position(b, [4.0, 5.0, 6.0]);

        let bridge = TransformBridge::new(8);
        let (mut writer, reader) = bridge.split().unwrap();
        assert_eq!(writer.publish_from_world(&source), 2);
        writer.swap_page();

        let mut target = World::new(8);
        let ta = target.spawn(mask);
        let tb = target.spawn(mask);
        assert_eq!(reader.apply_to_world(&mut target), 2);
        assert_eq!(target.position(ta), Some([1.0, 2.0, 3.0]));
        assert_eq!(target.position(tb), Some([4.0, 5.0, 6.0]));
    }
}
