use log::warn;

use crate::constants::*;
use crate::error::VmError;

/// Opaque handle of a physical page frame.
pub type FrameNumber = u32;

/// Source of fresh page frames for the fault handler.
pub trait FrameAllocator {
    /// Hand out a frame no PTE refers to yet.
    fn allocate_frame(&mut self) -> Result<FrameNumber, VmError>;
}

/// One allocated page frame
struct Frame {
    words: Box<[u32; FRAME_WORDS]>,
    /// Number of PTEs pointing at this frame
    mapcount: usize,
}

/// Simulated physical memory: a bounded pool of frames handed out in order.
///
/// Frames are never reclaimed. A frame's mapping count only tells the COW
/// path whether the faulting PTE is the last one referring to it.
pub struct PhysicalMemory {
    frames: Vec<Frame>,
    capacity: usize,
}

impl PhysicalMemory {
    /// Create an empty pool that can hand out `capacity` frames
    pub fn new(capacity: usize) -> Self {
        PhysicalMemory {
            frames: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Number of frames handed out so far
    pub fn allocated(&self) -> usize {
        self.frames.len()
    }

    /// Number of frames still available
    pub fn free_count(&self) -> usize {
        self.capacity - self.frames.len()
    }

    /// Read a word from a frame
    #[inline]
    pub fn read_word(&self, frame: FrameNumber, offset: usize) -> u32 {
        self.frames[frame as usize].words[offset]
    }

    /// Write a word to a frame
    #[inline]
    pub fn write_word(&mut self, frame: FrameNumber, offset: usize, value: u32) {
        self.frames[frame as usize].words[offset] = value;
    }

    /// Copy the whole content of `src` into `dst`
    pub fn copy_frame(&mut self, src: FrameNumber, dst: FrameNumber) {
        let words = *self.frames[src as usize].words;
        *self.frames[dst as usize].words = words;
    }

    /// Number of PTEs currently referring to `frame`
    #[inline]
    pub fn mapcount(&self, frame: FrameNumber) -> usize {
        self.frames[frame as usize].mapcount
    }

    /// Record one more PTE sharing `frame`
    pub fn get_frame(&mut self, frame: FrameNumber) {
        self.frames[frame as usize].mapcount += 1;
    }

    /// Record that a PTE stopped referring to `frame`
    pub fn put_frame(&mut self, frame: FrameNumber) {
        let entry = &mut self.frames[frame as usize];
        debug_assert!(entry.mapcount > 0, "frame {} has no mappings", frame);
        entry.mapcount = entry.mapcount.saturating_sub(1);
    }
}

impl Default for PhysicalMemory {
    fn default() -> Self {
        Self::new(NR_FRAMES)
    }
}

impl FrameAllocator for PhysicalMemory {
    fn allocate_frame(&mut self) -> Result<FrameNumber, VmError> {
        if self.frames.len() >= self.capacity {
            warn!("frame pool exhausted after {} frames", self.capacity);
            return Err(VmError::OutOfFrames);
        }

        let pfn = self.frames.len() as FrameNumber;
        self.frames.push(Frame {
            words: Box::new([0; FRAME_WORDS]),
            mapcount: 1,
        });
        Ok(pfn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_are_handed_out_in_order() {
        let mut pm = PhysicalMemory::new(4);
        assert_eq!(pm.allocate_frame(), Ok(0));
        assert_eq!(pm.allocate_frame(), Ok(1));
        assert_eq!(pm.allocate_frame(), Ok(2));
        assert_eq!(pm.allocated(), 3);
        assert_eq!(pm.free_count(), 1);
    }

    #[test]
    fn test_exhaustion() {
        let mut pm = PhysicalMemory::new(1);
        assert_eq!(pm.allocate_frame(), Ok(0));
        assert_eq!(pm.allocate_frame(), Err(VmError::OutOfFrames));
        // Still exhausted, nothing was reclaimed
        assert_eq!(pm.allocate_frame(), Err(VmError::OutOfFrames));
        assert_eq!(pm.allocated(), 1);
    }

    #[test]
    fn test_new_frames_are_zeroed() {
        let mut pm = PhysicalMemory::default();
        let pfn = pm.allocate_frame().unwrap();
        for offset in 0..FRAME_WORDS {
            assert_eq!(pm.read_word(pfn, offset), 0);
        }
    }

    #[test]
    fn test_read_write() {
        let mut pm = PhysicalMemory::default();
        let pfn = pm.allocate_frame().unwrap();
        pm.write_word(pfn, 3, 42);
        assert_eq!(pm.read_word(pfn, 3), 42);
        assert_eq!(pm.read_word(pfn, 2), 0);
    }

    #[test]
    fn test_copy_frame_is_independent() {
        let mut pm = PhysicalMemory::default();
        let a = pm.allocate_frame().unwrap();
        let b = pm.allocate_frame().unwrap();
        pm.write_word(a, 0, 7);
        pm.write_word(a, FRAME_WORDS - 1, 9);

        pm.copy_frame(a, b);
        assert_eq!(pm.read_word(b, 0), 7);
        assert_eq!(pm.read_word(b, FRAME_WORDS - 1), 9);

        // Writing the copy leaves the source alone
        pm.write_word(b, 0, 100);
        assert_eq!(pm.read_word(a, 0), 7);
    }

    #[test]
    fn test_mapcount() {
        let mut pm = PhysicalMemory::default();
        let pfn = pm.allocate_frame().unwrap();
        assert_eq!(pm.mapcount(pfn), 1);

        pm.get_frame(pfn);
        assert_eq!(pm.mapcount(pfn), 2);

        pm.put_frame(pfn);
        assert_eq!(pm.mapcount(pfn), 1);
    }
}
