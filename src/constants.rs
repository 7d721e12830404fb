/// Number of PTEs in one inner directory; also the radix of a VPN.
pub const PTES_PER_DIRECTORY: usize = 16;
/// Number of slots in the outer directory of a page table.
pub const NR_OUTER_DIRECTORIES: usize = 16;

/// First VPN past the end of the address space.
pub const MAX_VPN: u32 = (NR_OUTER_DIRECTORIES * PTES_PER_DIRECTORY) as u32;

/// Default size of the physical frame pool.
pub const NR_FRAMES: usize = 128;
/// Words of content held by every frame.
pub const FRAME_WORDS: usize = 16;

/// Pid of the process the driver boots with.
pub const INIT_PID: u32 = 0;
