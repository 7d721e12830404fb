//! Two-level page table of a simulated process.
//!
//! A VPN is split by a fixed radix into an index into the outer directory
//! and an index into the inner directory found there. Inner directories
//! are created lazily by the fault handler.

use crate::constants::*;
use crate::error::VmError;
use crate::memory::FrameNumber;

/// A virtual page number decomposed into its table indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VirtualPage {
    pub vpn: u32,
    pub outer: usize,
    pub inner: usize,
}

impl VirtualPage {
    /// Decompose a raw VPN, rejecting pages past the end of the address space
    pub fn from_raw(vpn: u32) -> Result<Self, VmError> {
        if vpn >= MAX_VPN {
            return Err(VmError::AddressOutOfRange { vpn });
        }
        let outer = vpn as usize / PTES_PER_DIRECTORY;
        let inner = vpn as usize % PTES_PER_DIRECTORY;

        Ok(VirtualPage { vpn, outer, inner })
    }

    /// Rebuild a VPN from its indices
    #[inline]
    pub fn compose(outer: usize, inner: usize) -> u32 {
        (outer * PTES_PER_DIRECTORY + inner) as u32
    }
}

impl std::fmt::Display for VirtualPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vpn {} (outer={}, inner={})", self.vpn, self.outer, self.inner)
    }
}

/// Page table entry. The frame is referenced, not owned: under COW several
/// processes' PTEs carry the same `pfn`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pte {
    pub valid: bool,
    pub writable: bool,
    pub pfn: FrameNumber,
}

impl Pte {
    /// A valid, writable mapping of `pfn`
    pub fn mapped(pfn: FrameNumber) -> Self {
        Pte {
            valid: true,
            writable: true,
            pfn,
        }
    }
}

/// Inner directory: one PTE per low-order index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PteDirectory {
    pub ptes: [Pte; PTES_PER_DIRECTORY],
}

impl PteDirectory {
    /// A directory whose entries are all invalid
    pub fn new() -> Self {
        PteDirectory {
            ptes: [Pte::default(); PTES_PER_DIRECTORY],
        }
    }
}

impl Default for PteDirectory {
    fn default() -> Self {
        Self::new()
    }
}

/// Outer directory. Cloning it duplicates every inner directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTable {
    outer_ptes: [Option<Box<PteDirectory>>; NR_OUTER_DIRECTORIES],
}

impl PageTable {
    pub fn new() -> Self {
        PageTable {
            outer_ptes: [const { None }; NR_OUTER_DIRECTORIES],
        }
    }

    #[inline]
    pub fn directory(&self, outer: usize) -> Option<&PteDirectory> {
        self.outer_ptes[outer].as_deref()
    }

    #[inline]
    pub fn directory_mut(&mut self, outer: usize) -> Option<&mut PteDirectory> {
        self.outer_ptes[outer].as_deref_mut()
    }

    /// Put a fresh, all-invalid directory in slot `outer`, replacing nothing.
    /// Returns the directory now in the slot.
    pub fn install_directory(&mut self, outer: usize) -> &mut PteDirectory {
        self.outer_ptes[outer].get_or_insert_with(|| Box::new(PteDirectory::new()))
    }

    /// PTE for `page`, or `None` when its directory does not exist yet
    pub fn pte(&self, page: VirtualPage) -> Option<&Pte> {
        self.directory(page.outer).map(|pd| &pd.ptes[page.inner])
    }

    pub fn pte_mut(&mut self, page: VirtualPage) -> Option<&mut Pte> {
        self.directory_mut(page.outer).map(|pd| &mut pd.ptes[page.inner])
    }

    /// Every valid PTE with its VPN, in VPN order
    pub fn mappings(&self) -> impl Iterator<Item = (u32, &Pte)> + '_ {
        self.outer_ptes
            .iter()
            .enumerate()
            .filter_map(|(outer, pd)| pd.as_deref().map(|pd| (outer, pd)))
            .flat_map(|(outer, pd)| {
                pd.ptes
                    .iter()
                    .enumerate()
                    .filter(|(_, pte)| pte.valid)
                    .map(move |(inner, pte)| (VirtualPage::compose(outer, inner), pte))
            })
    }

    /// Clear the writable bit of every valid PTE
    pub fn write_protect(&mut self) {
        for pd in self.outer_ptes.iter_mut().flatten() {
            for pte in pd.ptes.iter_mut().filter(|pte| pte.valid) {
                pte.writable = false;
            }
        }
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}
