use std::fmt;
use std::str::FromStr;

use log::trace;

use crate::memory::FrameNumber;
use crate::page_table::{PageTable, VirtualPage};

/// Kind of memory access an instruction performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

impl AccessKind {
    #[inline]
    pub fn is_write(self) -> bool {
        self == AccessKind::Write
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessKind::Read => write!(f, "r"),
            AccessKind::Write => write!(f, "w"),
        }
    }
}

impl FromStr for AccessKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" | "R" => Ok(AccessKind::Read),
            "w" | "W" => Ok(AccessKind::Write),
            _ => Err(format!("Invalid access type: {}", s)),
        }
    }
}

/// Walk `pagetable` to find the frame backing `page`.
///
/// Returns `None` when the access has to fault: the inner directory is
/// missing, the PTE is invalid, or a write hits a read-only PTE. Never
/// modifies the table.
pub fn translate(pagetable: &PageTable, kind: AccessKind, page: VirtualPage) -> Option<FrameNumber> {
    // Step 1: Find the inner directory
    let Some(pd) = pagetable.directory(page.outer) else {
        trace!("{} {}: no directory", kind, page);
        return None;
    };

    // Step 2: Check the PTE
    let pte = &pd.ptes[page.inner];
    if !pte.valid {
        trace!("{} {}: invalid pte", kind, page);
        return None;
    }

    // Step 3: Writes need write permission, this is where COW kicks in
    if kind.is_write() && !pte.writable {
        trace!("{} {}: write to read-only pte (pfn {})", kind, page, pte.pfn);
        return None;
    }

    trace!("{} {} -> pfn {}", kind, page, pte.pfn);
    Some(pte.pfn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_table::Pte;

    fn page(vpn: u32) -> VirtualPage {
        VirtualPage::from_raw(vpn).unwrap()
    }

    fn map(pt: &mut PageTable, vpn: u32, pte: Pte) {
        let page = page(vpn);
        pt.install_directory(page.outer).ptes[page.inner] = pte;
    }

    #[test]
    fn test_access_kind_parse() {
        assert_eq!("r".parse::<AccessKind>(), Ok(AccessKind::Read));
        assert_eq!("W".parse::<AccessKind>(), Ok(AccessKind::Write));
        assert!("x".parse::<AccessKind>().is_err());
        assert_eq!(AccessKind::Write.to_string(), "w");
    }

    // =========================================================================
    // Faulting walks
    // =========================================================================

    #[test]
    fn test_translate_missing_directory() {
        let pt = PageTable::new();
        assert_eq!(translate(&pt, AccessKind::Read, page(5)), None);
        assert_eq!(translate(&pt, AccessKind::Write, page(5)), None);
    }

    #[test]
    fn test_translate_invalid_pte() {
        let mut pt = PageTable::new();
        map(&mut pt, 4, Pte::mapped(1));

        // Same directory, different entry
        assert_eq!(translate(&pt, AccessKind::Read, page(5)), None);
    }

    #[test]
    fn test_translate_write_to_read_only() {
        let mut pt = PageTable::new();
        map(&mut pt, 5, Pte { valid: true, writable: false, pfn: 3 });

        assert_eq!(translate(&pt, AccessKind::Read, page(5)), Some(3));
        assert_eq!(translate(&pt, AccessKind::Write, page(5)), None);
    }

    #[test]
    fn test_translate_ignores_stale_pfn_of_invalid_pte() {
        let mut pt = PageTable::new();
        map(&mut pt, 9, Pte { valid: false, writable: true, pfn: 6 });

        assert_eq!(translate(&pt, AccessKind::Read, page(9)), None);
        assert_eq!(translate(&pt, AccessKind::Write, page(9)), None);
    }

    // =========================================================================
    // Successful walks
    // =========================================================================

    #[test]
    fn test_translate_writable() {
        let mut pt = PageTable::new();
        map(&mut pt, 5, Pte::mapped(8));

        assert_eq!(translate(&pt, AccessKind::Read, page(5)), Some(8));
        assert_eq!(translate(&pt, AccessKind::Write, page(5)), Some(8));
    }

    #[test]
    fn test_translate_is_idempotent_and_pure() {
        let mut pt = PageTable::new();
        map(&mut pt, 0, Pte::mapped(2));
        map(&mut pt, 255, Pte::mapped(3));
        let before = pt.clone();

        for _ in 0..10 {
            assert_eq!(translate(&pt, AccessKind::Write, page(0)), Some(2));
            assert_eq!(translate(&pt, AccessKind::Write, page(255)), Some(3));
            assert_eq!(translate(&pt, AccessKind::Read, page(100)), None);
        }
        assert_eq!(pt, before);
    }
}
