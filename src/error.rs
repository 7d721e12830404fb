//! Error type shared by translation, fault handling and scheduling.

use core::fmt;

/// Errors surfaced by the MMU simulation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VmError {
    /// A memory access or switch was requested before any process was booted
    NoCurrentProcess,
    /// The physical frame pool has been depleted
    OutOfFrames,
    /// VPN does not fit in the outer/inner directory geometry
    AddressOutOfRange { vpn: u32 },
    /// A process with this pid already exists
    DuplicatePid { pid: u32 },
}

/// Failure of `handle_page_fault`.
pub type FaultError = VmError;

impl fmt::Display for VmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VmError::NoCurrentProcess => write!(f, "no current process"),
            VmError::OutOfFrames => write!(f, "out of physical frames"),
            VmError::AddressOutOfRange { vpn } => {
                write!(f, "vpn {} is outside the address space", vpn)
            }
            VmError::DuplicatePid { pid } => write!(f, "pid {} already exists", pid),
        }
    }
}

impl core::error::Error for VmError {}
