pub mod constants;
pub mod error;
pub mod fault;
pub mod io;
pub mod logger;
pub mod memory;
pub mod page_table;
pub mod process;
pub mod scheduler;
pub mod simulator;
pub mod translation;

// Re-export commonly used items for convenience
pub use constants::*;
pub use error::{FaultError, VmError};
pub use fault::FaultCause;
pub use memory::{FrameAllocator, FrameNumber, PhysicalMemory};
pub use page_table::{PageTable, Pte, VirtualPage};
pub use process::{Pid, Process};
pub use scheduler::{Machine, SwitchOutcome};
pub use simulator::{Simulator, TraceEvent};
pub use translation::AccessKind;
