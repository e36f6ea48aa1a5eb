//! The synthesis session: symbolic machine state plus the opcode dispatcher
//! that turns interpreter steps into placements.

pub(crate) mod data_loader;
pub(crate) mod memory_ops;
pub(crate) mod operation;
pub(crate) mod state;
pub(crate) mod transition;

pub use data_loader::{EnvKind, StorageAccess, StorageEntry};
pub use state::{InterpreterStep, Synthesizer};
