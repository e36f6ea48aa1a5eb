//! Symbolic execution of EVM transactions into subcircuit placements.
//!
//! The evm_synthesis crate follows the execution of a transaction opcode by
//! opcode and records, for each of them, which precompiled subcircuits must be
//! instantiated and how their wires connect. The result is an append-only
//! list of [`Placement`]s from which a downstream finalizer derives the global
//! wire permutation and the instance witness of the circuit.
//!
//! Values never enter the circuit directly. Every external value (block data,
//! call data, constants, storage) goes through one of the reserved buffer
//! placements that occupy the first [`FIRST_ARITHMETIC_PLACEMENT_INDEX`]
//! slots of the ledger; see the [`buffer`] module for their layout.
//!
//! # Usage
//!
//! A session is seeded with the compiled subcircuit library, the frontend
//! parameters and the inputs of the transactions to synthesize. The driving
//! interpreter then reports each executed opcode together with the values it
//! popped and pushed:
//!
//! ```ignore
//! let library = SubcircuitLibrary::from_json_str(&subcircuit_info)?;
//! let config = FrontendConfig::from_json_str(&frontend_cfg)?;
//! let mut synthesizer = Synthesizer::new(library, config, inputs, SynthesizerOpts::default())?;
//!
//! synthesizer.begin_transaction(0)?;
//! for step in trace {
//!     synthesizer.synthesize_step(&step)?;
//! }
//! let placements = synthesizer.finalize()?;
//! ```
//!
//! Every step is checked against the values the interpreter observed, so a
//! symbolic trace that diverges from the real execution is reported as an
//! error instead of producing a circuit that proves something else.
//!
//! # Errors
//!
//! All failures are reported as [`SynthesisError`]s and are fatal for the
//! session: placements produced before the failure must be discarded.

#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_debug_implementations)]

pub mod arithmetic;
pub mod buffer;
pub mod errors;
pub mod inputs;
pub mod ledger;
pub mod memory;
pub mod stack;
pub mod subcircuit;
pub mod synthesis;
pub mod wire;

#[cfg(test)]
pub(crate) mod testing_utils;

pub use crate::buffer::{ReservedBuffer, ReservedVariable, FIRST_ARITHMETIC_PLACEMENT_INDEX};
pub use crate::errors::{SynthesisError, SynthesisResult, WireError};
pub use crate::inputs::{BlockEnvironment, SynthesizerInputs, SynthesizerOpts, TransactionInputs};
pub use crate::ledger::{Placement, PlacementLedger, Usage};
pub use crate::subcircuit::{FrontendConfig, SubcircuitInfo, SubcircuitLibrary, SubcircuitName};
pub use crate::synthesis::{EnvKind, InterpreterStep, StorageAccess, StorageEntry, Synthesizer};
pub use crate::wire::{DataPt, DataPtDescription, Provenance, WireRef};
