use std::collections::HashMap;

use ethereum_types::{Address, U256};
use log::info;

use super::data_loader::{EnvKind, StorageEntry};
use crate::buffer::{ReservedBuffer, ReservedVariable};
use crate::errors::{SynthesisError, SynthesisResult};
use crate::inputs::{SynthesizerInputs, SynthesizerOpts, TransactionInputs};
use crate::ledger::{Placement, PlacementLedger};
use crate::memory::{MemoryPt, MemoryRecord};
use crate::stack::StackPt;
use crate::subcircuit::{FrontendConfig, SubcircuitLibrary};
use crate::wire::DataPt;

/// Width of the function selector at the head of the call data.
const SELECTOR_BYTES: usize = 4;

/// One executed opcode as reported by the driving interpreter.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct InterpreterStep {
    pub opcode: u8,
    pub pc: usize,
    /// Address of the code being executed.
    pub code_address: Address,
    /// Operands popped by the opcode, top of the stack first.
    pub inputs: Vec<U256>,
    /// Value pushed by the opcode, if any.
    pub output: Option<U256>,
    /// Memory bytes written or returned by the opcode, when it touches
    /// memory. Checked against the symbolic memory when present.
    pub memory_out: Option<Vec<u8>>,
}

/// A synthesis session: the ledger plus the symbolic machine state driving
/// it.
#[derive(Clone, Debug)]
pub struct Synthesizer {
    pub(crate) ledger: PlacementLedger,
    pub(crate) config: FrontendConfig,
    pub(crate) inputs: SynthesizerInputs,
    pub(crate) opts: SynthesizerOpts,
    pub(crate) stack: StackPt,
    pub(crate) memory: MemoryPt,
    pub(crate) calldata: MemoryPt,
    pub(crate) return_records: Vec<MemoryRecord>,
    pub(crate) tx_nonce: Option<u64>,
    pub(crate) constant_cache: HashMap<(U256, usize), DataPt>,
    pub(crate) env_cache: HashMap<(EnvKind, U256), DataPt>,
    pub(crate) storage: HashMap<(Address, U256), StorageEntry>,
}

impl Synthesizer {
    /// Validates the configuration against the library and registers every
    /// reserved buffer wire.
    pub fn new(
        library: SubcircuitLibrary,
        config: FrontendConfig,
        inputs: SynthesizerInputs,
        opts: SynthesizerOpts,
    ) -> SynthesisResult<Self> {
        config.validate()?;
        config.check_against(&library)?;

        let mut ledger = PlacementLedger::new(library)?;
        ledger.init_buffers(&inputs, &config)?;

        info!(
            "Synthesis session started with {} transactions",
            inputs.transactions.len()
        );
        Ok(Self {
            ledger,
            config,
            inputs,
            stack: StackPt::new(opts.max_stack_height),
            opts,
            memory: MemoryPt::new(),
            calldata: MemoryPt::new(),
            return_records: vec![],
            tx_nonce: None,
            constant_cache: HashMap::new(),
            env_cache: HashMap::new(),
            storage: HashMap::new(),
        })
    }

    /// Starts a fresh call frame for transaction `nonce`. Its call data is
    /// laid out as a symbolic memory over the transaction's input wires.
    pub fn begin_transaction(&mut self, nonce: u64) -> SynthesisResult<()> {
        let tx = self
            .inputs
            .transaction(nonce)
            .ok_or(SynthesisError::UnknownTransaction(nonce))?;
        let n_inputs = tx.inputs.len();

        let mut calldata = MemoryPt::new();
        let selector = self
            .ledger
            .load_reserved_variable(ReservedVariable::FunctionSelector, Some(nonce))?;
        calldata.write(0, SELECTOR_BYTES, selector);
        for k in 0..n_inputs {
            let input = self
                .ledger
                .load_reserved_variable(ReservedVariable::TransactionInput(k), Some(nonce))?;
            calldata.write(SELECTOR_BYTES + 32 * k, 32, input);
        }

        self.calldata = calldata;
        self.stack = StackPt::new(self.opts.max_stack_height);
        self.memory = MemoryPt::new();
        self.return_records.clear();
        self.tx_nonce = Some(nonce);
        info!("Synthesizing transaction {nonce} ({n_inputs} call arguments)");
        Ok(())
    }

    pub(crate) fn current_transaction(&self) -> SynthesisResult<&TransactionInputs> {
        self.tx_nonce
            .and_then(|nonce| self.inputs.transaction(nonce))
            .ok_or(SynthesisError::NoActiveTransaction)
    }

    pub fn ledger(&self) -> &PlacementLedger {
        &self.ledger
    }

    pub fn config(&self) -> &FrontendConfig {
        &self.config
    }

    pub fn stack(&self) -> &StackPt {
        &self.stack
    }

    pub fn memory(&self) -> &MemoryPt {
        &self.memory
    }

    pub fn calldata(&self) -> &MemoryPt {
        &self.calldata
    }

    /// Records backing the data of the last RETURN or REVERT.
    pub fn return_data(&self) -> &[MemoryRecord] {
        &self.return_records
    }

    pub fn storage_entry(&self, address: Address, slot: U256) -> Option<&StorageEntry> {
        self.storage.get(&(address, slot))
    }

    /// A detached copy of the placements appended so far.
    pub fn placements(&self) -> Vec<Placement> {
        self.ledger.placements()
    }

    /// Closes the session: exposes the resulting state root when one was
    /// supplied, re-checks the ledger and hands over its placements.
    pub fn finalize(mut self) -> SynthesisResult<Vec<Placement>> {
        if let Some(root) = self.inputs.result_merkle_root {
            let variable = ReservedVariable::ResultMerkleRoot;
            let root_pt = self.load_arbitrary_static(
                root,
                variable.slot().bit_width,
                Some("Resulting Merkle tree root hash"),
            )?;
            self.ledger
                .emit_to_out_buffer(&root_pt, ReservedBuffer::PublicOut, variable.provenance())?;
        }

        self.ledger.check_consistency()?;
        info!(
            "Synthesis finished with {} placements ({} public outputs)",
            self.ledger.len(),
            self.ledger.buffer_len(ReservedBuffer::PublicOut)
        );
        Ok(self.ledger.placements())
    }
}
