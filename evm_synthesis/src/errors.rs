use ethereum_types::U256;
use thiserror::Error;

use crate::arithmetic::ArithmeticOperator;
use crate::buffer::ReservedBuffer;
use crate::subcircuit::SubcircuitName;
use crate::wire::WireRef;

/// A specialized `Result` type for synthesis operations.
pub type SynthesisResult<T> = Result<T, SynthesisError>;

/// A failed attempt to build a [`DataPt`](crate::wire::DataPt).
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum WireError {
    #[error("Bit width must be between 1 and 256 (got {0})")]
    InvalidBitWidth(usize),

    #[error("Value {value:#x} does not fit in {bit_width} bits")]
    ValueTooWide { value: U256, bit_width: usize },

    /// 255-bit and 252-bit wires carry field elements and must be reduced.
    #[error("Value {value:#x} is not below the modulus {modulus:#x} of {bit_width}-bit wires")]
    ValueNotReduced {
        value: U256,
        bit_width: usize,
        modulus: U256,
    },
}

/// An unrecoverable error raised while synthesizing placements.
///
/// None of these are meant to be caught and retried: a session that returns
/// one of them has produced a partial circuit that must be discarded.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum SynthesisError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error("Subcircuit library is malformed: {0}")]
    InvalidLibrary(String),

    #[error("Configuration is malformed: {0}")]
    InvalidConfig(String),

    #[error("Subcircuit `{0}` is not part of the loaded library")]
    UnknownSubcircuit(SubcircuitName),

    /// A raw literal reached a placement without going through a buffer.
    #[error(
        "Input {input_index} of placement {placement} ({name}) is not produced by any placement"
    )]
    UnboundInput {
        placement: usize,
        name: SubcircuitName,
        input_index: usize,
    },

    #[error(
        "Input {input_index} of placement {placement} references {wire:?} which does not exist yet"
    )]
    DanglingInput {
        placement: usize,
        input_index: usize,
        wire: WireRef,
    },

    #[error("Subcircuit {name} expects {expected} {kind} wires, got {actual}")]
    ArityMismatch {
        name: SubcircuitName,
        kind: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Output {wire_index} of placement {placement} is sourced from {found:?}")]
    MisplacedOutput {
        placement: usize,
        wire_index: usize,
        found: WireRef,
    },

    #[error("Invalid use of buffers: {buffer:?} is not an {expected} buffer")]
    InvalidBufferUse {
        buffer: ReservedBuffer,
        expected: &'static str,
    },

    #[error("Mismatch in the buffer wires (placement id: {0})")]
    BufferLengthMismatch(usize),

    #[error("Mismatches in the buffer wires: value {input:#x} goes out as {output:#x}")]
    BufferValueMismatch { input: U256, output: U256 },

    #[error(
        "Invalid indexing in the output wire of an output buffer (expected {expected}, got {actual})"
    )]
    BufferIndexMismatch { expected: usize, actual: usize },

    #[error("External wire {wire:?} cannot enter buffer {buffer:?} at position {position}")]
    BufferSourceMismatch {
        buffer: ReservedBuffer,
        position: usize,
        wire: WireRef,
    },

    #[error("Buffer {buffer:?} is missing its reserved wire {wire_index}")]
    MissingReservedWire {
        buffer: ReservedBuffer,
        wire_index: usize,
    },

    #[error("Invalid wire information for {variable}: expected ({buffer}, {wire_index})")]
    InvalidWireInformation {
        variable: String,
        buffer: usize,
        wire_index: usize,
    },

    #[error("Reading {0} requires transaction nonce")]
    MissingTransactionNonce(String),

    #[error("{0} has no fixed position in its buffer")]
    DynamicReservedVariable(String),

    #[error("Transactions must be listed in nonce order: expected {expected}, got {actual}")]
    UnorderedTransaction { expected: u64, actual: u64 },

    #[error("Stack overflow (maximum height {0})")]
    StackOverflow(usize),

    #[error("Cannot push an unbound literal onto the stack")]
    UnboundStackValue,

    #[error("Stack underflow: {requested} items requested with {available} available")]
    StackUnderflow { requested: usize, available: usize },

    #[error("Nothing to load from memory")]
    EmptyAlias,

    #[error(
        "{fragments} fragments exceed the Accumulator fan-in of {limit}. Go to qap-compiler and \
         unlimit the number of inputs for the Accumulator."
    )]
    AccumulatorOverflow { fragments: usize, limit: usize },

    #[error("{operator} expects {expected} inputs, got {actual}")]
    OperandCount {
        operator: ArithmeticOperator,
        expected: usize,
        actual: usize,
    },

    #[error("{operator} has a shift or size value greater than 255 ({value:#x}). Adjust {name}")]
    SelectorOperandTooLarge {
        operator: ArithmeticOperator,
        name: SubcircuitName,
        value: U256,
    },

    #[error("SubEXP: b is not binary ({0:#x})")]
    NonBinaryExponentBit(U256),

    #[error("Input data mismatch for {operation}: stack holds {symbolic:#x}, interpreter popped {actual:#x}")]
    InputDataMismatch {
        operation: String,
        symbolic: U256,
        actual: U256,
    },

    #[error("Output data mismatch for {operation}: synthesized {symbolic:#x}, interpreter pushed {actual:#x}")]
    OutputDataMismatch {
        operation: String,
        symbolic: U256,
        actual: U256,
    },

    #[error("Output memory data mismatch for {operation} over ({offset}, {length})")]
    MemoryDataMismatch {
        operation: String,
        offset: usize,
        length: usize,
    },

    #[error("{opcode:#04x} expects {expected} popped operands, got {actual}")]
    StepOperandCount {
        opcode: u8,
        expected: usize,
        actual: usize,
    },

    #[error("{0:#04x} pushes a value but the interpreter reported none")]
    MissingStepOutput(u8),

    #[error("Offset or length {0:#x} does not fit in memory")]
    MemoryOffsetTooLarge(U256),

    #[error("Keccak digest mismatch: recomputed {computed:#x}, interpreter produced {actual:#x}")]
    KeccakMismatch { computed: U256, actual: U256 },

    #[error("Storage writing at a user slot must be a warm access (slot {0:#x})")]
    ColdUserStorageWrite(U256),

    #[error("Block hash {index} is out of the configured range 1..={max}")]
    BlockHashOutOfRange { index: usize, max: usize },

    #[error("No transaction is being synthesized")]
    NoActiveTransaction,

    #[error("Transaction {0} is not part of the session inputs")]
    UnknownTransaction(u64),

    #[error("Unsupported opcode {0:#04x}")]
    UnsupportedOpcode(u8),

    #[error("Ledger is inconsistent: {0}")]
    InconsistentLedger(String),
}
