use std::fmt;

use ethereum_types::U256;
use log::{debug, trace};

use super::data_loader::EnvKind;
use super::state::{InterpreterStep, Synthesizer};
use crate::arithmetic::{ArithmeticOperator, SELECTOR_BIT_WIDTH};
use crate::buffer::ReservedVariable;
use crate::errors::{SynthesisError, SynthesisResult};
use crate::memory::MemoryRecord;
use crate::wire::{DataPt, DataPtDescription, WireRef};

/// Largest memory offset or length a step may use.
const MAX_MEMORY_OFFSET: u64 = u32::MAX as u64;

/// Largest operand an ALU3 or ALU5 placement accepts.
const MAX_BYTE_OPERAND: u64 = 255;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Operation {
    Arithmetic(ArithmeticOperator),
    Keccak,
    Environment(EnvKind),
    Block(ReservedVariable),
    BlockHash,
    CallDataLoad,
    CallDataCopy,
    Pop,
    Mload,
    Mstore,
    Mstore8,
    Sload,
    Sstore,
    Jump,
    Jumpi,
    Jumpdest,
    Push(u8),
    Dup(u8),
    Swap(u8),
    Mcopy,
    Log(u8),
    Stop,
    Return,
    Revert,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arithmetic(op) => write!(f, "{op}"),
            Self::Environment(kind) => write!(f, "{kind}"),
            Self::Block(variable) => write!(f, "{variable}"),
            Self::Push(n) => write!(f, "PUSH{n}"),
            Self::Dup(n) => write!(f, "DUP{n}"),
            Self::Swap(n) => write!(f, "SWAP{n}"),
            Self::Log(n) => write!(f, "LOG{n}"),
            other => f.write_str(match other {
                Self::Keccak => "KECCAK256",
                Self::BlockHash => "BLOCKHASH",
                Self::CallDataLoad => "CALLDATALOAD",
                Self::CallDataCopy => "CALLDATACOPY",
                Self::Pop => "POP",
                Self::Mload => "MLOAD",
                Self::Mstore => "MSTORE",
                Self::Mstore8 => "MSTORE8",
                Self::Sload => "SLOAD",
                Self::Sstore => "SSTORE",
                Self::Jump => "JUMP",
                Self::Jumpi => "JUMPI",
                Self::Jumpdest => "JUMPDEST",
                Self::Mcopy => "MCOPY",
                Self::Stop => "STOP",
                Self::Return => "RETURN",
                _ => "REVERT",
            }),
        }
    }
}

impl Operation {
    /// Number of operands the opcode pops.
    pub(crate) const fn n_inputs(&self) -> usize {
        match self {
            Self::Arithmetic(op) => match op.arity() {
                Some(arity) => arity,
                None => 0,
            },
            Self::Environment(_)
            | Self::Block(_)
            | Self::Jumpdest
            | Self::Push(_)
            | Self::Dup(_)
            | Self::Swap(_)
            | Self::Stop => 0,
            Self::BlockHash | Self::CallDataLoad | Self::Pop | Self::Mload | Self::Sload | Self::Jump => 1,
            Self::Keccak
            | Self::Mstore
            | Self::Mstore8
            | Self::Sstore
            | Self::Jumpi
            | Self::Return
            | Self::Revert => 2,
            Self::CallDataCopy | Self::Mcopy => 3,
            Self::Log(n) => 2 + *n as usize,
        }
    }

    /// Whether the opcode pushes a value the interpreter reports.
    pub(crate) const fn pushes(&self) -> bool {
        matches!(
            self,
            Self::Arithmetic(_)
                | Self::Keccak
                | Self::Environment(_)
                | Self::Block(_)
                | Self::BlockHash
                | Self::CallDataLoad
                | Self::Mload
                | Self::Sload
                | Self::Push(_)
                | Self::Dup(_)
        )
    }
}

fn to_offset(value: U256) -> SynthesisResult<usize> {
    if value > U256::from(MAX_MEMORY_OFFSET) {
        return Err(SynthesisError::MemoryOffsetTooLarge(value));
    }
    Ok(value.low_u64() as usize)
}

impl Synthesizer {
    /// Places `op` over `in_pts`, prepending the ALU selector when the
    /// subcircuit takes one, and returns its output wires.
    pub(crate) fn place_arith(
        &mut self,
        op: ArithmeticOperator,
        in_pts: &[DataPt],
    ) -> SynthesisResult<Vec<DataPt>> {
        let Some((name, selector)) = op.subcircuit_mapping() else {
            return Ok(vec![self.place_exp(in_pts)?]);
        };
        let values: Vec<U256> = in_pts.iter().map(DataPt::value).collect();
        let outputs = op.execute(&values)?;
        if op.has_byte_operand() && values[0] > U256::from(MAX_BYTE_OPERAND) {
            return Err(SynthesisError::SelectorOperandTooLarge {
                operator: op,
                name,
                value: values[0],
            });
        }

        let mut placement_in = Vec::with_capacity(in_pts.len() + 1);
        if let Some(selector) = selector {
            let description = format!("ALU selector for {op} of {name}");
            placement_in.push(self.load_arbitrary_static(
                selector,
                SELECTOR_BIT_WIDTH,
                Some(&description),
            )?);
        }
        placement_in.extend_from_slice(in_pts);

        let index = self.ledger.next_index();
        let out_pts = outputs
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                DataPt::create(
                    DataPtDescription::new(WireRef::Produced(index, i), op.output_bit_width()),
                    value,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;
        self.ledger.place(name, placement_in, out_pts.clone(), op)?;
        Ok(out_pts)
    }

    /// [`Self::place_arith`] for operators with a single output.
    pub(crate) fn place_single(
        &mut self,
        op: ArithmeticOperator,
        in_pts: &[DataPt],
    ) -> SynthesisResult<DataPt> {
        self.place_arith(op, in_pts)?
            .into_iter()
            .next()
            .ok_or_else(|| SynthesisError::InconsistentLedger(format!("{op} produced no output")))
    }

    /// Square-and-multiply over the bits of the exponent, least significant
    /// first.
    fn place_exp(&mut self, in_pts: &[DataPt]) -> SynthesisResult<DataPt> {
        let [base, exponent] = in_pts else {
            return Err(SynthesisError::OperandCount {
                operator: ArithmeticOperator::Exp,
                expected: 2,
                actual: in_pts.len(),
            });
        };
        if exponent.value().is_zero() {
            return self.load_constant(U256::one());
        }
        if exponent.value() == U256::one() {
            return Ok(base.clone());
        }

        let bits = self.place_arith(ArithmeticOperator::DecToBit, &[exponent.clone()])?;
        let n_bits = exponent.value().bits();
        trace!("EXP over {n_bits} exponent bits");
        let mut acc = self.load_constant(U256::one())?;
        let mut square = base.clone();
        for i in 0..n_bits {
            let bit = bits[bits.len() - 1 - i].clone();
            let outputs = self.place_arith(ArithmeticOperator::SubExp, &[acc, square, bit])?;
            let [next_acc, next_square] = outputs.as_slice() else {
                return Err(SynthesisError::InconsistentLedger(
                    "SubEXP must produce two outputs".to_string(),
                ));
            };
            acc = next_acc.clone();
            square = next_square.clone();
        }
        Ok(acc)
    }

    /// Pops one wire per operand the interpreter reports and checks each
    /// against its value.
    fn pop_checked(
        &mut self,
        operation: Operation,
        values: &[U256],
    ) -> SynthesisResult<Vec<DataPt>> {
        let in_pts = self.stack.pop_n(values.len())?;
        for (pt, actual) in in_pts.iter().zip(values) {
            if pt.value() != *actual {
                return Err(SynthesisError::InputDataMismatch {
                    operation: operation.to_string(),
                    symbolic: pt.value(),
                    actual: *actual,
                });
            }
        }
        Ok(in_pts)
    }

    fn push_checked(
        &mut self,
        operation: Operation,
        out_pt: DataPt,
        step: &InterpreterStep,
    ) -> SynthesisResult<()> {
        let actual = step
            .output
            .ok_or(SynthesisError::MissingStepOutput(step.opcode))?;
        if out_pt.value() != actual {
            return Err(SynthesisError::OutputDataMismatch {
                operation: operation.to_string(),
                symbolic: out_pt.value(),
                actual,
            });
        }
        self.stack.push(out_pt)
    }

    /// Compares the memory window an opcode wrote or returned with the bytes
    /// the interpreter reports, when it reports any.
    fn check_memory_out(
        &self,
        operation: Operation,
        step: &InterpreterStep,
        offset: usize,
        length: usize,
    ) -> SynthesisResult<()> {
        let Some(expected) = &step.memory_out else {
            return Ok(());
        };
        let actual = self.memory.view_memory(offset, length);
        if actual != *expected {
            debug!(
                "{operation} memory over ({offset}, {length}): synthesized 0x{}, interpreter 0x{}",
                hex::encode(&actual),
                hex::encode(expected)
            );
            return Err(SynthesisError::MemoryDataMismatch {
                operation: operation.to_string(),
                offset,
                length,
            });
        }
        Ok(())
    }

    fn load_zero(&mut self) -> SynthesisResult<DataPt> {
        self.load_arbitrary_static(U256::zero(), 1, None)
    }

    fn write_records(&mut self, records: Vec<MemoryRecord>) {
        for record in records {
            self.memory
                .write(record.offset, record.size, record.data_pt);
        }
    }
}

/// Places an arithmetic opcode over the popped wires. ALU3 and ALU5 only read
/// the low byte of their first operand, so larger shift, byte and size
/// operands are rejected rather than disconnected from the circuit.
pub(crate) fn generate_arithmetic(
    op: ArithmeticOperator,
    state: &mut Synthesizer,
    step: &InterpreterStep,
) -> SynthesisResult<()> {
    let operation = Operation::Arithmetic(op);
    let in_pts = state.pop_checked(operation, &step.inputs)?;
    let out_pt = state.place_single(op, &in_pts)?;
    state.push_checked(operation, out_pt, step)
}

pub(crate) fn generate_keccak(state: &mut Synthesizer, step: &InterpreterStep) -> SynthesisResult<()> {
    let in_pts = state.pop_checked(Operation::Keccak, &step.inputs)?;
    let offset = to_offset(in_pts[0].value())?;
    let length = to_offset(in_pts[1].value())?;
    let actual = step
        .output
        .ok_or(SynthesisError::MissingStepOutput(step.opcode))?;

    let chunks = state.read_memory_chunks(offset, length)?;
    let out_pt = state.load_and_store_keccak(&chunks, actual, length)?;
    state.push_checked(Operation::Keccak, out_pt, step)
}

pub(crate) fn generate_env(
    kind: EnvKind,
    state: &mut Synthesizer,
    step: &InterpreterStep,
) -> SynthesisResult<()> {
    let value = step
        .output
        .ok_or(SynthesisError::MissingStepOutput(step.opcode))?;
    let out_pt = state.load_env(kind, value)?;
    state.push_checked(Operation::Environment(kind), out_pt, step)
}

pub(crate) fn generate_block(
    variable: ReservedVariable,
    state: &mut Synthesizer,
    step: &InterpreterStep,
) -> SynthesisResult<()> {
    let out_pt = state.load_block(variable)?;
    state.push_checked(Operation::Block(variable), out_pt, step)
}

pub(crate) fn generate_block_hash(
    state: &mut Synthesizer,
    step: &InterpreterStep,
) -> SynthesisResult<()> {
    let in_pts = state.pop_checked(Operation::BlockHash, &step.inputs)?;
    let out_pt = state.load_block_hash(in_pts[0].value())?;
    state.push_checked(Operation::BlockHash, out_pt, step)
}

/// Reads 32 bytes of call data. Bytes past its end read as zero.
pub(crate) fn generate_calldataload(
    state: &mut Synthesizer,
    step: &InterpreterStep,
) -> SynthesisResult<()> {
    let in_pts = state.pop_checked(Operation::CallDataLoad, &step.inputs)?;
    let calldata_size = state.current_transaction()?.calldata_size();

    let offset = in_pts[0].value();
    let out_pt = if offset >= U256::from(calldata_size) {
        state.load_zero()?
    } else {
        let alias = state.calldata.get_data_alias(offset.low_u64() as usize, 32);
        if alias.is_empty() {
            state.load_zero()?
        } else {
            state.place_memory_to_stack(&alias)?
        }
    };
    state.push_checked(Operation::CallDataLoad, out_pt, step)
}

pub(crate) fn generate_calldatacopy(
    state: &mut Synthesizer,
    step: &InterpreterStep,
) -> SynthesisResult<()> {
    let in_pts = state.pop_checked(Operation::CallDataCopy, &step.inputs)?;
    let dst = to_offset(in_pts[0].value())?;
    let length = to_offset(in_pts[2].value())?;
    let calldata_size = state.current_transaction()?.calldata_size();
    // Sources past the end of the call data copy zeros.
    let src = to_offset(in_pts[1].value().min(U256::from(calldata_size)))?;

    if length != 0 {
        let source = state.calldata.read(src, length);
        let records = state.copy_memory_region(&source, src, length, dst)?;
        state.write_records(records);
    }
    state.check_memory_out(Operation::CallDataCopy, step, dst, length)
}

pub(crate) fn generate_mcopy(state: &mut Synthesizer, step: &InterpreterStep) -> SynthesisResult<()> {
    let in_pts = state.pop_checked(Operation::Mcopy, &step.inputs)?;
    let dst = to_offset(in_pts[0].value())?;
    let src = to_offset(in_pts[1].value())?;
    let length = to_offset(in_pts[2].value())?;

    if length != 0 {
        let source = state.memory.read(src, length);
        let records = state.copy_memory_region(&source, src, length, dst)?;
        state.write_records(records);
    }
    state.check_memory_out(Operation::Mcopy, step, dst, length)
}

pub(crate) fn generate_pop(
    operation: Operation,
    state: &mut Synthesizer,
    step: &InterpreterStep,
) -> SynthesisResult<()> {
    state.pop_checked(operation, &step.inputs)?;
    Ok(())
}

pub(crate) fn generate_mload(state: &mut Synthesizer, step: &InterpreterStep) -> SynthesisResult<()> {
    let in_pts = state.pop_checked(Operation::Mload, &step.inputs)?;
    let offset = to_offset(in_pts[0].value())?;

    let alias = state.memory.get_data_alias(offset, 32);
    let out_pt = if alias.is_empty() {
        state.load_zero()?
    } else {
        state.place_memory_to_stack(&alias)?
    };
    state.push_checked(Operation::Mload, out_pt, step)
}

pub(crate) fn generate_mstore(state: &mut Synthesizer, step: &InterpreterStep) -> SynthesisResult<()> {
    let in_pts = state.pop_checked(Operation::Mstore, &step.inputs)?;
    let offset = to_offset(in_pts[0].value())?;

    state.memory.write(offset, 32, in_pts[1].clone());
    state.check_memory_out(Operation::Mstore, step, offset, 32)
}

pub(crate) fn generate_mstore8(
    state: &mut Synthesizer,
    step: &InterpreterStep,
) -> SynthesisResult<()> {
    let in_pts = state.pop_checked(Operation::Mstore8, &step.inputs)?;
    let offset = to_offset(in_pts[0].value())?;

    let value_pt = if in_pts[1].byte_width() > 1 {
        state.place_mstore(&in_pts[1], 1)?
    } else {
        in_pts[1].clone()
    };
    state.memory.write(offset, 1, value_pt);
    state.check_memory_out(Operation::Mstore8, step, offset, 1)
}

pub(crate) fn generate_sload(state: &mut Synthesizer, step: &InterpreterStep) -> SynthesisResult<()> {
    let in_pts = state.pop_checked(Operation::Sload, &step.inputs)?;
    let value = step
        .output
        .ok_or(SynthesisError::MissingStepOutput(step.opcode))?;
    let out_pt = state.load_storage(step.code_address, in_pts[0].value(), value)?;
    state.push_checked(Operation::Sload, out_pt, step)
}

pub(crate) fn generate_sstore(state: &mut Synthesizer, step: &InterpreterStep) -> SynthesisResult<()> {
    let in_pts = state.pop_checked(Operation::Sstore, &step.inputs)?;
    state.store_storage(step.code_address, in_pts[0].value(), &in_pts[1])
}

pub(crate) fn generate_push(
    n: u8,
    state: &mut Synthesizer,
    step: &InterpreterStep,
) -> SynthesisResult<()> {
    let value = step
        .output
        .ok_or(SynthesisError::MissingStepOutput(step.opcode))?;
    let out_pt = state.load_push(step.code_address, step.pc, value, n as usize)?;
    state.push_checked(Operation::Push(n), out_pt, step)
}

pub(crate) fn generate_dup(
    n: u8,
    state: &mut Synthesizer,
    step: &InterpreterStep,
) -> SynthesisResult<()> {
    state.stack.dup(n as usize)?;
    let top = state.stack.pop()?;
    state.push_checked(Operation::Dup(n), top, step)
}

pub(crate) fn generate_swap(n: u8, state: &mut Synthesizer) -> SynthesisResult<()> {
    state.stack.swap(n as usize)
}

pub(crate) fn generate_log(
    n: u8,
    state: &mut Synthesizer,
    step: &InterpreterStep,
) -> SynthesisResult<()> {
    let in_pts = state.pop_checked(Operation::Log(n), &step.inputs)?;
    let offset = to_offset(in_pts[0].value())?;
    let length = to_offset(in_pts[1].value())?;

    let data = state.read_memory_chunks(offset, length)?;
    state.store_log(&data, &in_pts[2..])
}

/// Records the returned window and checks it against the interpreter.
pub(crate) fn generate_return(
    operation: Operation,
    state: &mut Synthesizer,
    step: &InterpreterStep,
) -> SynthesisResult<()> {
    let in_pts = state.pop_checked(operation, &step.inputs)?;
    let offset = to_offset(in_pts[0].value())?;
    let length = to_offset(in_pts[1].value())?;

    state.return_records = state.memory.read(offset, length);
    state.check_memory_out(operation, step, offset, length)
}
