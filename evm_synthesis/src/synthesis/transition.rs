use log::{trace, warn};

use super::data_loader::EnvKind;
use super::operation::*;
use super::state::{InterpreterStep, Synthesizer};
use crate::arithmetic::ArithmeticOperator;
use crate::buffer::ReservedVariable;
use crate::errors::{SynthesisError, SynthesisResult};

pub(crate) fn decode(opcode: u8) -> SynthesisResult<Operation> {
    match opcode {
        0x00 => Ok(Operation::Stop),
        0x01 => Ok(Operation::Arithmetic(ArithmeticOperator::Add)),
        0x02 => Ok(Operation::Arithmetic(ArithmeticOperator::Mul)),
        0x03 => Ok(Operation::Arithmetic(ArithmeticOperator::Sub)),
        0x04 => Ok(Operation::Arithmetic(ArithmeticOperator::Div)),
        0x05 => Ok(Operation::Arithmetic(ArithmeticOperator::SDiv)),
        0x06 => Ok(Operation::Arithmetic(ArithmeticOperator::Mod)),
        0x07 => Ok(Operation::Arithmetic(ArithmeticOperator::SMod)),
        0x08 => Ok(Operation::Arithmetic(ArithmeticOperator::AddMod)),
        0x09 => Ok(Operation::Arithmetic(ArithmeticOperator::MulMod)),
        0x0a => Ok(Operation::Arithmetic(ArithmeticOperator::Exp)),
        0x0b => Ok(Operation::Arithmetic(ArithmeticOperator::SignExtend)),
        0x10 => Ok(Operation::Arithmetic(ArithmeticOperator::Lt)),
        0x11 => Ok(Operation::Arithmetic(ArithmeticOperator::Gt)),
        0x12 => Ok(Operation::Arithmetic(ArithmeticOperator::SLt)),
        0x13 => Ok(Operation::Arithmetic(ArithmeticOperator::SGt)),
        0x14 => Ok(Operation::Arithmetic(ArithmeticOperator::Eq)),
        0x15 => Ok(Operation::Arithmetic(ArithmeticOperator::IsZero)),
        0x16 => Ok(Operation::Arithmetic(ArithmeticOperator::And)),
        0x17 => Ok(Operation::Arithmetic(ArithmeticOperator::Or)),
        0x18 => Ok(Operation::Arithmetic(ArithmeticOperator::Xor)),
        0x19 => Ok(Operation::Arithmetic(ArithmeticOperator::Not)),
        0x1a => Ok(Operation::Arithmetic(ArithmeticOperator::Byte)),
        0x1b => Ok(Operation::Arithmetic(ArithmeticOperator::Shl)),
        0x1c => Ok(Operation::Arithmetic(ArithmeticOperator::Shr)),
        0x1d => Ok(Operation::Arithmetic(ArithmeticOperator::Sar)),
        0x20 => Ok(Operation::Keccak),
        0x30 => Ok(Operation::Environment(EnvKind::Address)),
        0x32 => Ok(Operation::Environment(EnvKind::Origin)),
        0x33 => Ok(Operation::Environment(EnvKind::Caller)),
        0x34 => Ok(Operation::Environment(EnvKind::CallValue)),
        0x35 => Ok(Operation::CallDataLoad),
        0x36 => Ok(Operation::Environment(EnvKind::CallDataSize)),
        0x37 => Ok(Operation::CallDataCopy),
        0x38 => Ok(Operation::Environment(EnvKind::CodeSize)),
        0x3a => Ok(Operation::Environment(EnvKind::GasPrice)),
        0x3d => Ok(Operation::Environment(EnvKind::ReturnDataSize)),
        0x40 => Ok(Operation::BlockHash),
        0x41 => Ok(Operation::Block(ReservedVariable::Coinbase)),
        0x42 => Ok(Operation::Block(ReservedVariable::Timestamp)),
        0x43 => Ok(Operation::Block(ReservedVariable::Number)),
        0x44 => Ok(Operation::Block(ReservedVariable::PrevRandao)),
        0x45 => Ok(Operation::Block(ReservedVariable::GasLimit)),
        0x46 => Ok(Operation::Block(ReservedVariable::ChainId)),
        0x47 => Ok(Operation::Block(ReservedVariable::SelfBalance)),
        0x48 => Ok(Operation::Block(ReservedVariable::BaseFee)),
        0x50 => Ok(Operation::Pop),
        0x51 => Ok(Operation::Mload),
        0x52 => Ok(Operation::Mstore),
        0x53 => Ok(Operation::Mstore8),
        0x54 => Ok(Operation::Sload),
        0x55 => Ok(Operation::Sstore),
        0x56 => Ok(Operation::Jump),
        0x57 => Ok(Operation::Jumpi),
        0x58 => Ok(Operation::Environment(EnvKind::Pc)),
        0x59 => Ok(Operation::Environment(EnvKind::MSize)),
        0x5a => Ok(Operation::Environment(EnvKind::Gas)),
        0x5b => Ok(Operation::Jumpdest),
        0x5e => Ok(Operation::Mcopy),
        0x5f..=0x7f => Ok(Operation::Push(opcode - 0x5f)),
        0x80..=0x8f => Ok(Operation::Dup(opcode - 0x7f)),
        0x90..=0x9f => Ok(Operation::Swap(opcode - 0x8f)),
        0xa0..=0xa4 => Ok(Operation::Log(opcode - 0xa0)),
        0xf3 => Ok(Operation::Return),
        0xfd => Ok(Operation::Revert),
        _ => {
            warn!("Unsupported opcode: {:#04x}", opcode);
            Err(SynthesisError::UnsupportedOpcode(opcode))
        }
    }
}

fn perform_op(
    state: &mut Synthesizer,
    op: Operation,
    step: &InterpreterStep,
) -> SynthesisResult<()> {
    match op {
        Operation::Arithmetic(operator) => generate_arithmetic(operator, state, step)?,
        Operation::Keccak => generate_keccak(state, step)?,
        Operation::Environment(kind) => generate_env(kind, state, step)?,
        Operation::Block(variable) => generate_block(variable, state, step)?,
        Operation::BlockHash => generate_block_hash(state, step)?,
        Operation::CallDataLoad => generate_calldataload(state, step)?,
        Operation::CallDataCopy => generate_calldatacopy(state, step)?,
        Operation::Pop | Operation::Jump | Operation::Jumpi => generate_pop(op, state, step)?,
        Operation::Mload => generate_mload(state, step)?,
        Operation::Mstore => generate_mstore(state, step)?,
        Operation::Mstore8 => generate_mstore8(state, step)?,
        Operation::Sload => generate_sload(state, step)?,
        Operation::Sstore => generate_sstore(state, step)?,
        Operation::Push(n) => generate_push(n, state, step)?,
        Operation::Dup(n) => generate_dup(n, state, step)?,
        Operation::Swap(n) => generate_swap(n, state)?,
        Operation::Mcopy => generate_mcopy(state, step)?,
        Operation::Log(n) => generate_log(n, state, step)?,
        Operation::Return | Operation::Revert => generate_return(op, state, step)?,
        Operation::Jumpdest | Operation::Stop => {}
    };

    Ok(())
}

impl Synthesizer {
    /// Mirrors one executed opcode on the symbolic stack and memory, placing
    /// whatever subcircuits it needs.
    ///
    /// The values in `step` are what the interpreter observed; every wire the
    /// step consumes or produces is checked against them.
    pub fn synthesize_step(&mut self, step: &InterpreterStep) -> SynthesisResult<()> {
        self.current_transaction()?;
        let op = decode(step.opcode)?;

        if step.inputs.len() != op.n_inputs() {
            return Err(SynthesisError::StepOperandCount {
                opcode: step.opcode,
                expected: op.n_inputs(),
                actual: step.inputs.len(),
            });
        }
        if op.pushes() && step.output.is_none() {
            return Err(SynthesisError::MissingStepOutput(step.opcode));
        }

        trace!("pc {}: {op}", step.pc);
        perform_op(self, op, step)
    }

    /// Runs [`Self::synthesize_step`] over a whole trace.
    pub fn synthesize_steps<'a>(
        &mut self,
        steps: impl IntoIterator<Item = &'a InterpreterStep>,
    ) -> SynthesisResult<()> {
        steps
            .into_iter()
            .try_for_each(|step| self.synthesize_step(step))
    }
}
