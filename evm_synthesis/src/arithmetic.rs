//! Numeric semantics of the operators the dispatcher can place, and the
//! subcircuit each of them is compiled into.

use ethereum_types::{U256, U512};
use strum::{Display, EnumIter};
use zk_synth_common::low_bits_mask;

use crate::errors::{SynthesisError, SynthesisResult};
use crate::subcircuit::SubcircuitName;

/// Width of selector constants fed to the ALU subcircuits.
pub const SELECTOR_BIT_WIDTH: usize = 128;

/// Operators known to the dispatcher.
#[derive(Clone, Copy, Debug, Display, EnumIter, Eq, Hash, PartialEq)]
#[strum(serialize_all = "UPPERCASE")]
pub enum ArithmeticOperator {
    Add,
    Mul,
    Sub,
    Div,
    SDiv,
    Mod,
    SMod,
    AddMod,
    MulMod,
    Exp,
    Lt,
    Gt,
    SLt,
    SGt,
    Eq,
    IsZero,
    And,
    Or,
    Xor,
    Not,
    Byte,
    Shl,
    Shr,
    Sar,
    SignExtend,
    #[strum(serialize = "DecToBit")]
    DecToBit,
    #[strum(serialize = "SubEXP")]
    SubExp,
    #[strum(serialize = "Accumulator")]
    Accumulator,
}

impl ArithmeticOperator {
    /// Number of operands, or `None` for variadic operators.
    pub const fn arity(self) -> Option<usize> {
        use ArithmeticOperator::*;

        match self {
            IsZero | Not | DecToBit => Some(1),
            AddMod | MulMod | SubExp => Some(3),
            Accumulator => None,
            _ => Some(2),
        }
    }

    /// Number of values the operator produces.
    pub const fn n_outputs(self) -> usize {
        match self {
            Self::DecToBit => 256,
            Self::SubExp => 2,
            _ => 1,
        }
    }

    pub const fn output_bit_width(self) -> usize {
        match self {
            Self::DecToBit => 1,
            _ => 256,
        }
    }

    /// The subcircuit implementing the operator and the selector constant
    /// prepended to its inputs, if any.
    ///
    /// Returns `None` for EXP, which is decomposed into DecToBit and SubEXP
    /// placements.
    pub fn subcircuit_mapping(self) -> Option<(SubcircuitName, Option<U256>)> {
        use SubcircuitName::{Alu1, Alu2, Alu3, Alu4, Alu5};

        let selected = |name, bit: usize| Some((name, Some(U256::one() << bit)));
        match self {
            Self::Add => selected(Alu1, 1),
            Self::Mul => selected(Alu1, 2),
            Self::Sub => selected(Alu1, 3),
            Self::Eq => selected(Alu1, 20),
            Self::IsZero => selected(Alu1, 21),
            Self::Not => selected(Alu1, 25),
            Self::Div => selected(Alu2, 4),
            Self::SDiv => selected(Alu2, 5),
            Self::Mod => selected(Alu2, 6),
            Self::SMod => selected(Alu2, 7),
            Self::AddMod => selected(Alu2, 8),
            Self::MulMod => selected(Alu2, 9),
            Self::Shl => selected(Alu3, 27),
            Self::Shr => selected(Alu3, 28),
            Self::Sar => selected(Alu3, 29),
            Self::Lt => selected(Alu4, 16),
            Self::Gt => selected(Alu4, 17),
            Self::SLt => selected(Alu4, 18),
            Self::SGt => selected(Alu4, 19),
            Self::SignExtend => selected(Alu5, 11),
            Self::Byte => selected(Alu5, 26),
            Self::And => Some((SubcircuitName::And, None)),
            Self::Or => Some((SubcircuitName::Or, None)),
            Self::Xor => Some((SubcircuitName::Xor, None)),
            Self::DecToBit => Some((SubcircuitName::DecToBit, None)),
            Self::SubExp => Some((SubcircuitName::SubExp, None)),
            Self::Accumulator => Some((SubcircuitName::Accumulator, None)),
            Self::Exp => None,
        }
    }

    /// Whether the subcircuit only reads the low byte of the first operand.
    pub const fn has_byte_operand(self) -> bool {
        matches!(
            self,
            Self::Shl | Self::Shr | Self::Sar | Self::SignExtend | Self::Byte
        )
    }

    /// Evaluates the operator with VM semantics.
    pub fn execute(self, inputs: &[U256]) -> SynthesisResult<Vec<U256>> {
        use ArithmeticOperator::*;

        self.check_operand_count(inputs.len())?;
        let arg = |i: usize| inputs[i];
        let result = match self {
            Add => arg(0).overflowing_add(arg(1)).0,
            Mul => arg(0).overflowing_mul(arg(1)).0,
            Sub => arg(0).overflowing_sub(arg(1)).0,
            Div => arg(0).checked_div(arg(1)).unwrap_or_default(),
            Mod => arg(0).checked_rem(arg(1)).unwrap_or_default(),
            SDiv => signed_div(arg(0), arg(1)),
            SMod => signed_rem(arg(0), arg(1)),
            AddMod => mod_reduce(U512::from(arg(0)) + U512::from(arg(1)), arg(2)),
            MulMod => mod_reduce(arg(0).full_mul(arg(1)), arg(2)),
            Exp => arg(0).overflowing_pow(arg(1)).0,
            Lt => bool_word(arg(0) < arg(1)),
            Gt => bool_word(arg(0) > arg(1)),
            SLt => bool_word(signed_lt(arg(0), arg(1))),
            SGt => bool_word(signed_lt(arg(1), arg(0))),
            Eq => bool_word(arg(0) == arg(1)),
            IsZero => bool_word(arg(0).is_zero()),
            And => arg(0) & arg(1),
            Or => arg(0) | arg(1),
            Xor => arg(0) ^ arg(1),
            Not => !arg(0),
            Byte => byte(arg(0), arg(1)),
            Shl => shl(arg(1), arg(0)),
            Shr => shr(arg(1), arg(0)),
            Sar => sar(arg(1), arg(0)),
            SignExtend => sign_extend(arg(0), arg(1)),
            DecToBit => return Ok((0..256).rev().map(|i| bool_word(arg(0).bit(i))).collect()),
            SubExp => return sub_exp(arg(0), arg(1), arg(2)),
            Accumulator => accumulate(inputs)?,
        };
        Ok(vec![result])
    }

    fn check_operand_count(self, actual: usize) -> SynthesisResult<()> {
        let ok = match self.arity() {
            Some(expected) => actual == expected,
            None => actual > 0,
        };
        if !ok {
            return Err(SynthesisError::OperandCount {
                operator: self,
                expected: self.arity().unwrap_or(1),
                actual,
            });
        }
        Ok(())
    }
}

fn bool_word(b: bool) -> U256 {
    if b {
        U256::one()
    } else {
        U256::zero()
    }
}

fn is_negative(x: U256) -> bool {
    x.bit(255)
}

fn twos_complement(x: U256) -> U256 {
    (!x).overflowing_add(U256::one()).0
}

fn abs(x: U256) -> U256 {
    if is_negative(x) {
        twos_complement(x)
    } else {
        x
    }
}

fn signed_div(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let quotient = abs(a) / abs(b);
    if is_negative(a) != is_negative(b) {
        twos_complement(quotient)
    } else {
        quotient
    }
}

/// The remainder takes the sign of the dividend.
fn signed_rem(a: U256, b: U256) -> U256 {
    if b.is_zero() {
        return U256::zero();
    }
    let remainder = abs(a) % abs(b);
    if is_negative(a) {
        twos_complement(remainder)
    } else {
        remainder
    }
}

fn signed_lt(a: U256, b: U256) -> bool {
    match (is_negative(a), is_negative(b)) {
        (true, false) => true,
        (false, true) => false,
        _ => a < b,
    }
}

fn truncate(x: U512) -> U256 {
    U256([x.0[0], x.0[1], x.0[2], x.0[3]])
}

fn mod_reduce(x: U512, n: U256) -> U256 {
    if n.is_zero() {
        return U256::zero();
    }
    truncate(x % U512::from(n))
}

fn shift_amount(shift: U256) -> Option<usize> {
    (shift < U256::from(256)).then(|| shift.low_u64() as usize)
}

fn shl(value: U256, shift: U256) -> U256 {
    shift_amount(shift).map_or(U256::zero(), |s| value << s)
}

fn shr(value: U256, shift: U256) -> U256 {
    shift_amount(shift).map_or(U256::zero(), |s| value >> s)
}

fn sar(value: U256, shift: U256) -> U256 {
    match (shift_amount(shift), is_negative(value)) {
        (Some(s), true) => !((!value) >> s),
        (Some(s), false) => value >> s,
        (None, true) => U256::MAX,
        (None, false) => U256::zero(),
    }
}

/// Byte `index` of `value`, counting from the most significant one.
fn byte(index: U256, value: U256) -> U256 {
    if index >= U256::from(32) {
        return U256::zero();
    }
    let shift = (31 - index.low_u64() as usize) * 8;
    (value >> shift) & U256::from(0xff)
}

/// Extends the sign bit of byte `k`, counting from the least significant one.
fn sign_extend(k: U256, value: U256) -> U256 {
    if k >= U256::from(31) {
        return value;
    }
    let sign_bit = k.low_u64() as usize * 8 + 7;
    let mask = low_bits_mask(sign_bit + 1);
    if value.bit(sign_bit) {
        value | !mask
    } else {
        value & mask
    }
}

/// One square-and-multiply step: `[c * (b ? a : 1), a * a]`.
fn sub_exp(c: U256, a: U256, b: U256) -> SynthesisResult<Vec<U256>> {
    let factor = match b {
        b if b.is_zero() => U256::one(),
        b if b == U256::one() => a,
        b => return Err(SynthesisError::NonBinaryExponentBit(b)),
    };
    Ok(vec![
        c.overflowing_mul(factor).0,
        a.overflowing_mul(a).0,
    ])
}

fn accumulate(inputs: &[U256]) -> SynthesisResult<U256> {
    inputs.iter().try_fold(U256::zero(), |acc, x| {
        acc.checked_add(*x).ok_or_else(|| {
            SynthesisError::InconsistentLedger("Accumulator sum exceeds 256 bits".to_string())
        })
    })
}
