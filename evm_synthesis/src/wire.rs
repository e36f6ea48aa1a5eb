//! Wire references carried by the symbolic stack and memory.
//!
//! A [`DataPt`] names one output of one placement, together with the concrete
//! value that output held during execution. The value is only used to check
//! the symbolic trace against the interpreter; the prover never sees it.

use enum_as_inner::EnumAsInner;
use ethereum_types::U256;
use zk_synth_common::{BLS12_381_SCALAR_MODULUS, JUBJUB_SCALAR_MODULUS};

use crate::errors::WireError;

/// Largest declared width of a wire.
pub const MAX_BIT_WIDTH: usize = 256;

/// Width of wires holding BLS12-381 scalars.
pub const BLS12_381_SCALAR_BITS: usize = 255;

/// Width of wires holding Jubjub scalars.
pub const JUBJUB_SCALAR_BITS: usize = 252;

/// Where a wire comes from.
#[derive(Clone, Copy, Debug, EnumAsInner, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum WireRef {
    /// Output `.1` of the placement at ledger index `.0`.
    Produced(usize, usize),
    /// An external literal that has not entered the circuit yet.
    Unbound,
}

impl WireRef {
    /// The producing placement, if any.
    pub const fn placement(&self) -> Option<usize> {
        match self {
            Self::Produced(placement, _) => Some(*placement),
            Self::Unbound => None,
        }
    }
}

/// Diagnostic tags attached to a wire. They never influence wiring.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Provenance {
    /// Human readable origin of an externally supplied value.
    pub ext_source: Option<String>,
    /// Human readable destination of a value leaving the circuit.
    pub ext_dest: Option<String>,
    /// Storage slot, code offset or similar key the value is bound to.
    pub key: Option<U256>,
    /// Free-form category, e.g. `"KeccakIn"`.
    pub kind: Option<String>,
}

impl Provenance {
    pub fn from_source(ext_source: impl Into<String>) -> Self {
        Self {
            ext_source: Some(ext_source.into()),
            ..Default::default()
        }
    }

    pub fn to_dest(ext_dest: impl Into<String>) -> Self {
        Self {
            ext_dest: Some(ext_dest.into()),
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: U256) -> Self {
        self.key = Some(key);
        self
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

/// Everything needed to mint a [`DataPt`] except its value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DataPtDescription {
    pub wire: WireRef,
    pub bit_width: usize,
    pub provenance: Provenance,
}

impl DataPtDescription {
    pub const fn new(wire: WireRef, bit_width: usize) -> Self {
        Self {
            wire,
            bit_width,
            provenance: Provenance {
                ext_source: None,
                ext_dest: None,
                key: None,
                kind: None,
            },
        }
    }

    /// Describes an external value that still has to go through a buffer.
    pub const fn unbound(bit_width: usize) -> Self {
        Self::new(WireRef::Unbound, bit_width)
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }
}

/// A reference to a circuit wire, plus the value it carried.
///
/// Instances are immutable; every transformation returns a new `DataPt`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DataPt {
    wire: WireRef,
    bit_width: usize,
    value: U256,
    provenance: Provenance,
}

impl DataPt {
    /// Validates `value` against the width in `description`.
    ///
    /// Values are unsigned by construction, so the only checks left are the
    /// width itself and the field moduli of 255-bit and 252-bit wires.
    pub fn create(description: DataPtDescription, value: U256) -> Result<Self, WireError> {
        check_value(value, description.bit_width)?;
        Ok(Self {
            wire: description.wire,
            bit_width: description.bit_width,
            value,
            provenance: description.provenance,
        })
    }

    /// Shorthand for an [`Unbound`](WireRef::Unbound) literal.
    pub fn literal(value: U256, bit_width: usize) -> Result<Self, WireError> {
        Self::create(DataPtDescription::unbound(bit_width), value)
    }

    /// The output-side twin of `self`: same width and value, produced by
    /// output `wire_index` of `placement`.
    pub fn derive_output(&self, placement: usize, wire_index: usize) -> Self {
        Self {
            wire: WireRef::Produced(placement, wire_index),
            bit_width: self.bit_width,
            value: self.value,
            provenance: self.provenance.clone(),
        }
    }

    /// Returns the same wire declared with another width.
    pub fn with_bit_width(&self, bit_width: usize) -> Result<Self, WireError> {
        check_value(self.value, bit_width)?;
        Ok(Self {
            bit_width,
            ..self.clone()
        })
    }

    pub fn with_provenance(&self, provenance: Provenance) -> Self {
        Self {
            provenance,
            ..self.clone()
        }
    }

    pub const fn wire(&self) -> WireRef {
        self.wire
    }

    pub const fn bit_width(&self) -> usize {
        self.bit_width
    }

    /// Number of bytes needed to hold `bit_width` bits.
    pub const fn byte_width(&self) -> usize {
        self.bit_width.div_ceil(8)
    }

    pub const fn value(&self) -> U256 {
        self.value
    }

    pub const fn provenance(&self) -> &Provenance {
        &self.provenance
    }
}

fn check_value(value: U256, bit_width: usize) -> Result<(), WireError> {
    if bit_width == 0 || bit_width > MAX_BIT_WIDTH {
        return Err(WireError::InvalidBitWidth(bit_width));
    }
    if value.bits() > bit_width {
        return Err(WireError::ValueTooWide { value, bit_width });
    }
    let modulus = match bit_width {
        BLS12_381_SCALAR_BITS => Some(BLS12_381_SCALAR_MODULUS),
        JUBJUB_SCALAR_BITS => Some(JUBJUB_SCALAR_MODULUS),
        _ => None,
    };
    match modulus {
        Some(modulus) if value >= modulus => Err(WireError::ValueNotReduced {
            value,
            bit_width,
            modulus,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_accepts_values_within_width() {
        let pt = DataPt::create(
            DataPtDescription::new(WireRef::Produced(3, 1), 8),
            U256::from(0xff),
        )
        .unwrap();

        assert_eq!(pt.wire(), WireRef::Produced(3, 1));
        assert_eq!(pt.bit_width(), 8);
        assert_eq!(pt.byte_width(), 1);
        assert_eq!(pt.value(), U256::from(0xff));
    }

    #[test]
    fn create_rejects_values_wider_than_declared() {
        let res = DataPt::literal(U256::from(0x100), 8);
        assert_eq!(
            res,
            Err(WireError::ValueTooWide {
                value: U256::from(0x100),
                bit_width: 8
            })
        );
        assert!(DataPt::literal(U256::MAX, 256).is_ok());
    }

    #[test]
    fn create_rejects_bad_widths() {
        assert_eq!(
            DataPt::literal(U256::zero(), 0),
            Err(WireError::InvalidBitWidth(0))
        );
        assert_eq!(
            DataPt::literal(U256::zero(), 257),
            Err(WireError::InvalidBitWidth(257))
        );
    }

    #[test]
    fn field_widths_are_checked_against_their_modulus() {
        let below = BLS12_381_SCALAR_MODULUS - 1;
        assert!(DataPt::literal(below, BLS12_381_SCALAR_BITS).is_ok());
        assert!(matches!(
            DataPt::literal(BLS12_381_SCALAR_MODULUS, BLS12_381_SCALAR_BITS),
            Err(WireError::ValueNotReduced { .. })
        ));

        assert!(DataPt::literal(JUBJUB_SCALAR_MODULUS - 1, JUBJUB_SCALAR_BITS).is_ok());
        assert!(matches!(
            DataPt::literal(JUBJUB_SCALAR_MODULUS, JUBJUB_SCALAR_BITS),
            Err(WireError::ValueNotReduced { .. })
        ));

        // Ordinary widths are only bounded by their bit count.
        assert!(DataPt::literal(BLS12_381_SCALAR_MODULUS, 256).is_ok());
    }

    #[test]
    fn derived_output_keeps_width_and_value() {
        let input = DataPt::create(
            DataPtDescription::unbound(160)
                .with_provenance(Provenance::from_source("caller").with_key(U256::one())),
            U256::from(42),
        )
        .unwrap();
        let out = input.derive_output(9, 4);

        assert_eq!(out.wire(), WireRef::Produced(9, 4));
        assert_eq!(out.bit_width(), 160);
        assert_eq!(out.value(), U256::from(42));
        assert_eq!(out.provenance(), input.provenance());
        assert!(input.wire().is_unbound());
        assert_eq!(out.wire().placement(), Some(9));
    }

    #[test]
    fn narrowing_revalidates() {
        let pt = DataPt::literal(U256::from(0x1234), 256).unwrap();
        assert_eq!(pt.with_bit_width(16).unwrap().bit_width(), 16);
        assert!(pt.with_bit_width(8).is_err());
    }
}
