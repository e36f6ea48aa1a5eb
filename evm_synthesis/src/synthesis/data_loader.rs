//! Paths through which external values enter or leave the circuit.

use ethereum_types::{Address, BigEndianHash, U256};
use keccak_hash::keccak;
use log::{debug, trace};
use strum::Display;
use zk_synth_common::EMPTY_KECCAK_HASH;

use super::state::Synthesizer;
use crate::buffer::{ReservedBuffer, ReservedVariable};
use crate::errors::{SynthesisError, SynthesisResult};
use crate::wire::{DataPt, DataPtDescription, Provenance, MAX_BIT_WIDTH};

/// Environment values the interpreter reports as plain constants.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
#[strum(serialize_all = "UPPERCASE")]
pub enum EnvKind {
    Address,
    Origin,
    Caller,
    CallValue,
    CallDataSize,
    CodeSize,
    GasPrice,
    ReturnDataSize,
    Pc,
    MSize,
    Gas,
}

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StorageAccess {
    Read,
    Write,
}

/// The wire currently holding a storage slot, and how the slot was used.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StorageEntry {
    pub value_pt: DataPt,
    pub history: Vec<StorageAccess>,
}

impl StorageEntry {
    pub fn last_access(&self) -> Option<StorageAccess> {
        self.history.last().copied()
    }
}

impl Synthesizer {
    /// Loads a constant through the static input buffer.
    ///
    /// Undescribed constants are cached by value and width, so loading the
    /// same one twice returns the same wire.
    pub fn load_arbitrary_static(
        &mut self,
        value: U256,
        bit_width: usize,
        description: Option<&str>,
    ) -> SynthesisResult<DataPt> {
        match description {
            Some(description) => {
                self.load_static(value, bit_width, Provenance::from_source(description))
            }
            None => {
                if let Some(cached) = self.constant_cache.get(&(value, bit_width)) {
                    trace!("Constant {value:#x} ({bit_width} bits) is cached");
                    return Ok(cached.clone());
                }
                let out_pt =
                    self.load_static(value, bit_width, Provenance::from_source("Arbitrary constant"))?;
                self.constant_cache
                    .insert((value, bit_width), out_pt.clone());
                Ok(out_pt)
            }
        }
    }

    /// Shorthand for an undescribed full-width constant.
    pub(crate) fn load_constant(&mut self, value: U256) -> SynthesisResult<DataPt> {
        self.load_arbitrary_static(value, MAX_BIT_WIDTH, None)
    }

    fn load_static(
        &mut self,
        value: U256,
        bit_width: usize,
        provenance: Provenance,
    ) -> SynthesisResult<DataPt> {
        let literal = DataPt::create(
            DataPtDescription::unbound(bit_width).with_provenance(provenance),
            value,
        )?;
        self.ledger
            .add_wire_to_in_buffer(&literal, ReservedBuffer::StaticIn)
    }

    /// Loads the immediate of a PUSH instruction. Every occurrence gets its
    /// own wire, tagged with its position in the code.
    pub fn load_push(
        &mut self,
        code_address: Address,
        pc: usize,
        value: U256,
        size: usize,
    ) -> SynthesisResult<DataPt> {
        let provenance =
            Provenance::from_source(format!("PUSH{size} at PC {pc} of code address {code_address:?}"))
                .with_key(U256::from(pc))
                .with_kind("PUSH");
        self.load_static(value, (size * 8).clamp(1, MAX_BIT_WIDTH), provenance)
    }

    /// Loads an environment value, cached by kind and value.
    pub fn load_env(&mut self, kind: EnvKind, value: U256) -> SynthesisResult<DataPt> {
        if let Some(cached) = self.env_cache.get(&(kind, value)) {
            trace!("{kind} {value:#x} is cached");
            return Ok(cached.clone());
        }
        let provenance = Provenance::from_source(format!("Static input for {kind}"))
            .with_kind(kind.to_string());
        let out_pt = self.load_static(value, MAX_BIT_WIDTH, provenance)?;
        self.env_cache.insert((kind, value), out_pt.clone());
        Ok(out_pt)
    }

    /// Resolves a block environment value to its reserved wire.
    pub fn load_block(&self, variable: ReservedVariable) -> SynthesisResult<DataPt> {
        if variable.slot().buffer != ReservedBuffer::BlockIn {
            return Err(SynthesisError::InvalidWireInformation {
                variable: variable.to_string(),
                buffer: ReservedBuffer::BlockIn.index(),
                wire_index: 0,
            });
        }
        if let ReservedVariable::BlockHash(index) = variable {
            let max = self.config.n_prev_block_hashes;
            if index == 0 || index > max {
                return Err(SynthesisError::BlockHashOutOfRange { index, max });
            }
        }
        self.ledger.load_reserved_variable(variable, None)
    }

    /// Resolves BLOCKHASH for block `requested`. Blocks outside the window
    /// of known ancestors read as zero.
    pub fn load_block_hash(&mut self, requested: U256) -> SynthesisResult<DataPt> {
        let number = self.load_block(ReservedVariable::Number)?.value();
        let distance = match number.checked_sub(requested) {
            Some(d) if !d.is_zero() && d <= U256::from(self.config.n_prev_block_hashes) => {
                d.low_u64() as usize
            }
            _ => return self.load_arbitrary_static(U256::zero(), 1, None),
        };
        self.load_block(ReservedVariable::BlockHash(distance))
    }

    /// Returns the wire holding `slot` of `address`. A cold access registers
    /// the value in the storage input buffer.
    pub fn load_storage(
        &mut self,
        address: Address,
        slot: U256,
        value: U256,
    ) -> SynthesisResult<DataPt> {
        if let Some(entry) = self.storage.get_mut(&(address, slot)) {
            trace!("Warm storage access at {address:?}[{slot:#x}]");
            entry.history.push(StorageAccess::Read);
            return Ok(entry.value_pt.clone());
        }

        let variable = ReservedVariable::ContractStorageIn;
        let literal = DataPt::create(
            DataPtDescription::unbound(variable.slot().bit_width)
                .with_provenance(variable.provenance().with_key(slot)),
            value,
        )?;
        let value_pt = self
            .ledger
            .add_wire_to_in_buffer(&literal, ReservedBuffer::StorageIn)?;
        debug!("Cold storage access at {address:?}[{slot:#x}] = {value:#x}");
        self.storage.insert(
            (address, slot),
            StorageEntry {
                value_pt: value_pt.clone(),
                history: vec![StorageAccess::Read],
            },
        );
        Ok(value_pt)
    }

    /// Writes `value_pt` to `slot` of `address` and exposes it through the
    /// storage output buffer.
    ///
    /// Slots of the contract under execution must have been read first.
    pub fn store_storage(
        &mut self,
        address: Address,
        slot: U256,
        value_pt: &DataPt,
    ) -> SynthesisResult<()> {
        let is_user_slot = self.current_transaction()?.contract_address == address;
        if is_user_slot && !self.storage.contains_key(&(address, slot)) {
            return Err(SynthesisError::ColdUserStorageWrite(slot));
        }

        let provenance = ReservedVariable::ContractStorageOut
            .provenance()
            .with_key(slot);
        self.ledger
            .emit_to_out_buffer(value_pt, ReservedBuffer::StorageOut, provenance)?;

        let entry = self
            .storage
            .entry((address, slot))
            .or_insert_with(|| StorageEntry {
                value_pt: value_pt.clone(),
                history: vec![],
            });
        entry.value_pt = value_pt.clone();
        entry.history.push(StorageAccess::Write);
        Ok(())
    }

    /// Checks a KECCAK256 computed by the interpreter and routes it through
    /// the public buffers: the input chunks go out, the digest comes back in.
    ///
    /// `in_pts` hold the input in 32-byte chunks, the last one right-aligned
    /// when `length` is not a multiple of 32.
    pub fn load_and_store_keccak(
        &mut self,
        in_pts: &[DataPt],
        out_value: U256,
        length: usize,
    ) -> SynthesisResult<DataPt> {
        if in_pts.len() != length.div_ceil(32) {
            return Err(SynthesisError::InconsistentLedger(format!(
                "{} chunks cannot hold {length} keccak input bytes",
                in_pts.len()
            )));
        }

        let mut bytes = Vec::with_capacity(length);
        for (i, pt) in in_pts.iter().enumerate() {
            let chunk_len = (length - 32 * i).min(32);
            let mut word = [0u8; 32];
            pt.value().to_big_endian(&mut word);
            bytes.extend_from_slice(&word[32 - chunk_len..]);
        }
        let digest = if bytes.is_empty() {
            EMPTY_KECCAK_HASH
        } else {
            keccak(&bytes)
        };
        let computed = digest.into_uint();
        if computed != out_value {
            return Err(SynthesisError::KeccakMismatch {
                computed,
                actual: out_value,
            });
        }

        for pt in in_pts {
            self.ledger.emit_to_out_buffer(
                pt,
                ReservedBuffer::PublicOut,
                Provenance::to_dest("Keccak input").with_kind("KeccakIn"),
            )?;
        }
        let literal = DataPt::create(
            DataPtDescription::unbound(MAX_BIT_WIDTH)
                .with_provenance(Provenance::from_source("Keccak output").with_kind("KeccakOut")),
            out_value,
        )?;
        debug!("Keccak over {length} bytes: {out_value:#x}");
        self.ledger
            .add_wire_to_in_buffer(&literal, ReservedBuffer::PublicIn)
    }

    /// Exposes the data and topics of a LOG instruction.
    pub fn store_log(&mut self, value_pts: &[DataPt], topics: &[DataPt]) -> SynthesisResult<()> {
        for pt in value_pts {
            self.ledger.emit_to_out_buffer(
                pt,
                ReservedBuffer::PublicOut,
                Provenance::to_dest("Log data").with_kind("LOG"),
            )?;
        }
        for (i, pt) in topics.iter().enumerate() {
            self.ledger.emit_to_out_buffer(
                pt,
                ReservedBuffer::PublicOut,
                Provenance::to_dest(format!("Log topic {i}")).with_kind("LOG"),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ethereum_types::H256;

    use super::*;
    use crate::inputs::SynthesizerOpts;
    use crate::subcircuit::FrontendConfig;
    use crate::testing_utils::{common_setup, test_inputs, test_library};
    use crate::wire::WireRef;

    fn session() -> Synthesizer {
        common_setup();
        let mut synthesizer = Synthesizer::new(
            test_library(),
            FrontendConfig::default(),
            test_inputs(),
            SynthesizerOpts::default(),
        )
        .unwrap();
        synthesizer.begin_transaction(0).unwrap();
        synthesizer
    }

    fn static_len(synthesizer: &Synthesizer) -> usize {
        synthesizer.ledger().buffer_len(ReservedBuffer::StaticIn)
    }

    #[test]
    fn constants_are_cached_by_value_and_width() {
        let mut synthesizer = session();
        let before = static_len(&synthesizer);

        let a = synthesizer
            .load_arbitrary_static(U256::from(0xff), 256, None)
            .unwrap();
        let b = synthesizer
            .load_arbitrary_static(U256::from(0xff), 256, None)
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(static_len(&synthesizer), before + 1);

        synthesizer
            .load_arbitrary_static(U256::from(0xff), 8, None)
            .unwrap();
        synthesizer
            .load_arbitrary_static(U256::from(0xff), 256, Some("described"))
            .unwrap();
        assert_eq!(static_len(&synthesizer), before + 3);
    }

    #[test]
    fn push_immediates_are_never_shared() {
        let mut synthesizer = session();
        let code = Address::repeat_byte(0xc0);
        let a = synthesizer.load_push(code, 0, U256::from(0x60), 1).unwrap();
        let b = synthesizer.load_push(code, 2, U256::from(0x60), 1).unwrap();
        assert_ne!(a.wire(), b.wire());
        assert_eq!(a.bit_width(), 8);
        assert_eq!(b.provenance().key, Some(U256::from(2)));

        let zero = synthesizer.load_push(code, 4, U256::zero(), 0).unwrap();
        assert_eq!(zero.bit_width(), 1);
    }

    #[test]
    fn env_values_are_cached_per_kind() {
        let mut synthesizer = session();
        let a = synthesizer.load_env(EnvKind::CallValue, U256::zero()).unwrap();
        let b = synthesizer.load_env(EnvKind::CallValue, U256::zero()).unwrap();
        let c = synthesizer.load_env(EnvKind::Gas, U256::zero()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.wire(), c.wire());
        assert_eq!(EnvKind::CallDataSize.to_string(), "CALLDATASIZE");
    }

    #[test]
    fn block_hashes_resolve_within_the_window() {
        let mut synthesizer = session();
        let number = test_inputs().block.number;

        let parent = synthesizer.load_block_hash(number - 1).unwrap();
        assert_eq!(parent.value(), H256::repeat_byte(1).into_uint());
        assert_eq!(parent.wire(), WireRef::Produced(ReservedBuffer::BlockIn.index(), 8));

        for requested in [number, number + 1, number - 5] {
            let hash = synthesizer.load_block_hash(requested).unwrap();
            assert_eq!(hash.value(), U256::zero());
        }
        assert!(synthesizer.load_block(ReservedVariable::ChainId).is_ok());
        assert!(synthesizer.load_block(ReservedVariable::AddressMask).is_err());
        assert_eq!(
            synthesizer.load_block(ReservedVariable::BlockHash(5)),
            Err(SynthesisError::BlockHashOutOfRange { index: 5, max: 4 })
        );
    }

    #[test]
    fn storage_accesses_are_cached_with_history() {
        let mut synthesizer = session();
        let contract = test_inputs().transactions[0].contract_address;
        let slot = U256::from(3);

        let cold = synthesizer
            .load_storage(contract, slot, U256::from(42))
            .unwrap();
        assert_eq!(cold.wire(), WireRef::Produced(ReservedBuffer::StorageIn.index(), 0));
        let warm = synthesizer
            .load_storage(contract, slot, U256::from(42))
            .unwrap();
        assert_eq!(cold, warm);
        assert_eq!(synthesizer.ledger().buffer_len(ReservedBuffer::StorageIn), 1);

        let new_value = synthesizer.load_constant(U256::from(43)).unwrap();
        synthesizer
            .store_storage(contract, slot, &new_value)
            .unwrap();
        let entry = synthesizer.storage_entry(contract, slot).unwrap();
        assert_eq!(entry.value_pt, new_value);
        assert_eq!(
            entry.history,
            vec![StorageAccess::Read, StorageAccess::Read, StorageAccess::Write]
        );
        assert_eq!(entry.last_access(), Some(StorageAccess::Write));
        assert_eq!(synthesizer.ledger().buffer_len(ReservedBuffer::StorageOut), 1);

        let reread = synthesizer
            .load_storage(contract, slot, U256::from(43))
            .unwrap();
        assert_eq!(reread, new_value);
    }

    #[test]
    fn cold_writes_to_the_own_contract_are_rejected() {
        let mut synthesizer = session();
        let contract = test_inputs().transactions[0].contract_address;
        let value = synthesizer.load_constant(U256::one()).unwrap();

        assert_eq!(
            synthesizer.store_storage(contract, U256::from(9), &value),
            Err(SynthesisError::ColdUserStorageWrite(U256::from(9)))
        );

        let other = Address::repeat_byte(0xee);
        synthesizer
            .store_storage(other, U256::from(9), &value)
            .unwrap();
        assert_eq!(
            synthesizer
                .storage_entry(other, U256::from(9))
                .unwrap()
                .history,
            vec![StorageAccess::Write]
        );
    }

    #[test]
    fn keccak_is_checked_and_routed_through_public_buffers() {
        let mut synthesizer = session();
        let chunk = synthesizer
            .load_arbitrary_static(U256::from(0x0102_0304u64), 256, None)
            .unwrap();
        let expected = keccak([1u8, 2, 3, 4]).into_uint();
        let public_in = synthesizer.ledger().buffer_len(ReservedBuffer::PublicIn);

        let out = synthesizer
            .load_and_store_keccak(&[chunk.clone()], expected, 4)
            .unwrap();
        assert_eq!(out.value(), expected);
        assert_eq!(out.wire(), WireRef::Produced(ReservedBuffer::PublicIn.index(), public_in));
        assert_eq!(out.provenance().kind.as_deref(), Some("KeccakOut"));
        assert_eq!(synthesizer.ledger().buffer_len(ReservedBuffer::PublicOut), 1);

        assert!(matches!(
            synthesizer.load_and_store_keccak(&[chunk], expected, 5),
            Err(SynthesisError::KeccakMismatch { .. })
        ));
    }

    #[test]
    fn empty_keccak_forwards_nothing() {
        let mut synthesizer = session();
        let out = synthesizer
            .load_and_store_keccak(&[], EMPTY_KECCAK_HASH.into_uint(), 0)
            .unwrap();
        assert_eq!(out.value(), EMPTY_KECCAK_HASH.into_uint());
        assert_eq!(synthesizer.ledger().buffer_len(ReservedBuffer::PublicOut), 0);
    }

    #[test]
    fn logs_go_to_the_public_output() {
        let mut synthesizer = session();
        let data = synthesizer.load_constant(U256::from(7)).unwrap();
        let topic = synthesizer.load_constant(U256::from(8)).unwrap();
        synthesizer.store_log(&[data], &[topic.clone(), topic]).unwrap();

        let placements = synthesizer.placements();
        let public_out = &placements[ReservedBuffer::PublicOut.index()];
        assert_eq!(public_out.out_pts.len(), 3);
        assert_eq!(
            public_out.out_pts[2].provenance().ext_dest.as_deref(),
            Some("Log topic 1")
        );
        synthesizer.ledger().check_consistency().unwrap();
    }
}
