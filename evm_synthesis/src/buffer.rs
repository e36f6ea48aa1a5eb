//! Reserved buffer placements.
//!
//! A buffer is an array of identity gates. Input buffers turn external values
//! into circuit wires; output buffers expose circuit wires to the outside.
//! Fixed values are registered at session start in a deterministic order so
//! their wire positions are reproducible; everything else is appended while
//! executing.

use std::fmt;

use ethereum_types::{BigEndianHash, U256};
use log::{debug, info, trace};
use strum::{EnumCount, EnumIter, IntoEnumIterator};
use zk_synth_common::{
    address_to_u256, ADDRESS_MASK, JUBJUB_BASE_POINT, JUBJUB_IDENTITY_POINT,
};

use crate::errors::{SynthesisError, SynthesisResult};
use crate::inputs::{SynthesizerInputs, TRANSACTION_INPUT_COUNT};
use crate::ledger::PlacementLedger;
use crate::subcircuit::{FrontendConfig, SubcircuitName};
use crate::wire::{DataPt, DataPtDescription, Provenance, WireRef};

/// The reserved buffers, in ledger order.
#[derive(Clone, Copy, Debug, EnumCount, EnumIter, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ReservedBuffer {
    /// Values emitted to the verifier.
    PublicOut,
    /// Values supplied by the verifier.
    PublicIn,
    /// Block environment.
    BlockIn,
    /// Constants: ROM, code immediates, environment data and ALU selectors.
    StaticIn,
    /// Per-transaction witness: call data and signature.
    TransactionIn,
    /// Storage values read during the session.
    StorageIn,
    /// Storage values written during the session.
    StorageOut,
}

/// Index of the first non-buffer placement.
pub const FIRST_ARITHMETIC_PLACEMENT_INDEX: usize = ReservedBuffer::COUNT;

/// Number of wires each transaction occupies in [`ReservedBuffer::TransactionIn`].
pub const TRANSACTION_WIRE_STRIDE: usize = 15;

/// First wire of the block hash window in [`ReservedBuffer::BlockIn`].
const BLOCK_HASH_BASE_WIRE: usize = 8;

impl ReservedBuffer {
    /// Position of the buffer in the ledger.
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn subcircuit(self) -> SubcircuitName {
        match self {
            Self::PublicOut => SubcircuitName::BufferPubOut,
            Self::PublicIn => SubcircuitName::BufferPubIn,
            Self::BlockIn => SubcircuitName::BufferBlockIn,
            Self::StaticIn => SubcircuitName::BufferEvmIn,
            Self::TransactionIn => SubcircuitName::BufferPrvIn,
            Self::StorageIn => SubcircuitName::BufferStorageIn,
            Self::StorageOut => SubcircuitName::BufferStorageOut,
        }
    }

    pub const fn is_input(self) -> bool {
        !matches!(self, Self::PublicOut | Self::StorageOut)
    }
}

/// Well-known buffer slots.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ReservedVariable {
    IniMerkleRoot,
    EddsaPublicKeyX,
    EddsaPublicKeyY,
    Coinbase,
    Timestamp,
    Number,
    PrevRandao,
    GasLimit,
    ChainId,
    SelfBalance,
    BaseFee,
    /// Hash of the block `.0` blocks ago, starting at 1.
    BlockHash(usize),
    AddressMask,
    JubjubBaseX,
    JubjubBaseY,
    JubjubPoiX,
    JubjubPoiY,
    ContractAddress,
    FunctionSelector,
    TransactionNonce,
    /// The `.0`-th 32-byte call argument.
    TransactionInput(usize),
    EddsaSignature,
    EddsaRandomizerX,
    EddsaRandomizerY,
    ResultMerkleRoot,
    ContractStorageIn,
    ContractStorageOut,
}

/// Where a [`ReservedVariable`] lives.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct VariableSlot {
    pub buffer: ReservedBuffer,
    /// `None` for variables appended on demand.
    pub base_wire: Option<usize>,
    /// Per-transaction stride, multiplied by the nonce.
    pub stride: Option<usize>,
    pub bit_width: usize,
}

impl VariableSlot {
    const fn fixed(buffer: ReservedBuffer, base_wire: usize, bit_width: usize) -> Self {
        Self {
            buffer,
            base_wire: Some(base_wire),
            stride: None,
            bit_width,
        }
    }

    const fn per_transaction(base_wire: usize, bit_width: usize) -> Self {
        Self {
            buffer: ReservedBuffer::TransactionIn,
            base_wire: Some(base_wire),
            stride: Some(TRANSACTION_WIRE_STRIDE),
            bit_width,
        }
    }

    const fn dynamic(buffer: ReservedBuffer, bit_width: usize) -> Self {
        Self {
            buffer,
            base_wire: None,
            stride: None,
            bit_width,
        }
    }
}

impl ReservedVariable {
    pub const fn slot(self) -> VariableSlot {
        use ReservedBuffer::*;

        match self {
            Self::IniMerkleRoot => VariableSlot::fixed(PublicIn, 0, 255),
            Self::EddsaPublicKeyX => VariableSlot::fixed(PublicIn, 1, 255),
            Self::EddsaPublicKeyY => VariableSlot::fixed(PublicIn, 2, 255),
            Self::Coinbase => VariableSlot::fixed(BlockIn, 0, 160),
            Self::Timestamp => VariableSlot::fixed(BlockIn, 1, 256),
            Self::Number => VariableSlot::fixed(BlockIn, 2, 256),
            Self::PrevRandao => VariableSlot::fixed(BlockIn, 3, 256),
            Self::GasLimit => VariableSlot::fixed(BlockIn, 4, 256),
            Self::ChainId => VariableSlot::fixed(BlockIn, 5, 256),
            Self::SelfBalance => VariableSlot::fixed(BlockIn, 6, 256),
            Self::BaseFee => VariableSlot::fixed(BlockIn, 7, 256),
            Self::BlockHash(i) => {
                VariableSlot::fixed(BlockIn, BLOCK_HASH_BASE_WIRE.saturating_add(i.saturating_sub(1)), 256)
            }
            Self::AddressMask => VariableSlot::fixed(StaticIn, 0, 160),
            Self::JubjubBaseX => VariableSlot::fixed(StaticIn, 1, 255),
            Self::JubjubBaseY => VariableSlot::fixed(StaticIn, 2, 255),
            Self::JubjubPoiX => VariableSlot::fixed(StaticIn, 3, 255),
            Self::JubjubPoiY => VariableSlot::fixed(StaticIn, 4, 255),
            Self::ContractAddress => VariableSlot::per_transaction(0, 160),
            Self::FunctionSelector => VariableSlot::per_transaction(1, 32),
            Self::TransactionNonce => VariableSlot::per_transaction(2, 64),
            Self::TransactionInput(k) => VariableSlot::per_transaction(k.saturating_add(3), 256),
            Self::EddsaSignature => VariableSlot::per_transaction(12, 252),
            Self::EddsaRandomizerX => VariableSlot::per_transaction(13, 255),
            Self::EddsaRandomizerY => VariableSlot::per_transaction(14, 255),
            Self::ResultMerkleRoot => VariableSlot::dynamic(PublicOut, 255),
            Self::ContractStorageIn => VariableSlot::dynamic(StorageIn, 256),
            Self::ContractStorageOut => VariableSlot::dynamic(StorageOut, 256),
        }
    }

    /// Diagnostic description attached to the wire.
    pub fn provenance(self) -> Provenance {
        match self.slot().buffer.is_input() {
            true => Provenance::from_source(self.description()),
            false => Provenance::to_dest(self.description()),
        }
    }

    fn description(self) -> String {
        match self {
            Self::IniMerkleRoot => "Initial Merkle tree root hash".into(),
            Self::EddsaPublicKeyX => "EdDSA public key of caller (x coordinate)".into(),
            Self::EddsaPublicKeyY => "EdDSA public key of caller (y coordinate)".into(),
            Self::BlockHash(1) => "Block hash 1 block ago".into(),
            Self::BlockHash(i) => format!("Block hash {i} blocks ago"),
            Self::AddressMask => "Masker for Ethereum address (20 bytes)".into(),
            Self::JubjubBaseX => "Base point of Jubjub curve (x coordinate)".into(),
            Self::JubjubBaseY => "Base point of Jubjub curve (y coordinate)".into(),
            Self::JubjubPoiX => "Point at infinity of Jubjub curve (x coordinate)".into(),
            Self::JubjubPoiY => "Point at infinity of Jubjub curve (y coordinate)".into(),
            Self::ResultMerkleRoot => "Resulting Merkle tree root hash".into(),
            Self::ContractStorageIn => "Access to contract storage".into(),
            Self::ContractStorageOut => "Writing data on contract storage".into(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for ReservedVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::IniMerkleRoot => "INI_MERKLE_ROOT",
            Self::EddsaPublicKeyX => "EDDSA_PUBLIC_KEY_X",
            Self::EddsaPublicKeyY => "EDDSA_PUBLIC_KEY_Y",
            Self::Coinbase => "COINBASE",
            Self::Timestamp => "TIMESTAMP",
            Self::Number => "NUMBER",
            Self::PrevRandao => "PREVRANDAO",
            Self::GasLimit => "GASLIMIT",
            Self::ChainId => "CHAINID",
            Self::SelfBalance => "SELFBALANCE",
            Self::BaseFee => "BASEFEE",
            Self::BlockHash(i) => return write!(f, "BLOCKHASH_{i}"),
            Self::AddressMask => "ADDRESS_MASK",
            Self::JubjubBaseX => "JUBJUB_BASE_X",
            Self::JubjubBaseY => "JUBJUB_BASE_Y",
            Self::JubjubPoiX => "JUBJUB_POI_X",
            Self::JubjubPoiY => "JUBJUB_POI_Y",
            Self::ContractAddress => "CONTRACT_ADDRESS",
            Self::FunctionSelector => "FUNCTION_SELECTOR",
            Self::TransactionNonce => "TRANSACTION_NONCE",
            Self::TransactionInput(k) => return write!(f, "TRANSACTION_INPUT{k}"),
            Self::EddsaSignature => "EDDSA_SIGNATURE",
            Self::EddsaRandomizerX => "EDDSA_RANDOMIZER_X",
            Self::EddsaRandomizerY => "EDDSA_RANDOMIZER_Y",
            Self::ResultMerkleRoot => "RES_MERKLE_ROOT",
            Self::ContractStorageIn => "CONTRACT_STORAGE_IN",
            Self::ContractStorageOut => "CONTRACT_STORAGE_OUT",
        };
        f.write_str(name)
    }
}

impl PlacementLedger {
    /// Number of identity pairs currently held by `buffer`.
    pub fn buffer_len(&self, buffer: ReservedBuffer) -> usize {
        self.buffer(buffer).out_pts.len()
    }

    /// Appends an identity pair to an input buffer and returns the wire the
    /// circuit consumes.
    ///
    /// `in_pt` is either an unbound literal, which gets bound to the next
    /// position of the buffer, or already bound to exactly that position.
    pub fn add_wire_to_in_buffer(
        &mut self,
        in_pt: &DataPt,
        buffer: ReservedBuffer,
    ) -> SynthesisResult<DataPt> {
        if !buffer.is_input() {
            return Err(SynthesisError::InvalidBufferUse {
                buffer,
                expected: "input",
            });
        }
        let position = self.check_buffer_room(buffer)?;
        let index = buffer.index();
        let in_pt = match in_pt.wire() {
            WireRef::Unbound => in_pt.derive_output(index, position),
            wire if wire == WireRef::Produced(index, position) => in_pt.clone(),
            wire => {
                return Err(SynthesisError::BufferSourceMismatch {
                    buffer,
                    position,
                    wire,
                })
            }
        };
        let out_pt = in_pt.derive_output(index, position);

        debug!(
            "{buffer:?}[{position}] <- {:#x} ({} bits)",
            out_pt.value(),
            out_pt.bit_width()
        );
        let placement = self.buffer_mut(buffer);
        placement.in_pts.push(in_pt);
        placement.out_pts.push(out_pt.clone());
        Ok(out_pt)
    }

    /// Appends an identity pair to an output buffer.
    ///
    /// `out_pt` must carry the same value as `in_pt` and be positioned at the
    /// buffer's current length.
    pub fn add_wire_to_out_buffer(
        &mut self,
        in_pt: &DataPt,
        out_pt: &DataPt,
        buffer: ReservedBuffer,
    ) -> SynthesisResult<()> {
        if buffer.is_input() {
            return Err(SynthesisError::InvalidBufferUse {
                buffer,
                expected: "output",
            });
        }
        let position = self.check_buffer_room(buffer)?;
        if in_pt.value() != out_pt.value() {
            return Err(SynthesisError::BufferValueMismatch {
                input: in_pt.value(),
                output: out_pt.value(),
            });
        }
        match out_pt.wire() {
            WireRef::Produced(source, wire_index)
                if source == buffer.index() && wire_index == position => {}
            WireRef::Produced(_, wire_index) => {
                return Err(SynthesisError::BufferIndexMismatch {
                    expected: position,
                    actual: wire_index,
                })
            }
            wire => {
                return Err(SynthesisError::BufferSourceMismatch {
                    buffer,
                    position,
                    wire,
                })
            }
        }
        if !in_pt.wire().is_produced() {
            return Err(SynthesisError::UnboundInput {
                placement: buffer.index(),
                name: buffer.subcircuit(),
                input_index: position,
            });
        }

        debug!("{buffer:?}[{position}] -> {:#x}", out_pt.value());
        let placement = self.buffer_mut(buffer);
        placement.in_pts.push(in_pt.clone());
        placement.out_pts.push(out_pt.clone());
        Ok(())
    }

    /// Forwards `in_pt` to the next position of an output buffer and returns
    /// the external-side wire.
    pub fn emit_to_out_buffer(
        &mut self,
        in_pt: &DataPt,
        buffer: ReservedBuffer,
        provenance: Provenance,
    ) -> SynthesisResult<DataPt> {
        let out_pt = in_pt
            .derive_output(buffer.index(), self.buffer_len(buffer))
            .with_provenance(provenance);
        self.add_wire_to_out_buffer(in_pt, &out_pt, buffer)?;
        Ok(out_pt)
    }

    /// Resolves a fixed reserved variable to its registered output wire.
    pub fn load_reserved_variable(
        &self,
        variable: ReservedVariable,
        tx_nonce: Option<u64>,
    ) -> SynthesisResult<DataPt> {
        let slot = variable.slot();
        let base_wire = slot
            .base_wire
            .ok_or_else(|| SynthesisError::DynamicReservedVariable(variable.to_string()))?;
        let invalid = |wire_index| SynthesisError::InvalidWireInformation {
            variable: variable.to_string(),
            buffer: slot.buffer.index(),
            wire_index,
        };
        match variable {
            ReservedVariable::BlockHash(0) => return Err(invalid(base_wire)),
            ReservedVariable::TransactionInput(k) if k >= TRANSACTION_INPUT_COUNT => {
                return Err(invalid(base_wire))
            }
            _ => {}
        }

        let wire_index = match slot.stride {
            Some(stride) => {
                let nonce = tx_nonce
                    .ok_or_else(|| SynthesisError::MissingTransactionNonce(variable.to_string()))?;
                usize::try_from(nonce)
                    .ok()
                    .and_then(|nonce| nonce.checked_mul(stride))
                    .and_then(|offset| offset.checked_add(base_wire))
                    .ok_or_else(|| invalid(base_wire))?
            }
            None => base_wire,
        };

        let out_pt = self
            .buffer(slot.buffer)
            .out_pts
            .get(wire_index)
            .ok_or(SynthesisError::MissingReservedWire {
                buffer: slot.buffer,
                wire_index,
            })?;
        if out_pt.wire() != WireRef::Produced(slot.buffer.index(), wire_index) {
            return Err(invalid(wire_index));
        }
        trace!("Loaded {variable} from {:?}[{wire_index}]", slot.buffer);
        Ok(out_pt.clone())
    }

    /// Registers every fixed reserved variable, in the order their wire
    /// indices require.
    pub(crate) fn init_buffers(
        &mut self,
        inputs: &SynthesizerInputs,
        config: &FrontendConfig,
    ) -> SynthesisResult<()> {
        inputs.validate()?;
        if self.next_index() != FIRST_ARITHMETIC_PLACEMENT_INDEX
            || ReservedBuffer::iter().any(|buffer| self.buffer_len(buffer) != 0)
        {
            return Err(SynthesisError::InconsistentLedger(
                "buffers must be initialized on an empty ledger".to_string(),
            ));
        }

        self.register(ReservedVariable::IniMerkleRoot, inputs.initial_merkle_root)?;
        self.register(ReservedVariable::EddsaPublicKeyX, inputs.eddsa_public_key[0])?;
        self.register(ReservedVariable::EddsaPublicKeyY, inputs.eddsa_public_key[1])?;

        self.register(ReservedVariable::AddressMask, ADDRESS_MASK)?;
        self.register(ReservedVariable::JubjubBaseX, JUBJUB_BASE_POINT.0)?;
        self.register(ReservedVariable::JubjubBaseY, JUBJUB_BASE_POINT.1)?;
        self.register(ReservedVariable::JubjubPoiX, JUBJUB_IDENTITY_POINT.0)?;
        self.register(ReservedVariable::JubjubPoiY, JUBJUB_IDENTITY_POINT.1)?;

        let block = &inputs.block;
        self.register(ReservedVariable::Coinbase, address_to_u256(&block.coinbase))?;
        self.register(ReservedVariable::Timestamp, block.timestamp)?;
        self.register(ReservedVariable::Number, block.number)?;
        self.register(ReservedVariable::PrevRandao, block.prev_randao)?;
        self.register(ReservedVariable::GasLimit, block.gas_limit)?;
        self.register(ReservedVariable::ChainId, block.chain_id)?;
        self.register(ReservedVariable::SelfBalance, block.self_balance)?;
        self.register(ReservedVariable::BaseFee, block.base_fee)?;
        for i in 1..=config.n_prev_block_hashes {
            // Missing ancestors read as zero, like BLOCKHASH out of range.
            let hash = block
                .block_hashes
                .get(i - 1)
                .map_or(U256::zero(), |h| h.into_uint());
            self.register(ReservedVariable::BlockHash(i), hash)?;
        }

        for tx in &inputs.transactions {
            self.register(ReservedVariable::ContractAddress, address_to_u256(&tx.contract_address))?;
            self.register(ReservedVariable::FunctionSelector, tx.function_selector.into())?;
            self.register(ReservedVariable::TransactionNonce, tx.nonce.into())?;
            for k in 0..TRANSACTION_INPUT_COUNT {
                let input = tx.inputs.get(k).copied().unwrap_or_default();
                self.register(ReservedVariable::TransactionInput(k), input)?;
            }
            self.register(ReservedVariable::EddsaSignature, tx.eddsa_signature)?;
            self.register(ReservedVariable::EddsaRandomizerX, tx.eddsa_randomizer[0])?;
            self.register(ReservedVariable::EddsaRandomizerY, tx.eddsa_randomizer[1])?;
        }

        self.check_reserved_layout(inputs.transactions.len(), config)?;
        info!(
            "Initialized buffers: {} block hashes, {} transactions",
            config.n_prev_block_hashes,
            inputs.transactions.len()
        );
        Ok(())
    }

    /// Appends `value` at the next position of the variable's buffer. The
    /// position must be the one the variable is reserved at.
    fn register(&mut self, variable: ReservedVariable, value: U256) -> SynthesisResult<DataPt> {
        let slot = variable.slot();
        let position = self.buffer_len(slot.buffer);
        if let Some(base_wire) = slot.base_wire {
            let expected = match slot.stride {
                Some(stride) => base_wire + (position / stride) * stride,
                None => base_wire,
            };
            if expected != position {
                return Err(SynthesisError::InvalidWireInformation {
                    variable: variable.to_string(),
                    buffer: slot.buffer.index(),
                    wire_index: position,
                });
            }
        }
        let literal = DataPt::create(
            DataPtDescription::unbound(slot.bit_width).with_provenance(variable.provenance()),
            value,
        )?;
        self.add_wire_to_in_buffer(&literal, slot.buffer)
    }

    fn check_reserved_layout(&self, n_transactions: usize, config: &FrontendConfig) -> SynthesisResult<()> {
        for buffer in ReservedBuffer::iter() {
            let placement = self.buffer(buffer);
            if placement.in_pts.len() != placement.out_pts.len() {
                return Err(SynthesisError::BufferLengthMismatch(buffer.index()));
            }
        }
        let expected = [
            (ReservedBuffer::PublicIn, 3),
            (ReservedBuffer::StaticIn, 5),
            (ReservedBuffer::BlockIn, BLOCK_HASH_BASE_WIRE + config.n_prev_block_hashes),
            (ReservedBuffer::TransactionIn, TRANSACTION_WIRE_STRIDE * n_transactions),
        ];
        for (buffer, len) in expected {
            if self.buffer_len(buffer) != len {
                return Err(SynthesisError::MissingReservedWire {
                    buffer,
                    wire_index: self.buffer_len(buffer).min(len),
                });
            }
        }
        Ok(())
    }

    /// Fails when `buffer` has no room left or its halves diverged.
    fn check_buffer_room(&self, buffer: ReservedBuffer) -> SynthesisResult<usize> {
        let placement = self.buffer(buffer);
        if placement.in_pts.len() != placement.out_pts.len() {
            return Err(SynthesisError::BufferLengthMismatch(buffer.index()));
        }
        let capacity = self.library().get(buffer.subcircuit())?.n_inputs();
        let position = placement.out_pts.len();
        if position >= capacity {
            return Err(SynthesisError::InconsistentLedger(format!(
                "{buffer:?} is full ({capacity} wires)"
            )));
        }
        Ok(position)
    }
}
