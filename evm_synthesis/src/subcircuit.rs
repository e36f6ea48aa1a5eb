//! Read-only configuration produced by the subcircuit compiler.
//!
//! Two documents are consumed: the subcircuit table (`subcircuitInfo.json`)
//! and the frontend parameters (`frontendCfg.json`). Both are deserialized
//! strictly and validated once, so the rest of the crate can index them
//! without re-checking shapes.

use std::collections::HashMap;
use std::io::Read;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::errors::{SynthesisError, SynthesisResult};

/// Every subcircuit the compiler may emit.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    Eq,
    Hash,
    IntoStaticStr,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
#[serde(try_from = "String", into = "&'static str")]
pub enum SubcircuitName {
    #[strum(serialize = "bufferPubOut")]
    BufferPubOut,
    #[strum(serialize = "bufferPubIn")]
    BufferPubIn,
    #[strum(serialize = "bufferBlockIn")]
    BufferBlockIn,
    #[strum(serialize = "bufferEVMIn")]
    BufferEvmIn,
    #[strum(serialize = "bufferPrvIn")]
    BufferPrvIn,
    #[strum(serialize = "bufferStorageIn")]
    BufferStorageIn,
    #[strum(serialize = "bufferStorageOut")]
    BufferStorageOut,
    #[strum(serialize = "ALU1")]
    Alu1,
    #[strum(serialize = "ALU2")]
    Alu2,
    #[strum(serialize = "ALU3")]
    Alu3,
    #[strum(serialize = "ALU4")]
    Alu4,
    #[strum(serialize = "ALU5")]
    Alu5,
    #[strum(serialize = "AND")]
    And,
    #[strum(serialize = "OR")]
    Or,
    #[strum(serialize = "XOR")]
    Xor,
    DecToBit,
    #[strum(serialize = "SubEXP")]
    SubExp,
    SubExpBatch,
    Accumulator,
    Poseidon,
    Poseidon2xCompress,
    JubjubExpBatch,
    EdDsaVerify,
    VerifyMerkleProof,
    VerifyMerkleProof2x,
    VerifyMerkleProof3x,
}

impl TryFrom<String> for SubcircuitName {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl SubcircuitName {
    /// Subcircuits the synthesizer places and therefore needs in every
    /// library.
    pub const REQUIRED: [SubcircuitName; 18] = [
        Self::BufferPubOut,
        Self::BufferPubIn,
        Self::BufferBlockIn,
        Self::BufferEvmIn,
        Self::BufferPrvIn,
        Self::BufferStorageIn,
        Self::BufferStorageOut,
        Self::Alu1,
        Self::Alu2,
        Self::Alu3,
        Self::Alu4,
        Self::Alu5,
        Self::And,
        Self::Or,
        Self::Xor,
        Self::DecToBit,
        Self::SubExp,
        Self::Accumulator,
    ];

    pub const fn is_buffer(&self) -> bool {
        matches!(
            self,
            Self::BufferPubOut
                | Self::BufferPubIn
                | Self::BufferBlockIn
                | Self::BufferEvmIn
                | Self::BufferPrvIn
                | Self::BufferStorageIn
                | Self::BufferStorageOut
        )
    }
}

/// One entry of the subcircuit table, as emitted by the compiler.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SubcircuitInfo {
    pub id: usize,
    pub name: SubcircuitName,
    #[serde(rename = "Nwires")]
    pub n_wires: usize,
    #[serde(rename = "Nconsts", default, skip_serializing_if = "Option::is_none")]
    pub n_consts: Option<usize>,
    /// `[first wire, count]` of the outputs.
    #[serde(rename = "Out_idx")]
    pub out_idx: [usize; 2],
    /// `[first wire, count]` of the inputs.
    #[serde(rename = "In_idx")]
    pub in_idx: [usize; 2],
    #[serde(rename = "flattenMap", default, skip_serializing_if = "Vec::is_empty")]
    pub flatten_map: Vec<usize>,
}

impl SubcircuitInfo {
    pub const fn n_inputs(&self) -> usize {
        self.in_idx[1]
    }

    pub const fn n_outputs(&self) -> usize {
        self.out_idx[1]
    }

    fn validate(&self) -> SynthesisResult<()> {
        for (kind, [start, count]) in [("input", self.in_idx), ("output", self.out_idx)] {
            let end = start.checked_add(count);
            if end.map_or(true, |end| end > self.n_wires) {
                return Err(SynthesisError::InvalidLibrary(format!(
                    "{} {kind} range [{start}, {count}] exceeds its {} wires",
                    self.name, self.n_wires
                )));
            }
        }
        if self.name.is_buffer() && self.n_inputs() != self.n_outputs() {
            return Err(SynthesisError::InvalidLibrary(format!(
                "buffer {} has {} inputs and {} outputs",
                self.name,
                self.n_inputs(),
                self.n_outputs()
            )));
        }
        if !self.flatten_map.is_empty() && self.flatten_map.len() != self.n_wires {
            return Err(SynthesisError::InvalidLibrary(format!(
                "flatten map of {} covers {} of {} wires",
                self.name,
                self.flatten_map.len(),
                self.n_wires
            )));
        }
        Ok(())
    }
}

/// The validated subcircuit table, indexed by name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SubcircuitLibrary {
    by_name: HashMap<SubcircuitName, SubcircuitInfo>,
}

impl SubcircuitLibrary {
    pub fn new(infos: Vec<SubcircuitInfo>) -> SynthesisResult<Self> {
        let mut by_name = HashMap::with_capacity(infos.len());
        let mut ids = HashMap::with_capacity(infos.len());
        for info in infos {
            info.validate()?;
            if let Some(other) = ids.insert(info.id, info.name) {
                return Err(SynthesisError::InvalidLibrary(format!(
                    "id {} is shared by {other} and {}",
                    info.id, info.name
                )));
            }
            let name = info.name;
            if by_name.insert(name, info).is_some() {
                return Err(SynthesisError::InvalidLibrary(format!(
                    "{name} is declared twice"
                )));
            }
        }
        if let Some(missing) = SubcircuitName::REQUIRED
            .iter()
            .find(|name| !by_name.contains_key(name))
        {
            return Err(SynthesisError::InvalidLibrary(format!(
                "{missing} is missing"
            )));
        }

        Ok(Self { by_name })
    }

    pub fn from_json_str(json: &str) -> SynthesisResult<Self> {
        let de = &mut serde_json::Deserializer::from_str(json);
        let infos: Vec<SubcircuitInfo> = serde_path_to_error::deserialize(de)
            .map_err(|e| SynthesisError::InvalidLibrary(e.to_string()))?;
        Self::new(infos)
    }

    pub fn from_reader<R: Read>(reader: R) -> SynthesisResult<Self> {
        let de = &mut serde_json::Deserializer::from_reader(reader);
        let infos: Vec<SubcircuitInfo> = serde_path_to_error::deserialize(de)
            .map_err(|e| SynthesisError::InvalidLibrary(e.to_string()))?;
        Self::new(infos)
    }

    pub fn get(&self, name: SubcircuitName) -> SynthesisResult<&SubcircuitInfo> {
        self.by_name
            .get(&name)
            .ok_or(SynthesisError::UnknownSubcircuit(name))
    }

    /// Iterates over the entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = &SubcircuitInfo> {
        let mut infos: Vec<_> = self.by_name.values().collect();
        infos.sort_by_key(|info| info.id);
        infos.into_iter()
    }
}

/// Parameters the subcircuits were compiled with.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FrontendConfig {
    /// Fan-in of the Accumulator subcircuit.
    pub n_accumulation: usize,
    /// Number of past block hashes exposed through the block buffer.
    pub n_prev_block_hashes: usize,
    pub n_mt_depth: usize,
    pub n_poseidon_inputs: usize,
    pub n_jubjub_exp_batch: usize,
    pub n_sub_exp_batch: usize,
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            n_accumulation: 32,
            n_prev_block_hashes: 4,
            n_mt_depth: 3,
            n_poseidon_inputs: 4,
            n_jubjub_exp_batch: 4,
            n_sub_exp_batch: 4,
        }
    }
}

impl FrontendConfig {
    /// Upper bound on `n_prev_block_hashes`, the depth of the BLOCKHASH window.
    pub const MAX_PREV_BLOCK_HASHES: usize = 256;

    pub fn from_json_str(json: &str) -> SynthesisResult<Self> {
        let de = &mut serde_json::Deserializer::from_str(json);
        let cfg: Self = serde_path_to_error::deserialize(de)
            .map_err(|e| SynthesisError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> SynthesisResult<()> {
        if self.n_accumulation < 2 {
            return Err(SynthesisError::InvalidConfig(format!(
                "nAccumulation must be at least 2 (got {})",
                self.n_accumulation
            )));
        }
        if self.n_prev_block_hashes > Self::MAX_PREV_BLOCK_HASHES {
            return Err(SynthesisError::InvalidConfig(format!(
                "nPrevBlockHashes must not exceed {} (got {})",
                Self::MAX_PREV_BLOCK_HASHES,
                self.n_prev_block_hashes
            )));
        }
        Ok(())
    }

    /// Checks that the library can host what this configuration promises.
    pub(crate) fn check_against(&self, library: &SubcircuitLibrary) -> SynthesisResult<()> {
        let accumulator = library.get(SubcircuitName::Accumulator)?;
        if accumulator.n_inputs() < self.n_accumulation {
            return Err(SynthesisError::InvalidConfig(format!(
                "nAccumulation is {} but the Accumulator only has {} inputs",
                self.n_accumulation,
                accumulator.n_inputs()
            )));
        }
        Ok(())
    }
}
