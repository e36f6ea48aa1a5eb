//! Symbolic byte-addressable memory.
//!
//! Memory is kept as a list of write records rather than bytes. A read over a
//! byte window is answered with the records that still contribute to it,
//! each paired with the shift and byte mask that isolate its contribution.
//! Contributions are disjoint, so adding them reconstructs the window.

use std::collections::BTreeMap;
use std::fmt;

use ethereum_types::U256;
use itertools::Itertools;
use log::trace;

use crate::wire::DataPt;

/// A write of `data_pt` over `size` bytes starting at `offset`. The value is
/// right-aligned in the window, big-endian.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MemoryRecord {
    pub offset: usize,
    pub size: usize,
    pub data_pt: DataPt,
}

impl MemoryRecord {
    pub fn new(offset: usize, size: usize, data_pt: DataPt) -> Self {
        Self {
            offset,
            size,
            data_pt,
        }
    }

    /// One past the last byte covered.
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.size)
    }

    fn overlaps(&self, offset: usize, end: usize) -> bool {
        self.offset < end && offset < self.end()
    }

    /// Concrete byte at absolute address `addr`, which must be covered.
    fn byte_at(&self, addr: usize) -> u8 {
        let from_lsb = self.end() - 1 - addr;
        if from_lsb >= 32 {
            0
        } else {
            self.data_pt.value().byte(from_lsb)
        }
    }
}

/// Which bytes of a view a fragment contributes, most significant first.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ByteMask(Vec<bool>);

impl ByteMask {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether every byte of the view is covered.
    pub fn is_full(&self) -> bool {
        self.0.iter().all(|valid| *valid)
    }

    pub fn valid_bytes(&self) -> usize {
        self.0.iter().filter(|valid| **valid).count()
    }

    /// The mask as a word in view coordinates, keeping the low 256 bits.
    pub fn to_word(&self) -> U256 {
        self.unshifted(0)
    }

    /// The mask moved back into the coordinates of the fragment's value,
    /// i.e. shifted right by `shift` bits (left when negative), keeping the
    /// low 256 bits.
    pub fn unshifted(&self, shift: isize) -> U256 {
        let len = self.0.len() as isize;
        let mut word = U256::zero();
        for (i, valid) in self.0.iter().enumerate() {
            let bit = (len - 1 - i as isize) * 8 - shift;
            if *valid && (0..256).contains(&bit) {
                word = word | (U256::from(0xff) << bit as usize);
            }
        }
        word
    }
}

impl fmt::Display for ByteMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("0x")?;
        for valid in &self.0 {
            f.write_str(if *valid { "FF" } else { "00" })?;
        }
        Ok(())
    }
}

/// One fragment of a memory read.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DataAliasInfo {
    pub data_pt: DataPt,
    /// Bits to shift the fragment by: left when positive, right when
    /// negative.
    pub shift: isize,
    pub masker: ByteMask,
}

impl DataAliasInfo {
    /// The bits this fragment contributes to a view of at most 32 bytes.
    pub fn contribution(&self) -> U256 {
        shift_word(self.data_pt.value(), self.shift) & self.masker.to_word()
    }
}

/// Shifts left by `shift` bits, or right when negative. Shifts of 256 bits or
/// more clear the word.
pub fn shift_word(value: U256, shift: isize) -> U256 {
    let amount = shift.unsigned_abs();
    match amount {
        a if a >= 256 => U256::zero(),
        a if shift > 0 => value << a,
        a => value >> a,
    }
}

#[derive(Clone, Debug, Default)]
pub struct MemoryPt {
    records: BTreeMap<u64, MemoryRecord>,
    timestamp: u64,
}

impl MemoryPt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a memory by replaying `records` in order.
    pub fn simulate(records: &[MemoryRecord]) -> Self {
        let mut memory = Self::new();
        for record in records {
            memory.write(record.offset, record.size, record.data_pt.clone());
        }
        memory
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Live records, oldest first.
    pub fn records(&self) -> impl Iterator<Item = &MemoryRecord> {
        self.records.values()
    }

    /// Records `data_pt` over `[offset, offset + size)`. Older records lying
    /// entirely inside the window are dropped; partial overlaps are kept and
    /// resolved when read.
    pub fn write(&mut self, offset: usize, size: usize, data_pt: DataPt) {
        if size == 0 {
            return;
        }
        let end = offset.saturating_add(size);
        self.records
            .retain(|_, record| !(record.offset >= offset && record.end() <= end));
        self.records
            .insert(self.timestamp, MemoryRecord::new(offset, size, data_pt));
        self.timestamp += 1;
    }

    /// Copies of the records contributing to `[offset, offset + size)`,
    /// oldest first.
    pub fn read(&self, offset: usize, size: usize) -> Vec<MemoryRecord> {
        self.fragments(offset, size)
            .into_iter()
            .map(|(record, _)| record.clone())
            .collect()
    }

    /// Resolves `[offset, offset + size)` into its fragments, oldest first.
    pub fn get_data_alias(&self, offset: usize, size: usize) -> Vec<DataAliasInfo> {
        let view_end = offset.saturating_add(size);
        let infos: Vec<_> = self
            .fragments(offset, size)
            .into_iter()
            .map(|(record, masker)| DataAliasInfo {
                data_pt: record.data_pt.clone(),
                shift: (view_end as isize - record.end() as isize) * 8,
                masker,
            })
            .collect();
        trace!(
            "Memory view ({offset}, {size}) resolves to {} fragments: [{}]",
            infos.len(),
            infos
                .iter()
                .map(|info| format!("{} << {}", info.masker, info.shift))
                .join(", ")
        );
        infos
    }

    /// Concrete bytes of `[offset, offset + size)`; unwritten bytes are zero.
    pub fn view_memory(&self, offset: usize, size: usize) -> Vec<u8> {
        let mut bytes = vec![0u8; size];
        for (record, masker) in self.fragments(offset, size) {
            for (i, valid) in masker.0.iter().enumerate() {
                if *valid {
                    bytes[i] = record.byte_at(offset + i);
                }
            }
        }
        bytes
    }

    /// For every record still visible in the window, the bytes it owns.
    fn fragments(&self, offset: usize, size: usize) -> Vec<(&MemoryRecord, ByteMask)> {
        let end = offset.saturating_add(size);
        let size = end - offset;
        let mut owners: Vec<Option<u64>> = vec![None; size];
        for (timestamp, record) in &self.records {
            if !record.overlaps(offset, end) {
                continue;
            }
            let start = record.offset.max(offset) - offset;
            let stop = record.end().min(end) - offset;
            owners[start..stop].fill(Some(*timestamp));
        }

        self.records
            .iter()
            .filter_map(|(timestamp, record)| {
                let mask: Vec<bool> = owners.iter().map(|o| *o == Some(*timestamp)).collect();
                mask.iter().any(|v| *v).then(|| (record, ByteMask(mask)))
            })
            .collect()
    }
}
