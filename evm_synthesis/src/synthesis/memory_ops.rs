//! Placements turning memory fragments into stack values and memory copies.

use ethereum_types::U256;
use log::trace;
use zk_synth_common::low_bytes_mask;

use super::state::Synthesizer;
use crate::arithmetic::ArithmeticOperator;
use crate::errors::{SynthesisError, SynthesisResult};
use crate::memory::{DataAliasInfo, MemoryPt, MemoryRecord};
use crate::wire::DataPt;

/// Largest shift a single SHL or SHR placement is given.
const MAX_SHIFT_STEP: usize = 255;

/// Shifts of 256 bits or more clear the word, so longer shifts are clamped.
const MAX_SHIFT: usize = 256;

impl Synthesizer {
    /// Shifts `pt` left by `shift` bits, or right when negative, with
    /// constant-amount SHL or SHR placements.
    pub(crate) fn place_shift(&mut self, pt: &DataPt, shift: isize) -> SynthesisResult<DataPt> {
        let operator = if shift > 0 {
            ArithmeticOperator::Shl
        } else {
            ArithmeticOperator::Shr
        };
        let mut remaining = shift.unsigned_abs().min(MAX_SHIFT);
        let mut out_pt = pt.clone();
        while remaining > 0 {
            let step = remaining.min(MAX_SHIFT_STEP);
            let amount = self.load_constant(U256::from(step))?;
            out_pt = self.place_single(operator, &[amount, out_pt])?;
            remaining -= step;
        }
        Ok(out_pt)
    }

    /// ANDs `pt` with the constant `mask`, unless that leaves it unchanged.
    fn place_mask(&mut self, pt: DataPt, mask: U256) -> SynthesisResult<DataPt> {
        if pt.value() & mask == pt.value() {
            return Ok(pt);
        }
        let mask_pt = self.load_constant(mask)?;
        self.place_single(ArithmeticOperator::And, &[mask_pt, pt])
    }

    /// Combines the fragments of a memory read into the single word the read
    /// pushes.
    pub(crate) fn place_memory_to_stack(
        &mut self,
        alias: &[DataAliasInfo],
    ) -> SynthesisResult<DataPt> {
        if alias.is_empty() {
            return Err(SynthesisError::EmptyAlias);
        }

        let mut fragments = Vec::with_capacity(alias.len());
        for info in alias {
            let shifted = if info.shift == 0 {
                info.data_pt.clone()
            } else {
                self.place_shift(&info.data_pt, info.shift)?
            };
            fragments.push(self.place_mask(shifted, info.masker.to_word())?);
        }

        if let [fragment] = fragments.as_slice() {
            return Ok(fragment.clone());
        }
        let limit = self.config.n_accumulation;
        if fragments.len() > limit {
            return Err(SynthesisError::AccumulatorOverflow {
                fragments: fragments.len(),
                limit,
            });
        }
        trace!("Accumulating {} memory fragments", fragments.len());
        self.place_single(ArithmeticOperator::Accumulator, &fragments)
    }

    /// Masks every fragment in the coordinates of its own record, leaving the
    /// shift to [`Self::adjust_memory_pts`].
    pub(crate) fn place_memory_to_memory(
        &mut self,
        alias: &[DataAliasInfo],
    ) -> SynthesisResult<Vec<DataPt>> {
        alias
            .iter()
            .map(|info| self.place_mask(info.data_pt.clone(), info.masker.unshifted(info.shift)))
            .collect()
    }

    /// Truncates a value to the `truncated_bytes` bytes a store writes.
    pub(crate) fn place_mstore(
        &mut self,
        pt: &DataPt,
        truncated_bytes: usize,
    ) -> SynthesisResult<DataPt> {
        let truncated_bytes = truncated_bytes.max(1);
        if truncated_bytes >= pt.byte_width() {
            return Ok(pt.clone());
        }
        let mask = low_bytes_mask(truncated_bytes);
        let masked = self.place_mask(pt.clone(), mask)?;
        Ok(masked.with_bit_width(truncated_bytes * 8)?)
    }

    /// Builds the records a copy of `[src, src + length)` writes at `dst`.
    ///
    /// `source` holds the records covering the source window, oldest first.
    /// Source bytes nothing was written to copy as zeros: the window is first
    /// cleared with a zero record, which the copied fragments then overlay.
    pub(crate) fn copy_memory_region(
        &mut self,
        source: &[MemoryRecord],
        src: usize,
        length: usize,
        dst: usize,
    ) -> SynthesisResult<Vec<MemoryRecord>> {
        let view = MemoryPt::simulate(source);
        let records = view.read(src, length);
        let alias = view.get_data_alias(src, length);

        let covered: usize = alias.iter().map(|info| info.masker.valid_bytes()).sum();
        let mut out = Vec::with_capacity(alias.len() + 1);
        if covered < length {
            trace!("Copy of ({src}, {length}) covers {covered} bytes, zeroing the rest");
            let zero = self.load_arbitrary_static(U256::zero(), 1, None)?;
            out.push(MemoryRecord::new(dst, length, zero));
        }
        if !alias.is_empty() {
            let masked = self.place_memory_to_memory(&alias)?;
            out.extend(self.adjust_memory_pts(masked, &records, src, length, dst)?);
        }
        Ok(out)
    }

    /// Moves masked fragments from their source records to the destination
    /// window, trimming what lies outside `[src, src + length)`.
    pub(crate) fn adjust_memory_pts(
        &mut self,
        data_pts: Vec<DataPt>,
        records: &[MemoryRecord],
        src: usize,
        length: usize,
        dst: usize,
    ) -> SynthesisResult<Vec<MemoryRecord>> {
        let src_end = src.saturating_add(length);
        data_pts
            .into_iter()
            .zip(records)
            .map(|(pt, record)| {
                let container_end = record.end();
                let actual_offset = src.max(record.offset);
                let actual_end = src_end.min(container_end);
                let ending_gap = container_end - actual_end;

                let pt = if ending_gap > 0 {
                    let shift = isize::try_from(ending_gap.saturating_mul(8)).unwrap_or(isize::MAX);
                    self.place_shift(&pt, -shift)?
                } else {
                    pt
                };
                Ok(MemoryRecord::new(
                    actual_offset - src + dst,
                    actual_end - actual_offset,
                    pt,
                ))
            })
            .collect()
    }

    /// Loads `[offset, offset + length)` of memory as 32-byte words, the last
    /// one holding the remaining bytes right-aligned.
    pub(crate) fn read_memory_chunks(
        &mut self,
        offset: usize,
        length: usize,
    ) -> SynthesisResult<Vec<DataPt>> {
        (0..length.div_ceil(32))
            .map(|i| {
                let size = (length - 32 * i).min(32);
                let alias = self.memory.get_data_alias(offset + 32 * i, size);
                if alias.is_empty() {
                    self.load_arbitrary_static(U256::zero(), 1, None)
                } else {
                    self.place_memory_to_stack(&alias)
                }
            })
            .collect()
    }
}
