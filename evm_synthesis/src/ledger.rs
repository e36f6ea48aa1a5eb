//! The append-only list of subcircuit instantiations.
//!
//! Reserved buffers occupy the first [`FIRST_ARITHMETIC_PLACEMENT_INDEX`]
//! slots and are the only placements that grow after being appended. Every
//! other placement is appended once through [`PlacementLedger::place`] and
//! never touched again.

use log::debug;
use strum::IntoEnumIterator;

use crate::arithmetic::ArithmeticOperator;
use crate::buffer::{ReservedBuffer, FIRST_ARITHMETIC_PLACEMENT_INDEX};
use crate::errors::{SynthesisError, SynthesisResult};
use crate::subcircuit::{SubcircuitLibrary, SubcircuitName};
use crate::wire::{DataPt, WireRef};

/// What a placement is used for.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Usage {
    Buffer(ReservedBuffer),
    Arithmetic(ArithmeticOperator),
}

/// One instantiation of a subcircuit.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Placement {
    pub name: SubcircuitName,
    pub subcircuit_id: usize,
    pub in_pts: Vec<DataPt>,
    pub out_pts: Vec<DataPt>,
    pub usage: Usage,
}

#[derive(Clone, Debug)]
pub struct PlacementLedger {
    library: SubcircuitLibrary,
    placements: Vec<Placement>,
}

impl PlacementLedger {
    /// Creates a ledger holding one empty placement per reserved buffer.
    pub fn new(library: SubcircuitLibrary) -> SynthesisResult<Self> {
        let mut placements = Vec::with_capacity(FIRST_ARITHMETIC_PLACEMENT_INDEX);
        for buffer in ReservedBuffer::iter() {
            let name = buffer.subcircuit();
            placements.push(Placement {
                name,
                subcircuit_id: library.get(name)?.id,
                in_pts: vec![],
                out_pts: vec![],
                usage: Usage::Buffer(buffer),
            });
        }

        Ok(Self {
            library,
            placements,
        })
    }

    pub const fn library(&self) -> &SubcircuitLibrary {
        &self.library
    }

    /// Index the next placement will be stored at.
    pub fn next_index(&self) -> usize {
        self.placements.len()
    }

    pub fn len(&self) -> usize {
        self.placements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.placements.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Placement> {
        self.placements.get(index)
    }

    /// Returns a copy of every placement recorded so far.
    pub fn placements(&self) -> Vec<Placement> {
        self.placements.clone()
    }

    /// Appends an arithmetic placement and returns its index.
    ///
    /// Inputs must already be produced by an earlier placement, and output
    /// `i` must be declared as `(next_index, i)`.
    pub fn place(
        &mut self,
        name: SubcircuitName,
        in_pts: Vec<DataPt>,
        out_pts: Vec<DataPt>,
        usage: ArithmeticOperator,
    ) -> SynthesisResult<usize> {
        let index = self.next_index();
        let info = self.library.get(name)?;
        if name.is_buffer() {
            return Err(SynthesisError::InconsistentLedger(format!(
                "buffer {name} cannot be placed at {index}"
            )));
        }
        check_arity(name, "input", info.n_inputs(), in_pts.len())?;
        check_arity(name, "output", info.n_outputs(), out_pts.len())?;

        for (input_index, pt) in in_pts.iter().enumerate() {
            match pt.wire() {
                WireRef::Unbound => {
                    return Err(SynthesisError::UnboundInput {
                        placement: index,
                        name,
                        input_index,
                    })
                }
                WireRef::Produced(..) if !self.is_produced(pt.wire(), index) => {
                    return Err(SynthesisError::DanglingInput {
                        placement: index,
                        input_index,
                        wire: pt.wire(),
                    })
                }
                WireRef::Produced(..) => {}
            }
        }
        for (wire_index, pt) in out_pts.iter().enumerate() {
            if pt.wire() != WireRef::Produced(index, wire_index) {
                return Err(SynthesisError::MisplacedOutput {
                    placement: index,
                    wire_index,
                    found: pt.wire(),
                });
            }
        }

        debug!(
            "Placement {index}: {name} ({usage}) with {} inputs and {} outputs",
            in_pts.len(),
            out_pts.len()
        );
        self.placements.push(Placement {
            name,
            subcircuit_id: info.id,
            in_pts,
            out_pts,
            usage: Usage::Arithmetic(usage),
        });
        Ok(index)
    }

    /// Whether `wire` already exists as an output of a placement before
    /// `consumer`.
    fn is_produced(&self, wire: WireRef, consumer: usize) -> bool {
        match wire {
            WireRef::Produced(placement, wire_index) => {
                placement < consumer
                    && self
                        .placements
                        .get(placement)
                        .is_some_and(|p| wire_index < p.out_pts.len())
            }
            WireRef::Unbound => false,
        }
    }

    pub(crate) fn buffer(&self, buffer: ReservedBuffer) -> &Placement {
        &self.placements[buffer.index()]
    }

    pub(crate) fn buffer_mut(&mut self, buffer: ReservedBuffer) -> &mut Placement {
        &mut self.placements[buffer.index()]
    }

    /// Re-checks the structural invariants over the whole ledger.
    pub fn check_consistency(&self) -> SynthesisResult<()> {
        for (index, placement) in self.placements.iter().enumerate() {
            match placement.usage {
                Usage::Buffer(buffer) => self.check_buffer(index, buffer, placement)?,
                Usage::Arithmetic(_) => {
                    if index < FIRST_ARITHMETIC_PLACEMENT_INDEX {
                        return Err(SynthesisError::InconsistentLedger(format!(
                            "arithmetic placement at reserved index {index}"
                        )));
                    }
                    for (input_index, pt) in placement.in_pts.iter().enumerate() {
                        if !self.is_produced(pt.wire(), index) {
                            return Err(SynthesisError::DanglingInput {
                                placement: index,
                                input_index,
                                wire: pt.wire(),
                            });
                        }
                    }
                    for (wire_index, pt) in placement.out_pts.iter().enumerate() {
                        if pt.wire() != WireRef::Produced(index, wire_index) {
                            return Err(SynthesisError::MisplacedOutput {
                                placement: index,
                                wire_index,
                                found: pt.wire(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn check_buffer(
        &self,
        index: usize,
        buffer: ReservedBuffer,
        placement: &Placement,
    ) -> SynthesisResult<()> {
        if index != buffer.index() {
            return Err(SynthesisError::InconsistentLedger(format!(
                "{buffer:?} stored at {index}"
            )));
        }
        if placement.in_pts.len() != placement.out_pts.len() {
            return Err(SynthesisError::BufferLengthMismatch(index));
        }
        for (wire_index, (in_pt, out_pt)) in
            placement.in_pts.iter().zip(&placement.out_pts).enumerate()
        {
            if out_pt.wire() != WireRef::Produced(index, wire_index) {
                return Err(SynthesisError::MisplacedOutput {
                    placement: index,
                    wire_index,
                    found: out_pt.wire(),
                });
            }
            if in_pt.value() != out_pt.value() {
                return Err(SynthesisError::BufferValueMismatch {
                    input: in_pt.value(),
                    output: out_pt.value(),
                });
            }
            // The external side of an input buffer is the buffer itself; the
            // circuit side of an output buffer may come from anywhere in the
            // ledger, including placements appended after the buffer.
            let valid_source = if buffer.is_input() {
                in_pt.wire() == WireRef::Produced(index, wire_index)
            } else {
                in_pt.wire().placement().is_some_and(|p| {
                    self.placements
                        .get(p)
                        .is_some_and(|producer| match in_pt.wire() {
                            WireRef::Produced(_, w) => w < producer.out_pts.len(),
                            WireRef::Unbound => false,
                        })
                })
            };
            if !valid_source {
                return Err(SynthesisError::BufferSourceMismatch {
                    buffer,
                    position: wire_index,
                    wire: in_pt.wire(),
                });
            }
        }
        Ok(())
    }
}

fn check_arity(
    name: SubcircuitName,
    kind: &'static str,
    expected: usize,
    actual: usize,
) -> SynthesisResult<()> {
    // Unused trailing wires are zero-filled by the finalizer.
    if (kind == "output" && actual == 0) || actual > expected {
        return Err(SynthesisError::ArityMismatch {
            name,
            kind,
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use ethereum_types::U256;

    use super::*;
    use crate::testing_utils::{common_setup, test_library};
    use crate::wire::DataPtDescription;

    fn ledger() -> PlacementLedger {
        common_setup();
        PlacementLedger::new(test_library()).unwrap()
    }

    fn out(index: usize, wire: usize, value: u64) -> DataPt {
        DataPt::create(
            DataPtDescription::new(WireRef::Produced(index, wire), 256),
            U256::from(value),
        )
        .unwrap()
    }

    #[test]
    fn buffers_are_preallocated() {
        let ledger = ledger();
        assert_eq!(ledger.next_index(), FIRST_ARITHMETIC_PLACEMENT_INDEX);
        for buffer in ReservedBuffer::iter() {
            let placement = ledger.get(buffer.index()).unwrap();
            assert_eq!(placement.usage, Usage::Buffer(buffer));
            assert!(placement.in_pts.is_empty());
        }
        ledger.check_consistency().unwrap();
    }

    #[test]
    fn place_rejects_unbound_inputs() {
        let mut ledger = ledger();
        let literal = DataPt::literal(U256::one(), 256).unwrap();
        let index = ledger.next_index();
        let res = ledger.place(
            SubcircuitName::And,
            vec![literal.clone(), literal],
            vec![out(index, 0, 1)],
            ArithmeticOperator::And,
        );
        assert_eq!(
            res,
            Err(SynthesisError::UnboundInput {
                placement: index,
                name: SubcircuitName::And,
                input_index: 0
            })
        );
        assert_eq!(ledger.next_index(), index);
    }

    #[test]
    fn place_rejects_wires_from_the_future() {
        let mut ledger = ledger();
        let index = ledger.next_index();
        let future = out(index + 3, 0, 1);
        let res = ledger.place(
            SubcircuitName::And,
            vec![future.clone(), future],
            vec![out(index, 0, 1)],
            ArithmeticOperator::And,
        );
        assert!(matches!(res, Err(SynthesisError::DanglingInput { .. })));
    }

    #[test]
    fn place_checks_arity_and_output_positions() {
        let mut ledger = ledger();
        let index = ledger.next_index();
        let static_wire = ledger
            .add_wire_to_in_buffer(
                &DataPt::literal(U256::from(3), 256).unwrap(),
                ReservedBuffer::StaticIn,
            )
            .unwrap();

        let too_many = vec![static_wire.clone(); 3];
        assert!(matches!(
            ledger.place(
                SubcircuitName::And,
                too_many,
                vec![out(index, 0, 3)],
                ArithmeticOperator::And
            ),
            Err(SynthesisError::ArityMismatch { .. })
        ));

        assert!(matches!(
            ledger.place(
                SubcircuitName::And,
                vec![static_wire.clone(), static_wire.clone()],
                vec![out(index, 1, 3)],
                ArithmeticOperator::And
            ),
            Err(SynthesisError::MisplacedOutput { .. })
        ));

        let placed = ledger
            .place(
                SubcircuitName::And,
                vec![static_wire.clone(), static_wire],
                vec![out(index, 0, 3)],
                ArithmeticOperator::And,
            )
            .unwrap();
        assert_eq!(placed, index);
        assert_eq!(ledger.get(index).unwrap().name, SubcircuitName::And);
        ledger.check_consistency().unwrap();
    }

    #[test]
    fn snapshots_are_detached() {
        let mut ledger = ledger();
        let mut snapshot = ledger.placements();
        snapshot[0].out_pts.push(out(0, 0, 0));

        assert!(ledger.get(0).unwrap().out_pts.is_empty());
        ledger.check_consistency().unwrap();

        ledger
            .add_wire_to_in_buffer(
                &DataPt::literal(U256::one(), 1).unwrap(),
                ReservedBuffer::PublicIn,
            )
            .unwrap();
        assert!(snapshot[ReservedBuffer::PublicIn.index()].in_pts.is_empty());
    }
}
