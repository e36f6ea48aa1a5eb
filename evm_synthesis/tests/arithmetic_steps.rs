mod common;

use common::{idle_session, push_all, session, step, top};
use ethereum_types::U256;
use evm_synthesis::arithmetic::ArithmeticOperator;
use evm_synthesis::{SubcircuitName, SynthesisError, Synthesizer, Usage};

const ADD: u8 = 0x01;
const DIV: u8 = 0x04;
const EXP: u8 = 0x0a;
const SIGNEXTEND: u8 = 0x0b;
const LT: u8 = 0x10;
const BYTE: u8 = 0x1a;
const SHL: u8 = 0x1b;
const SAR: u8 = 0x1d;
const POP: u8 = 0x50;
const DUP2: u8 = 0x81;
const SWAP1: u8 = 0x90;

fn arithmetic_usages(synthesizer: &Synthesizer) -> Vec<ArithmeticOperator> {
    synthesizer
        .placements()
        .into_iter()
        .filter_map(|p| match p.usage {
            Usage::Arithmetic(op) => Some(op),
            Usage::Buffer(_) => None,
        })
        .collect()
}

/// Pushes `operands` so the first one ends up on top, then runs `opcode`.
fn binary(
    synthesizer: &mut Synthesizer,
    opcode: u8,
    operands: [U256; 2],
    output: U256,
) -> Result<(), SynthesisError> {
    push_all(synthesizer, &[operands[1], operands[0]]);
    synthesizer.synthesize_step(&step(opcode, &operands, Some(output)))
}

#[test]
fn add_places_one_alu_subcircuit() {
    let mut synthesizer = session();
    binary(&mut synthesizer, ADD, [U256::from(5), U256::from(3)], U256::from(8)).unwrap();

    assert_eq!(top(&synthesizer), U256::from(8));
    assert_eq!(synthesizer.stack().len(), 1);
    let placements = synthesizer.placements();
    let add = placements.last().unwrap();
    assert_eq!(add.name, SubcircuitName::Alu1);
    assert_eq!(add.in_pts.len(), 3);
    assert_eq!(add.in_pts[0].value(), U256::from(2));
    synthesizer.finalize().unwrap();
}

#[test]
fn vm_edge_cases_are_not_errors() {
    let mut synthesizer = session();
    binary(&mut synthesizer, DIV, [U256::from(7), U256::zero()], U256::zero()).unwrap();
    binary(&mut synthesizer, ADD, [U256::MAX, U256::from(2)], U256::one()).unwrap();
    binary(&mut synthesizer, LT, [U256::one(), U256::from(2)], U256::one()).unwrap();
    assert_eq!(synthesizer.stack().len(), 3);
}

#[test]
fn shifts_up_to_255_bits_are_placed() {
    let mut synthesizer = session();
    binary(
        &mut synthesizer,
        SHL,
        [U256::from(255), U256::one()],
        U256::one() << 255,
    )
    .unwrap();
    assert_eq!(arithmetic_usages(&synthesizer), vec![ArithmeticOperator::Shl]);

    let placements = synthesizer.placements();
    let shl = placements.last().unwrap();
    assert_eq!(shl.name, SubcircuitName::Alu3);
    assert_eq!(shl.in_pts[1].value(), U256::from(255));
    synthesizer.finalize().unwrap();
}

#[test]
fn oversized_byte_operands_are_fatal() {
    let cases = [
        (
            SHL,
            ArithmeticOperator::Shl,
            SubcircuitName::Alu3,
            [U256::from(300), U256::one()],
            U256::zero(),
        ),
        (
            SAR,
            ArithmeticOperator::Sar,
            SubcircuitName::Alu3,
            [U256::from(256), U256::MAX],
            U256::MAX,
        ),
        (
            BYTE,
            ArithmeticOperator::Byte,
            SubcircuitName::Alu5,
            [U256::from(300), U256::from(0xff)],
            U256::zero(),
        ),
        (
            SIGNEXTEND,
            ArithmeticOperator::SignExtend,
            SubcircuitName::Alu5,
            [U256::from(300), U256::from(0x80)],
            U256::from(0x80),
        ),
    ];

    for (opcode, operator, name, operands, output) in cases {
        let mut synthesizer = session();
        let before = synthesizer.placements().len();
        assert_eq!(
            binary(&mut synthesizer, opcode, operands, output),
            Err(SynthesisError::SelectorOperandTooLarge {
                operator,
                name,
                value: operands[0],
            })
        );
        assert!(arithmetic_usages(&synthesizer).is_empty());
        assert_eq!(synthesizer.placements().len(), before);
    }
}

#[test]
fn exp_is_square_and_multiply() {
    let mut synthesizer = session();
    binary(&mut synthesizer, EXP, [U256::from(3), U256::from(5)], U256::from(243)).unwrap();

    let usages = arithmetic_usages(&synthesizer);
    assert_eq!(usages[0], ArithmeticOperator::DecToBit);
    assert_eq!(usages.len(), 4);
    assert_eq!(top(&synthesizer), U256::from(243));
}

#[test]
fn diverging_values_are_fatal() {
    let mut synthesizer = session();
    let res = binary(&mut synthesizer, ADD, [U256::from(5), U256::from(3)], U256::from(9));
    assert_eq!(
        res,
        Err(SynthesisError::OutputDataMismatch {
            operation: "ADD".to_string(),
            symbolic: U256::from(8),
            actual: U256::from(9),
        })
    );

    let mut synthesizer = session();
    push_all(&mut synthesizer, &[U256::from(3), U256::from(5)]);
    let res = synthesizer.synthesize_step(&step(
        ADD,
        &[U256::from(6), U256::from(3)],
        Some(U256::from(9)),
    ));
    assert!(matches!(
        res,
        Err(SynthesisError::InputDataMismatch { symbolic, actual, .. })
            if symbolic == U256::from(5) && actual == U256::from(6)
    ));
}

#[test]
fn malformed_steps_are_rejected() {
    let mut synthesizer = session();
    push_all(&mut synthesizer, &[U256::one(), U256::one()]);

    assert_eq!(
        synthesizer.synthesize_step(&step(ADD, &[U256::one()], Some(U256::one()))),
        Err(SynthesisError::StepOperandCount {
            opcode: ADD,
            expected: 2,
            actual: 1
        })
    );
    assert_eq!(
        synthesizer.synthesize_step(&step(ADD, &[U256::one(), U256::one()], None)),
        Err(SynthesisError::MissingStepOutput(ADD))
    );
    assert_eq!(
        synthesizer.synthesize_step(&step(0xf1, &[], None)),
        Err(SynthesisError::UnsupportedOpcode(0xf1))
    );
    assert!(matches!(
        synthesizer.synthesize_step(&step(ADD, &[U256::one(); 2], Some(U256::from(2)))),
        Ok(())
    ));
    assert!(matches!(
        synthesizer.synthesize_step(&step(POP, &[U256::from(2)], None)),
        Ok(())
    ));
    assert!(matches!(
        synthesizer.synthesize_step(&step(POP, &[U256::zero()], None)),
        Err(SynthesisError::StackUnderflow { .. })
    ));
}

#[test]
fn steps_require_an_active_transaction() {
    let mut synthesizer = idle_session();
    assert_eq!(
        synthesizer.synthesize_step(&step(ADD, &[U256::one(); 2], Some(U256::from(2)))),
        Err(SynthesisError::NoActiveTransaction)
    );

    synthesizer.begin_transaction(0).unwrap();
    push_all(&mut synthesizer, &[U256::one()]);
    synthesizer.begin_transaction(1).unwrap();
    assert!(synthesizer.stack().is_empty());
    assert_eq!(
        synthesizer.begin_transaction(2),
        Err(SynthesisError::UnknownTransaction(2))
    );
}

#[test]
fn stack_manipulation_moves_wires() {
    let mut synthesizer = session();
    push_all(&mut synthesizer, &[U256::from(1), U256::from(2)]);
    let placements_before = synthesizer.placements().len();

    synthesizer
        .synthesize_step(&step(DUP2, &[], Some(U256::from(1))))
        .unwrap();
    let items = synthesizer.stack().items();
    assert_eq!(items.len(), 3);
    assert_eq!(items[2].wire(), items[0].wire());

    synthesizer.synthesize_step(&step(SWAP1, &[], None)).unwrap();
    let values: Vec<_> = synthesizer.stack().items().iter().map(|pt| pt.value()).collect();
    assert_eq!(values, vec![U256::from(1), U256::from(1), U256::from(2)]);

    assert_eq!(
        synthesizer.synthesize_step(&step(DUP2, &[], Some(U256::from(7)))),
        Err(SynthesisError::OutputDataMismatch {
            operation: "DUP2".to_string(),
            symbolic: U256::from(1),
            actual: U256::from(7),
        })
    );
    assert_eq!(synthesizer.placements().len(), placements_before);
}

#[test]
fn push_immediates_enter_through_the_static_buffer() {
    let mut synthesizer = session();
    let push0 = evm_synthesis::InterpreterStep {
        opcode: 0x5f,
        pc: 7,
        output: Some(U256::zero()),
        ..Default::default()
    };
    synthesizer.synthesize_step(&push0).unwrap();

    let pt = &synthesizer.stack().items()[0];
    assert_eq!(pt.bit_width(), 1);
    assert_eq!(pt.provenance().key, Some(U256::from(7)));
    assert_eq!(pt.wire().placement(), Some(evm_synthesis::ReservedBuffer::StaticIn.index()));
}
