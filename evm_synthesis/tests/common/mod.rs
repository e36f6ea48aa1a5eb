//! Session fixtures shared by the integration tests.

#![allow(dead_code)]

use env_logger::{try_init_from_env, Env, DEFAULT_FILTER_ENV};
use ethereum_types::{Address, H256, U256};
use evm_synthesis::{
    BlockEnvironment, FrontendConfig, InterpreterStep, SubcircuitLibrary, Synthesizer,
    SynthesizerInputs, SynthesizerOpts, TransactionInputs,
};
use hex_literal::hex;

pub const SUBCIRCUIT_INFO: &str = include_str!("../../test_data/subcircuit_info.json");
pub const FRONTEND_CFG: &str = include_str!("../../test_data/frontend_cfg.json");

/// `transfer(address,uint256)`.
pub const TRANSFER_SELECTOR: [u8; 4] = hex!("a9059cbb");

pub fn init_logger() {
    let _ = try_init_from_env(Env::default().filter_or(DEFAULT_FILTER_ENV, "info"));
}

pub fn contract() -> Address {
    Address::from(hex!("c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0c0"))
}

pub fn block_number() -> U256 {
    U256::from(20_000_000u64)
}

pub fn inputs() -> SynthesizerInputs {
    let tx = |nonce: u64, inputs: Vec<U256>| TransactionInputs {
        nonce,
        contract_address: contract(),
        function_selector: u32::from_be_bytes(TRANSFER_SELECTOR),
        inputs,
        eddsa_signature: U256::from(0x5167u64 + nonce),
        eddsa_randomizer: [U256::from(11), U256::from(13)],
    };

    SynthesizerInputs {
        initial_merkle_root: U256::from(0x1234_5678u64),
        result_merkle_root: Some(U256::from(0x8765_4321u64)),
        eddsa_public_key: [U256::from(3), U256::from(5)],
        block: BlockEnvironment {
            coinbase: Address::repeat_byte(0xcb),
            timestamp: U256::from(1_700_000_000u64),
            number: block_number(),
            prev_randao: U256::from(0xdead_beefu64),
            gas_limit: U256::from(30_000_000u64),
            chain_id: U256::from(11_155_111u64),
            self_balance: U256::zero(),
            base_fee: U256::from(7),
            block_hashes: (1..=4u8).map(H256::repeat_byte).collect(),
        },
        transactions: vec![
            tx(0, vec![U256::from(0xbeef), U256::from(1000)]),
            tx(1, vec![]),
        ],
    }
}

/// A session with its buffers initialized and no transaction started.
pub fn idle_session() -> Synthesizer {
    init_logger();
    let library = SubcircuitLibrary::from_json_str(SUBCIRCUIT_INFO).unwrap();
    let config = FrontendConfig::from_json_str(FRONTEND_CFG).unwrap();
    Synthesizer::new(library, config, inputs(), SynthesizerOpts::default()).unwrap()
}

/// A session with transaction 0 started.
pub fn session() -> Synthesizer {
    let mut synthesizer = idle_session();
    synthesizer.begin_transaction(0).unwrap();
    synthesizer
}

pub fn step(opcode: u8, inputs: &[U256], output: Option<U256>) -> InterpreterStep {
    InterpreterStep {
        opcode,
        code_address: contract(),
        inputs: inputs.to_vec(),
        output,
        ..Default::default()
    }
}

/// A step that also reports the memory bytes it wrote or returned.
pub fn memory_step(opcode: u8, inputs: &[U256], memory_out: Vec<u8>) -> InterpreterStep {
    InterpreterStep {
        memory_out: Some(memory_out),
        ..step(opcode, inputs, None)
    }
}

/// Runs `PUSH32 value`.
pub fn push(synthesizer: &mut Synthesizer, pc: usize, value: U256) {
    let step = InterpreterStep {
        opcode: 0x7f,
        pc,
        code_address: contract(),
        output: Some(value),
        ..Default::default()
    };
    synthesizer.synthesize_step(&step).unwrap();
}

/// Pushes `values` in order, so the last one ends up on top.
pub fn push_all(synthesizer: &mut Synthesizer, values: &[U256]) {
    for (i, value) in values.iter().enumerate() {
        push(synthesizer, 33 * i, *value);
    }
}

pub fn word_bytes(value: U256) -> Vec<u8> {
    let mut bytes = vec![0u8; 32];
    value.to_big_endian(&mut bytes);
    bytes
}

pub fn top(synthesizer: &Synthesizer) -> U256 {
    synthesizer.stack().peek(1).unwrap()[0].value()
}
