use ethereum_types::{Address, H256, U256};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::inputs::{BlockEnvironment, SynthesizerInputs, TransactionInputs};
use crate::subcircuit::{SubcircuitInfo, SubcircuitLibrary};

const TEST_LIBRARY_JSON: &str = include_str!("../test_data/subcircuit_info.json");

pub(crate) fn common_setup() {
    // Try init since multiple tests calling `init` will cause an error.
    let _ = env_logger::try_init();
}

pub(crate) fn test_library_infos() -> Vec<SubcircuitInfo> {
    serde_json::from_str(TEST_LIBRARY_JSON).unwrap()
}

pub(crate) fn test_library() -> SubcircuitLibrary {
    SubcircuitLibrary::new(test_library_infos()).unwrap()
}

/// Two transactions against the same contract, four known ancestors.
pub(crate) fn test_inputs() -> SynthesizerInputs {
    let contract = Address::repeat_byte(0xc0);
    let tx = |nonce: u64, inputs: Vec<U256>| TransactionInputs {
        nonce,
        contract_address: contract,
        function_selector: 0xa905_9cbb,
        inputs,
        eddsa_signature: U256::from(0x5167_u64 + nonce),
        eddsa_randomizer: [U256::from(11 + nonce), U256::from(13 + nonce)],
    };

    SynthesizerInputs {
        initial_merkle_root: U256::from(0x1234_5678_u64),
        result_merkle_root: Some(U256::from(0x8765_4321_u64)),
        eddsa_public_key: [U256::from(3), U256::from(5)],
        block: BlockEnvironment {
            coinbase: Address::repeat_byte(0xcb),
            timestamp: U256::from(1_700_000_000_u64),
            number: U256::from(20_000_000_u64),
            prev_randao: U256::from(0xdead_beef_u64),
            gas_limit: U256::from(30_000_000_u64),
            chain_id: U256::from(11_155_111_u64),
            self_balance: U256::from(10).pow(U256::from(18)),
            base_fee: U256::from(7),
            block_hashes: (1..=4u8).map(H256::repeat_byte).collect(),
        },
        transactions: vec![
            tx(0, vec![U256::from(0xbeef), U256::from(1000)]),
            tx(1, vec![U256::MAX]),
        ],
    }
}

pub(crate) fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// A random word whose value fits in `bytes` bytes.
pub(crate) fn random_word(rng: &mut StdRng, bytes: usize) -> U256 {
    let mut buf = [0u8; 32];
    rng.fill(&mut buf[32 - bytes.min(32)..]);
    U256::from_big_endian(&buf)
}
