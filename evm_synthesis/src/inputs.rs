//! Values a synthesis session is seeded with before the first opcode.

use ethereum_types::{Address, H256, U256};
use serde::{Deserialize, Serialize};

use crate::errors::{SynthesisError, SynthesisResult};

/// Number of 32-byte call arguments a transaction can carry.
pub const TRANSACTION_INPUT_COUNT: usize = 9;

/// Default depth of the symbolic stack, matching the EVM.
pub const DEFAULT_MAX_STACK_HEIGHT: usize = 1024;

/// Inputs of one synthesis session.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SynthesizerInputs {
    /// Root of the state tree before the session.
    pub initial_merkle_root: U256,
    /// Root of the state tree after the session, exposed at finalization
    /// when known.
    #[serde(default)]
    pub result_merkle_root: Option<U256>,
    /// EdDSA public key of the transaction sender.
    pub eddsa_public_key: [U256; 2],
    pub block: BlockEnvironment,
    /// Signed transactions, listed by increasing nonce starting at 0.
    pub transactions: Vec<TransactionInputs>,
}

impl SynthesizerInputs {
    pub fn validate(&self) -> SynthesisResult<()> {
        for (expected, tx) in self.transactions.iter().enumerate() {
            if tx.nonce != expected as u64 {
                return Err(SynthesisError::UnorderedTransaction {
                    expected: expected as u64,
                    actual: tx.nonce,
                });
            }
            if tx.inputs.len() > TRANSACTION_INPUT_COUNT {
                return Err(SynthesisError::InvalidConfig(format!(
                    "transaction {} carries {} inputs, at most {TRANSACTION_INPUT_COUNT} are supported",
                    tx.nonce,
                    tx.inputs.len()
                )));
            }
        }
        Ok(())
    }

    pub fn transaction(&self, nonce: u64) -> Option<&TransactionInputs> {
        usize::try_from(nonce)
            .ok()
            .and_then(|i| self.transactions.get(i))
    }
}

/// Block-level values exposed to the BLOCK opcodes.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BlockEnvironment {
    pub coinbase: Address,
    pub timestamp: U256,
    pub number: U256,
    pub prev_randao: U256,
    pub gas_limit: U256,
    pub chain_id: U256,
    pub self_balance: U256,
    pub base_fee: U256,
    /// `block_hashes[i]` is the hash of the block `i + 1` blocks ago.
    #[serde(default)]
    pub block_hashes: Vec<H256>,
}

/// Everything a transaction contributes to the private input buffer.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransactionInputs {
    pub nonce: u64,
    pub contract_address: Address,
    pub function_selector: u32,
    /// Call arguments following the selector, 32 bytes each.
    #[serde(default)]
    pub inputs: Vec<U256>,
    pub eddsa_signature: U256,
    pub eddsa_randomizer: [U256; 2],
}

impl TransactionInputs {
    /// Size of the call data, selector included.
    pub fn calldata_size(&self) -> usize {
        4 + 32 * self.inputs.len()
    }
}

/// Session-wide knobs that are not part of the compiled circuit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SynthesizerOpts {
    pub max_stack_height: usize,
}

impl Default for SynthesizerOpts {
    fn default() -> Self {
        Self {
            max_stack_height: DEFAULT_MAX_STACK_HEIGHT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_deserialize_from_camel_case_json() {
        let json = r#"{
            "initialMerkleRoot": "0x1",
            "eddsaPublicKey": ["0x2", "0x3"],
            "block": {
                "coinbase": "0x00000000000000000000000000000000000000aa",
                "timestamp": "0x10", "number": "0x20", "prevRandao": "0x0",
                "gasLimit": "0x1c9c380", "chainId": "0x1", "selfBalance": "0x0",
                "baseFee": "0x7"
            },
            "transactions": [{
                "nonce": 0,
                "contractAddress": "0x00000000000000000000000000000000000000bb",
                "functionSelector": 2835717307,
                "inputs": ["0x5"],
                "eddsaSignature": "0x9",
                "eddsaRandomizer": ["0x1", "0x2"]
            }]
        }"#;
        let inputs: SynthesizerInputs = serde_json::from_str(json).unwrap();
        inputs.validate().unwrap();

        assert_eq!(inputs.initial_merkle_root, U256::one());
        assert_eq!(inputs.block.gas_limit, U256::from(30_000_000));
        assert_eq!(inputs.transactions[0].function_selector, 0xa9059cbb);
        assert_eq!(inputs.transactions[0].calldata_size(), 36);
        assert!(inputs.block.block_hashes.is_empty());
        assert_eq!(inputs.result_merkle_root, None);
    }

    #[test]
    fn transactions_must_be_in_nonce_order() {
        let inputs = SynthesizerInputs {
            transactions: vec![TransactionInputs {
                nonce: 1,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert_eq!(
            inputs.validate(),
            Err(SynthesisError::UnorderedTransaction {
                expected: 0,
                actual: 1
            })
        );
    }

    #[test]
    fn too_many_call_arguments_are_rejected() {
        let inputs = SynthesizerInputs {
            transactions: vec![TransactionInputs {
                inputs: vec![U256::zero(); TRANSACTION_INPUT_COUNT + 1],
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(inputs.validate().is_err());
    }
}
