use ethereum_types::{Address, H256, U256};

/// Keccak-256 of the empty byte string.
/// 0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470
pub const EMPTY_KECCAK_HASH: H256 = H256([
    197, 210, 70, 1, 134, 247, 35, 60, 146, 126, 125, 178, 220, 199, 3, 192, 229, 0, 182, 83, 202,
    130, 39, 59, 123, 250, 216, 4, 93, 133, 164, 112,
]);

/// Order of the BLS12-381 scalar field. Every 255-bit wire must stay below it.
/// 0x73eda753299d7d483339d80809a1d80553bda402fffe5bfeffffffff00000001
pub const BLS12_381_SCALAR_MODULUS: U256 = U256([
    0xffffffff00000001,
    0x53bda402fffe5bfe,
    0x3339d80809a1d805,
    0x73eda753299d7d48,
]);

/// Order of the prime subgroup of Jubjub. Every 252-bit wire must stay below
/// it.
/// 0x0e7db4ea6533afa906673b0101343b00a6682093ccc81082d0970e5ed6f72cb7
pub const JUBJUB_SCALAR_MODULUS: U256 = U256([
    0xd0970e5ed6f72cb7,
    0xa6682093ccc81082,
    0x06673b0101343b00,
    0x0e7db4ea6533afa9,
]);

/// Affine coordinates of the Jubjub generator.
pub const JUBJUB_BASE_POINT: (U256, U256) = (
    U256([
        0x3e6b071492d1122b,
        0xe72f6afd7d1f7262,
        0x86a365b99fbf3d3b,
        0x11dafe5d23e12180,
    ]),
    U256([
        0xcc3f870e59d292aa,
        0x3e26ba5cc220fed7,
        0x93132e78c866c0c3,
        0x1d523cf1ddab1a17,
    ]),
);

/// The identity of the twisted Edwards group, `(0, 1)`.
pub const JUBJUB_IDENTITY_POINT: (U256, U256) = (U256([0, 0, 0, 0]), U256([1, 0, 0, 0]));

/// Masks the low 20 bytes of a word, i.e. an account address.
pub const ADDRESS_MASK: U256 = U256([u64::MAX, u64::MAX, 0xffffffff, 0]);

/// Interprets an address as a big-endian word.
pub fn address_to_u256(address: &Address) -> U256 {
    U256::from_big_endian(address.as_bytes())
}

/// Returns `2^bits - 1`, saturating at `U256::MAX`.
pub fn low_bits_mask(bits: usize) -> U256 {
    if bits >= 256 {
        U256::MAX
    } else {
        (U256::one() << bits) - 1
    }
}

/// Returns a mask covering the low `bytes` bytes of a word.
pub fn low_bytes_mask(bytes: usize) -> U256 {
    low_bits_mask(bytes.saturating_mul(8))
}

#[test]
fn test_empty_keccak_hash() {
    assert_eq!(EMPTY_KECCAK_HASH, keccak_hash::keccak([]));
}

#[test]
fn test_address_mask() {
    assert_eq!(ADDRESS_MASK, low_bits_mask(160));
    assert_eq!(ADDRESS_MASK.bits(), 160);
}

#[test]
fn test_address_to_u256() {
    let address = Address::repeat_byte(0xff);
    assert_eq!(address_to_u256(&address), ADDRESS_MASK);
    assert_eq!(address_to_u256(&Address::zero()), U256::zero());
}

#[test]
fn test_moduli_widths() {
    assert_eq!(BLS12_381_SCALAR_MODULUS.bits(), 255);
    assert_eq!(JUBJUB_SCALAR_MODULUS.bits(), 252);
    assert!(JUBJUB_BASE_POINT.0 < BLS12_381_SCALAR_MODULUS);
    assert!(JUBJUB_BASE_POINT.1 < BLS12_381_SCALAR_MODULUS);
}

#[test]
fn test_low_bytes_mask() {
    assert_eq!(low_bytes_mask(0), U256::zero());
    assert_eq!(low_bytes_mask(1), U256::from(0xff));
    assert_eq!(low_bytes_mask(4), U256::from(0xffff_ffffu64));
    assert_eq!(low_bytes_mask(32), U256::MAX);
    assert_eq!(low_bytes_mask(40), U256::MAX);
}
