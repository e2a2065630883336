use agritrace_core::constants::TX_HASH_BYTES;
use agritrace_core::types::TxHash;

/// Derive a transaction hash from a record body.
///
/// `salt` separates ledgers from one another and `nonce` separates two
/// anchorings of byte-identical bodies within one ledger. The hash is the
/// leading 20 bytes of BLAKE3(salt || nonce || body).
pub fn tx_hash_from_body(salt: &[u8], nonce: u64, body: &[u8]) -> TxHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(salt);
    hasher.update(&nonce.to_le_bytes());
    hasher.update(body);
    let digest = hasher.finalize();
    let mut arr = [0u8; TX_HASH_BYTES];
    arr.copy_from_slice(&digest.as_bytes()[..TX_HASH_BYTES]);
    TxHash::from_bytes(arr)
}
