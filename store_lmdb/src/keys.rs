//! Binary key layouts and prefix scans shared by the LMDB stores.
//!
//! Heights and account ids are encoded big-endian so that lexicographic key
//! order equals numeric order, and a prefix scan over `height_be(8)` yields
//! hashes in ascending byte order.

use std::ops::Bound;

use heed::types::Bytes;
use heed::{Database, RoTxn};

use vigil_types::{AccountId, TxHash};

use crate::LmdbError;

/// `height_be(8) ++ tx_hash(32)`.
pub(crate) fn height_hash_key(height: u64, hash: &TxHash) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..8].copy_from_slice(&height.to_be_bytes());
    key[8..].copy_from_slice(hash.as_bytes());
    key
}

/// `account_be(8) ++ tx_hash(32)`.
pub(crate) fn account_hash_key(account: &AccountId, hash: &TxHash) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..8].copy_from_slice(&account.to_be_bytes());
    key[8..].copy_from_slice(hash.as_bytes());
    key
}

/// `poll_hash(32) ++ voter_be(8)`.
pub(crate) fn vote_key(poll: &TxHash, voter: &AccountId) -> [u8; 40] {
    let mut key = [0u8; 40];
    key[..32].copy_from_slice(poll.as_bytes());
    key[32..].copy_from_slice(&voter.to_be_bytes());
    key
}

/// `height_be(8) ++ poll_hash(32) ++ voter_be(8)`.
pub(crate) fn vote_height_key(height: u64, poll: &TxHash, voter: &AccountId) -> [u8; 48] {
    let mut key = [0u8; 48];
    key[..8].copy_from_slice(&height.to_be_bytes());
    key[8..].copy_from_slice(&vote_key(poll, voter));
    key
}

/// Split a 40-byte `prefix(8) ++ tx_hash(32)` index key back into its hash.
pub(crate) fn hash_suffix(key: &[u8]) -> Result<TxHash, LmdbError> {
    key.get(8..40)
        .and_then(TxHash::from_slice)
        .ok_or_else(|| LmdbError::Serialization("index key has unexpected length".into()))
}

/// Split a `poll_hash(32) ++ voter_be(8)` key into its parts.
pub(crate) fn split_vote_key(key: &[u8]) -> Result<(TxHash, AccountId), LmdbError> {
    if key.len() != 40 {
        return Err(LmdbError::Serialization("vote key has unexpected length".into()));
    }
    let poll = TxHash::from_slice(&key[..32])
        .ok_or_else(|| LmdbError::Serialization("vote key poll hash".into()))?;
    let mut voter = [0u8; 8];
    voter.copy_from_slice(&key[32..]);
    Ok((poll, AccountId::from_be_bytes(voter)))
}

/// The smallest key strictly greater than every key starting with `prefix`,
/// or `None` when the prefix is all `0xff` (no upper bound).
pub(crate) fn increment_prefix(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut upper = prefix.to_vec();
    while let Some(last) = upper.last_mut() {
        if *last == u8::MAX {
            upper.pop();
        } else {
            *last += 1;
            return Some(upper);
        }
    }
    None
}

/// Collect every `(key, value)` pair whose key starts with `prefix`, in key order.
pub(crate) fn scan_prefix(
    db: &Database<Bytes, Bytes>,
    txn: &RoTxn,
    prefix: &[u8],
) -> Result<Vec<(Vec<u8>, Vec<u8>)>, LmdbError> {
    let upper = increment_prefix(prefix);
    let bounds: (Bound<&[u8]>, Bound<&[u8]>) = match &upper {
        Some(upper) => (Bound::Included(prefix), Bound::Excluded(upper.as_slice())),
        None => (Bound::Included(prefix), Bound::Unbounded),
    };
    let mut results = Vec::new();
    for result in db.range(txn, &bounds)? {
        let (key, val) = result?;
        results.push((key.to_vec(), val.to_vec()));
    }
    Ok(results)
}
