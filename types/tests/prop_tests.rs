use proptest::prelude::*;

use vigil_types::{AccountId, MinBalanceModel, Poll, PollStatus, TxHash, VotingModel};

fn poll_with(whitelist: Vec<AccountId>) -> Poll {
    Poll {
        key: TxHash::new([9u8; 32]),
        account: AccountId::new(1),
        created_height: 1,
        finish_height: 2,
        voting_model: VotingModel::None,
        holding_id: None,
        min_balance: 0,
        min_balance_model: MinBalanceModel::None,
        quorum: Some(1),
        whitelist,
        linked_hashes: Vec::new(),
        status: PollStatus::Pending,
        tally: 0,
    }
}

proptest! {
    /// TxHash ordering matches byte-wise ordering of the raw arrays.
    #[test]
    fn tx_hash_order_is_bytewise(
        a in prop::array::uniform32(0u8..),
        b in prop::array::uniform32(0u8..),
    ) {
        prop_assert_eq!(TxHash::new(a).cmp(&TxHash::new(b)), a.cmp(&b));
    }

    /// Big-endian account keys sort the same way as the numeric ids.
    #[test]
    fn account_key_order_matches_numeric(a in any::<u64>(), b in any::<u64>()) {
        let ka = AccountId::new(a).to_be_bytes();
        let kb = AccountId::new(b).to_be_bytes();
        prop_assert_eq!(ka.cmp(&kb), a.cmp(&b));
        prop_assert_eq!(AccountId::from_be_bytes(ka), AccountId::new(a));
    }

    /// TxHash bincode serialization roundtrip.
    #[test]
    fn tx_hash_bincode_roundtrip(bytes in prop::array::uniform32(0u8..)) {
        let hash = TxHash::new(bytes);
        let encoded = bincode::serialize(&hash).unwrap();
        let decoded: TxHash = bincode::deserialize(&encoded).unwrap();
        prop_assert_eq!(decoded, hash);
    }

    /// A sorted whitelist admits exactly its members.
    #[test]
    fn whitelist_admits_exactly_members(
        mut ids in prop::collection::vec(0u64..50, 1..10),
        probe in 0u64..50,
    ) {
        ids.sort_unstable();
        ids.dedup();
        let whitelist: Vec<AccountId> = ids.iter().copied().map(AccountId::new).collect();
        let poll = poll_with(whitelist);
        prop_assert_eq!(poll.admits(&AccountId::new(probe)), ids.contains(&probe));
    }
}
