use std::collections::{BTreeMap, BTreeSet};

use freezer_core::error::FreezerError;
use freezer_core::types::AccountId;
use freezer_crypto::{allowlist_leaf, verify_merkle_proof, MerkleHash};
use serde::{Deserialize, Serialize};
use tracing::info;

pub type TokenId = u64;

// ── Tiers ─────────────────────────────────────────────────────────────────────

/// Fungible edition with a hard supply cap, minted by the owner in batches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tier {
    pub max_supply: u64,
    pub minted: u64,
    pub holders: Vec<(AccountId, u64)>,
}

impl Tier {
    fn credit(&mut self, to: AccountId, amount: u64) {
        match self.holders.iter_mut().find(|(holder, _)| *holder == to) {
            Some((_, held)) => *held += amount,
            None => self.holders.push((to, amount)),
        }
        self.minted += amount;
    }

    pub fn balance_of(&self, account: &AccountId) -> u64 {
        self.holders
            .iter()
            .find(|(holder, _)| holder == account)
            .map(|(_, held)| *held)
            .unwrap_or(0)
    }
}

/// Parallel recipient / tier / amount lists for `mint_batch`.
#[derive(Clone, Debug, Default)]
pub struct BatchMintRequest {
    recipients: Vec<AccountId>,
    tier_ids: Vec<u64>,
    amounts: Vec<u64>,
}

impl BatchMintRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recipients(mut self, recipients: impl IntoIterator<Item = AccountId>) -> Self {
        self.recipients = recipients.into_iter().collect();
        self
    }

    pub fn tier_ids(mut self, tier_ids: impl IntoIterator<Item = u64>) -> Self {
        self.tier_ids = tier_ids.into_iter().collect();
        self
    }

    pub fn amounts(mut self, amounts: impl IntoIterator<Item = u64>) -> Self {
        self.amounts = amounts.into_iter().collect();
        self
    }

    /// Append one aligned entry.
    pub fn entry(mut self, recipient: AccountId, tier_id: u64, amount: u64) -> Self {
        self.recipients.push(recipient);
        self.tier_ids.push(tier_id);
        self.amounts.push(amount);
        self
    }

    fn validate(&self) -> Result<(), FreezerError> {
        FreezerError::check_lengths("recipients", self.recipients.len(), "tier_ids", self.tier_ids.len())?;
        FreezerError::check_lengths("recipients", self.recipients.len(), "amounts", self.amounts.len())
    }
}

// ── FoundersCollection ────────────────────────────────────────────────────────

/// Founders collectibles: one allow-listed token per account, plus owner-minted
/// tiered editions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundersCollection {
    pub name: String,
    pub symbol: String,
    pub base_uri: String,
    pub merkle_root: MerkleHash,
    pub owner: AccountId,
    /// Index = token id.
    token_owners: Vec<AccountId>,
    claimed: BTreeSet<AccountId>,
    tiers: BTreeMap<u64, Tier>,
}

impl FoundersCollection {
    pub fn new(
        name: impl Into<String>,
        symbol: impl Into<String>,
        base_uri: impl Into<String>,
        merkle_root: MerkleHash,
        owner: AccountId,
    ) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            base_uri: base_uri.into(),
            merkle_root,
            owner,
            token_owners: Vec::new(),
            claimed: BTreeSet::new(),
            tiers: BTreeMap::new(),
        }
    }

    /// Mint the caller's allow-listed token. Each account mints at most once.
    pub fn mint(&mut self, caller: &AccountId, proof: &[MerkleHash]) -> Result<TokenId, FreezerError> {
        if self.claimed.contains(caller)
            || !verify_merkle_proof(&self.merkle_root, &allowlist_leaf(caller), proof)
        {
            return Err(FreezerError::NotEligibleToMint);
        }
        let id = self.token_owners.len() as TokenId;
        self.token_owners.push(*caller);
        self.claimed.insert(*caller);
        info!(account = %caller, token_id = id, "founders token minted");
        Ok(id)
    }

    pub fn owner_of(&self, id: TokenId) -> Option<AccountId> {
        self.token_owners.get(id as usize).copied()
    }

    pub fn balance_of(&self, account: &AccountId) -> u64 {
        self.token_owners.iter().filter(|o| *o == account).count() as u64
    }

    pub fn token_uri(&self, id: TokenId) -> Option<String> {
        self.owner_of(id).map(|_| format!("{}{}", self.base_uri, id))
    }

    pub fn minted(&self, account: &AccountId) -> bool {
        self.claimed.contains(account)
    }

    pub fn total_supply(&self) -> u64 {
        self.token_owners.len() as u64
    }

    pub fn token_of_owner_by_index(&self, owner: &AccountId, index: usize) -> Option<TokenId> {
        self.token_owners
            .iter()
            .enumerate()
            .filter(|(_, o)| *o == owner)
            .nth(index)
            .map(|(id, _)| id as TokenId)
    }

    // ── Tiers ─────────────────────────────────────────────────────────────────

    pub fn add_tier(&mut self, caller: &AccountId, tier_id: u64, max_supply: u64) -> Result<(), FreezerError> {
        self.ensure_owner(caller)?;
        if self.tiers.contains_key(&tier_id) {
            return Err(FreezerError::InvalidParams(format!("tier {tier_id} already exists")));
        }
        self.tiers.insert(tier_id, Tier { max_supply, ..Default::default() });
        Ok(())
    }

    pub fn tier(&self, tier_id: u64) -> Option<&Tier> {
        self.tiers.get(&tier_id)
    }

    /// Owner-only batch mint. The whole batch is validated (lengths, known
    /// tiers, supply caps) before anything is minted.
    pub fn mint_batch(&mut self, caller: &AccountId, request: BatchMintRequest) -> Result<u64, FreezerError> {
        self.ensure_owner(caller)?;
        request.validate()?;

        let mut requested: BTreeMap<u64, u64> = BTreeMap::new();
        for (tier_id, amount) in request.tier_ids.iter().zip(&request.amounts) {
            let total = requested.entry(*tier_id).or_insert(0);
            *total = total.checked_add(*amount).ok_or(FreezerError::ArithmeticOverflow)?;
        }
        for (tier_id, amount) in &requested {
            let tier = self.tiers.get(tier_id).ok_or(FreezerError::UnknownTier(*tier_id))?;
            let after = tier.minted.checked_add(*amount).ok_or(FreezerError::ArithmeticOverflow)?;
            if after > tier.max_supply {
                return Err(FreezerError::TierSupplyExceeded {
                    tier: *tier_id,
                    max: tier.max_supply,
                    requested: after,
                });
            }
        }

        let mut minted = 0u64;
        for ((to, tier_id), amount) in request.recipients.iter().zip(&request.tier_ids).zip(&request.amounts) {
            if let Some(tier) = self.tiers.get_mut(tier_id) {
                tier.credit(*to, *amount);
                minted += amount;
            }
        }
        info!(entries = request.recipients.len(), minted, "tier batch minted");
        Ok(minted)
    }

    fn ensure_owner(&self, caller: &AccountId) -> Result<(), FreezerError> {
        if *caller == self.owner {
            Ok(())
        } else {
            Err(FreezerError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freezer_crypto::{account_id_from_seed, merkle_proof, merkle_root};

    struct Allowlist {
        accounts: Vec<AccountId>,
        leaves: Vec<MerkleHash>,
    }

    impl Allowlist {
        fn new(n: u8) -> Self {
            let accounts: Vec<AccountId> = (0..n).map(|i| account_id_from_seed(&[i])).collect();
            let leaves = accounts.iter().map(allowlist_leaf).collect();
            Self { accounts, leaves }
        }

        fn proof(&self, i: usize) -> Vec<MerkleHash> {
            merkle_proof(&self.leaves, i).unwrap()
        }
    }

    fn owner() -> AccountId {
        account_id_from_seed(b"collection-owner")
    }

    fn collection(list: &Allowlist) -> FoundersCollection {
        FoundersCollection::new(
            "Founders",
            "FNDR",
            "https://example.com/",
            merkle_root(&list.leaves),
            owner(),
        )
    }

    #[test]
    fn eligible_account_mints_token_zero() {
        let list = Allowlist::new(6);
        let mut c = collection(&list);
        let first = list.accounts[0];

        assert_eq!(c.mint(&first, &list.proof(0)).unwrap(), 0);
        assert_eq!(c.balance_of(&first), 1);
        assert_eq!(c.owner_of(0), Some(first));
        assert_eq!(c.token_uri(0).as_deref(), Some("https://example.com/0"));
        assert!(c.minted(&first));
        assert_eq!(c.token_of_owner_by_index(&first, 0), Some(0));
        assert_eq!(c.token_uri(1), None);
    }

    #[test]
    fn cannot_mint_twice_or_with_foreign_proof() {
        let list = Allowlist::new(6);
        let mut c = collection(&list);
        let first = list.accounts[0];
        c.mint(&first, &list.proof(0)).unwrap();
        assert_eq!(c.mint(&first, &list.proof(0)).unwrap_err(), FreezerError::NotEligibleToMint);

        let second = list.accounts[1];
        assert_eq!(c.mint(&second, &list.proof(0)).unwrap_err(), FreezerError::NotEligibleToMint);
        let outsider = account_id_from_seed(b"outsider");
        assert_eq!(c.mint(&outsider, &list.proof(2)).unwrap_err(), FreezerError::NotEligibleToMint);
    }

    #[test]
    fn sequential_ids_across_accounts() {
        let list = Allowlist::new(5);
        let mut c = collection(&list);
        for i in [3usize, 1, 4] {
            c.mint(&list.accounts[i], &list.proof(i)).unwrap();
        }
        assert_eq!(c.owner_of(1), Some(list.accounts[1]));
        assert_eq!(c.token_of_owner_by_index(&list.accounts[4], 0), Some(2));
        assert_eq!(c.total_supply(), 3);
    }

    #[test]
    fn batch_mint_checks_everything_first() {
        let list = Allowlist::new(2);
        let mut c = collection(&list);
        let (a, b) = (list.accounts[0], list.accounts[1]);
        c.add_tier(&owner(), 1, 10).unwrap();
        c.add_tier(&owner(), 2, 3).unwrap();

        let uneven = BatchMintRequest::new().recipients([a, b]).tier_ids([1]).amounts([1, 1]);
        assert!(matches!(
            c.mint_batch(&owner(), uneven).unwrap_err(),
            FreezerError::LengthMismatch { left: "recipients", left_len: 2, right: "tier_ids", right_len: 1 }
        ));

        let unknown = BatchMintRequest::new().entry(a, 1, 2).entry(b, 9, 1);
        assert_eq!(c.mint_batch(&owner(), unknown).unwrap_err(), FreezerError::UnknownTier(9));

        let over = BatchMintRequest::new().entry(a, 2, 2).entry(b, 2, 2);
        assert_eq!(
            c.mint_batch(&owner(), over).unwrap_err(),
            FreezerError::TierSupplyExceeded { tier: 2, max: 3, requested: 4 }
        );
        assert_eq!(c.tier(1).unwrap().minted, 0);
        assert_eq!(c.tier(2).unwrap().minted, 0);

        let ok = BatchMintRequest::new().entry(a, 1, 4).entry(b, 2, 3).entry(a, 1, 1);
        assert_eq!(c.mint_batch(&owner(), ok).unwrap(), 8);
        assert_eq!(c.tier(1).unwrap().balance_of(&a), 5);
        assert_eq!(c.tier(2).unwrap().balance_of(&b), 3);
    }

    #[test]
    fn only_owner_manages_tiers() {
        let list = Allowlist::new(2);
        let mut c = collection(&list);
        let stranger = list.accounts[0];
        assert_eq!(c.add_tier(&stranger, 1, 10).unwrap_err(), FreezerError::Unauthorized);
        c.add_tier(&owner(), 1, 10).unwrap();
        assert!(matches!(c.add_tier(&owner(), 1, 5).unwrap_err(), FreezerError::InvalidParams(_)));
        let req = BatchMintRequest::new().entry(stranger, 1, 1);
        assert_eq!(c.mint_batch(&stranger, req).unwrap_err(), FreezerError::Unauthorized);
    }

    #[test]
    fn collection_survives_json() {
        let list = Allowlist::new(3);
        let mut c = collection(&list);
        c.mint(&list.accounts[2], &list.proof(2)).unwrap();
        c.add_tier(&owner(), 7, 1).unwrap();
        let json = serde_json::to_string(&c).unwrap();
        let back: FoundersCollection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
    }
}
