// Path: crates/types/src/tx/mod.rs

//! The closed transaction union and its common header.
//!
//! Every on-chain transaction serializes as `(type code, fields…)` through
//! the canonical codec; the SCALE enum index *is* the type code and the set
//! is closed: new variants are appended, never inserted.

mod amount;

pub use amount::TokenAmount;

use crate::error::{CoreError, TxError};
use crate::identity::{Address, PublicKey, TxHash};
use crate::push::{Endorsement, PushNote};
use parity_scale_codec::{Decode, Encode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The highest assigned transaction type code.
pub const MAX_TYPE_CODE: u8 = 17;

/// Fields shared by every transaction variant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default, Encode, Decode)]
pub struct TxCommon {
    /// The sender's account nonce. Must be strictly positive.
    pub nonce: u64,
    /// The fee attached to the transaction.
    pub fee: TokenAmount,
    /// The value moved by the transaction, if any.
    pub value: TokenAmount,
    /// The sender's signature over the canonical encoding with this field cleared.
    pub sig: Vec<u8>,
    /// Creation time, unix seconds.
    pub timestamp: u64,
    /// The sender's Ed25519 public key. The pool identity (address) derives from it.
    pub sender_pub_key: PublicKey,
}

/// The closed union of on-chain transactions.
///
/// Codec indices are load-bearing: they are the wire type codes and must
/// never be renumbered.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Encode, Decode)]
pub enum Transaction {
    /// Transfers coins between accounts.
    #[codec(index = 0)]
    CoinTransfer {
        /// Common header.
        common: TxCommon,
        /// Recipient address.
        to: Address,
    },
    /// Purchases a validator ticket.
    #[codec(index = 1)]
    ValidatorTicket {
        /// Common header.
        common: TxCommon,
        /// Optional delegate that operates the ticket.
        delegate: Option<PublicKey>,
    },
    /// Purchases a host ticket, registering the host's BLS key.
    #[codec(index = 2)]
    HostTicket {
        /// Common header.
        common: TxCommon,
        /// Optional delegate that operates the ticket.
        delegate: Option<PublicKey>,
        /// The compressed BLS12-381 public key used for endorsements.
        bls_pub_key: Vec<u8>,
    },
    /// Unbonds a host ticket.
    #[codec(index = 3)]
    HostTicketUnbond {
        /// Common header.
        common: TxCommon,
        /// Hash of the ticket being unbonded.
        ticket_hash: [u8; 32],
    },
    /// Updates a delegate's commission rate.
    #[codec(index = 4)]
    CommissionUpdate {
        /// Common header.
        common: TxCommon,
        /// The new commission percentage as a decimal string.
        commission: TokenAmount,
    },
    /// Creates a repository.
    #[codec(index = 5)]
    RepoCreate {
        /// Common header.
        common: TxCommon,
        /// Repository name.
        name: String,
        /// Canonical JSON repository configuration.
        config: Vec<u8>,
    },
    /// Registers a push key.
    #[codec(index = 6)]
    PushKeyRegister {
        /// Common header.
        common: TxCommon,
        /// The Ed25519 key being registered for pushing.
        pub_key: PublicKey,
        /// Repository scopes the key may push to. Empty means unscoped.
        scopes: Vec<String>,
        /// Maximum fee the key may spend per push. Zero means uncapped.
        fee_cap: TokenAmount,
    },
    /// Updates a push key's scopes or fee cap.
    #[codec(index = 7)]
    PushKeyUpdate {
        /// Common header.
        common: TxCommon,
        /// The push key being updated.
        push_key_id: String,
        /// Replacement scope list.
        scopes: Vec<String>,
        /// Replacement fee cap.
        fee_cap: TokenAmount,
    },
    /// Deletes a push key.
    #[codec(index = 8)]
    PushKeyDelete {
        /// Common header.
        common: TxCommon,
        /// The push key being removed.
        push_key_id: String,
    },
    /// Registers a namespace.
    #[codec(index = 9)]
    NamespaceRegister {
        /// Common header.
        common: TxCommon,
        /// Namespace name.
        name: String,
        /// Domain → target mapping.
        domains: BTreeMap<String, String>,
    },
    /// Updates a namespace's domain mapping.
    #[codec(index = 10)]
    NamespaceDomainUpdate {
        /// Common header.
        common: TxCommon,
        /// Namespace name.
        name: String,
        /// Domains to add or replace. An empty target deletes the domain.
        domains: BTreeMap<String, String>,
    },
    /// Proposes adding or replacing repository owners.
    #[codec(index = 11)]
    ProposalUpsertOwner {
        /// Common header.
        common: TxCommon,
        /// Target repository.
        repo: String,
        /// Proposal identifier, unique within the repository.
        proposal_id: String,
        /// Addresses to add as owners.
        addresses: Vec<Address>,
        /// Whether the new owners receive veto rights.
        veto: bool,
    },
    /// Proposes a repository configuration update.
    #[codec(index = 12)]
    ProposalUpdate {
        /// Common header.
        common: TxCommon,
        /// Target repository.
        repo: String,
        /// Proposal identifier, unique within the repository.
        proposal_id: String,
        /// Canonical JSON configuration payload.
        config: Vec<u8>,
    },
    /// Votes on a repository proposal.
    #[codec(index = 13)]
    ProposalVote {
        /// Common header.
        common: TxCommon,
        /// Target repository.
        repo: String,
        /// Proposal being voted on.
        proposal_id: String,
        /// The vote: 1 yes, 0 no, -1 no-with-veto, -2 abstain.
        vote: i8,
    },
    /// Deposits fees into a proposal.
    #[codec(index = 14)]
    ProposalSendFee {
        /// Common header.
        common: TxCommon,
        /// Target repository.
        repo: String,
        /// Proposal receiving the deposit.
        proposal_id: String,
    },
    /// Proposes registering push keys as repository contributors.
    #[codec(index = 15)]
    ProposalRegisterPushKey {
        /// Common header.
        common: TxCommon,
        /// Target repository.
        repo: String,
        /// Proposal identifier, unique within the repository.
        proposal_id: String,
        /// Push keys to register.
        push_key_ids: Vec<String>,
        /// Policy scopes granted to the keys.
        scopes: Vec<String>,
    },
    /// Opens a merge request proposal.
    #[codec(index = 16)]
    ProposalMergeRequest {
        /// Common header.
        common: TxCommon,
        /// Target repository.
        repo: String,
        /// Proposal identifier, unique within the repository.
        proposal_id: String,
        /// Base branch name.
        base: String,
        /// Base branch hash.
        base_hash: String,
        /// Target branch name.
        target: String,
        /// Target branch hash.
        target_hash: String,
    },
    /// The aggregated reference-update transaction assembled from a push
    /// note and a quorum of endorsements.
    #[codec(index = 17)]
    Push {
        /// Common header. The nonce mirrors the note's first pushed
        /// reference so sender ordering in the pool stays meaningful.
        common: TxCommon,
        /// The endorsed push note.
        note: PushNote,
        /// Compacted endorsements; only index 0 retains its references.
        endorsements: Vec<Endorsement>,
        /// The aggregated BLS signature over the common endorsement digest.
        agg_sig: Vec<u8>,
    },
}

impl Transaction {
    /// Returns the common header.
    pub fn common(&self) -> &TxCommon {
        match self {
            Self::CoinTransfer { common, .. }
            | Self::ValidatorTicket { common, .. }
            | Self::HostTicket { common, .. }
            | Self::HostTicketUnbond { common, .. }
            | Self::CommissionUpdate { common, .. }
            | Self::RepoCreate { common, .. }
            | Self::PushKeyRegister { common, .. }
            | Self::PushKeyUpdate { common, .. }
            | Self::PushKeyDelete { common, .. }
            | Self::NamespaceRegister { common, .. }
            | Self::NamespaceDomainUpdate { common, .. }
            | Self::ProposalUpsertOwner { common, .. }
            | Self::ProposalUpdate { common, .. }
            | Self::ProposalVote { common, .. }
            | Self::ProposalSendFee { common, .. }
            | Self::ProposalRegisterPushKey { common, .. }
            | Self::ProposalMergeRequest { common, .. }
            | Self::Push { common, .. } => common,
        }
    }

    /// Returns the common header mutably.
    pub fn common_mut(&mut self) -> &mut TxCommon {
        match self {
            Self::CoinTransfer { common, .. }
            | Self::ValidatorTicket { common, .. }
            | Self::HostTicket { common, .. }
            | Self::HostTicketUnbond { common, .. }
            | Self::CommissionUpdate { common, .. }
            | Self::RepoCreate { common, .. }
            | Self::PushKeyRegister { common, .. }
            | Self::PushKeyUpdate { common, .. }
            | Self::PushKeyDelete { common, .. }
            | Self::NamespaceRegister { common, .. }
            | Self::NamespaceDomainUpdate { common, .. }
            | Self::ProposalUpsertOwner { common, .. }
            | Self::ProposalUpdate { common, .. }
            | Self::ProposalVote { common, .. }
            | Self::ProposalSendFee { common, .. }
            | Self::ProposalRegisterPushKey { common, .. }
            | Self::ProposalMergeRequest { common, .. }
            | Self::Push { common, .. } => common,
        }
    }

    /// Returns the wire type code (the SCALE variant index).
    pub fn type_code(&self) -> u8 {
        match self {
            Self::CoinTransfer { .. } => 0,
            Self::ValidatorTicket { .. } => 1,
            Self::HostTicket { .. } => 2,
            Self::HostTicketUnbond { .. } => 3,
            Self::CommissionUpdate { .. } => 4,
            Self::RepoCreate { .. } => 5,
            Self::PushKeyRegister { .. } => 6,
            Self::PushKeyUpdate { .. } => 7,
            Self::PushKeyDelete { .. } => 8,
            Self::NamespaceRegister { .. } => 9,
            Self::NamespaceDomainUpdate { .. } => 10,
            Self::ProposalUpsertOwner { .. } => 11,
            Self::ProposalUpdate { .. } => 12,
            Self::ProposalVote { .. } => 13,
            Self::ProposalSendFee { .. } => 14,
            Self::ProposalRegisterPushKey { .. } => 15,
            Self::ProposalMergeRequest { .. } => 16,
            Self::Push { .. } => 17,
        }
    }

    /// Serializes to the canonical wire form.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TxError> {
        Ok(crate::codec::to_bytes_canonical(self))
    }

    /// Decodes from the canonical wire form.
    ///
    /// An out-of-range leading type code is reported as [`TxError::UnknownType`]
    /// rather than a generic decode failure so callers can distinguish a
    /// future protocol version from corruption.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TxError> {
        match bytes.first() {
            None => return Err(TxError::BadEncoding("empty transaction bytes".into())),
            Some(&code) if code > MAX_TYPE_CODE => return Err(TxError::UnknownType(code)),
            Some(_) => {}
        }
        crate::codec::from_bytes_canonical(bytes).map_err(TxError::BadEncoding)
    }

    /// The canonical byte string the sender signs: the wire form with the
    /// signature field cleared.
    pub fn sign_bytes(&self) -> Result<Vec<u8>, TxError> {
        let mut unsigned = self.clone();
        unsigned.common_mut().sig = vec![];
        unsigned.to_bytes()
    }

    /// The canonical 32-byte transaction hash.
    pub fn hash(&self) -> Result<TxHash, TxError> {
        let mut unsigned = self.clone();
        unsigned.common_mut().sig = vec![];
        crate::codec::sha256_canonical(&unsigned).map_err(|e: CoreError| TxError::from(e))
    }

    /// The sender's pool identity.
    pub fn sender_address(&self) -> Result<Address, TxError> {
        self.common().sender_pub_key.to_address().map_err(TxError::from)
    }

    /// Serialized size in bytes.
    pub fn size(&self) -> Result<u64, TxError> {
        Ok(self.to_bytes()?.len() as u64)
    }

    /// Economic size: the serialized size excluding the fee field, so a fee
    /// bump does not change the denominator of the fee rate.
    pub fn economic_size(&self) -> Result<u64, TxError> {
        let total = self.to_bytes()?.len();
        let fee_len = self.common().fee.encoded_len();
        Ok(total.saturating_sub(fee_len) as u64)
    }

    /// Fee per economic byte.
    pub fn fee_rate(&self) -> Result<Decimal, TxError> {
        let size = self.economic_size()?;
        if size == 0 {
            return Err(TxError::Invalid("zero economic size".into()));
        }
        Ok(self.common().fee.decimal()? / Decimal::from(size))
    }

    /// Returns `(repo, proposal_id)` if this is a repo-proposal transaction.
    pub fn proposal_key(&self) -> Option<(&str, &str)> {
        match self {
            Self::ProposalUpsertOwner {
                repo, proposal_id, ..
            }
            | Self::ProposalUpdate {
                repo, proposal_id, ..
            }
            | Self::ProposalVote {
                repo, proposal_id, ..
            }
            | Self::ProposalSendFee {
                repo, proposal_id, ..
            }
            | Self::ProposalRegisterPushKey {
                repo, proposal_id, ..
            }
            | Self::ProposalMergeRequest {
                repo, proposal_id, ..
            } => Some((repo.as_str(), proposal_id.as_str())),
            _ => None,
        }
    }

    /// Returns true for validator-ticket purchases, which are capped per block.
    pub fn is_validator_ticket(&self) -> bool {
        matches!(self, Self::ValidatorTicket { .. })
    }

    /// Returns the embedded push note's ID if this is a push transaction.
    pub fn push_note_id(&self) -> Option<crate::Hash32> {
        match self {
            Self::Push { note, .. } => note.id().ok(),
            _ => None,
        }
    }

    /// Structural validation: everything that can be checked without chain
    /// state or cryptography.
    pub fn validate_structure(&self) -> Result<(), TxError> {
        let common = self.common();
        if common.nonce == 0 {
            return Err(TxError::Invalid("nonce must be greater than zero".into()));
        }
        if common.timestamp == 0 {
            return Err(TxError::Invalid("timestamp is required".into()));
        }
        if common.sig.is_empty() {
            return Err(TxError::Invalid("signature is required".into()));
        }
        common.fee.decimal()?;
        common.value.decimal()?;
        if let Self::Push {
            note, endorsements, ..
        } = self
        {
            if note.references.is_empty() {
                return Err(TxError::Invalid("push note has no references".into()));
            }
            if endorsements.is_empty() {
                return Err(TxError::Invalid("push transaction has no endorsements".into()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::push::{EndorsedReference, PushedReference};

    fn common(nonce: u64, fee: &str) -> TxCommon {
        TxCommon {
            nonce,
            fee: TokenAmount::from(fee),
            value: TokenAmount::zero(),
            sig: vec![1, 2, 3],
            timestamp: 1_700_000_000,
            sender_pub_key: PublicKey([5u8; 32]),
        }
    }

    fn sample_transactions() -> Vec<Transaction> {
        let note = PushNote {
            repo_name: "repo1".into(),
            namespace: None,
            pusher_key_id: "gpkXYZ".into(),
            pusher_pub_key: PublicKey([5u8; 32]),
            timestamp: 1_700_000_000,
            size: 64,
            references: vec![PushedReference {
                name: "refs/heads/master".into(),
                old_hash: "0".repeat(40),
                new_hash: "a".repeat(40),
                nonce: 1,
                fee: TokenAmount::from("0.1"),
                value: TokenAmount::zero(),
                merge_proposal_id: String::new(),
                objects: vec!["b".repeat(40)],
                push_sig: vec![9; 64],
            }],
            sig: vec![7; 64],
        };
        let endorsement = Endorsement {
            note_id: note.id().unwrap().to_vec(),
            endorser_pub_key: PublicKey([6u8; 32]),
            references: vec![EndorsedReference {
                old_hash: "0".repeat(40),
            }],
            sig: vec![8; 48],
        };
        vec![
            Transaction::CoinTransfer {
                common: common(1, "0.1"),
                to: Address("gmAbc".into()),
            },
            Transaction::ValidatorTicket {
                common: common(2, "1"),
                delegate: None,
            },
            Transaction::HostTicket {
                common: common(3, "1"),
                delegate: Some(PublicKey([1u8; 32])),
                bls_pub_key: vec![2; 96],
            },
            Transaction::HostTicketUnbond {
                common: common(4, "0"),
                ticket_hash: [3u8; 32],
            },
            Transaction::CommissionUpdate {
                common: common(5, "0"),
                commission: TokenAmount::from("10.5"),
            },
            Transaction::RepoCreate {
                common: common(6, "0.5"),
                name: "repo1".into(),
                config: b"{}".to_vec(),
            },
            Transaction::PushKeyRegister {
                common: common(7, "0.2"),
                pub_key: PublicKey([4u8; 32]),
                scopes: vec!["repo1".into()],
                fee_cap: TokenAmount::zero(),
            },
            Transaction::PushKeyUpdate {
                common: common(8, "0.2"),
                push_key_id: "gpkXYZ".into(),
                scopes: vec![],
                fee_cap: TokenAmount::from("5"),
            },
            Transaction::PushKeyDelete {
                common: common(9, "0.2"),
                push_key_id: "gpkXYZ".into(),
            },
            Transaction::NamespaceRegister {
                common: common(10, "2"),
                name: "ns1".into(),
                domains: [("repo".to_string(), "r/repo1".to_string())].into(),
            },
            Transaction::NamespaceDomainUpdate {
                common: common(11, "0.1"),
                name: "ns1".into(),
                domains: BTreeMap::new(),
            },
            Transaction::ProposalUpsertOwner {
                common: common(12, "0.1"),
                repo: "repo1".into(),
                proposal_id: "1".into(),
                addresses: vec![Address("gmAbc".into())],
                veto: false,
            },
            Transaction::ProposalUpdate {
                common: common(13, "0.1"),
                repo: "repo1".into(),
                proposal_id: "2".into(),
                config: b"{}".to_vec(),
            },
            Transaction::ProposalVote {
                common: common(14, "0"),
                repo: "repo1".into(),
                proposal_id: "1".into(),
                vote: 1,
            },
            Transaction::ProposalSendFee {
                common: common(15, "1"),
                repo: "repo1".into(),
                proposal_id: "1".into(),
            },
            Transaction::ProposalRegisterPushKey {
                common: common(16, "0.1"),
                repo: "repo1".into(),
                proposal_id: "1".into(),
                push_key_ids: vec!["gpkXYZ".into()],
                scopes: vec![],
            },
            Transaction::ProposalMergeRequest {
                common: common(17, "0.1"),
                repo: "repo1".into(),
                proposal_id: "1".into(),
                base: "master".into(),
                base_hash: "c".repeat(40),
                target: "dev".into(),
                target_hash: "d".repeat(40),
            },
            Transaction::Push {
                common: common(1, "0.1"),
                note,
                endorsements: vec![endorsement],
                agg_sig: vec![1; 48],
            },
        ]
    }

    #[test]
    fn every_known_type_round_trips() {
        for tx in sample_transactions() {
            let bytes = tx.to_bytes().unwrap();
            assert_eq!(bytes[0], tx.type_code());
            let decoded = Transaction::from_bytes(&bytes).unwrap();
            assert_eq!(tx, decoded);
            assert_eq!(tx.hash().unwrap(), decoded.hash().unwrap());
        }
    }

    #[test]
    fn type_codes_are_dense_and_closed() {
        let codes: Vec<u8> = sample_transactions().iter().map(|t| t.type_code()).collect();
        for (i, code) in codes.iter().enumerate() {
            assert_eq!(*code as usize, i);
        }
        assert_eq!(*codes.last().unwrap(), MAX_TYPE_CODE);
    }

    #[test]
    fn unknown_type_code_is_distinguished() {
        let err = Transaction::from_bytes(&[99, 0, 0]).unwrap_err();
        assert!(matches!(err, TxError::UnknownType(99)));
    }

    #[test]
    fn hash_ignores_signature() {
        let mut tx = sample_transactions().remove(0);
        let h1 = tx.hash().unwrap();
        tx.common_mut().sig = vec![42; 64];
        assert_eq!(h1, tx.hash().unwrap());
    }

    #[test]
    fn economic_size_is_stable_under_fee_changes() {
        let mut tx = sample_transactions().remove(0);
        tx.common_mut().fee = TokenAmount::from("0.1");
        let size_low = tx.economic_size().unwrap();
        tx.common_mut().fee = TokenAmount::from("123456.789");
        let size_high = tx.economic_size().unwrap();
        assert_eq!(size_low, size_high);
    }

    #[test]
    fn fee_rate_orders_by_fee_for_same_shape() {
        let mut cheap = sample_transactions().remove(0);
        let mut dear = cheap.clone();
        cheap.common_mut().fee = TokenAmount::from("0.1");
        dear.common_mut().fee = TokenAmount::from("0.2");
        assert!(dear.fee_rate().unwrap() > cheap.fee_rate().unwrap());
    }

    #[test]
    fn structure_validation_rejects_zero_nonce() {
        let mut tx = sample_transactions().remove(0);
        tx.common_mut().nonce = 0;
        assert!(tx.validate_structure().is_err());
    }
}
