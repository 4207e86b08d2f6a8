// This file is part of Gear.
//
// Copyright (C) 2025 Gear Technologies Inc.
// SPDX-License-Identifier: GPL-3.0-or-later WITH Classpath-exception-2.0
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use crate::Config;
use core::fmt;
use frame_support::{
    BoundedBTreeMap, BoundedVec, CloneNoBound, EqNoBound, PartialEqNoBound, RuntimeDebugNoBound,
};
use frame_system::pallet_prelude::BlockNumberFor;
use parity_scale_codec::{Decode, Encode, MaxEncodedLen};
use primitive_types::H256;
use scale_info::TypeInfo;
use sp_arithmetic::Perbill;
use sp_io::hashing::blake2_256;
use sp_runtime::RuntimeDebug;
use sp_std::vec::Vec;

/// Foreign chain identifier.
pub type ChainId = i64;

/// Outbound transaction sequence number on a foreign chain.
pub type Nonce = u64;

/// Digest identifying a ballot.
pub type BallotId = H256;

/// Identifier of a cross-chain event that consumes an outbound nonce.
pub type EventId = H256;

/// Length of a compressed secp256k1 public key.
pub const TSS_PUBKEY_LEN: usize = 33;

/// Compressed secp256k1 public key of a threshold-signature key.
#[derive(
    Clone,
    Copy,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Eq,
    derive_more::From,
    derive_more::AsRef,
    TypeInfo,
    Encode,
    Decode,
    MaxEncodedLen,
)]
pub struct TssPubkey([u8; TSS_PUBKEY_LEN]);

impl TssPubkey {
    pub fn to_bytes(self) -> [u8; TSS_PUBKEY_LEN] {
        self.0
    }
}

impl fmt::Debug for TssPubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Display for TssPubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen)]
pub enum NodeStatus {
    Active,
    Removed,
}

/// Why an observer was replaced in place.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen)]
pub enum ObserverUpdateReason {
    /// The operator's validator was slashed and tombstoned.
    Tombstoned,
    AdminUpdate,
}

/// Per-operator record. Never deleted, only marked as removed.
#[derive(CloneNoBound, PartialEqNoBound, EqNoBound, Encode, Decode, TypeInfo, RuntimeDebugNoBound)]
#[scale_info(skip_type_params(T))]
pub struct NodeAccount<T: Config> {
    pub operator: T::AccountId,
    /// Hot key allowed to vote on behalf of the operator.
    pub grantee: T::AccountId,
    pub grantee_pubkey: BoundedVec<u8, T::MaxGranteePubkeyLen>,
    pub status: NodeStatus,
    /// Set when the operator was swapped out by `update_observer`.
    pub replaced: Option<ObserverUpdateReason>,
}

#[derive(Clone, Copy, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen, RuntimeDebug)]
pub struct ObserverCount<BlockNumber> {
    pub count: u32,
    pub last_change_height: BlockNumber,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen)]
pub enum VoteType {
    Success,
    Failure,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen)]
pub enum BallotStatus {
    Pending,
    FinalizedSuccess,
    FinalizedFailed,
}

impl BallotStatus {
    pub fn is_finalized(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Discriminant of [`Observation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen)]
pub enum ObservationType {
    Inbound,
    Outbound,
    TssKeygen,
}

/// Deposit seen on a foreign chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen)]
pub struct InboundObservation {
    pub chain_id: ChainId,
    pub tx_hash: H256,
    pub log_index: u32,
    /// Hash of the decoded deposit (sender, receiver, amount, message).
    pub payload_hash: H256,
}

/// Outbound transaction seen mined on a foreign chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen)]
pub struct OutboundObservation {
    pub chain_id: ChainId,
    pub nonce: Nonce,
    pub tss: TssPubkey,
    pub tx_hash: H256,
}

/// Fact a ballot votes on. The encoding is the preimage of the ballot id,
/// so two observers reporting the same fact land on the same ballot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen)]
pub enum Observation<BlockNumber> {
    Inbound(InboundObservation),
    Outbound(OutboundObservation),
    TssKeygen {
        pubkey: TssPubkey,
        keygen_height: BlockNumber,
    },
}

impl<BlockNumber: Encode> Observation<BlockNumber> {
    pub fn observation_type(&self) -> ObservationType {
        match self {
            Self::Inbound(_) => ObservationType::Inbound,
            Self::Outbound(_) => ObservationType::Outbound,
            Self::TssKeygen { .. } => ObservationType::TssKeygen,
        }
    }

    pub fn ballot_id(&self) -> BallotId {
        (b"observer-ballot", self).using_encoded(blake2_256).into()
    }
}

#[derive(CloneNoBound, PartialEqNoBound, EqNoBound, Encode, Decode, TypeInfo, RuntimeDebugNoBound)]
#[scale_info(skip_type_params(T))]
pub struct Ballot<T: Config> {
    pub identifier: BallotId,
    pub observation: Observation<BlockNumberFor<T>>,
    /// Voters snapshotted at creation. Immutable afterwards.
    pub voter_list: BoundedVec<T::AccountId, T::MaxObservers>,
    /// Latest vote of each voter.
    pub votes: BoundedBTreeMap<T::AccountId, VoteType, T::MaxObservers>,
    pub threshold: Perbill,
    pub status: BallotStatus,
    pub created_at: BlockNumberFor<T>,
    pub finalized_at: Option<BlockNumberFor<T>>,
}

impl<T: Config> Ballot<T> {
    pub fn observation_type(&self) -> ObservationType {
        self.observation.observation_type()
    }

    pub fn is_voter(&self, who: &T::AccountId) -> bool {
        self.voter_list.contains(who)
    }

    /// Returns `(success, failure)` vote counts.
    pub fn counts(&self) -> (u32, u32) {
        self.votes
            .values()
            .fold((0, 0), |(yes, no), vote| match vote {
                VoteType::Success => (yes + 1, no),
                VoteType::Failure => (yes, no + 1),
            })
    }

    /// Status the current votes resolve to.
    pub fn tally(&self) -> BallotStatus {
        let (yes, no) = self.counts();
        tally(yes, no, self.voter_list.len() as u32, self.threshold)
    }
}

/// Resolves vote counts against a threshold.
///
/// Success once `yes / voters >= threshold`. Failure once success can no
/// longer be reached even if every remaining voter says yes, i.e.
/// `no / voters > 1 - threshold`. Pending otherwise, and always pending
/// for an empty voter list.
pub fn tally(yes: u32, no: u32, voters: u32, threshold: Perbill) -> BallotStatus {
    if voters == 0 {
        return BallotStatus::Pending;
    }

    let accuracy = Perbill::one().deconstruct() as u64;
    let threshold = threshold.deconstruct() as u64;
    let voters = voters as u64;

    if yes as u64 * accuracy >= threshold * voters {
        BallotStatus::FinalizedSuccess
    } else if no as u64 * accuracy > (accuracy - threshold) * voters {
        BallotStatus::FinalizedFailed
    } else {
        BallotStatus::Pending
    }
}

/// Ballot as exposed to clients: votes in voter snapshot order.
#[derive(Clone, Debug, PartialEq, Eq, Encode, Decode, TypeInfo)]
pub struct BallotInfo<AccountId, BlockNumber> {
    pub identifier: BallotId,
    pub observation: Observation<BlockNumber>,
    /// Every snapshotted voter with its vote, if any.
    pub votes: Vec<(AccountId, Option<VoteType>)>,
    pub threshold: Perbill,
    pub status: BallotStatus,
    pub created_at: BlockNumber,
    pub finalized_at: Option<BlockNumber>,
}

impl<T: Config> From<Ballot<T>> for BallotInfo<T::AccountId, BlockNumberFor<T>> {
    fn from(ballot: Ballot<T>) -> Self {
        let votes = ballot
            .voter_list
            .iter()
            .map(|voter| (voter.clone(), ballot.votes.get(voter).copied()))
            .collect();

        Self {
            identifier: ballot.identifier,
            observation: ballot.observation,
            votes,
            threshold: ballot.threshold,
            status: ballot.status,
            created_at: ballot.created_at,
            finalized_at: ballot.finalized_at,
        }
    }
}

/// Outcome of a single vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoteOutcome {
    pub ballot_id: BallotId,
    pub status: BallotStatus,
    pub created: bool,
    /// The vote moved the ballot into a terminal status.
    pub finalized_now: bool,
}

/// Activated threshold-signature key.
#[derive(CloneNoBound, PartialEqNoBound, EqNoBound, Encode, Decode, TypeInfo, RuntimeDebugNoBound)]
#[scale_info(skip_type_params(T))]
pub struct Tss<T: Config> {
    pub pubkey: TssPubkey,
    pub participants: BoundedVec<T::AccountId, T::MaxObservers>,
    pub keygen_height: BlockNumberFor<T>,
    /// Height at which the key became current.
    pub finalized_height: BlockNumberFor<T>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen)]
pub enum KeygenStatus {
    Pending,
    Success,
    Failed,
}

#[derive(CloneNoBound, PartialEqNoBound, EqNoBound, Encode, Decode, TypeInfo, RuntimeDebugNoBound)]
#[scale_info(skip_type_params(T))]
pub struct Keygen<T: Config> {
    pub participants: BoundedVec<T::AccountId, T::MaxObservers>,
    pub height: BlockNumberFor<T>,
    pub status: KeygenStatus,
    pub finalized_at: Option<BlockNumberFor<T>>,
}

/// Half-open window `[nonce_low, nonce_high)` of nonces handed out but not
/// yet confirmed for one (TSS, chain) pair.
#[derive(
    Clone, Copy, Default, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen,
)]
pub struct NonceWindow {
    pub nonce_low: Nonce,
    pub nonce_high: Nonce,
}

impl NonceWindow {
    pub fn empty_at(nonce: Nonce) -> Self {
        Self {
            nonce_low: nonce,
            nonce_high: nonce,
        }
    }

    pub fn contains(&self, nonce: Nonce) -> bool {
        self.nonce_low <= nonce && nonce < self.nonce_high
    }

    pub fn is_empty(&self) -> bool {
        self.nonce_low == self.nonce_high
    }
}

/// Event and key an allocated nonce was handed out for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen)]
pub struct NonceBinding {
    pub event: EventId,
    pub tss: TssPubkey,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen)]
pub struct ChainParams {
    pub is_supported: bool,
    /// Fraction of snapshotted voters required to finalize a ballot on this
    /// chain. Falls back to the pallet default if unset.
    pub ballot_threshold: Option<Perbill>,
}

/// Emergency switches for cross-chain traffic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen)]
pub struct CrosschainFlags {
    pub is_inbound_enabled: bool,
    pub is_outbound_enabled: bool,
}

impl Default for CrosschainFlags {
    fn default() -> Self {
        Self {
            is_inbound_enabled: true,
            is_outbound_enabled: true,
        }
    }
}

impl CrosschainFlags {
    /// Whether moving from `self` to `new` switches anything on.
    pub fn enables_any(&self, new: &Self) -> bool {
        (!self.is_inbound_enabled && new.is_inbound_enabled)
            || (!self.is_outbound_enabled && new.is_outbound_enabled)
    }
}

/// Consumer of finalized inbound observations.
#[impl_trait_for_tuples::impl_for_tuples(8)]
pub trait OnInboundFinalized {
    /// Called once, in the transaction that finalized the ballot with success.
    /// `event` is the ballot id and identifies the cross-chain event.
    fn on_inbound_finalized(event: EventId, observation: &InboundObservation);
}
