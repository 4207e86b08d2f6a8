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

//! # Observer Pallet
//!
//! State-machine core of a bridge to foreign chains.
//!
//! - [`Config`]
//! - [`Pallet`]
//!
//! ## Overview
//!
//! Off-chain observers watch foreign chains and vote on what they saw. The
//! pallet aggregates these votes into ballots with an immutable voter
//! snapshot and a super-majority threshold, finalizes each ballot exactly
//! once, and routes the outcome by observation type:
//!
//! - inbound deposits go to [`Config::OnInboundFinalized`];
//! - outbound transactions confirm their nonce in the nonce coordinator;
//! - keygen results activate a new threshold-signature (TSS) key.
//!
//! The pallet also owns the observer registry, the TSS key history and the
//! per-chain outbound nonce counters with their pending windows.
//!
//! Administrative calls are checked by [`Config::Authorization`]. Votes are
//! authorized by observer membership only, either directly by the operator
//! account or by its registered grantee key.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod authorization;
mod ballot;
mod internal;
mod nonces;
mod observers;
mod tss;

pub mod weights;

#[cfg(test)]
mod mock;

#[cfg(test)]
mod tests;

use frame_support::{pallet_prelude::*, traits::StorageVersion};
use sp_arithmetic::Perbill;
use sp_std::prelude::*;

pub use authorization::{AuthorizationGate, MessageKind, PolicyTier, TieredAccounts};
pub use internal::*;
pub use nonces::NonceAllocator;
pub use pallet::*;
pub use primitive_types::H256;
pub use weights::WeightInfo;

pub(crate) const LOG_TARGET: &str = "runtime::observer";

/// The current storage version.
const STORAGE_VERSION: StorageVersion = StorageVersion::new(0);

#[frame_support::pallet]
pub mod pallet {
    use super::*;
    use frame_system::pallet_prelude::*;

    #[pallet::config]
    pub trait Config: frame_system::Config {
        /// The overarching event type.
        type RuntimeEvent: From<Event<Self>> + IsType<<Self as frame_system::Config>::RuntimeEvent>;

        /// Policy check for administrative calls.
        type Authorization: AuthorizationGate<Self::AccountId>;

        /// Consumer of inbound observations that reached quorum.
        type OnInboundFinalized: OnInboundFinalized;

        /// Maximal amount of observers, also bounding ballot voter snapshots.
        #[pallet::constant]
        type MaxObservers: Get<u32>;

        /// Maximal length of a grantee public key.
        #[pallet::constant]
        type MaxGranteePubkeyLen: Get<u32>;

        /// Maximal amount of ballots indexed per creation height.
        #[pallet::constant]
        type MaxBallotsPerBlock: Get<u32>;

        /// Threshold for ballots on chains without explicit params.
        #[pallet::constant]
        type DefaultBallotThreshold: Get<Perbill>;

        /// Threshold for keygen ballots.
        #[pallet::constant]
        type KeygenBallotThreshold: Get<Perbill>;

        /// Weight information for extrinsics in this pallet.
        type WeightInfo: WeightInfo;
    }

    #[pallet::pallet]
    #[pallet::storage_version(STORAGE_VERSION)]
    #[pallet::without_storage_info]
    pub struct Pallet<T>(_);

    /// Active observers, in order of admission.
    #[pallet::storage]
    pub type ObserverSet<T: Config> =
        StorageValue<_, BoundedVec<T::AccountId, T::MaxObservers>, ValueQuery>;

    #[pallet::storage]
    pub type NodeAccounts<T: Config> =
        StorageMap<_, Blake2_128Concat, T::AccountId, NodeAccount<T>>;

    /// Grantee key to the operator it votes for.
    #[pallet::storage]
    pub type Grantees<T: Config> = StorageMap<_, Blake2_128Concat, T::AccountId, T::AccountId>;

    #[pallet::storage]
    pub type LastObserverCount<T: Config> = StorageValue<_, ObserverCount<BlockNumberFor<T>>>;

    #[pallet::storage]
    pub type Ballots<T: Config> = StorageMap<_, Identity, BallotId, Ballot<T>>;

    /// Ids of ballots created at a given height.
    #[pallet::storage]
    pub type BallotsByHeight<T: Config> = StorageMap<
        _,
        Twox64Concat,
        BlockNumberFor<T>,
        BoundedVec<BallotId, T::MaxBallotsPerBlock>,
        ValueQuery,
    >;

    #[pallet::storage]
    pub type CurrentTss<T: Config> = StorageValue<_, Tss<T>>;

    /// Every key ever activated, indexed by activation order.
    #[pallet::storage]
    pub type TssHistory<T: Config> = StorageMap<_, Twox64Concat, u32, Tss<T>>;

    #[pallet::storage]
    pub type TssHistoryLen<T> = StorageValue<_, u32, ValueQuery>;

    #[pallet::storage]
    pub type CurrentKeygen<T: Config> = StorageValue<_, Keygen<T>>;

    /// Next nonce to hand out per chain.
    #[pallet::storage]
    pub type ChainNonces<T> = StorageMap<_, Twox64Concat, ChainId, Nonce>;

    #[pallet::storage]
    pub type PendingNonces<T> =
        StorageDoubleMap<_, Blake2_128Concat, TssPubkey, Twox64Concat, ChainId, NonceWindow>;

    /// Nonces confirmed ahead of their window's low watermark.
    #[pallet::storage]
    pub type ConfirmedNonces<T> =
        StorageDoubleMap<_, Blake2_128Concat, (TssPubkey, ChainId), Twox64Concat, Nonce, ()>;

    #[pallet::storage]
    pub type NonceToEvent<T> =
        StorageDoubleMap<_, Twox64Concat, ChainId, Twox64Concat, Nonce, NonceBinding>;

    #[pallet::storage]
    pub type EventToNonce<T> =
        StorageDoubleMap<_, Twox64Concat, ChainId, Identity, EventId, Nonce>;

    #[pallet::storage]
    pub type ChainParamsOf<T> = StorageMap<_, Twox64Concat, ChainId, ChainParams>;

    #[pallet::storage]
    pub type Flags<T> = StorageValue<_, CrosschainFlags, ValueQuery>;

    #[pallet::event]
    #[pallet::generate_deposit(pub(super) fn deposit_event)]
    pub enum Event<T: Config> {
        /// Observer has been admitted to the active set.
        ObserverAdded {
            operator: T::AccountId,
            grantee: T::AccountId,
        },

        /// Observer has been removed from the active set.
        ObserverRemoved { operator: T::AccountId },

        /// Observer has been replaced in place.
        ObserverUpdated {
            old: T::AccountId,
            new: T::AccountId,
            reason: ObserverUpdateReason,
        },

        /// Operator rotated its grantee key.
        GranteeUpdated {
            operator: T::AccountId,
            grantee: T::AccountId,
        },

        BallotCreated {
            ballot_id: BallotId,
            observation_type: ObservationType,
        },

        VoteCast {
            ballot_id: BallotId,
            voter: T::AccountId,
            vote: VoteType,
        },

        /// Ballot reached a terminal status. Deposited exactly once per ballot.
        BallotFinalized {
            ballot_id: BallotId,
            observation_type: ObservationType,
            status: BallotStatus,
        },

        KeygenProposed {
            height: BlockNumberFor<T>,
            participants: u32,
        },

        KeygenCompleted {
            pubkey: TssPubkey,
            height: BlockNumberFor<T>,
        },

        KeygenFailed { height: BlockNumberFor<T> },

        /// Current TSS key changed.
        TssRotated {
            old: Option<TssPubkey>,
            new: TssPubkey,
            forced: bool,
        },

        /// Pending window of a rotated-out key has been dropped.
        PendingNoncesOrphaned {
            tss: TssPubkey,
            chain_id: ChainId,
            window: NonceWindow,
        },

        NonceAllocated {
            tss: TssPubkey,
            chain_id: ChainId,
            nonce: Nonce,
            event: EventId,
        },

        NonceConfirmed {
            tss: TssPubkey,
            chain_id: ChainId,
            nonce: Nonce,
            window: NonceWindow,
        },

        /// Outbound ballot finalized for a nonce that is not pending.
        NonceConfirmationFailed {
            tss: TssPubkey,
            chain_id: ChainId,
            nonce: Nonce,
            error: DispatchError,
        },

        ChainNoncesReset {
            chain_id: ChainId,
            tss: TssPubkey,
            window: NonceWindow,
        },

        /// Params of a chain have been set (`Some`) or removed (`None`).
        ChainParamsUpdated {
            chain_id: ChainId,
            params: Option<ChainParams>,
        },

        CrosschainFlagsUpdated { flags: CrosschainFlags },
    }

    // Observer pallet error.
    #[pallet::error]
    pub enum Error<T> {
        /// Caller is not allowed to submit this message by policy.
        Unauthorized,
        AlreadyObserver,
        NotObserver,
        /// Grantee key is registered for another operator.
        GranteeAlreadyInUse,
        /// Grantee key is an operator account.
        GranteeIsOperator,
        /// Operator account is registered as a grantee.
        OperatorIsGrantee,
        TooManyObservers,
        GranteePubkeyTooLong,
        /// Voter is not part of the ballot's voter snapshot.
        NotAuthorizedVoter,
        /// Ballot can't be created without voters.
        NoObserverSet,
        UnsupportedChain,
        InboundDisabled,
        OutboundDisabled,
        InvalidBallotThreshold,
        KeygenAlreadyPending,
        KeygenNotFound,
        /// Keygen ballot can't be opened for a keygen that isn't pending.
        KeygenNotPending,
        EmptyKeygenParticipants,
        DuplicateKeygenParticipant,
        /// Keygen height is in the past.
        InvalidKeygenHeight,
        TssNotFound,
        TssAlreadyCurrent,
        /// Nonces are only allocated for the current TSS key.
        TssNotCurrent,
        ChainNoncesNotFound,
        /// Nonce is already bound to another event on this chain.
        NonceAlreadyAllocated,
        /// Nonce is outside of the pending window or already confirmed.
        NonceNotPending,
        NonceOverflow,
        InvalidNonceRange,
        /// Stored state violates pallet invariants.
        ///
        /// **Must be unreachable.**
        CorruptedState,
    }

    #[pallet::hooks]
    impl<T: Config> Hooks<BlockNumberFor<T>> for Pallet<T> {
        fn integrity_test() {
            assert!(T::MaxObservers::get() > 0, "`MaxObservers` must be non-zero");
            assert!(
                !T::DefaultBallotThreshold::get().is_zero(),
                "`DefaultBallotThreshold` must be non-zero"
            );
            assert!(
                !T::KeygenBallotThreshold::get().is_zero(),
                "`KeygenBallotThreshold` must be non-zero"
            );
        }
    }

    #[pallet::call]
    impl<T: Config> Pallet<T> {
        /// Admits `operator` to the active observer set.
        ///
        /// A previously removed operator is reactivated with the given grantee.
        #[pallet::call_index(0)]
        #[pallet::weight(T::WeightInfo::add_observer())]
        pub fn add_observer(
            origin: OriginFor<T>,
            operator: T::AccountId,
            grantee: T::AccountId,
            grantee_pubkey: Vec<u8>,
        ) -> DispatchResult {
            Self::ensure_authorized(origin, MessageKind::AddObserver)?;
            Self::do_add_observer(operator, grantee, grantee_pubkey)
        }

        /// Removes `operator` from the active observer set.
        ///
        /// Open ballots keep their voter snapshot, so the removed operator can
        /// still vote on them.
        #[pallet::call_index(1)]
        #[pallet::weight(T::WeightInfo::remove_observer())]
        pub fn remove_observer(origin: OriginFor<T>, operator: T::AccountId) -> DispatchResult {
            Self::ensure_authorized(origin, MessageKind::RemoveObserver)?;
            Self::do_remove_observer(operator)
        }

        /// Replaces `old` with `new` at the same position of the observer set.
        #[pallet::call_index(2)]
        #[pallet::weight(T::WeightInfo::update_observer())]
        pub fn update_observer(
            origin: OriginFor<T>,
            old: T::AccountId,
            new: T::AccountId,
            reason: ObserverUpdateReason,
        ) -> DispatchResult {
            Self::ensure_authorized(origin, MessageKind::UpdateObserver)?;
            Self::do_update_observer(old, new, reason)
        }

        /// Rotates the caller's grantee key. Caller must be an active operator.
        #[pallet::call_index(3)]
        #[pallet::weight(T::WeightInfo::update_grantee())]
        pub fn update_grantee(
            origin: OriginFor<T>,
            grantee: T::AccountId,
            grantee_pubkey: Vec<u8>,
        ) -> DispatchResult {
            let operator = ensure_signed(origin)?;
            Self::do_update_grantee(operator, grantee, grantee_pubkey)
        }

        /// Attests an inbound deposit observed on a foreign chain.
        #[pallet::call_index(4)]
        #[pallet::weight(T::WeightInfo::vote_inbound())]
        pub fn vote_inbound(
            origin: OriginFor<T>,
            observation: InboundObservation,
        ) -> DispatchResult {
            let voter = Self::ensure_voter(origin)?;
            Self::do_vote_inbound(voter, observation).map(|_| ())
        }

        /// Reports the outcome of an outbound transaction mined on a foreign chain.
        #[pallet::call_index(5)]
        #[pallet::weight(T::WeightInfo::vote_outbound())]
        pub fn vote_outbound(
            origin: OriginFor<T>,
            observation: OutboundObservation,
            vote: VoteType,
        ) -> DispatchResult {
            let voter = Self::ensure_voter(origin)?;
            Self::do_vote_outbound(voter, observation, vote).map(|_| ())
        }

        /// Schedules a key generation ceremony among `participants` at `height`.
        #[pallet::call_index(6)]
        #[pallet::weight(T::WeightInfo::propose_keygen())]
        pub fn propose_keygen(
            origin: OriginFor<T>,
            participants: Vec<T::AccountId>,
            height: BlockNumberFor<T>,
        ) -> DispatchResult {
            Self::ensure_authorized(origin, MessageKind::ProposeKeygen)?;
            Self::do_propose_keygen(participants, height)
        }

        /// Votes on the result of the pending keygen.
        #[pallet::call_index(7)]
        #[pallet::weight(T::WeightInfo::vote_keygen())]
        pub fn vote_keygen(
            origin: OriginFor<T>,
            pubkey: TssPubkey,
            keygen_height: BlockNumberFor<T>,
            vote: VoteType,
        ) -> DispatchResult {
            let voter = Self::ensure_voter(origin)?;
            Self::do_vote_keygen(voter, pubkey, keygen_height, vote).map(|_| ())
        }

        /// Activates `pubkey` bypassing keygen, orphaning pending nonces of the
        /// previous key.
        #[pallet::call_index(8)]
        #[pallet::weight(T::WeightInfo::force_rotate())]
        pub fn force_rotate(
            origin: OriginFor<T>,
            pubkey: TssPubkey,
            participants: Vec<T::AccountId>,
        ) -> DispatchResult {
            Self::ensure_authorized(origin, MessageKind::ForceRotateTss)?;
            Self::do_force_rotate(pubkey, participants)
        }

        /// Hands out the next nonce of `chain_id` to `event`.
        #[pallet::call_index(9)]
        #[pallet::weight(T::WeightInfo::allocate_nonce())]
        pub fn allocate_nonce(
            origin: OriginFor<T>,
            tss: TssPubkey,
            chain_id: ChainId,
            event: EventId,
        ) -> DispatchResult {
            Self::ensure_authorized(origin, MessageKind::AllocateNonce)?;
            Self::do_allocate_nonce(tss, chain_id, event).map(|_| ())
        }

        /// Overwrites the nonce counter and the current key's pending window of
        /// `chain_id`.
        #[pallet::call_index(10)]
        #[pallet::weight(T::WeightInfo::reset_chain_nonces())]
        pub fn reset_chain_nonces(
            origin: OriginFor<T>,
            chain_id: ChainId,
            nonce_low: Nonce,
            nonce_high: Nonce,
        ) -> DispatchResult {
            Self::ensure_authorized(origin, MessageKind::ResetChainNonces)?;
            Self::do_reset_chain_nonces(chain_id, nonce_low, nonce_high)
        }

        #[pallet::call_index(11)]
        #[pallet::weight(T::WeightInfo::set_chain_params())]
        pub fn set_chain_params(
            origin: OriginFor<T>,
            chain_id: ChainId,
            params: ChainParams,
        ) -> DispatchResult {
            Self::ensure_authorized(origin, MessageKind::UpdateChainParams)?;

            ensure!(
                !params.ballot_threshold.is_some_and(|t| t.is_zero()),
                Error::<T>::InvalidBallotThreshold
            );

            ChainParamsOf::<T>::insert(chain_id, params);

            if params.is_supported && !ChainNonces::<T>::contains_key(chain_id) {
                ChainNonces::<T>::insert(chain_id, 0);
            }

            Self::deposit_event(Event::ChainParamsUpdated {
                chain_id,
                params: Some(params),
            });

            Ok(())
        }

        #[pallet::call_index(12)]
        #[pallet::weight(T::WeightInfo::remove_chain_params())]
        pub fn remove_chain_params(origin: OriginFor<T>, chain_id: ChainId) -> DispatchResult {
            Self::ensure_authorized(origin, MessageKind::UpdateChainParams)?;

            ensure!(
                ChainParamsOf::<T>::take(chain_id).is_some(),
                Error::<T>::UnsupportedChain
            );

            Self::deposit_event(Event::ChainParamsUpdated {
                chain_id,
                params: None,
            });

            Ok(())
        }

        /// Switches cross-chain traffic on or off.
        ///
        /// Disabling only needs the emergency tier, while switching anything
        /// on needs the operational one.
        #[pallet::call_index(13)]
        #[pallet::weight(T::WeightInfo::update_crosschain_flags())]
        pub fn update_crosschain_flags(
            origin: OriginFor<T>,
            flags: CrosschainFlags,
        ) -> DispatchResult {
            let kind = if Flags::<T>::get().enables_any(&flags) {
                MessageKind::EnableCrosschainFlags
            } else {
                MessageKind::DisableCrosschainFlags
            };
            Self::ensure_authorized(origin, kind)?;

            Flags::<T>::put(flags);

            Self::deposit_event(Event::CrosschainFlagsUpdated { flags });

            Ok(())
        }
    }

    impl<T: Config> Pallet<T> {
        fn ensure_authorized(origin: OriginFor<T>, kind: MessageKind) -> DispatchResult {
            let who = ensure_signed(origin)?;

            ensure!(
                T::Authorization::check_authorization(&who, kind),
                Error::<T>::Unauthorized
            );

            Ok(())
        }

        /// Resolves the signer of a vote to the operator it votes as.
        ///
        /// Operators always vote as themselves.
        fn ensure_voter(origin: OriginFor<T>) -> Result<T::AccountId, DispatchError> {
            let who = ensure_signed(origin)?;

            if NodeAccounts::<T>::contains_key(&who) {
                return Ok(who);
            }

            Ok(Grantees::<T>::get(&who).unwrap_or(who))
        }

        /// Threshold for ballots on `chain_id`, failing for unsupported chains.
        ///
        /// Chains without params are unsupported.
        pub(crate) fn ballot_threshold(chain_id: ChainId) -> Result<Perbill, Error<T>> {
            let params = ChainParamsOf::<T>::get(chain_id).ok_or(Error::<T>::UnsupportedChain)?;

            ensure!(params.is_supported, Error::<T>::UnsupportedChain);

            Ok(params
                .ballot_threshold
                .unwrap_or_else(T::DefaultBallotThreshold::get))
        }

        pub fn chain_params(chain_id: ChainId) -> Option<ChainParams> {
            ChainParamsOf::<T>::get(chain_id)
        }

        pub fn crosschain_flags() -> CrosschainFlags {
            Flags::<T>::get()
        }
    }
}
