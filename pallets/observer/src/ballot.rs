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

//! Ballot engine.
//!
//! A ballot is opened by the first vote on an observation, snapshots its
//! voters at that moment and moves `Pending -> FinalizedSuccess` or
//! `Pending -> FinalizedFailed` exactly once. Votes on a finalized ballot
//! are accepted as no-ops.

use crate::{
    Ballot, BallotId, BallotInfo, BallotStatus, Ballots, BallotsByHeight, Config, Error, Event,
    Flags, InboundObservation, LOG_TARGET, Observation, ObserverSet, OnInboundFinalized,
    OutboundObservation, Pallet, VoteOutcome, VoteType,
};
use frame_support::{BoundedBTreeMap, BoundedVec, ensure};
use frame_system::pallet_prelude::BlockNumberFor;
use sp_arithmetic::Perbill;
use sp_runtime::DispatchError;
use sp_std::vec::Vec;

impl<T: Config> Pallet<T> {
    pub fn ballot(id: BallotId) -> Option<Ballot<T>> {
        Ballots::<T>::get(id)
    }

    pub fn ballot_info(id: BallotId) -> Option<BallotInfo<T::AccountId, BlockNumberFor<T>>> {
        Ballots::<T>::get(id).map(Into::into)
    }

    /// Ids of ballots created at `height`.
    pub fn ballots_at(height: BlockNumberFor<T>) -> Vec<BallotId> {
        BallotsByHeight::<T>::get(height).into_inner()
    }

    /// Records `voter`'s vote on the ballot of `observation`.
    ///
    /// `open` is only called when the ballot doesn't exist yet and returns
    /// the voter snapshot and threshold of the new ballot. Voters outside
    /// the snapshot are rejected even on finalized ballots. Any failure
    /// leaves storage untouched.
    pub(crate) fn cast_vote(
        observation: Observation<BlockNumberFor<T>>,
        voter: &T::AccountId,
        vote: VoteType,
        open: impl FnOnce() -> Result<(Vec<T::AccountId>, Perbill), DispatchError>,
    ) -> Result<VoteOutcome, DispatchError> {
        let ballot_id = observation.ballot_id();
        let now = frame_system::Pallet::<T>::block_number();

        let (mut ballot, created) = match Ballots::<T>::get(ballot_id) {
            Some(ballot) if !ballot.is_voter(voter) => {
                return Err(Error::<T>::NotAuthorizedVoter.into());
            }
            Some(ballot) if ballot.status.is_finalized() => {
                log::debug!(
                    target: LOG_TARGET,
                    "Vote of {voter:?} on finalized ballot {ballot_id:?} ignored"
                );

                return Ok(VoteOutcome {
                    ballot_id,
                    status: ballot.status,
                    created: false,
                    finalized_now: false,
                });
            }
            Some(ballot) => (ballot, false),
            None => {
                let (voters, threshold) = open()?;

                ensure!(!voters.is_empty(), Error::<T>::NoObserverSet);

                let voter_list: BoundedVec<_, T::MaxObservers> = voters
                    .try_into()
                    .map_err(|_| Error::<T>::TooManyObservers)?;

                let ballot = Ballot {
                    identifier: ballot_id,
                    observation,
                    voter_list,
                    votes: BoundedBTreeMap::new(),
                    threshold,
                    status: BallotStatus::Pending,
                    created_at: now,
                    finalized_at: None,
                };

                (ballot, true)
            }
        };

        if created {
            ensure!(ballot.is_voter(voter), Error::<T>::NotAuthorizedVoter);
        }

        ballot
            .votes
            .try_insert(voter.clone(), vote)
            .map_err(|_| Self::corrupted("ballot votes exceed voter snapshot"))?;

        let status = ballot.tally();
        let finalized_now = status.is_finalized();

        if finalized_now {
            ballot.status = status;
            ballot.finalized_at = Some(now);
        }

        Ballots::<T>::insert(ballot_id, &ballot);

        if created {
            let indexed = BallotsByHeight::<T>::mutate(now, |ids| ids.try_push(ballot_id));
            if indexed.is_err() {
                log::warn!(
                    target: LOG_TARGET,
                    "Ballot {ballot_id:?} not indexed at {now:?}: per-block limit reached"
                );
            }

            Self::deposit_event(Event::BallotCreated {
                ballot_id,
                observation_type: ballot.observation_type(),
            });
        }

        log::debug!(target: LOG_TARGET, "{voter:?} voted {vote:?} on {ballot_id:?}");

        Self::deposit_event(Event::VoteCast {
            ballot_id,
            voter: voter.clone(),
            vote,
        });

        if finalized_now {
            log::info!(
                target: LOG_TARGET,
                "Ballot {ballot_id:?} ({:?}) finalized as {status:?}",
                ballot.observation_type()
            );

            Self::deposit_event(Event::BallotFinalized {
                ballot_id,
                observation_type: ballot.observation_type(),
                status,
            });

            Self::on_ballot_finalized(&ballot);
        }

        Ok(VoteOutcome {
            ballot_id,
            status: ballot.status,
            created,
            finalized_now,
        })
    }

    /// Routes a freshly finalized ballot to its consumer.
    fn on_ballot_finalized(ballot: &Ballot<T>) {
        match ballot.observation {
            Observation::Inbound(ref observation) => {
                if ballot.status == BallotStatus::FinalizedSuccess {
                    T::OnInboundFinalized::on_inbound_finalized(ballot.identifier, observation);
                }
            }
            // Both outcomes mean the nonce was consumed on the foreign chain.
            Observation::Outbound(observation) => Self::finalize_outbound(observation),
            Observation::TssKeygen {
                pubkey,
                keygen_height,
            } => Self::finalize_keygen(pubkey, keygen_height, ballot.status),
        }
    }

    pub(crate) fn do_vote_inbound(
        voter: T::AccountId,
        observation: InboundObservation,
    ) -> Result<VoteOutcome, DispatchError> {
        Self::cast_vote(
            Observation::Inbound(observation),
            &voter,
            VoteType::Success,
            || {
                ensure!(
                    Flags::<T>::get().is_inbound_enabled,
                    Error::<T>::InboundDisabled
                );

                let threshold = Self::ballot_threshold(observation.chain_id)?;

                Ok((ObserverSet::<T>::get().into_inner(), threshold))
            },
        )
    }

    pub(crate) fn do_vote_outbound(
        voter: T::AccountId,
        observation: OutboundObservation,
        vote: VoteType,
    ) -> Result<VoteOutcome, DispatchError> {
        Self::cast_vote(Observation::Outbound(observation), &voter, vote, || {
            let threshold = Self::ballot_threshold(observation.chain_id)?;

            Ok((ObserverSet::<T>::get().into_inner(), threshold))
        })
    }

    /// Logs a broken invariant and returns the error reported for it.
    pub(crate) fn corrupted(reason: &str) -> Error<T> {
        log::error!(target: LOG_TARGET, "Corrupted state: {reason}");
        debug_assert!(false, "Corrupted state: {reason}");

        Error::<T>::CorruptedState
    }
}
