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

//! TSS key lifecycle: keygen proposal, keygen ballots and key rotation.

use crate::{
    BallotStatus, Config, ConfirmedNonces, CurrentKeygen, CurrentTss, Error, Event,
    Keygen, KeygenStatus, LOG_TARGET, Observation, PendingNonces, Pallet, Tss, TssHistory,
    TssHistoryLen, TssPubkey, VoteOutcome, VoteType,
};
use frame_support::{BoundedVec, dispatch::DispatchResult, ensure, traits::Get};
use frame_system::pallet_prelude::BlockNumberFor;
use sp_runtime::DispatchError;
use sp_std::{collections::btree_set::BTreeSet, vec::Vec};

impl<T: Config> Pallet<T> {
    pub fn current_tss() -> Option<Tss<T>> {
        CurrentTss::<T>::get()
    }

    /// Every key ever activated, oldest first.
    pub fn tss_history() -> Vec<Tss<T>> {
        (0..TssHistoryLen::<T>::get())
            .filter_map(TssHistory::<T>::get)
            .collect()
    }

    pub fn keygen() -> Option<Keygen<T>> {
        CurrentKeygen::<T>::get()
    }

    pub(crate) fn do_propose_keygen(
        participants: Vec<T::AccountId>,
        height: BlockNumberFor<T>,
    ) -> DispatchResult {
        ensure!(
            !matches!(
                CurrentKeygen::<T>::get(),
                Some(Keygen {
                    status: KeygenStatus::Pending,
                    ..
                })
            ),
            Error::<T>::KeygenAlreadyPending
        );
        ensure!(
            height >= frame_system::Pallet::<T>::block_number(),
            Error::<T>::InvalidKeygenHeight
        );

        let participants = Self::validate_participants(participants)?;
        let amount = participants.len() as u32;

        CurrentKeygen::<T>::put(Keygen {
            participants,
            height,
            status: KeygenStatus::Pending,
            finalized_at: None,
        });

        log::info!(target: LOG_TARGET, "Keygen proposed at {height:?} for {amount} participants");

        Self::deposit_event(Event::KeygenProposed {
            height,
            participants: amount,
        });

        Ok(())
    }

    pub(crate) fn do_vote_keygen(
        voter: T::AccountId,
        pubkey: TssPubkey,
        keygen_height: BlockNumberFor<T>,
        vote: VoteType,
    ) -> Result<VoteOutcome, DispatchError> {
        let keygen = CurrentKeygen::<T>::get().ok_or(Error::<T>::KeygenNotFound)?;

        let observation = Observation::TssKeygen {
            pubkey,
            keygen_height,
        };

        Self::cast_vote(observation, &voter, vote, || {
            ensure!(
                keygen.status == KeygenStatus::Pending && keygen.height == keygen_height,
                Error::<T>::KeygenNotPending
            );

            Ok((
                keygen.participants.into_inner(),
                T::KeygenBallotThreshold::get(),
            ))
        })
    }

    /// Applies a finalized keygen ballot.
    ///
    /// Ballots left over from an earlier proposal don't change state.
    pub(crate) fn finalize_keygen(
        pubkey: TssPubkey,
        keygen_height: BlockNumberFor<T>,
        status: BallotStatus,
    ) {
        let Some(mut keygen) = CurrentKeygen::<T>::get() else {
            return;
        };

        if keygen.status != KeygenStatus::Pending || keygen.height != keygen_height {
            log::debug!(
                target: LOG_TARGET,
                "Stale keygen ballot for {pubkey} at {keygen_height:?} finalized as {status:?}"
            );
            return;
        }

        let now = frame_system::Pallet::<T>::block_number();
        keygen.finalized_at = Some(now);

        match status {
            BallotStatus::FinalizedSuccess => {
                keygen.status = KeygenStatus::Success;

                let tss = Tss {
                    pubkey,
                    participants: keygen.participants.clone(),
                    keygen_height,
                    finalized_height: now,
                };

                CurrentKeygen::<T>::put(keygen);

                Self::deposit_event(Event::KeygenCompleted {
                    pubkey,
                    height: keygen_height,
                });

                Self::activate_tss(tss, false);
            }
            BallotStatus::FinalizedFailed => {
                keygen.status = KeygenStatus::Failed;
                CurrentKeygen::<T>::put(keygen);

                log::warn!(target: LOG_TARGET, "Keygen at {keygen_height:?} failed");

                Self::deposit_event(Event::KeygenFailed {
                    height: keygen_height,
                });
            }
            BallotStatus::Pending => {
                Self::corrupted("keygen finalized with pending ballot");
            }
        }
    }

    /// Activates `pubkey` directly, orphaning every pending nonce window of
    /// the previous key. Chain counters stay as they are.
    pub(crate) fn do_force_rotate(
        pubkey: TssPubkey,
        participants: Vec<T::AccountId>,
    ) -> DispatchResult {
        let old = CurrentTss::<T>::get();

        ensure!(
            old.as_ref().map(|tss| tss.pubkey) != Some(pubkey),
            Error::<T>::TssAlreadyCurrent
        );

        let participants = Self::validate_participants(participants)?;
        let now = frame_system::Pallet::<T>::block_number();

        if let Some(old) = old {
            let orphaned: Vec<_> = PendingNonces::<T>::drain_prefix(old.pubkey).collect();

            for (chain_id, window) in orphaned {
                let _ = ConfirmedNonces::<T>::clear_prefix((old.pubkey, chain_id), u32::MAX, None);

                log::warn!(
                    target: LOG_TARGET,
                    "Pending nonces {window:?} of {} on chain {chain_id} orphaned",
                    old.pubkey
                );

                Self::deposit_event(Event::PendingNoncesOrphaned {
                    tss: old.pubkey,
                    chain_id,
                    window,
                });
            }
        }

        // Results of an interrupted ceremony can no longer be applied.
        CurrentKeygen::<T>::mutate(|keygen| {
            if let Some(keygen) = keygen
                && keygen.status == KeygenStatus::Pending
            {
                keygen.status = KeygenStatus::Failed;
                keygen.finalized_at = Some(now);
            }
        });

        Self::activate_tss(
            Tss {
                pubkey,
                participants,
                keygen_height: now,
                finalized_height: now,
            },
            true,
        );

        Ok(())
    }

    /// Makes `tss` current and appends it to the history.
    fn activate_tss(tss: Tss<T>, forced: bool) {
        let old = CurrentTss::<T>::get().map(|tss| tss.pubkey);
        let new = tss.pubkey;

        let index = TssHistoryLen::<T>::mutate(|len| {
            let index = *len;
            *len = len.saturating_add(1);
            index
        });
        TssHistory::<T>::insert(index, &tss);
        CurrentTss::<T>::put(tss);

        log::info!(target: LOG_TARGET, "TSS rotated from {old:?} to {new} (forced: {forced})");

        Self::deposit_event(Event::TssRotated { old, new, forced });
    }

    /// Checks keygen participants are distinct active observers.
    fn validate_participants(
        participants: Vec<T::AccountId>,
    ) -> Result<BoundedVec<T::AccountId, T::MaxObservers>, DispatchError> {
        ensure!(!participants.is_empty(), Error::<T>::EmptyKeygenParticipants);

        let mut seen = BTreeSet::new();
        for participant in &participants {
            ensure!(seen.insert(participant), Error::<T>::DuplicateKeygenParticipant);
            ensure!(
                Self::is_active_observer(participant),
                Error::<T>::NotObserver
            );
        }

        participants
            .try_into()
            .map_err(|_| Error::<T>::TooManyObservers.into())
    }
}
