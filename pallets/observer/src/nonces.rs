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

//! Outbound nonce coordinator.
//!
//! Each chain has a counter of the next nonce to hand out. Each (TSS key,
//! chain) pair has a pending window `[low, high)` of nonces handed out but
//! not yet seen mined. Confirmations may arrive out of order: the low
//! watermark only advances over a gap-free prefix of confirmed nonces.

use crate::{
    ChainId, ChainNonces, Config, ConfirmedNonces, CurrentTss, Error, Event, EventId,
    EventToNonce, Flags, LOG_TARGET, Nonce, NonceBinding, NonceToEvent, NonceWindow,
    OutboundObservation, Pallet, PendingNonces, TssPubkey,
};
use frame_support::{dispatch::DispatchResult, ensure};
use sp_runtime::DispatchError;

/// Nonce allocation as seen by other pallets scheduling outbound transactions.
pub trait NonceAllocator {
    /// Returns the nonce bound to `event` on `chain_id`, allocating the next
    /// one if the event has none yet.
    fn allocate(tss: TssPubkey, chain_id: ChainId, event: EventId) -> Result<Nonce, DispatchError>;
}

impl<T: Config> NonceAllocator for Pallet<T> {
    fn allocate(tss: TssPubkey, chain_id: ChainId, event: EventId) -> Result<Nonce, DispatchError> {
        Self::do_allocate_nonce(tss, chain_id, event)
    }
}

impl<T: Config> Pallet<T> {
    pub fn chain_nonces(chain_id: ChainId) -> Option<Nonce> {
        ChainNonces::<T>::get(chain_id)
    }

    pub fn pending_nonces(tss: TssPubkey, chain_id: ChainId) -> Option<NonceWindow> {
        PendingNonces::<T>::get(tss, chain_id)
    }

    pub fn nonce_to_event(chain_id: ChainId, nonce: Nonce) -> Option<NonceBinding> {
        NonceToEvent::<T>::get(chain_id, nonce)
    }

    pub(crate) fn do_allocate_nonce(
        tss: TssPubkey,
        chain_id: ChainId,
        event: EventId,
    ) -> Result<Nonce, DispatchError> {
        ensure!(
            Flags::<T>::get().is_outbound_enabled,
            Error::<T>::OutboundDisabled
        );

        if let Some(nonce) = EventToNonce::<T>::get(chain_id, event) {
            log::debug!(
                target: LOG_TARGET,
                "Event {event:?} already holds nonce {nonce} on chain {chain_id}"
            );
            return Ok(nonce);
        }

        ensure!(
            CurrentTss::<T>::get().is_some_and(|current| current.pubkey == tss),
            Error::<T>::TssNotCurrent
        );

        let nonce = ChainNonces::<T>::get(chain_id).ok_or(Error::<T>::ChainNoncesNotFound)?;
        let next = nonce.checked_add(1).ok_or(Error::<T>::NonceOverflow)?;

        ensure!(
            !NonceToEvent::<T>::contains_key(chain_id, nonce),
            Error::<T>::NonceAlreadyAllocated
        );

        let mut window =
            PendingNonces::<T>::get(tss, chain_id).unwrap_or_else(|| NonceWindow::empty_at(nonce));
        Self::ensure_window(&window)?;
        window.nonce_high = next;

        ChainNonces::<T>::insert(chain_id, next);
        PendingNonces::<T>::insert(tss, chain_id, window);
        NonceToEvent::<T>::insert(chain_id, nonce, NonceBinding { event, tss });
        EventToNonce::<T>::insert(chain_id, event, nonce);

        log::debug!(
            target: LOG_TARGET,
            "Nonce {nonce} on chain {chain_id} allocated to {event:?}"
        );

        Self::deposit_event(Event::NonceAllocated {
            tss,
            chain_id,
            nonce,
            event,
        });

        Ok(nonce)
    }

    /// Marks `nonce` as mined and advances the low watermark as far as the
    /// confirmed prefix allows.
    pub(crate) fn do_confirm_nonce(
        tss: TssPubkey,
        chain_id: ChainId,
        nonce: Nonce,
    ) -> Result<NonceWindow, DispatchError> {
        let mut window = PendingNonces::<T>::get(tss, chain_id).ok_or(Error::<T>::NonceNotPending)?;
        Self::ensure_window(&window)?;

        ensure!(window.contains(nonce), Error::<T>::NonceNotPending);
        ensure!(
            !ConfirmedNonces::<T>::contains_key((tss, chain_id), nonce),
            Error::<T>::NonceNotPending
        );

        if nonce == window.nonce_low {
            window.nonce_low += 1;

            while window.nonce_low < window.nonce_high
                && ConfirmedNonces::<T>::take((tss, chain_id), window.nonce_low).is_some()
            {
                window.nonce_low += 1;
            }
        } else {
            ConfirmedNonces::<T>::insert((tss, chain_id), nonce, ());
        }

        PendingNonces::<T>::insert(tss, chain_id, window);

        log::debug!(
            target: LOG_TARGET,
            "Nonce {nonce} on chain {chain_id} confirmed, pending {window:?}"
        );

        Self::deposit_event(Event::NonceConfirmed {
            tss,
            chain_id,
            nonce,
            window,
        });

        Ok(window)
    }

    /// Confirms the nonce of a finalized outbound ballot.
    ///
    /// The ballot outcome stands even if the nonce isn't pending, e.g. after
    /// a forced rotation orphaned its window.
    pub(crate) fn finalize_outbound(observation: OutboundObservation) {
        let OutboundObservation {
            chain_id,
            nonce,
            tss,
            ..
        } = observation;

        if let Err(error) = Self::do_confirm_nonce(tss, chain_id, nonce) {
            log::warn!(
                target: LOG_TARGET,
                "Outbound nonce {nonce} of {tss} on chain {chain_id} not confirmed: {error:?}"
            );

            Self::deposit_event(Event::NonceConfirmationFailed {
                tss,
                chain_id,
                nonce,
                error,
            });
        }
    }

    pub(crate) fn do_reset_chain_nonces(
        chain_id: ChainId,
        nonce_low: Nonce,
        nonce_high: Nonce,
    ) -> DispatchResult {
        ensure!(nonce_low <= nonce_high, Error::<T>::InvalidNonceRange);

        let tss = CurrentTss::<T>::get()
            .ok_or(Error::<T>::TssNotFound)?
            .pubkey;

        let window = NonceWindow {
            nonce_low,
            nonce_high,
        };

        ChainNonces::<T>::insert(chain_id, nonce_high);
        PendingNonces::<T>::insert(tss, chain_id, window);
        let _ = ConfirmedNonces::<T>::clear_prefix((tss, chain_id), u32::MAX, None);

        log::info!(
            target: LOG_TARGET,
            "Nonces of chain {chain_id} reset to {window:?} for {tss}"
        );

        Self::deposit_event(Event::ChainNoncesReset {
            chain_id,
            tss,
            window,
        });

        Ok(())
    }

    fn ensure_window(window: &NonceWindow) -> Result<(), Error<T>> {
        if window.nonce_low > window.nonce_high {
            return Err(Self::corrupted("pending nonces window with low above high"));
        }

        Ok(())
    }
}
