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

use crate::{
    Config, Error, Event, Grantees, LOG_TARGET, LastObserverCount, NodeAccount, NodeAccounts,
    NodeStatus, ObserverCount, ObserverSet, ObserverUpdateReason, Pallet,
};
use frame_support::{BoundedVec, dispatch::DispatchResult, ensure};
use frame_system::pallet_prelude::BlockNumberFor;
use sp_std::vec::Vec;

impl<T: Config> Pallet<T> {
    pub fn is_active_observer(who: &T::AccountId) -> bool {
        ObserverSet::<T>::get().contains(who)
    }

    pub fn observer_set() -> Vec<T::AccountId> {
        ObserverSet::<T>::get().into_inner()
    }

    pub fn node_account(operator: &T::AccountId) -> Option<NodeAccount<T>> {
        NodeAccounts::<T>::get(operator)
    }

    pub fn last_observer_count() -> Option<ObserverCount<BlockNumberFor<T>>> {
        LastObserverCount::<T>::get()
    }

    pub(crate) fn do_add_observer(
        operator: T::AccountId,
        grantee: T::AccountId,
        grantee_pubkey: Vec<u8>,
    ) -> DispatchResult {
        let mut set = ObserverSet::<T>::get();

        ensure!(!set.contains(&operator), Error::<T>::AlreadyObserver);
        Self::ensure_not_grantee(&operator)?;
        Self::ensure_grantee_free(&grantee, &operator)?;

        let grantee_pubkey: BoundedVec<_, _> = grantee_pubkey
            .try_into()
            .map_err(|_| Error::<T>::GranteePubkeyTooLong)?;

        set.try_push(operator.clone())
            .map_err(|_| Error::<T>::TooManyObservers)?;

        // A returning operator may come back with a different grantee.
        if let Some(previous) = NodeAccounts::<T>::get(&operator)
            && previous.grantee != grantee
        {
            Grantees::<T>::remove(&previous.grantee);
        }

        NodeAccounts::<T>::insert(
            &operator,
            NodeAccount {
                operator: operator.clone(),
                grantee: grantee.clone(),
                grantee_pubkey,
                status: NodeStatus::Active,
                replaced: None,
            },
        );
        Grantees::<T>::insert(&grantee, &operator);

        Self::put_observer_set(set);

        log::debug!(target: LOG_TARGET, "Observer {operator:?} added");

        Self::deposit_event(Event::ObserverAdded { operator, grantee });

        Ok(())
    }

    pub(crate) fn do_remove_observer(operator: T::AccountId) -> DispatchResult {
        let mut set = ObserverSet::<T>::get();

        let position = set
            .iter()
            .position(|o| *o == operator)
            .ok_or(Error::<T>::NotObserver)?;
        set.remove(position);

        NodeAccounts::<T>::mutate(&operator, |account| {
            if let Some(account) = account {
                account.status = NodeStatus::Removed;
            }
        });

        Self::put_observer_set(set);

        log::debug!(target: LOG_TARGET, "Observer {operator:?} removed");

        Self::deposit_event(Event::ObserverRemoved { operator });

        Ok(())
    }

    /// Swaps `old` for `new` keeping the position in the set.
    ///
    /// The node account and grantee of `old` move over to `new`.
    pub(crate) fn do_update_observer(
        old: T::AccountId,
        new: T::AccountId,
        reason: ObserverUpdateReason,
    ) -> DispatchResult {
        let mut set = ObserverSet::<T>::get();

        ensure!(!set.contains(&new), Error::<T>::AlreadyObserver);
        Self::ensure_not_grantee(&new)?;

        let slot = set
            .iter_mut()
            .find(|o| **o == old)
            .ok_or(Error::<T>::NotObserver)?;
        *slot = new.clone();

        let mut account = NodeAccounts::<T>::get(&old)
            .ok_or_else(|| Self::corrupted("active observer without node account"))?;

        if let Some(previous) = NodeAccounts::<T>::get(&new)
            && previous.grantee != account.grantee
        {
            Grantees::<T>::remove(&previous.grantee);
        }

        NodeAccounts::<T>::insert(
            &new,
            NodeAccount {
                operator: new.clone(),
                status: NodeStatus::Active,
                replaced: None,
                ..account.clone()
            },
        );
        Grantees::<T>::insert(&account.grantee, &new);

        account.status = NodeStatus::Removed;
        account.replaced = Some(reason);
        NodeAccounts::<T>::insert(&old, account);

        Self::put_observer_set(set);

        log::debug!(target: LOG_TARGET, "Observer {old:?} replaced by {new:?}: {reason:?}");

        Self::deposit_event(Event::ObserverUpdated { old, new, reason });

        Ok(())
    }

    pub(crate) fn do_update_grantee(
        operator: T::AccountId,
        grantee: T::AccountId,
        grantee_pubkey: Vec<u8>,
    ) -> DispatchResult {
        ensure!(Self::is_active_observer(&operator), Error::<T>::NotObserver);
        Self::ensure_grantee_free(&grantee, &operator)?;

        let grantee_pubkey: BoundedVec<_, _> = grantee_pubkey
            .try_into()
            .map_err(|_| Error::<T>::GranteePubkeyTooLong)?;

        NodeAccounts::<T>::try_mutate(&operator, |account| -> DispatchResult {
            let account = account
                .as_mut()
                .ok_or_else(|| Self::corrupted("active observer without node account"))?;

            Grantees::<T>::remove(&account.grantee);

            account.grantee = grantee.clone();
            account.grantee_pubkey = grantee_pubkey;

            Ok(())
        })?;
        Grantees::<T>::insert(&grantee, &operator);

        Self::deposit_event(Event::GranteeUpdated { operator, grantee });

        Ok(())
    }

    /// Checks `grantee` may vote for `operator`: it is neither another
    /// operator's grantee nor an operator account itself.
    fn ensure_grantee_free(grantee: &T::AccountId, operator: &T::AccountId) -> DispatchResult {
        if let Some(owner) = Grantees::<T>::get(grantee) {
            ensure!(owner == *operator, Error::<T>::GranteeAlreadyInUse);
        }

        ensure!(
            grantee == operator || !NodeAccounts::<T>::contains_key(grantee),
            Error::<T>::GranteeIsOperator
        );

        Ok(())
    }

    fn ensure_not_grantee(operator: &T::AccountId) -> DispatchResult {
        ensure!(
            Grantees::<T>::get(operator).is_none_or(|owner| owner == *operator),
            Error::<T>::OperatorIsGrantee
        );

        Ok(())
    }

    fn put_observer_set(set: BoundedVec<T::AccountId, T::MaxObservers>) {
        LastObserverCount::<T>::put(ObserverCount {
            count: set.len() as u32,
            last_change_height: frame_system::Pallet::<T>::block_number(),
        });
        ObserverSet::<T>::put(set);
    }
}
