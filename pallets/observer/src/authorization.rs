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

//! Policy gate consulted by administrative calls.
//!
//! Observer votes never go through the gate: they are authorized by
//! membership in the observer set (or in a ballot's voter snapshot).

use frame_support::traits::Get;
use parity_scale_codec::{Decode, Encode, MaxEncodedLen};
use scale_info::TypeInfo;
use sp_std::{marker::PhantomData, vec::Vec};

/// Privilege level a message requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen)]
pub enum PolicyTier {
    /// Fast-path group allowed to halt things.
    Emergency,
    /// Day-to-day operations.
    Operational,
    /// Rare, high-impact changes.
    Admin,
}

/// Administrative message kinds checked by the gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode, TypeInfo, MaxEncodedLen)]
pub enum MessageKind {
    AddObserver,
    RemoveObserver,
    UpdateObserver,
    ProposeKeygen,
    ForceRotateTss,
    AllocateNonce,
    ResetChainNonces,
    UpdateChainParams,
    DisableCrosschainFlags,
    EnableCrosschainFlags,
}

impl MessageKind {
    pub fn policy_tier(self) -> PolicyTier {
        match self {
            Self::DisableCrosschainFlags => PolicyTier::Emergency,
            Self::AddObserver
            | Self::RemoveObserver
            | Self::AllocateNonce
            | Self::EnableCrosschainFlags => PolicyTier::Operational,
            Self::UpdateObserver
            | Self::ProposeKeygen
            | Self::ForceRotateTss
            | Self::ResetChainNonces
            | Self::UpdateChainParams => PolicyTier::Admin,
        }
    }
}

/// External policy subsystem, consumed as a yes/no answer.
pub trait AuthorizationGate<AccountId> {
    /// Returns `true` if `who` may submit a message of the given kind.
    fn check_authorization(who: &AccountId, kind: MessageKind) -> bool;
}

/// Gate backed by three static account groups, one per tier.
///
/// An account is authorized for a message only if it belongs to the group
/// of the message's tier. Groups are independent: admin membership does not
/// imply operational membership.
pub struct TieredAccounts<Emergency, Operational, Admin>(
    PhantomData<(Emergency, Operational, Admin)>,
);

impl<AccountId, Emergency, Operational, Admin> AuthorizationGate<AccountId>
    for TieredAccounts<Emergency, Operational, Admin>
where
    AccountId: PartialEq,
    Emergency: Get<Vec<AccountId>>,
    Operational: Get<Vec<AccountId>>,
    Admin: Get<Vec<AccountId>>,
{
    fn check_authorization(who: &AccountId, kind: MessageKind) -> bool {
        let group = match kind.policy_tier() {
            PolicyTier::Emergency => Emergency::get(),
            PolicyTier::Operational => Operational::get(),
            PolicyTier::Admin => Admin::get(),
        };

        group.contains(who)
    }
}
