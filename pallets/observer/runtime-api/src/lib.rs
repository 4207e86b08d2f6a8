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

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec::Vec;
use pallet_observer::{BallotId, BallotInfo, ChainId, Nonce, NonceWindow, TssPubkey};
use parity_scale_codec::Codec;

sp_api::decl_runtime_apis! {
    pub trait ObserverApi<AccountId, BlockNumber>
    where
        AccountId: Codec,
        BlockNumber: Codec,
    {
        fn ballot(id: BallotId) -> Option<BallotInfo<AccountId, BlockNumber>>;

        /// Ids of ballots created at `height`.
        fn ballots_at(height: BlockNumber) -> Vec<BallotId>;

        fn observer_set() -> Vec<AccountId>;

        fn current_tss() -> Option<TssPubkey>;

        /// Every key ever activated, oldest first.
        fn tss_history() -> Vec<TssPubkey>;

        fn chain_nonces(chain_id: ChainId) -> Option<Nonce>;

        fn pending_nonces(tss: TssPubkey, chain_id: ChainId) -> Option<NonceWindow>;
    }
}
