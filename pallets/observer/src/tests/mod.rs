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

use crate::mock::*;
use frame_support::{assert_noop, assert_ok};
use primitive_types::H256;

use utils::*;

mod ballot;

type Event = crate::Event<Test>;
type Error = crate::Error<Test>;

mod utils {
    use super::*;
    use crate::{
        BallotId, BallotStatus, ChainId, InboundObservation, Nonce, OutboundObservation,
        TssPubkey, VoteType,
    };

    pub fn inbound(seed: u8) -> InboundObservation {
        inbound_on(CHAIN, seed)
    }

    pub fn inbound_on(chain_id: ChainId, seed: u8) -> InboundObservation {
        InboundObservation {
            chain_id,
            tx_hash: H256::repeat_byte(seed),
            log_index: 0,
            payload_hash: H256::repeat_byte(seed.wrapping_add(1)),
        }
    }

    pub fn outbound(tss: TssPubkey, nonce: Nonce) -> OutboundObservation {
        OutboundObservation {
            chain_id: CHAIN,
            nonce,
            tss,
            tx_hash: H256::from_low_u64_be(nonce),
        }
    }

    pub fn inbound_ballot_id(observation: InboundObservation) -> BallotId {
        crate::Observation::<BlockNumber>::Inbound(observation).ballot_id()
    }

    pub fn outbound_ballot_id(observation: OutboundObservation) -> BallotId {
        crate::Observation::<BlockNumber>::Outbound(observation).ballot_id()
    }

    pub fn keygen_ballot_id(pubkey: TssPubkey, keygen_height: BlockNumber) -> BallotId {
        crate::Observation::TssKeygen {
            pubkey,
            keygen_height,
        }
        .ballot_id()
    }

    pub fn vote_inbound(voter: AccountId, observation: InboundObservation) {
        assert_ok!(Observer::vote_inbound(
            RuntimeOrigin::signed(voter),
            observation
        ));
    }

    pub fn vote_outbound(voter: AccountId, observation: OutboundObservation, vote: VoteType) {
        assert_ok!(Observer::vote_outbound(
            RuntimeOrigin::signed(voter),
            observation,
            vote
        ));
    }

    pub fn ballot_status(id: BallotId) -> BallotStatus {
        Observer::ballot(id).expect("ballot exists").status
    }

    /// Amount of `BallotFinalized` events deposited for `id`.
    pub fn finalizations_of(id: BallotId) -> usize {
        System::events()
            .into_iter()
            .filter(|record| {
                matches!(
                    record.event,
                    RuntimeEvent::Observer(Event::BallotFinalized { ballot_id, .. })
                        if ballot_id == id
                )
            })
            .count()
    }

    pub fn observer_events() -> Vec<Event> {
        System::events()
            .into_iter()
            .filter_map(|record| match record.event {
                RuntimeEvent::Observer(event) => Some(event),
                _ => None,
            })
            .collect()
    }
}

#[test]
fn weights_charge_storage_access() {
    use crate::weights::{SubstrateWeight, WeightInfo};
    use frame_support::{
        traits::Get,
        weights::{Weight, constants::RocksDbWeight},
    };

    let one_access = RocksDbWeight::get().reads_writes(1, 1).ref_time();

    let weights: [(fn() -> Weight, fn() -> Weight); 4] = [
        (
            <() as WeightInfo>::vote_inbound,
            SubstrateWeight::<Test>::vote_inbound,
        ),
        (
            <() as WeightInfo>::vote_outbound,
            SubstrateWeight::<Test>::vote_outbound,
        ),
        (
            <() as WeightInfo>::allocate_nonce,
            SubstrateWeight::<Test>::allocate_nonce,
        ),
        (
            <() as WeightInfo>::force_rotate,
            SubstrateWeight::<Test>::force_rotate,
        ),
    ];

    for (default, runtime) in weights {
        assert!(default().ref_time() > one_access);
        // The mock runtime's `DbWeight` is free, leaving the execution part.
        assert!(runtime().ref_time() > 0);
        assert!(runtime().ref_time() < default().ref_time());
    }
}
