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

use super::*;
use crate::{BallotStatus, ChainParams, CrosschainFlags, ObservationType, VoteType, tally};
use sp_arithmetic::Perbill;

#[test]
fn tally_thresholds() {
    let two_thirds = Perbill::from_percent(66);

    assert_eq!(tally(1, 0, 3, two_thirds), BallotStatus::Pending);
    assert_eq!(tally(2, 0, 3, two_thirds), BallotStatus::FinalizedSuccess);
    assert_eq!(tally(1, 1, 3, two_thirds), BallotStatus::Pending);
    assert_eq!(tally(0, 2, 3, two_thirds), BallotStatus::FinalizedFailed);

    // Exactly at threshold.
    let half = Perbill::from_percent(50);
    assert_eq!(tally(2, 0, 4, half), BallotStatus::FinalizedSuccess);
    assert_eq!(tally(0, 2, 4, half), BallotStatus::Pending);
    assert_eq!(tally(0, 3, 4, half), BallotStatus::FinalizedFailed);

    let unanimous = Perbill::one();
    assert_eq!(tally(2, 0, 3, unanimous), BallotStatus::Pending);
    assert_eq!(tally(3, 0, 3, unanimous), BallotStatus::FinalizedSuccess);
    assert_eq!(tally(0, 1, 3, unanimous), BallotStatus::FinalizedFailed);

    assert_eq!(tally(0, 0, 0, two_thirds), BallotStatus::Pending);
}

#[test]
fn first_vote_opens_ballot() {
    new_test_ext_with_observers().execute_with(|| {
        let observation = inbound(1);
        let id = inbound_ballot_id(observation);

        vote_inbound(ALICE, observation);

        let ballot = Observer::ballot(id).expect("ballot created");
        assert_eq!(ballot.identifier, id);
        assert_eq!(ballot.observation_type(), ObservationType::Inbound);
        assert_eq!(ballot.voter_list.into_inner(), vec![ALICE, BOB, CHARLIE]);
        assert_eq!(ballot.votes.get(&ALICE), Some(&VoteType::Success));
        assert_eq!(ballot.threshold, Perbill::from_percent(66));
        assert_eq!(ballot.status, BallotStatus::Pending);
        assert_eq!(ballot.created_at, 1);
        assert_eq!(ballot.finalized_at, None);

        assert_eq!(Observer::ballots_at(1), vec![id]);

        let events = observer_events();
        assert_eq!(
            events[events.len() - 2..],
            [
                Event::BallotCreated {
                    ballot_id: id,
                    observation_type: ObservationType::Inbound,
                },
                Event::VoteCast {
                    ballot_id: id,
                    voter: ALICE,
                    vote: VoteType::Success,
                },
            ]
        );
    });
}

#[test]
fn grantee_votes_as_operator() {
    new_test_ext_with_observers().execute_with(|| {
        let observation = inbound(1);
        let id = inbound_ballot_id(observation);

        vote_inbound(grantee_of(BOB), observation);

        System::assert_last_event(
            Event::VoteCast {
                ballot_id: id,
                voter: BOB,
                vote: VoteType::Success,
            }
            .into(),
        );
        assert!(Observer::ballot(id).unwrap().votes.contains_key(&BOB));
    });
}

#[test]
fn non_observer_cannot_vote() {
    new_test_ext_with_observers().execute_with(|| {
        let observation = inbound(1);

        assert_noop!(
            Observer::vote_inbound(RuntimeOrigin::signed(DAVE), observation),
            Error::NotAuthorizedVoter
        );

        vote_inbound(ALICE, observation);

        assert_noop!(
            Observer::vote_inbound(RuntimeOrigin::signed(DAVE), observation),
            Error::NotAuthorizedVoter
        );
    });
}

#[test]
fn ballot_requires_observers() {
    new_test_ext().execute_with(|| {
        assert_ok!(Observer::set_chain_params(
            RuntimeOrigin::signed(ADMIN),
            CHAIN,
            ChainParams {
                is_supported: true,
                ballot_threshold: None,
            }
        ));

        assert_noop!(
            Observer::vote_inbound(RuntimeOrigin::signed(ALICE), inbound(1)),
            Error::NoObserverSet
        );
    });
}

#[test]
fn ballot_requires_supported_chain() {
    new_test_ext_with_observers().execute_with(|| {
        assert_noop!(
            Observer::vote_inbound(RuntimeOrigin::signed(ALICE), inbound_on(99, 1)),
            Error::UnsupportedChain
        );

        assert_ok!(Observer::set_chain_params(
            RuntimeOrigin::signed(ADMIN),
            99,
            ChainParams {
                is_supported: false,
                ballot_threshold: None,
            }
        ));

        assert_noop!(
            Observer::vote_inbound(RuntimeOrigin::signed(ALICE), inbound_on(99, 1)),
            Error::UnsupportedChain
        );
    });
}

#[test]
fn chain_threshold_is_captured_at_creation() {
    new_test_ext_with_observers().execute_with(|| {
        let observation = inbound(1);
        let id = inbound_ballot_id(observation);

        vote_inbound(ALICE, observation);

        assert_ok!(Observer::set_chain_params(
            RuntimeOrigin::signed(ADMIN),
            CHAIN,
            ChainParams {
                is_supported: true,
                ballot_threshold: Some(Perbill::from_percent(30)),
            }
        ));

        // Old ballot still needs two thirds.
        assert_eq!(ballot_status(id), BallotStatus::Pending);

        // New ballots finalize with one vote out of three.
        let other = inbound(2);
        vote_inbound(ALICE, other);
        assert_eq!(
            ballot_status(inbound_ballot_id(other)),
            BallotStatus::FinalizedSuccess
        );
    });
}

#[test]
fn inbound_disabled_blocks_new_ballots_only() {
    new_test_ext_with_observers().execute_with(|| {
        let observation = inbound(1);
        let id = inbound_ballot_id(observation);

        vote_inbound(ALICE, observation);

        assert_ok!(Observer::update_crosschain_flags(
            RuntimeOrigin::signed(EMERGENCY),
            CrosschainFlags {
                is_inbound_enabled: false,
                is_outbound_enabled: true,
            }
        ));

        assert_noop!(
            Observer::vote_inbound(RuntimeOrigin::signed(ALICE), inbound(2)),
            Error::InboundDisabled
        );

        vote_inbound(BOB, observation);
        assert_eq!(ballot_status(id), BallotStatus::FinalizedSuccess);
    });
}

#[test]
fn last_vote_counts() {
    new_test_ext_with_observers().execute_with(|| {
        let observation = outbound(tss_key(1), 0);
        let id = outbound_ballot_id(observation);

        vote_outbound(ALICE, observation, VoteType::Failure);
        vote_outbound(ALICE, observation, VoteType::Success);

        let ballot = Observer::ballot(id).unwrap();
        assert_eq!(ballot.counts(), (1, 0));
        assert_eq!(ballot.status, BallotStatus::Pending);

        vote_outbound(BOB, observation, VoteType::Failure);
        assert_eq!(Observer::ballot(id).unwrap().counts(), (1, 1));
        assert_eq!(ballot_status(id), BallotStatus::Pending);

        vote_outbound(CHARLIE, observation, VoteType::Success);
        assert_eq!(ballot_status(id), BallotStatus::FinalizedSuccess);
    });
}

#[test]
fn finalized_ballot_absorbs_votes() {
    new_test_ext_with_observers().execute_with(|| {
        let observation = inbound(1);
        let id = inbound_ballot_id(observation);

        vote_inbound(ALICE, observation);
        vote_inbound(BOB, observation);

        let finalized = Observer::ballot(id).unwrap();
        assert_eq!(finalized.status, BallotStatus::FinalizedSuccess);
        assert_eq!(finalized.finalized_at, Some(1));

        run_to_next_block();
        let events_before = System::events().len();

        vote_inbound(CHARLIE, observation);

        assert_eq!(Observer::ballot(id), Some(finalized.clone()));
        assert_eq!(System::events().len(), events_before);
        assert_eq!(finalizations_of(id), 1);

        // Outsiders are rejected even after finalization.
        add_observer(DAVE);
        for outsider in [DAVE, EVE] {
            assert_noop!(
                Observer::vote_inbound(RuntimeOrigin::signed(outsider), observation),
                Error::NotAuthorizedVoter
            );
        }
        assert_eq!(Observer::ballot(id), Some(finalized));
    });
}

#[test]
fn ballots_are_indexed_by_height() {
    new_test_ext_with_observers().execute_with(|| {
        let limit = 4u8;

        for seed in 0..=limit {
            vote_inbound(ALICE, inbound(seed * 2));
        }

        let indexed = Observer::ballots_at(1);
        assert_eq!(indexed.len(), limit as usize);
        assert!(!indexed.contains(&inbound_ballot_id(inbound(limit * 2))));
        assert!(Observer::ballot(inbound_ballot_id(inbound(limit * 2))).is_some());

        run_to_next_block();
        vote_inbound(ALICE, inbound(100));
        assert_eq!(Observer::ballots_at(2), vec![inbound_ballot_id(inbound(100))]);
    });
}

#[test]
fn ballot_info_lists_votes_in_snapshot_order() {
    new_test_ext_with_observers().execute_with(|| {
        let observation = outbound(tss_key(1), 3);
        let id = outbound_ballot_id(observation);

        assert_eq!(Observer::ballot_info(id), None);

        vote_outbound(CHARLIE, observation, VoteType::Failure);
        vote_outbound(ALICE, observation, VoteType::Success);

        let info = Observer::ballot_info(id).expect("ballot exists");
        assert_eq!(
            info.votes,
            vec![
                (ALICE, Some(VoteType::Success)),
                (BOB, None),
                (CHARLIE, Some(VoteType::Failure)),
            ]
        );
        assert_eq!(info.status, BallotStatus::Pending);
        assert_eq!(info.observation, crate::Observation::Outbound(observation));
    });
}
