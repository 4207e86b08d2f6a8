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

//! Module with runtime mock for running tests.

use crate as pallet_observer;
use crate::{
    ChainId, ChainParams, EventId, InboundObservation, OnInboundFinalized, TieredAccounts,
    TssPubkey,
};
use frame_support::{
    assert_ok, construct_runtime, parameter_types,
    traits::{ConstU32, Everything, Hooks},
};
use frame_system::{self as system, pallet_prelude::BlockNumberFor};
use primitive_types::H256;
use sp_arithmetic::Perbill;
use sp_runtime::{
    BuildStorage,
    traits::{BlakeTwo256, IdentityLookup},
};
use std::cell::RefCell;

type Block = frame_system::mocking::MockBlock<Test>;
pub type AccountId = u64;
pub type BlockNumber = BlockNumberFor<Test>;

pub const ALICE: AccountId = 1;
pub const BOB: AccountId = 2;
pub const CHARLIE: AccountId = 3;
pub const DAVE: AccountId = 4;
pub const EVE: AccountId = 5;

pub const EMERGENCY: AccountId = 100;
pub const OPERATIONAL: AccountId = 101;
pub const ADMIN: AccountId = 102;

/// Chain registered as supported by `new_test_ext_with_observers`.
pub const CHAIN: ChainId = 5;

// Configure a mock runtime to test the pallet.
construct_runtime!(
    pub enum Test
    {
        System: system,
        Observer: pallet_observer,
    }
);

parameter_types! {
    pub const BlockHashCount: BlockNumber = 250;
    pub const MaxObservers: u32 = 8;
    pub const MaxGranteePubkeyLen: u32 = 33;
    pub const MaxBallotsPerBlock: u32 = 4;
    pub DefaultBallotThreshold: Perbill = Perbill::from_percent(66);
    pub KeygenBallotThreshold: Perbill = Perbill::one();
    pub EmergencyGroup: Vec<AccountId> = vec![EMERGENCY];
    pub OperationalGroup: Vec<AccountId> = vec![OPERATIONAL];
    pub AdminGroup: Vec<AccountId> = vec![ADMIN];
}

impl system::Config for Test {
    type BaseCallFilter = Everything;
    type BlockWeights = ();
    type BlockLength = ();
    type DbWeight = ();
    type RuntimeOrigin = RuntimeOrigin;
    type RuntimeCall = RuntimeCall;
    type RuntimeEvent = RuntimeEvent;
    type Block = Block;
    type Hash = H256;
    type Hashing = BlakeTwo256;
    type AccountId = AccountId;
    type Lookup = IdentityLookup<Self::AccountId>;
    type Nonce = u64;
    type BlockHashCount = BlockHashCount;
    type Version = ();
    type PalletInfo = PalletInfo;
    type AccountData = ();
    type OnNewAccount = ();
    type OnKilledAccount = ();
    type SystemWeightInfo = ();
    type SS58Prefix = ();
    type OnSetCode = ();
    type MaxConsumers = ConstU32<16>;
    type RuntimeTask = ();
    type SingleBlockMigrations = ();
    type MultiBlockMigrator = ();
    type PreInherents = ();
    type PostInherents = ();
    type PostTransactions = ();
}

thread_local! {
    static FINALIZED_INBOUND: RefCell<Vec<(EventId, InboundObservation)>> =
        const { RefCell::new(Vec::new()) };
}

/// Records finalized inbound observations instead of minting anything.
pub struct InboundRecorder;

impl OnInboundFinalized for InboundRecorder {
    fn on_inbound_finalized(event: EventId, observation: &InboundObservation) {
        FINALIZED_INBOUND.with(|finalized| finalized.borrow_mut().push((event, *observation)));
    }
}

pub fn finalized_inbound() -> Vec<(EventId, InboundObservation)> {
    FINALIZED_INBOUND.with(|finalized| finalized.borrow().clone())
}

impl pallet_observer::Config for Test {
    type RuntimeEvent = RuntimeEvent;
    type Authorization = TieredAccounts<EmergencyGroup, OperationalGroup, AdminGroup>;
    type OnInboundFinalized = InboundRecorder;
    type MaxObservers = MaxObservers;
    type MaxGranteePubkeyLen = MaxGranteePubkeyLen;
    type MaxBallotsPerBlock = MaxBallotsPerBlock;
    type DefaultBallotThreshold = DefaultBallotThreshold;
    type KeygenBallotThreshold = KeygenBallotThreshold;
    type WeightInfo = ();
}

pub fn grantee_of(operator: AccountId) -> AccountId {
    operator + 10
}

pub fn tss_key(seed: u8) -> TssPubkey {
    let mut key = [seed; 33];
    key[0] = 0x02;
    key.into()
}

// Build genesis storage according to the mock runtime.
pub fn new_test_ext() -> sp_io::TestExternalities {
    FINALIZED_INBOUND.with(|finalized| finalized.borrow_mut().clear());

    let t = system::GenesisConfig::<Test>::default()
        .build_storage()
        .unwrap();

    let mut ext = sp_io::TestExternalities::new(t);
    ext.execute_with(|| System::set_block_number(1));
    ext
}

/// Test externalities with ALICE, BOB and CHARLIE as observers and `CHAIN`
/// supported with the default threshold.
pub fn new_test_ext_with_observers() -> sp_io::TestExternalities {
    let mut ext = new_test_ext();
    ext.execute_with(|| {
        for operator in [ALICE, BOB, CHARLIE] {
            add_observer(operator);
        }

        assert_ok!(Observer::set_chain_params(
            RuntimeOrigin::signed(ADMIN),
            CHAIN,
            ChainParams {
                is_supported: true,
                ballot_threshold: None,
            },
        ));
    });
    ext
}

pub fn add_observer(operator: AccountId) {
    assert_ok!(Observer::add_observer(
        RuntimeOrigin::signed(OPERATIONAL),
        operator,
        grantee_of(operator),
        vec![operator as u8; 33],
    ));
}

/// Makes `key` the current TSS with ALICE, BOB and CHARLIE as participants.
pub fn set_current_tss(key: TssPubkey) {
    assert_ok!(Observer::force_rotate(
        RuntimeOrigin::signed(ADMIN),
        key,
        vec![ALICE, BOB, CHARLIE],
    ));
}

// Runs blocks to some specific number.
pub fn run_to_block(n: BlockNumber) {
    while System::block_number() < n {
        System::on_finalize(System::block_number());
        Observer::on_finalize(System::block_number());

        System::set_block_number(System::block_number() + 1);

        System::on_initialize(System::block_number());
        Observer::on_initialize(System::block_number());
    }
}

pub fn run_to_next_block() {
    run_to_block(System::block_number() + 1)
}

pub fn init_logger() {
    let _ = env_logger::Builder::from_default_env()
        .format_module_path(false)
        .format_level(true)
        .try_init();
}
