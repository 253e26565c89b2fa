//! Property-based tests for machine configurations.
//!
//! These tests use proptest to drive a machine with random signal
//! sequences and check that the active configuration stays well formed.

use orthos::builder::{MachineBuilder, MachineDefinition, StateBuilder};
use orthos::core::{HistoryMode, StateId};
use orthos::runtime::{Dispatch, Machine, MachineConfig};
use orthos::state_enum;
use proptest::prelude::*;
use std::sync::Arc;

state_enum! {
    enum Cell {
        Idle,
        Work,
        Pick,
        Place,
        Inspect,
        Vision,
        Lidar,
        Fault,
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
enum Sig {
    Start,
    Next,
    Check,
    Switch,
    Fail,
    Reset,
}

const REGIONS: [(&str, Cell, [Cell; 3]); 2] = [
    ("arm", Cell::Work, [Cell::Pick, Cell::Place, Cell::Inspect]),
    ("sensing", Cell::Work, [Cell::Vision, Cell::Lidar, Cell::Lidar]),
];

fn definition(history: HistoryMode) -> MachineDefinition<Cell, Sig> {
    MachineBuilder::new()
        .initial(Cell::Idle)
        .state(StateBuilder::new(Cell::Idle).on_signal(Sig::Start, Cell::Work))
        .state(
            StateBuilder::new(Cell::Work)
                .region("arm", Cell::Pick)
                .region("sensing", Cell::Vision)
                .history(history)
                .on_signal(Sig::Fail, Cell::Fault)
                .on_signal(Sig::Reset, Cell::Idle),
        )
        .state(
            StateBuilder::new(Cell::Pick)
                .within(Cell::Work, "arm")
                .on_signal(Sig::Next, Cell::Place),
        )
        .state(
            StateBuilder::new(Cell::Place)
                .within(Cell::Work, "arm")
                .on_signal(Sig::Next, Cell::Pick)
                .on_signal(Sig::Check, Cell::Inspect),
        )
        .state(
            StateBuilder::new(Cell::Inspect)
                .within(Cell::Work, "arm")
                .on_signal(Sig::Next, Cell::Pick),
        )
        .state(
            StateBuilder::new(Cell::Vision)
                .within(Cell::Work, "sensing")
                .on_signal(Sig::Switch, Cell::Lidar),
        )
        .state(
            StateBuilder::new(Cell::Lidar)
                .within(Cell::Work, "sensing")
                .on_signal(Sig::Switch, Cell::Vision),
        )
        .state(StateBuilder::new(Cell::Fault).on_signal(Sig::Reset, Cell::Idle))
        .build()
        .unwrap()
}

fn arbitrary_signal() -> impl Strategy<Value = Sig> {
    prop_oneof![
        Just(Sig::Start),
        Just(Sig::Next),
        Just(Sig::Check),
        Just(Sig::Switch),
        Just(Sig::Fail),
        Just(Sig::Reset),
    ]
}

fn arbitrary_history() -> impl Strategy<Value = HistoryMode> {
    prop_oneof![
        Just(HistoryMode::None),
        Just(HistoryMode::Shallow),
        Just(HistoryMode::Deep),
    ]
}

fn assert_well_formed(machine: &Machine<Cell, Sig>) {
    let active = machine.active_states();
    let top: Vec<&Cell> = active
        .iter()
        .filter(|s| matches!(s, Cell::Idle | Cell::Work | Cell::Fault))
        .collect();
    assert_eq!(top.len(), 1, "exactly one top-level state: {active:?}");

    for (region, owner, children) in REGIONS {
        match machine.active_in(region) {
            Some(child) => {
                assert!(machine.is_active(&owner));
                assert!(children.contains(child));
                let live = active.iter().filter(|s| children.contains(*s)).count();
                assert_eq!(live, 1, "one active child in {region}: {active:?}");
            }
            None => {
                assert!(!machine.is_active(&owner));
                assert!(!active.iter().any(|s| children.contains(s)));
            }
        }
    }
}

proptest! {
    #[test]
    fn configuration_stays_well_formed(
        history in arbitrary_history(),
        signals in prop::collection::vec(arbitrary_signal(), 0..40)
    ) {
        let mut machine = Machine::new(Arc::new(definition(history)), MachineConfig::default());
        machine.start().unwrap();
        assert_well_formed(&machine);

        for signal in signals {
            machine.signal(signal).unwrap();
            let dispatch = machine.step().unwrap();
            assert_well_formed(&machine);

            if let Some(Dispatch::Transitioned { target, .. }) = dispatch {
                prop_assert!(machine.is_active(&target));
            }
        }
    }

    #[test]
    fn transition_log_matches_dispatches(
        signals in prop::collection::vec(arbitrary_signal(), 0..40)
    ) {
        let config = MachineConfig::default().with_log_capacity(64);
        let mut machine = Machine::new(Arc::new(definition(HistoryMode::None)), config);
        machine.start().unwrap();

        let mut transitions = Vec::new();
        for signal in signals {
            machine.signal(signal).unwrap();
            if let Some(Dispatch::Transitioned { source, target }) = machine.step().unwrap() {
                transitions.push((source, target));
            }
        }

        let logged: Vec<(Cell, Cell)> = machine
            .transition_log()
            .records()
            .map(|r| (r.from.clone(), r.to.clone()))
            .collect();
        prop_assert_eq!(logged, transitions);
    }

    #[test]
    fn shutdown_always_leaves_nothing_active(
        signals in prop::collection::vec(arbitrary_signal(), 0..20)
    ) {
        let mut machine = Machine::new(Arc::new(definition(HistoryMode::Deep)), MachineConfig::default());
        machine.start().unwrap();
        for signal in signals {
            machine.signal(signal).unwrap();
        }
        machine.process_pending().unwrap();
        machine.shutdown().unwrap();

        prop_assert!(machine.active_states().is_empty());
        for (region, _, _) in REGIONS {
            prop_assert!(machine.active_in(region).is_none());
        }
    }

    #[test]
    fn state_names_match_variants(variant in 0..8usize) {
        let all = [
            Cell::Idle,
            Cell::Work,
            Cell::Pick,
            Cell::Place,
            Cell::Inspect,
            Cell::Vision,
            Cell::Lidar,
            Cell::Fault,
        ];
        let state = &all[variant];
        prop_assert_eq!(state.name(), format!("{state:?}"));

        let json = serde_json::to_string(state).unwrap();
        let restored: Cell = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(&restored, state);
    }
}
