//! End-to-end scenarios for the PBFT coordinator.
//!
//! These drive `PbftState` purely through events, the same way a runner
//! does, and check the observable logs and actions.

use quorumsim_bft::{PbftConfig, PbftState, CONSENSUS_FAILED};
use quorumsim_core::{Action, Event, StateMachine, TimerId};
use quorumsim_types::{
    fault_tolerance, MessageKind, NodeId, NodePhase, Phase, Recipient, Sender, Value,
};
use std::time::Duration;
use tracing_test::traced_test;

fn fixed(n: usize, byzantine: &[u32]) -> PbftConfig {
    PbftConfig::default()
        .with_node_count(n)
        .with_fixed_byzantine(byzantine.iter().copied().map(NodeId))
}

fn run_round(state: &mut PbftState, value: &str) -> Vec<Action> {
    let mut actions = state.handle(Event::StartRound);
    actions.extend(state.handle(Event::SubmitValue {
        value: Value::from(value),
    }));
    actions
}

fn resume_timer(actions: &[Action]) -> Option<(TimerId, Duration)> {
    actions.iter().find_map(|action| match action {
        Action::SetTimer { id, duration } => Some((*id, *duration)),
        _ => None,
    })
}

/// Four honest nodes commit the submitted value with the full message pattern.
#[traced_test]
#[test]
fn test_honest_cluster_commits() {
    let mut state = PbftState::new(PbftConfig::new(4, 0.0, true)).unwrap();
    let actions = run_round(&mut state, "A");

    let block = match actions.as_slice() {
        [Action::EmitCommittedBlock { block }] => block.clone(),
        other => panic!("unexpected actions: {other:?}"),
    };
    assert_eq!(block.number, 0);
    assert_eq!(block.value, Value::from("A"));
    assert!(!block.is_subverted);
    assert_eq!(block.leader, NodeId(0));

    // 3 pre-prepare + 3 * 3 prepare + 4 * 3 commit
    assert_eq!(state.messages().len(), 24);
    assert_eq!(state.phase(), Phase::Idle);
}

/// Every directed message is stamped with the sender's view.
#[test]
fn test_messages_carry_view() {
    let mut state = PbftState::new(fixed(4, &[1, 2])).unwrap();
    state.handle(Event::StartRound);
    for _ in 0..3 {
        state.handle(Event::SubmitValue {
            value: Value::from("A"),
        });
    }
    assert_eq!(state.view(), 1);

    let mark = state.messages().len();
    state.handle(Event::StartRound);
    state.handle(Event::SubmitValue {
        value: Value::from("A"),
    });
    assert!(state.messages().since(mark).iter().all(|m| m.view == 1));
}

/// One Byzantine follower out of four is tolerated.
#[test]
fn test_single_byzantine_follower() {
    let mut state = PbftState::new(fixed(4, &[1])).unwrap();
    run_round(&mut state, "A");

    assert!(state.is_fault_tolerant());
    let block = state.decisions().last().unwrap();
    assert_eq!(block.value, Value::from("A"));
    assert!(!block.is_subverted);

    // The Byzantine follower reported the inverted value in its votes.
    let from_one: Vec<&str> = state
        .messages()
        .iter()
        .filter(|m| m.from == Sender::Node(NodeId(1)) && m.kind == MessageKind::Commit)
        .map(|m| m.value.as_str())
        .collect();
    assert_eq!(from_one, vec!["B", "B", "B"]);
}

/// Any tolerated number of Byzantine followers leaves an honest leader's value
/// intact, with the full message pattern for the cluster size.
#[test]
fn test_honest_leader_prevails_up_to_tolerance() {
    for n in 4..=16usize {
        let f = fault_tolerance(n);
        for b in 0..=f {
            // Leader of the first round is node 0; corrupt the highest ids.
            let byzantine: Vec<u32> = ((n - b) as u32..n as u32).collect();
            let mut state = PbftState::new(fixed(n, &byzantine)).unwrap();
            run_round(&mut state, "A");

            assert_eq!(state.byzantine_count(), b, "n={n} b={b}");
            assert!(state.is_fault_tolerant(), "n={n} b={b}");
            assert_eq!(state.decisions().len(), 1, "n={n} b={b}");
            let block = state.decisions().last().unwrap();
            assert_eq!(block.value, Value::from("A"), "n={n} b={b}");
            assert!(!block.is_subverted, "n={n} b={b}");
            assert_eq!(block.leader, NodeId(0), "n={n} b={b}");

            let log = state.messages();
            assert_eq!(log.count_kind(MessageKind::PrePrepare), n - 1, "n={n} b={b}");
            assert_eq!(log.count_kind(MessageKind::Prepare), (n - 1) * (n - 1), "n={n} b={b}");
            assert_eq!(log.count_kind(MessageKind::Commit), n * (n - 1), "n={n} b={b}");
            assert_eq!(
                log.len(),
                (n - 1) + (n - 1) * (n - 1) + n * (n - 1),
                "n={n} b={b}"
            );
        }
    }
}

/// A Byzantine leader corrupts the proposal before anyone sees it.
#[test]
fn test_byzantine_leader_subverts() {
    let mut state = PbftState::new(fixed(4, &[0])).unwrap();
    run_round(&mut state, "A");

    let block = state.decisions().last().unwrap();
    assert_eq!(block.value, Value::from("B"));
    assert!(block.is_subverted);
}

/// Two Byzantine nodes in a cluster of four force a view change after three
/// failed attempts; the resumption timer brings the cluster back to PROPOSE.
#[traced_test]
#[test]
fn test_view_change_after_repeated_failure() {
    let mut state = PbftState::new(fixed(4, &[1, 2])).unwrap();
    assert!(!state.is_fault_tolerant());

    let first = run_round(&mut state, "A");
    assert_eq!(
        first,
        vec![Action::EmitQuorumFailure {
            view: 0,
            failure_count: 1
        }]
    );
    assert_eq!(state.phase(), Phase::Propose);

    let second = state.handle(Event::SubmitValue {
        value: Value::from("A"),
    });
    assert!(resume_timer(&second).is_none());
    assert_eq!(state.failure_count(), 2);

    let third = state.handle(Event::SubmitValue {
        value: Value::from("A"),
    });
    assert_eq!(state.phase(), Phase::ViewChange);
    assert_eq!(state.view(), 1);
    assert_eq!(state.failure_count(), 0);
    assert!(state.decisions().is_empty());

    let errors: Vec<_> = state
        .messages()
        .iter()
        .filter(|m| m.kind == MessageKind::Error)
        .collect();
    assert_eq!(errors.len(), 12);
    assert!(errors
        .iter()
        .all(|m| m.from == Sender::System && m.value == CONSENSUS_FAILED));

    assert!(third
        .iter()
        .any(|a| matches!(a, Action::EmitViewChange { view: 1, .. })));
    let notice = state
        .messages()
        .iter()
        .find(|m| m.kind == MessageKind::ViewChange)
        .unwrap();
    assert_eq!(notice.to, Recipient::Broadcast);
    assert_eq!(notice.value, "View changed to 1");

    let (timer, delay) = resume_timer(&third).unwrap();
    assert_eq!(delay, Duration::from_secs(2));

    // Submissions during the view change are ignored.
    assert!(state
        .handle(Event::SubmitValue {
            value: Value::from("A")
        })
        .is_empty());

    // A timer from another generation is rejected.
    let TimerId::ViewChangeResume { generation } = timer;
    state.handle(Event::ViewChangeTimer {
        generation: generation + 7,
    });
    assert_eq!(state.phase(), Phase::ViewChange);

    state.handle(timer.into_event());
    assert_eq!(state.phase(), Phase::Propose);
    assert!(state
        .replicas()
        .iter()
        .all(|r| r.view() == 1 && r.phase() == NodePhase::Idle));

    // Firing twice has no further effect.
    state.handle(timer.into_event());
    assert_eq!(state.phase(), Phase::Propose);
}

/// Block numbers follow the decision log length across rounds.
#[test]
fn test_block_numbers_increase() {
    let mut state = PbftState::new(PbftConfig::new(7, 0.0, true)).unwrap();
    for (i, value) in ["A", "B", "A", "A", "B"].iter().enumerate() {
        run_round(&mut state, value);
        let block = state.decisions().last().unwrap();
        assert_eq!(block.number, i as u64);
        assert_eq!(block.value, Value::from(*value));
        assert_eq!(block.leader, NodeId(i as u32 % 7));
    }
    assert_eq!(state.decisions().len(), 5);
    assert_eq!(state.stats().rounds_started, 5);
}

/// Stepping one phase at a time yields the same logs as auto-advance.
#[test]
fn test_step_mode_equivalence() {
    let mut auto = PbftState::new(fixed(10, &[4, 9])).unwrap();
    run_round(&mut auto, "B");

    let mut stepped = PbftState::new(fixed(10, &[4, 9]).with_auto_advance(false)).unwrap();
    run_round(&mut stepped, "B");
    let mut phases = vec![stepped.phase()];
    while stepped.phase() != Phase::Idle {
        stepped.handle(Event::Advance);
        phases.push(stepped.phase());
    }

    assert_eq!(
        phases,
        vec![Phase::PrePrepare, Phase::Prepare, Phase::Commit, Phase::Idle]
    );
    assert_eq!(stepped.messages().as_slice(), auto.messages().as_slice());
    assert_eq!(stepped.decisions().as_slice(), auto.decisions().as_slice());
}

/// Reconfiguring mid-round aborts to IDLE and keeps history.
#[test]
fn test_configure_mid_round() {
    let mut state =
        PbftState::new(PbftConfig::new(4, 0.0, true).with_auto_advance(false)).unwrap();
    run_round(&mut state, "A");
    state.handle(Event::Advance);
    assert_eq!(state.phase(), Phase::Prepare);
    let logged = state.messages().len();

    state.configure(PbftConfig::new(13, 0.0, true)).unwrap();
    assert_eq!(state.phase(), Phase::Idle);
    assert_eq!(state.replicas().len(), 13);
    assert_eq!(state.quorum().threshold(), 9);
    assert_eq!(state.messages().len(), logged);

    run_round(&mut state, "A");
    assert_eq!(state.decisions().len(), 1);
}

/// The per-node filter keeps directed traffic and broadcasts only.
#[test]
fn test_messages_for_node() {
    let mut state = PbftState::new(PbftConfig::new(4, 0.0, true)).unwrap();
    run_round(&mut state, "A");

    let node3 = state.messages_for(NodeId(3));
    assert!(node3.iter().all(|m| m.involves(NodeId(3))));
    // Sent 3 prepare + 3 commit, received 1 pre-prepare + 2 prepare + 3 commit.
    assert_eq!(node3.len(), 12);
}

/// The same seed produces the same Byzantine assignment.
#[test]
fn test_seeded_assignment_is_reproducible() {
    let config = PbftConfig::default().with_seed(2024);
    let a = PbftState::new(config.clone()).unwrap();
    let b = PbftState::new(config).unwrap();

    let flags = |s: &PbftState| -> Vec<bool> {
        s.replicas().iter().map(|r| r.is_byzantine()).collect()
    };
    assert_eq!(flags(&a), flags(&b));
    assert_eq!(a.replicas().len(), 12);
}
