// tests/worker_state_machine.rs

use procsync::worker::WorkerState;
use procsync::worker::WorkerState::*;

const ALL: [WorkerState; 6] = [Created, Running, Paused, Completed, Terminated, Failed];

#[test]
fn test_terminal_states_are_absorbing() {
    for from in ALL.iter().copied().filter(|s| s.is_terminal()) {
        for to in ALL {
            assert!(
                !from.can_transition_to(to),
                "{from} must not transition to {to}"
            );
            assert_eq!(from.transition(to), None);
        }
    }
}

#[test]
fn test_pause_only_between_running_states() {
    assert!(Running.can_transition_to(Paused));
    assert!(Paused.can_transition_to(Running));

    assert!(!Created.can_transition_to(Paused));
    assert!(!Paused.can_transition_to(Paused));
    assert!(!Paused.can_transition_to(Completed));
    assert!(!Paused.can_transition_to(Created));
}

#[test]
fn test_paused_worker_can_be_stopped() {
    assert_eq!(Paused.transition(Terminated), Some(Terminated));
    assert_eq!(Paused.transition(Failed), Some(Failed));
}

#[test]
fn test_running_reaches_every_terminal_state() {
    for to in [Completed, Terminated, Failed] {
        assert_eq!(Running.transition(to), Some(to));
    }
    assert!(!Running.can_transition_to(Running));
    assert!(!Running.can_transition_to(Created));
}

#[test]
fn test_created_only_starts_or_fails() {
    let allowed: Vec<_> = ALL
        .into_iter()
        .filter(|&to| Created.can_transition_to(to))
        .collect();
    assert_eq!(allowed, vec![Running, Failed]);
}

#[test]
fn test_display_names() {
    assert_eq!(Running.to_string(), "Running");
    assert_eq!(Terminated.as_str(), "Terminated");
}
