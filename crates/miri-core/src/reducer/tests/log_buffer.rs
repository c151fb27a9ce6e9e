use super::*;
use pretty_assertions::assert_eq;

#[test]
fn log_seq_is_monotonic_within_a_run() {
    let mut state = state();
    submit(&mut state, "idea", 0);
    for message in ["one", "two", "three"] {
        run_runtime(&mut state, RuntimeAction::AppendLog(message.to_string()));
    }

    let seqs: Vec<u64> = state.logs.iter().map(|entry| entry.seq).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    assert_eq!(state.logs.messages(), vec!["one", "two", "three"]);
    assert!(state.logs.iter().all(|entry| entry.run_id == 1));
}

#[test]
fn new_run_clears_previous_logs() {
    let mut state = state();
    complete_run(&mut state, "first", 0, 100);
    assert_eq!(state.logs.len(), 1);

    submit(&mut state, "second", 200);
    assert!(state.logs.is_empty());

    run_runtime(&mut state, RuntimeAction::AppendLog("again".to_string()));
    let entry = state.logs.iter().next().expect("log entry");
    assert_eq!(entry.seq, 1);
    assert_eq!(entry.run_id, 2);
}

#[test]
fn logs_of_a_later_run_never_clear_the_result() {
    let mut state = state();
    complete_run(&mut state, "first", 0, 100);
    let previous = state.report.result.clone();

    submit(&mut state, "second", 200);
    run_runtime(&mut state, RuntimeAction::AppendLog("step 1".to_string()));
    run_runtime(&mut state, RuntimeAction::AppendLog("step 2".to_string()));

    assert_eq!(state.report.result, previous);
    assert!(state.shows_log_panel());
}

#[test]
fn log_panel_hides_once_result_arrives() {
    let mut state = state();
    complete_run(&mut state, "idea", 0, 100);
    assert!(!state.shows_log_panel());
}
