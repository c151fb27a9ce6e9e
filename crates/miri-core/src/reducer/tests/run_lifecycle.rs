use super::*;
use pretty_assertions::assert_eq;

#[test]
fn submit_starts_run_with_trimmed_idea_and_clears_input() {
    let mut state = state();
    let effects = submit(&mut state, "  공유 주방 창업  ", 1_000);

    let request = started_request(&effects).expect("start effect");
    assert_eq!(request.idea, "공유 주방 창업");
    assert_eq!(request.thread_id, "thread-1");
    assert!(request.what_ifs.is_empty());

    assert!(state.run.loading);
    assert_eq!(state.run.phase, RunPhase::Running);
    assert_eq!(state.run.run_id, 1);
    assert_eq!(state.run.started_at_ms, Some(1_000));
    assert_eq!(state.session.idea_input, "");

    let last = state.chat.last().expect("user bubble");
    assert_eq!(last.role, ChatRole::User);
    assert_eq!(last.content, "공유 주방 창업");
    assert!(!last.is_system);
}

#[test]
fn blank_submit_without_toggles_is_a_no_op() {
    let mut state = state();
    let effects = submit(&mut state, "   ", 1_000);

    assert!(effects.is_empty());
    assert!(!state.run.loading);
    assert_eq!(state.run.phase, RunPhase::Idle);
    assert!(state.chat.is_empty());
    assert_eq!(state.session.idea_input, "   ");
}

#[test]
fn second_start_is_rejected_while_loading() {
    let mut state = state();
    submit(&mut state, "first", 1_000);

    let effects = submit(&mut state, "second", 2_000);

    assert!(effects.is_empty());
    assert_eq!(state.run.run_id, 1);
    assert_eq!(state.run.started_at_ms, Some(1_000));
    assert_eq!(state.chat.len(), 1);
    assert_eq!(state.session.idea_input, "second");
}

#[test]
fn result_sets_execution_time_and_schedules_report_jump() {
    let mut state = state();
    submit(&mut state, "idea", 1_000);

    let effects = run_runtime(
        &mut state,
        RuntimeAction::ApplyResult {
            result: Box::new(sample_result()),
            now_ms: 3_500,
        },
    );

    assert_eq!(
        effects,
        vec![
            AppEffect::ScheduleScrollToReport {
                delay_ms: SCROLL_TO_REPORT_DELAY_MS
            },
            AppEffect::RequestFrame,
        ]
    );
    assert_eq!(state.run.execution_time_secs, Some(2.5));
    assert_eq!(state.report.result_run_id, 1);
    assert!(state.result().is_some());

    let last = state.chat.last().expect("completion bubble");
    assert_eq!(last.role, ChatRole::Assistant);
    assert_eq!(last.content, COMPLETION_MESSAGE);
    assert!(last.is_system);

    // Still loading until the stream itself ends.
    assert!(state.run.loading);
    run_runtime(&mut state, RuntimeAction::RunFinished);
    assert!(!state.run.loading);
    assert_eq!(state.run.phase, RunPhase::Completed);
}

#[test]
fn failure_appends_error_bubble_and_keeps_previous_result() {
    let mut state = state();
    complete_run(&mut state, "first", 0, 1_000);
    let previous = state.report.result.clone();

    submit(&mut state, "second", 2_000);
    run_runtime(
        &mut state,
        RuntimeAction::RunFailed {
            message: "HTTP 500".to_string(),
        },
    );
    run_runtime(&mut state, RuntimeAction::RunFinished);

    assert_eq!(state.report.result, previous);
    assert_eq!(state.run.phase, RunPhase::Failed);
    assert!(!state.run.loading);
    let last = state.chat.last().expect("error bubble");
    assert_eq!(last.role, ChatRole::Assistant);
    assert_eq!(last.content, "분석 중 오류가 발생했습니다: HTTP 500");
    assert!(!last.is_system);
    assert_eq!(
        state.run.last_error.as_ref().map(|err| err.message.as_ref()),
        Some("HTTP 500")
    );
}

#[test]
fn stream_ending_without_result_still_stops_loading() {
    let mut state = state();
    submit(&mut state, "idea", 0);
    run_runtime(&mut state, RuntimeAction::AppendLog("step".to_string()));
    run_runtime(&mut state, RuntimeAction::RunFinished);

    assert!(!state.run.loading);
    assert_eq!(state.run.phase, RunPhase::Completed);
    assert!(state.result().is_none());
    assert!(state.shows_log_panel());
}

#[test]
fn assistant_messages_append_in_arrival_order() {
    let mut state = state();
    submit(&mut state, "idea", 0);
    run_runtime(
        &mut state,
        RuntimeAction::AppendAssistantMessage("첫 번째".to_string()),
    );
    run_runtime(
        &mut state,
        RuntimeAction::AppendAssistantMessage("두 번째".to_string()),
    );

    let contents: Vec<&str> = state.chat.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["idea", "첫 번째", "두 번째"]);
}

#[test]
fn error_text_falls_back_when_message_is_blank() {
    assert_eq!(
        format_run_error("  "),
        "분석 중 오류가 발생했습니다: 알 수 없는 오류"
    );
}

#[test]
fn export_request_without_result_shows_notice() {
    let mut state = state();
    let effects = run_user(&mut state, UserAction::RequestExport);
    assert_eq!(effects, vec![AppEffect::RequestFrame]);
    assert!(matches!(state.interaction.overlay, AppOverlay::Notice { .. }));

    complete_run(&mut state, "idea", 0, 10);
    let effects = run_user(&mut state, UserAction::RequestExport);
    assert_eq!(effects, vec![AppEffect::ExportReport]);
}

#[test]
fn export_outcomes_are_reported_in_overlay() {
    let mut state = state();
    run_runtime(
        &mut state,
        RuntimeAction::ExportFinished {
            path: "/tmp/MIRI_Legal_Report.txt".to_string(),
            pages: 2,
        },
    );
    assert_eq!(
        state.last_export.as_ref().map(|record| record.pages),
        Some(2)
    );
    assert_eq!(
        state.interaction.overlay,
        AppOverlay::Notice {
            title: "보고서 저장 완료".to_string(),
            message: "/tmp/MIRI_Legal_Report.txt (2쪽)".to_string(),
        }
    );

    run_runtime(
        &mut state,
        RuntimeAction::ExportFailed {
            message: "disk full".to_string(),
        },
    );
    assert!(state.last_export.is_some());
    assert!(matches!(
        &state.interaction.overlay,
        AppOverlay::Notice { title, .. } if title == "보고서 저장 실패"
    ));
}
