pub(super) use super::format_run_error;
pub(super) use super::reduce;
pub(super) use super::AppEffect;
pub(super) use super::COMPLETION_MESSAGE;
pub(super) use super::SCROLL_TO_REPORT_DELAY_MS;
pub(super) use crate::actions::AppAction;
pub(super) use crate::actions::RuntimeAction;
pub(super) use crate::actions::UserAction;
pub(super) use crate::analysis::AnalysisResult;
pub(super) use crate::analysis::ReferenceItem;
pub(super) use crate::analysis::Verdict;
pub(super) use crate::analysis::WhatIfTrigger;
pub(super) use crate::state::AppOverlay;
pub(super) use crate::state::AppState;
pub(super) use crate::state::AppTab;
pub(super) use crate::state::ChatRole;
pub(super) use crate::state::RunPhase;
pub(super) use crate::state::ThreadId;

mod log_buffer;
mod run_lifecycle;

fn state() -> AppState {
    AppState::new(ThreadId("thread-1".to_string()))
}

fn run_user(state: &mut AppState, action: UserAction) -> Vec<AppEffect> {
    reduce(state, AppAction::User(action))
}

fn run_runtime(state: &mut AppState, action: RuntimeAction) -> Vec<AppEffect> {
    reduce(state, AppAction::Runtime(action))
}

fn type_idea(state: &mut AppState, idea: &str) {
    for ch in idea.chars() {
        run_user(state, UserAction::InputChar(ch));
    }
}

fn submit(state: &mut AppState, idea: &str, now_ms: u64) -> Vec<AppEffect> {
    type_idea(state, idea);
    run_user(state, UserAction::SubmitIdea { now_ms })
}

fn sample_result() -> AnalysisResult {
    AnalysisResult {
        verdict: Some(Verdict {
            verdict: "Caution".to_string(),
            summary: "위반 소지 있음 [1] 참고".to_string(),
            citation: None,
            key_issues: vec!["영업신고 필요 [2]".to_string()],
        }),
        what_ifs: vec![
            WhatIfTrigger {
                variable_name: "night_only".to_string(),
                description: "야간에만 운영".to_string(),
                is_active: false,
            },
            WhatIfTrigger {
                variable_name: "no_alcohol".to_string(),
                description: "주류 미판매".to_string(),
                is_active: false,
            },
        ],
        references: vec![
            ReferenceItem {
                title: "식품위생법".to_string(),
                url: "https://law.example/1".to_string(),
            },
            ReferenceItem {
                title: "식품위생법 시행령".to_string(),
                url: "https://law.example/2".to_string(),
            },
        ],
        ..AnalysisResult::default()
    }
}

/// Drives one complete run to a result: start, a log line, result, finish.
fn complete_run(state: &mut AppState, idea: &str, started_ms: u64, finished_ms: u64) {
    let effects = submit(state, idea, started_ms);
    assert!(
        matches!(effects.first(), Some(AppEffect::StartAnalysis(_))),
        "run should start, got {effects:?}"
    );
    run_runtime(state, RuntimeAction::AppendLog("법령 검색 중".to_string()));
    run_runtime(
        state,
        RuntimeAction::ApplyResult {
            result: Box::new(sample_result()),
            now_ms: finished_ms,
        },
    );
    run_runtime(state, RuntimeAction::RunFinished);
}

fn started_request(effects: &[AppEffect]) -> Option<&crate::protocol::AnalysisRequest> {
    effects.iter().find_map(|effect| match effect {
        AppEffect::StartAnalysis(request) => Some(request),
        _ => None,
    })
}
