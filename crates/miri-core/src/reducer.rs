use std::sync::Arc;

use super::actions::AppAction;
use super::actions::RuntimeAction;
use super::actions::UserAction;
use super::protocol::AnalysisRequest;
use super::report::LineAnchor;
use super::state::AppOverlay;
use super::state::AppState;
use super::state::AppTab;
use super::state::ChatRole;
use super::state::ExportRecord;
use super::state::LogEntry;
use super::state::RunError;
use super::state::RunPhase;

pub const SCROLL_TO_REPORT_DELAY_MS: u64 = 300;
pub const COMPLETION_MESSAGE: &str =
    "분석이 완료되었습니다. 리포트 탭에서 결과를 확인하세요.";
pub const NOTHING_TO_EXPORT_MESSAGE: &str = "저장할 보고서가 아직 없습니다.";
const EMPTY_ERROR_FALLBACK: &str = "알 수 없는 오류";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEffect {
    RequestFrame,
    StartAnalysis(AnalysisRequest),
    /// Switch to the report once `delay_ms` has elapsed.
    ScheduleScrollToReport {
        delay_ms: u64,
    },
    ExportReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunTrigger {
    Submit,
    WhatIfToggle,
}

pub fn format_run_error(message: &str) -> String {
    let message = message.trim();
    let message = if message.is_empty() {
        EMPTY_ERROR_FALLBACK
    } else {
        message
    };
    format!("분석 중 오류가 발생했습니다: {message}")
}

pub fn reduce(state: &mut AppState, action: AppAction) -> Vec<AppEffect> {
    match action {
        AppAction::User(user) => reduce_user(state, user),
        AppAction::Runtime(runtime) => reduce_runtime(state, runtime),
    }
}

fn reduce_user(state: &mut AppState, action: UserAction) -> Vec<AppEffect> {
    match action {
        UserAction::InputChar(ch) => {
            state.session.idea_input.push(ch);
            vec![AppEffect::RequestFrame]
        }
        UserAction::InputBackspace => {
            state.session.idea_input.pop();
            vec![AppEffect::RequestFrame]
        }
        UserAction::InputPaste(text) => {
            state.session.idea_input.push_str(&text);
            vec![AppEffect::RequestFrame]
        }
        UserAction::ClearInput => {
            state.session.idea_input.clear();
            vec![AppEffect::RequestFrame]
        }
        UserAction::SetInputFocus(focused) => {
            state.interaction.focus_in_input = focused;
            vec![AppEffect::RequestFrame]
        }
        UserAction::SubmitIdea { now_ms } => {
            let idea = state.session.idea_input.trim().to_string();
            start_run(state, RunTrigger::Submit, idea, now_ms)
        }
        UserAction::ToggleWhatIf { variable, now_ms } => toggle_what_if(state, &variable, now_ms),
        UserAction::ToggleWhatIfAt { position, now_ms } => {
            let variable = position.checked_sub(1).and_then(|idx| {
                state
                    .result()
                    .and_then(|result| result.what_ifs.get(idx))
                    .map(|trigger| trigger.variable_name.clone())
            });
            match variable {
                Some(variable) => toggle_what_if(state, &variable, now_ms),
                None => {
                    tracing::debug!(position, "no what-if scenario at position");
                    Vec::new()
                }
            }
        }
        UserAction::NextTab => {
            state.tab = state.tab.next();
            vec![AppEffect::RequestFrame]
        }
        UserAction::PrevTab => {
            state.tab = state.tab.prev();
            vec![AppEffect::RequestFrame]
        }
        UserAction::SelectTab(tab) => {
            state.tab = tab;
            vec![AppEffect::RequestFrame]
        }
        UserAction::ScrollReport(delta) => {
            let Some(doc) = state.report_document() else {
                return Vec::new();
            };
            let max = doc.lines().len().saturating_sub(1);
            let current = state.selection.report_scroll as i64;
            let next = (current + i64::from(delta)).clamp(0, max as i64);
            state.selection.report_scroll = next as usize;
            vec![AppEffect::RequestFrame]
        }
        UserAction::ScrollToReport => {
            scroll_to_report(state);
            vec![AppEffect::RequestFrame]
        }
        UserAction::NextCitation => move_citation_cursor(state, true),
        UserAction::PrevCitation => move_citation_cursor(state, false),
        UserAction::FollowCitation => {
            let target = state.selection.citation_cursor.and_then(|cursor| {
                state
                    .report_document()
                    .and_then(|doc| doc.citation_indices().get(cursor).copied())
            });
            match target {
                Some(index) => jump_to_reference(state, index),
                None => Vec::new(),
            }
        }
        UserAction::JumpToReference(index) => jump_to_reference(state, index),
        UserAction::RequestExport => {
            if state.report.result.is_some() {
                vec![AppEffect::ExportReport]
            } else {
                state.interaction.overlay = AppOverlay::Notice {
                    title: "보고서 저장".to_string(),
                    message: NOTHING_TO_EXPORT_MESSAGE.to_string(),
                };
                vec![AppEffect::RequestFrame]
            }
        }
        UserAction::CycleTheme => {
            state.customization.theme = state.customization.theme.next();
            vec![AppEffect::RequestFrame]
        }
        UserAction::ShowHelp => {
            state.interaction.overlay = AppOverlay::Help;
            vec![AppEffect::RequestFrame]
        }
        UserAction::CloseOverlay => {
            state.interaction.overlay = AppOverlay::None;
            vec![AppEffect::RequestFrame]
        }
    }
}

fn toggle_what_if(state: &mut AppState, variable: &str, now_ms: u64) -> Vec<AppEffect> {
    if state.run.loading {
        tracing::warn!(variable, "what-if toggle ignored while an analysis is running");
        return Vec::new();
    }
    let active = state.session.toggle_what_if(variable);
    tracing::info!(variable, active, "what-if toggled");
    let idea = state.session.idea_input.trim().to_string();
    let mut effects = start_run(state, RunTrigger::WhatIfToggle, idea, now_ms);
    if effects.is_empty() {
        effects.push(AppEffect::RequestFrame);
    }
    effects
}

/// Begins a new run if no run is in flight and there is something to analyse.
/// Returns no effects when the start is rejected.
fn start_run(
    state: &mut AppState,
    trigger: RunTrigger,
    idea: String,
    now_ms: u64,
) -> Vec<AppEffect> {
    if !state.can_start_run() {
        tracing::warn!(run_id = state.run.run_id, "analysis already running; start rejected");
        return Vec::new();
    }
    let has_idea = !idea.is_empty();
    if !has_idea && state.session.active_what_ifs.is_empty() {
        tracing::debug!(?trigger, "nothing to analyse");
        return Vec::new();
    }

    state.run.run_id += 1;
    state.run.phase = RunPhase::Running;
    state.run.loading = true;
    state.run.started_at_ms = Some(now_ms);
    state.run.elapsed_ms = 0;
    state.run.last_error = None;
    state.logs.clear();

    if has_idea {
        state.chat.push(ChatRole::User, idea.clone(), false);
        state.session.idea_input.clear();
    }

    let request = state.session.build_request(idea);
    tracing::info!(
        run_id = state.run.run_id,
        what_ifs = request.what_ifs.len(),
        ?trigger,
        "analysis started"
    );
    vec![AppEffect::StartAnalysis(request), AppEffect::RequestFrame]
}

fn move_citation_cursor(state: &mut AppState, forward: bool) -> Vec<AppEffect> {
    let Some(doc) = state.report_document() else {
        return Vec::new();
    };
    let total = doc.citation_indices().len();
    if total == 0 {
        state.selection.citation_cursor = None;
        return vec![AppEffect::RequestFrame];
    }
    state.selection.citation_cursor = Some(match state.selection.citation_cursor {
        None if forward => 0,
        None => total - 1,
        Some(cursor) if forward => (cursor + 1) % total,
        Some(cursor) => (cursor + total - 1) % total,
    });
    vec![AppEffect::RequestFrame]
}

fn scroll_to_report(state: &mut AppState) {
    state.tab = AppTab::Report;
    state.selection.report_scroll = 0;
}

fn jump_to_reference(state: &mut AppState, index: usize) -> Vec<AppEffect> {
    let Some(doc) = state.report_document() else {
        return Vec::new();
    };
    let Some(line) = doc.anchor_line(LineAnchor::Reference(index)) else {
        tracing::debug!(index, "citation points past the reference list");
        return Vec::new();
    };
    state.tab = AppTab::Report;
    state.selection.focused_reference = Some(index);
    state.selection.report_scroll = line;
    vec![AppEffect::RequestFrame]
}

fn reduce_runtime(state: &mut AppState, action: RuntimeAction) -> Vec<AppEffect> {
    match action {
        RuntimeAction::Tick { now_ms } => {
            if !state.run.loading {
                return Vec::new();
            }
            let Some(started) = state.run.started_at_ms else {
                return Vec::new();
            };
            let elapsed = now_ms.saturating_sub(started);
            if elapsed > state.run.elapsed_ms {
                state.run.elapsed_ms = elapsed;
                return vec![AppEffect::RequestFrame];
            }
            Vec::new()
        }
        RuntimeAction::AppendLog(message) => {
            state.logs.append(LogEntry {
                seq: 0,
                message,
                run_id: state.run.run_id,
            });
            vec![AppEffect::RequestFrame]
        }
        RuntimeAction::AppendAssistantMessage(message) => {
            state.chat.push(ChatRole::Assistant, message, false);
            vec![AppEffect::RequestFrame]
        }
        RuntimeAction::ApplyResult { result, now_ms } => {
            state.report.result = Some(*result);
            state.report.result_run_id = state.run.run_id;
            state.run.execution_time_secs = state
                .run
                .started_at_ms
                .map(|started| now_ms.saturating_sub(started) as f64 / 1000.0);
            state.run.phase = RunPhase::Completed;
            state.selection.citation_cursor = None;
            state.selection.focused_reference = None;
            state.chat.push(ChatRole::Assistant, COMPLETION_MESSAGE, true);
            tracing::info!(
                run_id = state.run.run_id,
                secs = state.run.execution_time_secs,
                "analysis result applied"
            );
            vec![
                AppEffect::ScheduleScrollToReport {
                    delay_ms: SCROLL_TO_REPORT_DELAY_MS,
                },
                AppEffect::RequestFrame,
            ]
        }
        RuntimeAction::RunFailed { message } => {
            tracing::warn!(run_id = state.run.run_id, %message, "analysis failed");
            state.chat.push(ChatRole::Assistant, format_run_error(&message), false);
            state.run.phase = RunPhase::Failed;
            state.run.last_error = Some(RunError {
                message: Arc::from(message),
                run_id: state.run.run_id,
            });
            vec![AppEffect::RequestFrame]
        }
        RuntimeAction::RunFinished => {
            state.run.loading = false;
            if state.run.phase == RunPhase::Running {
                state.run.phase = RunPhase::Completed;
            }
            vec![AppEffect::RequestFrame]
        }
        RuntimeAction::ExportFinished { path, pages } => {
            state.interaction.overlay = AppOverlay::Notice {
                title: "보고서 저장 완료".to_string(),
                message: format!("{path} ({pages}쪽)"),
            };
            state.last_export = Some(ExportRecord { path, pages });
            vec![AppEffect::RequestFrame]
        }
        RuntimeAction::ExportFailed { message } => {
            tracing::warn!(%message, "report export failed");
            state.interaction.overlay = AppOverlay::Notice {
                title: "보고서 저장 실패".to_string(),
                message: format!("보고서 저장 중 오류가 발생했습니다: {message}"),
            };
            vec![AppEffect::RequestFrame]
        }
    }
}

#[cfg(test)]
mod tests;
