use std::sync::Arc;

use crate::analysis::AnalysisResult;
use crate::protocol::AnalysisRequest;
use crate::report::ReportDocument;

/// Wall-clock milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppTab {
    Chat,
    Logs,
    Report,
}

impl AppTab {
    pub const ALL: [AppTab; 3] = [Self::Chat, Self::Logs, Self::Report];

    pub fn next(self) -> Self {
        match self {
            Self::Chat => Self::Logs,
            Self::Logs => Self::Report,
            Self::Report => Self::Chat,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Self::Chat => Self::Report,
            Self::Logs => Self::Chat,
            Self::Report => Self::Logs,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Chat => "Chat",
            Self::Logs => "Logs",
            Self::Report => "Report",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Running,
    Completed,
    Failed,
}

impl RunPhase {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiTheme {
    Classic,
    NeonNoir,
    ForestZen,
}

impl UiTheme {
    pub fn next(self) -> Self {
        match self {
            Self::Classic => Self::NeonNoir,
            Self::NeonNoir => Self::ForestZen,
            Self::ForestZen => Self::Classic,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::NeonNoir => "neon-noir",
            Self::ForestZen => "forest-zen",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "classic" => Some(Self::Classic),
            "neon-noir" | "neon_noir" => Some(Self::NeonNoir),
            "forest-zen" | "forest_zen" => Some(Self::ForestZen),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "you",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub is_system: bool,
}

/// Append-only conversation log. Messages are never edited once pushed.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    next_seq: u64,
    messages: Vec<ChatMessage>,
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self {
            next_seq: 1,
            messages: Vec::new(),
        }
    }
}

impl ChatHistory {
    pub fn push(&mut self, role: ChatRole, content: impl Into<String>, is_system: bool) -> &ChatMessage {
        let id = format!("msg-{}", self.next_seq);
        self.next_seq += 1;
        self.messages.push(ChatMessage {
            id,
            role,
            content: content.into(),
            is_system,
        });
        &self.messages[self.messages.len() - 1]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub seq: u64,
    pub message: String,
    pub run_id: u64,
}

/// Progress lines of the current run, in arrival order.
#[derive(Debug, Clone)]
pub struct LogBuffer {
    next_seq: u64,
    buf: Vec<LogEntry>,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self {
            next_seq: 1,
            buf: Vec::new(),
        }
    }
}

impl LogBuffer {
    pub fn append(&mut self, mut entry: LogEntry) {
        entry.seq = self.next_seq;
        self.next_seq += 1;
        self.buf.push(entry);
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.next_seq = 1;
    }

    pub fn iter(&self) -> impl Iterator<Item = &LogEntry> {
        self.buf.iter()
    }

    pub fn messages(&self) -> Vec<&str> {
        self.buf.iter().map(|entry| entry.message.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub thread_id: ThreadId,
    pub idea_input: String,
    /// Toggled what-if variables in the order they were switched on.
    pub active_what_ifs: Vec<String>,
}

impl Session {
    pub fn is_what_if_active(&self, variable: &str) -> bool {
        self.active_what_ifs.iter().any(|name| name == variable)
    }

    /// Flips `variable` and returns whether it is now active.
    pub fn toggle_what_if(&mut self, variable: &str) -> bool {
        if let Some(idx) = self.active_what_ifs.iter().position(|name| name == variable) {
            self.active_what_ifs.remove(idx);
            false
        } else {
            self.active_what_ifs.push(variable.to_string());
            true
        }
    }

    pub fn build_request(&self, idea: String) -> AnalysisRequest {
        AnalysisRequest {
            idea,
            what_ifs: self.active_what_ifs.clone(),
            thread_id: self.thread_id.0.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunError {
    pub message: Arc<str>,
    pub run_id: u64,
}

#[derive(Debug, Clone)]
pub struct RunStatus {
    pub phase: RunPhase,
    pub loading: bool,
    pub run_id: u64,
    pub started_at_ms: Option<u64>,
    pub elapsed_ms: u64,
    pub execution_time_secs: Option<f64>,
    pub last_error: Option<RunError>,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            phase: RunPhase::Idle,
            loading: false,
            run_id: 0,
            started_at_ms: None,
            elapsed_ms: 0,
            execution_time_secs: None,
            last_error: None,
        }
    }
}

impl RunStatus {
    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_ms as f64 / 1000.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportState {
    pub result: Option<AnalysisResult>,
    pub result_run_id: u64,
}

#[derive(Debug, Clone, Default)]
pub struct AppSelection {
    /// First report document line shown in the report view.
    pub report_scroll: usize,
    /// Position in the report's citation list, not a reference number.
    pub citation_cursor: Option<usize>,
    pub focused_reference: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppOverlay {
    None,
    Help,
    Notice { title: String, message: String },
}

#[derive(Debug, Clone)]
pub struct AppInteraction {
    pub overlay: AppOverlay,
    pub focus_in_input: bool,
}

#[derive(Debug, Clone)]
pub struct AppCustomization {
    pub theme: UiTheme,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRecord {
    pub path: String,
    pub pages: usize,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub session: Session,
    pub run: RunStatus,
    pub logs: LogBuffer,
    pub chat: ChatHistory,
    pub report: ReportState,
    pub tab: AppTab,
    pub selection: AppSelection,
    pub interaction: AppInteraction,
    pub customization: AppCustomization,
    pub last_export: Option<ExportRecord>,
}

impl AppState {
    pub fn new(thread_id: ThreadId) -> Self {
        Self {
            session: Session {
                thread_id,
                idea_input: String::new(),
                active_what_ifs: Vec::new(),
            },
            run: RunStatus::default(),
            logs: LogBuffer::default(),
            chat: ChatHistory::default(),
            report: ReportState::default(),
            tab: AppTab::Chat,
            selection: AppSelection::default(),
            interaction: AppInteraction {
                overlay: AppOverlay::None,
                focus_in_input: true,
            },
            customization: AppCustomization {
                theme: UiTheme::Classic,
            },
            last_export: None,
        }
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        self.report.result.as_ref()
    }

    pub fn report_document(&self) -> Option<ReportDocument> {
        self.report.result.as_ref().map(|result| {
            ReportDocument::build(
                result,
                self.run.execution_time_secs,
                &self.session.active_what_ifs,
            )
        })
    }

    /// The live log panel is shown while a run streams, and afterwards as
    /// long as no report has replaced it.
    pub fn shows_log_panel(&self) -> bool {
        self.run.loading || (!self.logs.is_empty() && self.report.result.is_none())
    }

    pub fn can_start_run(&self) -> bool {
        !self.run.loading
    }
}
