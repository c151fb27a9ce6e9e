use super::analysis::AnalysisResult;
use super::state::AppTab;

#[derive(Debug, Clone)]
pub enum AppAction {
    User(UserAction),
    Runtime(RuntimeAction),
}

#[derive(Debug, Clone)]
pub enum UserAction {
    InputChar(char),
    InputBackspace,
    InputPaste(String),
    ClearInput,
    SetInputFocus(bool),
    SubmitIdea {
        now_ms: u64,
    },
    ToggleWhatIf {
        variable: String,
        now_ms: u64,
    },
    /// Toggles the n-th (1-based) what-if offered by the current report.
    ToggleWhatIfAt {
        position: usize,
        now_ms: u64,
    },
    NextTab,
    PrevTab,
    SelectTab(AppTab),
    ScrollReport(i32),
    ScrollToReport,
    NextCitation,
    PrevCitation,
    FollowCitation,
    JumpToReference(usize),
    RequestExport,
    CycleTheme,
    ShowHelp,
    CloseOverlay,
}

#[derive(Debug, Clone)]
pub enum RuntimeAction {
    Tick {
        now_ms: u64,
    },
    AppendLog(String),
    AppendAssistantMessage(String),
    ApplyResult {
        result: Box<AnalysisResult>,
        now_ms: u64,
    },
    RunFailed {
        message: String,
    },
    RunFinished,
    ExportFinished {
        path: String,
        pages: usize,
    },
    ExportFailed {
        message: String,
    },
}
