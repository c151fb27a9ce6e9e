use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use crossterm::event::{
    self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyCode, KeyEventKind, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap};
use ratatui::Terminal;

use miri_core::actions::{AppAction, RuntimeAction, UserAction};
use miri_core::protocol::StreamEnvelope;
use miri_core::reducer::{reduce, AppEffect, NOTHING_TO_EXPORT_MESSAGE};
use miri_core::state::{
    now_ms, AppOverlay, AppState, AppTab, ChatMessage, ChatRole, RunPhase, UiTheme,
};
use miri_exec::client::AnalysisClient;
use miri_exec::runner::{spawn_analysis, RunEvent};

use crate::export::{export_report, PageFormat};
use crate::report_view::report_lines;
use crate::wrap::wrap_to_width;

const TICK_INTERVAL: Duration = Duration::from_millis(100);
const LOG_PANEL_HEIGHT: u16 = 8;
/// Rows taken by everything except the content panel's inner area.
const CHROME_ROWS: u16 = 16;

struct TuiGuard;

impl Drop for TuiGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(
            io::stdout(),
            LeaveAlternateScreen,
            DisableBracketedPaste,
            crossterm::cursor::Show
        );
    }
}

pub fn run(
    mut state: AppState,
    client: AnalysisClient,
    export_path: PathBuf,
) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableBracketedPaste,
        crossterm::cursor::Hide
    )?;
    let _guard = TuiGuard; // restores the terminal on exit or panic

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut effects = EffectRunner::new(client, export_path);
    run_app(&mut terminal, &mut state, &mut effects).map_err(|e| e.into())
}

enum UiEvent {
    Run { run_id: u64, event: RunEvent },
}

/// Carries out reducer effects against the outside world.
struct EffectRunner {
    client: AnalysisClient,
    export_path: PathBuf,
    tx: mpsc::Sender<UiEvent>,
    rx: mpsc::Receiver<UiEvent>,
    scroll_deadline: Option<Instant>,
}

impl EffectRunner {
    fn new(client: AnalysisClient, export_path: PathBuf) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            client,
            export_path,
            tx,
            rx,
            scroll_deadline: None,
        }
    }

    fn apply(&mut self, state: &mut AppState, effects: Vec<AppEffect>) {
        let mut queue: VecDeque<AppEffect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            match effect {
                // The loop redraws every iteration.
                AppEffect::RequestFrame => {}
                AppEffect::StartAnalysis(request) => {
                    let run_id = state.run.run_id;
                    let tx = self.tx.clone();
                    tracing::info!(
                        run_id,
                        what_ifs = request.what_ifs.len(),
                        endpoint = self.client.endpoint(),
                        "starting analysis"
                    );
                    let _ = spawn_analysis(self.client.clone(), request, move |event| {
                        tx.send(UiEvent::Run { run_id, event }).is_ok()
                    });
                }
                AppEffect::ScheduleScrollToReport { delay_ms } => {
                    self.scroll_deadline = Some(Instant::now() + Duration::from_millis(delay_ms));
                }
                AppEffect::ExportReport => {
                    let action = self.export(state);
                    queue.extend(reduce(state, AppAction::Runtime(action)));
                }
            }
        }
    }

    fn export(&self, state: &AppState) -> RuntimeAction {
        let Some(doc) = state.report_document() else {
            return RuntimeAction::ExportFailed {
                message: NOTHING_TO_EXPORT_MESSAGE.to_string(),
            };
        };
        match export_report(&doc, &self.export_path, PageFormat::A4) {
            Ok(summary) => RuntimeAction::ExportFinished {
                path: summary.path.display().to_string(),
                pages: summary.pages,
            },
            Err(err) => {
                tracing::warn!(error = %err, "report export failed");
                RuntimeAction::ExportFailed {
                    message: err.to_string(),
                }
            }
        }
    }

    /// Fires the delayed switch to the report once its deadline passed.
    fn take_due_scroll(&mut self, now: Instant) -> bool {
        match self.scroll_deadline {
            Some(deadline) if now >= deadline => {
                self.scroll_deadline = None;
                true
            }
            _ => false,
        }
    }
}

fn run_event_action(event: RunEvent) -> RuntimeAction {
    match event {
        RunEvent::Envelope(StreamEnvelope::Log { message }) => RuntimeAction::AppendLog(message),
        RunEvent::Envelope(StreamEnvelope::ChatMessage { message }) => {
            RuntimeAction::AppendAssistantMessage(message)
        }
        RunEvent::Envelope(StreamEnvelope::Result { data }) => RuntimeAction::ApplyResult {
            result: Box::new(data),
            now_ms: now_ms(),
        },
        // The client turns error envelopes into `Failed`; kept for completeness.
        RunEvent::Envelope(StreamEnvelope::Error { message }) => {
            RuntimeAction::RunFailed { message }
        }
        RunEvent::Failed(err) => {
            if err.is_backend() {
                tracing::warn!(%err, "analysis backend reported an error");
            } else {
                tracing::error!(%err, "analysis request failed");
            }
            RuntimeAction::RunFailed {
                message: err.to_string(),
            }
        }
        RunEvent::Finished => RuntimeAction::RunFinished,
    }
}

#[derive(Clone, Copy)]
pub(crate) struct UiPalette {
    pub(crate) accent: Color,
    pub(crate) accent_alt: Color,
    pub(crate) success: Color,
    pub(crate) warning: Color,
    pub(crate) danger: Color,
    pub(crate) muted: Color,
    pub(crate) border: Color,
    pub(crate) panel_bg: Color,
    pub(crate) selected_bg: Color,
}

pub(crate) fn palette_for(theme: UiTheme) -> UiPalette {
    match theme {
        UiTheme::Classic => UiPalette {
            accent: Color::Cyan,
            accent_alt: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
            muted: Color::DarkGray,
            border: Color::Gray,
            panel_bg: Color::Black,
            selected_bg: Color::DarkGray,
        },
        UiTheme::NeonNoir => UiPalette {
            accent: Color::LightBlue,
            accent_alt: Color::LightCyan,
            success: Color::LightGreen,
            warning: Color::Yellow,
            danger: Color::LightRed,
            muted: Color::Gray,
            border: Color::LightBlue,
            panel_bg: Color::Black,
            selected_bg: Color::Rgb(18, 28, 42),
        },
        UiTheme::ForestZen => UiPalette {
            accent: Color::LightGreen,
            accent_alt: Color::Green,
            success: Color::Green,
            warning: Color::Yellow,
            danger: Color::Red,
            muted: Color::Gray,
            border: Color::LightGreen,
            panel_bg: Color::Black,
            selected_bg: Color::Rgb(8, 32, 10),
        },
    }
}

fn role_style(message: &ChatMessage, palette: UiPalette) -> Style {
    if message.is_system {
        return Style::default()
            .fg(palette.warning)
            .add_modifier(Modifier::ITALIC);
    }
    match message.role {
        ChatRole::User => Style::default().fg(palette.accent),
        ChatRole::Assistant => Style::default().fg(palette.success),
    }
}

fn build_chat_lines(state: &AppState, palette: UiPalette, width: u16) -> Vec<Line<'static>> {
    let body_width = usize::from(width.saturating_sub(2)).max(1);
    let mut lines = Vec::new();
    for message in state.chat.iter() {
        let style = role_style(message, palette);
        let label = if message.is_system {
            "miri"
        } else {
            message.role.label()
        };
        lines.push(Line::from(Span::styled(
            label.to_string(),
            style.add_modifier(Modifier::BOLD),
        )));
        for raw in message.content.split('\n') {
            for row in wrap_to_width(raw, body_width) {
                lines.push(Line::from(Span::styled(format!("  {row}"), style)));
            }
        }
        lines.push(Line::from(""));
    }
    if state.run.loading {
        lines.push(Line::from(Span::styled(
            format!(
                "{} 법률 검토 중... {:.1}s",
                get_spinner(),
                state.run.elapsed_secs()
            ),
            Style::default().fg(palette.accent_alt),
        )));
    }
    lines
}

fn build_log_lines(state: &AppState, palette: UiPalette, width: u16) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    for entry in state.logs.iter() {
        let prefix = format!("[{:>3}] ", entry.seq);
        let body_width = usize::from(width).saturating_sub(prefix.len()).max(1);
        for (idx, row) in wrap_to_width(&entry.message, body_width).into_iter().enumerate() {
            let lead = if idx == 0 {
                prefix.clone()
            } else {
                " ".repeat(prefix.len())
            };
            lines.push(Line::from(vec![
                Span::styled(lead, Style::default().fg(palette.muted)),
                Span::raw(row),
            ]));
        }
    }
    lines
}

/// Offset that keeps the newest line at the bottom of a panel.
fn bottom_scroll(line_count: usize, panel_height: u16) -> u16 {
    let overflow = line_count.saturating_sub(usize::from(panel_height));
    u16::try_from(overflow).unwrap_or(u16::MAX)
}

enum KeyHandlerResult {
    Continue(Vec<AppEffect>),
    Exit,
}

fn user(state: &mut AppState, action: UserAction) -> Vec<AppEffect> {
    reduce(state, AppAction::User(action))
}

fn handle_overlay_keys(key: event::KeyEvent, state: &mut AppState) -> KeyHandlerResult {
    let effects = match key.code {
        KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') | KeyCode::Char('?') => {
            user(state, UserAction::CloseOverlay)
        }
        _ => Vec::new(),
    };
    KeyHandlerResult::Continue(effects)
}

fn handle_input_focus_keys(key: event::KeyEvent, state: &mut AppState) -> KeyHandlerResult {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        let effects = match key.code {
            KeyCode::Char('u') => user(state, UserAction::ClearInput),
            _ => Vec::new(),
        };
        return KeyHandlerResult::Continue(effects);
    }
    let effects = match key.code {
        KeyCode::Esc => user(state, UserAction::SetInputFocus(false)),
        KeyCode::Enter => user(state, UserAction::SubmitIdea { now_ms: now_ms() }),
        KeyCode::Backspace => user(state, UserAction::InputBackspace),
        KeyCode::Char(c) => user(state, UserAction::InputChar(c)),
        _ => Vec::new(),
    };
    KeyHandlerResult::Continue(effects)
}

fn handle_report_keys(key: event::KeyEvent, state: &mut AppState, page: i32) -> Vec<AppEffect> {
    match key.code {
        KeyCode::Up | KeyCode::Char('k') => user(state, UserAction::ScrollReport(-1)),
        KeyCode::Down | KeyCode::Char('j') => user(state, UserAction::ScrollReport(1)),
        KeyCode::PageUp => user(state, UserAction::ScrollReport(-page)),
        KeyCode::PageDown => user(state, UserAction::ScrollReport(page)),
        KeyCode::Home | KeyCode::Char('g') => user(state, UserAction::ScrollToReport),
        KeyCode::Char('n') => user(state, UserAction::NextCitation),
        KeyCode::Char('p') => user(state, UserAction::PrevCitation),
        KeyCode::Enter => user(state, UserAction::FollowCitation),
        KeyCode::Char(c @ '1'..='9') => {
            let position = c.to_digit(10).map_or(0, |d| d as usize);
            user(
                state,
                UserAction::ToggleWhatIfAt {
                    position,
                    now_ms: now_ms(),
                },
            )
        }
        _ => Vec::new(),
    }
}

fn handle_global_keys<B: Backend>(
    key: event::KeyEvent,
    state: &mut AppState,
    terminal: &mut Terminal<B>,
) -> io::Result<KeyHandlerResult> {
    let effects = match key.code {
        KeyCode::Char('q') => return Ok(KeyHandlerResult::Exit),
        KeyCode::Char('i') | KeyCode::Char('/') => user(state, UserAction::SetInputFocus(true)),
        KeyCode::Tab | KeyCode::Right => user(state, UserAction::NextTab),
        KeyCode::BackTab | KeyCode::Left => user(state, UserAction::PrevTab),
        KeyCode::Char('c') => user(state, UserAction::SelectTab(AppTab::Chat)),
        KeyCode::Char('l') => user(state, UserAction::SelectTab(AppTab::Logs)),
        KeyCode::Char('r') => user(state, UserAction::SelectTab(AppTab::Report)),
        KeyCode::Char('?') => user(state, UserAction::ShowHelp),
        KeyCode::Char('t') => user(state, UserAction::CycleTheme),
        KeyCode::Char('e') => user(state, UserAction::RequestExport),
        _ if state.tab == AppTab::Report => {
            let page = i32::from(content_height(terminal)?.max(1));
            handle_report_keys(key, state, page)
        }
        KeyCode::Enter => user(state, UserAction::SetInputFocus(true)),
        _ => Vec::new(),
    };
    Ok(KeyHandlerResult::Continue(effects))
}

fn handle_key_event<B: Backend>(
    key: event::KeyEvent,
    state: &mut AppState,
    terminal: &mut Terminal<B>,
) -> io::Result<KeyHandlerResult> {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Ok(KeyHandlerResult::Exit);
    }

    match &state.interaction.overlay {
        AppOverlay::Help | AppOverlay::Notice { .. } => Ok(handle_overlay_keys(key, state)),
        AppOverlay::None => {
            if state.interaction.focus_in_input {
                Ok(handle_input_focus_keys(key, state))
            } else {
                handle_global_keys(key, state, terminal)
            }
        }
    }
}

fn content_height<B: Backend>(terminal: &Terminal<B>) -> io::Result<u16> {
    Ok(terminal.size()?.height.saturating_sub(CHROME_ROWS))
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    state: &mut AppState,
    runner: &mut EffectRunner,
) -> io::Result<()> {
    let mut last_tick = Instant::now();

    loop {
        // Background run progress
        while let Ok(event) = runner.rx.try_recv() {
            match event {
                UiEvent::Run { run_id, event } => {
                    if run_id != state.run.run_id {
                        tracing::debug!(run_id, current = state.run.run_id, "dropping stale run event");
                        continue;
                    }
                    let effects = reduce(state, AppAction::Runtime(run_event_action(event)));
                    runner.apply(state, effects);
                }
            }
        }

        if last_tick.elapsed() >= TICK_INTERVAL {
            let effects = reduce(
                state,
                AppAction::Runtime(RuntimeAction::Tick { now_ms: now_ms() }),
            );
            runner.apply(state, effects);
            last_tick = Instant::now();
        }
        if runner.take_due_scroll(Instant::now()) {
            let effects = user(state, UserAction::ScrollToReport);
            runner.apply(state, effects);
        }

        terminal.draw(|f| ui(f, state))?;

        if event::poll(Duration::from_millis(16))? {
            let mut effects = Vec::new();
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    match handle_key_event(key, state, terminal)? {
                        KeyHandlerResult::Continue(e) => effects.extend(e),
                        KeyHandlerResult::Exit => return Ok(()),
                    }
                }
                Event::Paste(text) if state.interaction.focus_in_input => {
                    effects.extend(user(state, UserAction::InputPaste(text)));
                }
                _ => {}
            }
            runner.apply(state, effects);
        }
    }
}

fn get_spinner() -> &'static str {
    let frames = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
    let idx = (now_ms() / 100) as usize % frames.len();
    frames[idx]
}

fn ui(f: &mut ratatui::Frame, state: &AppState) {
    let palette = palette_for(state.customization.theme);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(3), // Tabs
            Constraint::Min(0),    // Content
            Constraint::Length(3), // Input
            Constraint::Length(1), // Footer
        ])
        .split(f.area());

    render_header(f, chunks[0], state, palette);

    // Tabs
    let titles: Vec<Line> = AppTab::ALL.iter().map(|t| Line::from(t.label())).collect();
    let selected_tab_index = AppTab::ALL
        .iter()
        .position(|t| *t == state.tab)
        .unwrap_or(0);
    let tabs = Tabs::new(titles)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.border))
                .title("Views"),
        )
        .select(selected_tab_index)
        .highlight_style(
            Style::default()
                .fg(palette.accent)
                .add_modifier(Modifier::BOLD),
        );
    f.render_widget(tabs, chunks[1]);

    // Content
    let border_style = if state.run.phase == RunPhase::Failed {
        Style::default().fg(palette.danger)
    } else {
        Style::default().fg(palette.border)
    };
    let content_block = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().bg(palette.panel_bg))
        .border_style(border_style);

    match state.tab {
        AppTab::Chat => render_chat(f, chunks[2], state, palette, content_block),
        AppTab::Logs => render_logs(f, chunks[2], state, palette, content_block.title("Logs")),
        AppTab::Report => render_report(f, chunks[2], state, palette, content_block),
    }

    render_input(f, chunks[3], state, palette);

    // Footer
    let footer_text = if state.interaction.focus_in_input {
        "Enter analyze | Esc leave input | Ctrl+U clear"
    } else if state.tab == AppTab::Report {
        "j/k scroll | n/p citation | Enter follow | 1..9 what-if | e export | ? help | q quit"
    } else {
        "i input | Tab views | c/l/r chat/logs/report | t theme | e export | ? help | q quit"
    };
    let footer = Paragraph::new(footer_text).style(Style::default().fg(palette.muted));
    f.render_widget(footer, chunks[4]);

    // Overlays
    match &state.interaction.overlay {
        AppOverlay::None => {}
        AppOverlay::Help => render_help(f, palette),
        AppOverlay::Notice { title, message } => render_notice(f, title, message, palette),
    }
}

fn render_header(f: &mut ratatui::Frame, area: Rect, state: &AppState, palette: UiPalette) {
    let status = match state.run.phase {
        RunPhase::Running => format!("{} {:.1}s", get_spinner(), state.run.elapsed_secs()),
        RunPhase::Completed => match state.run.execution_time_secs {
            Some(secs) => format!("done in {secs:.2}s"),
            None => "done".to_string(),
        },
        RunPhase::Failed => "failed".to_string(),
        RunPhase::Idle => "idle".to_string(),
    };
    let thread = state.session.thread_id.as_str();
    let thread_short = thread.get(..8).unwrap_or(thread);
    let header_text = format!(
        "MIRI Legal Review | Thread:{} | Phase:{} | What-if:{} | Theme:{} | {}",
        thread_short,
        state.run.phase.label(),
        state.session.active_what_ifs.len(),
        state.customization.theme.label(),
        status
    );
    let color = match state.run.phase {
        RunPhase::Failed => palette.danger,
        _ => palette.accent,
    };
    let header = Paragraph::new(header_text)
        .style(Style::default().fg(color))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(palette.border)),
        );
    f.render_widget(header, area);
}

fn render_chat(
    f: &mut ratatui::Frame,
    area: Rect,
    state: &AppState,
    palette: UiPalette,
    block: Block<'static>,
) {
    let (chat_area, log_area) = if state.shows_log_panel() {
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(LOG_PANEL_HEIGHT)])
            .split(area);
        (sections[0], Some(sections[1]))
    } else {
        (area, None)
    };

    let chat_lines = build_chat_lines(state, palette, chat_area.width.saturating_sub(2));
    let title = if state.run.loading {
        format!("Chat | {} analyzing", get_spinner())
    } else {
        format!("Chat ({} messages)", state.chat.len())
    };
    let scroll = bottom_scroll(chat_lines.len(), chat_area.height.saturating_sub(2));
    let p = Paragraph::new(chat_lines)
        .block(block.clone().title(title))
        .scroll((scroll, 0));
    f.render_widget(p, chat_area);

    if let Some(log_area) = log_area {
        let title = format!("Live log ({})", state.logs.len());
        render_logs(f, log_area, state, palette, block.title(title));
    }
}

fn render_logs(
    f: &mut ratatui::Frame,
    area: Rect,
    state: &AppState,
    palette: UiPalette,
    block: Block<'static>,
) {
    let lines = if state.logs.is_empty() {
        vec![Line::from(Span::styled(
            "No log entries yet.",
            Style::default().fg(palette.muted),
        ))]
    } else {
        build_log_lines(state, palette, area.width.saturating_sub(2))
    };
    let scroll = bottom_scroll(lines.len(), area.height.saturating_sub(2));
    let p = Paragraph::new(lines).block(block).scroll((scroll, 0));
    f.render_widget(p, area);
}

fn render_report(
    f: &mut ratatui::Frame,
    area: Rect,
    state: &AppState,
    palette: UiPalette,
    block: Block<'static>,
) {
    let Some(doc) = state.report_document() else {
        let hint = if state.run.loading {
            format!("{} 검토가 끝나면 보고서가 여기에 표시됩니다.", get_spinner())
        } else {
            "아직 분석 결과가 없습니다. i 를 눌러 사업 아이디어를 입력하세요.".to_string()
        };
        let p = Paragraph::new(hint)
            .style(Style::default().fg(palette.muted))
            .block(block.title("Report"))
            .wrap(Wrap { trim: true });
        f.render_widget(p, area);
        return;
    };

    let total_citations = doc.citation_indices().len();
    let lines = report_lines(&doc, &state.selection, palette);
    let line_count = lines.len();
    let first = state.selection.report_scroll.min(line_count.saturating_sub(1));
    let mut title = format!("Report | line {}/{}", first + 1, line_count);
    if total_citations > 0 {
        let cursor = state
            .selection
            .citation_cursor
            .map_or("-".to_string(), |c| (c + 1).to_string());
        title.push_str(&format!(" | citation {cursor}/{total_citations}"));
    }
    if state.run.loading {
        title.push_str(&format!(" | {} re-analyzing", get_spinner()));
    }

    let visible: Vec<Line<'static>> = lines.into_iter().skip(first).collect();
    let p = Paragraph::new(visible)
        .block(block.title(title))
        .wrap(Wrap { trim: false });
    f.render_widget(p, area);
}

fn render_input(f: &mut ratatui::Frame, area: Rect, state: &AppState, palette: UiPalette) {
    let focused = state.interaction.focus_in_input;
    let title = if state.run.loading {
        format!("{} 분석 중 (입력은 완료 후 제출됩니다)", get_spinner())
    } else if focused {
        "사업 아이디어 (Enter 분석, Esc 나가기)".to_string()
    } else {
        "사업 아이디어 (i 입력)".to_string()
    };
    let border = if focused { palette.accent } else { palette.border };

    let content = if state.session.idea_input.is_empty() && !focused {
        Line::from(Span::styled(
            "예: 주택가 공유 주방에서 야간 배달 전문점 운영",
            Style::default().fg(palette.muted),
        ))
    } else {
        let mut spans = vec![Span::raw(state.session.idea_input.clone())];
        if focused {
            spans.push(Span::styled("█", Style::default().fg(palette.accent)));
        }
        Line::from(spans)
    };

    // Keep the end of a long idea visible.
    let inner_width = usize::from(area.width.saturating_sub(2)).max(1);
    let rows = wrap_to_width(&state.session.idea_input, inner_width).len();
    let scroll = u16::try_from(rows.saturating_sub(1)).unwrap_or(u16::MAX);

    let p = Paragraph::new(content)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(border))
                .title(title),
        )
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));
    f.render_widget(p, area);
}

fn render_help(f: &mut ratatui::Frame, palette: UiPalette) {
    let area = centered_rect(60, 70, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .title("Keybindings")
        .borders(Borders::ALL)
        .style(Style::default().bg(palette.panel_bg).fg(Color::White))
        .border_style(Style::default().fg(palette.border));

    let heading = Style::default().add_modifier(Modifier::BOLD);
    let help_text = vec![
        Line::from(Span::styled("General", heading)),
        Line::from("  q        Quit"),
        Line::from("  ?        Show this help"),
        Line::from("  Tab/Right Next view"),
        Line::from("  Left     Previous view"),
        Line::from("  c/l/r    Chat / Logs / Report"),
        Line::from("  t        Next theme"),
        Line::from("  e        Save report as text"),
        Line::from(""),
        Line::from(Span::styled("Input", heading)),
        Line::from("  i or /   Focus idea input"),
        Line::from("  Enter    Start analysis"),
        Line::from("  Esc      Leave input"),
        Line::from("  Ctrl+U   Clear input"),
        Line::from(""),
        Line::from(Span::styled("Report", heading)),
        Line::from("  j/k      Scroll"),
        Line::from("  PgUp/Dn  Scroll page"),
        Line::from("  g/Home   Back to top"),
        Line::from("  n/p      Next/previous citation"),
        Line::from("  Enter    Jump to cited reference"),
        Line::from("  1..9     Toggle what-if scenario and re-analyze"),
        Line::from(""),
        Line::from(Span::styled(
            "Press Esc to close",
            Style::default().fg(palette.warning),
        )),
    ];

    let text = Paragraph::new(help_text)
        .block(block)
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });
    f.render_widget(text, area);
}

fn render_notice(f: &mut ratatui::Frame, title: &str, message: &str, palette: UiPalette) {
    let area = centered_rect(60, 20, f.area());
    f.render_widget(Clear, area);
    let block = Block::default()
        .title(title.to_string())
        .borders(Borders::ALL)
        .style(Style::default().bg(palette.panel_bg).fg(Color::White))
        .border_style(Style::default().fg(palette.warning));
    let text = Paragraph::new(vec![
        Line::from(message.to_string()),
        Line::from(""),
        Line::from(Span::styled(
            "[Enter] OK",
            Style::default().fg(palette.muted),
        )),
    ])
    .block(block)
    .alignment(Alignment::Center)
    .wrap(Wrap { trim: true });
    f.render_widget(text, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use miri_core::analysis::AnalysisResult;
    use miri_core::state::ThreadId;
    use miri_exec::error::ClientError;
    use pretty_assertions::assert_eq;
    use ratatui::backend::TestBackend;

    use super::*;

    fn state() -> AppState {
        AppState::new(ThreadId("thread-under-test".to_string()))
    }

    fn draw(state: &AppState) -> String {
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).expect("terminal");
        terminal.draw(|f| ui(f, state)).expect("draw");
        let buffer = terminal.backend().buffer();
        let area = buffer.area;
        let mut out = String::new();
        for y in area.top()..area.bottom() {
            for x in area.left()..area.right() {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn run_events_map_to_runtime_actions() {
        let action = run_event_action(RunEvent::Envelope(StreamEnvelope::Log {
            message: "x".to_string(),
        }));
        assert!(matches!(action, RuntimeAction::AppendLog(m) if m == "x"));

        let action = run_event_action(RunEvent::Failed(ClientError::Backend {
            message: "rate limited".to_string(),
        }));
        assert!(matches!(action, RuntimeAction::RunFailed { message } if message == "rate limited"));

        assert!(matches!(
            run_event_action(RunEvent::Finished),
            RuntimeAction::RunFinished
        ));
        assert!(matches!(
            run_event_action(RunEvent::Envelope(StreamEnvelope::Result {
                data: AnalysisResult::default()
            })),
            RuntimeAction::ApplyResult { .. }
        ));
    }

    #[test]
    fn bottom_scroll_keeps_latest_line_visible() {
        assert_eq!(bottom_scroll(5, 10), 0);
        assert_eq!(bottom_scroll(25, 10), 15);
    }

    #[test]
    fn chat_lines_wrap_to_panel_width() {
        let mut state = state();
        state.chat.push(ChatRole::User, "가".repeat(30), false);
        let lines = build_chat_lines(&state, palette_for(UiTheme::Classic), 22);
        // Label, three wrapped rows of ten characters, spacer.
        assert_eq!(lines.len(), 5);
    }

    #[test]
    fn renders_tabs_and_idle_input() {
        let screen = draw(&state());
        assert!(screen.contains("MIRI Legal Review"));
        assert!(screen.contains("Views"));
        assert!(screen.contains("Report"));
    }

    #[test]
    fn live_log_panel_follows_run_state() {
        let mut state = state();
        reduce(
            &mut state,
            AppAction::Runtime(RuntimeAction::AppendLog("searching statutes".to_string())),
        );
        let screen = draw(&state);
        assert!(screen.contains("Live log (1)"));
        assert!(screen.contains("searching statutes"));

        reduce(
            &mut state,
            AppAction::Runtime(RuntimeAction::ApplyResult {
                result: Box::new(AnalysisResult::default()),
                now_ms: 0,
            }),
        );
        assert!(!draw(&state).contains("Live log"));
    }

    #[test]
    fn notice_overlay_is_drawn_on_top() {
        let mut state = state();
        state.interaction.overlay = AppOverlay::Notice {
            title: "Saved".to_string(),
            message: "report.txt".to_string(),
        };
        let screen = draw(&state);
        assert!(screen.contains("Saved"));
        assert!(screen.contains("report.txt"));
    }

    #[test]
    fn scheduled_scroll_fires_once_after_deadline() {
        let client = AnalysisClient::new(&miri_core::config::ApiConfig::default()).expect("client");
        let mut runner = EffectRunner::new(client, PathBuf::from("unused.txt"));
        let mut state = state();
        runner.apply(
            &mut state,
            vec![AppEffect::ScheduleScrollToReport { delay_ms: 300 }],
        );

        let now = Instant::now();
        assert!(!runner.take_due_scroll(now));
        let later = now + Duration::from_millis(400);
        assert!(runner.take_due_scroll(later));
        assert!(!runner.take_due_scroll(later));
    }

    #[test]
    fn export_without_result_reports_failure() {
        let client = AnalysisClient::new(&miri_core::config::ApiConfig::default()).expect("client");
        let runner = EffectRunner::new(client, PathBuf::from("unused.txt"));
        let action = runner.export(&state());
        assert!(matches!(
            action,
            RuntimeAction::ExportFailed { message } if message == NOTHING_TO_EXPORT_MESSAGE
        ));
    }

    #[test]
    fn export_effect_writes_report_and_opens_notice() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("MIRI_Legal_Report.txt");
        let client = AnalysisClient::new(&miri_core::config::ApiConfig::default()).expect("client");
        let mut runner = EffectRunner::new(client, path.clone());
        let mut state = state();
        state.report.result = Some(AnalysisResult::default());

        runner.apply(&mut state, vec![AppEffect::ExportReport]);

        assert!(path.exists());
        assert_eq!(
            state.last_export.as_ref().map(|record| record.pages),
            Some(1)
        );
        assert!(matches!(state.interaction.overlay, AppOverlay::Notice { .. }));
    }
}
