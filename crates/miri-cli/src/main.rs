mod export;
mod logging;
mod report_view;
mod settings;
mod ui;
mod wrap;

use std::env;
use std::path::PathBuf;
use std::sync::mpsc;

use miri_core::actions::AppAction;
use miri_core::actions::RuntimeAction;
use miri_core::actions::UserAction;
use miri_core::config::REPORT_FILE_NAME;
use miri_core::protocol::StreamEnvelope;
use miri_core::reducer::format_run_error;
use miri_core::reducer::reduce;
use miri_core::reducer::AppEffect;
use miri_core::state::now_ms;
use miri_core::state::AppState;
use miri_core::state::ThreadId;
use miri_core::state::UiTheme;
use miri_exec::client::AnalysisClient;
use miri_exec::runner::spawn_analysis;
use miri_exec::runner::RunEvent;

use crate::export::PageFormat;
use crate::logging::LogTarget;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        return run_tui();
    };

    match command.as_str() {
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("miri {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "tui" => {
            if let Some(extra) = args.next() {
                return Err(format!("unsupported argument: {extra}").into());
            }
            run_tui()
        }
        "analyze" => {
            let options = parse_analyze_args(args.collect::<Vec<_>>())?;
            run_analyze(options)
        }
        _ => {
            print_help();
            Err(format!("unknown command: {command}").into())
        }
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct AnalyzeOptions {
    idea: String,
    what_ifs: Vec<String>,
    export_dir: Option<PathBuf>,
}

fn parse_analyze_args(args: Vec<String>) -> Result<AnalyzeOptions, Box<dyn std::error::Error>> {
    let mut options = AnalyzeOptions::default();
    let mut words = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--what-if" => {
                let Some(value) = args.get(i + 1) else {
                    return Err("--what-if requires a scenario name".into());
                };
                options.what_ifs.push(value.clone());
                i += 2;
            }
            "--export" => {
                let Some(value) = args.get(i + 1) else {
                    return Err("--export requires a directory".into());
                };
                options.export_dir = Some(PathBuf::from(value));
                i += 2;
            }
            other if other.starts_with("--") => {
                return Err(format!("unsupported argument: {other}").into());
            }
            word => {
                words.push(word.to_string());
                i += 1;
            }
        }
    }
    options.idea = words.join(" ");
    if options.idea.trim().is_empty() && options.what_ifs.is_empty() {
        return Err("analyze requires a business idea".into());
    }
    Ok(options)
}

fn run_tui() -> Result<(), Box<dyn std::error::Error>> {
    let config = settings::load_config()?;
    logging::init(LogTarget::File(settings::data_dir().join(settings::LOG_FILE)))?;
    let client = AnalysisClient::new(&config.api)?;

    let mut state = AppState::new(ThreadId::generate());
    if let Some(label) = config.ui.theme.as_deref() {
        match UiTheme::from_label(label) {
            Some(theme) => state.customization.theme = theme,
            None => tracing::warn!(theme = label, "unknown theme in config; using default"),
        }
    }
    tracing::info!(
        thread_id = state.session.thread_id.as_str(),
        endpoint = client.endpoint(),
        mode = client.response_mode().label(),
        "starting tui"
    );
    ui::run(state, client, config.export.report_path())
}

/// One analysis without the TUI. Progress goes to stderr, the report to
/// stdout.
fn run_analyze(options: AnalyzeOptions) -> Result<(), Box<dyn std::error::Error>> {
    let config = settings::load_config()?;
    logging::init(LogTarget::Stderr)?;
    let client = AnalysisClient::new(&config.api)?;

    let mut state = AppState::new(ThreadId::generate());
    for name in &options.what_ifs {
        state.session.toggle_what_if(name);
    }
    state.session.idea_input = options.idea;
    let effects = reduce(
        &mut state,
        AppAction::User(UserAction::SubmitIdea { now_ms: now_ms() }),
    );
    let Some(request) = effects.into_iter().find_map(|effect| match effect {
        AppEffect::StartAnalysis(request) => Some(request),
        _ => None,
    }) else {
        return Err("nothing to analyze".into());
    };

    tracing::info!(
        endpoint = client.endpoint(),
        mode = client.response_mode().label(),
        "analyzing"
    );
    let (tx, rx) = mpsc::channel();
    let handle = spawn_analysis(client, request, move |event| tx.send(event).is_ok());

    // Ends once the run thread drops its sender.
    for event in rx {
        let action = match event {
            RunEvent::Envelope(StreamEnvelope::Log { message }) => {
                eprintln!("[log] {message}");
                RuntimeAction::AppendLog(message)
            }
            RunEvent::Envelope(StreamEnvelope::ChatMessage { message }) => {
                eprintln!("assistant: {message}");
                RuntimeAction::AppendAssistantMessage(message)
            }
            RunEvent::Envelope(StreamEnvelope::Result { data }) => RuntimeAction::ApplyResult {
                result: Box::new(data),
                now_ms: now_ms(),
            },
            RunEvent::Envelope(StreamEnvelope::Error { message }) => {
                RuntimeAction::RunFailed { message }
            }
            RunEvent::Failed(err) => {
                if err.is_backend() {
                    eprintln!("[backend] {err}");
                } else {
                    tracing::error!(%err, "analysis request failed");
                }
                RuntimeAction::RunFailed {
                    message: err.to_string(),
                }
            }
            RunEvent::Finished => RuntimeAction::RunFinished,
        };
        reduce(&mut state, AppAction::Runtime(action));
    }
    if handle.join().is_err() {
        return Err("analysis thread panicked".into());
    }

    if let Some(error) = &state.run.last_error {
        return Err(format_run_error(&error.message).into());
    }
    let Some(doc) = state.report_document() else {
        println!("분석 결과가 없습니다.");
        return Ok(());
    };
    for row in export::export_rows(&doc, PageFormat::A4.columns) {
        println!("{row}");
    }

    if let Some(dir) = options.export_dir {
        let summary = export::export_report(&doc, &dir.join(REPORT_FILE_NAME), PageFormat::A4)?;
        eprintln!(
            "saved {} ({} pages)",
            summary.path.display(),
            summary.pages
        );
    }
    Ok(())
}

fn print_help() {
    println!("miri {}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  miri [tui]");
    println!("  miri analyze IDEA... [--what-if NAME]... [--export DIR]");
    println!("  miri --help");
    println!("  miri --version");
    println!();
    println!("Environment:");
    println!("  MIRI_API_URL        analysis server base url");
    println!("  MIRI_RESPONSE_MODE  streaming | buffered");
    println!("  MIRI_EXPORT_DIR     directory for exported reports");
    println!("  MIRI_LOG            tracing filter, e.g. debug or miri_exec=trace");
}
