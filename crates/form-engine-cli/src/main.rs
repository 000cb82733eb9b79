// crates/form-engine-cli/src/main.rs
// ============================================================================
// Module: Form Engine CLI Entry Point
// Description: Command dispatcher for form definition and session workflows.
// Purpose: Validate forms, list screens, and replay edit scripts offline.
// Dependencies: clap, form-engine-config, form-engine-core, serde, thiserror.
// ============================================================================

//! ## Overview
//! The `form-engine` binary compiles a JSON form definition and either reports
//! on it or drives a session through a scripted sequence of edits, printing
//! one JSON record per step. Recalculation events go to the sink selected in
//! `form-engine.toml`. Inputs are untrusted and read under hard size limits.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::fs::OpenOptions;
use std::io::Read;
use std::io::Stderr;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::ArgAction;
use clap::Args;
use clap::CommandFactory;
use clap::Parser;
use clap::Subcommand;
use form_engine_cli::t;
use form_engine_config::FormEngineConfig;
use form_engine_config::LogSink;
use form_engine_core::CompiledForm;
use form_engine_core::Diagnostic;
use form_engine_core::EngineConfig;
use form_engine_core::FieldPath;
use form_engine_core::FieldView;
use form_engine_core::FormDef;
use form_engine_core::FormSession;
use form_engine_core::JsonLinesObserver;
use form_engine_core::NoopObserver;
use form_engine_core::RecalcEvent;
use form_engine_core::RecalcObserver;
use form_engine_core::RecalcResult;
use form_engine_core::ScreenId;
use form_engine_core::ScreenKind;
use form_engine_core::Value;
use form_engine_core::VisibleFieldSequence;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a form definition JSON input.
const MAX_FORM_BYTES: usize = 4 * 1024 * 1024;
/// Maximum size of an edit script JSON input.
const MAX_SCRIPT_BYTES: usize = 4 * 1024 * 1024;
/// Maximum number of steps in one edit script.
const MAX_SCRIPT_STEPS: usize = 10_000;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "form-engine", disable_help_subcommand = true, disable_version_flag = true)]
struct Cli {
    /// Print version information and exit.
    #[arg(long = "version", action = ArgAction::SetTrue, global = true)]
    show_version: bool,
    /// Optional config file path (defaults to form-engine.toml or env override).
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Compile a form definition and report its shape.
    Validate(FormArgs),
    /// Print the derived screens as JSON lines.
    Screens(FormArgs),
    /// Drive a session through an edit script.
    Replay(ReplayCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments naming a form definition.
#[derive(Args, Debug)]
struct FormArgs {
    /// Form definition JSON file.
    #[arg(long, value_name = "PATH")]
    form: PathBuf,
}

/// Configuration for the `replay` command.
#[derive(Args, Debug)]
struct ReplayCommand {
    /// Form definition to open.
    #[command(flatten)]
    form: FormArgs,
    /// Edit script JSON file (array of steps).
    #[arg(long, value_name = "PATH")]
    script: PathBuf,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate the configuration file.
    Validate,
}

// ============================================================================
// SECTION: Script Types
// ============================================================================

/// One step of an edit script.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", deny_unknown_fields)]
enum ScriptStep {
    /// Answer a field.
    Set {
        /// Field to answer.
        path: FieldPath,
        /// New answer.
        value: AnswerInput,
    },
    /// Clear a field's answer.
    Clear {
        /// Field to clear.
        path: FieldPath,
    },
    /// Jump to a screen.
    OpenScreen {
        /// Screen index in definition order.
        screen: usize,
    },
    /// Move focus to a field on the current screen.
    Focus {
        /// Field to focus.
        path: FieldPath,
    },
    /// Print the current state of a field.
    Inspect {
        /// Field to inspect.
        path: FieldPath,
    },
}

/// Answer literal accepted in scripts.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum AnswerInput {
    /// Boolean answer.
    Flag(bool),
    /// Numeric answer.
    Number(f64),
    /// Text answer, coerced to the field kind by the engine.
    Text(String),
    /// Selected choice values.
    Choices(Vec<String>),
}

impl From<AnswerInput> for Value {
    fn from(input: AnswerInput) -> Self {
        match input {
            AnswerInput::Flag(flag) => Self::Boolean(flag),
            AnswerInput::Number(number) => Self::Number(number),
            AnswerInput::Text(text) => Self::text(text),
            AnswerInput::Choices(values) => Self::selection(values),
        }
    }
}

/// One JSON record printed by `replay`.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ReplayRecord<'a> {
    /// Session opened.
    Opened {
        /// Form identifier.
        form_id: &'a str,
        /// Definition digest.
        digest: &'a str,
        /// Visible sequence before any edit.
        visible_sequence: VisibleFieldSequence,
        /// Diagnostics from the initial pass.
        diagnostics: &'a [Diagnostic],
    },
    /// Outcome of a set or clear step.
    Recalc {
        /// Zero-based step index.
        step: usize,
        /// Pass outcome.
        result: RecalcResult,
    },
    /// Outcome of an open-screen step.
    Screen {
        /// Zero-based step index.
        step: usize,
        /// Visible sequence of the opened screen.
        visible_sequence: VisibleFieldSequence,
    },
    /// Outcome of a focus step.
    Focus {
        /// Zero-based step index.
        step: usize,
        /// Focused field.
        focus: Option<&'a FieldPath>,
    },
    /// Outcome of an inspect step.
    Field {
        /// Zero-based step index.
        step: usize,
        /// Field snapshot, absent for unknown paths.
        field: Option<FieldView>,
    },
    /// Step refused by the session.
    Refused {
        /// Zero-based step index.
        step: usize,
        /// Reason reported by the session.
        error: String,
    },
}

/// One JSON record printed by `screens`.
#[derive(Debug, Serialize)]
struct ScreenRecord<'a> {
    /// Screen index.
    id: ScreenId,
    /// Group or field forming the screen.
    path: &'a FieldPath,
    /// Screen kind.
    kind: ScreenKind,
    /// Widget fields in definition order.
    fields: Vec<&'a FieldPath>,
}

// ============================================================================
// SECTION: Event Sink
// ============================================================================

/// Recalculation event sink selected from configuration.
enum EventSink {
    /// Events discarded.
    Noop(NoopObserver),
    /// JSON lines on stderr.
    Stderr(JsonLinesObserver<Stderr>),
    /// JSON lines appended to a file.
    File(JsonLinesObserver<File>),
}

impl EventSink {
    /// Opens the sink described by `config`.
    fn open(config: &FormEngineConfig) -> CliResult<Self> {
        match (config.logging.sink, &config.logging.path) {
            (LogSink::File, Some(path)) => {
                let file = OpenOptions::new().create(true).append(true).open(path).map_err(|err| {
                    CliError::new(t!("sink.open_failed", path = path.display(), error = err))
                })?;
                Ok(Self::File(JsonLinesObserver::new(file)))
            }
            (LogSink::Stderr, _) => Ok(Self::Stderr(JsonLinesObserver::new(std::io::stderr()))),
            (LogSink::None | LogSink::File, _) => Ok(Self::Noop(NoopObserver)),
        }
    }

    /// Returns how many records failed to write.
    fn write_failures(&self) -> u64 {
        match self {
            Self::Noop(_) => 0,
            Self::Stderr(sink) => sink.write_failures(),
            Self::File(sink) => sink.write_failures(),
        }
    }
}

impl RecalcObserver for EventSink {
    fn record(&self, event: &RecalcEvent) {
        match self {
            Self::Noop(sink) => sink.record(event),
            Self::Stderr(sink) => sink.record(event),
            Self::File(sink) => sink.record(event),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for catalog messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`] from a rendered message.
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run() -> CliResult<ExitCode> {
    let cli = Cli::parse();

    if cli.show_version {
        let version = env!("CARGO_PKG_VERSION");
        write_stdout_line(&t!("main.version", version = version))
            .map_err(|err| CliError::new(output_error("stdout", &err)))?;
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = cli.command else {
        show_help()?;
        return Ok(ExitCode::SUCCESS);
    };

    let config = FormEngineConfig::load(cli.config.as_deref())
        .map_err(|err| CliError::new(t!("config.load_failed", error = err)))?;

    match command {
        Commands::Validate(args) => command_validate(&config, &args),
        Commands::Screens(args) => command_screens(&config, &args),
        Commands::Replay(command) => command_replay(&config, &command),
        Commands::Config {
            command: ConfigCommand::Validate,
        } => {
            write_stdout_line(&t!("config.validate.ok"))
                .map_err(|err| CliError::new(output_error("stdout", &err)))?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Prints the top-level help text.
fn show_help() -> CliResult<()> {
    let mut command = Cli::command();
    command.print_help().map_err(|err| CliError::new(output_error("stdout", &err)))?;
    write_stdout_line("").map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(())
}

// ============================================================================
// SECTION: Form Commands
// ============================================================================

/// Executes the `validate` command.
fn command_validate(config: &FormEngineConfig, args: &FormArgs) -> CliResult<ExitCode> {
    let form = load_form(&args.form, &config.to_engine_config())?;
    let fields = form.tree().ids().filter(|id| form.tree().node(*id).is_field()).count();
    write_stdout_line(&t!(
        "form.validate.ok",
        form_id = form.form_id(),
        fields = fields,
        screens = form.screens().len(),
        digest = form.digest().value
    ))
    .map_err(|err| CliError::new(output_error("stdout", &err)))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the `screens` command.
fn command_screens(config: &FormEngineConfig, args: &FormArgs) -> CliResult<ExitCode> {
    let form = load_form(&args.form, &config.to_engine_config())?;
    for screen in form.screens() {
        let record = ScreenRecord {
            id: screen.id,
            path: &screen.path,
            kind: screen.kind,
            fields: screen.fields.iter().map(|id| &form.tree().node(*id).path).collect(),
        };
        write_json_line(&record)?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Executes the `replay` command.
fn command_replay(config: &FormEngineConfig, command: &ReplayCommand) -> CliResult<ExitCode> {
    let engine_config = config.to_engine_config();
    let form = load_form(&command.form.form, &engine_config)?;
    let steps: Vec<ScriptStep> =
        read_json(&command.script, &t!("input.kind.script"), MAX_SCRIPT_BYTES)?;
    if steps.len() > MAX_SCRIPT_STEPS {
        return Err(CliError::new(t!(
            "replay.script_too_long",
            count = steps.len(),
            limit = MAX_SCRIPT_STEPS
        )));
    }

    let sink = EventSink::open(config)?;
    let mut session = FormSession::new(form, engine_config, &sink);
    write_json_line(&ReplayRecord::Opened {
        form_id: session.form().form_id().as_str(),
        digest: &session.form().digest().value,
        visible_sequence: session.initial_visible_sequence(),
        diagnostics: session.initial_diagnostics(),
    })?;
    for (step, entry) in steps.into_iter().enumerate() {
        replay_step(&mut session, step, entry)?;
    }
    drop(session);

    let failures = sink.write_failures();
    if failures > 0 {
        write_stderr_line(&t!("sink.write_failures", count = failures))
            .map_err(|err| CliError::new(output_error("stderr", &err)))?;
    }
    Ok(ExitCode::SUCCESS)
}

/// Applies one script step and prints its record.
fn replay_step<O: RecalcObserver>(
    session: &mut FormSession<O>,
    step: usize,
    entry: ScriptStep,
) -> CliResult<()> {
    match entry {
        ScriptStep::Set {
            path,
            value,
        } => {
            let result = session.on_field_changed(&path, value.into());
            write_json_line(&ReplayRecord::Recalc {
                step,
                result,
            })
        }
        ScriptStep::Clear {
            path,
        } => {
            let result = session.on_clear_answer(&path);
            write_json_line(&ReplayRecord::Recalc {
                step,
                result,
            })
        }
        ScriptStep::OpenScreen {
            screen,
        } => match session.open_screen(ScreenId::new(screen)) {
            Ok(visible_sequence) => write_json_line(&ReplayRecord::Screen {
                step,
                visible_sequence,
            }),
            Err(err) => write_json_line(&ReplayRecord::Refused {
                step,
                error: err.to_string(),
            }),
        },
        ScriptStep::Focus {
            path,
        } => match session.set_focus(&path) {
            Ok(()) => write_json_line(&ReplayRecord::Focus {
                step,
                focus: session.focus(),
            }),
            Err(err) => write_json_line(&ReplayRecord::Refused {
                step,
                error: err.to_string(),
            }),
        },
        ScriptStep::Inspect {
            path,
        } => write_json_line(&ReplayRecord::Field {
            step,
            field: session.field(&path),
        }),
    }
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Reads and compiles a form definition.
fn load_form(path: &Path, config: &EngineConfig) -> CliResult<CompiledForm> {
    let definition: FormDef = read_json(path, &t!("input.kind.form"), MAX_FORM_BYTES)?;
    definition.compile(config).map_err(|err| {
        CliError::new(t!("form.compile_failed", path = path.display(), error = err))
    })
}

/// Reads a JSON document under a size limit.
fn read_json<T: DeserializeOwned>(path: &Path, kind: &str, max_bytes: usize) -> CliResult<T> {
    let bytes = read_bytes_with_limit(path, max_bytes).map_err(|err| match err {
        ReadLimitError::Io(err) => CliError::new(t!(
            "input.read_failed",
            kind = kind,
            path = path.display(),
            error = err
        )),
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(t!(
            "input.read_too_large",
            kind = kind,
            path = path.display(),
            size = size,
            limit = limit
        )),
    })?;
    serde_json::from_slice(&bytes).map_err(|err| {
        CliError::new(t!("input.parse_failed", kind = kind, path = path.display(), error = err))
    })
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let metadata = file.metadata().map_err(ReadLimitError::Io)?;
    let size = metadata.len();
    let limit = u64::try_from(max_bytes).map_err(|_| ReadLimitError::TooLarge {
        size,
        limit: max_bytes,
    })?;
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }

    let read_limit = limit.saturating_add(1);
    let mut limited = file.take(read_limit);
    let mut bytes = Vec::new();
    limited.read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        let actual = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
        return Err(ReadLimitError::TooLarge {
            size: actual,
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Serializes `value` as one JSON line on stdout.
fn write_json_line<T: Serialize>(value: &T) -> CliResult<()> {
    let line = serde_json::to_string(value)
        .map_err(|err| CliError::new(t!("output.json_failed", error = err)))?;
    write_stdout_line(&line).map_err(|err| CliError::new(output_error("stdout", &err)))
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Formats an output error message.
fn output_error(stream: &str, error: &std::io::Error) -> String {
    let stream_label = match stream {
        "stdout" => t!("output.stream.stdout"),
        "stderr" => t!("output.stream.stderr"),
        _ => t!("output.stream.unknown"),
    };
    t!("output.write_failed", stream = stream_label, error = error)
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
