use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use retouch_contracts::commands::{parse_command, SessionCommand, HELP_COMMANDS};
use retouch_contracts::error::EditResult;
use retouch_contracts::models::ModelRegistry;
use retouch_contracts::operation::{FlipDirection, Operation, CONVERT_FORMATS};
use retouch_engine::EditSession;
use serde_json::json;

#[derive(Debug, Parser)]
#[command(name = "retouch", version, about = "Prompt-driven image editor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Edit(EditArgs),
    Session(SessionArgs),
    Models,
}

#[derive(Debug, Parser)]
struct EditArgs {
    #[arg(long)]
    input: PathBuf,
    #[arg(long, value_enum)]
    op: OpArg,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    #[arg(long)]
    format: Option<String>,
    #[arg(long)]
    brightness: Option<i64>,
    #[arg(long)]
    contrast: Option<i64>,
    #[arg(long)]
    saturation: Option<i64>,
    #[arg(long)]
    degrees: Option<i64>,
    #[arg(long)]
    direction: Option<String>,
    #[arg(long)]
    prompt: Option<String>,
    #[arg(long, default_value = ".")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Parser)]
struct SessionArgs {
    #[arg(long)]
    input: Option<PathBuf>,
    #[arg(long)]
    events: Option<PathBuf>,
    #[arg(long)]
    model: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OpArg {
    RemoveBackground,
    ResizeCanvas,
    ConvertFormat,
    Compress,
    AutoEnhance,
    Adjust,
    Rotate,
    Flip,
    CustomPrompt,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("retouch error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Edit(args) => run_edit(args),
        Command::Session(args) => run_session(args),
        Command::Models => run_models(),
    }
}

fn run_edit(args: EditArgs) -> Result<i32> {
    let operation = operation_from_args(&args)?;
    let events_path = resolve_events_path(args.events.clone());
    let mut session = EditSession::new(&events_path, args.model.as_deref())?;

    let outcome = apply_and_save(&mut session, &args.input, operation, &args.out);

    let code = match outcome {
        Ok(path) => {
            if args.json {
                let summary = json!({
                    "output": path.to_string_lossy(),
                    "media_type": session
                        .state()
                        .processed_image
                        .as_ref()
                        .map(|asset| asset.media_type.clone()),
                    "model": session.model().name,
                    "session_id": session.session_id(),
                    "events": session.events_path().to_string_lossy(),
                });
                println!("{summary}");
            } else {
                println!("Saved {}", path.display());
            }
            0
        }
        Err(err) => {
            eprintln!("{}", err.user_message());
            1
        }
    };
    session.finish()?;
    Ok(code)
}

fn apply_and_save(
    session: &mut EditSession,
    input: &Path,
    operation: Operation,
    out_dir: &Path,
) -> EditResult<PathBuf> {
    session.load_image_from_path(input)?;
    session.dispatch(operation)?;
    session.save_result(out_dir)
}

fn operation_from_args(args: &EditArgs) -> Result<Operation> {
    let operation = match args.op {
        OpArg::RemoveBackground => Operation::RemoveBackground,
        OpArg::ResizeCanvas => Operation::ResizeCanvas {
            width: args.width,
            height: args.height,
        },
        OpArg::ConvertFormat => {
            let format = match args.format.as_deref() {
                None => None,
                Some(value) => {
                    let lowered = value.trim().to_ascii_lowercase();
                    if !CONVERT_FORMATS.contains(&lowered.as_str()) {
                        bail!(
                            "unsupported format '{value}' (expected one of: {})",
                            CONVERT_FORMATS.join(", ")
                        );
                    }
                    Some(lowered)
                }
            };
            Operation::ConvertFormat { format }
        }
        OpArg::Compress => Operation::Compress,
        OpArg::AutoEnhance => Operation::AutoEnhance,
        OpArg::Adjust => Operation::Adjust {
            brightness: args.brightness.unwrap_or(0),
            contrast: args.contrast.unwrap_or(0),
            saturation: args.saturation.unwrap_or(0),
        },
        OpArg::Rotate => Operation::Rotate {
            degrees: args.degrees,
        },
        OpArg::Flip => {
            let direction = match args.direction.as_deref() {
                None => None,
                Some(value) => match FlipDirection::parse(value) {
                    Some(direction) => Some(direction),
                    None => bail!(
                        "unknown flip direction '{value}' (expected horizontally or vertically)"
                    ),
                },
            };
            Operation::Flip { direction }
        }
        OpArg::CustomPrompt => Operation::CustomPrompt {
            prompt: args.prompt.clone().unwrap_or_default(),
        },
    };
    Ok(operation)
}

fn resolve_events_path(events: Option<PathBuf>) -> PathBuf {
    events.unwrap_or_else(|| PathBuf::from("events.jsonl"))
}

fn run_session(args: SessionArgs) -> Result<i32> {
    let events_path = resolve_events_path(args.events.clone());
    let mut session = EditSession::new(&events_path, args.model.as_deref())?;

    println!(
        "Retouch session started (model {}). Type /help for commands.",
        session.model().name
    );

    if let Some(input) = args.input.as_ref() {
        match session.load_image_from_path(input) {
            Ok(asset) => println!("Loaded {} ({})", asset.display_name, asset.media_type),
            Err(err) => println!("{}", err.user_message()),
        }
    }

    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("> ");
        io::stdout().flush()?;

        line.clear();
        let read = match stdin.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let input = line.trim_end_matches(['\n', '\r']);
        match parse_command(input) {
            SessionCommand::Noop => continue,
            SessionCommand::Quit => break,
            SessionCommand::Help => {
                println!("Commands:");
                for entry in HELP_COMMANDS {
                    println!("  {entry}");
                }
                println!("Anything else is sent to the model as a custom edit prompt.");
            }
            SessionCommand::Open { path } => {
                match session.load_image_from_path(Path::new(&path)) {
                    Ok(asset) => println!("Loaded {} ({})", asset.display_name, asset.media_type),
                    Err(err) => println!("{}", err.user_message()),
                }
            }
            SessionCommand::Apply(operation) => {
                let slug = operation.kind().slug();
                match session.dispatch(operation) {
                    Ok(result) => println!("Applied {slug}: {}", result.display_name),
                    Err(err) => println!("{}", err.user_message()),
                }
            }
            SessionCommand::Save { path } => {
                let out_dir = path.map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));
                match session.save_result(&out_dir) {
                    Ok(saved) => println!("Saved {}", saved.display()),
                    Err(err) => println!("{}", err.user_message()),
                }
            }
            SessionCommand::SetModel { name: Some(name) } => match session.set_model(&name) {
                Ok(model) => println!("Model set to {} ({})", model.name, model.provider),
                Err(err) => println!("{}", err.user_message()),
            },
            SessionCommand::SetModel { name: None } => {
                let model = session.model();
                println!("Model: {} ({})", model.name, model.provider);
            }
            SessionCommand::Status => print_status(&session),
            SessionCommand::History => print_history(&session),
            SessionCommand::Reset => {
                session.reset()?;
                println!("Session reset.");
            }
            SessionCommand::Unknown { command } => {
                println!("Unknown command: /{command} (type /help for commands)");
            }
            SessionCommand::Invalid { message } => println!("{message}"),
        }
    }

    session.finish()?;
    println!("Session log: {}", session.events_path().display());
    Ok(0)
}

fn print_status(session: &EditSession) {
    let state = session.state();
    match state.original_image.as_ref() {
        Some(original) => println!("Original: {} ({})", original.display_name, original.media_type),
        None => println!("Original: none (use /open <path>)"),
    }
    match state.processed_image.as_ref() {
        Some(processed) => {
            println!("Processed: {} ({})", processed.display_name, processed.media_type)
        }
        None => println!("Processed: none"),
    }
    if let Some(error) = state.last_error.as_ref() {
        println!("Last error: {error}");
    }
    let model = session.model();
    println!("Model: {} ({})", model.name, model.provider);
}

fn print_history(session: &EditSession) {
    if session.history().is_empty() {
        println!("No edits applied yet.");
        return;
    }
    for (index, record) in session.history().iter().enumerate() {
        println!(
            "{:>3}. [{}] {} -> {} at {}",
            index + 1,
            record.record_id,
            record.operation.slug(),
            record.output_name,
            record.completed_at
        );
    }
}

fn run_models() -> Result<i32> {
    let registry = ModelRegistry::new(None);
    for model in registry.list() {
        println!("{} ({})", model.name, model.provider);
    }
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edit_args(op: OpArg) -> EditArgs {
        EditArgs {
            input: PathBuf::from("cat.jpg"),
            op,
            width: None,
            height: None,
            format: None,
            brightness: None,
            contrast: None,
            saturation: None,
            degrees: None,
            direction: None,
            prompt: None,
            out: PathBuf::from("."),
            events: None,
            model: None,
            json: false,
        }
    }

    #[test]
    fn adjust_args_default_missing_channels_to_zero() -> Result<()> {
        let mut args = edit_args(OpArg::Adjust);
        args.brightness = Some(15);
        let operation = operation_from_args(&args)?;
        assert_eq!(
            operation,
            Operation::Adjust {
                brightness: 15,
                contrast: 0,
                saturation: 0
            }
        );
        Ok(())
    }

    #[test]
    fn convert_args_lowercase_and_validate_the_format() -> Result<()> {
        let mut args = edit_args(OpArg::ConvertFormat);
        args.format = Some("WEBP".to_string());
        let operation = operation_from_args(&args)?;
        assert_eq!(
            operation,
            Operation::ConvertFormat {
                format: Some("webp".to_string())
            }
        );

        args.format = Some("tiff".to_string());
        assert!(operation_from_args(&args).is_err());
        Ok(())
    }

    #[test]
    fn flip_args_reject_unknown_directions() {
        let mut args = edit_args(OpArg::Flip);
        args.direction = Some("sideways".to_string());
        assert!(operation_from_args(&args).is_err());

        args.direction = Some("vertical".to_string());
        assert_eq!(
            operation_from_args(&args).unwrap(),
            Operation::Flip {
                direction: Some(FlipDirection::Vertically)
            }
        );
    }

    #[test]
    fn rotate_args_pass_explicit_degrees_through() -> Result<()> {
        let mut args = edit_args(OpArg::Rotate);
        args.degrees = Some(-90);
        assert_eq!(
            operation_from_args(&args)?,
            Operation::Rotate { degrees: Some(-90) }
        );
        Ok(())
    }
}
