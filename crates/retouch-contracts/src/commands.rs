use crate::operation::{FlipDirection, Operation, CONVERT_FORMATS};

/// One parsed line of interactive session input.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Noop,
    Open { path: String },
    Apply(Operation),
    Save { path: Option<String> },
    SetModel { name: Option<String> },
    Status,
    History,
    Reset,
    Help,
    Quit,
    Unknown { command: String },
    Invalid { message: String },
}

pub const HELP_COMMANDS: &[&str] = &[
    "/open <path>",
    "/removebg",
    "/resize <WIDTHxHEIGHT>",
    "/convert <png|jpeg|webp>",
    "/compress",
    "/enhance",
    "/adjust brightness=<n> contrast=<n> saturation=<n>",
    "/rotate [degrees]",
    "/flip [horizontally|vertically]",
    "/save [dir]",
    "/model [name]",
    "/status",
    "/history",
    "/reset",
    "/help",
    "/quit",
];

const UNIT_OPERATION_COMMANDS: &[(&str, Operation)] = &[
    ("removebg", Operation::RemoveBackground),
    ("remove_background", Operation::RemoveBackground),
    ("compress", Operation::Compress),
    ("enhance", Operation::AutoEnhance),
    ("auto_enhance", Operation::AutoEnhance),
];

/// Parse one line of session input. Slash commands map to session
/// actions; anything else becomes a custom-prompt edit.
pub fn parse_command(text: &str) -> SessionCommand {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return SessionCommand::Noop;
    }

    if let Some(slash_tail) = trimmed.strip_prefix('/') {
        let command_len = slash_tail
            .chars()
            .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
            .count();
        if command_len > 0 {
            let command = slash_tail[..command_len].to_ascii_lowercase();
            let arg = slash_tail[command_len..].trim();

            if let Some((_, operation)) = UNIT_OPERATION_COMMANDS
                .iter()
                .find(|(name, _)| *name == command)
            {
                return SessionCommand::Apply(operation.clone());
            }

            return match command.as_str() {
                "open" | "upload" => {
                    let path = parse_single_path_arg(arg);
                    if path.is_empty() {
                        SessionCommand::Invalid {
                            message: "usage: /open <image path>".to_string(),
                        }
                    } else {
                        SessionCommand::Open { path }
                    }
                }
                "save" | "download" => {
                    let path = parse_single_path_arg(arg);
                    SessionCommand::Save {
                        path: (!path.is_empty()).then_some(path),
                    }
                }
                "resize" => match parse_dimensions(arg) {
                    Ok((width, height)) => {
                        SessionCommand::Apply(Operation::ResizeCanvas { width, height })
                    }
                    Err(message) => SessionCommand::Invalid { message },
                },
                "convert" => match parse_format(arg) {
                    Ok(format) => SessionCommand::Apply(Operation::ConvertFormat { format }),
                    Err(message) => SessionCommand::Invalid { message },
                },
                "adjust" => match parse_adjustments(arg) {
                    Ok(operation) => SessionCommand::Apply(operation),
                    Err(message) => SessionCommand::Invalid { message },
                },
                "rotate" => match parse_degrees(arg) {
                    Ok(degrees) => SessionCommand::Apply(Operation::Rotate { degrees }),
                    Err(message) => SessionCommand::Invalid { message },
                },
                "flip" => match parse_direction(arg) {
                    Ok(direction) => SessionCommand::Apply(Operation::Flip { direction }),
                    Err(message) => SessionCommand::Invalid { message },
                },
                "model" => SessionCommand::SetModel {
                    name: (!arg.is_empty()).then(|| arg.to_string()),
                },
                "status" => SessionCommand::Status,
                "history" => SessionCommand::History,
                "reset" => SessionCommand::Reset,
                "help" => SessionCommand::Help,
                "quit" | "exit" => SessionCommand::Quit,
                _ => SessionCommand::Unknown { command },
            };
        }
    }

    SessionCommand::Apply(Operation::CustomPrompt {
        prompt: trimmed.to_string(),
    })
}

fn parse_path_args(arg: &str) -> Vec<String> {
    if arg.trim().is_empty() {
        return Vec::new();
    }
    match shell_words::split(arg) {
        Ok(parts) => parts.into_iter().filter(|value| !value.is_empty()).collect(),
        Err(_) => arg
            .split_whitespace()
            .map(str::to_string)
            .filter(|value| !value.is_empty())
            .collect(),
    }
}

fn parse_single_path_arg(arg: &str) -> String {
    let parts = parse_path_args(arg);
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

fn parse_dimensions(arg: &str) -> Result<(Option<u32>, Option<u32>), String> {
    let trimmed = arg.trim();
    if trimmed.is_empty() {
        return Ok((None, None));
    }
    let usage = "usage: /resize WIDTHxHEIGHT (e.g. /resize 1024x768)";
    let Some((width_text, height_text)) = trimmed.split_once(['x', 'X']) else {
        return Err(usage.to_string());
    };
    match (
        width_text.trim().parse::<u32>(),
        height_text.trim().parse::<u32>(),
    ) {
        (Ok(width), Ok(height)) if width > 0 && height > 0 => Ok((Some(width), Some(height))),
        _ => Err(usage.to_string()),
    }
}

fn parse_format(arg: &str) -> Result<Option<String>, String> {
    let trimmed = arg.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let lowered = trimmed.to_ascii_lowercase();
    if CONVERT_FORMATS.contains(&lowered.as_str()) {
        Ok(Some(lowered))
    } else {
        Err(format!(
            "unsupported format '{trimmed}' (expected one of: {})",
            CONVERT_FORMATS.join(", ")
        ))
    }
}

fn parse_adjustments(arg: &str) -> Result<Operation, String> {
    let mut brightness = 0i64;
    let mut contrast = 0i64;
    let mut saturation = 0i64;
    for token in arg.split_whitespace() {
        let Some((key, value)) = token.split_once('=') else {
            return Err(format!("unrecognized adjustment '{token}' (expected key=value)"));
        };
        let parsed = value
            .trim()
            .parse::<i64>()
            .map_err(|_| format!("'{value}' is not a whole number"))?;
        match key.trim().to_ascii_lowercase().as_str() {
            "brightness" => brightness = parsed,
            "contrast" => contrast = parsed,
            "saturation" => saturation = parsed,
            other => return Err(format!("unknown adjustment channel '{other}'")),
        }
    }
    Ok(Operation::Adjust {
        brightness,
        contrast,
        saturation,
    })
}

fn parse_degrees(arg: &str) -> Result<Option<i64>, String> {
    let trimmed = arg.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<i64>()
        .map(Some)
        .map_err(|_| format!("'{trimmed}' is not a whole number of degrees"))
}

fn parse_direction(arg: &str) -> Result<Option<FlipDirection>, String> {
    let trimmed = arg.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    FlipDirection::parse(trimmed).map(Some).ok_or_else(|| {
        format!("unknown flip direction '{trimmed}' (expected horizontally or vertically)")
    })
}
