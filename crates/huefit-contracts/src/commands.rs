//! Line parser for the interactive studio session. Raw input comes in, a
//! typed command comes out; the studio decides whether the command is
//! currently available.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StudioCommand {
    SetSubject(String),
    SetGarment(String),
    ClearSubject,
    ClearGarment,
    Brightness(i64),
    Contrast(i64),
    ApplyEdit,
    CancelEdit,
    Analyze,
    /// Palette selection: a 1-based row index or a raw hex color.
    Pick(String),
    Hair(String),
    Save(Option<String>),
    Status,
    Help,
    Quit,
    Noop,
    Unknown(String),
}

pub const HELP_LINES: &[&str] = &[
    "/subject <path>    load a portrait photo (opens the adjust stage)",
    "/garment <path>    load a garment photo",
    "/clear subject     remove the portrait (resets palette and result)",
    "/clear garment     remove the garment",
    "/brightness <pct>  adjust stage: 50-150, default 100",
    "/contrast <pct>    adjust stage: 50-150, default 100",
    "/apply             commit the adjusted photo",
    "/cancel            keep the original photo unchanged",
    "/analyze           suggest a 6-color palette from the portrait",
    "/pick <n|#hex>     try on the garment in a suggested color",
    "/hair <style>      restyle hair on the result (bob, long, pixie, ponytail, or free text)",
    "/save [dir]        save the result as a PNG",
    "/status            show session state",
    "/quit              leave the studio",
];

/// Canned hairstyle shortcuts; anything else is passed through verbatim as a
/// style description.
pub const HAIR_PRESETS: &[(&str, &str)] = &[
    ("bob", "a short bob hairstyle"),
    ("long", "long wavy hair"),
    ("pixie", "a short pixie cut"),
    ("ponytail", "a ponytail hairstyle"),
];

pub fn hair_style_description(arg: &str) -> String {
    let normalized = arg.trim().to_ascii_lowercase();
    HAIR_PRESETS
        .iter()
        .find(|(preset, _)| *preset == normalized)
        .map(|(_, description)| (*description).to_string())
        .unwrap_or_else(|| arg.trim().to_string())
}

fn single_path_arg(arg: &str) -> String {
    let parts = match shell_words::split(arg) {
        Ok(parts) => parts,
        Err(_) => arg.split_whitespace().map(str::to_string).collect(),
    };
    match parts.len() {
        0 => String::new(),
        1 => parts[0].clone(),
        _ => parts.join(" "),
    }
}

fn percent_arg(arg: &str) -> Option<i64> {
    arg.trim().trim_end_matches('%').parse::<i64>().ok()
}

pub fn parse_command(text: &str) -> StudioCommand {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return StudioCommand::Noop;
    }
    let Some(tail) = trimmed.strip_prefix('/') else {
        return StudioCommand::Unknown(trimmed.to_string());
    };

    let command_len = tail
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric() || *ch == '_')
        .count();
    if command_len == 0 {
        return StudioCommand::Unknown(trimmed.to_string());
    }
    let command = tail[..command_len].to_ascii_lowercase();
    let arg = tail[command_len..].trim();

    match command.as_str() {
        "subject" => {
            let path = single_path_arg(arg);
            if path.is_empty() {
                StudioCommand::Unknown(trimmed.to_string())
            } else {
                StudioCommand::SetSubject(path)
            }
        }
        "garment" => {
            let path = single_path_arg(arg);
            if path.is_empty() {
                StudioCommand::Unknown(trimmed.to_string())
            } else {
                StudioCommand::SetGarment(path)
            }
        }
        "clear" => match arg.to_ascii_lowercase().as_str() {
            "subject" => StudioCommand::ClearSubject,
            "garment" => StudioCommand::ClearGarment,
            _ => StudioCommand::Unknown(trimmed.to_string()),
        },
        "brightness" => percent_arg(arg)
            .map(StudioCommand::Brightness)
            .unwrap_or_else(|| StudioCommand::Unknown(trimmed.to_string())),
        "contrast" => percent_arg(arg)
            .map(StudioCommand::Contrast)
            .unwrap_or_else(|| StudioCommand::Unknown(trimmed.to_string())),
        "apply" => StudioCommand::ApplyEdit,
        "cancel" => StudioCommand::CancelEdit,
        "analyze" => StudioCommand::Analyze,
        "pick" if !arg.is_empty() => StudioCommand::Pick(arg.to_string()),
        "hair" if !arg.is_empty() => StudioCommand::Hair(hair_style_description(arg)),
        "save" => {
            let dir = single_path_arg(arg);
            StudioCommand::Save(if dir.is_empty() { None } else { Some(dir) })
        }
        "status" => StudioCommand::Status,
        "help" => StudioCommand::Help,
        "quit" | "exit" => StudioCommand::Quit,
        _ => StudioCommand::Unknown(trimmed.to_string()),
    }
}
