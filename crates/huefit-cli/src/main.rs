use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use huefit_contracts::commands::{parse_command, StudioCommand, HELP_LINES};
use huefit_contracts::events::SessionLog;
use huefit_contracts::palette::ColorSuggestion;
use huefit_engine::{DryrunGateway, GeminiGateway, Studio, TryOnGateway};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "huefit", version, about = "Personal-color analysis and virtual try-on studio")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive try-on session.
    Studio(StudioArgs),
    /// One-shot palette suggestion for a portrait.
    Analyze(AnalyzeArgs),
    /// One-shot try-on: portrait + garment + color, saved as a PNG.
    Tryon(TryonArgs),
}

#[derive(Debug, Args)]
struct GatewayArgs {
    /// Run against the offline deterministic gateway instead of Gemini.
    #[arg(long)]
    dryrun: bool,
    #[arg(long)]
    analysis_model: Option<String>,
    #[arg(long)]
    image_model: Option<String>,
}

#[derive(Debug, Parser)]
struct StudioArgs {
    /// Directory for saved results and the session log.
    #[arg(long, default_value = "huefit-out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    gateway: GatewayArgs,
}

#[derive(Debug, Parser)]
struct AnalyzeArgs {
    #[arg(long)]
    portrait: PathBuf,
    #[arg(long, default_value = "huefit-out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    gateway: GatewayArgs,
}

#[derive(Debug, Parser)]
struct TryonArgs {
    #[arg(long)]
    portrait: PathBuf,
    #[arg(long)]
    garment: PathBuf,
    /// Target clothing color, e.g. "#1A2B3C".
    #[arg(long)]
    color: String,
    /// Optional hairstyle applied to the finished try-on.
    #[arg(long)]
    hair: Option<String>,
    #[arg(long, default_value = "huefit-out")]
    out: PathBuf,
    #[arg(long)]
    events: Option<PathBuf>,
    #[command(flatten)]
    gateway: GatewayArgs,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("huefit error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Studio(args) => run_studio(args),
        Command::Analyze(args) => run_analyze(args),
        Command::Tryon(args) => run_tryon(args),
    }
}

fn build_studio(out: &Path, events: Option<PathBuf>, gateway: &GatewayArgs) -> Result<Studio> {
    let gateway: Box<dyn TryOnGateway> = if gateway.dryrun {
        Box::new(DryrunGateway::new())
    } else {
        Box::new(
            GeminiGateway::from_env()?
                .with_models(gateway.analysis_model.clone(), gateway.image_model.clone()),
        )
    };
    let events_path = events.unwrap_or_else(|| out.join("session.jsonl"));
    let log = SessionLog::new(events_path, format!("session-{}", Uuid::new_v4()));
    Studio::new(gateway, log)
}

fn run_studio(args: StudioArgs) -> Result<i32> {
    let mut studio = build_studio(&args.out, args.events, &args.gateway)?;
    let stdin = io::stdin();
    let mut line = String::new();

    println!("huefit studio started. Type /help for commands.");
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
            StudioCommand::Noop => continue,
            StudioCommand::Quit => break,
            StudioCommand::Help => {
                for help_line in HELP_LINES {
                    println!("{help_line}");
                }
            }
            StudioCommand::Status => {
                for status_line in studio.status_lines() {
                    println!("{status_line}");
                }
            }
            StudioCommand::SetSubject(path) => {
                report(studio.load_subject(Path::new(&path)));
            }
            StudioCommand::SetGarment(path) => {
                report(studio.load_garment(Path::new(&path)));
            }
            StudioCommand::ClearSubject => report(studio.clear_subject()),
            StudioCommand::ClearGarment => report(studio.clear_garment()),
            StudioCommand::Brightness(percent) => report(studio.set_brightness(percent)),
            StudioCommand::Contrast(percent) => report(studio.set_contrast(percent)),
            StudioCommand::ApplyEdit => report(studio.apply_edit()),
            StudioCommand::CancelEdit => report(studio.cancel_edit()),
            StudioCommand::Analyze => {
                report(studio.analyze());
                print_palette(&studio);
            }
            StudioCommand::Pick(selector) => report(studio.pick(&selector)),
            StudioCommand::Hair(style) => report(studio.restyle(&style)),
            StudioCommand::Save(dir) => {
                let dir = dir.map(PathBuf::from).unwrap_or_else(|| args.out.clone());
                match studio.save_result(&dir) {
                    Ok(path) => println!("Saved {}", path.display()),
                    Err(err) => println!("Save failed: {err:#}"),
                }
            }
            StudioCommand::Unknown(input) => {
                println!("Unrecognized input '{input}'. Type /help for commands.");
            }
        }
    }
    Ok(0)
}

fn run_analyze(args: AnalyzeArgs) -> Result<i32> {
    let mut studio = build_studio(&args.out, args.events, &args.gateway)?;
    report(studio.load_subject(&args.portrait));
    report(studio.cancel_edit());
    report(studio.analyze());
    if studio.state().palette().is_some() {
        print_palette(&studio);
        Ok(0)
    } else {
        Ok(1)
    }
}

fn run_tryon(args: TryonArgs) -> Result<i32> {
    let mut studio = build_studio(&args.out, args.events, &args.gateway)?;
    report(studio.load_subject(&args.portrait));
    report(studio.cancel_edit());
    report(studio.load_garment(&args.garment));
    report(studio.pick(&args.color));
    if studio.state().result().is_none() {
        bail!(
            "try-on produced no result: {}",
            studio.state().error().unwrap_or("unknown failure")
        );
    }
    if let Some(style) = args.hair.as_deref() {
        report(studio.restyle(&huefit_contracts::commands::hair_style_description(style)));
    }
    let artifact = studio.save_result(&args.out)?;
    println!("Saved {}", artifact.display());
    Ok(0)
}

fn report(outcome: Result<String>) {
    match outcome {
        Ok(message) => println!("{message}"),
        Err(err) => println!("Error: {err:#}"),
    }
}

fn print_palette(studio: &Studio) {
    let Some(palette) = studio.state().palette() else {
        return;
    };
    let selected = studio.state().selected_color();
    println!("Suggested palette:");
    for (idx, entry) in palette.iter().enumerate() {
        println!("{}", palette_row(idx, entry, selected));
    }
    println!("Pick one with /pick <row>.");
}

fn palette_row(idx: usize, entry: &ColorSuggestion, selected: Option<&str>) -> String {
    let (r, g, b) = entry.rgb();
    let marker = if selected == Some(entry.hex.as_str()) {
        "*"
    } else {
        " "
    };
    let name = entry.name.as_deref().unwrap_or("");
    format!(
        "{marker} {}. \x1b[48;2;{r};{g};{b}m  \x1b[0m {} {}",
        idx + 1,
        entry.hex,
        name
    )
    .trim_end()
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_row_formats_hex_and_selection_marker() {
        let entry = ColorSuggestion {
            hex: "#1A2B3C".to_string(),
            name: Some("Deep Teal".to_string()),
        };
        let row = palette_row(0, &entry, None);
        assert!(row.contains("1."));
        assert!(row.contains("#1A2B3C"));
        assert!(row.contains("Deep Teal"));
        assert!(row.contains("48;2;26;43;60"));
        assert!(row.starts_with("  "));

        let selected = palette_row(0, &entry, Some("#1A2B3C"));
        assert!(selected.starts_with("* "));
    }

    #[test]
    fn palette_row_without_name_has_no_trailing_space() {
        let entry = ColorSuggestion {
            hex: "#000000".to_string(),
            name: None,
        };
        let row = palette_row(2, &entry, None);
        assert!(row.ends_with("#000000"));
        assert!(row.contains("3."));
    }

    #[test]
    fn cli_declaration_is_consistent() {
        use clap::CommandFactory as _;
        Cli::command().debug_assert();
    }
}
