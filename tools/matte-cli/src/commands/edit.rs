//! Interactive compositing shell.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use matte_common::clock::SystemClock;
use matte_common::config::AppConfig;
use matte_common::error::{MatteError, MatteResult};
use matte_editor::{Control, EditSession, Notice, Point, Slot, Upload};
use matte_model::transform::TransformPatch;
use matte_render_engine::export::{ExportFormat, ExportKind};
use matte_render_engine::{DirectorySink, ExportSink};

const HELP: &str = "\
Commands:
  load bg|fg <path>          Load the background or foreground image
  clear bg|fg                Remove an image
  set <control>=<value>      x, y, scale (0.1-3), rotation (0-360), opacity (0-1)
  move <x> <y>               Place the foreground center at an offset
  drag <x0> <y0> <x1> <y1>   Drag on the preview canvas
  zoom in|out                Change preview magnification
  reset                      Reset the transform
  status                     Show images, transform, and canvas
  preview <path>             Save the current preview as PNG
  format png|jpg             Composite export format
  export composite|mask|both Export at full resolution
  help                       Show this help
  quit                       Leave the session";

#[derive(Debug, Clone, PartialEq)]
enum ShellCommand {
    Load { slot: Slot, path: PathBuf },
    Clear(Slot),
    Set { control: Control, value: f64 },
    Move { x: f64, y: f64 },
    Drag { from: Point, to: Point },
    ZoomIn,
    ZoomOut,
    Reset,
    Status,
    Preview(PathBuf),
    Format(ExportFormat),
    Export(ExportKind),
    Help,
    Quit,
}

fn number(token: Option<&str>, what: &str) -> MatteResult<f64> {
    let token = token.ok_or_else(|| MatteError::invalid_input(format!("Missing {what}")))?;
    token
        .parse::<f64>()
        .map_err(|_| MatteError::invalid_input(format!("Not a number for {what}: {token}")))
}

fn word<'a>(token: Option<&'a str>, what: &str) -> MatteResult<&'a str> {
    token.ok_or_else(|| MatteError::invalid_input(format!("Missing {what}")))
}

/// Parse one shell line. Blank lines and `#` comments yield `None`.
fn parse_line(line: &str) -> MatteResult<Option<ShellCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let (head, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();
    let mut args = rest.split_whitespace();

    let command = match head.to_ascii_lowercase().as_str() {
        "load" => {
            let slot: Slot = word(args.next(), "slot")?.parse()?;
            // Paths may contain spaces: take everything after the slot.
            let path = rest
                .split_once(char::is_whitespace)
                .map(|(_, p)| p.trim())
                .filter(|p| !p.is_empty())
                .ok_or_else(|| MatteError::invalid_input("Missing image path"))?;
            ShellCommand::Load {
                slot,
                path: PathBuf::from(path),
            }
        }
        "clear" => ShellCommand::Clear(word(args.next(), "slot")?.parse()?),
        "set" => {
            let (name, value) = match rest.split_once('=') {
                Some((name, value)) => (name.trim(), Some(value.trim())),
                None => (word(args.next(), "control")?, args.next()),
            };
            ShellCommand::Set {
                control: name.parse()?,
                value: number(value, name)?,
            }
        }
        "move" => ShellCommand::Move {
            x: number(args.next(), "x")?,
            y: number(args.next(), "y")?,
        },
        "drag" => ShellCommand::Drag {
            from: Point::new(number(args.next(), "x0")?, number(args.next(), "y0")?),
            to: Point::new(number(args.next(), "x1")?, number(args.next(), "y1")?),
        },
        "zoom" => match word(args.next(), "zoom direction")? {
            "in" | "+" => ShellCommand::ZoomIn,
            "out" | "-" => ShellCommand::ZoomOut,
            other => {
                return Err(MatteError::invalid_input(format!(
                    "Unknown zoom direction: {other}. Use: in, out"
                )))
            }
        },
        "reset" => ShellCommand::Reset,
        "status" | "st" => ShellCommand::Status,
        "preview" => {
            if rest.is_empty() {
                return Err(MatteError::invalid_input("Missing output path"));
            }
            ShellCommand::Preview(PathBuf::from(rest))
        }
        "format" => ShellCommand::Format(word(args.next(), "format")?.parse()?),
        "export" => ShellCommand::Export(word(args.next(), "export kind")?.parse()?),
        "help" | "?" => ShellCommand::Help,
        "quit" | "exit" | "q" => ShellCommand::Quit,
        other => {
            return Err(MatteError::invalid_input(format!(
                "Unknown command: {other}. Type 'help' for commands"
            )))
        }
    };

    Ok(Some(command))
}

async fn load_path(session: &mut EditSession, slot: Slot, path: &Path) -> Notice {
    match Upload::from_path(path) {
        Ok(upload) => session.load_notice(slot, upload).await,
        Err(e) => Notice::from(e),
    }
}

fn print_status(session: &EditSession) {
    for slot in [Slot::Background, Slot::Foreground] {
        match session.image(slot) {
            Some(asset) => println!("  {}: {}", slot.title(), asset.info),
            None => println!("  {}: (none)", slot.title()),
        }
    }

    let transform = session.transform();
    let controls = Control::ALL
        .iter()
        .map(|c| format!("{c}={}", c.display_value(&transform)))
        .collect::<Vec<_>>();
    println!("  Transform: {}", controls.join("  "));
    println!("  {}", session.status());
    println!("  Export format: {}", session.settings().format);
    if let Some(hint) = session.availability().hint {
        println!("  {hint}");
    }
}

/// Execute one command. Returns `false` when the session should end.
async fn execute(
    session: &mut EditSession,
    sink: &Arc<dyn ExportSink>,
    command: ShellCommand,
) -> bool {
    match command {
        ShellCommand::Load { slot, path } => println!("{}", load_path(session, slot, &path).await),
        ShellCommand::Clear(slot) => println!("{}", session.clear(slot)),
        ShellCommand::Set { control, value } => match session.set_control(control, value) {
            Ok(t) => println!("{control} = {}", control.display_value(&t)),
            Err(e) => println!("{}", Notice::from(e)),
        },
        ShellCommand::Move { x, y } => {
            let (px, py) = session.update(&TransformPatch::position(x, y)).rounded_position();
            println!("Position: {px}, {py}");
        }
        ShellCommand::Drag { from, to } => {
            if !session.pointer_down(from) {
                println!("{}", Notice::info("Nothing to drag: no foreground image"));
            } else {
                let moved = session.pointer_move(to);
                session.pointer_up();
                if let Some((px, py)) = moved.map(|t| t.rounded_position()) {
                    println!("Position: {px}, {py}");
                }
            }
        }
        ShellCommand::ZoomIn => println!("Zoom: {}%", session.zoom_in()),
        ShellCommand::ZoomOut => println!("Zoom: {}%", session.zoom_out()),
        ShellCommand::Reset => {
            session.reset();
            println!("Transform reset");
        }
        ShellCommand::Status => print_status(session),
        ShellCommand::Preview(path) => {
            let result = session.preview_png().and_then(|bytes| {
                std::fs::write(&path, bytes).map_err(MatteError::from)
            });
            match result {
                Ok(()) => println!(
                    "{}",
                    Notice::success(format!("Preview saved to {}", path.display()))
                ),
                Err(e) => println!("{}", Notice::from(e)),
            }
        }
        ShellCommand::Format(format) => {
            session.set_format(format);
            println!("Export format: {format}");
        }
        ShellCommand::Export(kind) => {
            let notice = session
                .export_notice(kind, Arc::clone(sink), &SystemClock)
                .await;
            println!("{notice}");
        }
        ShellCommand::Help => println!("{HELP}"),
        ShellCommand::Quit => return false,
    }
    true
}

pub async fn run(
    config: AppConfig,
    background: Option<PathBuf>,
    foreground: Option<PathBuf>,
    format: Option<String>,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let output_dir = output.unwrap_or_else(|| config.export.output_dir.clone());
    let mut session =
        EditSession::new(config).map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;
    if let Some(format) = format {
        let format: ExportFormat = format
            .parse()
            .map_err(|e: MatteError| anyhow::anyhow!("{}", e.user_message()))?;
        session.set_format(format);
    }

    let sink: Arc<dyn ExportSink> = Arc::new(DirectorySink::new(&output_dir));
    tracing::info!(output = %output_dir.display(), "Edit session started");

    println!("Matte interactive session. Exports go to {}", output_dir.display());
    println!("Type 'help' for commands.");

    if let Some(path) = background {
        println!("{}", load_path(&mut session, Slot::Background, &path).await);
    }
    if let Some(path) = foreground {
        println!("{}", load_path(&mut session, Slot::Foreground, &path).await);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("matte> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };

        match parse_line(&line) {
            Ok(Some(command)) => {
                if !execute(&mut session, &sink, command).await {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => println!("{}", Notice::from(e)),
        }
    }

    tracing::info!("Edit session ended");
    Ok(())
}
