//! One-shot recolor: load an image, apply clicks in order, write the result.

use std::fs;
use std::path::PathBuf;

use clap::Args;

use crate::config::Config;
use crate::error::{ColorizeError, Result};
use crate::output::{display_path, plural, Printer};
use crate::render;
use crate::service::ColorizerService;

/// A click position given on the command line as `X,Y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Click {
    pub x: i64,
    pub y: i64,
}

/// Recolor regions of an image by clicking points
#[derive(Args, Debug)]
pub struct RecolorArgs {
    /// Image to recolor
    pub image: PathBuf,

    /// Click position as X,Y (repeat for several clicks)
    #[arg(long = "at", value_name = "X,Y", value_parser = parse_click, required = true)]
    pub at: Vec<Click>,

    /// Paint colour as #RRGGBB; one per --at, or a single colour for all
    #[arg(long, value_name = "HEX", required = true)]
    pub color: Vec<String>,

    /// Output file (.jpg, .jpeg or .png)
    #[arg(long, short)]
    pub output: PathBuf,
}

pub fn parse_click(s: &str) -> std::result::Result<Click, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected X,Y but got {:?}", s))?;
    let x = x.trim().parse().map_err(|_| format!("invalid x coordinate {:?}", x))?;
    let y = y.trim().parse().map_err(|_| format!("invalid y coordinate {:?}", y))?;
    Ok(Click { x, y })
}

/// Pair each click with its colour.
fn pair_clicks(at: &[Click], color: &[String]) -> Result<Vec<(Click, String)>> {
    match color.len() {
        1 => Ok(at.iter().map(|&c| (c, color[0].clone())).collect()),
        n if n == at.len() => Ok(at.iter().copied().zip(color.iter().cloned()).collect()),
        n => Err(ColorizeError::Input {
            message: format!(
                "Got {} but {}",
                plural(at.len(), "click", "clicks"),
                plural(n, "colour", "colours")
            ),
            help: Some(
                "Give one --color per --at, or a single --color for every click".to_string(),
            ),
        }),
    }
}

pub fn run(args: RecolorArgs, config: Config, printer: &Printer) -> Result<()> {
    let clicks = pair_clicks(&args.at, &args.color)?;
    // Fail on a bad output name before doing any work.
    render::output_format(&args.output)?;

    let bytes = fs::read(&args.image).map_err(|e| ColorizeError::Io {
        path: args.image.clone(),
        message: format!("Failed to read image: {}", e),
    })?;

    let quality = config.jpeg_quality;
    let service = ColorizerService::new(config);
    let created = service.create_session(&bytes)?;
    let id = created.session_id.as_str();
    printer.info(
        "Loaded",
        &format!(
            "{} {}",
            display_path(&args.image),
            printer.dim(&format!("({}x{}, {})", created.width, created.height, created.strategy))
        ),
    );

    for (click, colour) in &clicks {
        service.recolor(id, click.x, click.y, colour)?;
        printer.status("Painted", &format!("{} at ({}, {})", colour, click.x, click.y));
    }

    let pixels = service.current_pixels(id)?;
    if let Some(parent) = args.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ColorizeError::Io {
            path: parent.to_path_buf(),
            message: format!("Failed to create output directory: {}", e),
        })?;
    }
    render::write_image(&pixels, &args.output, quality)?;
    service.destroy(id);

    printer.status(
        "Finished",
        &format!("{} ({})", display_path(&args.output), plural(clicks.len(), "click", "clicks")),
    );
    Ok(())
}
