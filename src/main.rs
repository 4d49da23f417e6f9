use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};

use meme_compositor_rust::{
    Caption, CaptionPosition, FontBook, RenderReport, compose_captions, compose_layers,
    load_image, read_layers, settings, write_png,
};

#[derive(Parser, Debug)]
#[command(
    name = "meme-compositor-rust",
    version,
    about = "Draw outlined meme text onto raster images"
)]
struct Cli {
    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings", global = true)]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose", global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP compositing server.
    Serve {
        /// Bind address (default: [server] addr from settings)
        #[arg(long)]
        addr: Option<String>,
    },
    /// Add top/center/bottom caption bands.
    Captions(CaptionArgs),
    /// Add free-positioned text layers from a JSON file.
    Layers(LayerArgs),
}

#[derive(Args, Debug)]
struct IoArgs {
    /// Input image: file path, data URL, base64, or http(s) URL
    #[arg(short = 'i', long = "input")]
    input: String,

    /// Output PNG path
    #[arg(short = 'o', long = "output")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct CaptionArgs {
    #[command(flatten)]
    io: IoArgs,

    /// Caption drawn in the top band
    #[arg(long)]
    top: Option<String>,

    /// Caption drawn in the center band
    #[arg(long)]
    center: Option<String>,

    /// Caption drawn in the bottom band
    #[arg(long)]
    bottom: Option<String>,

    /// Font size override in pixels (default: image width / 15)
    #[arg(long = "font-size")]
    font_size: Option<f32>,
}

#[derive(Args, Debug)]
struct LayerArgs {
    #[command(flatten)]
    io: IoArgs,

    /// JSON file holding an array of text layers
    #[arg(long = "layers")]
    layers: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    meme_compositor_rust::logging::init(cli.verbose)?;
    let settings = settings::load_settings(cli.read_settings.as_deref().map(Path::new))?;

    match cli.command {
        Command::Serve { addr } => {
            let addr = addr.unwrap_or_else(|| settings.server_addr.clone());
            let fonts_settings = settings.fonts.clone();
            let fonts =
                tokio::task::spawn_blocking(move || FontBook::load(&fonts_settings)).await?;
            meme_compositor_rust::server::run_server(settings, Arc::new(fonts), addr).await
        }
        Command::Captions(args) => {
            let captions = collect_captions(&args);
            let mut surface = load_image(&args.io.input).await?;
            let fonts = FontBook::load(&settings.fonts);
            let report = compose_captions(
                &mut surface,
                &captions,
                &fonts,
                &settings.fonts.caption_family,
            )?;
            write_png(&args.io.output, &surface).await?;
            print_report(&args.io.output, &report);
            Ok(())
        }
        Command::Layers(args) => {
            let layers = read_layers(&args.layers)?;
            if layers.is_empty() {
                return Err(anyhow!("layers file contains no text layers"));
            }
            let mut surface = load_image(&args.io.input).await?;
            let fonts = FontBook::load(&settings.fonts);
            let report = compose_layers(&mut surface, &layers, &fonts)?;
            write_png(&args.io.output, &surface).await?;
            print_report(&args.io.output, &report);
            Ok(())
        }
    }
}

fn collect_captions(args: &CaptionArgs) -> Vec<Caption> {
    [
        (CaptionPosition::Top, &args.top),
        (CaptionPosition::Center, &args.center),
        (CaptionPosition::Bottom, &args.bottom),
    ]
    .into_iter()
    .filter_map(|(position, text)| {
        text.as_ref().map(|text| Caption {
            text: text.clone(),
            position,
            font_size: args.font_size,
        })
    })
    .collect()
}

fn print_report(output: &Path, report: &RenderReport) {
    for warning in report.warnings() {
        eprintln!("warning: {}", warning);
    }
    println!("{} ({} line(s) drawn)", output.display(), report.lines_drawn);
}
