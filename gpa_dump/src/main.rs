use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use gpa_export::{
    EventRange, ExportOptions, TextureFileFormat, capture_file::JsonCapture, export_frame,
};
use gpa_lib::skinning::{MatrixLayout, SkinningOptions};
use log::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// The folder containing capture.json and the resource data files.
    capture: PathBuf,

    /// The folder for the exported frame. Defaults to the capture folder.
    output: Option<PathBuf>,

    /// The first event to export starting from 1.
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    start: i64,

    /// The last event to export or -1 for all remaining events.
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    end: i64,

    /// Apply bone transforms from 768 byte constant buffers to meshes.
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=1))]
    skinning: u8,

    /// Treat skeleton rows as the columns of each bone transform.
    #[arg(long)]
    column_major: bool,

    /// Write the intermediate skinning values to bone.json.
    #[arg(long)]
    bone_debug: bool,

    /// The file format for textures.
    #[arg(long, value_enum, default_value_t = TextureFormat::Dds)]
    format: TextureFormat,

    /// Flip textures vertically.
    #[arg(long)]
    flip: bool,
}

#[derive(Debug, Copy, PartialEq, Clone, Eq, ValueEnum)]
enum TextureFormat {
    Dds,
    Png,
    Tga,
}

impl From<TextureFormat> for TextureFileFormat {
    fn from(value: TextureFormat) -> Self {
        match value {
            TextureFormat::Dds => Self::Dds,
            TextureFormat::Png => Self::Png,
            TextureFormat::Tga => Self::Tga,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()?;

    let start = std::time::Instant::now();

    let capture = JsonCapture::from_folder(&cli.capture)
        .with_context(|| format!("failed to load capture from {:?}", cli.capture))?;

    let options = ExportOptions {
        output_folder: cli.output.unwrap_or_else(|| cli.capture.clone()),
        events: EventRange::from_bounds(cli.start, cli.end),
        skinning: (cli.skinning == 1).then_some(SkinningOptions {
            matrix_layout: if cli.column_major {
                MatrixLayout::ColumnMajor
            } else {
                MatrixLayout::RowMajor
            },
            debug_output: cli.bone_debug,
        }),
        texture_format: cli.format.into(),
        flip_textures: cli.flip,
    };

    let frame = export_frame(&capture, &options)?;

    for event in frame.events.iter().filter(|e| e.error.is_some()) {
        error!(
            "Event {} {}: {}",
            event.index,
            event.name,
            event.error.as_deref().unwrap_or_default()
        );
    }

    let summary = frame.summary();
    info!("Exported {} events to {:?}", summary.events, frame.folder);
    info!(
        "Textures: {}, Buffers: {}, Meshes: {}, Shader Programs: {}",
        summary.textures, summary.buffers, summary.meshes, summary.shader_programs
    );
    if summary.skipped > 0 || summary.errors > 0 {
        info!(
            "Skipped {} artifacts, {} events failed",
            summary.skipped, summary.errors
        );
    }

    info!("Finished in {:?}", start.elapsed());
    Ok(())
}
