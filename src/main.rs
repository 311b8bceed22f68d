use std::path::PathBuf;

use anyhow::{Context, Result};
use aseprite_loader::{CelContent, Document};
use clap::Parser;

/// Decode an Aseprite file and print what it contains
#[derive(Parser)]
#[command(name = "ase-inspect")]
struct Cli {
    /// `.ase` / `.aseprite` file to decode
    path: PathBuf,

    /// Print the decoded document as JSON (pixel data omitted)
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let bytes = std::fs::read(&cli.path)
        .with_context(|| format!("Failed to read {}", cli.path.display()))?;
    let doc = aseprite_loader::load(&bytes)
        .with_context(|| format!("Failed to decode {}", cli.path.display()))?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
    } else {
        print_summary(&doc);
    }
    Ok(())
}

fn print_summary(doc: &Document) {
    println!(
        "{}x{} {:?}, {} frames, {} palette entries",
        doc.width,
        doc.height,
        doc.colour_depth,
        doc.frames.len(),
        doc.palette.len()
    );

    println!("Layers:");
    for (index, layer) in doc.layers.iter().enumerate() {
        let indent = "  ".repeat(layer.child_level as usize + 1);
        println!(
            "{indent}[{index}] {} ({:?}, opacity {}{})",
            layer.name,
            layer.kind,
            layer.opacity,
            if layer.flags.visible { "" } else { ", hidden" }
        );
    }

    println!("Frames:");
    for (index, frame) in doc.frames.iter().enumerate() {
        println!("  [{index}] {}ms, {} cels", frame.duration_ms, frame.cels.len());
        for cel in &frame.cels {
            match &cel.content {
                CelContent::Linked { frame_position } => {
                    println!("    layer {} -> frame {frame_position}", cel.layer);
                }
                CelContent::Raw { width, height, .. }
                | CelContent::Compressed { width, height, .. } => {
                    println!(
                        "    layer {} at ({}, {}) {width}x{height}",
                        cel.layer, cel.x, cel.y
                    );
                }
            }
        }
    }

    if !doc.tags.is_empty() {
        println!("Tags:");
        for tag in &doc.tags {
            println!(
                "  {} frames {}..={} {:?}",
                tag.name, tag.from, tag.to, tag.direction
            );
        }
    }
}
