//! emx-tmx CLI
//!
//! Inspect, validate and re-encode TMX tile maps.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use emx_tmx::{Compression, Decoder, Encoder, Layer, Map, Tileset};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "emx-tmx")]
#[command(author = "nzinfo <li.monan@gmail.com>")]
#[command(version)]
#[command(about = "TMX tile map tool")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Decode a map and write it back out
    Convert {
        /// Map file to read
        input: PathBuf,

        /// Output map file (default: stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Re-compress every tile layer (none, zlib, gzip)
        #[arg(long)]
        compression: Option<Compression>,
    },

    /// Show the size, tilesets and layers of a map
    #[command(name = "t", alias = "info")]
    Info {
        /// Map file to inspect (default: stdin)
        #[arg(short = 'i', long)]
        input: Option<PathBuf>,
    },

    /// Decode maps and report the ones that fail
    Check {
        /// Map files and directories (searched for *.tmx)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();

    match cli.command {
        Commands::Convert { input, output, compression } => {
            convert_map(&input, output, compression)?;
        }
        Commands::Info { input } => {
            show_info(input)?;
        }
        Commands::Check { inputs } => {
            check_maps(&inputs)?;
        }
    }

    Ok(())
}

fn convert_map(input: &Path, output: Option<PathBuf>, compression: Option<Compression>) -> Result<()> {
    let mut map = Decoder::new()
        .open(input)
        .with_context(|| format!("Failed to decode: {}", input.display()))?;

    if let Some(compression) = compression {
        for layer in &mut map.layers {
            if let Layer::Tiles(layer) = layer {
                layer.compression = compression;
            }
        }
        log::info!("Re-compressing tile layers with {}", compression);
    }

    let encoded = Encoder::new().encode(&map)?;
    if let Some(output_path) = output {
        fs::write(&output_path, encoded)
            .with_context(|| format!("Failed to write: {}", output_path.display()))?;
        log::info!("Wrote {}", output_path.display());
    } else {
        print!("{}", encoded);
    }

    Ok(())
}

fn show_info(input: Option<PathBuf>) -> Result<()> {
    let map = if let Some(input_path) = input {
        Decoder::new()
            .open(&input_path)
            .with_context(|| format!("Failed to decode: {}", input_path.display()))?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        let cwd = std::env::current_dir()?;
        Decoder::new().decode(&buffer, Some(cwd.as_path()))?
    };

    print_map(&map);
    Ok(())
}

fn print_map(map: &Map) {
    println!(
        "{} map, {}x{} tiles of {}x{} px",
        map.orientation,
        map.width(),
        map.height(),
        map.tile_size.0,
        map.tile_size.1
    );

    for (tileset, first_gid) in map.tilesets.iter().zip(map.first_gids()) {
        let origin = match tileset {
            Tileset::Embedded(_) => "embedded".to_string(),
            Tileset::External(external) => external.source.clone(),
        };
        println!(
            "tileset  {:<20} firstgid={:<6} tiles={:<6} {}",
            tileset.name(),
            first_gid,
            tileset.tile_count(),
            origin
        );
    }

    for layer in &map.layers {
        match layer {
            Layer::Tiles(layer) => {
                let used = layer.data.iter().filter(|&&gid| gid != 0).count();
                println!(
                    "layer    {:<20} {} cells used, {}",
                    layer.name, used, layer.compression
                );
            }
            Layer::Objects(layer) => {
                println!("objects  {:<20} {} objects", layer.name, layer.objects.len());
            }
        }
    }
}

fn collect_maps(inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut maps = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let entries = walkdir::WalkDir::new(input)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmx"));
            maps.extend(entries.map(|e| e.into_path()));
        } else {
            maps.push(input.clone());
        }
    }
    maps
}

fn check_maps(inputs: &[PathBuf]) -> Result<()> {
    let decoder = Decoder::new();
    let mut failures = 0usize;
    let maps = collect_maps(inputs);

    for path in &maps {
        match decoder.open(path) {
            Ok(map) => log::info!("ok: {} ({} layers)", path.display(), map.layers.len()),
            Err(err) => {
                failures += 1;
                println!("{}: {}", path.display(), err);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} maps failed to decode", failures, maps.len());
    }
    println!("{} maps ok", maps.len());
    Ok(())
}
