//! volsynth - synthetic volume generator
//!
//! Usage: cargo run --release -- [OPTIONS]
//!
//! Options:
//!   --output <PATH>       Output file; `.uvf` builds a container, anything else a raw file
//!   --size <X Y Z | N>    Volume dimensions (default: 128)
//!   --bits <8|16>         Sample bit width (default: 8)
//!   --mandelbulb          Generate the Mandelbulb instead of the radial falloff
//!   --brick-size <N>      Target brick edge length (default: 64)
//!   --toc                 Store the payload as a table-of-contents brick hierarchy
//!   --keep-raw            Keep the raw intermediate next to the container
//!   --compress            LZ4-compress TOC bricks
//!   --memory-mb <MB>      Bricking memory budget (default: 1024)
//!   --jobs <N>            Worker threads (default: all cores)
//!   --config <JSON>       Load settings from a JSON file; flags override it

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;

use volsynth::core::{logging, LogProgress};
use volsynth::generation::GeneratorConfig;
use volsynth::pipeline::Assembler;

fn main() -> ExitCode {
    logging::init();

    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        print_usage();
        return ExitCode::SUCCESS;
    }

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            print_usage();
            return ExitCode::FAILURE;
        }
    };

    if let Some(jobs) = config.jobs {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(jobs).build_global() {
            log::error!("Failed to configure thread pool: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let [x, y, z] = config.dims;
    println!("=== volsynth ===");
    println!("Output: {}", config.output.display());
    println!("Size:   {} x {} x {} @ {} bit", x, y, z, config.bit_width);
    println!("Field:  {}", config.field().name());
    println!(
        "Layout: {} bricks of {}{}",
        if config.use_toc { "TOC" } else { "raster" },
        config.brick_size,
        if config.use_toc && config.compress { " (LZ4)" } else { "" }
    );
    println!();

    let start = Instant::now();
    match Assembler::for_config(&config).build(&config, &LogProgress) {
        Ok(report) => {
            println!("Done in {:.1}s", start.elapsed().as_secs_f64());
            if let Some(container) = &report.container_path {
                println!(
                    "Container: {} ({:.1} MB, {} LOD levels, {} histogram buckets)",
                    container.display(),
                    report.container_bytes as f64 / (1024.0 * 1024.0),
                    report.lod_levels,
                    report.histogram_buckets
                );
                if let Some(range) = report.global_range {
                    println!("Range:     {} .. {}", range.min_scalar, range.max_scalar);
                }
            }
            if let Some(raw) = &report.raw_path {
                println!(
                    "Raw:       {} ({:.1} MB)",
                    raw.display(),
                    report.raw_bytes as f64 / (1024.0 * 1024.0)
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("Generation failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// JSON config (if any) overridden by command line flags
fn build_config(args: &[String]) -> Result<GeneratorConfig, String> {
    let mut config = match parse_str_arg(args, "--config")? {
        Some(path) => GeneratorConfig::from_json_file(&path).map_err(|e| e.to_string())?,
        None => GeneratorConfig::default(),
    };

    if let Some(output) = parse_str_arg(args, "--output")? {
        config.output = PathBuf::from(output);
    }
    if let Some(dims) = parse_size_arg(args, "--size")? {
        config.dims = dims;
    }
    if let Some(bits) = parse_num_arg::<u32>(args, "--bits")? {
        config.bit_width = bits;
    }
    if let Some(brick_size) = parse_num_arg::<u64>(args, "--brick-size")? {
        config.brick_size = brick_size;
    }
    if let Some(memory) = parse_num_arg::<u64>(args, "--memory-mb")? {
        config.memory_budget_mb = memory;
    }
    if let Some(jobs) = parse_num_arg::<usize>(args, "--jobs")? {
        config.jobs = Some(jobs);
    }
    config.mandelbulb |= has_flag(args, "--mandelbulb");
    config.use_toc |= has_flag(args, "--toc");
    config.keep_raw |= has_flag(args, "--keep-raw");
    config.compress |= has_flag(args, "--compress");

    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn print_usage() {
    println!("Usage: volsynth --output <PATH> [--size X Y Z | N] [--bits 8|16] [--mandelbulb]");
    println!("                [--brick-size N] [--toc] [--keep-raw] [--compress]");
    println!("                [--memory-mb MB] [--jobs N] [--config FILE]");
}

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

/// `--size X Y Z` or `--size N` for a cube
fn parse_size_arg(args: &[String], flag: &str) -> Result<Option<[u64; 3]>, String> {
    let Some(i) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    let values = args[i + 1..]
        .iter()
        .take_while(|s| !s.starts_with("--"))
        .take(3)
        .map(|s| s.parse::<u64>().map_err(|_| format!("{} expects integers, got '{}'", flag, s)))
        .collect::<Result<Vec<u64>, String>>()?;
    match values.as_slice() {
        &[x, y, z] => Ok(Some([x, y, z])),
        &[n] => Ok(Some([n, n, n])),
        _ => Err(format!("{} expects one or three integers", flag)),
    }
}

/// Value following `flag`; a flag without a parsable value is an error
fn parse_num_arg<T: FromStr>(args: &[String], flag: &str) -> Result<Option<T>, String> {
    let Some(value) = parse_str_arg(args, flag)? else {
        return Ok(None);
    };
    value
        .parse()
        .map(Some)
        .map_err(|_| format!("{} expects an integer, got '{}'", flag, value))
}

fn parse_str_arg(args: &[String], flag: &str) -> Result<Option<String>, String> {
    match args.iter().position(|a| a == flag) {
        None => Ok(None),
        Some(i) => args
            .get(i + 1)
            .filter(|value| !value.starts_with("--"))
            .cloned()
            .map(Some)
            .ok_or_else(|| format!("{} expects a value", flag)),
    }
}
