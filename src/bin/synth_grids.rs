//! Writes a matching pair of synthetic grids
//!
//! Produces an undulation grid and an elevation grid at the same whole-degree
//! step, filled with smooth analytic fields, so geoid_mesh can be run end to
//! end without the real global datasets.
//!
//! Usage: synth_grids --step-degrees 1 --undulation egm.txt --elevation etopo.txt

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::Parser;
use colored::Colorize;

use geoid_mesh::grid::synthetic::{
    demo_elevation_km, demo_undulation_m, is_valid_step, write_elevation_grid,
    write_undulation_grid,
};

#[cfg(feature = "jemalloc")]
use tikv_jemallocator::Jemalloc;

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "synth_grids")]
#[command(about = "Write synthetic undulation and elevation grids", long_about = None)]
struct Args {
    /// Native grid step in whole degrees; must divide 180
    #[arg(long, default_value_t = 1)]
    step_degrees: u32,

    /// Undulation grid output path
    #[arg(long, default_value = "synthetic_egm.txt")]
    undulation: PathBuf,

    /// Elevation grid output path
    #[arg(long, default_value = "synthetic_etopo.txt")]
    elevation: PathBuf,
}

fn write_grid(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating '{}'", path.display()))?;
    let mut w = BufWriter::new(file);
    write(&mut w).with_context(|| format!("writing '{}'", path.display()))?;
    w.flush()?;
    Ok(())
}

fn run(args: &Args) -> anyhow::Result<()> {
    if !is_valid_step(args.step_degrees) {
        bail!(
            "step of {} degrees does not tile the globe; use a divisor of 180",
            args.step_degrees
        );
    }

    write_grid(&args.undulation, |w| {
        write_undulation_grid(w, args.step_degrees, demo_undulation_m)
    })?;
    write_grid(&args.elevation, |w| {
        write_elevation_grid(w, args.step_degrees, demo_elevation_km)
    })?;
    Ok(())
}

fn main() {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => {
            let native_minutes = args.step_degrees * 60;
            println!(
                "{}",
                format!(
                    "✓ Wrote {} and {} at {}' (use an output step that is a multiple of {})",
                    args.undulation.display(),
                    args.elevation.display(),
                    native_minutes,
                    native_minutes * 2
                )
                .green()
            );
        }
        Err(e) => {
            eprintln!("{} {:#}", "✗ synth_grids failed:".red(), e);
            std::process::exit(1);
        }
    }
}
