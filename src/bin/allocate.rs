use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use thruster_envelope::{
    allocation::AllocationModel,
    geometry::{self, ThrusterGeometry},
    settings::Settings,
    Wrench,
};
use tracing_subscriber::EnvFilter;

/// Allocates a single wrench and prints the per thruster forces
#[derive(Parser, Debug)]
struct Cli {
    /// Target wrench: fx fy fz tx ty tz
    #[arg(num_args = 6, allow_negative_numbers = true, required = true)]
    wrench: Vec<f64>,

    /// CSV with `x,y,z,nx,ny,nz` columns, one thruster per row
    #[arg(long)]
    geometry: Option<PathBuf>,

    /// JSON overriding the default constraints and solver settings
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => Settings::from_json_file(path).context("Read settings")?,
        None => Settings::default(),
    };
    let geometry = match &cli.geometry {
        Some(path) => geometry::read_geometry(path).context("Read thruster geometry")?,
        None => ThrusterGeometry::tetrahedral(1.0),
    };

    let model = AllocationModel::new(geometry).context("Build allocation model")?;
    let allocator = settings.allocator(&model);

    let target = Wrench::try_from(cli.wrench.as_slice()).context("Parse target wrench")?;
    let allocation = allocator.allocate(&target).context("Allocate wrench")?;

    println!("target:   {:+.4?}", target.to_vector().as_slice());
    for (idx, (force, state)) in allocation
        .thruster_forces()
        .zip(allocator.report(&allocation))
        .enumerate()
    {
        let cosine = state
            .cosine
            .map_or_else(|| "idle".to_owned(), |it| format!("{it:+.4}"));
        let ok = if state.within(allocator.constraints(), 1e-6) {
            ""
        } else {
            "  VIOLATED"
        };

        println!(
            "thruster {idx}: [{:+.4}, {:+.4}, {:+.4}]  |f| = {:.4}  cos = {cosine}{ok}",
            force.x, force.y, force.z, state.magnitude
        );
    }

    let realized = model.realized_wrench(&allocation.forces);
    println!("realized: {:+.4?}", realized.to_vector().as_slice());
    println!(
        "effort: {:.4}, penalty: {:.3e}, feasible: {}, iterations: {}",
        allocation.effort, allocation.penalty, allocation.feasible, allocation.iterations
    );

    Ok(())
}
