use std::{fs::File, path::PathBuf};

use anyhow::Context;
use clap::Parser;
use itertools::{Either, Itertools, MinMaxResult};
use rand::{rngs::StdRng, SeedableRng};
use thruster_envelope::{
    allocation::AllocationModel,
    geometry::{self, ThrusterGeometry},
    report::{self, EnvelopeRecord},
    sampling::{fibonacci_sphere, icosphere_directions, EnvelopeKind},
    settings::Settings,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Sweeps the force and torque envelopes of a thruster layout
#[derive(Parser, Debug)]
struct Cli {
    /// CSV with `x,y,z,nx,ny,nz` columns, one thruster per row
    #[arg(long)]
    geometry: Option<PathBuf>,

    /// JSON overriding the default constraints and solver settings
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Generate this many randomly placed thrusters instead of reading a layout
    #[arg(long, conflicts_with = "geometry")]
    random: Option<usize>,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Icosphere subdivisions, 0 samples the 12 icosahedron vertices
    #[arg(long, default_value_t = 0)]
    subdivisions: usize,

    /// Sample this many points of a fibonacci sphere instead of an icosphere
    #[arg(long, conflicts_with = "subdivisions")]
    fibonacci: Option<usize>,

    /// Directory the CSV report is written to
    #[arg(long, default_value = ".")]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => Settings::from_json_file(path).context("Read settings")?,
        None => Settings::default(),
    };

    let geometry = match (&cli.geometry, cli.random) {
        (Some(path), _) => geometry::read_geometry(path).context("Read thruster geometry")?,
        (None, Some(count)) => {
            ThrusterGeometry::random(count, &mut StdRng::seed_from_u64(cli.seed))
                .context("Generate thruster geometry")?
        }
        (None, None) => ThrusterGeometry::tetrahedral(1.0),
    };
    info!(thrusters = geometry.len(), "Loaded geometry");

    let model = AllocationModel::new(geometry).context("Build allocation model")?;
    let search = settings.envelope_search(&model);
    let directions = match cli.fibonacci {
        Some(samples) => fibonacci_sphere(samples),
        None => icosphere_directions(cli.subdivisions),
    };

    let mut records = Vec::new();
    for kind in EnvelopeKind::ALL {
        let results = search.sweep(&kind.wrenches(&directions));

        let (samples, failures): (Vec<_>, Vec<_>) =
            results
                .into_iter()
                .zip(&directions)
                .partition_map(|(result, direction)| match result {
                    Ok(sample) => Either::Left(EnvelopeRecord::new(kind, &sample)),
                    Err(err) => Either::Right((direction, err)),
                });

        for (direction, err) in &failures {
            warn!("{kind} envelope failed along {direction:?}: {err}");
        }

        match samples.iter().map(|it| it.radius).minmax() {
            MinMaxResult::NoElements => println!("{kind}: no feasible directions"),
            MinMaxResult::OneElement(radius) => println!("{kind}: radius {radius:.4}"),
            MinMaxResult::MinMax(min, max) => {
                println!("{kind}: radius {min:.4} ..= {max:.4}")
            }
        }
        for record in &samples {
            let [x, y, z] = record.point();
            println!("  {x:+.4} {y:+.4} {z:+.4}  (r = {:.4})", record.radius);
        }

        records.extend(samples);
    }

    let path = report::report_path(&cli.out, "envelope");
    let file = File::create(&path).with_context(|| format!("Create {}", path.display()))?;
    report::write_records(file, &records).context("Write envelope report")?;
    info!(path = %path.display(), "Wrote envelope report");

    Ok(())
}
