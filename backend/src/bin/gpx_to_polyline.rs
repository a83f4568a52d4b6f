use std::path::PathBuf;

use clap::Parser;
use trail_tracker::{
    geometry::{compute_cumulative_table, compute_total_distance},
    gpx_import::{planned_route_points, read_gpx},
    polyline_codec::{decode_polyline, encode_polyline, PRECISION},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Encode the tracks of a GPX file as a precision-5 polyline"
)]
struct Args {
    /// GPX file to read (every track and segment is concatenated)
    #[arg(long)]
    gpx: PathBuf,

    /// Where to write the encoded polyline; printed to stdout when omitted
    #[arg(long)]
    output: Option<PathBuf>,

    /// Print the cumulative distance every N kilometers
    #[arg(long)]
    markers_km: Option<f64>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    tracing::info!("reading {:?}", args.gpx);

    let content = std::fs::read(&args.gpx)?;
    let gpx = read_gpx(&content)?;
    let points = planned_route_points(&gpx)?;
    let encoded = encode_polyline(&points, PRECISION)?;

    // Distances are reported on the decoded route, as the backend stores it
    let stored = decode_polyline(&encoded, PRECISION)?;
    tracing::info!(
        "points={} distance={:.2}km encoded_len={}",
        stored.len(),
        compute_total_distance(&stored),
        encoded.len()
    );

    if let Some(step) = args.markers_km.filter(|s| *s > 0.0) {
        let table = compute_cumulative_table(&stored);
        let mut next = step;
        for (index, km) in table.iter().enumerate() {
            if *km >= next {
                tracing::info!("{:>8.1} km at point {}", km, index);
                next += step;
            }
        }
    }

    match args.output {
        Some(path) => {
            std::fs::write(&path, &encoded)?;
            tracing::info!("polyline written to {:?}", path);
        }
        None => println!("{encoded}"),
    }

    Ok(())
}
