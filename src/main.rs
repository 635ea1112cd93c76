// Runs the sorting engine against identified parts read from stdin, one JSON
// `ItemDescriptor` per line. Every decision goes out on stdout as a JSON gate command
// for the motion-control layer; the camera is a stand-in here, the routing is real.
//
// Usage: nexus_sort <profile.json> [config.json] [snapshot.json]
// An existing snapshot file is restored before the run and overwritten after it.

use anyhow::Context;
use futures::stream;
use nexus_sort::sort_loop::{Actuator, BoundedActuator, SortLoop};
use nexus_sort::{
    ItemDescriptor, Profile, RoutingDecision, RunSnapshot, SortError, SortResult, SortRouter,
    SorterConfig,
};
use std::env;
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Writes one gate command per decision to stdout.
struct StdoutActuator;

impl Actuator for StdoutActuator {
    fn deliver(&mut self, decision: &RoutingDecision) -> SortResult<()> {
        info!(
            category = %decision.category_name,
            column = decision.location.column,
            row = decision.location.row,
            fresh = decision.fresh_bin,
            "gate to bin"
        );
        let mut out = std::io::stdout().lock();
        serde_json::to_writer(&mut out, decision)
            .map_err(|err| SortError::Actuation(err.to_string()))?;
        writeln!(out).map_err(|err| SortError::Actuation(err.to_string()))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: nexus_sort <profile.json> [config.json] [snapshot.json]");
        return Ok(());
    }

    let profile =
        Profile::load(&args[1]).with_context(|| format!("loading profile {}", args[1]))?;
    let config = match args.get(2) {
        Some(path) => {
            SorterConfig::load(path).with_context(|| format!("loading config {path}"))?
        }
        None => {
            let mut config = SorterConfig::default();
            config.apply_environment_overrides()?;
            config.validate()?;
            config
        }
    };
    info!(
        profile = %profile.name,
        categories = profile.len(),
        grid_width = config.grid_width,
        "profile loaded"
    );

    let mut router = SortRouter::new(profile, &config);
    let snapshot_path = args.get(3).map(Path::new);
    if let Some(path) = snapshot_path.filter(|path| path.exists()) {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("reading snapshot {}", path.display()))?;
        let snapshot = RunSnapshot::from_json(&json).context("parsing snapshot")?;
        router.restore(&snapshot)?;
    }

    let (mut sort_loop, stop) = SortLoop::new(&config);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.stop();
        }
    });

    let lines = BufReader::new(tokio::io::stdin()).lines();
    let items = stream::unfold(lines, |mut lines| async move {
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => match serde_json::from_str::<ItemDescriptor>(&line) {
                    Ok(item) => return Some((item, lines)),
                    Err(err) => warn!(error = %err, "skipping unreadable item descriptor"),
                },
                Ok(None) => return None,
                Err(err) => {
                    error!(error = %err, "identification input failed");
                    return None;
                }
            }
        }
    });

    let stats = match config.fixture_bounds() {
        Some(bounds) => {
            sort_loop
                .run(&mut router, items, BoundedActuator::new(StdoutActuator, bounds))
                .await?
        }
        None => sort_loop.run(&mut router, items, StdoutActuator).await?,
    };

    if let Some(average) = stats.average_seconds_between_items() {
        info!(seconds = average, "average time between parts");
    }
    println!("{}", serde_json::to_string(&stats)?);

    let snapshot = router.snapshot();
    match snapshot_path {
        Some(path) => std::fs::write(path, snapshot.to_json()?)
            .with_context(|| format!("writing snapshot {}", path.display()))?,
        None => println!("{}", serde_json::to_string(&snapshot)?),
    }
    Ok(())
}
