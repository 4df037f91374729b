// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::env;
use std::net::TcpStream;

use anyhow::{anyhow, bail, Context};
use log::info;
use tracing_subscriber::EnvFilter;

use mlx90640_relay::{observer_fn, spawn_receiver, TemperatureBounds, TemperatureMatrix};

/// Characters from coldest to hottest.
const SHADES: &[u8] = b" .:-=+*#%@";

fn main() -> anyhow::Result<()> {
    init_logging();
    let args: Vec<String> = env::args().collect();
    let bounds = match args.len() {
        2 => TemperatureBounds::default(),
        4 => TemperatureBounds::new(args[2].parse()?, args[3].parse()?)?,
        _ => bail!("Usage: <acquisition node address> [<lower bound> <upper bound>]"),
    };
    let stream =
        TcpStream::connect(&args[1]).with_context(|| format!("Unable to connect to {}", args[1]))?;
    info!("Connected to {}", args[1]);
    let observer = observer_fn(|matrix: &TemperatureMatrix, bounds: &TemperatureBounds| {
        print_temperatures(matrix, bounds);
        true
    });
    let frames = spawn_receiver(stream, observer, bounds)
        .join()
        .map_err(|_| anyhow!("The receiver thread panicked"))??;
    info!("Received {} frames", frames);
    Ok(())
}

fn print_temperatures(matrix: &TemperatureMatrix, bounds: &TemperatureBounds) {
    let max_shade = (SHADES.len() - 1) as f64;
    for row in matrix.rows() {
        let line: String = row
            .iter()
            .map(|temperature| {
                let shade = (bounds.normalise(*temperature) * max_shade).round() as usize;
                SHADES[shade] as char
            })
            .flat_map(|c| [c, c])
            .collect();
        println!("{}", line);
    }
    let (min, max) = matrix.min_max();
    println!(
        "Centre: {:.2}℃  Min: {:.2}℃  Max: {:.2}℃",
        matrix.centre_average(),
        min,
        max
    );
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
