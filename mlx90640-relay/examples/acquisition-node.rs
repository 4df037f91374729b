// SPDX-License-Identifier: Apache-2.0
// Copyright © 2021 Will Ross
use std::env;
use std::net::TcpListener;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use linux_embedded_hal::I2cdev;
use log::{info, warn};
use tracing_subscriber::EnvFilter;

use mlx90640_relay::{spawn_acquisition, FrameAcquirer, FrameSender, I2cTransport, SessionConfig};

fn main() -> anyhow::Result<()> {
    init_logging();
    let args: Vec<String> = env::args().collect();
    if args.len() != 4 {
        bail!("Three arguments required: <I2C bus> <camera address> <listen address>");
    }
    let address = parse_address(&args[2])?;
    let config = SessionConfig::default().with_address(address);
    let bus = I2cdev::new(Path::new(&args[1]))
        .with_context(|| format!("{} should be an I2C controller", args[1]))?;
    let transport = I2cTransport::new(bus, config.address);
    let mut acquirer = FrameAcquirer::new(transport, config)
        .map_err(|err| anyhow!("Unable to start a session with the camera: {}", err))?;
    if !acquirer.calibration().broken_pixels().is_empty() {
        warn!(
            "Camera has broken pixels: {:?}",
            acquirer.calibration().broken_pixels()
        );
    }

    let listener = TcpListener::bind(&args[3])
        .with_context(|| format!("Unable to listen on {}", args[3]))?;
    info!("Listening on {}", listener.local_addr()?);
    // One display node at a time. The acquirer is handed back when the connection ends.
    loop {
        let (stream, peer) = listener.accept()?;
        info!("Display node connected from {}", peer);
        stream.set_nodelay(true)?;
        let shutdown = Arc::new(AtomicBool::new(false));
        let handle = spawn_acquisition(acquirer, FrameSender::new(stream), shutdown);
        let exit = handle
            .join()
            .map_err(|_| anyhow!("The acquisition thread panicked"))?;
        info!("Sent {} frames to {}", exit.frames, peer);
        if let Some(err) = exit.error {
            bail!("Acquisition failed: {}", err);
        }
        acquirer = exit.acquirer;
    }
}

fn parse_address(arg: &str) -> anyhow::Result<u8> {
    let address = match arg.strip_prefix("0x") {
        Some(hex_digits) => u8::from_str_radix(hex_digits, 16)?,
        None => arg.parse()?,
    };
    Ok(address)
}

fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
