//! corecell - bring-up tool for an MCU-bridged LoRa concentrator
//!
//! Drives the register transport end to end: open, handshake, reset, then
//! single or burst register accesses. Back-ends implement
//! `corecell_com::McuBridge`; the built-in `dummy` back-end runs the full
//! stack against an in-memory MCU emulator.

mod cli;

use clap::Parser;
use cli::{Cli, Commands};
use corecell_com::ComDevice;
use corecell_dummy::{DummyLink, DummyMcu};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    // Set log level based on verbosity
    match cli.verbose {
        0 => {} // default (info)
        1 => log::set_max_level(log::LevelFilter::Debug),
        _ => log::set_max_level(log::LevelFilter::Trace),
    }

    if cli.bridge != "dummy" {
        eprintln!("Unknown bridge '{}' [available: dummy]", cli.bridge);
        std::process::exit(1);
    }

    let mut device = ComDevice::open_with_link(DummyLink, DummyMcu::new_default())?;

    match cli.command {
        Commands::Probe => {
            let info = device.mcu_info();
            let id: Vec<String> = info.unique_id.iter().map(|b| format!("{b:02X}")).collect();
            println!("MCU version: {}", info.version);
            println!("Unique id:   {}", id.join(""));
        }
        Commands::Read { mux, addr } => {
            let value = device.read_register(mux, addr)?;
            println!("0x{addr:04X} = 0x{value:02X}");
        }
        Commands::Write { mux, addr, data } => {
            device.write_register(mux, addr, data)?;
            log::info!("wrote 0x{data:02X} to 0x{addr:04X}");
        }
        Commands::Dump { mux, addr, len } => {
            let mut buf = vec![0u8; len];
            device.read_burst(mux, addr, &mut buf)?;
            for (i, chunk) in buf.chunks(16).enumerate() {
                let bytes: Vec<String> = chunk.iter().map(|b| format!("{b:02X}")).collect();
                println!("0x{:04X}: {}", addr as usize + i * 16, bytes.join(" "));
            }
        }
    }

    device.close()?;
    Ok(())
}
