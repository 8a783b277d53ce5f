//! CLI argument parsing

use clap::{Parser, Subcommand};

/// Parse a string as a hex or decimal u16
fn parse_hex_u16(s: &str) -> Result<u16, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u16>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Parse a string as a hex or decimal u8
fn parse_hex_u8(s: &str) -> Result<u8, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u8>().map_err(|e| format!("Invalid number: {}", e))
    }
}

#[derive(Parser)]
#[command(name = "corecell")]
#[command(author, version, about = "LoRa concentrator register bring-up tool", long_about = None)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// MCU bridge back-end [available: dummy]
    #[arg(short, long, global = true, default_value = "dummy")]
    pub bridge: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open the device and report the MCU identity
    Probe,

    /// Read a single register
    Read {
        /// SPI mux target routing the access
        #[arg(short, long, value_parser = parse_hex_u8, default_value = "0")]
        mux: u8,

        /// Register address (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u16)]
        addr: u16,
    },

    /// Write a single register
    Write {
        /// SPI mux target routing the access
        #[arg(short, long, value_parser = parse_hex_u8, default_value = "0")]
        mux: u8,

        /// Register address (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u16)]
        addr: u16,

        /// Value to write (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u8)]
        data: u8,
    },

    /// Burst-read a register range and hex dump it
    Dump {
        /// SPI mux target routing the access
        #[arg(short, long, value_parser = parse_hex_u8, default_value = "0")]
        mux: u8,

        /// First register address (hex or decimal)
        #[arg(short, long, value_parser = parse_hex_u16)]
        addr: u16,

        /// Number of bytes to read
        #[arg(short, long, default_value = "16")]
        len: usize,
    },
}
