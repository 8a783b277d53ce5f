//! corecell-dummy - in-memory MCU emulator
//!
//! Stands in for the bridge MCU so the full transport stack can run
//! without hardware. Incoming command frames are decoded against a
//! 32 KiB register file (the 15-bit address space), and all traffic is
//! recorded for inspection by tests and the bring-up tool.

use corecell_com::error::{ComError, Result};
use corecell_com::frame::{self, Request};
use corecell_com::link::Link;
use corecell_com::mcu::{McuBridge, PingInfo, EXPECTED_VERSION};

/// Bytes reachable through a 15-bit register address.
const REGISTER_SPACE: usize = 1 << 15;

/// Configuration for the emulated MCU.
#[derive(Debug, Clone)]
pub struct DummyConfig {
    /// Version string reported by ping, including the build-type marker.
    pub version: String,
    /// Factory unique id reported by ping.
    pub unique_id: [u8; 8],
    /// Fail the Nth `spi_access` call (1-based) to exercise error paths.
    pub fail_on_transfer: Option<usize>,
}

impl Default for DummyConfig {
    fn default() -> Self {
        Self {
            version: format!("R{EXPECTED_VERSION}"),
            unique_id: [0xCA, 0xFE, 0x00, 0x01, 0x02, 0x03, 0x04, 0x05],
            fail_on_transfer: None,
        }
    }
}

/// Emulated bridge MCU with an in-memory register file.
#[derive(Debug)]
pub struct DummyMcu {
    config: DummyConfig,
    registers: Vec<u8>,
    frames: Vec<Vec<u8>>,
    req_ids: Vec<u8>,
    gpio: Vec<(u8, u8, u8)>,
    transfers: usize,
}

impl DummyMcu {
    /// Create an emulated MCU with the given configuration.
    pub fn new(config: DummyConfig) -> Self {
        Self {
            config,
            registers: vec![0; REGISTER_SPACE],
            frames: Vec::new(),
            req_ids: Vec::new(),
            gpio: Vec::new(),
            transfers: 0,
        }
    }

    /// Create an emulated MCU with the default configuration.
    pub fn new_default() -> Self {
        Self::new(DummyConfig::default())
    }

    /// Register file contents.
    pub fn registers(&self) -> &[u8] {
        &self.registers
    }

    /// Preload one register. Only the 15 addressable bits are used.
    pub fn set_register(&mut self, address: u16, value: u8) {
        self.registers[(address & frame::ADDRESS_MAX) as usize] = value;
    }

    /// Every command frame received so far, in order.
    pub fn frames(&self) -> &[Vec<u8>] {
        &self.frames
    }

    /// Transaction ids observed across all commands.
    pub fn req_ids(&self) -> &[u8] {
        &self.req_ids
    }

    /// GPIO writes received, as (bank, pin, level).
    pub fn gpio_log(&self) -> &[(u8, u8, u8)] {
        &self.gpio
    }

    fn span(&self, address: u16, len: usize) -> Result<std::ops::Range<usize>> {
        let start = address as usize;
        let end = start + len;
        if end > self.registers.len() {
            return Err(ComError::Transfer);
        }
        Ok(start..end)
    }
}

impl McuBridge for DummyMcu {
    fn ping(&mut self, _link: &mut dyn Link, req_id: u8) -> Result<PingInfo> {
        self.req_ids.push(req_id);
        log::debug!("dummy: ping (id {req_id})");
        Ok(PingInfo {
            version: self.config.version.clone(),
            unique_id: self.config.unique_id,
        })
    }

    fn gpio_write(
        &mut self,
        _link: &mut dyn Link,
        req_id: u8,
        bank: u8,
        pin: u8,
        level: u8,
    ) -> Result<()> {
        self.req_ids.push(req_id);
        self.gpio.push((bank, pin, level));
        log::debug!("dummy: gpio bank {bank} pin {pin} <- {level}");
        Ok(())
    }

    fn spi_access(
        &mut self,
        _link: &mut dyn Link,
        req_id: u8,
        request: &[u8],
        reply: &mut [u8],
    ) -> Result<()> {
        self.req_ids.push(req_id);
        self.frames.push(request.to_vec());
        self.transfers += 1;
        if self.config.fail_on_transfer == Some(self.transfers) {
            return Err(ComError::Transfer);
        }

        match frame::decode(request)? {
            Request::Write { address, data, .. } => {
                let span = self.span(address, data.len())?;
                self.registers[span].copy_from_slice(data);
            }
            Request::Read { address, size, .. } => {
                let span = self.span(address, size)?;
                reply[frame::READ_HEADER_LEN..].copy_from_slice(&self.registers[span]);
            }
        }
        Ok(())
    }
}

/// No-op link for sessions that never touch a real serial port.
#[derive(Debug, Default)]
pub struct DummyLink;

impl Link for DummyLink {
    fn write_all(&mut self, _buf: &[u8]) -> Result<()> {
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        buf.fill(0);
        Ok(())
    }

    fn set_blocking(&mut self, _blocking: bool) -> Result<()> {
        Ok(())
    }

    fn close(self) -> Result<()> {
        Ok(())
    }
}
