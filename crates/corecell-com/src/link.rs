//! Serial link management
//!
//! The bridge MCU sits behind a CDC-ACM style serial device. Frame
//! boundaries are purely length-based, so the line has to be in a
//! deterministic raw state before any traffic is trusted: 8N1, no flow
//! control, no CR/NL translation, and a bounded non-canonical read
//! timeout. `serialport` owns the port; the VMIN/VTIME handling it does
//! not expose is applied directly through termios.

use crate::error::{ComError, Result};

use nix::sys::termios::{
    self, BaudRate, ControlFlags, InputFlags, LocalFlags, OutputFlags, SetArg,
    SpecialCharacterIndices, Termios,
};
use serialport::{DataBits, FlowControl, Parity, StopBits, TTYPort};
use std::io::{Read, Write};
use std::os::fd::{AsRawFd, BorrowedFd, IntoRawFd};
use std::time::Duration;

/// Fixed line rate of the MCU link.
pub const BAUD_RATE: u32 = 115_200;

/// Port-level bound on a single read, equal to the `VTIME` applied at
/// open (50 tenths of a second).
const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Byte-level link to the bridge MCU.
///
/// Abstracts the serial port so sessions can be driven by a test double;
/// the only real implementation is [`SerialLink`].
pub trait Link {
    /// Write the whole buffer to the link.
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;

    /// Read exactly `buf.len()` bytes, within the configured timeouts.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Toggle between blocking reads (`VMIN=1`) and short-timeout reads
    /// (`VMIN=0`), leaving every other line attribute untouched.
    fn set_blocking(&mut self, blocking: bool) -> Result<()>;

    /// Release the link. The descriptor is released even when the OS
    /// reports a close failure; the failure is still surfaced.
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// An open serial connection to the bridge MCU.
#[derive(Debug)]
pub struct SerialLink {
    port: TTYPort,
}

impl SerialLink {
    /// Open the serial device and put the line into its raw state.
    pub fn open(path: &str) -> Result<Self> {
        let port = serialport::new(path, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(READ_TIMEOUT)
            .open_native()
            .map_err(|source| ComError::Open {
                path: path.to_string(),
                source,
            })?;

        let link = Self { port };
        link.configure_raw()?;
        log::info!("com: opened {} at {} baud", path, BAUD_RATE);
        Ok(link)
    }

    /// Force the deterministic raw line state the MCU protocol expects.
    fn configure_raw(&self) -> Result<()> {
        let mut tty = self.tcgetattr()?;

        termios::cfsetospeed(&mut tty, BaudRate::B115200)
            .map_err(|e| ComError::Config(format!("cfsetospeed failed: {e}")))?;
        termios::cfsetispeed(&mut tty, BaudRate::B115200)
            .map_err(|e| ComError::Config(format!("cfsetispeed failed: {e}")))?;

        // 8-bit characters, local connection, receiver enabled
        tty.control_flags &= !ControlFlags::CSIZE;
        tty.control_flags |= ControlFlags::CS8 | ControlFlags::CLOCAL | ControlFlags::CREAD;
        // no parity, one stop bit
        tty.control_flags &= !(ControlFlags::PARENB | ControlFlags::CSTOPB);
        // no break handling, software flow control or CR/NL translation
        tty.input_flags &= !(InputFlags::IGNBRK
            | InputFlags::IXON
            | InputFlags::IXOFF
            | InputFlags::IXANY
            | InputFlags::ICRNL);
        tty.output_flags = OutputFlags::empty();
        tty.local_flags = LocalFlags::empty();
        // non-canonical reads return whatever arrived once VTIME expires
        tty.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
        tty.control_chars[SpecialCharacterIndices::VTIME as usize] = 50;

        self.tcsetattr(&tty)
    }

    fn tcgetattr(&self) -> Result<Termios> {
        termios::tcgetattr(self.fd()).map_err(|e| ComError::Config(format!("tcgetattr failed: {e}")))
    }

    fn tcsetattr(&self, tty: &Termios) -> Result<()> {
        termios::tcsetattr(self.fd(), SetArg::TCSANOW, tty)
            .map_err(|e| ComError::Config(format!("tcsetattr failed: {e}")))
    }

    fn fd(&self) -> BorrowedFd<'_> {
        // SAFETY: the port owns the descriptor for the lifetime of the borrow.
        unsafe { BorrowedFd::borrow_raw(self.port.as_raw_fd()) }
    }
}

impl Link for SerialLink {
    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.port.write_all(buf)?;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.port.read_exact(buf)?;
        Ok(())
    }

    fn set_blocking(&mut self, blocking: bool) -> Result<()> {
        let mut tty = self.tcgetattr()?;
        tty.control_chars[SpecialCharacterIndices::VMIN as usize] = u8::from(blocking);
        tty.control_chars[SpecialCharacterIndices::VTIME as usize] = 1;
        self.tcsetattr(&tty)
    }

    fn close(self) -> Result<()> {
        let fd = self.port.into_raw_fd();
        // SAFETY: into_raw_fd transfers ownership, so the descriptor is
        // closed exactly once.
        let rc = unsafe { libc::close(fd) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            log::warn!("com: serial port close failed: {err}");
            return Err(ComError::Close(err));
        }
        log::debug!("com: serial port closed");
        Ok(())
    }
}
