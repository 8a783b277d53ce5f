//! Command frame codec
//!
//! A logical register access is carried to the MCU as a fixed-layout
//! command frame, and the MCU answers with a frame of exactly the same
//! length. Single and burst accesses share one layout:
//!
//! ```text
//! write: [0, mux, 0x80 | addr<14:8>, addr<7:0>, data ...]
//! read:  [0, mux, 0x00 | addr<14:8>, addr<7:0>, 0, pad ...]
//! ```
//!
//! Bit 7 of the third byte discriminates read from write; the register
//! address is 15 bits, split over the third and fourth bytes. A read
//! request carries one padding byte per expected payload byte so that
//! request and reply stay the same size: a single read returns the
//! register value in the last reply byte, a burst read returns the
//! payload from offset [`READ_HEADER_LEN`] onward.

use crate::error::{ComError, Result};

/// Header bytes in front of a write payload.
pub const WRITE_HEADER_LEN: usize = 4;
/// Header bytes in front of the padding of a read request.
pub const READ_HEADER_LEN: usize = 5;
/// Largest burst carried in one frame. Requests beyond this bound are
/// rejected before any allocation or I/O.
pub const MAX_BURST_LEN: usize = 1024;
/// Registers are addressed with 15 bits.
pub const ADDRESS_MAX: u16 = 0x7FFF;

/// Read/write discriminator, bit 7 of the byte holding the address MSBs.
const WRITE_FLAG: u8 = 0x80;

/// A command frame decoded back into the logical request it carries.
#[derive(Debug, PartialEq, Eq)]
pub enum Request<'a> {
    /// Write `data` starting at `address`.
    Write {
        mux_target: u8,
        address: u16,
        data: &'a [u8],
    },
    /// Read `size` bytes starting at `address`.
    Read {
        mux_target: u8,
        address: u16,
        size: usize,
    },
}

fn check_address(address: u16) -> Result<()> {
    if address > ADDRESS_MAX {
        return Err(ComError::InvalidArgument(format!(
            "register address 0x{address:04X} exceeds 15 bits"
        )));
    }
    Ok(())
}

fn check_burst(size: usize) -> Result<()> {
    if size > MAX_BURST_LEN {
        return Err(ComError::InvalidArgument(format!(
            "burst of {size} bytes exceeds the {MAX_BURST_LEN} byte frame limit"
        )));
    }
    Ok(())
}

fn header(mux_target: u8, address: u16, write: bool) -> [u8; WRITE_HEADER_LEN] {
    let flag = if write { WRITE_FLAG } else { 0x00 };
    [
        0, // reserved
        mux_target,
        flag | ((address >> 8) & 0x7F) as u8,
        (address & 0xFF) as u8,
    ]
}

/// Encode a single-register write: 5 bytes.
pub fn encode_write(mux_target: u8, address: u16, data: u8) -> Result<Vec<u8>> {
    check_address(address)?;
    let mut frame = Vec::with_capacity(WRITE_HEADER_LEN + 1);
    frame.extend_from_slice(&header(mux_target, address, true));
    frame.push(data);
    Ok(frame)
}

/// Encode a single-register read: 6 bytes, with the value coming back in
/// the last reply byte.
pub fn encode_read(mux_target: u8, address: u16) -> Result<Vec<u8>> {
    check_address(address)?;
    let mut frame = Vec::with_capacity(READ_HEADER_LEN + 1);
    frame.extend_from_slice(&header(mux_target, address, false));
    frame.extend_from_slice(&[0x00, 0x00]);
    Ok(frame)
}

/// Encode a burst write: `4 + data.len()` bytes.
pub fn encode_burst_write(mux_target: u8, address: u16, data: &[u8]) -> Result<Vec<u8>> {
    check_address(address)?;
    check_burst(data.len())?;
    let mut frame = Vec::with_capacity(WRITE_HEADER_LEN + data.len());
    frame.extend_from_slice(&header(mux_target, address, true));
    frame.extend_from_slice(data);
    Ok(frame)
}

/// Encode a burst read: `5 + size` bytes, zero padded so the reply can
/// carry the payload at [`READ_HEADER_LEN`] onward. `size` 0 yields a
/// well-formed header-only frame.
pub fn encode_burst_read(mux_target: u8, address: u16, size: usize) -> Result<Vec<u8>> {
    check_address(address)?;
    check_burst(size)?;
    let mut frame = vec![0u8; READ_HEADER_LEN + size];
    frame[..WRITE_HEADER_LEN].copy_from_slice(&header(mux_target, address, false));
    Ok(frame)
}

/// Register value from a single-read reply (the last byte).
pub fn read_value(reply: &[u8]) -> u8 {
    debug_assert!(!reply.is_empty());
    reply[reply.len() - 1]
}

/// Burst payload from a burst-read reply.
pub fn burst_payload(reply: &[u8]) -> &[u8] {
    debug_assert!(reply.len() >= READ_HEADER_LEN);
    &reply[READ_HEADER_LEN..]
}

/// Decode a command frame back into the request it carries.
///
/// The driver itself only encodes; decoding is for emulators and tests.
pub fn decode(frame: &[u8]) -> Result<Request<'_>> {
    if frame.len() < WRITE_HEADER_LEN {
        return Err(ComError::InvalidArgument(format!(
            "frame of {} bytes is shorter than a command header",
            frame.len()
        )));
    }
    if frame[0] != 0 {
        return Err(ComError::InvalidArgument(format!(
            "reserved byte is 0x{:02X}",
            frame[0]
        )));
    }
    let mux_target = frame[1];
    let address = u16::from(frame[2] & 0x7F) << 8 | u16::from(frame[3]);
    if frame[2] & WRITE_FLAG != 0 {
        Ok(Request::Write {
            mux_target,
            address,
            data: &frame[WRITE_HEADER_LEN..],
        })
    } else if frame.len() < READ_HEADER_LEN {
        Err(ComError::InvalidArgument(
            "read frame is missing its padding byte".into(),
        ))
    } else {
        Ok(Request::Read {
            mux_target,
            address,
            size: frame.len() - READ_HEADER_LEN,
        })
    }
}
