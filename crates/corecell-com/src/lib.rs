//! corecell-com - transport layer for an MCU-bridged LoRa concentrator
//!
//! The concentrator's radio front-end is not directly addressable from the
//! host: every register access travels over a serial/USB link to a bridge
//! MCU, which performs the SPI transaction and answers with a reply of the
//! same length as the request. This crate owns the host side of that link:
//!
//! - [`link`]: serial-port setup (raw 8N1 at 115 200 baud) and the
//!   VMIN/VTIME read-timeout handling
//! - [`frame`]: the command frame codec for single and burst accesses
//! - [`mcu`]: the seam to the MCU's command protocol ([`McuBridge`])
//! - [`device`]: session lifecycle (handshake, reset, close) and the
//!   register access API ([`ComDevice`])
//!
//! The MCU's own request/acknowledge encoding is out of scope here:
//! hardware back-ends implement [`McuBridge`], and the `corecell-dummy`
//! crate provides an in-memory emulator for tests and bring-up.

pub mod device;
pub mod error;
pub mod frame;
pub mod link;
pub mod mcu;

// Re-exports
pub use device::ComDevice;
pub use error::{ComError, Result};
pub use link::{Link, SerialLink};
pub use mcu::{McuBridge, PingInfo};
