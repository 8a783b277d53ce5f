//! Seam to the bridge MCU's command protocol
//!
//! The MCU's request/acknowledge encoding lives behind [`McuBridge`]; the
//! session layer only relies on the three primitives below and on the
//! reply-equals-request-length contract of `spi_access`.

use crate::error::Result;
use crate::link::Link;

/// Firmware version this driver is validated against. Compared against
/// the reported version with its build-type marker (first character)
/// skipped.
pub const EXPECTED_VERSION: &str = "01.00.00";

/// GPIO bank holding the concentrator control pins.
pub const GPIO_BANK: u8 = 0;
/// Concentrator power enable.
pub const POWER_EN_PIN: u8 = 1;
/// Concentrator reset, active high.
pub const RESET_PIN: u8 = 2;

/// Identity reported by the MCU ping reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PingInfo {
    /// Firmware version string; the first character encodes the build type.
    pub version: String,
    /// Factory-programmed MCU unique id.
    pub unique_id: [u8; 8],
}

impl PingInfo {
    /// Version with the build-type marker stripped, as used for the
    /// handshake comparison.
    pub fn version_number(&self) -> &str {
        self.version.get(1..).unwrap_or("")
    }
}

/// Command relay to the bridge MCU.
///
/// Implementations own the wire encoding of each command; the session
/// guarantees that `req_id` is unique per in-flight command and that no
/// two commands overlap on one link.
pub trait McuBridge {
    /// Identity query: firmware version and unique id.
    fn ping(&mut self, link: &mut dyn Link, req_id: u8) -> Result<PingInfo>;

    /// Drive one MCU GPIO pin.
    fn gpio_write(
        &mut self,
        link: &mut dyn Link,
        req_id: u8,
        bank: u8,
        pin: u8,
        level: u8,
    ) -> Result<()>;

    /// Exchange one SPI command frame with the radio front-end.
    ///
    /// `reply` has the same length as `request`; implementations fill it
    /// entirely or fail.
    fn spi_access(
        &mut self,
        link: &mut dyn Link,
        req_id: u8,
        request: &[u8],
        reply: &mut [u8],
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_number_skips_build_marker() {
        let info = PingInfo {
            version: "R01.00.00".to_string(),
            unique_id: [0; 8],
        };
        assert_eq!(info.version_number(), EXPECTED_VERSION);
    }

    #[test]
    fn version_number_of_empty_string() {
        let info = PingInfo {
            version: String::new(),
            unique_id: [0; 8],
        };
        assert_eq!(info.version_number(), "");
    }
}
