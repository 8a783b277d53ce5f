//! Device session and register access
//!
//! A session is one open, verified link to the concentrator: the serial
//! line is configured, the MCU identity is checked against the expected
//! firmware version, and the radio front-end is power-cycled, before any
//! register traffic is accepted. Register operations are strictly
//! sequential and blocking; there is no internal retry.

use crate::error::{ComError, Result};
use crate::frame;
use crate::link::{Link, SerialLink};
use crate::mcu::{self, McuBridge, PingInfo};

/// Per-session transaction id counter. Seeded to a fixed value so id
/// sequences are reproducible across runs and independent per session.
#[derive(Debug)]
struct RequestIds(u8);

impl RequestIds {
    fn new() -> Self {
        Self(0)
    }

    fn next(&mut self) -> u8 {
        let id = self.0;
        self.0 = self.0.wrapping_add(1);
        id
    }
}

/// One open session to the concentrator, generic over the byte link and
/// the MCU command protocol behind it.
#[derive(Debug)]
pub struct ComDevice<L: Link, B: McuBridge> {
    link: L,
    bridge: B,
    info: PingInfo,
    req_ids: RequestIds,
}

impl<B: McuBridge> ComDevice<SerialLink, B> {
    /// Open and configure the serial device, then bring the session up.
    pub fn open(path: &str, bridge: B) -> Result<Self> {
        let link = SerialLink::open(path)?;
        Self::open_with_link(link, bridge)
    }
}

impl<L: Link, B: McuBridge> ComDevice<L, B> {
    /// Bring a session up on an already-opened link.
    ///
    /// Verifies the MCU firmware version, then power-cycles the
    /// concentrator through the MCU GPIOs. On any failure the link is
    /// released before returning.
    pub fn open_with_link(mut link: L, mut bridge: B) -> Result<Self> {
        link.set_blocking(true)?;

        let mut req_ids = RequestIds::new();

        let info = bridge.ping(&mut link, req_ids.next())?;
        if info.version_number() != mcu::EXPECTED_VERSION {
            log::error!(
                "com: MCU version mismatch (expected {}, got {})",
                mcu::EXPECTED_VERSION,
                info.version
            );
            return Err(ComError::VersionMismatch {
                expected: mcu::EXPECTED_VERSION.to_string(),
                got: info.version,
            });
        }
        log::info!("com: concentrator MCU version is {}", info.version);

        // Power up the front-end, then pulse its reset line.
        let sequence = [
            (mcu::POWER_EN_PIN, 1),
            (mcu::RESET_PIN, 1),
            (mcu::RESET_PIN, 0),
        ];
        for (pin, level) in sequence {
            bridge
                .gpio_write(&mut link, req_ids.next(), mcu::GPIO_BANK, pin, level)
                .map_err(|e| ComError::Reset(e.to_string()))?;
        }
        log::debug!("com: concentrator reset done");

        Ok(Self {
            link,
            bridge,
            info,
            req_ids,
        })
    }

    /// Identity reported by the MCU during the handshake.
    pub fn mcu_info(&self) -> &PingInfo {
        &self.info
    }

    /// The MCU protocol back-end, e.g. for emulator inspection.
    pub fn bridge(&self) -> &B {
        &self.bridge
    }

    pub fn bridge_mut(&mut self) -> &mut B {
        &mut self.bridge
    }

    /// Write one register.
    pub fn write_register(&mut self, mux_target: u8, address: u16, data: u8) -> Result<()> {
        let request = frame::encode_write(mux_target, address, data)?;
        self.transfer(&request)?;
        Ok(())
    }

    /// Read one register.
    pub fn read_register(&mut self, mux_target: u8, address: u16) -> Result<u8> {
        let request = frame::encode_read(mux_target, address)?;
        let reply = self.transfer(&request)?;
        Ok(frame::read_value(&reply))
    }

    /// Write a contiguous register range in one frame.
    pub fn write_burst(&mut self, mux_target: u8, address: u16, data: &[u8]) -> Result<()> {
        let request = frame::encode_burst_write(mux_target, address, data)?;
        self.transfer(&request)?;
        Ok(())
    }

    /// Read a contiguous register range in one frame.
    pub fn read_burst(&mut self, mux_target: u8, address: u16, data: &mut [u8]) -> Result<()> {
        let request = frame::encode_burst_read(mux_target, address, data.len())?;
        let reply = self.transfer(&request)?;
        data.copy_from_slice(frame::burst_payload(&reply));
        Ok(())
    }

    /// One relay exchange; any relay failure surfaces as the uniform
    /// transfer error.
    fn transfer(&mut self, request: &[u8]) -> Result<Vec<u8>> {
        let mut reply = vec![0u8; request.len()];
        let id = self.req_ids.next();
        self.bridge
            .spi_access(&mut self.link, id, request, &mut reply)
            .map_err(|e| {
                log::debug!("com: transfer {id} failed: {e}");
                ComError::Transfer
            })?;
        Ok(reply)
    }

    /// Close the session.
    ///
    /// The link and session memory are released even when the OS close
    /// fails; the failure is still reported.
    pub fn close(self) -> Result<()> {
        self.link.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::MAX_BURST_LEN;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    #[derive(Default, Debug)]
    struct TestLink {
        released: Rc<Cell<bool>>,
    }

    impl Drop for TestLink {
        fn drop(&mut self) {
            self.released.set(true);
        }
    }

    impl Link for TestLink {
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

    #[derive(Default, Debug)]
    struct Calls {
        pings: Vec<u8>,
        gpio: Vec<(u8, u8, u8, u8)>,
        transfers: Vec<(u8, Vec<u8>)>,
    }

    #[derive(Debug)]
    struct TestBridge {
        version: &'static str,
        fail_gpio: bool,
        fail_on_transfer: Option<usize>,
        replies: VecDeque<Vec<u8>>,
        calls: Rc<RefCell<Calls>>,
    }

    impl TestBridge {
        fn new(calls: Rc<RefCell<Calls>>) -> Self {
            Self {
                version: "R01.00.00",
                fail_gpio: false,
                fail_on_transfer: None,
                replies: VecDeque::new(),
                calls,
            }
        }
    }

    impl McuBridge for TestBridge {
        fn ping(&mut self, _link: &mut dyn Link, req_id: u8) -> Result<PingInfo> {
            self.calls.borrow_mut().pings.push(req_id);
            Ok(PingInfo {
                version: self.version.to_string(),
                unique_id: [1, 2, 3, 4, 5, 6, 7, 8],
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
            self.calls.borrow_mut().gpio.push((req_id, bank, pin, level));
            if self.fail_gpio {
                return Err(ComError::Transfer);
            }
            Ok(())
        }

        fn spi_access(
            &mut self,
            _link: &mut dyn Link,
            req_id: u8,
            request: &[u8],
            reply: &mut [u8],
        ) -> Result<()> {
            let mut calls = self.calls.borrow_mut();
            calls.transfers.push((req_id, request.to_vec()));
            if self.fail_on_transfer == Some(calls.transfers.len()) {
                return Err(ComError::Transfer);
            }
            if let Some(scripted) = self.replies.pop_front() {
                reply.copy_from_slice(&scripted);
            }
            Ok(())
        }
    }

    fn open_device(bridge: TestBridge) -> Result<ComDevice<TestLink, TestBridge>> {
        ComDevice::open_with_link(TestLink::default(), bridge)
    }

    #[test]
    fn open_pings_then_resets() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let device = open_device(TestBridge::new(calls.clone())).unwrap();
        assert_eq!(device.mcu_info().version, "R01.00.00");
        assert_eq!(device.mcu_info().unique_id, [1, 2, 3, 4, 5, 6, 7, 8]);

        let calls = calls.borrow();
        assert_eq!(calls.pings, [0]);
        assert_eq!(
            calls.gpio,
            [
                (1, mcu::GPIO_BANK, mcu::POWER_EN_PIN, 1),
                (2, mcu::GPIO_BANK, mcu::RESET_PIN, 1),
                (3, mcu::GPIO_BANK, mcu::RESET_PIN, 0),
            ]
        );
    }

    #[test]
    fn version_mismatch_aborts_open() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let released = Rc::new(Cell::new(false));
        let mut bridge = TestBridge::new(calls.clone());
        bridge.version = "R02.00.00";
        let link = TestLink {
            released: released.clone(),
        };

        let err = ComDevice::open_with_link(link, bridge).unwrap_err();
        assert!(matches!(err, ComError::VersionMismatch { .. }));
        // the link must not leak out of a failed open
        assert!(released.get());
        assert!(calls.borrow().gpio.is_empty());
    }

    #[test]
    fn build_marker_is_ignored() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let mut bridge = TestBridge::new(calls);
        bridge.version = "D01.00.00";
        assert!(open_device(bridge).is_ok());
    }

    #[test]
    fn reset_failure_aborts_open() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let released = Rc::new(Cell::new(false));
        let mut bridge = TestBridge::new(calls.clone());
        bridge.fail_gpio = true;
        let link = TestLink {
            released: released.clone(),
        };

        let err = ComDevice::open_with_link(link, bridge).unwrap_err();
        assert!(matches!(err, ComError::Reset(_)));
        assert!(released.get());
        assert!(calls.borrow().transfers.is_empty());
    }

    #[test]
    fn register_write_then_read() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let mut bridge = TestBridge::new(calls.clone());
        bridge.replies.push_back(vec![0; 5]);
        bridge.replies.push_back(vec![0x00, 0x00, 0x40, 0x42, 0x00, 0x7F]);
        let mut device = open_device(bridge).unwrap();

        device.write_register(0, 0x0042, 0x7F).unwrap();
        assert_eq!(device.read_register(0, 0x0042).unwrap(), 0x7F);

        let calls = calls.borrow();
        assert_eq!(calls.transfers[0], (4, vec![0x00, 0x00, 0xC0, 0x42, 0x7F]));
        assert_eq!(
            calls.transfers[1],
            (5, vec![0x00, 0x00, 0x40, 0x42, 0x00, 0x00])
        );
    }

    #[test]
    fn transfer_failure_is_uniform_and_not_retried() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let mut bridge = TestBridge::new(calls.clone());
        bridge.fail_on_transfer = Some(2);
        let mut device = open_device(bridge).unwrap();

        device.write_register(0, 0x10, 1).unwrap();
        let err = device.write_register(0, 0x11, 2).unwrap_err();
        assert!(matches!(err, ComError::Transfer));
        // exactly one attempt per call, no hidden retry
        assert_eq!(calls.borrow().transfers.len(), 2);
    }

    #[test]
    fn burst_frames_cover_size_zero() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let mut device = open_device(TestBridge::new(calls.clone())).unwrap();

        device.write_burst(1, 0x2000, &[]).unwrap();
        let mut empty = [0u8; 0];
        device.read_burst(1, 0x2000, &mut empty).unwrap();

        let calls = calls.borrow();
        assert_eq!(calls.transfers[0].1.len(), 4);
        assert_eq!(calls.transfers[1].1.len(), 5);
    }

    #[test]
    fn oversize_burst_never_reaches_the_bridge() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let mut device = open_device(TestBridge::new(calls.clone())).unwrap();

        let data = vec![0u8; MAX_BURST_LEN + 1];
        let err = device.write_burst(0, 0, &data).unwrap_err();
        assert!(matches!(err, ComError::InvalidArgument(_)));
        assert!(calls.borrow().transfers.is_empty());
    }

    #[test]
    fn request_ids_continue_across_operations() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let mut device = open_device(TestBridge::new(calls.clone())).unwrap();

        device.write_register(0, 1, 1).unwrap();
        device.write_register(0, 2, 2).unwrap();

        let ids: Vec<u8> = calls.borrow().transfers.iter().map(|t| t.0).collect();
        // open consumed ids 0..=3 for ping and the reset sequence
        assert_eq!(ids, [4, 5]);
    }

    #[test]
    fn close_releases_link() {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let released = Rc::new(Cell::new(false));
        let link = TestLink {
            released: released.clone(),
        };
        let device = ComDevice::open_with_link(link, TestBridge::new(calls)).unwrap();

        device.close().unwrap();
        assert!(released.get());
    }
}
