// Recording doubles for the two-wire bus and the delay. Both append to the same log so tests
// can check the ordering of bus traffic against settle delays.
extern crate std;

use core::cell::RefCell;
use embedded_hal::delay::DelayNs;
use std::{rc::Rc, vec::Vec};

use crate::bus::TwoWireBus;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BusEvent {
    Start(u8),
    Write(u8),
    Stop,
    DelayNs(u64),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BusFault;

/// One enable pulse as seen by the controller
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transfer {
    pub rs: bool,
    pub backlight: bool,
    pub nibble: u8,
}

pub struct RecordingBus {
    log: Rc<RefCell<Vec<BusEvent>>>,
    fail_after: Option<usize>,
    writes_seen: usize,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self {
            log: Rc::new(RefCell::new(Vec::new())),
            fail_after: None,
            writes_seen: 0,
        }
    }

    /// Every write after the first `count` fails with `BusFault`
    pub fn fail_writes_after(&mut self, count: usize) {
        self.fail_after = Some(count);
        self.writes_seen = 0;
    }

    pub fn clear(&mut self) {
        self.log.borrow_mut().clear();
    }

    pub fn events(&self) -> Vec<BusEvent> {
        self.log.borrow().clone()
    }

    pub fn writes(&self) -> Vec<u8> {
        self.log
            .borrow()
            .iter()
            .filter_map(|e| match e {
                BusEvent::Write(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    pub fn session_count(&self) -> usize {
        self.log
            .borrow()
            .iter()
            .filter(|e| matches!(e, BusEvent::Start(_)))
            .count()
    }

    /// The nibbles latched by the controller, one per enable pulse. A pulse is the write
    /// with enable high followed by the same byte with enable low.
    pub fn transfers(&self) -> Vec<Transfer> {
        let writes = self.writes();
        assert!(writes.len() % 2 == 0, "incomplete enable pulse");
        writes
            .chunks(2)
            .map(|pulse| {
                assert_eq!(pulse[0] & 0x04, 0x04, "enable not asserted");
                assert_eq!(pulse[0] & !0x04, pulse[1], "byte changed during pulse");
                Transfer {
                    rs: pulse[0] & 0x01 != 0,
                    backlight: pulse[0] & 0x08 != 0,
                    nibble: pulse[0] >> 4,
                }
            })
            .collect()
    }

    /// Reassembles 4-bit mode transfers into `(rs, byte)` pairs.
    pub fn bytes(&self) -> Vec<(bool, u8)> {
        let transfers = self.transfers();
        assert!(transfers.len() % 2 == 0, "odd number of nibbles");
        transfers
            .chunks(2)
            .map(|pair| {
                assert_eq!(pair[0].rs, pair[1].rs, "RS changed within a byte");
                (pair[0].rs, pair[0].nibble << 4 | pair[1].nibble)
            })
            .collect()
    }

    pub fn commands(&self) -> Vec<u8> {
        self.bytes()
            .into_iter()
            .filter_map(|(rs, b)| if rs { None } else { Some(b) })
            .collect()
    }

    pub fn data(&self) -> Vec<u8> {
        self.bytes()
            .into_iter()
            .filter_map(|(rs, b)| if rs { Some(b) } else { None })
            .collect()
    }

    pub fn delays_ns(&self) -> Vec<u64> {
        self.log
            .borrow()
            .iter()
            .filter_map(|e| match e {
                BusEvent::DelayNs(ns) => Some(*ns),
                _ => None,
            })
            .collect()
    }
}

impl core::fmt::Debug for RecordingBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RecordingBus")
            .field("events", &self.log.borrow().len())
            .finish()
    }
}

impl TwoWireBus for RecordingBus {
    type Error = BusFault;

    fn start_wait(&mut self, address: u8) -> Result<(), Self::Error> {
        self.log.borrow_mut().push(BusEvent::Start(address));
        Ok(())
    }

    fn write(&mut self, byte: u8) -> Result<(), Self::Error> {
        self.log.borrow_mut().push(BusEvent::Write(byte));
        self.writes_seen += 1;
        match self.fail_after {
            Some(count) if self.writes_seen > count => Err(BusFault),
            _ => Ok(()),
        }
    }

    fn stop(&mut self) -> Result<(), Self::Error> {
        self.log.borrow_mut().push(BusEvent::Stop);
        Ok(())
    }
}

pub struct RecordingDelay {
    log: Rc<RefCell<Vec<BusEvent>>>,
}

impl RecordingDelay {
    pub fn new(bus: &RecordingBus) -> Self {
        Self {
            log: bus.log.clone(),
        }
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.log.borrow_mut().push(BusEvent::DelayNs(ns as u64));
    }

    fn delay_us(&mut self, us: u32) {
        self.log.borrow_mut().push(BusEvent::DelayNs(us as u64 * 1_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.log.borrow_mut().push(BusEvent::DelayNs(ms as u64 * 1_000_000));
    }
}
