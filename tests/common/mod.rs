//! Shared test fixtures: deterministic HAL fakes and a two-node
//! loopback radio.
//!
//! Each test binary pulls in the subset it needs.
#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use iohc::error::Result;
use iohc::hal::{MonotonicClock, RadioSink, RadioSource, RandomSource, Received};

/// Manually advanced clock shared between test and engine.
#[derive(Clone, Default)]
pub struct TestClock(Rc<Cell<u64>>);

impl TestClock {
    pub fn set(&self, now_us: u64) {
        self.0.set(now_us);
    }

    pub fn advance(&self, delta_us: u64) {
        self.0.set(self.0.get() + delta_us);
    }
}

impl MonotonicClock for TestClock {
    fn now_us(&self) -> u64 {
        self.0.get()
    }
}

/// Deterministic entropy: an incrementing byte pattern per draw.
pub struct SeededRandom {
    counter: u8,
}

impl SeededRandom {
    pub fn new(seed: u8) -> Self {
        Self { counter: seed }
    }
}

impl RandomSource for SeededRandom {
    fn fill(&mut self, buf: &mut [u8]) {
        for b in buf.iter_mut() {
            self.counter = self.counter.wrapping_add(1);
            *b = self.counter;
        }
    }
}

/// One direction of a radio link: a shared in-memory frame queue.
#[derive(Clone, Default)]
pub struct Air {
    queue: Rc<RefCell<VecDeque<Vec<u8>>>>,
}

impl Air {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_raw(&self, bytes: Vec<u8>) {
        self.queue.borrow_mut().push_back(bytes);
    }

    pub fn drain(&self) -> Vec<Vec<u8>> {
        self.queue.borrow_mut().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }
}

/// Transmitter writing into an [`Air`], recording frequency changes.
#[derive(Clone)]
pub struct AirSink {
    air: Air,
    pub frequency: Rc<Cell<f32>>,
    pub transmitted: Rc<Cell<usize>>,
}

impl AirSink {
    pub fn new(air: Air) -> Self {
        Self {
            air,
            frequency: Rc::new(Cell::new(0.0)),
            transmitted: Rc::new(Cell::new(0)),
        }
    }
}

impl RadioSink for AirSink {
    fn set_frequency(&mut self, mhz: f32) -> Result<()> {
        self.frequency.set(mhz);
        Ok(())
    }

    fn transmit(&mut self, bytes: &[u8]) -> Result<()> {
        self.transmitted.set(self.transmitted.get() + 1);
        self.air.push_raw(bytes.to_vec());
        Ok(())
    }
}

/// Receiver draining an [`Air`] with fixed link quality.
#[derive(Clone)]
pub struct AirSource {
    air: Air,
    pub rssi: i16,
    pub snr: f32,
}

impl AirSource {
    pub fn new(air: Air) -> Self {
        Self {
            air,
            rssi: -62,
            snr: 9.5,
        }
    }
}

impl RadioSource for AirSource {
    fn try_receive(&mut self) -> Option<Received> {
        self.air.queue.borrow_mut().pop_front().map(|bytes| Received {
            bytes,
            rssi: self.rssi,
            snr: self.snr,
        })
    }
}
