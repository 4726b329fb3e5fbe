// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), no_std)]

//! CONTEXT: Hardware access seams shared by the Tegra firmware drivers
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: 5 unit tests + tests/bus.rs
//!
//! PUBLIC API:
//!   - Bus: 32-bit register/window access (plus byte-copy helpers)
//!   - IoMap: resource and physical-range mapping service
//!   - CpuLocal: identity of the executing core
//!   - Doorbell / IrqHandler / IrqBinding: cross-core notification substrate
//!   - MmioBus: volatile MMIO window for real hardware

extern crate alloc;

use alloc::sync::Arc;
use core::fmt;

mod mmio;

pub use mmio::MmioBus;

#[cfg(target_arch = "aarch64")]
pub use mmio::Mpidr;

/// Basic bus access trait shared by drivers.
///
/// Addresses are byte offsets into the mapped window.
pub trait Bus {
    fn read(&self, addr: usize) -> u32;
    fn write(&self, addr: usize, value: u32);

    /// Copies `buf.len()` bytes starting at `addr` out of the window.
    ///
    /// The default implementation issues aligned 32-bit reads and assumes a
    /// little-endian window.
    fn read_bytes(&self, addr: usize, buf: &mut [u8]) {
        for (i, byte) in buf.iter_mut().enumerate() {
            let at = addr + i;
            let shift = (at & 3) * 8;
            *byte = (self.read(at & !3) >> shift) as u8;
        }
    }

    /// Copies `data` into the window starting at `addr`.
    ///
    /// The default implementation read-modify-writes aligned 32-bit words, so
    /// it must only be used on plain memory windows, never on SET/CLEAR ports.
    fn write_bytes(&self, addr: usize, data: &[u8]) {
        for (i, byte) in data.iter().enumerate() {
            let at = addr + i;
            let word = at & !3;
            let shift = (at & 3) * 8;
            let cur = self.read(word) & !(0xff << shift);
            self.write(word, cur | ((*byte as u32) << shift));
        }
    }
}

impl<B: Bus + ?Sized> Bus for &B {
    fn read(&self, addr: usize) -> u32 {
        (**self).read(addr)
    }

    fn write(&self, addr: usize, value: u32) {
        (**self).write(addr, value)
    }

    fn read_bytes(&self, addr: usize, buf: &mut [u8]) {
        (**self).read_bytes(addr, buf)
    }

    fn write_bytes(&self, addr: usize, data: &[u8]) {
        (**self).write_bytes(addr, data)
    }
}

/// IO-mapping service backing device bring-up.
///
/// `map_resource` resolves the N-th register block described for the device;
/// `map_phys` maps an arbitrary physical range (e.g. a firmware-provided
/// shared-memory area). Both return `None` when the mapping is unavailable.
pub trait IoMap {
    type Region: Bus;

    fn map_resource(&self, index: usize) -> Option<Self::Region>;
    fn map_phys(&self, phys: u64, len: usize) -> Option<Self::Region>;
    fn unmap(&self, region: Self::Region);
}

/// Identity of the core executing the caller.
pub trait CpuLocal {
    fn current_cpu(&self) -> usize;
}

/// Callback invoked from doorbell interrupt context.
///
/// Runs synchronously inside the interrupt; implementations must not block
/// and must not panic.
pub trait IrqHandler: Send + Sync {
    fn handle(&self, channel: usize);
}

/// A handler bound to the channel it services.
#[derive(Clone)]
pub struct IrqBinding {
    handler: Arc<dyn IrqHandler>,
    channel: usize,
}

impl IrqBinding {
    pub fn new(handler: Arc<dyn IrqHandler>, channel: usize) -> Self {
        Self { handler, channel }
    }

    pub fn channel(&self) -> usize {
        self.channel
    }

    /// Delivers the notification to the bound handler.
    pub fn fire(&self) {
        self.handler.handle(self.channel);
    }
}

impl fmt::Debug for IrqBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IrqBinding").field("channel", &self.channel).finish_non_exhaustive()
    }
}

/// Errors reported by the doorbell substrate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DoorbellError {
    /// No doorbell exists for the requested core.
    InvalidCore(usize),
    /// A handler is already installed for the core.
    AlreadyRegistered(usize),
    /// Substrate-specific failure code.
    Code(i32),
}

impl fmt::Display for DoorbellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidCore(core) => write!(f, "no doorbell for core {core}"),
            Self::AlreadyRegistered(core) => write!(f, "doorbell handler already registered for core {core}"),
            Self::Code(code) => write!(f, "doorbell substrate error {code}"),
        }
    }
}

impl core::error::Error for DoorbellError {}

/// Doorbell delivery substrate.
pub trait Doorbell {
    /// Fire-and-forget notification on `line`.
    fn ring(&self, line: u32);

    /// Installs `binding` as the handler for `core`'s doorbell.
    fn register(&self, core: usize, binding: IrqBinding) -> Result<(), DoorbellError>;
}
