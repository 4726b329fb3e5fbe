// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Volatile MMIO access for mapped device windows.

use core::ptr::NonNull;

use crate::Bus;

/// A mapped register (or shared-memory) window accessed with volatile 32-bit
/// loads and stores.
pub struct MmioBus {
    base: NonNull<u32>,
    len: usize,
}

// SAFETY: the window is device memory; concurrent access is arbitrated by the
// hardware protocol layered on top, not by Rust ownership.
unsafe impl Send for MmioBus {}
unsafe impl Sync for MmioBus {}

impl MmioBus {
    /// Wraps `len` bytes of mapped memory starting at `base`.
    ///
    /// # Safety
    /// `base` must be 4-byte aligned and valid for volatile 32-bit reads and
    /// writes over `len` bytes for as long as the returned value lives.
    pub const unsafe fn new(base: NonNull<u32>, len: usize) -> Self {
        Self { base, len }
    }

    pub fn base(&self) -> usize {
        self.base.as_ptr() as usize
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn word(&self, addr: usize) -> *mut u32 {
        assert!(addr % 4 == 0 && addr + 4 <= self.len, "mmio access {addr:#x} outside window");
        // SAFETY: bounds checked above against the window promised by `new`.
        unsafe { self.base.as_ptr().add(addr / 4) }
    }
}

impl Bus for MmioBus {
    fn read(&self, addr: usize) -> u32 {
        // SAFETY: `word` yields an in-bounds, aligned pointer.
        unsafe { core::ptr::read_volatile(self.word(addr)) }
    }

    fn write(&self, addr: usize, value: u32) {
        // SAFETY: `word` yields an in-bounds, aligned pointer.
        unsafe { core::ptr::write_volatile(self.word(addr), value) }
    }
}

/// Core identity from `MPIDR_EL1.Aff0`.
#[cfg(target_arch = "aarch64")]
pub struct Mpidr;

#[cfg(target_arch = "aarch64")]
impl crate::CpuLocal for Mpidr {
    fn current_cpu(&self) -> usize {
        let mpidr: u64;
        // SAFETY: reading MPIDR_EL1 has no side effects.
        unsafe {
            core::arch::asm!("mrs {}, mpidr_el1", out(reg) mpidr, options(nomem, nostack, preserves_flags));
        }
        (mpidr & 0xff) as usize
    }
}
