// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Host simulation of the T210 mailbox hardware and the remote BPMP.
//!
//! [`SimSoc`] plays every hardware seam the transport consumes: it maps the
//! atomics and semaphore blocks, backs channel areas with a small DRAM,
//! delivers doorbells and reports the executing core. [`RemoteBpmp`] drives
//! the firmware side of the protocol. Faults can be injected for each setup
//! error path.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

use log::warn;
use parking_lot::Mutex;
use tegra_hal::{Bus, CpuLocal, Doorbell, DoorbellError, IoMap, IrqBinding};

use crate::area::{self, MsgFlags, MSG_DATA_MIN_SZ, MSG_SZ};
use crate::channel::{ib_channel, NR_CHANNELS, NR_CPUS};
use crate::state::{ch_mask, ChannelState, CLR_OFFSET, SET_OFFSET, STA_OFFSET};

/// Physical base of the simulated DRAM holding channel areas.
pub const SIM_DRAM_BASE: u64 = 0x8000_0000;
/// Simulated DRAM size.
pub const SIM_DRAM_SIZE: usize = 0x1000;

const ATOMICS_RESOURCE: usize = 0;
const SEMAPHORE_RESOURCE: usize = 1;

/// Failure injection knobs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Faults {
    /// `map_resource` returns `None` for this index.
    pub missing_resource: Option<usize>,
    /// The n-th (0-based) `map_phys` call fails.
    pub fail_map_phys_at: Option<usize>,
    /// Registering a doorbell handler on this core fails with this error.
    pub refuse_register: Option<(usize, DoorbellError)>,
}

struct Hw {
    sema: AtomicU32,
    trigger: AtomicU32,
    channel_addr: Mutex<[u32; NR_CHANNELS]>,
    dram: Mutex<Vec<u8>>,
    handlers: Mutex<[Option<IrqBinding>; NR_CPUS]>,
    rings: Mutex<Vec<u32>>,
    faults: Mutex<Faults>,
    discoveries: AtomicUsize,
    map_phys_calls: AtomicUsize,
    live_regions: AtomicUsize,
    cpu: AtomicUsize,
}

impl Hw {
    fn dram_read(&self, offset: usize, buf: &mut [u8]) {
        buf.copy_from_slice(&self.dram.lock()[offset..offset + buf.len()]);
    }

    fn dram_write(&self, offset: usize, data: &[u8]) {
        self.dram.lock()[offset..offset + data.len()].copy_from_slice(data);
    }

    fn area_offset(&self, ch: usize) -> usize {
        let addr = u64::from(self.channel_addr.lock()[ch]);
        (addr - SIM_DRAM_BASE) as usize
    }
}

/// Simulated SoC: IO mapping, doorbell controller and core identity.
#[derive(Clone)]
pub struct SimSoc {
    hw: Arc<Hw>,
}

impl Default for SimSoc {
    fn default() -> Self {
        Self::new()
    }
}

impl SimSoc {
    /// A SoC whose BPMP has not booted: the semaphore reads zero and no
    /// channel area is published.
    pub fn new() -> Self {
        Self {
            hw: Arc::new(Hw {
                sema: AtomicU32::new(0),
                trigger: AtomicU32::new(0),
                channel_addr: Mutex::new([0; NR_CHANNELS]),
                dram: Mutex::new(vec![0; SIM_DRAM_SIZE]),
                handlers: Mutex::new(Default::default()),
                rings: Mutex::new(Vec::new()),
                faults: Mutex::new(Faults::default()),
                discoveries: AtomicUsize::new(0),
                map_phys_calls: AtomicUsize::new(0),
                live_regions: AtomicUsize::new(0),
                cpu: AtomicUsize::new(0),
            }),
        }
    }

    /// Boots the simulated firmware: lays out one area per channel and
    /// publishes the handshake with every channel `MA_FREE`.
    pub fn boot_firmware(&self) {
        let mut addrs = self.hw.channel_addr.lock();
        for (ch, addr) in addrs.iter_mut().enumerate() {
            *addr = (SIM_DRAM_BASE + (ch * MSG_SZ) as u64) as u32;
        }
        let word = (0..NR_CHANNELS).fold(0, |w, ch| w | ChannelState::MasterFree.bits(ch));
        self.hw.sema.store(word, Ordering::SeqCst);
    }

    /// Booted SoC, ready for `connect`.
    pub fn booted() -> Self {
        let soc = Self::new();
        soc.boot_firmware();
        soc
    }

    pub fn set_channel_address(&self, ch: usize, addr: u32) {
        self.hw.channel_addr.lock()[ch] = addr;
    }

    pub fn inject(&self, faults: Faults) {
        *self.hw.faults.lock() = faults;
    }

    pub fn set_current_cpu(&self, core: usize) {
        self.hw.cpu.store(core, Ordering::SeqCst);
    }

    /// Raw semaphore word.
    pub fn semaphore_word(&self) -> u32 {
        self.hw.sema.load(Ordering::SeqCst)
    }

    pub fn state(&self, ch: usize) -> ChannelState {
        ChannelState::from_code(self.semaphore_word() >> (ch * 2))
    }

    /// Discovery commands received by the atomics block.
    pub fn discoveries(&self) -> usize {
        self.hw.discoveries.load(Ordering::SeqCst)
    }

    pub fn map_phys_calls(&self) -> usize {
        self.hw.map_phys_calls.load(Ordering::SeqCst)
    }

    /// Regions handed out by the `IoMap` seam and not yet unmapped.
    pub fn live_regions(&self) -> usize {
        self.hw.live_regions.load(Ordering::SeqCst)
    }

    /// Doorbell lines rung so far, oldest first.
    pub fn rings(&self) -> Vec<u32> {
        self.hw.rings.lock().clone()
    }

    /// Cores with an installed doorbell handler.
    pub fn registered_cores(&self) -> Vec<usize> {
        let handlers = self.hw.handlers.lock();
        (0..NR_CPUS).filter(|core| handlers[*core].is_some()).collect()
    }

    /// Channel bound to `core`'s doorbell handler.
    pub fn bound_channel(&self, core: usize) -> Option<usize> {
        self.hw.handlers.lock().get(core)?.as_ref().map(IrqBinding::channel)
    }

    /// Raises `core`'s doorbell interrupt. Returns `false` when nothing is
    /// registered for it.
    pub fn fire(&self, core: usize) -> bool {
        // Handlers call back into the SoC, so the table is not held across the call.
        let binding = self.hw.handlers.lock().get(core).cloned().flatten();
        match binding {
            Some(binding) => {
                binding.fire();
                true
            }
            None => {
                warn!("sim: spurious doorbell on cpu{core}");
                false
            }
        }
    }

    pub fn remote(&self) -> RemoteBpmp {
        RemoteBpmp { soc: self.clone() }
    }
}

impl IoMap for SimSoc {
    type Region = SimRegion;

    fn map_resource(&self, index: usize) -> Option<SimRegion> {
        if self.hw.faults.lock().missing_resource == Some(index) {
            return None;
        }
        let kind = match index {
            ATOMICS_RESOURCE => RegionKind::Atomics,
            SEMAPHORE_RESOURCE => RegionKind::Semaphore,
            _ => return None,
        };
        self.hw.live_regions.fetch_add(1, Ordering::SeqCst);
        Some(SimRegion { hw: self.hw.clone(), kind })
    }

    fn map_phys(&self, phys: u64, len: usize) -> Option<SimRegion> {
        let call = self.hw.map_phys_calls.fetch_add(1, Ordering::SeqCst);
        if self.hw.faults.lock().fail_map_phys_at == Some(call) {
            return None;
        }
        let end = SIM_DRAM_BASE + SIM_DRAM_SIZE as u64;
        if phys < SIM_DRAM_BASE || phys + len as u64 > end {
            return None;
        }
        self.hw.live_regions.fetch_add(1, Ordering::SeqCst);
        Some(SimRegion {
            hw: self.hw.clone(),
            kind: RegionKind::Dram { offset: (phys - SIM_DRAM_BASE) as usize, len },
        })
    }

    fn unmap(&self, _region: SimRegion) {
        self.hw.live_regions.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Doorbell for SimSoc {
    fn ring(&self, line: u32) {
        self.hw.rings.lock().push(line);
    }

    fn register(&self, core: usize, binding: IrqBinding) -> Result<(), DoorbellError> {
        if let Some((refused, err)) = self.hw.faults.lock().refuse_register {
            if refused == core {
                return Err(err);
            }
        }
        let mut handlers = self.hw.handlers.lock();
        let slot = handlers.get_mut(core).ok_or(DoorbellError::InvalidCore(core))?;
        if slot.is_some() {
            return Err(DoorbellError::AlreadyRegistered(core));
        }
        *slot = Some(binding);
        Ok(())
    }
}

impl CpuLocal for SimSoc {
    fn current_cpu(&self) -> usize {
        self.hw.cpu.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RegionKind {
    Atomics,
    Semaphore,
    Dram { offset: usize, len: usize },
}

/// A window handed out by [`SimSoc`].
pub struct SimRegion {
    hw: Arc<Hw>,
    kind: RegionKind,
}

impl SimRegion {
    fn dram_range(&self, addr: usize, n: usize) -> usize {
        match self.kind {
            RegionKind::Dram { offset, len } => {
                assert!(addr + n <= len, "sim: access {addr:#x}+{n} outside {len:#x} window");
                offset + addr
            }
            _ => unreachable!("byte access on a register block"),
        }
    }
}

impl Bus for SimRegion {
    fn read(&self, addr: usize) -> u32 {
        match self.kind {
            RegionKind::Atomics => {
                let trigger = self.hw.trigger.load(Ordering::SeqCst);
                if addr == area::TRIGGER_OFFSET {
                    return trigger;
                }
                let ch = addr.wrapping_sub(area::RESULT_BASE) / 4;
                if addr < area::RESULT_BASE || ch >= NR_CHANNELS || trigger != area::get_command(ch) {
                    return 0;
                }
                self.hw.channel_addr.lock()[ch]
            }
            RegionKind::Semaphore => match addr {
                STA_OFFSET => self.hw.sema.load(Ordering::SeqCst),
                _ => 0,
            },
            RegionKind::Dram { .. } => {
                let mut word = [0u8; 4];
                self.read_bytes(addr, &mut word);
                u32::from_le_bytes(word)
            }
        }
    }

    fn write(&self, addr: usize, value: u32) {
        match self.kind {
            RegionKind::Atomics => {
                if addr == area::TRIGGER_OFFSET {
                    self.hw.trigger.store(value, Ordering::SeqCst);
                    if value & 0xffff == area::TRIGGER_CMD_GET {
                        self.hw.discoveries.fetch_add(1, Ordering::SeqCst);
                    }
                }
            }
            RegionKind::Semaphore => match addr {
                SET_OFFSET => {
                    self.hw.sema.fetch_or(value, Ordering::SeqCst);
                }
                CLR_OFFSET => {
                    self.hw.sema.fetch_and(!value, Ordering::SeqCst);
                }
                _ => warn!("sim: write {value:#x} to read-only semaphore register {addr:#x}"),
            },
            RegionKind::Dram { .. } => self.write_bytes(addr, &value.to_le_bytes()),
        }
    }

    fn read_bytes(&self, addr: usize, buf: &mut [u8]) {
        let at = self.dram_range(addr, buf.len());
        self.hw.dram_read(at, buf);
    }

    fn write_bytes(&self, addr: usize, data: &[u8]) {
        let at = self.dram_range(addr, data.len());
        self.hw.dram_write(at, data);
    }
}

/// A message as seen in a channel area.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimMessage {
    pub code: i32,
    pub flags: MsgFlags,
    pub data: Vec<u8>,
}

/// Firmware side of the protocol.
///
/// On outbound channels the BPMP is the slave and only sets bits; on inbound
/// channels it is the master and only clears them.
pub struct RemoteBpmp {
    soc: SimSoc,
}

impl RemoteBpmp {
    fn set(&self, ch: usize, state: ChannelState) {
        self.soc.hw.sema.fetch_or(state.bits(ch), Ordering::SeqCst);
    }

    fn clear(&self, bits: u32) {
        self.soc.hw.sema.fetch_and(!bits, Ordering::SeqCst);
    }

    /// Reads the whole area of `ch`.
    pub fn message(&self, ch: usize) -> SimMessage {
        let hw = &self.soc.hw;
        let mut raw = [0u8; MSG_SZ];
        hw.dram_read(hw.area_offset(ch), &mut raw);
        SimMessage {
            code: i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
            flags: MsgFlags::from_bits_retain(u32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]])),
            data: raw[8..8 + MSG_DATA_MIN_SZ].to_vec(),
        }
    }

    fn write_message(&self, ch: usize, code: i32, flags: MsgFlags, data: &[u8]) {
        assert!(data.len() <= MSG_DATA_MIN_SZ, "sim: payload too large");
        let hw = &self.soc.hw;
        let offset = hw.area_offset(ch);
        hw.dram_write(offset, &code.to_le_bytes());
        hw.dram_write(offset + 4, &flags.bits().to_le_bytes());
        hw.dram_write(offset + 8, data);
    }

    /// Outbound slave: `SL_SIGL` to `SL_QUED`.
    pub fn queue(&self, ch: usize) {
        self.set(ch, ChannelState::SlaveQueued);
    }

    /// Outbound slave: writes the response and sets `MA_ACKD`.
    pub fn complete(&self, ch: usize, code: i32, data: &[u8]) {
        let flags = self.message(ch).flags;
        self.write_message(ch, code, flags, data);
        self.set(ch, ChannelState::MasterAcked);
    }

    /// Inbound master: posts a request to `core`, moves its inbound channel
    /// to `SL_SIGL` and raises the core's doorbell. Returns whether a
    /// handler took the interrupt.
    pub fn post_inbound(&self, core: usize, code: i32, flags: MsgFlags, data: &[u8]) -> bool {
        let ch = ib_channel(core);
        self.write_message(ch, code, flags, data);
        self.clear(ch_mask(ch));
        self.soc.fire(core)
    }

    /// Inbound master: releases a `DO_ACK` channel once the response was read.
    pub fn release(&self, ch: usize) {
        self.clear(ChannelState::MasterAcked.bits(ch) ^ ChannelState::MasterFree.bits(ch));
    }
}
