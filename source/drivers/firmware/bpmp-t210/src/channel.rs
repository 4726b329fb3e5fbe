// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Fixed channel layout: which index serves which role on which core.
//!
//! | channels | role |
//! |----------|------|
//! | 0..=3    | CPU → BPMP atomic, one per core |
//! | 4..=7    | CPU → BPMP non-atomic ("thread") |
//! | 8..=11   | BPMP → CPU, one per core |

use core::fmt;

use tegra_hal::CpuLocal;

/// Number of CPU cores with their own channels.
pub const NR_CPUS: usize = 4;
/// Number of channels multiplexed on the semaphore word.
pub const NR_CHANNELS: usize = 12;

const OB_ATOMIC_BASE: usize = 0;
const OB_THREAD_BASE: usize = 4;
const IB_BASE: usize = 8;

/// Outbound atomic channel owned by `core`.
pub const fn ob_atomic_channel(core: usize) -> usize {
    debug_assert!(core < NR_CPUS);
    OB_ATOMIC_BASE + core
}

/// Outbound atomic channel of the executing core.
pub fn ob_channel<C: CpuLocal + ?Sized>(cpu: &C) -> usize {
    ob_atomic_channel(cpu.current_cpu())
}

/// Non-atomic outbound channel for thread slot `index`.
pub const fn thread_ch(index: usize) -> usize {
    debug_assert!(index < NR_CPUS);
    OB_THREAD_BASE + index
}

/// Inverse of [`thread_ch`]; `None` when `ch` is not a thread channel.
pub const fn thread_ch_index(ch: usize) -> Option<usize> {
    if ch < OB_THREAD_BASE || ch >= OB_THREAD_BASE + NR_CPUS {
        return None;
    }
    Some(ch - OB_THREAD_BASE)
}

/// Inbound channel serviced by `core`.
pub const fn ib_channel(core: usize) -> usize {
    debug_assert!(core < NR_CPUS);
    IB_BASE + core
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelRole {
    OutboundAtomic,
    OutboundThread,
    Inbound,
}

impl ChannelRole {
    pub const fn is_outbound(self) -> bool {
        matches!(self, Self::OutboundAtomic | Self::OutboundThread)
    }
}

/// A channel index together with its role and owning core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Channel {
    pub index: usize,
    pub role: ChannelRole,
    pub core: usize,
}

impl Channel {
    pub const fn from_index(index: usize) -> Option<Self> {
        let (role, base) = match index {
            0..=3 => (ChannelRole::OutboundAtomic, OB_ATOMIC_BASE),
            4..=7 => (ChannelRole::OutboundThread, OB_THREAD_BASE),
            8..=11 => (ChannelRole::Inbound, IB_BASE),
            _ => return None,
        };
        Some(Self { index, role, core: index - base })
    }

    pub fn all() -> impl Iterator<Item = Channel> {
        (0..NR_CHANNELS).filter_map(Self::from_index)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            ChannelRole::OutboundAtomic => "ob-atomic",
            ChannelRole::OutboundThread => "ob-thread",
            ChannelRole::Inbound => "ib",
        };
        write!(f, "ch{} ({role} cpu{})", self.index, self.core)
    }
}
