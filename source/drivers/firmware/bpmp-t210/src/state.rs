// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-channel protocol state on the arbitration semaphore.
//!
//! Every channel owns two bits of the semaphore word. The hardware exposes the
//! word through a read-only STATUS register and write-one-to-set / clear
//! ports, so each update is an atomic read-modify-write done by the
//! peripheral. The slave side only sets bits and the master side only clears
//! them; [`Semaphore::release_after_ack`] is the one exception.

use log::{trace, warn};
use tegra_hal::Bus;

use crate::area::MsgFlags;
use crate::channel::NR_CHANNELS;

pub const STA_OFFSET: usize = 0x0;
pub const SET_OFFSET: usize = 0x4;
pub const CLR_OFFSET: usize = 0x8;

/// Two-bit protocol state of one channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ChannelState {
    /// `SL_SIGL`: the slave has been signalled.
    SlaveSignalled = 0b00,
    /// `SL_QUED`: the slave has queued the request.
    SlaveQueued = 0b01,
    /// `MA_FREE`: the channel is free for the master.
    MasterFree = 0b10,
    /// `MA_ACKD`: the response has been acknowledged.
    MasterAcked = 0b11,
}

impl ChannelState {
    pub const fn from_code(code: u32) -> Self {
        match code & 0b11 {
            0b00 => Self::SlaveSignalled,
            0b01 => Self::SlaveQueued,
            0b10 => Self::MasterFree,
            _ => Self::MasterAcked,
        }
    }

    pub const fn code(self) -> u32 {
        self as u32
    }

    /// The state positioned in channel `ch`'s field of the semaphore word.
    /// Zero for indices outside the word.
    pub const fn bits(self, ch: usize) -> u32 {
        if ch >= NR_CHANNELS {
            return 0;
        }
        self.code() << shift(ch)
    }
}

const fn shift(ch: usize) -> u32 {
    (ch * 2) as u32
}

/// Field of channel `ch` within the semaphore word. Zero for indices outside
/// the word.
pub const fn ch_mask(ch: usize) -> u32 {
    if ch >= NR_CHANNELS {
        return 0;
    }
    0b11 << shift(ch)
}

/// The arbitration semaphore register block.
pub struct Semaphore<R: Bus> {
    regs: R,
}

impl<R: Bus> Semaphore<R> {
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    pub fn regs(&self) -> &R {
        &self.regs
    }

    pub fn into_inner(self) -> R {
        self.regs
    }

    /// Raw semaphore word. Non-zero once the BPMP has published the handshake.
    pub fn status(&self) -> u32 {
        self.regs.read(STA_OFFSET)
    }

    /// Decoded state of `ch`, `None` when `ch` is not a channel.
    pub fn state(&self, ch: usize) -> Option<ChannelState> {
        let field = self.field(ch)?;
        Some(ChannelState::from_code(field >> shift(ch)))
    }

    pub fn master_free(&self, ch: usize) -> bool {
        self.is(ch, ChannelState::MasterFree)
    }

    pub fn slave_signalled(&self, ch: usize) -> bool {
        self.is(ch, ChannelState::SlaveSignalled)
    }

    pub fn master_acked(&self, ch: usize) -> bool {
        self.is(ch, ChannelState::MasterAcked)
    }

    /// Moves `ch` to `SL_SIGL` by clearing its whole field.
    pub fn signal_slave(&self, ch: usize) {
        if !valid(ch, "signal_slave") {
            return;
        }
        trace!("bpmp-t210: ch{ch} -> SL_SIGL");
        self.clear_bits(ch, ch_mask(ch));
    }

    /// Acknowledges the response on `ch`.
    ///
    /// Without [`MsgFlags::DO_ACK`] the requester does not need to observe
    /// `MA_ACKD`, so the channel is released to `MA_FREE` in the same call.
    pub fn ack_master(&self, ch: usize, flags: MsgFlags) {
        if !valid(ch, "ack_master") {
            return;
        }
        trace!("bpmp-t210: ch{ch} -> MA_ACKD ({flags:?})");
        self.set_bits(ch, ChannelState::MasterAcked.bits(ch));
        if flags.contains(MsgFlags::DO_ACK) {
            return;
        }
        self.release_after_ack(ch);
    }

    /// `MA_ACKD` to `MA_FREE`.
    pub fn free_master(&self, ch: usize) {
        self.release_after_ack(ch);
    }

    /// Clears `MA_ACKD ^ MA_FREE`, turning `MA_ACKD` into `MA_FREE`.
    ///
    /// This is the one clear that breaks the set/clear split. It is only
    /// sound while `ch` is in `MA_ACKD`: the remote side never sets bits on a
    /// channel in that state, so no concurrent write can interleave.
    pub fn release_after_ack(&self, ch: usize) {
        if !valid(ch, "release_after_ack") {
            return;
        }
        debug_assert_eq!(
            self.state(ch),
            Some(ChannelState::MasterAcked),
            "release of ch{ch} outside MA_ACKD"
        );
        trace!("bpmp-t210: ch{ch} -> MA_FREE");
        self.clear_bits(
            ch,
            ChannelState::MasterAcked.bits(ch) ^ ChannelState::MasterFree.bits(ch),
        );
    }

    fn field(&self, ch: usize) -> Option<u32> {
        (ch < NR_CHANNELS).then(|| self.status() & ch_mask(ch))
    }

    fn is(&self, ch: usize, state: ChannelState) -> bool {
        self.field(ch) == Some(state.bits(ch))
    }

    fn set_bits(&self, ch: usize, bits: u32) {
        debug_assert_eq!(bits & !ch_mask(ch), 0, "set outside ch{ch} field");
        self.regs.write(SET_OFFSET, bits);
    }

    fn clear_bits(&self, ch: usize, bits: u32) {
        debug_assert_eq!(bits & !ch_mask(ch), 0, "clear outside ch{ch} field");
        self.regs.write(CLR_OFFSET, bits);
    }
}

/// Mutations on an index outside the word are dropped.
fn valid(ch: usize, op: &str) -> bool {
    if ch < NR_CHANNELS {
        return true;
    }
    warn!("bpmp-t210: {op} on invalid channel {ch} ignored");
    false
}
