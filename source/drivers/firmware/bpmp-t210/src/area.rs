// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared channel areas: message layout and the discovery handshake.
//!
//! The BPMP lays out one area per channel before it publishes the handshake.
//! Each area is looked up through the atomics block, then mapped with a small
//! window holding the message header and payload:
//!
//! ```text
//! 0x00  code   (i32, response/request code)
//! 0x04  flags  (MsgFlags)
//! 0x08  data   [u8; MSG_DATA_MIN_SZ]
//! ```

use alloc::vec::Vec;

use log::{debug, error, warn};
use tegra_hal::{Bus, IoMap};

use crate::channel::{Channel, NR_CHANNELS};
use crate::error::{MailError, Result};
use crate::state::Semaphore;

/// Size of one message in bytes.
pub const MSG_SZ: usize = 128;
/// Maximum payload carried by one message.
pub const MSG_DATA_MIN_SZ: usize = 120;

const CODE_OFFSET: usize = 0x00;
const FLAGS_OFFSET: usize = 0x04;
const DATA_OFFSET: usize = 0x08;

/// Atomics block: discovery trigger register.
pub const TRIGGER_OFFSET: usize = 0x000;
/// Atomics block: first per-channel result register.
pub const RESULT_BASE: usize = 0xc00;
pub const TRIGGER_ID_SHIFT: u32 = 16;
pub const TRIGGER_CMD_GET: u32 = 4;

pub const fn result_offset(ch: usize) -> usize {
    RESULT_BASE + ch * 4
}

/// Discovery command for `ch`.
pub const fn get_command(ch: usize) -> u32 {
    ((ch as u32) << TRIGGER_ID_SHIFT) | TRIGGER_CMD_GET
}

bitflags::bitflags! {
    /// Per-message flags written by the requester into the header.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct MsgFlags: u32 {
        /// The requester wants to observe the ACKD state before the channel is freed.
        const DO_ACK = 1 << 0;
        /// The requester wants a doorbell once the response is in place.
        const RING_DOORBELL = 1 << 1;
    }
}

/// One channel's message window.
///
/// Inbound and outbound views of a channel are the same window; the protocol
/// state decides which side may write it.
pub struct ChannelArea<R: Bus> {
    window: R,
}

impl<R: Bus> ChannelArea<R> {
    pub fn new(window: R) -> Self {
        Self { window }
    }

    pub fn window(&self) -> &R {
        &self.window
    }

    pub fn into_inner(self) -> R {
        self.window
    }

    pub fn code(&self) -> i32 {
        self.window.read(CODE_OFFSET) as i32
    }

    pub fn set_code(&self, code: i32) {
        self.window.write(CODE_OFFSET, code as u32);
    }

    /// Unknown bits are preserved.
    pub fn flags(&self) -> MsgFlags {
        MsgFlags::from_bits_retain(self.window.read(FLAGS_OFFSET))
    }

    pub fn set_flags(&self, flags: MsgFlags) {
        self.window.write(FLAGS_OFFSET, flags.bits());
    }

    /// Copies `data` to the start of the payload.
    pub fn write_payload(&self, data: &[u8]) -> Result<()> {
        if data.len() > MSG_DATA_MIN_SZ {
            return Err(MailError::PayloadTooLarge { size: data.len(), max: MSG_DATA_MIN_SZ });
        }
        self.window.write_bytes(DATA_OFFSET, data);
        Ok(())
    }

    /// Copies up to `buf.len()` payload bytes out and returns how many were read.
    pub fn read_payload(&self, buf: &mut [u8]) -> usize {
        let n = buf.len().min(MSG_DATA_MIN_SZ);
        self.window.read_bytes(DATA_OFFSET, &mut buf[..n]);
        n
    }
}

/// Every channel's area, indexed by channel.
pub struct ChannelAreas<R: Bus> {
    areas: Vec<ChannelArea<R>>,
}

impl<R: Bus> ChannelAreas<R> {
    /// Inbound view of `ch`.
    pub fn ib(&self, ch: usize) -> Option<&ChannelArea<R>> {
        self.areas.get(ch)
    }

    /// Outbound view of `ch`; aliases [`ChannelAreas::ib`].
    pub fn ob(&self, ch: usize) -> Option<&ChannelArea<R>> {
        self.areas.get(ch)
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn into_windows(self) -> impl Iterator<Item = R> {
        self.areas.into_iter().map(ChannelArea::into_inner)
    }
}

/// Asks the BPMP where it placed the area of `ch`. Zero means "none".
pub fn channel_area<B: Bus>(atomics: &B, ch: usize) -> u32 {
    atomics.write(TRIGGER_OFFSET, get_command(ch));
    atomics.read(result_offset(ch))
}

/// Runs the discovery handshake and maps every channel area.
///
/// Nothing is mapped unless every channel reports an address. If a mapping
/// fails part way, the windows mapped so far are released before returning.
pub fn resolve<M: IoMap>(
    io: &M,
    atomics: &M::Region,
    sema: &Semaphore<M::Region>,
    window: usize,
) -> Result<ChannelAreas<M::Region>> {
    if sema.status() == 0 {
        warn!("bpmp-t210: handshake not published yet");
        return Err(MailError::NotReady);
    }

    let mut hwaddr = [0u32; NR_CHANNELS];
    for (ch, slot) in hwaddr.iter_mut().enumerate() {
        *slot = channel_area(atomics, ch);
        if *slot == 0 {
            error!("bpmp-t210: no area reported for channel {ch}");
            return Err(MailError::BadChannelAddress { channel: ch });
        }
    }

    let mut areas = Vec::with_capacity(NR_CHANNELS);
    for (ch, addr) in hwaddr.iter().enumerate() {
        match io.map_phys(u64::from(*addr), window) {
            Some(region) => {
                if let Some(channel) = Channel::from_index(ch) {
                    debug!("bpmp-t210: {channel} area at {addr:#x}");
                }
                areas.push(ChannelArea::new(region));
            }
            None => {
                error!("bpmp-t210: failed to map area of channel {ch} at {addr:#x}");
                for area in areas.drain(..) {
                    io.unmap(area.into_inner());
                }
                return Err(MailError::MapFailed { channel: ch });
            }
        }
    }

    Ok(ChannelAreas { areas })
}
