// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! T210 mailbox bring-up context and the operation table exposed upward.

use alloc::sync::Arc;

use log::{error, info, warn};
use tegra_hal::{Bus, CpuLocal, Doorbell, IoMap, IrqHandler};

use crate::area::{self, ChannelArea, ChannelAreas, MsgFlags, MSG_DATA_MIN_SZ};
use crate::channel::{self, Channel, NR_CHANNELS};
use crate::config::MailConfig;
use crate::doorbell::IrqBridge;
use crate::error::{MailError, Result};
use crate::state::{ChannelState, Semaphore};

/// Chip-specific mailbox operations consumed by the BPMP dispatch layer.
pub trait MailOps {
    /// Installs `handler` for every core's inbound doorbell.
    fn init_irq(&self, handler: Arc<dyn IrqHandler>) -> Result<()>;
    /// Outbound atomic channel of the executing core.
    fn ob_channel(&self) -> usize;
    fn thread_ch(&self, index: usize) -> usize;
    fn thread_ch_index(&self, ch: usize) -> Option<usize>;
    fn master_free(&self, ch: usize) -> bool;
    fn free_master(&self, ch: usize);
    fn master_acked(&self, ch: usize) -> bool;
    fn signal_slave(&self, ch: usize);
    fn ring_doorbell(&self, ch: usize);
    fn slave_signalled(&self, ch: usize) -> bool;
    /// Places the response to an inbound request and acknowledges it.
    fn return_data(&self, ch: usize, code: i32, data: &[u8]) -> Result<()>;
}

/// Everything the transport maps and owns after a successful handshake.
pub struct T210Mailbox<R: Bus, D: Doorbell, C: CpuLocal> {
    sema: Semaphore<R>,
    areas: ChannelAreas<R>,
    bridge: IrqBridge<D>,
    cpu: C,
    config: MailConfig,
}

impl<R: Bus, D: Doorbell, C: CpuLocal> T210Mailbox<R, D, C> {
    /// Maps the register blocks and runs the channel-area handshake.
    ///
    /// `MailError::NotReady` means the BPMP has not finished booting; the
    /// caller may retry. Every other error is fatal for this configuration.
    /// On failure nothing stays mapped.
    pub fn connect<M>(io: &M, doorbell: D, cpu: C, config: MailConfig) -> Result<Self>
    where
        M: IoMap<Region = R>,
    {
        config.validate()?;

        let atomics = io
            .map_resource(config.atomics_resource)
            .ok_or(MailError::NoDevice { resource: config.atomics_resource })?;
        let Some(sema) = io.map_resource(config.semaphore_resource) else {
            io.unmap(atomics);
            return Err(MailError::NoDevice { resource: config.semaphore_resource });
        };
        let sema = Semaphore::new(sema);

        let resolved = area::resolve(io, &atomics, &sema, config.area_window);
        io.unmap(atomics);
        let areas = match resolved {
            Ok(areas) => areas,
            Err(err) => {
                io.unmap(sema.into_inner());
                return Err(err);
            }
        };

        info!(
            "bpmp-t210: connected, {} channels, doorbell line {}",
            areas.len(),
            config.doorbell_line
        );
        Ok(Self {
            sema,
            areas,
            bridge: IrqBridge::new(doorbell, config.doorbell_line),
            cpu,
            config,
        })
    }

    /// Unmaps every channel area and the semaphore block.
    pub fn disconnect<M>(self, io: &M)
    where
        M: IoMap<Region = R>,
    {
        for window in self.areas.into_windows() {
            io.unmap(window);
        }
        io.unmap(self.sema.into_inner());
        info!("bpmp-t210: disconnected");
    }

    pub fn config(&self) -> &MailConfig {
        &self.config
    }

    pub fn semaphore(&self) -> &Semaphore<R> {
        &self.sema
    }

    pub fn doorbell(&self) -> &D {
        self.bridge.substrate()
    }

    /// `None` when `ch` is not a channel.
    pub fn state(&self, ch: usize) -> Option<ChannelState> {
        self.sema.state(ch)
    }

    /// Shared area of `ch` (inbound and outbound views are the same window).
    pub fn area(&self, ch: usize) -> Result<&ChannelArea<R>> {
        self.areas.ob(ch).ok_or(MailError::InvalidChannel(ch))
    }

    /// Posts a request on outbound channel `ch` and wakes the BPMP.
    ///
    /// Refuses with `ChannelBusy` unless the channel is `MA_FREE`, the only
    /// state in which the CPU owns an outbound buffer.
    pub fn send_request(&self, ch: usize, code: i32, flags: MsgFlags, payload: &[u8]) -> Result<()> {
        let area = self.outbound_area(ch)?;
        let state = self.sema.state(ch).ok_or(MailError::InvalidChannel(ch))?;
        if state != ChannelState::MasterFree {
            return Err(MailError::ChannelBusy { channel: ch, state });
        }
        area.write_payload(payload)?;
        area.set_code(code);
        area.set_flags(flags);
        self.sema.signal_slave(ch);
        self.bridge.ring(ch);
        Ok(())
    }

    /// Collects the response on outbound channel `ch` and frees it.
    ///
    /// Returns the response code and the number of payload bytes copied.
    pub fn take_response(&self, ch: usize, buf: &mut [u8]) -> Result<(i32, usize)> {
        let area = self.outbound_area(ch)?;
        let state = self.sema.state(ch).ok_or(MailError::InvalidChannel(ch))?;
        if state != ChannelState::MasterAcked {
            return Err(MailError::ChannelBusy { channel: ch, state });
        }
        let code = area.code();
        let len = area.read_payload(buf);
        self.sema.free_master(ch);
        Ok((code, len))
    }

    fn outbound_area(&self, ch: usize) -> Result<&ChannelArea<R>> {
        match Channel::from_index(ch) {
            Some(channel) if channel.role.is_outbound() => self.area(ch),
            _ => Err(MailError::InvalidChannel(ch)),
        }
    }
}

impl<R: Bus, D: Doorbell, C: CpuLocal> MailOps for T210Mailbox<R, D, C> {
    fn init_irq(&self, handler: Arc<dyn IrqHandler>) -> Result<()> {
        self.bridge.register_all(handler)
    }

    fn ob_channel(&self) -> usize {
        channel::ob_channel(&self.cpu)
    }

    fn thread_ch(&self, index: usize) -> usize {
        channel::thread_ch(index)
    }

    fn thread_ch_index(&self, ch: usize) -> Option<usize> {
        channel::thread_ch_index(ch)
    }

    fn master_free(&self, ch: usize) -> bool {
        self.sema.master_free(ch)
    }

    fn free_master(&self, ch: usize) {
        self.sema.free_master(ch)
    }

    fn master_acked(&self, ch: usize) -> bool {
        self.sema.master_acked(ch)
    }

    fn signal_slave(&self, ch: usize) {
        self.sema.signal_slave(ch)
    }

    fn ring_doorbell(&self, ch: usize) {
        self.bridge.ring(ch)
    }

    fn slave_signalled(&self, ch: usize) -> bool {
        self.sema.slave_signalled(ch)
    }

    fn return_data(&self, ch: usize, code: i32, data: &[u8]) -> Result<()> {
        if ch >= NR_CHANNELS {
            error!("bpmp-t210: return_data on invalid channel {ch}");
            return Err(MailError::InvalidChannel(ch));
        }
        if data.len() > MSG_DATA_MIN_SZ {
            warn!(
                "bpmp-t210: return_data on ch{ch}: {} byte payload exceeds {MSG_DATA_MIN_SZ}",
                data.len()
            );
            return Err(MailError::PayloadTooLarge { size: data.len(), max: MSG_DATA_MIN_SZ });
        }

        let ob = self.area(ch)?;
        ob.write_payload(data)?;
        ob.set_code(code);

        let flags = self.areas.ib(ch).ok_or(MailError::InvalidChannel(ch))?.flags();
        let state = self.sema.state(ch).ok_or(MailError::InvalidChannel(ch))?;
        if !matches!(state, ChannelState::SlaveSignalled | ChannelState::SlaveQueued) {
            warn!("bpmp-t210: return_data on ch{ch} while {state:?}");
        }
        self.sema.ack_master(ch, flags);
        if flags.contains(MsgFlags::RING_DOORBELL) {
            self.bridge.ring(ch);
        }
        Ok(())
    }
}
