// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

use tegra_hal::DoorbellError;
use thiserror::Error;

use crate::state::ChannelState;

/// Result alias used across the transport.
pub type Result<T> = core::result::Result<T, MailError>;

/// Errors surfaced by mailbox bring-up and channel operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum MailError {
    /// A register block described for the device could not be mapped.
    #[error("register block {resource} not present")]
    NoDevice { resource: usize },
    /// The BPMP has not published the handshake yet; retry later.
    #[error("bpmp handshake not ready")]
    NotReady,
    /// The BPMP reported no shared area for a channel.
    #[error("bpmp returned no area for channel {channel}")]
    BadChannelAddress { channel: usize },
    /// The shared area of a channel could not be mapped.
    #[error("failed to map area of channel {channel}")]
    MapFailed { channel: usize },
    /// Installing a doorbell handler failed.
    #[error("doorbell registration failed on cpu{core}: {error}")]
    IrqRegistration {
        core: usize,
        #[source]
        error: DoorbellError,
    },
    /// Payload exceeds the fixed message data size.
    #[error("payload of {size} bytes exceeds {max}")]
    PayloadTooLarge { size: usize, max: usize },
    /// Index is not a channel, or the channel has the wrong role for the call.
    #[error("invalid channel {0}")]
    InvalidChannel(usize),
    /// The channel state does not grant the caller access to the buffer.
    #[error("channel {channel} busy ({state:?})")]
    ChannelBusy { channel: usize, state: ChannelState },
    /// Configured area window cannot hold a message.
    #[error("area window {window:#x} smaller than message size {min:#x}")]
    WindowTooSmall { window: usize, min: usize },
}
