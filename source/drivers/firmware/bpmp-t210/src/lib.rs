// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! CONTEXT: Tegra T210 BPMP mailbox transport (arbitration semaphore + doorbell)
//! OWNERS: @runtime
//! STATUS: Functional
//! API_STABILITY: Stable
//! TEST_COVERAGE: unit tests per module + tests/{handshake,protocol,doorbell,config}.rs (host sim)
//!
//! PUBLIC API:
//!   - T210Mailbox: bring-up context (handshake, IRQ init, channel operations)
//!   - MailOps: chip-agnostic operation table consumed by the BPMP dispatch layer
//!   - Semaphore / ChannelState: packed 2-bit per-channel protocol state
//!   - ChannelArea / MsgFlags: shared message buffer layout
//!   - channel::*: fixed channel role mapping
//!   - MailConfig: resource indices, doorbell line, window size
//!   - sim (backend-host): host simulation of the SoC side and the remote BPMP
//!
//! DEPENDENCIES:
//!   - tegra-hal::{Bus, IoMap, Doorbell, CpuLocal}: hardware seams
//!
//! INVARIANTS:
//!   - The CPU only sets ACKD bits and only clears the rest; the single
//!     exception is `Semaphore::release_after_ack`.
//!   - A channel buffer is written only in the state that grants the writer ownership.

#![forbid(unsafe_code)]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod area;
pub mod channel;
pub mod config;
pub mod doorbell;
mod error;
pub mod mailbox;
pub mod state;

#[cfg(feature = "backend-host")]
pub mod sim;

pub use area::{ChannelArea, MsgFlags, MSG_DATA_MIN_SZ, MSG_SZ};
pub use channel::{Channel, ChannelRole, NR_CHANNELS, NR_CPUS};
pub use config::MailConfig;
pub use error::{MailError, Result};
pub use mailbox::{MailOps, T210Mailbox};
pub use state::{ChannelState, Semaphore};

#[cfg(feature = "std")]
pub use config::ConfigError;
