// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Doorbell bridge: outbound notifications and per-core inbound handlers.

use alloc::sync::Arc;

use log::{error, info, trace};
use tegra_hal::{Doorbell, IrqBinding, IrqHandler};

use crate::channel::{ib_channel, NR_CPUS};
use crate::error::{MailError, Result};

/// Doorbell line the BPMP listens on for CPU notifications.
pub const CPU_OB_DOORBELL: u32 = 4;

pub struct IrqBridge<D: Doorbell> {
    doorbell: D,
    line: u32,
}

impl<D: Doorbell> IrqBridge<D> {
    pub fn new(doorbell: D, line: u32) -> Self {
        Self { doorbell, line }
    }

    pub fn line(&self) -> u32 {
        self.line
    }

    pub fn substrate(&self) -> &D {
        &self.doorbell
    }

    /// Wakes the BPMP. Every outbound channel shares one line, so `ch` only
    /// shows up in traces.
    pub fn ring(&self, ch: usize) {
        trace!("bpmp-t210: ring line {} for ch{ch}", self.line);
        self.doorbell.ring(self.line);
    }

    /// Binds `handler` to each core's inbound channel.
    ///
    /// Stops at the first core the substrate refuses and reports it.
    pub fn register_all(&self, handler: Arc<dyn IrqHandler>) -> Result<()> {
        for core in 0..NR_CPUS {
            let binding = IrqBinding::new(handler.clone(), ib_channel(core));
            if let Err(err) = self.doorbell.register(core, binding) {
                error!("bpmp-t210: doorbell registration on cpu{core} failed: {err}");
                return Err(MailError::IrqRegistration { core, error: err });
            }
        }
        info!("bpmp-t210: doorbell handlers installed on {NR_CPUS} cpus");
        Ok(())
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tegra_hal::DoorbellError;

    #[derive(Default)]
    struct Recorder {
        rings: Mutex<Vec<u32>>,
        bound: Mutex<Vec<(usize, usize)>>,
        refuse: Option<usize>,
    }

    impl Doorbell for Recorder {
        fn ring(&self, line: u32) {
            self.rings.lock().unwrap().push(line);
        }

        fn register(&self, core: usize, binding: IrqBinding) -> core::result::Result<(), DoorbellError> {
            if self.refuse == Some(core) {
                return Err(DoorbellError::Code(-22));
            }
            self.bound.lock().unwrap().push((core, binding.channel()));
            Ok(())
        }
    }

    struct Nop;

    impl IrqHandler for Nop {
        fn handle(&self, _channel: usize) {}
    }

    #[test]
    fn ring_ignores_channel() {
        let bridge = IrqBridge::new(Recorder::default(), CPU_OB_DOORBELL);
        bridge.ring(0);
        bridge.ring(7);
        assert_eq!(*bridge.substrate().rings.lock().unwrap(), vec![4, 4]);
    }

    #[test]
    fn registers_inbound_channel_per_core() {
        let bridge = IrqBridge::new(Recorder::default(), CPU_OB_DOORBELL);
        bridge.register_all(Arc::new(Nop)).unwrap();
        assert_eq!(*bridge.substrate().bound.lock().unwrap(), vec![(0, 8), (1, 9), (2, 10), (3, 11)]);
    }

    #[test]
    fn first_refusal_aborts() {
        let recorder = Recorder { refuse: Some(1), ..Recorder::default() };
        let bridge = IrqBridge::new(recorder, CPU_OB_DOORBELL);
        let err = bridge.register_all(Arc::new(Nop)).unwrap_err();
        assert_eq!(err, MailError::IrqRegistration { core: 1, error: DoorbellError::Code(-22) });
        assert_eq!(*bridge.substrate().bound.lock().unwrap(), vec![(0, 8)]);
    }
}
