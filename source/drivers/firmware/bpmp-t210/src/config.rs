// Copyright 2026 Open Nexus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Bring-up configuration.
//!
//! Defaults describe the T210 layout; a TOML file may override individual
//! keys on the host backend:
//!
//! ```toml
//! atomics_resource = 0
//! semaphore_resource = 1
//! doorbell_line = 4
//! area_window = 0x80
//! ```

use crate::area::MSG_SZ;
use crate::doorbell::CPU_OB_DOORBELL;
use crate::error::MailError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(serde::Deserialize))]
#[cfg_attr(feature = "std", serde(default, deny_unknown_fields))]
pub struct MailConfig {
    /// Resource index of the atomics (discovery) block.
    pub atomics_resource: usize,
    /// Resource index of the arbitration semaphore block.
    pub semaphore_resource: usize,
    /// Doorbell line rung for outbound notifications.
    pub doorbell_line: u32,
    /// Bytes mapped for each channel area.
    pub area_window: usize,
}

impl MailConfig {
    pub const T210: Self = Self {
        atomics_resource: 0,
        semaphore_resource: 1,
        doorbell_line: CPU_OB_DOORBELL,
        area_window: 0x80,
    };

    pub fn validate(&self) -> Result<(), MailError> {
        if self.area_window < MSG_SZ {
            return Err(MailError::WindowTooSmall { window: self.area_window, min: MSG_SZ });
        }
        Ok(())
    }
}

impl Default for MailConfig {
    fn default() -> Self {
        Self::T210
    }
}

#[cfg(feature = "std")]
mod load {
    use std::fs;
    use std::path::{Path, PathBuf};

    use thiserror::Error;

    use super::MailConfig;
    use crate::error::MailError;

    #[derive(Debug, Error)]
    pub enum ConfigError {
        #[error("failed to read mailbox config {path}: {source}")]
        Read {
            path: PathBuf,
            #[source]
            source: std::io::Error,
        },
        #[error("failed to parse mailbox config: {0}")]
        Parse(#[from] toml::de::Error),
        #[error("invalid mailbox config: {0}")]
        Invalid(#[from] MailError),
    }

    impl MailConfig {
        pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
            let config: MailConfig = toml::from_str(input)?;
            config.validate()?;
            Ok(config)
        }

        pub fn load(path: &Path) -> Result<Self, ConfigError> {
            let data = fs::read_to_string(path)
                .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
            Self::from_toml_str(&data)
        }
    }
}

#[cfg(feature = "std")]
pub use load::ConfigError;
