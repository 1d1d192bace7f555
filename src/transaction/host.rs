// src/transaction/host.rs

//! Hook into the host application's action list

use crate::error::Result;
use crate::registry::RegistryFile;
use tracing::debug;

/// Registers installed files with the host
///
/// Called for every file of an installed package that belongs to at least
/// one host section, and for every such file of a remote being enabled or
/// disabled.
pub trait HostIntegration {
    fn register(&mut self, file: &RegistryFile, enable: bool) -> Result<()>;
}

/// Host without an action list
#[derive(Debug, Default)]
pub struct NoopHost;

impl HostIntegration for NoopHost {
    fn register(&mut self, file: &RegistryFile, enable: bool) -> Result<()> {
        debug!(
            "{} {} (sections: {})",
            if enable { "Registering" } else { "Unregistering" },
            file.path,
            file.sections
        );
        Ok(())
    }
}
