//! Whether a remote store is configured for this process.

use crate::config::RemoteConfig;

/// Decided once from configuration, never by probing the network. A failing
/// remote call later on does not flip it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    RemoteAvailable,
    LocalOnly,
}

impl Capability {
    pub fn detect(config: &RemoteConfig) -> Self {
        if config.credentials().is_some() {
            Self::RemoteAvailable
        } else {
            Self::LocalOnly
        }
    }

    pub const fn is_remote_available(self) -> bool {
        matches!(self, Self::RemoteAvailable)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::RemoteAvailable => "remote",
            Self::LocalOnly => "local-only",
        }
    }
}
