//! Trait definitions for the capability layer.

use async_trait::async_trait;

use super::types::{EncoderCapability, Platform};

/// Reports which encoders the current platform/build can run.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    /// Returns the platform family.
    fn platform(&self) -> Platform;

    /// Lists available video encoders. Called once per probe.
    async fn list_available_encoders(&self) -> Vec<EncoderCapability>;
}

/// A provider answering from a fixed encoder list.
///
/// Useful for hosts that already know their encoders, and for tests that
/// simulate a platform.
#[derive(Debug, Clone)]
pub struct StaticCapabilityProvider {
    platform: Platform,
    encoders: Vec<EncoderCapability>,
}

impl StaticCapabilityProvider {
    /// Creates a provider for `platform` with the named encoders.
    pub fn new<I, S>(platform: Platform, encoders: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            platform,
            encoders: encoders.into_iter().map(EncoderCapability::new).collect(),
        }
    }

    /// A provider with no encoders at all.
    pub fn empty(platform: Platform) -> Self {
        Self {
            platform,
            encoders: Vec::new(),
        }
    }
}

#[async_trait]
impl CapabilityProvider for StaticCapabilityProvider {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn list_available_encoders(&self) -> Vec<EncoderCapability> {
        self.encoders.clone()
    }
}
