//! Cached capability lookup and encoder fallback resolution.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::request::VideoCodec;

use super::traits::CapabilityProvider;
use super::types::{EncoderCapability, EncoderSelection, Platform, HARDWARE_BACKENDS};

/// Native encoder used when no encoder of the requested family is present.
pub const MPEG4_ENCODER: &str = "mpeg4";

/// Caches the provider's encoder list and resolves encoders from it.
pub struct CapabilityProbe {
    provider: Arc<dyn CapabilityProvider>,
    encoders: OnceCell<Vec<EncoderCapability>>,
}

impl CapabilityProbe {
    pub fn new(provider: Arc<dyn CapabilityProvider>) -> Self {
        Self {
            provider,
            encoders: OnceCell::new(),
        }
    }

    pub fn platform(&self) -> Platform {
        self.provider.platform()
    }

    /// Available encoders; the provider is queried on first use only.
    pub async fn encoders(&self) -> &[EncoderCapability] {
        self.encoders
            .get_or_init(|| async {
                let encoders = self.provider.list_available_encoders().await;
                info!(
                    "Capability probe on {}: {} encoders ({} hardware)",
                    self.provider.platform(),
                    encoders.len(),
                    encoders.iter().filter(|e| e.hardware).count()
                );
                encoders
            })
            .await
    }

    /// Resolves a concrete encoder for `requested`, or `None` if nothing usable exists.
    pub async fn resolve(&self, requested: VideoCodec) -> Option<EncoderSelection> {
        let platform = self.platform();
        let selection = resolve_encoder(platform, self.encoders().await, requested);
        if let Some(reason) = selection.as_ref().and_then(|s| s.fallback_reason.as_ref()) {
            warn!("Encoder fallback for {}: {}", requested, reason);
        }
        selection
    }
}

/// Ordered candidates for `codec` on `platform`, with the codec each produces.
pub fn fallback_chain(platform: Platform, codec: VideoCodec) -> Vec<(String, VideoCodec)> {
    if codec == VideoCodec::Mpeg4 {
        return vec![(MPEG4_ENCODER.to_string(), VideoCodec::Mpeg4)];
    }

    let preferred = platform.preferred_backend();
    let mut chain = vec![(format!("{}_{}", codec.name(), preferred), codec)];

    chain.extend(
        HARDWARE_BACKENDS
            .iter()
            .filter(|backend| **backend != preferred)
            .map(|backend| (format!("{}_{}", codec.name(), backend), codec)),
    );
    chain.extend(
        codec
            .software_encoders()
            .iter()
            .map(|name| (name.to_string(), codec)),
    );
    chain.push((MPEG4_ENCODER.to_string(), VideoCodec::Mpeg4));
    chain
}

/// Picks the first available encoder along the fallback chain.
pub fn resolve_encoder(
    platform: Platform,
    available: &[EncoderCapability],
    requested: VideoCodec,
) -> Option<EncoderSelection> {
    let chain = fallback_chain(platform, requested);
    let preferred = chain.first().map(|(name, _)| name.clone())?;

    let (index, (encoder, effective)) = chain
        .into_iter()
        .enumerate()
        .find(|(_, (name, _))| available.iter().any(|cap| &cap.name == name))?;

    let fallback_reason = if effective != requested {
        Some(format!(
            "no {} encoder in this build ({} unavailable on {}); using {} with -q:v and fast-start",
            requested, preferred, platform, encoder
        ))
    } else if index > 0 {
        Some(format!(
            "{} unavailable on {}; using {}",
            preferred, platform, encoder
        ))
    } else {
        None
    };

    Some(EncoderSelection {
        requested_codec: requested,
        video_encoder: encoder,
        effective_codec: effective,
        fallback_reason,
    })
}
