//! Events emitted by a provider while a generation runs.

use genstudio_core::types::ArtifactRef;

/// One step of a running generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// Coarse provider-reported completion percentage (0-100).
    Progress { percent: u8 },

    /// A finished output. Image generations emit one per image.
    Artifact(ArtifactRef),
}
