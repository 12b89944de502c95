use std::collections::BTreeMap;
use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use proxlink_plan::{Fingerprint, PhasePlan, SlotPlan, PRESENCE_PARAMETER};
use proxlink_spec::{LinkConfig, Role};
use serde::{Deserialize, Serialize};

use crate::description::StateMachineDescription;
use crate::error::{LinkError, Result};

/// Artifact header: magic (2) + version (1) + role (1) + length (4) = 8 bytes.
pub const HEADER_SIZE: usize = 8;

/// Magic bytes: "PL" (0x50 0x4C).
pub const MAGIC: [u8; 2] = [0x50, 0x4C];

/// Current artifact format version.
pub const FORMAT_VERSION: u8 = 1;

/// Stable logical name of an artifact entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn plan() -> Self {
        Self("plan".to_string())
    }

    pub fn phases() -> Self {
        Self("phases".to_string())
    }

    pub fn layer(signal: &str) -> Self {
        Self(format!("layer/{signal}"))
    }

    pub fn presence() -> Self {
        Self::layer(PRESENCE_PARAMETER)
    }

    pub fn parameter(signal: &str, direction: ParameterDirection) -> Self {
        Self(format!("param/{signal}/{}", direction.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterDirection {
    /// Written by the host.
    In,
    /// Read by the host.
    Out,
}

impl ParameterDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterDirection::In => "in",
            ParameterDirection::Out => "out",
        }
    }
}

/// A host-visible parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParameterEntry {
    pub signal: String,
    pub direction: ParameterDirection,
    pub min: i32,
    pub max: i32,
    pub default: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactEntry {
    Plan(SlotPlan),
    Phases(PhasePlan),
    Layer(StateMachineDescription),
    Parameter(ParameterEntry),
}

/// Everything one role needs to run a link, keyed by stable ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub role: Role,
    pub link: String,
    pub fingerprint: Fingerprint,
    pub config: LinkConfig,
    entries: BTreeMap<ArtifactId, ArtifactEntry>,
}

impl Artifact {
    pub(crate) fn new(
        role: Role,
        link: String,
        fingerprint: Fingerprint,
        config: LinkConfig,
        entries: BTreeMap<ArtifactId, ArtifactEntry>,
    ) -> Self {
        Self {
            role,
            link,
            fingerprint,
            config,
            entries,
        }
    }

    pub fn entries(&self) -> &BTreeMap<ArtifactId, ArtifactEntry> {
        &self.entries
    }

    pub(crate) fn entries_mut(&mut self) -> &mut BTreeMap<ArtifactId, ArtifactEntry> {
        &mut self.entries
    }

    pub fn get(&self, id: &ArtifactId) -> Option<&ArtifactEntry> {
        self.entries.get(id)
    }

    pub fn plan(&self) -> Option<&SlotPlan> {
        match self.entries.get(&ArtifactId::plan()) {
            Some(ArtifactEntry::Plan(plan)) => Some(plan),
            _ => None,
        }
    }

    pub fn phases(&self) -> Option<&PhasePlan> {
        match self.entries.get(&ArtifactId::phases()) {
            Some(ArtifactEntry::Phases(phases)) => Some(phases),
            _ => None,
        }
    }

    pub fn layer(&self, signal: &str) -> Option<&StateMachineDescription> {
        match self.entries.get(&ArtifactId::layer(signal)) {
            Some(ArtifactEntry::Layer(layer)) => Some(layer),
            _ => None,
        }
    }

    pub fn presence_layer(&self) -> Option<&StateMachineDescription> {
        self.layer(PRESENCE_PARAMETER)
    }

    pub fn parameters(&self) -> impl Iterator<Item = &ParameterEntry> {
        self.entries.values().filter_map(|entry| match entry {
            ArtifactEntry::Parameter(parameter) => Some(parameter),
            _ => None,
        })
    }

    /// Check that every entry the runtime needs is present and consistent.
    pub fn validate(&self) -> Result<()> {
        let invalid = |message: String| Err(LinkError::InvalidArtifact(message));

        let Some(plan) = self.plan() else {
            return invalid("missing plan entry".to_string());
        };
        if self.phases().is_none() {
            return invalid("missing phases entry".to_string());
        }
        if plan.role != self.role {
            return invalid(format!(
                "plan compiled for {} but artifact is {}",
                plan.role, self.role
            ));
        }
        if plan.fingerprint() != self.fingerprint {
            return invalid(format!(
                "fingerprint {} does not match plan {}",
                self.fingerprint,
                plan.fingerprint()
            ));
        }

        let presence = self.presence_layer();
        if !presence.is_some_and(StateMachineDescription::is_closed) {
            return invalid("missing or malformed presence layer".to_string());
        }
        for signal in &plan.signals {
            if !self
                .layer(&signal.name)
                .is_some_and(StateMachineDescription::is_closed)
            {
                return invalid(format!("missing or malformed layer for '{}'", signal.name));
            }
        }
        Ok(())
    }

    /// Serialize into the deterministic binary image.
    ///
    /// Wire format:
    /// ```text
    /// ┌────────────┬─────────┬──────┬───────────┬──────────────────┐
    /// │ Magic (2B) │ Version │ Role │ Length    │ Payload (JSON)   │
    /// │ 0x50 0x4C  │ (1B)    │ (1B) │ (4B LE)   │ (Length bytes)   │
    /// └────────────┴─────────┴──────┴───────────┴──────────────────┘
    /// ```
    pub fn encode(&self) -> Result<Bytes> {
        let payload = serde_json::to_vec(self)?;
        let length = u32::try_from(payload.len()).map_err(|_| {
            LinkError::InvalidArtifact(format!("payload too large ({} bytes)", payload.len()))
        })?;

        let mut dst = BytesMut::with_capacity(HEADER_SIZE + payload.len());
        dst.put_slice(&MAGIC);
        dst.put_u8(FORMAT_VERSION);
        dst.put_u8(role_byte(self.role));
        dst.put_u32_le(length);
        dst.put_slice(&payload);
        Ok(dst.freeze())
    }

    /// Parse and validate a binary image produced by [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(LinkError::InvalidArtifact(format!(
                "truncated header ({} bytes)",
                bytes.len()
            )));
        }

        let mut src = bytes;
        let mut magic = [0u8; 2];
        src.copy_to_slice(&mut magic);
        if magic != MAGIC {
            return Err(LinkError::InvalidArtifact(
                "invalid magic (expected 0x504C \"PL\")".to_string(),
            ));
        }
        let version = src.get_u8();
        if version != FORMAT_VERSION {
            return Err(LinkError::InvalidArtifact(format!(
                "unsupported format version {version}"
            )));
        }
        let role = match src.get_u8() {
            0 => Role::Transmitter,
            1 => Role::Receiver,
            other => {
                return Err(LinkError::InvalidArtifact(format!("unknown role byte {other}")));
            }
        };
        let length = src.get_u32_le() as usize;
        if src.remaining() != length {
            return Err(LinkError::InvalidArtifact(format!(
                "payload length {} does not match header {length}",
                src.remaining()
            )));
        }

        let artifact: Artifact = serde_json::from_slice(src)?;
        if artifact.role != role {
            return Err(LinkError::InvalidArtifact(format!(
                "header role {role} does not match payload role {}",
                artifact.role
            )));
        }
        artifact.validate()?;
        Ok(artifact)
    }
}

fn role_byte(role: Role) -> u8 {
    match role {
        Role::Transmitter => 0,
        Role::Receiver => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{compile_receiver, compile_transmitter};
    use proxlink_spec::{LinkSpec, Signal};

    fn spec() -> LinkSpec {
        LinkSpec::new("hands")
            .with_signal(Signal::bool("grip"))
            .with_signal(Signal::bounded("slider", 0, 255).two_way())
    }

    #[test]
    fn ids_are_stable_strings() {
        assert_eq!(ArtifactId::presence().as_str(), "layer/@presence");
        assert_eq!(
            ArtifactId::parameter("grip", ParameterDirection::In).to_string(),
            "param/grip/in"
        );
    }

    #[test]
    fn encoded_image_has_header() {
        let artifact = compile_receiver(&spec()).unwrap();
        let bytes = artifact.encode().unwrap();
        assert_eq!(&bytes[..2], &MAGIC);
        assert_eq!(bytes[2], FORMAT_VERSION);
        assert_eq!(bytes[3], 1);
        let length = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        assert_eq!(bytes.len(), HEADER_SIZE + length);

        let decoded = Artifact::decode(&bytes).unwrap();
        assert_eq!(decoded, artifact);
    }

    #[test]
    fn rejects_corrupted_images() {
        let bytes = compile_transmitter(&spec()).unwrap().encode().unwrap();

        let mut bad_magic = bytes.to_vec();
        bad_magic[0] = 0xFF;
        assert!(matches!(
            Artifact::decode(&bad_magic),
            Err(LinkError::InvalidArtifact(_))
        ));

        let mut bad_role = bytes.to_vec();
        bad_role[3] = 1;
        assert!(matches!(
            Artifact::decode(&bad_role),
            Err(LinkError::InvalidArtifact(_))
        ));

        let truncated = &bytes[..bytes.len() - 1];
        assert!(matches!(
            Artifact::decode(truncated),
            Err(LinkError::InvalidArtifact(_))
        ));

        assert!(matches!(
            Artifact::decode(&bytes[..4]),
            Err(LinkError::InvalidArtifact(_))
        ));
    }

    #[test]
    fn validate_catches_missing_layers() {
        let mut artifact = compile_transmitter(&spec()).unwrap();
        artifact.entries_mut().remove(&ArtifactId::layer("grip"));
        assert!(matches!(
            artifact.validate(),
            Err(LinkError::InvalidArtifact(message)) if message.contains("grip")
        ));
    }
}
