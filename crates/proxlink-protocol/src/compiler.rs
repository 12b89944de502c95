use std::collections::BTreeMap;

use proxlink_plan::{allocate, plan_phases, Fingerprint, Ownership, SignalPlan};
use proxlink_spec::{LinkConfig, LinkSpec, Role};
use tracing::{debug, warn};

use crate::artifact::{Artifact, ArtifactEntry, ArtifactId, ParameterDirection, ParameterEntry};
use crate::error::{LinkError, Result};
use crate::layer::{build_layer, build_presence_layer};

/// Entries changed by [`rebuild`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub inserted: Vec<ArtifactId>,
    pub replaced: Vec<ArtifactId>,
    pub unchanged: Vec<ArtifactId>,
    pub pruned: Vec<ArtifactId>,
}

impl RebuildReport {
    /// True when the rebuild left the artifact untouched.
    pub fn is_noop(&self) -> bool {
        self.inserted.is_empty() && self.replaced.is_empty() && self.pruned.is_empty()
    }
}

/// Compile `spec` for the transmitter with default timing.
pub fn compile_transmitter(spec: &LinkSpec) -> Result<Artifact> {
    compile(spec, &LinkConfig::default(), Role::Transmitter)
}

/// Compile `spec` for the transmitter with explicit timing.
pub fn compile_transmitter_with_config(spec: &LinkSpec, config: &LinkConfig) -> Result<Artifact> {
    compile(spec, config, Role::Transmitter)
}

/// Compile `spec` for the receiver with default timing.
pub fn compile_receiver(spec: &LinkSpec) -> Result<Artifact> {
    compile(spec, &LinkConfig::default(), Role::Receiver)
}

/// Compile `spec` for the receiver with explicit timing.
pub fn compile_receiver_with_config(spec: &LinkSpec, config: &LinkConfig) -> Result<Artifact> {
    compile(spec, config, Role::Receiver)
}

/// Compile `spec` for `role`.
pub fn compile(spec: &LinkSpec, config: &LinkConfig, role: Role) -> Result<Artifact> {
    let (fingerprint, entries) = build_entries(spec, config, role)?;
    let artifact = Artifact::new(role, spec.name.clone(), fingerprint, *config, entries);
    debug!(
        link = %artifact.link,
        %role,
        %fingerprint,
        entries = artifact.entries().len(),
        "artifact compiled"
    );
    Ok(artifact)
}

fn build_entries(
    spec: &LinkSpec,
    config: &LinkConfig,
    role: Role,
) -> Result<(Fingerprint, BTreeMap<ArtifactId, ArtifactEntry>)> {
    let plan = allocate(spec, config, role)?;
    let phases = plan_phases(&plan, config);
    let fingerprint = plan.fingerprint();

    let mut entries = BTreeMap::new();
    entries.insert(
        ArtifactId::presence(),
        ArtifactEntry::Layer(build_presence_layer(config)),
    );
    for signal in &plan.signals {
        entries.insert(
            ArtifactId::layer(&signal.name),
            ArtifactEntry::Layer(build_layer(signal, config)),
        );
        entries.insert(
            ArtifactId::parameter(&signal.name, ParameterDirection::Out),
            ArtifactEntry::Parameter(parameter(signal, ParameterDirection::Out)),
        );
        if signal.emits_primary() {
            entries.insert(
                ArtifactId::parameter(&signal.name, ParameterDirection::In),
                ArtifactEntry::Parameter(parameter(signal, ParameterDirection::In)),
            );
        }
    }
    entries.insert(ArtifactId::phases(), ArtifactEntry::Phases(phases));
    entries.insert(ArtifactId::plan(), ArtifactEntry::Plan(plan));

    Ok((fingerprint, entries))
}

fn parameter(signal: &SignalPlan, direction: ParameterDirection) -> ParameterEntry {
    ParameterEntry {
        signal: signal.name.clone(),
        direction,
        min: signal.min,
        max: signal.max,
        default: signal.default,
    }
}

/// Recompile `artifact` from `spec` in place.
///
/// Entries whose content is unchanged are left alone, changed entries are
/// replaced, new ones inserted, and entries the new spec no longer produces
/// are pruned. Fails without touching the artifact if signals that survive
/// the change were reordered.
pub fn rebuild(artifact: &mut Artifact, spec: &LinkSpec) -> Result<RebuildReport> {
    if let Some(plan) = artifact.plan() {
        let surviving: Vec<&str> = plan
            .signals
            .iter()
            .map(|signal| signal.name.as_str())
            .filter(|name| spec.signal(name).is_some())
            .collect();
        let fresh: Vec<&str> = spec
            .signals
            .iter()
            .map(|signal| signal.name.as_str())
            .filter(|name| surviving.contains(name))
            .collect();
        if surviving != fresh {
            warn!(link = %artifact.link, "rebuild would reorder existing signals");
            return Err(LinkError::DesynchronizationRisk(format!(
                "signal order changed from {surviving:?} to {fresh:?}"
            )));
        }
    }

    let config = artifact.config;
    let (fingerprint, fresh) = build_entries(spec, &config, artifact.role)?;
    let mut report = RebuildReport::default();

    let entries = artifact.entries_mut();
    let stale: Vec<ArtifactId> = entries
        .keys()
        .filter(|id| !fresh.contains_key(*id))
        .cloned()
        .collect();
    for id in stale {
        entries.remove(&id);
        report.pruned.push(id);
    }
    for (id, entry) in fresh {
        match entries.get(&id) {
            Some(existing) if *existing == entry => report.unchanged.push(id),
            Some(_) => {
                entries.insert(id.clone(), entry);
                report.replaced.push(id);
            }
            None => {
                entries.insert(id.clone(), entry);
                report.inserted.push(id);
            }
        }
    }

    artifact.link = spec.name.clone();
    artifact.fingerprint = fingerprint;
    debug!(
        link = %artifact.link,
        inserted = report.inserted.len(),
        replaced = report.replaced.len(),
        pruned = report.pruned.len(),
        "artifact rebuilt"
    );
    Ok(report)
}

/// Check that two artifacts form a working link.
pub fn verify_pair(transmitter: &Artifact, receiver: &Artifact) -> Result<()> {
    let risk = |message: String| {
        warn!(%message, "artifact pair mismatch");
        Err(LinkError::DesynchronizationRisk(message))
    };

    if transmitter.role != Role::Transmitter || receiver.role != Role::Receiver {
        return risk(format!(
            "expected transmitter/receiver, got {}/{}",
            transmitter.role, receiver.role
        ));
    }
    if transmitter.fingerprint != receiver.fingerprint {
        return risk(format!(
            "fingerprints differ: {} vs {}",
            transmitter.fingerprint, receiver.fingerprint
        ));
    }
    if transmitter.config != receiver.config {
        return risk("link timing differs between roles".to_string());
    }

    let (Some(tx), Some(rx)) = (transmitter.plan(), receiver.plan()) else {
        return Err(LinkError::InvalidArtifact("missing plan entry".to_string()));
    };

    let tx_names: Vec<&str> = tx.signals.iter().map(|s| s.name.as_str()).collect();
    let rx_names: Vec<&str> = rx.signals.iter().map(|s| s.name.as_str()).collect();
    if tx_names != rx_names {
        return risk(format!("signal order differs: {tx_names:?} vs {rx_names:?}"));
    }

    let tx_slots = tx.slots();
    let rx_slots = rx.slots();
    if tx_slots.len() != rx_slots.len() {
        return risk("slot counts differ".to_string());
    }
    for (a, b) in tx_slots.iter().zip(&rx_slots) {
        if a.position != b.position || a.codebook != b.codebook {
            return risk(format!("slot '{}' geometry differs", a.name));
        }
        let complementary = matches!(
            (a.ownership, b.ownership),
            (Ownership::Emit, Ownership::Sense) | (Ownership::Sense, Ownership::Emit)
        );
        if !complementary {
            return risk(format!("slot '{}' has no single owner", a.name));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxlink_spec::Signal;

    fn spec() -> LinkSpec {
        LinkSpec::new("hands")
            .with_signal(Signal::bool("grip"))
            .with_signal(Signal::bounded("slider", 0, 255).two_way())
    }

    #[test]
    fn compile_produces_expected_entries() {
        let artifact = compile_transmitter(&spec()).unwrap();
        let ids: Vec<&str> = artifact.entries().keys().map(|id| id.as_str()).collect();
        assert_eq!(
            ids,
            vec![
                "layer/@presence",
                "layer/grip",
                "layer/slider",
                "param/grip/in",
                "param/grip/out",
                "param/slider/in",
                "param/slider/out",
                "phases",
                "plan",
            ]
        );
        artifact.validate().unwrap();

        let receiver = compile_receiver(&spec()).unwrap();
        assert!(receiver
            .get(&ArtifactId::parameter("grip", ParameterDirection::In))
            .is_none());
    }

    #[test]
    fn compile_is_deterministic() {
        let a = compile_receiver(&spec()).unwrap().encode().unwrap();
        let b = compile_receiver(&spec()).unwrap().encode().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rebuild_with_same_spec_is_noop() {
        let mut artifact = compile_transmitter(&spec()).unwrap();
        let before = artifact.encode().unwrap();
        let report = rebuild(&mut artifact, &spec()).unwrap();
        assert!(report.is_noop());
        assert_eq!(report.unchanged.len(), artifact.entries().len());
        assert_eq!(artifact.encode().unwrap(), before);
    }

    #[test]
    fn rebuild_inserts_replaces_and_prunes() {
        let mut artifact = compile_transmitter(&spec()).unwrap();
        let changed = LinkSpec::new("hands")
            .with_signal(Signal::bool("grip"))
            .with_signal(Signal::bounded("wave", 0, 3));

        let report = rebuild(&mut artifact, &changed).unwrap();
        assert!(report.pruned.contains(&ArtifactId::layer("slider")));
        assert!(report.inserted.contains(&ArtifactId::layer("wave")));
        assert!(report.replaced.contains(&ArtifactId::plan()));
        assert!(report.unchanged.contains(&ArtifactId::layer("grip")));
        assert!(artifact.layer("slider").is_none());

        let fresh = compile_transmitter(&changed).unwrap();
        assert_eq!(artifact, fresh);
    }

    #[test]
    fn rebuild_refuses_reordering() {
        let mut artifact = compile_transmitter(&spec()).unwrap();
        let reordered = LinkSpec::new("hands")
            .with_signal(Signal::bounded("slider", 0, 255).two_way())
            .with_signal(Signal::bool("grip"));
        let err = rebuild(&mut artifact, &reordered).unwrap_err();
        assert!(matches!(err, LinkError::DesynchronizationRisk(_)));
        assert_eq!(artifact, compile_transmitter(&spec()).unwrap());
    }

    #[test]
    fn verify_pair_accepts_matching_roles() {
        let tx = compile_transmitter(&spec()).unwrap();
        let rx = compile_receiver(&spec()).unwrap();
        verify_pair(&tx, &rx).unwrap();
        assert!(matches!(
            verify_pair(&rx, &tx),
            Err(LinkError::DesynchronizationRisk(_))
        ));
    }

    #[test]
    fn verify_pair_flags_diverging_specs() {
        let tx = compile_transmitter(&spec()).unwrap();
        let rx = compile_receiver(&spec().with_signal(Signal::bool("extra"))).unwrap();
        assert!(matches!(
            verify_pair(&tx, &rx),
            Err(LinkError::DesynchronizationRisk(_))
        ));

        let slow = LinkConfig {
            stable_ticks: 3,
            ..LinkConfig::default()
        };
        let rx = compile_receiver_with_config(&spec(), &slow).unwrap();
        assert!(matches!(
            verify_pair(&tx, &rx),
            Err(LinkError::DesynchronizationRisk(_))
        ));
    }
}
