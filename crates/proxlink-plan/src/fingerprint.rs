use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::slot::{ContactSlot, Encoding, SlotPlan};

const DOMAIN: &[u8] = b"proxlink/geometry/v1";

/// Role-independent digest of a link's slot geometry.
///
/// Two compiled participants can only interoperate when their fingerprints
/// match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(pub u64);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl SlotPlan {
    /// First 8 bytes of SHA-256 over names, positions and codebook sizes.
    pub fn fingerprint(&self) -> Fingerprint {
        let mut hasher = Sha256::new();
        hasher.update(DOMAIN);
        update_str(&mut hasher, &self.link);
        hasher.update(self.base_offset.to_le_bytes());
        hasher.update(self.slot_spacing.to_le_bytes());

        for signal in &self.signals {
            update_str(&mut hasher, &signal.name);
            update_str(&mut hasher, signal.layer.as_str());
            hasher.update(signal.min.to_le_bytes());
            hasher.update(signal.max.to_le_bytes());
            hasher.update([signal.sender as u8]);
            let groups = match signal.encoding {
                Encoding::Direct => 0,
                Encoding::Nibbles { groups } => groups,
            };
            hasher.update([groups]);
        }

        let mut slots = self.slots();
        slots.sort_by_key(|slot| slot.position);
        for slot in slots {
            update_slot(&mut hasher, slot);
        }

        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Fingerprint(u64::from_be_bytes(bytes))
    }
}

fn update_str(hasher: &mut Sha256, value: &str) {
    hasher.update((value.len() as u32).to_le_bytes());
    hasher.update(value.as_bytes());
}

fn update_slot(hasher: &mut Sha256, slot: &ContactSlot) {
    update_str(hasher, &slot.name);
    hasher.update(slot.position.to_le_bytes());
    hasher.update(slot.span.to_le_bytes());
    hasher.update((slot.codebook.len() as u32).to_le_bytes());
}
