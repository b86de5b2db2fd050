use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// A single-bit blacklist identifier: bit `n-1` of the 64-bit blacklist
/// bitmap, where `n` is the numeric id bound in the blacklist config file.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct BlacklistId(pub u64);

impl BlacklistId {
    /// Builds the single-bit id for the `n`-th configured blacklist
    /// (1-indexed, matching the source XML's numbering).
    pub fn from_index(n: u32) -> Self {
        debug_assert!(n >= 1 && n <= 64, "blacklist index out of bitmap range");
        BlacklistId(1u64 << (n - 1))
    }

    /// Splits a (possibly multi-bit) bitmap into the single-bit ids it sets.
    pub fn decompose(bitmap: u64) -> Vec<BlacklistId> {
        let mut out = Vec::new();
        let mut remaining = bitmap;
        while remaining != 0 {
            let bit = remaining & remaining.wrapping_neg();
            out.push(BlacklistId(bit));
            remaining &= !bit;
        }
        out
    }
}

impl std::fmt::Display for BlacklistId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entry of the blacklist configuration XML: a numeric id, a human
/// name, a dotted category (e.g. `Intrusion.Botnet`), and the list source.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub id: BlacklistId,
    pub name: String,
    pub category: String,
    pub source: String,
}

/// The full set of named blacklists known to the pipeline.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BlacklistCatalog {
    pub entries: Vec<BlacklistEntry>,
}

impl BlacklistCatalog {
    /// Every blacklist id whose category falls under the botnet
    /// command-and-control umbrella — the activation set for
    /// botnet-target-watch.
    pub fn botnet_ids(&self) -> HashSet<BlacklistId> {
        self.entries
            .iter()
            .filter(|e| e.category.starts_with("Intrusion.Botnet"))
            .map(|e| e.id)
            .collect()
    }

    pub fn find(&self, id: BlacklistId) -> Option<&BlacklistEntry> {
        self.entries.iter().find(|e| e.id == id)
    }
}
