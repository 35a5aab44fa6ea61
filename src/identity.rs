use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::models::{LegislatorVoteLedger, RegistryEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    Canonical(&'a str),
    /// Not in the registry; the raw id is used as-is.
    Unresolved(&'a str),
}

impl<'a> Resolution<'a> {
    pub fn id(&self) -> &'a str {
        match *self {
            Resolution::Canonical(id) | Resolution::Unresolved(id) => id,
        }
    }
}

/// Immutable alias table, built once per run.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    aliases: HashMap<String, String>,
    current: HashSet<String>,
}

impl IdentityMap {
    pub fn from_registry(entries: &[RegistryEntry]) -> Self {
        let mut map = Self::default();
        let mut conflicts = 0usize;

        for entry in entries {
            let canonical = entry.member_id.trim();
            if canonical.is_empty() {
                warn!("Registry entry without member_id skipped - bioguide={:?}, lis={:?}", entry.bioguide, entry.lis);
                continue;
            }

            let aliases = std::iter::once(canonical)
                .chain(entry.bioguide.as_deref())
                .chain(entry.lis.as_deref())
                .map(str::trim)
                .filter(|a| !a.is_empty());

            for alias in aliases {
                if let Some(prev) = map.aliases.insert(alias.to_string(), canonical.to_string()) {
                    if prev != canonical {
                        conflicts += 1;
                        warn!("Alias claimed twice - alias={}, previous={}, now={}", alias, prev, canonical);
                    }
                }
            }

            if entry.current {
                map.current.insert(canonical.to_string());
            }
        }

        info!(
            "Identity map built - aliases={}, legislators={}, current={}, conflicts={}",
            map.aliases.len(),
            entries.len(),
            map.current.len(),
            conflicts
        );
        map
    }

    pub fn resolve<'a>(&'a self, raw: &'a str) -> Resolution<'a> {
        match self.aliases.get(raw) {
            Some(id) => Resolution::Canonical(id.as_str()),
            None => Resolution::Unresolved(raw),
        }
    }

    /// Canonical id, or the raw id when the registry doesn't know it.
    pub fn canonical<'a>(&'a self, raw: &'a str) -> &'a str {
        self.resolve(raw).id()
    }

    pub fn is_current(&self, member_id: &str) -> bool {
        self.current.contains(self.canonical(member_id))
    }

    pub fn current_members(&self) -> &HashSet<String> {
        &self.current
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

/// Re-key ledgers by canonical id, folding alias ledgers into one.
///
/// Identity fields come from the first ledger seen for a legislator; votes
/// keep their input order.
pub fn merge_ledgers(ledgers: Vec<LegislatorVoteLedger>, ids: &IdentityMap) -> Vec<LegislatorVoteLedger> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<LegislatorVoteLedger> = Vec::with_capacity(ledgers.len());
    let mut unresolved = 0usize;
    let mut folded = 0usize;

    for mut ledger in ledgers {
        let canonical = match ids.resolve(&ledger.member_id) {
            Resolution::Canonical(id) => id.to_string(),
            Resolution::Unresolved(raw) => {
                unresolved += 1;
                debug!("Member id not in registry, using raw id - member_id={}", raw);
                raw.to_string()
            }
        };

        match index.get(&canonical) {
            Some(&i) => {
                folded += 1;
                merged[i].votes.append(&mut ledger.votes);
            }
            None => {
                ledger.member_id = canonical.clone();
                index.insert(canonical, merged.len());
                merged.push(ledger);
            }
        }
    }

    if unresolved > 0 {
        info!("Ledger ids outside the registry - unresolved={}, kept raw", unresolved);
    }
    debug!("Ledgers merged - legislators={}, folded_aliases={}", merged.len(), folded);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BillRef, VoteRecord};

    fn entry(member_id: &str, bioguide: Option<&str>, lis: Option<&str>, current: bool) -> RegistryEntry {
        RegistryEntry {
            member_id: member_id.into(),
            bioguide: bioguide.map(Into::into),
            lis: lis.map(Into::into),
            current,
        }
    }

    fn ledger(member_id: &str, name: &str, bills: &[u32]) -> LegislatorVoteLedger {
        LegislatorVoteLedger {
            member_id: member_id.into(),
            name: name.into(),
            party: "D".into(),
            state: "CA".into(),
            votes: bills
                .iter()
                .map(|&n| VoteRecord {
                    vote_id: None,
                    bill: BillRef { congress: 119, number: n, bill_type: "hr".into() },
                    vote: "Yea".into(),
                })
                .collect(),
        }
    }

    #[test]
    fn test_aliases_resolve_to_canonical() {
        let ids = IdentityMap::from_registry(&[entry("S313", Some("B001230"), Some("S313"), true)]);

        assert_eq!(ids.resolve("B001230"), Resolution::Canonical("S313"));
        assert_eq!(ids.resolve("S313"), Resolution::Canonical("S313"));
        assert!(ids.is_current("B001230"));
    }

    #[test]
    fn test_unknown_id_falls_back_to_raw() {
        let ids = IdentityMap::from_registry(&[entry("S313", Some("B001230"), None, false)]);
        assert_eq!(ids.resolve("Z999999"), Resolution::Unresolved("Z999999"));
        assert_eq!(ids.canonical("Z999999"), "Z999999");
        assert!(!ids.is_current("Z999999"));
    }

    #[test]
    fn test_blank_member_id_skipped() {
        let ids = IdentityMap::from_registry(&[entry("  ", Some("B001230"), None, true)]);
        assert!(ids.is_empty());
        assert!(ids.current_members().is_empty());
    }

    #[test]
    fn test_alias_ledgers_fold_into_canonical() {
        let ids = IdentityMap::from_registry(&[entry("S313", Some("B001230"), Some("S313"), true)]);
        let ledgers = vec![
            ledger("B001230", "Rep. Baldwin", &[1, 2]),
            ledger("A000360", "Rep. Other", &[1]),
            ledger("S313", "Sen. Baldwin", &[3]),
        ];

        let merged = merge_ledgers(ledgers, &ids);
        assert_eq!(merged.len(), 2);

        let baldwin = merged.iter().find(|l| l.member_id == "S313").unwrap();
        assert_eq!(baldwin.name, "Rep. Baldwin");
        let numbers: Vec<u32> = baldwin.votes.iter().map(|v| v.bill.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        assert!(merged.iter().any(|l| l.member_id == "A000360"));
    }
}
