use std::collections::HashSet;

use crate::error::{DnsPodError, DnsPodResult};

/// A domain hosted in the DNSPod account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    pub id: u64,
    pub name: String,
}

/// Snapshot of the account's zones, taken once per client.
///
/// Zones are kept longest name first so that overlapping zones
/// (`example.com` and `sub.example.com`) always resolve to the most
/// specific one.
#[derive(Debug, Clone, Default)]
pub struct ZoneMap {
    zones: Vec<Zone>,
}

impl ZoneMap {
    pub fn new<I>(zones: I) -> Self
    where
        I: IntoIterator<Item = Zone>,
    {
        let mut seen = HashSet::new();
        let mut zones: Vec<Zone> = zones
            .into_iter()
            .map(|zone| Zone {
                id: zone.id,
                name: normalize(&zone.name),
            })
            .filter(|zone| !zone.name.is_empty() && seen.insert(zone.name.clone()))
            .collect();

        zones.sort_by(|a, b| b.name.len().cmp(&a.name.len()));
        Self { zones }
    }

    /// Find the zone `fqdn` belongs to.
    pub fn find(&self, fqdn: &str) -> DnsPodResult<&Zone> {
        let fqdn = normalize(fqdn);

        self.zones
            .iter()
            .find(|zone| is_within(&fqdn, &zone.name))
            .ok_or(DnsPodError::ZoneNotFound { domain: fqdn })
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

/// Host label of `fqdn` relative to `zone_name`; empty at the apex.
pub fn subdomain_label(fqdn: &str, zone_name: &str) -> String {
    let fqdn = normalize(fqdn);
    let zone_name = normalize(zone_name);

    if fqdn == zone_name {
        return String::new();
    }

    match fqdn.strip_suffix(&format!(".{}", zone_name)) {
        Some(label) => label.to_string(),
        None => fqdn,
    }
}

/// Lowercase, without the trailing root dot.
pub fn normalize(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

fn is_within(fqdn: &str, zone: &str) -> bool {
    fqdn == zone
        || (fqdn.len() > zone.len()
            && fqdn.ends_with(zone)
            && fqdn.as_bytes()[fqdn.len() - zone.len() - 1] == b'.')
}
