//! Staleness detection for deployment topologies.
//!
//! A stored deployment topology is reused as long as neither its source
//! topology nor any of its placement locations changed since it was last
//! regenerated. A placement location that no longer resolves is a different
//! condition ([`LocationResolution::Invalid`]) and always forces a rebuild from
//! a fresh record.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

use super::DeploymentTopology;
use crate::models::{Location, Topology};

/// Why a deployment topology must be regenerated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StalenessReason {
    /// The deployment topology was never regenerated.
    NeverSynchronized,

    /// The environment now deploys a different source topology.
    TopologyReplaced {
        previous: String,
        current: String,
    },

    /// The source topology changed after the last regeneration.
    TopologyModified {
        synced: DateTime<Utc>,
        modified: DateTime<Utc>,
    },

    /// A placement location changed after the last regeneration.
    LocationModified {
        location_id: String,
        modified: DateTime<Utc>,
    },
}

impl fmt::Display for StalenessReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NeverSynchronized => write!(f, "deployment topology was never synchronized"),
            Self::TopologyReplaced {
                previous,
                current,
            } => write!(f, "source topology changed from '{previous}' to '{current}'"),
            Self::TopologyModified {
                synced,
                modified,
            } => write!(f, "source topology modified at {modified} (synchronized {synced})"),
            Self::LocationModified {
                location_id,
                modified,
            } => write!(f, "location '{location_id}' modified at {modified}"),
        }
    }
}

/// Result of resolving the placement locations of a deployment topology.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationResolution {
    /// Every placement location exists, keyed by group name.
    Resolved(BTreeMap<String, Location>),

    /// Some placement location ids no longer resolve.
    Invalid {
        missing: Vec<String>,
    },
}

/// Pair each group's location id with the locations the catalog returned.
///
/// `found` is keyed by location id and may be partial.
#[must_use]
pub fn resolve_locations(
    location_ids: &BTreeMap<String, String>,
    found: &BTreeMap<String, Location>,
) -> LocationResolution {
    let mut resolved = BTreeMap::new();
    let mut missing = Vec::new();

    for (group, location_id) in location_ids {
        match found.get(location_id) {
            Some(location) => {
                resolved.insert(group.clone(), location.clone());
            }
            None => missing.push(location_id.clone()),
        }
    }

    if missing.is_empty() {
        LocationResolution::Resolved(resolved)
    } else {
        missing.sort();
        missing.dedup();
        LocationResolution::Invalid {
            missing,
        }
    }
}

/// Check whether `derived` is stale against its source and placement locations.
///
/// Locations are compared against the later of the source watermark and the
/// location watermark recorded at the last regeneration, so a location edited
/// after the source topology triggers exactly one rebuild. A plain comparison
/// with `last_sync_timestamp` would report such a location stale on every call.
#[must_use]
pub fn check_staleness(
    derived: &DeploymentTopology,
    source: &Topology,
    locations: &BTreeMap<String, Location>,
) -> Option<StalenessReason> {
    let Some(synced) = derived.last_sync_timestamp else {
        return Some(StalenessReason::NeverSynchronized);
    };

    if derived.initial_topology_id != source.id {
        return Some(StalenessReason::TopologyReplaced {
            previous: derived.initial_topology_id.clone(),
            current: source.id.clone(),
        });
    }

    if synced < source.last_modified {
        return Some(StalenessReason::TopologyModified {
            synced,
            modified: source.last_modified,
        });
    }

    let watermark = derived.location_sync_timestamp.map_or(synced, |seen| seen.max(synced));
    locations
        .values()
        .find(|location| location.last_modified > watermark)
        .map(|location| StalenessReason::LocationModified {
            location_id: location.id.clone(),
            modified: location.last_modified,
        })
}

/// Boolean form of [`check_staleness`].
#[must_use]
pub fn is_stale(
    derived: &DeploymentTopology,
    source: &Topology,
    locations: &BTreeMap<String, Location>,
) -> bool {
    check_staleness(derived, source, locations).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ApplicationEnvironment;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn synced_at(hour: u32) -> DeploymentTopology {
        let mut derived =
            DeploymentTopology::new(&ApplicationEnvironment::new("prod", "shop", "v1"), "topo");
        derived.last_sync_timestamp = Some(at(hour));
        derived
    }

    fn locations(modified: DateTime<Utc>) -> BTreeMap<String, Location> {
        [("ALL".to_string(), Location::new("aws", "cloudify", modified))].into_iter().collect()
    }

    #[test]
    fn test_never_synchronized() {
        let mut derived = synced_at(10);
        derived.last_sync_timestamp = None;
        let source = Topology::new("topo", at(9));

        assert_eq!(
            check_staleness(&derived, &source, &BTreeMap::new()),
            Some(StalenessReason::NeverSynchronized)
        );
    }

    #[test]
    fn test_fresh_when_nothing_changed() {
        let derived = synced_at(10);
        let source = Topology::new("topo", at(10));

        assert!(!is_stale(&derived, &source, &locations(at(9))));
    }

    #[test]
    fn test_topology_modified() {
        let derived = synced_at(10);
        let source = Topology::new("topo", at(11));

        assert!(matches!(
            check_staleness(&derived, &source, &BTreeMap::new()),
            Some(StalenessReason::TopologyModified { .. })
        ));
    }

    #[test]
    fn test_topology_replaced() {
        let derived = synced_at(10);
        let source = Topology::new("other", at(10));

        assert!(matches!(
            check_staleness(&derived, &source, &BTreeMap::new()),
            Some(StalenessReason::TopologyReplaced { .. })
        ));
    }

    #[test]
    fn test_location_modified_respects_watermark() {
        let mut derived = synced_at(10);
        let source = Topology::new("topo", at(10));

        let reason = check_staleness(&derived, &source, &locations(at(12)));
        assert!(
            matches!(reason, Some(StalenessReason::LocationModified { ref location_id, .. }) if location_id == "aws")
        );

        derived.location_sync_timestamp = Some(at(12));
        assert!(!is_stale(&derived, &source, &locations(at(12))));
        assert!(is_stale(&derived, &source, &locations(at(12) + Duration::seconds(1))));
    }

    #[test]
    fn test_resolve_locations_reports_missing() {
        let ids: BTreeMap<String, String> =
            [("ALL".to_string(), "gone".to_string())].into_iter().collect();
        let found = BTreeMap::new();

        assert_eq!(
            resolve_locations(&ids, &found),
            LocationResolution::Invalid {
                missing: vec!["gone".to_string()]
            }
        );

        let found: BTreeMap<String, Location> =
            [("gone".to_string(), Location::new("gone", "o", at(1)))].into_iter().collect();
        match resolve_locations(&ids, &found) {
            LocationResolution::Resolved(resolved) => assert_eq!(resolved["ALL"].id, "gone"),
            other => panic!("unexpected resolution: {other:?}"),
        }
    }
}
