//! Engine feature negotiation.
//!
//! Engines in this family differ in the extensions they implement. Support is
//! discovered once per process start by sending one probe command per feature
//! and recording whether it was answered with success. Probes are sent one at
//! a time; each response triggers the next probe.

use std::collections::{BTreeMap, VecDeque};

use serde::Serialize;
use strum::{Display, EnumString};

/// Optional engine extensions the session knows how to use.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, Serialize,
)]
pub enum Feature {
    /// `lz-analyze` accepts a `minmoves` argument.
    #[strum(serialize = "minmoves")]
    #[serde(rename = "minmoves")]
    MinMoves,
    /// The engine reports whole-board final-occupancy estimates.
    #[strum(serialize = "endstate")]
    #[serde(rename = "endstate")]
    Endstate,
    /// The engine speaks the `kata-analyze` dialect.
    #[strum(serialize = "kata-analyze")]
    #[serde(rename = "kata-analyze")]
    KataAnalyze,
}

impl Feature {
    /// Probe order used at every start.
    pub const PROBE_ORDER: [Self; 3] = [Self::MinMoves, Self::Endstate, Self::KataAnalyze];

    /// Command whose success indicates support for the feature.
    #[must_use]
    pub const fn probe_command(self) -> &'static str {
        match self {
            Self::MinMoves => "lz-analyze interval 1 minmoves 30",
            Self::Endstate => "endstate_map",
            Self::KataAnalyze => "kata-analyze interval 1",
        }
    }
}

/// Supported features of the running engine.
///
/// Features that were never probed count as unsupported.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CapabilityMap {
    entries: BTreeMap<Feature, bool>,
}

impl CapabilityMap {
    /// Records the outcome of a probe.
    pub fn record(&mut self, feature: Feature, supported: bool) {
        self.entries.insert(feature, supported);
    }

    /// Whether `feature` was probed and answered with success.
    #[must_use]
    pub fn supports(&self, feature: Feature) -> bool {
        self.entries.get(&feature).copied().unwrap_or(false)
    }

    /// Whether `feature` has been probed at all.
    #[must_use]
    pub fn is_known(&self, feature: Feature) -> bool {
        self.entries.contains_key(&feature)
    }

    /// Iterates over probed features in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (Feature, bool)> + '_ {
        self.entries.iter().map(|(feature, supported)| (*feature, *supported))
    }

    /// Whether the alternate (KataGo) dialect is active.
    #[must_use]
    pub fn is_alternate_dialect(&self) -> bool {
        self.supports(Feature::KataAnalyze)
    }
}

/// Sequential probe schedule for one process start.
#[derive(Debug, Clone)]
pub struct FeatureProber {
    remaining: VecDeque<Feature>,
}

impl FeatureProber {
    /// Schedules every known feature in [`Feature::PROBE_ORDER`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            remaining: Feature::PROBE_ORDER.into_iter().collect(),
        }
    }

    /// Takes the next feature to probe, or `None` once probing is complete.
    pub fn next_probe(&mut self) -> Option<Feature> {
        self.remaining.pop_front()
    }

    /// Whether every scheduled probe has been issued.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }
}

impl Default for FeatureProber {
    fn default() -> Self {
        Self::new()
    }
}
