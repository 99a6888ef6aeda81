use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::registry::{Family, Target};

/// Outcome tag of a single probe attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    Ok,
    Degraded,
    Unreachable,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Ok => write!(f, "OK"),
            Classification::Degraded => write!(f, "DEGRADED"),
            Classification::Unreachable => write!(f, "UNREACHABLE"),
        }
    }
}

/// Result of one probe attempt against one target
///
/// Immutable once built; a retry produces a fresh outcome and the
/// orchestrator decides which one wins.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub target: String,
    pub reachable: bool,
    #[serde(rename = "response_time_s", serialize_with = "serialize_secs")]
    pub response_time: Duration,
    pub classification: Classification,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

fn serialize_secs<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

impl ProbeOutcome {
    /// Build an outcome; `reachable` is derived from the classification.
    pub fn new(
        target: &Target,
        classification: Classification,
        response_time: Duration,
        detail: Option<String>,
    ) -> Self {
        Self {
            target: target.name.clone(),
            reachable: classification != Classification::Unreachable,
            response_time,
            classification,
            detail,
        }
    }

    /// Mark the target as reachable and healthy
    pub fn ok(target: &Target, response_time: Duration) -> Self {
        Self::new(target, Classification::Ok, response_time, None)
    }

    /// Mark the target as reachable but impaired
    pub fn degraded(target: &Target, response_time: Duration, note: impl Into<String>) -> Self {
        Self::new(target, Classification::Degraded, response_time, Some(note.into()))
    }

    /// Mark the target as unreachable with a human-readable cause
    pub fn unreachable(target: &Target, response_time: Duration, cause: impl Into<String>) -> Self {
        Self::new(target, Classification::Unreachable, response_time, Some(cause.into()))
    }

    pub fn is_ok(&self) -> bool {
        self.classification == Classification::Ok
    }
}

/// Final outcome set of one protocol family, in registry order
#[derive(Debug, Clone, Serialize)]
pub struct FamilyReport {
    #[serde(skip)]
    pub family: Family,
    pub all_reachable: bool,
    pub outcomes: Vec<ProbeOutcome>,
}

impl FamilyReport {
    pub fn new(family: Family, outcomes: Vec<ProbeOutcome>) -> Self {
        let all_reachable = outcomes.iter().all(ProbeOutcome::is_ok);
        Self { family, all_reachable, outcomes }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Targets that answered at all, including degraded ones
    pub fn reachable_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.reachable).count()
    }

    /// Concise "8/10 reachable" status fragment
    pub fn summary(&self) -> String {
        format!("{}/{} reachable", self.reachable_count(), self.total())
    }
}

/// The root artifact of one batch run, handed to the presenter
#[derive(Debug, Clone)]
pub struct AggregateReport {
    pub generated_at: DateTime<Utc>,
    pub families: Vec<FamilyReport>,
}

impl AggregateReport {
    pub fn new(families: Vec<FamilyReport>) -> Self {
        Self { generated_at: Utc::now(), families }
    }

    /// True iff every family has every target classified OK
    pub fn fully_healthy(&self) -> bool {
        self.families.iter().all(|report| report.all_reachable)
    }

    pub fn family(&self, family: Family) -> Option<&FamilyReport> {
        self.families.iter().find(|report| report.family == family)
    }
}

impl Serialize for AggregateReport {
    /// JSON projection: `families` is an ordered map keyed by family name.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        struct FamilyMap<'a>(&'a [FamilyReport]);

        impl Serialize for FamilyMap<'_> {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                let mut map = serializer.serialize_map(Some(self.0.len()))?;
                for report in self.0 {
                    map.serialize_entry(report.family.name(), report)?;
                }
                map.end()
            }
        }

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("generated_at", &self.generated_at)?;
        map.serialize_entry("families", &FamilyMap(&self.families))?;
        map.end()
    }
}
