use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::SchemaError;
use crate::monitoring::types::Observation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorTag {
    Green,
    Red,
}

impl ColorTag {
    pub fn from_reachable(reachable: bool) -> Self {
        if reachable { ColorTag::Green } else { ColorTag::Red }
    }
}

/// One stored point of an endpoint's history.
///
/// Field order matches the columns of the persisted table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub address: String,

    /// X coordinate: milliseconds since the shared axis origin
    pub elapsed_ms: u64,

    /// Wall-clock time of the observation, for display
    pub timestamp: DateTime<Local>,

    pub reachable: bool,
    pub color: ColorTag,

    /// +1 when reachable, -1 otherwise
    pub magnitude: i8,
}

impl Segment {
    pub fn from_observation(observation: &Observation) -> Self {
        let reachable = observation.reachable;
        Self {
            name: observation.endpoint_name.clone(),
            address: observation.address.clone(),
            elapsed_ms: observation.elapsed_ms,
            timestamp: observation.timestamp,
            reachable,
            color: ColorTag::from_reachable(reachable),
            magnitude: if reachable { 1 } else { -1 },
        }
    }

    fn is_consistent(&self) -> bool {
        self.color == ColorTag::from_reachable(self.reachable)
            && self.magnitude == if self.reachable { 1 } else { -1 }
    }
}

/// How an observation was folded into the series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    Appended,
    Extended,
}

/// Ordered segments of one endpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SegmentSeries {
    segments: Vec<Segment>,
}

impl SegmentSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a series from persisted segments, checking the stored invariants
    pub fn from_segments(segments: Vec<Segment>, endpoint: &str) -> Result<Self, SchemaError> {
        for (row, segment) in segments.iter().enumerate() {
            if segment.name != endpoint {
                return Err(SchemaError::ForeignEndpoint {
                    row,
                    expected: endpoint.to_string(),
                    found: segment.name.clone(),
                });
            }
            if !segment.is_consistent() {
                return Err(SchemaError::InconsistentRow { row });
            }
            if row >= 1 && segments[row - 1].elapsed_ms > segment.elapsed_ms {
                return Err(SchemaError::OutOfOrder { row });
            }
            if row >= 2
                && segments[row - 1].reachable == segment.reachable
                && segments[row - 2].reachable == segment.reachable
            {
                return Err(SchemaError::UncompactedRun { row });
            }
        }

        Ok(Self { segments })
    }

    /// Fold `observation` into the series.
    ///
    /// While fewer than two segments exist the observation is appended.
    /// When the last two segments already share the observation's status the
    /// last one is replaced, moving the end of the run forward in time.
    /// Anything else starts a new run.
    pub fn merge(&mut self, observation: &Observation) -> MergeOutcome {
        let mut segment = Segment::from_observation(observation);

        if let Some(last) = self.segments.last() {
            if segment.elapsed_ms < last.elapsed_ms {
                warn!(
                    endpoint = %segment.name,
                    observed = segment.elapsed_ms,
                    previous = last.elapsed_ms,
                    "Observation predates the last segment, clamping"
                );
                segment.elapsed_ms = last.elapsed_ms;
            }
        }

        if self.extends_trailing_run(segment.reachable) {
            self.replace_last(segment);
            MergeOutcome::Extended
        } else {
            self.push(segment);
            MergeOutcome::Appended
        }
    }

    fn extends_trailing_run(&self, reachable: bool) -> bool {
        match self.segments.as_slice() {
            [.., before_last, last] => {
                last.reachable == reachable && before_last.reachable == reachable
            }
            _ => false,
        }
    }

    pub fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// Overwrite the last segment, returning the previous one
    pub fn replace_last(&mut self, segment: Segment) -> Option<Segment> {
        match self.segments.last_mut() {
            Some(last) => Some(std::mem::replace(last, segment)),
            None => {
                self.segments.push(segment);
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    pub fn as_slice(&self) -> &[Segment] {
        &self.segments
    }

    pub fn iter(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter()
    }
}
