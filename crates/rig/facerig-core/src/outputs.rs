//! Reports returned by the engines.
//!
//! Hard failures for one mesh land in `failed`; recoverable skips travel as
//! `warnings` next to the work that did happen.

use serde::Serialize;

use crate::data::{DeformerStackEntry, Frame, WiringLink};
use crate::error::RigError;
use crate::ids::{DeformerHandle, ProxyId};

/// Per-mesh outcome of a multi-mesh invocation. Never short-circuits.
#[derive(Clone, Debug, Serialize)]
pub struct BatchReport<T> {
    pub succeeded: Vec<T>,
    #[serde(serialize_with = "serialize_failures")]
    pub failed: Vec<(String, RigError)>,
}

impl<T> Default for BatchReport<T> {
    fn default() -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
        }
    }
}

impl<T> BatchReport<T> {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failure(&self, mesh: &str) -> Option<&RigError> {
        self.failed.iter().find(|(m, _)| m == mesh).map(|(_, e)| e)
    }
}

fn serialize_failures<S>(failed: &[(String, RigError)], s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    use serde::ser::SerializeSeq;
    let mut seq = s.serialize_seq(Some(failed.len()))?;
    for (mesh, err) in failed {
        seq.serialize_element(&serde_json::json!({ "mesh": mesh, "error": err.to_string() }))?;
    }
    seq.end()
}

fn serialize_warnings<S>(warnings: &[RigError], s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.collect_seq(warnings.iter().map(|w| w.to_string()))
}

/// One captured pose.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CapturedPose {
    pub pose: String,
    pub frame: Frame,
    pub proxy: Option<ProxyId>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CaptureReport {
    pub source: String,
    pub target: String,
    /// Morph stack node the targets were added to.
    pub stack: String,
    pub stack_created: bool,
    pub captured: Vec<CapturedPose>,
    #[serde(serialize_with = "serialize_warnings")]
    pub warnings: Vec<RigError>,
    /// Layout group holding the QA proxies, when any were kept.
    pub group: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkOutcome {
    Created,
    Replaced,
    Unchanged,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LinkRecord {
    pub link: WiringLink,
    pub outcome: LinkOutcome,
}

/// Wiring result for one destination mesh.
#[derive(Clone, Debug, Default, Serialize)]
pub struct DestinationWiring {
    pub mesh: String,
    pub links: Vec<LinkRecord>,
    /// Source poses with no matching target on this destination.
    pub skipped_poses: Vec<String>,
}

impl DestinationWiring {
    pub fn count(&self, outcome: LinkOutcome) -> usize {
        self.links.iter().filter(|l| l.outcome == outcome).count()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct WiringReport {
    /// Node driving the links (morph stack or controller).
    pub source: String,
    pub destinations: BatchReport<DestinationWiring>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BakeReport {
    pub driver: String,
    pub start: Frame,
    pub end: Frame,
    /// Targets that received a track, in request order.
    pub baked: Vec<String>,
    /// Target frames written as no-op entries.
    pub empty_frames: usize,
    #[serde(serialize_with = "serialize_failures")]
    pub failed: Vec<(String, RigError)>,
}

#[derive(Clone, Debug, Serialize)]
pub struct OrderReport {
    pub mesh: String,
    pub before: Vec<DeformerHandle>,
    /// Stack after resolution, in evaluation order.
    pub entries: Vec<DeformerStackEntry>,
    pub changed: bool,
    #[serde(serialize_with = "serialize_warnings")]
    pub warnings: Vec<RigError>,
}

impl OrderReport {
    pub fn after(&self) -> Vec<DeformerHandle> {
        self.entries.iter().map(|e| e.deformer.handle.clone()).collect()
    }
}

/// Result of [`crate::commands::export_prep`].
#[derive(Clone, Debug, Serialize)]
pub struct ExportPrepReport {
    pub bake: BakeReport,
    pub order: BatchReport<OrderReport>,
}

/// A reason a mesh is not ready for export.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExportIssue {
    OutOfOrder { mesh: String },
    MissingFrames { mesh: String, frames: Vec<Frame> },
    Unreadable { mesh: String, error: String },
}
