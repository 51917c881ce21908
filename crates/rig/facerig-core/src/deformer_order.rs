//! Canonical deformer-stack ordering.
//!
//! Composition is order sensitive (a morph evaluated before or after skinning
//! yields different geometry), so every exported mesh gets its stack sorted by
//! role rank. The sort is stable: deformers sharing a role keep their relative
//! order, and deformers that cannot be classified stay where they are among
//! the `Other` entries.

use serde::{Deserialize, Deserializer, Serialize};

use crate::data::{DeformerRef, DeformerRole, DeformerStackEntry};
use crate::error::RigError;
use crate::ids::DeformerHandle;
use crate::naming::DEFAULT_STACK_NAME;
use crate::outputs::{BatchReport, OrderReport};
use crate::scene::SceneGraph;

/// Evaluation order of deformer roles. Roles missing from the list rank last.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CanonicalOrder(Vec<DeformerRole>);

impl Default for CanonicalOrder {
    fn default() -> Self {
        Self(DeformerRole::ALL.to_vec())
    }
}

impl<'de> Deserialize<'de> for CanonicalOrder {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let roles = Vec::<DeformerRole>::deserialize(deserializer)?;
        CanonicalOrder::new(roles).map_err(serde::de::Error::custom)
    }
}

impl CanonicalOrder {
    pub fn new(roles: Vec<DeformerRole>) -> Result<Self, RigError> {
        let order = Self(roles);
        order.validate()?;
        Ok(order)
    }

    pub fn validate(&self) -> Result<(), RigError> {
        for (i, role) in self.0.iter().enumerate() {
            if self.0[..i].contains(role) {
                return Err(RigError::InvalidConfig(format!(
                    "role {role:?} listed twice in canonical order"
                )));
            }
        }
        Ok(())
    }

    pub fn roles(&self) -> &[DeformerRole] {
        &self.0
    }

    pub fn rank(&self, role: DeformerRole) -> usize {
        self.0
            .iter()
            .position(|r| *r == role)
            .unwrap_or(self.0.len())
    }
}

/// Host node types mapped to roles.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleRules {
    pub skin_kinds: Vec<String>,
    pub morph_kinds: Vec<String>,
    /// Morph deformers whose name starts with one of these are the captured
    /// ARKit stacks (`Morph`); any other morph deformer is `Corrective`.
    pub morph_name_prefixes: Vec<String>,
    pub wrap_kinds: Vec<String>,
    pub other_kinds: Vec<String>,
}

impl Default for RoleRules {
    fn default() -> Self {
        let owned = |xs: &[&str]| xs.iter().map(|s| s.to_string()).collect();
        Self {
            skin_kinds: owned(&["skinCluster"]),
            morph_kinds: owned(&["blendShape"]),
            morph_name_prefixes: owned(&[DEFAULT_STACK_NAME]),
            wrap_kinds: owned(&["wrap", "proximityWrap"]),
            other_kinds: owned(&[
                "cluster",
                "deltaMush",
                "tweak",
                "ffd",
                "nonLinear",
                "sculpt",
                "softMod",
                "lattice",
                "wire",
                "jiggle",
                "tension",
            ]),
        }
    }
}

/// Classify a deformer by its host type. Unknown types are an error the
/// resolver downgrades to a warning.
pub fn classify(mesh: &str, deformer: &DeformerRef, rules: &RoleRules) -> Result<DeformerRole, RigError> {
    let kind = deformer.kind.as_str();
    let is = |kinds: &[String]| kinds.iter().any(|k| k == kind);
    if is(&rules.skin_kinds) {
        Ok(DeformerRole::Skin)
    } else if is(&rules.morph_kinds) {
        let ours = rules
            .morph_name_prefixes
            .iter()
            .any(|p| deformer.name.starts_with(p.as_str()));
        Ok(if ours {
            DeformerRole::Morph
        } else {
            DeformerRole::Corrective
        })
    } else if is(&rules.wrap_kinds) {
        Ok(DeformerRole::Wrap)
    } else if is(&rules.other_kinds) {
        Ok(DeformerRole::Other)
    } else {
        Err(RigError::UnknownDeformerRole {
            mesh: mesh.to_string(),
            deformer: deformer.name.clone(),
            kind: deformer.kind.clone(),
        })
    }
}

/// Classify a whole stack. Unknown entries become `Other` and are returned as warnings.
pub fn classify_stack(
    mesh: &str,
    stack: &[DeformerRef],
    rules: &RoleRules,
) -> (Vec<DeformerStackEntry>, Vec<RigError>) {
    let mut warnings = Vec::new();
    let entries = stack
        .iter()
        .enumerate()
        .map(|(position, d)| {
            let role = classify(mesh, d, rules).unwrap_or_else(|e| {
                warnings.push(e);
                DeformerRole::Other
            });
            DeformerStackEntry {
                mesh: mesh.to_string(),
                role,
                deformer: d.clone(),
                position,
            }
        })
        .collect();
    (entries, warnings)
}

/// Stable reorder of classified entries; positions are renumbered.
pub fn sort_entries(mut entries: Vec<DeformerStackEntry>, order: &CanonicalOrder) -> Vec<DeformerStackEntry> {
    entries.sort_by_key(|e| order.rank(e.role));
    for (i, e) in entries.iter_mut().enumerate() {
        e.position = i;
    }
    entries
}

/// Bring one mesh's stack into canonical order. Only the evaluation order is
/// written; bound weights and targets are untouched.
pub fn resolve_mesh<S: SceneGraph + ?Sized>(
    scene: &mut S,
    mesh: &str,
    order: &CanonicalOrder,
    rules: &RoleRules,
) -> Result<OrderReport, RigError> {
    order.validate()?;
    let stack = scene.deformer_stack(mesh)?;
    let before: Vec<DeformerHandle> = stack.iter().map(|d| d.handle.clone()).collect();
    let (entries, warnings) = classify_stack(mesh, &stack, rules);
    for w in &warnings {
        log::warn!("{w}");
    }
    let entries = sort_entries(entries, order);
    let after: Vec<DeformerHandle> = entries.iter().map(|e| e.deformer.handle.clone()).collect();
    let changed = before != after;
    if changed {
        scene.set_deformer_order(mesh, &after)?;
        log::info!("reordered deformers on '{mesh}': {before:?} -> {after:?}");
    } else {
        log::debug!("deformers on '{mesh}' already in canonical order");
    }
    Ok(OrderReport {
        mesh: mesh.to_string(),
        before,
        entries,
        changed,
        warnings,
    })
}

/// Resolve every mesh independently; failures are collected per mesh.
pub fn resolve_meshes<S: SceneGraph + ?Sized>(
    scene: &mut S,
    meshes: &[&str],
    order: &CanonicalOrder,
    rules: &RoleRules,
) -> BatchReport<OrderReport> {
    let mut report = BatchReport::default();
    for mesh in meshes {
        match resolve_mesh(scene, mesh, order, rules) {
            Ok(r) => report.succeeded.push(r),
            Err(e) => {
                log::error!("deformer order on '{mesh}' failed: {e}");
                report.failed.push((mesh.to_string(), e));
            }
        }
    }
    report
}
