//! In-memory host scene.
//!
//! `MemoryScene` implements the full capability contract over plain data so
//! the engines can run without a DCC: tests, benches and offline tooling load
//! it from JSON. Deformed geometry is modelled as a per-frame point cache (the
//! sampled source animation, held until the next cached frame) plus the
//! weighted deltas of the mesh's morph stack.

use std::collections::BTreeMap;

use hashbrown::HashMap;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::data::{
    BakedWeightTrack, ControlRef, DeformerRef, Frame, MorphStack, MorphTarget, Transform, Vec3,
    WeightSample,
};
use crate::error::SceneError;
use crate::ids::{DeformerHandle, IdAllocator, ProxyId};
use crate::scene::{AnimationCurves, SceneGraph};

const MAX_CONNECTION_DEPTH: usize = 64;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryMesh {
    #[serde(default)]
    pub transform: Transform,
    /// Ancestor transforms, nearest parent first.
    #[serde(default)]
    pub parents: Vec<Transform>,
    /// Rest points, used for frames before the first cached frame.
    pub points: Vec<Vec3>,
    /// Sampled source animation: points per frame.
    #[serde(default)]
    pub point_cache: BTreeMap<Frame, Vec<Vec3>>,
    #[serde(default)]
    pub deformers: Vec<DeformerRef>,
    #[serde(default)]
    pub morph_stack: Option<MorphStack>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Proxy {
    pub id: ProxyId,
    pub name: String,
    pub source: String,
    pub frame: Frame,
    /// Frozen local-space points.
    pub points: Vec<Vec3>,
    pub group: Option<String>,
    pub translation: Vec3,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct CurveEntry {
    control: ControlRef,
    keys: BTreeMap<Frame, f32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct LinkEntry {
    source: ControlRef,
    destination: ControlRef,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MemoryScene {
    #[serde(default = "default_playback")]
    pub playback: (Frame, Frame),
    #[serde(default = "default_fps")]
    pub fps: f32,
    #[serde(default)]
    pub meshes: IndexMap<String, MemoryMesh>,
    /// Controller nodes and their channel names.
    #[serde(default)]
    pub controllers: IndexMap<String, Vec<String>>,
    #[serde(default, with = "links_serde")]
    connections: HashMap<ControlRef, ControlRef>,
    #[serde(default, with = "curves_serde")]
    curves: HashMap<ControlRef, BTreeMap<Frame, f32>>,
    #[serde(default)]
    pub proxies: Vec<Proxy>,
    #[serde(default)]
    pub groups: IndexMap<String, Vec3>,
    #[serde(default)]
    pub baked: IndexMap<String, BakedWeightTrack>,
    #[serde(default)]
    ids: IdAllocator,
}

fn default_playback() -> (Frame, Frame) {
    (0, 52)
}

fn default_fps() -> f32 {
    24.0
}

impl MemoryScene {
    pub fn new() -> Self {
        Self {
            playback: default_playback(),
            fps: default_fps(),
            ..Self::default()
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn add_mesh(&mut self, name: impl Into<String>, points: Vec<Vec3>) -> &mut MemoryMesh {
        let entry = self.meshes.entry(name.into()).or_default();
        entry.points = points;
        entry
    }

    pub fn mesh(&self, name: &str) -> Option<&MemoryMesh> {
        self.meshes.get(name)
    }

    pub fn mesh_mut(&mut self, name: &str) -> Option<&mut MemoryMesh> {
        self.meshes.get_mut(name)
    }

    /// All live connections, sorted by destination.
    pub fn links(&self) -> Vec<crate::data::WiringLink> {
        let mut out: Vec<_> = self
            .connections
            .iter()
            .map(|(dst, src)| crate::data::WiringLink {
                source: src.clone(),
                destination: dst.clone(),
            })
            .collect();
        out.sort_by(|a, b| a.destination.cmp(&b.destination));
        out
    }

    pub fn curve_keys(&self, control: &ControlRef) -> Option<&BTreeMap<Frame, f32>> {
        self.curves.get(control)
    }

    pub fn proxy(&self, id: ProxyId) -> Option<&Proxy> {
        self.proxies.iter().find(|p| p.id == id)
    }

    fn mesh_ref(&self, mesh: &str) -> Result<&MemoryMesh, SceneError> {
        self.meshes
            .get(mesh)
            .ok_or_else(|| SceneError::MeshNotFound(mesh.to_string()))
    }

    fn mesh_ref_mut(&mut self, mesh: &str) -> Result<&mut MemoryMesh, SceneError> {
        self.meshes
            .get_mut(mesh)
            .ok_or_else(|| SceneError::MeshNotFound(mesh.to_string()))
    }

    fn stack_owner(&self, node: &str) -> Option<(&str, &MorphStack)> {
        self.meshes.iter().find_map(|(name, m)| {
            m.morph_stack
                .as_ref()
                .filter(|s| s.node == node)
                .map(|s| (name.as_str(), s))
        })
    }

    fn control_exists(&self, control: &ControlRef) -> bool {
        if let Some(channels) = self.controllers.get(&control.node) {
            return channels.iter().any(|c| c == &control.channel);
        }
        self.stack_owner(&control.node)
            .map(|(_, s)| s.has_pose(&control.channel))
            .unwrap_or(false)
    }

    fn require_control(&self, control: &ControlRef) -> Result<(), SceneError> {
        if self.control_exists(control) {
            Ok(())
        } else {
            Err(SceneError::ControlNotFound {
                node: control.node.clone(),
                channel: control.channel.clone(),
            })
        }
    }

    fn node_name_taken(&self, name: &str) -> bool {
        self.meshes.contains_key(name)
            || self.controllers.contains_key(name)
            || self.groups.contains_key(name)
            || self
                .meshes
                .values()
                .any(|m| m.deformers.iter().any(|d| d.name == name))
    }

    fn curve_value(&self, control: &ControlRef, frame: Frame) -> f32 {
        let Some(keys) = self.curves.get(control) else {
            return 0.0;
        };
        let before = keys.range(..=frame).next_back();
        let after = keys.range(frame..).next();
        match (before, after) {
            (Some((&f0, &v0)), Some((&f1, &v1))) => {
                if f0 == f1 {
                    v0
                } else {
                    let t = (frame - f0) as f32 / (f1 - f0) as f32;
                    v0 + (v1 - v0) * t
                }
            }
            (Some((_, &v)), None) | (None, Some((_, &v))) => v,
            (None, None) => 0.0,
        }
    }
}

impl SceneGraph for MemoryScene {
    fn has_mesh(&self, mesh: &str) -> bool {
        self.meshes.contains_key(mesh)
    }

    fn vertex_count(&self, mesh: &str) -> Result<usize, SceneError> {
        Ok(self.mesh_ref(mesh)?.points.len())
    }

    fn geometry_at(&self, mesh: &str, frame: Frame) -> Result<Vec<Vec3>, SceneError> {
        let m = self.mesh_ref(mesh)?;
        let mut points = m
            .point_cache
            .range(..=frame)
            .next_back()
            .map(|(_, p)| p.clone())
            .unwrap_or_else(|| m.points.clone());
        if let Some(stack) = &m.morph_stack {
            for target in &stack.targets {
                let w = self.evaluate(&target.control, frame)?;
                if w == 0.0 {
                    continue;
                }
                for (p, d) in points.iter_mut().zip(&target.delta) {
                    p[0] += w * d[0];
                    p[1] += w * d[1];
                    p[2] += w * d[2];
                }
            }
        }
        Ok(points)
    }

    fn local_transform(&self, mesh: &str) -> Result<Transform, SceneError> {
        Ok(self.mesh_ref(mesh)?.transform)
    }

    fn parent_chain(&self, mesh: &str) -> Result<Vec<Transform>, SceneError> {
        Ok(self.mesh_ref(mesh)?.parents.clone())
    }

    fn deformer_stack(&self, mesh: &str) -> Result<Vec<DeformerRef>, SceneError> {
        Ok(self.mesh_ref(mesh)?.deformers.clone())
    }

    fn set_deformer_order(
        &mut self,
        mesh: &str,
        order: &[DeformerHandle],
    ) -> Result<(), SceneError> {
        let m = self.mesh_ref_mut(mesh)?;
        if order.len() != m.deformers.len() {
            return Err(SceneError::InvalidDeformerOrder {
                mesh: mesh.to_string(),
                reason: format!("{} handles for {} deformers", order.len(), m.deformers.len()),
            });
        }
        let mut remaining = m.deformers.clone();
        let mut reordered = Vec::with_capacity(order.len());
        for handle in order {
            let pos = remaining
                .iter()
                .position(|d| &d.handle == handle)
                .ok_or_else(|| SceneError::InvalidDeformerOrder {
                    mesh: mesh.to_string(),
                    reason: format!("'{handle}' is not on the stack or is repeated"),
                })?;
            reordered.push(remaining.remove(pos));
        }
        m.deformers = reordered;
        Ok(())
    }

    fn morph_stack(&self, mesh: &str) -> Result<Option<MorphStack>, SceneError> {
        Ok(self.mesh_ref(mesh)?.morph_stack.clone())
    }

    fn create_morph_stack(
        &mut self,
        mesh: &str,
        name: &str,
        baseline_vertex_count: usize,
    ) -> Result<String, SceneError> {
        if let Some(existing) = &self.mesh_ref(mesh)?.morph_stack {
            return Err(SceneError::StackExists {
                mesh: mesh.to_string(),
                existing: existing.node.clone(),
            });
        }
        let mut node = name.to_string();
        while self.node_name_taken(&node) {
            node = format!("{name}{}", self.ids.alloc_deformer_suffix() + 1);
        }
        let m = self.mesh_ref_mut(mesh)?;
        m.morph_stack = Some(MorphStack {
            node: node.clone(),
            baseline_vertex_count,
            targets: Vec::new(),
        });
        m.deformers.insert(0, DeformerRef::new(node.clone(), "blendShape"));
        Ok(node)
    }

    fn set_morph_baseline(&mut self, mesh: &str, vertex_count: usize) -> Result<(), SceneError> {
        let stack = self
            .mesh_ref_mut(mesh)?
            .morph_stack
            .as_mut()
            .ok_or_else(|| SceneError::NodeNotFound(format!("morph stack of '{mesh}'")))?;
        stack.baseline_vertex_count = vertex_count;
        Ok(())
    }

    fn add_morph_target(&mut self, mesh: &str, target: MorphTarget) -> Result<(), SceneError> {
        let m = self.mesh_ref_mut(mesh)?;
        let stack = m
            .morph_stack
            .as_mut()
            .ok_or_else(|| SceneError::NodeNotFound(format!("morph stack of '{mesh}'")))?;
        stack.targets.push(target);
        Ok(())
    }

    fn delete_morph_target(&mut self, mesh: &str, pose: &str) -> Result<bool, SceneError> {
        let m = self.mesh_ref_mut(mesh)?;
        let Some(stack) = m.morph_stack.as_mut() else {
            return Ok(false);
        };
        let Some(pos) = stack.targets.iter().position(|t| t.pose.name == pose) else {
            return Ok(false);
        };
        let removed = stack.targets.remove(pos);
        let control = removed.control;
        self.connections
            .retain(|dst, src| dst != &control && src != &control);
        self.curves.remove(&control);
        Ok(true)
    }

    fn connect(
        &mut self,
        source: &ControlRef,
        destination: &ControlRef,
    ) -> Result<(), SceneError> {
        self.require_control(source)?;
        self.require_control(destination)?;
        self.connections.insert(destination.clone(), source.clone());
        Ok(())
    }

    fn disconnect(&mut self, destination: &ControlRef) -> Result<(), SceneError> {
        self.connections.remove(destination);
        Ok(())
    }

    fn input_of(&self, destination: &ControlRef) -> Option<ControlRef> {
        self.connections.get(destination).cloned()
    }

    fn has_node(&self, node: &str) -> bool {
        self.node_name_taken(node)
    }

    fn ensure_controller(&mut self, name: &str) -> Result<(), SceneError> {
        self.controllers.entry(name.to_string()).or_default();
        Ok(())
    }

    fn ensure_channel(&mut self, control: &ControlRef) -> Result<(), SceneError> {
        let channels = self
            .controllers
            .get_mut(&control.node)
            .ok_or_else(|| SceneError::NodeNotFound(control.node.clone()))?;
        if !channels.iter().any(|c| c == &control.channel) {
            channels.push(control.channel.clone());
        }
        Ok(())
    }

    fn has_channel(&self, control: &ControlRef) -> bool {
        self.control_exists(control)
    }

    fn create_proxy(
        &mut self,
        mesh: &str,
        name: &str,
        frame: Frame,
    ) -> Result<ProxyId, SceneError> {
        let points = self.geometry_at(mesh, frame)?;
        let id = self.ids.alloc_proxy();
        self.proxies.push(Proxy {
            id,
            name: name.to_string(),
            source: mesh.to_string(),
            frame,
            points,
            group: None,
            translation: [0.0; 3],
        });
        Ok(id)
    }

    fn create_group(&mut self, name: &str, translation: Vec3) -> Result<(), SceneError> {
        self.groups.insert(name.to_string(), translation);
        Ok(())
    }

    fn place_proxy(
        &mut self,
        proxy: ProxyId,
        group: &str,
        translation: Vec3,
    ) -> Result<(), SceneError> {
        if !self.groups.contains_key(group) {
            return Err(SceneError::NodeNotFound(group.to_string()));
        }
        let p = self
            .proxies
            .iter_mut()
            .find(|p| p.id == proxy)
            .ok_or(SceneError::ProxyNotFound(proxy.0))?;
        p.group = Some(group.to_string());
        p.translation = translation;
        Ok(())
    }

    fn write_baked_frame(
        &mut self,
        mesh: &str,
        frame: Frame,
        sample: Option<WeightSample>,
    ) -> Result<(), SceneError> {
        self.mesh_ref(mesh)?;
        self.baked
            .entry(mesh.to_string())
            .or_insert_with(|| BakedWeightTrack::new(mesh))
            .frames
            .insert(frame, sample);
        Ok(())
    }

    fn baked_track(&self, mesh: &str) -> Option<BakedWeightTrack> {
        self.baked.get(mesh).cloned()
    }
}

impl AnimationCurves for MemoryScene {
    fn set_keyframe(
        &mut self,
        control: &ControlRef,
        frame: Frame,
        value: f32,
    ) -> Result<(), SceneError> {
        self.require_control(control)?;
        self.curves
            .entry(control.clone())
            .or_default()
            .insert(frame, value);
        Ok(())
    }

    fn evaluate(&self, control: &ControlRef, frame: Frame) -> Result<f32, SceneError> {
        self.require_control(control)?;
        let mut current = control;
        let mut hops = 0;
        while let Some(src) = self.connections.get(current) {
            if hops == MAX_CONNECTION_DEPTH {
                return Err(SceneError::ConnectionCycle(control.to_string()));
            }
            current = src;
            hops += 1;
        }
        Ok(self.curve_value(current, frame).clamp(0.0, 1.0))
    }

    fn playback_range(&self) -> (Frame, Frame) {
        self.playback
    }

    fn frame_rate(&self) -> f32 {
        self.fps
    }

    fn set_frame_rate(&mut self, fps: f32) -> Result<(), SceneError> {
        self.fps = fps;
        Ok(())
    }
}

mod links_serde {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(map: &HashMap<ControlRef, ControlRef>, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut entries: Vec<LinkEntry> = map
            .iter()
            .map(|(dst, src)| LinkEntry {
                source: src.clone(),
                destination: dst.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.destination.cmp(&b.destination));
        entries.serialize(s)
    }

    pub fn deserialize<'de, D>(d: D) -> Result<HashMap<ControlRef, ControlRef>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<LinkEntry>::deserialize(d)?;
        Ok(entries
            .into_iter()
            .map(|e| (e.destination, e.source))
            .collect())
    }
}

mod curves_serde {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(
        map: &HashMap<ControlRef, BTreeMap<Frame, f32>>,
        s: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut entries: Vec<CurveEntry> = map
            .iter()
            .map(|(control, keys)| CurveEntry {
                control: control.clone(),
                keys: keys.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.control.cmp(&b.control));
        entries.serialize(s)
    }

    pub fn deserialize<'de, D>(d: D) -> Result<HashMap<ControlRef, BTreeMap<Frame, f32>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let entries = Vec::<CurveEntry>::deserialize(d)?;
        Ok(entries.into_iter().map(|e| (e.control, e.keys)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene_with_stack() -> MemoryScene {
        let mut scene = MemoryScene::new();
        scene.add_mesh("head", vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0]]);
        let node = scene.create_morph_stack("head", "ARKit52_BS", 2).unwrap();
        scene
            .add_morph_target(
                "head",
                MorphTarget {
                    pose: crate::pose::Pose::new("jawOpen", 18),
                    delta: vec![[0.0, -1.0, 0.0], [0.0, 0.0, 0.0]],
                    control: ControlRef::new(node, "jawOpen"),
                },
            )
            .unwrap();
        scene
    }

    #[test]
    fn curves_interpolate_and_hold() {
        let mut scene = scene_with_stack();
        let c = ControlRef::new("ARKit52_BS", "jawOpen");
        scene.set_keyframe(&c, 0, 0.0).unwrap();
        scene.set_keyframe(&c, 10, 1.0).unwrap();
        assert_eq!(scene.evaluate(&c, -5).unwrap(), 0.0);
        assert_eq!(scene.evaluate(&c, 5).unwrap(), 0.5);
        assert_eq!(scene.evaluate(&c, 20).unwrap(), 1.0);
    }

    #[test]
    fn geometry_applies_weighted_deltas() {
        let mut scene = scene_with_stack();
        let c = ControlRef::new("ARKit52_BS", "jawOpen");
        scene.set_keyframe(&c, 0, 0.5).unwrap();
        let pts = scene.geometry_at("head", 0).unwrap();
        assert_eq!(pts[0], [0.0, -0.5, 0.0]);
        assert_eq!(pts[1], [1.0, 0.0, 0.0]);
    }

    #[test]
    fn stack_is_created_at_top_with_unique_name() {
        let mut scene = scene_with_stack();
        scene.add_mesh("teeth", vec![[0.0; 3]]);
        scene
            .mesh_mut("teeth")
            .unwrap()
            .deformers
            .push(DeformerRef::new("skinCluster2", "skinCluster"));
        let node = scene.create_morph_stack("teeth", "ARKit52_BS", 1).unwrap();
        assert_ne!(node, "ARKit52_BS");
        let stack = scene.deformer_stack("teeth").unwrap();
        assert_eq!(stack[0].name, node);
        assert_eq!(stack[0].kind, "blendShape");
        assert!(matches!(
            scene.create_morph_stack("teeth", "X", 1),
            Err(SceneError::StackExists { .. })
        ));
    }

    #[test]
    fn deleting_target_drops_its_connections() {
        let mut scene = scene_with_stack();
        scene.ensure_controller("CTRL").unwrap();
        let ctrl = ControlRef::new("CTRL", "jawOpen");
        scene.ensure_channel(&ctrl).unwrap();
        let dst = ControlRef::new("ARKit52_BS", "jawOpen");
        scene.connect(&ctrl, &dst).unwrap();
        assert_eq!(scene.input_of(&dst), Some(ctrl.clone()));
        assert!(scene.delete_morph_target("head", "jawOpen").unwrap());
        assert!(scene.links().is_empty());
        assert!(!scene.delete_morph_target("head", "jawOpen").unwrap());
    }

    #[test]
    fn json_round_trip_keeps_links_and_curves() {
        let mut scene = scene_with_stack();
        scene.ensure_controller("CTRL").unwrap();
        let ctrl = ControlRef::new("CTRL", "jawOpen");
        scene.ensure_channel(&ctrl).unwrap();
        scene.set_keyframe(&ctrl, 3, 0.25).unwrap();
        scene
            .connect(&ctrl, &ControlRef::new("ARKit52_BS", "jawOpen"))
            .unwrap();
        let text = scene.to_json().to_string();
        let back = MemoryScene::from_json_str(&text).unwrap();
        assert_eq!(back.links(), scene.links());
        assert_eq!(
            back.evaluate(&ControlRef::new("ARKit52_BS", "jawOpen"), 3).unwrap(),
            0.25
        );
    }

    #[test]
    fn cyclic_connections_are_an_error() {
        let mut scene = scene_with_stack();
        scene.ensure_controller("CTRL").unwrap();
        let ctrl = ControlRef::new("CTRL", "jawOpen");
        scene.ensure_channel(&ctrl).unwrap();
        let jaw = ControlRef::new("ARKit52_BS", "jawOpen");
        scene.connect(&ctrl, &jaw).unwrap();
        scene.connect(&jaw, &ctrl).unwrap();
        assert_eq!(
            scene.evaluate(&jaw, 0),
            Err(SceneError::ConnectionCycle("ARKit52_BS.jawOpen".into()))
        );
        assert!(scene.geometry_at("head", 0).is_err());

        scene.disconnect(&ctrl).unwrap();
        scene.set_keyframe(&ctrl, 0, 0.5).unwrap();
        assert_eq!(scene.evaluate(&jaw, 0).unwrap(), 0.5);
    }

    #[test]
    fn baseline_and_frame_rate_are_writable() {
        let mut scene = scene_with_stack();
        assert_eq!(scene.frame_rate(), 24.0);
        scene.set_frame_rate(30.0).unwrap();
        assert_eq!(scene.frame_rate(), 30.0);
        scene.set_morph_baseline("head", 3).unwrap();
        assert_eq!(
            scene.morph_stack("head").unwrap().unwrap().baseline_vertex_count,
            3
        );
        scene.add_mesh("teeth", vec![[0.0; 3]]);
        assert!(scene.set_morph_baseline("teeth", 1).is_err());
    }

    #[test]
    fn reorder_must_be_a_permutation() {
        let mut scene = scene_with_stack();
        let bad = vec![DeformerHandle::new("nope")];
        assert!(scene.set_deformer_order("head", &bad).is_err());
        let good = vec![DeformerHandle::new("ARKit52_BS")];
        scene.set_deformer_order("head", &good).unwrap();
    }
}
