//! The minimal node API the rig drives on its host: create, parent, local
//! transform, active flag, collision volume. [`TransformGraph`] is a plain
//! arena implementation of that API, enough to run and test the pipeline
//! without an engine behind it.

use glam::{Mat4, Quat, Vec3};

/// Index of a node inside its graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Collision volume descriptor attachable to a node. Dimensions are in the
/// node's local space, so the node's scale shapes the final volume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Collider {
    Sphere { radius: f32 },
    Capsule { radius: f32, height: f32 },
}

/// Hierarchical transform host. Everything the capture pipeline needs from
/// a scene graph.
pub trait SceneGraph {
    fn create_node(&mut self, name: &str) -> NodeId;
    fn set_parent(&mut self, child: NodeId, parent: NodeId);
    fn set_local_position(&mut self, node: NodeId, position: Vec3);
    fn set_local_rotation(&mut self, node: NodeId, rotation: Quat);
    fn set_local_scale(&mut self, node: NodeId, scale: Vec3);
    fn set_active(&mut self, node: NodeId, active: bool);
    fn attach_collider(&mut self, node: NodeId, collider: Collider);
}

#[derive(Clone, Debug)]
pub struct Node {
    pub name: String,
    pub parent: Option<NodeId>,
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub active: bool,
    pub collider: Option<Collider>,
}

impl Node {
    fn new(name: &str) -> Self {
        Node {
            name: name.to_string(),
            parent: None,
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            active: true,
            collider: None,
        }
    }

    pub fn local_transform(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Flat arena of nodes with parent links.
#[derive(Default)]
pub struct TransformGraph {
    nodes: Vec<Node>,
}

impl TransformGraph {
    pub fn new() -> Self {
        TransformGraph { nodes: Vec::new() }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Local-to-world transform, composed root-down.
    pub fn global_transform(&self, id: NodeId) -> Mat4 {
        let node = self.node(id);
        match node.parent {
            Some(parent) => self.global_transform(parent) * node.local_transform(),
            None => node.local_transform(),
        }
    }

    /// A node is shown only if it and every ancestor are active.
    pub fn is_active_in_hierarchy(&self, id: NodeId) -> bool {
        let node = self.node(id);
        if !node.active {
            return false;
        }
        match node.parent {
            Some(parent) => self.is_active_in_hierarchy(parent),
            None => true,
        }
    }
}

impl SceneGraph for TransformGraph {
    fn create_node(&mut self, name: &str) -> NodeId {
        self.nodes.push(Node::new(name));
        NodeId(self.nodes.len() - 1)
    }

    fn set_parent(&mut self, child: NodeId, parent: NodeId) {
        assert_ne!(child, parent, "node cannot parent itself");
        self.nodes[child.0].parent = Some(parent);
    }

    fn set_local_position(&mut self, node: NodeId, position: Vec3) {
        self.nodes[node.0].translation = position;
    }

    fn set_local_rotation(&mut self, node: NodeId, rotation: Quat) {
        self.nodes[node.0].rotation = rotation;
    }

    fn set_local_scale(&mut self, node: NodeId, scale: Vec3) {
        self.nodes[node.0].scale = scale;
    }

    fn set_active(&mut self, node: NodeId, active: bool) {
        self.nodes[node.0].active = active;
    }

    fn attach_collider(&mut self, node: NodeId, collider: Collider) {
        self.nodes[node.0].collider = Some(collider);
    }
}
