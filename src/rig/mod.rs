//! Maps tracked skeletons onto a persistent hierarchy of joint, bone and
//! head transform nodes carrying collision volumes. The hierarchy is built
//! once; only per-node position/rotation/scale mutate per tick.

use glam::{Quat, Vec3};

use crate::{
    scene::{Collider, NodeId, SceneGraph},
    tracking::SkeletonEvent,
    types::{JointType, Skeleton},
};

/// Sensor positions are millimeters with Y pointing down; the rig works in
/// meters with Y up. This is the only place that knowledge lives.
pub fn convert_position_mm(pos_mm: Vec3) -> Vec3 {
    0.001 * Vec3::new(pos_mm.x, -pos_mm.y, pos_mm.z)
}

const DEFAULT_JOINT_RADIUS: f32 = 0.075;

/// Below this segment length (meters) a bone direction is degenerate and
/// the previous rotation is kept.
const DEGENERATE_DIRECTION: f32 = 1e-6;

/// Static collider size per joint. Face landmarks contribute no collider;
/// the spine is enlarged, neck/head/clavicles and hands shrunk.
fn joint_radius(joint_type: JointType) -> f32 {
    use JointType::*;
    match joint_type {
        Neck | Head | ClavicleLeft | ClavicleRight => 0.05,
        SpineNavel | SpineChest | Pelvis => 0.2,
        EyeLeft | EyeRight | Nose | EarLeft | EarRight => 0.0,
        HandLeft | HandTipLeft | ThumbLeft | HandRight | HandTipRight | ThumbRight => 0.033,
        _ => DEFAULT_JOINT_RADIUS,
    }
}

/// Bones by child joint, grouped by capsule radius. Face landmarks grow no
/// bones.
const BONE_GROUPS: &[(f32, &[JointType])] = &[
    // Spine
    (3.0, &[JointType::SpineNavel, JointType::SpineChest, JointType::Neck]),
    // Head
    (1.5, &[JointType::Head]),
    // Right arm
    (
        1.5,
        &[
            JointType::ClavicleRight,
            JointType::ShoulderRight,
            JointType::ElbowRight,
            JointType::WristRight,
        ],
    ),
    // Right hand
    (0.5, &[JointType::HandRight, JointType::HandTipRight, JointType::ThumbRight]),
    // Left arm
    (
        1.5,
        &[
            JointType::ClavicleLeft,
            JointType::ShoulderLeft,
            JointType::ElbowLeft,
            JointType::WristLeft,
        ],
    ),
    // Left hand
    (0.5, &[JointType::HandLeft, JointType::HandTipLeft, JointType::ThumbLeft]),
    // Right leg
    (
        2.0,
        &[
            JointType::HipRight,
            JointType::KneeRight,
            JointType::AnkleRight,
            JointType::FootRight,
        ],
    ),
    // Left leg
    (
        2.0,
        &[
            JointType::HipLeft,
            JointType::KneeLeft,
            JointType::AnkleLeft,
            JointType::FootLeft,
        ],
    ),
];

struct RigBone {
    parent_joint: JointType,
    child_joint: JointType,
    node: NodeId,
    last_rotation: Quat,
}

/// The persistent rig. Two states: Hidden (root deactivated, the initial
/// state and the response to an empty tick) and Visible (full placement
/// pass applied, root active).
pub struct RigMapper {
    root: NodeId,
    joints: Vec<NodeId>,
    bones: Vec<RigBone>,
    head: NodeId,
    head_last_rotation: Quat,
    visible: bool,
}

impl RigMapper {
    /// Builds the node hierarchy under `parent` (or free-standing). The
    /// topology never changes afterwards.
    pub fn new(graph: &mut impl SceneGraph, parent: Option<NodeId>) -> Self {
        let root = graph.create_node("skeleton:root");
        if let Some(parent) = parent {
            graph.set_parent(root, parent);
        }
        graph.set_active(root, false);

        // Joints are spheres; the per-type radius lands in the node scale,
        // the collider itself is a unit-ish sphere.
        let mut joints = Vec::with_capacity(JointType::COUNT);
        for joint_type in JointType::ALL {
            let node = graph.create_node(&format!("{joint_type:?}:joint"));
            graph.set_parent(node, root);
            graph.set_local_scale(node, Vec3::splat(joint_radius(joint_type)));
            graph.attach_collider(node, Collider::Sphere { radius: 0.5 });
            joints.push(node);
        }

        let mut bones = Vec::new();
        for &(bone_radius, children) in BONE_GROUPS {
            for &child_joint in children {
                let parent_joint = child_joint.parent();
                let node =
                    graph.create_node(&format!("{parent_joint:?}->{child_joint:?}:pos"));
                graph.set_parent(node, root);

                // The capsule lives on a static child so the bone node's
                // per-tick scale stretches it from parent to child joint.
                let shape =
                    graph.create_node(&format!("{parent_joint:?}->{child_joint:?}:bone"));
                graph.set_parent(shape, node);
                graph.set_local_scale(shape, Vec3::new(0.033, 0.5, 0.033));
                graph.set_local_position(shape, 0.5 * Vec3::Y);
                graph.attach_collider(
                    shape,
                    Collider::Capsule {
                        radius: bone_radius,
                        height: 2.0,
                    },
                );

                bones.push(RigBone {
                    parent_joint,
                    child_joint,
                    node,
                    last_rotation: Quat::IDENTITY,
                });
            }
        }

        let head = graph.create_node("skeleton:head");
        graph.set_parent(head, root);
        graph.attach_collider(head, Collider::Sphere { radius: 0.5 });

        RigMapper {
            root,
            joints,
            bones,
            head,
            head_last_rotation: Quat::IDENTITY,
            visible: false,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn joint_node(&self, joint_type: JointType) -> NodeId {
        self.joints[joint_type.index()]
    }

    pub fn head_node(&self) -> NodeId {
        self.head
    }

    pub fn bone_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.bones.iter().map(|bone| bone.node)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Per-tick update. Empty hides the rig; a skeleton runs the full
    /// placement pass and shows it.
    pub fn apply(&mut self, graph: &mut impl SceneGraph, event: &SkeletonEvent) {
        match event {
            SkeletonEvent::Empty => self.hide(graph),
            SkeletonEvent::Tracked(skeleton) => self.show(graph, skeleton),
        }
    }

    fn hide(&mut self, graph: &mut impl SceneGraph) {
        graph.set_active(self.root, false);
        self.visible = false;
    }

    fn show(&mut self, graph: &mut impl SceneGraph, skeleton: &Skeleton) {
        self.place_joints(graph, skeleton);
        self.place_bones(graph, skeleton);
        self.place_head(graph, skeleton);
        graph.set_active(self.root, true);
        self.visible = true;
    }

    fn place_joints(&self, graph: &mut impl SceneGraph, skeleton: &Skeleton) {
        for joint_type in JointType::ALL {
            let position = convert_position_mm(skeleton[joint_type].position_mm);
            graph.set_local_position(self.joint_node(joint_type), position);
        }
    }

    fn place_bones(&mut self, graph: &mut impl SceneGraph, skeleton: &Skeleton) {
        for bone in &mut self.bones {
            let parent_pos = convert_position_mm(skeleton[bone.parent_joint].position_mm);
            let child_pos = convert_position_mm(skeleton[bone.child_joint].position_mm);
            let direction = child_pos - parent_pos;
            let length = direction.length();

            let rotation = if length > DEGENERATE_DIRECTION {
                Quat::from_rotation_arc(Vec3::Y, direction / length)
            } else {
                // Degenerate segment: keep the previous rotation rather
                // than snapping to identity.
                bone.last_rotation
            };
            bone.last_rotation = rotation;

            graph.set_local_position(bone.node, parent_pos);
            graph.set_local_scale(bone.node, Vec3::new(1.0, length, 1.0));
            graph.set_local_rotation(bone.node, rotation);
        }
    }

    /// Ellipsoid approximating the head from sparse landmarks: centered
    /// between the ears, long axis from the head joint through that
    /// midpoint.
    fn place_head(&mut self, graph: &mut impl SceneGraph, skeleton: &Skeleton) {
        let head_pos = convert_position_mm(skeleton[JointType::Head].position_mm);
        let ear_right = convert_position_mm(skeleton[JointType::EarRight].position_mm);
        let ear_left = convert_position_mm(skeleton[JointType::EarLeft].position_mm);

        let center = 0.5 * (ear_right + ear_left);
        let ear_span = (ear_right - ear_left).length();
        let axis = center - head_pos;
        let height = axis.length();

        let rotation = if height > DEGENERATE_DIRECTION {
            Quat::from_rotation_arc(Vec3::Y, axis / height)
        } else {
            self.head_last_rotation
        };
        self.head_last_rotation = rotation;

        graph.set_local_position(self.head, center);
        graph.set_local_rotation(self.head, rotation);
        graph.set_local_scale(self.head, Vec3::new(ear_span, 2.0 * height, ear_span));
    }
}
