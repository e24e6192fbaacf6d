use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;

use super::camera::Camera;

/// Camera shared between the runtime loop and the player.
pub type CameraHandle = Rc<RefCell<Camera>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0 };

    /// `0xRRGGBB`
    pub const fn from_hex(hex: u32) -> Self {
        Self {
            r: ((hex >> 16) & 0xff) as f32 / 255.0,
            g: ((hex >> 8) & 0xff) as f32 / 255.0,
            b: (hex & 0xff) as f32 / 255.0,
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn scaled(self, factor: f32) -> [f32; 3] {
        [self.r * factor, self.g * factor, self.b * factor]
    }
}

/// Exponential-squared fog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FogExp2 {
    pub color: Color,
    pub density: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

/// Cone light. Position and target are in the parent's local frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SpotLight {
    pub color: Color,
    pub intensity: f32,
    pub angle: f32,
    pub distance: f32,
    pub penumbra: f32,
    pub cast_shadow: bool,
    pub position: Vec3,
    pub target: Vec3,
}

impl SpotLight {
    pub fn direction(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Box { size: Vec3 },
    /// Horizontal plane centred on the node position.
    Plane { width: f32, depth: f32 },
    Sphere { radius: f32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshNode {
    pub name: String,
    pub shape: Shape,
    pub position: Vec3,
    /// Rotation about +Y in radians.
    pub yaw: f32,
    pub color: Color,
    pub opacity: f32,
    /// Self-illumination added on top of received light.
    pub emissive: f32,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub visible: bool,
}

impl MeshNode {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            position: Vec3::ZERO,
            yaw: 0.0,
            color: Color::WHITE,
            opacity: 1.0,
            emissive: 0.0,
            cast_shadow: true,
            receive_shadow: true,
            visible: true,
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn colored(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn is_transparent(&self) -> bool {
        self.opacity < 1.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub name: String,
    pub position: Vec3,
}

#[derive(Debug)]
pub enum SceneNode {
    Mesh(MeshNode),
    AmbientLight(AmbientLight),
    Camera(CameraHandle),
    Marker(Marker),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// Root of everything renderable or lit in one session.
///
/// Nodes are only ever added; ids stay valid for the life of the scene.
#[derive(Debug)]
pub struct Scene {
    pub background: Color,
    pub fog: Option<FogExp2>,
    nodes: Vec<SceneNode>,
}

impl Scene {
    pub fn new(background: Color, fog: Option<FogExp2>) -> Self {
        Self { background, fog, nodes: Vec::new() }
    }

    pub fn add(&mut self, node: SceneNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    pub fn add_mesh(&mut self, mesh: MeshNode) -> NodeId {
        self.add(SceneNode::Mesh(mesh))
    }

    pub fn add_marker(&mut self, name: impl Into<String>, position: Vec3) -> NodeId {
        self.add(SceneNode::Marker(Marker { name: name.into(), position }))
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn mesh(&self, id: NodeId) -> Option<&MeshNode> {
        match self.nodes.get(id.0) {
            Some(SceneNode::Mesh(mesh)) => Some(mesh),
            _ => None,
        }
    }

    pub fn mesh_mut(&mut self, id: NodeId) -> Option<&mut MeshNode> {
        match self.nodes.get_mut(id.0) {
            Some(SceneNode::Mesh(mesh)) => Some(mesh),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &SceneNode> {
        self.nodes.iter()
    }

    pub fn meshes(&self) -> impl Iterator<Item = &MeshNode> {
        self.nodes.iter().filter_map(|node| match node {
            SceneNode::Mesh(mesh) => Some(mesh),
            _ => None,
        })
    }

    pub fn ambient_lights(&self) -> impl Iterator<Item = &AmbientLight> {
        self.nodes.iter().filter_map(|node| match node {
            SceneNode::AmbientLight(light) => Some(light),
            _ => None,
        })
    }

    pub fn cameras(&self) -> impl Iterator<Item = &CameraHandle> {
        self.nodes.iter().filter_map(|node| match node {
            SceneNode::Camera(camera) => Some(camera),
            _ => None,
        })
    }

    pub fn find_marker(&self, name: &str) -> Option<&Marker> {
        self.nodes.iter().find_map(|node| match node {
            SceneNode::Marker(marker) if marker.name == name => Some(marker),
            _ => None,
        })
    }
}
