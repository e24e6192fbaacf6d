use std::f32::consts::PI;

use bytemuck::NoUninit;
use glam::{Mat4, Quat, Vec3};
use wgpu::util::DeviceExt;

use crate::model::{MeshNode, Shape};

const SPHERE_STACKS: u32 = 12;
const SPHERE_SLICES: u32 = 16;

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, NoUninit)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    /// Linear RGB plus opacity.
    pub color: [f32; 4],
    pub emissive: f32,
}

impl Vertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 4] = [
        wgpu::VertexAttribute { offset: 0, shader_location: 0, format: wgpu::VertexFormat::Float32x3 },
        wgpu::VertexAttribute { offset: 12, shader_location: 1, format: wgpu::VertexFormat::Float32x3 },
        wgpu::VertexAttribute { offset: 24, shader_location: 2, format: wgpu::VertexFormat::Float32x4 },
        wgpu::VertexAttribute { offset: 40, shader_location: 3, format: wgpu::VertexFormat::Float32 },
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

pub struct MeshBuffer {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

/// Triangle list in world space, counter-clockwise front faces.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn append(&mut self, other: Mesh) {
        let base = self.vertices.len() as u32;
        self.vertices.extend(other.vertices);
        self.indices.extend(other.indices.into_iter().map(|i| i + base));
    }

    /// `None` for an empty mesh; wgpu rejects zero-sized buffers.
    pub fn upload(&self, device: &wgpu::Device) -> Option<MeshBuffer> {
        if self.is_empty() {
            return None;
        }
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: bytemuck::cast_slice(&self.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: bytemuck::cast_slice(&self.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Some(MeshBuffer {
            vertex_buffer,
            index_buffer,
            index_count: self.indices.len() as u32,
        })
    }
}

/// Tessellate a scene node into world-space triangles.
pub fn tessellate(node: &MeshNode) -> Mesh {
    let mut mesh = match node.shape {
        Shape::Box { size } => box_mesh(size * 0.5),
        Shape::Plane { width, depth } => {
            let mut mesh = Mesh::empty();
            quad(&mut mesh, Vec3::Y, Vec3::Z, Vec3::X, Vec3::new(width / 2.0, 0.0, depth / 2.0));
            mesh
        }
        Shape::Sphere { radius } => sphere_mesh(radius),
    };

    let transform = Mat4::from_rotation_translation(Quat::from_rotation_y(node.yaw), node.position);
    let color = [node.color.r, node.color.g, node.color.b, node.opacity.clamp(0.0, 1.0)];
    for v in mesh.vertices.iter_mut() {
        v.pos = transform.transform_point3(Vec3::from(v.pos)).to_array();
        v.normal = transform.transform_vector3(Vec3::from(v.normal)).to_array();
        v.color = color;
        v.emissive = node.emissive;
    }
    mesh
}

/// One face with outward normal `n`; `u × v` must equal `n`.
fn quad(mesh: &mut Mesh, n: Vec3, u: Vec3, v: Vec3, half: Vec3) {
    let center = n * half;
    let (u, v) = (u * half, v * half);
    let base = mesh.vertices.len() as u32;
    for corner in [center - u - v, center + u - v, center + u + v, center - u + v] {
        mesh.vertices.push(Vertex { pos: corner.to_array(), normal: n.to_array(), color: [1.0; 4], emissive: 0.0 });
    }
    mesh.indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
}

fn box_mesh(half: Vec3) -> Mesh {
    let mut mesh = Mesh::empty();
    let faces = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y, Vec3::X),
    ];
    for (n, u, v) in faces {
        quad(&mut mesh, n, u, v, half);
    }
    mesh
}

fn sphere_mesh(radius: f32) -> Mesh {
    let mut mesh = Mesh::empty();
    for i in 0..=SPHERE_STACKS {
        let phi = PI * i as f32 / SPHERE_STACKS as f32;
        for j in 0..=SPHERE_SLICES {
            let theta = 2.0 * PI * j as f32 / SPHERE_SLICES as f32;
            let n = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
            mesh.vertices.push(Vertex { pos: (n * radius).to_array(), normal: n.to_array(), color: [1.0; 4], emissive: 0.0 });
        }
    }
    let row = SPHERE_SLICES + 1;
    for i in 0..SPHERE_STACKS {
        for j in 0..SPHERE_SLICES {
            let a = i * row + j;
            let b = a + row;
            mesh.indices.extend([a, a + 1, b, a + 1, b + 1, b]);
        }
    }
    mesh
}
