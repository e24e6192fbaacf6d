use std::future::Future;

use anyhow::ensure;
use glam::Vec3;

use crate::model::{Color, MeshNode, Scene, Shape};

/// Marker the level leaves where the ghost should appear.
pub const GHOST_SPAWN_MARKER: &str = "ghost_spawn";

/// Static geometry source, loaded once before the ghost spawns.
pub trait Level {
    fn load(&mut self, scene: &mut Scene) -> impl Future<Output = anyhow::Result<()>>;
}

#[derive(Debug, Clone)]
pub struct HouseLayout {
    pub ground_size: f32,
    /// House footprint centre on the ground plane.
    pub center: Vec3,
    pub width: f32,
    pub depth: f32,
    pub wall_height: f32,
    pub wall_thickness: f32,
    pub doorway_width: f32,
}

impl Default for HouseLayout {
    fn default() -> Self {
        Self {
            ground_size: 60.0,
            center: Vec3::new(0.0, 0.0, -6.0),
            width: 10.0,
            depth: 8.0,
            wall_height: 3.0,
            wall_thickness: 0.2,
            doorway_width: 1.6,
        }
    }
}

const GROUND: Color = Color::from_hex(0x1b1f16);
const WALL: Color = Color::from_hex(0x3b3129);
const ROOF: Color = Color::from_hex(0x221a15);
const WOOD: Color = Color::from_hex(0x4a3525);
const LINEN: Color = Color::from_hex(0x8c8577);
const BARK: Color = Color::from_hex(0x2a2119);

/// Abandoned farmhouse in an open field with a few dead trees.
#[derive(Debug, Clone, Default)]
pub struct HauntedHouseLevel {
    layout: HouseLayout,
}

impl HauntedHouseLevel {
    pub fn new(layout: HouseLayout) -> Self {
        Self { layout }
    }

    fn ground(&self, scene: &mut Scene) {
        let size = self.layout.ground_size;
        let mut ground = MeshNode::new("ground", Shape::Plane { width: size, depth: size }).colored(GROUND);
        ground.cast_shadow = false;
        scene.add_mesh(ground);
    }

    fn walls(&self, scene: &mut Scene) {
        let HouseLayout { center, width, depth, wall_height: h, wall_thickness: t, doorway_width, .. } = self.layout;
        let y = h / 2.0;
        let front_z = center.z + depth / 2.0;
        let back_z = center.z - depth / 2.0;

        let wall = |name: &str, size: Vec3, at: Vec3| MeshNode::new(name, Shape::Box { size }).at(at).colored(WALL);

        scene.add_mesh(wall("wall_back", Vec3::new(width, h, t), Vec3::new(center.x, y, back_z)));
        scene.add_mesh(wall("wall_left", Vec3::new(t, h, depth), Vec3::new(center.x - width / 2.0, y, center.z)));
        scene.add_mesh(wall("wall_right", Vec3::new(t, h, depth), Vec3::new(center.x + width / 2.0, y, center.z)));

        // front wall is split around the doorway
        let segment = (width - doorway_width) / 2.0;
        let offset = doorway_width / 2.0 + segment / 2.0;
        scene.add_mesh(wall("wall_front_left", Vec3::new(segment, h, t), Vec3::new(center.x - offset, y, front_z)));
        scene.add_mesh(wall("wall_front_right", Vec3::new(segment, h, t), Vec3::new(center.x + offset, y, front_z)));
        let lintel = 0.8;
        scene.add_mesh(wall(
            "wall_front_lintel",
            Vec3::new(doorway_width, lintel, t),
            Vec3::new(center.x, h - lintel / 2.0, front_z),
        ));

        let roof = MeshNode::new("roof", Shape::Box { size: Vec3::new(width + 0.6, 0.25, depth + 0.6) })
            .at(Vec3::new(center.x, h + 0.125, center.z))
            .colored(ROOF);
        scene.add_mesh(roof);
    }

    fn furniture(&self, scene: &mut Scene) {
        let c = self.layout.center;
        let pieces = [
            ("table", Vec3::new(1.6, 0.8, 0.9), Vec3::new(-2.0, 0.4, 1.0), WOOD, 0.3),
            ("bed", Vec3::new(2.0, 0.6, 1.4), Vec3::new(3.2, 0.3, -2.4), LINEN, 0.0),
            ("wardrobe", Vec3::new(1.2, 2.2, 0.6), Vec3::new(-4.2, 1.1, -3.3), WOOD, 0.0),
            ("chair", Vec3::new(0.5, 1.0, 0.5), Vec3::new(-0.8, 0.5, 1.6), WOOD, 0.7),
        ];
        for (name, size, offset, color, yaw) in pieces {
            let mut node = MeshNode::new(name, Shape::Box { size }).at(c + offset).colored(color);
            node.yaw = yaw;
            scene.add_mesh(node);
        }
    }

    fn trees(&self, scene: &mut Scene) {
        let spots = [(-14.0, 4.0), (-11.0, -16.0), (12.0, -12.0), (16.0, 6.0), (6.0, 18.0)];
        for (i, (x, z)) in spots.into_iter().enumerate() {
            let trunk = MeshNode::new(format!("tree_{i}"), Shape::Box { size: Vec3::new(0.4, 5.0, 0.4) })
                .at(Vec3::new(x, 2.5, z))
                .colored(BARK);
            scene.add_mesh(trunk);
        }
    }
}

impl Level for HauntedHouseLevel {
    async fn load(&mut self, scene: &mut Scene) -> anyhow::Result<()> {
        let layout = &self.layout;
        ensure!(
            layout.doorway_width > 0.0 && layout.doorway_width < layout.width,
            "doorway width {} does not fit a {} wide house",
            layout.doorway_width,
            layout.width
        );
        ensure!(layout.wall_height > 1.0, "wall height {} is too low", layout.wall_height);

        let before = scene.len();
        self.ground(scene);
        self.walls(scene);
        self.furniture(scene);
        self.trees(scene);
        let spawn = layout.center + Vec3::new(0.0, 1.2, -layout.depth / 4.0);
        scene.add_marker(GHOST_SPAWN_MARKER, spawn);

        tracing::info!(nodes = scene.len() - before, "haunted house loaded");
        Ok(())
    }
}
