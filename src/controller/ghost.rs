use anyhow::Context;
use glam::Vec3;

use crate::controller::level::GHOST_SPAWN_MARKER;
use crate::controller::player::Locatable;
use crate::model::{Color, MeshNode, NodeId, Scene, Shape};

/// Autonomous entity that reacts to the player `P`.
pub trait Ghost<P> {
    type State;

    /// Called once, after the level has finished loading.
    fn spawn(&mut self, scene: &mut Scene) -> anyhow::Result<Self::State>;

    fn update(&mut self, delta: f32, ghost: &mut Self::State, player: &P, scene: &mut Scene) -> anyhow::Result<()>;
}

#[derive(Debug, Clone)]
pub struct GhostSettings {
    /// Used when the level has no spawn marker.
    pub fallback_spawn: Vec3,
    pub radius: f32,
    pub color: Color,
    pub orbit_radius: f32,
    /// Radians per second around the home point.
    pub orbit_speed: f32,
    pub drift_speed: f32,
    pub awareness_radius: f32,
    /// The ghost never drifts closer than this.
    pub min_distance: f32,
    pub bob_height: f32,
    pub base_opacity: f32,
}

impl Default for GhostSettings {
    fn default() -> Self {
        Self {
            fallback_spawn: Vec3::new(0.0, 1.2, -10.0),
            radius: 0.45,
            color: Color::from_hex(0xc8d6e5),
            orbit_radius: 2.0,
            orbit_speed: 0.4,
            drift_speed: 1.2,
            awareness_radius: 7.0,
            min_distance: 2.5,
            bob_height: 0.15,
            base_opacity: 0.35,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GhostState {
    pub node: NodeId,
    pub home: Vec3,
    pub position: Vec3,
    /// Seconds of simulated time since spawn.
    pub phase: f32,
    pub aware: bool,
}

/// Pale translucent orb that circles its home and stalks a nearby player.
#[derive(Debug, Clone, Default)]
pub struct WanderingGhost {
    settings: GhostSettings,
}

impl WanderingGhost {
    pub fn new(settings: GhostSettings) -> Self {
        Self { settings }
    }

    fn steer(&self, ghost: &GhostState, player: Vec3, delta: f32) -> Vec3 {
        let s = &self.settings;
        let current = Vec3::new(ghost.position.x, ghost.home.y, ghost.position.z);
        let target = if ghost.aware {
            let away = (current - Vec3::new(player.x, ghost.home.y, player.z)).normalize_or_zero();
            Vec3::new(player.x, ghost.home.y, player.z) + away * s.min_distance
        } else {
            let angle = ghost.phase * s.orbit_speed;
            ghost.home + Vec3::new(angle.cos(), 0.0, angle.sin()) * s.orbit_radius
        };
        let to_target = target - current;
        let step = s.drift_speed * delta;
        if to_target.length() <= step {
            target
        } else {
            current + to_target.normalize() * step
        }
    }
}

fn planar_distance(a: Vec3, b: Vec3) -> f32 {
    Vec3::new(a.x - b.x, 0.0, a.z - b.z).length()
}

impl<P: Locatable> Ghost<P> for WanderingGhost {
    type State = GhostState;

    fn spawn(&mut self, scene: &mut Scene) -> anyhow::Result<GhostState> {
        let s = &self.settings;
        let home = match scene.find_marker(GHOST_SPAWN_MARKER) {
            Some(marker) => marker.position,
            None => {
                tracing::warn!(fallback = ?s.fallback_spawn, "level has no ghost spawn marker");
                s.fallback_spawn
            }
        };

        let mut mesh = MeshNode::new("ghost", Shape::Sphere { radius: s.radius }).at(home).colored(s.color);
        mesh.opacity = s.base_opacity;
        mesh.emissive = 0.6;
        mesh.cast_shadow = false;
        mesh.receive_shadow = false;
        let node = scene.add_mesh(mesh);

        tracing::debug!(?home, "ghost spawned");
        Ok(GhostState { node, home, position: home, phase: 0.0, aware: false })
    }

    fn update(&mut self, delta: f32, ghost: &mut GhostState, player: &P, scene: &mut Scene) -> anyhow::Result<()> {
        let player = player.position();
        ghost.phase += delta;

        let aware = planar_distance(ghost.position, player) < self.settings.awareness_radius;
        if aware != ghost.aware {
            if aware {
                tracing::info!(distance = planar_distance(ghost.position, player), "ghost noticed the player");
            } else {
                tracing::info!("ghost lost the player");
            }
            ghost.aware = aware;
        }

        let next = self.steer(ghost, player, delta);
        let bob = (ghost.phase * 2.0).sin() * self.settings.bob_height;
        ghost.position = Vec3::new(next.x, ghost.home.y + bob, next.z);

        let flicker = (ghost.phase * 7.0).sin() * 0.5 + (ghost.phase * 13.0).sin() * 0.5;
        let mesh = scene.mesh_mut(ghost.node).context("ghost mesh is missing from the scene")?;
        mesh.position = ghost.position;
        mesh.opacity = (self.settings.base_opacity + flicker * 0.12).clamp(0.05, 1.0);
        mesh.emissive = if ghost.aware { 0.9 } else { 0.6 };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct At(Vec3);

    impl Locatable for At {
        fn position(&self) -> Vec3 {
            self.0
        }
    }

    fn spawn(scene: &mut Scene) -> (WanderingGhost, GhostState) {
        let mut ghost = WanderingGhost::default();
        let state = <WanderingGhost as Ghost<At>>::spawn(&mut ghost, scene).unwrap();
        (ghost, state)
    }

    #[test]
    fn spawns_at_marker() {
        let mut scene = Scene::new(Color::BLACK, None);
        scene.add_marker(GHOST_SPAWN_MARKER, Vec3::new(3.0, 1.0, -4.0));
        let (_, state) = spawn(&mut scene);
        assert_eq!(state.home, Vec3::new(3.0, 1.0, -4.0));
        let mesh = scene.mesh(state.node).unwrap();
        assert!(mesh.is_transparent());
        assert!(!mesh.cast_shadow);
    }

    #[test]
    fn spawns_at_fallback_without_marker() {
        let mut scene = Scene::new(Color::BLACK, None);
        let (_, state) = spawn(&mut scene);
        assert_eq!(state.position, GhostSettings::default().fallback_spawn);
    }

    #[test]
    fn distant_player_is_ignored() {
        let mut scene = Scene::new(Color::BLACK, None);
        let (mut ghost, mut state) = spawn(&mut scene);
        let player = At(Vec3::new(50.0, 0.0, 50.0));
        for _ in 0..50 {
            ghost.update(0.05, &mut state, &player, &mut scene).unwrap();
        }
        assert!(!state.aware);
        let orbit = GhostSettings::default().orbit_radius;
        assert!(planar_distance(state.position, state.home) <= orbit + 1e-3);
    }

    #[test]
    fn nearby_player_is_stalked_but_not_touched() {
        let mut scene = Scene::new(Color::BLACK, None);
        let (mut ghost, mut state) = spawn(&mut scene);
        let player = At(state.home + Vec3::new(5.0, 0.0, 0.0));
        for _ in 0..200 {
            ghost.update(0.05, &mut state, &player, &mut scene).unwrap();
        }
        assert!(state.aware);
        let distance = planar_distance(state.position, player.0);
        assert!((distance - GhostSettings::default().min_distance).abs() < 0.05, "distance {distance}");
        assert_eq!(scene.mesh(state.node).unwrap().position, state.position);
    }

    #[test]
    fn opacity_stays_visible_while_flickering() {
        let mut scene = Scene::new(Color::BLACK, None);
        let (mut ghost, mut state) = spawn(&mut scene);
        let player = At(Vec3::new(50.0, 0.0, 50.0));
        for _ in 0..100 {
            ghost.update(0.033, &mut state, &player, &mut scene).unwrap();
            let opacity = scene.mesh(state.node).unwrap().opacity;
            assert!((0.05..1.0).contains(&opacity));
        }
    }

    #[test]
    fn awareness_radius_comes_from_settings() {
        let mut scene = Scene::new(Color::BLACK, None);
        let settings = GhostSettings { awareness_radius: 100.0, ..GhostSettings::default() };
        let mut ghost = WanderingGhost::new(settings);
        let mut state = <WanderingGhost as Ghost<At>>::spawn(&mut ghost, &mut scene).unwrap();
        ghost.update(0.05, &mut state, &At(Vec3::new(50.0, 0.0, 50.0)), &mut scene).unwrap();
        assert!(state.aware);
        assert_eq!(scene.mesh(state.node).unwrap().emissive, 0.9);
    }

    #[test]
    fn missing_mesh_is_an_error() {
        let mut scene = Scene::new(Color::BLACK, None);
        let (mut ghost, mut state) = spawn(&mut scene);
        let mut other = Scene::new(Color::BLACK, None);
        let err = ghost.update(0.1, &mut state, &At(Vec3::ZERO), &mut other).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
