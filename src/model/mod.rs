// MODEL: Scene graph, camera, and time
pub mod camera;
pub mod clock;
pub mod scene;

pub use camera::Camera;
pub use clock::{Clock, TimeSource};
pub use scene::{
    AmbientLight, CameraHandle, Color, FogExp2, Marker, MeshNode, NodeId, Scene, SceneNode, Shape, SpotLight,
};
