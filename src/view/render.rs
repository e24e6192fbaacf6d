use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::*;

use crate::config::SurfaceOptions;
use crate::error::BackendError;
use crate::model::{Camera, MeshNode, Scene};
use crate::view::backend::{RenderBackend, RenderSurface};
use crate::view::gpu_init::{self, GpuContext};
use crate::view::mesh::{tessellate, Mesh, MeshBuffer, Vertex};

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
const MSAA_SAMPLES: u32 = 4;

/// Per-frame uniform shared by the vertex and fragment stages.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SceneUniform {
    pub view_proj: [[f32; 4]; 4],
    pub eye: [f32; 4],
    /// rgb, exp2 density
    pub fog: [f32; 4],
    pub ambient: [f32; 4],
    /// xyz, range (0 = no spotlight)
    pub spot_position: [f32; 4],
    /// xyz, cos of the cone half-angle
    pub spot_direction: [f32; 4],
    /// rgb * intensity, cos of the fully lit inner cone
    pub spot_color: [f32; 4],
}

impl SceneUniform {
    pub fn new(scene: &Scene, camera: &Camera) -> Self {
        let eye = camera.eye;
        let fog = match scene.fog {
            Some(fog) => [fog.color.r, fog.color.g, fog.color.b, fog.density],
            None => [scene.background.r, scene.background.g, scene.background.b, 0.0],
        };

        let ambient = scene.ambient_lights().fold(Vec3::ZERO, |acc, light| {
            acc + Vec3::from(light.color.scaled(light.intensity))
        });

        let mut uniform = SceneUniform {
            view_proj: camera.view_proj().to_cols_array_2d(),
            eye: eye.extend(1.0).to_array(),
            fog,
            ambient: ambient.extend(0.0).to_array(),
            spot_position: [0.0; 4],
            spot_direction: [0.0, 0.0, -1.0, 1.0],
            spot_color: [0.0; 4],
        };

        // the shader has one spotlight slot: the first light attached to the camera
        if let Some(light) = camera.lights().first() {
            let position = camera.local_to_world_point(light.position);
            let direction = camera.local_to_world_direction(light.direction());
            let range = if light.distance > 0.0 { light.distance } else { f32::MAX };
            let cos_outer = light.angle.cos();
            let cos_inner = (light.angle * (1.0 - light.penumbra.clamp(0.0, 1.0))).cos().max(cos_outer + 1e-4);

            uniform.spot_position = position.extend(range).to_array();
            uniform.spot_direction = direction.extend(cos_outer).to_array();
            let [r, g, b] = light.color.scaled(light.intensity);
            uniform.spot_color = [r, g, b, cos_inner];
        }
        uniform
    }
}

/// Visible meshes split into opaque and translucent, the latter sorted back to front.
pub fn draw_order<'a>(scene: &'a Scene, eye: Vec3) -> (Vec<&'a MeshNode>, Vec<&'a MeshNode>) {
    let (mut translucent, opaque): (Vec<_>, Vec<_>) =
        scene.meshes().filter(|m| m.visible && m.opacity > 0.0).partition(|m| m.is_transparent());
    translucent.sort_by(|a, b| {
        let da = a.position.distance_squared(eye);
        let db = b.position.distance_squared(eye);
        db.total_cmp(&da)
    });
    (opaque, translucent)
}

fn batch<'a>(nodes: impl IntoIterator<Item = &'a MeshNode>) -> Mesh {
    let mut mesh = Mesh::empty();
    for node in nodes {
        mesh.append(tessellate(node));
    }
    mesh
}

/// Opaque geometry, tessellated and uploaded again only when its nodes change.
struct StaticBatch<T> {
    nodes: Vec<MeshNode>,
    uploaded: Option<T>,
    rebuilds: usize,
}

impl<T> StaticBatch<T> {
    fn new() -> Self {
        Self { nodes: Vec::new(), uploaded: None, rebuilds: 0 }
    }

    fn get_or_rebuild(&mut self, nodes: &[&MeshNode], upload: impl FnOnce(Mesh) -> Option<T>) -> Option<&T> {
        let unchanged = self.rebuilds > 0
            && self.nodes.len() == nodes.len()
            && self.nodes.iter().zip(nodes).all(|(cached, node)| cached == *node);
        if !unchanged {
            self.nodes = nodes.iter().map(|node| (*node).clone()).collect();
            self.uploaded = upload(batch(nodes.iter().copied()));
            self.rebuilds += 1;
        }
        self.uploaded.as_ref()
    }
}

pub fn create_depth_texture(device: &Device, width: u32, height: u32, sample_count: u32) -> (Texture, TextureView) {
    let depth_texture = device.create_texture(&TextureDescriptor {
        label: Some("depth_texture"),
        size: Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let depth_view = depth_texture.create_view(&TextureViewDescriptor::default());
    (depth_texture, depth_view)
}

fn create_msaa_view(device: &Device, config: &SurfaceConfiguration, sample_count: u32) -> Option<TextureView> {
    if sample_count <= 1 {
        return None;
    }
    let texture = device.create_texture(&TextureDescriptor {
        label: Some("msaa_color"),
        size: Extent3d { width: config.width, height: config.height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count,
        dimension: TextureDimension::D2,
        format: config.format,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    Some(texture.create_view(&TextureViewDescriptor::default()))
}

struct ScenePipelines {
    opaque: RenderPipeline,
    translucent: RenderPipeline,
    uniform_buffer: Buffer,
    bind_group: BindGroup,
}

fn create_scene_pipeline(
    device: &Device,
    layout: &PipelineLayout,
    shader: &ShaderModule,
    format: TextureFormat,
    sample_count: u32,
    depth_write: bool,
) -> RenderPipeline {
    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(if depth_write { "opaque_pipeline" } else { "translucent_pipeline" }),
        layout: Some(layout),
        vertex: VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[Vertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(ColorTargetState { format, blend: Some(BlendState::ALPHA_BLENDING), write_mask: ColorWrites::ALL })],
            compilation_options: Default::default(),
        }),
        primitive: PrimitiveState {
            topology: PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: FrontFace::Ccw,
            cull_mode: Some(Face::Back),
            polygon_mode: PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: depth_write,
            depth_compare: CompareFunction::Less,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: MultisampleState { count: sample_count, mask: !0, alpha_to_coverage_enabled: false },
        multiview: None,
        cache: None,
    })
}

impl ScenePipelines {
    fn new(device: &Device, format: TextureFormat, sample_count: u32) -> Self {
        let uniform_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("scene_uniform"),
            size: std::mem::size_of::<SceneUniform>() as BufferAddress,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("scene_bind_group_layout"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("scene_bind_group"),
            layout: &bind_group_layout,
            entries: &[BindGroupEntry { binding: 0, resource: uniform_buffer.as_entire_binding() }],
        });

        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("scene_shader"),
            source: ShaderSource::Wgsl(include_str!("shaders/scene.wgsl").into()),
        });

        let layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Self {
            opaque: create_scene_pipeline(device, &layout, &shader, format, sample_count, true),
            translucent: create_scene_pipeline(device, &layout, &shader, format, sample_count, false),
            uniform_buffer,
            bind_group,
        }
    }
}

/// Configured swapchain plus its depth and multisample targets.
pub struct WgpuSurface {
    surface: Surface<'static>,
    config: SurfaceConfiguration,
    sample_count: u32,
    depth_view: TextureView,
    msaa_view: Option<TextureView>,
    /// Recorded for the shadow pass; no shadow maps are rendered yet.
    pub shadow_map: bool,
}

impl WgpuSurface {
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    fn rebuild_targets(&mut self, device: &Device) {
        self.surface.configure(device, &self.config);
        self.depth_view = create_depth_texture(device, self.config.width, self.config.height, self.sample_count).1;
        self.msaa_view = create_msaa_view(device, &self.config, self.sample_count);
    }
}

impl RenderSurface for WgpuSurface {
    fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }
}

/// `RenderBackend` on wgpu: WebGPU/WebGL2 in the browser, native APIs elsewhere.
pub struct WgpuBackend {
    device: Arc<Device>,
    queue: Arc<Queue>,
    adapter: Adapter,
    /// Surface created at connect time, configured by `create_surface`.
    pending: Option<Surface<'static>>,
    /// Canvas (or window) the pending surface is bound to.
    target: String,
    pipelines: Option<ScenePipelines>,
    opaque: StaticBatch<MeshBuffer>,
}

impl WgpuBackend {
    pub fn new(gpu: GpuContext, target: impl Into<String>) -> Self {
        let GpuContext { device, queue, adapter, surface } = gpu;
        Self { device, queue, adapter, pending: Some(surface), target: target.into(), pipelines: None, opaque: StaticBatch::new() }
    }

    /// Look up `canvas_id` on the page and connect to it.
    #[cfg(target_arch = "wasm32")]
    pub async fn connect_canvas(document: &web_sys::Document, canvas_id: &str) -> Result<Self, BackendError> {
        use wasm_bindgen::JsCast;

        let canvas = document
            .get_element_by_id(canvas_id)
            .and_then(|el| el.dyn_into::<web_sys::HtmlCanvasElement>().ok())
            .ok_or_else(|| BackendError::CanvasNotFound(canvas_id.to_string()))?;
        let gpu = GpuContext::connect_canvas(&canvas).await?;
        Ok(Self::new(gpu, canvas_id))
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub async fn connect_window(window: Arc<winit::window::Window>, target: &str) -> Result<Self, BackendError> {
        let gpu = GpuContext::connect_window(window).await?;
        Ok(Self::new(gpu, target))
    }

    fn acquire(&self, surface: &mut WgpuSurface) -> Result<Option<SurfaceTexture>, BackendError> {
        match surface.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(SurfaceError::Lost | SurfaceError::Outdated) => {
                tracing::debug!("surface lost, reconfiguring");
                surface.rebuild_targets(&self.device);
                surface
                    .surface
                    .get_current_texture()
                    .map(Some)
                    .map_err(|e| BackendError::Frame(e.to_string()))
            }
            Err(SurfaceError::Timeout) => {
                tracing::debug!("surface timeout, skipping frame");
                Ok(None)
            }
            Err(e) => Err(BackendError::Frame(e.to_string())),
        }
    }
}

impl RenderBackend for WgpuBackend {
    type Surface = WgpuSurface;

    fn create_surface(&mut self, options: &SurfaceOptions) -> Result<WgpuSurface, BackendError> {
        if options.canvas_id != self.target {
            return Err(BackendError::CanvasMismatch { bound: self.target.clone(), requested: options.canvas_id.clone() });
        }
        let surface = self
            .pending
            .take()
            .ok_or_else(|| BackendError::Surface("render surface was already created".into()))?;

        let config = gpu_init::surface_config(&self.adapter, &surface, options.width, options.height)?;
        surface.configure(&self.device, &config);

        let wanted = if options.antialias { MSAA_SAMPLES } else { 1 };
        let sample_count = gpu_init::supported_sample_count(&self.adapter, config.format, wanted);
        if sample_count != wanted {
            tracing::warn!(wanted, sample_count, "multisampling not supported for surface format");
        }

        self.pipelines = Some(ScenePipelines::new(&self.device, config.format, sample_count));
        let (_, depth_view) = create_depth_texture(&self.device, config.width, config.height, sample_count);
        let msaa_view = create_msaa_view(&self.device, &config, sample_count);

        tracing::info!(
            target = %self.target,
            width = config.width,
            height = config.height,
            format = ?config.format,
            sample_count,
            "render surface ready"
        );
        Ok(WgpuSurface { surface, config, sample_count, depth_view, msaa_view, shadow_map: options.shadow_map })
    }

    fn resize_surface(&mut self, surface: &mut WgpuSurface, width: u32, height: u32) -> Result<(), BackendError> {
        let limit = self.device.limits().max_texture_dimension_2d;
        if width == 0 || height == 0 || width > limit || height > limit {
            return Err(BackendError::Surface(format!("cannot resize to {width}x{height} (limit {limit})")));
        }
        surface.config.width = width;
        surface.config.height = height;
        surface.rebuild_targets(&self.device);
        Ok(())
    }

    fn render(&mut self, surface: &mut WgpuSurface, scene: &Scene, camera: &Camera) -> Result<(), BackendError> {
        let pipelines = self
            .pipelines
            .as_ref()
            .ok_or_else(|| BackendError::Frame("render called before the surface was created".into()))?;

        let Some(frame) = self.acquire(surface)? else {
            return Ok(());
        };

        let uniform = SceneUniform::new(scene, camera);
        self.queue.write_buffer(&pipelines.uniform_buffer, 0, bytemuck::bytes_of(&uniform));

        let (opaque, translucent) = draw_order(scene, camera.eye);
        let device = &self.device;
        let opaque = self.opaque.get_or_rebuild(&opaque, |mesh| mesh.upload(device));
        // the ghost moves and fades every frame
        let translucent = batch(translucent).upload(device);

        let frame_view = frame.texture.create_view(&TextureViewDescriptor::default());
        let (view, resolve_target) = match &surface.msaa_view {
            Some(msaa) => (msaa, Some(&frame_view)),
            None => (&frame_view, None),
        };
        let bg = scene.background;

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor { label: Some("encoder") });
        {
            let mut rp = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view,
                    resolve_target,
                    ops: Operations {
                        load: LoadOp::Clear(Color { r: bg.r as f64, g: bg.g as f64, b: bg.b as f64, a: 1.0 }),
                        store: StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &surface.depth_view,
                    depth_ops: Some(Operations { load: LoadOp::Clear(1.0), store: StoreOp::Store }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            rp.set_bind_group(0, &pipelines.bind_group, &[]);

            for (pipeline, buffer) in [(&pipelines.opaque, opaque), (&pipelines.translucent, translucent.as_ref())] {
                if let Some(buffer) = buffer {
                    rp.set_pipeline(pipeline);
                    rp.set_vertex_buffer(0, buffer.vertex_buffer.slice(..));
                    rp.set_index_buffer(buffer.index_buffer.slice(..), IndexFormat::Uint32);
                    rp.draw_indexed(0..buffer.index_count, 0, 0..1);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;
    use crate::config::{FlashlightSettings, LightingSettings, SceneSettings};
    use crate::model::{SceneNode, Shape};
    use crate::view::backend::{build_ambient_light, build_scene, build_spot_light};

    fn lit_scene() -> (Scene, Camera) {
        let mut scene = build_scene(&SceneSettings::default());
        scene.add(SceneNode::AmbientLight(build_ambient_light(&LightingSettings::default())));
        let mut camera = Camera::perspective(75.0, 1.0, 0.1, 100.0);
        camera.eye = Vec3::new(1.0, 1.6, 2.0);
        camera.attach(build_spot_light(&FlashlightSettings::default()));
        (scene, camera)
    }

    #[test]
    fn uniform_carries_fog_ambient_and_flashlight() {
        let (scene, camera) = lit_scene();
        let u = SceneUniform::new(&scene, &camera);

        assert_eq!(u.fog[3], 0.08);
        let expected = 0x40 as f32 / 255.0 * 0.6;
        assert!((u.ambient[0] - expected).abs() < 1e-6);

        assert_eq!(u.spot_position, [1.0, 1.6, 2.0, 25.0]);
        let dir = Vec3::from_slice(&u.spot_direction[..3]);
        assert!((dir - Vec3::NEG_Z).length() < 1e-5);
        assert!((u.spot_direction[3] - (PI / 6.0).cos()).abs() < 1e-6);
        assert!(u.spot_color[3] > u.spot_direction[3], "inner cone is narrower");
        assert_eq!([u.spot_color[0], u.spot_color[1], u.spot_color[2]], [2.0; 3]);
    }

    #[test]
    fn flashlight_turns_with_camera() {
        let (scene, mut camera) = lit_scene();
        camera.yaw = 0.0;
        let u = SceneUniform::new(&scene, &camera);
        let dir = Vec3::from_slice(&u.spot_direction[..3]);
        assert!((dir - Vec3::X).length() < 1e-5, "pointing {dir:?}");
    }

    #[test]
    fn no_flashlight_means_zero_range() {
        let scene = build_scene(&SceneSettings::default());
        let camera = Camera::perspective(75.0, 1.0, 0.1, 100.0);
        let u = SceneUniform::new(&scene, &camera);
        assert_eq!(u.spot_position[3], 0.0);
        assert_eq!(u.ambient, [0.0; 4]);
    }

    #[test]
    fn uniform_matches_shader_layout() {
        assert_eq!(std::mem::size_of::<SceneUniform>(), 160);
    }

    #[test]
    fn translucent_meshes_sort_back_to_front() {
        let mut scene = build_scene(&SceneSettings::default());
        let sphere = Shape::Sphere { radius: 0.5 };
        let near = MeshNode { opacity: 0.5, ..MeshNode::new("near", sphere).at(Vec3::new(0.0, 0.0, -2.0)) };
        let far = MeshNode { opacity: 0.5, ..MeshNode::new("far", sphere).at(Vec3::new(0.0, 0.0, -9.0)) };
        let hidden = MeshNode { visible: false, ..MeshNode::new("hidden", sphere) };
        scene.add_mesh(near);
        scene.add_mesh(MeshNode::new("wall", Shape::Box { size: Vec3::ONE }));
        scene.add_mesh(far);
        scene.add_mesh(hidden);

        let (opaque, translucent) = draw_order(&scene, Vec3::ZERO);
        assert_eq!(opaque.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(), vec!["wall"]);
        assert_eq!(translucent.iter().map(|m| m.name.as_str()).collect::<Vec<_>>(), vec!["far", "near"]);
    }

    #[test]
    fn opaque_batch_is_rebuilt_only_when_nodes_change() {
        let mut scene = build_scene(&SceneSettings::default());
        let wall = scene.add_mesh(MeshNode::new("wall", Shape::Box { size: Vec3::ONE }));
        scene.add_mesh(MeshNode::new("floor", Shape::Plane { width: 4.0, depth: 4.0 }));
        let mut cache = StaticBatch::new();
        let vertex_count = |mesh: Mesh| Some(mesh.vertices.len());

        for _ in 0..3 {
            let (opaque, _) = draw_order(&scene, Vec3::ZERO);
            assert!(cache.get_or_rebuild(&opaque, vertex_count).is_some());
        }
        assert_eq!(cache.rebuilds, 1);

        scene.mesh_mut(wall).unwrap().position = Vec3::new(3.0, 0.0, 0.0);
        let (opaque, _) = draw_order(&scene, Vec3::ZERO);
        cache.get_or_rebuild(&opaque, vertex_count);
        assert_eq!(cache.rebuilds, 2);

        scene.add_mesh(MeshNode::new("chair", Shape::Box { size: Vec3::splat(0.5) }));
        let (opaque, _) = draw_order(&scene, Vec3::ZERO);
        let vertices = *cache.get_or_rebuild(&opaque, vertex_count).unwrap();
        assert_eq!(cache.rebuilds, 3);
        assert_eq!(vertices, 24 * 2 + 4);
    }
}
