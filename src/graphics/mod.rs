//! Rendering and compute surface shared by the grid and the window driver.
//!
//! The grid only needs three things from here: a [`GpuContext`] to run its
//! compute pass on, [`load_shader`] to resolve the compute program, and the
//! [`Canvas`] rectangle primitive to draw itself.

mod canvas;
mod present;

pub use canvas::{Canvas, Frame, Rgba};
pub use present::FramePresenter;

use std::sync::Arc;

use thiserror::Error;

pub const LIFE_COMPUTE_SHADER: &str = "shaders/life_compute.wgsl";
pub const FRAME_BLIT_SHADER: &str = "shaders/frame_blit.wgsl";

#[derive(Debug, Error)]
pub enum GpuError {
    #[error("no compatible GPU adapter: {0}")]
    NoAdapter(#[from] wgpu::RequestAdapterError),
    #[error("GPU device request failed: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("window surface creation failed: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("surface reports no supported texture format")]
    NoSurfaceFormat,
    #[error("unknown shader locator `{0}`")]
    UnknownShader(String),
    #[error("grid of {columns}x{rows} cells exceeds the GPU texture limit of {limit}")]
    GridTooLarge { columns: u32, rows: u32, limit: u32 },
    #[error("waiting for the GPU failed: {0}")]
    Poll(#[from] wgpu::PollError),
    #[error("read-back buffer mapping failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
    #[error("read-back callback dropped before completion")]
    MapCallbackDropped,
}

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub tex_coords: [f32; 2],
}

impl Vertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    /// Position at location 0, texture coordinate at location 1.
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }

    /// Two triangles covering clip space, texture origin at the top-left.
    #[rustfmt::skip]
    pub fn fullscreen_quad() -> [Vertex; 6] {
        [
            Vertex { position: [-1.0, -1.0], tex_coords: [0.0, 1.0] }, // Bottom-left
            Vertex { position: [ 1.0, -1.0], tex_coords: [1.0, 1.0] }, // Bottom-right
            Vertex { position: [ 1.0,  1.0], tex_coords: [1.0, 0.0] }, // Top-right
            Vertex { position: [-1.0, -1.0], tex_coords: [0.0, 1.0] }, // Bottom-left
            Vertex { position: [ 1.0,  1.0], tex_coords: [1.0, 0.0] }, // Top-right
            Vertex { position: [-1.0,  1.0], tex_coords: [0.0, 0.0] }, // Top-left
        ]
    }
}

/// Device and queue the simulation runs its compute work on.
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_name: String,
}

impl GpuContext {
    /// Acquires a device without any window, for tests and benchmarks.
    pub fn headless() -> Result<Self, GpuError> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
                backends: wgpu::Backends::all(),
                ..Default::default()
            });
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::HighPerformance,
                    compatible_surface: None,
                    force_fallback_adapter: false,
                })
                .await?;
            Self::from_adapter(&adapter).await
        })
    }

    async fn from_adapter(adapter: &wgpu::Adapter) -> Result<Self, GpuError> {
        let adapter_name = adapter.get_info().name;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("lifegpu device"),
                ..Default::default()
            })
            .await?;

        let limits = device.limits();
        tracing::info!(
            adapter = %adapter_name,
            max_texture_dimension_2d = limits.max_texture_dimension_2d,
            max_workgroup_size_x = limits.max_compute_workgroup_size_x,
            "GPU device initialized"
        );

        Ok(Self {
            device,
            queue,
            adapter_name,
        })
    }

    /// Blocks until every submitted command buffer has finished.
    pub fn wait_idle(&self) -> Result<(), GpuError> {
        self.device.poll(wgpu::PollType::Wait)?;
        Ok(())
    }
}

/// A window surface plus the device that renders into it.
pub struct GraphicsContext {
    pub surface: wgpu::Surface<'static>,
    pub gpu: GpuContext,
    pub config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,
}

impl GraphicsContext {
    pub async fn new(window: Arc<winit::window::Window>) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let gpu = GpuContext::from_adapter(&adapter).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(GpuError::NoSurfaceFormat)?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &config);

        Ok(Self {
            surface,
            gpu,
            config,
            size,
        })
    }

    /// Reconfigures the surface; a minimized (zero-area) window keeps the
    /// previous configuration.
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.size = new_size;
        self.config = wgpu::SurfaceConfiguration {
            width: new_size.width,
            height: new_size.height,
            ..self.config.clone()
        };
        self.surface.configure(&self.gpu.device, &self.config);
    }
}

/// Resolves a shader resource locator to a compiled module.
///
/// Programs are embedded at build time, so the locator set is closed.
pub fn load_shader(device: &wgpu::Device, path: &str) -> Result<wgpu::ShaderModule, GpuError> {
    let shader_source = match path {
        LIFE_COMPUTE_SHADER => include_str!("../../shaders/life_compute.wgsl"),
        FRAME_BLIT_SHADER => include_str!("../../shaders/frame_blit.wgsl"),
        _ => return Err(GpuError::UnknownShader(path.to_owned())),
    };

    Ok(device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(path),
        source: wgpu::ShaderSource::Wgsl(shader_source.into()),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_struct() {
        let layout = Vertex::desc();
        assert_eq!(layout.array_stride, 16);
        assert_eq!(layout.attributes.len(), 2);
        assert_eq!(layout.attributes[0].offset, 0);
        assert_eq!(layout.attributes[0].shader_location, 0);
        assert_eq!(layout.attributes[1].offset, 8);
        assert_eq!(layout.attributes[1].shader_location, 1);
        assert_eq!(layout.attributes[1].format, wgpu::VertexFormat::Float32x2);
    }

    #[test]
    fn quad_spans_clip_space() {
        let quad = Vertex::fullscreen_quad();
        for v in &quad {
            assert!(v.position.iter().all(|p| p.abs() == 1.0));
            // Clip-space y points up, texture v points down.
            assert_eq!(v.tex_coords[1], (1.0 - v.position[1]) / 2.0);
        }
    }
}
