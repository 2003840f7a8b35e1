use std::sync::mpsc;

use crate::graphics::{load_shader, GpuContext, GpuError, LIFE_COMPUTE_SHADER};

const WORKGROUP_SIZE: u32 = 8;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GridUniform {
    size: [f32; 2],
    _pad: [f32; 2],
}

/// Ping-pong textures and pipeline for running one generation on the GPU.
///
/// Each step re-uploads the CPU cells into the current input texture, so the
/// CPU copy stays authoritative and both update paths see the same state.
pub(super) struct GridCompute {
    columns: u32,
    rows: u32,
    texture_a: wgpu::Texture,
    texture_b: wgpu::Texture,
    _sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    readback_buffer: wgpu::Buffer,
    padded_bytes_per_row: u32,
    bind_group_a: wgpu::BindGroup, // A -> B
    bind_group_b: wgpu::BindGroup, // B -> A
    pipeline: wgpu::ComputePipeline,
    current_is_a: bool,
}

impl GridCompute {
    pub(super) fn new(gpu: &GpuContext, columns: u32, rows: u32, cells: &[u8]) -> Result<Self, GpuError> {
        let device = &gpu.device;

        let limit = device.limits().max_texture_dimension_2d;
        if columns > limit || rows > limit {
            return Err(GpuError::GridTooLarge { columns, rows, limit });
        }

        let texture_desc = wgpu::TextureDescriptor {
            label: Some("Life Compute Texture"),
            size: wgpu::Extent3d {
                width: columns,
                height: rows,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        };
        let texture_a = device.create_texture(&texture_desc);
        let texture_b = device.create_texture(&texture_desc);
        let view_a = texture_a.create_view(&wgpu::TextureViewDescriptor::default());
        let view_b = texture_b.create_view(&wgpu::TextureViewDescriptor::default());

        // One texel is one cell: no interpolation.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Life Point Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Life Grid Size Uniform"),
            size: std::mem::size_of::<GridUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let unpadded_bytes_per_row = columns * 4;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let readback_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Life Readback Buffer"),
            size: padded_bytes_per_row as wgpu::BufferAddress * rows as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Life Compute Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: wgpu::TextureFormat::Rgba8Unorm,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let compute_shader = load_shader(device, LIFE_COMPUTE_SHADER)?;
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Life Compute Pipeline"),
            layout: Some(&device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Life Compute Pipeline Layout"),
                bind_group_layouts: &[&bind_group_layout],
                push_constant_ranges: &[],
            })),
            module: &compute_shader,
            entry_point: Some("main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        let make_bind_group = |label: &str, input: &wgpu::TextureView, output: &wgpu::TextureView| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(label),
                layout: &bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(input),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(&sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::TextureView(output),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: uniform_buffer.as_entire_binding(),
                    },
                ],
            })
        };
        let bind_group_a = make_bind_group("Life Bind Group A->B", &view_a, &view_b);
        let bind_group_b = make_bind_group("Life Bind Group B->A", &view_b, &view_a);

        let compute = Self {
            columns,
            rows,
            texture_a,
            texture_b,
            _sampler: sampler,
            uniform_buffer,
            readback_buffer,
            padded_bytes_per_row,
            bind_group_a,
            bind_group_b,
            pipeline,
            current_is_a: true,
        };

        compute.upload(gpu, &compute.texture_a, cells);
        let cleared = vec![0u8; cells.len()];
        compute.upload(gpu, &compute.texture_b, &cleared);

        Ok(compute)
    }

    /// Writes cells into `texture` as RGBA: alive is white, dead is black,
    /// alpha always opaque.
    fn upload(&self, gpu: &GpuContext, texture: &wgpu::Texture, cells: &[u8]) {
        let mut texels = Vec::with_capacity(cells.len() * 4);
        for &cell in cells {
            let value = if cell != 0 { 255 } else { 0 };
            texels.extend_from_slice(&[value, value, value, 255]);
        }

        gpu.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &texels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(self.columns * 4),
                rows_per_image: Some(self.rows),
            },
            self.extent(),
        );
    }

    fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.columns,
            height: self.rows,
            depth_or_array_layers: 1,
        }
    }

    /// Upload, compute, read back, flip roles. Fully synchronous.
    pub(super) fn step(&mut self, gpu: &GpuContext, cells: &mut [u8]) -> Result<(), GpuError> {
        let (input, output, bind_group) = if self.current_is_a {
            (&self.texture_a, &self.texture_b, &self.bind_group_a)
        } else {
            (&self.texture_b, &self.texture_a, &self.bind_group_b)
        };

        self.upload(gpu, input, cells);
        let uniform = GridUniform {
            size: [self.columns as f32, self.rows as f32],
            _pad: [0.0; 2],
        };
        gpu.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));

        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Life Compute Encoder"),
        });

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Life Compute Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, bind_group, &[]);
            compute_pass.dispatch_workgroups(
                self.columns.div_ceil(WORKGROUP_SIZE),
                self.rows.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }

        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture: output,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.readback_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bytes_per_row),
                    rows_per_image: Some(self.rows),
                },
            },
            self.extent(),
        );

        gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = self.readback_buffer.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        gpu.device.poll(wgpu::PollType::Wait)?;
        rx.recv().map_err(|_| GpuError::MapCallbackDropped)??;

        {
            let data = slice.get_mapped_range();
            let row_bytes = self.columns as usize * 4;
            let stride = self.padded_bytes_per_row as usize;
            for (row, line) in cells.chunks_exact_mut(self.columns as usize).enumerate() {
                let texels = &data[row * stride..row * stride + row_bytes];
                for (cell, texel) in line.iter_mut().zip(texels.chunks_exact(4)) {
                    *cell = u8::from(texel[0] > 127);
                }
            }
        }
        self.readback_buffer.unmap();

        self.current_is_a = !self.current_is_a;
        Ok(())
    }
}

impl Drop for GridCompute {
    fn drop(&mut self) {
        self.texture_a.destroy();
        self.texture_b.destroy();
        self.uniform_buffer.destroy();
        self.readback_buffer.destroy();
    }
}
