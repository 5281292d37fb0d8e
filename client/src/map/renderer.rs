//! wgpu tile renderer
//!
//! Tiles are batched into one vertex buffer per frame in [`TileRenderer::prepare`];
//! [`TileRenderer::render`] only records draw calls. Vertices are in screen
//! pixels and the shader maps them to clip space using the screen size uniform.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::cache::TileCache;
use super::projection::TileAddress;
use super::scene::TileQuad;

/// Decoded tile uploaded to the GPU
pub struct CachedTile {
    pub texture: wgpu::Texture,
    pub bind_group: wgpu::BindGroup,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct TileVertex {
    /// Screen pixels, origin top-left
    pub position: [f32; 2],
    pub tex_coords: [f32; 2],
}

impl TileVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![
        0 => Float32x2,
        1 => Float32x2,
    ];

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TileVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

/// Padded to 16 bytes for WebGL uniform rules
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct ScreenUniform {
    size: [f32; 2],
    _padding: [f32; 2],
}

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];
const VERTICES_PER_QUAD: usize = 4;

pub struct TileRenderer {
    pipeline: wgpu::RenderPipeline,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    index_buffer: wgpu::Buffer,
    screen_buffer: wgpu::Buffer,
    screen_bind_group: wgpu::BindGroup,

    /// Prepared frame: one quad per address, in draw order
    vertex_buffer: Option<wgpu::Buffer>,
    batch: Vec<TileAddress>,
}

impl TileRenderer {
    pub fn new(device: &wgpu::Device, texture_format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Tile Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shader/tile.wgsl").into()),
        });

        let screen_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Screen Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let texture_layout = Self::texture_layout(device);

        let pipeline = Self::pipeline(device, &shader, &[&screen_layout, &texture_layout], texture_format);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Tile Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Quad Index Buffer"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        let screen_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Screen Uniform"),
            contents: bytemuck::bytes_of(&ScreenUniform {
                size: [1.0, 1.0],
                _padding: [0.0; 2],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let screen_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Screen Bind Group"),
            layout: &screen_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: screen_buffer.as_entire_binding(),
            }],
        });

        Self {
            pipeline,
            texture_layout,
            sampler,
            index_buffer,
            screen_buffer,
            screen_bind_group,
            vertex_buffer: None,
            batch: Vec::new(),
        }
    }

    fn texture_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Tile Texture Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        })
    }

    fn pipeline(
        device: &wgpu::Device,
        shader: &wgpu::ShaderModule,
        bind_group_layouts: &[&wgpu::BindGroupLayout],
        texture_format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Tile Pipeline Layout"),
            bind_group_layouts,
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Tile Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &[TileVertex::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: texture_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        })
    }

    /// Decode fetched image bytes and upload them as a tile texture
    pub fn create_cached_tile(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        image_data: &[u8],
    ) -> Result<CachedTile, image::ImageError> {
        let rgba = image::load_from_memory(image_data)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("Tile Texture"),
                size,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &rgba,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Tile Bind Group"),
            layout: &self.texture_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        Ok(CachedTile { texture, bind_group })
    }

    /// Upload the frame's quads. Only tiles loaded in `cache` are batched.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        tiles: &[TileQuad],
        cache: &TileCache<CachedTile>,
        width: u32,
        height: u32,
    ) {
        let uniform = ScreenUniform {
            size: [width.max(1) as f32, height.max(1) as f32],
            _padding: [0.0; 2],
        };
        queue.write_buffer(&self.screen_buffer, 0, bytemuck::bytes_of(&uniform));

        self.batch.clear();
        let mut vertices = Vec::with_capacity(tiles.len() * VERTICES_PER_QUAD);
        for quad in tiles {
            if cache.peek(&quad.address).is_none() {
                continue;
            }
            self.batch.push(quad.address);
            vertices.extend_from_slice(&quad_vertices(quad));
        }

        self.vertex_buffer = (!vertices.is_empty()).then(|| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Tile Vertex Buffer"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
    }

    /// Draw the prepared batch; tiles evicted since `prepare` are skipped
    pub fn render(&self, render_pass: &mut wgpu::RenderPass<'_>, cache: &TileCache<CachedTile>) {
        let Some(vertex_buffer) = &self.vertex_buffer else {
            return;
        };
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.screen_bind_group, &[]);
        render_pass.set_vertex_buffer(0, vertex_buffer.slice(..));
        render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);

        for (i, address) in self.batch.iter().enumerate() {
            let Some(tile) = cache.peek(address) else {
                continue;
            };
            render_pass.set_bind_group(1, &tile.bind_group, &[]);
            let base_vertex = (i * VERTICES_PER_QUAD) as i32;
            render_pass.draw_indexed(0..QUAD_INDICES.len() as u32, base_vertex, 0..1);
        }
    }
}

/// Corners of a tile quad, clockwise from top-left
fn quad_vertices(quad: &TileQuad) -> [TileVertex; 4] {
    let left = quad.origin.x as f32;
    let top = quad.origin.y as f32;
    let right = (quad.origin.x + quad.size) as f32;
    let bottom = (quad.origin.y + quad.size) as f32;
    [
        TileVertex {
            position: [left, top],
            tex_coords: [0.0, 0.0],
        },
        TileVertex {
            position: [right, top],
            tex_coords: [1.0, 0.0],
        },
        TileVertex {
            position: [right, bottom],
            tex_coords: [1.0, 1.0],
        },
        TileVertex {
            position: [left, bottom],
            tex_coords: [0.0, 1.0],
        },
    ]
}
