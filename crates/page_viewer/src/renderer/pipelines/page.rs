//! Draws textured pages from the geometry buffers in [`super::fold`].

use super::fold::PageGeometry;
use crate::renderer::textures::PageTextures;
use glam::Mat4;
use pagecurl::PageVertex;

/// Draws per frame: two flat pages and the curling pair.
pub const DRAW_SLOTS: usize = 3;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PageUniforms {
    pub view_proj: [[f32; 4]; 4], // 64 B
    pub eye_color: [f32; 3],      // +12
    pub offset_x: f32,            // +4  -> 80
    pub colored: u32,
    pub back_colored: u32,
    pub linearize: u32,
    pub _pad: u32,                // -> 96
}

const _: [(); 96] = [(); core::mem::size_of::<PageUniforms>()];

/// What one face of a drawn page samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageFace {
    Blank,
    Slot { slot: usize, colored: bool },
}

impl PageFace {
    fn colored(self) -> bool {
        matches!(self, PageFace::Slot { colored: true, .. })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PageShape {
    /// Front face of the undeformed grid.
    Flat,
    /// Both faces of the folded grid.
    Curled,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageDraw {
    pub shape: PageShape,
    pub front: PageFace,
    pub back: PageFace,
    pub offset_x: f32,
}

/// Shading inputs shared by every page of a frame.
#[derive(Clone, Copy, Debug)]
pub struct PageShading {
    pub view_proj: Mat4,
    pub eye_color: [f32; 3],
    pub linearize: bool,
}

pub struct PagePipeline {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniforms: Vec<wgpu::Buffer>,
}

impl PagePipeline {
    pub fn new(
        device: &wgpu::Device,
        color_fmt: wgpu::TextureFormat,
        depth_fmt: wgpu::TextureFormat,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shaders/page.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/page.wgsl").into()),
        });

        let texture = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Page BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<PageUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                texture(1),
                texture(2),
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Page Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniforms = (0..DRAW_SLOTS)
            .map(|i| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&format!("Page Uniforms {}", i)),
                    size: std::mem::size_of::<PageUniforms>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            })
            .collect();

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Page Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let vertex_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PageVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // position.xyz + curl factor
                wgpu::VertexAttribute {
                    shader_location: 0,
                    offset: 0,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    shader_location: 1,
                    offset: 16,
                    format: wgpu::VertexFormat::Float32x4,
                },
            ],
        };

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Page Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[vertex_layout],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            // The back face is wound the other way, so culling shows one face at a time.
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: depth_fmt,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: color_fmt,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });

        Self {
            pipeline,
            layout,
            sampler,
            uniforms,
        }
    }

    /// Writes the uniforms for `draws` and builds one bind group per draw.
    pub fn prepare(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        textures: &PageTextures,
        draws: &[PageDraw],
        shading: &PageShading,
    ) -> Vec<wgpu::BindGroup> {
        let view = move |face: PageFace| match face {
            PageFace::Blank => textures.blank_view(),
            PageFace::Slot { slot, .. } => textures.view(slot),
        };

        draws
            .iter()
            .zip(&self.uniforms)
            .map(|(draw, buffer)| {
                let uniforms = PageUniforms {
                    view_proj: shading.view_proj.to_cols_array_2d(),
                    eye_color: shading.eye_color,
                    offset_x: draw.offset_x,
                    colored: draw.front.colored() as u32,
                    back_colored: draw.back.colored() as u32,
                    linearize: shading.linearize as u32,
                    _pad: 0,
                };
                queue.write_buffer(buffer, 0, bytemuck::bytes_of(&uniforms));

                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Page Bind Group"),
                    layout: &self.layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: buffer.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(view(draw.front)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::TextureView(view(draw.back)),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ],
                })
            })
            .collect()
    }

    pub fn draw<'a>(
        &'a self,
        rpass: &mut wgpu::RenderPass<'a>,
        geometry: &'a PageGeometry,
        draws: &[PageDraw],
        bind_groups: &'a [wgpu::BindGroup],
    ) {
        rpass.set_pipeline(&self.pipeline);
        rpass.set_index_buffer(geometry.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        for (draw, bind_group) in draws.iter().zip(bind_groups) {
            rpass.set_bind_group(0, bind_group, &[]);
            match draw.shape {
                PageShape::Flat => {
                    rpass.set_vertex_buffer(0, geometry.flat_vb.slice(..));
                    rpass.draw_indexed(0..geometry.face_index_count(), 0, 0..1);
                }
                PageShape::Curled => {
                    rpass.set_vertex_buffer(0, geometry.deformed_vb.slice(..));
                    rpass.draw_indexed(0..geometry.page_index_count(), 0, 0..1);
                }
            }
        }
    }
}
