//! Page geometry buffers and the compute pass that curls the turning page.

use pagecurl::{grid::page_indices, FoldState, GridDims, PageGrid, PageVertex};
use wgpu::util::DeviceExt;

/// Work-group edge length of `cs_main` in `fold.wgsl`.
pub const FOLD_WORKGROUP: u32 = 8;

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FoldUniforms {
    pub k: f32,
    pub b: f32,
    pub k_interp_start: f32,
    pub k_interp_end: f32,     // 16
    pub cell_size: [f32; 2],
    pub grid: [u32; 2],        // 32
    pub from_right_to_left: u32,
    pub _pad: [u32; 3],        // 48
}

const _: [(); 48] = [(); core::mem::size_of::<FoldUniforms>()];

impl FoldUniforms {
    pub fn new(fold: &FoldState, grid: &PageGrid) -> Self {
        Self {
            k: fold.k,
            b: fold.b,
            k_interp_start: fold.k_interp_start,
            k_interp_end: fold.k_interp_end,
            cell_size: grid.cell_size,
            grid: [grid.dims.horizontal(), grid.dims.vertical()],
            from_right_to_left: fold.from_right_to_left as u32,
            _pad: [0; 3],
        }
    }
}

/// Vertex and index buffers for one grid resolution and page aspect.
pub struct PageGeometry {
    pub dims: GridDims,
    /// Undeformed grid; flat pages draw straight from it.
    pub flat_vb: wgpu::Buffer,
    /// Front face followed by the mirrored back face.
    pub deformed_vb: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl PageGeometry {
    /// Index count for one face.
    pub fn face_index_count(&self) -> u32 {
        self.dims.face_index_count() as u32
    }

    /// Index count for both faces of the curling page.
    pub fn page_index_count(&self) -> u32 {
        self.face_index_count() * 2
    }
}

pub struct FoldPipeline {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
    params: wgpu::Buffer,
    pub geometry: Option<PageGeometry>,
}

impl FoldPipeline {
    pub fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("shaders/fold.wgsl"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../../shaders/fold.wgsl").into()),
        });

        let storage = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Fold BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<FoldUniforms>() as u64,
                        ),
                    },
                    count: None,
                },
                storage(1, true),
                storage(2, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Fold Pipeline Layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Fold Pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "cs_main",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        });

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Fold Params"),
            size: std::mem::size_of::<FoldUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            pipeline,
            layout,
            params,
            geometry: None,
        }
    }

    /// Rebuilds the buffers for a new grid (new book or new resolution).
    pub fn set_grid(&mut self, device: &wgpu::Device, grid: &PageGrid) {
        let flat_vb = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Flat Page VB"),
            contents: bytemuck::cast_slice(&grid.vertices),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::STORAGE,
        });

        let mut deformed = grid.vertices.clone();
        deformed.extend_from_within(..);
        let deformed_vb = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Curled Page VB"),
            contents: bytemuck::cast_slice(&deformed),
            usage: wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Page IB"),
            contents: bytemuck::cast_slice(&page_indices(grid.dims)),
            usage: wgpu::BufferUsages::INDEX,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Fold Bind Group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: flat_vb.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: deformed_vb.as_entire_binding(),
                },
            ],
        });

        log::debug!(
            "page grid {}x{}, {} vertices",
            grid.dims.horizontal(),
            grid.dims.vertical(),
            grid.dims.vertex_count()
        );
        self.geometry = Some(PageGeometry {
            dims: grid.dims,
            flat_vb,
            deformed_vb,
            index_buffer,
            bind_group,
        });
    }

    /// Records the fold of the whole grid into `encoder`.
    pub fn dispatch(&self, queue: &wgpu::Queue, encoder: &mut wgpu::CommandEncoder, params: &FoldUniforms) {
        let Some(geometry) = &self.geometry else {
            return;
        };
        queue.write_buffer(&self.params, 0, bytemuck::bytes_of(params));

        let (groups_x, groups_y) = geometry.dims.dispatch_size(FOLD_WORKGROUP);
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Fold Pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &geometry.bind_group, &[]);
        pass.dispatch_workgroups(groups_x, groups_y, 1);
    }

    /// Replaces the curled vertices with ones computed on the CPU.
    pub fn upload_deformed(&self, queue: &wgpu::Queue, vertices: &[PageVertex]) {
        if let Some(geometry) = &self.geometry {
            queue.write_buffer(&geometry.deformed_vb, 0, bytemuck::cast_slice(vertices));
        }
    }
}
