//! The rendering orchestrator. Owns the GPU context, the depth target, the page
//! textures and the fold/page pipelines.

pub mod context;
pub mod pipelines;
pub mod targets;
pub mod textures;

use self::{
    context::GfxContext,
    pipelines::{
        fold::{FoldPipeline, FoldUniforms},
        page::{PageDraw, PagePipeline, PageShading},
    },
    targets::Targets,
    textures::PageTextures,
};
use std::sync::Arc;
use winit::window::Window;

/// How the curled vertices reach the GPU this frame.
pub enum CurlGeometry<'a> {
    /// Nothing is curling.
    None,
    /// Run the fold compute pass.
    Gpu(FoldUniforms),
    /// Vertices already folded on the CPU.
    Cpu(&'a [pagecurl::PageVertex]),
}

pub struct Renderer {
    pub gfx: GfxContext,
    pub targets: Targets,
    pub fold: FoldPipeline,
    pub pages: PagePipeline,
    pub textures: PageTextures,
    pub egui_renderer: egui_wgpu::Renderer,
}

impl Renderer {
    pub async fn new(window: Arc<Window>, texture_slots: usize) -> anyhow::Result<Self> {
        let gfx = GfxContext::new(window).await?;

        let targets = Targets::new(&gfx.device, gfx.size);
        let fold = FoldPipeline::new(&gfx.device);
        let pages = PagePipeline::new(&gfx.device, gfx.config.format, targets.depth_fmt);
        let textures = PageTextures::new(&gfx.device, &gfx.queue, texture_slots);

        let egui_renderer =
            egui_wgpu::Renderer::new(&gfx.device, gfx.config.format, None, 1);

        Ok(Self {
            gfx,
            targets,
            fold,
            pages,
            textures,
            egui_renderer,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.gfx.resize(new_size);
            self.targets.resize(&self.gfx.device, new_size);
        }
    }

    /// Folds the curling page if needed, then clears to `background` and draws `draws`
    /// in order.
    pub fn render(
        &mut self,
        swap_view: &wgpu::TextureView,
        draws: &[PageDraw],
        curl: CurlGeometry<'_>,
        shading: &PageShading,
        background: [f32; 3],
    ) {
        let mut encoder = self
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        match curl {
            CurlGeometry::None => {}
            CurlGeometry::Gpu(params) => self.fold.dispatch(&self.gfx.queue, &mut encoder, &params),
            CurlGeometry::Cpu(vertices) => self.fold.upload_deformed(&self.gfx.queue, vertices),
        }

        let bind_groups = self.pages.prepare(
            &self.gfx.device,
            &self.gfx.queue,
            &self.textures,
            draws,
            shading,
        );

        let clear = if self.gfx.is_srgb() {
            background.map(srgb_to_linear)
        } else {
            background
        };

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Page Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear[0] as f64,
                            g: clear[1] as f64,
                            b: clear[2] as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.targets.depth,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(geometry) = &self.fold.geometry {
                self.pages.draw(&mut pass, geometry, draws, &bind_groups);
            }
        }

        self.gfx.queue.submit(std::iter::once(encoder.finish()));
    }
}

/// Converts one sRGB-encoded channel to linear.
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_endpoints_and_midpoint() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-6);
        assert!((srgb_to_linear(0.5) - 0.214).abs() < 1e-3);
    }
}
