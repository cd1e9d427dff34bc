//! GPU textures behind the page pool slots.
//!
//! Gray pages are stored as `R8Unorm`, colour pages as `Rgba8Unorm`. A slot keeps its
//! texture across uploads of the same size and format and is recreated otherwise.

use pagecurl::{RasterImage, TextureSink};

struct SlotTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    format: wgpu::TextureFormat,
}

pub struct PageTextures {
    slots: Vec<Option<SlotTexture>>,
    white: SlotTexture,
}

impl PageTextures {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, slot_count: usize) -> Self {
        let white = create_slot(device, "Blank Page", 1, 1, wgpu::TextureFormat::R8Unorm);
        write_slot(queue, &white, 1, 1, &[255]);
        Self {
            slots: (0..slot_count).map(|_| None).collect(),
            white,
        }
    }

    /// The slot's texture, or the blank page if nothing was uploaded yet.
    pub fn view(&self, slot: usize) -> &wgpu::TextureView {
        match self.slots.get(slot) {
            Some(Some(tex)) => &tex.view,
            _ => &self.white.view,
        }
    }

    /// 1x1 white texture for blank pages.
    pub fn blank_view(&self) -> &wgpu::TextureView {
        &self.white.view
    }

    /// Borrows the device and queue for uploads driven by the page pool.
    pub fn uploader<'a>(
        &'a mut self,
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
    ) -> SlotUploader<'a> {
        SlotUploader {
            textures: self,
            device,
            queue,
        }
    }
}

pub struct SlotUploader<'a> {
    textures: &'a mut PageTextures,
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
}

impl TextureSink for SlotUploader<'_> {
    fn upload(&mut self, slot: usize, image: &RasterImage) {
        let slot_count = self.textures.slots.len();
        let Some(entry) = self.textures.slots.get_mut(slot) else {
            log::error!("upload to slot {} outside a pool of {}", slot, slot_count);
            return;
        };

        let max = self.device.limits().max_texture_dimension_2d;
        let fitted;
        let image = if image.width > max || image.height > max {
            let height = (image.height as u64 * max as u64 / image.width.max(image.height) as u64)
                .max(1) as u32;
            log::warn!(
                "page {}x{} exceeds the {} texture limit, downscaling",
                image.width,
                image.height,
                max
            );
            fitted = image.downscale_to_height(height);
            &fitted
        } else {
            image
        };

        let (format, bytes) = if image.is_colored() {
            (wgpu::TextureFormat::Rgba8Unorm, image.to_rgba8())
        } else {
            (wgpu::TextureFormat::R8Unorm, image.pixels.clone())
        };

        let reusable = entry.as_ref().is_some_and(|tex| {
            tex.format == format
                && tex.texture.width() == image.width
                && tex.texture.height() == image.height
        });
        if !reusable {
            *entry = Some(create_slot(
                self.device,
                "Page Slot",
                image.width,
                image.height,
                format,
            ));
        }
        if let Some(tex) = entry.as_ref() {
            write_slot(self.queue, tex, image.width, image.height, &bytes);
        }
    }
}

fn create_slot(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> SlotTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    SlotTexture {
        texture,
        view,
        format,
    }
}

fn write_slot(queue: &wgpu::Queue, tex: &SlotTexture, width: u32, height: u32, bytes: &[u8]) {
    let bytes_per_pixel = match tex.format {
        wgpu::TextureFormat::R8Unorm => 1,
        _ => 4,
    };
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture: &tex.texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytes,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(width * bytes_per_pixel),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}
