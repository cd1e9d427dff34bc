use crate::{
    camera::{CameraController, PageCamera},
    config::ViewerArgs,
    loader::BookLoader,
    preferences::Preferences,
    renderer::{
        pipelines::{
            fold::FoldUniforms,
            page::{PageDraw, PageFace, PageShading, PageShape},
        },
        textures::SlotUploader,
        CurlGeometry, Renderer,
    },
    ui::{self, BookStatus, UiAction, UiState},
};
use anyhow::{Context, Result};
use pagecurl::{
    deform_grid, plan_frame, BookLayout, CachedBook, DecodeWorkers, FoldState, GridDims,
    PageContent, PageGrid, PageProvider, PageSide, PageTurner, PageVertex, TexturePool,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use winit::{
    event::{ElementState, KeyEvent, MouseButton, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

pub const WINDOW_TITLE: &str = "Page Viewer";

/// Longest frame step fed to the turn animation, in seconds.
const MAX_FRAME_DT: f32 = 0.1;

struct OpenBook {
    source: PathBuf,
    layout: BookLayout,
    grid: PageGrid,
    /// CPU fold output: front face then back face.
    curled: Vec<PageVertex>,
}

pub struct App {
    pub renderer: Renderer,
    pub camera: PageCamera,
    pub camera_controller: CameraController,
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    ui: UiState,
    prefs: Preferences,
    prefs_path: PathBuf,
    cache_root: PathBuf,
    cpu_fold: bool,
    grid_dims: GridDims,
    pool: TexturePool,
    turner: PageTurner,
    pad_after_first: bool,
    book: Option<OpenBook>,
    loader: Option<BookLoader>,
    last_frame: Instant,
}

impl App {
    pub async fn new(window: Arc<Window>, args: ViewerArgs) -> Result<Self> {
        let grid_dims = args.grid_dims().context("invalid page grid")?;
        let workers =
            DecodeWorkers::new(args.decode_workers()).context("starting page decode workers")?;
        let pool = TexturePool::new(args.pool_size(), workers);
        let renderer = Renderer::new(window.clone(), pool.texture_slots()).await?;

        let mut prefs = Preferences::default();
        prefs.load(&args.preferences);
        let turner = PageTurner::new(prefs.page_flow_rtl, prefs.auto_turn_page_speed);

        let camera_controller = CameraController::new(renderer.gfx.size.height);
        let egui_ctx = egui::Context::default();
        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            &*window,
            None,
            None,
        );

        let mut app = Self {
            renderer,
            camera: PageCamera::default(),
            camera_controller,
            egui_ctx,
            egui_state,
            ui: UiState::with_path(args.book.as_deref()),
            prefs,
            prefs_path: args.preferences.clone(),
            cache_root: args.cache_root.clone(),
            cpu_fold: args.cpu_fold,
            grid_dims,
            pool,
            turner,
            pad_after_first: false,
            book: None,
            loader: None,
            last_frame: Instant::now(),
        };
        if let Some(book) = &args.book {
            app.open_book(book);
        }
        Ok(app)
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.renderer.resize(new_size);
        }
    }

    /// Starts importing/opening `path` in the background.
    pub fn open_book(&mut self, path: &Path) {
        if let Some(loader) = &self.loader {
            log::warn!("still opening {}, ignoring {}", loader.path().display(), path.display());
            return;
        }
        match BookLoader::spawn(path, &self.cache_root) {
            Ok(loader) => {
                self.ui.open_path = path.display().to_string();
                self.loader = Some(loader);
            }
            Err(err) => {
                log::error!("failed to start loading {}: {}", path.display(), err);
                self.ui.error = Some(err.to_string());
            }
        }
    }

    /// Returns `true` when the event was consumed by the UI.
    pub fn handle_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        if response.consumed {
            return true;
        }

        match event {
            WindowEvent::Resized(physical_size) => self.resize(*physical_size),
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match code {
                KeyCode::ArrowLeft => self.request_turn(PageSide::Left),
                KeyCode::ArrowRight => self.request_turn(PageSide::Right),
                KeyCode::KeyR => self.camera.reset(),
                _ => {}
            },
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                if let Some((x, _)) = self.camera_controller.cursor() {
                    let half = self.renderer.gfx.size.width as f64 / 2.0;
                    self.request_turn(if x < half { PageSide::Left } else { PageSide::Right });
                }
            }
            _ => {}
        }

        self.camera_controller.handle_event(event, &mut self.camera);
        false
    }

    fn request_turn(&mut self, side: PageSide) {
        if let Some(book) = &self.book {
            self.turner.request_turn(side, &book.layout, book.grid.width());
        }
    }

    fn poll_loader(&mut self, window: &Window) {
        let finished = self
            .loader
            .as_ref()
            .and_then(|loader| loader.poll().map(|result| (loader.path().to_path_buf(), result)));
        let Some((path, result)) = finished else {
            return;
        };
        self.loader = None;

        match result {
            Ok(book) => self.install_book(book, window),
            Err(message) => {
                log::error!("failed to open {}: {}", path.display(), message);
                self.ui.error = Some(message);
            }
        }
    }

    fn install_book(&mut self, book: CachedBook, window: &Window) {
        let book = Arc::new(book);
        let layout = BookLayout::new(book.page_count(), self.pad_after_first);
        let grid = PageGrid::new(self.grid_dims, book.first_page_aspect());
        self.renderer.fold.set_grid(&self.renderer.gfx.device, &grid);

        let source = book.source_path().to_path_buf();
        let provider: Arc<dyn PageProvider> = book;
        self.pool.set_book(Some(provider));
        self.turner.reset();

        window.set_title(&format!("{} - {}", WINDOW_TITLE, source.display()));
        log::info!(
            "opened {} ({} pages, aspect {:.3})",
            source.display(),
            layout.page_count,
            grid.width()
        );
        self.book = Some(OpenBook {
            source,
            layout,
            curled: vec![PageVertex::default(); grid.vertices.len() * 2],
            grid,
        });
    }

    /// Applies settings edited in the UI to the turn driver and layout.
    fn sync_settings(&mut self) {
        self.turner.speed = self.prefs.auto_turn_page_speed;
        if !self.turner.is_turning() {
            self.turner.flow_rtl = self.prefs.page_flow_rtl;
        }
        if let Some(book) = &mut self.book {
            if book.layout.pad_after_first != self.pad_after_first {
                book.layout = BookLayout::new(book.layout.page_count, self.pad_after_first);
                log::info!("pad after first page: {}", self.pad_after_first);
            }
        }
    }

    /// Drains finished decodes, advances the turn and resolves this frame's pages to
    /// texture slots. Returns the draws and the fold to apply, if a page is curling.
    fn plan_pages(&mut self, dt: f32) -> (Vec<PageDraw>, Option<FoldState>) {
        let Some(book) = self.book.as_mut() else {
            return (Vec::new(), None);
        };
        let renderer = &mut self.renderer;
        let mut sink = renderer
            .textures
            .uploader(&renderer.gfx.device, &renderer.gfx.queue);

        self.pool.begin_frame();
        self.pool.apply_pending_updates(&mut sink);
        if let Some(outcome) = self.turner.advance(dt, &book.layout) {
            log::debug!("turned to {:?}, leading page {}", outcome, self.turner.leading());
        }

        let plan = plan_frame(&self.turner, &book.layout, book.grid.width());
        let mut draws = Vec::with_capacity(3);
        for flat in [plan.leading, plan.following].into_iter().flatten() {
            draws.push(PageDraw {
                shape: PageShape::Flat,
                front: resolve(&mut self.pool, &mut sink, flat.content),
                back: PageFace::Blank,
                offset_x: flat.offset_x,
            });
        }

        let fold = plan.curl.map(|curl| {
            draws.push(PageDraw {
                shape: PageShape::Curled,
                front: resolve(&mut self.pool, &mut sink, curl.front),
                back: resolve(&mut self.pool, &mut sink, curl.back),
                offset_x: 0.0,
            });
            curl.fold
        });

        if let (Some(fold), true) = (&fold, self.cpu_fold) {
            deform_grid(&book.grid, fold, &mut book.curled);
        }
        (draws, fold)
    }

    pub fn render(&mut self, window: &Window) -> Result<(), wgpu::SurfaceError> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32().min(MAX_FRAME_DT);
        self.last_frame = now;

        self.poll_loader(window);
        self.sync_settings();

        let frame = self.renderer.gfx.surface.get_current_texture()?;
        let swap_view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let (draws, fold) = self.plan_pages(dt);
        let curl = match (fold, &self.book) {
            (Some(_), Some(book)) if self.cpu_fold => CurlGeometry::Cpu(&book.curled),
            (Some(fold), Some(book)) => CurlGeometry::Gpu(FoldUniforms::new(&fold, &book.grid)),
            _ => CurlGeometry::None,
        };
        let shading = PageShading {
            view_proj: self.camera.view_proj(self.renderer.gfx.aspect()),
            eye_color: self.prefs.eye_color(),
            linearize: self.renderer.gfx.is_srgb(),
        };
        self.renderer.render(
            &swap_view,
            &draws,
            curl,
            &shading,
            self.prefs.background_color,
        );

        let status = BookStatus {
            loaded: self.book.is_some(),
            leading_page: self.turner.leading() + 1,
            display_count: self.book.as_ref().map_or(0, |b| b.layout.display_count()),
            loading: self.loader.as_ref().map(BookLoader::progress),
            importing: self.loader.as_ref().is_some_and(BookLoader::is_importing),
        };
        let egui_input = self.egui_state.take_egui_input(window);
        self.egui_ctx.begin_frame(egui_input);
        let actions = ui::draw_ui(
            &self.egui_ctx,
            &mut self.ui,
            &mut self.prefs,
            &mut self.pad_after_first,
            &status,
        );
        let egui_output = self.egui_ctx.end_frame();
        self.egui_state
            .handle_platform_output(window, egui_output.platform_output);

        let shapes = self
            .egui_ctx
            .tessellate(egui_output.shapes, self.egui_ctx.pixels_per_point());

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [
                self.renderer.gfx.config.width,
                self.renderer.gfx.config.height,
            ],
            pixels_per_point: self.egui_ctx.pixels_per_point(),
        };

        let mut encoder = self
            .renderer
            .gfx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("UI Encoder"),
            });

        for (id, delta) in &egui_output.textures_delta.set {
            self.renderer.egui_renderer.update_texture(
                &self.renderer.gfx.device,
                &self.renderer.gfx.queue,
                *id,
                delta,
            );
        }

        self.renderer.egui_renderer.update_buffers(
            &self.renderer.gfx.device,
            &self.renderer.gfx.queue,
            &mut encoder,
            &shapes,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("EGUI Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &swap_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.renderer
                .egui_renderer
                .render(&mut render_pass, &shapes, &screen_descriptor);
        }

        for id in &egui_output.textures_delta.free {
            self.renderer.egui_renderer.free_texture(id);
        }

        self.renderer
            .gfx
            .queue
            .submit(std::iter::once(encoder.finish()));
        frame.present();

        for action in actions {
            self.apply(action);
        }
        Ok(())
    }

    fn apply(&mut self, action: UiAction) {
        match action {
            UiAction::OpenBook(path) => self.open_book(&path),
            UiAction::JumpToPage(number) => {
                if let Some(book) = &self.book {
                    self.turner.jump_to(number, &book.layout);
                    log::info!("jumped to page {} of {}", number, book.source.display());
                }
            }
            UiAction::SavePreferences => self.prefs.save(&self.prefs_path),
            UiAction::LoadPreferences => self.prefs.load(&self.prefs_path),
        }
    }
}

fn resolve(pool: &mut TexturePool, sink: &mut SlotUploader<'_>, content: PageContent) -> PageFace {
    match content {
        PageContent::Blank => PageFace::Blank,
        PageContent::Page(page) => match pool.get(page, sink) {
            Some(tex) => PageFace::Slot {
                slot: tex.slot,
                colored: tex.colored,
            },
            None => PageFace::Blank,
        },
    }
}
