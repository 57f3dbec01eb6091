//! Molehill -- main loop and application entry point.
//!
//! Architecture: winit drives the event loop via `ApplicationHandler`. All simulation
//! runs inside `RedrawRequested` using a **fixed-timestep** model (see `TimeState`):
//!
//!   1. `begin_frame()` -- measure wall-clock delta, feed accumulator
//!   2. `while should_step()` -- consume fixed-dt slices for deterministic simulation
//!   3. Rebuild the sprite mesh from level + scene + debug overlays
//!   4. Upload camera uniform, issue draw calls, composite egui overlay
//!
//! Each fixed step collapses the keyboard into a `SceneInput` and advances the
//! `PlayScene` (timers, movement, physics, pickups, effects) exactly once, so
//! boost and burst windows are precise step counts regardless of render rate.
//!
//! Hot reload: level JSON, sheet metadata, and animation files are all watched
//! via mtime polling and reloaded at frame boundaries (between fixed steps).

mod animation;
mod collision;
mod level;
mod pickups;
mod player;
#[cfg(test)]
mod replay;
mod scene;
mod spritesheet;

use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec2;
use wgpu::util::DeviceExt;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowId};

use animation::AnimationRegistry;
use level::{load_level_from_path, LevelFile, LevelWatcher};
use mh_core::input::{InputState, Key};
use mh_core::time::TimeState;
use mh_devtools::{DebugOverlay, OverlayStats};
use mh_platform::window::PlatformConfig;
use mh_render::{Camera2D, GpuContext, SpritePipeline, SpriteVertex, Texture};
use scene::{PlayScene, SceneInput};
use spritesheet::{load_sheet_from_path, SheetEntry, SheetRegistry};

const LEVEL_PATH: &str = "assets/levels/meadow.json";
const SHEET_PATHS: &[&str] = &[
    "assets/sheets/tiles.json",
    "assets/sheets/characters.json",
    "assets/sheets/particles.json",
];
const ANIMATION_PATHS: &[&str] = &[
    "assets/animations/player.json",
    "assets/animations/pickups.json",
];
const FALLBACK_TEXTURE_BYTES: &[u8] = include_bytes!("../../../assets/textures/fallback.png");
const DEBUG_WHITE_ASSET: &str = "__debug_white";

const CAMERA_ZOOM: f32 = 2.0;
const CAMERA_LERP: f32 = 0.25;
const CAMERA_DEADZONE: Vec2 = Vec2::new(50.0, 50.0);

/// A contiguous run of indices that share the same texture binding.
/// Draw calls are merged when consecutive quads use the same texture,
/// minimizing GPU bind-group switches during the render pass.
#[derive(Debug, Clone)]
struct DrawCall {
    texture_key: Arc<str>,
    index_start: u32,
    index_count: u32,
}

struct QuadSpec<'a> {
    texture_key: &'a str,
    center_x: f32,
    center_y: f32,
    width: f32,
    height: f32,
    uv: [f32; 4],
    flip_x: bool,
    tint: [f32; 4],
}

struct GpuSpriteTexture {
    texture: Texture,
    bind_group: wgpu::BindGroup,
}

/// All mutable engine state lives here. Constructed lazily in `ApplicationHandler::resumed`
/// once the window and GPU surface are available.
///
/// Ownership is split into three conceptual groups:
///  - **Core systems** (time, input, camera) -- updated every frame
///  - **Content** (level, sheets, animations, textures) -- loaded from disk, hot-reloadable
///  - **GPU resources** (vertex/index/camera buffers, draw calls) -- rebuilt when content changes
struct EngineState {
    window: Arc<Window>,
    gpu: GpuContext,
    time: TimeState,
    input: InputState,
    camera: Camera2D,
    sprite_pipeline: SpritePipeline,
    debug_overlay: DebugOverlay,

    // --- Hot-reloadable content -------------------------------------------------
    level_path: std::path::PathBuf,
    level_watcher: LevelWatcher,
    level: LevelFile,
    sheet_paths: Vec<std::path::PathBuf>,
    sheet_watchers: Vec<LevelWatcher>,
    sheets: SheetRegistry,
    animation_paths: Vec<std::path::PathBuf>,
    animation_watchers: Vec<LevelWatcher>,
    animation_registry: AnimationRegistry,
    scene: PlayScene,
    show_collision_debug: bool,
    paused: bool,
    single_step_requested: bool,
    textures: HashMap<Arc<str>, GpuSpriteTexture>,

    // --- Per-frame GPU mesh state -----------------------------------------------
    // The sprite mesh is rebuilt on the CPU each frame, then streamed into these
    // GPU buffers. Buffers grow (power-of-two) but never shrink.
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    mesh_vertex_capacity: usize,
    mesh_index_capacity: usize,
    draw_calls: Vec<DrawCall>,
    sprite_count: usize,
}

impl EngineState {
    fn new(window: Arc<Window>) -> Self {
        let gpu = GpuContext::new(window.clone());
        let time = TimeState::new();
        let input = InputState::new();
        let sprite_pipeline = SpritePipeline::new(&gpu.device, gpu.surface_format);
        let debug_overlay = DebugOverlay::new(&gpu.device, gpu.surface_format, &window);

        let level_path = std::path::PathBuf::from(LEVEL_PATH);
        let level_watcher = LevelWatcher::new(level_path.clone());
        let level = load_level_from_path(&level_path).unwrap_or_else(|err| {
            panic!(
                "Failed to load initial level '{}': {}",
                level_path.display(),
                err
            );
        });

        let mut sheets = SheetRegistry::new();
        let mut sheet_paths = Vec::new();
        let mut sheet_watchers = Vec::new();
        for sheet_path_str in SHEET_PATHS {
            let sheet_path = std::path::PathBuf::from(sheet_path_str);
            sheet_watchers.push(LevelWatcher::new(sheet_path.clone()));
            match load_sheet_from_path(&sheet_path) {
                Ok(entry) => {
                    if let Err(err) = sheets.add_sheet(sheet_path_str, entry) {
                        log::error!("Failed to add sheet '{}': {}", sheet_path.display(), err);
                    }
                }
                Err(err) => {
                    log::error!(
                        "Failed to load initial sheet '{}': {}",
                        sheet_path.display(),
                        err
                    );
                }
            }
            sheet_paths.push(sheet_path);
        }
        if let Err(err) = validate_level_sheet_references(&level, &sheets) {
            panic!(
                "Initial level '{}' failed sheet reference validation: {}",
                level_path.display(),
                err
            );
        }
        if let Err(err) =
            preflight_sheet_textures(&gpu.device, &gpu.queue, &sprite_pipeline, &sheets)
        {
            panic!("Initial sheet set failed texture preflight: {}", err);
        }

        // Load animation files
        let mut animation_registry = AnimationRegistry::new();
        let mut animation_paths = Vec::new();
        let mut animation_watchers = Vec::new();
        for anim_path_str in ANIMATION_PATHS {
            let anim_path = std::path::PathBuf::from(anim_path_str);
            animation_watchers.push(LevelWatcher::new(anim_path.clone()));
            if anim_path.exists() {
                if let Err(err) = animation_registry.load_file(&anim_path) {
                    log::error!(
                        "Failed to load animation '{}': {}",
                        anim_path.display(),
                        err
                    );
                }
            } else {
                log::warn!("Animation file '{}' not found.", anim_path.display());
            }
            animation_paths.push(anim_path);
        }
        if let Err(err) = animation_registry.validate_frames(&sheets) {
            panic!("Initial animation set failed frame validation: {}", err);
        }

        let scene = PlayScene::new(&level);

        let mut camera = Camera2D::new(gpu.size.0, gpu.size.1);
        camera.zoom = CAMERA_ZOOM;
        let spawn = scene.spawn_point();
        camera.position = Vec2::new(spawn.0, spawn.1);

        let camera_uniform = camera.build_uniform();
        let camera_buffer = gpu
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Camera Uniform Buffer"),
                contents: bytemuck::cast_slice(&[camera_uniform]),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let camera_bind_group =
            sprite_pipeline.create_camera_bind_group(&gpu.device, &camera_buffer);
        let vertex_buffer = create_vertex_buffer(&gpu.device, 1);
        let index_buffer = create_index_buffer(&gpu.device, 1);

        let mut state = Self {
            window,
            gpu,
            time,
            input,
            camera,
            sprite_pipeline,
            debug_overlay,
            level_path,
            level_watcher,
            level,
            sheet_paths,
            sheet_watchers,
            sheets,
            animation_paths,
            animation_watchers,
            animation_registry,
            scene,
            show_collision_debug: false,
            paused: false,
            single_step_requested: false,
            textures: HashMap::new(),
            vertex_buffer,
            index_buffer,
            camera_buffer,
            camera_bind_group,
            mesh_vertex_capacity: 0,
            mesh_index_capacity: 0,
            draw_calls: Vec::new(),
            sprite_count: 0,
        };

        // Startup order matters: load textures before building the first mesh.
        state.ensure_textures_for_content();
        state.ensure_mesh_capacity(4, 6);
        state.rebuild_scene_mesh();
        state
    }

    fn reload_level(&mut self, reason: &str) {
        match load_level_from_path(&self.level_path) {
            Ok(level_candidate) => {
                if let Err(err) = validate_level_sheet_references(&level_candidate, &self.sheets) {
                    log::error!("Level reload failed ({reason}): {err}");
                    return;
                }
                self.scene = PlayScene::new(&level_candidate);
                self.level = level_candidate;
                let spawn = self.scene.spawn_point();
                self.camera.position = Vec2::new(spawn.0, spawn.1);
                self.ensure_textures_for_content();
                self.rebuild_scene_mesh();
                log::info!(
                    "Level reloaded ({reason}): {} ({})",
                    self.level.level_id,
                    self.level.version
                );
            }
            Err(err) => {
                log::error!("Level reload failed ({reason}): {err}");
            }
        }
    }

    fn reload_sheet(&mut self, sheet_index: usize, reason: &str) {
        let sheet_path = &self.sheet_paths[sheet_index];
        let sheet_key = sheet_path.to_string_lossy().to_string();
        match load_sheet_from_path(sheet_path) {
            Ok(entry_candidate) => {
                self.sheets.remove_sheet(&sheet_key);
                if let Err(err) = self.sheets.add_sheet(&sheet_key, entry_candidate) {
                    log::error!("Sheet reload failed ({reason}): {err}");
                    return;
                }
                if let Err(err) = validate_level_sheet_references(&self.level, &self.sheets) {
                    log::error!("Sheet reload failed ({reason}): {err}");
                    return;
                }
                if let Err(err) = self.animation_registry.validate_frames(&self.sheets) {
                    log::error!("Sheet reload failed ({reason}): {err}");
                    return;
                }
                self.ensure_textures_for_content();
                self.rebuild_scene_mesh();
                log::info!("Sheet reloaded ({reason}): {}", sheet_key);
            }
            Err(err) => {
                log::error!("Sheet reload failed ({reason}): {err}");
            }
        }
    }

    fn reload_animation(&mut self, anim_index: usize, reason: &str) {
        let anim_path = &self.animation_paths[anim_index];
        match mh_core::animation::load_animation_file(anim_path) {
            Ok(file) => {
                // Remove old, add new under its animation_id
                self.animation_registry.remove_file(&file.animation_id);
                if let Err(err) = self.animation_registry.load_file(anim_path) {
                    log::error!("Animation reload failed ({reason}): {err}");
                    return;
                }
                if let Err(err) = self.animation_registry.validate_frames(&self.sheets) {
                    log::error!("Animation reload ({reason}): {err}");
                }
                log::info!("Animation reloaded ({reason}): {}", file.animation_id);
            }
            Err(err) => {
                log::error!("Animation reload failed ({reason}): {err}");
            }
        }
    }

    fn ensure_textures_for_content(&mut self) {
        for asset_path in self.sheets.texture_paths() {
            if self.textures.contains_key(asset_path.as_str()) {
                continue;
            }
            let texture = load_texture_asset(
                &self.gpu.device,
                &self.gpu.queue,
                &self.sprite_pipeline,
                &asset_path,
            );
            self.textures.insert(Arc::from(asset_path), texture);
        }

        if !self.textures.contains_key(DEBUG_WHITE_ASSET) {
            let texture = Texture::from_rgba8(
                &self.gpu.device,
                &self.gpu.queue,
                &[255, 255, 255, 255],
                1,
                1,
                "debug_white",
            );
            let bind_group = self
                .sprite_pipeline
                .create_texture_bind_group(&self.gpu.device, &texture);
            self.textures.insert(
                Arc::from(DEBUG_WHITE_ASSET),
                GpuSpriteTexture {
                    texture,
                    bind_group,
                },
            );
        }
    }

    fn estimate_memory_mb(&self) -> f32 {
        let mut bytes: usize = 0;
        // Texture memory (width * height * 4 bytes per pixel)
        for tex in self.textures.values() {
            let (w, h) = tex.texture.size;
            bytes += (w as usize) * (h as usize) * 4;
        }
        // GPU buffer memory
        bytes += self.mesh_vertex_capacity * std::mem::size_of::<SpriteVertex>();
        bytes += self.mesh_index_capacity * std::mem::size_of::<u32>();
        bytes as f32 / (1024.0 * 1024.0)
    }

    fn rebuild_scene_mesh(&mut self) {
        // Build a single CPU-side mesh each frame from level + scene + debug
        // overlays, then stream it into GPU buffers.
        let (vertices, indices, draw_calls) = self.build_mesh();
        self.ensure_mesh_capacity(vertices.len(), indices.len());
        self.sprite_count = vertices.len() / 4;
        self.draw_calls = draw_calls;

        if !vertices.is_empty() {
            self.gpu
                .queue
                .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&vertices));
        }
        if !indices.is_empty() {
            self.gpu
                .queue
                .write_buffer(&self.index_buffer, 0, bytemuck::cast_slice(&indices));
        }
    }

    fn build_mesh(&self) -> (Vec<SpriteVertex>, Vec<u32>, Vec<DrawCall>) {
        let white = [1.0f32, 1.0, 1.0, 1.0];

        let quad_estimate: usize = self
            .level
            .layers
            .iter()
            .map(|l| l.tiles.len())
            .sum::<usize>()
            + self.scene.coins.len()
            + self.scene.boost_items.len()
            + self.scene.particles_alive()
            + 64; // padding for player + debug overlays
        let mut vertices = Vec::with_capacity(quad_estimate * 4);
        let mut indices = Vec::with_capacity(quad_estimate * 6);
        let mut draw_calls = Vec::with_capacity(16);

        // Tile layers render back-to-front in authored order. Tiles of the
        // same layer share a sheet, so a whole layer collapses into one draw.
        let tile_world = self.level.tile_size as f32;
        for layer in &self.level.layers {
            let Some(sheet) = self.sheets.resolve(&layer.sheet) else {
                log::warn!(
                    "Skipping layer '{}' due to unknown sheet '{}'",
                    layer.id,
                    layer.sheet
                );
                continue;
            };
            for tile in &layer.tiles {
                let Some(uv) = sheet.frame_uv(tile.frame) else {
                    log::warn!(
                        "Skipping tile ({}, {}) in layer '{}': frame {} out of range",
                        tile.x,
                        tile.y,
                        layer.id,
                        tile.frame
                    );
                    continue;
                };
                add_quad(
                    &mut vertices,
                    &mut indices,
                    &mut draw_calls,
                    QuadSpec {
                        texture_key: &sheet.texture_path,
                        center_x: (tile.x as f32 + 0.5) * tile_world,
                        center_y: (tile.y as f32 + 0.5) * tile_world,
                        width: tile_world,
                        height: tile_world,
                        uv,
                        flip_x: false,
                        tint: white,
                    },
                );
            }
        }

        // Live coins all show the shared spin clock's current frame; a dead
        // coin simply stops being drawn.
        let coin_frame = self.scene.current_coin_frame(&self.animation_registry);
        for coin in self.scene.coins.iter().filter(|c| c.alive) {
            let (sheet_id, frame) = match coin_frame {
                Some(f) => (f.sheet.as_str(), f.frame),
                None => (coin.sheet.as_str(), coin.frame),
            };
            let Some((sheet, uv)) = self.resolve_sheet_frame(sheet_id, frame) else {
                continue;
            };
            add_quad(
                &mut vertices,
                &mut indices,
                &mut draw_calls,
                QuadSpec {
                    texture_key: &sheet.texture_path,
                    center_x: coin.position.0,
                    center_y: coin.position.1,
                    width: coin.half_w * 2.0,
                    height: coin.half_h * 2.0,
                    uv,
                    flip_x: false,
                    tint: white,
                },
            );
        }
        for item in self.scene.boost_items.iter().filter(|b| b.alive) {
            let Some((sheet, uv)) = self.resolve_sheet_frame(&item.sheet, item.frame) else {
                continue;
            };
            add_quad(
                &mut vertices,
                &mut indices,
                &mut draw_calls,
                QuadSpec {
                    texture_key: &sheet.texture_path,
                    center_x: item.position.0,
                    center_y: item.position.1,
                    width: item.half_w * 2.0,
                    height: item.half_h * 2.0,
                    uv,
                    flip_x: false,
                    tint: white,
                },
            );
        }

        // Player quad, mirrored while facing right (the art faces left).
        if let Some(anim_frame) = self.scene.current_player_frame(&self.animation_registry) {
            if let Some((sheet, uv)) = self.resolve_sheet_frame(&anim_frame.sheet, anim_frame.frame)
            {
                add_quad(
                    &mut vertices,
                    &mut indices,
                    &mut draw_calls,
                    QuadSpec {
                        texture_key: &sheet.texture_path,
                        center_x: self.scene.player.aabb.center_x,
                        center_y: self.scene.player.aabb.center_y,
                        width: sheet.tile_size.0 as f32,
                        height: sheet.tile_size.1 as f32,
                        uv,
                        flip_x: self.scene.player.flip_x,
                        tint: white,
                    },
                );
            }
        }

        // Particles draw over the player: smoke trail, then the coin burst.
        for emitter in [&self.scene.smoke, &self.scene.burst] {
            let Some(sheet) = self.sheets.resolve(&emitter.config.sheet_id) else {
                continue;
            };
            for particle in emitter.particles() {
                let Some(uv) = sheet.frame_uv(particle.frame) else {
                    continue;
                };
                let size = emitter.size_of(particle);
                let alpha = emitter.alpha_of(particle);
                add_quad(
                    &mut vertices,
                    &mut indices,
                    &mut draw_calls,
                    QuadSpec {
                        texture_key: &sheet.texture_path,
                        center_x: particle.position.x,
                        center_y: particle.position.y,
                        width: size,
                        height: size,
                        uv,
                        flip_x: false,
                        tint: [1.0, 1.0, 1.0, alpha],
                    },
                );
            }
        }

        // Debug collision overlay is rendered as translucent quads in world space.
        if self.show_collision_debug {
            let cell = self.scene.grid.cell_size as f32;
            for solid in self.scene.grid.solids_iter() {
                add_quad(
                    &mut vertices,
                    &mut indices,
                    &mut draw_calls,
                    QuadSpec {
                        texture_key: DEBUG_WHITE_ASSET,
                        center_x: (solid.x as f32 + 0.5) * cell,
                        center_y: (solid.y as f32 + 0.5) * cell,
                        width: cell,
                        height: cell,
                        uv: [0.0, 0.0, 1.0, 1.0],
                        flip_x: false,
                        tint: [0.15, 0.9, 0.15, 0.35],
                    },
                );
            }
        }

        (vertices, indices, draw_calls)
    }

    /// Resolve a `(sheet_id, frame)` reference to its sheet entry and UV rect.
    fn resolve_sheet_frame(
        &self,
        sheet_id: &str,
        frame: u32,
    ) -> Option<(&SheetEntry, [f32; 4])> {
        let Some(sheet) = self.sheets.resolve(sheet_id) else {
            log::warn!("Skipping draw: unknown sheet '{}'", sheet_id);
            return None;
        };
        let Some(uv) = sheet.frame_uv(frame) else {
            log::warn!(
                "Skipping draw: frame {} out of range for sheet '{}'",
                frame,
                sheet_id
            );
            return None;
        };
        Some((sheet, uv))
    }

    fn ensure_mesh_capacity(&mut self, vertex_count: usize, index_count: usize) {
        let needed_vertices = vertex_count.max(1);
        if needed_vertices > self.mesh_vertex_capacity {
            self.mesh_vertex_capacity = needed_vertices.next_power_of_two();
            self.vertex_buffer = create_vertex_buffer(&self.gpu.device, self.mesh_vertex_capacity);
        }

        let needed_indices = index_count.max(1);
        if needed_indices > self.mesh_index_capacity {
            self.mesh_index_capacity = needed_indices.next_power_of_two();
            self.index_buffer = create_index_buffer(&self.gpu.device, self.mesh_index_capacity);
        }
    }
}

struct App {
    config: PlatformConfig,
    state: Option<EngineState>,
}

impl App {
    fn new() -> Self {
        Self {
            config: PlatformConfig::default(),
            state: None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }
        let window = mh_platform::window::create_window(event_loop, &self.config);
        log::info!(
            "Window created: {}x{}",
            self.config.width,
            self.config.height
        );
        self.state = Some(EngineState::new(window));
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            state.window.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let state = match self.state.as_mut() {
            Some(s) => s,
            None => return,
        };

        let egui_consumed = state
            .debug_overlay
            .handle_window_event(&state.window, &event);

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting.");
                event_loop.exit();
            }

            WindowEvent::Resized(physical_size) => {
                let w = physical_size.width;
                let h = physical_size.height;
                if w > 0 && h > 0 {
                    state.gpu.resize(w, h);
                    state.camera.viewport = (w, h);
                    log::info!("Resized to {}x{}", w, h);
                }
            }

            WindowEvent::KeyboardInput { event, .. } if !egui_consumed => {
                if let PhysicalKey::Code(key_code) = event.physical_key {
                    if let Some(engine_key) = map_key(key_code) {
                        match event.state {
                            ElementState::Pressed => state.input.key_down(engine_key),
                            ElementState::Released => state.input.key_up(engine_key),
                        }
                    }
                }
            }

            WindowEvent::RedrawRequested => {
                if state.gpu.size.0 == 0 || state.gpu.size.1 == 0 {
                    return;
                }

                // Fixed-step simulation phase.
                state.time.begin_frame();
                let mut scene_changed = false;

                while state.time.should_step() {
                    if state.input.is_just_pressed(Key::Escape) {
                        event_loop.exit();
                        return;
                    }
                    if state.input.is_just_pressed(Key::F3) {
                        state.debug_overlay.toggle();
                    }
                    if state.input.is_just_pressed(Key::F4) {
                        state.show_collision_debug = !state.show_collision_debug;
                        scene_changed = true;
                        log::info!(
                            "Collision debug: {}",
                            if state.show_collision_debug {
                                "ON"
                            } else {
                                "OFF"
                            }
                        );
                    }
                    if state.input.is_just_pressed(Key::R) {
                        state.scene.restart(&state.level);
                        let spawn = state.scene.spawn_point();
                        state.camera.position = Vec2::new(spawn.0, spawn.1);
                        scene_changed = true;
                        log::info!("Scene restarted (R)");
                    }

                    if state.input.is_just_pressed(Key::F5) {
                        state.reload_level("manual trigger (F5)");
                        for i in 0..state.sheet_paths.len() {
                            state.reload_sheet(i, "manual trigger (F5)");
                        }
                        for i in 0..state.animation_paths.len() {
                            state.reload_animation(i, "manual trigger (F5)");
                        }
                        scene_changed = true;
                    } else if state.level_watcher.should_reload() {
                        state.reload_level("file watcher");
                        scene_changed = true;
                    } else {
                        for i in 0..state.sheet_watchers.len() {
                            if state.sheet_watchers[i].should_reload() {
                                state.reload_sheet(i, "file watcher");
                                scene_changed = true;
                            }
                        }
                        for i in 0..state.animation_watchers.len() {
                            if state.animation_watchers[i].should_reload() {
                                state.reload_animation(i, "file watcher");
                                scene_changed = true;
                            }
                        }
                    }

                    // Skip simulation update when paused (unless single-step requested)
                    if state.paused && !state.single_step_requested {
                        break;
                    }
                    state.single_step_requested = false;

                    let dt = state.time.fixed_dt as f32;
                    let scene_input = build_scene_input(&state.input);
                    let events = state
                        .scene
                        .step(scene_input, dt, &state.animation_registry);
                    if events.coins_collected > 0 {
                        log::debug!(
                            "Collected {} coin(s), score now {}",
                            events.coins_collected,
                            state.scene.score
                        );
                    }
                    if events.boost_collected {
                        log::debug!(
                            "Jump boost active for {} steps",
                            scene::BOOST_DURATION_STEPS
                        );
                    }

                    let player_pos = Vec2::new(
                        state.scene.player.aabb.center_x,
                        state.scene.player.aabb.center_y,
                    );
                    state
                        .camera
                        .follow(player_pos, CAMERA_LERP, CAMERA_DEADZONE);
                    state.camera.clamp_to_bounds(
                        Vec2::ZERO,
                        Vec2::new(
                            state.scene.grid.world_width(),
                            state.scene.grid.world_height(),
                        ),
                    );
                }
                state.time.end_frame();

                if scene_changed || state.time.steps_this_frame > 0 {
                    state.rebuild_scene_mesh();
                }

                // Render phase reads finalized simulation state from this frame.
                let camera_uniform = state.camera.build_uniform();
                state.gpu.queue.write_buffer(
                    &state.camera_buffer,
                    0,
                    bytemuck::cast_slice(&[camera_uniform]),
                );

                let Some((output, view)) = state.gpu.begin_frame() else {
                    return;
                };

                let predicted_bind_count = count_texture_binds(&state.draw_calls);
                let (egui_primitives, egui_textures_delta, overlay_actions) =
                    state.debug_overlay.prepare(
                        &state.window,
                        &state.time,
                        state.scene.score,
                        Some(OverlayStats {
                            draw_calls: state.draw_calls.len() as u32,
                            texture_binds: predicted_bind_count as u32,
                            sprite_count: state.sprite_count as u32,
                            particle_count: state.scene.particles_alive() as u32,
                            memory_estimate_mb: state.estimate_memory_mb(),
                            coins_remaining: state.scene.coins_remaining() as u32,
                            boost_steps: state.scene.boost_steps_left,
                            paused: state.paused,
                        }),
                    );

                // Handle overlay button actions
                if overlay_actions.toggle_pause {
                    state.paused = !state.paused;
                    log::info!(
                        "Simulation {}",
                        if state.paused { "PAUSED" } else { "RESUMED" }
                    );
                }
                if overlay_actions.single_step {
                    state.single_step_requested = true;
                }
                if overlay_actions.restart {
                    state.scene.restart(&state.level);
                    let spawn = state.scene.spawn_point();
                    state.camera.position = Vec2::new(spawn.0, spawn.1);
                    state.rebuild_scene_mesh();
                    log::info!("Scene restarted (overlay)");
                }
                let screen_descriptor = egui_wgpu::ScreenDescriptor {
                    size_in_pixels: [state.gpu.size.0, state.gpu.size.1],
                    pixels_per_point: state.window.scale_factor() as f32,
                };

                let mut encoder =
                    state
                        .gpu
                        .device
                        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                            label: Some("Render Encoder"),
                        });

                {
                    let clear_color = wgpu::Color {
                        r: 0.392,
                        g: 0.584,
                        b: 0.929,
                        a: 1.0,
                    };
                    let mut last_bound_texture_key: Option<&Arc<str>> = None;
                    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("Scene Render Pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view: &view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Clear(clear_color),
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        ..Default::default()
                    });

                    render_pass.set_pipeline(&state.sprite_pipeline.render_pipeline);
                    render_pass.set_bind_group(0, &state.camera_bind_group, &[]);
                    render_pass.set_vertex_buffer(0, state.vertex_buffer.slice(..));
                    render_pass
                        .set_index_buffer(state.index_buffer.slice(..), wgpu::IndexFormat::Uint32);

                    for draw in &state.draw_calls {
                        if let Some(texture) = state.textures.get(&draw.texture_key) {
                            let need_rebind = match last_bound_texture_key {
                                Some(last) => **last != *draw.texture_key,
                                None => true,
                            };
                            if need_rebind {
                                render_pass.set_bind_group(1, &texture.bind_group, &[]);
                                last_bound_texture_key = Some(&draw.texture_key);
                            }
                            render_pass.draw_indexed(
                                draw.index_start..(draw.index_start + draw.index_count),
                                0,
                                0..1,
                            );
                        }
                    }
                }

                state.debug_overlay.upload(
                    &state.gpu.device,
                    &state.gpu.queue,
                    &mut encoder,
                    &egui_primitives,
                    &egui_textures_delta,
                    &screen_descriptor,
                );

                {
                    let mut egui_pass = encoder
                        .begin_render_pass(&wgpu::RenderPassDescriptor {
                            label: Some("egui Render Pass"),
                            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                                view: &view,
                                resolve_target: None,
                                ops: wgpu::Operations {
                                    load: wgpu::LoadOp::Load,
                                    store: wgpu::StoreOp::Store,
                                },
                            })],
                            depth_stencil_attachment: None,
                            ..Default::default()
                        })
                        .forget_lifetime();

                    state
                        .debug_overlay
                        .paint(&mut egui_pass, &egui_primitives, &screen_descriptor);
                }

                state.debug_overlay.cleanup(&egui_textures_delta);

                state.gpu.queue.submit(std::iter::once(encoder.finish()));
                output.present();

                // Only clear edge-triggered input (just_pressed / just_released)
                // after at least one fixed step consumed it. Otherwise a press
                // that lands on a frame with 0 simulation steps is silently lost.
                if state.time.steps_this_frame > 0 {
                    state.input.end_frame();
                }
            }

            _ => {}
        }
    }
}

fn create_vertex_buffer(device: &wgpu::Device, vertex_capacity: usize) -> wgpu::Buffer {
    let byte_len = (vertex_capacity * std::mem::size_of::<SpriteVertex>()).max(1) as u64;
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Scene Vertex Buffer"),
        size: byte_len,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn create_index_buffer(device: &wgpu::Device, index_capacity: usize) -> wgpu::Buffer {
    let byte_len = (index_capacity * std::mem::size_of::<u32>()).max(1) as u64;
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Scene Index Buffer"),
        size: byte_len,
        usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

fn add_quad(
    vertices: &mut Vec<SpriteVertex>,
    indices: &mut Vec<u32>,
    draw_calls: &mut Vec<DrawCall>,
    spec: QuadSpec<'_>,
) {
    let half_w = spec.width * 0.5;
    let half_h = spec.height * 0.5;
    let base_index = vertices.len() as u32;

    // Texture v grows downward, so bottom corners sample v1. Horizontal flip
    // swaps u across the quad.
    let [mut u0, v0, mut u1, v1] = spec.uv;
    if spec.flip_x {
        std::mem::swap(&mut u0, &mut u1);
    }

    vertices.push(SpriteVertex {
        position: [spec.center_x - half_w, spec.center_y - half_h],
        tex_coords: [u0, v1],
        tint: spec.tint,
    });
    vertices.push(SpriteVertex {
        position: [spec.center_x + half_w, spec.center_y - half_h],
        tex_coords: [u1, v1],
        tint: spec.tint,
    });
    vertices.push(SpriteVertex {
        position: [spec.center_x + half_w, spec.center_y + half_h],
        tex_coords: [u1, v0],
        tint: spec.tint,
    });
    vertices.push(SpriteVertex {
        position: [spec.center_x - half_w, spec.center_y + half_h],
        tex_coords: [u0, v0],
        tint: spec.tint,
    });

    let draw_start = indices.len() as u32;
    indices.extend_from_slice(&[
        base_index,
        base_index + 1,
        base_index + 2,
        base_index,
        base_index + 2,
        base_index + 3,
    ]);

    push_draw_call(draw_calls, Arc::from(spec.texture_key), draw_start, 6);
}

/// Append a draw call, merging with the previous one when the texture matches
/// and indices are contiguous. This is the core of the batching strategy: the
/// mesh is emitted in draw order, so runs of quads sharing a sheet texture
/// collapse into a single `draw_indexed` call.
fn push_draw_call(
    draw_calls: &mut Vec<DrawCall>,
    texture_key: Arc<str>,
    index_start: u32,
    index_count: u32,
) {
    if let Some(last) = draw_calls.last_mut() {
        let contiguous = last.index_start + last.index_count == index_start;
        if *last.texture_key == *texture_key && contiguous {
            last.index_count += index_count;
            return;
        }
    }
    draw_calls.push(DrawCall {
        texture_key,
        index_start,
        index_count,
    });
}

fn load_texture_asset(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pipeline: &SpritePipeline,
    asset_path: &str,
) -> GpuSpriteTexture {
    let bytes_owned;
    let bytes: &[u8] = match std::fs::read(asset_path) {
        Ok(data) => {
            bytes_owned = data;
            &bytes_owned
        }
        Err(err) => {
            log::warn!(
                "Failed to read texture '{}': {}. Falling back to built-in sprite.",
                asset_path,
                err
            );
            FALLBACK_TEXTURE_BYTES
        }
    };
    let texture = Texture::from_bytes(device, queue, bytes, asset_path);
    let bind_group = pipeline.create_texture_bind_group(device, &texture);
    GpuSpriteTexture {
        texture,
        bind_group,
    }
}

fn load_texture_asset_strict(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pipeline: &SpritePipeline,
    asset_path: &str,
) -> Result<GpuSpriteTexture, String> {
    let bytes = std::fs::read(asset_path)
        .map_err(|e| format!("Failed to read texture '{}': {e}", asset_path))?;
    let texture = Texture::from_bytes(device, queue, &bytes, asset_path);
    let bind_group = pipeline.create_texture_bind_group(device, &texture);
    Ok(GpuSpriteTexture {
        texture,
        bind_group,
    })
}

fn preflight_sheet_textures(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    pipeline: &SpritePipeline,
    sheets: &SheetRegistry,
) -> Result<(), String> {
    for texture_path in sheets.texture_paths() {
        let _ = load_texture_asset_strict(device, queue, pipeline, &texture_path)?;
    }
    Ok(())
}

/// Every tile and pickup must point at a loaded sheet and a frame inside it.
fn validate_level_sheet_references(
    level: &LevelFile,
    sheets: &SheetRegistry,
) -> Result<(), String> {
    for layer in &level.layers {
        let Some(sheet) = sheets.resolve(&layer.sheet) else {
            return Err(format!(
                "layer '{}' references missing sheet '{}'",
                layer.id, layer.sheet
            ));
        };
        for tile in &layer.tiles {
            if tile.frame >= sheet.frames {
                return Err(format!(
                    "layer '{}' tile ({}, {}) frame {} is out of range for sheet '{}' ({} frames)",
                    layer.id, tile.x, tile.y, tile.frame, layer.sheet, sheet.frames
                ));
            }
        }
    }
    for object in &level.objects {
        if let (Some(sheet_id), Some(frame)) = (&object.sheet, object.frame) {
            let Some(sheet) = sheets.resolve(sheet_id) else {
                return Err(format!(
                    "{:?} object at ({}, {}) references missing sheet '{}'",
                    object.kind, object.x, object.y, sheet_id
                ));
            };
            if frame >= sheet.frames {
                return Err(format!(
                    "{:?} object at ({}, {}) frame {} is out of range for sheet '{}' ({} frames)",
                    object.kind, object.x, object.y, frame, sheet_id, sheet.frames
                ));
            }
        }
    }
    Ok(())
}

fn count_texture_binds(draw_calls: &[DrawCall]) -> usize {
    let mut binds = 0usize;
    let mut current: Option<&str> = None;
    for draw in draw_calls {
        let key: &str = &draw.texture_key;
        if current != Some(key) {
            current = Some(key);
            binds += 1;
        }
    }
    binds
}

fn map_key(key_code: KeyCode) -> Option<Key> {
    match key_code {
        KeyCode::ArrowLeft => Some(Key::Left),
        KeyCode::ArrowRight => Some(Key::Right),
        KeyCode::ArrowUp => Some(Key::Up),
        KeyCode::ArrowDown => Some(Key::Down),
        KeyCode::Escape => Some(Key::Escape),
        KeyCode::Space => Some(Key::Space),
        KeyCode::F3 => Some(Key::F3),
        KeyCode::F4 => Some(Key::F4),
        KeyCode::F5 => Some(Key::F5),
        KeyCode::KeyW => Some(Key::W),
        KeyCode::KeyA => Some(Key::A),
        KeyCode::KeyS => Some(Key::S),
        KeyCode::KeyD => Some(Key::D),
        KeyCode::KeyR => Some(Key::R),
        _ => None,
    }
}

/// Collapse held/just-pressed keys into one step's worth of scene intent.
fn build_scene_input(input: &InputState) -> SceneInput {
    let mut move_x: f32 = 0.0;
    if input.is_held(Key::Left) || input.is_held(Key::A) {
        move_x -= 1.0;
    }
    if input.is_held(Key::Right) || input.is_held(Key::D) {
        move_x += 1.0;
    }
    let jump_pressed = input.is_just_pressed(Key::Space)
        || input.is_just_pressed(Key::W)
        || input.is_just_pressed(Key::Up);
    SceneInput {
        move_x,
        jump_pressed,
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Molehill starting...");

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new();
    event_loop.run_app(&mut app).expect("Event loop error");
}
