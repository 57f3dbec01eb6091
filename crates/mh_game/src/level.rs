use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::collision::{CollisionGrid, GridCell};

#[derive(Debug, Deserialize, Clone)]
pub struct LevelFile {
    pub version: String,
    pub level_id: String,
    pub tile_size: u32,
    pub width: u32,
    pub height: u32,
    pub layers: Vec<LevelLayer>,
    pub objects: Vec<LevelObject>,
}

/// A sparse tile layer. Cell (0, 0) is the bottom-left of the level;
/// cell coordinates grow up and to the right, matching world space.
#[derive(Debug, Deserialize, Clone)]
pub struct LevelLayer {
    pub id: String,
    pub sheet: String,
    #[serde(default)]
    pub collides: bool,
    pub tiles: Vec<LevelTile>,
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct LevelTile {
    pub x: u32,
    pub y: u32,
    pub frame: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LevelObject {
    pub kind: ObjectKind,
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default)]
    pub frame: Option<u32>,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Spawn,
    Coin,
    Jumpboost,
}

impl LevelFile {
    /// World position of the spawn object. Validation guarantees exactly one.
    pub fn spawn_point(&self) -> (f32, f32) {
        self.objects
            .iter()
            .find(|o| o.kind == ObjectKind::Spawn)
            .map(|o| (o.x, o.y))
            .unwrap_or((0.0, 0.0))
    }

    pub fn world_width(&self) -> f32 {
        (self.width * self.tile_size) as f32
    }

    pub fn world_height(&self) -> f32 {
        (self.height * self.tile_size) as f32
    }
}

/// Build the collision grid from the union of all `collides` layers.
pub fn build_collision_grid(level: &LevelFile) -> CollisionGrid {
    let cells = level
        .layers
        .iter()
        .filter(|layer| layer.collides)
        .flat_map(|layer| layer.tiles.iter())
        .map(|tile| GridCell {
            x: tile.x as i32,
            y: tile.y as i32,
        });
    CollisionGrid::from_cells(
        level.tile_size as i32,
        level.width as i32,
        level.height as i32,
        cells,
    )
}

pub struct LevelWatcher {
    level_path: PathBuf,
    last_seen_modified: Option<SystemTime>,
}

impl LevelWatcher {
    pub fn new(level_path: PathBuf) -> Self {
        let last_seen_modified = modified_time(&level_path);
        Self {
            level_path,
            last_seen_modified,
        }
    }

    pub fn should_reload(&mut self) -> bool {
        let current = modified_time(&self.level_path);
        match (self.last_seen_modified, current) {
            (Some(old), Some(now)) if now > old => {
                self.last_seen_modified = Some(now);
                true
            }
            (None, Some(now)) => {
                self.last_seen_modified = Some(now);
                true
            }
            _ => false,
        }
    }
}

pub fn load_level_from_path(level_path: &Path) -> Result<LevelFile, String> {
    let raw = fs::read_to_string(level_path)
        .map_err(|e| format!("Failed to read level file {}: {e}", level_path.display()))?;
    let level: LevelFile = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse level JSON {}: {e}", level_path.display()))?;
    validate_level(&level)?;
    Ok(level)
}

fn validate_level(level: &LevelFile) -> Result<(), String> {
    // Validation is intentionally strict so the scene and renderer can assume
    // in-bounds cells and a unique spawn without extra branching.
    if level.version != "0.1" {
        return Err(format!(
            "Level validation failed: unsupported version '{}'",
            level.version
        ));
    }
    if level.tile_size == 0 || level.width == 0 || level.height == 0 {
        return Err(
            "Level validation failed: tile_size, width, and height must be > 0".to_string(),
        );
    }
    if level.layers.is_empty() {
        return Err("Level validation failed: layers array is empty".to_string());
    }

    let mut layer_ids = HashSet::new();
    for layer in &level.layers {
        if !layer_ids.insert(layer.id.clone()) {
            return Err(format!(
                "Level validation failed: duplicate layer id '{}'",
                layer.id
            ));
        }
        if layer.sheet.is_empty() {
            return Err(format!(
                "Level validation failed: layer '{}' has an empty sheet id",
                layer.id
            ));
        }
        if layer.tiles.is_empty() {
            log::warn!(
                "Level layer '{}' has no tiles. This is allowed but often accidental.",
                layer.id
            );
        }
        for tile in &layer.tiles {
            if tile.x >= level.width || tile.y >= level.height {
                return Err(format!(
                    "Level validation failed: layer '{}' tile ({}, {}) is outside the {}x{} grid",
                    layer.id, tile.x, tile.y, level.width, level.height
                ));
            }
        }
    }

    let spawn_count = level
        .objects
        .iter()
        .filter(|o| o.kind == ObjectKind::Spawn)
        .count();
    if spawn_count != 1 {
        return Err(format!(
            "Level validation failed: expected exactly one spawn object, found {}",
            spawn_count
        ));
    }

    for object in &level.objects {
        if object.kind != ObjectKind::Spawn && (object.sheet.is_none() || object.frame.is_none()) {
            return Err(format!(
                "Level validation failed: {:?} object at ({}, {}) must provide 'sheet' and 'frame'",
                object.kind, object.x, object.y
            ));
        }
        let world_w = (level.width * level.tile_size) as f32;
        let world_h = (level.height * level.tile_size) as f32;
        if object.x < 0.0 || object.x > world_w || object.y < 0.0 || object.y > world_h {
            log::warn!(
                "Level object {:?} at ({}, {}) lies outside the {}x{} world",
                object.kind,
                object.x,
                object.y,
                world_w,
                world_h
            );
        }
    }

    Ok(())
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).ok()?.modified().ok()
}
