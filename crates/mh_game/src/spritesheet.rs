//! Spritesheet metadata loading and frame resolution.
//!
//! All art ships as uniform-grid sheets (fixed-size cells, row-major frame
//! numbering, row 0 at the top of the texture). A sheet metadata file names
//! the texture and the grid; gameplay data then refers to cells as
//! `(sheet_id, frame)` pairs. Level objects, animation clips, and particle
//! configs all resolve through here at render time.
//!
//! `SheetRegistry::resolve(sheet_id)` is the primary lookup; the returned
//! entry converts frame indices to UV rects for quad building.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct SheetFile {
    pub version: String,
    pub sheet_id: String,
    pub texture: SheetTexture,
    pub tile_width: u32,
    pub tile_height: u32,
    pub columns: u32,
    pub frames: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SheetTexture {
    pub path: String,
    pub width: u32,
    pub height: u32,
}

/// Loaded, validated sheet ready for frame lookups.
#[derive(Debug, Clone)]
pub struct SheetEntry {
    pub sheet_id: String,
    pub texture_path: String,
    pub texture_size: (u32, u32),
    pub tile_size: (u32, u32),
    pub columns: u32,
    pub frames: u32,
}

impl SheetEntry {
    /// UV rect `[u0, v0, u1, v1]` for a frame, or `None` past the end of the
    /// sheet. v grows downward to match texture row order.
    pub fn frame_uv(&self, frame: u32) -> Option<[f32; 4]> {
        if frame >= self.frames {
            return None;
        }
        let col = frame % self.columns;
        let row = frame / self.columns;
        let tex_w = self.texture_size.0 as f32;
        let tex_h = self.texture_size.1 as f32;
        let u0 = (col * self.tile_size.0) as f32 / tex_w;
        let v0 = (row * self.tile_size.1) as f32 / tex_h;
        let u1 = ((col + 1) * self.tile_size.0) as f32 / tex_w;
        let v1 = ((row + 1) * self.tile_size.1) as f32 / tex_h;
        Some([u0, v0, u1, v1])
    }
}

pub fn load_sheet_from_path(path: &Path) -> Result<SheetEntry, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read sheet metadata {}: {e}", path.display()))?;
    let sheet: SheetFile = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse sheet metadata {}: {e}", path.display()))?;
    validate_sheet(&sheet)?;

    Ok(SheetEntry {
        sheet_id: sheet.sheet_id,
        texture_path: sheet.texture.path,
        texture_size: (sheet.texture.width, sheet.texture.height),
        tile_size: (sheet.tile_width, sheet.tile_height),
        columns: sheet.columns,
        frames: sheet.frames,
    })
}

fn validate_sheet(sheet: &SheetFile) -> Result<(), String> {
    if sheet.version != "0.1" {
        return Err(format!(
            "Sheet validation failed: unsupported version '{}'",
            sheet.version
        ));
    }
    if sheet.sheet_id.is_empty() {
        return Err("Sheet validation failed: sheet_id is empty".to_string());
    }
    if sheet.texture.width == 0 || sheet.texture.height == 0 {
        return Err(format!(
            "Sheet validation failed: sheet '{}' texture width/height must be > 0",
            sheet.sheet_id
        ));
    }
    if sheet.tile_width == 0 || sheet.tile_height == 0 {
        return Err(format!(
            "Sheet validation failed: sheet '{}' tile width/height must be > 0",
            sheet.sheet_id
        ));
    }
    if sheet.columns == 0 || sheet.frames == 0 {
        return Err(format!(
            "Sheet validation failed: sheet '{}' columns and frames must be > 0",
            sheet.sheet_id
        ));
    }

    let rows = sheet.frames.div_ceil(sheet.columns);
    let grid_w = sheet.columns.checked_mul(sheet.tile_width).ok_or_else(|| {
        format!(
            "Sheet validation failed: sheet '{}' grid width overflows u32 range",
            sheet.sheet_id
        )
    })?;
    let grid_h = rows.checked_mul(sheet.tile_height).ok_or_else(|| {
        format!(
            "Sheet validation failed: sheet '{}' grid height overflows u32 range",
            sheet.sheet_id
        )
    })?;
    if grid_w > sheet.texture.width || grid_h > sheet.texture.height {
        return Err(format!(
            "Sheet validation failed: sheet '{}' grid {}x{} exceeds texture {}x{}",
            sheet.sheet_id, grid_w, grid_h, sheet.texture.width, sheet.texture.height
        ));
    }

    Ok(())
}

/// Registry spanning every loaded sheet file, with a flat O(1) lookup.
///
/// Sheets are stored per file path so a single file can be hot-reloaded
/// without rebuilding the rest of the index.
#[derive(Debug, Clone)]
pub struct SheetRegistry {
    by_path: HashMap<String, String>,
    sheets: HashMap<String, SheetEntry>,
}

impl SheetRegistry {
    pub fn new() -> Self {
        Self {
            by_path: HashMap::new(),
            sheets: HashMap::new(),
        }
    }

    /// Add a sheet keyed by its file path. Rejects duplicate sheet_ids
    /// across files.
    pub fn add_sheet(&mut self, key: &str, entry: SheetEntry) -> Result<(), String> {
        if let Some(existing) = self.sheets.get(&entry.sheet_id) {
            if self.by_path.get(key) != Some(&existing.sheet_id) {
                return Err(format!(
                    "Duplicate sheet_id '{}' across sheet files (adding '{}')",
                    entry.sheet_id, key
                ));
            }
        }
        if let Some(old_id) = self.by_path.insert(key.to_string(), entry.sheet_id.clone()) {
            self.sheets.remove(&old_id);
        }
        self.sheets.insert(entry.sheet_id.clone(), entry);
        Ok(())
    }

    /// Remove the sheet loaded from `key`, if any.
    pub fn remove_sheet(&mut self, key: &str) {
        if let Some(sheet_id) = self.by_path.remove(key) {
            self.sheets.remove(&sheet_id);
        }
    }

    pub fn resolve(&self, sheet_id: &str) -> Option<&SheetEntry> {
        self.sheets.get(sheet_id)
    }

    /// Unique texture paths across all loaded sheets.
    pub fn texture_paths(&self) -> HashSet<String> {
        self.sheets
            .values()
            .map(|e| e.texture_path.clone())
            .collect()
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }
}

impl Default for SheetRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "mh_sheet_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    fn tiles_entry() -> SheetEntry {
        SheetEntry {
            sheet_id: "tiles".to_string(),
            texture_path: "assets/textures/tiles.png".to_string(),
            texture_size: (360, 162),
            tile_size: (18, 18),
            columns: 20,
            frames: 180,
        }
    }

    #[test]
    fn load_sheet_from_path_parses_valid_file() {
        let path = temp_file_path("valid");
        let json = r#"
        {
          "version": "0.1",
          "sheet_id": "tiles",
          "texture": { "path": "assets/textures/tiles.png", "width": 360, "height": 162 },
          "tile_width": 18,
          "tile_height": 18,
          "columns": 20,
          "frames": 180
        }
        "#;
        fs::write(&path, json).expect("failed to write temp sheet file");

        let sheet = load_sheet_from_path(&path).expect("sheet should load");
        assert_eq!(sheet.sheet_id, "tiles");
        assert_eq!(sheet.columns, 20);
        assert!(sheet.frame_uv(179).is_some());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn load_sheet_rejects_grid_larger_than_texture() {
        let path = temp_file_path("too_big");
        let json = r#"
        {
          "version": "0.1",
          "sheet_id": "tiles",
          "texture": { "path": "assets/textures/tiles.png", "width": 360, "height": 162 },
          "tile_width": 18,
          "tile_height": 18,
          "columns": 20,
          "frames": 200
        }
        "#;
        fs::write(&path, json).expect("failed to write temp sheet file");

        let err = load_sheet_from_path(&path).expect_err("oversized grid should fail");
        assert!(err.contains("exceeds texture"));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn load_sheet_rejects_zero_tile_size() {
        let path = temp_file_path("zero_tile");
        let json = r#"
        {
          "version": "0.1",
          "sheet_id": "tiles",
          "texture": { "path": "assets/textures/tiles.png", "width": 360, "height": 162 },
          "tile_width": 0,
          "tile_height": 18,
          "columns": 20,
          "frames": 180
        }
        "#;
        fs::write(&path, json).expect("failed to write temp sheet file");

        let err = load_sheet_from_path(&path).expect_err("zero tile should fail");
        assert!(err.contains("tile width/height"));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn frame_uv_maps_row_major_from_top() {
        let sheet = tiles_entry();

        let first = sheet.frame_uv(0).expect("frame 0 in range");
        assert!((first[0] - 0.0).abs() < 1e-6);
        assert!((first[1] - 0.0).abs() < 1e-6);
        assert!((first[2] - 18.0 / 360.0).abs() < 1e-6);
        assert!((first[3] - 18.0 / 162.0).abs() < 1e-6);

        // Frame 151 sits at column 11, row 7.
        let coin = sheet.frame_uv(151).expect("frame 151 in range");
        assert!((coin[0] - 198.0 / 360.0).abs() < 1e-6);
        assert!((coin[1] - 126.0 / 162.0).abs() < 1e-6);
        assert!((coin[2] - 216.0 / 360.0).abs() < 1e-6);
        assert!((coin[3] - 144.0 / 162.0).abs() < 1e-6);
    }

    #[test]
    fn frame_uv_rejects_out_of_range() {
        let sheet = tiles_entry();
        assert!(sheet.frame_uv(180).is_none());
    }

    #[test]
    fn registry_resolves_across_files() {
        let mut registry = SheetRegistry::new();
        registry
            .add_sheet("assets/sheets/tiles.json", tiles_entry())
            .expect("add tiles");
        let mut chars = tiles_entry();
        chars.sheet_id = "characters".to_string();
        chars.texture_path = "assets/textures/characters.png".to_string();
        registry
            .add_sheet("assets/sheets/characters.json", chars)
            .expect("add characters");

        assert_eq!(registry.sheet_count(), 2);
        assert!(registry.resolve("tiles").is_some());
        assert!(registry.resolve("characters").is_some());
        assert!(registry.resolve("nonexistent").is_none());

        let paths = registry.texture_paths();
        assert!(paths.contains("assets/textures/tiles.png"));
        assert!(paths.contains("assets/textures/characters.png"));
    }

    #[test]
    fn registry_rejects_duplicate_sheet_ids() {
        let mut registry = SheetRegistry::new();
        registry
            .add_sheet("assets/sheets/tiles.json", tiles_entry())
            .expect("add tiles");

        let err = registry
            .add_sheet("assets/sheets/other.json", tiles_entry())
            .expect_err("duplicate sheet_id should fail");
        assert!(err.contains("Duplicate sheet_id"));
    }

    #[test]
    fn registry_reload_same_path_replaces_entry() {
        let mut registry = SheetRegistry::new();
        registry
            .add_sheet("assets/sheets/tiles.json", tiles_entry())
            .expect("add tiles");

        // Hot reload of the same file keeps the id without complaint.
        let mut updated = tiles_entry();
        updated.frames = 160;
        registry
            .add_sheet("assets/sheets/tiles.json", updated)
            .expect("reload tiles");
        assert_eq!(registry.resolve("tiles").expect("tiles present").frames, 160);
        assert_eq!(registry.sheet_count(), 1);
    }

    #[test]
    fn registry_remove_and_readd() {
        let mut registry = SheetRegistry::new();
        registry
            .add_sheet("assets/sheets/tiles.json", tiles_entry())
            .expect("add tiles");

        registry.remove_sheet("assets/sheets/tiles.json");
        assert!(registry.resolve("tiles").is_none());
        assert!(registry.is_empty());

        registry
            .add_sheet("assets/sheets/tiles.json", tiles_entry())
            .expect("re-add tiles");
        assert!(registry.resolve("tiles").is_some());
    }
}
