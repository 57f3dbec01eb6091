//! Animation registry for managing loaded animation definition files.
//!
//! Wraps the core `AnimationFile`/`AnimationClip` types from `mh_core::animation`
//! and provides a registry that can hold multiple animation files, resolve clips
//! by name, and cross-validate `(sheet, frame)` references against the sheet
//! registry.

use std::collections::HashMap;
use std::path::Path;

use mh_core::animation::{load_animation_file, AnimationClip, AnimationFile};

use crate::spritesheet::SheetRegistry;

/// Registry holding animation clips from multiple animation definition files.
///
/// Clips are organized by `animation_id` (from the JSON file) and clip name.
/// The `resolve_clip` method supports both targeted lookup (with a source id)
/// and global search (first match across all files).
pub struct AnimationRegistry {
    /// animation_id -> clip_name -> clip
    clips: HashMap<String, HashMap<String, AnimationClip>>,
}

impl AnimationRegistry {
    pub fn new() -> Self {
        Self {
            clips: HashMap::new(),
        }
    }

    /// Load an animation file and register its clips under its `animation_id`.
    pub fn load_file(&mut self, path: &Path) -> Result<(), String> {
        let file = load_animation_file(path)?;
        self.add_file(file);
        Ok(())
    }

    /// Register an already-loaded animation file under its `animation_id`.
    pub fn add_file(&mut self, file: AnimationFile) {
        self.clips.insert(file.animation_id, file.animations);
    }

    /// Remove all clips from a previously loaded animation file.
    pub fn remove_file(&mut self, animation_id: &str) {
        self.clips.remove(animation_id);
    }

    /// Resolve a clip by name. If `source` is given, only search that animation file.
    /// If `source` is None, search all loaded files (first match wins).
    pub fn resolve_clip(&self, source: Option<&str>, name: &str) -> Option<&AnimationClip> {
        if let Some(source_id) = source {
            return self.clips.get(source_id).and_then(|clips| clips.get(name));
        }
        for file_clips in self.clips.values() {
            if let Some(clip) = file_clips.get(name) {
                return Some(clip);
            }
        }
        None
    }

    /// Validate that every frame reference in every clip points at a loaded
    /// sheet and a frame inside that sheet's grid.
    pub fn validate_frames(&self, sheets: &SheetRegistry) -> Result<(), String> {
        for (anim_id, file_clips) in &self.clips {
            for (clip_name, clip) in file_clips {
                for frame in &clip.frames {
                    let Some(sheet) = sheets.resolve(&frame.sheet) else {
                        return Err(format!(
                            "Animation '{}' clip '{}' references missing sheet '{}'",
                            anim_id, clip_name, frame.sheet
                        ));
                    };
                    if frame.frame >= sheet.frames {
                        return Err(format!(
                            "Animation '{}' clip '{}' frame {} is out of range for sheet '{}' ({} frames)",
                            anim_id, clip_name, frame.frame, frame.sheet, sheet.frames
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

impl Default for AnimationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spritesheet::SheetEntry;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "mh_animreg_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    fn write_valid_animation_file(path: &Path) {
        let json = r#"
        {
          "version": "0.1",
          "animation_id": "player",
          "animations": {
            "walk": {
              "frames": [
                { "sheet": "characters", "frame": 0, "duration_ms": 100 },
                { "sheet": "characters", "frame": 1, "duration_ms": 100 }
              ],
              "looping": true
            },
            "jump": {
              "frames": [
                { "sheet": "characters", "frame": 1, "duration_ms": 120 }
              ],
              "looping": false
            }
          }
        }
        "#;
        fs::write(path, json).expect("write temp anim file");
    }

    fn make_sheet_registry(frames: u32) -> SheetRegistry {
        let mut registry = SheetRegistry::new();
        registry
            .add_sheet(
                "characters.json",
                SheetEntry {
                    sheet_id: "characters".to_string(),
                    texture_path: "characters.png".to_string(),
                    texture_size: (192, 192),
                    tile_size: (24, 24),
                    columns: 8,
                    frames,
                },
            )
            .expect("add sheet");
        registry
    }

    #[test]
    fn load_valid_animation_file() {
        let path = temp_file_path("valid_reg");
        write_valid_animation_file(&path);

        let mut registry = AnimationRegistry::new();
        registry.load_file(&path).expect("should load");

        assert!(registry.resolve_clip(Some("player"), "walk").is_some());
        assert!(registry.resolve_clip(Some("player"), "jump").is_some());
        assert!(registry.resolve_clip(Some("player"), "nonexistent").is_none());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn resolve_clip_without_source() {
        let path = temp_file_path("no_source");
        write_valid_animation_file(&path);

        let mut registry = AnimationRegistry::new();
        registry.load_file(&path).expect("should load");

        // Without source, should still find by name
        assert!(registry.resolve_clip(None, "walk").is_some());
        assert!(registry.resolve_clip(None, "nonexistent").is_none());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn remove_file_drops_clips() {
        let path = temp_file_path("remove");
        write_valid_animation_file(&path);

        let mut registry = AnimationRegistry::new();
        registry.load_file(&path).expect("should load");
        registry.remove_file("player");
        assert!(registry.resolve_clip(None, "walk").is_none());

        let _ = fs::remove_file(path);
    }

    #[test]
    fn validate_frames_passes_when_all_in_range() {
        let path = temp_file_path("validate_pass");
        write_valid_animation_file(&path);

        let mut registry = AnimationRegistry::new();
        registry.load_file(&path).expect("should load");

        let sheets = make_sheet_registry(64);
        registry.validate_frames(&sheets).expect("should pass");

        let _ = fs::remove_file(path);
    }

    #[test]
    fn validate_frames_fails_on_missing_sheet() {
        let path = temp_file_path("validate_missing");
        write_valid_animation_file(&path);

        let mut registry = AnimationRegistry::new();
        registry.load_file(&path).expect("should load");

        let sheets = SheetRegistry::new();
        let err = registry
            .validate_frames(&sheets)
            .expect_err("should fail with missing sheet");
        assert!(err.contains("missing sheet"));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn validate_frames_fails_on_out_of_range_frame() {
        let path = temp_file_path("validate_range");
        write_valid_animation_file(&path);

        let mut registry = AnimationRegistry::new();
        registry.load_file(&path).expect("should load");

        // Sheet only has one frame; clips reference frame 1.
        let sheets = make_sheet_registry(1);
        let err = registry
            .validate_frames(&sheets)
            .expect_err("should fail with out-of-range frame");
        assert!(err.contains("out of range"));

        let _ = fs::remove_file(path);
    }
}
