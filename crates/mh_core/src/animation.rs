//! Frame-based sprite animation types and deterministic tick logic.
//!
//! Animation clips are sequences of spritesheet frames with per-frame
//! durations. All timing uses integer microseconds (`u64`) so advancement is
//! deterministic under the fixed-timestep model, with no floating-point
//! drift across platforms.
//!
//! The JSON format stores `duration_ms` for human readability; on load this
//! is converted to `duration_us` for internal use.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// A single frame in an animation clip: a cell of a uniform-grid sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationFrame {
    pub sheet: String,
    pub frame: u32,
    pub duration_us: u64,
}

/// A named sequence of frames that can loop or play once.
#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub frames: Vec<AnimationFrame>,
    pub looping: bool,
}

impl AnimationClip {
    /// Total duration of one full cycle in microseconds.
    pub fn total_duration_us(&self) -> u64 {
        self.frames.iter().map(|f| f.duration_us).sum()
    }
}

/// Top-level animation definition file (deserialized from JSON).
#[derive(Debug, Clone)]
pub struct AnimationFile {
    pub version: String,
    pub animation_id: String,
    pub animations: HashMap<String, AnimationClip>,
}

/// Runtime state for one active animation instance.
#[derive(Debug, Clone)]
pub struct AnimationState {
    pub clip_name: String,
    pub frame_index: usize,
    pub elapsed_us: u64,
    pub finished: bool,
}

impl AnimationState {
    pub fn new(clip_name: &str) -> Self {
        Self {
            clip_name: clip_name.to_string(),
            frame_index: 0,
            elapsed_us: 0,
            finished: false,
        }
    }

    /// Change clips, restarting from frame zero. Re-requesting the clip that
    /// is already playing leaves playback untouched.
    pub fn switch_to(&mut self, clip_name: &str) {
        if self.clip_name != clip_name {
            self.clip_name = clip_name.to_string();
            self.frame_index = 0;
            self.elapsed_us = 0;
            self.finished = false;
        }
    }

    /// Advance by `dt_us` microseconds and return the current frame.
    /// `None` only for an empty clip, which validation rejects at load.
    pub fn tick<'a>(&mut self, dt_us: u64, clip: &'a AnimationClip) -> Option<&'a AnimationFrame> {
        if clip.frames.is_empty() {
            return None;
        }
        if self.finished {
            return clip.frames.get(self.frame_index).or_else(|| clip.frames.last());
        }
        if self.frame_index >= clip.frames.len() {
            // Clip swapped under us (hot reload); restart cleanly.
            self.frame_index = 0;
            self.elapsed_us = 0;
        }

        self.elapsed_us += dt_us;

        loop {
            let current_frame = &clip.frames[self.frame_index];
            if self.elapsed_us < current_frame.duration_us {
                break;
            }

            self.elapsed_us -= current_frame.duration_us;
            self.frame_index += 1;

            if self.frame_index >= clip.frames.len() {
                if clip.looping {
                    self.frame_index = 0;
                } else {
                    self.frame_index = clip.frames.len() - 1;
                    self.elapsed_us = 0;
                    self.finished = true;
                    break;
                }
            }
        }

        Some(&clip.frames[self.frame_index])
    }
}

// --- JSON deserialization types (private) ---

#[derive(Debug, Deserialize)]
struct AnimationFileJson {
    version: String,
    animation_id: String,
    animations: HashMap<String, AnimationClipJson>,
}

#[derive(Debug, Deserialize)]
struct AnimationClipJson {
    frames: Vec<AnimationFrameJson>,
    #[serde(default)]
    looping: bool,
}

#[derive(Debug, Deserialize)]
struct AnimationFrameJson {
    sheet: String,
    frame: u32,
    duration_ms: u64,
}

/// Load an animation definition file from disk.
pub fn load_animation_file(path: &Path) -> Result<AnimationFile, String> {
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read animation file {}: {e}", path.display()))?;
    let json: AnimationFileJson = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse animation file {}: {e}", path.display()))?;
    validate_animation_json(&json)?;

    let mut animations = HashMap::new();
    for (name, clip_json) in json.animations {
        let frames = clip_json
            .frames
            .into_iter()
            .map(|f| AnimationFrame {
                sheet: f.sheet,
                frame: f.frame,
                duration_us: f.duration_ms * 1000,
            })
            .collect();
        animations.insert(
            name,
            AnimationClip {
                frames,
                looping: clip_json.looping,
            },
        );
    }

    Ok(AnimationFile {
        version: json.version,
        animation_id: json.animation_id,
        animations,
    })
}

fn validate_animation_json(json: &AnimationFileJson) -> Result<(), String> {
    if json.version != "0.1" {
        return Err(format!(
            "Animation validation failed: unsupported version '{}'",
            json.version
        ));
    }
    if json.animation_id.is_empty() {
        return Err("Animation validation failed: animation_id is empty".to_string());
    }
    for (name, clip) in &json.animations {
        if clip.frames.is_empty() {
            return Err(format!(
                "Animation validation failed: clip '{}' has no frames",
                name
            ));
        }
        for (i, frame) in clip.frames.iter().enumerate() {
            if frame.sheet.is_empty() {
                return Err(format!(
                    "Animation validation failed: clip '{}' frame {} has empty sheet",
                    name, i
                ));
            }
            if frame.duration_ms == 0 {
                return Err(format!(
                    "Animation validation failed: clip '{}' frame {} has zero duration",
                    name, i
                ));
            }
        }
    }
    Ok(())
}
