use crate::scene::SceneInput;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct ReplaySequence {
    #[serde(default = "default_dt")]
    pub fixed_dt: f32,
    pub frames: Vec<ReplayFrame>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReplayFrame {
    #[serde(default)]
    pub move_x: f32,
    #[serde(default)]
    pub jump_pressed: bool,
    #[serde(default = "default_repeat")]
    pub repeat: u32,
}

impl ReplaySequence {
    pub fn expanded_inputs(&self) -> Vec<SceneInput> {
        let mut out = Vec::new();
        for frame in &self.frames {
            for _ in 0..frame.repeat.max(1) {
                out.push(SceneInput {
                    move_x: frame.move_x.clamp(-1.0, 1.0),
                    jump_pressed: frame.jump_pressed,
                });
            }
        }
        out
    }
}

pub fn load_replay_from_path(path: &Path) -> Result<ReplaySequence, String> {
    let raw =
        fs::read_to_string(path).map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
    let replay: ReplaySequence = serde_json::from_str(&raw)
        .map_err(|e| format!("Failed to parse replay JSON {}: {e}", path.display()))?;
    validate_replay(&replay)?;
    Ok(replay)
}

fn validate_replay(replay: &ReplaySequence) -> Result<(), String> {
    if replay.fixed_dt <= 0.0 {
        return Err("Replay validation failed: fixed_dt must be > 0".to_string());
    }
    if replay.frames.is_empty() {
        return Err("Replay validation failed: frames list is empty".to_string());
    }
    Ok(())
}

const fn default_dt() -> f32 {
    1.0 / 60.0
}

const fn default_repeat() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::AnimationRegistry;
    use crate::level::{LevelFile, LevelLayer, LevelObject, LevelTile, ObjectKind};
    use crate::scene::PlayScene;
    use mh_core::animation::{AnimationClip, AnimationFile, AnimationFrame};
    use std::collections::HashMap;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file_path(name_hint: &str) -> std::path::PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system time before unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "mh_replay_test_{}_{}_{}.json",
            name_hint,
            std::process::id(),
            nanos
        ))
    }

    fn sample_level() -> LevelFile {
        LevelFile {
            version: "0.1".to_string(),
            level_id: "replay_test".to_string(),
            tile_size: 18,
            width: 30,
            height: 12,
            layers: vec![LevelLayer {
                id: "ground".to_string(),
                sheet: "tiles".to_string(),
                collides: true,
                tiles: (0..30).map(|x| LevelTile { x, y: 0, frame: 2 }).collect(),
            }],
            objects: vec![
                LevelObject {
                    kind: ObjectKind::Spawn,
                    x: 30.0,
                    y: 30.0,
                    sheet: None,
                    frame: None,
                },
                LevelObject {
                    kind: ObjectKind::Coin,
                    x: 120.0,
                    y: 32.0,
                    sheet: Some("tiles".to_string()),
                    frame: Some(151),
                },
            ],
        }
    }

    fn sample_animations() -> AnimationRegistry {
        let single = |sheet: &str, index: u32| AnimationClip {
            frames: vec![AnimationFrame {
                sheet: sheet.to_string(),
                frame: index,
                duration_us: 100_000,
            }],
            looping: true,
        };
        let mut player_clips = HashMap::new();
        player_clips.insert("idle".to_string(), single("characters", 0));
        player_clips.insert("walk".to_string(), single("characters", 1));
        player_clips.insert("jump".to_string(), single("characters", 2));
        let mut pickup_clips = HashMap::new();
        pickup_clips.insert("coin".to_string(), single("tiles", 151));

        let mut registry = AnimationRegistry::new();
        registry.add_file(AnimationFile {
            version: "0.1".to_string(),
            animation_id: "player".to_string(),
            animations: player_clips,
        });
        registry.add_file(AnimationFile {
            version: "0.1".to_string(),
            animation_id: "pickups".to_string(),
            animations: pickup_clips,
        });
        registry
    }

    #[test]
    fn replay_file_parses_and_expands() {
        let path = temp_file_path("parse");
        fs::write(
            &path,
            r#"{
              "fixed_dt": 0.016666667,
              "frames": [
                { "move_x": 1.0, "repeat": 3 },
                { "jump_pressed": true, "repeat": 1 }
              ]
            }"#,
        )
        .expect("write replay file");

        let replay = load_replay_from_path(&path).expect("replay should load");
        let expanded = replay.expanded_inputs();
        assert_eq!(expanded.len(), 4);
        assert!(expanded[3].jump_pressed);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn replay_rejects_empty_frames() {
        let path = temp_file_path("empty");
        fs::write(&path, r#"{ "frames": [] }"#).expect("write replay file");

        let err = load_replay_from_path(&path).expect_err("empty frames should fail");
        assert!(err.contains("frames list is empty"));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn replay_run_is_deterministic() {
        let path = temp_file_path("deterministic");
        fs::write(
            &path,
            r#"{
              "fixed_dt": 0.016666667,
              "frames": [
                { "move_x": 1.0, "repeat": 60 },
                { "move_x": 1.0, "jump_pressed": true, "repeat": 1 },
                { "move_x": 1.0, "repeat": 120 },
                { "move_x": -1.0, "repeat": 45 }
              ]
            }"#,
        )
        .expect("write replay file");

        let replay = load_replay_from_path(&path).expect("replay should load");
        let inputs = replay.expanded_inputs();
        let level = sample_level();
        let animations = sample_animations();

        let mut run_a = PlayScene::new(&level);
        let mut run_b = PlayScene::new(&level);
        for input in &inputs {
            run_a.step(*input, replay.fixed_dt, &animations);
        }
        for input in &inputs {
            run_b.step(*input, replay.fixed_dt, &animations);
        }

        assert!((run_a.player.aabb.center_x - run_b.player.aabb.center_x).abs() < 0.0001);
        assert!((run_a.player.aabb.center_y - run_b.player.aabb.center_y).abs() < 0.0001);
        assert!((run_a.player.velocity_x - run_b.player.velocity_x).abs() < 0.0001);
        assert!((run_a.player.velocity_y - run_b.player.velocity_y).abs() < 0.0001);
        assert_eq!(run_a.player.grounded, run_b.player.grounded);
        assert_eq!(run_a.score, run_b.score);
        assert!(run_a.score >= 100, "the scripted run crosses the coin");
        assert_eq!(run_a.particles_alive(), run_b.particles_alive());

        let _ = fs::remove_file(path);
    }
}
