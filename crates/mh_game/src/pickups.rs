//! Collectible objects: coins and jump-boost powerups.
//!
//! Pickups are static AABBs with an alive flag. The scene checks overlap
//! against the player after physics each step; a collected pickup just goes
//! dead and stops rendering. Restart rebuilds the whole list from the level.

use crate::collision::Aabb;
use crate::level::{LevelFile, ObjectKind};

#[derive(Debug, Clone)]
pub struct Pickup {
    pub position: (f32, f32),
    pub sheet: String,
    pub frame: u32,
    pub half_w: f32,
    pub half_h: f32,
    pub alive: bool,
}

impl Pickup {
    pub fn aabb(&self) -> Aabb {
        Aabb {
            center_x: self.position.0,
            center_y: self.position.1,
            half_w: self.half_w,
            half_h: self.half_h,
        }
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.alive && self.aabb().overlaps(other)
    }
}

/// Build the pickup list for one object kind. Sprite extents come from the
/// level's tile size; validation already guaranteed sheet/frame are present.
pub fn from_level_objects(level: &LevelFile, kind: ObjectKind) -> Vec<Pickup> {
    let half = level.tile_size as f32 / 2.0;
    level
        .objects
        .iter()
        .filter(|o| o.kind == kind)
        .map(|o| Pickup {
            position: (o.x, o.y),
            sheet: o.sheet.clone().unwrap_or_default(),
            frame: o.frame.unwrap_or_default(),
            half_w: half,
            half_h: half,
            alive: true,
        })
        .collect()
}

pub fn alive_count(pickups: &[Pickup]) -> usize {
    pickups.iter().filter(|p| p.alive).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::{LevelLayer, LevelObject, LevelTile};

    fn test_level() -> LevelFile {
        LevelFile {
            version: "0.1".to_string(),
            level_id: "pickup_test".to_string(),
            tile_size: 18,
            width: 10,
            height: 5,
            layers: vec![LevelLayer {
                id: "ground".to_string(),
                sheet: "tiles".to_string(),
                collides: true,
                tiles: vec![LevelTile { x: 0, y: 0, frame: 2 }],
            }],
            objects: vec![
                LevelObject {
                    kind: ObjectKind::Spawn,
                    x: 27.0,
                    y: 40.0,
                    sheet: None,
                    frame: None,
                },
                LevelObject {
                    kind: ObjectKind::Coin,
                    x: 63.0,
                    y: 45.0,
                    sheet: Some("tiles".to_string()),
                    frame: Some(151),
                },
                LevelObject {
                    kind: ObjectKind::Coin,
                    x: 81.0,
                    y: 45.0,
                    sheet: Some("tiles".to_string()),
                    frame: Some(151),
                },
                LevelObject {
                    kind: ObjectKind::Jumpboost,
                    x: 99.0,
                    y: 45.0,
                    sheet: Some("tiles".to_string()),
                    frame: Some(67),
                },
            ],
        }
    }

    #[test]
    fn from_level_objects_filters_by_kind() {
        let level = test_level();

        let coins = from_level_objects(&level, ObjectKind::Coin);
        assert_eq!(coins.len(), 2);
        assert_eq!(coins[0].frame, 151);
        assert_eq!(coins[0].sheet, "tiles");
        assert_eq!(coins[0].half_w, 9.0);
        assert!(coins.iter().all(|c| c.alive));

        let boosts = from_level_objects(&level, ObjectKind::Jumpboost);
        assert_eq!(boosts.len(), 1);
        assert_eq!(boosts[0].frame, 67);
    }

    #[test]
    fn overlap_requires_alive() {
        let level = test_level();
        let mut coins = from_level_objects(&level, ObjectKind::Coin);

        let player = Aabb {
            center_x: 63.0,
            center_y: 45.0,
            half_w: 12.0,
            half_h: 12.0,
        };
        assert!(coins[0].overlaps(&player));

        coins[0].alive = false;
        assert!(!coins[0].overlaps(&player));
    }

    #[test]
    fn overlap_is_strict_at_touching_edges() {
        let level = test_level();
        let coins = from_level_objects(&level, ObjectKind::Coin);

        // Player right edge exactly touching coin left edge: 63 - 9 - 12 = 42.
        let touching = Aabb {
            center_x: 42.0,
            center_y: 45.0,
            half_w: 12.0,
            half_h: 12.0,
        };
        assert!(!coins[0].overlaps(&touching));

        let inside = Aabb {
            center_x: 42.5,
            center_y: 45.0,
            half_w: 12.0,
            half_h: 12.0,
        };
        assert!(coins[0].overlaps(&inside));
    }

    #[test]
    fn alive_count_tracks_collection() {
        let level = test_level();
        let mut coins = from_level_objects(&level, ObjectKind::Coin);
        assert_eq!(alive_count(&coins), 2);

        coins[1].alive = false;
        assert_eq!(alive_count(&coins), 1);
    }
}
