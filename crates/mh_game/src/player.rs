//! The player avatar: an AABB driven by an accelerate-toward-intent model.
//!
//! Horizontal control never sets velocity directly. Held input accelerates
//! toward the run speed; releasing applies drag toward zero. Drag is weaker
//! than acceleration, which is what gives the level its icy slide. Vertical
//! motion is gravity plus an edge-triggered jump impulse, multiplied while a
//! jump boost is active.

use crate::collision::{Aabb, CollisionGrid, CollisionMoveResult};

#[derive(Debug, Clone, Copy)]
pub struct PlayerInput {
    /// -1.0, 0.0 or 1.0 from held keys.
    pub move_x: f32,
    /// Edge-triggered; true only on the step the jump key went down.
    pub jump_pressed: bool,
    /// Whether the jump-boost power-up is active this step.
    pub boosted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PlayerConfig {
    pub acceleration: f32,
    pub drag: f32,
    pub max_run_speed: f32,
    pub gravity: f32,
    pub max_fall_speed: f32,
    pub jump_speed: f32,
    pub boost_multiplier: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            acceleration: 400.0,
            drag: 500.0,
            max_run_speed: 200.0,
            gravity: -1500.0,
            max_fall_speed: -900.0,
            jump_speed: 600.0,
            boost_multiplier: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactState {
    pub left: bool,
    pub right: bool,
    pub down: bool,
    pub up: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct Player {
    pub aabb: Aabb,
    pub velocity_x: f32,
    pub velocity_y: f32,
    pub grounded: bool,
    pub contacts: ContactState,
    /// True while facing right; the character art faces left unflipped.
    pub flip_x: bool,
    pub config: PlayerConfig,
}

impl Player {
    pub fn new(aabb: Aabb) -> Self {
        Self {
            aabb,
            velocity_x: 0.0,
            velocity_y: 0.0,
            grounded: false,
            contacts: ContactState::default(),
            flip_x: false,
            config: PlayerConfig::default(),
        }
    }

    pub fn step(&mut self, input: PlayerInput, dt: f32, grid: &CollisionGrid) {
        // Horizontal: accelerate toward intent. Drag applies whenever intent
        // is zero, airborne included.
        if input.move_x != 0.0 {
            let target = input.move_x * self.config.max_run_speed;
            self.velocity_x = move_towards(self.velocity_x, target, self.config.acceleration * dt);
            self.flip_x = input.move_x > 0.0;
        } else {
            self.velocity_x = move_towards(self.velocity_x, 0.0, self.config.drag * dt);
        }

        // Jump is edge-triggered and only legal from grounded state.
        if input.jump_pressed && self.grounded {
            let multiplier = if input.boosted {
                self.config.boost_multiplier
            } else {
                1.0
            };
            self.velocity_y = self.config.jump_speed * multiplier;
            self.grounded = false;
        }

        // Gravity always applies; terminal speed caps the fall.
        self.velocity_y =
            (self.velocity_y + self.config.gravity * dt).max(self.config.max_fall_speed);

        let dx = self.velocity_x * dt;
        let dy = self.velocity_y * dt;
        let result = grid.move_and_collide_detailed(self.aabb, dx, dy);
        self.apply_collision_result(result);
        self.clamp_to_world(grid);
    }

    fn apply_collision_result(&mut self, result: CollisionMoveResult) {
        self.aabb = result.aabb;
        self.contacts = ContactState {
            left: result.blocked_left,
            right: result.blocked_right,
            down: result.blocked_down,
            up: result.blocked_up,
        };

        if (result.blocked_left && self.velocity_x < 0.0)
            || (result.blocked_right && self.velocity_x > 0.0)
        {
            self.velocity_x = 0.0;
        }

        if result.blocked_up && self.velocity_y > 0.0 {
            self.velocity_y = 0.0;
        }
        // Grounded is driven from collision contact, not from y-position
        // heuristics.
        if result.blocked_down && self.velocity_y < 0.0 {
            self.velocity_y = 0.0;
            self.grounded = true;
        } else if result.collided_y {
            self.velocity_y = 0.0;
            self.grounded = false;
        } else {
            self.grounded = false;
        }
    }

    /// The level edges are walls; the bottom edge counts as ground.
    fn clamp_to_world(&mut self, grid: &CollisionGrid) {
        let min_x = self.aabb.half_w;
        let max_x = grid.world_width() - self.aabb.half_w;
        if self.aabb.center_x < min_x {
            self.aabb.center_x = min_x;
            if self.velocity_x < 0.0 {
                self.velocity_x = 0.0;
            }
            self.contacts.left = true;
        } else if self.aabb.center_x > max_x {
            self.aabb.center_x = max_x;
            if self.velocity_x > 0.0 {
                self.velocity_x = 0.0;
            }
            self.contacts.right = true;
        }

        let min_y = self.aabb.half_h;
        let max_y = grid.world_height() - self.aabb.half_h;
        if self.aabb.center_y < min_y {
            self.aabb.center_y = min_y;
            if self.velocity_y < 0.0 {
                self.velocity_y = 0.0;
            }
            self.grounded = true;
            self.contacts.down = true;
        } else if self.aabb.center_y > max_y {
            self.aabb.center_y = max_y;
            if self.velocity_y > 0.0 {
                self.velocity_y = 0.0;
            }
            self.contacts.up = true;
        }
    }
}

fn move_towards(current: f32, target: f32, max_delta: f32) -> f32 {
    if (target - current).abs() <= max_delta {
        target
    } else if target > current {
        current + max_delta
    } else {
        current - max_delta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::GridCell;

    const DT: f32 = 1.0 / 60.0;

    fn level_grid() -> CollisionGrid {
        let mut cells = Vec::new();
        // Full-width floor plus a wall column partway across.
        for x in 0..45 {
            cells.push(GridCell { x, y: 0 });
        }
        for y in 1..4 {
            cells.push(GridCell { x: 30, y });
        }
        CollisionGrid::from_cells(18, 45, 25, cells)
    }

    fn player_on_floor(center_x: f32) -> Player {
        let mut player = Player::new(Aabb {
            center_x,
            center_y: 18.0 + 10.0,
            half_w: 7.0,
            half_h: 10.0,
        });
        player.grounded = true;
        player
    }

    #[test]
    fn velocity_trends_to_terminal_speed_then_drags_to_rest() {
        let grid = level_grid();
        let mut player = player_on_floor(100.0);

        let held = PlayerInput {
            move_x: 1.0,
            jump_pressed: false,
            boosted: false,
        };
        let mut last_vx = 0.0;
        for _ in 0..120 {
            player.step(held, DT, &grid);
            assert!(
                player.velocity_x >= last_vx,
                "velocity must climb while the key is held"
            );
            assert!(player.velocity_x <= player.config.max_run_speed + 1e-3);
            last_vx = player.velocity_x;
        }
        assert!(
            (player.velocity_x - player.config.max_run_speed).abs() < 1e-3,
            "held input reaches terminal run speed"
        );

        let idle = PlayerInput {
            move_x: 0.0,
            jump_pressed: false,
            boosted: false,
        };
        for _ in 0..60 {
            player.step(idle, DT, &grid);
            assert!(
                player.velocity_x <= last_vx + 1e-4,
                "drag must never speed the player up"
            );
            assert!(player.velocity_x >= 0.0, "drag must not reverse direction");
            last_vx = player.velocity_x;
        }
        assert_eq!(player.velocity_x, 0.0);
    }

    #[test]
    fn jump_impulse_is_base_speed() {
        let grid = level_grid();
        let mut player = player_on_floor(100.0);

        player.step(
            PlayerInput {
                move_x: 0.0,
                jump_pressed: true,
                boosted: false,
            },
            DT,
            &grid,
        );
        let expected = player.config.jump_speed + player.config.gravity * DT;
        assert!((player.velocity_y - expected).abs() < 1e-3);
        assert!(!player.grounded);
    }

    #[test]
    fn jump_impulse_scales_by_half_again_when_boosted() {
        let grid = level_grid();
        let mut player = player_on_floor(100.0);

        player.step(
            PlayerInput {
                move_x: 0.0,
                jump_pressed: true,
                boosted: true,
            },
            DT,
            &grid,
        );
        let expected =
            player.config.jump_speed * player.config.boost_multiplier + player.config.gravity * DT;
        assert!((player.velocity_y - expected).abs() < 1e-3);
    }

    #[test]
    fn jump_only_activates_when_grounded() {
        let grid = level_grid();
        let mut player = Player::new(Aabb {
            center_x: 100.0,
            center_y: 200.0,
            half_w: 7.0,
            half_h: 10.0,
        });

        player.step(
            PlayerInput {
                move_x: 0.0,
                jump_pressed: true,
                boosted: false,
            },
            DT,
            &grid,
        );
        assert!(player.velocity_y <= 0.0, "airborne jump press must not fire");
    }

    #[test]
    fn facing_flip_follows_input_and_persists_through_idle() {
        let grid = level_grid();
        let mut player = player_on_floor(100.0);
        assert!(!player.flip_x);

        let right = PlayerInput {
            move_x: 1.0,
            jump_pressed: false,
            boosted: false,
        };
        player.step(right, DT, &grid);
        assert!(player.flip_x);

        let idle = PlayerInput {
            move_x: 0.0,
            jump_pressed: false,
            boosted: false,
        };
        player.step(idle, DT, &grid);
        assert!(player.flip_x, "idle keeps the last facing");

        let left = PlayerInput {
            move_x: -1.0,
            jump_pressed: false,
            boosted: false,
        };
        player.step(left, DT, &grid);
        assert!(!player.flip_x);
    }

    #[test]
    fn world_edge_stops_horizontal_motion() {
        let grid = level_grid();
        let mut player = player_on_floor(10.0);

        let left = PlayerInput {
            move_x: -1.0,
            jump_pressed: false,
            boosted: false,
        };
        for _ in 0..60 {
            player.step(left, DT, &grid);
        }
        assert_eq!(player.aabb.center_x, player.aabb.half_w);
        assert_eq!(player.velocity_x, 0.0);
        assert!(player.contacts.left);
    }

    #[test]
    fn running_into_wall_reports_contact_and_zeroes_velocity() {
        let grid = level_grid();
        // Wall column occupies cell x=30, so its left face is at 540.
        let mut player = player_on_floor(500.0);

        let right = PlayerInput {
            move_x: 1.0,
            jump_pressed: false,
            boosted: false,
        };
        let mut hit = false;
        for _ in 0..180 {
            player.step(right, DT, &grid);
            if player.contacts.right {
                hit = true;
                break;
            }
        }
        assert!(hit, "player should reach the wall");
        assert_eq!(player.velocity_x, 0.0);
        assert!((player.aabb.center_x - (540.0 - player.aabb.half_w)).abs() < 0.01);
    }

    #[test]
    fn deterministic_sequence_reaches_same_final_state() {
        let grid = level_grid();
        let start = Aabb {
            center_x: 100.0,
            center_y: 60.0,
            half_w: 7.0,
            half_h: 10.0,
        };

        let mut inputs = Vec::new();
        for _ in 0..60 {
            inputs.push(PlayerInput {
                move_x: 1.0,
                jump_pressed: false,
                boosted: false,
            });
        }
        inputs.push(PlayerInput {
            move_x: 1.0,
            jump_pressed: true,
            boosted: false,
        });
        for _ in 0..120 {
            inputs.push(PlayerInput {
                move_x: 1.0,
                jump_pressed: false,
                boosted: false,
            });
        }
        for _ in 0..60 {
            inputs.push(PlayerInput {
                move_x: -1.0,
                jump_pressed: false,
                boosted: false,
            });
        }

        let mut run_a = Player::new(start);
        let mut run_b = Player::new(start);

        for input in &inputs {
            run_a.step(*input, DT, &grid);
        }
        for input in &inputs {
            run_b.step(*input, DT, &grid);
        }

        assert!((run_a.aabb.center_x - run_b.aabb.center_x).abs() < 0.0001);
        assert!((run_a.aabb.center_y - run_b.aabb.center_y).abs() < 0.0001);
        assert!((run_a.velocity_x - run_b.velocity_x).abs() < 0.0001);
        assert!((run_a.velocity_y - run_b.velocity_y).abs() < 0.0001);
        assert_eq!(run_a.grounded, run_b.grounded);
    }
}
