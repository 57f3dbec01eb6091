//! The playable level: player, pickups, timers, and effects wired together.
//!
//! `PlayScene::step` runs one fixed simulation step in a set order: countdown
//! timers, movement intent and its cosmetic side effects (animation choice,
//! smoke trail), player physics, pickup overlap checks, then emitter and
//! animation clocks. Timers count steps, not seconds, so boost and burst
//! windows are exact frame counts. Restart rebuilds the scene from the level
//! data, including emitter seeds, so a restarted run replays identically.

use glam::Vec2;
use mh_core::animation::{AnimationFrame, AnimationState};
use mh_core::particles::{EmitterConfig, ParticleEmitter};

use crate::animation::AnimationRegistry;
use crate::collision::{Aabb, CollisionGrid};
use crate::level::{build_collision_grid, LevelFile, ObjectKind};
use crate::pickups::{self, Pickup};
use crate::player::{Player, PlayerInput};

pub const COIN_SCORE: u64 = 100;
pub const BOOST_DURATION_STEPS: u32 = 180;
pub const COIN_BURST_STEPS: u32 = 30;
pub const PARTICLE_SPEED: f32 = 50.0;

/// The character art is a 24x24 cell.
const PLAYER_HALF_EXTENT: f32 = 12.0;

const STAR_FRAMES: [u32; 3] = [0, 1, 2];
const SMOKE_FRAMES: [u32; 2] = [3, 4];

/// Keyboard intent for one step, already collapsed from raw keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneInput {
    /// -1.0, 0.0 or 1.0.
    pub move_x: f32,
    /// True only on the step the jump key went down.
    pub jump_pressed: bool,
}

/// What happened during a step, for logging and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepEvents {
    pub coins_collected: u32,
    pub boost_collected: bool,
    pub jumped: bool,
}

pub struct PlayScene {
    pub player: Player,
    pub grid: CollisionGrid,
    pub coins: Vec<Pickup>,
    pub boost_items: Vec<Pickup>,
    pub score: u64,
    pub jump_boost: bool,
    pub boost_steps_left: u32,
    pub burst_steps_left: u32,
    pub smoke: ParticleEmitter,
    pub burst: ParticleEmitter,
    pub player_anim: AnimationState,
    /// One shared spin clock for every coin on screen.
    pub coin_anim: AnimationState,
    spawn: (f32, f32),
}

impl PlayScene {
    pub fn new(level: &LevelFile) -> Self {
        let spawn = level.spawn_point();
        let player = Player::new(Aabb {
            center_x: spawn.0,
            center_y: spawn.1,
            half_w: PLAYER_HALF_EXTENT,
            half_h: PLAYER_HALF_EXTENT,
        });

        // Fixed seeds so a run (and a restart) replays identically.
        Self {
            player,
            grid: build_collision_grid(level),
            coins: pickups::from_level_objects(level, ObjectKind::Coin),
            boost_items: pickups::from_level_objects(level, ObjectKind::Jumpboost),
            score: 0,
            jump_boost: false,
            boost_steps_left: 0,
            burst_steps_left: 0,
            smoke: ParticleEmitter::new(smoke_config(), 1),
            burst: ParticleEmitter::new(star_burst_config(), 2),
            player_anim: AnimationState::new("idle"),
            coin_anim: AnimationState::new("coin"),
            spawn,
        }
    }

    /// Full reset: score, timers, pickups, player position, emitters.
    pub fn restart(&mut self, level: &LevelFile) {
        *self = PlayScene::new(level);
    }

    pub fn step(
        &mut self,
        input: SceneInput,
        dt: f32,
        animations: &AnimationRegistry,
    ) -> StepEvents {
        let mut events = StepEvents::default();

        // Countdown timers run first. The zero checks are unconditional, so
        // the boost flag and burst emitter are held off whenever their timer
        // sits at zero.
        if self.boost_steps_left > 0 {
            self.boost_steps_left -= 1;
        }
        if self.boost_steps_left == 0 {
            self.jump_boost = false;
        }
        if self.burst_steps_left > 0 {
            self.burst_steps_left -= 1;
        }
        if self.burst_steps_left == 0 {
            self.burst.stop();
        }

        // Movement intent drives the animation choice and the smoke trail.
        // The trail anchors just behind the feet and pushes particles against
        // the direction of travel. It only starts from the ground, but a run
        // that carries off a ledge keeps emitting until the keys are released.
        if input.move_x != 0.0 {
            self.player_anim.switch_to("walk");
            self.smoke.set_position(Vec2::new(
                self.player.aabb.center_x + self.player.aabb.half_w - 10.0,
                self.player.aabb.center_y - self.player.aabb.half_h + 5.0,
            ));
            self.smoke.set_particle_speed(-input.move_x * PARTICLE_SPEED, 0.0);
            if self.player.grounded {
                self.smoke.start();
            }
        } else {
            self.player_anim.switch_to("idle");
            self.smoke.stop();
        }
        if !self.player.grounded {
            self.player_anim.switch_to("jump");
        }

        // Physics. The boost flag read here is this step's post-timer value.
        let grounded_before = self.player.grounded;
        self.player.step(
            PlayerInput {
                move_x: input.move_x,
                jump_pressed: input.jump_pressed,
                boosted: self.jump_boost,
            },
            dt,
            &self.grid,
        );
        events.jumped = grounded_before && input.jump_pressed;

        // Pickup overlap checks against the post-move player box. Several
        // coins in one step all score; the burst follows the last one.
        let player_box = self.player.aabb;
        for coin in &mut self.coins {
            if coin.overlaps(&player_box) {
                coin.alive = false;
                self.score += COIN_SCORE;
                self.burst
                    .set_position(Vec2::new(coin.position.0, coin.position.1));
                self.burst.start();
                self.burst_steps_left = COIN_BURST_STEPS;
                events.coins_collected += 1;
            }
        }
        for item in &mut self.boost_items {
            if item.overlaps(&player_box) {
                item.alive = false;
                self.jump_boost = true;
                self.boost_steps_left = BOOST_DURATION_STEPS;
                events.boost_collected = true;
            }
        }

        // Effect and animation clocks advance last.
        self.smoke.step(dt);
        self.burst.step(dt);
        let dt_us = (dt * 1_000_000.0) as u64;
        if let Some(clip) = animations.resolve_clip(None, &self.player_anim.clip_name) {
            self.player_anim.tick(dt_us, clip);
        }
        if let Some(clip) = animations.resolve_clip(None, &self.coin_anim.clip_name) {
            self.coin_anim.tick(dt_us, clip);
        }

        events
    }

    /// Current player frame for rendering, without advancing the clock.
    pub fn current_player_frame<'a>(
        &self,
        animations: &'a AnimationRegistry,
    ) -> Option<&'a AnimationFrame> {
        let clip = animations.resolve_clip(None, &self.player_anim.clip_name)?;
        clip.frames
            .get(self.player_anim.frame_index)
            .or_else(|| clip.frames.last())
    }

    /// Current frame of the shared coin spin clock.
    pub fn current_coin_frame<'a>(
        &self,
        animations: &'a AnimationRegistry,
    ) -> Option<&'a AnimationFrame> {
        let clip = animations.resolve_clip(None, &self.coin_anim.clip_name)?;
        clip.frames
            .get(self.coin_anim.frame_index)
            .or_else(|| clip.frames.last())
    }

    pub fn coins_remaining(&self) -> usize {
        pickups::alive_count(&self.coins)
    }

    pub fn particles_alive(&self) -> usize {
        self.smoke.alive() + self.burst.alive()
    }

    pub fn spawn_point(&self) -> (f32, f32) {
        self.spawn
    }
}

fn star_burst_config() -> EmitterConfig {
    EmitterConfig {
        sheet_id: "particles".to_string(),
        frames: STAR_FRAMES.to_vec(),
        lifetime: 0.35,
        size_start: 4.0,
        size_end: 13.0,
        alpha_start: 1.0,
        alpha_end: 0.1,
        // Positive y is up, so the stars drift upward off the coin.
        gravity_y: 100.0,
        spawn_interval: 1.0 / 60.0,
        max_alive: 8,
        speed_jitter: 0.0,
    }
}

fn smoke_config() -> EmitterConfig {
    EmitterConfig {
        sheet_id: "particles".to_string(),
        frames: SMOKE_FRAMES.to_vec(),
        lifetime: 0.35,
        size_start: 4.0,
        size_end: 13.0,
        alpha_start: 1.0,
        alpha_end: 0.1,
        gravity_y: 0.0,
        spawn_interval: 1.0 / 60.0,
        max_alive: 64,
        speed_jitter: 0.0,
    }
}
