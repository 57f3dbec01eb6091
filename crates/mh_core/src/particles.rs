//! Sprite-frame particle emitters.
//!
//! Each emitter owns a bounded pool of particles stamped from a fixed
//! `EmitterConfig` (frame choices, lifetime, scale/alpha ramps, gravity).
//! Emission is a point source at a movable anchor, spawning on a fixed
//! interval while started. All randomness comes from the emitter's own
//! seeded [`Lcg64`], so a run is reproducible step for step.

use glam::Vec2;

use crate::rng::Lcg64;

#[derive(Debug, Clone, Copy)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub age: f32,
    pub lifetime: f32,
    pub frame: u32,
}

/// Static description of what an emitter spits out.
#[derive(Debug, Clone)]
pub struct EmitterConfig {
    pub sheet_id: String,
    /// Candidate sheet frames, one picked per spawn. Must be non-empty.
    pub frames: Vec<u32>,
    /// Seconds a particle lives.
    pub lifetime: f32,
    /// Rendered quad edge in world pixels, interpolated over the lifetime.
    pub size_start: f32,
    pub size_end: f32,
    /// Opacity, interpolated over the lifetime.
    pub alpha_start: f32,
    pub alpha_end: f32,
    /// World-space vertical acceleration (y-up, so positive drifts upward).
    pub gravity_y: f32,
    /// Seconds between spawns while emitting.
    pub spawn_interval: f32,
    /// Pool bound; spawns are skipped while this many particles are alive.
    pub max_alive: usize,
    /// Uniform velocity spread added per axis at spawn.
    pub speed_jitter: f32,
}

pub struct ParticleEmitter {
    pub config: EmitterConfig,
    particles: Vec<Particle>,
    anchor: Vec2,
    particle_speed: Vec2,
    emitting: bool,
    spawn_accum: f32,
    rng: Lcg64,
}

impl ParticleEmitter {
    pub fn new(config: EmitterConfig, seed: u64) -> Self {
        let cap = config.max_alive;
        Self {
            config,
            particles: Vec::with_capacity(cap),
            anchor: Vec2::ZERO,
            particle_speed: Vec2::ZERO,
            emitting: false,
            spawn_accum: 0.0,
            rng: Lcg64::new(seed),
        }
    }

    /// Move the emission point. Live particles keep their own positions.
    pub fn set_position(&mut self, position: Vec2) {
        self.anchor = position;
    }

    /// Base velocity stamped onto future spawns; live particles are untouched.
    pub fn set_particle_speed(&mut self, vx: f32, vy: f32) {
        self.particle_speed = Vec2::new(vx, vy);
    }

    /// Begin emitting. The first spawn lands on the next `step`. Calling
    /// `start` on a running emitter does nothing.
    pub fn start(&mut self) {
        if !self.emitting {
            self.emitting = true;
            self.spawn_accum = self.config.spawn_interval;
        }
    }

    /// Stop emitting. Live particles finish their lifetimes. Idempotent.
    pub fn stop(&mut self) {
        self.emitting = false;
    }

    pub fn is_emitting(&self) -> bool {
        self.emitting
    }

    pub fn alive(&self) -> usize {
        self.particles.len()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    /// Advance live particles, drop expired ones, then spawn if due.
    pub fn step(&mut self, dt: f32) {
        for p in &mut self.particles {
            p.velocity.y += self.config.gravity_y * dt;
            p.position += p.velocity * dt;
            p.age += dt;
        }
        self.particles.retain(|p| p.age < p.lifetime);

        if self.emitting {
            while self.spawn_accum >= self.config.spawn_interval {
                self.spawn_accum -= self.config.spawn_interval;
                self.spawn_one();
            }
            self.spawn_accum += dt;
        }
    }

    fn spawn_one(&mut self) {
        if self.particles.len() >= self.config.max_alive || self.config.frames.is_empty() {
            return;
        }
        let frame = self.config.frames[self.rng.pick(self.config.frames.len())];
        let jitter = Vec2::new(
            self.rng.range_f32(-self.config.speed_jitter, self.config.speed_jitter),
            self.rng.range_f32(-self.config.speed_jitter, self.config.speed_jitter),
        );
        self.particles.push(Particle {
            position: self.anchor,
            velocity: self.particle_speed + jitter,
            age: 0.0,
            lifetime: self.config.lifetime,
            frame,
        });
    }

    /// Quad edge for a particle at its current age.
    pub fn size_of(&self, p: &Particle) -> f32 {
        lerp(self.config.size_start, self.config.size_end, p.age / p.lifetime)
    }

    /// Opacity for a particle at its current age.
    pub fn alpha_of(&self, p: &Particle) -> f32 {
        lerp(self.config.alpha_start, self.config.alpha_end, p.age / p.lifetime)
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}
