pub mod animation;
pub mod input;
pub mod particles;
pub mod rng;
pub mod time;

pub use animation::{load_animation_file, AnimationClip, AnimationFile, AnimationFrame, AnimationState};
pub use input::{InputState, Key};
pub use particles::{EmitterConfig, Particle, ParticleEmitter};
pub use rng::Lcg64;
pub use time::TimeState;
