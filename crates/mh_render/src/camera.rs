//! 2D orthographic camera with follow-target behavior.
//!
//! `position` is the world-space view center. Zoom scales world pixels to
//! screen pixels, so at zoom 2.0 a 1280x720 window sees a 640x360 world
//! window. `follow` implements a deadzone chase: the camera stays put while
//! the target wanders inside a centered box and lerps after it once the
//! target crosses an edge.

use glam::{Mat4, Vec2};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
}

pub struct Camera2D {
    pub position: Vec2,
    pub zoom: f32,
    pub viewport: (u32, u32),
}

impl Camera2D {
    pub fn new(viewport_width: u32, viewport_height: u32) -> Self {
        Self {
            position: Vec2::ZERO,
            zoom: 1.0,
            viewport: (viewport_width, viewport_height),
        }
    }

    /// Half of the visible world rectangle at the current zoom.
    pub fn half_extents(&self) -> Vec2 {
        Vec2::new(
            (self.viewport.0 as f32) / (2.0 * self.zoom),
            (self.viewport.1 as f32) / (2.0 * self.zoom),
        )
    }

    pub fn build_uniform(&self) -> CameraUniform {
        let half = self.half_extents();

        let proj = Mat4::orthographic_rh(
            self.position.x - half.x,
            self.position.x + half.x,
            self.position.y - half.y,
            self.position.y + half.y,
            -1.0,
            1.0,
        );

        CameraUniform {
            view_proj: proj.to_cols_array_2d(),
        }
    }

    /// Chase `target`, moving only while it sits outside the `deadzone`
    /// (world-pixel box centered on the view) and closing the gap by `lerp`
    /// per call.
    pub fn follow(&mut self, target: Vec2, lerp: f32, deadzone: Vec2) {
        let half_dz = deadzone * 0.5;
        let mut desired = self.position;

        if target.x > self.position.x + half_dz.x {
            desired.x = target.x - half_dz.x;
        } else if target.x < self.position.x - half_dz.x {
            desired.x = target.x + half_dz.x;
        }
        if target.y > self.position.y + half_dz.y {
            desired.y = target.y - half_dz.y;
        } else if target.y < self.position.y - half_dz.y {
            desired.y = target.y + half_dz.y;
        }

        self.position += (desired - self.position) * lerp.clamp(0.0, 1.0);
    }

    /// Keep the visible rectangle inside `[min, max]`. An axis whose bounds
    /// are narrower than the view is centered instead.
    pub fn clamp_to_bounds(&mut self, min: Vec2, max: Vec2) {
        let half = self.half_extents();

        if max.x - min.x <= 2.0 * half.x {
            self.position.x = (min.x + max.x) * 0.5;
        } else {
            self.position.x = self.position.x.clamp(min.x + half.x, max.x - half.x);
        }
        if max.y - min.y <= 2.0 * half.y {
            self.position.y = (min.y + max.y) * 0.5;
        } else {
            self.position.y = self.position.y.clamp(min.y + half.y, max.y - half.y);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follow_ignores_target_inside_deadzone() {
        let mut cam = Camera2D::new(1280, 720);
        cam.position = Vec2::new(100.0, 100.0);
        cam.follow(Vec2::new(110.0, 95.0), 0.25, Vec2::new(50.0, 50.0));
        assert_eq!(cam.position, Vec2::new(100.0, 100.0));
    }

    #[test]
    fn follow_chases_target_outside_deadzone() {
        let mut cam = Camera2D::new(1280, 720);
        cam.position = Vec2::ZERO;
        let target = Vec2::new(100.0, 0.0);
        // Desired center is target minus the deadzone half-width; one call
        // covers a quarter of the gap.
        cam.follow(target, 0.25, Vec2::new(50.0, 50.0));
        assert!((cam.position.x - 18.75).abs() < 1e-4);
        assert_eq!(cam.position.y, 0.0);

        // Repeated calls converge toward the deadzone edge.
        for _ in 0..200 {
            cam.follow(target, 0.25, Vec2::new(50.0, 50.0));
        }
        assert!((cam.position.x - 75.0).abs() < 0.1);
    }

    #[test]
    fn follow_full_lerp_snaps_to_deadzone_edge() {
        let mut cam = Camera2D::new(1280, 720);
        cam.follow(Vec2::new(-200.0, 40.0), 1.0, Vec2::new(50.0, 50.0));
        assert!((cam.position.x + 175.0).abs() < 1e-4);
        assert!((cam.position.y - 15.0).abs() < 1e-4);
    }

    #[test]
    fn clamp_keeps_view_inside_bounds() {
        let mut cam = Camera2D::new(640, 360);
        cam.zoom = 2.0;
        // 320x180 world view inside an 810x450 level.
        cam.position = Vec2::new(-50.0, 1000.0);
        cam.clamp_to_bounds(Vec2::ZERO, Vec2::new(810.0, 450.0));
        assert_eq!(cam.position, Vec2::new(160.0, 360.0));
    }

    #[test]
    fn clamp_centers_axis_narrower_than_view() {
        let mut cam = Camera2D::new(1280, 720);
        // View is 1280x720 at zoom 1, wider than the level on both axes.
        cam.position = Vec2::new(500.0, -300.0);
        cam.clamp_to_bounds(Vec2::ZERO, Vec2::new(810.0, 450.0));
        assert_eq!(cam.position, Vec2::new(405.0, 225.0));
    }
}
