//! Collision truth for the level: a cell grid separate from the drawn tiles.
//!
//! The level file marks which tile layers collide; their union becomes this
//! grid. Visual layering can change freely without touching gameplay.
//!
//! Grid cells beat polygon colliders here for two reasons:
//!  1. **Performance** -- HashSet lookup per cell is O(1), no broad-phase needed
//!  2. **Simplicity** -- an 18px tile level maps one-to-one onto a cell grid
//!
//! The core algorithm is **axis-separable move-and-slide**: resolve X movement
//! first against the grid, then resolve Y using the already-corrected X
//! position. This prevents diagonal tunneling and produces the "slide along
//! walls" behavior platformer players expect.
//!
//! Coordinates are y-up with cell (0, 0) at the world origin; world position
//! is simply cell * cell_size.

use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridCell {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy)]
pub struct Aabb {
    pub center_x: f32,
    pub center_y: f32,
    pub half_w: f32,
    pub half_h: f32,
}

impl Aabb {
    pub fn overlaps(&self, other: &Aabb) -> bool {
        (self.center_x - other.center_x).abs() < self.half_w + other.half_w
            && (self.center_y - other.center_y).abs() < self.half_h + other.half_h
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CollisionMoveResult {
    pub aabb: Aabb,
    pub collided_y: bool,
    pub blocked_left: bool,
    pub blocked_right: bool,
    pub blocked_down: bool,
    pub blocked_up: bool,
}

#[derive(Debug, Clone)]
pub struct CollisionGrid {
    pub cell_size: i32,
    pub width: i32,
    pub height: i32,
    solids: HashSet<GridCell>,
}

impl CollisionGrid {
    pub fn from_cells(
        cell_size: i32,
        width: i32,
        height: i32,
        cells: impl IntoIterator<Item = GridCell>,
    ) -> Self {
        Self {
            cell_size,
            width,
            height,
            solids: cells.into_iter().collect(),
        }
    }

    pub fn is_solid(&self, x: i32, y: i32) -> bool {
        if x < 0 || x >= self.width || y < 0 || y >= self.height {
            return false;
        }
        self.solids.contains(&GridCell { x, y })
    }

    pub fn solid_count(&self) -> usize {
        self.solids.len()
    }

    pub fn solids_iter(&self) -> impl Iterator<Item = &GridCell> {
        self.solids.iter()
    }

    pub fn world_width(&self) -> f32 {
        (self.width * self.cell_size) as f32
    }

    pub fn world_height(&self) -> f32 {
        (self.height * self.cell_size) as f32
    }

    #[allow(dead_code)]
    pub fn move_and_collide(&self, aabb: Aabb, dx: f32, dy: f32) -> Aabb {
        self.move_and_collide_detailed(aabb, dx, dy).aabb
    }

    pub fn move_and_collide_detailed(&self, aabb: Aabb, dx: f32, dy: f32) -> CollisionMoveResult {
        const EPS: f32 = 0.0001;

        // Axis-separable move-and-slide:
        // resolve X first, then resolve Y using updated X position.
        let resolved_x = self.resolve_axis_x(aabb, dx);
        let x_expected = aabb.center_x + dx;
        let collided_x = (resolved_x - x_expected).abs() > EPS;

        let mut moved = aabb;
        moved.center_x = resolved_x;
        let resolved_y = self.resolve_axis_y(moved, dy);
        let y_expected = aabb.center_y + dy;
        let collided_y = (resolved_y - y_expected).abs() > EPS;
        moved.center_y = resolved_y;

        // Directional block flags are consumed by the player controller to
        // zero velocities only when motion was actually blocked on that side.
        let blocked_left = collided_x && dx < 0.0;
        let blocked_right = collided_x && dx > 0.0;
        let blocked_down = collided_y && dy < 0.0;
        let blocked_up = collided_y && dy > 0.0;

        CollisionMoveResult {
            aabb: moved,
            collided_y,
            blocked_left,
            blocked_right,
            blocked_down,
            blocked_up,
        }
    }

    fn resolve_axis_x(&self, aabb: Aabb, dx: f32) -> f32 {
        if dx == 0.0 {
            return aabb.center_x;
        }

        const EPS: f32 = 0.001;
        let mut candidate_x = aabb.center_x + dx;
        let min_y = aabb.center_y - aabb.half_h + EPS;
        let max_y = aabb.center_y + aabb.half_h - EPS;
        let y0 = self.world_to_cell(min_y);
        let y1 = self.world_to_cell(max_y);

        if dx > 0.0 {
            let max_x = candidate_x + aabb.half_w - EPS;
            let x_cell = self.world_to_cell(max_x);
            for y in y0..=y1 {
                if self.is_solid(x_cell, y) {
                    let cell_left = self.cell_min_world(x_cell);
                    candidate_x = candidate_x.min(cell_left - aabb.half_w);
                }
            }
            // Guardrail: never push opposite direction during resolution.
            candidate_x = candidate_x.max(aabb.center_x);
        } else {
            let min_x = candidate_x - aabb.half_w + EPS;
            let x_cell = self.world_to_cell(min_x);
            for y in y0..=y1 {
                if self.is_solid(x_cell, y) {
                    let cell_right = self.cell_max_world(x_cell);
                    candidate_x = candidate_x.max(cell_right + aabb.half_w);
                }
            }
            // Guardrail: never push opposite direction during resolution.
            candidate_x = candidate_x.min(aabb.center_x);
        }

        candidate_x
    }

    fn resolve_axis_y(&self, aabb: Aabb, dy: f32) -> f32 {
        if dy == 0.0 {
            return aabb.center_y;
        }

        const EPS: f32 = 0.001;
        let mut candidate_y = aabb.center_y + dy;
        let min_x = aabb.center_x - aabb.half_w + EPS;
        let max_x = aabb.center_x + aabb.half_w - EPS;
        let x0 = self.world_to_cell(min_x);
        let x1 = self.world_to_cell(max_x);

        if dy > 0.0 {
            let max_y = candidate_y + aabb.half_h - EPS;
            let y_cell = self.world_to_cell(max_y);
            for x in x0..=x1 {
                if self.is_solid(x, y_cell) {
                    let cell_bottom = self.cell_min_world(y_cell);
                    candidate_y = candidate_y.min(cell_bottom - aabb.half_h);
                }
            }
            // Guardrail: never push opposite direction during resolution.
            candidate_y = candidate_y.max(aabb.center_y);
        } else {
            let min_y = candidate_y - aabb.half_h + EPS;
            let y_cell = self.world_to_cell(min_y);
            for x in x0..=x1 {
                if self.is_solid(x, y_cell) {
                    let cell_top = self.cell_max_world(y_cell);
                    candidate_y = candidate_y.max(cell_top + aabb.half_h);
                }
            }
            // Guardrail: never push opposite direction during resolution.
            candidate_y = candidate_y.min(aabb.center_y);
        }

        candidate_y
    }

    fn world_to_cell(&self, world: f32) -> i32 {
        (world / self.cell_size as f32).floor() as i32
    }

    /// Lower world edge of a cell along either axis.
    fn cell_min_world(&self, cell: i32) -> f32 {
        (cell * self.cell_size) as f32
    }

    /// Upper world edge of a cell along either axis.
    fn cell_max_world(&self, cell: i32) -> f32 {
        ((cell + 1) * self.cell_size) as f32
    }
}
