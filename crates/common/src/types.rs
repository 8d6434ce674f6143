use glam::{Mat4, Vec2, Vec3};
use std::fmt;

/// Integer cell coordinate on the tile grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GridCoord {
    pub x: i32,
    pub y: i32,
}

impl GridCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for GridCoord {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Planar transform: position, roll about Z (degrees), XY scale.
///
/// Tiles are flat, so the model matrix always collapses Z to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub roll_degrees: f32,
    pub scale: Vec2,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            roll_degrees: 0.0,
            scale: Vec2::ONE,
        }
    }
}

impl Transform {
    /// Transform with a uniform XY scale, e.g. the tile size in world units.
    pub fn with_uniform_scale(scale: f32) -> Self {
        Self {
            scale: Vec2::splat(scale),
            ..Self::default()
        }
    }

    /// `translate(position) * rotate_z(roll) * scale(scale.x, scale.y, 0)`.
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_z(self.roll_degrees.to_radians())
            * Mat4::from_scale(self.scale.extend(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn grid_coord_ordering_is_column_then_row() {
        let a = GridCoord::new(-1, 5);
        let b = GridCoord::new(0, -5);
        assert!(a < b);
        assert_eq!(GridCoord::from((3, 4)), GridCoord::new(3, 4));
        assert_eq!(GridCoord::new(-2, 7).to_string(), "(-2, 7)");
    }

    #[test]
    fn default_model_matrix_is_identity_on_tile_plane() {
        let m = Transform::default().model_matrix();
        assert_eq!(m, Mat4::from_scale(Vec3::new(1.0, 1.0, 0.0)));
        assert_eq!(m.col(0), Vec4::X);
        assert_eq!(m.col(1), Vec4::Y);
        assert_eq!(m.col(3), Vec4::W);

        let p = Vec3::new(4.0, -2.5, 0.0);
        assert_eq!(m.transform_point3(p), p);
    }

    #[test]
    fn model_matrix_applies_scale_then_roll_then_translation() {
        let t = Transform {
            position: Vec3::new(10.0, 20.0, 0.0),
            roll_degrees: 90.0,
            scale: Vec2::new(2.0, 2.0),
        };
        let out = t.model_matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        // (1,0) -> scaled (2,0) -> rotated (0,2) -> translated (10,22)
        assert!((out - Vec3::new(10.0, 22.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn model_matrix_flattens_z() {
        let t = Transform::with_uniform_scale(16.0);
        let out = t.model_matrix().transform_point3(Vec3::new(0.5, 0.5, 0.5));
        assert_eq!(out, Vec3::new(8.0, 8.0, 0.0));
    }

    #[test]
    fn model_matrix_is_stable_for_fixed_state() {
        let t = Transform {
            position: Vec3::new(-3.0, 1.5, 2.0),
            roll_degrees: 33.0,
            scale: Vec2::new(16.0, 8.0),
        };
        assert_eq!(t.model_matrix(), t.model_matrix());
    }
}
