use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::collision::{Aabb, Triangle};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TerrainError {
    #[error("heightmap needs at least 2x2 points, got {columns}x{rows}")]
    TooSmall { columns: usize, rows: usize },
    #[error("expected {expected} heights, got {actual}")]
    HeightCount { expected: usize, actual: usize },
    #[error("invalid cell size {0}")]
    CellSize(f32),
}

/// Regular grid of heights on the x/z plane. Each cell is split into two
/// triangles along its (1,0)-(0,1) diagonal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeightMap {
    origin: Vec2,
    cell_size: f32,
    columns: usize,
    rows: usize,
    heights: Vec<f32>,
}

impl HeightMap {
    pub fn new(
        origin: Vec2,
        cell_size: f32,
        columns: usize,
        rows: usize,
        heights: Vec<f32>,
    ) -> Result<Self, TerrainError> {
        if columns < 2 || rows < 2 {
            return Err(TerrainError::TooSmall { columns, rows });
        }
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(TerrainError::CellSize(cell_size));
        }
        if heights.len() != columns * rows {
            return Err(TerrainError::HeightCount {
                expected: columns * rows,
                actual: heights.len(),
            });
        }
        Ok(Self {
            origin,
            cell_size,
            columns,
            rows,
            heights,
        })
    }

    pub fn flat(
        origin: Vec2,
        cell_size: f32,
        columns: usize,
        rows: usize,
    ) -> Result<Self, TerrainError> {
        Self::new(origin, cell_size, columns, rows, vec![0.0; columns * rows])
    }

    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    fn point(&self, column: usize, row: usize) -> f32 {
        self.heights[row * self.columns + column]
    }

    pub fn set(&mut self, column: usize, row: usize, height: f32) -> bool {
        if column >= self.columns || row >= self.rows {
            return false;
        }
        self.heights[row * self.columns + column] = height;
        true
    }

    /// Cell index and fractional position inside it, `None` off the map.
    fn locate(&self, x: f32, z: f32) -> Option<(usize, usize, f32, f32)> {
        let local = (Vec2::new(x, z) - self.origin) / self.cell_size;
        if !local.is_finite() || local.x < 0.0 || local.y < 0.0 {
            return None;
        }

        let cells = Vec2::new((self.columns - 1) as f32, (self.rows - 1) as f32);
        if local.x > cells.x || local.y > cells.y {
            return None;
        }

        // The far edge belongs to the last cell.
        let column = (local.x.floor() as usize).min(self.columns - 2);
        let row = (local.y.floor() as usize).min(self.rows - 2);
        Some((column, row, local.x - column as f32, local.y - row as f32))
    }

    /// Terrain height at world `(x, z)` by barycentric interpolation.
    pub fn height(&self, x: f32, z: f32) -> Option<f32> {
        let (column, row, fx, fz) = self.locate(x, z)?;

        let h00 = self.point(column, row);
        let h10 = self.point(column + 1, row);
        let h01 = self.point(column, row + 1);
        let h11 = self.point(column + 1, row + 1);

        let height = if fx <= 1.0 - fz {
            h00 + fx * (h10 - h00) + fz * (h01 - h00)
        } else {
            h11 + (1.0 - fx) * (h01 - h11) + (1.0 - fz) * (h10 - h11)
        };
        Some(height)
    }

    fn corner(&self, column: usize, row: usize) -> Vec3 {
        let xz = self.origin + Vec2::new(column as f32, row as f32) * self.cell_size;
        Vec3::new(xz.x, self.point(column, row), xz.y)
    }

    fn cell_triangles(&self, column: usize, row: usize) -> [Triangle; 2] {
        let p00 = self.corner(column, row);
        let p10 = self.corner(column + 1, row);
        let p01 = self.corner(column, row + 1);
        let p11 = self.corner(column + 1, row + 1);
        [Triangle::new(p00, p01, p10), Triangle::new(p10, p01, p11)]
    }

    pub fn triangles(&self) -> impl Iterator<Item = Triangle> + '_ {
        (0..self.rows - 1).flat_map(move |row| {
            (0..self.columns - 1).flat_map(move |column| self.cell_triangles(column, row))
        })
    }

    /// Triangles of every cell whose footprint touches `bounds`.
    pub fn triangles_in(&self, bounds: &Aabb) -> impl Iterator<Item = Triangle> + '_ {
        let to_cell = |value: f32, origin: f32, cells: usize| -> usize {
            let cell = ((value - origin) / self.cell_size).floor();
            if cell <= 0.0 {
                0
            } else {
                (cell as usize).min(cells)
            }
        };

        let columns = self.columns - 1;
        let rows = self.rows - 1;
        let first_column = to_cell(bounds.min.x, self.origin.x, columns);
        let last_column = to_cell(bounds.max.x, self.origin.x, columns).min(columns - 1);
        let first_row = to_cell(bounds.min.z, self.origin.y, rows);
        let last_row = to_cell(bounds.max.z, self.origin.y, rows).min(rows - 1);

        let bounds = *bounds;
        (first_row..=last_row)
            .flat_map(move |row| {
                (first_column..=last_column)
                    .flat_map(move |column| self.cell_triangles(column, row))
            })
            .filter(move |triangle| triangle.bounds().overlaps(&bounds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> HeightMap {
        // Rises by one unit per cell along +x.
        let heights = (0..9).map(|i| (i % 3) as f32).collect();
        HeightMap::new(Vec2::ZERO, 1.0, 3, 3, heights).unwrap()
    }

    #[test]
    fn rejects_bad_dimensions() {
        assert_eq!(
            HeightMap::flat(Vec2::ZERO, 1.0, 1, 4),
            Err(TerrainError::TooSmall { columns: 1, rows: 4 })
        );
        assert_eq!(
            HeightMap::new(Vec2::ZERO, 1.0, 2, 2, vec![0.0; 3]),
            Err(TerrainError::HeightCount { expected: 4, actual: 3 })
        );
        assert_eq!(
            HeightMap::flat(Vec2::ZERO, 0.0, 2, 2),
            Err(TerrainError::CellSize(0.0))
        );
    }

    #[test]
    fn height_interpolates_both_triangles() {
        let map = ramp();
        assert_eq!(map.height(0.0, 0.0), Some(0.0));
        assert_eq!(map.height(2.0, 2.0), Some(2.0));
        assert!((map.height(0.25, 0.25).unwrap() - 0.25).abs() < 1e-6);
        assert!((map.height(1.75, 0.9).unwrap() - 1.75).abs() < 1e-6);
        assert!((map.height(0.8, 0.8).unwrap() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn off_map_has_no_height() {
        let map = ramp();
        assert_eq!(map.height(-0.1, 1.0), None);
        assert_eq!(map.height(1.0, 2.5), None);
    }

    #[test]
    fn triangles_cover_grid() {
        let map = ramp();
        assert_eq!(map.triangles().count(), 8);

        let region = Aabb {
            min: Vec3::new(0.2, -1.0, 0.2),
            max: Vec3::new(0.4, 1.0, 0.4),
        };
        let near: Vec<_> = map.triangles_in(&region).collect();
        assert!(!near.is_empty());
        assert!(near.len() <= 2);
    }

    #[test]
    fn set_moves_one_grid_point() {
        let mut map = HeightMap::flat(Vec2::ZERO, 2.0, 3, 3).unwrap();
        assert!(map.set(1, 1, 4.0));
        assert!(!map.set(3, 0, 1.0));

        assert_eq!(map.height(2.0, 2.0), Some(4.0));
        assert_eq!(map.height(0.0, 0.0), Some(0.0));
        assert!((map.height(1.0, 2.0).unwrap() - 2.0).abs() < 1e-6);
    }
}
