use super::bbox::Bbox;
use super::id::Id;
use super::structure::Structure;
use super::Dir;
use crate::point::{self, Point};
use crate::tube::Tube;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClimbError {
    #[error("point {0} is outside the indexed bounds")]
    OutOfBounds(Point),
}

/// Cursor that descends the octree one octant per step, tracking the node
/// id, the enclosing chunk, and the vertical tick for the point being placed.
#[derive(Clone, Debug)]
pub struct Climber<'a> {
    structure: &'a Structure,
    dimensions: u32,
    factor: u64,
    index: Id,
    level_index: Id,
    chunk_id: Id,
    depth: u64,
    sparse_depth_begin: u64,
    depth_chunks: u64,
    chunk_num: u64,
    chunk_points: u64,
    full: Bbox,
    cell: Bbox,
    point: Point,
}

impl<'a> Climber<'a> {
    pub fn new(bounds: Bbox, structure: &'a Structure) -> Self {
        Climber {
            structure,
            dimensions: structure.dimensions(),
            factor: structure.factor(),
            index: Id::zero(),
            level_index: Id::zero(),
            chunk_id: structure.nominal_chunk_index().clone(),
            depth: 0,
            sparse_depth_begin: if structure.dynamic_chunks() {
                structure.sparse_depth_begin()
            } else {
                0
            },
            depth_chunks: 1,
            chunk_num: 0,
            chunk_points: structure.base_chunk_points(),
            cell: bounds.clone(),
            full: bounds,
            point: point::NONE,
        }
    }

    /// Step into the octant of the current cell containing `point`.
    pub fn magnify(&mut self, point: Point) -> Result<(), ClimbError> {
        if !self.cell.contains(point) {
            return Err(ClimbError::OutOfBounds(point));
        }
        let mid = self.cell.mid();

        let mut bits = 0u8;
        if point.x >= mid.x {
            bits |= 1;
        }
        if point.y >= mid.y {
            bits |= 2;
        }
        if self.dimensions == 3 && point.z >= mid.z {
            bits |= 4;
        }

        self.point = point;
        self.climb(Dir::from_bits(bits));
        Ok(())
    }

    pub fn climb(&mut self, dir: Dir) {
        self.depth += 1;
        if self.depth > self.structure.nominal_chunk_depth() {
            if self.sparse_depth_begin == 0 || self.depth <= self.sparse_depth_begin {
                // the parent's offset within its chunk picks the child chunk
                let slot_points = self.chunk_points / self.factor;
                let chunk_ratio = (&self.index - &self.chunk_id).simple() as u64 / slot_points;
                debug_assert!(chunk_ratio < self.factor);

                self.chunk_id <<= self.dimensions;
                self.chunk_id += 1;
                self.chunk_id += chunk_ratio * self.chunk_points;

                if self.depth >= self.structure.cold_depth_begin() {
                    self.chunk_num = (&(&self.chunk_id - self.structure.cold_index_begin())
                        / self.chunk_points)
                        .simple() as u64;
                }

                self.depth_chunks *= self.factor;
            } else {
                // chunks stop multiplying and grow instead
                self.chunk_num += self.depth_chunks;

                self.chunk_id <<= self.dimensions;
                self.chunk_id += 1;

                self.chunk_points *= self.factor;
            }
        }

        self.index <<= self.dimensions;
        self.index += 1;
        self.index += dir as u64;

        self.level_index <<= self.dimensions;
        self.level_index += 1;

        self.cell = if self.dimensions == 3 {
            self.cell.octant(dir)
        } else {
            self.cell.quadrant(dir)
        };
    }

    pub fn index(&self) -> &Id {
        &self.index
    }

    /// First node id of the current depth level.
    pub fn level_index(&self) -> &Id {
        &self.level_index
    }

    pub fn chunk_id(&self) -> &Id {
        &self.chunk_id
    }

    pub fn chunk_num(&self) -> u64 {
        self.chunk_num
    }

    pub fn chunk_points(&self) -> u64 {
        self.chunk_points
    }

    pub fn depth_chunks(&self) -> u64 {
        self.depth_chunks
    }

    pub fn depth(&self) -> u64 {
        self.depth
    }

    /// Vertical bin of the last magnified point at the current depth.
    pub fn tick(&self) -> u64 {
        if point::exists(self.point) {
            Tube::calc_tick(self.point, &self.full, self.depth)
        } else {
            0
        }
    }

    /// Bounds of the current cell.
    pub fn bounds(&self) -> &Bbox {
        &self.cell
    }

    pub fn point(&self) -> Point {
        self.point
    }
}
