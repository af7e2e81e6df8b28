use crate::octree::bbox::Bbox;
use crate::point::{self, Point};
use crate::pool::{PointHandle, PointPool, Stack};
use std::collections::BTreeMap;

/// One point slot: coordinates plus the arena slot holding its payload.
#[derive(Clone, Debug)]
pub struct Cell {
    point: Point,
    handle: Option<PointHandle>,
}

impl Default for Cell {
    fn default() -> Cell {
        Cell {
            point: point::NONE,
            handle: None,
        }
    }
}

impl Cell {
    pub(crate) fn occupied(point: Point, handle: PointHandle) -> Cell {
        Cell {
            point,
            handle: Some(handle),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.handle.is_none()
    }

    pub fn store(&mut self, point: Point, handle: PointHandle) {
        debug_assert!(self.is_empty(), "cell already populated");
        debug_assert!(point::exists(point));
        self.point = point;
        self.handle = Some(handle);
    }

    pub fn point(&self) -> Point {
        self.point
    }

    pub fn handle(&self) -> Option<PointHandle> {
        self.handle
    }
}

/// The cells sharing one XY lineage, keyed by vertical tick.
#[derive(Debug, Default)]
pub struct Tube {
    cells: BTreeMap<u64, Cell>,
}

impl Tube {
    /// Vertical bin of `point` at `depth`, against the full tree bounds.
    pub fn calc_tick(point: Point, bounds: &Bbox, depth: u64) -> u64 {
        debug_assert!(depth < 64);
        let ticks = 1u64 << depth;
        let height = bounds.height();
        if height <= 0.0 {
            return 0;
        }
        let bin = ((point.z - bounds.min().z) / height * ticks as f64).floor();
        (bin as i64).clamp(0, ticks as i64 - 1) as u64
    }

    /// The cell at `tick`, created empty if absent.
    pub fn get_cell(&mut self, tick: u64) -> (bool, &mut Cell) {
        let mut created = false;
        let cell = self.cells.entry(tick).or_insert_with(|| {
            created = true;
            Cell::default()
        });
        (created, cell)
    }

    pub(crate) fn add_cell(&mut self, tick: u64, cell: Cell) {
        let previous = self.cells.insert(tick, cell);
        debug_assert!(previous.is_none(), "duplicate tick in tube");
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Cells in ascending tick order.
    pub fn cells(&self) -> impl Iterator<Item = (u64, &Cell)> {
        self.cells.iter().map(|(tick, cell)| (*tick, cell))
    }

    /// Append this tube's records (tube id + native payload per cell, ticks
    /// ascending) to `out`, pushing the drained handles onto `stack`.
    pub(crate) fn serialize(
        &self,
        tube_id: u64,
        pool: &PointPool,
        out: &mut Vec<u8>,
        stack: &mut Stack,
    ) {
        for (_tick, cell) in self.cells.iter() {
            if let Some(handle) = cell.handle {
                out.extend_from_slice(&tube_id.to_le_bytes());
                pool.copy_payload_into(handle, out);
                stack.push(handle);
            }
        }
    }

    pub(crate) fn collect_handles(&mut self, stack: &mut Stack) {
        for cell in self.cells.values() {
            if let Some(handle) = cell.handle {
                stack.push(handle);
            }
        }
        self.cells.clear();
    }
}
