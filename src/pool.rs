use crate::point::{self, Point};
use std::sync::Mutex;

const POINTS_PER_BLOCK: usize = 4096;

/// Index of a payload slot inside a [`PointPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PointHandle(usize);

/// A batch of handles headed back to the pool.
#[derive(Debug, Default)]
pub struct Stack {
    handles: Vec<PointHandle>,
}

impl Stack {
    pub fn new() -> Stack {
        Stack::default()
    }

    pub fn push(&mut self, handle: PointHandle) {
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

/// Arena of fixed-size point payloads. Slots are carved out of block
/// allocations so bulk insertion does not hit the allocator per point.
pub struct PointPool {
    point_size: usize,
    points_per_block: usize,
    inner: Mutex<PoolInner>,
}

#[derive(Default)]
struct PoolInner {
    blocks: Vec<Box<[u8]>>,
    points: Vec<Point>,
    free: Vec<usize>,
}

impl PointPool {
    pub fn new(point_size: usize) -> PointPool {
        Self::with_block_capacity(point_size, POINTS_PER_BLOCK)
    }

    pub fn with_block_capacity(point_size: usize, points_per_block: usize) -> PointPool {
        debug_assert!(point_size > 0 && points_per_block > 0);
        PointPool {
            point_size,
            points_per_block,
            inner: Mutex::new(PoolInner::default()),
        }
    }

    pub fn point_size(&self) -> usize {
        self.point_size
    }

    /// Copy one payload into a free slot and tag it with its coordinates.
    pub fn acquire(&self, point: Point, data: &[u8]) -> PointHandle {
        debug_assert_eq!(data.len(), self.point_size, "payload size mismatch");
        let mut inner = self.inner.lock().expect("point pool poisoned");

        let slot = match inner.free.pop() {
            Some(slot) => slot,
            None => {
                let slot = inner.points.len();
                if slot == inner.blocks.len() * self.points_per_block {
                    let block = vec![0u8; self.points_per_block * self.point_size];
                    inner.blocks.push(block.into_boxed_slice());
                }
                inner.points.push(point::NONE);
                slot
            }
        };

        inner.points[slot] = point;
        let (block, offset) = (slot / self.points_per_block, slot % self.points_per_block);
        let at = offset * self.point_size;
        inner.blocks[block][at..at + self.point_size].copy_from_slice(data);

        PointHandle(slot)
    }

    pub fn point(&self, handle: PointHandle) -> Point {
        let inner = self.inner.lock().expect("point pool poisoned");
        inner.points[handle.0]
    }

    pub fn payload(&self, handle: PointHandle) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.point_size);
        self.copy_payload_into(handle, &mut out);
        out
    }

    /// Append the slot's payload bytes to `out` without a temporary.
    pub fn copy_payload_into(&self, handle: PointHandle, out: &mut Vec<u8>) {
        let inner = self.inner.lock().expect("point pool poisoned");
        let (block, offset) = (
            handle.0 / self.points_per_block,
            handle.0 % self.points_per_block,
        );
        let at = offset * self.point_size;
        out.extend_from_slice(&inner.blocks[block][at..at + self.point_size]);
    }

    /// Return a batch of slots; their handles are invalid afterwards.
    pub fn release(&self, stack: Stack) {
        let mut inner = self.inner.lock().expect("point pool poisoned");
        for handle in stack.handles {
            inner.points[handle.0] = point::NONE;
            inner.free.push(handle.0);
        }
    }

    /// Slots currently held by callers.
    pub fn in_use(&self) -> usize {
        let inner = self.inner.lock().expect("point pool poisoned");
        inner.points.len() - inner.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_copies_payload() {
        let pool = PointPool::new(4);
        let p = Point::new(1.0, 2.0, 3.0);
        let handle = pool.acquire(p, &[9, 8, 7, 6]);
        assert_eq!(pool.point(handle), p);
        assert_eq!(pool.payload(handle), vec![9, 8, 7, 6]);
    }

    #[test]
    fn released_slots_are_reused() {
        let pool = PointPool::with_block_capacity(2, 2);
        let a = pool.acquire(Point::new(0.0, 0.0, 0.0), &[1, 1]);
        let b = pool.acquire(Point::new(0.0, 0.0, 1.0), &[2, 2]);
        assert_eq!(pool.in_use(), 2);

        let mut stack = Stack::new();
        stack.push(a);
        stack.push(b);
        pool.release(stack);
        assert_eq!(pool.in_use(), 0);

        let c = pool.acquire(Point::new(0.0, 0.0, 2.0), &[3, 3]);
        let d = pool.acquire(Point::new(0.0, 0.0, 3.0), &[4, 4]);
        // both recycled slots, no third allocation
        assert!(c.0 < 2 && d.0 < 2);
        assert_eq!(pool.payload(c), vec![3, 3]);
        assert_eq!(pool.payload(d), vec![4, 4]);
    }

    #[test]
    fn grows_by_whole_blocks() {
        let pool = PointPool::with_block_capacity(8, 2);
        let mut handles = Vec::new();
        for i in 0..5 {
            let z = i as f64;
            handles.push(pool.acquire(Point::new(0.0, 0.0, z), &z.to_le_bytes()));
        }
        assert_eq!(pool.in_use(), 5);
        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(pool.payload(*handle), (i as f64).to_le_bytes().to_vec());
        }
    }

    #[test]
    fn copy_payload_appends() {
        let pool = PointPool::new(2);
        let a = pool.acquire(Point::new(0.0, 0.0, 0.0), &[1, 2]);
        let b = pool.acquire(Point::new(0.0, 0.0, 1.0), &[3, 4]);
        let mut out = Vec::new();
        pool.copy_payload_into(a, &mut out);
        pool.copy_payload_into(b, &mut out);
        assert_eq!(out, vec![1, 2, 3, 4]);
    }
}
