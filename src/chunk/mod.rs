use crate::compression::{self, CompressionError};
use crate::counters;
use crate::endpoint::{Endpoint, EndpointClient, EndpointError};
use crate::octree::bbox::Bbox;
use crate::octree::climber::Climber;
use crate::octree::id::Id;
use crate::octree::structure::Structure;
use crate::point::Point;
use crate::pool::{PointHandle, PointPool, Stack};
use crate::schema::Schema;
use crate::tube::{Cell, Tube};
use binrw::BinReaderExt;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChunkError {
    #[error("empty chunk blob")]
    EmptyBlob,

    #[error("unknown chunk type marker {0:#04x}")]
    UnknownType(u8),

    #[error("truncated chunk tail")]
    TruncatedTail,

    #[error("schema has no X/Y/Z double dimensions")]
    MissingPosition,

    #[error(transparent)]
    Compression(#[from] CompressionError),

    #[error("malformed chunk record: {0}")]
    Record(#[from] binrw::Error),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkKind {
    Sparse,
    Contiguous,
}

impl ChunkKind {
    pub fn marker(self) -> u8 {
        match self {
            ChunkKind::Sparse => 0,
            ChunkKind::Contiguous => 1,
        }
    }

    pub fn from_marker(marker: u8) -> Option<ChunkKind> {
        match marker {
            0 => Some(ChunkKind::Sparse),
            1 => Some(ChunkKind::Contiguous),
            _ => None,
        }
    }
}

/// Serialization trailer: point count then type marker, appended after the
/// compressed payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tail {
    pub num_points: u64,
    pub kind: ChunkKind,
}

pub fn push_tail(data: &mut Vec<u8>, tail: Tail) {
    data.extend_from_slice(&tail.num_points.to_le_bytes());
    data.push(tail.kind.marker());
}

/// Strip and return the trailer; `data` is left holding the compressed
/// payload alone.
pub fn pop_tail(data: &mut Vec<u8>) -> Result<Tail, ChunkError> {
    let marker = data.pop().ok_or(ChunkError::EmptyBlob)?;
    let kind = ChunkKind::from_marker(marker).ok_or(ChunkError::UnknownType(marker))?;

    if data.len() < 8 {
        return Err(ChunkError::TruncatedTail);
    }
    let at = data.len() - 8;
    let num_points: u64 = Cursor::new(&data[at..]).read_le()?;
    data.truncate(at);

    Ok(Tail { num_points, kind })
}

enum Store {
    Contiguous(Vec<Tube>),
    Sparse(Mutex<BTreeMap<u64, Tube>>),
}

/// The unit of persistence: all tubes for one contiguous range of node ids,
/// `[id, id + max_points)`. Dense chunks keep a tube per slot; sparse chunks
/// map only the populated slots behind a mutex.
pub struct Chunk {
    schema: Schema,
    celled: Schema,
    bounds: Bbox,
    structure: Structure,
    pool: Arc<PointPool>,
    depth: u64,
    id: Id,
    max_points: u64,
    num_points: AtomicU64,
    position: [usize; 3],
    store: Store,
}

impl Chunk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        schema: Schema,
        bounds: Bbox,
        structure: Structure,
        pool: Arc<PointPool>,
        depth: u64,
        id: Id,
        max_points: u64,
        kind: ChunkKind,
    ) -> Result<Chunk, ChunkError> {
        let position = schema.position_offsets().ok_or(ChunkError::MissingPosition)?;
        let celled = schema.celled();

        let store = match kind {
            ChunkKind::Contiguous => {
                let mut tubes = Vec::new();
                tubes.resize_with(max_points as usize, Tube::default);
                Store::Contiguous(tubes)
            }
            ChunkKind::Sparse => Store::Sparse(Mutex::new(BTreeMap::new())),
        };

        counters::add_chunk();

        Ok(Chunk {
            schema,
            celled,
            bounds,
            structure,
            pool,
            depth,
            id,
            max_points,
            num_points: AtomicU64::new(0),
            position,
            store,
        })
    }

    /// Rebuild a chunk from a serialized blob. The tail's type marker, not
    /// the caller, decides the in-memory layout.
    #[allow(clippy::too_many_arguments)]
    pub fn from_bytes(
        schema: Schema,
        bounds: Bbox,
        structure: Structure,
        pool: Arc<PointPool>,
        depth: u64,
        id: Id,
        max_points: u64,
        mut data: Vec<u8>,
    ) -> Result<Chunk, ChunkError> {
        let tail = pop_tail(&mut data)?;

        let mut chunk = Chunk::new(
            schema, bounds, structure, pool, depth, id, max_points, tail.kind,
        )?;
        chunk.num_points = AtomicU64::new(tail.num_points);
        counters::add_bytes(tail.num_points as usize * chunk.schema.point_size());

        let raw = compression::decompress(&data, &chunk.celled, tail.num_points as usize)?;
        let native_size = chunk.schema.point_size();
        let mut cursor = Cursor::new(raw.as_slice());

        for _ in 0..tail.num_points {
            let tube_id: u64 = cursor.read_le()?;
            let at = cursor.position() as usize;
            let payload = &raw[at..at + native_size];

            let point = Point::new(
                read_f64(payload, chunk.position[0]),
                read_f64(payload, chunk.position[1]),
                read_f64(payload, chunk.position[2]),
            );
            let handle = chunk.pool.acquire(point, payload);

            // the base chunk spans several levels, so its depth is per node
            let node_depth = if chunk.depth != 0 {
                chunk.depth
            } else {
                chunk.structure.calc_depth(&(&chunk.id + tube_id))
            };
            let tick = Tube::calc_tick(point, &chunk.bounds, node_depth);
            chunk
                .tube_mut(tube_id)
                .add_cell(tick, Cell::occupied(point, handle));

            cursor.set_position((at + native_size) as u64);
        }

        Ok(chunk)
    }

    pub fn kind(&self) -> ChunkKind {
        match self.store {
            Store::Contiguous(_) => ChunkKind::Contiguous,
            Store::Sparse(_) => ChunkKind::Sparse,
        }
    }

    pub fn id(&self) -> &Id {
        &self.id
    }

    pub fn depth(&self) -> u64 {
        self.depth
    }

    pub fn max_points(&self) -> u64 {
        self.max_points
    }

    /// Points freshly inserted or restored into this chunk.
    pub fn num_points(&self) -> u64 {
        self.num_points.load(Ordering::Acquire)
    }

    pub fn bounds(&self) -> &Bbox {
        &self.bounds
    }

    fn end_id(&self) -> Id {
        &self.id + self.max_points
    }

    /// Chunk-relative slot of a global node id.
    pub fn normalize(&self, raw: &Id) -> u64 {
        debug_assert!(*raw >= self.id, "node id below chunk range");
        debug_assert!(*raw < self.end_id(), "node id past chunk range");
        (raw - &self.id).simple() as u64
    }

    fn tube_mut(&mut self, slot: u64) -> &mut Tube {
        match &mut self.store {
            Store::Contiguous(tubes) => &mut tubes[slot as usize],
            Store::Sparse(map) => map
                .get_mut()
                .expect("tube map poisoned")
                .entry(slot)
                .or_default(),
        }
    }

    /// The cell at the climber's node and tick, created empty on first
    /// touch. Creation bumps `num_points` and the process byte counter.
    pub fn get_cell(&mut self, climber: &Climber<'_>) -> &mut Cell {
        let slot = self.normalize(climber.index());
        let tick = climber.tick();

        let (created, cell) = match &mut self.store {
            Store::Contiguous(tubes) => tubes[slot as usize].get_cell(tick),
            Store::Sparse(map) => {
                let tubes = map.get_mut().expect("tube map poisoned");
                tubes.entry(slot).or_default().get_cell(tick)
            }
        };

        if created {
            counters::add_bytes(self.schema.point_size());
            self.num_points.fetch_add(1, Ordering::AcqRel);
        }
        cell
    }

    /// Place a point at the climber's cell unless it is already taken.
    pub fn try_insert(&mut self, climber: &Climber<'_>, point: Point, handle: PointHandle) -> bool {
        let cell = self.get_cell(climber);
        if cell.is_empty() {
            cell.store(point, handle);
            true
        } else {
            false
        }
    }

    /// Insertion through a shared reference. Sparse chunks serialize access
    /// with their tube-map mutex; contiguous chunks return `None` and rely
    /// on the caller's disjoint partitioning instead.
    pub fn try_insert_shared(
        &self,
        climber: &Climber<'_>,
        point: Point,
        handle: PointHandle,
    ) -> Option<bool> {
        let map = match &self.store {
            Store::Contiguous(_) => return None,
            Store::Sparse(map) => map,
        };
        let slot = self.normalize(climber.index());

        let mut tubes = map.lock().expect("tube map poisoned");
        let (created, cell) = tubes.entry(slot).or_default().get_cell(climber.tick());
        if created {
            counters::add_bytes(self.schema.point_size());
            self.num_points.fetch_add(1, Ordering::AcqRel);
        }
        Some(if cell.is_empty() {
            cell.store(point, handle);
            true
        } else {
            false
        })
    }

    /// The tube at a chunk-relative slot, if populated.
    pub fn tube(&mut self, slot: u64) -> Option<&Tube> {
        match &mut self.store {
            Store::Contiguous(tubes) => tubes.get(slot as usize).filter(|tube| !tube.is_empty()),
            Store::Sparse(map) => map
                .get_mut()
                .expect("tube map poisoned")
                .get(&slot)
                .map(|tube| &*tube),
        }
    }

    /// All populated cells as `(slot, tick, payload)`, slot- then
    /// tick-ascending.
    pub fn contents(&mut self) -> Vec<(u64, u64, Vec<u8>)> {
        let pool = self.pool.clone();
        let mut out = Vec::new();
        let mut push = |slot: u64, tube: &Tube| {
            for (tick, cell) in tube.cells() {
                if let Some(handle) = cell.handle() {
                    out.push((slot, tick, pool.payload(handle)));
                }
            }
        };
        match &mut self.store {
            Store::Contiguous(tubes) => {
                for (slot, tube) in tubes.iter().enumerate() {
                    push(slot as u64, tube);
                }
            }
            Store::Sparse(map) => {
                for (slot, tube) in map.get_mut().expect("tube map poisoned").iter() {
                    push(*slot, tube);
                }
            }
        }
        out
    }

    /// Serialized blob: compressed records plus the tail. Drained handles
    /// are pushed onto `stack` for release.
    fn serialize(&mut self, stack: &mut Stack) -> Result<Vec<u8>, ChunkError> {
        let mut raw = Vec::new();
        match &mut self.store {
            Store::Contiguous(tubes) => {
                for (slot, tube) in tubes.iter().enumerate() {
                    tube.serialize(slot as u64, &self.pool, &mut raw, stack);
                }
            }
            Store::Sparse(map) => {
                for (slot, tube) in map.get_mut().expect("tube map poisoned").iter() {
                    tube.serialize(*slot, &self.pool, &mut raw, stack);
                }
            }
        }

        let mut blob = compression::compress(&raw, &self.celled)?;
        push_tail(
            &mut blob,
            Tail {
                num_points: self.num_points(),
                kind: self.kind(),
            },
        );
        Ok(blob)
    }

    fn clear_tubes(&mut self) {
        match &mut self.store {
            Store::Contiguous(tubes) => tubes.clear(),
            Store::Sparse(map) => map.get_mut().expect("tube map poisoned").clear(),
        }
    }

    /// Serialize, release the payload slots, and upload under the decimal
    /// id path.
    pub async fn save<C: EndpointClient>(self, endpoint: &Endpoint<C>) -> Result<(), ChunkError> {
        self.save_with_postfix(endpoint, "").await
    }

    /// As [`save`](Self::save); contiguous chunks honor a path postfix so
    /// the caller can shard the multi-depth base chunk.
    pub async fn save_with_postfix<C: EndpointClient>(
        mut self,
        endpoint: &Endpoint<C>,
        postfix: &str,
    ) -> Result<(), ChunkError> {
        let mut stack = Stack::new();
        let blob = self.serialize(&mut stack)?;
        self.clear_tubes();
        self.pool.release(stack);

        let path = match self.kind() {
            ChunkKind::Contiguous => format!("{}{}", self.id, postfix),
            ChunkKind::Sparse => self.id.to_string(),
        };
        tracing::debug!(
            path = %path,
            points = self.num_points(),
            bytes = blob.len(),
            "saving chunk"
        );
        endpoint.ensure_put(&path, &blob).await?;
        Ok(())
    }
}

impl Drop for Chunk {
    fn drop(&mut self) {
        let mut stack = Stack::new();
        match &mut self.store {
            Store::Contiguous(tubes) => {
                for tube in tubes.iter_mut() {
                    tube.collect_handles(&mut stack);
                }
            }
            Store::Sparse(map) => {
                for tube in map.get_mut().expect("tube map poisoned").values_mut() {
                    tube.collect_handles(&mut stack);
                }
            }
        }
        if !stack.is_empty() {
            self.pool.release(stack);
        }
        counters::sub_bytes(self.num_points() as usize * self.schema.point_size());
        counters::sub_chunk();
    }
}

fn read_f64(payload: &[u8], offset: usize) -> f64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&payload[offset..offset + 8]);
    f64::from_le_bytes(bytes)
}
