use crate::chunk::{Chunk, ChunkError, ChunkKind};
use crate::endpoint::{Endpoint, EndpointClient, EndpointError};
use crate::metadata::{TreeMetadata, METADATA_PATH};
use crate::octree::bbox::Bbox;
use crate::octree::climber::{ClimbError, Climber};
use crate::octree::id::Id;
use crate::octree::structure::Structure;
use crate::point::Point;
use crate::pool::{PointPool, Stack};
use crate::schema::Schema;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Ticks are u64 bins, which bounds how deep a point may descend.
const MAX_DEPTH: u64 = 63;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Climb(#[from] ClimbError),

    #[error("no free cell for point {0} within the depth limit")]
    DepthExhausted(Point),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error("metadata serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Builds a tree by streaming points into chunks, then flushes everything
/// to the endpoint as compressed blobs plus a metadata document.
///
/// Each point settles at the shallowest node whose cell (keyed by the
/// point's vertical tick) is still free, so shallow depths hold a
/// resolution-appropriate sample of the whole set.
pub struct TreeWriter<C: EndpointClient> {
    endpoint: Endpoint<C>,
    schema: Schema,
    structure: Structure,
    bounds: Bbox,
    pool: Arc<PointPool>,
    base: Chunk,
    cold: BTreeMap<Id, Chunk>,
    inserted: u64,
}

impl<C: EndpointClient> TreeWriter<C> {
    pub fn new(
        endpoint: Endpoint<C>,
        schema: Schema,
        structure: Structure,
        bounds: Bbox,
    ) -> Result<Self, BuildError> {
        let pool = Arc::new(PointPool::new(schema.point_size()));
        let base = Chunk::new(
            schema.clone(),
            bounds.clone(),
            structure.clone(),
            pool.clone(),
            0,
            Id::zero(),
            structure.cold_index_begin().simple() as u64,
            ChunkKind::Contiguous,
        )?;

        Ok(TreeWriter {
            endpoint,
            schema,
            structure,
            bounds,
            pool,
            base,
            cold: BTreeMap::new(),
            inserted: 0,
        })
    }

    pub fn inserted(&self) -> u64 {
        self.inserted
    }

    pub fn pool(&self) -> &Arc<PointPool> {
        &self.pool
    }

    /// Index one point. `payload` is the full native record for the
    /// schema; its coordinates must match `point`.
    pub fn insert(&mut self, point: Point, payload: &[u8]) -> Result<(), BuildError> {
        if !self.bounds.contains(point) {
            return Err(ClimbError::OutOfBounds(point).into());
        }
        let handle = self.pool.acquire(point, payload);
        let mut climber = Climber::new(self.bounds.clone(), &self.structure);

        loop {
            let depth = climber.depth();
            let chunk = if depth < self.structure.cold_depth_begin() {
                &mut self.base
            } else {
                match self.cold.entry(climber.chunk_id().clone()) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => {
                        let kind = if self.structure.dynamic_chunks()
                            && depth >= self.structure.sparse_depth_begin()
                        {
                            ChunkKind::Sparse
                        } else {
                            ChunkKind::Contiguous
                        };
                        let chunk = Chunk::new(
                            self.schema.clone(),
                            self.bounds.clone(),
                            self.structure.clone(),
                            self.pool.clone(),
                            depth,
                            entry.key().clone(),
                            climber.chunk_points(),
                            kind,
                        )?;
                        entry.insert(chunk)
                    }
                }
            };

            if chunk.try_insert(&climber, point, handle) {
                self.inserted += 1;
                return Ok(());
            }
            if depth + 1 > MAX_DEPTH {
                let mut stack = Stack::new();
                stack.push(handle);
                self.pool.release(stack);
                return Err(BuildError::DepthExhausted(point));
            }
            climber.magnify(point)?;
        }
    }

    /// Number of chunks currently held, the base chunk included.
    pub fn resident_chunks(&self) -> usize {
        1 + self.cold.len()
    }

    /// Upload every chunk and the metadata document. Cold chunks go first,
    /// concurrently; their blobs are self-describing, so no inter-chunk
    /// ordering is needed.
    pub async fn save(mut self) -> Result<(), BuildError> {
        let cold = std::mem::take(&mut self.cold);
        let TreeWriter {
            endpoint,
            schema,
            structure,
            bounds,
            base,
            inserted,
            ..
        } = self;

        tracing::debug!(chunks = cold.len() + 1, points = inserted, "saving tree");
        let ids: Vec<String> = cold.keys().map(|id| id.to_string()).collect();
        let uploads = cold.into_values().map(|chunk| chunk.save(&endpoint));
        futures::future::try_join_all(uploads).await?;

        base.save_with_postfix(&endpoint, "").await?;

        let metadata = TreeMetadata::new(&bounds, &structure, &schema, inserted, ids);
        let body = serde_json::to_vec_pretty(&metadata)?;
        endpoint.ensure_put(METADATA_PATH, &body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::memory::MemoryClient;

    fn bounds() -> Bbox {
        Bbox::new(Point::new(0.0, 0.0, 0.0), Point::new(8.0, 8.0, 8.0))
    }

    fn payload_for(p: Point) -> Vec<u8> {
        let mut out = Vec::with_capacity(24);
        out.extend_from_slice(&p.x.to_le_bytes());
        out.extend_from_slice(&p.y.to_le_bytes());
        out.extend_from_slice(&p.z.to_le_bytes());
        out
    }

    fn writer(structure: Structure) -> TreeWriter<MemoryClient> {
        TreeWriter::new(
            Endpoint::new("", MemoryClient::new()),
            Schema::xyz(),
            structure,
            bounds(),
        )
        .unwrap()
    }

    #[test]
    fn first_point_lands_at_the_root() {
        let mut writer = writer(Structure::new(3, 8, 2, 0).unwrap());
        writer
            .insert(Point::new(1.0, 2.0, 3.0), &payload_for(Point::new(1.0, 2.0, 3.0)))
            .unwrap();
        assert_eq!(writer.inserted(), 1);
        assert_eq!(writer.resident_chunks(), 1);
    }

    #[test]
    fn out_of_bounds_points_are_rejected() {
        let mut writer = writer(Structure::new(3, 8, 2, 0).unwrap());
        let p = Point::new(-1.0, 0.0, 0.0);
        assert!(matches!(
            writer.insert(p, &payload_for(p)),
            Err(BuildError::Climb(ClimbError::OutOfBounds(_)))
        ));
        assert_eq!(writer.pool().in_use(), 0);
    }

    #[test]
    fn crowded_cells_push_points_into_cold_chunks() {
        let mut writer = writer(Structure::new(3, 8, 2, 0).unwrap());
        // one column of points: cells fill shallow-first, the rest spill
        // past the cold boundary
        for i in 0..6 {
            let p = Point::new(0.5, 0.5, 0.25 + i as f64);
            writer.insert(p, &payload_for(p)).unwrap();
        }
        assert_eq!(writer.inserted(), 6);
        assert!(writer.resident_chunks() > 1);
    }

    #[test]
    fn exact_duplicates_exhaust_the_depth_limit() {
        let mut writer = writer(Structure::new(3, 8, 2, 0).unwrap());
        let p = Point::new(1.0, 1.0, 1.0);
        // copies of one point stack a depth apart until the tick limit
        for _ in 0..64 {
            writer.insert(p, &payload_for(p)).unwrap();
        }
        let before = writer.pool().in_use();
        assert!(matches!(
            writer.insert(p, &payload_for(p)),
            Err(BuildError::DepthExhausted(_))
        ));
        // the failed point's slot went back to the pool
        assert_eq!(writer.pool().in_use(), before);
    }

    #[tokio::test]
    async fn save_writes_chunks_and_metadata() {
        let client = Arc::new(MemoryClient::new());
        let structure = Structure::new(3, 8, 2, 0).unwrap();
        let mut writer = TreeWriter::new(
            Endpoint::new("", client.clone()),
            Schema::xyz(),
            structure,
            bounds(),
        )
        .unwrap();

        for i in 0..20 {
            let p = Point::new(
                0.3 + (i % 4) as f64 * 2.0,
                0.7 + (i / 4 % 4) as f64 * 2.0,
                0.9 + (i / 16) as f64 * 4.0,
            );
            writer.insert(p, &payload_for(p)).unwrap();
        }
        writer.save().await.unwrap();

        assert!(client.contains("metadata.json"));
        assert!(client.contains("0"));
        let metadata: TreeMetadata =
            serde_json::from_slice(&client.object("metadata.json").unwrap()).unwrap();
        assert_eq!(metadata.points, 20);
    }
}
