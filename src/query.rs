use crate::chunk::{Chunk, ChunkError};
use crate::endpoint::{Endpoint, EndpointClient, EndpointError};
use crate::metadata::{self, MetadataError, TreeMetadata, METADATA_PATH};
use crate::octree::bbox::Bbox;
use crate::octree::id::Id;
use crate::octree::split_climber::SplitClimber;
use crate::octree::structure::Structure;
use crate::point::Point;
use crate::pool::PointPool;
use crate::schema::Schema;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),

    #[error(transparent)]
    Chunk(#[from] ChunkError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("metadata is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// One point produced by a range query.
#[derive(Clone, Debug, PartialEq)]
pub struct PointRecord {
    pub position: Point,
    pub payload: Vec<u8>,
}

/// Streams resolution-bounded subsets of a saved tree: walk the octree over
/// the query region, fetch each overlapping chunk once, and emit the cells
/// whose points fall inside the region.
pub struct TreeReader<C: EndpointClient> {
    endpoint: Endpoint<C>,
    metadata: TreeMetadata,
    schema: Schema,
    structure: Structure,
    bounds: Bbox,
    pool: Arc<PointPool>,
}

impl<C: EndpointClient> std::fmt::Debug for TreeReader<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeReader").finish_non_exhaustive()
    }
}

impl<C: EndpointClient> TreeReader<C> {
    /// Fetch and validate `metadata.json` from the endpoint.
    pub async fn open(endpoint: Endpoint<C>) -> Result<Self, QueryError> {
        let raw = endpoint.ensure_get(METADATA_PATH).await?;
        let metadata: TreeMetadata = serde_json::from_slice(&raw)?;
        if metadata.encoding != metadata::ENCODING {
            return Err(MetadataError::UnsupportedEncoding(metadata.encoding.clone()).into());
        }
        let schema = metadata.schema()?;
        let structure = metadata.structure()?;
        let bounds = metadata.bounds();
        let pool = Arc::new(PointPool::new(schema.point_size()));

        Ok(TreeReader {
            endpoint,
            metadata,
            schema,
            structure,
            bounds,
            pool,
        })
    }

    pub fn metadata(&self) -> &TreeMetadata {
        &self.metadata
    }

    pub fn bounds(&self) -> &Bbox {
        &self.bounds
    }

    pub fn structure(&self) -> &Structure {
        &self.structure
    }

    /// All points inside `query` stored at depths `[depth_begin,
    /// depth_end)`. Chunks with no surviving blob are treated as empty
    /// subtrees.
    pub async fn query(
        &self,
        query: &Bbox,
        depth_begin: u64,
        depth_end: u64,
    ) -> Result<Vec<PointRecord>, QueryError> {
        debug_assert!(depth_end > depth_begin);
        let written = self.metadata.chunk_ids()?;

        // group the overlapping nodes by the chunk that owns them; subtrees
        // whose chunk was never written hold nothing and are pruned
        let mut wanted: BTreeMap<Id, Vec<(Id, u64)>> = BTreeMap::new();
        let mut climber = SplitClimber::new(
            &self.structure,
            self.bounds.clone(),
            query.clone(),
            depth_begin,
            depth_end,
        );
        let mut skip = false;
        while climber.next(skip) {
            skip = false;
            let depth = climber.depth();
            let index = climber.index().clone();
            let chunk_id = if depth < self.structure.cold_depth_begin() {
                Id::zero()
            } else {
                self.structure.chunk_id_at(&index, depth)
            };
            if !chunk_id.is_zero() && !written.contains(&chunk_id) {
                skip = true;
                continue;
            }
            wanted.entry(chunk_id).or_default().push((index, depth));
        }

        let mut records = Vec::new();
        for (chunk_id, nodes) in wanted {
            let blob = match self.endpoint.ensure_get(&chunk_id.to_string()).await {
                Ok(blob) => blob,
                Err(EndpointError::NotFound(_)) => continue,
                Err(err) => return Err(err.into()),
            };

            let (chunk_depth, max_points) = if chunk_id.is_zero() {
                (0, self.structure.cold_index_begin().simple() as u64)
            } else {
                let depth = nodes[0].1;
                (depth, self.structure.chunk_points_at_depth(depth))
            };

            let mut chunk = Chunk::from_bytes(
                self.schema.clone(),
                self.bounds.clone(),
                self.structure.clone(),
                self.pool.clone(),
                chunk_depth,
                chunk_id,
                max_points,
                blob,
            )?;

            for (index, _depth) in &nodes {
                let slot = chunk.normalize(index);
                if let Some(tube) = chunk.tube(slot) {
                    for (_tick, cell) in tube.cells() {
                        if let Some(handle) = cell.handle() {
                            let position = cell.point();
                            if query.contains(position) {
                                records.push(PointRecord {
                                    position,
                                    payload: self.pool.payload(handle),
                                });
                            }
                        }
                    }
                }
            }
            // dropping the chunk returns its slots and counter budget
        }

        Ok(records)
    }
}
