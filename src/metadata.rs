use crate::octree::bbox::Bbox;
use crate::octree::id::Id;
use crate::octree::structure::{Structure, StructureError};
use crate::point::Point;
use crate::schema::{DimInfo, Schema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

/// Where the tree description lives, relative to the endpoint root.
pub const METADATA_PATH: &str = "metadata.json";

/// Codec applied to chunk payloads.
pub const ENCODING: &str = "zstd";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error(transparent)]
    Structure(#[from] StructureError),

    #[error("schema has no X/Y/Z double dimensions")]
    MissingPosition,

    #[error("invalid chunk id: {0}")]
    InvalidChunkId(String),
}

/// Persisted description of a built tree.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TreeMetadata {
    pub bounds: BoundsMetadata,
    pub structure: StructureMetadata,
    pub schema: Vec<DimInfo>,
    pub encoding: String,
    pub points: u64,
    /// Decimal ids of every cold chunk written; queries prune the subtrees
    /// of ids missing here.
    pub ids: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct BoundsMetadata {
    pub min: [f64; 3],
    pub max: [f64; 3],
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StructureMetadata {
    pub dimensions: u32,
    pub base_chunk_points: u64,
    pub cold_depth_begin: u64,
    pub sparse_depth_begin: u64,
}

impl TreeMetadata {
    pub fn new(
        bounds: &Bbox,
        structure: &Structure,
        schema: &Schema,
        points: u64,
        ids: Vec<String>,
    ) -> TreeMetadata {
        TreeMetadata {
            bounds: BoundsMetadata {
                min: bounds.min().into(),
                max: bounds.max().into(),
            },
            structure: StructureMetadata {
                dimensions: structure.dimensions(),
                base_chunk_points: structure.base_chunk_points(),
                cold_depth_begin: structure.cold_depth_begin(),
                sparse_depth_begin: structure.sparse_depth_begin(),
            },
            schema: schema.dims().to_vec(),
            encoding: ENCODING.to_string(),
            points,
            ids,
        }
    }

    pub fn chunk_ids(&self) -> Result<BTreeSet<Id>, MetadataError> {
        self.ids
            .iter()
            .map(|id| {
                id.parse()
                    .map_err(|_| MetadataError::InvalidChunkId(id.clone()))
            })
            .collect()
    }

    pub fn bounds(&self) -> Bbox {
        Bbox::new(Point::from(self.bounds.min), Point::from(self.bounds.max))
    }

    pub fn structure(&self) -> Result<Structure, MetadataError> {
        Ok(Structure::new(
            self.structure.dimensions,
            self.structure.base_chunk_points,
            self.structure.cold_depth_begin,
            self.structure.sparse_depth_begin,
        )?)
    }

    pub fn schema(&self) -> Result<Schema, MetadataError> {
        let schema = Schema::new(self.schema.clone());
        if schema.position_offsets().is_none() {
            return Err(MetadataError::MissingPosition);
        }
        Ok(schema)
    }
}
