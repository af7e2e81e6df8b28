pub use crate::builder::TreeWriter;
pub use crate::chunk::{Chunk, ChunkKind};
pub use crate::endpoint::memory::MemoryClient;
pub use crate::endpoint::{Endpoint, EndpointClient};
pub use crate::metadata::TreeMetadata;
pub use crate::octree::bbox::Bbox;
pub use crate::octree::climber::Climber;
pub use crate::octree::id::Id;
pub use crate::octree::split_climber::SplitClimber;
pub use crate::octree::structure::Structure;
pub use crate::octree::Dir;
pub use crate::point::Point;
pub use crate::query::{PointRecord, TreeReader};
pub use crate::schema::{DimInfo, DimKind, Schema};

#[cfg(feature = "fs")]
pub use crate::endpoint::file::FileClient;

// Error types
pub use crate::builder::BuildError;
pub use crate::chunk::ChunkError;
pub use crate::compression::CompressionError;
pub use crate::endpoint::EndpointError;
pub use crate::metadata::MetadataError;
pub use crate::octree::climber::ClimbError;
pub use crate::octree::structure::StructureError;
pub use crate::query::QueryError;
