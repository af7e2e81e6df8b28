//! Level-of-detail octree indexing for unbounded point clouds.
//!
//! Points stream into an octree whose nodes are grouped into chunks,
//! compressed, and persisted as immutable blobs behind an [`Endpoint`].
//! Range queries walk only the subtrees overlapping an axis-aligned box,
//! within a depth window, so a resolution-appropriate subset streams back
//! without touching the rest of the dataset.
//!
//! [`Endpoint`]: endpoint::Endpoint

pub mod builder;
pub mod chunk;
pub mod compression;
pub mod counters;
pub mod endpoint;
pub mod metadata;
pub mod octree;
pub mod point;
pub mod pool;
pub mod prelude;
pub mod query;
pub mod schema;
pub mod tube;

pub use builder::TreeWriter;
pub use metadata::TreeMetadata;
pub use query::{PointRecord, TreeReader};
pub use schema::{DimInfo, DimKind, Schema};
