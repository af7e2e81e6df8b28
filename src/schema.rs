use serde::{Deserialize, Serialize};

/// Name of the synthetic dimension prepended to serialized chunk records.
pub const TUBE_ID_DIM: &str = "TubeId";

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DimKind {
    #[serde(rename = "signed")]
    Signed,
    #[serde(rename = "unsigned")]
    Unsigned,
    #[serde(rename = "float")]
    Float,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DimInfo {
    pub name: String,
    pub kind: DimKind,
    pub size: u16,
}

impl DimInfo {
    pub fn new(name: &str, kind: DimKind, size: u16) -> DimInfo {
        DimInfo {
            name: name.to_string(),
            kind,
            size,
        }
    }
}

/// Byte layout of one point record: dimensions in declared order at declared
/// widths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    dims: Vec<DimInfo>,
    point_size: usize,
}

impl Schema {
    pub fn new(dims: Vec<DimInfo>) -> Schema {
        let point_size = dims.iter().map(|d| d.size as usize).sum();
        Schema { dims, point_size }
    }

    /// The plain position schema: X, Y, Z doubles.
    pub fn xyz() -> Schema {
        Schema::new(vec![
            DimInfo::new("X", DimKind::Float, 8),
            DimInfo::new("Y", DimKind::Float, 8),
            DimInfo::new("Z", DimKind::Float, 8),
        ])
    }

    pub fn dims(&self) -> &[DimInfo] {
        &self.dims
    }

    pub fn point_size(&self) -> usize {
        self.point_size
    }

    /// Byte offset and descriptor of a dimension, by name.
    pub fn find(&self, name: &str) -> Option<(usize, &DimInfo)> {
        let mut offset = 0;
        for dim in &self.dims {
            if dim.name == name {
                return Some((offset, dim));
            }
            offset += dim.size as usize;
        }
        None
    }

    /// Offsets of the X, Y, Z double dimensions, when all three are present.
    pub fn position_offsets(&self) -> Option<[usize; 3]> {
        let mut offsets = [0; 3];
        for (slot, name) in ["X", "Y", "Z"].iter().enumerate() {
            let (offset, dim) = self.find(name)?;
            if dim.kind != DimKind::Float || dim.size != 8 {
                return None;
            }
            offsets[slot] = offset;
        }
        Some(offsets)
    }

    /// This schema prefixed with the 8-byte unsigned `TubeId` dimension, the
    /// layout chunk records are serialized with.
    pub fn celled(&self) -> Schema {
        let mut dims = Vec::with_capacity(self.dims.len() + 1);
        dims.push(DimInfo::new(TUBE_ID_DIM, DimKind::Unsigned, 8));
        dims.extend(self.dims.iter().cloned());
        Schema::new(dims)
    }
}
