use crate::schema::Schema;
use thiserror::Error;

/// zstd level used for chunk payloads.
const LEVEL: i32 = 3;

#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("codec error: {0}")]
    Codec(#[from] std::io::Error),

    #[error("decompressed {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// Compress a packed run of records laid out per `schema`.
pub fn compress(data: &[u8], schema: &Schema) -> Result<Vec<u8>, CompressionError> {
    debug_assert_eq!(data.len() % schema.point_size(), 0);
    Ok(zstd::encode_all(data, LEVEL)?)
}

/// Decompress to exactly `num_points` records of `schema` layout.
pub fn decompress(
    data: &[u8],
    schema: &Schema,
    num_points: usize,
) -> Result<Vec<u8>, CompressionError> {
    let expected = num_points * schema.point_size();
    let out = zstd::decode_all(data)?;
    if out.len() != expected {
        return Err(CompressionError::SizeMismatch {
            expected,
            actual: out.len(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_records() {
        let schema = Schema::xyz();
        let data: Vec<u8> = (0..96).map(|i| (i * 7) as u8).collect();
        let packed = compress(&data, &schema).unwrap();
        let back = decompress(&packed, &schema, 4).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn empty_payload_round_trips() {
        let schema = Schema::xyz();
        let packed = compress(&[], &schema).unwrap();
        assert!(!packed.is_empty());
        assert_eq!(decompress(&packed, &schema, 0).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn size_mismatch_is_reported() {
        let schema = Schema::xyz();
        let packed = compress(&[0u8; 48], &schema).unwrap();
        let err = decompress(&packed, &schema, 3).unwrap_err();
        assert!(matches!(
            err,
            CompressionError::SizeMismatch {
                expected: 72,
                actual: 48
            }
        ));
    }
}
