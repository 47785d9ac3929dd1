use crate::error::{ChunkStoreError, Result};

/// How a logical file of `total_length` bytes splits into chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkGeometry {
    chunk_length: usize,
    total_length: Option<u64>,
    last_chunk: Option<LastChunk>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LastChunk {
    index: u64,
    length: usize,
}

impl ChunkGeometry {
    /// `total_length` of `None` (or zero) means the file length is unbounded.
    pub fn new(chunk_length: usize, total_length: Option<u64>) -> Result<Self> {
        if chunk_length == 0 {
            return Err(ChunkStoreError::Config("chunk length must be positive".to_string()));
        }

        let total_length = total_length.filter(|len| *len > 0);
        let last_chunk = total_length.map(|total| {
            let chunk = chunk_length as u64;
            let remainder = total % chunk;
            LastChunk {
                index: total.div_ceil(chunk) - 1,
                length: if remainder == 0 { chunk_length } else { remainder as usize },
            }
        });

        Ok(Self { chunk_length, total_length, last_chunk })
    }

    pub fn chunk_length(&self) -> usize {
        self.chunk_length
    }

    pub fn total_length(&self) -> Option<u64> {
        self.total_length
    }

    pub fn last_chunk_index(&self) -> Option<u64> {
        self.last_chunk.map(|last| last.index)
    }

    pub fn last_chunk_length(&self) -> Option<usize> {
        self.last_chunk.map(|last| last.length)
    }

    pub fn chunk_count(&self) -> Option<u64> {
        self.last_chunk.map(|last| last.index + 1)
    }

    /// Byte length chunk `index` must have.
    pub fn expected_length(&self, index: u64) -> usize {
        match self.last_chunk {
            Some(last) if last.index == index => last.length,
            _ => self.chunk_length,
        }
    }

    pub fn check(&self, index: u64, actual: usize) -> Result<()> {
        let expected = self.expected_length(index);
        if actual != expected {
            return Err(ChunkStoreError::ChunkSize { index, expected, actual });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_chunk_with_remainder() {
        let geometry = ChunkGeometry::new(4, Some(10)).unwrap();
        assert_eq!(geometry.last_chunk_index(), Some(2));
        assert_eq!(geometry.last_chunk_length(), Some(2));
        assert_eq!(geometry.chunk_count(), Some(3));
    }

    #[test]
    fn test_exact_multiple_keeps_full_last_chunk() {
        let geometry = ChunkGeometry::new(4, Some(12)).unwrap();
        assert_eq!(geometry.last_chunk_index(), Some(2));
        assert_eq!(geometry.last_chunk_length(), Some(4));
    }

    #[test]
    fn test_last_chunk_math_over_many_lengths() {
        for chunk_length in 1..=9usize {
            for total in 1..=50u64 {
                let geometry = ChunkGeometry::new(chunk_length, Some(total)).unwrap();
                let chunk = chunk_length as u64;
                let last_index = geometry.last_chunk_index().unwrap();
                assert_eq!(last_index, total.div_ceil(chunk) - 1);
                assert_eq!(
                    geometry.last_chunk_length().unwrap() as u64,
                    total - last_index * chunk
                );
            }
        }
    }

    #[test]
    fn test_unbounded_has_no_last_chunk() {
        let geometry = ChunkGeometry::new(4, None).unwrap();
        assert_eq!(geometry.last_chunk_index(), None);
        assert_eq!(geometry.expected_length(1_000_000), 4);

        let zero = ChunkGeometry::new(4, Some(0)).unwrap();
        assert_eq!(zero.total_length(), None);
    }

    #[test]
    fn test_zero_chunk_length_rejected() {
        let err = ChunkGeometry::new(0, Some(10)).unwrap_err();
        assert!(matches!(err, ChunkStoreError::Config(_)));
        assert_eq!(err.to_string(), "invalid configuration: chunk length must be positive");
    }

    #[test]
    fn test_check_reports_expected_length() {
        let geometry = ChunkGeometry::new(4, Some(10)).unwrap();
        assert!(geometry.check(0, 4).is_ok());
        assert!(geometry.check(2, 2).is_ok());

        match geometry.check(2, 4) {
            Err(ChunkStoreError::ChunkSize { expected, .. }) => assert_eq!(expected, 2),
            other => panic!("unexpected result: {other:?}"),
        }
        match geometry.check(0, 3) {
            Err(ChunkStoreError::ChunkSize { expected, .. }) => assert_eq!(expected, 4),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
