//! Readback row copy from a padded staging mapping into a packed buffer.

use crate::error::PumpError;
use crate::PumpResult;

/// Copy `rows` rows of `row_bytes` bytes from a mapping with `src_pitch`
/// bytes between rows into the packed `dst`.
///
/// Padding at the end of each source row is skipped, never copied.
pub fn copy_rows(
    src: &[u8],
    src_pitch: usize,
    dst: &mut [u8],
    row_bytes: usize,
    rows: usize,
) -> PumpResult<()> {
    if src_pitch < row_bytes {
        return Err(PumpError::SurfaceLayout(format!(
            "row pitch {} is smaller than the row width {}",
            src_pitch, row_bytes
        )));
    }

    if dst.len() != row_bytes * rows {
        return Err(PumpError::SurfaceLayout(format!(
            "destination holds {} bytes, expected {}",
            dst.len(),
            row_bytes * rows
        )));
    }

    if rows == 0 || row_bytes == 0 {
        return Ok(());
    }

    // The last row only needs its pixels, not its padding.
    let required = src_pitch * (rows - 1) + row_bytes;
    if src.len() < required {
        return Err(PumpError::SurfaceLayout(format!(
            "mapping holds {} bytes, expected at least {}",
            src.len(),
            required
        )));
    }

    for (dst_row, src_row) in dst.chunks_exact_mut(row_bytes).zip(src.chunks(src_pitch)) {
        dst_row.copy_from_slice(&src_row[..row_bytes]);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Source rows are filled with their row index, padding with 0xEE.
    fn padded_source(row_bytes: usize, pitch: usize, rows: usize) -> Vec<u8> {
        let mut src = vec![0xEE; pitch * rows];
        for (row, chunk) in src.chunks_mut(pitch).enumerate() {
            chunk[..row_bytes].fill(row as u8);
        }
        src
    }

    #[test]
    fn test_copy_skips_row_padding() {
        // Width 10 pixels, stride 64, packed stride 40.
        let (row_bytes, pitch, rows) = (40, 64, 6);
        let src = padded_source(row_bytes, pitch, rows);
        let mut dst = vec![0u8; row_bytes * rows];

        copy_rows(&src, pitch, &mut dst, row_bytes, rows).unwrap();

        for (row, chunk) in dst.chunks(row_bytes).enumerate() {
            assert!(
                chunk.iter().all(|&b| b == row as u8),
                "row {} bled into its neighbour",
                row
            );
        }
        assert!(!dst.contains(&0xEE));
    }

    #[test]
    fn test_copy_unpadded_is_identity() {
        let src: Vec<u8> = (0..=255).cycle().take(16 * 4).collect();
        let mut dst = vec![0u8; src.len()];
        copy_rows(&src, 16, &mut dst, 16, 4).unwrap();
        assert_eq!(src, dst);
    }

    #[test]
    fn test_last_row_padding_is_optional() {
        let (row_bytes, pitch, rows) = (8, 12, 3);
        let mut src = padded_source(row_bytes, pitch, rows);
        src.truncate(pitch * (rows - 1) + row_bytes);
        let mut dst = vec![0u8; row_bytes * rows];
        copy_rows(&src, pitch, &mut dst, row_bytes, rows).unwrap();
        assert_eq!(&dst[16..], &[2u8; 8]);
    }

    #[test]
    fn test_rejects_narrow_pitch() {
        let src = vec![0u8; 64];
        let mut dst = vec![0u8; 32];
        let err = copy_rows(&src, 4, &mut dst, 8, 4).unwrap_err();
        assert!(matches!(err, PumpError::SurfaceLayout(_)));
    }

    #[test]
    fn test_rejects_short_mapping() {
        let src = vec![0u8; 20];
        let mut dst = vec![0u8; 24];
        assert!(copy_rows(&src, 12, &mut dst, 8, 3).is_err());
    }

    #[test]
    fn test_rejects_wrong_destination() {
        let src = vec![0u8; 64];
        let mut dst = vec![0u8; 10];
        assert!(copy_rows(&src, 16, &mut dst, 16, 4).is_err());
    }
}
