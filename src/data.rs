//! Tile layer data pipeline
//!
//! Writing: global tile IDs -> little-endian `u32` bytes -> optional zlib/gzip
//! -> base64 text. Reading runs the same chain backwards and checks that the
//! result holds exactly one ID per map cell.

use crate::error::{Error, Result};
use crate::map::{Compression, DataEncoding, GID_SIZE};
use base64::Engine;
use flate2::bufread::{GzDecoder, GzEncoder, ZlibDecoder, ZlibEncoder};
use std::io::Read;

/// Pack tile IDs as little-endian `u32`s
pub fn pack(gids: &[u32]) -> Vec<u8> {
    gids.iter().flat_map(|gid| gid.to_le_bytes()).collect()
}

/// Unpack little-endian `u32`s, requiring exactly `cells` of them
pub fn unpack(bytes: &[u8], cells: usize) -> Result<Vec<u32>> {
    // An overflowing cell count can never match a real buffer
    let expected = cells.saturating_mul(GID_SIZE);
    if bytes.len() != expected {
        return Err(Error::DataLength {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(bytes
        .chunks_exact(GID_SIZE)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

pub fn compress(bytes: &[u8], compression: Compression) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let level = flate2::Compression::default();
    let outcome = match compression {
        Compression::None => return Ok(bytes.to_vec()),
        Compression::Zlib => ZlibEncoder::new(bytes, level).read_to_end(&mut result),
        Compression::Gzip => GzEncoder::new(bytes, level).read_to_end(&mut result),
    };
    outcome.map_err(Error::Compression)?;
    Ok(result)
}

/// Inflate `bytes`, stopping one byte past `limit`
///
/// Output longer than `limit` is cut short there; the caller's length check
/// rejects it without the whole stream being inflated.
pub fn decompress(bytes: &[u8], compression: Compression, limit: usize) -> Result<Vec<u8>> {
    let mut result = Vec::new();
    let cap = (limit as u64).saturating_add(1);
    let outcome = match compression {
        Compression::None => return Ok(bytes.to_vec()),
        Compression::Zlib => ZlibDecoder::new(bytes).take(cap).read_to_end(&mut result),
        Compression::Gzip => GzDecoder::new(bytes).take(cap).read_to_end(&mut result),
    };
    outcome.map_err(Error::Compression)?;
    Ok(result)
}

/// Encode bytes as transport text
pub fn encode_transport(bytes: &[u8], encoding: DataEncoding) -> String {
    match encoding {
        DataEncoding::Base64 => base64::engine::general_purpose::STANDARD.encode(bytes),
    }
}

/// Decode transport text, ignoring the whitespace pretty-printing adds
pub fn decode_transport(text: &str, encoding: DataEncoding) -> Result<Vec<u8>> {
    match encoding {
        DataEncoding::Base64 => {
            let filtered: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
            Ok(base64::engine::general_purpose::STANDARD.decode(filtered)?)
        }
    }
}

/// Full write chain: pack, compress, transport-encode
pub fn encode_tiles(gids: &[u32], compression: Compression, encoding: DataEncoding) -> Result<String> {
    let packed = pack(gids);
    let compressed = compress(&packed, compression)?;
    log::trace!(
        "Encoded {} tiles: {} bytes packed, {} bytes after {}",
        gids.len(),
        packed.len(),
        compressed.len(),
        compression
    );
    Ok(encode_transport(&compressed, encoding))
}

/// Full read chain: transport-decode, decompress, unpack
pub fn decode_tiles(
    text: &str,
    compression: Compression,
    encoding: DataEncoding,
    cells: usize,
) -> Result<Vec<u32>> {
    let raw = decode_transport(text, encoding)?;
    let packed = decompress(&raw, compression, cells.saturating_mul(GID_SIZE))?;
    log::trace!(
        "Decoded {} bytes of {} data into {} packed bytes",
        raw.len(),
        compression,
        packed.len()
    );
    unpack(&packed, cells)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_little_endian() {
        assert_eq!(pack(&[1, 0x0403_0201]), vec![1, 0, 0, 0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_unpack_length_mismatch() {
        let err = unpack(&[1, 0, 0, 0, 2], 1).unwrap_err();
        assert!(matches!(err, Error::DataLength { expected: 4, actual: 5 }));

        let err = unpack(&[1, 0, 0, 0], 2).unwrap_err();
        assert!(matches!(err, Error::DataLength { expected: 8, actual: 4 }));
    }

    #[test]
    fn test_unpack_cell_count_overflow() {
        let err = unpack(&[0, 0, 0, 0], usize::MAX).unwrap_err();
        assert!(matches!(err, Error::DataLength { expected: usize::MAX, actual: 4 }));

        let err = decode_tiles("AAAAAA==", Compression::None, DataEncoding::Base64, usize::MAX)
            .unwrap_err();
        assert!(matches!(err, Error::DataLength { .. }));
    }

    #[test]
    fn test_decompress_stops_past_limit() {
        let bomb = compress(&vec![0u8; 1 << 20], Compression::Zlib).unwrap();
        let inflated = decompress(&bomb, Compression::Zlib, 4).unwrap();
        assert_eq!(inflated.len(), 5);

        let text = encode_transport(&bomb, DataEncoding::Base64);
        let err = decode_tiles(&text, Compression::Zlib, DataEncoding::Base64, 1).unwrap_err();
        assert!(matches!(err, Error::DataLength { expected: 4, actual: 5 }));

        let gzip = compress(&vec![0u8; 1 << 20], Compression::Gzip).unwrap();
        assert_eq!(decompress(&gzip, Compression::Gzip, 8).unwrap().len(), 9);
    }

    #[test]
    fn test_uncompressed_known_text() {
        // [1, 2] packed is 01 00 00 00 02 00 00 00
        let text = encode_tiles(&[1, 2], Compression::None, DataEncoding::Base64).unwrap();
        assert_eq!(text, "AQAAAAIAAAA=");
        let gids = decode_tiles(&text, Compression::None, DataEncoding::Base64, 2).unwrap();
        assert_eq!(gids, vec![1, 2]);
    }

    #[test]
    fn test_decode_ignores_whitespace() {
        let text = "\n   AQAAAA\n   IAAAA=\n  ";
        let gids = decode_tiles(text, Compression::None, DataEncoding::Base64, 2).unwrap();
        assert_eq!(gids, vec![1, 2]);
    }

    #[test]
    fn test_every_compression_preserves_tiles() {
        let gids: Vec<u32> = (0..64).map(|i| i * 7 % 13).chain([u32::MAX, 0x8000_0001]).collect();
        for compression in Compression::ALL {
            let text = encode_tiles(&gids, compression, DataEncoding::Base64).unwrap();
            let decoded = decode_tiles(&text, compression, DataEncoding::Base64, gids.len()).unwrap();
            assert_eq!(decoded, gids, "{}", compression);
        }
    }

    #[test]
    fn test_gzip_container_magic() {
        let bytes = compress(&pack(&[1, 2, 3]), Compression::Gzip).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        let bytes = compress(&pack(&[1, 2, 3]), Compression::Zlib).unwrap();
        assert_eq!(bytes[0], 0x78);
    }

    #[test]
    fn test_corrupt_compressed_data() {
        let text = encode_transport(b"definitely not zlib", DataEncoding::Base64);
        let err = decode_tiles(&text, Compression::Zlib, DataEncoding::Base64, 1).unwrap_err();
        assert!(matches!(err, Error::Compression(_)));
    }

    #[test]
    fn test_invalid_base64() {
        let err = decode_tiles("@@@@", Compression::None, DataEncoding::Base64, 1).unwrap_err();
        assert!(matches!(err, Error::Base64(_)));
    }
}
