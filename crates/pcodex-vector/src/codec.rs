//! `vectors.bin` codec: a fixed header followed by row-major little-endian f32.
//!
//! ```text
//! magic "PCXV" | version u32 | dim u32 | count u64 | count * dim * f32
//! ```
use std::io::{self, Read, Write};

use crate::schema::{FORMAT_VERSION, VECTORS_MAGIC};

pub const HEADER_LEN: usize = 4 + 4 + 4 + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorHeader {
    pub dim: usize,
    pub count: usize,
}

pub fn write_vectors<W: Write>(w: &mut W, dim: usize, data: &[f32]) -> io::Result<()> {
    if dim == 0 || data.len() % dim != 0 {
        return Err(invalid(format!("{} floats do not form rows of {dim}", data.len())));
    }
    let dim32 = u32::try_from(dim).map_err(|_| invalid(format!("dimension {dim} too large")))?;
    w.write_all(VECTORS_MAGIC)?;
    w.write_all(&FORMAT_VERSION.to_le_bytes())?;
    w.write_all(&dim32.to_le_bytes())?;
    w.write_all(&((data.len() / dim) as u64).to_le_bytes())?;
    for x in data {
        w.write_all(&x.to_le_bytes())?;
    }
    w.flush()
}

pub fn read_vectors<R: Read>(r: &mut R) -> io::Result<(VectorHeader, Vec<f32>)> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != VECTORS_MAGIC {
        return Err(invalid("bad magic".to_string()));
    }
    let version = read_u32(r)?;
    if version != FORMAT_VERSION {
        return Err(invalid(format!("unsupported vector format version {version}")));
    }
    let dim = read_u32(r)? as usize;
    let count = usize::try_from(read_u64(r)?).map_err(|_| invalid("count overflows usize".to_string()))?;
    if dim == 0 {
        return Err(invalid("zero dimension".to_string()));
    }
    let payload = count
        .checked_mul(dim)
        .and_then(|floats| floats.checked_mul(4))
        .ok_or_else(|| invalid(format!("header claims {count} x {dim} vectors")))?;

    // read what is actually there; the header is not trusted for allocation
    let mut bytes = Vec::new();
    r.read_to_end(&mut bytes)?;
    if bytes.len() != payload {
        return Err(invalid(format!("expected {payload} payload bytes, found {}", bytes.len())));
    }
    let data = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Ok((VectorHeader { dim, count }, data))
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(r: &mut R) -> io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_then_rows() {
        let mut buf = Vec::new();
        write_vectors(&mut buf, 2, &[1.0, 0.0, 0.6, 0.8]).unwrap();
        assert_eq!(buf.len(), HEADER_LEN + 4 * 4);
        let (header, data) = read_vectors(&mut buf.as_slice()).unwrap();
        assert_eq!(header, VectorHeader { dim: 2, count: 2 });
        assert_eq!(data, vec![1.0, 0.0, 0.6, 0.8]);
    }

    #[test]
    fn empty_payload_is_valid() {
        let mut buf = Vec::new();
        write_vectors(&mut buf, 384, &[]).unwrap();
        let (header, data) = read_vectors(&mut buf.as_slice()).unwrap();
        assert_eq!(header.count, 0);
        assert_eq!(header.dim, 384);
        assert!(data.is_empty());
    }

    #[test]
    fn truncated_payload_is_rejected() {
        let mut buf = Vec::new();
        write_vectors(&mut buf, 2, &[1.0, 0.0, 0.6, 0.8]).unwrap();
        buf.truncate(buf.len() - 2);
        let err = read_vectors(&mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn oversized_header_count_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(VECTORS_MAGIC);
        buf.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&1u32.to_le_bytes());
        buf.extend_from_slice(&(1u64 << 62).to_le_bytes());
        buf.extend_from_slice(&1.0f32.to_le_bytes());
        let err = read_vectors(&mut buf.as_slice()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn ragged_rows_are_rejected_on_write() {
        let mut buf = Vec::new();
        assert!(write_vectors(&mut buf, 3, &[1.0, 2.0]).is_err());
    }
}
