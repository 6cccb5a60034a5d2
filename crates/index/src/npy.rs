//! Minimal NPY reader/writer for 2-D little-endian f32 arrays.

use anyhow::{Context, Result};
use std::path::Path;

use crate::vector::Matrix;

const MAGIC: &[u8] = b"\x93NUMPY";

pub fn encode(matrix: &Matrix) -> Vec<u8> {
    let mut header = format!(
        "{{'descr': '<f4', 'fortran_order': False, 'shape': ({}, {}), }}",
        matrix.rows(),
        matrix.cols()
    );
    // magic(6) + version(2) + len(2) + header, padded to a multiple of 64 with '\n' last
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    let padding = (64 - unpadded % 64) % 64;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len() + matrix.data().len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for value in matrix.data() {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode(bytes: &[u8]) -> Result<Matrix> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        anyhow::bail!("Not an NPY file");
    }

    let (header_len, header_start) = match bytes[6] {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 if bytes.len() >= 12 => (
            u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize,
            12,
        ),
        v => anyhow::bail!("Unsupported NPY version {}", v),
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        anyhow::bail!("Truncated NPY header");
    }
    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .context("NPY header is not valid text")?;

    if !header.contains("'descr': '<f4'") {
        anyhow::bail!("Only little-endian float32 arrays are supported");
    }
    if header.contains("'fortran_order': True") {
        anyhow::bail!("Fortran-ordered arrays are not supported");
    }
    let (rows, cols) = parse_shape(header)?;

    let payload = &bytes[data_start..];
    if payload.len() != rows * cols * 4 {
        anyhow::bail!(
            "NPY payload has {} bytes, expected {} for shape ({}, {})",
            payload.len(),
            rows * cols * 4,
            rows,
            cols
        );
    }

    let data = payload
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();
    Matrix::from_raw(rows, cols, data)
}

fn parse_shape(header: &str) -> Result<(usize, usize)> {
    let start = header
        .find("'shape':")
        .context("NPY header has no shape")?;
    let rest = &header[start..];
    let open = rest.find('(').context("Malformed NPY shape")?;
    let close = rest.find(')').context("Malformed NPY shape")?;

    let dims: Vec<usize> = rest[open + 1..close]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<usize>().context("Malformed NPY dimension"))
        .collect::<Result<_>>()?;

    match dims.as_slice() {
        [rows, cols] => Ok((*rows, *cols)),
        _ => anyhow::bail!("Expected a 2-D array, got shape {:?}", dims),
    }
}

pub async fn save(path: &Path, matrix: &Matrix) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, encode(matrix))
        .await
        .context(format!("Failed to write {:?}", path))
}

pub async fn load(path: &Path) -> Result<Matrix> {
    let bytes = tokio::fs::read(path)
        .await
        .context(format!("Failed to read {:?}", path))?;
    decode(&bytes).context(format!("Failed to decode {:?}", path))
}
