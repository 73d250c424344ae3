//! SPIR-V bytecode loading.

use std::path::Path;

use tracing::debug;

use crate::error::{ResourceError, ResourceResult};

/// First word of every SPIR-V module.
pub const MAGIC: u32 = 0x0723_0203;

/// Converts little-endian SPIR-V bytes into code words, checking alignment and the magic number.
pub fn from_bytes(bytes: &[u8]) -> ResourceResult<Vec<u32>> {
    if bytes.is_empty() {
        return Err(ResourceError::invalid("SPIR-V", "module is empty"));
    }
    if !bytes.len().is_multiple_of(4) {
        return Err(ResourceError::invalid(
            "SPIR-V",
            format!("length {} is not a multiple of 4", bytes.len()),
        ));
    }

    let words: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    if words[0] != MAGIC {
        return Err(ResourceError::invalid(
            "SPIR-V",
            format!("bad magic number {:#010x}", words[0]),
        ));
    }

    Ok(words)
}

/// Reads a `.spv` file.
pub fn load(path: &Path) -> ResourceResult<Vec<u32>> {
    if !path.exists() {
        return Err(ResourceError::FileNotFound(path.to_path_buf()));
    }

    let bytes = std::fs::read(path)?;
    let words = from_bytes(&bytes)?;

    debug!("Loaded SPIR-V {:?}: {} words", path, words.len());

    Ok(words)
}
