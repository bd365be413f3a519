//! Firmware image lookup and validation.

use crate::error::BringUpError;
use pru_common::consts::PRU_IRAM_SIZE;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Find the firmware image: `path` as given, then its file name inside
/// `fallback_dir`.
///
/// # Errors
/// `FirmwareNotFound` when neither location exists.
pub fn locate(path: &Path, fallback_dir: &Path) -> Result<PathBuf, BringUpError> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if let Some(name) = path.file_name() {
        let candidate = fallback_dir.join(name);
        debug!("Firmware {:?} not found, trying {:?}", path, candidate);
        if candidate.is_file() {
            return Ok(candidate);
        }
    }
    Err(BringUpError::FirmwareNotFound(path.to_path_buf()))
}

/// Read and check a firmware image.
///
/// The image must be non-empty, a whole number of 32-bit instructions and
/// fit into instruction RAM.
///
/// # Errors
/// `FirmwareInvalid` on read failure or a malformed image.
pub fn load(path: &Path) -> Result<Vec<u8>, BringUpError> {
    let invalid = |reason: String| BringUpError::FirmwareInvalid {
        path: path.to_path_buf(),
        reason,
    };
    let image = fs::read(path).map_err(|e| invalid(e.to_string()))?;
    if image.is_empty() {
        return Err(invalid("image is empty".to_string()));
    }
    if image.len() % 4 != 0 {
        return Err(invalid(format!(
            "length {} is not a multiple of 4",
            image.len()
        )));
    }
    if image.len() > PRU_IRAM_SIZE {
        return Err(invalid(format!(
            "length {} exceeds instruction RAM ({} bytes)",
            image.len(),
            PRU_IRAM_SIZE
        )));
    }
    info!("Firmware {:?} loaded ({} bytes)", path, image.len());
    Ok(image)
}
