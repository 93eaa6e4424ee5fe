//! Normalizers
//!
//! Pure transformations between caller-facing values and their stored form:
//! - collection/id names → file-name-safe path segments
//! - documents ↔ UTF-8 JSON text

mod json;
mod name;

pub use json::JsonCodec;
pub use name::{is_path_segment, normalize_name, FileNameNormalizer};
