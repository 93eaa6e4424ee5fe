//! Collection/id sanitization into a single safe path segment

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock, PoisonError};

use regex::Regex;

const FOLDS: &[(&[char], &str)] = &[
    (&['á', 'à', 'â', 'ä', 'ã', 'æ'], "a"),
    (&['é', 'è', 'ê', 'ë'], "e"),
    (&['í', 'ì', 'î', 'ï'], "i"),
    (&['ó', 'ò', 'ô', 'ö', 'õ'], "o"),
    (&['ú', 'ù', 'û', 'ü'], "u"),
    (&['ç'], "c"),
    (&['ñ'], "n"),
    (&['ß'], "ss"),
];

fn unsafe_chars() -> &'static Regex {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    UNSAFE.get_or_init(|| Regex::new(r"[^a-z0-9.+]").expect("static pattern"))
}

fn underscore_runs() -> &'static Regex {
    static RUNS: OnceLock<Regex> = OnceLock::new();
    RUNS.get_or_init(|| Regex::new(r"_{2,}").expect("static pattern"))
}

/// Normalize a collection name or document id into a file-name-safe token.
///
/// Lower-cases and trims, folds common Latin accents, replaces every
/// character outside `[a-z0-9.+]` with `_`, trims `_` from both ends and
/// collapses runs of `_`. Idempotent.
pub fn normalize_name(name: &str) -> String {
    let lowered = name.trim().to_lowercase();

    let mut folded = String::with_capacity(lowered.len());
    'chars: for c in lowered.chars() {
        for (from, to) in FOLDS {
            if from.contains(&c) {
                folded.push_str(to);
                continue 'chars;
            }
        }
        folded.push(c);
    }

    let replaced = unsafe_chars().replace_all(&folded, "_");
    let collapsed = underscore_runs().replace_all(&replaced, "_");
    collapsed.trim_matches('_').to_string()
}

/// Whether a normalized name can stand as a single directory entry.
///
/// Empty names, `.` and `..` cannot: they would name the parent directory
/// itself or one above it.
pub fn is_path_segment(normalized: &str) -> bool {
    !normalized.is_empty() && normalized != "." && normalized != ".."
}

/// Memo entries kept before the cache starts over
const MAX_CACHED: usize = 4096;

/// [`normalize_name`] with a per-instance memo cache.
///
/// The cache holds at most `MAX_CACHED` names and is cleared when full.
#[derive(Debug, Default)]
pub struct FileNameNormalizer {
    cache: Mutex<HashMap<String, String>>,
}

impl FileNameNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn normalize(&self, name: &str) -> String {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(hit) = cache.get(name) {
            return hit.clone();
        }
        let normalized = normalize_name(name);
        if cache.len() >= MAX_CACHED {
            cache.clear();
        }
        cache.insert(name.to_string(), normalized.clone());
        normalized
    }
}
