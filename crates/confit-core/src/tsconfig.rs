//! Path-alias configuration lookup.
//!
//! `tsconfig.json` commonly carries comments and trailing commas, so parsing
//! goes through a comment-tolerant parser. Only the `compilerOptions.paths`
//! alias map is consumed here; it widens the policy's not-external allowance
//! so aliased internal modules stay inlined even though they look like bare
//! package names.

use crate::error::Error;
use regex_lite::Regex;
use std::path::{Path, PathBuf};

/// A located and parsed configuration file.
#[derive(Debug, Clone)]
pub struct TsConfig {
    pub data: serde_json::Value,
    pub path: PathBuf,
}

/// Locate `filename` starting at `dir` and walking parent directories,
/// returning `None` when the filesystem root is reached without a hit.
pub fn load_tsconfig(dir: &Path, filename: &str) -> Result<Option<TsConfig>, Error> {
    let mut current = dir.to_path_buf();
    loop {
        let candidate = current.join(filename);
        if candidate.is_file() {
            let text = std::fs::read_to_string(&candidate).map_err(|source| Error::ConfigRead {
                path: candidate.clone(),
                source,
            })?;
            let data = jsonc_parser::parse_to_serde_value(&text, &Default::default())
                .map_err(|e| Error::ConfigParse {
                    path: candidate.clone(),
                    message: e.to_string(),
                })?
                .unwrap_or(serde_json::Value::Null);
            return Ok(Some(TsConfig {
                data,
                path: candidate,
            }));
        }
        if !current.pop() {
            return Ok(None);
        }
    }
}

/// Convert the `compilerOptions.paths` alias map into anchored matchers:
/// the first wildcard in each key becomes "match anything", and the whole
/// pattern is anchored to the full specifier.
#[must_use]
pub fn alias_matchers(data: &serde_json::Value) -> Vec<Regex> {
    let Some(paths) = data
        .pointer("/compilerOptions/paths")
        .and_then(|v| v.as_object())
    else {
        return Vec::new();
    };
    paths
        .keys()
        .filter_map(|key| Regex::new(&format!("^{}$", key.replacen('*', ".*", 1))).ok())
        .collect()
}
