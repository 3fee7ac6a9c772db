//! License bundles: splitting text into entries and discovering license files.

use std::collections::HashSet;
use std::env;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{LicenseError, LicenseResult};

/// Splits bundle text into raw entries, in source order.
///
/// Entries are separated by commas or whitespace; lines starting with `#`
/// are comments.
///
/// # Errors
///
/// Returns [`LicenseError::ResourceExhausted`] if the text or the number of
/// entries exceeds the configured limits.
pub fn split_entries(text: &str, config: &EngineConfig) -> LicenseResult<Vec<String>> {
    if text.len() > config.max_license_bytes {
        return Err(LicenseError::ResourceExhausted(format!(
            "license text is {} bytes, limit is {}",
            text.len(),
            config.max_license_bytes
        )));
    }

    let entries: Vec<String> = text
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .flat_map(|line| line.split(|c: char| c == ',' || c.is_whitespace()))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect();

    if entries.len() > config.max_entries {
        return Err(LicenseError::ResourceExhausted(format!(
            "license bundle has {} entries, limit is {}",
            entries.len(),
            config.max_entries
        )));
    }
    Ok(entries)
}

/// Assembles license text from the files discoverable for this program.
///
/// Sources, in order: the file named by the configured environment variable,
/// each element of `search_path`, the directory of `argv0`, and the per-user
/// license directory.
///
/// # Errors
///
/// Returns [`LicenseError::NotFound`] if no source yields any text, or
/// [`LicenseError::ResourceExhausted`] if the combined text is too large.
pub fn discover(argv0: &str, search_path: &str, config: &EngineConfig) -> LicenseResult<String> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(var) = &config.license_env {
        match env::var(var) {
            Ok(value) if !value.trim().is_empty() => {
                debug!(env = %var, "license file named by environment");
                candidates.push(PathBuf::from(value.trim()));
            }
            _ => {}
        }
    }

    if !search_path.is_empty() {
        for element in env::split_paths(search_path) {
            candidates.extend(expand(&element, &config.extension));
        }
    }

    if let Some(dir) = executable_dir(argv0) {
        candidates.extend(expand(&dir, &config.extension));
    }

    if let Some(dir) = config.user_license_dir() {
        candidates.extend(expand(&dir, &config.extension));
    }

    let mut seen = HashSet::new();
    let mut text = String::new();
    for path in candidates {
        let key = fs::canonicalize(&path).unwrap_or_else(|_| path.clone());
        if !seen.insert(key) {
            continue;
        }
        let remaining = config.max_license_bytes.saturating_sub(text.len());
        match read_bounded(&path, remaining) {
            Ok(Some(content)) => {
                debug!(license_path = %path.display(), "read license file");
                text.push_str(&content);
                text.push('\n');
            }
            Ok(None) => {
                return Err(LicenseError::ResourceExhausted(format!(
                    "discovered license files exceed {} bytes",
                    config.max_license_bytes
                )));
            }
            Err(e) => warn!(license_path = %path.display(), error = %e, "unreadable license file"),
        }
    }

    if text.trim().is_empty() {
        return Err(LicenseError::NotFound(format!(
            "no license string given and no .{} file found",
            config.extension
        )));
    }
    Ok(text)
}

/// Reads `path` if it holds at most `limit` bytes; `None` if it is larger.
fn read_bounded(path: &Path, limit: usize) -> io::Result<Option<String>> {
    if fs::metadata(path)?.len() > limit as u64 {
        return Ok(None);
    }
    let mut content = String::new();
    fs::File::open(path)?
        .take(limit as u64 + 1)
        .read_to_string(&mut content)?;
    Ok((content.len() <= limit).then_some(content))
}

/// Turns a search path element into license files: a file is itself, a
/// directory yields its license files sorted by name.
fn expand(path: &Path, extension: &str) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }
    let Ok(entries) = fs::read_dir(path) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == extension))
        .collect();
    files.sort();
    files
}

/// Directory holding the executable named by `argv0`.
fn executable_dir(argv0: &str) -> Option<PathBuf> {
    if argv0.is_empty() {
        return None;
    }
    let parent = Path::new(argv0).parent()?;
    if parent.as_os_str().is_empty() {
        Some(PathBuf::from("."))
    } else {
        Some(parent.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> EngineConfig {
        EngineConfig::isolated([0u8; 32])
    }

    #[test]
    fn splits_on_commas_whitespace_and_skips_comments() {
        let text = "# issued 2030\naaa.bbb, ccc.ddd\n\n  eee.fff\n   # trailing comment\n";
        let entries = split_entries(text, &config()).unwrap();
        assert_eq!(entries, vec!["aaa.bbb", "ccc.ddd", "eee.fff"]);
    }

    #[test]
    fn oversized_text_is_rejected() {
        let mut cfg = config();
        cfg.max_license_bytes = 4;
        let err = split_entries("aaaa.bbbb", &cfg).unwrap_err();
        assert!(matches!(err, LicenseError::ResourceExhausted(_)));
    }

    #[test]
    fn too_many_entries_rejected() {
        let mut cfg = config();
        cfg.max_entries = 2;
        let err = split_entries("a.b,c.d,e.f", &cfg).unwrap_err();
        assert!(matches!(err, LicenseError::ResourceExhausted(_)));
    }

    #[test]
    fn bounded_read_refuses_large_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("big.lic");
        fs::write(&path, "x".repeat(64)).unwrap();

        assert_eq!(read_bounded(&path, 64).unwrap().map(|s| s.len()), Some(64));
        assert_eq!(read_bounded(&path, 63).unwrap(), None);
        assert!(read_bounded(&dir.path().join("missing.lic"), 64).is_err());
    }

    #[test]
    fn bare_program_name_uses_current_dir() {
        assert_eq!(executable_dir("myapp"), Some(PathBuf::from(".")));
        assert_eq!(executable_dir("/opt/app/bin/myapp"), Some(PathBuf::from("/opt/app/bin")));
        assert_eq!(executable_dir(""), None);
    }
}
