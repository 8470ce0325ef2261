//! Content fingerprints for cacheable module builds.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::util::hash::Fingerprint;

/// Number of digest characters used in the cache directory name.
const DIR_HASH_LEN: usize = 8;

/// Fingerprint identifying one cacheable build of a module.
///
/// Two builds of the same module produce the same key iff the module's own
/// source bytes, the recorded hashes of its direct dependencies, and the
/// compiler argument string are all unchanged. Dependency hashes make the
/// key transitively content-sensitive without rehashing deep file sets: an
/// upstream source edit changes that dependency's hash, which changes every
/// dependent's key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleKey {
    /// Module name.
    pub name: String,

    /// Hash of the module's own source files, concatenated in
    /// sorted-by-path order.
    pub source_hash: String,

    /// Direct dependency name -> that dependency's source hash.
    pub dependency_hashes: BTreeMap<String, String>,

    /// Canonicalized compiler argument string.
    pub compiler_args: String,
}

impl ModuleKey {
    /// Compute a key from raw inputs. `source_files` are hashed in sorted
    /// order so filesystem enumeration order never affects the result.
    pub fn compute(
        name: &str,
        source_files: &[PathBuf],
        dependency_hashes: BTreeMap<String, String>,
        compiler_args: &[String],
    ) -> Result<Self> {
        let mut sorted: Vec<&PathBuf> = source_files.iter().collect();
        sorted.sort();

        let mut hasher = Fingerprint::new();
        for file in sorted {
            hasher.update_file(file)?;
        }

        Ok(ModuleKey {
            name: name.to_string(),
            source_hash: hasher.finish(),
            dependency_hashes,
            compiler_args: compiler_args.join(" "),
        })
    }

    /// Full digest over every key component.
    pub fn digest(&self) -> String {
        let mut hasher = Fingerprint::new();
        hasher.update_str(&self.name);
        hasher.update_str(&self.source_hash);
        for (dep, hash) in &self.dependency_hashes {
            hasher.update_str(dep);
            hasher.update_str(hash);
        }
        hasher.update_str(&self.compiler_args);
        hasher.finish()
    }

    /// Cache directory name: `<name>-<first 8 hex chars of digest>`.
    pub fn cache_dir_name(&self) -> String {
        format!("{}-{}", self.name, &self.digest()[..DIR_HASH_LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_sources(tmp: &TempDir, files: &[(&str, &str)]) -> Vec<PathBuf> {
        files
            .iter()
            .map(|(name, contents)| {
                let path = tmp.path().join(name);
                std::fs::write(&path, contents).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_key_idempotent() {
        let tmp = TempDir::new().unwrap();
        let sources = write_sources(&tmp, &[("a.swift", "let a = 1"), ("b.swift", "let b = 2")]);
        let args = vec!["-module-name".to_string(), "Core".to_string()];

        let k1 = ModuleKey::compute("Core", &sources, BTreeMap::new(), &args).unwrap();
        let k2 = ModuleKey::compute("Core", &sources, BTreeMap::new(), &args).unwrap();

        assert_eq!(k1, k2);
        assert_eq!(k1.cache_dir_name(), k2.cache_dir_name());
    }

    #[test]
    fn test_key_independent_of_enumeration_order() {
        let tmp = TempDir::new().unwrap();
        let sources = write_sources(&tmp, &[("a.swift", "let a = 1"), ("b.swift", "let b = 2")]);
        let reversed: Vec<PathBuf> = sources.iter().rev().cloned().collect();

        let k1 = ModuleKey::compute("Core", &sources, BTreeMap::new(), &[]).unwrap();
        let k2 = ModuleKey::compute("Core", &reversed, BTreeMap::new(), &[]).unwrap();

        assert_eq!(k1.source_hash, k2.source_hash);
    }

    #[test]
    fn test_source_edit_changes_key() {
        let tmp = TempDir::new().unwrap();
        let sources = write_sources(&tmp, &[("a.swift", "let a = 1")]);

        let before = ModuleKey::compute("Core", &sources, BTreeMap::new(), &[]).unwrap();
        std::fs::write(&sources[0], "let a = 2").unwrap();
        let after = ModuleKey::compute("Core", &sources, BTreeMap::new(), &[]).unwrap();

        assert_ne!(before.source_hash, after.source_hash);
        assert_ne!(before.cache_dir_name(), after.cache_dir_name());
    }

    #[test]
    fn test_dependency_hash_changes_key() {
        let tmp = TempDir::new().unwrap();
        let sources = write_sources(&tmp, &[("a.swift", "let a = 1")]);

        let mut deps = BTreeMap::new();
        deps.insert("Networking".to_string(), "aaaa".to_string());
        let k1 = ModuleKey::compute("Core", &sources, deps, &[]).unwrap();

        let mut deps = BTreeMap::new();
        deps.insert("Networking".to_string(), "bbbb".to_string());
        let k2 = ModuleKey::compute("Core", &sources, deps, &[]).unwrap();

        assert_ne!(k1.digest(), k2.digest());
    }

    #[test]
    fn test_compiler_args_change_key() {
        let tmp = TempDir::new().unwrap();
        let sources = write_sources(&tmp, &[("a.swift", "let a = 1")]);

        let k1 = ModuleKey::compute("Core", &sources, BTreeMap::new(), &["-O".to_string()])
            .unwrap();
        let k2 = ModuleKey::compute("Core", &sources, BTreeMap::new(), &["-Onone".to_string()])
            .unwrap();

        assert_ne!(k1.digest(), k2.digest());
    }

    #[test]
    fn test_cache_dir_name_format() {
        let tmp = TempDir::new().unwrap();
        let sources = write_sources(&tmp, &[("a.swift", "let a = 1")]);

        let key = ModuleKey::compute("Core", &sources, BTreeMap::new(), &[]).unwrap();
        let dir = key.cache_dir_name();

        assert!(dir.starts_with("Core-"));
        let suffix = dir.strip_prefix("Core-").unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
