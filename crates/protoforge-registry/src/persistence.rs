// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use crate::registry::{ModuleRegistry, RegistryError, VersionEntry};

// ---------------------------------------------------------------------------
// FilePersistence
// ---------------------------------------------------------------------------

/// File-based persistence for `ModuleRegistry`.
///
/// Stores each module version as a JSON file at:
///   `{directory}/{module_name}/{version}.json`
pub struct FilePersistence {
    directory: PathBuf,
}

impl FilePersistence {
    /// Create a new `FilePersistence` rooted at the given directory.
    ///
    /// The directory is created if it does not exist.
    pub fn new(directory: PathBuf) -> Result<Self, RegistryError> {
        if !directory.exists() {
            fs::create_dir_all(&directory).map_err(|e| {
                RegistryError::Io(format!(
                    "failed to create directory {}: {}",
                    directory.display(),
                    e
                ))
            })?;
        }
        Ok(FilePersistence { directory })
    }

    /// Persist the entire registry to disk.
    ///
    /// Each module gets its own subdirectory, and each version is stored
    /// as `{version}.json`. Existing files are overwritten.
    pub fn save(&self, registry: &ModuleRegistry) -> Result<(), RegistryError> {
        for (name, versions) in registry.inner() {
            let module_dir = self.directory.join(sanitize_name(name));
            if !module_dir.exists() {
                fs::create_dir_all(&module_dir).map_err(|e| {
                    RegistryError::Io(format!(
                        "failed to create module dir {}: {}",
                        module_dir.display(),
                        e
                    ))
                })?;
            }

            for entry in versions {
                let filename = format!("{}.json", sanitize_name(&entry.version));
                let path = module_dir.join(filename);
                let json = serde_json::to_string_pretty(entry)
                    .map_err(|e| RegistryError::Io(format!("serialization error: {}", e)))?;
                fs::write(&path, json).map_err(|e| {
                    RegistryError::Io(format!("failed to write {}: {}", path.display(), e))
                })?;
            }
        }
        Ok(())
    }

    /// Load a registry from disk.
    ///
    /// Scans all subdirectories of the root for `*.json` files and
    /// reconstructs the registry. Entries that fail to parse are skipped
    /// with a warning rather than failing the whole load.
    pub fn load(&self) -> Result<ModuleRegistry, RegistryError> {
        let mut modules: HashMap<String, Vec<VersionEntry>> = HashMap::new();

        let dir_entries = fs::read_dir(&self.directory).map_err(|e| {
            RegistryError::Io(format!(
                "failed to read directory {}: {}",
                self.directory.display(),
                e
            ))
        })?;

        for dir_entry in dir_entries.flatten() {
            let module_dir = dir_entry.path();
            if !module_dir.is_dir() {
                continue;
            }

            let version_files = fs::read_dir(&module_dir).map_err(|e| {
                RegistryError::Io(format!(
                    "failed to read module dir {}: {}",
                    module_dir.display(),
                    e
                ))
            })?;

            for vf in version_files.flatten() {
                let path = vf.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }

                let json = match fs::read_to_string(&path) {
                    Ok(j) => j,
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping unreadable version file");
                        continue;
                    }
                };

                match serde_json::from_str::<VersionEntry>(&json) {
                    Ok(entry) => {
                        modules.entry(entry.module_name.clone()).or_default().push(entry);
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "skipping corrupt version file");
                    }
                }
            }
        }

        // Restore publish order within each module.
        for versions in modules.values_mut() {
            versions.sort_by_key(|e| e.published_at);
        }

        Ok(ModuleRegistry::from_raw(modules))
    }
}

/// Replace path-hostile characters so module/version names are safe as
/// directory and file names.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ProtoFile;

    fn sample_files() -> Vec<ProtoFile> {
        vec![ProtoFile::new("user.proto", "message User {}")]
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = FilePersistence::new(dir.path().to_path_buf()).unwrap();

        let mut reg = ModuleRegistry::new();
        reg.publish("user-service", "v1.0.0", sample_files(), vec![])
            .unwrap();
        reg.publish(
            "order-service",
            "v2.0.0",
            sample_files(),
            vec!["user-service@v1.0.0".to_string()],
        )
        .unwrap();
        persistence.save(&reg).unwrap();

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded.module_count(), 2);

        let entry = loaded.get("order-service", "v2.0.0").unwrap();
        assert_eq!(entry.dependencies, vec!["user-service@v1.0.0"]);
        assert_eq!(
            entry.content_hash,
            reg.get("order-service", "v2.0.0").unwrap().content_hash
        );
    }

    #[test]
    fn load_empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = FilePersistence::new(dir.path().to_path_buf()).unwrap();
        let loaded = persistence.load().unwrap();
        assert_eq!(loaded.module_count(), 0);
    }

    #[test]
    fn corrupt_version_file_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = FilePersistence::new(dir.path().to_path_buf()).unwrap();

        let mut reg = ModuleRegistry::new();
        reg.publish("m", "v1", sample_files(), vec![]).unwrap();
        persistence.save(&reg).unwrap();

        // Drop a corrupt file alongside the valid one.
        let module_dir = dir.path().join("m");
        fs::write(module_dir.join("v2.json"), "not json").unwrap();

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded.list_versions("m"), vec!["v1"]);
    }

    #[test]
    fn sanitize_path_hostile_names() {
        assert_eq!(sanitize_name("user/service"), "user_service");
        assert_eq!(sanitize_name("v1.0.0"), "v1.0.0");
        assert_eq!(sanitize_name("a b:c"), "a_b_c");
    }

    #[test]
    fn multiple_versions_restore_publish_order() {
        let dir = tempfile::tempdir().unwrap();
        let persistence = FilePersistence::new(dir.path().to_path_buf()).unwrap();

        let mut reg = ModuleRegistry::new();
        reg.publish("m", "v1", sample_files(), vec![]).unwrap();
        reg.publish("m", "v2", sample_files(), vec![]).unwrap();
        persistence.save(&reg).unwrap();

        let loaded = persistence.load().unwrap();
        assert_eq!(loaded.latest("m").unwrap().version, "v2");
    }
}
