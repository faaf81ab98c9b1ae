//! Catalog loading: walk the embedded YAML tree, falling back to an on-disk
//! directory for development setups. A descriptor that fails validation is
//! logged and skipped; it never aborts the remaining loads.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use super::descriptor::{ToolDescriptor, parse_tool_descriptor};
use super::embedded::EMBEDDED_TOOL_CONFIGS;

/// Loads all YAML tool descriptors, preferring the embedded catalog.
pub fn walk_config_directory(config_dir: &Path) -> Vec<ToolDescriptor> {
    let embedded = walk_embedded_configs();
    if !embedded.is_empty() {
        info!(count = embedded.len(), "loaded tools from embedded catalog");
        return embedded;
    }

    walk_os_filesystem(config_dir)
}

fn walk_embedded_configs() -> Vec<ToolDescriptor> {
    let mut descriptors = Vec::new();

    for &(path, data) in EMBEDDED_TOOL_CONFIGS {
        match parse_tool_descriptor(data, path) {
            Ok(descriptor) => {
                info!(
                    tool = %descriptor.name,
                    category = %descriptor.category,
                    path,
                    "loaded tool config from embedded catalog"
                );
                descriptors.push(descriptor);
            }
            Err(e) => error!(path, error = %e, "failed to parse embedded tool config"),
        }
    }

    descriptors
}

/// Walks the OS filesystem (fallback for development). A missing directory
/// yields an empty registry, not an error.
fn walk_os_filesystem(config_dir: &Path) -> Vec<ToolDescriptor> {
    if !config_dir.exists() {
        warn!(dir = %config_dir.display(), "config directory does not exist");
        return Vec::new();
    }

    let mut files = Vec::new();
    collect_yaml_files(config_dir, &mut files);
    files.sort();

    let mut descriptors = Vec::new();
    for path in files {
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to read config file");
                continue;
            }
        };

        let relative = path
            .strip_prefix(config_dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();

        match parse_tool_descriptor(&data, &relative) {
            Ok(descriptor) => {
                info!(
                    tool = %descriptor.name,
                    category = %descriptor.category,
                    path = %path.display(),
                    "loaded tool config from filesystem"
                );
                descriptors.push(descriptor);
            }
            Err(e) => error!(path = %path.display(), error = %e, "failed to parse tool config"),
        }
    }

    descriptors
}

fn collect_yaml_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        error!(dir = %dir.display(), "error accessing config directory");
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_yaml_files(&path, files);
        } else if matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        ) {
            files.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn embedded_catalog_includes_both_bloom_tools() {
        let descriptors = walk_embedded_configs();

        let bloom: Vec<&str> = descriptors
            .iter()
            .filter(|d| d.category == "bloom")
            .map(|d| d.name.as_str())
            .collect();

        assert!(bloom.contains(&"generate-scene-action"));
        assert!(bloom.contains(&"generate-search-phrase"));
        assert!(bloom.len() >= 2);
    }

    #[test]
    fn every_embedded_tool_has_required_fields() {
        for descriptor in walk_embedded_configs() {
            assert!(!descriptor.name.is_empty());
            assert!(!descriptor.description.is_empty(), "{} missing description", descriptor.name);
            assert!(!descriptor.category.is_empty(), "{} missing category", descriptor.name);
        }
    }

    #[test]
    fn embedded_catalog_covers_the_expected_categories() {
        let descriptors = walk_embedded_configs();
        for category in ["fraud", "graph-data", "sar", "bloom", "liquidity"] {
            assert!(
                descriptors.iter().any(|d| d.category == category),
                "no tools in category {}",
                category
            );
        }
    }

    #[test]
    fn missing_directory_yields_empty_registry() {
        let descriptors = walk_os_filesystem(Path::new("/nonexistent/tool/config"));
        assert!(descriptors.is_empty());
    }

    #[test]
    fn filesystem_walk_skips_invalid_files_and_keeps_valid_ones() {
        let dir = tempfile::tempdir().unwrap();
        let fraud_dir = dir.path().join("fraud");
        fs::create_dir_all(&fraud_dir).unwrap();

        fs::write(
            fraud_dir.join("good.yaml"),
            "name: good-tool\ndescription: a valid tool\n",
        )
        .unwrap();
        fs::write(fraud_dir.join("bad.yaml"), "description: nameless\n").unwrap();
        fs::write(fraud_dir.join("notes.txt"), "not yaml at all").unwrap();

        let descriptors = walk_os_filesystem(dir.path());

        assert_eq!(descriptors.len(), 1);
        assert_eq!(descriptors[0].name, "good-tool");
        assert_eq!(descriptors[0].category, "fraud");
    }
}
