/// Path constants and utilities for the file-backed collaborators
use std::path::PathBuf;
use once_cell::sync::OnceCell;

// Static storage for configurable data root
static DATA_ROOT: OnceCell<String> = OnceCell::new();

// Default root constants
const DEFAULT_DATA_ROOT: &str = "/data/promotion";

/// Initialize the data root directory. Can only be called once.
/// If not called, the default `/data/promotion` will be used.
pub fn init_data_root(path: String) -> Result<(), String> {
    DATA_ROOT.set(path).map_err(|_| "Data root already initialized".to_string())
}

/// Get the configured data root or the default
fn get_data_root() -> &'static str {
    DATA_ROOT.get().map(|s| s.as_str()).unwrap_or(DEFAULT_DATA_ROOT)
}

// Directory names (relative to roots)
pub const REGISTRY_DIR_NAME: &str = "registry";

// Path builder functions
pub fn data_root() -> PathBuf {
    PathBuf::from(get_data_root())
}

pub fn registry_dir() -> PathBuf {
    data_root().join(REGISTRY_DIR_NAME)
}

/// Strip a `file://` scheme so local references can be opened directly
pub fn local_path(reference: &str) -> PathBuf {
    PathBuf::from(reference.strip_prefix("file://").unwrap_or(reference))
}

/// Get all directories that should be created for the pipeline
pub fn all_directories() -> Vec<PathBuf> {
    vec![data_root(), registry_dir()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_root() {
        assert_eq!(get_data_root(), DEFAULT_DATA_ROOT);
        assert_eq!(registry_dir().to_str().unwrap(), "/data/promotion/registry");
        assert_eq!(all_directories(), vec![data_root(), registry_dir()]);
    }

    #[test]
    fn test_all_directories_nested_under_root() {
        for dir in all_directories() {
            assert!(dir.starts_with(data_root()), "{:?} should be under the data root", dir);
        }
    }

    #[test]
    fn test_local_path_strips_scheme() {
        assert_eq!(local_path("file:///tmp/eval.json"), PathBuf::from("/tmp/eval.json"));
        assert_eq!(local_path("/tmp/eval.json"), PathBuf::from("/tmp/eval.json"));
    }
}
