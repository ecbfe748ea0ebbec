//! Standard locations of configuration files

use std::path::PathBuf;

/// `<config dir>/sonora`, falling back to `./sonora` when the platform has
/// no config directory
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sonora")
}

/// `<config dir>/sonora/engine.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("engine.yaml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_layout() {
        let path = default_config_path();
        assert!(path.ends_with("sonora/engine.yaml"));
        assert_eq!(path.parent(), Some(default_config_dir().as_path()));
    }
}
