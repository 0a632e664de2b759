use std::path::PathBuf;
use std::sync::OnceLock;

/// XDG-compliant config location, resolved once via the `dirs` crate:
///   Linux:  $XDG_CONFIG_HOME/pitchgym (~/.config/pitchgym)
///   macOS:  ~/Library/Application Support/pitchgym

static CONFIG_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Root config directory.
pub fn config_dir() -> &'static PathBuf {
    CONFIG_DIR.get_or_init(|| {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pitchgym")
    })
}

/// Config file path: <config_dir>/config.toml
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_dir_ends_with_app_name() {
        assert!(config_dir().ends_with("pitchgym"));
    }

    #[test]
    fn config_file_structure() {
        assert!(config_file().ends_with("config.toml"));
    }
}
