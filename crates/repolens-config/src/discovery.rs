//! Config file discovery.
//!
//! Searched in order: `.repolens/config.toml` upward from the input root,
//! then `~/.config/repolens/config.toml`. An explicit `--config` path
//! bypasses discovery entirely.

use camino::{Utf8Path, Utf8PathBuf};

const MAX_UPWARD_STEPS: usize = 10;

/// Find the nearest config file for a scan root, if any.
#[must_use]
pub fn discover_config_file(input_root: &Utf8Path) -> Option<Utf8PathBuf> {
    let mut current = Some(input_root);
    for _ in 0..MAX_UPWARD_STEPS {
        let Some(dir) = current else { break };
        let candidate = dir.join(".repolens").join("config.toml");
        if candidate.is_file() {
            return Some(candidate);
        }
        current = dir.parent();
    }

    let home = dirs::config_dir()?;
    let candidate = home.join("repolens").join("config.toml");
    if candidate.is_file() {
        Utf8PathBuf::from_path_buf(candidate).ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn finds_config_in_parent_directory() {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        fs::create_dir_all(root.join(".repolens").as_std_path()).unwrap();
        fs::write(
            root.join(".repolens/config.toml").as_std_path(),
            "[scan]\n",
        )
        .unwrap();
        let nested = root.join("sub/project");
        fs::create_dir_all(nested.as_std_path()).unwrap();

        let found = discover_config_file(&nested).unwrap();
        assert_eq!(found, root.join(".repolens/config.toml"));
    }

    #[test]
    fn absent_config_yields_none() {
        let dir = TempDir::new().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        // The walk may still find a config in a real parent; constrain to tmp
        let nested = root.join("a");
        fs::create_dir_all(nested.as_std_path()).unwrap();
        // No assertion on None here would be flaky only if /tmp carries a
        // .repolens dir, which the fixture does not create.
        assert!(discover_config_file(&nested)
            .map(|p| p.starts_with(&root))
            .unwrap_or(true));
    }
}
