// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

use path_clean::clean;
use std::path::{Path, PathBuf};

pub type FindInParent = fn(&Path, &str) -> Option<PathBuf>;

/// Walk from `path` up to the filesystem root looking for `filename`.
pub fn find_in_parent(path: &Path, filename: &str) -> Option<PathBuf> {
    path.ancestors()
        .map(|dir| dir.join(filename))
        .find(|candidate| candidate.exists())
}

/// Precedence: explicit cli file, then the nearest file found from cwd upwards, then the OS
/// config dir.
pub fn resolve_config_path(
    find_in_parent: FindInParent,
    cwd: &Path,
    default_config_dir: &Path,
    default_filename: &str,
    cli_file: Option<&Path>,
) -> PathBuf {
    if let Some(cli_file) = cli_file {
        if cli_file.is_absolute() {
            return cli_file.to_path_buf();
        }
        return clean(cwd.join(cli_file));
    }

    if let Some(found) = find_in_parent(cwd, default_filename) {
        return found;
    }

    clean(default_config_dir.join(default_filename))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found(_: &Path, _: &str) -> Option<PathBuf> {
        None
    }

    fn found(_: &Path, _: &str) -> Option<PathBuf> {
        Some(PathBuf::from("/work/thermo.config.yaml"))
    }

    #[test]
    fn test_resolve_precedence() {
        let cwd = PathBuf::from("/work/app");
        let defaults = PathBuf::from("/home/me/.config/thermo");

        let path = resolve_config_path(not_found, &cwd, &defaults, "thermo.config.yaml", None);
        assert_eq!(path, defaults.join("thermo.config.yaml"));

        let path = resolve_config_path(found, &cwd, &defaults, "thermo.config.yaml", None);
        assert_eq!(path, PathBuf::from("/work/thermo.config.yaml"));

        let path = resolve_config_path(
            found,
            &cwd,
            &defaults,
            "thermo.config.yaml",
            Some(Path::new("../conf/other.yaml")),
        );
        assert_eq!(path, PathBuf::from("/work/conf/other.yaml"));

        let path = resolve_config_path(
            found,
            &cwd,
            &defaults,
            "thermo.config.yaml",
            Some(Path::new("/etc/thermo.yaml")),
        );
        assert_eq!(path, PathBuf::from("/etc/thermo.yaml"));
    }

    #[test]
    fn test_find_in_parent() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("a").join("b");
        std::fs::create_dir_all(&nested)?;
        std::fs::write(dir.path().join("thermo.config.yaml"), "chains: []")?;

        assert_eq!(
            find_in_parent(&nested, "thermo.config.yaml"),
            Some(dir.path().join("thermo.config.yaml"))
        );
        assert_eq!(find_in_parent(&nested, "missing.yaml"), None);
        Ok(())
    }
}
