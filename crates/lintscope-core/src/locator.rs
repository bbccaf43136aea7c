//! Configuration file discovery

use std::path::{Path, PathBuf};

use crate::result::Result;

/// Configuration file names, in lookup priority order
pub const CONFIG_FILENAMES: &[&str] = &[
    "lintscope.config.json",
    "lintscope.config.jsonc",
    "lintscope.config.yaml",
    "lintscope.config.yml",
    "lintscope.config.toml",
];

/// How the configuration source is chosen
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigFileMode {
    /// Search upward from each file's directory
    #[default]
    Search,
    /// Use this file for every path; relative paths are resolved against the cwd
    Explicit(PathBuf),
    /// Use no configuration file at all
    Disabled,
}

/// Where configuration for a directory comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedSource {
    /// The configuration file, if any
    pub path: Option<PathBuf>,
    /// Directory patterns of the source are relative to
    pub base_path: PathBuf,
}

/// Finds the configuration source governing a directory
#[derive(Debug, Clone)]
pub struct ConfigLocator {
    cwd: PathBuf,
    mode: ConfigFileMode,
}

impl ConfigLocator {
    pub fn new(cwd: impl Into<PathBuf>, mode: ConfigFileMode) -> Self {
        Self {
            cwd: cwd.into(),
            mode,
        }
    }

    pub fn mode(&self) -> &ConfigFileMode {
        &self.mode
    }

    /// Locate the source for `start_dir`
    ///
    /// An explicit file and a disabled lookup both use the cwd as base path;
    /// a searched file uses its own directory. A search that finds nothing
    /// yields no path and the cwd as base path.
    pub async fn locate(&self, start_dir: &Path) -> Result<LocatedSource> {
        match &self.mode {
            ConfigFileMode::Explicit(path) => Ok(LocatedSource {
                path: Some(self.cwd.join(path)),
                base_path: self.cwd.clone(),
            }),
            ConfigFileMode::Disabled => Ok(LocatedSource {
                path: None,
                base_path: self.cwd.clone(),
            }),
            ConfigFileMode::Search => match Self::find_up(start_dir).await {
                Some(path) => {
                    let base_path = path
                        .parent()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.cwd.clone());
                    Ok(LocatedSource {
                        path: Some(path),
                        base_path,
                    })
                }
                None => Ok(LocatedSource {
                    path: None,
                    base_path: self.cwd.clone(),
                }),
            },
        }
    }

    /// Walk from `start_dir` to the filesystem root looking for a config file
    ///
    /// Checks [`CONFIG_FILENAMES`] in order in each directory; the first hit
    /// wins. Directories that do not exist are skipped, so a virtual path's
    /// directory still finds the configuration above it.
    pub async fn find_up(start_dir: &Path) -> Option<PathBuf> {
        for directory in start_dir.ancestors() {
            for filename in CONFIG_FILENAMES {
                let candidate = directory.join(filename);
                if let Ok(metadata) = tokio::fs::metadata(&candidate).await
                    && metadata.is_file()
                {
                    tracing::debug!("Found config: {}", candidate.display());
                    return Some(candidate);
                }
            }
        }
        tracing::trace!("No config found above {}", start_dir.display());
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_find_up_prefers_nearest_directory() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("packages/app/src");
        fs::create_dir_all(&nested).unwrap();
        fs::write(temp_dir.path().join("lintscope.config.json"), "{}").unwrap();
        fs::write(temp_dir.path().join("packages/app/lintscope.config.yaml"), "").unwrap();

        let locator = ConfigLocator::new(temp_dir.path(), ConfigFileMode::Search);
        let located = locator.locate(&nested).await.unwrap();
        assert_eq!(
            located.path,
            Some(temp_dir.path().join("packages/app/lintscope.config.yaml"))
        );
        assert_eq!(located.base_path, temp_dir.path().join("packages/app"));
    }

    #[tokio::test]
    async fn test_filename_priority_within_directory() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("lintscope.config.toml"), "").unwrap();
        fs::write(temp_dir.path().join("lintscope.config.jsonc"), "").unwrap();

        let found = ConfigLocator::find_up(temp_dir.path()).await.unwrap();
        assert_eq!(found, temp_dir.path().join("lintscope.config.jsonc"));
    }

    #[tokio::test]
    async fn test_explicit_and_disabled_modes_use_cwd() {
        let cwd = PathBuf::from("/work");

        let explicit = ConfigLocator::new(&cwd, ConfigFileMode::Explicit("conf/lint.json".into()))
            .locate(Path::new("/work/src"))
            .await
            .unwrap();
        assert_eq!(explicit.path, Some(PathBuf::from("/work/conf/lint.json")));
        assert_eq!(explicit.base_path, cwd);

        let disabled = ConfigLocator::new(&cwd, ConfigFileMode::Disabled)
            .locate(Path::new("/work/src"))
            .await
            .unwrap();
        assert_eq!(disabled.path, None);
        assert_eq!(disabled.base_path, cwd);
    }
}
