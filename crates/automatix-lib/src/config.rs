use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use toml_edit::{DocumentMut, Item, Table};

use crate::commands::schedule::Schedule;
use crate::domain::RepositoryTarget;
use crate::infrastructure::github::GITHUB_API_BASE;

pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const EXAMPLE_CONFIG_FILE_NAME: &str = "config.example.toml";

/// Environment variable consulted when the configuration has no token.
pub const TOKEN_ENV_VAR: &str = "GITHUB_OAUTH_TOKEN";

const DEFAULT_MANIFEST_PATH: &str = "go.mod";

/// Errors that can occur when working with the configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration file: {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file: {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<toml::de::Error>,
    },

    #[error("failed to write configuration file: {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize configuration to TOML")]
    Serialize(#[source] toml::ser::Error),

    #[error("failed to annotate example configuration")]
    Annotate(#[source] Box<toml_edit::TomlError>),

    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Automatix configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Directory the local working copies are kept in.
    pub repo_base_dir: PathBuf,
    #[serde(default)]
    pub github_token: String,
    #[serde(default)]
    pub periodic_interval_min: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_api_url: Option<String>,
    #[serde(default)]
    pub repositories: Vec<RepositoryConfig>,
}

/// A `[[repositories]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RepositoryConfig {
    pub owner: String,
    pub repository: String,
    pub branch: String,
    #[serde(default)]
    pub vendor_libs: bool,
    #[serde(default)]
    pub minor_version_update: bool,
    #[serde(default = "default_manifest_path")]
    pub manifest_path: PathBuf,
}

fn default_manifest_path() -> PathBuf {
    PathBuf::from(DEFAULT_MANIFEST_PATH)
}

impl Config {
    /// Configuration written as example when no configuration file exists.
    #[must_use]
    pub fn example() -> Self {
        let repository = |name: &str, minor_version_update| RepositoryConfig {
            owner: "simplesurance".to_owned(),
            repository: name.to_owned(),
            branch: "master".to_owned(),
            vendor_libs: true,
            minor_version_update,
            manifest_path: default_manifest_path(),
        };

        Self {
            repo_base_dir: PathBuf::from("/var/lib/automatix/repositories"),
            github_token: "1234567890".to_owned(),
            periodic_interval_min: 0,
            github_api_url: None,
            repositories: vec![repository("baur", true), repository("automatix", false)],
        }
    }

    /// Load and validate the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read,
    /// [`ConfigError::Parse`] if it is not valid, and
    /// [`ConfigError::Validation`] if the content is inconsistent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration TOML without validating it.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if `content` does not describe a configuration.
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Check that every repository can be processed on its own.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();

        for (index, repo) in self.repositories.iter().enumerate() {
            for (field, value) in [
                ("owner", &repo.owner),
                ("repository", &repo.repository),
                ("branch", &repo.branch),
            ] {
                if value.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "repositories[{index}]: {field} must not be empty"
                    )));
                }
            }

            if !stays_inside_repository(&repo.manifest_path) {
                return Err(ConfigError::Validation(format!(
                    "{}/{}: manifest_path must be a path relative to the repository root without \"..\"",
                    repo.owner, repo.repository
                )));
            }

            if !seen.insert((repo.owner.as_str(), repo.repository.as_str())) {
                return Err(ConfigError::Validation(format!(
                    "{}/{} is configured more than once",
                    repo.owner, repo.repository
                )));
            }
        }

        Ok(())
    }

    /// Render the example configuration with explanatory comments.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] or [`ConfigError::Annotate`] if rendering fails.
    pub fn example_document() -> Result<String, ConfigError> {
        let rendered = toml::to_string(&Self::example()).map_err(ConfigError::Serialize)?;
        let mut doc: DocumentMut = rendered
            .parse()
            .map_err(|source| ConfigError::Annotate(Box::new(source)))?;

        let root = doc.as_table_mut();
        annotate(
            root,
            "github_token",
            &format!("Github oauth token, if empty the token from the environment variable {TOKEN_ENV_VAR} is used"),
        );
        annotate(
            root,
            "periodic_interval_min",
            "Minutes between update runs, set to 0 to run the update only once",
        );

        if let Some(repositories) = root
            .get_mut("repositories")
            .and_then(Item::as_array_of_tables_mut)
        {
            for repo in repositories.iter_mut() {
                annotate(
                    repo,
                    "vendor_libs",
                    "Download dependencies into the vendor/ directory after an update",
                );
                annotate(
                    repo,
                    "minor_version_update",
                    "If enabled dependencies are updated to the newest minor or patch version, otherwise only to the newest patch version",
                );
                annotate(repo, "manifest_path", "Path to the go.mod file in the repository");
            }
        }

        Ok(doc.to_string())
    }

    /// Write the example configuration to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Write`] if the file cannot be written.
    pub fn write_example(path: &Path) -> Result<(), ConfigError> {
        let content = Self::example_document()?;
        fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The Github token, falling back to the [`TOKEN_ENV_VAR`] environment variable.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        resolve_token(&self.github_token, std::env::var(TOKEN_ENV_VAR).ok())
    }

    #[must_use]
    pub fn api_url(&self) -> &str {
        self.github_api_url.as_deref().unwrap_or(GITHUB_API_BASE)
    }

    #[must_use]
    pub fn schedule(&self) -> Schedule {
        Schedule::from_minutes(self.periodic_interval_min)
    }

    /// Resolve the repository entries into targets below `base_dir`.
    #[must_use]
    pub fn targets(&self, base_dir: &Path) -> Vec<RepositoryTarget> {
        self.repositories
            .iter()
            .map(|repo| RepositoryTarget {
                owner: repo.owner.clone(),
                repository: repo.repository.clone(),
                branch: repo.branch.clone(),
                local_dir: RepositoryTarget::local_dir_for(base_dir, &repo.owner, &repo.repository),
                manifest_path: repo.manifest_path.clone(),
                vendor: repo.vendor_libs,
                minor_update: repo.minor_version_update,
            })
            .collect()
    }
}

/// Prefix the line of `key` in `table` with a comment.
fn annotate(table: &mut Table, key: &str, comment: &str) {
    if let Some(mut key) = table.key_mut(key) {
        key.leaf_decor_mut().set_prefix(format!("# {comment}\n"));
    }
}

/// Whether `path` is a non-empty relative path that cannot leave the directory it is joined to.
fn stays_inside_repository(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Pick the configured token, or the environment value if none is configured.
#[must_use]
pub fn resolve_token(configured: &str, from_env: Option<String>) -> Option<String> {
    if configured.is_empty() {
        from_env.filter(|t| !t.is_empty())
    } else {
        Some(configured.to_owned())
    }
}

impl fmt::Display for Config {
    /// Human readable summary for logging, leaving out the token.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "RepoBaseDir: {}", self.repo_base_dir.display())?;
        writeln!(f, "PeriodicIntervalMin: {}", self.periodic_interval_min)?;
        writeln!(f, "GithubApiUrl: {}", self.api_url())?;

        for (i, repo) in self.repositories.iter().enumerate() {
            if i > 0 {
                writeln!(f, "--")?;
            }
            write!(f, "{repo}")?;
        }
        Ok(())
    }
}

impl fmt::Display for RepositoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, " Owner: {}", self.owner)?;
        writeln!(f, " Repository: {}", self.repository)?;
        writeln!(f, " Branch: {}", self.branch)?;
        writeln!(f, " VendorLibs: {}", self.vendor_libs)?;
        writeln!(f, " MinorVersionUpdate: {}", self.minor_version_update)?;
        writeln!(f, " ManifestPath: {}", self.manifest_path.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const SAMPLE: &str = r#"
repo_base_dir = "/srv/repos"
github_token = "secret-token"
periodic_interval_min = 30

[[repositories]]
owner = "o"
repository = "r"
branch = "main"
vendor_libs = true

[[repositories]]
owner = "o"
repository = "tools"
branch = "develop"
minor_version_update = true
manifest_path = "tools/go.mod"
"#;

    #[test]
    fn parse_reads_all_fields_and_defaults() {
        let config = Config::parse(SAMPLE).unwrap();

        assert_eq!(config.repo_base_dir, PathBuf::from("/srv/repos"));
        assert_eq!(config.periodic_interval_min, 30);
        assert_eq!(config.repositories.len(), 2);

        let first = &config.repositories[0];
        assert!(first.vendor_libs);
        assert!(!first.minor_version_update);
        assert_eq!(first.manifest_path, PathBuf::from("go.mod"));

        let second = &config.repositories[1];
        assert!(!second.vendor_libs);
        assert!(second.minor_version_update);
        assert_eq!(second.manifest_path, PathBuf::from("tools/go.mod"));
    }

    #[test]
    fn load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join(CONFIG_FILE_NAME)).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn load_reports_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "repo_base_dir = [").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn example_document_round_trips_and_is_commented() {
        let document = Config::example_document().unwrap();

        assert!(document.contains(&format!("# Github oauth token, if empty the token from the environment variable {TOKEN_ENV_VAR} is used")));
        assert!(document.contains("# Minutes between update runs"));
        assert_eq!(Config::parse(&document).unwrap(), Config::example());
    }

    #[test]
    fn write_example_creates_loadable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EXAMPLE_CONFIG_FILE_NAME);

        Config::write_example(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap(), Config::example());
    }

    #[test]
    fn validate_rejects_empty_fields() {
        let mut config = Config::example();
        config.repositories[0].branch = String::new();

        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: repositories[0]: branch must not be empty"
        );
    }

    #[test]
    fn validate_rejects_absolute_manifest_path() {
        let mut config = Config::example();
        config.repositories[1].manifest_path = PathBuf::from("/etc/go.mod");

        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_manifest_path_leaving_repository() {
        let mut config = Config::example();
        config.repositories[1].manifest_path = PathBuf::from("../x/go.mod");

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("manifest_path must be a path relative"));

        config.repositories[1].manifest_path = PathBuf::from("svc/../../go.mod");
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_accepts_nested_manifest_path() {
        let mut config = Config::example();
        config.repositories[1].manifest_path = PathBuf::from("./svc/api/go.mod");

        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_repositories() {
        let mut config = Config::example();
        config.repositories[1].repository = "baur".to_owned();

        let err = config.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid configuration: simplesurance/baur is configured more than once"
        );
    }

    #[test]
    fn configured_token_wins_over_environment() {
        assert_eq!(
            resolve_token("cfg", Some("env".to_owned())),
            Some("cfg".to_owned())
        );
    }

    #[test]
    fn empty_token_falls_back_to_environment() {
        assert_eq!(
            resolve_token("", Some("env".to_owned())),
            Some("env".to_owned())
        );
        assert_eq!(resolve_token("", Some(String::new())), None);
        assert_eq!(resolve_token("", None), None);
    }

    #[test]
    fn display_never_contains_token() {
        let config = Config::parse(SAMPLE).unwrap();
        let shown = config.to_string();

        assert!(!shown.contains("secret-token"));
        assert!(shown.contains(" Repository: tools"));
        assert!(shown.contains("PeriodicIntervalMin: 30"));
    }

    #[test]
    fn targets_resolve_local_directories_and_flags() {
        let config = Config::parse(SAMPLE).unwrap();
        let targets = config.targets(Path::new("/base"));

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].local_dir, PathBuf::from("/base/o/r"));
        assert!(targets[0].vendor);
        assert!(!targets[0].minor_update);
        assert_eq!(
            targets[1].manifest_location(),
            PathBuf::from("/base/o/tools/tools/go.mod")
        );
    }

    #[test]
    fn schedule_from_interval() {
        assert_eq!(Schedule::from_minutes(0), Schedule::Once);
        assert_eq!(
            Schedule::from_minutes(15),
            Schedule::Every(Duration::from_secs(900))
        );
    }

    #[test]
    fn api_url_defaults_to_github() {
        let mut config = Config::example();
        assert_eq!(config.api_url(), GITHUB_API_BASE);

        config.github_api_url = Some("https://ghe.example.com/api/v3".to_owned());
        assert_eq!(config.api_url(), "https://ghe.example.com/api/v3");
    }
}
