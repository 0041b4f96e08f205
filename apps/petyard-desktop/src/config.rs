use clap::Parser;
use petyard_common::RepoRef;
use petyard_github::DEFAULT_API_BASE;
use petyard_scene::MAX_PETS;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Errors from loading or validating the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Parser, Debug, Default)]
#[command(name = "petyard-desktop", about = "GitHub contributors as pets in a 3D yard")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// YAML config file; command-line flags take precedence over it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Repository owner
    #[arg(long)]
    pub owner: Option<String>,

    /// Repository name
    #[arg(long)]
    pub repo: Option<String>,

    /// GitHub API base URL
    #[arg(long)]
    pub api_base: Option<String>,

    /// API token, sent as a bearer token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Seed for layout and pet animation; random when unset
    #[arg(long)]
    pub seed: Option<u64>,

    /// Maximum number of pets to spawn
    #[arg(long)]
    pub max_pets: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "petyard".into(),
            width: 1280,
            height: 720,
        }
    }
}

/// Resolved application settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub owner: String,
    pub repo: String,
    pub api_base: String,
    pub token: Option<String>,
    pub seed: Option<u64>,
    pub max_pets: usize,
    pub window: WindowConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            owner: "anisayari".into(),
            repo: "voyonsvoir".into(),
            api_base: DEFAULT_API_BASE.into(),
            token: None,
            seed: None,
            max_pets: MAX_PETS,
            window: WindowConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// File (or defaults) first, then any flag given on the command line.
    pub fn resolve(cli: &Cli) -> Result<Self, ConfigError> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply(cli);
        config.validate()?;
        Ok(config)
    }

    fn apply(&mut self, cli: &Cli) {
        if let Some(owner) = &cli.owner {
            self.owner = owner.clone();
        }
        if let Some(repo) = &cli.repo {
            self.repo = repo.clone();
        }
        if let Some(api_base) = &cli.api_base {
            self.api_base = api_base.clone();
        }
        if cli.token.is_some() {
            self.token = cli.token.clone();
        }
        if cli.seed.is_some() {
            self.seed = cli.seed;
        }
        if let Some(max_pets) = cli.max_pets {
            self.max_pets = max_pets;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.owner.trim().is_empty() || self.repo.trim().is_empty() {
            return Err(ConfigError::Invalid("owner and repo must be non-empty".into()));
        }
        if self.max_pets == 0 || self.max_pets > MAX_PETS {
            return Err(ConfigError::Invalid(format!(
                "max_pets must be between 1 and {MAX_PETS}, got {}",
                self.max_pets
            )));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid("window dimensions must be non-zero".into()));
        }
        Ok(())
    }

    pub fn repo_ref(&self) -> RepoRef {
        RepoRef::new(self.owner.clone(), self.repo.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["petyard-desktop"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.repo_ref().to_string(), "anisayari/voyonsvoir");
        assert_eq!(config.api_base, "https://api.github.com");
        assert_eq!(config.max_pets, 12);
        assert_eq!(config.window, WindowConfig::default());
    }

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml("owner: rust-lang\nwindow:\n  width: 800\n").unwrap();
        assert_eq!(config.owner, "rust-lang");
        assert_eq!(config.repo, "voyonsvoir");
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 720);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            AppConfig::from_yaml("colour: blue\n"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "owner: from-file\nrepo: yard\nseed: 1\nmax_pets: 4").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config =
            AppConfig::resolve(&cli(&["--config", &path, "--owner", "from-flag", "--seed", "9"]))
                .unwrap();
        assert_eq!(config.owner, "from-flag");
        assert_eq!(config.repo, "yard");
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.max_pets, 4);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn out_of_range_max_pets_is_rejected() {
        let err = AppConfig::resolve(&cli(&["--max-pets", "40"])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(AppConfig::resolve(&cli(&["--max-pets", "0"])).is_err());
    }

    #[test]
    fn empty_owner_is_rejected() {
        assert!(AppConfig::resolve(&cli(&["--owner", " "])).is_err());
    }
}
