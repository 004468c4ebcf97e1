use std::{
    collections::HashMap,
    env, fs, io,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use once_cell::sync::Lazy;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;
use zeroize::Zeroizing;

use super::{CustodianConfig, DEFAULT_MUTATION_RETRY_LIMIT, HashingConfig, TokenConfig};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("custodian.toml"),
        PathBuf::from("config/custodian.toml"),
    ]
});

const ENV_CONFIG_PATH: &str = "CUSTODIAN_CONFIG";
const ENV_TOKEN_SECRET: &str = "CUSTODIAN_TOKEN_SECRET";
const ENV_TOKEN_PREVIOUS_SECRETS: &str = "CUSTODIAN_TOKEN_PREVIOUS_SECRETS";
const ENV_TOKEN_TTL: &str = "CUSTODIAN_TOKEN_TTL";
const ENV_HASH_MEMORY_KIB: &str = "CUSTODIAN_HASH_MEMORY_KIB";
const ENV_HASH_ITERATIONS: &str = "CUSTODIAN_HASH_ITERATIONS";
const ENV_HASH_PARALLELISM: &str = "CUSTODIAN_HASH_PARALLELISM";
const ENV_MUTATION_RETRY_LIMIT: &str = "CUSTODIAN_MUTATION_RETRY_LIMIT";

/// Failure to resolve a usable [`CustodianConfig`].
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    /// An explicitly named config file is absent.
    #[error("config file {path} does not exist")]
    MissingConfig {
        /// The requested file.
        path: PathBuf,
    },
    /// The config file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// The file being read.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// The file being parsed.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: toml::de::Error,
    },
    /// The env file could not be loaded.
    #[error("failed to load env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
    /// A single setting could not be parsed.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Environment variable or file key.
        key: &'static str,
        /// Parser message.
        reason: String,
    },
    /// No signing secret in any source.
    #[error("a token signing secret must be configured")]
    MissingSigningSecret,
    /// Values parsed but do not form a usable configuration.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Explicit sources for [`ConfigLoader`].
#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    /// TOML file to read instead of the default locations.
    pub config_path: Option<PathBuf>,
    /// Env file to load instead of `.env`.
    pub env_file: Option<PathBuf>,
}

/// Builds a [`CustodianConfig`] from defaults, an optional TOML file and
/// environment variables, in increasing order of precedence.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    /// Loader using the default locations.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loader with explicit sources.
    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    /// Read the TOML file at `path`; it must exist.
    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    /// Load `path` instead of `.env`; it must exist.
    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Load the env file, then resolve against the process environment.
    ///
    /// An explicitly configured env file must be readable. The default
    /// `.env` is optional and skipped when absent.
    pub fn load(&self) -> Result<CustodianConfig, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => {
                dotenvy::from_path(path)?;
                true
            }
            None => match dotenvy::dotenv() {
                Ok(_) => true,
                Err(dotenvy::Error::Io(err))
                    if err.kind() == io::ErrorKind::NotFound =>
                {
                    false
                }
                Err(err) => return Err(err.into()),
            },
        };
        debug!(env_file_loaded, "loading custodian configuration");

        self.load_with_env(EnvConfig::gather())
    }

    /// Resolve configuration against an explicit environment snapshot.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
    ) -> Result<CustodianConfig, ConfigLoadError> {
        let file = self.load_file_config(&env)?;
        let config = compose(file.unwrap_or_default(), env)?;
        config.validate()?;
        Ok(config)
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<Option<FileConfig>, ConfigLoadError> {
        let (path, explicit) = match (&self.options.config_path, &env.config_path)
        {
            (Some(path), _) => (Some(path.clone()), true),
            (None, Some(path)) => (Some(path.clone()), true),
            (None, None) => (
                DEFAULT_CONFIG_LOCATIONS
                    .iter()
                    .find(|candidate| candidate.exists())
                    .cloned(),
                false,
            ),
        };

        let Some(path) = path else {
            return Ok(None);
        };

        if !path.exists() {
            if explicit {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok(None);
        }

        read_file_config(&path).map(Some)
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn compose(
    file: FileConfig,
    env: EnvConfig,
) -> Result<CustodianConfig, ConfigLoadError> {
    let file_tokens = file.tokens.unwrap_or_default();
    let file_hashing = file.hashing.unwrap_or_default();
    let defaults = HashingConfig::default();

    let signing_secret = env
        .token_secret
        .or(file_tokens.signing_secret)
        .ok_or(ConfigLoadError::MissingSigningSecret)?;

    let previous_secrets = match env.previous_secrets {
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|secret| !secret.is_empty())
            .map(|secret| Zeroizing::new(secret.to_string()))
            .collect(),
        None => file_tokens
            .previous_secrets
            .unwrap_or_default()
            .into_iter()
            .map(Zeroizing::new)
            .collect(),
    };

    let ttl = match env.token_ttl.or(file_tokens.ttl) {
        Some(raw) => Some(parse_duration(ENV_TOKEN_TTL, &raw)?),
        None => None,
    };

    let hashing = HashingConfig {
        memory_kib: parse_or(
            ENV_HASH_MEMORY_KIB,
            env.hash_memory_kib,
            file_hashing.memory_kib,
            defaults.memory_kib,
        )?,
        iterations: parse_or(
            ENV_HASH_ITERATIONS,
            env.hash_iterations,
            file_hashing.iterations,
            defaults.iterations,
        )?,
        parallelism: parse_or(
            ENV_HASH_PARALLELISM,
            env.hash_parallelism,
            file_hashing.parallelism,
            defaults.parallelism,
        )?,
    };

    let mutation_retry_limit = parse_or(
        ENV_MUTATION_RETRY_LIMIT,
        env.mutation_retry_limit,
        file.mutation_retry_limit,
        DEFAULT_MUTATION_RETRY_LIMIT,
    )?;

    Ok(CustodianConfig {
        tokens: TokenConfig {
            signing_secret: Zeroizing::new(signing_secret),
            previous_secrets,
            ttl,
        },
        hashing,
        mutation_retry_limit,
    })
}

fn parse_or<T>(
    key: &'static str,
    from_env: Option<String>,
    from_file: Option<T>,
    default: T,
) -> Result<T, ConfigLoadError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match from_env {
        Some(raw) => raw.trim().parse().map_err(|err: T::Err| {
            ConfigLoadError::InvalidValue {
                key,
                reason: err.to_string(),
            }
        }),
        None => Ok(from_file.unwrap_or(default)),
    }
}

fn parse_duration(
    key: &'static str,
    raw: &str,
) -> Result<Duration, ConfigLoadError> {
    humantime::parse_duration(raw.trim()).map_err(|err| {
        ConfigLoadError::InvalidValue {
            key,
            reason: err.to_string(),
        }
    })
}

/// Snapshot of the `CUSTODIAN_*` environment variables.
#[derive(Default, Clone)]
pub struct EnvConfig {
    /// `CUSTODIAN_CONFIG`
    pub config_path: Option<PathBuf>,
    /// `CUSTODIAN_TOKEN_SECRET`
    pub token_secret: Option<String>,
    /// `CUSTODIAN_TOKEN_PREVIOUS_SECRETS`, comma separated.
    pub previous_secrets: Option<String>,
    /// `CUSTODIAN_TOKEN_TTL`
    pub token_ttl: Option<String>,
    /// `CUSTODIAN_HASH_MEMORY_KIB`
    pub hash_memory_kib: Option<String>,
    /// `CUSTODIAN_HASH_ITERATIONS`
    pub hash_iterations: Option<String>,
    /// `CUSTODIAN_HASH_PARALLELISM`
    pub hash_parallelism: Option<String>,
    /// `CUSTODIAN_MUTATION_RETRY_LIMIT`
    pub mutation_retry_limit: Option<String>,
}

impl EnvConfig {
    /// Snapshot the process environment.
    pub fn gather() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Snapshot built from explicit key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = pairs
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        Self::from_lookup(|key| map.get(key).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).filter(|value| !value.is_empty());
        Self {
            config_path: read(ENV_CONFIG_PATH).map(PathBuf::from),
            token_secret: read(ENV_TOKEN_SECRET),
            previous_secrets: read(ENV_TOKEN_PREVIOUS_SECRETS),
            token_ttl: read(ENV_TOKEN_TTL),
            hash_memory_kib: read(ENV_HASH_MEMORY_KIB),
            hash_iterations: read(ENV_HASH_ITERATIONS),
            hash_parallelism: read(ENV_HASH_PARALLELISM),
            mutation_retry_limit: read(ENV_MUTATION_RETRY_LIMIT),
        }
    }
}

impl std::fmt::Debug for EnvConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvConfig")
            .field("config_path", &self.config_path)
            .field("token_secret", &self.token_secret.as_ref().map(|_| "<redacted>"))
            .field(
                "previous_secrets",
                &self.previous_secrets.as_ref().map(|_| "<redacted>"),
            )
            .field("token_ttl", &self.token_ttl)
            .field("hash_memory_kib", &self.hash_memory_kib)
            .field("hash_iterations", &self.hash_iterations)
            .field("hash_parallelism", &self.hash_parallelism)
            .field("mutation_retry_limit", &self.mutation_retry_limit)
            .finish()
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    tokens: Option<FileTokenConfig>,
    hashing: Option<FileHashingConfig>,
    mutation_retry_limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileTokenConfig {
    signing_secret: Option<String>,
    previous_secrets: Option<Vec<String>>,
    ttl: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileHashingConfig {
    memory_kib: Option<u32>,
    iterations: Option<u32>,
    parallelism: Option<u32>,
}
