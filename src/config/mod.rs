// pgs3/src/config/mod.rs
pub mod args;

use chrono::Local;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

use crate::backup::db_dump::split_extra_opts;
use crate::errors::{AppError, Result};
use crate::scheduler::cron::CronSchedule;
use args::{BackupArgs, ConnectionArgs, RestoreArgs};

const ENV_PREFIX: &str = "PGS3_";
const DEFAULT_POSTGRES_HOST: &str = "localhost";
const DEFAULT_POSTGRES_PORT: u16 = 5432;

/// Optional settings file passed with `--config`. Every field may be
/// overridden by a flag or an environment variable.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawJsonConfig {
    pub postgres_db: Option<String>,
    pub postgres_user: Option<String>,
    pub postgres_password: Option<String>,
    pub postgres_host: Option<String>,
    pub postgres_port: Option<u16>,
    pub s3_endpoint: Option<String>,
    pub s3_bucket: Option<String>,
    pub aws_region: Option<String>,
    pub aws_access_key_id: Option<String>,
    pub aws_secret_access_key: Option<String>,
    pub staging_dir: Option<PathBuf>,
    pub schedule: Option<String>,
    pub restore_on_startup: Option<bool>,
    pub keep_days: Option<i64>,
    pub pgdump_extra_opts: Option<String>,
}

impl RawJsonConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            AppError::config(format!(
                "Failed to read config file at {}: {}",
                config_path.display(),
                e
            ))
        })?;
        serde_json::from_str(&config_content).map_err(|e| {
            AppError::config(format!(
                "Failed to parse JSON from config file at {}: {}",
                config_path.display(),
                e
            ))
        })
    }
}

/// Database connection settings. Immutable once resolved.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// Object store settings. `endpoint` is set for S3-compatible services.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleSpec {
    pub cron: CronSchedule,
    pub restore_on_startup: bool,
}

#[derive(Debug, Clone)]
pub struct BackupSettings {
    pub connection: ConnectionConfig,
    pub store: StoreConfig,
    pub staging_dir: PathBuf,
    pub schedule: Option<ScheduleSpec>,
    /// Retention window; values <= 0 disable pruning.
    pub keep_days: i64,
    pub extra_args: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RestoreSettings {
    pub connection: ConnectionConfig,
    pub store: StoreConfig,
    pub staging_dir: PathBuf,
}

/// Layered lookup: `PGS3_<NAME>` environment variable, then flag, then
/// config file. Empty strings are treated as unset at every layer.
struct Resolver<'a, E: Fn(&str) -> Option<String>> {
    env: E,
    file: &'a RawJsonConfig,
    missing: Vec<String>,
}

impl<'a, E: Fn(&str) -> Option<String>> Resolver<'a, E> {
    fn new(env: E, file: &'a RawJsonConfig) -> Self {
        Self {
            env,
            file,
            missing: Vec::new(),
        }
    }

    fn optional(&self, name: &str, flag: Option<&str>, file: Option<&str>) -> Option<String> {
        (self.env)(&format!("{ENV_PREFIX}{name}"))
            .filter(|v| !v.is_empty())
            .or_else(|| flag.filter(|v| !v.is_empty()).map(str::to_string))
            .or_else(|| file.filter(|v| !v.is_empty()).map(str::to_string))
    }

    fn required(&mut self, name: &str, flag_name: &str, flag: Option<&str>, file: Option<&str>) -> String {
        match self.optional(name, flag, file) {
            Some(value) => value,
            None => {
                self.missing
                    .push(format!("--{flag_name} ({ENV_PREFIX}{name})"));
                String::new()
            }
        }
    }

    fn finish(self) -> Result<()> {
        if self.missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::config(format!(
                "missing required settings: {}",
                self.missing.join(", ")
            )))
        }
    }
}

fn resolve_common<E: Fn(&str) -> Option<String>>(
    resolver: &mut Resolver<'_, E>,
    args: &ConnectionArgs,
) -> Result<(ConnectionConfig, StoreConfig, PathBuf)> {
    let file = resolver.file;

    let database = resolver.required("POSTGRES_DB", "postgres-db", args.postgres_db.as_deref(), file.postgres_db.as_deref());
    let user = resolver.required("POSTGRES_USER", "postgres-user", args.postgres_user.as_deref(), file.postgres_user.as_deref());
    let password = resolver.required(
        "POSTGRES_PASSWORD",
        "postgres-password",
        args.postgres_password.as_deref(),
        file.postgres_password.as_deref(),
    );
    let host = resolver
        .optional("POSTGRES_HOST", args.postgres_host.as_deref(), file.postgres_host.as_deref())
        .unwrap_or_else(|| DEFAULT_POSTGRES_HOST.to_string());
    let file_port = file.postgres_port.map(|p| p.to_string());
    let port = resolver.optional("POSTGRES_PORT", args.postgres_port.as_deref(), file_port.as_deref());

    let bucket = resolver.required("AWS_S3_BUCKET", "s3-bucket", args.s3_bucket.as_deref(), file.s3_bucket.as_deref());
    let region = resolver.required("AWS_REGION", "aws-region", args.aws_region.as_deref(), file.aws_region.as_deref());
    let access_key_id = resolver.required(
        "AWS_ACCESS_KEY_ID",
        "aws-access-key-id",
        args.aws_access_key_id.as_deref(),
        file.aws_access_key_id.as_deref(),
    );
    let secret_access_key = resolver.required(
        "AWS_SECRET_ACCESS_KEY",
        "aws-secret-access-key",
        args.aws_secret_access_key.as_deref(),
        file.aws_secret_access_key.as_deref(),
    );
    let endpoint = resolver.optional("AWS_S3_ENDPOINT", args.s3_endpoint.as_deref(), file.s3_endpoint.as_deref());

    let flag_staging = args.staging_dir.as_ref().map(|p| p.to_string_lossy().into_owned());
    let file_staging = file.staging_dir.as_ref().map(|p| p.to_string_lossy().into_owned());
    let staging_dir = resolver
        .optional("STAGING_DIR", flag_staging.as_deref(), file_staging.as_deref())
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir);

    let port = match port {
        Some(raw) => raw.parse::<u16>().map_err(|_| {
            AppError::config(format!("postgres port must be a number between 0 and 65535, got '{raw}'"))
        })?,
        None => DEFAULT_POSTGRES_PORT,
    };

    if let Some(endpoint) = &endpoint {
        validate_endpoint(endpoint)?;
    }

    Ok((
        ConnectionConfig {
            host,
            port,
            user,
            password,
            database,
        },
        StoreConfig {
            bucket,
            region,
            endpoint,
            access_key_id,
            secret_access_key,
        },
        staging_dir,
    ))
}

fn validate_endpoint(endpoint: &str) -> Result<()> {
    let parsed = Url::parse(endpoint)
        .map_err(|e| AppError::config(format!("invalid S3 endpoint '{endpoint}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(AppError::config(format!(
            "S3 endpoint must use http or https, got '{other}'"
        ))),
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(AppError::config(format!(
            "{ENV_PREFIX}{name} must be true or false, got '{raw}'"
        ))),
    }
}

/// Resolve and validate everything the `backup` subcommand needs.
///
/// Nothing here touches the network or spawns a process, so an invalid
/// combination (such as `--restore-on-startup` without `--schedule`) is
/// rejected before any work starts.
pub fn resolve_backup_settings<E: Fn(&str) -> Option<String>>(
    args: &BackupArgs,
    file: &RawJsonConfig,
    env: E,
) -> Result<BackupSettings> {
    let mut resolver = Resolver::new(env, file);

    let schedule = resolver.optional("SCHEDULE", args.schedule.as_deref(), file.schedule.as_deref());
    let restore_on_startup = match (resolver.env)(&format!("{ENV_PREFIX}RESTORE_ON_STARTUP")).filter(|v| !v.is_empty()) {
        Some(raw) => parse_bool("RESTORE_ON_STARTUP", &raw)?,
        None => args.restore_on_startup || file.restore_on_startup.unwrap_or(false),
    };

    if restore_on_startup && schedule.is_none() {
        return Err(AppError::config(
            "the --restore-on-startup flag can only be used if --schedule is set",
        ));
    }

    let file_keep_days = file.keep_days.map(|d| d.to_string());
    let keep_days = match resolver.optional("KEEP_DAYS", args.keep_days.as_deref(), file_keep_days.as_deref()) {
        Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
            AppError::config(format!("keep-days must be an integer, got '{raw}'"))
        })?,
        None => 0,
    };

    let extra_args = resolver
        .optional("PGDUMP_EXTRA_OPTS", args.pgdump_extra_opts.as_deref(), file.pgdump_extra_opts.as_deref())
        .map(|raw| split_extra_opts(&raw))
        .unwrap_or_default();

    let (connection, store, staging_dir) = resolve_common(&mut resolver, &args.connection)?;
    resolver.finish()?;

    let schedule = match schedule {
        Some(raw) => {
            let cron = CronSchedule::parse(&raw)?;
            if cron.next_after(&Local::now()).is_none() {
                return Err(AppError::config(format!(
                    "schedule '{cron}' never fires"
                )));
            }
            Some(ScheduleSpec {
                cron,
                restore_on_startup,
            })
        }
        None => None,
    };

    Ok(BackupSettings {
        connection,
        store,
        staging_dir,
        schedule,
        keep_days,
        extra_args,
    })
}

/// Resolve and validate everything the `restore` subcommand needs.
pub fn resolve_restore_settings<E: Fn(&str) -> Option<String>>(
    args: &RestoreArgs,
    file: &RawJsonConfig,
    env: E,
) -> Result<RestoreSettings> {
    if !args.latest {
        return Err(AppError::config(
            "restore needs --latest; selecting a specific backup is not supported",
        ));
    }
    let mut resolver = Resolver::new(env, file);
    let (connection, store, staging_dir) = resolve_common(&mut resolver, &args.connection)?;
    resolver.finish()?;

    Ok(RestoreSettings {
        connection,
        store,
        staging_dir,
    })
}

impl BackupSettings {
    /// Settings for the one-shot restore run before the first scheduled tick.
    pub fn restore_settings(&self) -> RestoreSettings {
        RestoreSettings {
            connection: self.connection.clone(),
            store: self.store.clone(),
            staging_dir: self.staging_dir.clone(),
        }
    }
}
