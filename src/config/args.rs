// pgs3/src/config/args.rs
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Backup and restore PostgreSQL databases to/from S3
///
/// Every connection and storage flag can also be set through a `PGS3_<NAME>`
/// environment variable (e.g. `PGS3_POSTGRES_DB`); the environment wins.
#[derive(Parser, Debug)]
#[command(name = "pgs3")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Optional JSON file with default settings (lowest precedence)
    #[arg(long = "config", global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a backup and upload it to S3, once or on a cron schedule
    Backup(BackupArgs),
    /// Restore a backup from S3 (drops existing objects in the target database)
    Restore(RestoreArgs),
}

/// Flags shared by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// PostgreSQL database name [env: PGS3_POSTGRES_DB] (required)
    #[arg(short = 'd', long = "postgres-db")]
    pub postgres_db: Option<String>,

    /// PostgreSQL user [env: PGS3_POSTGRES_USER] (required)
    #[arg(short = 'U', long = "postgres-user")]
    pub postgres_user: Option<String>,

    /// PostgreSQL password [env: PGS3_POSTGRES_PASSWORD] (required)
    #[arg(short = 'P', long = "postgres-password")]
    pub postgres_password: Option<String>,

    /// PostgreSQL host [env: PGS3_POSTGRES_HOST] (default: localhost)
    #[arg(short = 'H', long = "postgres-host")]
    pub postgres_host: Option<String>,

    /// PostgreSQL port [env: PGS3_POSTGRES_PORT] (default: 5432)
    #[arg(short = 'p', long = "postgres-port")]
    pub postgres_port: Option<String>,

    /// Custom S3 endpoint, e.g. a MinIO URL [env: PGS3_AWS_S3_ENDPOINT]
    #[arg(long = "s3-endpoint")]
    pub s3_endpoint: Option<String>,

    /// S3 bucket name [env: PGS3_AWS_S3_BUCKET] (required)
    #[arg(short = 'b', long = "s3-bucket")]
    pub s3_bucket: Option<String>,

    /// Region the bucket lives in [env: PGS3_AWS_REGION] (required)
    #[arg(short = 'r', long = "aws-region")]
    pub aws_region: Option<String>,

    /// Access key id [env: PGS3_AWS_ACCESS_KEY_ID] (required)
    #[arg(long = "aws-access-key-id")]
    pub aws_access_key_id: Option<String>,

    /// Secret access key [env: PGS3_AWS_SECRET_ACCESS_KEY] (required)
    #[arg(long = "aws-secret-access-key")]
    pub aws_secret_access_key: Option<String>,

    /// Directory holding dump files while they are in flight [env: PGS3_STAGING_DIR]
    #[arg(long = "staging-dir", value_name = "DIR")]
    pub staging_dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct BackupArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Cron schedule for periodic backups, e.g. '0 0 * * *' [env: PGS3_SCHEDULE]
    #[arg(long = "schedule")]
    pub schedule: Option<String>,

    /// Restore the latest backup before the first scheduled run (requires --schedule)
    #[arg(long = "restore-on-startup")]
    pub restore_on_startup: bool,

    /// Delete backups older than this many days after each upload [env: PGS3_KEEP_DAYS]
    #[arg(long = "keep-days", allow_hyphen_values = true)]
    pub keep_days: Option<String>,

    /// Extra options appended to pg_dump, split on spaces [env: PGS3_PGDUMP_EXTRA_OPTS]
    #[arg(long = "pgdump-extra-opts", allow_hyphen_values = true)]
    pub pgdump_extra_opts: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RestoreArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Restore the most recently uploaded backup
    #[arg(long = "latest", required = true)]
    pub latest: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_scheduled_backup_flags() {
        let cli = Cli::try_parse_from([
            "pgs3",
            "backup",
            "-d",
            "app",
            "--schedule",
            "0 3 * * *",
            "--restore-on-startup",
            "--keep-days",
            "7",
            "--pgdump-extra-opts",
            "--no-owner --schema=public",
        ])
        .expect("parse");

        let Command::Backup(args) = cli.command else {
            panic!("expected backup subcommand");
        };
        assert_eq!(args.connection.postgres_db.as_deref(), Some("app"));
        assert_eq!(args.schedule.as_deref(), Some("0 3 * * *"));
        assert!(args.restore_on_startup);
        assert_eq!(args.keep_days.as_deref(), Some("7"));
        assert_eq!(
            args.pgdump_extra_opts.as_deref(),
            Some("--no-owner --schema=public")
        );
    }

    #[test]
    fn restore_requires_latest_flag() {
        assert!(Cli::try_parse_from(["pgs3", "restore", "-d", "app"]).is_err());
        let cli = Cli::try_parse_from(["pgs3", "restore", "--latest"]).expect("parse");
        assert!(matches!(cli.command, Command::Restore(RestoreArgs { latest: true, .. })));
    }
}
