// pgs3/src/backup/db_dump.rs
use chrono::NaiveDateTime;
use std::ffi::OsString;
use std::path::Path;

use crate::config::ConnectionConfig;

/// File name of a dump taken at `taken_at`: `<database>_<YYYY-MM-DDTHH:MM:SS>.dump`.
/// The timestamp keeps object keys unique at second resolution.
pub fn dump_file_name(database: &str, taken_at: &NaiveDateTime) -> String {
    format!("{}_{}.dump", database, taken_at.format("%Y-%m-%dT%H:%M:%S"))
}

/// Arguments for `pg_dump`: the fixed connection flags first, then the
/// user-supplied extras verbatim.
pub fn dump_args(conn: &ConnectionConfig, outfile: &Path, extra_args: &[String]) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--format=custom".into(),
        "-h".into(),
        conn.host.clone().into(),
        "-p".into(),
        conn.port.to_string().into(),
        "-U".into(),
        conn.user.clone().into(),
        "-d".into(),
        conn.database.clone().into(),
        "-f".into(),
        outfile.as_os_str().to_owned(),
    ];
    args.extend(extra_args.iter().map(OsString::from));
    args
}

/// Split the free-text `--pgdump-extra-opts` value on spaces.
///
/// There is no quoting support: `--exclude-table="a b"` becomes two tokens.
/// Runs of spaces do not produce empty arguments.
pub fn split_extra_opts(raw: &str) -> Vec<String> {
    raw.split(' ')
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}
