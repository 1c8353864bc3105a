// pgs3/src/restore/db_restore.rs
use std::ffi::OsString;
use std::path::Path;

use crate::config::ConnectionConfig;

/// Arguments for `pg_restore`. `--clean --if-exists` drops every object in
/// the dump from the target database before recreating it.
pub fn restore_args(conn: &ConnectionConfig, infile: &Path) -> Vec<OsString> {
    vec![
        "-h".into(),
        conn.host.clone().into(),
        "-p".into(),
        conn.port.to_string().into(),
        "-U".into(),
        conn.user.clone().into(),
        "-d".into(),
        conn.database.clone().into(),
        "--clean".into(),
        "--if-exists".into(),
        infile.as_os_str().to_owned(),
    ]
}
