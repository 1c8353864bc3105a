mod logic;
pub(crate) mod db_dump; // pg_dump arguments and file naming
pub(crate) mod retention; // cutoff arithmetic and expiry filtering

pub use logic::BackupOrchestrator;
