mod logic;
pub(crate) mod db_restore; // pg_restore arguments
pub(crate) mod latest; // latest-object selection

pub use logic::RestoreOrchestrator;
