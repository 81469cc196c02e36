pub mod clock;
pub mod job;
pub mod naming;

pub use clock::{Clock, FixedClock, SystemClock};
pub use job::{BackupJob, DatabaseParams, DumpFormat};
pub use naming::{artifact_name, artifact_path, TIMESTAMP_FORMAT};
