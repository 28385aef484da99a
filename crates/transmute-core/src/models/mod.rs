pub mod file;
pub mod job;
pub mod settings;

pub use file::{FileKind, FileRecord};
pub use job::{
    ConversionJob, ConversionParams, JobError, JobErrorKind, JobStats, JobStatus, Quality,
};
pub use settings::{AppSettings, SettingsUpdate, Theme};
