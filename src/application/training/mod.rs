pub mod dataset;
pub mod import;
pub mod model;
pub mod scheduler;
pub mod trainer;

pub use dataset::{GAMES_COLLECTION, GameRow};
pub use import::{ImportSummary, import_games};
pub use model::ModelEntry;
pub use scheduler::{TrainingReason, TrainingRecord, TrainingScheduler};
pub use trainer::Trainer;
