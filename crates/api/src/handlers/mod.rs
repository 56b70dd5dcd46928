pub mod generation;
pub mod history;
pub mod jobs;
pub mod prompts;
pub mod sessions;
