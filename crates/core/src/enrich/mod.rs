pub mod merge;
pub mod pipeline;
pub mod prompt;
