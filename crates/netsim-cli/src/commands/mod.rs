pub mod completions;
pub mod evaluate;
pub mod export;
pub mod validate;
