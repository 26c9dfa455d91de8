pub mod input;
pub mod training;
