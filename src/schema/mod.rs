pub mod passage;
pub mod value;
