pub mod converter;
pub mod core;
pub mod fees;
pub mod math;
pub mod vault;
