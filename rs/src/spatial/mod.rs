pub mod geometry;
pub mod search;
pub mod simplify;
