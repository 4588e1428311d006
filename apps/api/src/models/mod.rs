pub mod document;
pub mod geometry;
pub mod options;
