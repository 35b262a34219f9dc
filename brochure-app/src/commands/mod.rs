pub mod brochure;
pub mod explain;
pub mod joke;
