pub mod aabox4;
pub mod active_edges;
pub mod bounding_box;
pub mod half_float;
pub mod indexed_triangle;
pub mod indexify;
pub mod oriented_box;
pub mod ray;
