pub mod collector;
pub mod material;
pub mod mesh_shape;
pub mod oracles;
pub mod shape_cast;
pub mod sub_shape_id;
