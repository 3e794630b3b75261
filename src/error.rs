use thiserror::Error;

/// Failures that can occur while building a mesh shape from its settings.
///
/// Queries on a successfully built shape never fail; they report "no hit"
/// or an empty result instead.
#[derive(Debug, Error)]
pub enum MeshError {
    /// No triangles were supplied.
    #[error("need triangles to create a mesh shape")]
    EmptyInput,

    /// A triangle in the input has two or three identical vertex indices.
    #[error("triangle {0} is degenerate")]
    DegenerateTriangle(usize),

    /// A triangle references a vertex beyond the vertex list.
    #[error("triangle {triangle} component {component}: vertex index {index} is beyond vertex list (size: {vertex_count})")]
    IndexOutOfRange {
        triangle: usize,
        component: usize,
        index: u32,
        vertex_count: usize,
    },

    /// More materials than the per-triangle flag byte can address.
    #[error("supporting at most {limit} materials per mesh, got {count}")]
    TooManyMaterials { count: usize, limit: usize },

    /// A triangle references a material beyond the material list.
    #[error("triangle {triangle}: material index {index} is beyond material list (size: {material_count})")]
    MaterialIndexOutOfRange {
        triangle: usize,
        index: u32,
        material_count: usize,
    },

    /// No materials were supplied, so every triangle must use material index 0.
    #[error("no materials present, triangle {triangle} should have material index 0, got {index}")]
    MaterialsAbsentNonzeroIndex { triangle: usize, index: u32 },

    /// The builder tree could not be serialized.
    #[error("tree conversion failed: {0}")]
    TreeConversionFailed(String),

    /// The serialized tree needs more sub shape ID bits than are available.
    #[error("mesh is too big and exceeds the amount of available sub shape ID bits")]
    SubShapeIdOverflow,

    /// A stream operation failed while restoring a shape.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
