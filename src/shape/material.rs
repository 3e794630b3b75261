use std::fmt::Debug;
use std::sync::Arc;

/// An opaque surface material handle.
///
/// The mesh shape only stores and returns materials; their meaning lives
/// in the surrounding engine. The fallback for meshes without a material
/// list is injected through the settings rather than read from a global.
pub trait IPhysicsMaterial: Debug + Send + Sync {
    /// Name for debugging purposes.
    fn debug_name(&self) -> &str {
        "Unknown"
    }
}

/// Shared material handle.
pub type PhysicsMaterialRef = Arc<dyn IPhysicsMaterial>;

/// Material used when a mesh carries no material list.
#[derive(Debug, Default)]
pub struct DefaultPhysicsMaterial;

impl IPhysicsMaterial for DefaultPhysicsMaterial {
    fn debug_name(&self) -> &str {
        "Default"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_material_is_shareable() {
        let material: PhysicsMaterialRef = Arc::new(DefaultPhysicsMaterial);
        let clone = material.clone();
        assert_eq!(clone.debug_name(), "Default");
    }
}
