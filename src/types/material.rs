/// Surface parameters shared by every emitted material.
#[derive(Debug, Clone)]
pub struct MaterialSettings {
    /// Base color factor [r, g, b, a].
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    /// Tag materials with `KHR_materials_unlit`.
    pub unlit: bool,
}

impl Default for MaterialSettings {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            metallic: 0.0,
            roughness: 1.0,
            unlit: true,
        }
    }
}
