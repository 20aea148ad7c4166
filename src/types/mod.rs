pub mod bounds;
pub mod material;
pub mod scene;

pub use bounds::BoundingBox;
pub use material::MaterialSettings;
pub use scene::{
    DrawMode, Geometry, IndexList, PixelFormat, PrimitiveSet, SceneNode, TextureImage, TextureRef,
};
