pub mod buffer;
pub mod primitive;
pub mod texture;
pub mod writer;

pub use buffer::{BufferBuilder, IndexWidth};
pub use primitive::{AssemblyStats, PrimitiveAssembler};
pub use texture::TexturePacker;
pub use writer::{build_glb, write_glb};

/// JSON document plus the single binary buffer it describes.
///
/// Each conversion owns exactly one model.
#[derive(Debug)]
pub struct Model {
    pub root: gltf_json::Root,
    pub buffer: BufferBuilder,
}

impl Model {
    pub fn new() -> Self {
        Self {
            root: gltf_json::Root {
                asset: gltf_json::Asset {
                    version: "2.0".into(),
                    generator: Some(concat!("mesh2glb ", env!("CARGO_PKG_VERSION")).into()),
                    ..Default::default()
                },
                ..Default::default()
            },
            buffer: BufferBuilder::new(),
        }
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}
