use std::sync::Arc;

/// Pixel layout of a source texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Luminance,
    Rgb,
    Bgr,
    Rgba,
    Bgra,
    /// Any layout the packer cannot normalize (compressed, float, ...).
    Other(u8),
}

impl PixelFormat {
    /// Bytes per pixel, or `None` for layouts that cannot be read directly.
    pub fn channels(self) -> Option<usize> {
        match self {
            PixelFormat::Luminance => Some(1),
            PixelFormat::Rgb | PixelFormat::Bgr => Some(3),
            PixelFormat::Rgba | PixelFormat::Bgra => Some(4),
            PixelFormat::Other(_) => None,
        }
    }
}

/// Decoded texture pixels as delivered by an ingestion adapter.
#[derive(Debug, Clone)]
pub struct TextureImage {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Bytes between the starts of consecutive rows. May exceed
    /// `width * channels` when rows are padded.
    pub row_stride: usize,
    pub data: Vec<u8>,
}

impl TextureImage {
    /// Tightly packed image (row stride = width * channels).
    pub fn new(
        name: impl Into<String>,
        width: u32,
        height: u32,
        format: PixelFormat,
        data: Vec<u8>,
    ) -> Self {
        let row_stride = format.channels().unwrap_or(0) * width as usize;
        Self {
            name: name.into(),
            width,
            height,
            format,
            row_stride,
            data,
        }
    }
}

/// Shared handle; identity is the allocation, not the pixel contents.
pub type TextureRef = Arc<TextureImage>;

/// Draw topology of a primitive set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawMode {
    Points,
    Lines,
    LineLoop,
    LineStrip,
    Triangles,
    TriangleStrip,
    TriangleFan,
    Quads,
    QuadStrip,
    Polygon,
}

/// Explicit index list, keeping the width the source delivered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexList {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
}

impl IndexList {
    pub fn len(&self) -> usize {
        match self {
            IndexList::U8(v) => v.len(),
            IndexList::U16(v) => v.len(),
            IndexList::U32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> Box<dyn Iterator<Item = u32> + '_> {
        match self {
            IndexList::U8(v) => Box::new(v.iter().map(|&i| u32::from(i))),
            IndexList::U16(v) => Box::new(v.iter().map(|&i| u32::from(i))),
            IndexList::U32(v) => Box::new(v.iter().copied()),
        }
    }
}

/// One draw call over a geometry's vertex arrays.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimitiveSet {
    /// Contiguous vertex range `first..first + count`.
    DrawArrays { mode: DrawMode, first: u32, count: u32 },
    /// Explicit index list into the vertex arrays.
    DrawElements { mode: DrawMode, indices: IndexList },
}

impl PrimitiveSet {
    pub fn mode(&self) -> DrawMode {
        match self {
            PrimitiveSet::DrawArrays { mode, .. } | PrimitiveSet::DrawElements { mode, .. } => {
                *mode
            }
        }
    }
}

/// Leaf geometry: parallel vertex arrays plus the draw calls over them.
#[derive(Debug, Clone, Default)]
pub struct Geometry {
    pub name: String,
    pub positions: Vec<[f32; 3]>,
    /// Empty, or one normal per position.
    pub normals: Vec<[f32; 3]>,
    /// Empty, or one UV per position.
    pub texcoords: Vec<[f32; 2]>,
    pub primitive_sets: Vec<PrimitiveSet>,
    pub texture: Option<TextureRef>,
}

impl Geometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Indexed triangle list over the given positions.
    pub fn triangle_soup(name: impl Into<String>, positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            positions,
            primitive_sets: vec![PrimitiveSet::DrawElements {
                mode: DrawMode::Triangles,
                indices: IndexList::U32(indices),
            }],
            ..Default::default()
        }
    }
}

/// Hierarchical scene graph handed to the collector.
#[derive(Debug, Clone)]
pub enum SceneNode {
    Group(Vec<SceneNode>),
    /// Paged level-of-detail node: the geometry beneath it is the tier
    /// being converted, `tier_files` names the deeper tiers on disk.
    PagedLod {
        children: Vec<SceneNode>,
        tier_files: Vec<String>,
    },
    Geometry(Geometry),
}
