use gltf_json::accessor::{ComponentType, GenericComponentType, Type as AccessorType};
use gltf_json::buffer::Target;
use gltf_json::validation::{Checked, USize64};
use gltf_json::Index;

use crate::types::BoundingBox;

/// Width of the components in an index accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexWidth {
    U8,
    U16,
    U32,
}

impl IndexWidth {
    /// Narrowest width able to hold `max`. Byte indices stop at 127.
    pub fn for_max(max: u32) -> Self {
        if max <= 127 {
            IndexWidth::U8
        } else if max <= u32::from(u16::MAX) {
            IndexWidth::U16
        } else {
            IndexWidth::U32
        }
    }

    pub fn component_type(self) -> ComponentType {
        match self {
            IndexWidth::U8 => ComponentType::U8,
            IndexWidth::U16 => ComponentType::U16,
            IndexWidth::U32 => ComponentType::U32,
        }
    }
}

/// Float attribute accessor together with the bounds written into it.
#[derive(Debug, Clone, Copy)]
pub struct AttributeAccessor<const N: usize> {
    pub accessor: Index<gltf_json::Accessor>,
    pub min: [f32; N],
    pub max: [f32; N],
}

impl AttributeAccessor<3> {
    pub fn bounds(&self) -> BoundingBox {
        BoundingBox {
            min: self.min.map(f64::from),
            max: self.max.map(f64::from),
        }
    }
}

/// The single binary buffer of a model, growing one view at a time.
///
/// Every view starts on a 4-byte boundary; the bytes between views are zero.
#[derive(Debug, Default)]
pub struct BufferBuilder {
    data: Vec<u8>,
}

impl BufferBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append raw bytes as a new view and pad the buffer to 4 bytes.
    pub fn append_bytes(
        &mut self,
        root: &mut gltf_json::Root,
        bytes: &[u8],
        target: Option<Target>,
    ) -> Index<gltf_json::buffer::View> {
        let byte_offset = self.data.len();
        self.data.extend_from_slice(bytes);
        while self.data.len() % 4 != 0 {
            self.data.push(0);
        }

        root.push(gltf_json::buffer::View {
            buffer: Index::new(0),
            byte_length: USize64::from(bytes.len()),
            byte_offset: Some(USize64::from(byte_offset)),
            byte_stride: None,
            name: None,
            target: target.map(Checked::Valid),
            extensions: Default::default(),
            extras: Default::default(),
        })
    }

    /// Append plain-old-data items as a new view.
    pub fn append<T: bytemuck::Pod>(
        &mut self,
        root: &mut gltf_json::Root,
        items: &[T],
        target: Option<Target>,
    ) -> Index<gltf_json::buffer::View> {
        self.append_bytes(root, bytemuck::cast_slice(items), target)
    }

    /// Write a VEC2/VEC3 float attribute, computing its bounds in the same pass.
    pub fn push_attribute<const N: usize>(
        &mut self,
        root: &mut gltf_json::Root,
        items: &[[f32; N]],
    ) -> AttributeAccessor<N> {
        let mut min = [f32::INFINITY; N];
        let mut max = [f32::NEG_INFINITY; N];
        for item in items {
            for i in 0..N {
                min[i] = min[i].min(item[i]);
                max[i] = max[i].max(item[i]);
            }
        }

        let type_ = match N {
            1 => AccessorType::Scalar,
            2 => AccessorType::Vec2,
            3 => AccessorType::Vec3,
            _ => AccessorType::Vec4,
        };

        let view = self.append(root, items.as_flattened(), Some(Target::ArrayBuffer));
        let accessor = root.push(gltf_json::Accessor {
            buffer_view: Some(view),
            byte_offset: Some(USize64(0)),
            count: USize64::from(items.len()),
            component_type: Checked::Valid(GenericComponentType(ComponentType::F32)),
            type_: Checked::Valid(type_),
            min: Some(serde_json::json!(min.as_slice())),
            max: Some(serde_json::json!(max.as_slice())),
            name: None,
            normalized: false,
            sparse: None,
            extensions: Default::default(),
            extras: Default::default(),
        });

        AttributeAccessor { accessor, min, max }
    }

    /// Write an index list at the narrowest width its maximum allows.
    pub fn push_indices(
        &mut self,
        root: &mut gltf_json::Root,
        indices: &[u32],
    ) -> (Index<gltf_json::Accessor>, IndexWidth) {
        let min = indices.iter().copied().min().unwrap_or(0);
        let max = indices.iter().copied().max().unwrap_or(0);
        let width = IndexWidth::for_max(max);

        let view = match width {
            IndexWidth::U8 => {
                let narrow: Vec<u8> = indices.iter().map(|&i| i as u8).collect();
                self.append(root, &narrow, Some(Target::ElementArrayBuffer))
            }
            IndexWidth::U16 => {
                let narrow: Vec<u16> = indices.iter().map(|&i| i as u16).collect();
                self.append(root, &narrow, Some(Target::ElementArrayBuffer))
            }
            IndexWidth::U32 => self.append(root, indices, Some(Target::ElementArrayBuffer)),
        };

        let accessor = root.push(gltf_json::Accessor {
            buffer_view: Some(view),
            byte_offset: Some(USize64(0)),
            count: USize64::from(indices.len()),
            component_type: Checked::Valid(GenericComponentType(width.component_type())),
            type_: Checked::Valid(AccessorType::Scalar),
            min: Some(serde_json::json!([min])),
            max: Some(serde_json::json!([max])),
            name: None,
            normalized: false,
            sparse: None,
            extensions: Default::default(),
            extras: Default::default(),
        });

        (accessor, width)
    }

    /// Embed an encoded image; image views carry no target.
    pub fn push_image(
        &mut self,
        root: &mut gltf_json::Root,
        encoded: &[u8],
    ) -> Index<gltf_json::buffer::View> {
        self.append_bytes(root, encoded, None)
    }

    /// Register the buffer with the root and hand back its bytes.
    pub fn finish(self, root: &mut gltf_json::Root) -> Vec<u8> {
        root.push(gltf_json::Buffer {
            byte_length: USize64::from(self.data.len()),
            uri: None,
            name: None,
            extensions: Default::default(),
            extras: Default::default(),
        });
        self.data
    }
}
