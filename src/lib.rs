pub mod collect;
pub mod config;
pub mod error;
pub mod glb;
pub mod ingestion;
pub mod pipeline;
pub mod progress;
pub mod transform;
pub mod types;

pub use collect::{CollectOptions, CoordinateTransform};
pub use config::{ConvertConfig, Georeference, TextureConfig};
pub use error::{ConvertError, Result};
pub use pipeline::{convert_scene, Conversion, ConversionOutcome, Pipeline};
pub use progress::{NoProgress, ProgressSink, TracingProgress};
