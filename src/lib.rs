#![forbid(unsafe_code)]

pub mod blur;
pub mod composite;
pub mod compositor;
pub mod core;
pub mod editor;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod raster;
pub mod store;
pub mod surface;
pub mod text;

pub use crate::compositor::{CompositeInputs, compose_frame};
pub use crate::core::{CanvasGeometry, PREVIEW_MAX_HEIGHT, PREVIEW_MAX_WIDTH, Point, Rect, Vec2};
pub use crate::editor::{EXPORT_FILE_NAME, Editor, EditorConfig, MAX_UPLOAD_BYTES};
pub use crate::error::{UnderlayError, UnderlayResult};
pub use crate::model::{DUPLICATE_OFFSET, FontStyle, Rgb8, TextAlign, TextLayer, TextLayerPatch};
pub use crate::pipeline::{BackgroundRemover, ImagePipeline, PipelineStatus};
pub use crate::raster::{PreparedImage, Raster, decode_image, encode_png};
pub use crate::store::TextLayerStore;
pub use crate::surface::{DragState, InteractiveSurface, PointerEvent};
pub use crate::text::{FontCatalog, ShapedLayer, TextBrush};
