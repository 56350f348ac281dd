use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::{
    compositor::{CompositeInputs, compose_frame},
    error::{UnderlayError, UnderlayResult},
    model::TextLayerPatch,
    pipeline::{BackgroundRemover, ImagePipeline, PipelineStatus},
    raster::{Raster, encode_png},
    store::TextLayerStore,
    surface::{InteractiveSurface, PointerEvent},
    text::FontCatalog,
};

/// Fixed export filename, matching the product's download name.
pub const EXPORT_FILE_NAME: &str = "text-behind-object.png";

/// Soft cap on accepted uploads.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EditorConfig {
    pub max_upload_bytes: usize,
    /// Directories scanned for `.ttf`/`.otf`/`.ttc` files at startup.
    pub font_dirs: Vec<PathBuf>,
    pub export_file_name: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: MAX_UPLOAD_BYTES,
            font_dirs: Vec::new(),
            export_file_name: EXPORT_FILE_NAME.to_string(),
        }
    }
}

impl EditorConfig {
    pub fn validate(&self) -> UnderlayResult<()> {
        if self.max_upload_bytes == 0 {
            return Err(UnderlayError::validation("max_upload_bytes must be > 0"));
        }
        if self.export_file_name.trim().is_empty() {
            return Err(UnderlayError::validation(
                "export_file_name must be non-empty",
            ));
        }
        Ok(())
    }
}

/// Orchestrates one editing session: upload -> pipeline -> store -> surface,
/// plus the export action. Everything interesting happens in the parts it
/// wires together.
pub struct Editor<R: BackgroundRemover> {
    config: EditorConfig,
    remover: R,
    pipeline: ImagePipeline,
    store: TextLayerStore,
    surface: InteractiveSurface,
    fonts: FontCatalog,
}

impl<R: BackgroundRemover> Editor<R> {
    pub fn new(remover: R, config: EditorConfig) -> UnderlayResult<Self> {
        config.validate()?;

        let mut fonts = FontCatalog::new();
        for dir in &config.font_dirs {
            let registered = fonts.load_fonts_from_dir(dir);
            tracing::debug!(dir = %dir.display(), registered, "scanned font directory");
        }

        let mut store = TextLayerStore::new();
        let surface = InteractiveSurface::new();
        surface.attach(&mut store);

        Ok(Self {
            config,
            remover,
            pipeline: ImagePipeline::new(),
            store,
            surface,
            fonts,
        })
    }

    pub fn store(&self) -> &TextLayerStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TextLayerStore {
        &mut self.store
    }

    pub fn pipeline(&self) -> &ImagePipeline {
        &self.pipeline
    }

    pub fn surface(&self) -> &InteractiveSurface {
        &self.surface
    }

    pub fn fonts_mut(&mut self) -> &mut FontCatalog {
        &mut self.fonts
    }

    /// Whether upload controls should be enabled right now.
    pub fn can_upload(&self) -> bool {
        self.pipeline.status() != PipelineStatus::Loading
    }

    /// Validate and process a user-selected file.
    ///
    /// The canvas geometry is re-derived from the upload's natural
    /// dimensions, so the export canvas always matches them.
    pub fn upload(&mut self, file_bytes: &[u8]) -> UnderlayResult<()> {
        if !self.can_upload() {
            return Err(UnderlayError::validation(
                "upload is disabled while an image is processing",
            ));
        }
        if file_bytes.len() > self.config.max_upload_bytes {
            return Err(UnderlayError::validation(format!(
                "upload exceeds the {} byte limit",
                self.config.max_upload_bytes
            )));
        }
        if image::guess_format(file_bytes).is_err() {
            return Err(UnderlayError::validation(
                "unsupported file type: expected an image",
            ));
        }

        self.pipeline.process(&self.remover, file_bytes)?;

        let background = self
            .pipeline
            .background()
            .ok_or_else(|| UnderlayError::processing("pipeline ready without a background"))?;
        self.surface
            .set_output_size(background.width, background.height)?;
        Ok(())
    }

    pub fn add_text(&mut self) -> String {
        self.store.create()
    }

    pub fn update_text(&mut self, id: &str, patch: &TextLayerPatch) {
        self.store.update(id, patch);
    }

    pub fn remove_text(&mut self, id: &str) {
        self.store.remove(id);
    }

    pub fn duplicate_text(&mut self, id: &str) -> Option<String> {
        self.store.duplicate(id)
    }

    pub fn pointer_event(&mut self, event: PointerEvent) {
        self.surface
            .pointer_event(&mut self.store, &mut self.fonts, event);
    }

    /// Coalesced preview render; call once per display refresh.
    pub fn render_preview(&mut self) -> UnderlayResult<Option<Raster>> {
        self.surface
            .render_if_needed(&self.store, &self.pipeline, &mut self.fonts)
    }

    /// Render the current composition once, unthrottled, at full output
    /// resolution, and encode it as a PNG.
    ///
    /// Fonts gate the export: every referenced family must resolve before
    /// rendering starts. Any failure maps to `ExportFailed` and leaves the
    /// editing state untouched, so the user can simply retry.
    pub fn export_png(&mut self) -> UnderlayResult<Vec<u8>> {
        self.try_export().map_err(|e| match e {
            UnderlayError::ExportFailed(_) => e,
            other => UnderlayError::export(other.to_string()),
        })
    }

    fn try_export(&mut self) -> UnderlayResult<Vec<u8>> {
        let geometry = *self
            .surface
            .geometry()
            .ok_or_else(|| UnderlayError::export("no image uploaded yet"))?;

        self.fonts.ensure_ready(self.store.layers())?;

        let frame = compose_frame(
            &CompositeInputs {
                width: geometry.output_width,
                height: geometry.output_height,
                background: self.pipeline.background(),
                layers: self.store.layers(),
                cutout: self.pipeline.foreground_cutout(),
            },
            &mut self.fonts,
        )?;
        encode_png(&frame)
    }

    /// Write the export into `dir` under the fixed filename; returns the
    /// written path.
    pub fn export_to_file(&mut self, dir: &Path) -> UnderlayResult<PathBuf> {
        let png = self.export_png()?;
        let path = dir.join(&self.config.export_file_name);
        std::fs::write(&path, png)
            .with_context(|| format!("write export to '{}'", path.display()))
            .map_err(|e| UnderlayError::export(format!("{e:#}")))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::UnderlayResult;

    struct PassThroughRemover;
    impl BackgroundRemover for PassThroughRemover {
        fn cutout(&self, image_bytes: &[u8]) -> UnderlayResult<Vec<u8>> {
            Ok(image_bytes.to_vec())
        }
    }

    fn png_rgb(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(
                &mut std::io::Cursor::new(&mut buf),
                image::ImageFormat::Png,
            )
            .unwrap();
        buf
    }

    #[test]
    fn config_rejects_zero_upload_cap_and_empty_filename() {
        let mut config = EditorConfig::default();
        config.max_upload_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = EditorConfig::default();
        config.export_file_name = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn upload_rejects_oversized_and_non_image_files() {
        let mut editor = Editor::new(PassThroughRemover, EditorConfig::default()).unwrap();

        let err = editor.upload(b"plain text, not an image").unwrap_err();
        assert!(matches!(err, UnderlayError::Validation(_)));

        let mut config = EditorConfig::default();
        config.max_upload_bytes = 4;
        let mut editor = Editor::new(PassThroughRemover, config).unwrap();
        let err = editor.upload(&png_rgb(2, 2, [0, 0, 0, 255])).unwrap_err();
        assert!(matches!(err, UnderlayError::Validation(_)));
    }

    #[test]
    fn upload_establishes_geometry_from_natural_size() {
        let mut editor = Editor::new(PassThroughRemover, EditorConfig::default()).unwrap();
        editor.upload(&png_rgb(40, 30, [9, 9, 9, 255])).unwrap();

        let geometry = editor.surface().geometry().unwrap();
        assert_eq!(geometry.output_width, 40);
        assert_eq!(geometry.output_height, 30);
        assert_eq!(editor.pipeline().status(), PipelineStatus::Ready);
    }

    #[test]
    fn export_before_upload_fails_without_touching_state() {
        let mut editor = Editor::new(PassThroughRemover, EditorConfig::default()).unwrap();
        let err = editor.export_png().unwrap_err();
        assert!(matches!(err, UnderlayError::ExportFailed(_)));
        assert_eq!(editor.store().layers().len(), 1);
    }

    #[test]
    fn export_writes_the_fixed_filename() {
        let mut editor = Editor::new(PassThroughRemover, EditorConfig::default()).unwrap();
        editor.upload(&png_rgb(8, 6, [1, 2, 3, 255])).unwrap();
        editor.remove_text("text-1");

        let dir = std::env::temp_dir().join("underlay-export-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = editor.export_to_file(&dir).unwrap();
        assert_eq!(path.file_name().unwrap(), EXPORT_FILE_NAME);

        let decoded = image::load_from_memory(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(decoded.width(), 8);
        assert_eq!(decoded.height(), 6);
        std::fs::remove_file(&path).ok();
    }
}
