use std::{io::Cursor, path::Path};

use underlay::{
    BackgroundRemover, CompositeInputs, Editor, EditorConfig, PipelineStatus, Point,
    UnderlayError, UnderlayResult, compose_frame,
};

/// Cutout that keeps the whole subject: returns the original image.
struct KeepAllRemover;
impl BackgroundRemover for KeepAllRemover {
    fn cutout(&self, image_bytes: &[u8]) -> UnderlayResult<Vec<u8>> {
        Ok(image_bytes.to_vec())
    }
}

/// Cutout that removes everything: a fully transparent image of the same
/// dimensions, so text layers stay visible end to end.
struct RemoveAllRemover;
impl BackgroundRemover for RemoveAllRemover {
    fn cutout(&self, image_bytes: &[u8]) -> UnderlayResult<Vec<u8>> {
        let src = image::load_from_memory(image_bytes)
            .map_err(|e| UnderlayError::processing(e.to_string()))?;
        let clear = image::RgbaImage::from_pixel(src.width(), src.height(), image::Rgba([0; 4]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(clear)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|e| UnderlayError::processing(e.to_string()))?;
        Ok(buf)
    }
}

fn solid_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .unwrap();
    buf
}

fn font_config() -> Option<EditorConfig> {
    let candidates = [
        "/usr/share/fonts/truetype/dejavu",
        "/usr/share/fonts/TTF",
        "/usr/share/fonts/truetype/liberation",
        "/Library/Fonts",
    ];
    let dir = candidates.iter().find(|dir| {
        let mut probe = underlay::FontCatalog::new();
        probe.load_fonts_from_dir(Path::new(dir)) > 0
    })?;
    let mut config = EditorConfig::default();
    config.font_dirs = vec![Path::new(dir).to_path_buf()];
    Some(config)
}

#[test]
fn preview_and_export_produce_identical_pixels() {
    let mut editor = Editor::new(KeepAllRemover, EditorConfig::default()).unwrap();
    editor.upload(&solid_png(64, 48, [120, 60, 30, 255])).unwrap();
    editor.remove_text("text-1");

    let preview = editor.render_preview().unwrap().expect("pending render");
    assert_eq!(preview.width, 64);
    assert_eq!(preview.height, 48);

    let exported = image::load_from_memory(&editor.export_png().unwrap())
        .unwrap()
        .to_rgba8();
    assert_eq!(exported.dimensions(), (64, 48));
    // Everything is opaque, so premultiplied preview bytes compare directly.
    assert_eq!(exported.into_raw(), preview.data);
}

#[test]
fn removing_the_only_layer_leaves_a_two_image_stack() {
    let mut editor = Editor::new(KeepAllRemover, EditorConfig::default()).unwrap();
    editor.upload(&solid_png(32, 24, [5, 10, 15, 255])).unwrap();
    editor.remove_text("text-1");
    assert!(editor.store().layers().is_empty());

    let frame = editor.render_preview().unwrap().expect("pending render");

    let mut fonts = underlay::FontCatalog::new();
    let reference = compose_frame(
        &CompositeInputs {
            width: 32,
            height: 24,
            background: editor.pipeline().background(),
            layers: &[],
            cutout: editor.pipeline().foreground_cutout(),
        },
        &mut fonts,
    )
    .unwrap();

    assert_eq!(frame, reference);
}

#[test]
fn export_failure_leaves_editing_state_untouched() {
    // No fonts registered: the default layer cannot be resolved at export.
    let mut editor = Editor::new(KeepAllRemover, EditorConfig::default()).unwrap();
    editor.upload(&solid_png(16, 16, [0, 0, 0, 255])).unwrap();

    let err = editor.export_png().unwrap_err();
    assert!(matches!(err, UnderlayError::ExportFailed(_)));

    // Editing state survives; dropping the text layer lets a retry succeed.
    assert_eq!(editor.store().layers().len(), 1);
    assert_eq!(editor.pipeline().status(), PipelineStatus::Ready);
    editor.remove_text("text-1");
    assert!(editor.export_png().is_ok());
}

#[test]
fn upload_scenario_places_the_default_layer_at_its_anchor() {
    let Some(config) = font_config() else {
        return;
    };
    let mut editor = Editor::new(RemoveAllRemover, config).unwrap();
    editor
        .upload(&solid_png(1200, 800, [20, 20, 20, 255]))
        .unwrap();

    // Default layer: "edit", size 300, white, weight 700, at (100, 100).
    let layer = &editor.store().layers()[0];
    assert_eq!(layer.position, Point::new(100.0, 100.0));
    assert_eq!(layer.font_size, 300.0);
    assert_eq!(layer.font_weight, 700);

    let frame = editor.render_preview().unwrap().expect("pending render");
    assert_eq!(frame.width, 1200);
    assert_eq!(frame.height, 800);

    let mut ink_in_box = false;
    for y in 0..frame.height {
        for x in 0..frame.width {
            let idx = ((y * frame.width + x) * 4) as usize;
            let px: [u8; 4] = frame.data[idx..idx + 4].try_into().unwrap();
            let is_background = px == [20, 20, 20, 255];
            if x < 100 || y < 100 {
                assert!(
                    is_background,
                    "ink above or left of the layer anchor at ({x}, {y})"
                );
            } else if !is_background {
                ink_in_box = true;
            }
        }
    }
    assert!(ink_in_box, "expected glyph coverage below-right of (100, 100)");
}

#[test]
fn keep_all_cutout_hides_text_in_the_export() {
    let Some(config) = font_config() else {
        return;
    };
    // The cutout is the original opaque image, so it occludes all text.
    let mut editor = Editor::new(KeepAllRemover, config).unwrap();
    editor
        .upload(&solid_png(400, 300, [20, 20, 20, 255]))
        .unwrap();

    let exported = image::load_from_memory(&editor.export_png().unwrap())
        .unwrap()
        .to_rgba8();
    assert!(
        exported
            .pixels()
            .all(|px| px.0 == [20, 20, 20, 255])
    );
}
