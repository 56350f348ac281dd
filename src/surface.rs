use std::{cell::Cell, rc::Rc};

use crate::{
    compositor::{CompositeInputs, compose_frame},
    core::{CanvasGeometry, Point, Rect, Vec2},
    error::UnderlayResult,
    model::{TextLayer, TextLayerPatch},
    pipeline::ImagePipeline,
    raster::Raster,
    store::TextLayerStore,
    text::FontCatalog,
};

/// Pointer input in preview-surface pixels. `Up` and `Leave` are handled
/// identically: losing the pointer always ends a drag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PointerEvent {
    Down { point: Point },
    Move { point: Point },
    Up,
    Leave,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        layer_id: String,
        /// Pointer-to-position offset captured on pointer-down, in output
        /// pixels, so the layer does not jump to the pointer.
        grab_offset: Vec2,
    },
}

/// The on-screen editing surface: owns canvas geometry, converts pointer
/// events into output space, drives drag-to-reposition, and coalesces
/// re-render requests.
///
/// The surface subscribes to the layer store; any store mutation (or an
/// explicit [`invalidate`](Self::invalidate) for image readiness changes)
/// marks a render pending. [`render_if_needed`](Self::render_if_needed)
/// collapses however many marks accumulated into a single compositor pass
/// over the state current at that moment, so rapid drags cost one redraw per
/// display refresh, not one per pointer event.
pub struct InteractiveSurface {
    geometry: Option<CanvasGeometry>,
    drag: DragState,
    render_pending: Rc<Cell<bool>>,
}

impl InteractiveSurface {
    pub fn new() -> Self {
        Self {
            geometry: None,
            drag: DragState::Idle,
            render_pending: Rc::new(Cell::new(true)),
        }
    }

    /// Subscribe this surface's render flag to `store` mutations.
    pub fn attach(&self, store: &mut TextLayerStore) {
        let flag = self.render_pending.clone();
        store.subscribe(Box::new(move || flag.set(true)));
    }

    /// Recompute geometry for a new upload's natural dimensions.
    pub fn set_output_size(&mut self, width: u32, height: u32) -> UnderlayResult<()> {
        self.geometry = Some(CanvasGeometry::for_output(width, height)?);
        self.invalidate();
        Ok(())
    }

    pub fn geometry(&self) -> Option<&CanvasGeometry> {
        self.geometry.as_ref()
    }

    pub fn drag_state(&self) -> &DragState {
        &self.drag
    }

    /// Mark a render pending without a store mutation (image readiness,
    /// font registration).
    pub fn invalidate(&self) {
        self.render_pending.set(true);
    }

    /// Feed one pointer event through the drag state machine.
    pub fn pointer_event(
        &mut self,
        store: &mut TextLayerStore,
        fonts: &mut FontCatalog,
        event: PointerEvent,
    ) {
        let Some(geometry) = self.geometry else {
            return;
        };

        match event {
            PointerEvent::Down { point } => {
                let output = geometry.surface_to_output(point);
                if let Some(layer_id) = hit_test(store.layers(), fonts, output)
                    && let Some(layer) = store.get(&layer_id)
                {
                    self.drag = DragState::Dragging {
                        grab_offset: output - layer.position,
                        layer_id,
                    };
                }
            }
            PointerEvent::Move { point } => {
                let DragState::Dragging {
                    layer_id,
                    grab_offset,
                } = &self.drag
                else {
                    return;
                };
                let output = geometry.surface_to_output(point);
                let position = geometry.clamp_to_output(output - *grab_offset);
                store.update(layer_id, &TextLayerPatch::position(position));
            }
            PointerEvent::Up | PointerEvent::Leave => {
                self.drag = DragState::Idle;
            }
        }
    }

    /// Run one compositor pass if anything changed since the last call.
    ///
    /// Renders at full output resolution (display downscale is the host's
    /// concern), which keeps the preview pixel-identical to an export of the
    /// same state. Best-effort with respect to fonts: unshapeable layers are
    /// skipped rather than waited for. Returns `None` when nothing is
    /// pending or no image has established the canvas geometry yet.
    pub fn render_if_needed(
        &mut self,
        store: &TextLayerStore,
        pipeline: &ImagePipeline,
        fonts: &mut FontCatalog,
    ) -> UnderlayResult<Option<Raster>> {
        if !self.render_pending.replace(false) {
            return Ok(None);
        }
        let Some(geometry) = self.geometry else {
            return Ok(None);
        };

        let frame = compose_frame(
            &CompositeInputs {
                width: geometry.output_width,
                height: geometry.output_height,
                background: pipeline.background(),
                layers: store.layers(),
                cutout: pipeline.foreground_cutout(),
            },
            fonts,
        )?;
        Ok(Some(frame))
    }
}

impl Default for InteractiveSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// Topmost layer whose axis-aligned bounding box contains `point`.
///
/// Layers are scanned in reverse paint order so overlaps pick the one
/// visually on top. Rotation is ignored: the box is axis-aligned regardless
/// of the layer's `rotation`. Layers that cannot be measured are skipped.
fn hit_test(layers: &[TextLayer], fonts: &mut FontCatalog, point: Point) -> Option<String> {
    for layer in layers.iter().rev() {
        let Some((width, height)) = fonts.measure(layer) else {
            continue;
        };
        let bounds = Rect::new(
            layer.position.x,
            layer.position.y,
            layer.position.x + width,
            layer.position.y + height,
        );
        if bounds.contains(point) {
            return Some(layer.id.clone());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointer_events_without_geometry_are_ignored() {
        let mut surface = InteractiveSurface::new();
        let mut store = TextLayerStore::new();
        let mut fonts = FontCatalog::new();
        surface.pointer_event(
            &mut store,
            &mut fonts,
            PointerEvent::Down {
                point: Point::new(10.0, 10.0),
            },
        );
        assert_eq!(*surface.drag_state(), DragState::Idle);
    }

    #[test]
    fn up_and_leave_both_end_a_drag() {
        let mut surface = InteractiveSurface::new();
        surface.set_output_size(100, 100).unwrap();
        surface.drag = DragState::Dragging {
            layer_id: "text-1".to_string(),
            grab_offset: Vec2::ZERO,
        };
        let mut store = TextLayerStore::new();
        let mut fonts = FontCatalog::new();

        surface.pointer_event(&mut store, &mut fonts, PointerEvent::Up);
        assert_eq!(*surface.drag_state(), DragState::Idle);

        surface.drag = DragState::Dragging {
            layer_id: "text-1".to_string(),
            grab_offset: Vec2::ZERO,
        };
        surface.pointer_event(&mut store, &mut fonts, PointerEvent::Leave);
        assert_eq!(*surface.drag_state(), DragState::Idle);
    }

    #[test]
    fn render_without_geometry_clears_the_pending_flag() {
        let mut surface = InteractiveSurface::new();
        let store = TextLayerStore::new();
        let pipeline = ImagePipeline::new();
        let mut fonts = FontCatalog::new();

        assert!(
            surface
                .render_if_needed(&store, &pipeline, &mut fonts)
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn store_mutations_schedule_exactly_one_render() {
        let mut surface = InteractiveSurface::new();
        surface.set_output_size(64, 48).unwrap();
        let mut store = TextLayerStore::new();
        surface.attach(&mut store);
        let pipeline = ImagePipeline::new();
        let mut fonts = FontCatalog::new();

        // Drain the initial pending render.
        surface
            .render_if_needed(&store, &pipeline, &mut fonts)
            .unwrap();

        store.create();
        store.create();
        store.remove("text-2");

        let first = surface
            .render_if_needed(&store, &pipeline, &mut fonts)
            .unwrap();
        assert!(first.is_some());
        let second = surface
            .render_if_needed(&store, &pipeline, &mut fonts)
            .unwrap();
        assert!(second.is_none());
    }
}
