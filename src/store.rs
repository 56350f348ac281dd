use crate::{
    core::Point,
    model::{DUPLICATE_OFFSET, TextLayer, TextLayerPatch},
};

/// Change callback invoked after every successful store mutation.
pub type ChangeSubscriber = Box<dyn FnMut()>;

/// Owns the ordered text-layer collection.
///
/// Insertion order is paint order: later entries paint on top of earlier
/// ones (and every layer paints above the background, below the foreground
/// cutout). Layers are mutated only through these operations; ids are
/// monotonic and never reused. Unknown ids are logged no-ops, never errors,
/// so callers can fire `update` on every pointer-move frame without
/// special-casing a layer removed mid-drag.
pub struct TextLayerStore {
    layers: Vec<TextLayer>,
    next_id: u64,
    subscribers: Vec<ChangeSubscriber>,
}

impl TextLayerStore {
    /// A store always starts with one default layer.
    pub fn new() -> Self {
        let mut store = Self {
            layers: Vec::new(),
            next_id: 1,
            subscribers: Vec::new(),
        };
        store.push_default();
        store
    }

    fn push_default(&mut self) -> String {
        let id = format!("text-{}", self.next_id);
        self.next_id += 1;
        self.layers.push(TextLayer::with_defaults(id.clone()));
        id
    }

    fn notify(&mut self) {
        for subscriber in &mut self.subscribers {
            subscriber();
        }
    }

    /// Append a new layer with default styling; returns its id.
    pub fn create(&mut self) -> String {
        let id = self.push_default();
        self.notify();
        id
    }

    /// Shallow-merge `patch` into the layer with `id`.
    pub fn update(&mut self, id: &str, patch: &TextLayerPatch) {
        match self.layers.iter_mut().find(|l| l.id == id) {
            Some(layer) => {
                layer.apply(patch);
                self.notify();
            }
            None => tracing::debug!(id, "update for unknown layer id ignored"),
        }
    }

    pub fn remove(&mut self, id: &str) {
        let before = self.layers.len();
        self.layers.retain(|l| l.id != id);
        if self.layers.len() != before {
            self.notify();
        } else {
            tracing::debug!(id, "remove for unknown layer id ignored");
        }
    }

    /// Copy all fields of the layer with `id` into a new layer at
    /// `position + (20, 20)`; returns the new id, or `None` if absent.
    pub fn duplicate(&mut self, id: &str) -> Option<String> {
        let Some(source) = self.layers.iter().find(|l| l.id == id).cloned() else {
            tracing::debug!(id, "duplicate for unknown layer id ignored");
            return None;
        };

        let new_id = format!("text-{}", self.next_id);
        self.next_id += 1;
        let mut copy = source;
        copy.id = new_id.clone();
        copy.position = Point::new(
            copy.position.x + DUPLICATE_OFFSET.x,
            copy.position.y + DUPLICATE_OFFSET.y,
        );
        self.layers.push(copy);
        self.notify();
        Some(new_id)
    }

    /// Layers in paint order.
    pub fn layers(&self) -> &[TextLayer] {
        &self.layers
    }

    pub fn get(&self, id: &str) -> Option<&TextLayer> {
        self.layers.iter().find(|l| l.id == id)
    }

    /// Register a change subscriber, called synchronously after every
    /// successful mutation.
    pub fn subscribe(&mut self, subscriber: ChangeSubscriber) {
        self.subscribers.push(subscriber);
    }
}

impl Default for TextLayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TextLayerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextLayerStore")
            .field("layers", &self.layers)
            .field("next_id", &self.next_id)
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}
