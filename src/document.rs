use image::Rgba;

use crate::canvas::{composite, CanvasError, Layer, LayerId, PixelBuffer};
use crate::components::colors::{RecentColors, WHITE};
use crate::components::history::{
    HistoryManager, RestoreOutcome, RestoreQueue, RestoreTicket, Snapshot, HISTORY_CAPACITY,
};
use crate::components::tools::{StrokeSession, Tool, ToolOutcome};
use crate::ops::canvas_ops;
use crate::ops::fill::flood_fill;
use crate::ops::shapes::{self, DrawStyle, ShapeKind};
use crate::settings::Settings;
use crate::{log_err, log_info, log_warn};

/// Read-only row for a layer panel.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerInfo {
    pub id: LayerId,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub active: bool,
}

// ============================================================================
// DOCUMENT – layer stack, display buffer and history in one owned value
// ============================================================================

/// An open image.  Owns every layer, the composited display buffer and the
/// undo history.  Drawing always targets the active layer; after each edit the
/// display is recomposited and a snapshot of it is captured.
///
/// Undo/redo only issue a restore ticket.  The decoded snapshot is applied
/// when the ticket completes (`poll_restore`, `complete_restore`, `settle`),
/// and only if no other history move happened in between.  Every mutating
/// method settles outstanding restores before touching pixels.
///
/// History holds the flattened composite only.  An applied restore becomes
/// the display and is written into the layer that was active when the undo or
/// redo was issued, made visible and with its alpha compensated for the
/// layer's opacity, so recompositing that layer alone reproduces the restored
/// image.  Other layers keep their pixels and still composite around it.
pub struct Document {
    pub(crate) width: u32,
    pub(crate) height: u32,
    /// Back-to-front paint order.
    pub(crate) layers: Vec<Layer>,
    pub(crate) active_layer_index: usize,
    background: Rgba<u8>,
    display: PixelBuffer,
    history: HistoryManager<Snapshot>,
    restores: RestoreQueue,
    stroke: Option<StrokeSession>,
    recent_colors: RecentColors,
}

impl Document {
    /// White `width`×`height` document with a single "Background" layer.
    pub fn new(width: u32, height: u32) -> Result<Self, CanvasError> {
        Self::with_background(width, height, WHITE)
    }

    pub fn with_settings(settings: &Settings) -> Result<Self, CanvasError> {
        Self::with_background(settings.canvas_width, settings.canvas_height, settings.background)
    }

    fn with_background(width: u32, height: u32, background: Rgba<u8>) -> Result<Self, CanvasError> {
        let display = PixelBuffer::new_filled(width, height, background)?;
        let mut doc = Self {
            width,
            height,
            layers: Vec::new(),
            active_layer_index: 0,
            background,
            display: display.clone(),
            history: HistoryManager::new(HISTORY_CAPACITY),
            restores: RestoreQueue::new(),
            stroke: None,
            recent_colors: RecentColors::new(),
        };
        // The first layer starts from whatever the canvas already shows
        canvas_ops::reset_layers(&mut doc, display);
        doc.capture()?;
        log_info!("New document {}×{}", width, height);
        Ok(doc)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn background(&self) -> Rgba<u8> {
        self.background
    }

    /// The last composited image, for screen rendering.
    pub fn display(&self) -> &PixelBuffer {
        &self.display
    }

    /// Copy of the composite, handed to whatever encodes it.
    pub fn export_composite(&self) -> PixelBuffer {
        self.display.clone()
    }

    /// `(can_undo, can_redo)` for enabling the controls.
    pub fn history_state(&self) -> (bool, bool) {
        (self.history.can_undo(), self.history.can_redo())
    }

    pub fn history(&self) -> &HistoryManager<Snapshot> {
        &self.history
    }

    pub fn recent_colors(&self) -> &RecentColors {
        &self.recent_colors
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn active_layer_index(&self) -> usize {
        self.active_layer_index
    }

    pub fn active_layer_id(&self) -> LayerId {
        self.layers[self.active_layer_index].id()
    }

    pub fn active_layer(&self) -> &Layer {
        &self.layers[self.active_layer_index]
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id() == id)
    }

    /// Direct layer access.  The display is not refreshed until the next
    /// edit or `refresh()`.
    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| l.id() == id)
    }

    /// Layer id at stack position `index` (0 = bottom).
    pub fn layer_id_at(&self, index: usize) -> Option<LayerId> {
        self.layers.get(index).map(Layer::id)
    }

    pub(crate) fn layer_index(&self, id: LayerId) -> Result<usize, CanvasError> {
        self.layers
            .iter()
            .position(|l| l.id() == id)
            .ok_or(CanvasError::UnknownLayer(id))
    }

    /// Metadata for the layer panel, bottom to top.
    pub fn layers(&self) -> Vec<LayerInfo> {
        self.layers
            .iter()
            .enumerate()
            .map(|(i, l)| LayerInfo {
                id: l.id(),
                name: l.name.clone(),
                visible: l.visible,
                opacity: l.opacity,
                active: i == self.active_layer_index,
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Internal helpers
    // ------------------------------------------------------------------

    /// Recomposite the display buffer from the layer stack.
    pub fn refresh(&mut self) -> Result<(), CanvasError> {
        self.display = composite(&self.layers, self.width, self.height)?;
        Ok(())
    }

    fn capture(&mut self) -> Result<(), CanvasError> {
        let snapshot = Snapshot::encode(&self.display)?;
        self.history.capture(snapshot);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), CanvasError> {
        self.refresh()?;
        self.capture()
    }

    fn active_pixels_mut(&mut self) -> &mut PixelBuffer {
        &mut self.layers[self.active_layer_index].pixels
    }

    // ------------------------------------------------------------------
    // Layer panel operations
    // ------------------------------------------------------------------

    /// Add a transparent layer on top; it becomes the active layer.
    pub fn add_layer(&mut self, name: Option<&str>) -> Result<LayerId, CanvasError> {
        self.settle();
        let id = canvas_ops::add_layer(self, name)?;
        self.refresh()?;
        Ok(id)
    }

    /// Refused with `LastLayer` while only one layer exists.
    pub fn delete_layer(&mut self, id: LayerId) -> Result<(), CanvasError> {
        self.settle();
        canvas_ops::delete_layer(self, id)?;
        self.refresh()
    }

    /// Pending restores are applied to the previous active layer first.
    pub fn set_active_layer(&mut self, id: LayerId) -> Result<(), CanvasError> {
        self.settle();
        self.active_layer_index = self.layer_index(id)?;
        Ok(())
    }

    /// Flip visibility; returns the new state.
    pub fn toggle_visibility(&mut self, id: LayerId) -> Result<bool, CanvasError> {
        self.settle();
        let idx = self.layer_index(id)?;
        let layer = &mut self.layers[idx];
        layer.visible = !layer.visible;
        let visible = layer.visible;
        self.refresh()?;
        Ok(visible)
    }

    /// Opacity is clamped to [0, 1].
    pub fn set_opacity(&mut self, id: LayerId, opacity: f32) -> Result<(), CanvasError> {
        self.settle();
        let idx = self.layer_index(id)?;
        self.layers[idx].opacity = if opacity.is_nan() { 1.0 } else { opacity.clamp(0.0, 1.0) };
        self.refresh()
    }

    pub fn rename_layer(&mut self, id: LayerId, name: &str) -> Result<(), CanvasError> {
        let idx = self.layer_index(id)?;
        self.layers[idx].name = name.to_string();
        Ok(())
    }

    /// Reorder; `to_index` is clamped to the top of the stack.
    pub fn move_layer(&mut self, id: LayerId, to_index: usize) -> Result<(), CanvasError> {
        self.settle();
        canvas_ops::move_layer(self, id, to_index)?;
        self.refresh()
    }

    // ------------------------------------------------------------------
    // Canvas operations
    // ------------------------------------------------------------------

    /// Re-render every layer at the new size.  Old snapshots have the wrong
    /// dimensions, so history restarts from the resized composite.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), CanvasError> {
        self.settle();
        canvas_ops::resize_layers(self, width, height)?;
        self.refresh()?;
        self.history.clear();
        self.capture()
    }

    /// Back to a single background layer at the current size.
    pub fn new_document(&mut self) -> Result<(), CanvasError> {
        self.settle();
        let base = PixelBuffer::new_filled(self.width, self.height, self.background)?;
        canvas_ops::reset_layers(self, base);
        self.stroke = None;
        self.history.clear();
        self.commit()?;
        log_info!("Document reset to {}×{}", self.width, self.height);
        Ok(())
    }

    /// Fill the active layer with the background color.
    pub fn clear_canvas(&mut self) -> Result<(), CanvasError> {
        self.settle();
        let background = self.background;
        self.active_pixels_mut().fill(background);
        self.commit()
    }

    // ------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------

    /// One brush segment on the active layer, committed to history.
    pub fn apply_stroke(&mut self, from: (f32, f32), to: (f32, f32), style: &DrawStyle) -> Result<(), CanvasError> {
        self.settle();
        shapes::draw_line(self.active_pixels_mut(), from.0, from.1, to.0, to.1, style);
        self.commit()
    }

    /// One eraser segment on the active layer, committed to history.
    pub fn apply_erase(&mut self, from: (f32, f32), to: (f32, f32), width: f32) -> Result<(), CanvasError> {
        self.settle();
        shapes::erase_line(self.active_pixels_mut(), from.0, from.1, to.0, to.1, width);
        self.commit()
    }

    pub fn apply_shape(
        &mut self,
        kind: ShapeKind,
        from: (f32, f32),
        to: (f32, f32),
        style: &DrawStyle,
    ) -> Result<(), CanvasError> {
        self.settle();
        shapes::draw_shape(self.active_pixels_mut(), kind, from, to, style);
        self.commit()
    }

    /// Flood fill the active layer.  Returns the number of pixels written; a
    /// fill that changes nothing does not add a history entry.
    pub fn apply_fill(&mut self, x: i32, y: i32, color: Rgba<u8>) -> Result<usize, CanvasError> {
        self.settle();
        let filled = flood_fill(self.active_pixels_mut(), x, y, color)?;
        self.recent_colors.push(color);
        if filled > 0 {
            self.commit()?;
        }
        Ok(filled)
    }

    /// Sample the composited image.
    pub fn pick_color(&mut self, x: i32, y: i32) -> Result<Rgba<u8>, CanvasError> {
        self.settle();
        let color = self.display.get(x, y)?;
        self.recent_colors.push(color);
        Ok(color)
    }

    /// Remember a color chosen elsewhere (palette, hex entry).
    pub fn use_color(&mut self, color: Rgba<u8>) {
        self.recent_colors.push(color);
    }

    /// One complete tool action from `from` to `to`.  Fill and pick act at `to`.
    pub fn apply_tool(&mut self, tool: &Tool, from: (f32, f32), to: (f32, f32)) -> Result<ToolOutcome, CanvasError> {
        match *tool {
            Tool::Brush { .. } | Tool::Pencil { .. } => {
                if let Some(style) = tool.stroke_style() {
                    self.apply_stroke(from, to, &style)?;
                }
                Ok(ToolOutcome::Painted)
            }
            Tool::Erase { width } => {
                self.apply_erase(from, to, width)?;
                Ok(ToolOutcome::Painted)
            }
            Tool::Shape { kind, style } => {
                self.apply_shape(kind, from, to, &style)?;
                Ok(ToolOutcome::Painted)
            }
            Tool::Fill { color } => {
                let n = self.apply_fill(to.0.floor() as i32, to.1.floor() as i32, color)?;
                Ok(ToolOutcome::Filled(n))
            }
            Tool::Pick => {
                let c = self.pick_color(to.0.floor() as i32, to.1.floor() as i32)?;
                Ok(ToolOutcome::Picked(c))
            }
        }
    }

    // ------------------------------------------------------------------
    // Pointer sessions (one history entry per stroke)
    // ------------------------------------------------------------------

    /// Pointer down.  Brush and eraser paint a dot right away; fill and pick
    /// complete immediately; shapes wait for `end_stroke`.
    pub fn begin_stroke(&mut self, tool: Tool, at: (f32, f32)) -> Result<ToolOutcome, CanvasError> {
        self.settle();
        if self.stroke.take().is_some() {
            log_warn!("Stroke started while another was active; previous stroke dropped");
        }
        if tool.is_instant() {
            return self.apply_tool(&tool, at, at);
        }
        self.stroke = Some(StrokeSession::new(tool, at));
        if tool.is_freehand() {
            self.paint_segment(&tool, at, at)?;
            return Ok(ToolOutcome::Painted);
        }
        Ok(ToolOutcome::Pending)
    }

    /// Pointer move.  Freehand tools paint the segment from the last sample.
    pub fn stroke_to(&mut self, at: (f32, f32)) -> Result<ToolOutcome, CanvasError> {
        self.settle();
        let Some(mut session) = self.stroke else {
            return Ok(ToolOutcome::Pending);
        };
        if !session.tool.is_freehand() {
            return Ok(ToolOutcome::Pending);
        }
        self.paint_segment(&session.tool, session.last, at)?;
        session.last = at;
        self.stroke = Some(session);
        Ok(ToolOutcome::Painted)
    }

    /// Pointer up.  Shapes are drawn here; the whole stroke becomes one
    /// history entry.
    pub fn end_stroke(&mut self, at: (f32, f32)) -> Result<ToolOutcome, CanvasError> {
        self.settle();
        let Some(session) = self.stroke.take() else {
            return Ok(ToolOutcome::Pending);
        };
        match session.tool {
            Tool::Shape { kind, style } => {
                shapes::draw_shape(self.active_pixels_mut(), kind, session.start, at, &style);
                self.commit()?;
            }
            tool => {
                self.paint_segment(&tool, session.last, at)?;
                self.capture()?;
            }
        }
        Ok(ToolOutcome::Painted)
    }

    pub fn is_stroking(&self) -> bool {
        self.stroke.is_some()
    }

    /// Paint without touching history.
    fn paint_segment(&mut self, tool: &Tool, from: (f32, f32), to: (f32, f32)) -> Result<(), CanvasError> {
        match *tool {
            Tool::Erase { width } => {
                shapes::erase_line(self.active_pixels_mut(), from.0, from.1, to.0, to.1, width)
            }
            _ => match tool.stroke_style() {
                Some(style) => shapes::draw_line(self.active_pixels_mut(), from.0, from.1, to.0, to.1, &style),
                None => return Ok(()),
            },
        }
        self.refresh()
    }

    // ------------------------------------------------------------------
    // Undo / redo
    // ------------------------------------------------------------------

    /// Step back one state.  `false` when already at the oldest state.  The
    /// restore itself is applied once its ticket completes.
    pub fn undo(&mut self) -> bool {
        match self.history.undo() {
            Some(snapshot) => {
                self.issue_restore(snapshot);
                true
            }
            None => false,
        }
    }

    /// Step forward one state.  `false` when already at the newest state.
    pub fn redo(&mut self) -> bool {
        match self.history.redo() {
            Some(snapshot) => {
                self.issue_restore(snapshot);
                true
            }
            None => false,
        }
    }

    fn issue_restore(&mut self, snapshot: Snapshot) {
        let cursor = self.history.cursor().unwrap_or(0);
        let ticket =
            RestoreTicket::new(self.history.generation(), cursor, snapshot).on_layer(self.active_layer_id());
        self.restores.issue(ticket);
    }

    pub fn has_pending_restore(&self) -> bool {
        self.restores.is_pending()
    }

    /// Hand the oldest pending restore to the caller, who decides when it
    /// completes via `complete_restore`.
    pub fn take_restore(&mut self) -> Option<RestoreTicket> {
        self.restores.next()
    }

    /// Complete the oldest pending restore.
    pub fn poll_restore(&mut self) -> Option<RestoreOutcome> {
        let ticket = self.restores.next()?;
        Some(self.complete_restore(ticket))
    }

    /// Decode `ticket` and apply it if the history has not moved since it was
    /// issued.  Stale results are dropped.
    pub fn complete_restore(&mut self, ticket: RestoreTicket) -> RestoreOutcome {
        if !ticket.is_current(&self.history) {
            log_info!("Dropped stale restore for history position {}", ticket.cursor());
            return RestoreOutcome::Stale;
        }
        let restored = match ticket.decode() {
            Ok(buf) => buf,
            Err(e) => {
                log_err!("Restore failed: {}", e);
                return RestoreOutcome::Failed(e);
            }
        };
        if restored.width() != self.width || restored.height() != self.height {
            let e = CanvasError::Snapshot(format!(
                "snapshot is {}×{}, document is {}×{}",
                restored.width(),
                restored.height(),
                self.width,
                self.height
            ));
            log_err!("Restore failed: {}", e);
            return RestoreOutcome::Failed(e);
        }
        let idx = match ticket.layer().map(|id| self.layer_index(id)) {
            Some(Ok(idx)) => idx,
            Some(Err(_)) => {
                log_warn!("Restore target layer is gone; using the active layer");
                self.active_layer_index
            }
            None => self.active_layer_index,
        };
        self.write_restored(idx, &restored);
        self.display = restored;
        RestoreOutcome::Applied { cursor: ticket.cursor() }
    }

    /// Put a flattened snapshot into layer `idx` so that compositing it at the
    /// layer's opacity gives the snapshot back.  Alpha that would need more
    /// than 255 is saturated.
    fn write_restored(&mut self, idx: usize, restored: &PixelBuffer) {
        let layer = &mut self.layers[idx];
        if !layer.visible {
            log_info!("Restore made layer '{}' visible", layer.name);
            layer.visible = true;
        }
        if layer.opacity.is_nan() || layer.opacity <= 0.0 {
            log_info!("Restore reset opacity of layer '{}'", layer.name);
            layer.opacity = 1.0;
        }
        let opacity = layer.opacity.min(1.0);
        let mut pixels = restored.clone();
        if opacity < 1.0 {
            for px in pixels.raw_mut().chunks_exact_mut(4) {
                px[3] = (px[3] as f32 / opacity).round().min(255.0) as u8;
            }
        }
        layer.pixels = pixels;
    }

    /// Complete every pending restore in issue order.
    pub fn settle(&mut self) {
        while self.poll_restore().is_some() {}
    }
}
