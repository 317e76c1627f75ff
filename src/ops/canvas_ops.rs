// ============================================================================
// CANVAS-LEVEL OPERATIONS — add / delete / reorder / resize layers
// ============================================================================
//
// These only reshape the layer stack.  Recompositing and history capture are
// left to the `Document` methods that call them.

use rayon::prelude::*;

use crate::canvas::{CanvasError, Layer, LayerId, PixelBuffer};
use crate::components::colors::TRANSPARENT;
use crate::document::Document;
use crate::{log_info, log_warn};

/// Add a new transparent layer on top of the stack and make it active.
pub fn add_layer(doc: &mut Document, name: Option<&str>) -> Result<LayerId, CanvasError> {
    let name = match name {
        Some(n) => n.to_string(),
        None => format!("Layer {}", doc.layers.len() + 1),
    };
    let layer = Layer::new(name, doc.width, doc.height, TRANSPARENT)?;
    let id = layer.id();
    log_info!("Added layer '{}' ({})", layer.name, id);
    doc.layers.push(layer);
    doc.active_layer_index = doc.layers.len() - 1;
    Ok(id)
}

/// Delete a layer (must keep at least one layer).  Returns the removed layer.
pub fn delete_layer(doc: &mut Document, id: LayerId) -> Result<Layer, CanvasError> {
    let idx = doc.layer_index(id)?;
    if doc.layers.len() <= 1 {
        log_warn!("Refused to delete the only layer ({})", id);
        return Err(CanvasError::LastLayer);
    }
    let removed = doc.layers.remove(idx);

    // Deleting the active layer selects the one below it
    if idx == doc.active_layer_index {
        doc.active_layer_index = idx.saturating_sub(1);
    } else if idx < doc.active_layer_index {
        doc.active_layer_index -= 1;
    }
    doc.active_layer_index = doc.active_layer_index.min(doc.layers.len() - 1);

    log_info!("Deleted layer '{}' ({})", removed.name, id);
    Ok(removed)
}

/// Move a layer to `to_index` (clamped); the active layer stays the same layer.
pub fn move_layer(doc: &mut Document, id: LayerId, to_index: usize) -> Result<(), CanvasError> {
    let from = doc.layer_index(id)?;
    let to = to_index.min(doc.layers.len() - 1);
    if from == to {
        return Ok(());
    }
    let active_id = doc.layers[doc.active_layer_index].id();
    let layer = doc.layers.remove(from);
    doc.layers.insert(to, layer);
    doc.active_layer_index = doc.layer_index(active_id)?;
    Ok(())
}

/// Proportionally re-render every layer into `width`×`height`.  All layers are
/// scaled before any is replaced, so a failure leaves the stack untouched.
pub fn resize_layers(doc: &mut Document, width: u32, height: u32) -> Result<(), CanvasError> {
    let resized: Vec<PixelBuffer> = doc
        .layers
        .par_iter()
        .map(|layer| layer.pixels.resized(width, height))
        .collect::<Result<_, _>>()?;

    for (layer, pixels) in doc.layers.iter_mut().zip(resized) {
        layer.pixels = pixels;
    }
    log_info!("Resized canvas {}×{} -> {}×{}", doc.width, doc.height, width, height);
    doc.width = width;
    doc.height = height;
    Ok(())
}

/// Replace the whole stack with a single background layer holding `base`.
pub fn reset_layers(doc: &mut Document, base: PixelBuffer) {
    doc.width = base.width();
    doc.height = base.height();
    doc.layers = vec![Layer::from_pixels("Background".to_string(), base)];
    doc.active_layer_index = 0;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::colors::WHITE;
    use image::Rgba;

    fn doc_with_layers(n: usize) -> (Document, Vec<LayerId>) {
        let mut doc = Document::new(8, 8).unwrap();
        let mut ids = vec![doc.active_layer_id()];
        for _ in 1..n {
            ids.push(add_layer(&mut doc, None).unwrap());
        }
        (doc, ids)
    }

    #[test]
    fn added_layers_are_transparent_named_and_active() {
        let (doc, ids) = doc_with_layers(3);
        assert_eq!(doc.layer_count(), 3);
        assert_eq!(doc.active_layer_index(), 2);
        let top = doc.layer(ids[2]).unwrap();
        assert_eq!(top.name, "Layer 3");
        assert!(top.pixels.pixels().all(|(_, _, p)| p == TRANSPARENT));
        // The first layer inherited the white display
        assert_eq!(doc.layer(ids[0]).unwrap().pixels.get(0, 0).unwrap(), WHITE);
    }

    #[test]
    fn deleting_active_layer_selects_the_one_below() {
        let (mut doc, ids) = doc_with_layers(3);
        delete_layer(&mut doc, ids[2]).unwrap();
        assert_eq!(doc.active_layer_index(), 1);
        assert_eq!(doc.active_layer_id(), ids[1]);
    }

    #[test]
    fn deleting_below_active_shifts_index() {
        let (mut doc, ids) = doc_with_layers(3);
        delete_layer(&mut doc, ids[0]).unwrap();
        assert_eq!(doc.active_layer_id(), ids[2]);
        assert_eq!(doc.active_layer_index(), 1);
    }

    #[test]
    fn deleting_bottom_active_layer_clamps_to_zero() {
        let (mut doc, ids) = doc_with_layers(2);
        doc.set_active_layer(ids[0]).unwrap();
        delete_layer(&mut doc, ids[0]).unwrap();
        assert_eq!(doc.active_layer_index(), 0);
        assert_eq!(doc.active_layer_id(), ids[1]);
    }

    #[test]
    fn last_layer_cannot_be_deleted() {
        let (mut doc, ids) = doc_with_layers(1);
        assert!(matches!(delete_layer(&mut doc, ids[0]), Err(CanvasError::LastLayer)));
        assert_eq!(doc.layer_count(), 1);
    }

    #[test]
    fn unknown_layer_is_reported() {
        let (mut doc, _) = doc_with_layers(2);
        let stranger = LayerId::new();
        assert_eq!(delete_layer(&mut doc, stranger).err(), Some(CanvasError::UnknownLayer(stranger)));
    }

    #[test]
    fn move_layer_keeps_active_identity() {
        let (mut doc, ids) = doc_with_layers(3);
        // active is ids[2]
        move_layer(&mut doc, ids[2], 0).unwrap();
        assert_eq!(doc.active_layer_id(), ids[2]);
        assert_eq!(doc.active_layer_index(), 0);
        let order: Vec<LayerId> = doc.layers().iter().map(|l| l.id).collect();
        assert_eq!(order, vec![ids[2], ids[0], ids[1]]);
    }

    #[test]
    fn resize_scales_every_layer() {
        let (mut doc, ids) = doc_with_layers(2);
        doc.layer_mut(ids[1]).unwrap().pixels.fill(Rgba([0, 0, 255, 255]));
        resize_layers(&mut doc, 16, 4).unwrap();
        assert_eq!((doc.width(), doc.height()), (16, 4));
        for id in &ids {
            let px = &doc.layer(*id).unwrap().pixels;
            assert_eq!((px.width(), px.height()), (16, 4));
        }
        assert_eq!(doc.layer(ids[1]).unwrap().pixels.get(15, 3).unwrap(), Rgba([0, 0, 255, 255]));
    }

    #[test]
    fn failed_resize_leaves_stack_untouched() {
        let (mut doc, _) = doc_with_layers(2);
        assert!(resize_layers(&mut doc, 0, 10).is_err());
        assert_eq!((doc.width(), doc.height()), (8, 8));
    }
}
