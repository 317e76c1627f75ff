//! RasterFE: a layered raster editing engine.
//!
//! A [`Document`] owns a stack of [`Layer`]s, composites them into a display
//! buffer after every edit and keeps a bounded undo history of the flattened
//! result.  Drawing goes through the rasterizer in [`ops::shapes`] and the
//! flood fill in [`ops::fill`].

pub mod logger;

pub mod canvas;
pub mod cli;
pub mod components;
pub mod document;
pub mod io;
pub mod ops;
pub mod settings;

pub use canvas::{blend_pixel, composite, CanvasError, Layer, LayerId, PixelBuffer};
pub use components::colors::{parse_hex, to_hex};
pub use components::{HistoryManager, RestoreOutcome, RestoreTicket, Snapshot, Tool, ToolOutcome};
pub use document::{Document, LayerInfo};
pub use ops::{DrawStyle, ShapeKind};
pub use settings::Settings;
