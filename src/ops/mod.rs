// ============================================================================
// OPS — operations that write pixels or reshape the layer stack
// ============================================================================
//
//   shapes.rs     — point / line / eraser / rect / ellipse rasterizer
//   fill.rs       — exact-color 4-connected flood fill
//   canvas_ops.rs — add / delete / move / resize layers
//   scripting.rs  — edit-script parser and replay
// ============================================================================

pub mod canvas_ops;
pub mod fill;
pub mod scripting;
pub mod shapes;

pub use fill::flood_fill;
pub use shapes::{DrawStyle, ShapeKind};
