use image::Rgba;

use crate::ops::shapes::{DrawStyle, ShapeKind};

/// Every tool the engine understands, each carrying only what it needs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Tool {
    /// Freehand round-capped stroke.
    Brush { style: DrawStyle },
    /// Freehand one-pixel hard line at full opacity.
    Pencil { color: Rgba<u8> },
    /// Freehand stroke that clears pixels to transparent.
    Erase { width: f32 },
    /// Two-point shape (drag from first corner/centre to second point).
    Shape { kind: ShapeKind, style: DrawStyle },
    /// Exact-color flood fill at a point.
    Fill { color: Rgba<u8> },
    /// Eyedropper on the composited image.
    Pick,
}

impl Tool {
    pub fn name(&self) -> &'static str {
        match self {
            Tool::Brush { .. } => "brush",
            Tool::Pencil { .. } => "pencil",
            Tool::Erase { .. } => "eraser",
            Tool::Shape { kind, .. } => kind.name(),
            Tool::Fill { .. } => "fill",
            Tool::Pick => "eyedropper",
        }
    }

    /// Tools that paint continuously while the pointer moves.
    pub fn is_freehand(&self) -> bool {
        matches!(self, Tool::Brush { .. } | Tool::Pencil { .. } | Tool::Erase { .. })
    }

    /// Line style for the freehand painting tools.
    pub fn stroke_style(&self) -> Option<DrawStyle> {
        match *self {
            Tool::Brush { style } => Some(style),
            Tool::Pencil { color } => Some(DrawStyle::new(color, 1.0)),
            _ => None,
        }
    }

    /// Tools that act once on pointer-down and end immediately.
    pub fn is_instant(&self) -> bool {
        matches!(self, Tool::Fill { .. } | Tool::Pick)
    }
}

/// What a tool call did, for the caller to react to (e.g. update the color
/// swatch after a pick).
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ToolOutcome {
    /// Pixels written; display refreshed.
    Painted,
    /// Flood fill wrote this many pixels (0 = region already that color).
    Filled(usize),
    Picked(Rgba<u8>),
    /// Nothing to do yet (e.g. shape drag still in progress).
    Pending,
}

/// Pointer-down..pointer-up state of the tool in use.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StrokeSession {
    pub tool: Tool,
    /// Where the pointer went down (shape anchor).
    pub start: (f32, f32),
    /// Last sample painted (freehand segment origin).
    pub last: (f32, f32),
}

impl StrokeSession {
    pub fn new(tool: Tool, at: (f32, f32)) -> Self {
        Self { tool, start: at, last: at }
    }
}
