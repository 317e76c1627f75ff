use std::collections::VecDeque;

use image::Rgba;

pub const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// How many colors the recent-colors strip remembers.
pub const MAX_RECENT_COLORS: usize = 10;

// ============================================================================
// Hex conversion
// ============================================================================

/// Parse `#RRGGBB` or `#RRGGBBAA` (leading `#` optional, case-insensitive).
/// Six-digit colors are fully opaque.
pub fn parse_hex(text: &str) -> Option<Rgba<u8>> {
    let hex = text.trim().trim_start_matches('#');
    if !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        6 => Some(Rgba([channel(0)?, channel(2)?, channel(4)?, 255])),
        8 => Some(Rgba([channel(0)?, channel(2)?, channel(4)?, channel(6)?])),
        _ => None,
    }
}

/// `#rrggbb` — alpha is dropped, matching what the eyedropper reports.
pub fn to_hex(color: Rgba<u8>) -> String {
    format!("#{:02x}{:02x}{:02x}", color[0], color[1], color[2])
}

// ============================================================================
// RecentColors — most-recent-first, de-duplicated
// ============================================================================

#[derive(Clone, Debug, Default)]
pub struct RecentColors {
    colors: VecDeque<Rgba<u8>>,
}

impl RecentColors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `color` to the front, dropping the oldest entry past capacity.
    pub fn push(&mut self, color: Rgba<u8>) {
        if let Some(pos) = self.colors.iter().position(|c| *c == color) {
            self.colors.remove(pos);
        }
        self.colors.push_front(color);
        self.colors.truncate(MAX_RECENT_COLORS);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rgba<u8>> {
        self.colors.iter()
    }

    pub fn latest(&self) -> Option<Rgba<u8>> {
        self.colors.front().copied()
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }
}
