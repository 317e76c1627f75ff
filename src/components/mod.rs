// ============================================================================
// COMPONENTS — editor state that sits next to the pixels
// ============================================================================
//
//   colors.rs  — color constants, hex conversion, recent-colors strip
//   history.rs — bounded snapshot history + deferred restore tickets
//   tools.rs   — closed set of tools and pointer-stroke sessions
// ============================================================================

pub mod colors;
pub mod history;
pub mod tools;

pub use colors::RecentColors;
pub use history::{HistoryManager, RestoreOutcome, RestoreTicket, Snapshot, HISTORY_CAPACITY};
pub use tools::{StrokeSession, Tool, ToolOutcome};
