// ============================================================================
// EDIT SCRIPTS — line-oriented command lists replayed against a Document
// ============================================================================
//
// One command per line, whitespace separated; `#` starts a comment.  Layer
// numbers are stack positions, 0 = bottom.
//
//   layer [name]            add a layer on top (becomes active)
//   select n | delete n | hide n | opacity n v
//   color #rrggbb[aa] | size w | alpha v | filled on|off
//   point x y | line x0 y0 x1 y1 | erase x0 y0 x1 y1
//   rect x0 y0 x1 y1 | ellipse cx cy x1 y1
//   fill x y | pick x y
//   undo | redo | resize w h | new | clear

use image::Rgba;

use crate::canvas::LayerId;
use crate::components::colors::parse_hex;
use crate::document::Document;
use crate::ops::shapes::{DrawStyle, ShapeKind};
use crate::{log_info, log_warn};

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptError {
    pub message: String,
    /// 1-based source line.
    pub line: Option<usize>,
}

impl ScriptError {
    fn at(line: usize, message: impl Into<String>) -> Self {
        Self { message: message.into(), line: Some(line) }
    }
}

impl std::fmt::Display for ScriptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(line) = self.line {
            write!(f, "Line {}: {}", line, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ScriptError {}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddLayer(Option<String>),
    Select(usize),
    Delete(usize),
    Hide(usize),
    Opacity(usize, f32),
    Color(Rgba<u8>),
    Size(f32),
    Alpha(f32),
    Filled(bool),
    Point(f32, f32),
    Line(f32, f32, f32, f32),
    Erase(f32, f32, f32, f32),
    Shape(ShapeKind, f32, f32, f32, f32),
    Fill(i32, i32),
    Pick(i32, i32),
    Undo,
    Redo,
    Resize(u32, u32),
    New,
    Clear,
}

/// A parsed command and the line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptLine {
    pub line: usize,
    pub command: Command,
}

// ============================================================================
// Parsing
// ============================================================================

pub fn parse_script(source: &str) -> Result<Vec<ScriptLine>, ScriptError> {
    let mut out = Vec::new();
    for (i, raw) in source.lines().enumerate() {
        let line = i + 1;
        let text = match raw.split_once('#') {
            Some((before, _)) => before,
            None => raw,
        };
        let words: Vec<&str> = text.split_whitespace().collect();
        let Some((&name, args)) = words.split_first() else { continue };
        let command = parse_command(name, args).map_err(|msg| ScriptError::at(line, msg))?;
        out.push(ScriptLine { line, command });
    }
    Ok(out)
}

fn parse_command(name: &str, args: &[&str]) -> Result<Command, String> {
    let cmd = match name.to_ascii_lowercase().as_str() {
        "layer" => Command::AddLayer(if args.is_empty() { None } else { Some(args.join(" ")) }),
        "select" => Command::Select(index(name, args)?),
        "delete" => Command::Delete(index(name, args)?),
        "hide" => Command::Hide(index(name, args)?),
        "opacity" => {
            arity(name, args, 2)?;
            Command::Opacity(num(args[0])?, num(args[1])?)
        }
        "color" => {
            arity(name, args, 1)?;
            Command::Color(parse_hex(args[0]).ok_or_else(|| format!("bad color '{}'", args[0]))?)
        }
        "size" => {
            arity(name, args, 1)?;
            Command::Size(num(args[0])?)
        }
        "alpha" => {
            arity(name, args, 1)?;
            Command::Alpha(num(args[0])?)
        }
        "filled" => {
            arity(name, args, 1)?;
            match args[0] {
                "on" | "true" | "1" => Command::Filled(true),
                "off" | "false" | "0" => Command::Filled(false),
                other => return Err(format!("expected on|off, got '{}'", other)),
            }
        }
        "point" => {
            let [x, y] = nums::<2>(name, args)?;
            Command::Point(x, y)
        }
        "line" => {
            let [a, b, c, d] = nums::<4>(name, args)?;
            Command::Line(a, b, c, d)
        }
        "erase" => {
            let [a, b, c, d] = nums::<4>(name, args)?;
            Command::Erase(a, b, c, d)
        }
        "rect" => {
            let [a, b, c, d] = nums::<4>(name, args)?;
            Command::Shape(ShapeKind::Rectangle, a, b, c, d)
        }
        "ellipse" | "circle" => {
            let [a, b, c, d] = nums::<4>(name, args)?;
            Command::Shape(ShapeKind::Ellipse, a, b, c, d)
        }
        "fill" => {
            arity(name, args, 2)?;
            Command::Fill(num(args[0])?, num(args[1])?)
        }
        "pick" => {
            arity(name, args, 2)?;
            Command::Pick(num(args[0])?, num(args[1])?)
        }
        "resize" => {
            arity(name, args, 2)?;
            Command::Resize(num(args[0])?, num(args[1])?)
        }
        "undo" => simple(name, args, Command::Undo)?,
        "redo" => simple(name, args, Command::Redo)?,
        "new" => simple(name, args, Command::New)?,
        "clear" => simple(name, args, Command::Clear)?,
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(cmd)
}

fn arity(name: &str, args: &[&str], n: usize) -> Result<(), String> {
    if args.len() != n {
        return Err(format!("'{}' takes {} argument(s), got {}", name, n, args.len()));
    }
    Ok(())
}

fn simple(name: &str, args: &[&str], cmd: Command) -> Result<Command, String> {
    arity(name, args, 0)?;
    Ok(cmd)
}

fn index(name: &str, args: &[&str]) -> Result<usize, String> {
    arity(name, args, 1)?;
    num(args[0])
}

fn num<T: std::str::FromStr>(s: &str) -> Result<T, String> {
    s.parse::<T>().map_err(|_| format!("bad number '{}'", s))
}

fn nums<const N: usize>(name: &str, args: &[&str]) -> Result<[f32; N], String> {
    arity(name, args, N)?;
    let mut out = [0.0; N];
    for (slot, s) in out.iter_mut().zip(args) {
        let v: f32 = num(s)?;
        if !v.is_finite() {
            return Err(format!("bad number '{}'", s));
        }
        *slot = v;
    }
    Ok(out)
}

// ============================================================================
// Replay
// ============================================================================

/// Pen state carried between commands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pen {
    pub style: DrawStyle,
}

impl Pen {
    pub fn new(style: DrawStyle) -> Self {
        Self { style }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptReport {
    pub executed: usize,
    /// undo/redo lines that hit a history boundary.
    pub history_noops: usize,
    /// Colors sampled by `pick`, in order.
    pub picked: Vec<Rgba<u8>>,
}

/// Run `lines` against `doc`.  Stops at the first failing command; earlier
/// commands stay applied.  Pending restores are settled before returning.
pub fn run_script(doc: &mut Document, lines: &[ScriptLine], pen: &mut Pen) -> Result<ScriptReport, ScriptError> {
    let mut report = ScriptReport::default();
    for l in lines {
        execute(doc, &l.command, pen, &mut report).map_err(|e| {
            log_warn!("script line {}: {}", l.line, e);
            ScriptError::at(l.line, e.to_string())
        })?;
        report.executed += 1;
    }
    doc.settle();
    log_info!("Script finished: {} command(s)", report.executed);
    Ok(report)
}

fn layer_at(doc: &Document, index: usize) -> Result<LayerId, Box<dyn std::error::Error>> {
    doc.layer_id_at(index)
        .ok_or_else(|| format!("no layer {} (document has {})", index, doc.layer_count()).into())
}

fn execute(
    doc: &mut Document,
    cmd: &Command,
    pen: &mut Pen,
    report: &mut ScriptReport,
) -> Result<(), Box<dyn std::error::Error>> {
    let style = pen.style;
    match *cmd {
        Command::AddLayer(ref name) => {
            doc.add_layer(name.as_deref())?;
        }
        Command::Select(i) => {
            let id = layer_at(doc, i)?;
            doc.set_active_layer(id)?;
        }
        Command::Delete(i) => {
            let id = layer_at(doc, i)?;
            doc.delete_layer(id)?;
        }
        Command::Hide(i) => {
            let id = layer_at(doc, i)?;
            doc.toggle_visibility(id)?;
        }
        Command::Opacity(i, v) => {
            let id = layer_at(doc, i)?;
            doc.set_opacity(id, v)?;
        }
        Command::Color(c) => {
            pen.style.color = c;
            doc.use_color(c);
        }
        Command::Size(w) => pen.style.stroke_width = w.max(0.0),
        Command::Alpha(a) => pen.style.opacity = a.clamp(0.0, 1.0),
        Command::Filled(on) => pen.style.filled = on,
        Command::Point(x, y) => doc.apply_stroke((x, y), (x, y), &style)?,
        Command::Line(x0, y0, x1, y1) => doc.apply_stroke((x0, y0), (x1, y1), &style)?,
        Command::Erase(x0, y0, x1, y1) => doc.apply_erase((x0, y0), (x1, y1), style.stroke_width)?,
        Command::Shape(kind, x0, y0, x1, y1) => doc.apply_shape(kind, (x0, y0), (x1, y1), &style)?,
        Command::Fill(x, y) => {
            doc.apply_fill(x, y, style.paint_color())?;
        }
        Command::Pick(x, y) => {
            let c = doc.pick_color(x, y)?;
            pen.style.color = c;
            report.picked.push(c);
        }
        Command::Undo => {
            if !doc.undo() {
                report.history_noops += 1;
            }
        }
        Command::Redo => {
            if !doc.redo() {
                report.history_noops += 1;
            }
        }
        Command::Resize(w, h) => doc.resize(w, h)?,
        Command::New => doc.new_document()?,
        Command::Clear => doc.clear_canvas()?,
    }
    Ok(())
}
