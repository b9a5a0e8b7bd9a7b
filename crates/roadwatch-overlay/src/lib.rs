//! roadwatch – annotation layer
//!
//! Everything that turns a raw frame plus a detection list into the frame a
//! user actually sees: class-colored box outlines, label chips, and the
//! top-left summary panel (object counts + instantaneous FPS).
//!
//! The layer is deliberately split in two: [`FrameStats`] and the panel
//! line formatting are plain data, testable without any pixel buffer; the
//! [`Annotator`] is the only part that touches a `Mat`.  Colors and theme
//! presets live in explicit configuration structures rather than inline
//! literals so the drawing code stays free of magic numbers.

use opencv::{
    core::{Point, Rect, Scalar},
    imgproc,
    prelude::*,
};
use roadwatch_detect::Detection;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OverlayError {
    #[error("drawing error: {0}")]
    Draw(#[from] opencv::Error),
}

pub type Result<T> = std::result::Result<T, OverlayError>;

/// A display color in BGR channel order (OpenCV convention).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

impl Color {
    pub const WHITE: Color = Color(255, 255, 255);

    pub fn to_scalar(self) -> Scalar {
        Scalar::new(self.0 as f64, self.1 as f64, self.2 as f64, 0.0)
    }
}

/// Static label → color mapping with a fallback for anything unmapped.
///
/// Immutable for the lifetime of the run; the default table carries the
/// traffic classes this viewer was built around.
#[derive(Debug, Clone)]
pub struct ClassColorMap {
    entries: BTreeMap<String, Color>,
    fallback: Color,
}

impl ClassColorMap {
    pub fn new<I, S>(entries: I, fallback: Color) -> Self
    where
        I: IntoIterator<Item = (S, Color)>,
        S: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            fallback,
        }
    }

    /// Mapped color for `label`, or the fallback if the label is unknown.
    pub fn color_for(&self, label: &str) -> Color {
        self.entries.get(label).copied().unwrap_or(self.fallback)
    }

    pub fn fallback(&self) -> Color {
        self.fallback
    }
}

impl Default for ClassColorMap {
    fn default() -> Self {
        Self::new(
            [
                ("person", Color(255, 0, 255)),
                ("car", Color(255, 100, 0)),
                ("bus", Color(0, 140, 255)),
                ("motorcycle", Color(0, 255, 100)),
                ("truck", Color(0, 0, 255)),
            ],
            Color(255, 255, 0),
        )
    }
}

/// Fixed (panel background, text) color preset selected by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    Dark,
    Light,
}

impl Theme {
    /// `"dark"` selects the dark preset; anything else falls back to light.
    pub fn from_name(name: &str) -> Self {
        if name == "dark" {
            Theme::Dark
        } else {
            Theme::Light
        }
    }

    pub fn panel_bg(self) -> Color {
        match self {
            Theme::Dark => Color(137, 171, 227),
            Theme::Light => Color(100, 140, 140),
        }
    }

    pub fn text(self) -> Color {
        match self {
            Theme::Dark => Color(251, 234, 235),
            Theme::Light => Color(0, 0, 0),
        }
    }
}

/// Per-frame aggregate rebuilt from scratch every frame; never persisted.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    counts: BTreeMap<String, usize>,
    total: usize,
    fps: f64,
}

impl FrameStats {
    pub fn from_detections(dets: &[Detection], fps: f64) -> Self {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for d in dets {
            *counts.entry(d.label.to_string()).or_insert(0) += 1;
        }
        let total = counts.values().sum();
        Self { counts, total, fps }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn distinct_classes(&self) -> usize {
        self.counts.len()
    }

    /// Panel text: one header line, then one line per distinct class,
    /// alphabetical (BTreeMap iteration order).
    pub fn panel_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(1 + self.counts.len());
        lines.push(format!("Objects: {} |  FPS: {:.1} ", self.total, self.fps));
        for (label, count) in &self.counts {
            lines.push(format!("{label}: {count}"));
        }
        lines
    }
}

// Geometry and font constants, matching the layout this viewer reproduces.
const BOX_THICKNESS: i32 = 3;
const TEXT_THICKNESS: i32 = 2;
const LABEL_FONT_SCALE: f64 = 0.8;
const CLASS_LINE_FONT_SCALE: f64 = 0.7;
const CHIP_PAD_X: i32 = 10;
const CHIP_PAD_Y: i32 = 12;
const PANEL_LEFT: i32 = 20;
const PANEL_TOP: i32 = 20;
const PANEL_RIGHT: i32 = 330;
const PANEL_BASE_HEIGHT: i32 = 40;
const PANEL_ROW_HEIGHT: i32 = 30;
const HEADER_OFFSET_Y: i32 = 30;
const CLASS_LINES_OFFSET_Y: i32 = 60;
const CLASS_LINE_STEP: i32 = 25;

/// Draws detections and the summary panel onto frames.
///
/// Holds only the immutable color configuration; all per-frame state comes
/// in through the arguments.  Drawing outside the frame bounds is left to
/// OpenCV's clipping.
pub struct Annotator {
    colors: ClassColorMap,
    theme: Theme,
}

impl Annotator {
    pub fn new(colors: ClassColorMap, theme: Theme) -> Self {
        Self { colors, theme }
    }

    pub fn color_map(&self) -> &ClassColorMap {
        &self.colors
    }

    /// Overlay one frame: a chip + outline + label per detection, then the
    /// summary panel on top.
    pub fn annotate(&self, frame: &mut Mat, dets: &[Detection], stats: &FrameStats) -> Result<()> {
        for det in dets {
            self.draw_detection(frame, det)?;
        }
        self.draw_panel(frame, stats)?;
        Ok(())
    }

    fn draw_detection(&self, frame: &mut Mat, det: &Detection) -> Result<()> {
        let [x1, y1, x2, y2] = det.bbox;
        let (x1, y1, x2, y2) = (x1 as i32, y1 as i32, x2 as i32, y2 as i32);
        let color = self.colors.color_for(det.label).to_scalar();

        // label chip sized to the text extent, sitting on the box's top edge
        let mut baseline = 0;
        let text_size = imgproc::get_text_size(
            det.label,
            imgproc::FONT_HERSHEY_SIMPLEX,
            LABEL_FONT_SCALE,
            TEXT_THICKNESS,
            &mut baseline,
        )?;
        let chip = Rect::new(
            x1,
            y1 - text_size.height - CHIP_PAD_Y,
            text_size.width + CHIP_PAD_X,
            text_size.height + CHIP_PAD_Y,
        );
        imgproc::rectangle(frame, chip, color, imgproc::FILLED, imgproc::LINE_8, 0)?;

        imgproc::rectangle(
            frame,
            Rect::new(x1, y1, x2 - x1, y2 - y1),
            color,
            BOX_THICKNESS,
            imgproc::LINE_8,
            0,
        )?;

        imgproc::put_text(
            frame,
            det.label,
            Point::new(x1 + CHIP_PAD_X / 2, y1 - CHIP_PAD_Y / 2 + 1),
            imgproc::FONT_HERSHEY_SIMPLEX,
            LABEL_FONT_SCALE,
            Color::WHITE.to_scalar(),
            TEXT_THICKNESS,
            imgproc::LINE_8,
            false,
        )?;
        Ok(())
    }

    fn draw_panel(&self, frame: &mut Mat, stats: &FrameStats) -> Result<()> {
        let height = PANEL_BASE_HEIGHT + PANEL_ROW_HEIGHT * stats.distinct_classes() as i32;
        imgproc::rectangle(
            frame,
            Rect::new(PANEL_LEFT, PANEL_TOP, PANEL_RIGHT - PANEL_LEFT, height),
            self.theme.panel_bg().to_scalar(),
            imgproc::FILLED,
            imgproc::LINE_8,
            0,
        )?;

        let text_color = self.theme.text().to_scalar();
        let lines = stats.panel_lines();

        imgproc::put_text(
            frame,
            &lines[0],
            Point::new(PANEL_LEFT, PANEL_TOP + HEADER_OFFSET_Y),
            imgproc::FONT_HERSHEY_SIMPLEX,
            LABEL_FONT_SCALE,
            text_color,
            TEXT_THICKNESS,
            imgproc::LINE_8,
            false,
        )?;

        let mut y = PANEL_TOP + CLASS_LINES_OFFSET_Y;
        for line in &lines[1..] {
            imgproc::put_text(
                frame,
                line,
                Point::new(PANEL_LEFT * 2, y),
                imgproc::FONT_HERSHEY_SIMPLEX,
                CLASS_LINE_FONT_SCALE,
                text_color,
                TEXT_THICKNESS,
                imgproc::LINE_8,
                false,
            )?;
            y += CLASS_LINE_STEP;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(label: &'static str, bbox: [f32; 4]) -> Detection {
        Detection { label, bbox, score: 0.9 }
    }

    #[test]
    fn panel_has_header_plus_one_line_per_class() {
        let dets = vec![
            det("car", [0.0, 0.0, 1.0, 1.0]),
            det("car", [2.0, 2.0, 3.0, 3.0]),
            det("person", [4.0, 4.0, 5.0, 5.0]),
        ];
        let stats = FrameStats::from_detections(&dets, 30.0);
        assert_eq!(stats.panel_lines().len(), 1 + 2);
    }

    #[test]
    fn header_total_is_sum_of_class_counts() {
        let dets = vec![
            det("car", [0.0, 0.0, 1.0, 1.0]),
            det("bus", [0.0, 0.0, 1.0, 1.0]),
            det("car", [0.0, 0.0, 1.0, 1.0]),
        ];
        let stats = FrameStats::from_detections(&dets, 12.34);
        assert_eq!(stats.total(), 3);
        assert_eq!(stats.panel_lines()[0], "Objects: 3 |  FPS: 12.3 ");
    }

    #[test]
    fn class_lines_are_alphabetical_regardless_of_detection_order() {
        let dets = vec![
            det("truck", [0.0, 0.0, 1.0, 1.0]),
            det("bus", [0.0, 0.0, 1.0, 1.0]),
            det("person", [0.0, 0.0, 1.0, 1.0]),
        ];
        let stats = FrameStats::from_detections(&dets, 1.0);
        let lines = stats.panel_lines();
        assert_eq!(lines[1], "bus: 1");
        assert_eq!(lines[2], "person: 1");
        assert_eq!(lines[3], "truck: 1");
    }

    #[test]
    fn zero_detections_still_yields_header_line() {
        let stats = FrameStats::from_detections(&[], 60.0);
        assert_eq!(stats.total(), 0);
        assert_eq!(stats.panel_lines(), vec!["Objects: 0 |  FPS: 60.0 ".to_string()]);
    }

    #[test]
    fn unknown_label_gets_fallback_color_and_is_counted() {
        let map = ClassColorMap::default();
        assert_eq!(map.color_for("giraffe"), map.fallback());

        let stats = FrameStats::from_detections(&[det("giraffe", [0.0, 0.0, 1.0, 1.0])], 1.0);
        assert_eq!(stats.total(), 1);
        assert_eq!(stats.panel_lines()[1], "giraffe: 1");
    }

    #[test]
    fn known_labels_keep_their_mapped_colors() {
        let map = ClassColorMap::default();
        assert_eq!(map.color_for("person"), Color(255, 0, 255));
        assert_eq!(map.color_for("truck"), Color(0, 0, 255));
    }

    #[test]
    fn theme_name_fallback_is_light() {
        assert_eq!(Theme::from_name("dark"), Theme::Dark);
        assert_eq!(Theme::from_name("light"), Theme::Light);
        assert_eq!(Theme::from_name("solarized"), Theme::Light);
        assert_eq!(Theme::from_name(""), Theme::Light);
    }
}
