// src/sketch/canvas.rs
use anyhow::Result;
use image::{ImageFormat, Rgba, RgbaImage};
use log::info;
use std::path::Path;

pub const CANVAS_WIDTH: u32 = 800;
pub const CANVAS_HEIGHT: u32 = 480;
pub const BACKGROUND: [u8; 3] = [0xba, 0xa4, 0x88];
pub const INK: [u8; 3] = [0x08, 0x08, 0x1a];
pub const STROKE_WIDTH: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Freehand drawing surface in bitmap coordinates.
pub struct SketchCanvas {
    width: u32,
    height: u32,
    stroke_width: f32,
    strokes: Vec<Vec<Point>>,
    drawing: bool,
}

impl Default for SketchCanvas {
    fn default() -> Self {
        Self::new(CANVAS_WIDTH, CANVAS_HEIGHT)
    }
}

impl SketchCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            stroke_width: STROKE_WIDTH,
            strokes: Vec::new(),
            drawing: false,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn stroke_width(&self) -> f32 {
        self.stroke_width
    }

    pub fn strokes(&self) -> &[Vec<Point>] {
        &self.strokes
    }

    /// True when nothing has been drawn.
    pub fn is_empty(&self) -> bool {
        self.strokes.iter().all(|stroke| stroke.is_empty())
    }

    pub fn begin_stroke(&mut self) {
        self.end_stroke();
        self.strokes.push(Vec::new());
        self.drawing = true;
    }

    /// Add a point to the stroke in progress, clamped to the canvas. Points
    /// outside a stroke are ignored.
    pub fn extend_stroke(&mut self, point: Point) {
        if !self.drawing {
            return;
        }
        let point = Point::new(
            point.x.clamp(0.0, self.width as f32),
            point.y.clamp(0.0, self.height as f32),
        );
        if let Some(stroke) = self.strokes.last_mut() {
            if stroke.last() != Some(&point) {
                stroke.push(point);
            }
        }
    }

    pub fn end_stroke(&mut self) {
        self.drawing = false;
        if matches!(self.strokes.last(), Some(stroke) if stroke.is_empty()) {
            self.strokes.pop();
        }
    }

    /// Drop the most recent stroke. Returns false if there was none.
    pub fn undo(&mut self) -> bool {
        self.drawing = false;
        self.strokes.pop().is_some()
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
        self.drawing = false;
    }

    /// Rasterize the strokes over the background.
    pub fn render(&self) -> RgbaImage {
        let [r, g, b] = BACKGROUND;
        let mut image = RgbaImage::from_pixel(self.width, self.height, Rgba([r, g, b, 255]));
        let radius = (self.stroke_width / 2.0).max(0.5);

        for stroke in &self.strokes {
            match stroke.as_slice() {
                [] => {}
                [only] => stamp(&mut image, *only, radius),
                points => {
                    for pair in points.windows(2) {
                        draw_segment(&mut image, pair[0], pair[1], radius);
                    }
                }
            }
        }

        image
    }

    /// Write the rendered canvas as PNG, replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.render().save_with_format(path, ImageFormat::Png)?;
        info!("Sketch saved to: {}", path.display());
        Ok(())
    }
}

fn draw_segment(image: &mut RgbaImage, from: Point, to: Point, radius: f32) {
    let (dx, dy) = (to.x - from.x, to.y - from.y);
    let steps = ((dx * dx + dy * dy).sqrt() / 0.5).ceil().max(1.0) as u32;
    for i in 0..=steps {
        let t = i as f32 / steps as f32;
        stamp(image, Point::new(from.x + dx * t, from.y + dy * t), radius);
    }
}

/// Fill the pixels whose centers fall within `radius` of `center`.
fn stamp(image: &mut RgbaImage, center: Point, radius: f32) {
    let [r, g, b] = INK;
    let x0 = (center.x - radius).floor().max(0.0) as u32;
    let y0 = (center.y - radius).floor().max(0.0) as u32;
    let x1 = ((center.x + radius).ceil() as u32).min(image.width().saturating_sub(1));
    let y1 = ((center.y + radius).ceil() as u32).min(image.height().saturating_sub(1));

    for y in y0..=y1 {
        for x in x0..=x1 {
            let (px, py) = (x as f32 + 0.5 - center.x, y as f32 + 0.5 - center.y);
            if px * px + py * py <= radius * radius {
                image.put_pixel(x, y, Rgba([r, g, b, 255]));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ink() -> Rgba<u8> {
        Rgba([INK[0], INK[1], INK[2], 255])
    }

    fn background() -> Rgba<u8> {
        Rgba([BACKGROUND[0], BACKGROUND[1], BACKGROUND[2], 255])
    }

    fn line(canvas: &mut SketchCanvas, from: (f32, f32), to: (f32, f32)) {
        canvas.begin_stroke();
        canvas.extend_stroke(Point::new(from.0, from.1));
        canvas.extend_stroke(Point::new(to.0, to.1));
        canvas.end_stroke();
    }

    #[test]
    fn new_canvas_is_empty() {
        let canvas = SketchCanvas::default();
        assert!(canvas.is_empty());
        assert_eq!(canvas.size(), (800, 480));
    }

    #[test]
    fn clicking_without_moving_leaves_nothing() {
        let mut canvas = SketchCanvas::default();
        canvas.begin_stroke();
        canvas.end_stroke();
        assert!(canvas.is_empty());
        assert!(canvas.strokes().is_empty());
    }

    #[test]
    fn points_outside_a_stroke_are_ignored() {
        let mut canvas = SketchCanvas::default();
        canvas.extend_stroke(Point::new(10.0, 10.0));
        assert!(canvas.is_empty());
    }

    #[test]
    fn points_are_clamped_to_the_canvas() {
        let mut canvas = SketchCanvas::new(100, 50);
        line(&mut canvas, (-20.0, 10.0), (500.0, 80.0));
        assert_eq!(canvas.strokes()[0], vec![Point::new(0.0, 10.0), Point::new(100.0, 50.0)]);
    }

    #[test]
    fn undo_and_clear() {
        let mut canvas = SketchCanvas::default();
        line(&mut canvas, (1.0, 1.0), (5.0, 5.0));
        line(&mut canvas, (10.0, 10.0), (20.0, 20.0));
        assert!(canvas.undo());
        assert_eq!(canvas.strokes().len(), 1);
        canvas.clear();
        assert!(canvas.is_empty());
        assert!(!canvas.undo());
    }

    #[test]
    fn render_draws_strokes_over_background() {
        let mut canvas = SketchCanvas::new(100, 50);
        line(&mut canvas, (10.0, 10.0), (50.0, 10.0));

        let image = canvas.render();
        assert_eq!(image.dimensions(), (100, 50));
        assert_eq!(*image.get_pixel(30, 10), ink());
        assert_eq!(*image.get_pixel(10, 10), ink());
        assert_eq!(*image.get_pixel(30, 40), background());
        assert_eq!(*image.get_pixel(70, 10), background());
    }

    #[test]
    fn single_point_stroke_leaves_a_dot() {
        let mut canvas = SketchCanvas::new(20, 20);
        canvas.begin_stroke();
        canvas.extend_stroke(Point::new(5.0, 5.0));
        canvas.end_stroke();
        assert!(!canvas.is_empty());
        assert_eq!(*canvas.render().get_pixel(5, 5), ink());
    }

    #[test]
    fn saved_png_decodes_to_the_render() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("canvas.png");
        let mut canvas = SketchCanvas::new(40, 30);
        line(&mut canvas, (2.0, 2.0), (30.0, 20.0));

        canvas.save(&path).unwrap();
        canvas.save(&path).unwrap();

        let decoded = image::open(&path).unwrap().to_rgba8();
        assert_eq!(decoded, canvas.render());
    }
}
