//! Off-screen toolkit.
//!
//! Windows are in-memory RGBA canvases. `save` writes PNG (through `image`)
//! or a small SVG summary; frame capture writes numbered PNG frames into a
//! directory. A [`HeadlessProbe`] shares per-window counters with the caller
//! and can inject the failures a real GUI produces: a user closing a window,
//! or a handle going stale mid-draw.

use crate::drawable::{Drawable, DrawableKind};
use crate::mode::PresentationMode;
use crate::toolkit::{Toolkit, ToolkitCapabilities, ToolkitError};
use crate::window::WindowId;
use image::{ImageFormat, Rgba, RgbaImage};
use log::debug;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const DEFAULT_WIDTH: u32 = 320;
const DEFAULT_HEIGHT: u32 = 240;
const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BORDER: Rgba<u8> = Rgba([40, 40, 40, 255]);

/// Toolkit activity for one window id, summed over every handle it had.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowCounters {
    pub created: u64,
    pub draws: u64,
    pub closes: u64,
    pub frames: u64,
    pub saves: u64,
}

#[derive(Default)]
struct ProbeState {
    counters: HashMap<WindowId, WindowCounters>,
    /// Serial of the most recent handle per window id
    live: HashMap<WindowId, u64>,
    dead: HashSet<u64>,
    stale_on_draw: HashSet<WindowId>,
    stale_on_save: HashSet<WindowId>,
    refuse_next_create: bool,
}

impl ProbeState {
    fn counters_mut(&mut self, id: &WindowId) -> &mut WindowCounters {
        self.counters.entry(id.clone()).or_default()
    }
}

/// Shared view into a [`HeadlessToolkit`], usable from any thread.
#[derive(Clone, Default)]
pub struct HeadlessProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl HeadlessProbe {
    fn lock(&self) -> MutexGuard<'_, ProbeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn counters(&self, id: &WindowId) -> WindowCounters {
        self.lock().counters.get(id).copied().unwrap_or_default()
    }

    /// Handles created across all windows.
    pub fn total_created(&self) -> u64 {
        self.lock().counters.values().map(|c| c.created).sum()
    }

    /// Whether the window's latest handle exists and has not been closed.
    pub fn is_open(&self, id: &WindowId) -> bool {
        let state = self.lock();
        state
            .live
            .get(id)
            .is_some_and(|serial| !state.dead.contains(serial))
    }

    /// Simulate the user closing the window: its handle reports closed from
    /// now on. Returns false if the window has no live handle.
    pub fn kill(&self, id: &WindowId) -> bool {
        let mut state = self.lock();
        match state.live.get(id).copied() {
            Some(serial) => state.dead.insert(serial),
            None => false,
        }
    }

    /// Make the next draw into `id` fail with a stale handle.
    pub fn fail_next_draw(&self, id: &WindowId) {
        self.lock().stale_on_draw.insert(id.clone());
    }

    /// Make the next export of `id` find its handle stale.
    pub fn fail_next_save(&self, id: &WindowId) {
        self.lock().stale_on_save.insert(id.clone());
    }

    /// Make the next window creation fail, as a toolkit without a display
    /// would.
    pub fn fail_next_create(&self) {
        self.lock().refuse_next_create = true;
    }
}

struct FrameStream {
    dir: PathBuf,
    next: u32,
}

pub struct HeadlessWindow {
    id: WindowId,
    serial: u64,
    mode: PresentationMode,
    canvas: RgbaImage,
    label: Option<String>,
    capture: Option<FrameStream>,
}

impl HeadlessWindow {
    pub fn id(&self) -> &WindowId {
        &self.id
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn mode(&self) -> PresentationMode {
        self.mode
    }

    /// Label of the last drawable drawn into this window.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }
}

pub struct HeadlessToolkit {
    probe: HeadlessProbe,
    width: u32,
    height: u32,
    frame_capture: bool,
    next_serial: u64,
}

impl Default for HeadlessToolkit {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessToolkit {
    pub fn new() -> Self {
        Self {
            probe: HeadlessProbe::default(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            frame_capture: true,
            next_serial: 0,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    /// Report no frame-capture support, as toolkits without a movie writer do.
    pub fn without_frame_capture(mut self) -> Self {
        self.frame_capture = false;
        self
    }

    pub fn probe(&self) -> HeadlessProbe {
        self.probe.clone()
    }

    fn ensure_alive(&self, handle: &HeadlessWindow) -> Result<(), ToolkitError> {
        if self.probe.lock().dead.contains(&handle.serial) {
            Err(ToolkitError::StaleHandle)
        } else {
            Ok(())
        }
    }
}

fn kind_color(kind: &DrawableKind) -> Rgba<u8> {
    match kind {
        DrawableKind::Mesh => Rgba([66, 110, 180, 255]),
        DrawableKind::Contour => Rgba([60, 160, 90, 255]),
        DrawableKind::Vector => Rgba([230, 140, 40, 255]),
        DrawableKind::Surface => Rgba([140, 80, 170, 255]),
        DrawableKind::XyPlot => Rgba([90, 90, 90, 255]),
        DrawableKind::Other(_) => Rgba([180, 180, 180, 255]),
    }
}

fn paint_canvas(canvas: &mut RgbaImage, fill: Rgba<u8>) {
    let (width, height) = canvas.dimensions();
    let (inset_x, inset_y) = (width / 10, height / 10);
    for (x, y, pixel) in canvas.enumerate_pixels_mut() {
        let edge = x == 0 || y == 0 || x + 1 == width || y + 1 == height;
        let inside = x >= inset_x && x < width - inset_x && y >= inset_y && y < height - inset_y;
        *pixel = if edge {
            BORDER
        } else if inside {
            fill
        } else {
            BACKGROUND
        };
    }
}

fn svg_summary(window: &HeadlessWindow) -> String {
    let (width, height) = window.canvas.dimensions();
    let Rgba([r, g, b, _]) = *window.canvas.get_pixel(width / 2, height / 2);
    let label = window.label.as_deref().unwrap_or("");
    let label = label
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;");
    format!(
        concat!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\">\n",
            "  <rect width=\"100%\" height=\"100%\" fill=\"rgb({r},{g},{b})\"/>\n",
            "  <text x=\"8\" y=\"20\">{label}</text>\n",
            "</svg>\n"
        ),
        w = width,
        h = height,
        r = r,
        g = g,
        b = b,
        label = label
    )
}

fn png_error(err: image::ImageError) -> ToolkitError {
    ToolkitError::Backend(format!("png encoding failed: {err}"))
}

impl Toolkit for HeadlessToolkit {
    type Handle = HeadlessWindow;

    fn capabilities(&self, _mode: PresentationMode) -> ToolkitCapabilities {
        ToolkitCapabilities {
            export_formats: vec!["png".to_string(), "svg".to_string()],
            frame_capture: self.frame_capture,
        }
    }

    fn create_handle(
        &mut self,
        window_id: &WindowId,
        mode: PresentationMode,
    ) -> Result<HeadlessWindow, ToolkitError> {
        if std::mem::take(&mut self.probe.lock().refuse_next_create) {
            return Err(ToolkitError::Backend(format!(
                "cannot open window '{window_id}': no display"
            )));
        }
        self.next_serial += 1;
        let serial = self.next_serial;
        let mut canvas = RgbaImage::from_pixel(self.width, self.height, BACKGROUND);
        paint_canvas(&mut canvas, BACKGROUND);
        {
            let mut state = self.probe.lock();
            state.live.insert(window_id.clone(), serial);
            state.counters_mut(window_id).created += 1;
        }
        debug!("headless window '{window_id}' created (handle {serial})");
        Ok(HeadlessWindow {
            id: window_id.clone(),
            serial,
            mode,
            canvas,
            label: None,
            capture: None,
        })
    }

    fn is_closed(&self, handle: &HeadlessWindow) -> bool {
        self.probe.lock().dead.contains(&handle.serial)
    }

    fn draw(
        &mut self,
        handle: &mut HeadlessWindow,
        drawable: &dyn Drawable,
    ) -> Result<(), ToolkitError> {
        {
            let mut state = self.probe.lock();
            if state.stale_on_draw.remove(&handle.id) {
                state.dead.insert(handle.serial);
            }
            if state.dead.contains(&handle.serial) {
                return Err(ToolkitError::StaleHandle);
            }
            state.counters_mut(&handle.id).draws += 1;
        }
        paint_canvas(&mut handle.canvas, kind_color(&drawable.kind()));
        handle.label = Some(drawable.label());
        Ok(())
    }

    fn close(&mut self, handle: HeadlessWindow) -> Result<(), ToolkitError> {
        let mut state = self.probe.lock();
        state.dead.insert(handle.serial);
        if state.live.get(&handle.id) == Some(&handle.serial) {
            state.live.remove(&handle.id);
        }
        state.counters_mut(&handle.id).closes += 1;
        Ok(())
    }

    fn save(
        &mut self,
        handle: &mut HeadlessWindow,
        path: &Path,
        format: &str,
    ) -> Result<(), ToolkitError> {
        {
            let mut state = self.probe.lock();
            if state.stale_on_save.remove(&handle.id) {
                state.dead.insert(handle.serial);
            }
        }
        self.ensure_alive(handle)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        match format {
            "png" => handle
                .canvas
                .save_with_format(path, ImageFormat::Png)
                .map_err(png_error)?,
            "svg" => fs::write(path, svg_summary(handle))?,
            other => return Err(ToolkitError::UnsupportedFormat(other.to_string())),
        }
        self.probe.lock().counters_mut(&handle.id).saves += 1;
        Ok(())
    }

    fn open_frame_capture(
        &mut self,
        handle: &mut HeadlessWindow,
        path: &Path,
    ) -> Result<(), ToolkitError> {
        if !self.frame_capture {
            return Err(ToolkitError::CaptureUnavailable);
        }
        self.ensure_alive(handle)?;
        fs::create_dir_all(path)?;
        handle.capture = Some(FrameStream {
            dir: path.to_path_buf(),
            next: 0,
        });
        Ok(())
    }

    fn capture_frame(&mut self, handle: &mut HeadlessWindow) -> Result<(), ToolkitError> {
        self.ensure_alive(handle)?;
        let Some(stream) = handle.capture.as_mut() else {
            return Err(ToolkitError::CaptureUnavailable);
        };
        let frame = stream.dir.join(format!("frame-{:05}.png", stream.next));
        handle
            .canvas
            .save_with_format(&frame, ImageFormat::Png)
            .map_err(png_error)?;
        stream.next += 1;
        self.probe.lock().counters_mut(&handle.id).frames += 1;
        Ok(())
    }
}
