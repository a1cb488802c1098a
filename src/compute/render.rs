//! Incremental partition renderer.
//!
//! Each worker draws only its own rows onto a canvas it owns exclusively.
//! A cell is touched only when `current()` differs from `lastRendered`, so
//! steady-state cost scales with the number of changed cells.

use std::io::{self, Write};
use std::sync::atomic::Ordering;

use serde::{Deserialize, Serialize};

use super::{DEAD, GridState, Partition, RenderPhase};

/// RGBA pixel.
pub type Rgba = [u8; 4];

/// Fully transparent pixel.
pub const TRANSPARENT: Rgba = [0, 0, 0, 0];

/// Precomputed square image of one live cell: a filled circle with padding.
#[derive(Debug, Clone, PartialEq)]
pub struct Stamp {
    size: u32,
    pixels: Vec<Rgba>,
}

impl Stamp {
    /// Render the stamp for a cell of `size` pixels.
    ///
    /// `padding` is a fraction of `size` left empty around the circle. The
    /// radius never drops below half a pixel so tiny cells stay visible.
    pub fn new(size: u32, padding: f32, color: Rgba) -> Self {
        let half = size as f32 / 2.0;
        let radius = (half - padding * size as f32).max(0.5);
        let radius_sq = radius * radius;

        let mut pixels = vec![TRANSPARENT; (size * size) as usize];
        for py in 0..size {
            for px in 0..size {
                let dx = px as f32 + 0.5 - half;
                let dy = py as f32 + 0.5 - half;
                if dx * dx + dy * dy <= radius_sq {
                    pixels[(py * size + px) as usize] = color;
                }
            }
        }

        Self { size, pixels }
    }

    #[inline]
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Row-major stamp pixels.
    #[inline]
    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }
}

/// Geometry of one partition's drawing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceSpec {
    /// Surface width in pixels.
    pub width: u32,
    /// Surface height in pixels.
    pub height: u32,
    /// Vertical pixel offset of this surface within the full frame.
    pub origin_y: u32,
    /// Full frame width in pixels.
    pub frame_width: u32,
    /// Full frame height in pixels.
    pub frame_height: u32,
}

impl SurfaceSpec {
    /// Surface covering `partition` of a `grid_width`-wide grid.
    pub fn for_partition(
        partition: Partition,
        grid_width: usize,
        grid_height: usize,
        cell_size: u32,
    ) -> Self {
        Self {
            width: grid_width as u32 * cell_size,
            height: partition.row_count(grid_width) as u32 * cell_size,
            origin_y: partition.first_row(grid_width) as u32 * cell_size,
            frame_width: grid_width as u32 * cell_size,
            frame_height: grid_height as u32 * cell_size,
        }
    }
}

/// Drawing surface owned by one worker.
pub trait Canvas: Send + 'static {
    /// Allocate a blank surface.
    fn allocate(spec: &SurfaceSpec) -> Self
    where
        Self: Sized;

    /// Copy `stamp` with its top-left corner at (x, y).
    fn stamp(&mut self, x: u32, y: u32, stamp: &Stamp);

    /// Reset a rectangle to transparent.
    fn clear_rect(&mut self, x: u32, y: u32, width: u32, height: u32);
}

/// In-memory RGBA surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    spec: SurfaceSpec,
    pixels: Vec<Rgba>,
}

impl Surface {
    #[inline]
    pub fn spec(&self) -> &SurfaceSpec {
        &self.spec
    }

    /// Pixel at (x, y) in surface coordinates.
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        self.pixels[(y * self.spec.width + x) as usize]
    }

    #[inline]
    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }
}

impl Canvas for Surface {
    fn allocate(spec: &SurfaceSpec) -> Self {
        Self {
            spec: *spec,
            pixels: vec![TRANSPARENT; (spec.width * spec.height) as usize],
        }
    }

    fn stamp(&mut self, x: u32, y: u32, stamp: &Stamp) {
        let size = stamp.size();
        let w = size.min(self.spec.width.saturating_sub(x));
        let h = size.min(self.spec.height.saturating_sub(y));
        for row in 0..h {
            let src = (row * size) as usize;
            let dst = ((y + row) * self.spec.width + x) as usize;
            self.pixels[dst..dst + w as usize]
                .copy_from_slice(&stamp.pixels()[src..src + w as usize]);
        }
    }

    fn clear_rect(&mut self, x: u32, y: u32, width: u32, height: u32) {
        let w = width.min(self.spec.width.saturating_sub(x));
        let h = height.min(self.spec.height.saturating_sub(y));
        for row in 0..h {
            let dst = ((y + row) * self.spec.width + x) as usize;
            self.pixels[dst..dst + w as usize].fill(TRANSPARENT);
        }
    }
}

/// Work done by one `draw` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawStats {
    pub stamped: usize,
    pub cleared: usize,
}

impl DrawStats {
    /// Total cells touched.
    #[inline]
    pub fn touched(&self) -> usize {
        self.stamped + self.cleared
    }
}

/// Renderer for one partition.
pub struct PartitionedRenderer<C: Canvas> {
    canvas: C,
    stamp: Stamp,
    cell_size: u32,
    first_row: usize,
}

impl<C: Canvas> PartitionedRenderer<C> {
    /// Allocate the canvas and stamp for `partition`.
    pub fn new(
        grid: &GridState,
        partition: Partition,
        cell_size: u32,
        padding: f32,
        color: Rgba,
    ) -> Self {
        let spec = SurfaceSpec::for_partition(partition, grid.width(), grid.height(), cell_size);
        Self {
            canvas: C::allocate(&spec),
            stamp: Stamp::new(cell_size, padding, color),
            cell_size,
            first_row: partition.first_row(grid.width()),
        }
    }

    /// Force every cell of `partition` to redraw on the next `draw`.
    pub fn invalidate(&self, grid: &GridState, partition: Partition) {
        grid.mark_stale(partition.range());
    }

    /// Draw the cells of `partition` that changed since the last draw.
    pub fn draw(&mut self, grid: &GridState, partition: Partition, _phase: RenderPhase) -> DrawStats {
        let current = grid.current();
        let last = grid.last_rendered();
        let mut stats = DrawStats::default();

        for idx in partition.range() {
            let value = current[idx].load(Ordering::Relaxed);
            if last[idx].load(Ordering::Relaxed) == value {
                continue;
            }

            let (x, y) = grid.coords(idx);
            let px = x as u32 * self.cell_size;
            let py = (y - self.first_row) as u32 * self.cell_size;
            if value != DEAD {
                self.canvas.stamp(px, py, &self.stamp);
                stats.stamped += 1;
            } else {
                self.canvas
                    .clear_rect(px, py, self.cell_size, self.cell_size);
                stats.cleared += 1;
            }
            last[idx].store(value, Ordering::Relaxed);
        }

        stats
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn into_canvas(self) -> C {
        self.canvas
    }
}

/// Full frame stitched together from partition surfaces.
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<Rgba>,
}

impl Frame {
    /// Compose partition surfaces into one frame.
    pub fn compose<'a>(surfaces: impl IntoIterator<Item = &'a Surface>) -> Self {
        let mut frame = Self {
            width: 0,
            height: 0,
            pixels: Vec::new(),
        };

        for surface in surfaces {
            let spec = surface.spec();
            if frame.pixels.is_empty() {
                frame.width = spec.frame_width;
                frame.height = spec.frame_height;
                frame.pixels = vec![TRANSPARENT; (spec.frame_width * spec.frame_height) as usize];
            }
            let start = (spec.origin_y * frame.width) as usize;
            let len = surface.pixels().len();
            frame.pixels[start..start + len].copy_from_slice(surface.pixels());
        }

        frame
    }

    /// Write as binary PPM, blending onto `background`.
    pub fn write_ppm<W: Write>(&self, w: &mut W, background: [u8; 3]) -> io::Result<()> {
        write!(w, "P6\n{} {}\n255\n", self.width, self.height)?;
        let mut row = Vec::with_capacity(self.width as usize * 3);
        for line in self.pixels.chunks(self.width.max(1) as usize) {
            row.clear();
            for &[r, g, b, a] in line {
                let alpha = a as u16;
                let blend = |fg: u8, bg: u8| -> u8 {
                    ((fg as u16 * alpha + bg as u16 * (255 - alpha)) / 255) as u8
                };
                row.extend_from_slice(&[
                    blend(r, background[0]),
                    blend(g, background[1]),
                    blend(b, background[2]),
                ]);
            }
            w.write_all(&row)?;
        }
        Ok(())
    }
}
