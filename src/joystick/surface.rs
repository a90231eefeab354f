//! Knob geometry for the screen joystick
//!
//! The knob lives on a rectangular surface derived from the background image:
//! half the image width/height is the travel range on each axis, and the knob
//! can never leave `center ± range`. Positions are reported as signed
//! percentages of that range with the Y axis flipped so that "up" is positive.
//!
//! ```text
//!                 (0, 100)
//!    (-100, 0)     (0, 0)     (100, 0)
//!                 (0, -100)
//! ```

use tracing::debug;

/// Largest image side accepted for a joystick surface (pixels)
pub const MAX_SURFACE_SIDE: u32 = 1 << 16;

/// Errors raised while building a joystick surface
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("Surface {width}x{height} is degenerate, both sides need at least 2 pixels")]
    Degenerate { width: u32, height: u32 },

    #[error("Surface {width}x{height} centered at ({center_x}, {center_y}) exceeds the coordinate space")]
    OutOfRange {
        width: u32,
        height: u32,
        center_x: i32,
        center_y: i32,
    },
}

/// A pixel coordinate in the input surface's own space
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Bounded knob state owned by the pointer mapper
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KnobState {
    center: Point,
    range_x: i32,
    range_y: i32,
    position: Point,
}

impl KnobState {
    /// Builds the knob for a background image of `width` x `height` pixels
    /// drawn around `center`. The knob starts at the center.
    pub fn new(center: Point, width: u32, height: u32) -> Result<Self, SurfaceError> {
        if width < 2 || height < 2 {
            return Err(SurfaceError::Degenerate { width, height });
        }

        let out_of_range = SurfaceError::OutOfRange {
            width,
            height,
            center_x: center.x,
            center_y: center.y,
        };
        if width > MAX_SURFACE_SIDE || height > MAX_SURFACE_SIDE {
            return Err(out_of_range);
        }

        let range_x = (width / 2) as i32;
        let range_y = (height / 2) as i32;

        // Both corners have to be representable so clamping never overflows
        let corners = [
            center.x.checked_sub(range_x),
            center.x.checked_add(range_x),
            center.y.checked_sub(range_y),
            center.y.checked_add(range_y),
        ];
        if corners.iter().any(Option::is_none) {
            return Err(out_of_range);
        }

        debug!(
            "Joystick surface {}x{} centered at ({}, {}), range ({}, {})",
            width, height, center.x, center.y, range_x, range_y
        );

        Ok(Self {
            center,
            range_x,
            range_y,
            position: center,
        })
    }

    /// Builds the knob centered on the image itself (`width / 2`, `height / 2`)
    pub fn centered(width: u32, height: u32) -> Result<Self, SurfaceError> {
        let center = Point::new((width / 2) as i32, (height / 2) as i32);
        Self::new(center, width, height)
    }

    pub fn center(&self) -> Point {
        self.center
    }

    /// Half-extents of the surface as `(range_x, range_y)`
    pub fn range(&self) -> (i32, i32) {
        (self.range_x, self.range_y)
    }

    pub fn position(&self) -> Point {
        self.position
    }

    /// Lower-left and upper-right corners in raw coordinates
    pub fn bounds(&self) -> (Point, Point) {
        (
            Point::new(self.center.x - self.range_x, self.center.y - self.range_y),
            Point::new(self.center.x + self.range_x, self.center.y + self.range_y),
        )
    }

    /// Clamps each axis independently into `center ± range`.
    ///
    /// The reachable area is a square (rectangle), so diagonal drags can reach
    /// the corners.
    pub fn clamp(&self, raw: Point) -> Point {
        let (min, max) = self.bounds();
        Point::new(raw.x.clamp(min.x, max.x), raw.y.clamp(min.y, max.y))
    }

    /// Signed percentage of range from center, truncated toward zero
    pub fn percent_of(&self, point: Point) -> (i32, i32) {
        let px = (point.x - self.center.x) as f64 / self.range_x as f64 * 100.0;
        let py = (self.center.y - point.y) as f64 / self.range_y as f64 * 100.0;
        // `as` truncates toward zero
        (px as i32, py as i32)
    }

    /// Percentages of the current knob position
    pub fn percent(&self) -> (i32, i32) {
        self.percent_of(self.position)
    }

    /// Moves the knob to an already clamped point and returns the displacement
    pub(crate) fn move_to(&mut self, target: Point) -> (i32, i32) {
        let dx = target.x - self.position.x;
        let dy = target.y - self.position.y;
        self.position = target;
        (dx, dy)
    }

    /// Puts the knob back on the center and returns the displacement
    pub(crate) fn recenter(&mut self) -> (i32, i32) {
        self.move_to(self.center)
    }
}
