use std::rc::Rc;

use haul_core::{HostWindow, Point, WindowHandle};

/// A window stand-in: a handle plus a screen-space origin for coordinate
/// conversion.
pub struct SimWindow {
    handle: WindowHandle,
    origin: Point,
}

impl SimWindow {
    pub fn new(handle: u64, origin: Point) -> Rc<Self> {
        Rc::new(Self {
            handle: WindowHandle(handle),
            origin,
        })
    }
}

impl HostWindow for SimWindow {
    fn handle(&self) -> WindowHandle {
        self.handle
    }

    fn screen_to_client(&self, point: Point) -> Point {
        Point::new(point.x - self.origin.x, point.y - self.origin.y)
    }
}
