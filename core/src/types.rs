use bitflags::bitflags;

/// A position in screen or client coordinates, depending on context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

bitflags! {
    /// Mouse button and modifier key state carried with every drag notification.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyState: u32 {
        const LEFT_BUTTON = 1;
        const RIGHT_BUTTON = 1 << 1;
        const MIDDLE_BUTTON = 1 << 2;
        const SHIFT = 1 << 3;
        const CTRL = 1 << 4;
        const ALT = 1 << 5;
    }
}

impl KeyState {
    /// Any mouse button currently held.
    pub fn any_button(self) -> bool {
        self.intersects(Self::LEFT_BUTTON | Self::RIGHT_BUTTON | Self::MIDDLE_BUTTON)
    }
}

bitflags! {
    /// The operations a drag source permits, and the single operation a
    /// target reports back.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DropEffect: u32 {
        const COPY = 1;
        const MOVE = 1 << 1;
        const LINK = 1 << 2;
        const SCROLL = 1 << 31;
    }
}

impl DropEffect {
    /// No operation. Returned from a cancelled drag and from targets that
    /// reject the offered data.
    pub const NONE: Self = Self::empty();
}
