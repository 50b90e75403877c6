//! Target-side handler registered on a window to receive drag-over and drop
//! notifications.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use thiserror::Error;
use tracing::debug;

use crate::data_object::DataObject;
use crate::host::{DragHost, DropTarget, HostError, HostWindow, WindowHandle};
use crate::types::{DropEffect, KeyState, Point};

#[derive(Debug, Error)]
pub enum RegisterError {
    #[error("window has not been created")]
    WindowNotCreated,

    #[error("a drop target is already registered on the window")]
    AlreadyRegistered,

    #[error("host error: {0}")]
    Host(HostError),
}

impl From<HostError> for RegisterError {
    fn from(err: HostError) -> Self {
        match err {
            HostError::AlreadyRegistered => Self::AlreadyRegistered,
            HostError::DeadWindow => Self::WindowNotCreated,
            other => Self::Host(other),
        }
    }
}

/// Computes the conventional default operation from modifier state:
/// ctrl+shift or alt alone requests a link, ctrl alone a copy, anything
/// else a move, each intersected with the source's allowed mask.
pub fn default_effect(keys: KeyState, allowed: DropEffect) -> DropEffect {
    let modifiers = keys & (KeyState::CTRL | KeyState::SHIFT | KeyState::ALT);
    let wanted = if modifiers == KeyState::CTRL | KeyState::SHIFT || modifiers == KeyState::ALT {
        DropEffect::LINK
    } else if modifiers.contains(KeyState::CTRL) {
        DropEffect::COPY
    } else {
        DropEffect::MOVE
    };
    wanted & allowed
}

/// Carried by the enter, over and drop notifications. `effect` arrives as
/// the computed default and may be overridden by the handler.
pub struct DropEvent {
    data: Option<Rc<DataObject>>,
    keys: KeyState,
    position: Point,
    allowed: DropEffect,
    effect: DropEffect,
}

impl DropEvent {
    /// The transfer object being dragged, when one is attached.
    pub fn data(&self) -> Option<&Rc<DataObject>> {
        self.data.as_ref()
    }

    pub fn keys(&self) -> KeyState {
        self.keys
    }

    /// Cursor position in the target window's client coordinates.
    pub fn position(&self) -> Point {
        self.position
    }

    /// Operations the source permits.
    pub fn allowed(&self) -> DropEffect {
        self.allowed
    }

    pub fn effect(&self) -> DropEffect {
        self.effect
    }

    pub fn set_effect(&mut self, effect: DropEffect) {
        self.effect = effect & self.allowed;
    }
}

type DropHandler = Box<dyn FnMut(&mut DropEvent)>;
type LeaveHandler = Box<dyn FnMut()>;

/// Per-window drop handler. Caches the transfer object from enter through
/// drop or leave so the over notification, which carries no object, can
/// still expose it.
pub struct DropSession {
    window: Weak<dyn HostWindow>,
    on_enter: RefCell<Option<DropHandler>>,
    on_over: RefCell<Option<DropHandler>>,
    on_leave: RefCell<Option<LeaveHandler>>,
    on_drop: RefCell<Option<DropHandler>>,
    last_data: RefCell<Option<Rc<DataObject>>>,
}

impl DropSession {
    pub fn new(window: &Rc<dyn HostWindow>) -> Rc<Self> {
        Rc::new(Self {
            window: Rc::downgrade(window),
            on_enter: RefCell::new(None),
            on_over: RefCell::new(None),
            on_leave: RefCell::new(None),
            on_drop: RefCell::new(None),
            last_data: RefCell::new(None),
        })
    }

    pub fn on_enter(&self, handler: impl FnMut(&mut DropEvent) + 'static) {
        *self.on_enter.borrow_mut() = Some(Box::new(handler));
    }

    pub fn on_over(&self, handler: impl FnMut(&mut DropEvent) + 'static) {
        *self.on_over.borrow_mut() = Some(Box::new(handler));
    }

    pub fn on_leave(&self, handler: impl FnMut() + 'static) {
        *self.on_leave.borrow_mut() = Some(Box::new(handler));
    }

    pub fn on_drop(&self, handler: impl FnMut(&mut DropEvent) + 'static) {
        *self.on_drop.borrow_mut() = Some(Box::new(handler));
    }

    /// The transfer object cached since the last enter, cleared on leave
    /// and drop.
    pub fn last_data(&self) -> Option<Rc<DataObject>> {
        self.last_data.borrow().clone()
    }

    fn dispatch(
        &self,
        slot: &RefCell<Option<DropHandler>>,
        data: Option<Rc<DataObject>>,
        keys: KeyState,
        position: Point,
        allowed: DropEffect,
    ) -> DropEffect {
        let position = match self.window.upgrade() {
            Some(window) => window.screen_to_client(position),
            None => {
                debug_assert!(false, "drop notification after the window was destroyed");
                position
            }
        };

        let mut event = DropEvent {
            data,
            keys,
            position,
            allowed,
            effect: default_effect(keys, allowed),
        };
        if let Some(handler) = slot.borrow_mut().as_mut() {
            handler(&mut event);
        }
        event.effect
    }
}

impl DropTarget for DropSession {
    fn drag_enter(
        &self,
        data: Rc<DataObject>,
        keys: KeyState,
        position: Point,
        allowed: DropEffect,
    ) -> DropEffect {
        *self.last_data.borrow_mut() = Some(Rc::clone(&data));
        self.dispatch(&self.on_enter, Some(data), keys, position, allowed)
    }

    fn drag_over(&self, keys: KeyState, position: Point, allowed: DropEffect) -> DropEffect {
        let data = self.last_data.borrow().clone();
        self.dispatch(&self.on_over, data, keys, position, allowed)
    }

    fn drag_leave(&self) {
        if let Some(handler) = self.on_leave.borrow_mut().as_mut() {
            handler();
        }
        self.last_data.borrow_mut().take();
    }

    fn drag_drop(
        &self,
        data: Rc<DataObject>,
        keys: KeyState,
        position: Point,
        allowed: DropEffect,
    ) -> DropEffect {
        let effect = self.dispatch(&self.on_drop, Some(data), keys, position, allowed);
        self.last_data.borrow_mut().take();
        effect
    }
}

/// Registration of a [`DropSession`] with the host, scoped to the window's
/// lifetime. Must be revoked before the window is destroyed; dropping an
/// active registration revokes it and asserts the window is still alive.
pub struct DropRegistration<'h> {
    host: &'h dyn DragHost,
    window: Weak<dyn HostWindow>,
    handle: WindowHandle,
    active: bool,
}

impl<'h> DropRegistration<'h> {
    pub fn register(
        host: &'h dyn DragHost,
        window: &Rc<dyn HostWindow>,
        session: Rc<DropSession>,
    ) -> Result<Self, RegisterError> {
        let handle = window.handle();
        if handle.is_null() {
            debug_assert!(false, "registering a drop target on an uncreated window");
            return Err(RegisterError::WindowNotCreated);
        }

        host.register_drop_target(handle, session)?;
        debug!(window = handle.0, "drop target registered");
        Ok(Self {
            host,
            window: Rc::downgrade(window),
            handle,
            active: true,
        })
    }

    pub fn window_handle(&self) -> WindowHandle {
        self.handle
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Explicitly unregisters from the host.
    pub fn revoke(mut self) -> Result<(), RegisterError> {
        self.revoke_inner()
    }

    fn revoke_inner(&mut self) -> Result<(), RegisterError> {
        if !self.active {
            return Ok(());
        }
        self.active = false;
        self.host.revoke_drop_target(self.handle)?;
        debug!(window = self.handle.0, "drop target revoked");
        Ok(())
    }
}

impl Drop for DropRegistration<'_> {
    fn drop(&mut self) {
        if self.active {
            debug_assert!(
                self.window.upgrade().is_some(),
                "drop registration outlived its window"
            );
            let _ = self.revoke_inner();
        }
    }
}
