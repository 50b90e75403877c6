use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use tracing::{debug, trace};

use haul_core::{
    Bitmap, ContinueDecision, DataObject, DragHost, DropEffect, DropSource, DropTarget,
    HostError, KeyState, Point, WindowHandle,
};

/// One unit of scripted pointer input: where the cursor is, what is held,
/// and which window is under it.
#[derive(Debug, Clone)]
pub struct PointerStep {
    pub position: Point,
    pub keys: KeyState,
    pub escape: bool,
    pub window: Option<WindowHandle>,
}

impl PointerStep {
    /// A step over `window` with the primary button held.
    pub fn over(window: WindowHandle, position: Point) -> Self {
        Self {
            position,
            keys: KeyState::LEFT_BUTTON,
            escape: false,
            window: Some(window),
        }
    }

    /// A step outside every registered window, primary button held.
    pub fn outside(position: Point) -> Self {
        Self {
            position,
            keys: KeyState::LEFT_BUTTON,
            escape: false,
            window: None,
        }
    }

    /// A button-release step: the source's default decision is to drop.
    pub fn release(window: WindowHandle, position: Point) -> Self {
        Self {
            position,
            keys: KeyState::empty(),
            escape: false,
            window: Some(window),
        }
    }

    /// An escape-key step: the source's default decision is to cancel.
    pub fn escape(window: Option<WindowHandle>, position: Point) -> Self {
        Self {
            position,
            keys: KeyState::LEFT_BUTTON,
            escape: true,
            window,
        }
    }

    pub fn with_keys(mut self, keys: KeyState) -> Self {
        self.keys = keys;
        self
    }
}

/// In-process drag-and-drop transport: drop-target registry plus a scripted
/// pointer pump standing in for the platform's modal loop.
///
/// Everything runs on the calling thread; `do_drag` blocks its caller and
/// re-enters it only through the source and target callbacks, mirroring a
/// nested event loop.
#[derive(Default)]
pub struct LocalHost {
    initialized: Cell<bool>,
    targets: RefCell<HashMap<WindowHandle, Rc<dyn DropTarget>>>,
    script: RefCell<VecDeque<PointerStep>>,
    image_active: Cell<bool>,
    image_trace: RefCell<Vec<Point>>,
}

impl LocalHost {
    /// A host whose transport is not yet initialized; the first drag goes
    /// through the session's lazy-init retry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues one pointer step for the next drag loop.
    pub fn push_step(&self, step: PointerStep) {
        self.script.borrow_mut().push_back(step);
    }

    pub fn script(&self, steps: impl IntoIterator<Item = PointerStep>) {
        self.script.borrow_mut().extend(steps);
    }

    pub fn has_target(&self, window: WindowHandle) -> bool {
        self.targets.borrow().contains_key(&window)
    }

    pub fn image_active(&self) -> bool {
        self.image_active.get()
    }

    /// Positions the drag image was moved through, in order.
    pub fn image_trace(&self) -> Vec<Point> {
        self.image_trace.borrow().clone()
    }

    fn target_for(&self, window: Option<WindowHandle>) -> Option<Rc<dyn DropTarget>> {
        self.targets.borrow().get(&window?).cloned()
    }
}

impl DragHost for LocalHost {
    fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    fn ensure_init(&self) -> Result<(), HostError> {
        if !self.initialized.get() {
            debug!("initializing local drag transport");
            self.initialized.set(true);
        }
        Ok(())
    }

    fn register_drop_target(
        &self,
        window: WindowHandle,
        target: Rc<dyn DropTarget>,
    ) -> Result<(), HostError> {
        if window.is_null() {
            return Err(HostError::DeadWindow);
        }
        // Registration initializes the transport on demand.
        self.ensure_init()?;

        let mut targets = self.targets.borrow_mut();
        if targets.contains_key(&window) {
            return Err(HostError::AlreadyRegistered);
        }
        targets.insert(window, target);
        Ok(())
    }

    fn revoke_drop_target(&self, window: WindowHandle) -> Result<(), HostError> {
        match self.targets.borrow_mut().remove(&window) {
            Some(_) => Ok(()),
            None => Err(HostError::NotRegistered),
        }
    }

    fn do_drag(
        &self,
        data: Rc<DataObject>,
        source: &mut dyn DropSource,
        allowed: DropEffect,
    ) -> Result<DropEffect, HostError> {
        if !self.initialized.get() {
            return Err(HostError::Uninitialized);
        }

        let mut hovered: Option<WindowHandle> = None;
        let mut last_effect = DropEffect::NONE;
        let mut last_position = Point::default();

        loop {
            let scripted = self.script.borrow_mut().pop_front();
            let exhausted = scripted.is_none();
            // An exhausted script reads as a button release at the last
            // position, so an unscripted end of input resolves to a drop.
            let step = scripted.unwrap_or(PointerStep {
                position: last_position,
                keys: KeyState::empty(),
                escape: false,
                window: hovered,
            });
            last_position = step.position;

            match source.query_continue(step.escape, step.keys) {
                ContinueDecision::Cancel => {
                    trace!("drag cancelled");
                    if let Some(target) = self.target_for(hovered) {
                        target.drag_leave();
                    }
                    return Ok(DropEffect::NONE);
                }
                ContinueDecision::Drop => {
                    let Some(target) = self.target_for(hovered) else {
                        trace!("drop with no target under the cursor");
                        return Ok(DropEffect::NONE);
                    };
                    let effect =
                        target.drag_drop(Rc::clone(&data), step.keys, step.position, allowed);
                    trace!(?effect, "drop delivered");
                    return Ok(effect);
                }
                ContinueDecision::Continue => {
                    if exhausted {
                        // The application's override kept the loop alive
                        // with no input left to consume.
                        return Err(HostError::Transport(
                            "pointer script exhausted while drag continues".into(),
                        ));
                    }

                    if hovered != step.window {
                        if let Some(target) = self.target_for(hovered) {
                            target.drag_leave();
                        }
                        hovered = step.window;
                        last_effect = match self.target_for(hovered) {
                            Some(target) => target.drag_enter(
                                Rc::clone(&data),
                                step.keys,
                                step.position,
                                allowed,
                            ),
                            None => DropEffect::NONE,
                        };
                    } else if let Some(target) = self.target_for(hovered) {
                        last_effect = target.drag_over(step.keys, step.position, allowed);
                    }

                    if self.image_active.get() {
                        self.move_drag_image(step.position);
                    }
                    let _ = source.give_feedback(last_effect);
                }
            }
        }
    }

    fn begin_drag_image(&self, _image: &Bitmap, hotspot: Point) -> Result<(), HostError> {
        debug_assert!(!self.image_active.get(), "drag image already active");
        self.image_active.set(true);
        self.image_trace.borrow_mut().push(hotspot);
        Ok(())
    }

    fn move_drag_image(&self, position: Point) {
        if self.image_active.get() {
            self.image_trace.borrow_mut().push(position);
        }
    }

    fn end_drag_image(&self) {
        self.image_active.set(false);
    }
}
