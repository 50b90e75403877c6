//! Source-side controller for one drag gesture.
//!
//! `begin_drag` hands the transfer object to the host's modal drag loop and
//! blocks until the user drops or cancels. The loop re-enters this session
//! through the feedback and query-continue callbacks on the same thread;
//! starting a second drag from inside those callbacks is unsupported.

use std::cell::Cell;
use std::rc::{Rc, Weak};
use thiserror::Error;
use tracing::debug;

use crate::data_object::DataObject;
use crate::host::{ContinueDecision, DragHost, DropSource, FeedbackDisposition, HostError, HostWindow};
use crate::medium::Bitmap;
use crate::types::{DropEffect, KeyState, Point};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a drag is already in progress for this session")]
    DragInProgress,

    #[error("the originating window is gone")]
    DetachedWindow,

    #[error("host error: {0}")]
    Host(#[from] HostError),
}

/// Passed to the feedback callback as the candidate operation changes.
pub struct FeedbackEvent {
    effect: DropEffect,
    use_default_cursors: bool,
}

impl FeedbackEvent {
    pub fn effect(&self) -> DropEffect {
        self.effect
    }

    pub fn use_default_cursors(&self) -> bool {
        self.use_default_cursors
    }

    /// Marks the cursor as application-managed so the host does not override
    /// it with its default drag cursors.
    pub fn set_custom_cursor(&mut self) {
        self.use_default_cursors = false;
    }
}

/// Passed to the query-continue callback. `cancel` and `drop` arrive with
/// their computed defaults and may be overridden before returning.
pub struct QueryContinueEvent {
    escape_pressed: bool,
    keys: KeyState,
    cancel: bool,
    drop: bool,
}

impl QueryContinueEvent {
    pub fn escape_pressed(&self) -> bool {
        self.escape_pressed
    }

    pub fn keys(&self) -> KeyState {
        self.keys
    }

    pub fn cancel(&self) -> bool {
        self.cancel
    }

    pub fn set_cancel(&mut self, cancel: bool) {
        self.cancel = cancel;
    }

    pub fn will_drop(&self) -> bool {
        self.drop
    }

    pub fn set_drop(&mut self, drop: bool) {
        self.drop = drop;
    }
}

type FeedbackHandler = Box<dyn FnMut(&mut FeedbackEvent)>;
type QueryContinueHandler = Box<dyn FnMut(&mut QueryContinueEvent)>;

/// One drag gesture: Idle until [`DragSession::begin_drag`], Dragging for
/// the duration of the host loop, then back to Idle with the terminal state
/// observed as the returned effect (`NONE` means cancelled).
pub struct DragSession {
    window: Weak<dyn HostWindow>,
    on_give_feedback: Option<FeedbackHandler>,
    on_query_continue: Option<QueryContinueHandler>,
    dragging: Cell<bool>,
}

impl DragSession {
    pub fn new(window: &Rc<dyn HostWindow>) -> Self {
        Self {
            window: Rc::downgrade(window),
            on_give_feedback: None,
            on_query_continue: None,
            dragging: Cell::new(false),
        }
    }

    pub fn on_give_feedback(&mut self, handler: impl FnMut(&mut FeedbackEvent) + 'static) {
        self.on_give_feedback = Some(Box::new(handler));
    }

    pub fn on_query_continue(&mut self, handler: impl FnMut(&mut QueryContinueEvent) + 'static) {
        self.on_query_continue = Some(Box::new(handler));
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging.get()
    }

    /// Drives the host's modal drag loop with `data` and the allowed
    /// operations mask. Returns the operation the target performed, or
    /// [`DropEffect::NONE`] when the gesture was cancelled.
    ///
    /// With `image`, a drag cursor image is tracked for the duration of the
    /// loop and ended even on an early exit.
    pub fn begin_drag(
        &mut self,
        host: &dyn DragHost,
        data: Rc<DataObject>,
        allowed: DropEffect,
        image: Option<(Bitmap, Point)>,
    ) -> Result<DropEffect, SessionError> {
        if self.dragging.get() {
            debug_assert!(false, "begin_drag re-entered while a drag is in progress");
            return Err(SessionError::DragInProgress);
        }
        if self.window.upgrade().is_none() {
            debug_assert!(false, "drag started from a destroyed window");
            return Err(SessionError::DetachedWindow);
        }

        self.dragging.set(true);
        let result = self.drive(host, data, allowed, image);
        self.dragging.set(false);
        result
    }

    fn drive(
        &mut self,
        host: &dyn DragHost,
        data: Rc<DataObject>,
        allowed: DropEffect,
        image: Option<(Bitmap, Point)>,
    ) -> Result<DropEffect, SessionError> {
        let _image_guard = match image {
            Some((bitmap, hotspot)) => {
                host.begin_drag_image(&bitmap, hotspot)?;
                Some(ImageGuard { host })
            }
            None => None,
        };

        match host.do_drag(Rc::clone(&data), self, allowed) {
            Ok(effect) => Ok(effect),
            Err(HostError::Uninitialized) => {
                // One-time lazy initialization of the transport, then a
                // single retry. A second failure is a caller/environment
                // defect.
                debug!("drag transport uninitialized, initializing and retrying");
                host.ensure_init()?;
                match host.do_drag(data, self, allowed) {
                    Ok(effect) => Ok(effect),
                    Err(err) => {
                        debug_assert!(false, "drag transport failed after init: {err}");
                        Err(err.into())
                    }
                }
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl DropSource for DragSession {
    fn query_continue(&mut self, escape_pressed: bool, keys: KeyState) -> ContinueDecision {
        let mut event = QueryContinueEvent {
            escape_pressed,
            keys,
            cancel: escape_pressed
                || keys.contains(KeyState::LEFT_BUTTON | KeyState::RIGHT_BUTTON),
            drop: !keys.any_button(),
        };
        if let Some(handler) = &mut self.on_query_continue {
            handler(&mut event);
        }

        if event.cancel {
            ContinueDecision::Cancel
        } else if event.drop {
            ContinueDecision::Drop
        } else {
            ContinueDecision::Continue
        }
    }

    fn give_feedback(&mut self, effect: DropEffect) -> FeedbackDisposition {
        let mut event = FeedbackEvent {
            effect,
            use_default_cursors: true,
        };
        if let Some(handler) = &mut self.on_give_feedback {
            handler(&mut event);
        }

        if event.use_default_cursors {
            FeedbackDisposition::DefaultCursors
        } else {
            FeedbackDisposition::CustomCursor
        }
    }
}

/// Ends the drag image when the drive call unwinds, drop or cancel alike.
struct ImageGuard<'a> {
    host: &'a dyn DragHost,
}

impl Drop for ImageGuard<'_> {
    fn drop(&mut self) {
        self.host.end_drag_image();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::WindowHandle;

    struct FixedWindow;

    impl HostWindow for FixedWindow {
        fn handle(&self) -> WindowHandle {
            WindowHandle(1)
        }

        fn screen_to_client(&self, point: Point) -> Point {
            point
        }
    }

    fn session() -> (DragSession, Rc<dyn HostWindow>) {
        let window: Rc<dyn HostWindow> = Rc::new(FixedWindow);
        (DragSession::new(&window), window)
    }

    #[test]
    fn test_query_continue_defaults() {
        let (mut session, _window) = session();

        // No buttons held: drop.
        assert_eq!(
            session.query_continue(false, KeyState::empty()),
            ContinueDecision::Drop
        );
        // Primary button held: continue.
        assert_eq!(
            session.query_continue(false, KeyState::LEFT_BUTTON),
            ContinueDecision::Continue
        );
        // Escape: cancel.
        assert_eq!(
            session.query_continue(true, KeyState::LEFT_BUTTON),
            ContinueDecision::Cancel
        );
        // Both primary and secondary buttons: cancel.
        assert_eq!(
            session.query_continue(false, KeyState::LEFT_BUTTON | KeyState::RIGHT_BUTTON),
            ContinueDecision::Cancel
        );
    }

    #[test]
    fn test_query_continue_override() {
        let (mut session, _window) = session();
        session.on_query_continue(|event| {
            event.set_drop(false);
            event.set_cancel(true);
        });

        assert_eq!(
            session.query_continue(false, KeyState::empty()),
            ContinueDecision::Cancel
        );
    }

    #[test]
    fn test_custom_cursor_clears_default_flag() {
        let (mut session, _window) = session();
        assert_eq!(
            session.give_feedback(DropEffect::COPY),
            FeedbackDisposition::DefaultCursors
        );

        session.on_give_feedback(|event| {
            assert_eq!(event.effect(), DropEffect::MOVE);
            event.set_custom_cursor();
        });
        assert_eq!(
            session.give_feedback(DropEffect::MOVE),
            FeedbackDisposition::CustomCursor
        );
    }
}
