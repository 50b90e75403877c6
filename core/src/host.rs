//! The host boundary: the contract between the protocol objects and the
//! environment that pumps pointer events and owns windows.
//!
//! The host is treated as a black box. It drives the modal drag loop behind
//! [`DragHost::do_drag`], calling back into the session's [`DropSource`] and
//! into whatever [`DropTarget`] is registered for the hovered window, all on
//! the calling thread.

use std::rc::Rc;
use thiserror::Error;

use crate::data_object::DataObject;
use crate::medium::Bitmap;
use crate::types::{DropEffect, KeyState, Point};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("host transport is not initialized")]
    Uninitialized,

    #[error("a drop target is already registered for this window")]
    AlreadyRegistered,

    #[error("no drop target is registered for this window")]
    NotRegistered,

    #[error("window handle is null or destroyed")]
    DeadWindow,

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Opaque identifier for a host window. Zero means "not created".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowHandle(pub u64);

impl WindowHandle {
    pub const NULL: Self = Self(0);

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Window abstraction consumed at the boundary: a stable handle and
/// screen-to-client coordinate conversion.
pub trait HostWindow {
    fn handle(&self) -> WindowHandle;

    fn screen_to_client(&self, point: Point) -> Point;
}

/// Source-side decision returned from [`DropSource::query_continue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinueDecision {
    Continue,
    Cancel,
    Drop,
}

/// Whether the host should show its default drag cursors or leave the
/// cursor to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedbackDisposition {
    DefaultCursors,
    CustomCursor,
}

/// Source-side callbacks invoked by the host during the drag loop.
pub trait DropSource {
    /// Polled cancellation checkpoint: decides whether the gesture
    /// continues, cancels, or drops based on input state.
    fn query_continue(&mut self, escape_pressed: bool, keys: KeyState) -> ContinueDecision;

    /// Invoked as the candidate operation changes.
    fn give_feedback(&mut self, effect: DropEffect) -> FeedbackDisposition;
}

/// Target-side callbacks invoked by the host for the window under the
/// cursor. For one gesture the order is strictly
/// enter, over*, then exactly one of drop or leave.
pub trait DropTarget {
    fn drag_enter(
        &self,
        data: Rc<DataObject>,
        keys: KeyState,
        position: Point,
        allowed: DropEffect,
    ) -> DropEffect;

    fn drag_over(&self, keys: KeyState, position: Point, allowed: DropEffect) -> DropEffect;

    fn drag_leave(&self);

    fn drag_drop(
        &self,
        data: Rc<DataObject>,
        keys: KeyState,
        position: Point,
        allowed: DropEffect,
    ) -> DropEffect;
}

/// The host's data-transfer transport.
pub trait DragHost {
    fn is_initialized(&self) -> bool;

    /// Initializes the transport. Safe to call when already initialized.
    fn ensure_init(&self) -> Result<(), HostError>;

    /// Registers `target` to receive notifications for `window`. Fails if a
    /// target is already registered there.
    fn register_drop_target(
        &self,
        window: WindowHandle,
        target: Rc<dyn DropTarget>,
    ) -> Result<(), HostError>;

    fn revoke_drop_target(&self, window: WindowHandle) -> Result<(), HostError>;

    /// Drives the modal drag loop to completion. Blocks the calling thread,
    /// re-entering it only through the source and target callbacks. Returns
    /// the effect of the drop, or [`DropEffect::NONE`] when cancelled.
    fn do_drag(
        &self,
        data: Rc<DataObject>,
        source: &mut dyn DropSource,
        allowed: DropEffect,
    ) -> Result<DropEffect, HostError>;

    /// Starts tracking a drag cursor image. Must be balanced by
    /// [`DragHost::end_drag_image`].
    fn begin_drag_image(&self, image: &Bitmap, hotspot: Point) -> Result<(), HostError>;

    fn move_drag_image(&self, position: Point);

    fn end_drag_image(&self);
}
