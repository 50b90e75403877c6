//! In-process drag-and-drop host.
//!
//! [`LocalHost`] implements the `haul_core` host boundary as an explicit
//! single-threaded state machine: a scripted queue of pointer steps stands
//! in for the platform's event pump. `do_drag` consumes the script, polling
//! the source's query-continue checkpoint and delivering the ordered target
//! notifications (enter, over*, then exactly one of drop or leave) to
//! whatever target is registered for the hovered window.
//!
//! The host starts uninitialized, so a session's first drag exercises the
//! lazy-initialization retry path exactly as a real transport would.

pub(crate) mod pump;
pub(crate) mod window;

pub use pump::{LocalHost, PointerStep};
pub use window::SimWindow;
