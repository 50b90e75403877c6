pub(crate) mod data_object;
pub(crate) mod file_list;
pub(crate) mod format;
pub(crate) mod host;
pub(crate) mod medium;
pub(crate) mod source;
pub(crate) mod target;
pub(crate) mod types;

pub use data_object::{DataError, DataObject, FormatEnumerator, TransferData};
pub use format::{
    Aspect, FIRST_CUSTOM_TAG, FormatDescriptor, FormatError, FormatTag, TransportKind,
    TransportMask, register_format, registered_format_name,
};
pub use host::{
    ContinueDecision, DragHost, DropSource, DropTarget, FeedbackDisposition, HostError,
    HostWindow, WindowHandle,
};
pub use medium::{
    Bitmap, ByteStream, MediumError, MemoryStream, OpaqueHandle, StorageMedium, StreamHandle,
};
pub use source::{DragSession, FeedbackEvent, QueryContinueEvent, SessionError};
pub use target::{DropEvent, DropRegistration, DropSession, RegisterError, default_effect};
pub use types::{DropEffect, KeyState, Point};
