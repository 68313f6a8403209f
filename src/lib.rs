//! Rift buffer core - piece-table text storage with transactional edits,
//! undo/redo history, position patching and incremental line-break
//! interpretation

pub mod buffer;
pub mod constants;
pub mod edit;
pub mod error;
pub mod history;
pub mod interpret;
pub mod logging;
pub mod patch;
pub mod settings;
pub mod tree;

pub use buffer::{Buffer, BufferSnapshot, ByteCursor, EditEvent, EditListener, Subscription};
pub use edit::{EditKind, EditRecord, Modification, SourceId, Transaction};
pub use error::{BufferError, ErrorSeverity, Result};
pub use history::{RecordOutcome, UndoHistory};
pub use interpret::{
    CharCursor, CharacterPositionConverter, Encoding, Interpretation, InterpretationSnapshot,
    Latin1, LineIndex, Utf16Be, Utf16Le, Utf8,
};
pub use logging::Logger;
pub use patch::{Affinity, PositionPatcher};
pub use settings::{BufferOptions, InterpretationOptions};
