pub mod backend;
pub mod epoch;
pub mod error;
pub mod format;
pub mod gate;
pub mod session;
pub mod settings;
pub mod state;
pub mod stream;
pub mod transcript;

// Re-export main types for convenience
pub use backend::{ChatBackend, ChatResponse, HttpBackend, ResponseKind};
pub use error::{Error, Result};
pub use format::format_message;
pub use gate::InputGate;
pub use session::{Notice, NoticeKind, Session, SessionEvent};
pub use settings::{Settings, SettingsStore};
pub use state::{ChatMessage, ChatRole, MessageId};
pub use transcript::{Entry, Transcript};
