// Leadline core
//
// Transport-agnostic pieces of the call-center control client:
// - Reply classification for the platform's SUCCESS:/NOTICE:/ERROR: text grammar
// - Request building for its flat query-string functions
// - Session state (agent, call, metrics) and the pure transitions between states
// - The canonical disposition taxonomy
// - Collaborator traits (ControlTransport, RecordStore) with in-memory implementations
//
// I/O, timers and the reconciler live in leadline-agent.

pub mod config;
pub mod disposition;
pub mod error;
pub mod protocol;
pub mod record;
pub mod request;
pub mod session;
pub mod state;
pub mod traits;

// In-memory implementations for examples and testing
pub mod memory;

// Re-exports for convenience
pub use config::ControlConfig;
pub use disposition::{CallbackScope, CallbackSchedule, DispositionCode, DispositionRecord};
pub use error::{ControlError, Result, StoreError, TransportError};
pub use protocol::{RemoteCallResult, Reply};
pub use record::{AgentStatsRow, LeadDraft, LeadUpdate, Record, RecordKind, Recording};
pub use request::{Endpoint, ParamValue, Params, RequestBuilder};
pub use session::{
    ActionKind, AgentSession, AgentStatus, CallSession, CallStatus, Connectivity, SessionMetrics,
    SessionSnapshot, StatusConfidence,
};
pub use state::{ClosedCall, DialRequest, PauseTarget, SessionState};
pub use traits::{ControlTransport, RecordStore};
