// Leadline agent runtime
//
// Everything that talks to the network or runs on a timer:
// - ControlApi: typed remote functions over a ControlTransport
// - HttpTransport: reqwest-backed transport
// - Reconciler: owns one agent's session state and applies accepted actions
// - ConnectivityMonitor and DurationTicker: independent periodic tasks
// - AssistantClient: chat-completion collaborator

pub mod api;
pub mod assistant;
pub mod monitor;
pub mod notify;
pub mod reconciler;
pub mod ticker;
pub mod transport;

pub use api::ControlApi;
pub use assistant::{
    AssistantClient, AssistantError, AssistantReply, AssistantRequest, ChatMessage, ChatRole,
    ReplyKind, UserRole,
};
pub use monitor::ConnectivityMonitor;
pub use notify::{Level, Notification};
pub use reconciler::{Reconciler, ReconcilerConfig};
pub use ticker::DurationTicker;
pub use transport::HttpTransport;
