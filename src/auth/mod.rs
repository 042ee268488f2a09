pub mod local;
pub mod outbox;
pub mod provider;
pub mod service;
pub mod throttle;
pub mod validation;

pub use local::LocalAuthProvider;
pub use outbox::{EmailKind, MemoryOutbox, OutgoingEmail, Outbox, TracingOutbox};
pub use provider::{AuthProvider, Identity};
pub use service::CredentialService;
pub use throttle::SigninThrottle;
