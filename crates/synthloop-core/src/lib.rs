//! Synthloop Core Library
//!
//! Test-driven synthesis: a generative oracle writes a test suite once, then
//! proposes implementations until one passes the suite in an isolated
//! sandbox or the iteration budget runs out.

pub mod analyzer;
pub mod artifact;
pub mod clock;
pub mod domain;
pub mod entry_point;
pub mod fakes;
pub mod ledger;
pub mod metrics;
pub mod obs;
pub mod observer;
pub mod oracle;
pub mod render;
pub mod sandbox;
pub mod session;
pub mod telemetry;

pub use analyzer::FailureAnalyzer;
pub use artifact::{read_session_artifact, write_session_artifact, ArtifactError};
pub use clock::{Clock, SystemClock};
pub use domain::{
    Attempt, ErrorKind, ExecutionResult, GeneratedTest, GenerationError, Result, SandboxFault,
    Specification, SynthesisConfig, SynthesisError,
};
pub use entry_point::{discover_entry_point, DEFAULT_ENTRY_POINT};
pub use ledger::{build_context, HistoryLedger, LedgerEntry, FIRST_ATTEMPT_CONTEXT};
pub use observer::{RecordingObserver, SessionEvent, SessionObserver, TracingObserver};
pub use oracle::Oracle;
pub use render::{ArtifactRef, CommandRenderer, RenderError, Renderer};
pub use sandbox::{PythonSandbox, Sandbox, SandboxConfig};
pub use session::{
    synthesize, CancelFlag, Collaborators, FailureSummary, Session, SessionOutcome, SessionReport,
    SessionStatus, SynthesisSuccess,
};

pub use metrics::METRICS;
pub use telemetry::init_tracing;

/// Synthloop version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
