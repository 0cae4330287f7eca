pub mod artifact;
pub mod client;
pub mod config;
pub mod format;
pub mod http;
pub mod payload;
pub mod queue;
pub mod step;
pub mod store;
pub mod transport;
pub mod types;

pub use artifact::{ArtifactResolver, NoArtifacts, PendingArtifacts};
pub use client::TestomatClient;
pub use config::ReporterConfig;
pub use format::{Diff, ErrorFormatter, Failure, StackFrame};
pub use http::HttpTransport;
pub use payload::{Decycler, RunBody, StatusUpdateBody, TestRunPayload};
pub use queue::RequestQueue;
pub use step::{render_trace, Step};
pub use store::RunStore;
pub use transport::{ReporterError, ReporterResult, Transport, TransportResponse};
pub use types::{ArtifactRef, RunStatus, TestRun, TestStatus};

pub mod prelude {
    pub use crate::artifact::*;
    pub use crate::client::*;
    pub use crate::config::*;
    pub use crate::format::*;
    pub use crate::step::*;
    pub use crate::store::*;
    pub use crate::transport::*;
    pub use crate::types::*;
}
