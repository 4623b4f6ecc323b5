pub mod client;
pub mod envelope;
pub mod error;
pub mod models;
pub mod poller;
pub mod reconcile;
pub mod signer;
pub mod transport;

pub use client::{GeminiRestClient, GEMINI_API_URL, GEMINI_API_VERSION};
pub use envelope::{ParamValue, Params, RequestEnvelope};
pub use error::GeminiError;
pub use poller::{PollerHandle, TickerPoller};
pub use reconcile::{reconcile_available_pairs, ReconcileOutcome};
pub use transport::{HttpTransport, ProxyOptions, ReqwestTransport};
