//! E2E tests for attentium-node.
//!
//! Every test builds a full node through `NodeBuilder` with in-memory
//! collaborators and drives it through the public endpoints.
//!
//! ## Architecture
//!
//! ```text
//! TestHarness
//!     ├── RunningNode
//!     │       └── Gateway (verify / results / complete)
//!     ├── FakeChain (scripted transactions)
//!     ├── KeywordClassifier ("spam" is rejected)
//!     └── RecordingTransport (captured webhooks)
//! ```

mod campaign_flow;
mod harness;
mod signal_quality;
mod webhooks;
