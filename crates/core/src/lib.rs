//! Relays messages from a browser-driven chat session to a local messaging bridge.
//!
//! The pieces compose in this order:
//!
//! 1. [`checks::pre_launch_checks`] prepares the application directory.
//! 2. [`CredentialStore::get_identity`] yields the operator's target-platform number.
//! 3. [`SessionBootstrap::establish`] logs the source session in, persisting the
//!    pairing QR through [`QrArtifactStore`].
//! 4. [`RelayLoop::run`] forwards unread messages of the selected chat through a
//!    [`BridgeClient`] while the bridge service runs under
//!    [`wsr_runtime::BridgeSupervisor::run_scoped`].

pub mod bridge;
pub mod checks;
pub mod credentials;
pub mod error;
pub mod layout;
pub mod qr;
pub mod relay;
pub mod session;
pub mod source;

pub use bridge::{BridgeClient, Delivery, RestBridge};
pub use credentials::{CredentialRecord, CredentialStore, IdentityPrompt, validate_identity};
pub use error::{RelayError, Result};
pub use layout::AppPaths;
pub use qr::{QrArtifact, QrArtifactStore};
pub use relay::{RelayCursor, RelayLoop, TickOutcome};
pub use session::{BootstrapOptions, SessionBootstrap, SessionHandle, SessionState};
pub use source::{ChatRef, SourceClient, SourceMessage, select_chat};
