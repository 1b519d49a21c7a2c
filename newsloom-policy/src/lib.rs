//! Response policy enforcement
//!
//! Every response leaves the orchestrator through [`PolicyValidator`]:
//! PII patterns are masked (soft, warn-only), evidence from distrusted
//! domains is dropped with a confidence penalty, and the hard schema
//! checks reject anything that violates the response contract.

pub mod pii;
pub mod trust;
pub mod validator;

pub use pii::{mask_pii, MaskOutcome};
pub use trust::{DomainTrust, TrustClass};
pub use validator::PolicyValidator;
