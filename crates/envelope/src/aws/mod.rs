//! AWS KMS integration for the remote key-service provider.
//!
//! Network retry, signing, and credential refresh are the SDK's concern;
//! this module only shapes requests and classifies failures.

pub mod clients;
pub mod kms;

pub use clients::kms_client;
pub use kms::{KeyService, ServiceDataKey};
