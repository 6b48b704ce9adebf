//! AWS KMS client construction.

use aws_config::BehaviorVersion;
use aws_sdk_kms::config::{Credentials, Region};

use crate::provider::StaticCredentials;

const CREDENTIALS_PROVIDER_NAME: &str = "enveloper-static";

/// Build a KMS client.
///
/// With `credentials`, the client uses exactly those keys and that region.
/// Without, credentials and region come from the standard AWS chain
/// (environment, profile, IMDS, ...).
pub async fn kms_client(credentials: Option<&StaticCredentials>) -> aws_sdk_kms::Client {
    let mut loader = aws_config::defaults(BehaviorVersion::latest());

    if let Some(creds) = credentials {
        loader = loader
            .region(Region::new(creds.region.clone()))
            .credentials_provider(Credentials::new(
                creds.access_key_id.clone(),
                creds.secret_access_key.clone(),
                creds.session_token.clone(),
                None,
                CREDENTIALS_PROVIDER_NAME,
            ));
    }

    let config = loader.load().await;
    aws_sdk_kms::Client::new(&config)
}
