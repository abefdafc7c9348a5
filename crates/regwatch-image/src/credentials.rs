//! Credential resolution: static basic credentials, or temporary ones
//! obtained through the ECR token exchange.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_ecr::config::{Credentials, Region};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use regwatch_core::{BasicCredentials, Error, Source};
use tracing::debug;

/// Cloud credential-exchange collaborator. Turns an AWS credential triple
/// into temporary basic credentials scoped to the target registry.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn authenticate(
        &self,
        access_key_id: &str,
        secret_access_key: &str,
        region: &str,
    ) -> Result<BasicCredentials, Error>;
}

/// Resolve the origin credentials for a source.
///
/// A fully-present AWS triple means the caller requires ECR: exchange
/// failure is fatal, there is no anonymous fallback. Otherwise the static
/// pair is used as-is (possibly empty, meaning anonymous). Mirror
/// credentials never go through here; the mirror carries its own static
/// pair.
pub async fn resolve_credentials(
    source: &Source,
    exchange: &dyn CredentialExchange,
) -> Result<BasicCredentials, Error> {
    match source.aws_credentials() {
        Some((access_key_id, secret_access_key, region)) => {
            debug!("authenticating with ECR in {}", region);
            exchange
                .authenticate(access_key_id, secret_access_key, region)
                .await
        }
        None => Ok(source.credentials()),
    }
}

/// Production exchange against the ECR `GetAuthorizationToken` API.
pub struct EcrExchange;

#[async_trait]
impl CredentialExchange for EcrExchange {
    async fn authenticate(
        &self,
        access_key_id: &str,
        secret_access_key: &str,
        region: &str,
    ) -> Result<BasicCredentials, Error> {
        let credentials =
            Credentials::new(access_key_id, secret_access_key, None, None, "regwatch");

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials)
            .load()
            .await;

        let client = aws_sdk_ecr::Client::new(&config);
        let output = client
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| Error::authentication_failed(e.to_string()))?;

        let token = output
            .authorization_data()
            .first()
            .and_then(|data| data.authorization_token())
            .ok_or_else(|| Error::authentication_failed("no authorization data returned"))?;

        decode_authorization_token(token)
    }
}

/// The ECR authorization token is base64("user:password").
fn decode_authorization_token(token: &str) -> Result<BasicCredentials, Error> {
    let decoded = BASE64
        .decode(token)
        .map_err(|e| Error::authentication_failed(format!("invalid authorization token: {e}")))?;
    let decoded = String::from_utf8(decoded)
        .map_err(|e| Error::authentication_failed(format!("invalid authorization token: {e}")))?;

    let (username, password) = decoded
        .split_once(':')
        .ok_or_else(|| Error::authentication_failed("malformed authorization token"))?;

    Ok(BasicCredentials {
        username: username.to_string(),
        password: password.to_string(),
    })
}
