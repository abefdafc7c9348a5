//! Check command: read a request from stdin, emit the version list on
//! stdout.

use crate::cli::CheckArgs;
use anyhow::Result;
use regwatch_core::{CheckRequest, CheckResponse, Error};
use regwatch_image::{Checker, EcrExchange, HttpTransport};
use std::io::{Read, Write};
use tracing::debug;

/// Execute check command
pub async fn run(_args: CheckArgs) -> Result<()> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .map_err(|e| Error::invalid_payload(e.to_string()))?;

    let request = decode_request(&input)?;
    debug!(
        "checking {} for tag {}",
        request.source.repository,
        request.source.tag()
    );

    let transport = HttpTransport::new()?;
    let checker = Checker::new(&transport, &EcrExchange);
    let response = checker.check(&request).await?;

    let stdout = std::io::stdout();
    encode_response(&response, stdout.lock())?;

    Ok(())
}

/// Decode the request, rejecting unknown fields. Failure here means no
/// network access is attempted.
fn decode_request(input: &str) -> Result<CheckRequest, Error> {
    serde_json::from_str(input).map_err(|e| Error::invalid_payload(e.to_string()))
}

fn encode_response(response: &CheckResponse, mut writer: impl Write) -> Result<(), Error> {
    serde_json::to_writer(&mut writer, response)
        .map_err(|e| Error::encoding_failed(e.to_string()))?;
    writeln!(writer).map_err(|e| Error::encoding_failed(e.to_string()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use regwatch_core::Version;

    #[test]
    fn test_decode_valid_request() {
        let request = decode_request(
            r#"{"source": {"repository": "busybox", "tag": "1.36"},
                "version": {"digest": "sha256:abcd"}}"#,
        )
        .unwrap();
        assert_eq!(request.source.repository, "busybox");
        assert_eq!(request.source.tag(), "1.36");
        assert_eq!(request.version.unwrap().digest, "sha256:abcd");
    }

    #[test]
    fn test_decode_rejects_unknown_fields() {
        let result = decode_request(r#"{"source": {"repository": "busybox"}, "params": {}}"#);
        assert!(matches!(result, Err(Error::InvalidPayload { .. })));
    }

    #[test]
    fn test_decode_rejects_non_json_input() {
        assert!(matches!(
            decode_request("not json"),
            Err(Error::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_encode_response_is_a_json_array() {
        let response = vec![Version::new("sha256:bbbb"), Version::new("sha256:aaaa")];
        let mut out = Vec::new();
        encode_response(&response, &mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "[{\"digest\":\"sha256:bbbb\"},{\"digest\":\"sha256:aaaa\"}]\n"
        );
    }
}
