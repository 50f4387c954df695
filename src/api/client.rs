use super::error::ClientError;
use crate::config::ClientConfig;
use crate::sync::mapper::json_type_name;
use flate2::read::GzDecoder;
use serde_json::Value;
use std::future::Future;
use std::io::Read;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const UTF8_BOM: char = '\u{feff}';

/// A provider of raw reference-data records.
pub trait TelemetrySource: Send + Sync {
    /// Records of a JSON action, one object per element.
    fn fetch_json_records(
        &self,
        action: &str,
    ) -> impl Future<Output = Result<Vec<Value>, ClientError>> + Send;

    /// Non-blank lines of a delimited text action.
    fn fetch_text_records(
        &self,
        action: &str,
    ) -> impl Future<Output = Result<Vec<String>, ClientError>> + Send;
}

/// HTTP client for the OASA telematics API.
#[derive(Clone)]
pub struct OasaClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl OasaClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        // gzip and deflate features advertise `Accept-Encoding: gzip, deflate`
        // and decode encoded responses.
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("oasa-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Transport)?;

        Ok(Self {
            http: client,
            config,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        format!("{}/api/", self.config.base_url.trim_end_matches('/'))
    }

    /// Build the GET request for `action` with optional extra parameters.
    pub fn build_request(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Request, ClientError> {
        self.http
            .get(self.endpoint())
            .query(&[("act", action)])
            .query(params)
            .build()
            .map_err(ClientError::Transport)
    }

    /// Perform `action` and return the raw, possibly compressed, body.
    pub async fn request(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<u8>, ClientError> {
        let request = self.build_request(action, params)?;
        let response = self
            .http
            .execute(request)
            .await
            .map_err(ClientError::Transport)?;

        let status = response.status();
        log::info!("GET /api/ {} act={}", status.as_u16(), action);

        if !status.is_success() {
            return Err(ClientError::status(status));
        }

        let body = response.bytes().await.map_err(ClientError::Transport)?;
        Ok(body.to_vec())
    }

    pub async fn fetch_json(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<Value>, ClientError> {
        let body = self.request(action, params).await?;
        decode_json_records(&body)
    }

    pub async fn fetch_text(
        &self,
        action: &str,
        params: &[(&str, &str)],
    ) -> Result<Vec<String>, ClientError> {
        let body = self.request(action, params).await?;
        decode_text_records(&body)
    }
}

impl TelemetrySource for OasaClient {
    async fn fetch_json_records(&self, action: &str) -> Result<Vec<Value>, ClientError> {
        self.fetch_json(action, &[]).await
    }

    async fn fetch_text_records(&self, action: &str) -> Result<Vec<String>, ClientError> {
        self.fetch_text(action, &[]).await
    }
}

pub fn is_gzip(body: &[u8]) -> bool {
    body.starts_with(&GZIP_MAGIC)
}

/// Gunzip `body` when it carries the gzip magic bytes, otherwise copy it.
pub fn decompress(body: &[u8]) -> Result<Vec<u8>, ClientError> {
    if !is_gzip(body) {
        return Ok(body.to_vec());
    }

    let mut decoder = GzDecoder::new(body);
    let mut plain = Vec::new();
    decoder.read_to_end(&mut plain)?;
    log::debug!("decompressed response ({} -> {} bytes)", body.len(), plain.len());
    Ok(plain)
}

/// Decode a JSON action body into its records.
///
/// An object carrying a non-null `error` is the API reporting a failure.
pub fn decode_json_records(body: &[u8]) -> Result<Vec<Value>, ClientError> {
    let plain = decompress(body)?;
    let value: Value =
        serde_json::from_slice(&plain).map_err(|err| ClientError::Decode(err.to_string()))?;

    match value {
        Value::Array(records) => Ok(records),
        Value::Object(object) => match object.get("error") {
            Some(Value::String(message)) => Err(ClientError::Remote(message.clone())),
            Some(error) if !error.is_null() => Err(ClientError::Remote(error.to_string())),
            _ => Err(ClientError::UnexpectedBody {
                expected: "array",
                found: "object",
            }),
        },
        other => Err(ClientError::UnexpectedBody {
            expected: "array",
            found: json_type_name(&other),
        }),
    }
}

/// Decode a delimited text action body into its non-blank lines.
pub fn decode_text_records(body: &[u8]) -> Result<Vec<String>, ClientError> {
    let plain = decompress(body)?;
    let text = String::from_utf8(plain).map_err(|err| ClientError::Decode(err.to_string()))?;
    let text = text.strip_prefix(UTF8_BOM).unwrap_or(&text);

    Ok(text
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use std::time::Duration;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn client() -> OasaClient {
        OasaClient::new(ClientConfig {
            base_url: "http://telematics.oasa.gr/".to_string(),
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        })
        .unwrap()
    }

    #[test]
    fn test_request_url_carries_action_and_params() {
        let request = client()
            .build_request("getStopsForRoute", &[("p1", "2045")])
            .unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://telematics.oasa.gr/api/?act=getStopsForRoute&p1=2045"
        );
    }

    #[test]
    fn test_text_records_split_and_skip_blank_lines() {
        let body = b"\xef\xbb\xbf1754,799,A,B,2,9889.61\r\n\r\n1755,799,C,D,1,100.5\n";
        let records = decode_text_records(body).unwrap();
        assert_eq!(
            records,
            vec!["1754,799,A,B,2,9889.61", "1755,799,C,D,1,100.5"]
        );
    }

    #[test]
    fn test_gzip_bodies_are_detected_by_magic_bytes() {
        let body = gzip("103406,2081,10373,1\n103407,2081,10374,2".as_bytes());
        assert!(is_gzip(&body));

        let records = decode_text_records(&body).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], "103407,2081,10374,2");
    }

    #[test]
    fn test_json_array_yields_records() {
        let body = br#"[{"line_code":"1151"},{"line_code":"1152"}]"#;
        let records = decode_json_records(body).unwrap();
        assert_eq!(records.len(), 2);

        let gzipped = decode_json_records(&gzip(body)).unwrap();
        assert_eq!(gzipped, records);
    }

    #[test]
    fn test_json_error_property_is_remote_failure() {
        let err = decode_json_records(br#"{"error":"Unknown action"}"#).unwrap_err();
        assert!(matches!(err, ClientError::Remote(ref message) if message == "Unknown action"));
    }

    #[test]
    fn test_unexpected_json_shapes() {
        let err = decode_json_records(br#"{"error":null,"data":[]}"#).unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnexpectedBody {
                expected: "array",
                found: "object"
            }
        ));

        let err = decode_json_records(b"null").unwrap_err();
        assert!(matches!(err, ClientError::UnexpectedBody { found: "null", .. }));

        let err = decode_json_records(b"<html>").unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }

    #[test]
    fn test_invalid_utf8_is_a_decode_error() {
        let err = decode_text_records(&[0x31, 0xff, 0x0a]).unwrap_err();
        assert!(matches!(err, ClientError::Decode(_)));
    }
}
