//! HTTP baseline: the sequence id fetched before every connect.
//!
//! The session treats this as an opaque collaborator behind
//! [`SequenceSource`]; [`GraphqlSequenceSource`] is the production
//! implementation against the GraphQL batch endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::{json, Value};

use crate::config::BaselineConfig;
use crate::types::{RealtimeError, SessionCredentials};

/// Provides the sequence id used to seed the cursor.
#[async_trait]
pub trait SequenceSource: Send + Sync + 'static {
    async fn fetch_sequence_id(&self, credentials: &SessionCredentials) -> Result<i64, RealtimeError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// GraphQL batch
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

const JSON_CRUFT: &str = "for (;;);";

#[derive(Debug, Clone)]
pub struct GraphqlSequenceSource {
    http: Client,
    url: String,
    doc_id: String,
}

impl GraphqlSequenceSource {
    pub fn new(cfg: &BaselineConfig) -> Result<Self, RealtimeError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .map_err(|e| RealtimeError::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            url: cfg.graphql_url.clone(),
            doc_id: cfg.doc_id.clone(),
        })
    }

    fn queries(&self) -> String {
        json!({
            "q0": {
                "doc_id": self.doc_id,
                "query_params": {
                    "limit": 1,
                    "tags": ["INBOX"],
                    "before": null,
                    "includeDeliveryReceipts": false,
                    "includeSeqID": true,
                }
            }
        })
        .to_string()
    }
}

#[async_trait]
impl SequenceSource for GraphqlSequenceSource {
    async fn fetch_sequence_id(&self, credentials: &SessionCredentials) -> Result<i64, RealtimeError> {
        let mut form: Vec<(String, String)> = vec![
            ("method".into(), "GET".into()),
            ("response_format".into(), "json".into()),
            ("queries".into(), self.queries()),
        ];
        form.extend(credentials.form_fields.iter().cloned());

        let resp = self
            .http
            .post(&self.url)
            .header(header::COOKIE, &credentials.cookie)
            .header(header::USER_AGENT, &credentials.user_agent)
            .form(&form)
            .send()
            .await
            .map_err(|e| RealtimeError::Baseline(format!("request failed: {e}")))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| RealtimeError::Baseline(format!("reading body: {e}")))?;
        if !status.is_success() {
            return Err(RealtimeError::Baseline(format!("{} returned {status}", self.url)));
        }

        let seq = parse_sequence_id(&body)?;
        tracing::debug!(sequence_id = seq, "fetched baseline sequence id");
        Ok(seq)
    }
}

/// Extract `viewer.message_threads.sync_sequence_id` for query `q0` from a
/// batch response body.
///
/// The body may start with `for (;;);` and holds several concatenated JSON
/// objects. Objects carrying `error_results` are bookkeeping and skipped.
pub fn parse_sequence_id(body: &str) -> Result<i64, RealtimeError> {
    let body = body.trim_start();
    let body = body.strip_prefix(JSON_CRUFT).unwrap_or(body);

    for item in serde_json::Deserializer::from_str(body).into_iter::<Value>() {
        let obj = item.map_err(|e| RealtimeError::Baseline(format!("malformed response: {e}")))?;
        if obj.get("error_results").is_some() {
            continue;
        }
        if let Some(err) = obj.get("error") {
            let summary = obj
                .get("errorSummary")
                .and_then(Value::as_str)
                .unwrap_or("");
            return Err(RealtimeError::Baseline(format!("error {err}: {summary}")));
        }
        let Some(q0) = obj.get("q0") else {
            continue;
        };
        if let Some(errors) = q0.get("errors") {
            return Err(RealtimeError::Baseline(format!("graphql errors: {errors}")));
        }
        let data = q0.get("response").or_else(|| q0.get("data"));
        let seq = data
            .and_then(|d| d.pointer("/viewer/message_threads/sync_sequence_id"))
            .ok_or_else(|| RealtimeError::Baseline("sync_sequence_id missing".into()))?;
        return match seq {
            Value::Number(n) => n
                .as_i64()
                .ok_or_else(|| RealtimeError::Baseline(format!("bad sequence id {n}"))),
            Value::String(s) => s
                .parse()
                .map_err(|_| RealtimeError::Baseline(format!("bad sequence id {s:?}"))),
            other => Err(RealtimeError::Baseline(format!("bad sequence id {other}"))),
        };
    }

    Err(RealtimeError::Baseline("no q0 result in response".into()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Fixed
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Returns the same sequence id on every call. For tests and replays.
#[derive(Debug, Clone, Copy)]
pub struct FixedSequence(pub i64);

#[async_trait]
impl SequenceSource for FixedSequence {
    async fn fetch_sequence_id(&self, _credentials: &SessionCredentials) -> Result<i64, RealtimeError> {
        Ok(self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_sequence_id_with_cruft() {
        let body = r#"for (;;);{"q0":{"data":{"viewer":{"message_threads":{"sync_sequence_id":"12345"}}}}}
{"successful_results":1,"error_results":0,"skipped_results":0}"#;
        assert_eq!(parse_sequence_id(body).unwrap(), 12345);
    }

    #[test]
    fn integer_sequence_id_in_response_key() {
        let body = r#"{"q0":{"response":{"viewer":{"message_threads":{"sync_sequence_id":77}}}}}"#;
        assert_eq!(parse_sequence_id(body).unwrap(), 77);
    }

    #[test]
    fn bookkeeping_first_is_skipped() {
        let body = r#"{"error_results":0}{"q0":{"data":{"viewer":{"message_threads":{"sync_sequence_id":"9"}}}}}"#;
        assert_eq!(parse_sequence_id(body).unwrap(), 9);
    }

    #[test]
    fn payload_error_is_reported() {
        let body = r#"for (;;);{"error":1357001,"errorSummary":"Not logged in"}"#;
        let err = parse_sequence_id(body).unwrap_err();
        assert!(err.to_string().contains("Not logged in"));
    }

    #[test]
    fn graphql_errors_are_reported() {
        let body = r#"{"q0":{"errors":[{"message":"bad doc"}]}}"#;
        assert!(matches!(parse_sequence_id(body), Err(RealtimeError::Baseline(_))));
    }

    #[test]
    fn missing_field_and_garbage() {
        assert!(parse_sequence_id(r#"{"q0":{"data":{}}}"#).is_err());
        assert!(parse_sequence_id("<html>").is_err());
        assert!(parse_sequence_id("").is_err());
    }

    #[test]
    fn queries_shape() {
        let src = GraphqlSequenceSource::new(&BaselineConfig::default()).unwrap();
        let v: Value = serde_json::from_str(&src.queries()).unwrap();
        assert_eq!(v["q0"]["doc_id"], "1349387578499440");
        assert_eq!(v["q0"]["query_params"]["includeSeqID"], true);
        assert!(v["q0"]["query_params"]["before"].is_null());
    }

    #[tokio::test]
    async fn fixed_source() {
        let creds = SessionCredentials::new("1", "c");
        assert_eq!(FixedSequence(42).fetch_sequence_id(&creds).await.unwrap(), 42);
    }
}
