//! Encoding and decoding of `$batch` entity group transactions.
//!
//! A transaction is a `multipart/mixed` request holding exactly one
//! changeset; every operation inside the changeset is a complete HTTP
//! request. The service answers with a matching multipart body where each
//! operation has its own status line. If any operation fails, the service
//! returns only the failing operation's response and nothing is applied.

use reqwest::{StatusCode, Url};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::storage::error::StoreError;
use crate::storage::models::ODataErrorResponse;

const CRLF: &str = "\r\n";

/// Encoded `$batch` request, ready to POST
#[derive(Debug)]
pub struct BatchRequest {
    pub content_type: String,
    pub body: String,
}

/// One insert-or-replace inside a changeset
#[derive(Debug)]
pub struct UpsertOperation {
    pub url: Url,
    pub payload: Map<String, Value>,
}

pub fn encode_upsert_batch(operations: &[UpsertOperation]) -> Result<BatchRequest, StoreError> {
    encode_with_boundaries(
        &format!("batch_{}", Uuid::new_v4()),
        &format!("changeset_{}", Uuid::new_v4()),
        operations,
    )
}

fn encode_with_boundaries(
    batch: &str,
    changeset: &str,
    operations: &[UpsertOperation],
) -> Result<BatchRequest, StoreError> {
    let mut body = String::new();

    body.push_str(&format!("--{}{}", batch, CRLF));
    body.push_str(&format!(
        "Content-Type: multipart/mixed; boundary={}{}{}",
        changeset, CRLF, CRLF
    ));

    for op in operations {
        let json = serde_json::to_string(&op.payload)?;

        body.push_str(&format!("--{}{}", changeset, CRLF));
        body.push_str(&format!("Content-Type: application/http{}", CRLF));
        body.push_str(&format!("Content-Transfer-Encoding: binary{}{}", CRLF, CRLF));
        body.push_str(&format!("PUT {} HTTP/1.1{}", op.url, CRLF));
        body.push_str(&format!("Content-Type: application/json{}", CRLF));
        body.push_str(&format!("Accept: application/json;odata=minimalmetadata{}", CRLF));
        body.push_str(&format!("Prefer: return-no-content{}", CRLF));
        body.push_str(&format!("DataServiceVersion: 3.0;{}{}", CRLF, CRLF));
        body.push_str(&json);
        body.push_str(CRLF);
    }

    body.push_str(&format!("--{}--{}{}", changeset, CRLF, CRLF));
    body.push_str(&format!("--{}--{}", batch, CRLF));

    Ok(BatchRequest {
        content_type: format!("multipart/mixed; boundary={}", batch),
        body,
    })
}

/// Check a `$batch` response body; the first failing operation comes back
/// as a transaction error
pub fn decode_batch_response(body: &str) -> Result<(), StoreError> {
    let lines: Vec<&str> = body.lines().map(|l| l.trim_end_matches('\r')).collect();
    let mut succeeded = false;

    for (idx, line) in lines.iter().enumerate() {
        let Some(status) = parse_status_line(line) else {
            continue;
        };

        if status.is_success() {
            succeeded = true;
            continue;
        }

        let (code, message) = lines[idx + 1..]
            .iter()
            .take_while(|l| !l.starts_with("--"))
            .find(|l| l.trim_start().starts_with('{'))
            .and_then(|l| ODataErrorResponse::parse(l))
            .unwrap_or_else(|| {
                (
                    status.canonical_reason().unwrap_or("Unknown").to_string(),
                    String::new(),
                )
            });

        return Err(StoreError::Transaction {
            status,
            code,
            message,
        });
    }

    if !succeeded {
        return Err(StoreError::Decode(
            "batch response contains no operation results".to_string(),
        ));
    }

    Ok(())
}

fn parse_status_line(line: &str) -> Option<StatusCode> {
    let rest = line.strip_prefix("HTTP/1.1 ")?;
    let code = rest.split_whitespace().next()?.parse::<u16>().ok()?;
    StatusCode::from_u16(code).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn operation(row_key: &str) -> UpsertOperation {
        let url = Url::parse(&format!(
            "https://acct.table.core.windows.net/Photos(PartitionKey='a',RowKey='{}')",
            row_key
        ))
        .unwrap();
        let mut payload = Map::new();
        payload.insert("PartitionKey".to_string(), json!("a"));
        payload.insert("RowKey".to_string(), json!(row_key));
        UpsertOperation { url, payload }
    }

    #[test]
    fn test_encode_one_put_per_operation() {
        let ops = vec![operation("1"), operation("2"), operation("3")];
        let request = encode_with_boundaries("batch_x", "changeset_y", &ops).unwrap();

        assert_eq!(request.content_type, "multipart/mixed; boundary=batch_x");
        assert_eq!(request.body.matches("PUT https://").count(), 3);
        assert_eq!(request.body.matches("--changeset_y\r\n").count(), 3);
        assert!(request.body.contains("boundary=changeset_y\r\n\r\n"));
        assert!(request.body.contains(r#"{"PartitionKey":"a","RowKey":"2"}"#));
        assert!(request.body.ends_with("--changeset_y--\r\n\r\n--batch_x--\r\n"));
    }

    #[test]
    fn test_random_boundaries_differ() {
        let first = encode_upsert_batch(&[operation("1")]).unwrap();
        let second = encode_upsert_batch(&[operation("1")]).unwrap();
        assert_ne!(first.content_type, second.content_type);
    }

    #[test]
    fn test_decode_success_response() {
        let body = "--batchresponse_1\r\n\
Content-Type: multipart/mixed; boundary=changesetresponse_1\r\n\r\n\
--changesetresponse_1\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\r\n\
HTTP/1.1 204 No Content\r\n\
X-Content-Type-Options: nosniff\r\n\r\n\r\n\
--changesetresponse_1\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\r\n\
HTTP/1.1 204 No Content\r\n\r\n\r\n\
--changesetresponse_1--\r\n\
--batchresponse_1--\r\n";

        assert!(decode_batch_response(body).is_ok());
    }

    #[test]
    fn test_decode_failed_operation() {
        let body = "--batchresponse_2\r\n\
Content-Type: multipart/mixed; boundary=changesetresponse_2\r\n\r\n\
--changesetresponse_2\r\n\
Content-Type: application/http\r\n\
Content-Transfer-Encoding: binary\r\n\r\n\
HTTP/1.1 400 Bad Request\r\n\
Content-Type: application/json;odata=minimalmetadata;streaming=true;charset=utf-8\r\n\r\n\
{\"odata.error\":{\"code\":\"InvalidInput\",\"message\":{\"lang\":\"en-US\",\"value\":\"4:One of the request inputs is not valid.\"}}}\r\n\
--changesetresponse_2--\r\n\
--batchresponse_2--\r\n";

        let err = decode_batch_response(body).unwrap_err();
        match err {
            StoreError::Transaction {
                status,
                code,
                message,
            } => {
                assert_eq!(status, StatusCode::BAD_REQUEST);
                assert_eq!(code, "InvalidInput");
                assert!(message.starts_with("4:"));
            }
            other => panic!("expected transaction error, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_failure_without_json_body() {
        let body = "--changesetresponse_3\r\nHTTP/1.1 413 Request Entity Too Large\r\n\r\n--changesetresponse_3--\r\n";

        let err = decode_batch_response(body).unwrap_err();
        assert!(err.is_transaction());
    }

    #[test]
    fn test_decode_garbage() {
        let err = decode_batch_response("<html>gateway timeout</html>").unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }
}
