//! Turning an axum request into a [`WebRequest`] snapshot

use std::net::SocketAddr;

use axum::{
    body::{Body, Bytes},
    extract::{ConnectInfo, FromRequest, Multipart, Request},
};
use http::{header, request::Parts, HeaderMap};
use reqtrail_core::context::{UserIdentity, ValueMap, WebRequest};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

/// Epoch seconds at which an outer layer started handling the request
#[derive(Debug, Clone, Copy)]
pub struct RequestStart(pub f64);

/// Session values an outer layer exposes for capture
#[derive(Debug, Clone, Default)]
pub struct SessionData(pub ValueMap);

/// Logged-in user resolved by an outer authentication layer
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedUser(pub i64);

/// Id of the audit entry recording the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditEntryId(pub i64);

/// Header carrying the user id when no [`AuthenticatedUser`] is present
pub const USER_ID_HEADER: &str = "x-user-id";

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
const JSON: &str = "application/json";
const MULTIPART: &str = "multipart/form-data";

/// Insert a decoded value. Repeated keys keep the last value; keys ending in
/// `[]` collect every value into an array.
fn insert_value(values: &mut ValueMap, key: &str, value: JsonValue) {
    match key.strip_suffix("[]") {
        Some(name) => {
            let slot = values
                .entry(name.to_string())
                .or_insert_with(|| JsonValue::Array(Vec::new()));
            if let JsonValue::Array(items) = slot {
                items.push(value);
            } else {
                *slot = JsonValue::Array(vec![value]);
            }
        },
        None => {
            values.insert(key.to_string(), value);
        },
    }
}

/// Parse `a=1&b=2` style input
pub fn parse_form(input: &[u8]) -> ValueMap {
    let mut values = ValueMap::new();
    for (key, value) in url::form_urlencoded::parse(input) {
        insert_value(&mut values, &key, JsonValue::String(value.into_owned()));
    }
    values
}

/// Cookies from every `Cookie` header, raw values
pub fn parse_cookies(headers: &HeaderMap) -> ValueMap {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|line| line.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .map(|(name, value)| (name.to_string(), JsonValue::String(value.to_string())))
        .collect()
}

/// Form fields and upload metadata decoded from a buffered request body
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BodyCapture {
    pub post: ValueMap,
    /// Per upload field: file name, content type and size. Contents are
    /// never kept.
    pub files: ValueMap,
}

impl BodyCapture {
    /// Decode a buffered body when its content type is one we record
    pub async fn read(headers: &HeaderMap, body: Bytes) -> Self {
        if body.is_empty() {
            return Self::default();
        }

        match content_type(headers).as_deref() {
            Some(FORM_URLENCODED) => Self {
                post: parse_form(&body),
                ..Self::default()
            },
            Some(JSON) => match serde_json::from_slice(&body) {
                Ok(JsonValue::Object(post)) => Self {
                    post,
                    ..Self::default()
                },
                _ => Self::default(),
            },
            Some(MULTIPART) => read_multipart(headers, body).await,
            _ => Self::default(),
        }
    }
}

async fn read_multipart(headers: &HeaderMap, body: Bytes) -> BodyCapture {
    let mut capture = BodyCapture::default();
    let Some(content_type) = headers.get(header::CONTENT_TYPE) else {
        return capture;
    };

    let mut request = Request::new(Body::from(body));
    request
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type.clone());
    let mut multipart = match Multipart::from_request(request, &()).await {
        Ok(multipart) => multipart,
        Err(e) => {
            debug!(error = %e, "Multipart body not captured");
            return capture;
        },
    };

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                debug!(error = %e, "Stopped reading multipart body");
                break;
            },
        };
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let file_type = field.content_type().map(str::to_string);
                let mut size = 0usize;
                while let Ok(Some(chunk)) = field.chunk().await {
                    size += chunk.len();
                }
                insert_value(
                    &mut capture.files,
                    &name,
                    json!({"name": file_name, "type": file_type, "size": size}),
                );
            },
            None => {
                if let Ok(text) = field.text().await {
                    insert_value(&mut capture.post, &name, JsonValue::String(text));
                }
            },
        }
    }

    capture
}

/// Whether the request body should be buffered for capture
pub fn wants_body(headers: &HeaderMap, limit: usize) -> bool {
    let capturable = matches!(
        content_type(headers).as_deref(),
        Some(FORM_URLENCODED | JSON | MULTIPART)
    );
    let length = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());

    capturable && matches!(length, Some(len) if len > 0 && len <= limit)
}

fn content_type(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|v| v.trim().to_ascii_lowercase())
}

fn client_ip(parts: &Parts) -> Option<String> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip().to_string())
}

fn user_identity(parts: &Parts) -> UserIdentity {
    if let Some(AuthenticatedUser(id)) = parts.extensions.get::<AuthenticatedUser>() {
        return UserIdentity::Authenticated(*id);
    }
    parts
        .headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<i64>().ok())
        .map(UserIdentity::Authenticated)
        .unwrap_or_default()
}

/// CGI-style variables describing the request and connection
fn server_vars(parts: &Parts, ip: Option<&str>, started_at: f64) -> ValueMap {
    let mut vars = ValueMap::new();
    let mut set = |key: &str, value: String| {
        vars.insert(key.to_string(), JsonValue::String(value));
    };

    set("REQUEST_METHOD", parts.method.to_string());
    set("REQUEST_URI", request_uri(parts));
    set("SCRIPT_NAME", parts.uri.path().to_string());
    set(
        "QUERY_STRING",
        parts.uri.query().unwrap_or_default().to_string(),
    );
    set("SERVER_PROTOCOL", format!("{:?}", parts.version));
    if let Some(ip) = ip {
        set("REMOTE_ADDR", ip.to_string());
    }
    for (name, value) in &parts.headers {
        let key = format!("HTTP_{}", name.as_str().to_ascii_uppercase().replace('-', "_"));
        set(&key, String::from_utf8_lossy(value.as_bytes()).into_owned());
    }

    vars.insert("REQUEST_TIME_FLOAT".to_string(), JsonValue::from(started_at));
    vars
}

fn request_uri(parts: &Parts) -> String {
    parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string())
}

/// Build the request snapshot from the head and the decoded body
pub fn web_request(parts: &Parts, body: BodyCapture, started_at: f64) -> WebRequest {
    let ip = client_ip(parts);

    WebRequest {
        url: request_uri(parts),
        referrer: parts
            .headers
            .get(header::REFERER)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned()),
        method: parts.method.to_string(),
        user: user_identity(parts),
        query: parse_form(parts.uri.query().unwrap_or_default().as_bytes()),
        post: body.post,
        cookies: parse_cookies(&parts.headers),
        server: server_vars(parts, ip.as_deref(), started_at),
        files: body.files,
        session: parts
            .extensions
            .get::<SessionData>()
            .map(|s| s.0.clone())
            .unwrap_or_default(),
        headers: parts.headers.clone(),
        ip,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use http::{HeaderValue, Request};
    use serde_json::json;

    fn parts(request: Request<()>) -> Parts {
        request.into_parts().0
    }

    #[test]
    fn test_parse_form() {
        let form = parse_form(b"id=5&tag[]=a&tag[]=b&q=hello+world&id=6");
        assert_eq!(form["id"], json!("6"));
        assert_eq!(form["tag"], json!(["a", "b"]));
        assert_eq!(form["q"], json!("hello world"));
        assert!(parse_form(b"").is_empty());
    }

    #[test]
    fn test_parse_cookies() {
        let mut headers = HeaderMap::new();
        headers.append(header::COOKIE, HeaderValue::from_static("sid=abc; theme=dark"));
        headers.append(header::COOKIE, HeaderValue::from_static("lang=en"));

        let cookies = parse_cookies(&headers);
        assert_eq!(cookies.len(), 3);
        assert_eq!(cookies["sid"], json!("abc"));
        assert_eq!(cookies["lang"], json!("en"));
    }

    #[tokio::test]
    async fn test_body_capture_by_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert_eq!(
            BodyCapture::read(&headers, Bytes::from_static(br#"{"qty": 2}"#))
                .await
                .post,
            json!({"qty": 2}).as_object().cloned().unwrap()
        );
        assert!(BodyCapture::read(&headers, Bytes::from_static(b"[1, 2]"))
            .await
            .post
            .is_empty());

        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        assert_eq!(
            BodyCapture::read(&headers, Bytes::from_static(b"qty=2")).await,
            BodyCapture::default()
        );
    }

    #[tokio::test]
    async fn test_multipart_records_upload_metadata_only() {
        let body = concat!(
            "--XB\r\n",
            "Content-Disposition: form-data; name=\"title\"\r\n\r\n",
            "Quarterly\r\n",
            "--XB\r\n",
            "Content-Disposition: form-data; name=\"docs[]\"; filename=\"a.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "hello\r\n",
            "--XB\r\n",
            "Content-Disposition: form-data; name=\"docs[]\"; filename=\"b.bin\"\r\n\r\n",
            "0123456789\r\n",
            "--XB--\r\n",
        );
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data; boundary=XB"),
        );

        let capture = BodyCapture::read(&headers, Bytes::from_static(body.as_bytes())).await;
        assert_eq!(capture.post["title"], json!("Quarterly"));
        assert_eq!(
            capture.files["docs"],
            json!([
                {"name": "a.txt", "type": "text/plain", "size": 5},
                {"name": "b.bin", "type": null, "size": 10}
            ])
        );
    }

    #[tokio::test]
    async fn test_malformed_multipart_is_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data"),
        );
        let capture = BodyCapture::read(&headers, Bytes::from_static(b"garbage")).await;
        assert_eq!(capture, BodyCapture::default());
    }

    #[test]
    fn test_wants_body_respects_limit() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static("10"));
        assert!(wants_body(&headers, 10));
        assert!(!wants_body(&headers, 9));

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("multipart/form-data; boundary=XB"),
        );
        assert!(wants_body(&headers, 10));

        headers.remove(header::CONTENT_LENGTH);
        assert!(!wants_body(&headers, 10));
    }

    #[test]
    fn test_web_request_from_parts() {
        let mut request = Request::builder()
            .method("POST")
            .uri("/cart/add?id=5")
            .header("referer", "https://shop.example.com/")
            .header("x-user-id", "17")
            .header("cookie", "sid=abc")
            .body(())
            .unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 7], 51000))));
        let parts = parts(request);

        let web = web_request(&parts, BodyCapture::default(), 12.5);
        assert_eq!(web.url, "/cart/add?id=5");
        assert_eq!(web.method, "POST");
        assert_eq!(web.ip.as_deref(), Some("10.0.0.7"));
        assert_eq!(web.referrer.as_deref(), Some("https://shop.example.com/"));
        assert_eq!(web.user, UserIdentity::Authenticated(17));
        assert_eq!(web.query["id"], json!("5"));
        assert_eq!(web.cookies["sid"], json!("abc"));
        assert_eq!(web.server["REQUEST_METHOD"], json!("POST"));
        assert_eq!(web.server["REMOTE_ADDR"], json!("10.0.0.7"));
        assert_eq!(web.server["HTTP_X_USER_ID"], json!("17"));
        assert_eq!(web.server["REQUEST_TIME_FLOAT"], json!(12.5));
        assert!(web.session.is_empty());
    }

    #[test]
    fn test_extension_user_wins_over_header() {
        let mut request = Request::builder()
            .uri("/")
            .header("x-user-id", "17")
            .body(())
            .unwrap();
        request.extensions_mut().insert(AuthenticatedUser(3));
        assert_eq!(user_identity(&parts(request)), UserIdentity::Authenticated(3));

        let guest = Request::builder()
            .uri("/")
            .header("x-user-id", "nobody")
            .body(())
            .unwrap();
        assert_eq!(user_identity(&parts(guest)), UserIdentity::Guest);
    }
}
