//! tRPC-compatible HTTP envelope.
//!
//! Queries arrive as `GET /trpc/<path>?input=<json>`, mutations as
//! `POST /trpc/<path>` with a JSON body. Results are wrapped as
//! `{"result":{"data":...}}` and failures as
//! `{"error":{"message","code","data":{"code","httpStatus","path"}}}`.

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::handler::Handler;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, MethodRouter};
use axum::Json;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::InnerState;

pub type RpcResult<T> = Result<RpcOk<T>, RpcError>;

/// Successful procedure output.
#[derive(Debug)]
pub struct RpcOk<T>(pub T);

impl<T: Serialize> IntoResponse for RpcOk<T> {
    fn into_response(self) -> Response {
        Json(json!({ "result": { "data": self.0 } })).into_response()
    }
}

/// A procedure failure tagged with the procedure path it came from.
#[derive(Debug)]
pub struct RpcError {
    pub path: String,
    pub error: AppError,
}

impl RpcError {
    pub fn new(path: impl Into<String>, error: AppError) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.error.status()
    }

    /// Logs the failure and counts it per procedure and code.
    pub fn record(&self) {
        self.error.log(&self.path);
        metrics::counter!(
            "api_ingest_procedure_errors_total",
            "path" => self.path.clone(),
            "code" => self.error.rpc_code().0
        )
        .increment(1);
    }

    /// The error envelope as sent on the wire.
    pub fn body(&self) -> Value {
        let (name, code) = self.error.rpc_code();
        json!({
            "error": {
                "message": self.error.client_message(),
                "code": code,
                "data": {
                    "code": name,
                    "httpStatus": self.status().as_u16(),
                    "path": self.path,
                }
            }
        })
    }
}

impl IntoResponse for RpcError {
    fn into_response(self) -> Response {
        self.record();
        (self.status(), Json(self.body())).into_response()
    }
}

/// Wraps a procedure outcome for the wire.
pub fn respond<T>(path: &'static str, result: Result<T, AppError>) -> RpcResult<T> {
    result.map(RpcOk).map_err(|e| RpcError::new(path, e))
}

/// Procedure path addressed by `uri`, e.g. `videos.get`.
pub fn procedure_path(uri: &Uri) -> String {
    uri.path().rsplit('/').next().unwrap_or_default().to_string()
}

pub fn query_input(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "input")
        .map(|(_, value)| value.into_owned())
}

/// Decodes raw input text and checks it against the procedure's input type.
pub fn parse_input<T: DeserializeOwned>(raw: Option<&str>) -> Result<T, AppError> {
    let value = match raw {
        None => Value::Null,
        Some(text) => serde_json::from_str::<Value>(text)
            .map_err(|e| AppError::Parse(format!("Input is not valid JSON: {e}")))?,
    };
    serde_json::from_value(value).map_err(|e| AppError::Validation(format!("Invalid input: {e}")))
}

/// Validated procedure input.
#[derive(Debug)]
pub struct Input<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Input<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = RpcError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let path = procedure_path(req.uri());

        let raw = if req.method() == Method::GET {
            query_input(req.uri())
        } else {
            let bytes = Bytes::from_request(req, state)
                .await
                .map_err(|e| RpcError::new(path.clone(), AppError::Parse(e.body_text())))?;
            if bytes.is_empty() {
                None
            } else {
                let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
                    RpcError::new(path.clone(), AppError::Parse("Body is not valid UTF-8".to_string()))
                })?;
                Some(text)
            }
        };

        parse_input(raw.as_deref())
            .map(Input)
            .map_err(|e| RpcError::new(path, e))
    }
}

async fn method_not_supported(method: Method, uri: Uri) -> RpcError {
    let path = procedure_path(&uri);
    let kind = if method == Method::GET { "mutation" } else { "query" };
    let message = format!("Unsupported {method}-request to {kind} procedure at path \"{path}\"");
    RpcError::new(path, AppError::MethodNotSupported(message))
}

pub async fn unknown_procedure(uri: Uri) -> RpcError {
    let path = procedure_path(&uri);
    let message = format!("No procedure found on path \"{path}\"");
    RpcError::new(path, AppError::NotFound(message))
}

/// Routes a read procedure: GET runs it, POST is refused.
pub fn query<H, T>(handler: H) -> MethodRouter<InnerState>
where
    H: Handler<T, InnerState>,
    T: 'static,
{
    get(handler).post(method_not_supported)
}

/// Routes a write procedure: POST runs it, GET is refused.
pub fn mutation<H, T>(handler: H) -> MethodRouter<InnerState>
where
    H: Handler<T, InnerState>,
    T: 'static,
{
    post(handler).get(method_not_supported)
}
