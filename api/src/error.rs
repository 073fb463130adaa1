#[cfg(debug_assertions)]
use std::collections::HashMap;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
#[cfg(debug_assertions)]
use serde_json::Value;

use crate::thread::ThreadError;

/// Errors that know which HTTP status they should be rendered with.
pub trait ApiRequestError {
    fn status_code(&self) -> StatusCode;
}

#[derive(Debug)]
pub enum AppError {
    ServerError {
        error: ThreadError,

        #[cfg(debug_assertions)]
        backtrace: Option<backtrace::Backtrace>,
    },
    Request {
        code: &'static str,
        msg: String,
        status: StatusCode,
    },
}

#[derive(Serialize)]
struct ErrorResponse {
    code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<String>,

    #[cfg(debug_assertions)]
    #[serde(skip_serializing_if = "Option::is_none")]
    debug_info: Option<HashMap<&'static str, Value>>,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ServerError { error, .. } => error.status_code(),
            AppError::Request { status, .. } => *status,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status_code = self.status_code();

        let error_response = match self {
            AppError::ServerError {
                error,
                #[cfg(debug_assertions)]
                backtrace,
            } => ErrorResponse {
                code: error.code().into(),
                msg: Some(error.to_string()),
                #[cfg(debug_assertions)]
                debug_info: backtrace.as_ref().map(|b| {
                    HashMap::from([(
                        "backtrace",
                        serde_json::to_value(filter_backtrace(b)).unwrap_or_default(),
                    )])
                }),
            },
            AppError::Request { code, msg, .. } => ErrorResponse {
                code: code.into(),
                msg: Some(msg),
                #[cfg(debug_assertions)]
                debug_info: None,
            },
        };

        (status_code, Json(error_response)).into_response()
    }
}

impl From<ThreadError> for AppError {
    fn from(e: ThreadError) -> Self {
        if e.status_code().is_server_error() {
            AppError::ServerError {
                error: e,

                #[cfg(debug_assertions)]
                backtrace: Some(backtrace::Backtrace::new()),
            }
        } else {
            AppError::Request {
                code: e.code(),
                msg: e.to_string(),
                status: e.status_code(),
            }
        }
    }
}

impl From<(&'static str, StatusCode)> for AppError {
    fn from((msg, status): (&'static str, StatusCode)) -> Self {
        (msg.to_string(), status).into()
    }
}

impl From<(String, StatusCode)> for AppError {
    fn from((msg, status): (String, StatusCode)) -> Self {
        AppError::Request {
            code: "ERR",
            msg,
            status,
        }
    }
}

#[cfg(debug_assertions)]
#[derive(Serialize, Debug)]
struct FrameInfo {
    name: String,
    loc: String,
}

#[cfg(debug_assertions)]
fn filter_backtrace(backtrace: &backtrace::Backtrace) -> Vec<FrameInfo> {
    const MODULE_PREFIX: &str = "threads_api::";
    let mut frames_info: Vec<FrameInfo> = Vec::new();

    for frame in backtrace.frames() {
        for symbol in frame.symbols() {
            if let (Some(name), Some(filename), Some(lineno)) = (
                symbol.name().map(|n| n.to_string()),
                symbol.filename().map(|f| f.to_owned()),
                symbol.lineno(),
            ) {
                if name.contains(MODULE_PREFIX) {
                    frames_info.push(FrameInfo {
                        name,
                        loc: format!("{}:{}", filename.display(), lineno),
                    });
                }
            }
        }
    }

    frames_info
}
