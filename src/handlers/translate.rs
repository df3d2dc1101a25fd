//! # Translation Proxy
//!
//! `POST /api/translate` forwards the caller's translation parameters to the Language
//! Translator and returns its JSON result untouched.
//!
//! ## Request Formats:
//! - `application/json`: any JSON object (`{"text": "hello", "target": "fr"}`)
//! - `application/x-www-form-urlencoded`: `text=hello&target=fr`
//!
//! The optional `X-WDC-PL-OPT-OUT` request header is merged in as the base of the
//! parameter set; body fields override it on a key collision. A header value that is
//! not visible ASCII is rejected with 400 rather than dropped.

use crate::clients::OPT_OUT_HEADER;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use actix_web::{web, Either, HttpRequest, HttpResponse};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, error, warn};

/// Either body encoding the browser may use.
pub type TranslateBody = Either<web::Json<Map<String, Value>>, web::Form<HashMap<String, String>>>;

/// Build the downstream parameter set.
///
/// ## Merge order:
/// 1. Start from `{ "X-WDC-PL-OPT-OUT": <header value> }` if the header was sent
/// 2. Overlay every body field (body wins on collision)
///
/// An absent header adds nothing: the key never appears with a placeholder value.
pub fn merge_params(opt_out: Option<&str>, body: Map<String, Value>) -> Map<String, Value> {
    let mut params = Map::new();
    if let Some(value) = opt_out {
        params.insert(OPT_OUT_HEADER.to_string(), Value::String(value.to_string()));
    }
    params.extend(body);
    params
}

fn body_to_map(body: TranslateBody) -> Map<String, Value> {
    match body {
        Either::Left(json) => json.into_inner(),
        Either::Right(form) => form
            .into_inner()
            .into_iter()
            .map(|(key, value)| (key, Value::String(value)))
            .collect(),
    }
}

fn opt_out_header(req: &HttpRequest) -> AppResult<Option<&str>> {
    let Some(value) = req.headers().get(OPT_OUT_HEADER) else {
        return Ok(None);
    };

    value.to_str().map(Some).map_err(|_| {
        warn!(raw = ?value, "Unreadable {} header", OPT_OUT_HEADER);
        AppError::BadRequest(format!("{} header must be visible ASCII", OPT_OUT_HEADER))
    })
}

pub async fn translate(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: TranslateBody,
) -> AppResult<HttpResponse> {
    let opt_out = opt_out_header(&req)?;
    let params = merge_params(opt_out, body_to_map(body));

    debug!(
        opt_out = opt_out.is_some(),
        fields = params.len(),
        "Forwarding translation request"
    );

    let result = state.clients.translator.translate(params).await.map_err(|err| {
        error!(
            service = err.service(),
            upstream_status = ?err.status(),
            error = %err,
            "Translation failed"
        );
        err
    })?;

    Ok(HttpResponse::Ok().json(result))
}
