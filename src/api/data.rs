use axum::extract::{Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::api::AppState;
use crate::db::read;
use crate::validate::is_valid_apex;

fn default_per_page() -> i64 {
    50
}

#[derive(Debug, Deserialize)]
pub struct DataQuery {
    pub domain: String,
    pub source: String,
    #[serde(default)]
    pub page: i64,
    #[serde(default = "default_per_page")]
    pub per_page: i64,
    // opaque continuation token from a previous `links.next`; paging is
    // offset-driven so it is accepted and re-emitted, not decoded
    #[allow(dead_code)]
    pub cursor: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubdomainOut {
    pub subdomain: String,
    pub sources: Vec<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AliveOut {
    pub subdomain: String,
    pub probed_at: Option<String>,
    pub status_code: Option<i32>,
}

/// `base64(json({limit, offset}))`, empty handled by the caller.
pub fn encode_cursor(limit: i64, offset: i64) -> String {
    let payload = json!({"limit": limit, "offset": offset}).to_string();
    base64::engine::general_purpose::STANDARD.encode(payload)
}

fn bad_request(detail: String) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({"detail": detail}))).into_response()
}

/// Paginated read over the master inventory or the alive table, filtered to
/// one apex, newest first.
pub async fn domain_data(State(state): State<AppState>, Query(q): Query<DataQuery>) -> Response {
    if !is_valid_apex(&q.domain) {
        return bad_request(format!("invalid domain: {}", q.domain));
    }
    if q.page < 0 || q.per_page < 1 || q.per_page > 100 {
        return bad_request("invalid pagination params".into());
    }
    let domain = q.domain.trim().to_lowercase();
    let pool = &state.ctx.pool;

    let (items, total): (Vec<Value>, i64) = match q.source.as_str() {
        "all_subdomains" => {
            let rows = match read::list_master_subdomains(pool, &domain, q.page, q.per_page).await {
                Ok(rows) => rows,
                Err(e) => return storage_error(e),
            };
            let count = match read::count_master_subdomains(pool, &domain).await {
                Ok(count) => count,
                Err(e) => return storage_error(e),
            };
            let items = rows
                .into_iter()
                .map(|r| {
                    json!(SubdomainOut {
                        subdomain: r.subdomain,
                        sources: r.sources.0,
                        created_at: Some(r.created_at.format("%Y-%m-%dT%H:%M:%S").to_string()),
                    })
                })
                .collect();
            (items, count)
        }
        "alive_subdomains" => {
            let rows = match read::list_alive_subdomains(pool, &domain, q.page, q.per_page).await {
                Ok(rows) => rows,
                Err(e) => return storage_error(e),
            };
            let count = match read::count_alive_subdomains(pool, &domain).await {
                Ok(count) => count,
                Err(e) => return storage_error(e),
            };
            let items = rows
                .into_iter()
                .map(|r| {
                    json!(AliveOut {
                        subdomain: r.subdomain,
                        probed_at: r
                            .probed_at
                            .map(|t| t.format("%Y-%m-%dT%H:%M:%S").to_string()),
                        status_code: r.status_code,
                    })
                })
                .collect();
            (items, count)
        }
        other => return bad_request(format!("invalid source: {other}")),
    };

    let offset = q.page * q.per_page;
    let next_cursor = if offset + q.per_page < total {
        encode_cursor(q.per_page, offset + q.per_page)
    } else {
        String::new()
    };

    let base = format!(
        "/domains/data?domain={}&source={}",
        urlencoding::encode(&domain),
        urlencoding::encode(&q.source)
    );
    let self_url = format!("{base}&page={}&per_page={}", q.page, q.per_page);
    let next_url = if next_cursor.is_empty() {
        String::new()
    } else {
        format!(
            "{base}&page={}&per_page={}&cursor={}",
            q.page + 1,
            q.per_page,
            next_cursor
        )
    };

    let mut headers = HeaderMap::new();
    headers.insert("x-page", header_num(q.page));
    headers.insert("x-per-page", header_num(q.per_page));
    headers.insert("x-total-count", header_num(total));

    let body = json!({
        "data": items,
        "meta": {"count": total, "cursor": next_cursor},
        "links": {"self": self_url, "next": next_url},
    });
    (StatusCode::OK, headers, Json(body)).into_response()
}

fn header_num(n: i64) -> HeaderValue {
    HeaderValue::from_str(&n.to_string()).unwrap_or(HeaderValue::from_static("0"))
}

fn storage_error(e: anyhow::Error) -> Response {
    tracing::error!(error = %e, "data query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"detail": "storage error"})),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_round_trips() {
        let cursor = encode_cursor(50, 100);
        let decoded = base64::engine::general_purpose::STANDARD.decode(cursor).unwrap();
        let v: Value = serde_json::from_slice(&decoded).unwrap();
        assert_eq!(v["limit"], 50);
        assert_eq!(v["offset"], 100);
    }

    #[test]
    fn default_page_size_is_bounded() {
        assert_eq!(default_per_page(), 50);
        assert!(default_per_page() <= 100);
    }
}
