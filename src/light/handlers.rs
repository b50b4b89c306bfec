//! Route handlers for the light API.

use serde::Serialize;

use crate::http::{Request, Response};
use crate::light::color::{Color, LightState};
use crate::routing::{handler_fn, Route, RouteError};

/// Usage hint at the root.
pub const HOME_PATTERN: &str = "^/$";
/// `/?color=RRGGBB`, hex digits in either case.
pub const COLOR_PATTERN: &str = r"(?i)^/\?color=[a-f0-9]*$";

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Debug, Serialize)]
struct StatusMessage {
    status: u16,
    message: String,
}

/// Append one JSON status object and a newline to `body`.
fn push_status(body: &mut String, message: String) {
    match serde_json::to_string(&StatusMessage {
        status: 200,
        message,
    }) {
        Ok(line) => {
            body.push_str(&line);
            body.push('\n');
        }
        Err(e) => tracing::error!(error = %e, "Failed to serialize status message"),
    }
}

/// Handlers bound to a light and the address it is advertised on.
#[derive(Debug, Clone)]
pub struct LightApi {
    state: LightState,
    advertised: String,
}

impl LightApi {
    pub fn new(state: LightState, host: &str, port: u16) -> Self {
        Self {
            state,
            advertised: format!("{}:{}", host, port),
        }
    }

    pub fn state(&self) -> &LightState {
        &self.state
    }

    pub async fn home_page(&self, _request: Request) -> Response {
        let mut body = String::new();
        push_status(
            &mut body,
            format!("The API is available at http://{}/?color=######", self.advertised),
        );

        Response::new()
            .with_header("Content-Type", JSON_CONTENT_TYPE)
            .with_content(body)
    }

    /// Set the light from every `color` query parameter, in order.
    ///
    /// Values that do not parse are logged and skipped, so the body may be empty.
    pub async fn color_page(&self, request: Request) -> Response {
        let mut body = String::new();

        if let Some(query) = request.query() {
            for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
                if name != "color" {
                    continue;
                }
                match Color::from_hex(&value) {
                    Ok(color) => {
                        self.state.set(color);
                        tracing::info!(color = %color, "Light colour set");
                        push_status(&mut body, format!("Color was set to {}", color));
                    }
                    Err(e) => tracing::warn!(value = %value, error = %e, "Ignoring colour"),
                }
            }
        }

        Response::new()
            .with_header("Content-Type", JSON_CONTENT_TYPE)
            .with_content(body)
    }

    /// The routing table: root first, then the colour endpoint.
    pub fn routes(self) -> Result<Vec<Route>, RouteError> {
        let home = self.clone();
        let color = self;

        Ok(vec![
            Route::new(
                HOME_PATTERN,
                handler_fn(move |request| {
                    let api = home.clone();
                    async move { api.home_page(request).await }
                }),
            )?,
            Route::new(
                COLOR_PATTERN,
                handler_fn(move |request| {
                    let api = color.clone();
                    async move { api.color_page(request).await }
                }),
            )?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::codec;
    use crate::routing::Router;

    fn api() -> LightApi {
        LightApi::new(LightState::new(), "192.168.1.20", 8081)
    }

    fn get(uri: &str) -> Request {
        codec::decode_bytes(format!("GET {} HTTP/1.1\r\n\r\n", uri).as_bytes()).unwrap()
    }

    fn body(response: &Response) -> &str {
        std::str::from_utf8(response.content.as_ref().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn home_page_advertises_the_api() {
        let response = api().home_page(get("/")).await;

        assert_eq!(response.headers.get("Content-Type"), Some("application/json"));
        assert_eq!(
            body(&response),
            "{\"status\":200,\"message\":\"The API is available at http://192.168.1.20:8081/?color=######\"}\n"
        );
    }

    #[tokio::test]
    async fn color_page_sets_the_light() {
        let api = api();
        let response = api.color_page(get("/?color=00ff7f")).await;

        assert_eq!(api.state().current(), Color::rgb(0x00, 0xFF, 0x7F));
        assert_eq!(
            body(&response),
            "{\"status\":200,\"message\":\"Color was set to #FF00FF7F\"}\n"
        );
    }

    #[tokio::test]
    async fn short_color_is_skipped() {
        let api = api();
        let response = api.color_page(get("/?color=abc")).await;

        assert_eq!(api.state().current(), Color::WHITE);
        assert_eq!(body(&response), "");
        assert_eq!(response.content_length(), 0);
    }

    #[tokio::test]
    async fn every_color_parameter_is_applied_in_order() {
        let api = api();
        let response = api.color_page(get("/?color=ff0000&color=0000ff")).await;

        assert_eq!(api.state().current(), Color::rgb(0, 0, 0xFF));
        assert_eq!(body(&response).lines().count(), 2);
    }

    #[test]
    fn routes_match_root_and_color_only() {
        let router = Router::new(api().routes().unwrap());

        assert_eq!(router.match_uri("/").unwrap().pattern(), HOME_PATTERN);
        assert_eq!(router.match_uri("/?COLOR=ABCDEF").unwrap().pattern(), COLOR_PATTERN);
        assert!(router.match_uri("/?color=ff0000&color=0000ff").is_none());
        assert!(router.match_uri("/index.html").is_none());
    }
}
