//! Upgrade entry point and route registration.

use std::sync::Arc;

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::http::{header, HeaderMap, Method, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, MethodRouter};
use futures::StreamExt;
use tracing::{debug, warn};

use wsbridge_config::{ConfigError, LogLevel, Options, OptionsOverride};

use crate::codec::Codec;
use crate::connection::Connection;
use crate::context::SocketContext;
use crate::error::SocketError;
use crate::handler::{HandlerShape, IntoInvoker, Invoker};

/// Frames up to this multiple of `max_message_size` reach the read pump, which
/// rejects them as [`SocketError::MessageTooLarge`]; larger ones are refused by
/// the transport itself.
const TRANSPORT_LIMIT_FACTOR: usize = 4;

/// A registered socket endpoint: codec, handler and resolved options.
///
/// Built once per route. Every accepted request gets its own
/// [`Connection`] sharing these.
pub struct SocketRoute<C: Codec> {
    codec: Arc<C>,
    invoker: Arc<dyn Invoker<C::Item>>,
    options: Arc<Options>,
}

impl<C: Codec> Clone for SocketRoute<C> {
    fn clone(&self) -> Self {
        Self {
            codec: Arc::clone(&self.codec),
            invoker: Arc::clone(&self.invoker),
            options: Arc::clone(&self.options),
        }
    }
}

impl<C: Codec> SocketRoute<C> {
    /// Resolve `overrides` against the defaults, validate the result and
    /// convert `handler` into an invoker.
    pub fn new<H, M>(codec: C, handler: H, overrides: &[OptionsOverride]) -> Result<Self, ConfigError>
    where
        H: IntoInvoker<C::Item, M>,
    {
        let options = Options::resolve(overrides);
        options.validate()?;

        Ok(Self {
            codec: Arc::new(codec),
            invoker: handler.into_invoker(),
            options: Arc::new(options),
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn shape(&self) -> HandlerShape {
        self.invoker.shape()
    }

    /// Method and origin checks, in that order.
    pub fn check(&self, method: &Method, uri: &Uri, headers: &HeaderMap) -> Result<(), SocketError> {
        if method != Method::GET {
            return Err(SocketError::MethodNotAllowed(method.to_string()));
        }

        // A present but unreadable Origin is rejected, never treated as absent.
        let origin = match headers.get(header::ORIGIN) {
            Some(value) => Some(value.to_str().map_err(|_| {
                SocketError::OriginRejected(String::from_utf8_lossy(value.as_bytes()).into_owned())
            })?),
            None => None,
        };
        let host = headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| uri.authority().map(|a| a.as_str()))
            .unwrap_or_default();

        if !self.options.allowed_origins.allows(origin, host) {
            return Err(SocketError::OriginRejected(origin.unwrap_or_default().to_string()));
        }
        Ok(())
    }

    /// Handle one upgrade request.
    pub fn accept(
        &self,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    ) -> Response {
        if let Err(e) = self.check(&method, &uri, &headers) {
            if self.options.log_level.allows(LogLevel::Warning) {
                warn!(path = %uri.path(), error = %e, "Socket request rejected");
            }
            return e.into_response();
        }

        let ws = match upgrade {
            Ok(ws) => ws,
            Err(rejection) => {
                if self.options.log_level.allows(LogLevel::Debug) {
                    let e = SocketError::UpgradeFailed(rejection.body_text());
                    debug!(path = %uri.path(), error = %e, "Socket request rejected");
                }
                return rejection.into_response();
            }
        };

        let context = SocketContext::new(method, uri, headers);
        let conn_id = context.id;
        let limit = self
            .options
            .max_message_size
            .saturating_mul(TRANSPORT_LIMIT_FACTOR);
        let level = self.options.log_level;
        let route = self.clone();

        ws.max_message_size(limit)
            .max_frame_size(limit)
            .on_failed_upgrade(move |e: axum::Error| {
                if level.allows(LogLevel::Warning) {
                    let e = SocketError::UpgradeFailed(e.to_string());
                    warn!(conn_id = %conn_id, error = %e, "Socket upgrade failed");
                }
            })
            .on_upgrade(move |socket| async move {
                let (sink, stream) = socket.split();
                let conn = Connection::new(context, route.codec, route.options);
                // Failures are logged by the connection itself.
                let _report = conn.run(sink, stream, route.invoker).await;
            })
    }

    /// Mount with `Router::route`. Every method is routed here so non-GET
    /// requests get a 405 from [`SocketRoute::check`].
    pub fn into_method_router<S>(self) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        any(
            move |method: Method,
                  uri: Uri,
                  headers: HeaderMap,
                  upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>| {
                let response = self.accept(method, uri, headers, upgrade);
                async move { response }
            },
        )
    }
}

/// Register `handler` as a socket endpoint.
///
/// ```ignore
/// let app = Router::new()
///     .route("/strings/receiver", socket(messages(), on_strings, &[])?)
///     .route("/receiver", socket(json::<Note>(), on_notes, &[overrides])?);
/// ```
pub fn socket<C, H, M, S>(
    codec: C,
    handler: H,
    overrides: &[OptionsOverride],
) -> Result<MethodRouter<S>, ConfigError>
where
    C: Codec,
    H: IntoInvoker<C::Item, M>,
    S: Clone + Send + Sync + 'static,
{
    Ok(SocketRoute::new(codec, handler, overrides)?.into_method_router())
}

#[cfg(test)]
#[path = "upgrade_tests.rs"]
mod tests;
