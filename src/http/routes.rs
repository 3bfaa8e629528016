use axum::Router;

use crate::app::AppContext;

/// Trait for composable route modules
///
/// Each module contributes its own routes and is merged into the main
/// application by [`App::register_module`](crate::App::register_module).
///
/// # Example
///
/// ```ignore
/// struct RefundsModule;
///
/// impl RouteModule for RefundsModule {
///     fn routes(&self) -> Router<AppContext> {
///         Router::new().route("/webhooks/refunds", post(receive_refund))
///     }
/// }
/// ```
pub trait RouteModule {
    /// Routes for this module, without state applied
    ///
    /// State is attached once at the App level, so handlers take
    /// `State<AppContext>`.
    fn routes(&self) -> Router<AppContext>
    where
        Self: Sized;

    /// Optional path prefix for all routes in this module
    fn prefix(&self) -> Option<&str> {
        None
    }

    /// Merge this module's routes into `router`
    fn register(self, router: Router<AppContext>) -> Router<AppContext>
    where
        Self: Sized,
    {
        let routes = self.routes();

        if let Some(prefix) = self.prefix() {
            router.nest(prefix, routes)
        } else {
            router.merge(routes)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;
    use axum::routing::get;

    struct Prefixed;

    impl RouteModule for Prefixed {
        fn routes(&self) -> Router<AppContext> {
            Router::new().route("/ping", get(|| async { "pong" }))
        }

        fn prefix(&self) -> Option<&str> {
            Some("/internal")
        }
    }

    #[tokio::test]
    async fn test_prefix_is_applied() {
        let router = Prefixed
            .register(Router::new())
            .with_state(AppContext::builder().build().unwrap());

        testing::get(router.clone(), "/internal/ping")
            .execute()
            .await
            .assert_ok()
            .assert_contains("pong")
            .await;
        testing::get(router, "/ping").execute().await.assert_not_found();
    }
}
