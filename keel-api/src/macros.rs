//! Declarative macros shared across the API crate.

/// Implement `FromRef<AppState>` for a field (or nested field) of the state.
///
/// # Example
/// ```ignore
/// impl_from_ref!(Services, services);
/// impl_from_ref!(ProductService, services.products);
/// // Expands to:
/// impl axum::extract::FromRef<AppState> for ProductService {
///     fn from_ref(state: &AppState) -> Self {
///         state.services.products.clone()
///     }
/// }
/// ```
#[macro_export]
macro_rules! impl_from_ref {
    ($type:ty, $($field:ident).+) => {
        impl axum::extract::FromRef<$crate::state::AppState> for $type {
            fn from_ref(state: &$crate::state::AppState) -> Self {
                state.$($field).+.clone()
            }
        }
    };
}
