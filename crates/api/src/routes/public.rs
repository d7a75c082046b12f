use axum::routing::get;
use axum::Router;

use crate::handlers::files;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/public/files-proxy/{*key}", get(files::files_proxy))
}
