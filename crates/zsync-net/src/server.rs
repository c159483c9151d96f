//! 对等查询服务端
//!
//! 每个进程监听一个 HTTPS 端点，向对等进程提供自己当前的
//! 选择快照。查询端点在读取任何选择数据之前先做令牌校验；
//! 活性探测端点无鉴权，只回报会话ID与打开的文档列表。

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tower_http::trace::TraceLayer;

use zsync_core::identity::EntityIdentity;

use crate::error::NetError;
use crate::protocol::{
    AuthToken, HealthInfo, ResponseEnvelope, HEALTH_PATH, QUERY_PATH, TOKEN_HEADER,
};

/// 查询端点的数据来源：本进程自己的当前选择
pub trait SelectionProvider: Send + Sync {
    fn current_selection(&self) -> Vec<EntityIdentity>;

    /// 本进程打开的文档文件名，用于活性探测回报
    fn open_documents(&self) -> Vec<String>;
}

/// 服务端共享状态
#[derive(Clone)]
pub struct ServerState {
    pub provider: Arc<dyn SelectionProvider>,
    pub token: AuthToken,
    pub session_id: String,
}

/// 构建路由：查询端点在令牌中间件之后，探测端点公开
pub fn build_router(state: ServerState) -> Router {
    let protected = Router::new()
        .route(QUERY_PATH, post(query_selection))
        .layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route(HEALTH_PATH, get(health))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 从 PEM 证书/私钥构建 TLS 配置
///
/// 对等进程部署在受信局域网内，证书预期是自签名的；
/// 信任边界的收窄发生在客户端（见 `PeerClient`）。
pub async fn tls_config(cert: &Path, key: &Path) -> Result<RustlsConfig, NetError> {
    Ok(RustlsConfig::from_pem_file(cert, key).await?)
}

/// 启动 HTTPS 监听
pub async fn serve(addr: SocketAddr, tls: RustlsConfig, router: Router) -> Result<(), NetError> {
    tracing::info!("Selection sync listener on https://{}", addr);
    axum_server::bind_rustls(addr, tls)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}

/// 令牌校验中间件
///
/// 缺失与错误的令牌走完全相同的路径，响应形状一致。
async fn require_token(State(state): State<ServerState>, request: Request, next: Next) -> Response {
    let presented = request
        .headers()
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !state.token.matches(presented) {
        tracing::warn!("Rejected unauthenticated selection query");
        return (
            StatusCode::UNAUTHORIZED,
            Json(ResponseEnvelope::failure("unauthorized")),
        )
            .into_response();
    }
    next.run(request).await
}

/// POST /selection/query — 返回本进程当前选择
///
/// 请求体为空或最小 JSON，服务端不做过滤，过滤在客户端聚合后进行。
async fn query_selection(State(state): State<ServerState>) -> Json<ResponseEnvelope> {
    let items = state.provider.current_selection();
    tracing::debug!("Serving selection query: {} identities", items.len());
    match ResponseEnvelope::with_output(&items) {
        Ok(envelope) => Json(envelope),
        Err(e) => Json(ResponseEnvelope::failure(format!("encode error: {e}"))),
    }
}

/// GET /health — 活性探测，回报会话与文档列表
async fn health(State(state): State<ServerState>) -> Json<ResponseEnvelope> {
    let info = HealthInfo {
        session_id: state.session_id.clone(),
        documents: state.provider.open_documents(),
    };
    match ResponseEnvelope::with_output(&info) {
        Ok(envelope) => Json(envelope),
        Err(e) => Json(ResponseEnvelope::failure(format!("encode error: {e}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use tower::ServiceExt;

    struct FixedProvider(Vec<EntityIdentity>);

    impl SelectionProvider for FixedProvider {
        fn current_selection(&self) -> Vec<EntityIdentity> {
            self.0.clone()
        }

        fn open_documents(&self) -> Vec<String> {
            vec!["plant.dwg".to_string()]
        }
    }

    fn test_router() -> Router {
        let provider = Arc::new(FixedProvider(vec![
            EntityIdentity::new("c:/plant.dwg", "1f"),
            EntityIdentity::new("c:/plant.dwg", "2a"),
        ]));
        build_router(ServerState {
            provider,
            token: AuthToken::new("secret"),
            session_id: "session-1".to_string(),
        })
    }

    async fn body_envelope(response: Response) -> ResponseEnvelope {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn query_request(token: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder()
            .method("POST")
            .uri(QUERY_PATH)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header(TOKEN_HEADER, token);
        }
        builder.body(Body::from("{}")).unwrap()
    }

    #[tokio::test]
    async fn test_query_with_valid_token() {
        let response = test_router().oneshot(query_request(Some("secret"))).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let envelope = body_envelope(response).await;
        let items: Vec<EntityIdentity> = envelope.decode_output().unwrap();
        assert_eq!(items.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_and_wrong_token_identical() {
        let missing = test_router().oneshot(query_request(None)).await.unwrap();
        let wrong = test_router().oneshot(query_request(Some("nope"))).await.unwrap();

        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);

        // 两种失败的响应体完全一致，且都不含选择数据
        let missing_env = body_envelope(missing).await;
        let wrong_env = body_envelope(wrong).await;
        assert_eq!(
            serde_json::to_string(&missing_env).unwrap(),
            serde_json::to_string(&wrong_env).unwrap()
        );
        assert!(missing_env.output.is_none());
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let request = HttpRequest::builder()
            .method("GET")
            .uri(HEALTH_PATH)
            .body(Body::empty())
            .unwrap();
        let response = test_router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let info: HealthInfo = body_envelope(response).await.decode_output().unwrap();
        assert_eq!(info.session_id, "session-1");
        assert_eq!(info.documents, vec!["plant.dwg".to_string()]);
    }
}
