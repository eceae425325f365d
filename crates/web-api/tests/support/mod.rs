#![allow(dead_code)]

use std::{net::SocketAddr, time::Duration};

use config::AppConfig;
use infrastructure::Infrastructure;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::oneshot, time::sleep};
use web_api::{router, AppState};

pub const TEST_SECRET: &str = "integration-test-secret-0123456789abcdef";

pub fn test_state() -> AppState {
    let mut config = AppConfig::development();
    config.jwt.secret = TEST_SECRET.to_string();
    config.hub.outbox_capacity = 64;
    AppState::build(Infrastructure::in_memory(Some(4)), &config)
}

/// 在随机端口上启动服务，返回地址和关闭句柄
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub client: Client,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    pub async fn spawn() -> Self {
        let state = test_state();
        let app = router(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });
        sleep(Duration::from_millis(50)).await;

        Self {
            addr,
            state,
            client: Client::new(),
            shutdown: Some(shutdown_tx),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, token: Option<&str>) -> String {
        match token {
            Some(token) => format!("ws://{}/ws?token={}", self.addr, token),
            None => format!("ws://{}/ws", self.addr),
        }
    }

    /// 注册用户，返回 (token, user_id)
    pub async fn register(&self, name: &str) -> (String, i64) {
        let response = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&json!({
                "username": name,
                "email": format!("{name}@example.com"),
                "password": "secret1",
            }))
            .send()
            .await
            .expect("register request");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("register json");
        let token = body["token"].as_str().expect("token").to_string();
        let user_id = body["user"]["id"].as_i64().expect("user id");
        (token, user_id)
    }

    pub async fn create_group(&self, token: &str, name: &str) -> i64 {
        let response = self
            .client
            .post(self.url("/api/chat/groups"))
            .bearer_auth(token)
            .json(&json!({ "name": name }))
            .send()
            .await
            .expect("create group request");
        assert_eq!(response.status(), StatusCode::CREATED);
        let body: Value = response.json().await.expect("group json");
        body["group"]["id"].as_i64().expect("group id")
    }

    pub async fn join_group(&self, token: &str, group_id: i64) -> reqwest::Response {
        self.client
            .post(self.url(&format!("/api/chat/groups/{group_id}/join")))
            .bearer_auth(token)
            .send()
            .await
            .expect("join request")
    }

    pub async fn send_message(&self, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/chat/messages"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("send message request")
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}
