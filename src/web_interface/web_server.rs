use std::net::SocketAddr;
use std::sync::Arc;

use log::info;
use tokio::net::TcpListener;

use super::routes::routes;
use crate::controller::Controller;
use crate::error_handling::types::WebError;

/// Web server for the command, sampling and reporting API
pub struct WebServer {
    controller: Arc<Controller>,
}

impl WebServer {
    /// Create a new WebServer instance
    pub fn new(controller: Arc<Controller>) -> Self {
        Self { controller }
    }

    /// Claims `addr` for the web interface.
    pub async fn bind(addr: SocketAddr) -> Result<TcpListener, WebError> {
        TcpListener::bind(addr)
            .await
            .map_err(|e| WebError::BindFailed(format!("{}: {}", addr, e)))
    }

    /// Serve every route on an already bound listener until the task is dropped
    pub async fn serve(&self, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            info!("Web interface listening on http://{}", addr);
        }
        warp::serve(routes(self.controller.clone()))
            .incoming(listener)
            .run()
            .await;
    }

    /// Bind `addr` and serve on it
    pub async fn start(&self, addr: SocketAddr) -> Result<(), WebError> {
        let listener = Self::bind(addr).await?;
        self.serve(listener).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::configuration::Config;

    #[tokio::test]
    async fn test_start_reports_address_in_use() {
        let held = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = held.local_addr().unwrap();

        let controller = Arc::new(Controller::new(Config::default()).unwrap());
        let server = WebServer::new(controller);
        let result = server.start(addr).await;

        assert!(matches!(result, Err(WebError::BindFailed(_))));
    }
}
