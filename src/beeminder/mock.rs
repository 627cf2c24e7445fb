use crate::beeminder::client::BeeminderClient;
use tokio::runtime::Runtime;
use wiremock::{Mock, MockServer, Request};

pub const USER: &str = "alice";
pub const TOKEN: &str = "test-token";

// Field order matters: the server is dropped (and its expectations verified)
// before the runtime that started it.
pub struct MockApi {
    pub server: MockServer,
    rt: Runtime,
}

impl MockApi {
    pub fn start() -> Self {
        let rt = Runtime::new().expect("tokio runtime");
        let server = rt.block_on(MockServer::start());
        Self { server, rt }
    }

    pub fn mount(&self, mock: Mock) {
        self.rt.block_on(mock.mount(&self.server));
    }

    pub fn client(&self) -> BeeminderClient {
        BeeminderClient::new(&self.server.uri(), USER, Some(TOKEN.to_string())).expect("client")
    }

    pub fn requests(&self, method: &str) -> Vec<Request> {
        self.rt
            .block_on(self.server.received_requests())
            .unwrap_or_default()
            .into_iter()
            .filter(|r| r.method.as_str() == method)
            .collect()
    }
}
