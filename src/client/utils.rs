use crate::client::config::Config;
use crate::client::consts::ORIGIN_HEADER;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;

pub fn build_request(endpoint: &str, config: &Config) -> tokio_tungstenite::tungstenite::Result<Request> {
    let mut request = endpoint.into_client_request()?;
    if let Some(origin) = config.origin() {
        request.headers_mut().insert(ORIGIN_HEADER, origin.parse()?);
    }
    Ok(request)
}
