pub mod client;
pub mod compress;
pub mod config;
pub mod transport;

pub use client::ImageProxyClient;
pub use compress::{is_png, recompress_png};
pub use config::ProxyConfig;
pub use transport::{FilePart, ReqwestTransport, Transport, TransportResponse};
