//! HTTP transport and request body encoding.

mod encoder;
mod transport;

pub use encoder::{BodyEncoder, JsonEncoder};
pub use transport::{Headers, HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};

#[cfg(test)]
pub use transport::MockTransport;
