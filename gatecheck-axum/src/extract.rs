//! Client IP resolution, in priority order: `X-Forwarded-For`'s first hop,
//! then `X-Real-IP`, then the peer address `axum` recorded via
//! `ConnectInfo`.

use axum::extract::ConnectInfo;
use axum::extract::Request;
use std::net::{IpAddr, SocketAddr};

pub fn client_ip(req: &Request) -> Option<IpAddr> {
    if let Some(ip) = header_ip(req, "x-forwarded-for").and_then(first_forwarded_hop) {
        return Some(ip);
    }
    if let Some(ip) = header_ip(req, "x-real-ip") {
        return Some(ip);
    }
    req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip())
}

fn header_ip<'a>(req: &'a Request, name: &str) -> Option<&'a str> {
    req.headers().get(name)?.to_str().ok()
}

fn first_forwarded_hop(value: &str) -> Option<IpAddr> {
    value.split(',').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    fn request_with_header(name: &str, value: &str) -> Request {
        HttpRequest::builder().header(name, value).body(Body::empty()).unwrap()
    }

    #[test]
    fn prefers_x_forwarded_for_first_hop() {
        let req = request_with_header("x-forwarded-for", "1.2.3.4, 5.6.7.8");
        assert_eq!(client_ip(&req), Some("1.2.3.4".parse().unwrap()));
    }

    #[test]
    fn falls_back_to_x_real_ip() {
        let req = request_with_header("x-real-ip", "9.9.9.9");
        assert_eq!(client_ip(&req), Some("9.9.9.9".parse().unwrap()));
    }

    #[test]
    fn falls_back_to_connect_info() {
        let mut req = HttpRequest::builder().body(Body::empty()).unwrap();
        let addr: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        req.extensions_mut().insert(ConnectInfo(addr));
        assert_eq!(client_ip(&req), Some(addr.ip()));
    }

    #[test]
    fn no_signal_at_all_returns_none() {
        let req = HttpRequest::builder().body(Body::empty()).unwrap();
        assert_eq!(client_ip(&req), None);
    }

    #[test]
    fn malformed_forwarded_for_falls_through_to_real_ip() {
        let req = HttpRequest::builder()
            .header("x-forwarded-for", "not-an-ip")
            .header("x-real-ip", "9.9.9.9")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_ip(&req), Some("9.9.9.9".parse().unwrap()));
    }
}
