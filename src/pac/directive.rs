// src/pac/directive.rs
//! Parsing of `FindProxyForURL` results into proxy directives.

use serde::Serialize;
use std::fmt;
use std::net::Ipv6Addr;
use url::Url;

/// Port used when a `SOCKS` directive omits a usable one.
pub const DEFAULT_SOCKS_PORT: u16 = 1080;

/// One clause of a PAC result, e.g. `PROXY proxy.example.com:3128`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ProxyDirective {
    Direct,
    Proxy { host: String, port: u16 },
    Socks { host: String, port: u16 },
}

/// Directives in preference order; callers try them until one connects.
pub type ProxyDirectiveList = Vec<ProxyDirective>;

impl ProxyDirective {
    pub fn is_direct(&self) -> bool {
        matches!(self, ProxyDirective::Direct)
    }

    /// The proxy as a URL an HTTP client understands. `None` for `DIRECT`.
    pub fn proxy_url(&self) -> Option<String> {
        match self {
            ProxyDirective::Direct => None,
            ProxyDirective::Proxy { host, port } => {
                Some(format!("http://{}:{}", bracket(host), port))
            }
            ProxyDirective::Socks { host, port } => {
                Some(format!("socks5://{}:{}", bracket(host), port))
            }
        }
    }
}

fn bracket(host: &str) -> String {
    if host.contains(':') {
        format!("[{host}]")
    } else {
        host.to_string()
    }
}

impl fmt::Display for ProxyDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyDirective::Direct => write!(f, "DIRECT"),
            ProxyDirective::Proxy { host, port } => write!(f, "PROXY {}:{}", bracket(host), port),
            ProxyDirective::Socks { host, port } => write!(f, "SOCKS {}:{}", bracket(host), port),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Proxy,
    Socks,
}

/// Parses a raw PAC result. Unknown or malformed directives are logged and
/// skipped; the rest of the list is still returned.
pub fn parse_directives(raw: Option<&str>) -> ProxyDirectiveList {
    let Some(raw) = raw else {
        return Vec::new();
    };

    let mut directives = Vec::new();
    for token in raw.split(';').map(str::trim).filter(|t| !t.is_empty()) {
        match parse_token(token) {
            Some(directive) => directives.push(directive),
            None => {
                tracing::warn!(token, raw, "Skipping malformed PAC directive");
            }
        }
    }
    directives
}

pub fn parse_directives_str(raw: &str) -> ProxyDirectiveList {
    parse_directives(Some(raw))
}

fn parse_token(token: &str) -> Option<ProxyDirective> {
    if token == "DIRECT" {
        return Some(ProxyDirective::Direct);
    }

    let kind = if token.starts_with("PROXY") {
        Kind::Proxy
    } else if token.starts_with("SOCKS") {
        Kind::Socks
    } else {
        return None;
    };

    let parts: Vec<&str> = token.split(' ').collect();
    let [keyword, target] = parts.as_slice() else {
        return None;
    };
    let expected = match kind {
        Kind::Proxy => "PROXY",
        Kind::Socks => "SOCKS",
    };
    if *keyword != expected || target.is_empty() {
        return None;
    }

    let (host, port) = split_host_port(target)?;
    let port = port.unwrap_or_else(|| default_port(kind, target));

    Some(match kind {
        Kind::Proxy => ProxyDirective::Proxy { host, port },
        Kind::Socks => ProxyDirective::Socks { host, port },
    })
}

/// Splits a directive target into a non-empty host and, when present and
/// valid, a port. `None` means the target is structurally broken.
fn split_host_port(target: &str) -> Option<(String, Option<u16>)> {
    if let Some((_, rest)) = target.split_once("://") {
        let authority = rest.split_once('/').map_or(rest, |(authority, _)| authority);
        if let Ok(url) = Url::parse(target) {
            let host = url.host_str()?.trim_start_matches('[').trim_end_matches(']');
            if host.is_empty() {
                return None;
            }
            // Explicit ports only; scheme defaults are applied per directive kind.
            // `Url` drops a port equal to the scheme default, so read it back
            // from the authority text.
            let port = url.port().or_else(|| {
                authority
                    .rsplit_once(':')
                    .and_then(|(_, port)| parse_port(port))
            });
            return Some((host.to_string(), port));
        }
        // Not a valid URL (typically a bad port); retry on the bare authority.
        return split_host_port(authority);
    }

    if let Some(rest) = target.strip_prefix('[') {
        let (host, after) = rest.split_once(']')?;
        if host.is_empty() {
            return None;
        }
        let port = match after {
            "" => None,
            _ => parse_port(after.strip_prefix(':')?),
        };
        return Some((host.to_string(), port));
    }

    if let Ok(ip) = target.parse::<Ipv6Addr>() {
        return Some((ip.to_string(), None));
    }

    let (host, port) = match target.rsplit_once(':') {
        Some((host, port)) => (host, parse_port(port)),
        None => (target, None),
    };
    if host.chars().all(|c| c == ':') {
        return None;
    }
    Some((host.to_string(), port))
}

fn parse_port(port: &str) -> Option<u16> {
    port.parse::<u16>().ok().filter(|p| *p != 0)
}

fn default_port(kind: Kind, target: &str) -> u16 {
    match kind {
        Kind::Socks => DEFAULT_SOCKS_PORT,
        Kind::Proxy => protocol_default_port(target),
    }
}

/// Default port of the protocol `target` looks like it uses, HTTP's otherwise.
fn protocol_default_port(target: &str) -> u16 {
    const HTTP_PORT: u16 = 80;

    let Some((scheme, _)) = target.split_once("://") else {
        return HTTP_PORT;
    };
    Url::parse(&format!("{}://placeholder", scheme.to_ascii_lowercase()))
        .ok()
        .and_then(|u| u.port_or_known_default())
        .unwrap_or(HTTP_PORT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    fn proxy(host: &str, port: u16) -> ProxyDirective {
        ProxyDirective::Proxy {
            host: host.to_string(),
            port,
        }
    }

    fn socks(host: &str, port: u16) -> ProxyDirective {
        ProxyDirective::Socks {
            host: host.to_string(),
            port,
        }
    }

    #[test]
    fn test_single_directives() {
        assert_eq!(parse_directives_str("DIRECT"), vec![ProxyDirective::Direct]);
        assert_eq!(
            parse_directives_str("PROXY proxy.example.com:3128"),
            vec![proxy("proxy.example.com", 3128)]
        );
        assert_eq!(
            parse_directives_str("SOCKS 10.0.0.1:1081"),
            vec![socks("10.0.0.1", 1081)]
        );
    }

    #[test]
    fn test_empty_input() {
        assert!(parse_directives(None).is_empty());
        assert!(parse_directives_str("").is_empty());
        assert!(parse_directives_str("   ").is_empty());
        assert!(parse_directives_str(" ; ;").is_empty());
    }

    #[test]
    fn test_order_preserved() {
        assert_eq!(
            parse_directives_str("DIRECT; PROXY a:1; SOCKS b:2"),
            vec![ProxyDirective::Direct, proxy("a", 1), socks("b", 2)]
        );
        assert_eq!(
            parse_directives_str("SOCKS b:2;PROXY a:1;DIRECT;"),
            vec![socks("b", 2), proxy("a", 1), ProxyDirective::Direct]
        );
    }

    #[test]
    fn test_malformed_tokens_are_skipped() {
        assert_eq!(
            parse_directives_str("DIRECT; GARBAGE; PROXY a:1"),
            vec![ProxyDirective::Direct, proxy("a", 1)]
        );

        for bad in [
            "direct",
            "DIRECTLY",
            "PROXY",
            "PROXY ",
            "PROXYX a:1",
            "PROXY a:1 b:2",
            "PROXY  a:1",
            "PROXY :8080",
            "SOCKS5 a:1",
            "SOCKS []:1080",
            "HTTPS a:443",
        ] {
            assert!(
                parse_directives_str(bad).is_empty(),
                "{bad:?} should be skipped"
            );
        }
    }

    #[test]
    fn test_proxy_port_fallback() {
        assert_eq!(
            parse_directives_str("PROXY justahost"),
            vec![proxy("justahost", 80)]
        );
        assert_eq!(parse_directives_str("PROXY a:xml"), vec![proxy("a", 80)]);
        assert_eq!(parse_directives_str("PROXY a:0"), vec![proxy("a", 80)]);
        assert_eq!(parse_directives_str("PROXY a:70000"), vec![proxy("a", 80)]);
        assert_eq!(
            parse_directives_str("PROXY https://secure.example.com"),
            vec![proxy("secure.example.com", 443)]
        );
        assert_eq!(
            parse_directives_str("PROXY https://secure.example.com:bad"),
            vec![proxy("secure.example.com", 443)]
        );
        assert_eq!(
            parse_directives_str("PROXY http://web.example.com:8081/"),
            vec![proxy("web.example.com", 8081)]
        );
    }

    #[test]
    fn test_socks_port_fallback() {
        assert_eq!(parse_directives_str("SOCKS b"), vec![socks("b", 1080)]);
        assert_eq!(parse_directives_str("SOCKS b:nope"), vec![socks("b", 1080)]);
        assert_eq!(
            parse_directives_str("SOCKS https://s.example"),
            vec![socks("s.example", 1080)]
        );
        assert_eq!(
            parse_directives_str("SOCKS http://s.example"),
            vec![socks("s.example", 1080)]
        );
        assert_eq!(
            parse_directives_str("SOCKS https://s.example:1085"),
            vec![socks("s.example", 1085)]
        );
        assert_eq!(
            parse_directives_str("SOCKS https://s.example:443"),
            vec![socks("s.example", 443)]
        );
    }

    #[test]
    fn test_ipv6_targets() {
        assert_eq!(
            parse_directives_str("PROXY [2001:db8::1]:3128"),
            vec![proxy("2001:db8::1", 3128)]
        );
        assert_eq!(parse_directives_str("SOCKS [::1]"), vec![socks("::1", 1080)]);
        assert!(parse_directives_str("PROXY [::1]3128").is_empty());
        assert_eq!(parse_directives_str("PROXY ::1"), vec![proxy("::1", 80)]);
        assert_eq!(
            parse_directives_str("SOCKS 2001:db8::1"),
            vec![socks("2001:db8::1", 1080)]
        );
        assert!(parse_directives_str("PROXY :::").is_empty());
        assert!(parse_directives_str("PROXY ::::8080").is_empty());
    }

    #[derive(Clone, Default)]
    struct CapturedLog(Arc<Mutex<Vec<u8>>>);

    impl Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_malformed_token_warning_names_token_and_raw() {
        let captured = CapturedLog::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();

        let raw = "DIRECT; GARBAGE; PROXY a:1";
        let parsed = tracing::subscriber::with_default(subscriber, || parse_directives_str(raw));
        assert_eq!(parsed, vec![ProxyDirective::Direct, proxy("a", 1)]);

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.lines().count(), 1, "{output}");
        assert!(output.contains("WARN"), "{output}");
        assert!(output.contains("GARBAGE"), "{output}");
        assert!(output.contains(raw), "{output}");
    }

    #[test]
    fn test_parse_is_deterministic() {
        let raw = "PROXY a:1; junk; SOCKS b; DIRECT";
        assert_eq!(parse_directives_str(raw), parse_directives_str(raw));
    }

    #[test]
    fn test_display_round_trips_pac_form() {
        let list = parse_directives_str("PROXY [::1]:8080; SOCKS s:1080; DIRECT");
        let rendered: Vec<String> = list.iter().map(ToString::to_string).collect();
        assert_eq!(rendered, ["PROXY [::1]:8080", "SOCKS s:1080", "DIRECT"]);
    }

    #[test]
    fn test_proxy_url() {
        assert_eq!(ProxyDirective::Direct.proxy_url(), None);
        assert_eq!(proxy("p", 3128).proxy_url().as_deref(), Some("http://p:3128"));
        assert_eq!(socks("::1", 1080).proxy_url().as_deref(), Some("socks5://[::1]:1080"));
    }

    #[test]
    fn test_serialize_shape() {
        let json = serde_json::to_value(vec![ProxyDirective::Direct, proxy("a", 1)]).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                { "type": "direct" },
                { "type": "proxy", "host": "a", "port": 1 }
            ])
        );
    }
}
