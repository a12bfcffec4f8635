/// Derive `(container_name, port)` from a `Host` header of the form
/// `<container_name_with_dashes>-<port>.<base_domain>`. Routing is entirely
/// host-based: the path is forwarded unchanged, never consulted for
/// addressing. Splits on `.` first (to drop the base domain), then on `-`,
/// taking the **last** dash-separated token as the port and joining the
/// rest back with `-` as the container name.
pub fn parse_host(host: &str) -> Option<(String, u16)> {
    let subdomain = host.split('.').next()?;
    let mut parts: Vec<&str> = subdomain.split('-').collect();
    if parts.len() < 2 {
        return None;
    }
    let port: u16 = parts.pop()?.parse().ok()?;
    let container = parts.join("-");
    if container.is_empty() {
        return None;
    }
    Some((container, port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_container_name_and_port() {
        assert_eq!(parse_host("abc123-8080.sandbox.localhost"), Some(("abc123".into(), 8080)));
    }

    #[test]
    fn dashed_container_name_keeps_all_but_last_token() {
        assert_eq!(
            parse_host("my-agent-session-3000.sandbox.localhost"),
            Some(("my-agent-session".into(), 3000))
        );
    }

    #[test]
    fn missing_port_token_is_rejected() {
        assert_eq!(parse_host("onlyname.sandbox.localhost"), None);
    }

    #[test]
    fn non_numeric_port_is_rejected() {
        assert_eq!(parse_host("abc-notaport.sandbox.localhost"), None);
    }

    #[test]
    fn ignores_everything_after_first_dot() {
        assert_eq!(parse_host("abc-8080.extra.labels.example.com"), Some(("abc".into(), 8080)));
    }
}
