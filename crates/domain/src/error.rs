/// Shared library-level error type. Application/wiring-level errors at the
/// binary boundary (config loading, startup provisioning) use `anyhow`
/// instead — see the gateway crate's `main`.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    /// Malformed inbound websocket payload.
    #[error("validation: {0}")]
    Validation(String),

    /// A `query` arrived while another was already in flight.
    #[error("busy: a query is already running for this session")]
    Busy,

    /// A `query` arrived before `init_agent`.
    #[error("not_initialized: session has not been initialized")]
    NotInitialized,

    /// An LLM call failed in a way expected to be transient; the caller
    /// should retry locally up to `max_retries` before giving up.
    #[error("llm_transient: {0}")]
    LlmTransient(String),

    /// An LLM call exhausted its retry budget.
    #[error("llm_fatal: {0}")]
    LlmFatal(String),

    /// A tool reported an operational failure. These are not supposed to
    /// propagate as `Error` — the tool layer should capture them and hand
    /// the message back as a normal (self-reporting) tool result. This
    /// variant exists for the rare caller that has no tool-result channel
    /// to report through (e.g. a batch/administrative invocation).
    #[error("tool_error: {0}")]
    ToolError(String),

    /// The session's sandbox could not be reached or provisioned; fatal for
    /// the current turn, not for the session.
    #[error("sandbox_unavailable: {0}")]
    SandboxUnavailable(String),

    /// The reverse proxy could not reach a sandbox-internal upstream.
    #[error("proxy_upstream: {0}")]
    ProxyUpstream(String),

    /// A programmer/infrastructure invariant was violated (e.g. more than
    /// one tool call in a single assistant turn). Fatal: the session that
    /// raised it is terminated after the error is surfaced.
    #[error("invariant_violation: {0}")]
    InvariantViolation(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// The `kind` tag carried in the websocket-visible `error` event payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Io(_) => "io",
            Error::Json(_) => "json",
            Error::Http(_) => "http",
            Error::Timeout(_) => "timeout",
            Error::Config(_) => "config",
            Error::Auth(_) => "auth",
            Error::Validation(_) => "validation",
            Error::Busy => "busy",
            Error::NotInitialized => "not_initialized",
            Error::LlmTransient(_) => "llm_transient",
            Error::LlmFatal(_) => "llm_fatal",
            Error::ToolError(_) => "tool_error",
            Error::SandboxUnavailable(_) => "sandbox_unavailable",
            Error::ProxyUpstream(_) => "proxy_upstream",
            Error::InvariantViolation(_) => "invariant_violation",
            Error::Other(_) => "other",
        }
    }

    /// Whether this kind of failure should terminate the session it
    /// occurred in, versus just failing the current turn/request.
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Error::InvariantViolation(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tags_match_spec_error_kinds() {
        assert_eq!(Error::Busy.kind(), "busy");
        assert_eq!(Error::NotInitialized.kind(), "not_initialized");
        assert_eq!(Error::LlmTransient("x".into()).kind(), "llm_transient");
        assert_eq!(Error::LlmFatal("x".into()).kind(), "llm_fatal");
        assert_eq!(Error::SandboxUnavailable("x".into()).kind(), "sandbox_unavailable");
        assert_eq!(Error::ProxyUpstream("x".into()).kind(), "proxy_upstream");
        assert_eq!(Error::InvariantViolation("x".into()).kind(), "invariant_violation");
    }

    #[test]
    fn only_invariant_violation_is_session_fatal() {
        assert!(Error::InvariantViolation("x".into()).is_session_fatal());
        assert!(!Error::Busy.is_session_fatal());
        assert!(!Error::ToolError("x".into()).is_session_fatal());
    }
}
