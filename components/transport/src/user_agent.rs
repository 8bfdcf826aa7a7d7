//! Library `User-Agent` string
//!
//! Computed once per process; every request reads the same static value.

use std::sync::OnceLock;

static USER_AGENT: OnceLock<String> = OnceLock::new();

/// `<libname>/<version> (<os> <arch>; Runtime tokio)`.
pub fn user_agent() -> &'static str {
    USER_AGENT.get_or_init(|| {
        format!(
            "transport/{} ({} {}; Runtime tokio)",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_agent_is_stable_across_calls() {
        assert_eq!(user_agent(), user_agent());
        assert!(user_agent().starts_with("transport/"));
    }
}
