use std::error::Error;

/// Render an error followed by all of its sources, separated by `": "`.
///
/// Log lines carry the whole causal chain this way, e.g.
/// `creating commit failed: running "git commit ..." failed with exit code 1: ...`.
#[must_use]
pub fn display_chain(err: &dyn Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use thiserror::Error;

    #[derive(Debug, Error)]
    #[error("inner failure")]
    struct Inner;

    #[derive(Debug, Error)]
    #[error("outer step failed")]
    struct Outer(#[source] Inner);

    #[test]
    fn display_chain_joins_all_sources() {
        assert_eq!(
            display_chain(&Outer(Inner)),
            "outer step failed: inner failure"
        );
    }

    #[test]
    fn display_chain_without_source_is_plain_message() {
        assert_eq!(display_chain(&Inner), "inner failure");
    }
}
