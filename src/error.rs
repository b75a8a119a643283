use std::borrow::Cow;

/// Errors that can occur when registering a route.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistrationError {
    /// The handler chain was empty.
    #[error("cannot register {0} with an empty handler chain")]
    EmptyHandlerChain(Cow<'static, str>),
    /// The pattern failed to compile.
    #[error("invalid route pattern {pattern}: {source}")]
    InvalidPattern {
        /// The offending pattern text.
        pattern: Cow<'static, str>,
        /// The underlying compilation failure.
        source: regex::Error,
    },
}
