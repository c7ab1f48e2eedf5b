//! Bearer tokens that never print themselves.

/// An opaque bearer credential.
///
/// `Debug` and `Display` are redacted so tokens cannot leak through logs or
/// error messages; call [`SecretToken::expose`] at the single point where the
/// raw value is written into a request.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretToken(String);

impl SecretToken {
    /// Wraps a raw token, trimming surrounding whitespace.
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        Self(raw.trim().to_string())
    }

    /// Returns the raw token.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the token is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Formats the token as an `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl std::fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretToken(<redacted>)")
    }
}

impl std::fmt::Display for SecretToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("<redacted>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_redacted_in_output() {
        let token = SecretToken::new(" ghs_abc123\n");
        assert_eq!(token.expose(), "ghs_abc123");
        assert_eq!(token.bearer(), "Bearer ghs_abc123");
        assert!(!format!("{token:?} {token}").contains("ghs_abc123"));
    }
}
