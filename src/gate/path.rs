//! Request path canonicalization
//!
//! The gate must decide on the same path the documentation site will serve.
//! A raw path is percent-decoded once, then `.`, `..` and empty segments are
//! resolved. The decoded form drives routing and gate decisions; the wire
//! form re-encodes each segment and is what gets forwarded upstream, so no
//! later URL handling can turn it into a different path.

/// A request path in decoded and forwardable form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPath {
    decoded: String,
    wire: String,
}

impl CanonicalPath {
    /// Canonicalize a raw request path.
    ///
    /// Returns `None` when the path does not decode to UTF-8 or contains a
    /// control character.
    pub fn parse(raw: &str) -> Option<Self> {
        let decoded = urlencoding::decode(raw).ok()?;
        if decoded.chars().any(char::is_control) {
            return None;
        }

        let mut segments: Vec<&str> = Vec::new();
        for segment in decoded.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                segment => segments.push(segment),
            }
        }

        let trailing = !segments.is_empty() && decoded.ends_with('/');
        let join = |encode: bool| {
            let mut path = String::with_capacity(decoded.len() + 1);
            for segment in &segments {
                path.push('/');
                if encode {
                    path.push_str(&urlencoding::encode(segment));
                } else {
                    path.push_str(segment);
                }
            }
            if segments.is_empty() || trailing {
                path.push('/');
            }
            path
        };

        Some(Self {
            decoded: join(false),
            wire: join(true),
        })
    }

    /// Decoded path used for routing and gate decisions
    pub fn as_str(&self) -> &str {
        &self.decoded
    }

    /// Percent-encoded path to forward upstream
    pub fn wire(&self) -> &str {
        &self.wire
    }
}
