//! Structural cache keys.

use std::fmt;

/// An ordered pair of (context strings, content strings).
///
/// Equality and hashing are structural and order-sensitive: two keys are the
/// same only if both sequences hold identical strings in identical order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    context: Box<[String]>,
    content: Box<[String]>,
}

impl CacheKey {
    pub fn new<C, M>(context: C, content: M) -> Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            context: context.into_iter().map(Into::into).collect(),
            content: content.into_iter().map(Into::into).collect(),
        }
    }

    /// Key for a single context text and a single content text.
    pub fn from_texts(context: &str, content: &str) -> Self {
        Self::new([context], [content])
    }

    pub fn context(&self) -> &[String] {
        &self.context
    }

    pub fn content(&self) -> &[String] {
        &self.content
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let chars = |parts: &[String]| parts.iter().map(|p| p.len()).sum::<usize>();
        write!(
            f,
            "context[{}; {}B] content[{}; {}B]",
            self.context.len(),
            chars(&self.context),
            self.content.len(),
            chars(&self.content)
        )
    }
}
