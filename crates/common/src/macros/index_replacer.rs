//! Span-indexed macro replacer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use error_stack::Report;

use crate::error::VastTrackingError;

use super::{MacroProvider, Replacer};

/// Byte range of one macro name inside a template, delimiters excluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TokenSpan {
    pub start: usize,
    pub end: usize,
}

/// Finds every delimiter-wrapped token in `template`, left to right.
///
/// Delimiters pair up greedily; a trailing unpaired delimiter is not a token.
pub(crate) fn token_spans(template: &str, delimiter: &str) -> Vec<TokenSpan> {
    let mut spans = Vec::new();
    if delimiter.is_empty() {
        return spans;
    }

    let mut cursor = 0;
    while let Some(open) = template[cursor..].find(delimiter) {
        let start = cursor + open + delimiter.len();
        let Some(close) = template[start..].find(delimiter) else {
            break;
        };
        let end = start + close;
        spans.push(TokenSpan { start, end });
        cursor = end + delimiter.len();
    }
    spans
}

/// Replacer that indexes each template's token positions once and splices
/// macro values in on every call.
pub struct StringIndexReplacer {
    delimiter: String,
    cache: RwLock<HashMap<String, Vec<TokenSpan>>>,
    misses: AtomicUsize,
}

impl StringIndexReplacer {
    #[must_use]
    pub fn new(delimiter: &str) -> Self {
        Self {
            delimiter: delimiter.to_string(),
            cache: RwLock::new(HashMap::new()),
            misses: AtomicUsize::new(0),
        }
    }

    /// Number of distinct templates indexed so far.
    #[must_use]
    pub fn cached_templates(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of lookups that had to index a template.
    #[must_use]
    pub fn cache_misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    fn write_resolved(
        &self,
        out: &mut String,
        template: &str,
        spans: &[TokenSpan],
        provider: &MacroProvider,
    ) {
        let delim_len = self.delimiter.len();
        let mut cursor = 0;
        for span in spans {
            out.push_str(&template[cursor..span.start - delim_len]);
            out.push_str(&provider.get_macro(&template[span.start..span.end]));
            cursor = span.end + delim_len;
        }
        out.push_str(&template[cursor..]);
    }
}

impl Replacer for StringIndexReplacer {
    fn replace(
        &self,
        template: &str,
        provider: &MacroProvider,
    ) -> Result<String, Report<VastTrackingError>> {
        let mut out = String::with_capacity(template.len());
        self.replace_into(&mut out, template, provider)?;
        Ok(out)
    }

    fn replace_into(
        &self,
        out: &mut String,
        template: &str,
        provider: &MacroProvider,
    ) -> Result<(), Report<VastTrackingError>> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(spans) = cache.get(template) {
                self.write_resolved(out, template, spans, provider);
                return Ok(());
            }
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let spans = cache.entry(template.to_string()).or_insert_with(|| {
            self.misses.fetch_add(1, Ordering::Relaxed);
            log::debug!("Indexing macro template: {}", template);
            token_spans(template, &self.delimiter)
        });
        self.write_resolved(out, template, spans, provider);
        Ok(())
    }
}
