//! Compiled-template macro replacer backed by handlebars.
//!
//! Each literal beacon template is translated once into handlebars syntax
//! (`##PBS_BIDID##` becomes `{{[PBS_BIDID]}}`), registered under its own text,
//! and rendered with a parameter map built from the provider on every call.
//! Literal text that handlebars would parse (braces, backslashes) is passed
//! through the parameter map instead of the template source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use error_stack::Report;
use handlebars::Handlebars;

use crate::error::VastTrackingError;

use super::index_replacer::token_spans;
use super::{MacroProvider, Replacer};

/// Outcome of compiling one literal template.
#[derive(Debug, Clone)]
enum CompiledTemplate {
    /// Registered in the registry; renders the listed keys in first-use order.
    /// `literals[i]` is bound to the lookup `{{[{i}]}}`.
    Ready {
        keys: Vec<String>,
        literals: Vec<String>,
    },
    /// Compilation failed; every call for this literal reports it again.
    Failed,
}

struct TemplateCache {
    registry: Handlebars<'static>,
    entries: HashMap<String, CompiledTemplate>,
}

/// Replacer that compiles every template with handlebars once.
pub struct TemplateReplacer {
    delimiter: String,
    cache: RwLock<TemplateCache>,
    misses: AtomicUsize,
}

impl TemplateReplacer {
    #[must_use]
    pub fn new(delimiter: &str) -> Self {
        let mut registry = Handlebars::new();
        // Values are already URL-escaped by the provider.
        registry.register_escape_fn(handlebars::no_escape);

        Self {
            delimiter: delimiter.to_string(),
            cache: RwLock::new(TemplateCache {
                registry,
                entries: HashMap::new(),
            }),
            misses: AtomicUsize::new(0),
        }
    }

    /// Number of distinct templates compiled so far, failures included.
    #[must_use]
    pub fn cached_templates(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    /// Number of lookups that had to compile a template.
    #[must_use]
    pub fn cache_misses(&self) -> usize {
        self.misses.load(Ordering::Relaxed)
    }

    fn compile(&self, registry: &mut Handlebars<'static>, template: &str) -> CompiledTemplate {
        self.misses.fetch_add(1, Ordering::Relaxed);

        let Some(Translated {
            source,
            keys,
            literals,
        }) = translate(template, &self.delimiter) else {
            log::warn!("Malformed macro tokens in template: {}", template);
            return CompiledTemplate::Failed;
        };

        match registry.register_template_string(template, source) {
            Ok(()) => {
                log::debug!("Compiled macro template: {}", template);
                CompiledTemplate::Ready { keys, literals }
            }
            Err(e) => {
                log::warn!("Failed to compile macro template {}: {}", template, e);
                CompiledTemplate::Failed
            }
        }
    }
}

impl Replacer for TemplateReplacer {
    fn replace(
        &self,
        template: &str,
        provider: &MacroProvider,
    ) -> Result<String, Report<VastTrackingError>> {
        {
            let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(entry) = cache.entries.get(template) {
                return render(&cache.registry, template, entry, provider);
            }
        }

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if !cache.entries.contains_key(template) {
            let entry = self.compile(&mut cache.registry, template);
            cache.entries.insert(template.to_string(), entry);
        }
        match cache.entries.get(template) {
            Some(entry) => render(&cache.registry, template, entry, provider),
            None => Err(Report::new(VastTrackingError::TemplateCompile {
                template: template.to_string(),
            })),
        }
    }
}

fn render(
    registry: &Handlebars<'static>,
    template: &str,
    entry: &CompiledTemplate,
    provider: &MacroProvider,
) -> Result<String, Report<VastTrackingError>> {
    let CompiledTemplate::Ready { keys, literals } = entry else {
        return Err(Report::new(VastTrackingError::TemplateCompile {
            template: template.to_string(),
        }));
    };

    let mut params = provider.get_all_macros(keys);
    params.extend(
        literals
            .iter()
            .enumerate()
            .map(|(i, literal)| (literal_key(i), literal.clone())),
    );
    registry.render(template, &params).map_err(|e| {
        log::warn!("Failed to render macro template {}: {}", template, e);
        Report::new(VastTrackingError::TemplateRender {
            template: template.to_string(),
        })
    })
}

/// Handlebars source for one template plus what it binds.
#[derive(Debug, PartialEq)]
struct Translated {
    source: String,
    keys: Vec<String>,
    literals: Vec<String>,
}

/// Rewrites delimiter tokens into handlebars lookups.
///
/// Returns `None` when a delimiter is left unclosed or a token is not a
/// usable macro name. Macro names never contain braces, so the `{i}` keys
/// used for literal text cannot collide with them.
fn translate(template: &str, delimiter: &str) -> Option<Translated> {
    let delim_len = delimiter.len();
    let mut out = Translated {
        source: String::with_capacity(template.len() + 16),
        keys: Vec::new(),
        literals: Vec::new(),
    };
    let mut cursor = 0;

    for span in token_spans(template, delimiter) {
        out.push_literal(&template[cursor..span.start - delim_len]);

        let key = &template[span.start..span.end];
        if key.is_empty() || key.contains(&['[', ']', '{', '}'][..]) {
            return None;
        }
        out.push_lookup(key);
        if !out.keys.iter().any(|k| k == key) {
            out.keys.push(key.to_string());
        }

        cursor = span.end + delim_len;
    }

    let rest = &template[cursor..];
    if !delimiter.is_empty() && rest.contains(delimiter) {
        return None;
    }
    out.push_literal(rest);

    Some(out)
}

impl Translated {
    fn push_lookup(&mut self, key: &str) {
        self.source.push_str("{{[");
        self.source.push_str(key);
        self.source.push_str("]}}");
    }

    /// Copies literal text, binding it as data when handlebars would parse it.
    fn push_literal(&mut self, literal: &str) {
        if literal.contains(&['{', '}', '\\'][..]) {
            let key = literal_key(self.literals.len());
            self.literals.push(literal.to_string());
            self.push_lookup(&key);
        } else {
            self.source.push_str(literal);
        }
    }
}

fn literal_key(index: usize) -> String {
    format!("{{{index}}}")
}
