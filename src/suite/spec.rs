//! Spec declarations and selection

use crate::error::Result;
use crate::suite::context::SpecContext;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type SpecFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;
pub type SpecBody = Arc<dyn Fn(SpecContext) -> SpecFuture + Send + Sync>;

/// A single behavioral spec
#[derive(Clone)]
pub struct Spec {
    /// Enclosing container texts, outermost first
    pub container: Vec<String>,
    pub text: String,
    pub body: SpecBody,
}

impl std::fmt::Debug for Spec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Spec")
            .field("container", &self.container)
            .field("text", &self.text)
            .finish_non_exhaustive()
    }
}

impl Spec {
    pub fn new<F, Fut>(container: &[&str], text: impl Into<String>, body: F) -> Self
    where
        F: Fn(SpecContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Self {
            container: container.iter().map(|c| c.to_string()).collect(),
            text: text.into(),
            body: Arc::new(move |ctx: SpecContext| -> SpecFuture { Box::pin(body(ctx)) }),
        }
    }

    /// Container path and spec text joined the way focus filters see them
    pub fn full_text(&self) -> String {
        let mut parts: Vec<&str> = self.container.iter().map(String::as_str).collect();
        parts.push(&self.text);
        parts.join(" ")
    }

    /// Bracketed tags in the full text, e.g. `sig-network`, `Conformance`, `test_id:1547`
    pub fn tags(&self) -> Vec<String> {
        extract_tags(&self.full_text())
    }

    /// Numeric test id from a `[test_id:N]` tag
    pub fn test_id(&self) -> Option<String> {
        self.tags()
            .into_iter()
            .find_map(|t| t.strip_prefix("test_id:").map(str::to_string))
    }
}

/// Extract `[tag]` occurrences from spec text
pub fn extract_tags(text: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        match after.find(']') {
            Some(close) => {
                let tag = after[..close].trim();
                if !tag.is_empty() {
                    tags.push(tag.to_string());
                }
                rest = &after[close + 1..];
            }
            None => break,
        }
    }
    tags
}

/// Focus, skip and label selection over full spec texts
#[derive(Debug, Clone, Default)]
pub struct SpecFilter {
    /// Keep specs whose full text contains any of these
    pub focus: Vec<String>,
    /// Drop specs whose full text contains any of these
    pub skip: Vec<String>,
    /// Keep specs carrying every one of these tags
    pub labels: Vec<String>,
}

impl SpecFilter {
    pub fn matches(&self, spec: &Spec) -> bool {
        let text = spec.full_text();

        if !self.focus.is_empty() && !self.focus.iter().any(|f| text.contains(f.as_str())) {
            return false;
        }
        if self.skip.iter().any(|s| text.contains(s.as_str())) {
            return false;
        }
        if !self.labels.is_empty() {
            let tags = spec.tags();
            if !self.labels.iter().all(|l| tags.iter().any(|t| t == l)) {
                return false;
            }
        }
        true
    }
}

/// An ordered collection of specs
#[derive(Debug, Clone)]
pub struct Suite {
    pub name: String,
    specs: Vec<Spec>,
}

impl Suite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            specs: Vec::new(),
        }
    }

    pub fn add(&mut self, spec: Spec) {
        self.specs.push(spec);
    }

    pub fn extend(&mut self, specs: impl IntoIterator<Item = Spec>) {
        self.specs.extend(specs);
    }

    pub fn specs(&self) -> &[Spec] {
        &self.specs
    }

    /// Specs passing `filter`, with their declaration index
    pub fn select(&self, filter: &SpecFilter) -> Vec<(usize, &Spec)> {
        self.specs
            .iter()
            .enumerate()
            .filter(|(_, spec)| filter.matches(spec))
            .collect()
    }

    /// Full texts of every spec, in declaration order
    pub fn full_texts(&self) -> Vec<String> {
        self.specs.iter().map(Spec::full_text).collect()
    }
}
