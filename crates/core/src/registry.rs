//! Registry of known metric handlers.

use std::collections::HashSet;

use crate::error::RegistryError;

/// Read-only view of the handlers a deployment knows how to run.
pub trait HandlerRegistry: Send + Sync {
    /// All registered slugs, in a fixed order.
    fn slugs(&self) -> &[String];

    fn has_slug(&self, slug: &str) -> bool {
        self.slugs().iter().any(|s| s == slug)
    }
}

/// Whether `slug` is a well-formed handler identifier
/// (`[a-z0-9][a-z0-9_-]*`).
pub fn is_valid_slug(slug: &str) -> bool {
    let mut chars = slug.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

/// Registry fixed at startup from configuration.
///
/// Enumeration order is the order slugs were supplied in.
#[derive(Debug, Clone)]
pub struct StaticRegistry {
    slugs: Vec<String>,
    index: HashSet<String>,
}

impl StaticRegistry {
    pub fn new<I, S>(slugs: I) -> Result<Self, RegistryError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ordered = Vec::new();
        let mut index = HashSet::new();
        for slug in slugs {
            let slug = slug.into();
            if !is_valid_slug(&slug) {
                return Err(RegistryError::InvalidSlug(slug));
            }
            if !index.insert(slug.clone()) {
                return Err(RegistryError::DuplicateSlug(slug));
            }
            ordered.push(slug);
        }
        if ordered.is_empty() {
            return Err(RegistryError::Empty);
        }
        Ok(Self {
            slugs: ordered,
            index,
        })
    }

    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }
}

impl HandlerRegistry for StaticRegistry {
    fn slugs(&self) -> &[String] {
        &self.slugs
    }

    fn has_slug(&self, slug: &str) -> bool {
        self.index.contains(slug)
    }
}
