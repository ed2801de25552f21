//! Endpoint mapping for the host's REST API.
//!
//! Endpoints are kept as raw path segments; [`Endpoint::url`] percent-encodes
//! each one, so an id containing `/`, `?` or `#` stays inside its segment.

use std::fmt;

use reqwest::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    segments: Vec<String>,
}

impl Endpoint {
    fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns the items endpoint for a collection.
    ///
    /// System collections (`directus_roles`, `directus_settings`, ...) are served at
    /// their own root (`/roles`, `/settings`); user collections live under `/items`.
    pub fn items(collection: &str) -> Self {
        match collection.strip_prefix("directus_") {
            Some(system) if !system.is_empty() => Self::new([system]),
            _ => Self::new(["items", collection]),
        }
    }

    pub fn item(collection: &str, id: &str) -> Self {
        Self::items(collection).join(id)
    }

    pub fn collections() -> Self {
        Self::new(["collections"])
    }

    pub fn collection(collection: &str) -> Self {
        Self::collections().join(collection)
    }

    /// Fields of one collection.
    pub fn fields(collection: &str) -> Self {
        Self::new(["fields", collection])
    }

    pub fn field(collection: &str, field: &str) -> Self {
        Self::fields(collection).join(field)
    }

    pub fn relations() -> Self {
        Self::new(["relations"])
    }

    /// Relations declared on one collection.
    pub fn relations_of(collection: &str) -> Self {
        Self::relations().join(collection)
    }

    pub fn relation(collection: &str, field: &str) -> Self {
        Self::relations_of(collection).join(field)
    }

    fn join(mut self, segment: &str) -> Self {
        self.segments.push(segment.to_string());
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Appends the segments to `base`, keeping any path `base` already has.
    pub fn url(&self, base: &Url) -> Url {
        let mut url = base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(&self.segments);
        }
        url
    }
}

/// Unencoded form, for logs.
impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            write!(f, "/{segment}")?;
        }
        Ok(())
    }
}
