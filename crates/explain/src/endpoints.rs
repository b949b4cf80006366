//! Ordered candidate hosts for the prediction service.

use readmit_core::ExplainConfig;

/// Base URLs tried in order, without trailing slashes and without duplicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointCandidates {
    urls: Vec<String>,
}

fn tidy(url: &str) -> Option<String> {
    let url = url.trim().trim_end_matches('/');
    (!url.is_empty()).then(|| url.to_string())
}

impl EndpointCandidates {
    /// Primary first, then each fallback that is not already in the list.
    pub fn new<S: AsRef<str>>(primary: &str, fallbacks: &[S]) -> Self {
        let mut urls: Vec<String> = Vec::with_capacity(fallbacks.len() + 1);
        for url in std::iter::once(primary)
            .chain(fallbacks.iter().map(AsRef::as_ref))
            .filter_map(tidy)
        {
            if !urls.contains(&url) {
                urls.push(url);
            }
        }
        Self { urls }
    }

    pub fn from_config(config: &ExplainConfig) -> Self {
        Self::new(config.primary_endpoint(), config.fallback_endpoints())
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn primary(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }

    /// Moves `url` to the front, keeping the relative order of the rest.
    ///
    /// Returns `false` if `url` is not a candidate.
    pub fn prefer(&mut self, url: &str) -> bool {
        let Some(url) = tidy(url) else {
            return false;
        };
        match self.urls.iter().position(|u| *u == url) {
            Some(pos) => {
                let preferred = self.urls.remove(pos);
                self.urls.insert(0, preferred);
                true
            }
            None => false,
        }
    }
}
