//! Container image references

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Image repository plus optional tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    /// Repository, including any registry host and port
    pub repo: String,
    /// Tag, empty if none
    #[serde(default)]
    pub tag: String,
}

impl ImageRef {
    /// Create a new image reference
    pub fn new(repo: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            tag: tag.into(),
        }
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tag.is_empty() {
            write!(f, "{}", self.repo)
        } else {
            write!(f, "{}:{}", self.repo, self.tag)
        }
    }
}

impl FromStr for ImageRef {
    type Err = std::convert::Infallible;

    /// Split on the last `:` after the last `/`, so registry ports are kept
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name_start = s.rfind('/').map_or(0, |i| i + 1);
        match s[name_start..].rfind(':') {
            Some(i) => Ok(Self::new(&s[..name_start + i], &s[name_start + i + 1..])),
            None => Ok(Self::new(s, "")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ImageRef::new("nvidia/toolkit", "v1.17").to_string(), "nvidia/toolkit:v1.17");
        assert_eq!(ImageRef::new("nvidia/toolkit", "").to_string(), "nvidia/toolkit");
    }

    #[test]
    fn test_parse_with_registry_port() {
        let image: ImageRef = "registry:5000/app:v1.0.0".parse().unwrap();
        assert_eq!(image, ImageRef::new("registry:5000/app", "v1.0.0"));

        let untagged: ImageRef = "registry:5000/app".parse().unwrap();
        assert_eq!(untagged, ImageRef::new("registry:5000/app", ""));
    }
}
