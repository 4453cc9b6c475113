use super::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator the Graph API uses inside compound post ids (`<page>_<post>`).
pub const NODE_SEPARATOR: char = '_';

/// Identifier of a node in the remote graph (page, group, post, comment, user).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Parse a user-supplied node id.
    ///
    /// Ids end up inside relative request paths, so anything that would
    /// change the path structure is rejected.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ValidationError::EmptyField("node id"));
        }
        if let Some(bad) = input
            .chars()
            .find(|c| c.is_whitespace() || matches!(c, '/' | '?' | '&' | '#'))
        {
            return Err(ValidationError::InvalidNodeId {
                id: input.to_string(),
                reason: format!("contains '{}'", bad),
            });
        }
        Ok(Self(input.to_string()))
    }

    /// Wrap an id that came back from the API. No validation is applied.
    pub(crate) fn from_api(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id names a post (`<page>_<post>`) rather than a bare node.
    pub fn is_compound(&self) -> bool {
        self.0.contains(NODE_SEPARATOR)
    }

    /// The owning page/group of a compound post id; the id itself otherwise.
    pub fn page_component(&self) -> NodeId {
        match self.0.split_once(NODE_SEPARATOR) {
            Some((page, _)) => NodeId(page.to_string()),
            None => self.clone(),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of a crawl job.
///
/// Built from the creation time, the job kind and the root node, so two
/// jobs on the same node started at different moments never collide and
/// the id doubles as a readable output directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(created_at: chrono::DateTime<chrono::Utc>, kind: &str, root: &NodeId) -> Self {
        let stamp = created_at
            .format("%Y-%m-%d %H:%M:%S%.6f")
            .to_string()
            .replace([':', '.', ' '], "_");
        Self(format!("{}_{}_{}", stamp, kind, root))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parse_rejects_path_breaking_ids() {
        assert!(NodeId::parse("1234567890").is_ok());
        assert!(NodeId::parse("  cocacola ").is_ok());
        assert!(NodeId::parse("").is_err());
        assert!(NodeId::parse("12/feed").is_err());
        assert!(NodeId::parse("12?fields=id").is_err());
        assert!(NodeId::parse("12 34").is_err());
    }

    #[test]
    fn compound_ids_split_on_separator() {
        let post = NodeId::parse("1234_5678").unwrap();
        assert!(post.is_compound());
        assert_eq!(post.page_component().as_str(), "1234");

        let page = NodeId::parse("998877").unwrap();
        assert!(!page.is_compound());
        assert_eq!(page.page_component(), page);
    }

    #[test]
    fn job_id_is_filesystem_friendly() {
        let at = chrono::Utc.with_ymd_and_hms(2017, 6, 1, 12, 30, 5).unwrap();
        let id = JobId::new(at, "page_feed", &NodeId::parse("G1").unwrap());
        assert_eq!(id.as_str(), "2017-06-01_12_30_05_000000_page_feed_G1");
        assert!(!id.as_str().contains(':'));
    }
}
