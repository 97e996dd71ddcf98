//! Query router: picks the RAG path or the tools path for an utterance.
//!
//! Lowercased substring matching against a keyword list (profile, stats and
//! activity vocabulary) and a list of known user names. Anything that matches
//! goes to the tools; everything else, including empty input, goes to RAG.
//! Incidental keyword mentions ("what stats did the Mad Hatter keep?") are
//! routed to tools as well.

use super::types::RoutingDecision;
use crate::config::RouterConfig;

#[derive(Debug, Clone)]
pub struct QueryRouter {
    keywords: Vec<String>,
    entity_names: Vec<String>,
}

impl QueryRouter {
    pub fn new(keywords: Vec<String>, entity_names: Vec<String>) -> Self {
        let normalize = |list: Vec<String>| -> Vec<String> {
            list.into_iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            keywords: normalize(keywords),
            entity_names: normalize(entity_names),
        }
    }

    pub fn from_config(config: &RouterConfig) -> Self {
        Self::new(config.keywords.clone(), config.entity_names.clone())
    }

    /// Total and deterministic.
    pub fn classify(&self, input: &str) -> RoutingDecision {
        let normalized = input.to_lowercase();
        if self.keywords.iter().any(|k| normalized.contains(k.as_str()))
            || self.entity_names.iter().any(|n| normalized.contains(n.as_str()))
        {
            RoutingDecision::Tools
        } else {
            RoutingDecision::Rag
        }
    }
}

impl Default for QueryRouter {
    fn default() -> Self {
        Self::from_config(&RouterConfig::default())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_route_to_tools() {
        let router = QueryRouter::default();
        for input in [
            "Show me the profile",
            "what are the STATS",
            "How many followers?",
            "recent activity please",
            "number of posts",
            "engagement rate",
        ] {
            assert_eq!(router.classify(input), RoutingDecision::Tools, "{input}");
        }
    }

    #[test]
    fn test_entity_names_route_to_tools() {
        let router = QueryRouter::default();
        assert_eq!(router.classify("Tell me about Priya"), RoutingDecision::Tools);
        assert_eq!(router.classify("who is MARCO?"), RoutingDecision::Tools);
        assert_eq!(router.classify("What is Ana's profile?"), RoutingDecision::Tools);
    }

    #[test]
    fn test_everything_else_routes_to_rag() {
        let router = QueryRouter::default();
        for input in [
            "What are the names of the Stark children's direwolves?",
            "And which one belonged to Jon Snow?",
            "Who sits on the Iron Throne?",
        ] {
            assert_eq!(router.classify(input), RoutingDecision::Rag, "{input}");
        }
    }

    #[test]
    fn test_empty_and_whitespace_route_to_rag() {
        let router = QueryRouter::default();
        assert_eq!(router.classify(""), RoutingDecision::Rag);
        assert_eq!(router.classify("   \n\t"), RoutingDecision::Rag);
    }

    #[test]
    fn test_substring_matching_is_coarse() {
        let router = QueryRouter::default();
        // "banana" contains "ana".
        assert_eq!(router.classify("I like banana bread"), RoutingDecision::Tools);
        assert_eq!(router.classify("What stats did the Mad Hatter keep?"), RoutingDecision::Tools);
    }

    #[test]
    fn test_custom_vocabulary() {
        let router = QueryRouter::new(vec!["Sigil".into(), " ".into()], vec!["Arya".into()]);
        assert_eq!(router.classify("house sigil"), RoutingDecision::Tools);
        assert_eq!(router.classify("arya stark"), RoutingDecision::Tools);
        assert_eq!(router.classify("followers"), RoutingDecision::Rag);
        // Blank entries are dropped rather than matching everything.
        assert_eq!(router.classify("plain question"), RoutingDecision::Rag);
    }

    #[test]
    fn test_deterministic() {
        let router = QueryRouter::default();
        let input = "Sarah's engagement";
        assert_eq!(router.classify(input), router.classify(input));
    }
}
