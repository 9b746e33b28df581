//! Rule-based query expansion.
//!
//! A query is rewritten by replacing a question pattern with related words,
//! e.g. "how to reset a password" also searches "steps reset a password".

use crate::types::QueryVariant;

/// One pattern and the words that replace it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionRule {
    pub pattern: String,
    pub replacements: Vec<String>,
}

impl ExpansionRule {
    pub fn new(pattern: &str, replacements: &[&str]) -> Self {
        Self {
            pattern: pattern.to_string(),
            replacements: replacements.iter().map(|r| r.to_string()).collect(),
        }
    }
}

/// Produces the ordered variant list for a query.
///
/// Rules are tried in order. The original query is always first and the
/// list never exceeds `max_variants`.
#[derive(Debug, Clone)]
pub struct QueryExpander {
    rules: Vec<ExpansionRule>,
    max_variants: usize,
}

impl Default for QueryExpander {
    fn default() -> Self {
        Self::new(default_rules(), 3)
    }
}

/// The built-in rule table.
pub fn default_rules() -> Vec<ExpansionRule> {
    vec![
        ExpansionRule::new("what is", &["define", "explain", "describe"]),
        ExpansionRule::new("how to", &["steps", "method", "process", "procedure"]),
        ExpansionRule::new("why", &["reason", "cause", "purpose"]),
        ExpansionRule::new("difference between", &["compare", "contrast", "versus"]),
    ]
}

impl QueryExpander {
    pub fn new(rules: Vec<ExpansionRule>, max_variants: usize) -> Self {
        Self {
            rules,
            max_variants: max_variants.max(1),
        }
    }

    pub fn max_variants(&self) -> usize {
        self.max_variants
    }

    /// Expand `query` into at most `max_variants` variants.
    ///
    /// Matching is a substring test on the lowercased query, and rewrites
    /// are built from the lowercased text. Rewrites identical to an earlier
    /// variant are skipped.
    pub fn expand(&self, query: &str) -> Vec<QueryVariant> {
        let mut variants = vec![QueryVariant::original(query)];
        let lower = query.to_lowercase();

        'rules: for rule in &self.rules {
            if !lower.contains(rule.pattern.as_str()) {
                continue;
            }
            for replacement in &rule.replacements {
                if variants.len() >= self.max_variants {
                    break 'rules;
                }
                let text = lower.replace(rule.pattern.as_str(), replacement);
                if variants.iter().any(|v| v.text == text) {
                    continue;
                }
                variants.push(QueryVariant::rewritten(text, rule.pattern.as_str()));
            }
        }

        tracing::debug!("Expanded query into {} variant(s)", variants.len());
        variants
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(variants: &[QueryVariant]) -> Vec<&str> {
        variants.iter().map(|v| v.text.as_str()).collect()
    }

    #[test]
    fn test_what_is_expansion() {
        let variants = QueryExpander::default().expand("What is the refund policy?");
        assert_eq!(
            texts(&variants),
            vec![
                "What is the refund policy?",
                "define the refund policy?",
                "explain the refund policy?",
            ]
        );
        assert!(variants[0].is_original());
        assert_eq!(variants[1].rule.as_deref(), Some("what is"));
    }

    #[test]
    fn test_no_rule_matches() {
        let variants = QueryExpander::default().expand("refund policy");
        assert_eq!(texts(&variants), vec!["refund policy"]);
    }

    #[test]
    fn test_cap_spans_rules() {
        let expander = QueryExpander::new(default_rules(), 6);
        let variants = expander.expand("why learn how to cook");
        assert_eq!(
            texts(&variants),
            vec![
                "why learn how to cook",
                "why learn steps cook",
                "why learn method cook",
                "why learn process cook",
                "why learn procedure cook",
                "reason learn how to cook",
            ]
        );
    }

    #[test]
    fn test_substring_match_is_not_word_bounded() {
        // "somewhat is" contains "what is"
        let variants = QueryExpander::default().expand("it somewhat is odd");
        assert_eq!(variants[1].text, "it somedefine odd");
    }

    #[test]
    fn test_deterministic() {
        let expander = QueryExpander::default();
        let q = "What is the difference between tcp and udp";
        assert_eq!(expander.expand(q), expander.expand(q));
    }

    #[test]
    fn test_max_variants_floor() {
        let expander = QueryExpander::new(default_rules(), 0);
        assert_eq!(expander.expand("what is rust").len(), 1);
    }
}
