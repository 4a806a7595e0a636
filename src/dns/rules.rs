//! Name Rule Matcher
//!
//! Classifies a query into exactly one resolution path. Rules are checked
//! in a fixed order and the first match wins:
//!
//! 1. `NodeAddress`: a label is exactly `worker-<digits>` or `controller-<digits>`
//! 2. `ClusterAlias`: the name ends with the alias suffix
//! 3. `Passthrough`: everything else, including every query that is not IN A

use crate::types::{Query, RecordType, CLASS_IN};

/// Node roles that map directly to a synthetic address
pub const NODE_ROLES: [&str; 2] = ["worker", "controller"];

/// Resolution path selected for a query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// `<role>-<index>`, with the captured index digits
    NodeAddress { role: String, index: String },

    /// Name ending in the alias suffix, answered with every worker
    ClusterAlias,

    /// Forward to the upstream resolver unchanged
    Passthrough,
}

impl Rule {
    pub fn is_passthrough(&self) -> bool {
        matches!(self, Rule::Passthrough)
    }
}

/// Classify a query. Never fails; anything unrecognised is `Passthrough`.
pub fn classify(query: &Query, alias_suffix: &str) -> Rule {
    if query.record_type != RecordType::A || query.record_class != CLASS_IN {
        return Rule::Passthrough;
    }

    let name = query.name.strip_suffix('.').unwrap_or(&query.name);

    if let Some((role, index)) = name.split('.').find_map(match_node_label) {
        return Rule::NodeAddress {
            role: role.to_string(),
            index: index.to_string(),
        };
    }

    if !alias_suffix.is_empty() && name.ends_with(alias_suffix) {
        return Rule::ClusterAlias;
    }

    Rule::Passthrough
}

/// Match a single label against `(worker|controller)-[0-9]+`
fn match_node_label(label: &str) -> Option<(&str, &str)> {
    let (role, index) = label.split_once('-')?;
    if !NODE_ROLES.contains(&role) {
        return None;
    }
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((role, index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(name: &str, record_type: RecordType) -> Query {
        Query {
            name: name.to_string(),
            record_type,
            record_class: CLASS_IN,
            client_addr: "127.0.0.1:40000".parse().unwrap(),
        }
    }

    fn classify_a(name: &str) -> Rule {
        classify(&query(name, RecordType::A), "k8s")
    }

    fn node(role: &str, index: &str) -> Rule {
        Rule::NodeAddress {
            role: role.to_string(),
            index: index.to_string(),
        }
    }

    #[test]
    fn test_node_names() {
        assert_eq!(classify_a("worker-7"), node("worker", "7"));
        assert_eq!(classify_a("controller-1"), node("controller", "1"));
        assert_eq!(classify_a("worker-300"), node("worker", "300"));
        assert_eq!(classify_a("worker-7."), node("worker", "7"));
    }

    #[test]
    fn test_node_label_inside_longer_name() {
        assert_eq!(classify_a("worker-3.cluster.local"), node("worker", "3"));
        assert_eq!(classify_a("ns.controller-2.internal"), node("controller", "2"));
    }

    #[test]
    fn test_node_takes_precedence_over_alias() {
        assert_eq!(classify_a("worker-4.k8s"), node("worker", "4"));
    }

    #[test]
    fn test_cluster_alias() {
        assert_eq!(classify_a("somealias.k8s"), Rule::ClusterAlias);
        assert_eq!(classify_a("k8s"), Rule::ClusterAlias);
        assert_eq!(classify_a("mycluster-k8s"), Rule::ClusterAlias);
        assert_eq!(classify_a("cluster.k8s."), Rule::ClusterAlias);
    }

    #[test]
    fn test_passthrough() {
        assert_eq!(classify_a("example.com"), Rule::Passthrough);
        assert_eq!(classify_a("worker-"), Rule::Passthrough);
        assert_eq!(classify_a("worker-x1"), Rule::Passthrough);
        assert_eq!(classify_a("Worker-1"), Rule::Passthrough);
        assert_eq!(classify_a("k8s.example.com"), Rule::Passthrough);
        assert_eq!(classify_a("node-1"), Rule::Passthrough);
        assert_eq!(classify_a(""), Rule::Passthrough);
    }

    #[test]
    fn test_non_a_queries_pass_through() {
        let suffix = "k8s";
        assert!(classify(&query("worker-7", RecordType::Aaaa), suffix).is_passthrough());
        assert!(classify(&query("alias.k8s", RecordType::Mx), suffix).is_passthrough());
        assert!(classify(&query("worker-7", RecordType::Other(99)), suffix).is_passthrough());
    }

    #[test]
    fn test_non_in_class_passes_through() {
        let mut q = query("worker-7", RecordType::A);
        q.record_class = 3; // CHAOS
        assert!(classify(&q, "k8s").is_passthrough());

        q.name = "alias.k8s".to_string();
        q.record_class = 255; // ANY
        assert!(classify(&q, "k8s").is_passthrough());
    }

    #[test]
    fn test_custom_alias_suffix() {
        let q = query("all.cluster", RecordType::A);
        assert_eq!(classify(&q, "cluster"), Rule::ClusterAlias);
        assert_eq!(classify(&q, "k8s"), Rule::Passthrough);
    }
}
