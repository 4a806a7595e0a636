//! Address Synthesizer
//!
//! Builds A answers for the direct rules from the network prefix and the
//! configured node lists.

use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::config::ResolverConfig;
use crate::dns::rules::Rule;
use crate::types::{AddressAnswer, Query};

/// Compute the answers for a matched rule.
///
/// `NodeAddress` yields one answer, `ClusterAlias` one per well-formed
/// worker entry in random order, `Passthrough` none.
pub fn synthesize(rule: &Rule, query: &Query, config: &ResolverConfig) -> Vec<AddressAnswer> {
    let answers = match rule {
        Rule::NodeAddress { index, .. } => {
            vec![AddressAnswer::new(config.node_address(index))]
        }
        Rule::ClusterAlias => worker_answers(config),
        Rule::Passthrough => return Vec::new(),
    };

    info!(
        "client {} asked {} got [{}]",
        query.client_addr.ip(),
        query,
        answers.iter().map(|a| a.address.as_str()).collect::<Vec<_>>().join(", ")
    );

    answers
}

/// One answer per well-formed worker entry, shuffled
fn worker_answers(config: &ResolverConfig) -> Vec<AddressAnswer> {
    let dropped = config.workers.len() - config.workers.indices().count();
    if dropped > 0 {
        debug!("Skipped {} malformed worker entries", dropped);
    }

    let mut answers: Vec<AddressAnswer> = config
        .workers
        .indices()
        .map(|index| AddressAnswer::new(config.node_address(index)))
        .collect();

    // Shuffle for load distribution
    let mut rng = rand::thread_rng();
    answers.shuffle(&mut rng);

    answers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RecordType, CLASS_IN, SYNTHETIC_TTL};
    use std::collections::HashSet;

    fn config(workers: &str) -> ResolverConfig {
        ResolverConfig::default()
            .with_network_prefix(Some("10.11.12".to_string()))
            .with_workers(Some(workers.to_string()))
    }

    fn query(name: &str) -> Query {
        Query {
            name: name.to_string(),
            record_type: RecordType::A,
            record_class: CLASS_IN,
            client_addr: "192.168.1.50:53000".parse().unwrap(),
        }
    }

    fn addresses(answers: &[AddressAnswer]) -> HashSet<String> {
        answers.iter().map(|a| a.address.clone()).collect()
    }

    #[test]
    fn test_node_address() {
        let rule = Rule::NodeAddress {
            role: "worker".to_string(),
            index: "7".to_string(),
        };
        let answers = synthesize(&rule, &query("worker-7"), &config(""));
        assert_eq!(answers, vec![AddressAnswer::new("10.11.12.7".to_string())]);
        assert_eq!(answers[0].ttl, SYNTHETIC_TTL);
    }

    #[test]
    fn test_controller_address() {
        let rule = Rule::NodeAddress {
            role: "controller".to_string(),
            index: "1".to_string(),
        };
        let answers = synthesize(&rule, &query("controller-1"), &config(""));
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].address, "10.11.12.1");
    }

    #[test]
    fn test_out_of_range_index_is_not_clamped() {
        let rule = Rule::NodeAddress {
            role: "worker".to_string(),
            index: "300".to_string(),
        };
        let answers = synthesize(&rule, &query("worker-300"), &config(""));
        assert_eq!(answers[0].address, "10.11.12.300");
    }

    #[test]
    fn test_cluster_alias_returns_every_worker() {
        let config = config("worker-1 worker-2");
        let answers = synthesize(&Rule::ClusterAlias, &query("somealias.k8s"), &config);

        assert_eq!(answers.len(), 2);
        assert!(answers.iter().all(|a| a.ttl == SYNTHETIC_TTL));
        assert_eq!(
            addresses(&answers),
            HashSet::from(["10.11.12.1".to_string(), "10.11.12.2".to_string()])
        );
    }

    #[test]
    fn test_cluster_alias_is_set_stable() {
        let config = config("worker-1 worker-2 worker-3 worker-4 worker-5");
        let first = synthesize(&Rule::ClusterAlias, &query("a.k8s"), &config);
        let second = synthesize(&Rule::ClusterAlias, &query("a.k8s"), &config);
        assert_eq!(addresses(&first), addresses(&second));
    }

    #[test]
    fn test_cluster_alias_order_varies() {
        let config = config("worker-1 worker-2 worker-3 worker-4 worker-5 worker-6");
        let orders: HashSet<Vec<String>> = (0..50)
            .map(|_| {
                synthesize(&Rule::ClusterAlias, &query("a.k8s"), &config)
                    .into_iter()
                    .map(|a| a.address)
                    .collect()
            })
            .collect();

        // 720 permutations; 50 identical draws is practically impossible
        assert!(orders.len() > 1, "alias answers were never reordered");
    }

    #[test]
    fn test_cluster_alias_drops_malformed_and_keeps_duplicates() {
        let config = config("worker-1 garbage worker-1 worker-");
        let answers = synthesize(&Rule::ClusterAlias, &query("a.k8s"), &config);
        assert_eq!(answers.len(), 2);
        assert!(answers.iter().all(|a| a.address == "10.11.12.1"));
    }

    #[test]
    fn test_cluster_alias_empty_list() {
        let answers = synthesize(&Rule::ClusterAlias, &query("a.k8s"), &config(""));
        assert!(answers.is_empty());
    }

    #[test]
    fn test_passthrough_has_no_answers() {
        let answers = synthesize(&Rule::Passthrough, &query("example.com"), &config("worker-1"));
        assert!(answers.is_empty());
    }
}
