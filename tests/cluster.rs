//! In-process clusters wired together with `MemoryLink`s.

use std::sync::Arc;
use std::time::Duration;

use paxoskv::acceptor::{Reliable, Unreliable};
use paxoskv::link::MemoryLink;
use paxoskv::proposal::ProposalNumber;
use paxoskv::{Config, Node};

struct Cluster {
    nodes: Vec<Arc<Node>>,

    /// `links[from][to]`, `None` on the diagonal
    links: Vec<Vec<Option<Arc<MemoryLink>>>>,
}

impl Cluster {
    fn new(count: usize) -> Self {
        Self::with_failure_rate(count, 0.0, 5)
    }

    fn with_failure_rate(count: usize, failure_rate: f64, attempts: usize) -> Self {
        let nodes = (0..count)
            .map(|id| {
                let config = Config::new(id, 0, vec![])
                    .with_attempts(attempts)
                    .with_backoff(Duration::from_millis(1))
                    .with_timeout(Duration::from_millis(100));
                let node = if failure_rate > 0.0 {
                    Node::with_faults(&config, Box::new(Unreliable::seeded(failure_rate, id as u64)))
                } else {
                    Node::with_faults(&config, Box::new(Reliable))
                };
                Arc::new(node)
            })
            .collect::<Vec<_>>();

        let links = nodes.iter()
            .map(|from| {
                nodes.iter()
                    .map(|to| {
                        if from.id() == to.id() {
                            return None
                        }
                        let link = MemoryLink::new(to);
                        from.connect(link.clone());
                        Some(link)
                    })
                    .collect()
            })
            .collect();

        Cluster { nodes, links }
    }

    /// Cuts or restores every link to and from `id`.
    fn set_reachable(&self, id: usize, reachable: bool) {
        for other in 0..self.nodes.len() {
            for link in self.links[id][other].iter().chain(self.links[other][id].iter()) {
                link.set_reachable(reachable);
            }
        }
    }

    fn values(&self, key: &str) -> Vec<Option<String>> {
        self.nodes.iter().map(|node| node.get(key)).collect()
    }

    fn assert_converged(&self) {
        let first = self.nodes[0].store().snapshot();
        for node in &self.nodes[1..] {
            assert_eq!(node.store().snapshot(), first, "node {} diverged", node.id());
        }
    }
}

fn some(value: &str) -> Option<String> {
    Some(value.to_string())
}

#[tokio::test]
async fn replicates_to_every_node() {
    let cluster = Cluster::new(3);
    assert!(cluster.nodes.iter().all(|node| node.cluster_size() == 3));

    assert!(cluster.nodes[0].put("x", "1").await.unwrap());
    assert_eq!(cluster.values("x"), vec![some("1"); 3]);

    // Writes may enter through any node
    assert!(cluster.nodes[2].put("y", "2").await.unwrap());
    assert!(cluster.nodes[1].delete("x").await.unwrap());
    assert_eq!(cluster.values("x"), vec![None; 3]);
    assert_eq!(cluster.values("y"), vec![some("2"); 3]);
    cluster.assert_converged();
}

#[tokio::test]
async fn survives_one_unreachable_node() {
    let cluster = Cluster::new(3);
    assert!(cluster.nodes[0].put("x", "1").await.unwrap());

    cluster.set_reachable(2, false);
    assert!(cluster.nodes[0].put("x", "2").await.unwrap());
    assert_eq!(cluster.values("x"), vec![some("2"), some("2"), some("1")]);

    // Late delivery of the decided Learn, twice over
    cluster.set_reachable(2, true);
    cluster.nodes[2].learn("PUT:x:2").unwrap();
    cluster.nodes[2].learn("PUT:x:2").unwrap();
    assert_eq!(cluster.values("x"), vec![some("2"); 3]);

    // And later rounds reach it again
    assert!(cluster.nodes[1].put("z", "3").await.unwrap());
    assert_eq!(cluster.values("z"), vec![some("3"); 3]);
    cluster.assert_converged();
}

#[tokio::test]
async fn rejoined_node_writes_again() {
    let cluster = Cluster::new(3);
    cluster.set_reachable(2, false);
    for i in 0..10 {
        assert!(cluster.nodes[0].put("x", &i.to_string()).await.unwrap());
    }
    cluster.set_reachable(2, true);

    // Node 2's own promise is ten rounds behind its peers
    assert!(cluster.nodes[2].acceptor().promised() < cluster.nodes[1].acceptor().promised());
    for i in 0..3 {
        let key = format!("back{}", i);
        assert!(cluster.nodes[2].put(&key, "1").await.unwrap(), "{} was not decided", key);
        assert_eq!(cluster.values(&key), vec![some("1"); 3]);
    }
    assert_eq!(cluster.nodes[1].acceptor().promised().node(), 2);
}

#[tokio::test]
async fn minority_cannot_write() {
    let cluster = Cluster::new(3);
    cluster.set_reachable(1, false);
    cluster.set_reachable(2, false);

    assert!(!cluster.nodes[0].put("x", "1").await.unwrap());
    assert!(!cluster.nodes[0].delete("x").await.unwrap());
    assert_eq!(cluster.values("x"), vec![None; 3]);
    assert!(cluster.nodes.iter().all(|node| node.store().is_empty()));

    // The isolated peers never even heard the proposal
    for node in &cluster.nodes[1..] {
        assert_eq!(node.acceptor().promised(), ProposalNumber::default());
    }
}

#[tokio::test]
async fn isolated_node_cannot_write_but_majority_can() {
    let cluster = Cluster::new(5);
    cluster.set_reachable(3, false);
    cluster.set_reachable(4, false);

    assert!(cluster.nodes[0].put("k", "v").await.unwrap());
    assert!(!cluster.nodes[4].put("k", "w").await.unwrap());
    assert_eq!(cluster.values("k"), vec![some("v"), some("v"), some("v"), None, None]);
}

#[tokio::test]
async fn stale_prepare_rejected_after_round() {
    let cluster = Cluster::new(3);
    assert!(cluster.nodes[0].put("x", "1").await.unwrap());

    let promised = cluster.nodes[1].acceptor().promised();
    assert_eq!(promised.node(), 0);
    assert!(!cluster.nodes[1].prepare(ProposalNumber(promised.0 - 1), "PUT:x:9").unwrap());
    assert!(!cluster.nodes[1].accept(ProposalNumber(promised.0 - 1), "PUT:x:9").unwrap());
    assert_eq!(cluster.values("x"), vec![some("1"); 3]);

    for node in &cluster.nodes {
        let record = node.acceptor().record();
        assert!(record.accepted <= record.promised);
    }
}

#[tokio::test]
async fn unreliable_acceptors_never_diverge() {
    let cluster = Cluster::with_failure_rate(3, 0.3, 10);
    let mut decided = Vec::new();
    let mut failed = Vec::new();

    for i in 0..30 {
        let key = format!("key{}", i);
        let node = &cluster.nodes[i % 3];
        if node.put(&key, &i.to_string()).await.unwrap() {
            decided.push(key);
        } else {
            failed.push(key);
        }
    }

    assert!(!decided.is_empty());
    for key in &decided {
        assert!(cluster.values(key).iter().all(|value| value.is_some()), "{} missing somewhere", key);
    }
    for key in &failed {
        assert_eq!(cluster.values(key), vec![None; 3], "{} applied without quorum", key);
    }
    cluster.assert_converged();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_proposers_stay_consistent() {
    let cluster = Cluster::with_failure_rate(3, 0.0, 20);

    let writes = (0..30)
        .map(|i| {
            let node = cluster.nodes[i % 3].clone();
            tokio::spawn(async move {
                let key = format!("key{}", i);
                let decided = node.put(&key, "v").await.unwrap();
                (key, decided)
            })
        })
        .collect::<Vec<_>>();

    for write in writes {
        let (key, decided) = write.await.unwrap();
        let expected = if decided { some("v") } else { None };
        assert_eq!(cluster.values(&key), vec![expected; 3], "{} inconsistent", key);
    }
    cluster.assert_converged();
}
