//! Forward management on top of a [`CommandRunner`]
//!
//! All operations target `-t nat` and the PREROUTING chain. Listing only
//! reports rules carrying the fwdctl comment tag; other lines in the chain are
//! skipped, as are tagged lines that no longer decode.

use crate::core::codec::{self, Action, CHAIN, TABLE};
use crate::core::error::{Error, Result};
use crate::core::iptables::{CommandOutput, CommandRunner};
use crate::core::rule::Rule;
use serde::Serialize;
use tracing::{debug, info};

/// A managed forward as listed, with its 1-based position among managed rules
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Forward {
    pub id: usize,
    #[serde(flatten)]
    pub rule: Rule,
}

/// Outcome of applying a batch of rules
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub created: usize,
    pub skipped: usize,
}

/// Creates, lists and removes DNAT forwards.
pub struct ForwardManager<R> {
    runner: R,
}

fn nat_args(spec: Vec<String>) -> Vec<String> {
    let mut args = Vec::with_capacity(spec.len() + 2);
    args.push("-t".to_string());
    args.push(TABLE.to_string());
    args.extend(spec);
    args
}

/// `-C` reports a missing rule with exit status 1 and one of these messages.
fn is_missing_rule(output: &CommandOutput) -> bool {
    output.exit_code == Some(1)
        && (output.stderr.contains("does a matching rule exist")
            || output.stderr.contains("No chain/target/match by that name"))
}

impl<R: CommandRunner> ForwardManager<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    async fn run_checked(&self, args: Vec<String>) -> Result<CommandOutput> {
        let output = self.runner.run(&args).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(output.into_error())
        }
    }

    /// Raw `iptables -t nat -S PREROUTING` lines.
    pub async fn list_lines(&self) -> Result<Vec<String>> {
        let output = self
            .run_checked(nat_args(vec!["-S".to_string(), CHAIN.to_string()]))
            .await?;
        Ok(output
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(String::from)
            .collect())
    }

    /// Managed forwards in chain order.
    pub async fn list(&self) -> Result<Vec<Forward>> {
        let mut forwards = Vec::new();
        for line in self.list_lines().await? {
            if !codec::is_managed(&line) {
                continue;
            }
            match codec::decode(&line) {
                Ok(rule) => forwards.push(Forward {
                    id: forwards.len() + 1,
                    rule,
                }),
                Err(e) if e.is_unparseable_line() => {
                    debug!("Skipping tagged rule that does not decode: {e}");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(forwards)
    }

    /// Whether an identical forward is already in the chain.
    pub async fn exists(&self, rule: &Rule) -> Result<bool> {
        let output = self
            .runner
            .run(&nat_args(codec::encode(rule, Action::Check)))
            .await?;
        if output.success() {
            Ok(true)
        } else if is_missing_rule(&output) {
            Ok(false)
        } else {
            Err(output.into_error())
        }
    }

    /// Validates and appends a forward.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for bad input, [`Error::AlreadyExists`]
    /// if the forward is present, or [`Error::Iptables`] if iptables fails.
    pub async fn create(&self, rule: &Rule) -> Result<Rule> {
        let rule = crate::validators::validate_rule(rule)?;
        if self.exists(&rule).await? {
            return Err(Error::AlreadyExists(rule));
        }
        self.run_checked(nat_args(codec::encode(&rule, Action::Insert)))
            .await?;
        info!("Created forward {rule}");
        Ok(rule)
    }

    /// Removes the forward matching every field of `rule`.
    pub async fn delete(&self, rule: &Rule) -> Result<Rule> {
        let rule = crate::validators::validate_rule(rule)?;
        if !self.exists(&rule).await? {
            return Err(Error::NotFound(rule.to_string()));
        }
        self.remove(&rule).await?;
        Ok(rule)
    }

    /// Removes the forward listed under `id`.
    pub async fn delete_by_id(&self, id: usize) -> Result<Rule> {
        let forward = self
            .list()
            .await?
            .into_iter()
            .find(|f| f.id == id)
            .ok_or_else(|| Error::NotFound(format!("no forward with id {id}")))?;
        self.remove(&forward.rule).await?;
        Ok(forward.rule)
    }

    async fn remove(&self, rule: &Rule) -> Result<()> {
        self.run_checked(nat_args(codec::encode(rule, Action::Delete)))
            .await?;
        info!("Deleted forward {rule}");
        Ok(())
    }

    /// Creates every rule that is not already present.
    ///
    /// All rules are validated before the chain is touched.
    pub async fn apply(&self, rules: &[Rule]) -> Result<ApplySummary> {
        let rules = rules
            .iter()
            .map(crate::validators::validate_rule)
            .collect::<Result<Vec<_>>>()?;

        let mut summary = ApplySummary::default();
        for rule in &rules {
            if self.exists(rule).await? {
                debug!("Forward already present, skipping: {rule}");
                summary.skipped += 1;
                continue;
            }
            self.run_checked(nat_args(codec::encode(rule, Action::Insert)))
                .await?;
            info!("Created forward {rule}");
            summary.created += 1;
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_helpers::FakeIptables;

    const FOREIGN_LINE: &str =
        "-A PREROUTING -m addrtype --dst-type LOCAL -m comment --comment docker -j DOCKER";

    fn managed_line(iface: &str, dport: u32) -> String {
        codec::listing_line(&Rule::new(iface, "tcp", dport, "10.0.0.2", 80))
    }

    #[tokio::test]
    async fn test_list_skips_unmanaged_and_policy_lines() {
        let first = managed_line("eth0", 8080);
        let second = managed_line("eth1", 8081);
        let fake = FakeIptables::with_lines(&[&first, FOREIGN_LINE, &second]);
        let manager = ForwardManager::new(fake);

        let forwards = manager.list().await.unwrap();
        assert_eq!(forwards.len(), 2);
        assert_eq!(forwards[0].id, 1);
        assert_eq!(forwards[0].rule.iface, "eth0");
        assert_eq!(forwards[1].id, 2);
        assert_eq!(forwards[1].rule.dport, 8081);
    }

    #[tokio::test]
    async fn test_list_skips_tagged_line_without_destination() {
        let broken = "-A PREROUTING -i eth0 -p tcp -m tcp --dport 3001 -m comment --comment fwdctl -j DNAT";
        let good = managed_line("eth0", 8080);
        let manager = ForwardManager::new(FakeIptables::with_lines(&[broken, &good]));

        let forwards = manager.list().await.unwrap();
        assert_eq!(forwards.len(), 1);
        assert_eq!(forwards[0].id, 1);
        assert_eq!(forwards[0].rule.dport, 8080);
    }

    #[tokio::test]
    async fn test_create_appends_encoded_rule() {
        let manager = ForwardManager::new(FakeIptables::default());
        let rule = Rule::new("eth0", "TCP", 3000, "192.168.199.105", 80);

        let created = manager.create(&rule).await.unwrap();
        assert_eq!(created.proto, "tcp");

        let calls = manager.runner().calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0][..3], ["-t", "nat", "-C"]);
        assert_eq!(calls[1][..3], ["-t", "nat", "-A"]);
        assert_eq!(manager.list().await.unwrap()[0].rule, created);
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate() {
        let manager = ForwardManager::new(FakeIptables::default());
        let rule = Rule::new("eth0", "tcp", 3000, "192.168.199.105", 80);

        manager.create(&rule).await.unwrap();
        let err = manager.create(&rule).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(ref r) if *r == rule));
        assert_eq!(manager.runner().lines().len(), 1);
    }

    #[tokio::test]
    async fn test_create_validates_before_running() {
        let manager = ForwardManager::new(FakeIptables::default());
        let rule = Rule::new("eth0", "tcp", 70000, "192.168.199.105", 80);

        let err = manager.create(&rule).await.unwrap_err();
        assert!(matches!(err, Error::Validation { .. }));
        assert!(manager.runner().calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_ipv6_target() {
        let manager = ForwardManager::new(FakeIptables::default());
        let rule = Rule::new("eth0", "tcp", 8080, "fd00::1", 80);

        let err = manager.create(&rule).await.unwrap_err();
        assert!(matches!(err, Error::Validation { ref field, .. } if field == "source-address"));
        assert!(manager.runner().calls().is_empty());
    }

    #[tokio::test]
    async fn test_delete_missing_rule() {
        let manager = ForwardManager::new(FakeIptables::default());
        let rule = Rule::new("eth0", "tcp", 3000, "192.168.199.105", 80);

        let err = manager.delete(&rule).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_by_id() {
        let first = managed_line("eth0", 8080);
        let second = managed_line("eth0", 8081);
        let manager =
            ForwardManager::new(FakeIptables::with_lines(&[&first, FOREIGN_LINE, &second]));

        let removed = manager.delete_by_id(2).await.unwrap();
        assert_eq!(removed.dport, 8081);
        assert_eq!(manager.runner().lines(), vec![first, FOREIGN_LINE.to_string()]);

        let err = manager.delete_by_id(2).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_apply_skips_existing() {
        let existing = Rule::new("eth0", "tcp", 8080, "10.0.0.2", 80);
        let line = codec::listing_line(&existing);
        let manager = ForwardManager::new(FakeIptables::with_lines(&[&line]));

        let rules = vec![existing, Rule::new("eth0", "udp", 53, "10.0.0.3", 53)];
        let summary = manager.apply(&rules).await.unwrap();
        assert_eq!(
            summary,
            ApplySummary {
                created: 1,
                skipped: 1
            }
        );
        assert_eq!(manager.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_apply_is_all_or_nothing_on_validation() {
        let manager = ForwardManager::new(FakeIptables::default());
        let rules = vec![
            Rule::new("eth0", "tcp", 8080, "10.0.0.2", 80),
            Rule::new("eth0", "icmp", 8081, "10.0.0.2", 80),
        ];

        assert!(manager.apply(&rules).await.is_err());
        assert!(manager.runner().calls().is_empty());
    }

    #[test]
    fn test_forward_json_is_flat() {
        let forward = Forward {
            id: 3,
            rule: Rule::new("lo", "tcp", 3001, "127.0.0.1", 80),
        };
        let json = serde_json::to_value(&forward).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["dport"], 3001);
    }
}
