//! Ties together container discovery, policy fetch, planning, and the
//! atomic chain swap into one reconcile pass, run on a fixed-interval
//! timer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use claw_metrics::storage::MetricStore;
use claw_metrics::types::{MetricName, MetricPoint};
use claw_netrules::{FilterClient, IpTablesClient, LockedFilter};
use tracing::{error, info, warn};

use crate::client::PolicyClient;
use crate::config::AgentConfig;
use crate::containers::local_containers_by_group;
use crate::planner::{
    DynamicPolicyPlanner, LocalDefaultPlanner, MasqueradePlanner, Planner, PlanContext,
    RemoteDefaultPlanner,
};
use crate::swap::swap_chain;

/// Owns everything one reconcile pass needs: the filter driver, the
/// policy client, and the static planner list.
pub struct Reconciler {
    config: AgentConfig,
    filter: LockedFilter<IpTablesClient>,
    policy_client: PolicyClient,
    planners: Vec<Arc<dyn Planner>>,
    metrics: MetricStore,
}

impl Reconciler {
    /// Builds a reconciler from configuration, wiring up the default
    /// local/remote planners plus the dynamic policy planner, and the
    /// masquerade planner when enabled.
    pub fn new(config: AgentConfig) -> crate::error::Result<Self> {
        let filter = LockedFilter::new(IpTablesClient::new(), &config.iptables_lock_file);
        let policy_client = PolicyClient::new(&config)?;

        let mut planners: Vec<Arc<dyn Planner>> =
            vec![Arc::new(LocalDefaultPlanner), Arc::new(RemoteDefaultPlanner), Arc::new(DynamicPolicyPlanner)];
        if config.enable_masquerade {
            planners.push(Arc::new(MasqueradePlanner));
        }

        Ok(Self {
            config,
            filter,
            policy_client,
            planners,
            metrics: MetricStore::new(Duration::from_secs(24 * 60 * 60)),
        })
    }

    /// Runs the reconciler until the process receives SIGINT/SIGTERM.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval_duration());
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("received shutdown signal, stopping reconciler");
                    break;
                }
            }
        }
    }

    fn record_elapsed(&self, stage: &str, start: Instant) {
        #[allow(clippy::cast_precision_loss)]
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        let Ok(name) = MetricName::new(stage) else {
            return;
        };
        let _ = self.metrics.push(&name, MetricPoint::now(elapsed_ms));
    }

    /// Runs exactly one reconcile pass: safe to call directly in tests.
    pub async fn tick(&self) {
        let total_start = Instant::now();

        let container_read_start = Instant::now();
        let local_containers = local_containers_by_group(&self.config.container_state_dir);
        self.record_elapsed("container_read_time", container_read_start);

        let policy_fetch_start = Instant::now();
        let policies = match self.policy_client.fetch_policies().await {
            Ok(policies) => {
                self.record_elapsed("policy_fetch_time", policy_fetch_start);
                policies
            }
            Err(err) => {
                self.record_elapsed("policy_fetch_time", policy_fetch_start);
                warn!(%err, "failed to fetch policies this cycle, leaving chains in place");
                return;
            }
        };

        let (local_subnet, overlay_network) = match self.config.resolved_subnets() {
            Ok(subnets) => subnets,
            Err(err) => {
                error!(%err, "cannot resolve overlay subnets this cycle");
                return;
            }
        };

        let ctx = PlanContext {
            local_containers: &local_containers,
            policies: &policies,
            overlay_iface: &self.config.overlay_iface,
            local_subnet: &local_subnet,
            overlay_network: &overlay_network,
            remote_vni: self.config.vni,
        };

        for planner in &self.planners {
            let rules = planner.plan(&ctx);
            let result = swap_chain(
                &self.filter as &dyn FilterClient,
                planner.table(),
                planner.parent_chain(),
                planner.chain_prefix(),
                &rules,
            );
            if let Err(err) = result {
                error!(planner = planner.name(), %err, "planner swap failed, others still reconcile");
            }
        }

        self.record_elapsed("total_poll_time", total_start);
    }
}
