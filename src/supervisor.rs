// Brings components up in dependency order and tears them down in reverse,
// each phase bounded by `shutdown_grace`. A Fatal error from any leaf
// component routes here rather than unwinding the process directly.

use crate::agents::registry::Registry;
use crate::bus::EventBus;
use crate::config::ServiceConfig;
use crate::dispatcher::{DispatchOutcome, Dispatcher};
use crate::gateway;
use crate::github::client::GitHubClient;
use crate::github::types::WorkItem;
use crate::pr_watcher::PrWatcher;
use crate::rate_governor::RateGovernor;
use crate::scheduler::Scheduler;
use crate::secrets::SecretStore;
use crate::shutdown::ShutdownCoordinator;
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct Supervisor {
    pub config: ServiceConfig,
    pub bus: Arc<EventBus>,
    pub registry: Arc<Registry>,
    pub rate_governor: Arc<RateGovernor>,
    pub github: Arc<GitHubClient>,
    pub scheduler: Arc<Scheduler>,
    pub dispatcher: Arc<Dispatcher>,
    pub pr_watcher: Arc<PrWatcher>,
    pub ready: Arc<AtomicBool>,
    pub shutdown_token: CancellationToken,
}

impl Supervisor {
    /// Bring-up order: Bus, Secret Store, Registry (AlwaysOn agents),
    /// Rate Governor, GitHub Client, Scheduler.
    pub async fn bootstrap(config: ServiceConfig) -> Result<Self> {
        let bus = Arc::new(EventBus::new());

        let secret_store = SecretStore::load(&config.secrets_dir, config.environment.tag)
            .context("loading secret store")?;

        let agent_configs = config.load_agent_configs().context("loading agent configs")?;
        let registry = Arc::new(Registry::new(agent_configs));
        for id in registry.always_on_ids() {
            registry.send(&id, crate::agents::AgentEvent::Start);
            registry.send(&id, crate::agents::AgentEvent::Started);
        }

        let rate_governor = Arc::new(RateGovernor::new(Duration::from_secs(
            config.rate_limits.duplicate_window_s,
        )));

        let primary_account = registry
            .always_on_ids()
            .into_iter()
            .next()
            .unwrap_or_else(|| "default".to_string());
        let credential = registry
            .credential_ref(&primary_account)
            .and_then(|cred_ref| secret_store.get(&cred_ref).ok().map(|c| c.expose().to_string()))
            .unwrap_or_default();
        let github = Arc::new(GitHubClient::new(credential).context("constructing GitHub client")?);

        let scheduler = Arc::new(Scheduler::new(
            github.clone(),
            rate_governor.clone(),
            bus.clone(),
            "system".to_string(),
            config.repositories.clone(),
        ));

        let dispatcher = Arc::new(Dispatcher::new(
            registry.clone(),
            bus.clone(),
            github.clone(),
            rate_governor.clone(),
            "system".to_string(),
        ));

        let pr_watcher = Arc::new(PrWatcher::new(github.clone(), rate_governor.clone(), bus.clone()));

        let ready = Arc::new(AtomicBool::new(false));

        Ok(Self {
            config,
            bus,
            registry,
            rate_governor,
            github,
            scheduler,
            dispatcher,
            pr_watcher,
            ready,
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Reacts to a claimed issue: classifies it (or recovers a prior
    /// decision) via the Gateway, then binds it to an agent via the
    /// Dispatcher. This is the Polling -> Claim -> Gateway -> Dispatcher leg
    /// of the steady-state flow; `sweep_repository` only performs the first
    /// two steps.
    async fn handle_issue_acquired(&self, payload: &serde_json::Value) {
        let Some(work) = payload
            .get("work_item")
            .and_then(|v| serde_json::from_value::<WorkItem>(v.clone()).ok())
        else {
            warn!("IssueAcquired event carried no usable work item, skipping dispatch");
            return;
        };

        let decision = match gateway::classify_and_apply(&self.github, &self.rate_governor, "system", &work, 0).await
        {
            Ok(decision) => decision,
            Err(e) => {
                error!(owner = %work.owner, repo = %work.name, issue = work.number, error = %e, "gateway classification failed");
                return;
            }
        };

        match self
            .dispatcher
            .dispatch(&work.owner, &work.name, work.number, decision.class, &[], 0)
            .await
        {
            DispatchOutcome::Dispatched(task) => {
                info!(agent = %task.agent_id, issue = work.number, "dispatched acquired issue");
            }
            DispatchOutcome::NoAgentAvailable => {
                warn!(issue = work.number, "no agent available, claim released");
            }
        }
    }

    /// Readiness probe: are all AlwaysOn agents Idle?
    pub fn check_ready(&self) -> bool {
        self.registry
            .always_on_ids()
            .iter()
            .all(|id| matches!(self.registry.runtime_state(id), Some(crate::agents::RuntimeState::Idle)))
    }

    /// Runs the polling loop until `shutdown_token` is cancelled, then tears
    /// components down in reverse bring-up order within their grace windows.
    pub async fn run(&self) {
        self.ready.store(self.check_ready(), Ordering::Relaxed);
        info!(ready = self.ready.load(Ordering::Relaxed), "supervisor entering run loop");

        let coordinator = ShutdownCoordinator::new(Duration::from_secs(self.config.polling.shutdown_grace_s));
        let mut ticker = tokio::time::interval(Duration::from_secs(
            self.scheduler
                .repositories()
                .first()
                .map(|r| r.poll_interval_s)
                .unwrap_or(60),
        ));
        let mut pr_watch_ticker =
            tokio::time::interval(Duration::from_secs(self.config.polling.pr_monitor_interval_s));

        let mut bus_events = self.bus.subscribe();

        loop {
            tokio::select! {
                _ = self.shutdown_token.cancelled() => {
                    break;
                }
                _ = ticker.tick() => {
                    self.ready.store(self.check_ready(), Ordering::Relaxed);
                    for binding in self.scheduler.repositories() {
                        self.scheduler.sweep_repository(binding, "dispatch-pending").await;
                    }
                }
                _ = pr_watch_ticker.tick() => {
                    for binding in self.scheduler.repositories() {
                        self.pr_watcher
                            .sweep_repository(&binding.owner, &binding.name, &binding.skip_labels)
                            .await;
                    }
                }
                event = bus_events.recv() => {
                    match event {
                        Ok(event) if event.topic == "polling.tick" && event.payload.get("event").and_then(|v| v.as_str()) == Some("IssueAcquired") => {
                            self.handle_issue_acquired(&event.payload).await;
                        }
                        Ok(_) => {}
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                            self.bus.record_dropped(n);
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {}
                    }
                }
            }
        }

        coordinator
            .run_phase("scheduler", async {
                info!("polling loop stopped");
            })
            .await;
        coordinator
            .run_phase("github-client", async {})
            .await;
        coordinator
            .run_phase("rate-governor", async {})
            .await;
        coordinator
            .run_phase("registry", async {
                for id in self.registry.always_on_ids() {
                    self.registry.send(&id, crate::agents::AgentEvent::Stop);
                    self.registry.send(&id, crate::agents::AgentEvent::Stopped);
                }
            })
            .await;
        coordinator
            .run_phase("bus", async {
                warn!(dropped = self.bus.dropped_count(), "event bus shutting down");
            })
            .await;
    }
}
