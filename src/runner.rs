// Rubemacro — Macro runner (sequential step state machine)

use crate::binder::ArgBinder;
use crate::config::ApiConfig;
use crate::error::{RunError, StepError};
use crate::executor::{resolve_url, StepExecutor};
use crate::session;
use crate::store::{Macro, Step};
use std::sync::Arc;

/// Run lifecycle. `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Done,
    Failed,
}

/// Per-step success acknowledgments, in execution order.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub completed: Vec<String>,
}

/// Drives the steps of a macro in definition order, threading the session
/// id extracted by the session-creating step into later steps' args.
///
/// Strictly sequential: a step's args may depend on an earlier step's
/// session id, and remote side effects must not be duplicated or
/// reordered. The first failing step aborts the run; prior steps' remote
/// side effects stand uncorrected.
pub struct MacroRunner {
    config: ApiConfig,
    executor: Arc<dyn StepExecutor>,
    binder: Box<dyn ArgBinder>,
    state: RunState,
}

impl MacroRunner {
    /// Configuration is injected here rather than read from the
    /// environment, so the runner is testable without env mutation.
    pub fn new(
        config: ApiConfig,
        executor: Arc<dyn StepExecutor>,
        binder: Box<dyn ArgBinder>,
    ) -> Self {
        Self {
            config,
            executor,
            binder,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub async fn run(&mut self, mac: &Macro) -> Result<RunReport, RunError> {
        self.state = RunState::Running;
        let mut session: Option<String> = None;
        let mut completed = Vec::with_capacity(mac.steps.len());

        for step in &mac.steps {
            match self.run_step(step, &mut session).await {
                Ok(()) => {
                    tracing::info!(step = %step.name, "Step ok");
                    completed.push(step.name.clone());
                }
                Err(e) => {
                    tracing::error!(step = %e.step, url = %e.url, error = %e.source, "Step failed");
                    self.state = RunState::Failed;
                    return Err(e);
                }
            }
        }

        self.state = RunState::Done;
        Ok(RunReport { completed })
    }

    async fn run_step(&self, step: &Step, session: &mut Option<String>) -> Result<(), RunError> {
        let url = resolve_url(&self.config.base_url, &step.path);
        let fail = |args: String, source: StepError| RunError {
            step: step.name.clone(),
            url: url.clone(),
            args,
            source,
        };

        let bound = self
            .binder
            .bind(&step.args, session.as_deref())
            .map_err(|e| fail(step.args.clone(), e))?;
        let sent_args = bound.to_string();

        let start = std::time::Instant::now();
        let body = self
            .executor
            .execute(&url, &bound, &self.config.auth_token)
            .await
            .map_err(|e| fail(sent_args.clone(), e))?;
        tracing::debug!(step = %step.name, duration_ms = %start.elapsed().as_millis(), "Step request completed");

        // The session id is written once; later steps only read it.
        if session.is_none() {
            *session = session::extract(&step.name, &body, None).map_err(|e| fail(sent_args, e))?;
        }

        Ok(())
    }
}
