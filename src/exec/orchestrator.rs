//! Execution orchestrator.
//!
//! Validates inbound commands against session and cell state, drives the
//! per-cell `idle ↔ running` state machine, launches cell processes, wires
//! output streaming and exit handling, and keeps the process registry in
//! step with actual process existence.
//!
//! Failure isolation: every command is handled independently. Precondition
//! failures (missing session or cell, wrong cell kind, already running) drop
//! the command with a log line and zero outbound events; advisory side
//! effects own their errors and never touch the primary path.

use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};

use crate::channel::events::{
    CellOutputPayload, CellRefPayload, CellStdinPayload, CellUpdatedPayload, CellValidatePayload,
    CellValidateResponsePayload, DepsInstallPayload, DepsValidatePayload, OutputChunk,
    OutputStream,
};
use crate::channel::{Command as ChannelCommand, EventBus, Notification};
use crate::config::GlobalConfig;
use crate::deps;
use crate::exec::spawner::{self, LaunchSpec, LaunchedProcess, ProcessEvent};
use crate::models::Cell;
use crate::registry::{ProcessHandle, ProcessRegistry};
use crate::secrets::SecretsProvider;
use crate::store::SessionStore;
use crate::validate;
use crate::{AppError, Result};

/// What the exit handler does once a tracked process is gone.
#[derive(Debug, Clone, Copy)]
enum ExitAction {
    /// Flip the code cell back to idle and broadcast it.
    CodeCell,
    /// Re-read the manifest from disk, replace the cell's source, persist,
    /// then broadcast the idle manifest cell.
    Install,
}

/// The command-handling core shared by every transport connection.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: Arc<GlobalConfig>,
    store: SessionStore,
    registry: ProcessRegistry,
    bus: EventBus,
    secrets: Arc<SecretsProvider>,
}

impl Orchestrator {
    /// Wire up an orchestrator over its collaborators.
    #[must_use]
    pub fn new(
        config: Arc<GlobalConfig>,
        store: SessionStore,
        registry: ProcessRegistry,
        bus: EventBus,
        secrets: Arc<SecretsProvider>,
    ) -> Self {
        Self {
            config,
            store,
            registry,
            bus,
            secrets,
        }
    }

    /// The session store collaborator.
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// The process registry.
    #[must_use]
    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    /// The outbound notification bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Handle one schema-checked command.
    ///
    /// Never returns an error to the transport: precondition failures are
    /// logged and dropped, per the channel's failure-isolation policy.
    pub async fn dispatch(&self, command: ChannelCommand) {
        let span = info_span!(
            "command",
            event = command.event_name(),
            session_id = command.session_id()
        );
        async {
            let result = match &command {
                ChannelCommand::CellExec(payload) => self.exec_cell(payload).await,
                ChannelCommand::CellStop(payload) => self.stop_cell(payload).await,
                ChannelCommand::CellStdin(payload) => self.forward_stdin(payload).await,
                ChannelCommand::DepsInstall(payload) => self.install_deps(payload).await,
                ChannelCommand::CellValidate(payload) => self.validate_cell(payload).await,
                ChannelCommand::DepsValidate(payload) => self.validate_deps(payload).await,
            };

            if let Err(err) = result {
                match err {
                    AppError::NotFound(_) | AppError::Validation(_) => {
                        warn!(%err, "command dropped");
                    }
                    other => warn!(err = %other, "command failed"),
                }
            }
        }
        .instrument(span)
        .await;
    }

    /// `cell:exec` — run a code cell's script.
    async fn exec_cell(&self, payload: &CellRefPayload) -> Result<()> {
        let session = self.store.find_session(&payload.session_id).await?;
        let cell = session
            .cell(&payload.cell_id)
            .ok_or_else(|| AppError::NotFound(format!("cell {}", payload.cell_id)))?;
        let Cell::Code { filename, .. } = cell else {
            return Err(AppError::Validation(format!(
                "cell {} is not a code cell",
                payload.cell_id
            )));
        };
        let filename = filename.clone();

        let running = self
            .store
            .begin_execution(&payload.session_id, &payload.cell_id)
            .await?;
        self.bus.publish(
            &session.id,
            Notification::CellUpdated(CellUpdatedPayload { cell: running }),
        );

        // Advisory side effect; owns its failures, never awaited here.
        deps::spawn_nudge(session.clone(), self.bus.clone());

        let mut args = self.config.runtime_args.clone();
        args.push(filename);
        let spec = LaunchSpec {
            program: self.config.runtime_cmd.clone(),
            args,
            cwd: session.dir.clone(),
            env: self.secrets.get_secrets().clone(),
        };

        self.launch_tracked(&payload.session_id, &payload.cell_id, &spec, ExitAction::CodeCell)
            .await;
        Ok(())
    }

    /// `deps:install` — install the session's dependencies.
    async fn install_deps(&self, payload: &DepsInstallPayload) -> Result<()> {
        let session = self.store.find_session(&payload.session_id).await?;
        let manifest = session.manifest_cell().ok_or_else(|| {
            AppError::NotFound(format!("manifest cell in session {}", session.id))
        })?;
        let manifest_id = manifest.id().to_owned();

        let running = self
            .store
            .begin_execution(&payload.session_id, &manifest_id)
            .await?;
        self.bus.publish(
            &session.id,
            Notification::CellUpdated(CellUpdatedPayload { cell: running }),
        );

        let mut args = self.config.installer_args.clone();
        if let Some(packages) = &payload.packages {
            args.extend(packages.iter().cloned());
        }
        let spec = LaunchSpec {
            program: self.config.installer_cmd.clone(),
            args,
            cwd: session.dir.clone(),
            env: self.secrets.get_secrets().clone(),
        };

        self.launch_tracked(&payload.session_id, &manifest_id, &spec, ExitAction::Install)
            .await;
        Ok(())
    }

    /// `cell:stop` — request termination of a running code cell.
    async fn stop_cell(&self, payload: &CellRefPayload) -> Result<()> {
        let session = self.store.find_session(&payload.session_id).await?;
        let cell = session
            .cell(&payload.cell_id)
            .ok_or_else(|| AppError::NotFound(format!("cell {}", payload.cell_id)))?;
        if !cell.is_code() {
            return Err(AppError::Validation(format!(
                "cell {} is not a code cell",
                payload.cell_id
            )));
        }

        // Fire-and-forget: the idle transition is driven by the process's
        // own exit, not by this command.
        let registry = self.registry.clone();
        let session_id = payload.session_id.clone();
        let cell_id = payload.cell_id.clone();
        tokio::spawn(async move {
            if !registry.terminate(&session_id, &cell_id).await {
                warn!(session_id, cell_id, "stop found no live process to terminate");
            }
        });
        Ok(())
    }

    /// `cell:stdin` — forward raw input to the registered process.
    async fn forward_stdin(&self, payload: &CellStdinPayload) -> Result<()> {
        self.registry
            .forward_input(&payload.session_id, &payload.cell_id, payload.stdin.as_bytes())
            .await;
        Ok(())
    }

    /// `cell:validate` — check a proposed filename and answer either way.
    async fn validate_cell(&self, payload: &CellValidatePayload) -> Result<()> {
        let session = self.store.find_session(&payload.session_id).await?;
        let verdict = validate::validate_filename(&session, &payload.cell_id, &payload.filename);

        let response = match verdict {
            Ok(()) => CellValidateResponsePayload {
                cell_id: payload.cell_id.clone(),
                filename: payload.filename.clone(),
                error: false,
                message: None,
            },
            Err(message) => CellValidateResponsePayload {
                cell_id: payload.cell_id.clone(),
                filename: payload.filename.clone(),
                error: true,
                message: Some(message),
            },
        };
        self.bus
            .publish(&session.id, Notification::CellValidateResponse(response));
        Ok(())
    }

    /// `deps:validate` — run both dependency health checks now.
    async fn validate_deps(&self, payload: &DepsValidatePayload) -> Result<()> {
        let session = self.store.find_session(&payload.session_id).await?;
        deps::run_checks(&session, &self.bus).await;
        Ok(())
    }

    /// Launch a process and wire it into the registry and exit handling.
    ///
    /// The spawn-failure policy lives here: a spawn error or a handle with
    /// no pid reverts the cell to idle, broadcasts the update, and registers
    /// nothing. On success the handle is registered *before* the event
    /// consumer starts, so an exit can never observe an unregistered key.
    async fn launch_tracked(
        &self,
        session_id: &str,
        cell_id: &str,
        spec: &LaunchSpec,
        action: ExitAction,
    ) {
        let launched = match spawner::launch(spec) {
            Ok(launched) => launched,
            Err(err) => {
                warn!(session_id, cell_id, %err, "spawn failed, reverting to idle");
                self.revert_to_idle(session_id, cell_id).await;
                return;
            }
        };

        if launched.pid.is_none() {
            warn!(session_id, cell_id, "process died before a pid was observed");
            launched.kill.cancel();
            self.revert_to_idle(session_id, cell_id).await;
            return;
        }

        let LaunchedProcess {
            pid,
            stdin,
            kill,
            events,
        } = launched;
        self.registry
            .register(session_id, cell_id, ProcessHandle::new(pid, stdin, kill))
            .await;

        let this = self.clone();
        let session_id = session_id.to_owned();
        let cell_id = cell_id.to_owned();
        tokio::spawn(async move {
            this.consume_events(session_id, cell_id, events, action).await;
        });
    }

    /// Stream process events out as notifications until the exit event.
    async fn consume_events(
        &self,
        session_id: String,
        cell_id: String,
        mut events: tokio::sync::mpsc::Receiver<ProcessEvent>,
        action: ExitAction,
    ) {
        while let Some(event) = events.recv().await {
            match event {
                ProcessEvent::Stdout(chunk) => {
                    self.publish_output(&session_id, &cell_id, OutputStream::Stdout, &chunk);
                }
                ProcessEvent::Stderr(chunk) => {
                    self.publish_output(&session_id, &cell_id, OutputStream::Stderr, &chunk);
                }
                ProcessEvent::Exit { code } => {
                    info!(session_id, cell_id, ?code, "cell process finished");
                    self.handle_exit(&session_id, &cell_id, action).await;
                    break;
                }
            }
        }
    }

    fn publish_output(&self, session_id: &str, cell_id: &str, stream: OutputStream, chunk: &[u8]) {
        self.bus.publish(
            session_id,
            Notification::CellOutput(CellOutputPayload {
                cell_id: cell_id.to_owned(),
                output: OutputChunk {
                    stream,
                    data: String::from_utf8_lossy(chunk).into_owned(),
                },
            }),
        );
    }

    /// Exit handling: drop the registry entry, then settle the cell.
    async fn handle_exit(&self, session_id: &str, cell_id: &str, action: ExitAction) {
        self.registry.remove(session_id, cell_id).await;
        match action {
            ExitAction::CodeCell => self.revert_to_idle(session_id, cell_id).await,
            ExitAction::Install => self.finish_install(session_id, cell_id).await,
        }
    }

    /// Flip a cell back to idle and broadcast the update, tolerating a
    /// session or cell that has since disappeared.
    async fn revert_to_idle(&self, session_id: &str, cell_id: &str) {
        if let Some(cell) = self.store.finish_execution(session_id, cell_id).await {
            self.bus.publish(
                session_id,
                Notification::CellUpdated(CellUpdatedPayload { cell }),
            );
        }
    }

    /// Post-install settlement: the on-disk manifest is the truth now, so
    /// re-read it, replace the cell's stored source, persist, broadcast.
    async fn finish_install(&self, session_id: &str, cell_id: &str) {
        let manifest = match self.store.find_session(session_id).await {
            Ok(session) => self.store.read_manifest_from_disk(&session).await,
            Err(err) => Err(err),
        };

        let source = match manifest {
            Ok(source) => source,
            Err(err) => {
                warn!(session_id, cell_id, %err, "manifest re-read failed after install");
                self.revert_to_idle(session_id, cell_id).await;
                return;
            }
        };

        let updated = self
            .store
            .update_session(
                session_id,
                |session| {
                    if let Some(cell) = session.cells.iter_mut().find(|c| c.id() == cell_id) {
                        if let Cell::Manifest {
                            source: stored,
                            status,
                            ..
                        } = cell
                        {
                            *stored = source;
                            *status = crate::models::CellStatus::Idle;
                        }
                    }
                },
                true,
            )
            .await;

        match updated {
            Ok(session) => {
                if let Some(cell) = session.cell(cell_id) {
                    self.bus.publish(
                        session_id,
                        Notification::CellUpdated(CellUpdatedPayload { cell: cell.clone() }),
                    );
                }
            }
            Err(err) => {
                warn!(session_id, cell_id, %err, "failed to persist manifest after install");
            }
        }
    }
}
