use std::time::Duration;

use acubens_common::prelude::*;
use acubens_common::{
    AcquireRequest, IdGenerator, LockEvent, ReleaseRequest, RemoteHolder, RenewRequest,
    RenewStatus,
};
use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::cache::{CacheOutcome, ClientLockCache};
use crate::config::ClientProperties;
use crate::transport::CoordinatorTransport;

/// Session-wide mode of the reconciliation state machine.
///
/// Degraded is terminal for the session: the capability probe is never
/// retried, and no further lock calls are attempted. A broken lock service
/// must never block the user from working; it only loses the
/// mutual-exclusion guarantee.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionMode {
    Uninitialized,
    Probing,
    Active,
    Degraded,
}

/// Per-resource lock state as presented to UI consumers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceView {
    Free,
    LockedByOther(RemoteHolder),
    LockedBySelf,
}

/// UI-visible outcomes emitted by the state machine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcilerNotice {
    SessionActive,
    SessionDegraded,
    LockGranted {
        resource_code: InlineStr,
    },
    LockDenied {
        resource_code: InlineStr,
        owner: RemoteHolder,
    },
    LockReleased {
        resource_code: InlineStr,
    },
    /// Local ownership was revoked (reclaim, foreign acquire, renewal
    /// failure); the resource may now be contested.
    OwnershipLost {
        resource_code: InlineStr,
    },
    CacheUpdated,
}

/// Identity presented to the coordinator for the current user.
#[derive(Clone, Debug)]
pub struct ClientIdentity {
    pub holder_id: InlineStr,
    pub display_name: InlineStr,
}

impl ClientIdentity {
    /// Identity with a freshly minted holder id, for sessions without an
    /// externally supplied one.
    pub fn anonymous(display_name: impl Into<InlineStr>) -> Self {
        Self {
            holder_id: IdGenerator::generate(),
            display_name: display_name.into(),
        }
    }
}

enum ReconcileInput {
    EnterEdit {
        resource_code: InlineStr,
    },
    LeaveEdit {
        resource_code: InlineStr,
    },
    /// Release A, then acquire B. If B is denied or fails, A is not
    /// re-acquired.
    SwitchEdit {
        from: InlineStr,
        to: InlineStr,
    },
    /// Page teardown: fire-and-forget release, nothing awaited.
    Teardown {
        resource_code: InlineStr,
    },
    ServerEvent(LockEvent),
    HeartbeatTick,
    QueryMode {
        reply: oneshot::Sender<SessionMode>,
    },
    QueryView {
        resource_code: InlineStr,
        reply: oneshot::Sender<ResourceView>,
    },
}

/// Handle used by UI glue (and tests) to drive the state machine. All
/// operations go through one input queue processed a message at a time, so
/// no two reconciliation steps ever interleave.
#[derive(Clone)]
pub struct ReconcilerHandle {
    inputs: mpsc::Sender<ReconcileInput>,
}

impl ReconcilerHandle {
    pub async fn enter_edit(&self, resource_code: impl Into<InlineStr>) -> AcuResult<()> {
        self.send(ReconcileInput::EnterEdit {
            resource_code: resource_code.into(),
        })
        .await
    }

    pub async fn leave_edit(&self, resource_code: impl Into<InlineStr>) -> AcuResult<()> {
        self.send(ReconcileInput::LeaveEdit {
            resource_code: resource_code.into(),
        })
        .await
    }

    pub async fn switch_edit(
        &self,
        from: impl Into<InlineStr>,
        to: impl Into<InlineStr>,
    ) -> AcuResult<()> {
        self.send(ReconcileInput::SwitchEdit {
            from: from.into(),
            to: to.into(),
        })
        .await
    }

    pub async fn teardown(&self, resource_code: impl Into<InlineStr>) -> AcuResult<()> {
        self.send(ReconcileInput::Teardown {
            resource_code: resource_code.into(),
        })
        .await
    }

    /// Feed one push event from the coordinator's broadcast channel.
    pub async fn server_event(&self, event: LockEvent) -> AcuResult<()> {
        self.send(ReconcileInput::ServerEvent(event)).await
    }

    pub async fn mode(&self) -> AcuResult<SessionMode> {
        let (reply, rx) = oneshot::channel();
        self.send(ReconcileInput::QueryMode { reply }).await?;
        rx.await
            .map_err(|_| ErrorCode::SendEventFailed("reconciler stopped"))
    }

    pub async fn resource_view(
        &self,
        resource_code: impl Into<InlineStr>,
    ) -> AcuResult<ResourceView> {
        let (reply, rx) = oneshot::channel();
        self.send(ReconcileInput::QueryView {
            resource_code: resource_code.into(),
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| ErrorCode::SendEventFailed("reconciler stopped"))
    }

    async fn send(&self, input: ReconcileInput) -> AcuResult<()> {
        self.inputs
            .send(input)
            .await
            .map_err(|_| ErrorCode::SendEventFailed("reconciler stopped"))
    }
}

/// Drives acquire/heartbeat/release for the locally-held lease and decides
/// UI-visible lock ownership, including the degraded-mode fallback when the
/// coordinator is unreachable.
pub struct LockReconciler {
    transport: Arc<dyn CoordinatorTransport>,
    identity: ClientIdentity,
    properties: ClientProperties,
    mode: SessionMode,
    cache: ClientLockCache,
    renew_failures: u32,
    heartbeat: Option<HeartbeatGuard>,
    inputs: mpsc::Sender<ReconcileInput>,
    notices: mpsc::UnboundedSender<ReconcilerNotice>,
}

/// Aborts the heartbeat task on drop, so cancellation is immediate when
/// ownership is lost, switched or released.
struct HeartbeatGuard {
    task: JoinHandle<()>,
}

impl Drop for HeartbeatGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl LockReconciler {
    /// Spawns the state machine. The capability probe runs before any
    /// queued input is processed; commands sent meanwhile simply wait.
    pub fn spawn(
        transport: Arc<dyn CoordinatorTransport>,
        identity: ClientIdentity,
        properties: ClientProperties,
    ) -> (
        ReconcilerHandle,
        mpsc::UnboundedReceiver<ReconcilerNotice>,
    ) {
        let (inputs, mut input_rx) = mpsc::channel(64);
        let (notices, notice_rx) = mpsc::unbounded_channel();

        let cache = ClientLockCache::new(identity.holder_id.clone());
        let mut reconciler = Self {
            transport,
            identity,
            properties,
            mode: SessionMode::Uninitialized,
            cache,
            renew_failures: 0,
            heartbeat: None,
            inputs: inputs.clone(),
            notices,
        };

        tokio::spawn(async move {
            reconciler.probe().await;
            while let Some(input) = input_rx.recv().await {
                reconciler.handle_input(input).await;
            }
            debug!("reconciler input queue closed, stopping");
        });

        (ReconcilerHandle { inputs }, notice_rx)
    }

    async fn probe(&mut self) {
        self.mode = SessionMode::Probing;
        match self.transport.probe_status().await {
            Ok(status) if status.ok => {
                self.cache.replace_from_table(&status.leases);
                self.mode = SessionMode::Active;
                info!(
                    "lock coordination active, {} resources currently locked",
                    status.leases.len()
                );
                self.notify(ReconcilerNotice::SessionActive);
            }
            Ok(_) => self.degrade("capability probe returned a non-success reply"),
            Err(e) => {
                warn!("capability probe failed: {}", e);
                self.degrade("capability probe failed");
            }
        }
    }

    async fn handle_input(&mut self, input: ReconcileInput) {
        // queries are answered in any mode; everything else is dropped once
        // the session has degraded
        match input {
            ReconcileInput::QueryMode { reply } => {
                let _ = reply.send(self.mode);
                return;
            }
            ReconcileInput::QueryView {
                resource_code,
                reply,
            } => {
                let _ = reply.send(self.view_of(&resource_code));
                return;
            }
            _ if self.mode != SessionMode::Active => {
                debug!("lock input ignored outside active mode");
                return;
            }
            ReconcileInput::EnterEdit { resource_code } => {
                self.enter_edit(resource_code).await;
            }
            ReconcileInput::LeaveEdit { resource_code } => {
                self.leave_edit(resource_code).await;
            }
            ReconcileInput::SwitchEdit { from, to } => {
                self.leave_edit(from).await;
                if self.mode == SessionMode::Active {
                    self.enter_edit(to).await;
                }
            }
            ReconcileInput::Teardown { resource_code } => {
                self.teardown(resource_code);
            }
            ReconcileInput::ServerEvent(event) => {
                self.server_event(event);
            }
            ReconcileInput::HeartbeatTick => {
                self.heartbeat_tick().await;
            }
        }
    }

    fn view_of(&self, resource_code: &InlineStr) -> ResourceView {
        if self.mode != SessionMode::Active {
            // degraded sessions present everything as editable
            return ResourceView::Free;
        }
        if self.cache.is_owned(resource_code) {
            return ResourceView::LockedBySelf;
        }
        match self.cache.remote_holder(resource_code) {
            Some(owner) => ResourceView::LockedByOther(owner.clone()),
            None => ResourceView::Free,
        }
    }

    async fn enter_edit(&mut self, resource_code: InlineStr) {
        if self.cache.is_owned(&resource_code) {
            return;
        }

        let request = AcquireRequest {
            resource_code: resource_code.clone(),
            holder_id: self.identity.holder_id.clone(),
            display_name: self.identity.display_name.clone(),
        };
        match self.transport.acquire(request).await {
            Ok(reply) if reply.granted => {
                self.cache.set_owned(resource_code.clone());
                self.renew_failures = 0;
                self.start_heartbeat();
                self.notify(ReconcilerNotice::LockGranted { resource_code });
            }
            Ok(reply) => match reply.owner {
                Some(owner) => {
                    info!(
                        "lock denied, code: {}, held by: {}",
                        resource_code, owner.holder_display_name
                    );
                    self.cache.note_remote(resource_code.clone(), owner.clone());
                    self.notify(ReconcilerNotice::LockDenied {
                        resource_code,
                        owner,
                    });
                }
                None => self.degrade("denied acquire reply without an owner"),
            },
            Err(e) => {
                warn!("acquire failed, code: {}: {}", resource_code, e);
                self.degrade("acquire transport failure");
            }
        }
    }

    async fn leave_edit(&mut self, resource_code: InlineStr) {
        if !self.cache.is_owned(&resource_code) {
            debug!(
                "release requested for a resource not locally owned, code: {}",
                resource_code
            );
            return;
        }

        self.stop_heartbeat();
        let request = ReleaseRequest {
            resource_code: resource_code.clone(),
            holder_id: self.identity.holder_id.clone(),
        };
        match self.transport.release(request).await {
            Ok(_) => {
                self.cache.clear_owned();
                self.notify(ReconcilerNotice::LockReleased { resource_code });
            }
            Err(e) => {
                warn!("release failed, code: {}: {}", resource_code, e);
                self.degrade("release transport failure");
            }
        }
    }

    /// Best-effort teardown path. Local state is dropped immediately; if
    /// the detached send never arrives, the lease dies by TTL.
    fn teardown(&mut self, resource_code: InlineStr) {
        if !self.cache.is_owned(&resource_code) {
            return;
        }

        self.stop_heartbeat();
        self.cache.clear_owned();
        self.transport.release_detached(ReleaseRequest {
            resource_code: resource_code.clone(),
            holder_id: self.identity.holder_id.clone(),
        });
        self.notify(ReconcilerNotice::LockReleased { resource_code });
    }

    fn server_event(&mut self, event: LockEvent) {
        match self.cache.apply_event(&event) {
            CacheOutcome::OwnershipRevoked(resource_code) => {
                warn!(
                    "lock ownership revoked by coordinator event, code: {}",
                    resource_code
                );
                self.stop_heartbeat();
                self.notify(ReconcilerNotice::OwnershipLost { resource_code });
            }
            CacheOutcome::Updated => self.notify(ReconcilerNotice::CacheUpdated),
            CacheOutcome::Unchanged => {}
        }
    }

    async fn heartbeat_tick(&mut self) {
        // a tick that raced ownership loss refers to a lease we no longer
        // hold; ignore it
        let resource_code = match self.cache.owned() {
            Some(code) => code.clone(),
            None => return,
        };

        let request = RenewRequest {
            resource_code: resource_code.clone(),
            holder_id: self.identity.holder_id.clone(),
            timestamp: Utc::now().timestamp_millis(),
        };
        match self.transport.renew(request).await {
            Ok(reply) => match reply.status {
                RenewStatus::Renewed => {
                    self.renew_failures = 0;
                }
                RenewStatus::NotOwner | RenewStatus::NotFound => {
                    warn!(
                        "lease no longer ours on renewal ({}), code: {}",
                        reply.status.as_ref(),
                        resource_code
                    );
                    self.drop_ownership(resource_code);
                }
            },
            Err(e) => {
                self.renew_failures += 1;
                warn!(
                    "heartbeat renewal failed ({} of {}), code: {}: {}",
                    self.renew_failures,
                    self.properties.renew_failure_threshold,
                    resource_code,
                    e
                );
                if self.renew_failures >= self.properties.renew_failure_threshold {
                    self.drop_ownership(resource_code);
                }
            }
        }
    }

    fn drop_ownership(&mut self, resource_code: InlineStr) {
        self.stop_heartbeat();
        self.cache.clear_owned();
        self.notify(ReconcilerNotice::OwnershipLost { resource_code });
    }

    /// Degraded mode: all resources become editable from this client's
    /// perspective, the cache is cleared, and no further lock calls are
    /// attempted for the rest of the session.
    fn degrade(&mut self, reason: &str) {
        if self.mode == SessionMode::Degraded {
            return;
        }
        warn!("lock coordination degraded ({}), editing proceeds unguarded", reason);
        self.mode = SessionMode::Degraded;
        self.stop_heartbeat();
        self.cache.clear();
        self.notify(ReconcilerNotice::SessionDegraded);
    }

    fn start_heartbeat(&mut self) {
        self.stop_heartbeat();
        let interval = Duration::from_millis(self.properties.heartbeat_interval_ms as u64);
        let inputs = self.inputs.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // the first tick of a tokio interval fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if inputs.send(ReconcileInput::HeartbeatTick).await.is_err() {
                    break;
                }
            }
        });
        self.heartbeat = Some(HeartbeatGuard { task });
    }

    fn stop_heartbeat(&mut self) {
        self.heartbeat = None;
    }

    fn notify(&self, notice: ReconcilerNotice) {
        if self.notices.send(notice).is_err() {
            debug!("no notice consumer attached");
        }
    }
}
