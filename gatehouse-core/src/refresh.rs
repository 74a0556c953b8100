//! Single-flight credential renewal.
//!
//! Many requests can fail with an expired credential at the same moment. The
//! [`RefreshCoordinator`] collapses their renewal requests into one boundary
//! call: the first caller leads the renewal, every later caller enqueues a
//! waiter on the [`RefreshTicket`], and all of them observe the same outcome.
//!
//! The ticket lock is a plain mutex that is never held across an await, so
//! contention is resolved by queuing rather than by blocking.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::boundary::{AuthBoundary, AuthError};
use crate::context::{SessionContext, Teardown};

/// Why a renewal did not produce a usable credential.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailed {
    /// The boundary rejected the renewal or could not be reached.
    #[error("credential renewal failed: {0}")]
    Rejected(AuthError),

    /// A logout or login happened while the renewal was in flight; its
    /// result was discarded.
    #[error("credential renewal superseded by a newer session transition")]
    Superseded,

    /// The leading caller was dropped before the renewal completed.
    #[error("credential renewal abandoned before completion")]
    Abandoned,
}

/// Lifecycle of the renewal ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TicketState {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    Failed,
}

type Outcome = Result<(), RefreshFailed>;

/// The one renewal attempt that may be in flight.
#[derive(Debug, Default)]
struct RefreshTicket {
    state: TicketState,
    waiters: VecDeque<oneshot::Sender<Outcome>>,
}

/// Renews the access credential with single-flight semantics.
///
/// Cloning shares the ticket.
#[derive(Clone)]
pub struct RefreshCoordinator {
    boundary: Arc<dyn AuthBoundary>,
    context: SessionContext,
    ticket: Arc<Mutex<RefreshTicket>>,
}

impl RefreshCoordinator {
    pub fn new(boundary: Arc<dyn AuthBoundary>, context: SessionContext) -> Self {
        Self {
            boundary,
            context,
            ticket: Arc::new(Mutex::new(RefreshTicket::default())),
        }
    }

    pub fn state(&self) -> TicketState {
        self.ticket.lock().state
    }

    /// Number of callers waiting on the in-flight renewal.
    pub fn waiting(&self) -> usize {
        self.ticket.lock().waiters.len()
    }

    /// Renew the credential, or join the renewal already in flight.
    ///
    /// On success the new credential (if the boundary returned one) is in the
    /// credential store. On failure the session has been torn down to
    /// `Unauthenticated` and `RefreshFailed` has been emitted.
    pub async fn refresh(&self) -> Result<(), RefreshFailed> {
        let waiter = {
            let mut ticket = self.ticket.lock();
            if ticket.state == TicketState::InFlight {
                let (tx, rx) = oneshot::channel();
                ticket.waiters.push_back(tx);
                debug!(waiters = ticket.waiters.len(), "joined in-flight credential renewal");
                Some(rx)
            } else {
                ticket.state = TicketState::InFlight;
                None
            }
        };

        match waiter {
            Some(rx) => rx.await.unwrap_or(Err(RefreshFailed::Abandoned)),
            None => self.lead().await,
        }
    }

    async fn lead(&self) -> Outcome {
        let mut flight = Flight {
            ticket: &self.ticket,
            settled: false,
        };
        let generation = self.context.generation();

        info!("renewing session credential");
        let outcome = match self.boundary.refresh().await {
            Ok(grant) => {
                if self.context.refreshed(generation, grant.credential) {
                    info!("session credential renewed");
                    Ok(())
                } else {
                    debug!("renewal finished after the session changed, result discarded");
                    Err(RefreshFailed::Superseded)
                }
            }
            Err(e) => {
                error!(error = %e, "credential renewal failed");
                if self.context.teardown(Teardown::Expired, Some(generation)).await {
                    // A rejected refresh credential is dead; an unreachable server is not.
                    if e.is_authorization_failure() {
                        self.boundary.forget();
                    }
                    Err(RefreshFailed::Rejected(e))
                } else {
                    Err(RefreshFailed::Superseded)
                }
            }
        };

        flight.settle(&outcome);
        outcome
    }

    /// Release any waiters as superseded and return the ticket to `Idle`.
    /// Intended for tests.
    pub fn reset(&self) {
        let waiters = {
            let mut ticket = self.ticket.lock();
            ticket.state = TicketState::Idle;
            std::mem::take(&mut ticket.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(Err(RefreshFailed::Superseded));
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ticket = self.ticket.lock();
        f.debug_struct("RefreshCoordinator")
            .field("state", &ticket.state)
            .field("waiters", &ticket.waiters.len())
            .finish()
    }
}

/// Resolves the ticket exactly once, even if the leader is dropped.
struct Flight<'a> {
    ticket: &'a Mutex<RefreshTicket>,
    settled: bool,
}

impl Flight<'_> {
    fn settle(&mut self, outcome: &Outcome) {
        self.settled = true;

        let waiters = {
            let mut ticket = self.ticket.lock();
            ticket.state = if outcome.is_ok() {
                TicketState::Succeeded
            } else {
                TicketState::Failed
            };
            std::mem::take(&mut ticket.waiters)
        };

        // Enqueue order, identical outcome for everyone.
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }

        self.ticket.lock().state = TicketState::Idle;
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.settle(&Err(RefreshFailed::Abandoned));
        }
    }
}
