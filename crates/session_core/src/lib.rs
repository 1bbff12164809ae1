//! Session controller for the video-chat app: owns the session state,
//! serializes events, runs service effects, and fans out view updates.

use std::{collections::BTreeMap, sync::Arc};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use shared::{
    domain::{ChatId, ChatThread, CoinPack, MatchPreference, Message, PartnerProfile, PremiumPlan},
    error::SessionError,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

pub mod mock;
pub mod projection;
pub mod session;

pub use projection::{derive_view, ChatPreview, RootSurface, TabView, ViewModel};
pub use session::{
    Effect, IgnoreReason, LifecyclePhase, MainScreen, Outcome, PendingPurchase, PurchaseKind,
    Session, SessionEvent, Step, Ticket,
};

/// Matchmaking backend: pairs the user with a partner for a video call.
#[async_trait]
pub trait Matchmaking: Send + Sync {
    async fn find_partner(&self, preference: MatchPreference) -> Result<PartnerProfile>;
    async fn block_user(&self, username: &str) -> Result<()>;
}

pub struct MissingMatchmaking;

#[async_trait]
impl Matchmaking for MissingMatchmaking {
    async fn find_partner(&self, _preference: MatchPreference) -> Result<PartnerProfile> {
        Err(anyhow!("matchmaking service is unavailable"))
    }

    async fn block_user(&self, username: &str) -> Result<()> {
        Err(anyhow!("matchmaking service is unavailable for blocking {username}"))
    }
}

/// Payment backend for coin packs and premium subscriptions.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges the pack and returns the new coin balance.
    async fn purchase_coins(&self, pack: CoinPack) -> Result<u32>;
    async fn subscribe(&self, plan: PremiumPlan) -> Result<()>;
}

pub struct MissingPaymentGateway;

#[async_trait]
impl PaymentGateway for MissingPaymentGateway {
    async fn purchase_coins(&self, _pack: CoinPack) -> Result<u32> {
        Err(anyhow!("payment gateway is unavailable"))
    }

    async fn subscribe(&self, _plan: PremiumPlan) -> Result<()> {
        Err(anyhow!("payment gateway is unavailable"))
    }
}

/// Chat persistence. The session's local thread map is authoritative while
/// the app runs; the store seeds it at startup and mirrors appends.
#[async_trait]
pub trait ChatStore: Send + Sync {
    async fn load_threads(&self) -> Result<BTreeMap<ChatId, ChatThread>>;
    async fn append_message(&self, chat_id: ChatId, message: &Message) -> Result<()>;
}

pub struct MissingChatStore;

#[async_trait]
impl ChatStore for MissingChatStore {
    async fn load_threads(&self) -> Result<BTreeMap<ChatId, ChatThread>> {
        Err(anyhow!("chat store is unavailable"))
    }

    async fn append_message(&self, chat_id: ChatId, _message: &Message) -> Result<()> {
        Err(anyhow!("chat store is unavailable for chat {}", chat_id.0))
    }
}

/// Phone-verification backend used by the onboarding flow before
/// [`SessionEvent::OnboardingCompleted`] is dispatched.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn send_otp(&self, phone: &str) -> Result<()>;
    async fn verify_otp(&self, phone: &str, code: &str) -> Result<()>;
}

pub struct MissingAuthGateway;

#[async_trait]
impl AuthGateway for MissingAuthGateway {
    async fn send_otp(&self, _phone: &str) -> Result<()> {
        Err(anyhow!("auth gateway is unavailable"))
    }

    async fn verify_otp(&self, _phone: &str, _code: &str) -> Result<()> {
        Err(anyhow!("auth gateway is unavailable"))
    }
}

/// Keeps the digits of `raw` and accepts exactly ten of them.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    (digits.len() == 10).then_some(digits)
}

pub fn is_valid_otp(code: &str) -> bool {
    code.len() == 6 && code.chars().all(|c| c.is_ascii_digit())
}

#[derive(Debug, Clone)]
pub enum ControllerUpdate {
    ViewChanged(ViewModel),
}

/// Owns the [`Session`] and is the single place transitions happen.
///
/// Events are applied one at a time under the state mutex. Effects run as
/// spawned tasks and re-enter through [`SessionController::dispatch`] as
/// completion events, so a result that arrives after the user navigated
/// away simply fails its ticket guard and is dropped.
pub struct SessionController {
    state: Mutex<Session>,
    matchmaking: Arc<dyn Matchmaking>,
    payments: Arc<dyn PaymentGateway>,
    chat_store: Arc<dyn ChatStore>,
    updates: broadcast::Sender<ControllerUpdate>,
}

impl SessionController {
    /// Controller with no backends attached; every service effect fails
    /// with a retryable notice.
    pub fn detached() -> Arc<Self> {
        Self::with_session(
            Session::new(),
            Arc::new(MissingMatchmaking),
            Arc::new(MissingPaymentGateway),
            Arc::new(MissingChatStore),
        )
    }

    /// Seeds the session from the chat store and wires the backends. A
    /// store failure is downgraded to an empty thread list so the app still
    /// starts.
    pub async fn start(
        matchmaking: Arc<dyn Matchmaking>,
        payments: Arc<dyn PaymentGateway>,
        chat_store: Arc<dyn ChatStore>,
    ) -> Arc<Self> {
        let threads = match chat_store.load_threads().await {
            Ok(threads) => threads,
            Err(err) => {
                warn!("chat store unavailable, starting without threads: {err}");
                BTreeMap::new()
            }
        };
        Self::with_session(
            Session::with_threads(threads),
            matchmaking,
            payments,
            chat_store,
        )
    }

    fn with_session(
        session: Session,
        matchmaking: Arc<dyn Matchmaking>,
        payments: Arc<dyn PaymentGateway>,
        chat_store: Arc<dyn ChatStore>,
    ) -> Arc<Self> {
        let (updates, _) = broadcast::channel(64);
        Arc::new(Self {
            state: Mutex::new(session),
            matchmaking,
            payments,
            chat_store,
            updates,
        })
    }

    /// Applies one event. `Err` means the event was rejected synchronously
    /// and the session is unchanged; ignored events (stale completions,
    /// idempotent re-fires) return `Ok` without a view update.
    pub async fn dispatch(self: &Arc<Self>, event: SessionEvent) -> Result<(), SessionError> {
        let step = {
            let mut state = self.state.lock().await;
            let step = state.apply(event)?;
            *state = step.session.clone();
            step
        };

        match step.outcome {
            Outcome::Applied => {
                let _ = self
                    .updates
                    .send(ControllerUpdate::ViewChanged(derive_view(&step.session)));
            }
            Outcome::Ignored(reason) => {
                debug!(?reason, "event ignored");
            }
        }

        if let Some(effect) = step.effect {
            self.spawn_effect(effect);
        }
        Ok(())
    }

    pub async fn view(&self) -> ViewModel {
        derive_view(&*self.state.lock().await)
    }

    pub async fn snapshot(&self) -> Session {
        self.state.lock().await.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ControllerUpdate> {
        self.updates.subscribe()
    }

    fn spawn_effect(self: &Arc<Self>, effect: Effect) {
        let controller = Arc::clone(self);
        tokio::spawn(async move {
            controller.run_effect(effect).await;
        });
    }

    async fn run_effect(self: &Arc<Self>, effect: Effect) {
        let completion = match effect {
            Effect::FindPartner { ticket, preference } => {
                match self.matchmaking.find_partner(preference).await {
                    Ok(partner) => Some(SessionEvent::MatchFound { ticket, partner }),
                    Err(err) => {
                        warn!("matchmaking failed: {err}");
                        Some(SessionEvent::MatchFailed {
                            ticket,
                            reason: err.to_string(),
                        })
                    }
                }
            }
            Effect::BlockUser { username } => {
                if let Err(err) = self.matchmaking.block_user(&username).await {
                    warn!(username, "block request failed: {err}");
                }
                None
            }
            Effect::PersistMessage { chat_id, message } => {
                match self.chat_store.append_message(chat_id, &message).await {
                    Ok(()) => None,
                    Err(err) => {
                        warn!(chat_id = chat_id.0, "message mirror failed: {err}");
                        Some(SessionEvent::MessagePersistFailed {
                            chat_id,
                            reason: err.to_string(),
                        })
                    }
                }
            }
            Effect::PurchaseCoins { ticket, pack } => {
                match self.payments.purchase_coins(pack).await {
                    Ok(new_balance) => Some(SessionEvent::CoinsCredited { ticket, new_balance }),
                    Err(err) => {
                        warn!(?pack, "coin purchase failed: {err}");
                        Some(SessionEvent::PurchaseFailed {
                            ticket,
                            reason: err.to_string(),
                        })
                    }
                }
            }
            Effect::Subscribe { ticket, plan } => match self.payments.subscribe(plan).await {
                Ok(()) => Some(SessionEvent::PremiumActivated { ticket }),
                Err(err) => {
                    warn!(?plan, "subscription failed: {err}");
                    Some(SessionEvent::PurchaseFailed {
                        ticket,
                        reason: err.to_string(),
                    })
                }
            },
        };

        if let Some(event) = completion {
            // Completion events only carry tickets and service payloads;
            // they never fail validation.
            if let Err(err) = self.dispatch(event).await {
                warn!("completion event rejected: {err}");
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
