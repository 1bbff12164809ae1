//! Session state and its transitions.
//!
//! The whole navigation state of the app lives in one [`Session`] value.
//! Every transition is a named pure function reached through
//! [`Session::apply`]; no other code mutates session fields. An applied
//! event may additionally yield an [`Effect`] for the controller to run
//! against a backend service, whose result comes back as a later
//! completion event carrying the ticket captured when the call was armed.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use shared::{
    domain::{
        ChatId, ChatThread, CoinPack, HomeTab, MatchPreference, Message, PartnerProfile,
        PremiumPlan, Profile, ProfileDraft, Sender,
    },
    error::{Notice, SessionError},
};

pub const INITIAL_COIN_BALANCE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    Splash,
    Onboarding,
    Main,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MainScreen {
    Home,
    Call,
    PostCall,
    ChatDetail,
}

/// Generation stamp for an in-flight service call. Completion events carry
/// the ticket they were armed with; a mismatch means the request was
/// superseded or cancelled and the result is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ticket(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseKind {
    Coins(CoinPack),
    Premium(PremiumPlan),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPurchase {
    pub ticket: Ticket,
    pub kind: PurchaseKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SplashFinished,
    OnboardingCompleted { draft: ProfileDraft },
    RequestEditProfile,
    StartMatch,
    CancelMatch,
    MatchFound { ticket: Ticket, partner: PartnerProfile },
    MatchFailed { ticket: Ticket, reason: String },
    EndCall,
    AcceptPostCall,
    RejectPostCall,
    ReportPartner,
    BlockPartner,
    OpenChat { chat_id: ChatId },
    SendMessage { text: String },
    MessagePersistFailed { chat_id: ChatId, reason: String },
    CloseChatDetail,
    ChangeTab { tab: HomeTab },
    RequestPremiumUpgrade,
    ClosePremiumModal,
    SubscribePremium { plan: PremiumPlan },
    PremiumActivated { ticket: Ticket },
    RequestBuyCoins,
    CloseCoinModal,
    PurchaseCoins { pack: CoinPack },
    CoinsCredited { ticket: Ticket, new_balance: u32 },
    PurchaseFailed { ticket: Ticket, reason: String },
    ChangeMatchPreference { preference: MatchPreference },
    DismissNotice,
}

/// Work the controller must hand to a backend service after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    FindPartner { ticket: Ticket, preference: MatchPreference },
    BlockUser { username: String },
    PersistMessage { chat_id: ChatId, message: Message },
    PurchaseCoins { ticket: Ticket, pack: CoinPack },
    Subscribe { ticket: Ticket, plan: PremiumPlan },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Re-fired event whose transition already happened (idempotent).
    AlreadyDone,
    /// User action whose screen precondition no longer holds.
    WrongScreen,
    /// Service completion for a request that was superseded or cancelled.
    StaleCompletion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Applied,
    Ignored(IgnoreReason),
}

/// Result of applying one event: the next session, an optional effect, and
/// whether the event was applied or dropped.
#[derive(Debug, Clone)]
pub struct Step {
    pub session: Session,
    pub effect: Option<Effect>,
    pub outcome: Outcome,
}

impl Step {
    fn applied(session: Session) -> Self {
        Self {
            session,
            effect: None,
            outcome: Outcome::Applied,
        }
    }

    fn with_effect(session: Session, effect: Effect) -> Self {
        Self {
            session,
            effect: Some(effect),
            outcome: Outcome::Applied,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub lifecycle_phase: LifecyclePhase,
    pub profile: Option<Profile>,
    pub is_editing_profile: bool,
    pub main_screen: MainScreen,
    pub active_tab: HomeTab,
    pub is_premium: bool,
    pub coin_balance: u32,
    pub show_premium_modal: bool,
    pub show_coin_modal: bool,
    pub active_chat_id: Option<ChatId>,
    pub chats: BTreeMap<ChatId, ChatThread>,
    pub call_partner: Option<PartnerProfile>,
    pub pending_match: Option<Ticket>,
    pub pending_purchase: Option<PendingPurchase>,
    pub notice: Option<Notice>,
    next_ticket: u64,
    next_chat_id: i64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self::with_threads(BTreeMap::new())
    }

    /// A fresh session at the splash screen, seeded with previously stored
    /// chat threads.
    pub fn with_threads(chats: BTreeMap<ChatId, ChatThread>) -> Self {
        let next_chat_id = chats.keys().last().map(|id| id.0 + 1).unwrap_or(1);
        Self {
            lifecycle_phase: LifecyclePhase::Splash,
            profile: None,
            is_editing_profile: false,
            main_screen: MainScreen::Home,
            active_tab: HomeTab::Home,
            is_premium: false,
            coin_balance: INITIAL_COIN_BALANCE,
            show_premium_modal: false,
            show_coin_modal: false,
            active_chat_id: None,
            chats,
            call_partner: None,
            pending_match: None,
            pending_purchase: None,
            notice: None,
            next_ticket: 0,
            next_chat_id,
        }
    }

    /// Applies one event and returns the next session. Events are the only
    /// legal way to change session state.
    pub fn apply(&self, event: SessionEvent) -> Result<Step, SessionError> {
        match event {
            SessionEvent::SplashFinished => self.splash_finished(),
            SessionEvent::OnboardingCompleted { draft } => self.onboarding_completed(draft),
            SessionEvent::RequestEditProfile => self.request_edit_profile(),
            SessionEvent::StartMatch => self.start_match(),
            SessionEvent::CancelMatch => self.cancel_match(),
            SessionEvent::MatchFound { ticket, partner } => self.match_found(ticket, partner),
            SessionEvent::MatchFailed { ticket, reason } => self.match_failed(ticket, &reason),
            SessionEvent::EndCall => self.end_call(),
            SessionEvent::AcceptPostCall => self.accept_post_call(),
            SessionEvent::RejectPostCall => self.reject_post_call(),
            SessionEvent::ReportPartner => self.report_partner(),
            SessionEvent::BlockPartner => self.block_partner(),
            SessionEvent::OpenChat { chat_id } => self.open_chat(chat_id),
            SessionEvent::SendMessage { text } => self.send_message(&text),
            SessionEvent::MessagePersistFailed { chat_id, reason } => {
                self.message_persist_failed(chat_id, &reason)
            }
            SessionEvent::CloseChatDetail => self.close_chat_detail(),
            SessionEvent::ChangeTab { tab } => self.change_tab(tab),
            SessionEvent::RequestPremiumUpgrade => self.set_premium_modal(true),
            SessionEvent::ClosePremiumModal => self.set_premium_modal(false),
            SessionEvent::SubscribePremium { plan } => self.subscribe_premium(plan),
            SessionEvent::PremiumActivated { ticket } => self.premium_activated(ticket),
            SessionEvent::RequestBuyCoins => self.set_coin_modal(true),
            SessionEvent::CloseCoinModal => self.set_coin_modal(false),
            SessionEvent::PurchaseCoins { pack } => self.purchase_coins(pack),
            SessionEvent::CoinsCredited { ticket, new_balance } => {
                self.coins_credited(ticket, new_balance)
            }
            SessionEvent::PurchaseFailed { ticket, reason } => {
                self.purchase_failed(ticket, &reason)
            }
            SessionEvent::ChangeMatchPreference { preference } => {
                self.change_match_preference(preference)
            }
            SessionEvent::DismissNotice => self.dismiss_notice(),
        }
    }

    fn ignored(&self, reason: IgnoreReason) -> Step {
        Step {
            session: self.clone(),
            effect: None,
            outcome: Outcome::Ignored(reason),
        }
    }

    /// True once the main surface is interactive (not splash, not
    /// onboarding, not the profile editor overlay).
    fn in_main(&self) -> bool {
        self.lifecycle_phase == LifecyclePhase::Main && !self.is_editing_profile
    }

    fn on_home(&self) -> bool {
        self.in_main() && self.main_screen == MainScreen::Home
    }

    fn take_ticket(next: &mut Session) -> Ticket {
        next.next_ticket += 1;
        Ticket(next.next_ticket)
    }

    fn splash_finished(&self) -> Result<Step, SessionError> {
        if self.lifecycle_phase != LifecyclePhase::Splash {
            return Ok(self.ignored(IgnoreReason::AlreadyDone));
        }
        let mut next = self.clone();
        next.lifecycle_phase = LifecyclePhase::Onboarding;
        Ok(Step::applied(next))
    }

    fn onboarding_completed(&self, draft: ProfileDraft) -> Result<Step, SessionError> {
        let editing = self.is_editing_profile;
        if self.lifecycle_phase != LifecyclePhase::Onboarding && !editing {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        }
        let profile = draft.validate()?;
        let mut next = self.clone();
        next.profile = Some(profile);
        if editing {
            next.is_editing_profile = false;
        } else {
            next.lifecycle_phase = LifecyclePhase::Main;
            next.main_screen = MainScreen::Home;
            next.active_tab = HomeTab::Home;
        }
        Ok(Step::applied(next))
    }

    fn request_edit_profile(&self) -> Result<Step, SessionError> {
        if self.lifecycle_phase != LifecyclePhase::Main {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        }
        if self.is_editing_profile {
            return Ok(self.ignored(IgnoreReason::AlreadyDone));
        }
        let mut next = self.clone();
        next.is_editing_profile = true;
        // The editor replaces the home surface, so an in-flight match search
        // can no longer complete into it.
        next.pending_match = None;
        Ok(Step::applied(next))
    }

    fn start_match(&self) -> Result<Step, SessionError> {
        if !self.on_home() {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        }
        if self.pending_match.is_some() {
            return Ok(self.ignored(IgnoreReason::AlreadyDone));
        }
        let preference = self
            .profile
            .as_ref()
            .map(|profile| profile.match_preference)
            .unwrap_or_default();
        let mut next = self.clone();
        let ticket = Self::take_ticket(&mut next);
        next.pending_match = Some(ticket);
        Ok(Step::with_effect(
            next,
            Effect::FindPartner { ticket, preference },
        ))
    }

    fn cancel_match(&self) -> Result<Step, SessionError> {
        if self.pending_match.is_none() {
            return Ok(self.ignored(IgnoreReason::AlreadyDone));
        }
        let mut next = self.clone();
        next.pending_match = None;
        Ok(Step::applied(next))
    }

    fn match_found(&self, ticket: Ticket, partner: PartnerProfile) -> Result<Step, SessionError> {
        if self.pending_match != Some(ticket) || !self.on_home() {
            return Ok(self.ignored(IgnoreReason::StaleCompletion));
        }
        let mut next = self.clone();
        next.pending_match = None;
        next.call_partner = Some(partner);
        next.main_screen = MainScreen::Call;
        Ok(Step::applied(next))
    }

    fn match_failed(&self, ticket: Ticket, reason: &str) -> Result<Step, SessionError> {
        if self.pending_match != Some(ticket) {
            return Ok(self.ignored(IgnoreReason::StaleCompletion));
        }
        let mut next = self.clone();
        next.pending_match = None;
        next.notice = Some(Notice::service_failure(format!(
            "could not find a partner: {reason}"
        )));
        Ok(Step::applied(next))
    }

    fn end_call(&self) -> Result<Step, SessionError> {
        if !self.in_main() || self.main_screen != MainScreen::Call {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        }
        let mut next = self.clone();
        next.main_screen = MainScreen::PostCall;
        Ok(Step::applied(next))
    }

    fn accept_post_call(&self) -> Result<Step, SessionError> {
        if !self.in_main() || self.main_screen != MainScreen::PostCall {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        }
        let Some(partner) = self.call_partner.clone() else {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        };
        let mut next = self.clone();
        let already_paired = next
            .chats
            .values()
            .any(|thread| thread.partner_name == partner.username);
        if !already_paired {
            let chat_id = ChatId(next.next_chat_id);
            next.next_chat_id += 1;
            next.chats
                .insert(chat_id, ChatThread::new(partner.username.clone()));
        }
        next.call_partner = None;
        next.main_screen = MainScreen::Home;
        next.active_tab = HomeTab::Chat;
        Ok(Step::applied(next))
    }

    fn reject_post_call(&self) -> Result<Step, SessionError> {
        if !self.in_main() || self.main_screen != MainScreen::PostCall {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        }
        let mut next = self.clone();
        next.call_partner = None;
        next.main_screen = MainScreen::Home;
        // Returning to home always assigns the tab; here it is restored to
        // whatever was selected before the call.
        next.active_tab = self.active_tab;
        Ok(Step::applied(next))
    }

    fn report_partner(&self) -> Result<Step, SessionError> {
        if !self.in_call_flow() {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        }
        let mut next = self.clone();
        next.notice = Some(Notice::info(
            "report submitted, thanks for keeping the community safe",
        ));
        Ok(Step::applied(next))
    }

    fn block_partner(&self) -> Result<Step, SessionError> {
        if !self.in_call_flow() {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        }
        let Some(partner) = self.call_partner.as_ref() else {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        };
        let username = partner.username.clone();
        let mut next = self.clone();
        next.notice = Some(Notice::info(format!(
            "{username} blocked, you won't be matched again"
        )));
        Ok(Step::with_effect(next, Effect::BlockUser { username }))
    }

    fn in_call_flow(&self) -> bool {
        self.in_main()
            && matches!(self.main_screen, MainScreen::Call | MainScreen::PostCall)
    }

    fn open_chat(&self, chat_id: ChatId) -> Result<Step, SessionError> {
        if !self.on_home() {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        }
        if !self.chats.contains_key(&chat_id) {
            return Err(SessionError::ChatNotFound(chat_id));
        }
        let mut next = self.clone();
        next.main_screen = MainScreen::ChatDetail;
        next.active_chat_id = Some(chat_id);
        // Opening the thread counts as reading it.
        if let Some(thread) = next.chats.get_mut(&chat_id) {
            thread.unread = 0;
        }
        // The chat detail surface replaces home; an in-flight match search
        // must not complete underneath it.
        next.pending_match = None;
        Ok(Step::applied(next))
    }

    fn send_message(&self, text: &str) -> Result<Step, SessionError> {
        if !self.in_main() || self.main_screen != MainScreen::ChatDetail {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        }
        if text.trim().is_empty() {
            return Err(SessionError::Validation(
                "message text must not be empty".into(),
            ));
        }
        let Some(chat_id) = self.active_chat_id else {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        };
        let mut next = self.clone();
        let Some(thread) = next.chats.get_mut(&chat_id) else {
            return Err(SessionError::ChatNotFound(chat_id));
        };
        let message = Message {
            id: thread.next_message_id(),
            sender: Sender::Me,
            text: text.to_string(),
            sent_at: Utc::now(),
        };
        thread.messages.push(message.clone());
        Ok(Step::with_effect(
            next,
            Effect::PersistMessage { chat_id, message },
        ))
    }

    fn message_persist_failed(&self, chat_id: ChatId, reason: &str) -> Result<Step, SessionError> {
        let mut next = self.clone();
        next.notice = Some(Notice::service_failure(format!(
            "message in chat {} was not saved: {reason}",
            chat_id.0
        )));
        Ok(Step::applied(next))
    }

    fn close_chat_detail(&self) -> Result<Step, SessionError> {
        if !self.in_main() || self.main_screen != MainScreen::ChatDetail {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        }
        let mut next = self.clone();
        next.main_screen = MainScreen::Home;
        next.active_tab = HomeTab::Chat;
        next.active_chat_id = None;
        Ok(Step::applied(next))
    }

    fn change_tab(&self, tab: HomeTab) -> Result<Step, SessionError> {
        if !self.on_home() {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        }
        if matches!(tab, HomeTab::Match | HomeTab::Profile) && self.profile.is_none() {
            return Err(SessionError::Validation(
                "complete your profile before opening this tab".into(),
            ));
        }
        let mut next = self.clone();
        next.active_tab = tab;
        Ok(Step::applied(next))
    }

    fn set_premium_modal(&self, open: bool) -> Result<Step, SessionError> {
        let mut next = self.clone();
        next.show_premium_modal = open;
        if !open {
            // Closing the modal abandons an unsettled subscription; a late
            // settlement will no longer find its ticket armed.
            if let Some(pending) = next.pending_purchase {
                if matches!(pending.kind, PurchaseKind::Premium(_)) {
                    next.pending_purchase = None;
                }
            }
        }
        Ok(Step::applied(next))
    }

    fn set_coin_modal(&self, open: bool) -> Result<Step, SessionError> {
        let mut next = self.clone();
        next.show_coin_modal = open;
        if !open {
            if let Some(pending) = next.pending_purchase {
                if matches!(pending.kind, PurchaseKind::Coins(_)) {
                    next.pending_purchase = None;
                }
            }
        }
        Ok(Step::applied(next))
    }

    fn subscribe_premium(&self, plan: PremiumPlan) -> Result<Step, SessionError> {
        if !self.show_premium_modal {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        }
        if self.pending_purchase.is_some() {
            return Ok(self.ignored(IgnoreReason::AlreadyDone));
        }
        let mut next = self.clone();
        let ticket = Self::take_ticket(&mut next);
        next.pending_purchase = Some(PendingPurchase {
            ticket,
            kind: PurchaseKind::Premium(plan),
        });
        Ok(Step::with_effect(next, Effect::Subscribe { ticket, plan }))
    }

    fn premium_activated(&self, ticket: Ticket) -> Result<Step, SessionError> {
        let armed = matches!(
            self.pending_purchase,
            Some(PendingPurchase {
                ticket: armed_ticket,
                kind: PurchaseKind::Premium(_),
            }) if armed_ticket == ticket
        );
        if !armed {
            return Ok(self.ignored(IgnoreReason::StaleCompletion));
        }
        let mut next = self.clone();
        next.is_premium = true;
        next.show_premium_modal = false;
        next.pending_purchase = None;
        Ok(Step::applied(next))
    }

    fn purchase_coins(&self, pack: CoinPack) -> Result<Step, SessionError> {
        if !self.show_coin_modal {
            return Ok(self.ignored(IgnoreReason::WrongScreen));
        }
        if self.pending_purchase.is_some() {
            return Ok(self.ignored(IgnoreReason::AlreadyDone));
        }
        let mut next = self.clone();
        let ticket = Self::take_ticket(&mut next);
        next.pending_purchase = Some(PendingPurchase {
            ticket,
            kind: PurchaseKind::Coins(pack),
        });
        Ok(Step::with_effect(
            next,
            Effect::PurchaseCoins { ticket, pack },
        ))
    }

    fn coins_credited(&self, ticket: Ticket, new_balance: u32) -> Result<Step, SessionError> {
        let armed = matches!(
            self.pending_purchase,
            Some(PendingPurchase {
                ticket: armed_ticket,
                kind: PurchaseKind::Coins(_),
            }) if armed_ticket == ticket
        );
        if !armed {
            return Ok(self.ignored(IgnoreReason::StaleCompletion));
        }
        let mut next = self.clone();
        next.coin_balance = new_balance;
        next.show_coin_modal = false;
        next.pending_purchase = None;
        Ok(Step::applied(next))
    }

    fn purchase_failed(&self, ticket: Ticket, reason: &str) -> Result<Step, SessionError> {
        let armed = self
            .pending_purchase
            .is_some_and(|pending| pending.ticket == ticket);
        if !armed {
            return Ok(self.ignored(IgnoreReason::StaleCompletion));
        }
        let mut next = self.clone();
        next.pending_purchase = None;
        // The modal stays open so the purchase can be retried.
        next.notice = Some(Notice::service_failure(format!(
            "purchase failed: {reason}"
        )));
        Ok(Step::applied(next))
    }

    fn change_match_preference(&self, preference: MatchPreference) -> Result<Step, SessionError> {
        let Some(profile) = self.profile.as_ref() else {
            return Err(SessionError::Validation(
                "no profile to update".into(),
            ));
        };
        let mut updated = profile.clone();
        updated.match_preference = preference;
        let mut next = self.clone();
        next.profile = Some(updated);
        Ok(Step::applied(next))
    }

    fn dismiss_notice(&self) -> Result<Step, SessionError> {
        if self.notice.is_none() {
            return Ok(self.ignored(IgnoreReason::AlreadyDone));
        }
        let mut next = self.clone();
        next.notice = None;
        Ok(Step::applied(next))
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
