//! Pure projection from [`Session`] to what the rendering layer draws.
//!
//! Deterministic and side-effect free so it can be unit-tested without
//! driving events through the controller. Exactly one root surface is
//! produced, with precedence splash > onboarding/editing > main screen >
//! home tab; modals and the notice banner overlay whatever root wins.

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{
    domain::{ChatId, ChatThread, HomeTab, MatchPreference, PartnerProfile, Profile},
    error::Notice,
};

use crate::session::{LifecyclePhase, MainScreen, Session};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatPreview {
    pub chat_id: ChatId,
    pub partner_name: String,
    pub last_message: Option<String>,
    pub last_activity: Option<DateTime<Utc>>,
    pub unread: u32,
}

/// One tab of the home screen. The `Match` and `Profile` variants own the
/// profile they display, so they cannot be produced for a profileless
/// session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tab", rename_all = "snake_case")]
pub enum TabView {
    Home {
        match_preference: MatchPreference,
        searching: bool,
    },
    Match {
        profile: Profile,
        searching: bool,
    },
    Coins {
        balance: u32,
    },
    ChatList {
        previews: Vec<ChatPreview>,
    },
    Profile {
        profile: Profile,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "surface", rename_all = "snake_case")]
pub enum RootSurface {
    Splash,
    Onboarding {
        /// Pre-filled fields when re-entered through the profile editor.
        initial: Option<Profile>,
        editing: bool,
    },
    Call {
        partner: PartnerProfile,
    },
    PostCall {
        partner: PartnerProfile,
    },
    ChatDetail {
        chat_id: ChatId,
        thread: ChatThread,
    },
    Home {
        tab: TabView,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewModel {
    pub root: RootSurface,
    pub premium_modal: bool,
    pub coin_modal: bool,
    pub is_premium: bool,
    pub coin_balance: u32,
    pub match_pending: bool,
    pub notice: Option<Notice>,
}

pub fn derive_view(session: &Session) -> ViewModel {
    ViewModel {
        root: root_surface(session),
        premium_modal: session.show_premium_modal,
        coin_modal: session.show_coin_modal,
        is_premium: session.is_premium,
        coin_balance: session.coin_balance,
        match_pending: session.pending_match.is_some(),
        notice: session.notice.clone(),
    }
}

fn root_surface(session: &Session) -> RootSurface {
    if session.lifecycle_phase == LifecyclePhase::Splash {
        return RootSurface::Splash;
    }
    if session.lifecycle_phase == LifecyclePhase::Onboarding || session.is_editing_profile {
        return RootSurface::Onboarding {
            initial: if session.is_editing_profile {
                session.profile.clone()
            } else {
                None
            },
            editing: session.is_editing_profile,
        };
    }

    match session.main_screen {
        MainScreen::Call => match session.call_partner.clone() {
            Some(partner) => RootSurface::Call { partner },
            None => home_surface(session),
        },
        MainScreen::PostCall => match session.call_partner.clone() {
            Some(partner) => RootSurface::PostCall { partner },
            None => home_surface(session),
        },
        MainScreen::ChatDetail => {
            let resolved = session
                .active_chat_id
                .and_then(|id| session.chats.get(&id).map(|thread| (id, thread.clone())));
            match resolved {
                Some((chat_id, thread)) => RootSurface::ChatDetail { chat_id, thread },
                None => home_surface(session),
            }
        }
        MainScreen::Home => home_surface(session),
    }
}

fn home_surface(session: &Session) -> RootSurface {
    RootSurface::Home {
        tab: tab_view(session),
    }
}

fn tab_view(session: &Session) -> TabView {
    let searching = session.pending_match.is_some();
    match session.active_tab {
        HomeTab::Home => home_tab(session, searching),
        HomeTab::Match => match session.profile.clone() {
            Some(profile) => TabView::Match { profile, searching },
            None => home_tab(session, searching),
        },
        HomeTab::Coins => TabView::Coins {
            balance: session.coin_balance,
        },
        HomeTab::Chat => TabView::ChatList {
            previews: chat_previews(session),
        },
        HomeTab::Profile => match session.profile.clone() {
            Some(profile) => TabView::Profile { profile },
            None => home_tab(session, searching),
        },
    }
}

fn home_tab(session: &Session, searching: bool) -> TabView {
    TabView::Home {
        match_preference: session
            .profile
            .as_ref()
            .map(|profile| profile.match_preference)
            .unwrap_or_default(),
        searching,
    }
}

/// Thread previews for the chat list, most recently active first; threads
/// with no messages yet sort last, keeping the map's id order among
/// themselves.
fn chat_previews(session: &Session) -> Vec<ChatPreview> {
    let mut previews: Vec<ChatPreview> = session
        .chats
        .iter()
        .map(|(chat_id, thread)| ChatPreview {
            chat_id: *chat_id,
            partner_name: thread.partner_name.clone(),
            last_message: thread.last_message().map(|message| message.text.clone()),
            last_activity: thread.last_message().map(|message| message.sent_at),
            unread: thread.unread,
        })
        .collect();
    previews.sort_by(|a, b| match (b.last_activity, a.last_activity) {
        (Some(newer), Some(older)) => newer.cmp(&older),
        (Some(_), None) => std::cmp::Ordering::Greater,
        (None, Some(_)) => std::cmp::Ordering::Less,
        (None, None) => a.chat_id.cmp(&b.chat_id),
    });
    previews
}
