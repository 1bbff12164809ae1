use super::*;
use crate::mock::{fixture_partner, seeded_threads};
use shared::domain::{ChatId, CoinPack, HomeTab, MatchPreference, PremiumPlan, ProfileDraft};
use shared::error::NoticeKind;

fn draft(username: &str) -> ProfileDraft {
    ProfileDraft {
        username: username.to_string(),
        bio: "hi".into(),
        interests: vec!["music".into()],
        ..ProfileDraft::default()
    }
}

fn apply_ok(session: &Session, event: SessionEvent) -> Step {
    session.apply(event).expect("event should apply")
}

/// Splash → onboarding → main with seeded chat threads.
fn onboarded() -> Session {
    let session = Session::with_threads(seeded_threads());
    let session = apply_ok(&session, SessionEvent::SplashFinished).session;
    apply_ok(
        &session,
        SessionEvent::OnboardingCompleted {
            draft: draft("Sam"),
        },
    )
    .session
}

fn ticket_of(step: &Step) -> Ticket {
    match step.effect {
        Some(Effect::FindPartner { ticket, .. })
        | Some(Effect::PurchaseCoins { ticket, .. })
        | Some(Effect::Subscribe { ticket, .. }) => ticket,
        ref other => panic!("expected a ticketed effect, got {other:?}"),
    }
}

/// Drives a session from home into an active call with the fixture partner.
fn in_call(session: &Session) -> Session {
    let step = apply_ok(session, SessionEvent::StartMatch);
    let ticket = ticket_of(&step);
    apply_ok(
        &step.session,
        SessionEvent::MatchFound {
            ticket,
            partner: fixture_partner(),
        },
    )
    .session
}

fn assert_invariants(session: &Session) {
    assert_eq!(
        session.active_chat_id.is_some(),
        session.main_screen == MainScreen::ChatDetail && session.lifecycle_phase == LifecyclePhase::Main,
        "active_chat_id must be set iff the chat detail screen is up"
    );
    if let Some(chat_id) = session.active_chat_id {
        assert!(
            session.chats.contains_key(&chat_id),
            "active chat must resolve"
        );
    }
    if matches!(session.main_screen, MainScreen::Call | MainScreen::PostCall)
        && session.lifecycle_phase == LifecyclePhase::Main
    {
        assert!(session.call_partner.is_some(), "call flow needs a partner");
    }
    if let Some(pending) = session.pending_purchase {
        match pending.kind {
            PurchaseKind::Coins(_) => assert!(session.show_coin_modal),
            PurchaseKind::Premium(_) => assert!(session.show_premium_modal),
        }
    }
}

#[test]
fn splash_finished_enters_onboarding() {
    let session = Session::new();
    let step = apply_ok(&session, SessionEvent::SplashFinished);
    assert_eq!(step.session.lifecycle_phase, LifecyclePhase::Onboarding);
    assert_eq!(step.outcome, Outcome::Applied);
}

#[test]
fn splash_finished_refire_is_a_noop() {
    let session = apply_ok(&Session::new(), SessionEvent::SplashFinished).session;
    let step = apply_ok(&session, SessionEvent::SplashFinished);
    assert_eq!(step.outcome, Outcome::Ignored(IgnoreReason::AlreadyDone));
    assert_eq!(step.session, session);

    let main = onboarded();
    let step = apply_ok(&main, SessionEvent::SplashFinished);
    assert_eq!(step.outcome, Outcome::Ignored(IgnoreReason::AlreadyDone));
    assert_eq!(step.session, main);
}

#[test]
fn completing_onboarding_lands_on_home() {
    let session = onboarded();
    assert_eq!(session.lifecycle_phase, LifecyclePhase::Main);
    assert_eq!(session.main_screen, MainScreen::Home);
    assert_eq!(session.active_tab, HomeTab::Home);
    assert_eq!(session.profile.as_ref().map(|p| p.username.as_str()), Some("Sam"));
}

#[test]
fn onboarding_rejects_invalid_profile() {
    let session = apply_ok(&Session::new(), SessionEvent::SplashFinished).session;
    let err = session
        .apply(SessionEvent::OnboardingCompleted {
            draft: ProfileDraft::default(),
        })
        .expect_err("blank username");
    assert!(matches!(err, shared::error::SessionError::Validation(_)));
    assert_eq!(session.lifecycle_phase, LifecyclePhase::Onboarding);
}

#[test]
fn editing_profile_returns_to_main() {
    let session = onboarded();
    let session = apply_ok(&session, SessionEvent::RequestEditProfile).session;
    assert!(session.is_editing_profile);

    let session = apply_ok(
        &session,
        SessionEvent::OnboardingCompleted {
            draft: draft("Samuel"),
        },
    )
    .session;
    assert!(!session.is_editing_profile);
    assert_eq!(session.lifecycle_phase, LifecyclePhase::Main);
    assert_eq!(session.main_screen, MainScreen::Home);
    assert_eq!(
        session.profile.as_ref().map(|p| p.username.as_str()),
        Some("Samuel")
    );
}

#[test]
fn match_flow_reaches_chat_with_partner_thread() {
    let session = in_call(&onboarded());
    assert_eq!(session.main_screen, MainScreen::Call);
    assert!(session.call_partner.is_some());
    assert!(session.pending_match.is_none());

    let session = apply_ok(&session, SessionEvent::EndCall).session;
    assert_eq!(session.main_screen, MainScreen::PostCall);

    let session = apply_ok(&session, SessionEvent::AcceptPostCall).session;
    assert_eq!(session.main_screen, MainScreen::Home);
    assert_eq!(session.active_tab, HomeTab::Chat);
    assert!(session.call_partner.is_none());
    assert!(session
        .chats
        .values()
        .any(|thread| thread.partner_name == fixture_partner().username));
    assert_invariants(&session);
}

#[test]
fn accepting_twice_reuses_the_partner_thread() {
    let session = in_call(&onboarded());
    let session = apply_ok(&session, SessionEvent::EndCall).session;
    let session = apply_ok(&session, SessionEvent::AcceptPostCall).session;
    let thread_count = session.chats.len();

    let session = apply_ok(&session, SessionEvent::ChangeTab { tab: HomeTab::Home }).session;
    let session = in_call(&session);
    let session = apply_ok(&session, SessionEvent::EndCall).session;
    let session = apply_ok(&session, SessionEvent::AcceptPostCall).session;
    assert_eq!(session.chats.len(), thread_count);
}

#[test]
fn rejecting_post_call_keeps_the_previous_tab() {
    let session = onboarded();
    let session = apply_ok(&session, SessionEvent::ChangeTab { tab: HomeTab::Coins }).session;
    let session = in_call(&session);
    let session = apply_ok(&session, SessionEvent::EndCall).session;
    let session = apply_ok(&session, SessionEvent::RejectPostCall).session;
    assert_eq!(session.main_screen, MainScreen::Home);
    assert_eq!(session.active_tab, HomeTab::Coins);
    assert!(session.call_partner.is_none());
}

#[test]
fn cancelled_search_drops_a_late_match() {
    let session = onboarded();
    let step = apply_ok(&session, SessionEvent::StartMatch);
    let ticket = ticket_of(&step);
    let session = apply_ok(&step.session, SessionEvent::CancelMatch).session;
    assert!(session.pending_match.is_none());

    let step = apply_ok(
        &session,
        SessionEvent::MatchFound {
            ticket,
            partner: fixture_partner(),
        },
    );
    assert_eq!(step.outcome, Outcome::Ignored(IgnoreReason::StaleCompletion));
    assert_eq!(step.session, session);
}

#[test]
fn opening_a_chat_disarms_the_search() {
    let session = onboarded();
    let step = apply_ok(&session, SessionEvent::StartMatch);
    let ticket = ticket_of(&step);
    let session = apply_ok(&step.session, SessionEvent::OpenChat { chat_id: ChatId(1) }).session;
    assert!(session.pending_match.is_none());

    let step = apply_ok(
        &session,
        SessionEvent::MatchFound {
            ticket,
            partner: fixture_partner(),
        },
    );
    assert_eq!(step.outcome, Outcome::Ignored(IgnoreReason::StaleCompletion));
    assert_eq!(step.session.main_screen, MainScreen::ChatDetail);
}

#[test]
fn failed_match_stays_home_with_retryable_notice() {
    let session = onboarded();
    let step = apply_ok(&session, SessionEvent::StartMatch);
    let ticket = ticket_of(&step);
    let session = apply_ok(
        &step.session,
        SessionEvent::MatchFailed {
            ticket,
            reason: "timeout".into(),
        },
    )
    .session;
    assert_eq!(session.main_screen, MainScreen::Home);
    assert!(session.pending_match.is_none());
    let notice = session.notice.as_ref().expect("notice surfaced");
    assert_eq!(notice.kind, NoticeKind::ServiceFailure);
    assert!(notice.retryable);
}

#[test]
fn empty_message_is_rejected() {
    let session = onboarded();
    let session = apply_ok(&session, SessionEvent::OpenChat { chat_id: ChatId(1) }).session;
    let before = session.chats[&ChatId(1)].messages.len();

    let err = session
        .apply(SessionEvent::SendMessage { text: "   ".into() })
        .expect_err("whitespace only");
    assert!(matches!(err, shared::error::SessionError::Validation(_)));
    assert_eq!(session.chats[&ChatId(1)].messages.len(), before);
}

#[test]
fn sending_a_message_appends_and_mirrors() {
    let session = onboarded();
    let session = apply_ok(&session, SessionEvent::OpenChat { chat_id: ChatId(1) }).session;
    let before = session.chats[&ChatId(1)].messages.len();

    let step = apply_ok(
        &session,
        SessionEvent::SendMessage {
            text: "hello".into(),
        },
    );
    let thread = &step.session.chats[&ChatId(1)];
    assert_eq!(thread.messages.len(), before + 1);
    let last = thread.last_message().expect("appended");
    assert_eq!(last.text, "hello");
    assert_eq!(last.sender, shared::domain::Sender::Me);
    assert!(matches!(
        step.effect,
        Some(Effect::PersistMessage { chat_id: ChatId(1), .. })
    ));
}

#[test]
fn open_then_close_returns_to_chat_tab() {
    let session = onboarded();
    let messages_before = session.chats[&ChatId(1)].messages.clone();

    let session = apply_ok(&session, SessionEvent::OpenChat { chat_id: ChatId(1) }).session;
    assert_eq!(session.main_screen, MainScreen::ChatDetail);
    assert_eq!(session.active_chat_id, Some(ChatId(1)));

    let session = apply_ok(&session, SessionEvent::CloseChatDetail).session;
    assert_eq!(session.main_screen, MainScreen::Home);
    assert_eq!(session.active_tab, HomeTab::Chat);
    assert_eq!(session.active_chat_id, None);
    assert_eq!(session.chats[&ChatId(1)].messages, messages_before);
    assert_invariants(&session);
}

#[test]
fn opening_unknown_chat_is_not_found() {
    let session = onboarded();
    let err = session
        .apply(SessionEvent::OpenChat { chat_id: ChatId(99) })
        .expect_err("unknown id");
    assert_eq!(err, shared::error::SessionError::ChatNotFound(ChatId(99)));
    assert_eq!(session.main_screen, MainScreen::Home);
}

#[test]
fn opening_a_chat_clears_its_unread_count() {
    let session = onboarded();
    assert_eq!(session.chats[&ChatId(1)].unread, 2);
    let session = apply_ok(&session, SessionEvent::OpenChat { chat_id: ChatId(1) }).session;
    assert_eq!(session.chats[&ChatId(1)].unread, 0);
    assert_eq!(session.chats[&ChatId(2)].unread, 0);
}

#[test]
fn gated_tabs_require_a_profile() {
    let mut session = onboarded();
    session.profile = None;
    let err = session
        .apply(SessionEvent::ChangeTab {
            tab: HomeTab::Profile,
        })
        .expect_err("no profile");
    assert!(matches!(err, shared::error::SessionError::Validation(_)));
    assert_eq!(session.active_tab, HomeTab::Home);

    session.profile = onboarded().profile;
    let step = apply_ok(
        &session,
        SessionEvent::ChangeTab {
            tab: HomeTab::Profile,
        },
    );
    assert_eq!(step.session.active_tab, HomeTab::Profile);
}

#[test]
fn premium_settles_only_while_armed() {
    let session = onboarded();
    let session = apply_ok(&session, SessionEvent::RequestPremiumUpgrade).session;
    assert!(session.show_premium_modal);

    let step = apply_ok(
        &session,
        SessionEvent::SubscribePremium {
            plan: PremiumPlan::Monthly,
        },
    );
    let ticket = ticket_of(&step);
    let session = apply_ok(&step.session, SessionEvent::PremiumActivated { ticket }).session;
    assert!(session.is_premium);
    assert!(!session.show_premium_modal);
    assert!(session.pending_purchase.is_none());
}

#[test]
fn closing_the_premium_modal_abandons_the_subscription() {
    let session = onboarded();
    let session = apply_ok(&session, SessionEvent::RequestPremiumUpgrade).session;
    let step = apply_ok(
        &session,
        SessionEvent::SubscribePremium {
            plan: PremiumPlan::Weekly,
        },
    );
    let ticket = ticket_of(&step);
    let session = apply_ok(&step.session, SessionEvent::ClosePremiumModal).session;

    let step = apply_ok(&session, SessionEvent::PremiumActivated { ticket });
    assert_eq!(step.outcome, Outcome::Ignored(IgnoreReason::StaleCompletion));
    assert!(!step.session.is_premium);
}

#[test]
fn coin_purchase_credits_and_closes_the_modal() {
    let session = onboarded();
    assert_eq!(session.coin_balance, INITIAL_COIN_BALANCE);
    let session = apply_ok(&session, SessionEvent::RequestBuyCoins).session;

    let step = apply_ok(
        &session,
        SessionEvent::PurchaseCoins {
            pack: CoinPack::Starter,
        },
    );
    let ticket = ticket_of(&step);
    let session = apply_ok(
        &step.session,
        SessionEvent::CoinsCredited {
            ticket,
            new_balance: INITIAL_COIN_BALANCE + CoinPack::Starter.coins(),
        },
    )
    .session;
    assert_eq!(session.coin_balance, 150);
    assert!(!session.show_coin_modal);
}

#[test]
fn late_coin_credit_after_closing_is_dropped() {
    let session = onboarded();
    let session = apply_ok(&session, SessionEvent::RequestBuyCoins).session;
    let step = apply_ok(
        &session,
        SessionEvent::PurchaseCoins {
            pack: CoinPack::Mega,
        },
    );
    let ticket = ticket_of(&step);
    let session = apply_ok(&step.session, SessionEvent::CloseCoinModal).session;

    let step = apply_ok(
        &session,
        SessionEvent::CoinsCredited {
            ticket,
            new_balance: 500,
        },
    );
    assert_eq!(step.outcome, Outcome::Ignored(IgnoreReason::StaleCompletion));
    assert_eq!(step.session.coin_balance, INITIAL_COIN_BALANCE);
}

#[test]
fn failed_purchase_keeps_the_modal_open_for_retry() {
    let session = onboarded();
    let session = apply_ok(&session, SessionEvent::RequestBuyCoins).session;
    let step = apply_ok(
        &session,
        SessionEvent::PurchaseCoins {
            pack: CoinPack::Plus,
        },
    );
    let ticket = ticket_of(&step);
    let session = apply_ok(
        &step.session,
        SessionEvent::PurchaseFailed {
            ticket,
            reason: "card declined".into(),
        },
    )
    .session;
    assert!(session.show_coin_modal);
    assert!(session.pending_purchase.is_none());
    assert!(session.notice.as_ref().is_some_and(|n| n.retryable));
}

#[test]
fn preference_change_requires_and_updates_the_profile() {
    let session = onboarded();
    let session = apply_ok(
        &session,
        SessionEvent::ChangeMatchPreference {
            preference: MatchPreference::Women,
        },
    )
    .session;
    assert_eq!(
        session.profile.as_ref().map(|p| p.match_preference),
        Some(MatchPreference::Women)
    );

    let mut profileless = session;
    profileless.profile = None;
    let err = profileless
        .apply(SessionEvent::ChangeMatchPreference {
            preference: MatchPreference::Men,
        })
        .expect_err("no profile");
    assert!(matches!(err, shared::error::SessionError::Validation(_)));
}

#[test]
fn blocking_the_partner_emits_a_block_effect() {
    let session = in_call(&onboarded());
    let step = apply_ok(&session, SessionEvent::BlockPartner);
    assert!(matches!(
        step.effect,
        Some(Effect::BlockUser { ref username }) if *username == fixture_partner().username
    ));
    assert!(step
        .session
        .notice
        .as_ref()
        .is_some_and(|n| n.kind == NoticeKind::Info));
}

#[test]
fn dismissing_the_notice_clears_it() {
    let session = in_call(&onboarded());
    let session = apply_ok(&session, SessionEvent::ReportPartner).session;
    assert!(session.notice.is_some());
    let session = apply_ok(&session, SessionEvent::DismissNotice).session;
    assert!(session.notice.is_none());

    let step = apply_ok(&session, SessionEvent::DismissNotice);
    assert_eq!(step.outcome, Outcome::Ignored(IgnoreReason::AlreadyDone));
}

#[test]
fn invariants_hold_across_a_full_tour() {
    let mut session = Session::with_threads(seeded_threads());
    assert_invariants(&session);

    let script = vec![
        SessionEvent::SplashFinished,
        SessionEvent::OnboardingCompleted {
            draft: draft("Sam"),
        },
        SessionEvent::ChangeTab { tab: HomeTab::Chat },
        SessionEvent::OpenChat { chat_id: ChatId(2) },
        SessionEvent::SendMessage { text: "hey".into() },
        SessionEvent::CloseChatDetail,
        SessionEvent::ChangeTab { tab: HomeTab::Home },
        SessionEvent::StartMatch,
        SessionEvent::RequestBuyCoins,
        SessionEvent::CloseCoinModal,
        SessionEvent::CancelMatch,
        SessionEvent::RequestEditProfile,
        SessionEvent::OnboardingCompleted {
            draft: draft("Sam"),
        },
    ];
    for event in script {
        session = session.apply(event).expect("scripted event").session;
        assert_invariants(&session);
    }
    assert!(!session.is_premium, "premium never set in this tour");
}
