//! Interactive console driver for the session controller.
//!
//! Maps typed commands onto [`SessionEvent`]s against the mock backends and
//! prints the projected view after every applied event, standing in for the
//! rendering layer.

use std::{fmt::Write as _, path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use session_core::{
    mock::{InMemoryChatStore, MockAuthGateway, MockMatchmaking, MockPaymentGateway},
    AuthGateway, ChatPreview, ControllerUpdate, RootSurface, SessionController, SessionEvent,
    TabView, ViewModel,
};
use shared::domain::{
    ChatId, CoinPack, HomeTab, MatchPreference, PremiumPlan, ProfileDraft, Sender,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

mod config;

#[derive(Parser, Debug)]
struct Args {
    /// Settings file.
    #[arg(long, default_value = "console.toml")]
    config: PathBuf,
    /// Print projected views as JSON instead of text.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Help,
    View,
    Login { phone: String },
    Verify { code: String },
    Onboard { username: String, bio: String },
    Edit,
    Match,
    Cancel,
    End,
    Accept,
    Reject,
    Report,
    Block,
    Open { chat_id: i64 },
    Send { text: String },
    Back,
    Tab { tab: HomeTab },
    Premium,
    Subscribe { plan: PremiumPlan },
    ClosePremium,
    Coins,
    Buy { pack: CoinPack },
    CloseCoins,
    Pref { preference: MatchPreference },
    Dismiss,
    Quit,
}

fn parse_command(line: &str) -> Result<Command, String> {
    let mut tokens = line.split_whitespace();
    let Some(head) = tokens.next() else {
        return Err("empty command".into());
    };
    let rest = || {
        line.splitn(2, char::is_whitespace)
            .nth(1)
            .unwrap_or("")
            .trim()
            .to_string()
    };

    match head {
        "help" => Ok(Command::Help),
        "view" => Ok(Command::View),
        "login" => match tokens.next() {
            Some(phone) => Ok(Command::Login {
                phone: phone.to_string(),
            }),
            None => Err("usage: login <phone>".into()),
        },
        "verify" => match tokens.next() {
            Some(code) => Ok(Command::Verify {
                code: code.to_string(),
            }),
            None => Err("usage: verify <code>".into()),
        },
        "onboard" => match tokens.next() {
            Some(username) => {
                let bio = tokens.collect::<Vec<_>>().join(" ");
                Ok(Command::Onboard {
                    username: username.to_string(),
                    bio,
                })
            }
            None => Err("usage: onboard <username> [bio...]".into()),
        },
        "edit" => Ok(Command::Edit),
        "match" => Ok(Command::Match),
        "cancel" => Ok(Command::Cancel),
        "end" => Ok(Command::End),
        "accept" => Ok(Command::Accept),
        "reject" => Ok(Command::Reject),
        "report" => Ok(Command::Report),
        "block" => Ok(Command::Block),
        "open" => tokens
            .next()
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(|chat_id| Command::Open { chat_id })
            .ok_or_else(|| "usage: open <chat-id>".into()),
        "send" => {
            let text = rest();
            if text.is_empty() {
                Err("usage: send <text>".into())
            } else {
                Ok(Command::Send { text })
            }
        }
        "back" => Ok(Command::Back),
        "tab" => match tokens.next() {
            Some("home") => Ok(Command::Tab { tab: HomeTab::Home }),
            Some("match") => Ok(Command::Tab {
                tab: HomeTab::Match,
            }),
            Some("coins") => Ok(Command::Tab {
                tab: HomeTab::Coins,
            }),
            Some("chat") => Ok(Command::Tab { tab: HomeTab::Chat }),
            Some("profile") => Ok(Command::Tab {
                tab: HomeTab::Profile,
            }),
            _ => Err("usage: tab <home|match|coins|chat|profile>".into()),
        },
        "premium" => Ok(Command::Premium),
        "subscribe" => match tokens.next() {
            Some("weekly") => Ok(Command::Subscribe {
                plan: PremiumPlan::Weekly,
            }),
            Some("monthly") => Ok(Command::Subscribe {
                plan: PremiumPlan::Monthly,
            }),
            Some("yearly") => Ok(Command::Subscribe {
                plan: PremiumPlan::Yearly,
            }),
            _ => Err("usage: subscribe <weekly|monthly|yearly>".into()),
        },
        "close-premium" => Ok(Command::ClosePremium),
        "coins" => Ok(Command::Coins),
        "buy" => match tokens.next() {
            Some("starter") => Ok(Command::Buy {
                pack: CoinPack::Starter,
            }),
            Some("plus") => Ok(Command::Buy {
                pack: CoinPack::Plus,
            }),
            Some("mega") => Ok(Command::Buy {
                pack: CoinPack::Mega,
            }),
            _ => Err("usage: buy <starter|plus|mega>".into()),
        },
        "close-coins" => Ok(Command::CloseCoins),
        "pref" => match tokens.next() {
            Some("anyone") => Ok(Command::Pref {
                preference: MatchPreference::Anyone,
            }),
            Some("men") => Ok(Command::Pref {
                preference: MatchPreference::Men,
            }),
            Some("women") => Ok(Command::Pref {
                preference: MatchPreference::Women,
            }),
            _ => Err("usage: pref <anyone|men|women>".into()),
        },
        "dismiss" => Ok(Command::Dismiss),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!("unknown command '{other}', try 'help'")),
    }
}

const HELP: &str = "\
commands:
  login <phone>            request a verification code
  verify <code>            confirm the code
  onboard <name> [bio...]  finish onboarding
  edit                     reopen the profile editor
  match | cancel           start / cancel partner search
  end | accept | reject    call flow
  report | block           during or after a call
  tab <home|match|coins|chat|profile>
  open <chat-id> | send <text> | back
  premium | subscribe <weekly|monthly|yearly> | close-premium
  coins | buy <starter|plus|mega> | close-coins
  pref <anyone|men|women>
  dismiss | view | help | quit";

fn pref_name(preference: MatchPreference) -> &'static str {
    match preference {
        MatchPreference::Anyone => "anyone",
        MatchPreference::Men => "men",
        MatchPreference::Women => "women",
    }
}

fn preview_line(preview: &ChatPreview) -> String {
    let last = preview.last_message.as_deref().unwrap_or("(no messages)");
    if preview.unread > 0 {
        format!(
            "  [{}] {} — {} ({} unread)",
            preview.chat_id.0, preview.partner_name, last, preview.unread
        )
    } else {
        format!("  [{}] {} — {}", preview.chat_id.0, preview.partner_name, last)
    }
}

fn render_view(view: &ViewModel) -> String {
    let mut out = String::new();
    match &view.root {
        RootSurface::Splash => {
            let _ = writeln!(out, "== splash ==");
        }
        RootSurface::Onboarding { initial, editing } => {
            if *editing {
                let name = initial
                    .as_ref()
                    .map(|profile| profile.username.as_str())
                    .unwrap_or("?");
                let _ = writeln!(out, "== profile editor ({name}) ==");
            } else {
                let _ = writeln!(out, "== onboarding ==");
                let _ = writeln!(out, "  login <phone>, verify <code>, then onboard <name>");
            }
        }
        RootSurface::Call { partner } => {
            let _ = writeln!(
                out,
                "== in call with {}, {} ({} km away) ==",
                partner.username, partner.age, partner.distance_km
            );
        }
        RootSurface::PostCall { partner } => {
            let _ = writeln!(
                out,
                "== call ended — {} ({} shared interests) — accept or reject ==",
                partner.username, partner.shared_interest_count
            );
        }
        RootSurface::ChatDetail { chat_id, thread } => {
            let _ = writeln!(out, "== chat [{}] with {} ==", chat_id.0, thread.partner_name);
            for message in thread.messages.iter().rev().take(5).rev() {
                let who = match message.sender {
                    Sender::Me => "me",
                    Sender::Them => "them",
                };
                let _ = writeln!(out, "  {who}: {}", message.text);
            }
        }
        RootSurface::Home { tab } => match tab {
            TabView::Home {
                match_preference,
                searching,
            } => {
                let _ = writeln!(
                    out,
                    "== home — ready to match (preference: {}) ==",
                    pref_name(*match_preference)
                );
                if *searching {
                    let _ = writeln!(out, "  searching for a partner...");
                }
            }
            TabView::Match { profile, searching } => {
                let _ = writeln!(
                    out,
                    "== match — {} (preference: {}) ==",
                    profile.username,
                    pref_name(profile.match_preference)
                );
                if *searching {
                    let _ = writeln!(out, "  searching for a partner...");
                }
            }
            TabView::Coins { balance } => {
                let _ = writeln!(out, "== coins — {balance} available ==");
            }
            TabView::ChatList { previews } => {
                let _ = writeln!(out, "== chats ==");
                for preview in previews {
                    let _ = writeln!(out, "{}", preview_line(preview));
                }
            }
            TabView::Profile { profile } => {
                let _ = writeln!(out, "== profile — {}, {} ==", profile.username, profile.age);
                if !profile.bio.is_empty() {
                    let _ = writeln!(out, "  {}", profile.bio);
                }
                if !profile.interests.is_empty() {
                    let _ = writeln!(out, "  interests: {}", profile.interests.join(", "));
                }
            }
        },
    }

    if view.premium_modal {
        let _ = writeln!(
            out,
            "  [premium modal — subscribe <weekly|monthly|yearly> or close-premium]"
        );
    }
    if view.coin_modal {
        let _ = writeln!(
            out,
            "  [coin modal — buy <starter|plus|mega> or close-coins, balance {}]",
            view.coin_balance
        );
    }
    if let Some(notice) = &view.notice {
        if notice.retryable {
            let _ = writeln!(out, "  ! {} (retry when ready)", notice.message);
        } else {
            let _ = writeln!(out, "  ! {}", notice.message);
        }
    }

    out.trim_end().to_string()
}

fn print_view(view: &ViewModel, json: bool) {
    if json {
        match serde_json::to_string(view) {
            Ok(encoded) => println!("{encoded}"),
            Err(err) => warn!("failed to encode view: {err}"),
        }
    } else {
        println!("{}", render_view(view));
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
    let args = Args::parse();
    let settings = config::load_settings(&args.config);
    info!(?settings, "starting console session");

    let auth: Arc<dyn AuthGateway> = Arc::new(MockAuthGateway);
    let controller = SessionController::start(
        Arc::new(MockMatchmaking::with_delay(settings.matchmaking_delay)),
        Arc::new(MockPaymentGateway::new()),
        Arc::new(InMemoryChatStore::seeded()),
    )
    .await;

    // Stand-in renderer: re-draw on every applied event.
    {
        let mut updates = controller.subscribe();
        let json = args.json;
        tokio::spawn(async move {
            loop {
                match updates.recv().await {
                    Ok(ControllerUpdate::ViewChanged(view)) => print_view(&view, json),
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(_) => break,
                }
            }
        });
    }

    // The splash advances by itself, like the timed intro screen.
    {
        let controller = Arc::clone(&controller);
        let splash = settings.splash;
        tokio::spawn(async move {
            tokio::time::sleep(splash).await;
            let _ = controller.dispatch(SessionEvent::SplashFinished).await;
        });
    }

    print_view(&controller.view().await, args.json);
    println!("{HELP}");

    let mut pending_phone: Option<String> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let command = match parse_command(line) {
            Ok(command) => command,
            Err(usage) => {
                println!("{usage}");
                continue;
            }
        };

        let event = match command {
            Command::Help => {
                println!("{HELP}");
                continue;
            }
            Command::View => {
                print_view(&controller.view().await, args.json);
                continue;
            }
            Command::Login { phone } => {
                match auth.send_otp(&phone).await {
                    Ok(()) => {
                        println!("verification code sent to {phone}");
                        pending_phone = Some(phone);
                    }
                    Err(err) => println!("could not send code: {err}"),
                }
                continue;
            }
            Command::Verify { code } => {
                let Some(phone) = pending_phone.clone() else {
                    println!("login first: login <phone>");
                    continue;
                };
                match auth.verify_otp(&phone, &code).await {
                    Ok(()) => println!("verified — finish with: onboard <name> [bio...]"),
                    Err(err) => println!("verification failed: {err}"),
                }
                continue;
            }
            Command::Onboard { username, bio } => SessionEvent::OnboardingCompleted {
                draft: ProfileDraft {
                    username,
                    bio,
                    ..ProfileDraft::default()
                },
            },
            Command::Edit => SessionEvent::RequestEditProfile,
            Command::Match => SessionEvent::StartMatch,
            Command::Cancel => SessionEvent::CancelMatch,
            Command::End => SessionEvent::EndCall,
            Command::Accept => SessionEvent::AcceptPostCall,
            Command::Reject => SessionEvent::RejectPostCall,
            Command::Report => SessionEvent::ReportPartner,
            Command::Block => SessionEvent::BlockPartner,
            Command::Open { chat_id } => SessionEvent::OpenChat {
                chat_id: ChatId(chat_id),
            },
            Command::Send { text } => SessionEvent::SendMessage { text },
            Command::Back => SessionEvent::CloseChatDetail,
            Command::Tab { tab } => SessionEvent::ChangeTab { tab },
            Command::Premium => SessionEvent::RequestPremiumUpgrade,
            Command::Subscribe { plan } => SessionEvent::SubscribePremium { plan },
            Command::ClosePremium => SessionEvent::ClosePremiumModal,
            Command::Coins => SessionEvent::RequestBuyCoins,
            Command::Buy { pack } => SessionEvent::PurchaseCoins { pack },
            Command::CloseCoins => SessionEvent::CloseCoinModal,
            Command::Pref { preference } => SessionEvent::ChangeMatchPreference { preference },
            Command::Dismiss => SessionEvent::DismissNotice,
            Command::Quit => break,
        };

        if let Err(err) = controller.dispatch(event).await {
            println!("rejected: {err}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use session_core::derive_view;
    use session_core::mock::seeded_threads;
    use session_core::Session;

    use super::*;

    #[test]
    fn parses_simple_commands() {
        assert_eq!(parse_command("match"), Ok(Command::Match));
        assert_eq!(
            parse_command("tab coins"),
            Ok(Command::Tab {
                tab: HomeTab::Coins
            })
        );
        assert_eq!(parse_command("open 2"), Ok(Command::Open { chat_id: 2 }));
        assert_eq!(
            parse_command("buy mega"),
            Ok(Command::Buy {
                pack: CoinPack::Mega
            })
        );
    }

    #[test]
    fn send_keeps_the_full_text() {
        assert_eq!(
            parse_command("send hello there, friend"),
            Ok(Command::Send {
                text: "hello there, friend".into()
            })
        );
    }

    #[test]
    fn onboard_collects_the_bio() {
        assert_eq!(
            parse_command("onboard Sam loves hiking"),
            Ok(Command::Onboard {
                username: "Sam".into(),
                bio: "loves hiking".into()
            })
        );
    }

    #[test]
    fn unknown_commands_point_at_help() {
        let err = parse_command("frobnicate").expect_err("unknown");
        assert!(err.contains("help"));
    }

    #[test]
    fn renders_the_splash_and_chat_list() {
        let session = Session::with_threads(seeded_threads());
        let rendered = render_view(&derive_view(&session));
        assert!(rendered.contains("splash"));

        let mut session = session;
        session = session
            .apply(SessionEvent::SplashFinished)
            .expect("splash")
            .session;
        session = session
            .apply(SessionEvent::OnboardingCompleted {
                draft: ProfileDraft {
                    username: "Sam".into(),
                    ..ProfileDraft::default()
                },
            })
            .expect("onboard")
            .session;
        session = session
            .apply(SessionEvent::ChangeTab { tab: HomeTab::Chat })
            .expect("tab")
            .session;
        let rendered = render_view(&derive_view(&session));
        assert!(rendered.contains("Zoe"));
        assert!(rendered.contains("2 unread"));
    }
}
