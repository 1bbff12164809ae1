//! Mock backends seeded with local fixture data, standing in for the real
//! matchmaking, payment, chat and auth services during development.

use std::{
    collections::{BTreeMap, HashSet},
    sync::Mutex,
    time::Duration,
};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use shared::domain::{
    ChatId, ChatThread, CoinPack, MatchPreference, Message, MessageId, PartnerProfile,
    PremiumPlan, Sender,
};

use crate::{is_valid_otp, normalize_phone, session::INITIAL_COIN_BALANCE};
use crate::{AuthGateway, ChatStore, Matchmaking, PaymentGateway};

/// The partner every match resolves to until a real backend exists.
pub fn fixture_partner() -> PartnerProfile {
    PartnerProfile {
        username: "Nadia".into(),
        age: 20,
        photos: vec![
            "photos/nadia-1.jpg".into(),
            "photos/nadia-2.jpg".into(),
            "photos/nadia-3.jpg".into(),
        ],
        bio: "music lover always hunting for new tracks, happy to trade playlists".into(),
        interests: vec![
            "pop punk".into(),
            "coffee".into(),
            "boxing".into(),
            "fifa mobile".into(),
        ],
        distance_km: 2,
        shared_interest_count: 4,
    }
}

/// Starting chat threads: one with history and unread messages, two quiet.
pub fn seeded_threads() -> BTreeMap<ChatId, ChatThread> {
    let now = Utc::now();
    let mut threads = BTreeMap::new();
    threads.insert(
        ChatId(1),
        ChatThread {
            partner_name: "Zoe".into(),
            messages: vec![
                Message {
                    id: MessageId(1),
                    sender: Sender::Them,
                    text: "hey there 👋".into(),
                    sent_at: now - ChronoDuration::hours(3),
                },
                Message {
                    id: MessageId(2),
                    sender: Sender::Me,
                    text: "hello! how are you?".into(),
                    sent_at: now - ChronoDuration::hours(2),
                },
                Message {
                    id: MessageId(3),
                    sender: Sender::Them,
                    text: "doing great, thanks for asking".into(),
                    sent_at: now - ChronoDuration::hours(1),
                },
            ],
            unread: 2,
        },
    );
    threads.insert(
        ChatId(2),
        ChatThread {
            partner_name: "Marco".into(),
            messages: vec![Message {
                id: MessageId(1),
                sender: Sender::Them,
                text: "nice talking to you!".into(),
                sent_at: now - ChronoDuration::hours(5),
            }],
            unread: 0,
        },
    );
    threads.insert(
        ChatId(3),
        ChatThread {
            partner_name: "Priya".into(),
            messages: vec![Message {
                id: MessageId(1),
                sender: Sender::Them,
                text: "see you later".into(),
                sent_at: now - ChronoDuration::hours(8),
            }],
            unread: 0,
        },
    );
    threads
}

/// Always matches the fixture partner after a configurable delay, unless
/// that partner has been blocked.
pub struct MockMatchmaking {
    partner: PartnerProfile,
    delay: Duration,
    blocked: Mutex<HashSet<String>>,
}

impl MockMatchmaking {
    pub fn new() -> Self {
        Self::with_delay(Duration::from_millis(1500))
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            partner: fixture_partner(),
            delay,
            blocked: Mutex::new(HashSet::new()),
        }
    }
}

impl Default for MockMatchmaking {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Matchmaking for MockMatchmaking {
    async fn find_partner(&self, _preference: MatchPreference) -> Result<PartnerProfile> {
        tokio::time::sleep(self.delay).await;
        let blocked = self
            .blocked
            .lock()
            .map_err(|_| anyhow!("blocklist poisoned"))?
            .contains(&self.partner.username);
        if blocked {
            return Err(anyhow!("no partners available right now"));
        }
        Ok(self.partner.clone())
    }

    async fn block_user(&self, username: &str) -> Result<()> {
        self.blocked
            .lock()
            .map_err(|_| anyhow!("blocklist poisoned"))?
            .insert(username.to_string());
        Ok(())
    }
}

/// Tracks a coin balance in memory; every charge succeeds.
pub struct MockPaymentGateway {
    balance: Mutex<u32>,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::with_balance(INITIAL_COIN_BALANCE)
    }

    pub fn with_balance(balance: u32) -> Self {
        Self {
            balance: Mutex::new(balance),
        }
    }
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn purchase_coins(&self, pack: CoinPack) -> Result<u32> {
        let mut balance = self
            .balance
            .lock()
            .map_err(|_| anyhow!("balance poisoned"))?;
        *balance += pack.coins();
        Ok(*balance)
    }

    async fn subscribe(&self, _plan: PremiumPlan) -> Result<()> {
        Ok(())
    }
}

/// In-memory thread storage mirroring what a backend would hold.
pub struct InMemoryChatStore {
    threads: Mutex<BTreeMap<ChatId, ChatThread>>,
}

impl InMemoryChatStore {
    pub fn empty() -> Self {
        Self {
            threads: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn seeded() -> Self {
        Self {
            threads: Mutex::new(seeded_threads()),
        }
    }
}

#[async_trait]
impl ChatStore for InMemoryChatStore {
    async fn load_threads(&self) -> Result<BTreeMap<ChatId, ChatThread>> {
        Ok(self
            .threads
            .lock()
            .map_err(|_| anyhow!("thread store poisoned"))?
            .clone())
    }

    async fn append_message(&self, chat_id: ChatId, message: &Message) -> Result<()> {
        let mut threads = self
            .threads
            .lock()
            .map_err(|_| anyhow!("thread store poisoned"))?;
        // Threads created mid-session are materialized on first append.
        threads
            .entry(chat_id)
            .or_insert_with(|| ChatThread::new(""))
            .messages
            .push(message.clone());
        Ok(())
    }
}

/// Accepts any well-formed ten-digit phone and six-digit code.
pub struct MockAuthGateway;

#[async_trait]
impl AuthGateway for MockAuthGateway {
    async fn send_otp(&self, phone: &str) -> Result<()> {
        if normalize_phone(phone).is_none() {
            return Err(anyhow!("phone number must have exactly 10 digits"));
        }
        Ok(())
    }

    async fn verify_otp(&self, phone: &str, code: &str) -> Result<()> {
        if normalize_phone(phone).is_none() {
            return Err(anyhow!("phone number must have exactly 10 digits"));
        }
        if !is_valid_otp(code) {
            return Err(anyhow!("verification code must have exactly 6 digits"));
        }
        Ok(())
    }
}
