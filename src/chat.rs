//! Streaming analyst chat
//!
//! A session owns one append-only transcript. Each send appends the user turn
//! and an empty model entry, then folds streamed chunks into an explicit
//! accumulator and republishes an immutable transcript snapshot per chunk.

use crate::gateway::{Content, GenerateRequest, ModelGateway};
use crate::models::ChatMessage;
use crate::prompts::{CHAT_GREETING, CHAT_SYSTEM_INSTRUCTION};
use crate::Result;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const CHAT_FAILURE_MESSAGE: &str = "Sorry, I encountered an error. Please try again later.";

pub const DEFAULT_MAX_CHAT_SESSIONS: usize = 256;
pub const DEFAULT_CHAT_IDLE_TTL: Duration = Duration::from_secs(30 * 60);

/// Text of the model reply built up so far
#[derive(Debug, Default)]
pub struct ReplyAccumulator {
    text: String,
}

impl ReplyAccumulator {
    /// Append a chunk and return the full reply so far
    pub fn absorb(&mut self, chunk: &str) -> &str {
        self.text.push_str(chunk);
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

pub struct ChatSession {
    gateway: Arc<dyn ModelGateway>,
    model: String,
    /// Completed turns replayed to the model for context
    history: Vec<Content>,
    transcript: Vec<ChatMessage>,
    updates: watch::Sender<Vec<ChatMessage>>,
}

impl ChatSession {
    pub fn new(gateway: Arc<dyn ModelGateway>, model: impl Into<String>) -> Self {
        let transcript = vec![ChatMessage::model(CHAT_GREETING)];
        let (updates, _) = watch::channel(transcript.clone());

        Self {
            gateway,
            model: model.into(),
            history: Vec::new(),
            transcript,
            updates,
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// Receiver observing the latest published transcript
    pub fn subscribe(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.updates.subscribe()
    }

    fn publish(&self, on_update: &mut impl FnMut(&[ChatMessage])) {
        self.updates.send_replace(self.transcript.clone());
        on_update(&self.transcript);
    }

    pub async fn send(&mut self, message: &str) -> Vec<ChatMessage> {
        self.send_with(message, |_| {}).await
    }

    /// Send one user turn, calling `on_update` with every published snapshot.
    /// Blank input is ignored. Stream failures append an apology entry.
    pub async fn send_with(
        &mut self,
        message: &str,
        mut on_update: impl FnMut(&[ChatMessage]),
    ) -> Vec<ChatMessage> {
        let message = message.trim();
        if message.is_empty() {
            return self.transcript.clone();
        }

        self.transcript.push(ChatMessage::user(message));
        self.transcript.push(ChatMessage::model(""));
        let reply_index = self.transcript.len() - 1;
        self.publish(&mut on_update);

        let mut contents = self.history.clone();
        contents.push(Content::user(message));
        let request = GenerateRequest::with_contents(&self.model, contents)
            .system_instruction(CHAT_SYSTEM_INSTRUCTION)
            .grounded();

        let mut accumulator = ReplyAccumulator::default();
        match self
            .stream_reply(request, reply_index, &mut accumulator, &mut on_update)
            .await
        {
            Ok(chunks) => {
                let reply = accumulator.into_text();
                info!(chunks, chars = reply.len(), "Chat turn complete");
                self.history.push(Content::user(message));
                self.history.push(Content::model(reply));
            }
            Err(e) => {
                warn!("Chat error: {}", e);
                self.transcript.push(ChatMessage::model(CHAT_FAILURE_MESSAGE));
                self.publish(&mut on_update);
            }
        }

        self.transcript.clone()
    }

    async fn stream_reply(
        &mut self,
        request: GenerateRequest,
        reply_index: usize,
        accumulator: &mut ReplyAccumulator,
        on_update: &mut impl FnMut(&[ChatMessage]),
    ) -> Result<usize> {
        let mut stream = self.gateway.stream_content(request).await?;
        let mut chunks = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            let text = accumulator.absorb(&chunk.text());
            self.transcript[reply_index] = ChatMessage::model(text);
            chunks += 1;
            debug!(chunk = chunks, "Chat chunk applied");
            self.publish(&mut *on_update);
        }

        Ok(chunks)
    }
}

/// Shared handle to one session. Reads go through the published snapshot so
/// they never wait on a reply that is still streaming.
#[derive(Clone)]
pub struct ChatHandle {
    pub session: Arc<Mutex<ChatSession>>,
    updates: watch::Receiver<Vec<ChatMessage>>,
}

impl ChatHandle {
    fn new(session: ChatSession) -> Self {
        let updates = session.subscribe();
        Self {
            session: Arc::new(Mutex::new(session)),
            updates,
        }
    }

    /// Latest published transcript
    pub fn transcript(&self) -> Vec<ChatMessage> {
        self.updates.borrow().clone()
    }
}

struct RegistryEntry {
    handle: ChatHandle,
    last_used: Instant,
    /// Use order, for least-recently-used eviction
    touched: u64,
}

impl RegistryEntry {
    /// A turn is still running on this session
    fn is_busy(&self) -> bool {
        self.handle.session.try_lock().is_err()
    }
}

/// Chat sessions keyed by client-chosen id. Idle sessions expire after
/// `idle_ttl` and the least recently used idle session makes room once
/// `max_sessions` is reached. Sessions mid-turn are never evicted.
pub struct ChatRegistry {
    gateway: Arc<dyn ModelGateway>,
    model: String,
    max_sessions: usize,
    idle_ttl: Duration,
    touches: AtomicU64,
    sessions: RwLock<HashMap<Uuid, RegistryEntry>>,
}

impl ChatRegistry {
    pub fn new(gateway: Arc<dyn ModelGateway>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
            max_sessions: DEFAULT_MAX_CHAT_SESSIONS,
            idle_ttl: DEFAULT_CHAT_IDLE_TTL,
            touches: AtomicU64::new(0),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_limits(mut self, max_sessions: usize, idle_ttl: Duration) -> Self {
        self.max_sessions = max_sessions.max(1);
        self.idle_ttl = idle_ttl;
        self
    }

    fn touch(&self, entry: &mut RegistryEntry) {
        entry.last_used = Instant::now();
        entry.touched = self.touches.fetch_add(1, Ordering::Relaxed);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn get(&self, chat_id: Uuid) -> Option<ChatHandle> {
        let mut sessions = self.sessions.write().await;
        sessions.get_mut(&chat_id).map(|entry| {
            self.touch(entry);
            entry.handle.clone()
        })
    }

    /// Session for `chat_id`, created on first use
    pub async fn get_or_create(&self, chat_id: Uuid) -> ChatHandle {
        let mut sessions = self.sessions.write().await;
        if let Some(entry) = sessions.get_mut(&chat_id) {
            self.touch(entry);
            return entry.handle.clone();
        }

        self.evict(&mut sessions);

        info!(%chat_id, sessions = sessions.len() + 1, "Creating chat session");
        let handle = ChatHandle::new(ChatSession::new(
            Arc::clone(&self.gateway),
            self.model.clone(),
        ));
        sessions.insert(
            chat_id,
            RegistryEntry {
                handle: handle.clone(),
                last_used: Instant::now(),
                touched: self.touches.fetch_add(1, Ordering::Relaxed),
            },
        );
        handle
    }

    fn evict(&self, sessions: &mut HashMap<Uuid, RegistryEntry>) {
        let before = sessions.len();
        sessions.retain(|_, entry| entry.is_busy() || entry.last_used.elapsed() < self.idle_ttl);

        while sessions.len() >= self.max_sessions {
            let oldest = sessions
                .iter()
                .filter(|(_, entry)| !entry.is_busy())
                .min_by_key(|(_, entry)| entry.touched)
                .map(|(id, _)| *id);
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }

        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, remaining = sessions.len(), "Evicted chat sessions");
        }
    }
}
