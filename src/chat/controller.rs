use std::sync::Arc;

use chrono::{DateTime, Local, Utc};

use crate::auth::Identity;
use crate::chat::intent::{classify, ClassifyContext, Effect, Reply};
use crate::chat::store::{ChatSessionStore, Cursor};
use crate::db::models::to_datetime;
use crate::db::{ChatMessage, ChatSession, Invoice, MessageRole, NewMessage, UserProfile};
use crate::error::{AppError, Notice};
use crate::invoices::{InvoiceAnalysis, InvoiceService};

pub const GREETING: &str =
    "👋 Hello! I'm your Invoice Assistant. Upload your invoice to get started and save more today!";
pub const NEW_SESSION_GREETING: &str =
    "👋 Starting a new conversation! I'm your Invoice Assistant. How can I help you today?";
pub const EMPTY_SESSION_GREETING: &str = "👋 This is the start of a new conversation! \
    I'm your Invoice Assistant. How can I help you today?";
pub const SIGN_IN_PROMPT: &str =
    "You need to sign in to save conversations. Would you like to sign in now?";
pub const INVOICES_UNAVAILABLE: &str =
    "I couldn't retrieve your invoices. Please try again later.";
pub const UPLOAD_FAILED: &str = "I couldn't process this invoice. Please try a different file \
    or format (PDF, JPG, PNG supported).";
pub const READY_TO_UPLOAD_STATUS: &str = "Ready to upload...";
pub const PROCESSING_STATUS: &str = "Processing your invoice...";

/// A message as shown in the conversation. `local_id` only orders messages
/// inside this controller and is never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationMessage {
    pub local_id: u64,
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub invoice_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SignedInUser {
    pub identity: Identity,
    pub display_name: String,
}

impl SignedInUser {
    pub fn new(identity: Identity, profile: Option<&UserProfile>) -> Self {
        let display_name = profile
            .and_then(|p| p.display_name.clone())
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| identity.email_handle().to_string());
        Self {
            identity,
            display_name,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PageSizes {
    pub messages: i64,
    pub history: i64,
}

/// Owns the visible conversation and the active session for one client.
pub struct ConversationController {
    store: Arc<ChatSessionStore>,
    invoices: Arc<InvoiceService>,
    page_sizes: PageSizes,

    user: Option<SignedInUser>,
    messages: Vec<ConversationMessage>,
    next_local_id: u64,
    input: String,
    session_id: Option<String>,
    session_cursor: Option<Cursor>,
    sessions: Vec<ChatSession>,
    recent_invoices: Vec<Invoice>,
    history_cursor: Option<Cursor>,
    history_exhausted: bool,
    loading: bool,
    upload_status: Option<String>,
    welcome_sent: bool,
    title_prompt: bool,
    sessions_panel_open: bool,
    notices: Vec<Notice>,
}

impl ConversationController {
    pub fn new(
        store: Arc<ChatSessionStore>,
        invoices: Arc<InvoiceService>,
        page_sizes: PageSizes,
    ) -> Self {
        let mut controller = Self {
            store,
            invoices,
            page_sizes,
            user: None,
            messages: Vec::new(),
            next_local_id: 0,
            input: String::new(),
            session_id: None,
            session_cursor: None,
            sessions: Vec::new(),
            recent_invoices: Vec::new(),
            history_cursor: None,
            history_exhausted: false,
            loading: false,
            upload_status: None,
            welcome_sent: false,
            title_prompt: false,
            sessions_panel_open: false,
            notices: Vec::new(),
        };
        controller.push_bot(GREETING);
        controller
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    pub fn user(&self) -> Option<&SignedInUser> {
        self.user.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn sessions(&self) -> &[ChatSession] {
        &self.sessions
    }

    pub fn recent_invoices(&self) -> &[Invoice] {
        &self.recent_invoices
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn upload_status(&self) -> Option<&str> {
        self.upload_status.as_deref()
    }

    pub fn is_title_prompt_pending(&self) -> bool {
        self.title_prompt
    }

    pub fn is_sessions_panel_open(&self) -> bool {
        self.sessions_panel_open
    }

    pub fn has_more_session_messages(&self) -> bool {
        self.session_cursor.is_some()
    }

    pub fn has_more_history(&self) -> bool {
        !self.history_exhausted
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Drain notices raised since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Sign-in transition: greet the user, then load their invoices and sessions.
    pub async fn on_signed_in(&mut self, user: SignedInUser) {
        let same_user = self
            .user
            .as_ref()
            .is_some_and(|current| current.identity.uid == user.identity.uid);
        if same_user && self.welcome_sent {
            self.user = Some(user);
            return;
        }
        if self.user.is_some() && !same_user {
            // Another account took over without a sign-out
            self.on_signed_out();
        }

        tracing::debug!(uid = %user.identity.uid, "Conversation signed in");
        let welcome = format!(
            "Welcome, {}! You're now signed in. You can upload your invoice or ask me about your previous invoices.",
            user.display_name
        );
        self.user = Some(user);
        self.push_bot(welcome);
        self.welcome_sent = true;

        self.refresh_invoices().await;
        self.refresh_sessions().await;
    }

    /// Sign-out transition: drop everything that belonged to the user.
    pub fn on_signed_out(&mut self) {
        if let Some(user) = self.user.take() {
            tracing::debug!(uid = %user.identity.uid, "Conversation signed out");
        }
        self.welcome_sent = false;
        self.session_id = None;
        self.session_cursor = None;
        self.sessions.clear();
        self.recent_invoices.clear();
        self.history_cursor = None;
        self.history_exhausted = false;
        self.title_prompt = false;
        self.sessions_panel_open = false;
        self.upload_status = None;
        self.input.clear();
        self.messages.clear();
        self.push_bot(GREETING);
    }

    pub async fn refresh_invoices(&mut self) {
        let Some(uid) = self.uid() else { return };

        self.loading = true;
        match self.invoices.get_user_invoices(&uid).await {
            Ok(invoices) => {
                let count = invoices.len();
                self.recent_invoices = invoices;
                if count > 0 {
                    self.push_bot(format!(
                        "I found {} invoice{} in your account. Ask me anything about them or upload a new one!",
                        count,
                        if count == 1 { "" } else { "s" }
                    ));
                }
            }
            Err(e) => {
                self.notices.push(e.notice());
                self.push_bot(INVOICES_UNAVAILABLE);
            }
        }
        self.loading = false;
    }

    pub async fn refresh_sessions(&mut self) {
        let Some(uid) = self.uid() else { return };

        match self.store.list_sessions(&uid).await {
            Ok(sessions) => self.sessions = sessions,
            Err(e) => self.notices.push(e.notice()),
        }
    }

    /// Send the input buffer.
    pub async fn submit_input(&mut self) -> Option<Effect> {
        let text = std::mem::take(&mut self.input);
        self.send_message(&text).await
    }

    /// Append the user's message and the assistant's reply, then persist the
    /// turn for a signed-in user. Returns the effect the presentation layer
    /// still has to carry out.
    pub async fn send_message(&mut self, text: &str) -> Option<Effect> {
        if text.trim().is_empty() {
            return None;
        }

        self.push(MessageRole::User, text, None);
        self.input.clear();
        self.loading = true;

        let reply = self.classify(text);
        self.push_bot(reply.text.clone());
        self.apply_effect(reply.effect).await;

        if self.user.is_some() && !self.title_prompt {
            if let Err(e) = self.persist_turn(text, &reply.text).await {
                self.notices.push(e.notice());
            }
        }

        self.loading = false;
        reply.effect
    }

    pub fn classify(&self, text: &str) -> Reply {
        let ctx = ClassifyContext {
            signed_in: self.user.is_some(),
            session_active: self.session_id.is_some(),
            invoices: &self.recent_invoices,
        };
        classify(text, &ctx)
    }

    /// Quick action: announce the upload and ask for a file.
    pub fn request_upload(&mut self) -> Effect {
        self.upload_status = Some(READY_TO_UPLOAD_STATUS.to_string());
        self.push_bot(crate::chat::intent::READY_TO_UPLOAD);
        Effect::OpenFilePicker
    }

    /// Run a receipt through analysis and report the result.
    pub async fn upload_file(&mut self, file_name: &str, file: &[u8]) -> bool {
        self.loading = true;
        self.upload_status = Some(PROCESSING_STATUS.to_string());

        let processing = format!("Processing \"{}\"...", file_name);
        self.push_bot(processing.clone());

        let uid = self.uid();
        let outcome = self.invoices.process_invoice_file(file, uid.as_deref()).await;

        let ok = match outcome {
            Ok(analysis) => {
                let summary = summarize_analysis(&analysis);
                self.push(MessageRole::Bot, summary.clone(), analysis.id.clone());
                if let Some(invoice) = self.analyzed_invoice(&analysis) {
                    self.recent_invoices.insert(0, invoice);
                }

                if self.user.is_some() {
                    if let Err(e) = self.persist_upload(&processing, &summary, analysis.id).await {
                        self.notices.push(e.notice());
                    }
                }
                self.notices.push(Notice::success("Invoice processed successfully!"));
                true
            }
            Err(e) => {
                tracing::warn!(file_name, error = %e, "Invoice upload failed");
                self.notices.push(e.notice());
                self.push_bot(UPLOAD_FAILED);
                false
            }
        };

        self.loading = false;
        self.upload_status = None;
        ok
    }

    /// Start a fresh named session and make it active.
    pub async fn create_new_session(&mut self, title: Option<&str>) {
        let Some(uid) = self.uid() else {
            self.push_bot(SIGN_IN_PROMPT);
            return;
        };

        match self.store.create_session(&uid, title).await {
            Ok(session) => {
                self.messages.clear();
                self.push_bot(NEW_SESSION_GREETING);
                self.session_id = Some(session.id);
                self.session_cursor = None;
                self.title_prompt = false;
                self.refresh_sessions().await;
                self.notices.push(Notice::success("New chat session created!"));
            }
            Err(e) => self.notices.push(e.notice()),
        }
    }

    pub fn cancel_title_prompt(&mut self) {
        self.title_prompt = false;
    }

    pub async fn toggle_sessions_panel(&mut self) {
        if self.user.is_none() {
            self.push_bot(SIGN_IN_PROMPT);
            return;
        }
        self.sessions_panel_open = !self.sessions_panel_open;
        if self.sessions_panel_open {
            self.refresh_sessions().await;
        }
    }

    /// Make `session_id` active and rebuild the conversation from its first page.
    pub async fn select_session(&mut self, session_id: &str) {
        let Some(uid) = self.uid() else { return };

        self.loading = true;

        let page = self
            .store
            .get_session_messages(session_id, &uid, None, self.page_sizes.messages)
            .await;
        match page {
            Ok(page) => {
                self.session_id = Some(session_id.to_string());
                self.sessions_panel_open = false;
                self.messages.clear();
                if page.items.is_empty() {
                    self.push_bot(EMPTY_SESSION_GREETING);
                } else {
                    self.extend_from_persisted(&page.items);
                    if let Some(title) = self.session_title(session_id) {
                        self.notices.push(Notice::info(format!("Loaded conversation: {}", title)));
                    }
                }
                self.session_cursor = page.next_cursor;
            }
            Err(e) => self.notices.push(e.notice()),
        }
        self.loading = false;
    }

    /// Append the next page of the active session.
    pub async fn load_more(&mut self) -> usize {
        let (Some(uid), Some(session_id), Some(cursor)) =
            (self.uid(), self.session_id.clone(), self.session_cursor)
        else {
            return 0;
        };

        match self
            .store
            .get_session_messages(&session_id, &uid, Some(cursor), self.page_sizes.messages)
            .await
        {
            Ok(page) => {
                self.extend_from_persisted(&page.items);
                self.session_cursor = page.next_cursor;
                page.items.len()
            }
            Err(e) => {
                self.notices.push(e.notice());
                0
            }
        }
    }

    /// Next (older) page of the user's history across sessions, oldest first.
    pub async fn load_history(&mut self) -> Vec<ChatMessage> {
        let Some(uid) = self.uid() else {
            self.push_bot(SIGN_IN_PROMPT);
            return Vec::new();
        };
        if self.history_exhausted {
            return Vec::new();
        }

        match self
            .store
            .get_history(&uid, self.history_cursor, self.page_sizes.history)
            .await
        {
            Ok(page) => {
                self.history_exhausted = page.next_cursor.is_none();
                self.history_cursor = page.next_cursor;
                page.items
            }
            Err(e) => {
                self.notices.push(e.notice());
                Vec::new()
            }
        }
    }

    async fn apply_effect(&mut self, effect: Option<Effect>) {
        match effect {
            Some(Effect::PromptSessionTitle) => self.title_prompt = true,
            Some(Effect::OpenSessionsPanel) => {
                self.sessions_panel_open = true;
                self.refresh_sessions().await;
            }
            Some(Effect::OpenFilePicker) => {
                self.upload_status = Some(READY_TO_UPLOAD_STATUS.to_string());
            }
            Some(Effect::NavigateToSignIn) | None => {}
        }
    }

    async fn persist_turn(&mut self, user_text: &str, bot_text: &str) -> Result<(), AppError> {
        let session_id = self.ensure_session(None).await?;
        let uid = self.uid().ok_or_else(|| AppError::Auth("Not signed in".to_string()))?;

        self.store
            .append_message(&session_id, NewMessage::user(user_text), &uid)
            .await?;
        self.store
            .append_message(&session_id, NewMessage::bot(bot_text), &uid)
            .await?;
        Ok(())
    }

    async fn persist_upload(
        &mut self,
        processing: &str,
        summary: &str,
        invoice_id: Option<String>,
    ) -> Result<(), AppError> {
        let title = format!("Invoice Analysis - {}", Local::now().format("%m/%d/%Y"));
        let session_id = self.ensure_session(Some(&title)).await?;
        let uid = self.uid().ok_or_else(|| AppError::Auth("Not signed in".to_string()))?;

        self.store
            .append_message(&session_id, NewMessage::bot(processing), &uid)
            .await?;
        self.store
            .append_message(
                &session_id,
                NewMessage::bot(summary).with_invoice(invoice_id),
                &uid,
            )
            .await?;
        Ok(())
    }

    /// The active session, created on first use.
    async fn ensure_session(&mut self, title: Option<&str>) -> Result<String, AppError> {
        if let Some(id) = &self.session_id {
            return Ok(id.clone());
        }

        let uid = self.uid().ok_or_else(|| AppError::Auth("Not signed in".to_string()))?;
        let session = self.store.create_session(&uid, title).await?;
        tracing::debug!(session_id = %session.id, "Session created for first persisted turn");

        self.session_id = Some(session.id.clone());
        self.refresh_sessions().await;
        Ok(session.id)
    }

    fn analyzed_invoice(&self, analysis: &InvoiceAnalysis) -> Option<Invoice> {
        let uid = self.uid()?;
        Some(Invoice {
            id: analysis.id.clone()?,
            user_id: uid,
            amount: analysis.total,
            date: Utc::now(),
            status: "Analyzed".to_string(),
            description: format!("Invoice from {}", analysis.store),
            items: Some(analysis.items.clone()),
            savings: analysis.savings.clone(),
        })
    }

    fn session_title(&self, session_id: &str) -> Option<String> {
        self.sessions
            .iter()
            .find(|s| s.id == session_id)
            .map(|s| s.title.clone())
    }

    fn extend_from_persisted(&mut self, persisted: &[ChatMessage]) {
        for message in persisted {
            let local_id = self.next_id();
            self.messages.push(ConversationMessage {
                local_id,
                role: message.role,
                content: message.content.clone(),
                timestamp: to_datetime(message.timestamp),
                invoice_id: message.metadata.invoice_id.clone(),
            });
        }
    }

    fn uid(&self) -> Option<String> {
        self.user.as_ref().map(|u| u.identity.uid.clone())
    }

    fn next_id(&mut self) -> u64 {
        self.next_local_id += 1;
        self.next_local_id
    }

    fn push_bot(&mut self, content: impl Into<String>) {
        self.push(MessageRole::Bot, content, None);
    }

    fn push(&mut self, role: MessageRole, content: impl Into<String>, invoice_id: Option<String>) {
        let local_id = self.next_id();
        self.messages.push(ConversationMessage {
            local_id,
            role,
            content: content.into(),
            timestamp: Utc::now(),
            invoice_id,
        });
    }
}

/// Human-readable summary of an analysis.
pub fn summarize_analysis(analysis: &InvoiceAnalysis) -> String {
    let mut response = format!(
        "I've analyzed your invoice from {} (${:.2}).\n\nKey insights:\n",
        analysis.store, analysis.total
    );

    match &analysis.savings {
        Some(savings) if savings.total > 0.0 => {
            response.push_str(&format!(
                "• You could save ${:.2} ({}%) by shopping at alternative stores\n",
                savings.total, savings.percentage
            ));
            for detail in &savings.details {
                response.push_str(&format!(
                    "• {} is ${:.2} cheaper at {}\n",
                    detail.item, detail.save, detail.store
                ));
            }
        }
        _ => response.push_str("• Great job! You've already found great prices on these items.\n"),
    }

    response.push_str("\nAsk me for more specific insights or recommendations!");
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::intent::{FALLBACK, HELP, SIGN_IN_NUDGE, UPLOAD_FIRST};
    use crate::db::{connect_in_memory, Savings};
    use crate::invoices::CannedAnalyzer;
    use sqlx::{Pool, Sqlite};

    async fn controller() -> (ConversationController, Arc<ChatSessionStore>, Pool<Sqlite>) {
        controller_with(PageSizes {
            messages: 50,
            history: 20,
        })
        .await
    }

    async fn controller_with(
        page_sizes: PageSizes,
    ) -> (ConversationController, Arc<ChatSessionStore>, Pool<Sqlite>) {
        let db = connect_in_memory().await.unwrap();
        let store = Arc::new(ChatSessionStore::new(db.clone(), 20));
        let invoices = Arc::new(InvoiceService::new(db.clone(), Arc::new(CannedAnalyzer), 10));
        let controller = ConversationController::new(store.clone(), invoices, page_sizes);
        (controller, store, db)
    }

    fn user(uid: &str) -> SignedInUser {
        SignedInUser::new(
            Identity {
                uid: uid.to_string(),
                email: format!("{}@example.com", uid),
                email_verified: true,
            },
            None,
        )
    }

    async fn session_count(db: &Pool<Sqlite>) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM chat_sessions")
            .fetch_one(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_starts_with_greeting() {
        let (controller, _, _) = controller().await;
        assert_eq!(controller.messages().len(), 1);
        assert_eq!(controller.messages()[0].content, GREETING);
        assert!(controller.user().is_none());
    }

    #[tokio::test]
    async fn test_anonymous_message_is_not_persisted() {
        let (mut controller, _, db) = controller().await;
        controller.set_input("show me savings");
        let effect = controller.submit_input().await;

        assert_eq!(effect, None);
        assert!(controller.input().is_empty());
        let last = controller.messages().last().unwrap();
        assert_eq!(last.content, SIGN_IN_NUDGE);
        assert!(controller.session_id().is_none());
        assert_eq!(session_count(&db).await, 0);
        let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM chat_messages")
            .fetch_one(&db)
            .await
            .unwrap();
        assert_eq!(stored, 0);
    }

    #[tokio::test]
    async fn test_two_turns_share_one_lazy_session() {
        let (mut controller, store, db) = controller().await;
        controller.on_signed_in(user("u1")).await;

        controller.send_message("help").await;
        controller.send_message("hello there").await;
        assert!(!controller.is_loading());

        assert_eq!(session_count(&db).await, 1);
        let session_id = controller.session_id().unwrap().to_string();
        let page = store
            .get_session_messages(&session_id, "u1", None, 50)
            .await
            .unwrap();
        let contents: Vec<_> = page.items.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["help", HELP, "hello there", FALLBACK]);
        assert_eq!(controller.sessions().len(), 1);
    }

    #[tokio::test]
    async fn test_local_ids_increase() {
        let (mut controller, _, _) = controller().await;
        controller.send_message("one").await;
        controller.send_message("two").await;
        let ids: Vec<_> = controller.messages().iter().map(|m| m.local_id).collect();
        assert!(ids.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_savings_without_invoices() {
        let (mut controller, _, _) = controller().await;
        controller.on_signed_in(user("u1")).await;
        assert!(controller.recent_invoices().is_empty());

        controller.send_message("find cheaper alternatives").await;
        assert_eq!(controller.messages().last().unwrap().content, UPLOAD_FIRST);
    }

    #[tokio::test]
    async fn test_upload_creates_session_and_two_messages() {
        let (mut controller, store, db) = controller().await;
        controller.on_signed_in(user("u1")).await;
        let before = controller.messages().len();

        assert!(controller.upload_file("receipt.pdf", b"%PDF").await);

        let added = &controller.messages()[before..];
        assert_eq!(added.len(), 2);
        assert_eq!(added[0].content, "Processing \"receipt.pdf\"...");
        assert!(added[1].content.starts_with("I've analyzed your invoice from Whole Foods Market"));
        assert!(added[1].invoice_id.is_some());
        assert!(controller.upload_status().is_none());

        assert_eq!(session_count(&db).await, 1);
        let session = &store.list_sessions("u1").await.unwrap()[0];
        assert!(session.title.starts_with("Invoice Analysis - "));
        let page = store
            .get_session_messages(&session.id, "u1", None, 50)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[1].metadata.invoice_id, added[1].invoice_id);
        assert_eq!(controller.recent_invoices().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_upload_is_not_persisted() {
        let (mut controller, _, db) = controller().await;
        controller.on_signed_in(user("u1")).await;

        assert!(!controller.upload_file("empty.png", b"").await);
        assert_eq!(controller.messages().last().unwrap().content, UPLOAD_FAILED);
        assert_eq!(session_count(&db).await, 0);
        assert!(!controller.take_notices().is_empty());
    }

    #[tokio::test]
    async fn test_save_request_prompts_for_title() {
        let (mut controller, _, db) = controller().await;
        controller.on_signed_in(user("u1")).await;

        let effect = controller.send_message("save this conversation").await;
        assert_eq!(effect, Some(Effect::PromptSessionTitle));
        assert!(controller.is_title_prompt_pending());
        assert_eq!(session_count(&db).await, 0);

        controller.create_new_session(Some("Weekly groceries")).await;
        assert!(!controller.is_title_prompt_pending());
        assert_eq!(controller.messages().len(), 1);
        assert_eq!(controller.messages()[0].content, NEW_SESSION_GREETING);
        assert_eq!(controller.sessions()[0].title, "Weekly groceries");
    }

    #[tokio::test]
    async fn test_create_session_requires_sign_in() {
        let (mut controller, _, db) = controller().await;
        controller.create_new_session(Some("nope")).await;
        assert_eq!(controller.messages().last().unwrap().content, SIGN_IN_PROMPT);
        assert_eq!(session_count(&db).await, 0);
    }

    #[tokio::test]
    async fn test_select_session_rebuilds_conversation() {
        let (mut controller, store, _) = controller().await;
        controller.on_signed_in(user("u1")).await;
        let session = store.create_session("u1", Some("Old")).await.unwrap();
        store
            .append_message(&session.id, NewMessage::user("earlier question"), "u1")
            .await
            .unwrap();
        store
            .append_message(&session.id, NewMessage::bot("earlier answer"), "u1")
            .await
            .unwrap();
        controller.refresh_sessions().await;

        controller.select_session(&session.id).await;
        let contents: Vec<_> = controller.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["earlier question", "earlier answer"]);
        assert_eq!(controller.session_id(), Some(session.id.as_str()));
        assert!(controller
            .take_notices()
            .iter()
            .any(|n| n.message() == "Loaded conversation: Old"));

        let empty = store.create_session("u1", None).await.unwrap();
        controller.select_session(&empty.id).await;
        assert_eq!(controller.messages()[0].content, EMPTY_SESSION_GREETING);
    }

    #[tokio::test]
    async fn test_foreign_session_selection_raises_notice() {
        let (mut controller, store, _) = controller().await;
        controller.on_signed_in(user("u1")).await;
        controller.send_message("hello").await;
        let own = controller.session_id().unwrap().to_string();
        controller.take_notices();
        let foreign = store.create_session("u2", None).await.unwrap();

        controller.select_session(&foreign.id).await;
        let notices = controller.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].message(), "Unauthorized access to chat session");
        assert_eq!(controller.session_id(), Some(own.as_str()));

        controller.send_message("still mine").await;
        assert!(controller.take_notices().is_empty());
        let page = store.get_session_messages(&own, "u1", None, 50).await.unwrap();
        assert!(page.items.iter().any(|m| m.content == "still mine"));
        let foreign_page = store
            .get_session_messages(&foreign.id, "u2", None, 50)
            .await
            .unwrap();
        assert!(foreign_page.items.is_empty());
    }

    #[tokio::test]
    async fn test_session_pages_load_on_demand() {
        let (mut controller, store, _) = controller_with(PageSizes {
            messages: 2,
            history: 20,
        })
        .await;
        controller.on_signed_in(user("u1")).await;
        let session = store.create_session("u1", None).await.unwrap();
        for content in ["first", "second", "third"] {
            store
                .append_message(&session.id, NewMessage::user(content), "u1")
                .await
                .unwrap();
        }

        controller.select_session(&session.id).await;
        assert_eq!(controller.messages().len(), 2);
        assert!(controller.has_more_session_messages());

        assert_eq!(controller.load_more().await, 1);
        assert_eq!(controller.messages().last().unwrap().content, "third");
        assert!(!controller.has_more_session_messages());
        assert_eq!(controller.load_more().await, 0);
    }

    #[tokio::test]
    async fn test_switching_accounts_starts_clean() {
        let (mut controller, store, _) = controller().await;
        controller.on_signed_in(user("alice")).await;
        controller.send_message("my secret alice note").await;
        let alice_session = controller.session_id().unwrap().to_string();

        controller.on_signed_in(user("bob")).await;
        assert_eq!(controller.user().unwrap().identity.uid, "bob");
        assert!(controller.session_id().is_none());
        assert!(!controller.is_title_prompt_pending());
        assert!(controller
            .messages()
            .iter()
            .all(|m| !m.content.contains("alice")));
        assert!(controller.messages()[1].content.starts_with("Welcome, bob!"));
        controller.take_notices();

        controller.send_message("hello from bob").await;
        assert!(controller.take_notices().is_empty());
        let bob_session = controller.session_id().unwrap().to_string();
        assert_ne!(bob_session, alice_session);
        let page = store
            .get_session_messages(&bob_session, "bob", None, 50)
            .await
            .unwrap();
        assert_eq!(page.items[0].content, "hello from bob");
        assert_eq!(store.list_sessions("alice").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_out_discards_user_state() {
        let (mut controller, _, _) = controller().await;
        controller.on_signed_in(user("u1")).await;
        controller.send_message("hello").await;
        assert!(controller.session_id().is_some());

        controller.on_signed_out();
        assert!(controller.user().is_none());
        assert!(controller.session_id().is_none());
        assert!(controller.sessions().is_empty());
        assert_eq!(controller.messages().len(), 1);
        assert_eq!(controller.messages()[0].content, GREETING);
    }

    #[tokio::test]
    async fn test_welcome_sent_once_per_sign_in() {
        let (mut controller, _, _) = controller().await;
        controller.on_signed_in(user("u1")).await;
        let count = controller.messages().len();
        controller.on_signed_in(user("u1")).await;
        assert_eq!(controller.messages().len(), count);
        assert!(controller.messages()[1].content.starts_with("Welcome, u1!"));
    }

    #[tokio::test]
    async fn test_history_pages_until_exhausted() {
        let (mut controller, _, _) = controller().await;
        controller.on_signed_in(user("u1")).await;
        for i in 0..11 {
            controller.send_message(&format!("note {}", i)).await;
        }

        // 22 stored messages, pages of 20
        let first = controller.load_history().await;
        assert_eq!(first.len(), 20);
        assert!(controller.has_more_history());
        let second = controller.load_history().await;
        assert_eq!(second.len(), 2);
        assert_eq!(second[0].content, "note 0");
        assert!(!controller.has_more_history());
        assert!(controller.load_history().await.is_empty());
    }

    #[test]
    fn test_summary_without_savings() {
        let analysis = InvoiceAnalysis {
            id: None,
            store: "Corner Shop".to_string(),
            items: Vec::new(),
            total: 12.0,
            savings: Some(Savings {
                total: 0.0,
                percentage: 0.0,
                details: Vec::new(),
            }),
        };
        let summary = summarize_analysis(&analysis);
        assert!(summary.starts_with("I've analyzed your invoice from Corner Shop ($12.00)."));
        assert!(summary.contains("Great job!"));
    }
}
