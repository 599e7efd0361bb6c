use anyhow::Result;
use tokio::task::JoinHandle;

use crate::client::ChatClient;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8085/mcp";

/// Characters added to the visible reply on every tick.
const REVEAL_STEP: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn label(self) -> &'static str {
        match self {
            ChatRole::User => "You",
            ChatRole::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: u64,
    pub role: ChatRole,
    pub label: String,
    pub content: String,
    pub revealing: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Endpoint,
    Chat,
    Input,
}

/// Everything needed to issue one request. The endpoint URL is snapshotted
/// here at submit time, so later edits to the field never retarget a request
/// that is already on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub message_id: u64,
    pub url: String,
    pub prompt: String,
}

struct RevealState {
    message_id: u64,
    full_text: String,
    shown: usize,
}

pub struct App {
    pub should_quit: bool,
    pub focus: FocusPane,

    // Conversation store (append-only, trailing placeholder is the only
    // record ever mutated)
    pub messages: Vec<ChatMessage>,
    next_message_id: u64,

    // Endpoint field
    pub endpoint_input: String,
    pub endpoint_cursor: usize,

    // Prompt input (multiline)
    pub input: String,
    pub input_cursor: usize,

    // Chat viewport bookkeeping (updated during render)
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub total_chat_lines: u16,
    pub follow_chat: bool,

    // Request in flight
    awaiting_reply: Option<u64>,
    pub request_task: Option<JoinHandle<Result<String>>>,
    pub animation_frame: u8,

    // Reveal animation
    reveal: Option<RevealState>,

    pub client: ChatClient,
}

impl App {
    pub fn new(endpoint: String) -> Self {
        let endpoint_cursor = endpoint.chars().count();
        Self {
            should_quit: false,
            focus: FocusPane::Input,

            messages: Vec::new(),
            next_message_id: 0,

            endpoint_input: endpoint,
            endpoint_cursor,

            input: String::new(),
            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            total_chat_lines: 0,
            follow_chat: true,

            awaiting_reply: None,
            request_task: None,
            animation_frame: 0,

            reveal: None,

            client: ChatClient::new(),
        }
    }

    pub fn is_awaiting_reply(&self) -> bool {
        self.awaiting_reply.is_some()
    }

    pub fn awaiting_message_id(&self) -> Option<u64> {
        self.awaiting_reply
    }

    fn push_message(&mut self, role: ChatRole, content: String, revealing: bool) -> u64 {
        let id = self.next_message_id;
        self.next_message_id += 1;
        self.messages.push(ChatMessage {
            id,
            role,
            label: role.label().to_string(),
            content,
            revealing,
        });
        self.follow_chat = true;
        id
    }

    /// Start one submission cycle from the current input buffer. Appends the
    /// user record and the assistant placeholder, clears the input, and hands
    /// back what the caller needs to spawn the network task. Returns None for
    /// whitespace-only input and while a request is already outstanding.
    pub fn begin_submission(&mut self) -> Option<Submission> {
        if self.awaiting_reply.is_some() {
            return None;
        }

        let prompt = self.input.trim().to_string();
        if prompt.is_empty() {
            return None;
        }

        // A reveal still running from the previous exchange is finished
        // instantly so the new placeholder becomes the only mutable record.
        self.finish_reveal();

        let url = self.endpoint_input.trim().to_string();
        self.push_message(ChatRole::User, prompt.clone(), false);
        let message_id = self.push_message(ChatRole::Assistant, String::new(), true);

        self.input.clear();
        self.input_cursor = 0;
        self.animation_frame = 0;
        self.awaiting_reply = Some(message_id);

        Some(Submission {
            message_id,
            url,
            prompt,
        })
    }

    /// The response body arrived; start revealing it. Ignored if the record
    /// already reached a terminal state.
    pub fn complete_request(&mut self, message_id: u64, text: String) {
        if self.awaiting_reply != Some(message_id) {
            return;
        }
        self.awaiting_reply = None;
        self.reveal = Some(RevealState {
            message_id,
            full_text: text,
            shown: 0,
        });
        self.follow_chat = true;
    }

    /// Transport failure: the record goes terminal immediately, no reveal.
    pub fn fail_request(&mut self, message_id: u64, message: &str) {
        if self.awaiting_reply != Some(message_id) {
            return;
        }
        self.awaiting_reply = None;

        let message = if message.is_empty() {
            "Unknown error"
        } else {
            message
        };
        let content = format!("Error: {message}");
        if let Some(msg) = self.messages.iter_mut().rev().find(|m| m.id == message_id) {
            msg.content = content;
            msg.revealing = false;
        }
        self.follow_chat = true;
    }

    /// Poll the in-flight request task and apply its outcome once finished.
    pub async fn poll_request(&mut self) {
        let finished = self
            .request_task
            .as_ref()
            .map_or(false, |task| task.is_finished());
        if !finished {
            return;
        }

        let Some(task) = self.request_task.take() else {
            return;
        };
        let Some(message_id) = self.awaiting_reply else {
            return;
        };

        match task.await {
            Ok(Ok(text)) => self.complete_request(message_id, text),
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "request failed");
                self.fail_request(message_id, &err.to_string());
            }
            Err(err) => {
                tracing::warn!(error = %err, "request task panicked");
                self.fail_request(message_id, &err.to_string());
            }
        }
    }

    /// Tick animation frame and reveal progress (called by Tick event)
    pub fn on_tick(&mut self) {
        if self.awaiting_reply.is_some() {
            self.animation_frame = self.animation_frame.wrapping_add(1);
        }
        self.advance_reveal();
    }

    fn advance_reveal(&mut self) {
        let Some(reveal) = self.reveal.as_mut() else {
            return;
        };

        let total = reveal.full_text.chars().count();
        reveal.shown = (reveal.shown + REVEAL_STEP).min(total);
        let done = reveal.shown >= total;
        let prefix: String = reveal.full_text.chars().take(reveal.shown).collect();
        let message_id = reveal.message_id;

        if let Some(msg) = self.messages.iter_mut().rev().find(|m| m.id == message_id) {
            msg.content = prefix;
            if done {
                msg.revealing = false;
            }
        }
        if done {
            self.reveal = None;
        }
        self.follow_chat = true;
    }

    fn finish_reveal(&mut self) {
        if let Some(reveal) = self.reveal.take() {
            if let Some(msg) = self
                .messages
                .iter_mut()
                .rev()
                .find(|m| m.id == reveal.message_id)
            {
                msg.content = reveal.full_text;
                msg.revealing = false;
            }
        }
    }

    /// Animated ellipsis for the pending placeholder, derived from the tick
    /// counter (one step roughly every 300ms).
    pub fn thinking_dots(&self) -> String {
        ".".repeat((self.animation_frame as usize / 10) % 3 + 1)
    }

    // Chat scrolling. Manual movement releases the stick-to-bottom follow;
    // scrolling back to the end re-engages it.
    pub fn scroll_chat_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
        self.follow_chat = false;
    }

    pub fn scroll_chat_down(&mut self) {
        let max = self.max_chat_scroll();
        if self.chat_scroll < max {
            self.chat_scroll += 1;
        }
        if self.chat_scroll >= max {
            self.follow_chat = true;
        }
    }

    pub fn scroll_chat_half_page_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(self.chat_height / 2);
        self.follow_chat = false;
    }

    pub fn scroll_chat_half_page_down(&mut self) {
        let max = self.max_chat_scroll();
        self.chat_scroll = (self.chat_scroll + self.chat_height / 2).min(max);
        if self.chat_scroll >= max {
            self.follow_chat = true;
        }
    }

    pub fn scroll_chat_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow_chat = false;
    }

    pub fn scroll_chat_to_bottom(&mut self) {
        self.chat_scroll = self.max_chat_scroll();
        self.follow_chat = true;
    }

    pub fn max_chat_scroll(&self) -> u16 {
        self.total_chat_lines.saturating_sub(self.chat_height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> App {
        App::new(DEFAULT_ENDPOINT.to_string())
    }

    #[test]
    fn submission_appends_user_then_placeholder() {
        let mut app = test_app();
        app.input = "  hello there  ".to_string();

        let sub = app.begin_submission().expect("submission");

        assert_eq!(app.messages.len(), 2);
        assert_eq!(app.messages[0].role, ChatRole::User);
        assert_eq!(app.messages[0].content, "hello there");
        assert_eq!(app.messages[0].label, "You");
        assert_eq!(app.messages[1].role, ChatRole::Assistant);
        assert_eq!(app.messages[1].content, "");
        assert_eq!(app.messages[1].label, "assistant");
        assert!(app.messages[1].revealing);

        assert_eq!(sub.prompt, "hello there");
        assert_eq!(sub.url, DEFAULT_ENDPOINT);
        assert_eq!(sub.message_id, app.messages[1].id);
        assert!(app.input.is_empty());
    }

    #[test]
    fn whitespace_only_input_is_a_no_op() {
        let mut app = test_app();
        app.input = "  \n\t ".to_string();

        assert!(app.begin_submission().is_none());
        assert!(app.messages.is_empty());
    }

    #[test]
    fn submission_rejected_while_request_outstanding() {
        let mut app = test_app();
        app.input = "first".to_string();
        let first = app.begin_submission().expect("submission");

        app.input = "second".to_string();
        assert!(app.begin_submission().is_none());
        assert_eq!(app.messages.len(), 2);
        assert_eq!(app.input, "second");

        // After the reply lands, submitting works again.
        app.complete_request(first.message_id, "done".to_string());
        assert!(app.begin_submission().is_some());
    }

    #[test]
    fn reveal_advances_two_chars_per_tick_and_terminates() {
        let mut app = test_app();
        app.input = "hi".to_string();
        let sub = app.begin_submission().expect("submission");
        app.complete_request(sub.message_id, "abcdef".to_string());

        app.on_tick();
        assert_eq!(app.messages[1].content, "ab");
        assert!(app.messages[1].revealing);

        app.on_tick();
        assert_eq!(app.messages[1].content, "abcd");

        app.on_tick();
        assert_eq!(app.messages[1].content, "abcdef");
        assert!(!app.messages[1].revealing);

        // Terminal: further ticks change nothing.
        app.on_tick();
        assert_eq!(app.messages[1].content, "abcdef");
        assert!(!app.messages[1].revealing);
    }

    #[test]
    fn reveal_is_char_boundary_safe() {
        let mut app = test_app();
        app.input = "hi".to_string();
        let sub = app.begin_submission().expect("submission");
        let text = "héllo wörld ✓";
        app.complete_request(sub.message_id, text.to_string());

        for _ in 0..text.chars().count() {
            app.on_tick();
        }
        assert_eq!(app.messages[1].content, text);
        assert!(!app.messages[1].revealing);
    }

    #[test]
    fn empty_reply_terminates_on_first_tick() {
        let mut app = test_app();
        app.input = "hi".to_string();
        let sub = app.begin_submission().expect("submission");
        app.complete_request(sub.message_id, String::new());

        app.on_tick();
        assert_eq!(app.messages[1].content, "");
        assert!(!app.messages[1].revealing);
    }

    #[test]
    fn failure_sets_error_text_without_reveal() {
        let mut app = test_app();
        app.input = "hi".to_string();
        let sub = app.begin_submission().expect("submission");

        app.fail_request(sub.message_id, "timeout");
        assert_eq!(app.messages[1].content, "Error: timeout");
        assert!(!app.messages[1].revealing);

        // No reveal ticks happen afterwards.
        app.on_tick();
        assert_eq!(app.messages[1].content, "Error: timeout");
    }

    #[test]
    fn failure_with_empty_message_uses_fallback() {
        let mut app = test_app();
        app.input = "hi".to_string();
        let sub = app.begin_submission().expect("submission");

        app.fail_request(sub.message_id, "");
        assert_eq!(app.messages[1].content, "Error: Unknown error");
    }

    #[test]
    fn terminal_records_ignore_late_outcomes() {
        let mut app = test_app();
        app.input = "hi".to_string();
        let sub = app.begin_submission().expect("submission");

        app.fail_request(sub.message_id, "timeout");
        app.complete_request(sub.message_id, "too late".to_string());
        app.on_tick();

        assert_eq!(app.messages[1].content, "Error: timeout");
        assert!(!app.messages[1].revealing);
    }

    #[test]
    fn endpoint_edit_applies_to_next_submission_only() {
        let mut app = test_app();
        app.input = "one".to_string();
        let first = app.begin_submission().expect("submission");
        assert_eq!(first.url, DEFAULT_ENDPOINT);

        // Editing the field mid-flight does not touch the snapshot.
        app.endpoint_input = "http://localhost:9999/other".to_string();
        assert_eq!(first.url, DEFAULT_ENDPOINT);

        app.complete_request(first.message_id, "ok".to_string());
        app.input = "two".to_string();
        let second = app.begin_submission().expect("submission");
        assert_eq!(second.url, "http://localhost:9999/other");
    }

    #[test]
    fn new_submission_fast_forwards_running_reveal() {
        let mut app = test_app();
        app.input = "one".to_string();
        let first = app.begin_submission().expect("submission");
        app.complete_request(first.message_id, "abcdef".to_string());
        app.on_tick();
        assert_eq!(app.messages[1].content, "ab");

        app.input = "two".to_string();
        let second = app.begin_submission().expect("submission");
        assert!(second.message_id > first.message_id);

        assert_eq!(app.messages.len(), 4);
        assert_eq!(app.messages[1].content, "abcdef");
        assert!(!app.messages[1].revealing);
        assert!(app.messages[3].revealing);
    }
}
