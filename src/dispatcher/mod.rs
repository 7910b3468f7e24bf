//! Command dispatcher
//!
//! INPUT → (COMMAND | STATE + FREE TEXT) → ACTION → STORES → REPLY → NEXT STATE
//!
//! The dispatcher holds no per-owner state of its own; everything that
//! survives a message lives in the injected stores.

pub mod action;
pub mod keyboard;

pub use action::{Action, ReportWindow};
pub use keyboard::attach_keyboard;

use crate::clock::{Clock, SystemClock};
use crate::command::{parse_entry_text, Command};
use crate::error::BotError;
use crate::ledger::{LedgerStore, TagStore};
use crate::models::{Entry, ReplyPayload, Tag, TimeRange};
use crate::report::{self, DocumentBackend, PdfBackend};
use crate::state::StateStore;
use crate::stores::Stores;
use crate::Result;
use chrono::Local;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

const START_TEXT: &str =
    "Send the /addentry command to insert a new entry with this format `<VALUE> <DESCRIPTION>` or /help";

const HELP_TEXT: &str = "
/start - Start a conversation with the bot
/addentry - Prepare the bot to receive a entry information
/getreport - Ask the bot to produce a report from your information
/getdayreport - Ask the bot to produce a report with the day information
/getmonthreport - Ask the bot to produce a report with the month information
/getpdfreport - Ask the bot to produce a PDF report from your information
/removelast - Ask the bot to remove the last entry
/addtag - Ask the bot to receive a tag name
/listtag - Ask the bot to list your tags
/clear - Ask the bot to clear all your data
/help - Display this help message
";

const ADD_ENTRY_TEXT: &str = "Send the entry information, something like this: `14.00 pot`. \
If the value was less than zero, I will mark it as a payment";

const NOT_UNDERSTOOD_TEXT: &str = "Oops, I did not understand you :'( ";

/// Default bound on the store work of one message
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(55);

/// Interprets inbound lines against the ledger and the conversation state
pub struct Dispatcher {
    ledger: Arc<dyn LedgerStore>,
    tags: Arc<dyn TagStore>,
    states: Arc<dyn StateStore>,
    documents: Box<dyn DocumentBackend>,
    clock: Box<dyn Clock>,
    store_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        tags: Arc<dyn TagStore>,
        states: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            ledger,
            tags,
            states,
            documents: Box::new(PdfBackend),
            clock: Box::new(SystemClock),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn from_stores(stores: Stores) -> Self {
        Self::new(stores.ledger, stores.tags, stores.states)
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_document_backend(mut self, backend: Box<dyn DocumentBackend>) -> Self {
        self.documents = backend;
        self
    }

    /// Handle one message, turning any failure into the reply body
    pub async fn respond(&self, owner: &str, text: &str) -> ReplyPayload {
        match self.handle(owner, text).await {
            Ok(reply) => reply,
            Err(error) => {
                warn!(owner = %owner, error = %error, "Message handling failed");
                ReplyPayload::plain(error.to_string())
            }
        }
    }

    /// Handle one message for `owner`
    pub async fn handle(&self, owner: &str, text: &str) -> Result<ReplyPayload> {
        let span = tracing::info_span!("dispatch", request_id = %Uuid::new_v4(), owner = %owner);
        self.dispatch(owner, text).instrument(span).await
    }

    async fn dispatch(&self, owner: &str, text: &str) -> Result<ReplyPayload> {
        let deadline = Instant::now() + self.store_timeout;

        let action = match Command::parse(text) {
            Some(command) => Action::from_command(command),
            None => {
                let state = self
                    .bounded(deadline, "load state", self.states.get(owner))
                    .await?;
                debug!(state = %state, "Interpreting free text");
                Action::continuation(state, text)
            }
        };

        info!(action = action.name(), "Dispatching");

        let reply = self.execute(owner, &action, deadline).await?;

        if let Some(next) = action.next_state() {
            let saved = self
                .bounded(deadline, "save state", self.states.set(owner, next))
                .await;
            if let Err(error) = saved {
                if action.writes_ledger() {
                    warn!(
                        action = action.name(),
                        next_state = %next,
                        "Ledger updated but conversation state was not saved"
                    );
                }
                return Err(error);
            }
            debug!(next_state = %next, "State saved");
        }

        // Keyboard comes after the state write: a recorded entry never stays
        // under AwaitingEntry
        if action.offers_keyboard() {
            let keyboard = self.keyboard(owner, deadline).await?;
            return Ok(reply.with_keyboard(keyboard));
        }

        Ok(reply)
    }

    async fn execute(
        &self,
        owner: &str,
        action: &Action<'_>,
        deadline: Instant,
    ) -> Result<ReplyPayload> {
        match *action {
            Action::Start => Ok(ReplyPayload::markdown(START_TEXT)),
            Action::Help => Ok(ReplyPayload::markdown(HELP_TEXT)),
            Action::BeginEntry => Ok(ReplyPayload::markdown(ADD_ENTRY_TEXT)),
            Action::BeginTag => Ok(ReplyPayload::plain("Send the tag name")),
            Action::NotUnderstood => Ok(ReplyPayload::plain(NOT_UNDERSTOOD_TEXT)),

            Action::TableReport(window) => {
                let range = self.window_range(window)?;
                let entries = self
                    .bounded(deadline, "query entries", self.ledger.query(owner, range))
                    .await?;
                Ok(ReplyPayload::markdown(report::render_table(&entries)))
            }

            Action::DocumentReport => {
                let entries = self
                    .bounded(deadline, "query entries", self.ledger.query(owner, None))
                    .await?;
                let file = report::render_document(
                    self.documents.as_ref(),
                    &entries,
                    owner,
                    self.clock.now(),
                )?;
                info!(file = %file.name, bytes = file.content.len(), "Document report rendered");
                Ok(ReplyPayload::file(file))
            }

            Action::RemoveLast => {
                let delete = self.ledger.delete_most_recent(owner);
                self.bounded(deadline, "delete last entry", delete).await?;
                Ok(ReplyPayload::plain("Okay, it's gone. ;)"))
            }

            Action::Clear => {
                self.bounded(deadline, "delete entries", self.ledger.delete_all(owner))
                    .await?;
                Ok(ReplyPayload::plain("Okay, everything is gone. ;)"))
            }

            Action::ListTags => {
                let tags = self
                    .bounded(deadline, "list tags", self.tags.list_by_owner(owner))
                    .await?;
                Ok(ReplyPayload::markdown(report::render_tag_table(&tags)))
            }

            Action::RecordEntry(text) => {
                let parsed = parse_entry_text(text)?;
                let entry = Entry::from_signed(owner, parsed.amount, parsed.description, self.clock.now());
                debug!(value = entry.value, is_payment = entry.is_payment, "Recording entry");

                self.bounded(deadline, "append entry", self.ledger.append(entry))
                    .await?;
                Ok(ReplyPayload::plain("Ok, I will remember this."))
            }

            Action::CreateTag(name) => {
                let tag = Tag {
                    name: name.to_string(),
                    owner: owner.to_string(),
                    created_at: self.clock.now(),
                };
                self.bounded(deadline, "append tag", self.tags.append(tag)).await?;
                Ok(ReplyPayload::plain("Ok, you can use this now."))
            }

            Action::AttachTag(tag) => {
                let attach = self.ledger.attach_tag_to_most_recent(owner, tag);
                self.bounded(deadline, "attach tag", attach).await?;
                Ok(ReplyPayload::plain("Ok, added!"))
            }

            Action::CloseTagging => Ok(ReplyPayload::plain("Ok, done!").removing_keyboard()),
        }
    }

    async fn keyboard(&self, owner: &str, deadline: Instant) -> Result<Vec<Vec<String>>> {
        let tags = self
            .bounded(deadline, "list tags", self.tags.list_by_owner(owner))
            .await?;
        Ok(attach_keyboard(&tags))
    }

    /// Report window in the bot's local calendar
    fn window_range(&self, window: ReportWindow) -> Result<Option<TimeRange>> {
        let now = self.clock.now().with_timezone(&Local);
        match window {
            ReportWindow::All => Ok(None),
            ReportWindow::Day => TimeRange::day_of(&now).map(Some),
            ReportWindow::Month => TimeRange::month_of(&now).map(Some),
        }
    }

    /// Run a store call under the message deadline
    async fn bounded<T, F>(&self, deadline: Instant, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout_at(deadline, call).await {
            Ok(result) => result,
            Err(_) => Err(BotError::Timeout(format!(
                "{} ran past the {:?} message deadline",
                operation, self.store_timeout
            ))),
        }
    }
}
