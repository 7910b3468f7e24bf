//! Transition table
//!
//! Maps an inbound line (already split into command or free text) and the
//! owner's conversation state to the action to run and the state that
//! follows it. Commands never consult the state.

use crate::command::{Command, DONE};
use crate::models::ConversationState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportWindow {
    All,
    Day,
    Month,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action<'a> {
    Start,
    Help,
    BeginEntry,
    TableReport(ReportWindow),
    DocumentReport,
    RemoveLast,
    Clear,
    BeginTag,
    ListTags,
    RecordEntry(&'a str),
    CreateTag(&'a str),
    AttachTag(&'a str),
    CloseTagging,
    NotUnderstood,
}

impl<'a> Action<'a> {
    pub fn from_command(command: Command) -> Self {
        match command {
            Command::Start => Action::Start,
            Command::Help => Action::Help,
            Command::AddEntry => Action::BeginEntry,
            Command::GetReport => Action::TableReport(ReportWindow::All),
            Command::GetDayReport => Action::TableReport(ReportWindow::Day),
            Command::GetMonthReport => Action::TableReport(ReportWindow::Month),
            Command::GetPdfReport => Action::DocumentReport,
            Command::RemoveLast => Action::RemoveLast,
            Command::Clear => Action::Clear,
            Command::AddTag => Action::BeginTag,
            Command::ListTag => Action::ListTags,
        }
    }

    /// Free-text continuation for the owner's current state
    pub fn continuation(state: ConversationState, text: &'a str) -> Self {
        match state {
            ConversationState::Idle => Action::NotUnderstood,
            ConversationState::AwaitingEntry => Action::RecordEntry(text),
            ConversationState::AwaitingTagName => Action::CreateTag(text),
            ConversationState::AwaitingTagAssignment if text == DONE => Action::CloseTagging,
            ConversationState::AwaitingTagAssignment => Action::AttachTag(text),
        }
    }

    /// State written after the action succeeds; `None` leaves it untouched
    pub fn next_state(&self) -> Option<ConversationState> {
        match self {
            Action::BeginEntry => Some(ConversationState::AwaitingEntry),
            Action::BeginTag => Some(ConversationState::AwaitingTagName),
            Action::RecordEntry(_) => Some(ConversationState::AwaitingTagAssignment),
            Action::CreateTag(_) | Action::CloseTagging => Some(ConversationState::Idle),
            Action::Start
            | Action::Help
            | Action::TableReport(_)
            | Action::DocumentReport
            | Action::RemoveLast
            | Action::Clear
            | Action::ListTags
            | Action::AttachTag(_)
            | Action::NotUnderstood => None,
        }
    }

    /// Whether the action commits a ledger write before the state write
    pub fn writes_ledger(&self) -> bool {
        matches!(self, Action::RecordEntry(_) | Action::CreateTag(_))
    }

    /// Whether the reply carries the tag attachment keyboard
    pub fn offers_keyboard(&self) -> bool {
        matches!(self, Action::RecordEntry(_) | Action::AttachTag(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Start => "start",
            Action::Help => "help",
            Action::BeginEntry => "begin_entry",
            Action::TableReport(ReportWindow::All) => "report",
            Action::TableReport(ReportWindow::Day) => "day_report",
            Action::TableReport(ReportWindow::Month) => "month_report",
            Action::DocumentReport => "document_report",
            Action::RemoveLast => "remove_last",
            Action::Clear => "clear",
            Action::BeginTag => "begin_tag",
            Action::ListTags => "list_tags",
            Action::RecordEntry(_) => "record_entry",
            Action::CreateTag(_) => "create_tag",
            Action::AttachTag(_) => "attach_tag",
            Action::CloseTagging => "close_tagging",
            Action::NotUnderstood => "not_understood",
        }
    }
}
