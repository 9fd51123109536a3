use std::collections::BTreeMap;
use std::io;
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use serde::Serialize;
use tracing::instrument;

use crate::diagnosis::TranslationTable;
use crate::hw::DeviceInfoRecord;
use crate::notification::{Notification, NotificationId};
use crate::session::{SessionManager, SessionSnapshot};
use crate::terminal::TerminalClient;

use super::OutputFormat;
use super::ui::{NotificationsView, Painter, Spinner};

/// Everything a device command needs, wired once per invocation.
pub(crate) struct CommandContext<'a> {
    session: SessionManager,
    labels: TranslationTable,
    terminal_client: &'a dyn TerminalClient,
    output_format: OutputFormat,
    seen: Mutex<BTreeMap<NotificationId, Notification>>,
}

/// JSON document written by device commands.
#[derive(Debug, Serialize)]
struct CommandReport {
    session: SessionSnapshot,
    notifications: Vec<Notification>,
}

impl<'a> CommandContext<'a> {
    pub(crate) fn new(
        session: SessionManager,
        labels: TranslationTable,
        terminal_client: &'a dyn TerminalClient,
        output_format: OutputFormat,
    ) -> Self {
        Self {
            session,
            labels,
            terminal_client,
            output_format,
            seen: Mutex::new(BTreeMap::new()),
        }
    }

    pub(crate) fn session(&self) -> &SessionManager {
        &self.session
    }

    pub(crate) fn labels(&self) -> &TranslationTable {
        &self.labels
    }

    pub(crate) fn output_format(&self) -> OutputFormat {
        self.output_format
    }

    pub(crate) fn painter(&self) -> Painter {
        Painter::new(self.terminal_client.stdout_is_terminal())
    }

    pub(crate) fn spinner(&self) -> Spinner {
        Spinner::for_terminal(self.terminal_client)
    }

    /// Scans, selects `device_id` and connects to it.
    ///
    /// # Errors
    ///
    /// Returns the session error of the first step that fails.
    #[instrument(skip(self), level = "info")]
    pub(crate) async fn open(&self, device_id: &str) -> Result<DeviceInfoRecord> {
        let spinner = self.spinner();
        spinner
            .with_spinner("Scanning for devices", || self.session.scan())
            .await?;
        self.record_notifications();
        self.session.select(device_id)?;

        let record = spinner
            .with_spinner("Connecting", || self.session.connect())
            .await;
        self.record_notifications();
        Ok(record?)
    }

    /// Remembers the currently visible notifications so none expire unseen
    /// before the command finishes.
    pub(crate) fn record_notifications(&self) {
        let visible = self.session.notifications().list();
        let mut seen = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        for notification in visible {
            seen.entry(notification.id()).or_insert(notification);
        }
    }

    pub(crate) fn notifications(&self) -> Vec<Notification> {
        self.record_notifications();
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    fn report(&self, session: SessionSnapshot) -> CommandReport {
        CommandReport {
            session,
            notifications: self.notifications(),
        }
    }

    /// Writes the collected notifications after a blank line, if any.
    pub(crate) fn write_notifications<W>(&self, out: &mut W) -> Result<()>
    where
        W: io::Write,
    {
        let notifications = self.notifications();
        if !notifications.is_empty() {
            let painter = self.painter();
            writeln!(out)?;
            writeln!(out, "{}", NotificationsView::new(&notifications, &painter))?;
        }
        Ok(())
    }

    /// Writes the session snapshot and notifications as pretty-printed JSON.
    pub(crate) fn write_json<W>(&self, out: &mut W, session: SessionSnapshot) -> Result<()>
    where
        W: io::Write,
    {
        serde_json::to_writer_pretty(&mut *out, &self.report(session))?;
        writeln!(out)?;
        Ok(())
    }
}
