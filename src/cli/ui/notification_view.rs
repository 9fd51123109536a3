use std::fmt::{self, Display, Formatter};

use crate::notification::Notification;

use super::painter::Painter;

/// Renders the notifications still visible at the end of a command.
pub(crate) struct NotificationsView<'a> {
    notifications: &'a [Notification],
    painter: &'a Painter,
}

impl<'a> NotificationsView<'a> {
    pub(crate) fn new(notifications: &'a [Notification], painter: &'a Painter) -> Self {
        Self {
            notifications,
            painter,
        }
    }
}

impl Display for NotificationsView<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, notification) in self.notifications.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(
                f,
                "{} {}",
                self.painter.muted(format!("[{}]", notification.kind())),
                self.painter
                    .notification(notification.kind(), notification.message())
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use insta::assert_snapshot;

    use super::*;
    use crate::notification::{NotificationKind, NotificationQueue};

    #[tokio::test]
    async fn notifications_render_one_per_line() {
        let queue = NotificationQueue::default();
        queue.post("Found 3 devices", NotificationKind::Success);
        queue.post("AI diagnosis failed", NotificationKind::Error);
        let painter = Painter::new(false);

        let rendered = NotificationsView::new(&queue.list(), &painter).to_string();

        assert_snapshot!(rendered, @r"
        [success] Found 3 devices
        [error] AI diagnosis failed
        ");
    }
}
