use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    Unchanged,
    Selected(String),
    Cleared,
}

/// The chat history the session is looking at. Last writer wins.
///
/// Clones share the same cell, so every surface that holds one observes the
/// same value. Subscribers are only woken by real changes.
#[derive(Debug, Clone)]
pub struct Selection {
    tx: watch::Sender<Option<String>>,
}

impl Default for Selection {
    fn default() -> Self {
        Self::new()
    }
}

impl Selection {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    pub fn current(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    pub fn is_current(&self, chat_id: &str) -> bool {
        self.tx.borrow().as_deref() == Some(chat_id)
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.tx.subscribe()
    }

    pub fn set(&self, chat_id: Option<String>) -> SelectionChange {
        let mut change = SelectionChange::Unchanged;
        self.tx.send_if_modified(|current| {
            if *current == chat_id {
                return false;
            }
            change = match &chat_id {
                Some(id) => SelectionChange::Selected(id.clone()),
                None => SelectionChange::Cleared,
            };
            *current = chat_id.clone();
            true
        });
        change
    }
}

#[cfg(test)]
mod tests {
    use super::{Selection, SelectionChange};

    #[test]
    fn set_reports_transition_kind() {
        let selection = Selection::new();
        assert_eq!(selection.current(), None);

        assert_eq!(
            selection.set(Some("a".to_string())),
            SelectionChange::Selected("a".to_string())
        );
        assert_eq!(
            selection.set(Some("b".to_string())),
            SelectionChange::Selected("b".to_string())
        );
        assert_eq!(selection.set(None), SelectionChange::Cleared);
        assert_eq!(selection.set(None), SelectionChange::Unchanged);
    }

    #[test]
    fn same_value_does_not_notify_subscribers() {
        let selection = Selection::new();
        let mut rx = selection.subscribe();

        selection.set(Some("a".to_string()));
        assert!(rx.has_changed().expect("sender alive"));
        rx.borrow_and_update();

        assert_eq!(selection.set(Some("a".to_string())), SelectionChange::Unchanged);
        assert!(!rx.has_changed().expect("sender alive"));
    }

    #[test]
    fn clones_share_the_same_cell() {
        let header = Selection::new();
        let drawer = header.clone();

        drawer.set(Some("h1".to_string()));
        assert!(header.is_current("h1"));
        assert_eq!(header.current(), Some("h1".to_string()));
    }
}
