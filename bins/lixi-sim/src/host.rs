//! Host-side collaborators: log every notice, command, and handed-out item.

use parking_lot::Mutex;
use tracing::{info, warn};

use lixi_core::error::DispatchError;
use lixi_core::notice::Notice;
use lixi_core::traits::{ItemSink, Notifier, RewardDispatcher, TokenCarrier};
use lixi_core::types::AccountId;

/// Renders notices as structured log lines.
pub struct LoggingNotifier;

fn render(notice: &Notice) -> String {
    serde_json::to_string(notice).unwrap_or_else(|e| format!("<unrenderable notice: {e}>"))
}

impl Notifier for LoggingNotifier {
    fn notify(&self, recipient: &AccountId, notice: Notice) {
        if let Notice::Rejected { kind, reason } = &notice {
            warn!(%recipient, kind = kind.as_str(), %reason, "rejected");
            return;
        }
        info!(%recipient, event = notice.category(), detail = %render(&notice), "notice");
    }

    fn broadcast(&self, notice: Notice) {
        info!(event = notice.category(), detail = %render(&notice), "broadcast");
    }

    fn play_effect(&self, actor: &AccountId) {
        info!(%actor, "lixi effect");
    }
}

/// Logs reward commands instead of executing them.
pub struct ConsoleDispatcher;

impl RewardDispatcher for ConsoleDispatcher {
    fn dispatch(&self, command: &str) -> Result<(), DispatchError> {
        info!(%command, "reward command");
        Ok(())
    }
}

/// Keeps handed-out carriers so the simulation can redeem them later.
#[derive(Default)]
pub struct Holdings {
    items: Mutex<Vec<(AccountId, Box<dyn TokenCarrier>)>>,
}

impl Holdings {
    /// Take the most recent carrier given to `holder`.
    pub fn take(&self, holder: &AccountId) -> Option<Box<dyn TokenCarrier>> {
        let mut items = self.items.lock();
        let pos = items.iter().rposition(|(h, _)| h == holder)?;
        Some(items.remove(pos).1)
    }
}

impl ItemSink for Holdings {
    fn give(&self, actor: &AccountId, carrier: Box<dyn TokenCarrier>) {
        info!(%actor, kind = ?carrier.kind(), token = ?carrier.read_identifier(), "item given");
        self.items.lock().push((*actor, carrier));
    }
}
