//! Consumer-side subscription handle.

use arcstr::ArcStr;
use tokio::sync::mpsc;
use tracing::trace;

use super::dispatcher::MessageRouter;
use crate::topic::SubscriptionId;
use crate::transport::Message;

/// Consumer handle for one registered pattern subscription.
///
/// Receives every routed message whose topic structurally matches the
/// pattern. Dropping the handle (or calling
/// [`Subscription::unsubscribe`]) removes exactly this subscriber from
/// the table; other subscribers, and the wire-level subscription owned by
/// the link, are unaffected.
pub struct Subscription {
	id: SubscriptionId,
	pattern: ArcStr,
	receiver: mpsc::Receiver<Message>,
	router: MessageRouter,
	active: bool,
}

impl Subscription {
	pub(crate) fn new(
		id: SubscriptionId,
		pattern: ArcStr,
		receiver: mpsc::Receiver<Message>,
		router: MessageRouter,
	) -> Self {
		Self {
			id,
			pattern,
			receiver,
			router,
			active: true,
		}
	}

	/// Waits for the next matching message.
	///
	/// Returns `None` once the subscription has been removed and its
	/// buffer drained.
	pub async fn recv(&mut self) -> Option<Message> {
		self.receiver.recv().await
	}

	/// Returns a buffered message without waiting, if one is available.
	pub fn try_recv(&mut self) -> Option<Message> {
		self.receiver.try_recv().ok()
	}

	/// Removes this subscriber from the table.
	///
	/// Idempotent: repeat calls (and the implicit call on drop) are
	/// no-ops.
	pub fn unsubscribe(&mut self) {
		if !self.active {
			return;
		}
		self.active = false;
		let removed = self.router.remove(self.id);
		trace!(id = %self.id, pattern = %self.pattern, removed, "subscription released");
	}

	/// The pattern this subscription was registered under.
	pub fn pattern(&self) -> &str {
		&self.pattern
	}

	/// The table id of this subscription.
	pub fn id(&self) -> SubscriptionId {
		self.id
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		self.unsubscribe();
	}
}
