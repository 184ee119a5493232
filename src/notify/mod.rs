//! Best-effort price-drop notifications.

pub mod email;

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::db::UserDirectory;
use crate::types::{NotificationEvent, ProductRecord};
pub use email::{price_drop_email, EmailError, LogMailer, Mailer, SmtpMailer};

/// Sends the email side of a notification off the caller's path.
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    users: Arc<dyn UserDirectory>,
    app_base_url: String,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, users: Arc<dyn UserDirectory>, app_base_url: String) -> Self {
        Self {
            mailer,
            users,
            app_base_url,
        }
    }

    /// Spawn the email for `event`. Failures are logged and never reach the caller;
    /// the handle exists for tests and shutdown draining.
    pub fn dispatch(
        &self,
        product: ProductRecord,
        event: NotificationEvent,
        email_enabled: bool,
    ) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            if !email_enabled {
                info!(user_id = event.user_id, "[EMAIL] notifications disabled, skipping");
                return;
            }
            let to = match this.users.email_for(event.user_id).await {
                Ok(Some(address)) => address,
                Ok(None) => {
                    warn!(user_id = event.user_id, "[EMAIL] no address on file");
                    return;
                }
                Err(e) => {
                    warn!(user_id = event.user_id, "[EMAIL] address lookup failed: {e}");
                    return;
                }
            };

            let (subject, html) =
                price_drop_email(&product, event.old_price, event.new_price, &this.app_base_url);
            match this.mailer.send(&to, &subject, &html).await {
                Ok(()) => info!(product_id = product.id, "[EMAIL] price drop sent to {to}"),
                Err(e) => warn!(product_id = product.id, "[EMAIL] send to {to} failed: {e}"),
            }
        })
    }
}


#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::testing::RecordingMailer;
    use super::*;
    use crate::db::store::testing::{memory_store, new_product};
    use crate::db::TrackingStore;
    use crate::types::NotificationKind;

    fn event(user_id: i64, product_id: i64) -> NotificationEvent {
        NotificationEvent {
            id: 1,
            user_id,
            product_id,
            kind: NotificationKind::PriceDrop,
            old_price: 120.0,
            new_price: 90.0,
            read: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn sends_to_the_owner() {
        let store = Arc::new(memory_store().await);
        let owner = store.create_user("ada@example.com").await.unwrap();
        let product = store
            .create_product(&new_product(owner, 120.0, Some(100.0)), Utc::now())
            .await
            .unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = Notifier::new(mailer.clone(), store.clone(), "http://localhost:5173".into());

        notifier.dispatch(product.clone(), event(owner, product.id), true).await.unwrap();

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "ada@example.com");
        assert!(sent[0].1.starts_with("Price Drop Alert: "));
    }

    #[tokio::test]
    async fn disabled_or_unknown_owner_sends_nothing() {
        let store = Arc::new(memory_store().await);
        let owner = store.create_user("ada@example.com").await.unwrap();
        let product = store
            .create_product(&new_product(owner, 120.0, Some(100.0)), Utc::now())
            .await
            .unwrap();
        let mailer = Arc::new(RecordingMailer::default());
        let notifier = Notifier::new(mailer.clone(), store.clone(), String::new());

        notifier.dispatch(product.clone(), event(owner, product.id), false).await.unwrap();
        notifier.dispatch(product.clone(), event(owner + 7, product.id), true).await.unwrap();

        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_failure_stays_inside_the_task() {
        let store = Arc::new(memory_store().await);
        let owner = store.create_user("ada@example.com").await.unwrap();
        let product = store
            .create_product(&new_product(owner, 120.0, Some(100.0)), Utc::now())
            .await
            .unwrap();
        let mailer = Arc::new(RecordingMailer {
            fail: true,
            ..Default::default()
        });
        let notifier = Notifier::new(mailer.clone(), store.clone(), String::new());

        let joined = notifier.dispatch(product.clone(), event(owner, product.id), true).await;
        assert!(joined.is_ok(), "task completes normally");
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }
}
