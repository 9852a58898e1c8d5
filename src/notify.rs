use async_trait::async_trait;

/// New-account notification collaborator. Fire-and-forget: a failed
/// notification must never roll back the account that triggered it, so the
/// contract has no error channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_new_account_notification(&self, email_to: &str, username: &str, password: &str);
}

/// Default collaborator: records the event instead of delivering mail.
/// Actual delivery is owned by external infrastructure.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_new_account_notification(&self, email_to: &str, username: &str, _password: &str) {
        tracing::info!(email_to = %email_to, username = %username, "new account notification");
    }
}
