use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::json;
use tokio::sync::{mpsc, Semaphore};

use crate::utils::logger::LOGGER;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub type DeliveryFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
pub type Transport = Arc<dyn Fn(EmailMessage) -> DeliveryFuture + Send + Sync>;

/// Fire-and-forget outbound mail. Messages go through a bounded queue drained
/// by a single dispatcher; each delivery runs in its own task under a
/// semaphore. Callers never wait on delivery and never see its errors.
#[derive(Clone)]
pub struct Mailer {
    tx: mpsc::Sender<EmailMessage>,
}

impl Mailer {
    /// Starts the dispatcher with the log-only transport.
    pub fn start(concurrency: usize, capacity: usize) -> Self {
        Self::with_transport(concurrency, capacity, Arc::new(log_transport))
    }

    pub fn with_transport(concurrency: usize, capacity: usize, transport: Transport) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(dispatch(rx, Arc::new(Semaphore::new(concurrency.max(1))), transport));
        Self { tx }
    }

    /// Returns false when the message was dropped (queue full or closed).
    pub fn send(&self, message: EmailMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                tracing::warn!("Mail queue full, dropping message to {}", message.to);
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                tracing::warn!("Mail queue closed, dropping message to {}", message.to);
                false
            }
        }
    }

    /// Feeds a batch into the queue from a detached task, waiting for room
    /// instead of dropping. The caller returns immediately.
    pub fn broadcast(&self, messages: Vec<EmailMessage>) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let total = messages.len();
            for message in messages {
                if tx.send(message).await.is_err() {
                    tracing::warn!("Mail queue closed during broadcast of {} messages", total);
                    return;
                }
            }
            tracing::debug!("Queued broadcast of {} messages", total);
        });
    }
}

async fn dispatch(
    mut rx: mpsc::Receiver<EmailMessage>,
    permits: Arc<Semaphore>,
    transport: Transport,
) {
    while let Some(message) = rx.recv().await {
        let permit = match permits.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };
        let transport = transport.clone();

        tokio::spawn(async move {
            let to = message.to.clone();
            let subject = message.subject.clone();
            if let Err(e) = transport(message).await {
                LOGGER.log_error(
                    &format!("Email delivery failed: {}", e),
                    json!({"to": to, "subject": subject}),
                );
            }
            drop(permit);
        });
    }
}

fn log_transport(message: EmailMessage) -> DeliveryFuture {
    Box::pin(async move {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "Email dispatched: {}",
            message.body
        );
        Ok(())
    })
}

pub fn welcome_email(to: &str, name: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Welcome to E-Learning Platform".to_string(),
        body: format!(
            "Hi {},\n\nYour account has been successfully created.\nYou can now enroll in courses and start learning.\n\nHappy Learning!",
            name
        ),
    }
}

pub fn enrollment_email(to: &str, course_title: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Enrollment Confirmed".to_string(),
        body: format!(
            "You have successfully enrolled in:\n{}\n\nStart learning now!",
            course_title
        ),
    }
}

pub fn payment_email(to: &str, course_title: &str, amount: f64) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Payment Successful".to_string(),
        body: format!(
            "Payment confirmed for course:\n{}\nAmount Paid: {:.2}\n\nYou can now enroll.",
            course_title, amount
        ),
    }
}

pub fn course_published_email(to: &str, course_title: &str, teacher_name: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: format!("New course available: {}", course_title),
        body: format!(
            "{} just published \"{}\". Have a look and enroll today!",
            teacher_name, course_title
        ),
    }
}

pub fn verification_email(to: &str, base_url: &str, token: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Email Verification".to_string(),
        body: format!(
            "Click the link to verify your email: {}/verify-email/{}",
            base_url.trim_end_matches('/'),
            token
        ),
    }
}

pub fn password_reset_email(to: &str, base_url: &str, token: &str) -> EmailMessage {
    EmailMessage {
        to: to.to_string(),
        subject: "Password Reset".to_string(),
        body: format!(
            "Click the link to reset your password (expires in 1 hour): {}/reset-password?token={}",
            base_url.trim_end_matches('/'),
            token
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn message(to: &str) -> EmailMessage {
        EmailMessage {
            to: to.to_string(),
            subject: "s".into(),
            body: "b".into(),
        }
    }

    #[tokio::test]
    async fn test_messages_reach_transport() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let transport: Transport = Arc::new(move |msg: EmailMessage| -> DeliveryFuture {
            let seen_tx = seen_tx.clone();
            Box::pin(async move {
                seen_tx.send(msg.to).ok();
                Ok(())
            })
        });
        let mailer = Mailer::with_transport(2, 8, transport);

        assert!(mailer.send(message("a@example.com")));
        assert!(mailer.send(message("b@example.com")));

        let mut delivered = Vec::new();
        for _ in 0..2 {
            let to = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
                .await
                .unwrap()
                .unwrap();
            delivered.push(to);
        }
        delivered.sort();
        assert_eq!(delivered, vec!["a@example.com", "b@example.com"]);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let transport: Transport = Arc::new(move |msg: EmailMessage| -> DeliveryFuture {
            let seen_tx = seen_tx.clone();
            Box::pin(async move {
                seen_tx.send(msg.to.clone()).ok();
                if msg.to.starts_with("bad") {
                    anyhow::bail!("smtp down");
                }
                Ok(())
            })
        });
        let mailer = Mailer::with_transport(1, 8, transport);

        mailer.send(message("bad@example.com"));
        mailer.send(message("good@example.com"));

        let first = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv()).await.unwrap();
        let second = tokio::time::timeout(Duration::from_secs(2), seen_rx.recv()).await.unwrap();
        assert_eq!(first.as_deref(), Some("bad@example.com"));
        assert_eq!(second.as_deref(), Some("good@example.com"));
    }

    #[tokio::test]
    async fn test_full_queue_drops_without_blocking() {
        let transport: Transport = Arc::new(|_msg: EmailMessage| -> DeliveryFuture {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            })
        });
        let mailer = Mailer::with_transport(1, 1, transport);

        let accepted = (0..10)
            .map(|i| mailer.send(message(&format!("{}@example.com", i))))
            .filter(|ok| *ok)
            .count();
        assert!(accepted < 10);
        assert!(accepted >= 1);
    }

    #[tokio::test]
    async fn test_broadcast_waits_for_room() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let transport: Transport = Arc::new(move |msg: EmailMessage| -> DeliveryFuture {
            let seen_tx = seen_tx.clone();
            Box::pin(async move {
                seen_tx.send(msg.to).ok();
                Ok(())
            })
        });
        let mailer = Mailer::with_transport(1, 1, transport);

        mailer.broadcast((0..20).map(|i| message(&format!("{}@example.com", i))).collect());

        for _ in 0..20 {
            tokio::time::timeout(Duration::from_secs(2), seen_rx.recv())
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[test]
    fn test_templates() {
        let email = enrollment_email("s@example.com", "Rust 101");
        assert_eq!(email.subject, "Enrollment Confirmed");
        assert!(email.body.contains("Rust 101"));

        let email = verification_email("s@example.com", "http://localhost:3000/", "tok");
        assert!(email.body.ends_with("http://localhost:3000/verify-email/tok"));

        let email = payment_email("s@example.com", "Rust 101", 100.0);
        assert!(email.body.contains("100.00"));
    }
}
