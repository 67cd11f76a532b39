pub mod email_service;
pub mod notification_service;
pub mod sweeper;

pub use email_service::{BookingConfirmation, EmailConfig, EmailService, Mailer};
pub use notification_service::{DbNotifier, Notifier, Severity};
pub use sweeper::{spawn_sweeper, ExpirySweeper, SweepReport, SweeperConfig};
