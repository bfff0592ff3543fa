use std::sync::Arc;

use crate::broker::BrokerConnector;
use crate::config::AppConfig;
use crate::email::NotificationDispatcher;
use crate::tasks::upstream::{SubgroupApi, TaskApi};

/// Shared handler state. The collaborator seams are trait objects so tests
/// can substitute fakes for the remote task API, the broker, and the mail
/// transport.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub tasks: Arc<dyn TaskApi>,
    pub subgroups: Arc<dyn SubgroupApi>,
    pub broker: Arc<dyn BrokerConnector>,
    pub notifier: NotificationDispatcher,
}
