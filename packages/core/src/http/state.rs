use std::sync::Arc;

use crate::broker::ConnectionBroker;
use crate::config::GatewayConfig;
use crate::tenant::TemplateEngine;

#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<ConnectionBroker>,
    pub config: Arc<GatewayConfig>,
    pub templates: Arc<TemplateEngine>,
}
