use serde::Serialize;

use fanout_core::{InboundNotification, Version};

/// One successful worker publish.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchedHandler {
    pub handler: String,
    pub message_id: Option<String>,
}

/// Summary of one fanned-out notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchReport {
    pub resource_id: String,
    pub version: Version,
    pub dispatched: Vec<DispatchedHandler>,
}

impl DispatchReport {
    pub fn new(inbound: &InboundNotification) -> Self {
        Self {
            resource_id: inbound.id.clone(),
            version: inbound.version.clone(),
            dispatched: Vec::new(),
        }
    }

    pub fn handlers(&self) -> Vec<&str> {
        self.dispatched.iter().map(|d| d.handler.as_str()).collect()
    }
}
