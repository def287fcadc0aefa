use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tag key applied to every resource the handler creates.
pub const RESOURCE_TAG_KEY: &str = "Name";

/// Marker tag value for the scheduled NAT gateway. Resources are rediscovered
/// by this tag on later invocations; no id is held across runs.
pub const NAT_GATEWAY_TAG: &str = "scheduled-nat-gateway";

/// Marker tag value for the elastic address bound to the gateway.
pub const ELASTIC_IP_TAG: &str = "scheduled-nat-eip";

/// Destination of the default route the handler manages.
pub const DEFAULT_ROUTE_CIDR: &str = "0.0.0.0/0";

/// Poll budget for the gateway state waits: 40 polls spaced 15 seconds apart
/// bound each wait at 600 seconds, matching the invocation timeout.
pub const GATEWAY_WAIT_MAX_ATTEMPTS: usize = 40;
pub const GATEWAY_WAIT_POLL_DELAY: Duration = Duration::from_secs(15);

/// Lifecycle step requested by a scheduled trigger.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Delete,
}

impl Operation {
    pub fn is_create(self) -> bool {
        matches!(self, Operation::Create)
    }

    /// Past-tense form used in the success body.
    pub fn past_tense(self) -> &'static str {
        match self {
            Operation::Create => "created",
            Operation::Delete => "deleted",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => f.write_str("create"),
            Operation::Delete => f.write_str("delete"),
        }
    }
}

/// Payload delivered by the scheduled triggers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LifecycleEvent {
    pub operation: Operation,
}

/// Success payload returned to the invoker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LifecycleResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl LifecycleResponse {
    pub fn success(operation: Operation, nat_gateway_id: &str) -> Self {
        Self {
            status_code: 200,
            body: format!(
                "Successfully {} NAT Gateway {}",
                operation.past_tense(),
                nat_gateway_id
            ),
        }
    }
}

/// Provider-reported NAT gateway states the handler distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayState {
    Pending,
    Available,
    Deleting,
    Deleted,
    Failed,
    Unknown,
}

impl fmt::Display for GatewayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GatewayState::Pending => "pending",
            GatewayState::Available => "available",
            GatewayState::Deleting => "deleting",
            GatewayState::Deleted => "deleted",
            GatewayState::Failed => "failed",
            GatewayState::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn parses_lowercase_operations() {
        let event: LifecycleEvent =
            serde_json::from_value(json!({"operation": "create"})).expect("event should parse");
        assert_eq!(event.operation, Operation::Create);

        let event: LifecycleEvent =
            serde_json::from_value(json!({"operation": "delete"})).expect("event should parse");
        assert_eq!(event.operation, Operation::Delete);
    }

    #[test]
    fn rejects_unknown_operation() {
        let result = serde_json::from_value::<LifecycleEvent>(json!({"operation": "recreate"}));
        assert!(result.is_err());
    }

    #[test]
    fn success_response_names_operation_and_gateway() {
        let response = LifecycleResponse::success(Operation::Create, "nat-0123");
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "Successfully created NAT Gateway nat-0123");

        let response = LifecycleResponse::success(Operation::Delete, "nat-0123");
        assert_eq!(response.body, "Successfully deleted NAT Gateway nat-0123");
    }

    #[test]
    fn response_serializes_with_camel_case_status() {
        let response = LifecycleResponse::success(Operation::Create, "nat-0123");
        let value = serde_json::to_value(&response).expect("response should serialize");
        assert_eq!(value["statusCode"], json!(200));
    }
}
