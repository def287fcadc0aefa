use std::thread;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use natgw_lifecycle_core::contract::{
    GatewayState, LifecycleEvent, LifecycleResponse, Operation, GATEWAY_WAIT_MAX_ATTEMPTS,
    GATEWAY_WAIT_POLL_DELAY,
};
use natgw_lifecycle_core::routes::{plan_route_actions, RouteAction};

use crate::adapters::ec2::Ec2Api;

/// Poll budget for the gateway state waits. Tests shrink it so they run
/// without sleeping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaitConfig {
    pub max_attempts: usize,
    pub poll_delay: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            max_attempts: GATEWAY_WAIT_MAX_ATTEMPTS,
            poll_delay: GATEWAY_WAIT_POLL_DELAY,
        }
    }
}

impl WaitConfig {
    fn timeout_secs(&self) -> u64 {
        self.poll_delay
            .as_secs()
            .saturating_mul(self.max_attempts as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub public_subnet_id: String,
    pub private_subnet_id: String,
    pub wait: WaitConfig,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("No NAT Gateway found in subnet {0}")]
    GatewayNotFound(String),
    #[error("no elastic address tagged Name=scheduled-nat-eip found")]
    AddressNotFound,
    #[error("NAT Gateway {nat_gateway_id} did not reach state {target} within {timeout_secs}s")]
    WaitTimeout {
        nat_gateway_id: String,
        target: GatewayState,
        timeout_secs: u64,
    },
    #[error("NAT Gateway {0} entered state failed")]
    GatewayFailed(String),
    #[error("{0}")]
    Api(String),
}

impl From<String> for LifecycleError {
    fn from(message: String) -> Self {
        LifecycleError::Api(message)
    }
}

#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid lifecycle event: {0}")]
    InvalidEvent(String),
    #[error("Failed to {operation} NAT Gateway: {source}")]
    Phase {
        operation: Operation,
        source: LifecycleError,
    },
}

/// Entry point shared by the Lambda binary and the tests: parse the trigger
/// payload, run the requested lifecycle step, then reconcile the private
/// subnet's default routes. Every failure past parsing is wrapped with the
/// phase it occurred in.
pub fn handle_lifecycle_event(
    event: Value,
    config: &LifecycleConfig,
    ec2: &dyn Ec2Api,
) -> Result<LifecycleResponse, HandlerError> {
    let event: LifecycleEvent = serde_json::from_value(event)
        .map_err(|error| HandlerError::InvalidEvent(error.to_string()))?;
    let operation = event.operation;

    run_lifecycle(operation, config, ec2).map_err(|source| {
        error!(%operation, cause = %source, "lifecycle operation failed");
        HandlerError::Phase { operation, source }
    })
}

fn run_lifecycle(
    operation: Operation,
    config: &LifecycleConfig,
    ec2: &dyn Ec2Api,
) -> Result<LifecycleResponse, LifecycleError> {
    let nat_gateway_id = match operation {
        Operation::Create => create_nat_gateway(ec2, &config.public_subnet_id, &config.wait)?,
        Operation::Delete => delete_nat_gateway(ec2, &config.public_subnet_id, &config.wait)?,
    };

    reconcile_routes(
        ec2,
        &nat_gateway_id,
        &config.private_subnet_id,
        operation.is_create(),
    )?;

    Ok(LifecycleResponse::success(operation, &nat_gateway_id))
}

/// Allocate a tagged address, create the gateway, and wait for it to become
/// available. An address allocated before a failed gateway creation is left
/// behind; there is no compensating release.
fn create_nat_gateway(
    ec2: &dyn Ec2Api,
    public_subnet_id: &str,
    wait: &WaitConfig,
) -> Result<String, LifecycleError> {
    let allocation_id = ec2.allocate_tagged_address()?;
    let nat_gateway_id = ec2.create_tagged_nat_gateway(public_subnet_id, &allocation_id)?;

    info!(%nat_gateway_id, %allocation_id, "created NAT Gateway, waiting until available");
    wait_for_gateway(ec2, &nat_gateway_id, GatewayState::Available, wait)?;

    Ok(nat_gateway_id)
}

/// Find the available gateway in the subnet, delete it, wait until it is
/// gone, then release the tagged address.
fn delete_nat_gateway(
    ec2: &dyn Ec2Api,
    public_subnet_id: &str,
    wait: &WaitConfig,
) -> Result<String, LifecycleError> {
    let nat_gateway_id = ec2
        .available_nat_gateways(public_subnet_id)?
        .into_iter()
        .next()
        .ok_or_else(|| LifecycleError::GatewayNotFound(public_subnet_id.to_string()))?;

    // First tag match wins; multiple tagged addresses are not disambiguated
    // against the gateway being deleted.
    let allocation_id = ec2
        .tagged_address_allocation_ids()?
        .into_iter()
        .next()
        .ok_or(LifecycleError::AddressNotFound)?;

    info!(%nat_gateway_id, "deleting NAT Gateway, waiting until deleted");
    ec2.delete_nat_gateway(&nat_gateway_id)?;
    wait_for_gateway(ec2, &nat_gateway_id, GatewayState::Deleted, wait)?;

    ec2.release_address(&allocation_id)?;

    Ok(nat_gateway_id)
}

fn wait_for_gateway(
    ec2: &dyn Ec2Api,
    nat_gateway_id: &str,
    target: GatewayState,
    wait: &WaitConfig,
) -> Result<(), LifecycleError> {
    for attempt in 0..wait.max_attempts {
        if attempt > 0 {
            thread::sleep(wait.poll_delay);
        }

        match ec2.nat_gateway_state(nat_gateway_id)? {
            Some(state) if state == target => return Ok(()),
            Some(GatewayState::Failed) => {
                return Err(LifecycleError::GatewayFailed(nat_gateway_id.to_string()));
            }
            Some(_) => {}
            // A gateway the provider no longer reports is gone.
            None if target == GatewayState::Deleted => return Ok(()),
            None => {
                return Err(LifecycleError::Api(format!(
                    "NAT Gateway {nat_gateway_id} is no longer reported by the provider"
                )));
            }
        }
    }

    Err(LifecycleError::WaitTimeout {
        nat_gateway_id: nat_gateway_id.to_string(),
        target,
        timeout_secs: wait.timeout_secs(),
    })
}

/// Bring the default route of every route table associated with the private
/// subnet in line with the gateway, creating/replacing on the create flow and
/// removing only routes that target the deleted gateway on the delete flow.
fn reconcile_routes(
    ec2: &dyn Ec2Api,
    nat_gateway_id: &str,
    private_subnet_id: &str,
    is_create: bool,
) -> Result<(), LifecycleError> {
    let tables = ec2.route_tables_for_subnet(private_subnet_id)?;

    for action in plan_route_actions(&tables, nat_gateway_id, is_create) {
        match action {
            RouteAction::Create { route_table_id } => {
                info!(%route_table_id, %nat_gateway_id, "creating default route");
                ec2.create_default_route(&route_table_id, nat_gateway_id)?;
            }
            RouteAction::Replace { route_table_id } => {
                info!(%route_table_id, %nat_gateway_id, "replacing default route target");
                ec2.replace_default_route(&route_table_id, nat_gateway_id)?;
            }
            RouteAction::Delete { route_table_id } => {
                info!(%route_table_id, %nat_gateway_id, "deleting default route");
                ec2.delete_default_route(&route_table_id)?;
            }
        }
    }

    Ok(())
}
