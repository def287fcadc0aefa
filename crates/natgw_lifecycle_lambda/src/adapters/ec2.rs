use natgw_lifecycle_core::contract::GatewayState;
use natgw_lifecycle_core::routes::RouteTableView;

/// Seam over the EC2 control plane.
///
/// Implementations map provider responses into the handler's view types and
/// pass provider failure messages through verbatim. All resource tagging
/// (`Name=scheduled-nat-gateway` / `Name=scheduled-nat-eip`) happens behind
/// this trait so the handler only reasons about ids and states.
pub trait Ec2Api {
    /// Allocate a tagged VPC elastic address and return its allocation id.
    fn allocate_tagged_address(&self) -> Result<String, String>;

    /// Create a tagged NAT gateway in the subnet using the allocation and
    /// return the new gateway id.
    fn create_tagged_nat_gateway(
        &self,
        subnet_id: &str,
        allocation_id: &str,
    ) -> Result<String, String>;

    /// Ids of NAT gateways in the subnet currently in state `available`.
    fn available_nat_gateways(&self, subnet_id: &str) -> Result<Vec<String>, String>;

    /// Current state of one gateway, `None` when the provider no longer
    /// reports it.
    fn nat_gateway_state(&self, nat_gateway_id: &str) -> Result<Option<GatewayState>, String>;

    fn delete_nat_gateway(&self, nat_gateway_id: &str) -> Result<(), String>;

    /// Allocation ids of elastic addresses carrying the marker tag.
    fn tagged_address_allocation_ids(&self) -> Result<Vec<String>, String>;

    fn release_address(&self, allocation_id: &str) -> Result<(), String>;

    /// Route tables associated with the subnet, with their default route.
    fn route_tables_for_subnet(&self, subnet_id: &str) -> Result<Vec<RouteTableView>, String>;

    fn create_default_route(
        &self,
        route_table_id: &str,
        nat_gateway_id: &str,
    ) -> Result<(), String>;

    fn replace_default_route(
        &self,
        route_table_id: &str,
        nat_gateway_id: &str,
    ) -> Result<(), String>;

    fn delete_default_route(&self, route_table_id: &str) -> Result<(), String>;
}
