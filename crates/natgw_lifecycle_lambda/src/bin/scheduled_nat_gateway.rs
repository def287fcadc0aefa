use aws_sdk_ec2::types::{
    DomainType, Filter, NatGatewayState, ResourceType, Tag, TagSpecification,
};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use natgw_lifecycle_core::contract::{
    GatewayState, LifecycleResponse, DEFAULT_ROUTE_CIDR, ELASTIC_IP_TAG, NAT_GATEWAY_TAG,
    RESOURCE_TAG_KEY,
};
use natgw_lifecycle_core::routes::{DefaultRoute, RouteTableView};
use natgw_lifecycle_lambda::adapters::ec2::Ec2Api;
use natgw_lifecycle_lambda::handlers::lifecycle::{
    handle_lifecycle_event, LifecycleConfig, WaitConfig,
};

struct AwsEc2Api {
    client: aws_sdk_ec2::Client,
}

fn marker_tags(resource_type: ResourceType, tag_value: &str) -> TagSpecification {
    TagSpecification::builder()
        .resource_type(resource_type)
        .tags(
            Tag::builder()
                .key(RESOURCE_TAG_KEY)
                .value(tag_value)
                .build(),
        )
        .build()
}

fn map_gateway_state(state: &NatGatewayState) -> GatewayState {
    match state {
        NatGatewayState::Pending => GatewayState::Pending,
        NatGatewayState::Available => GatewayState::Available,
        NatGatewayState::Deleting => GatewayState::Deleting,
        NatGatewayState::Deleted => GatewayState::Deleted,
        NatGatewayState::Failed => GatewayState::Failed,
        _ => GatewayState::Unknown,
    }
}

impl Ec2Api for AwsEc2Api {
    fn allocate_tagged_address(&self) -> Result<String, String> {
        let client = self.client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let response = client
                    .allocate_address()
                    .domain(DomainType::Vpc)
                    .tag_specifications(marker_tags(ResourceType::ElasticIp, ELASTIC_IP_TAG))
                    .send()
                    .await
                    .map_err(|error| format!("failed to allocate elastic address: {error}"))?;
                response
                    .allocation_id()
                    .map(str::to_string)
                    .ok_or_else(|| "allocate address returned no allocation id".to_string())
            })
        })
    }

    fn create_tagged_nat_gateway(
        &self,
        subnet_id: &str,
        allocation_id: &str,
    ) -> Result<String, String> {
        let client = self.client.clone();
        let subnet_id = subnet_id.to_string();
        let allocation_id = allocation_id.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let response = client
                    .create_nat_gateway()
                    .subnet_id(subnet_id)
                    .allocation_id(allocation_id)
                    .tag_specifications(marker_tags(ResourceType::Natgateway, NAT_GATEWAY_TAG))
                    .send()
                    .await
                    .map_err(|error| format!("failed to create NAT Gateway: {error}"))?;
                response
                    .nat_gateway()
                    .and_then(|gateway| gateway.nat_gateway_id())
                    .map(str::to_string)
                    .ok_or_else(|| "create NAT Gateway returned no gateway id".to_string())
            })
        })
    }

    fn available_nat_gateways(&self, subnet_id: &str) -> Result<Vec<String>, String> {
        let client = self.client.clone();
        let subnet_id = subnet_id.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let response = client
                    .describe_nat_gateways()
                    .filter(Filter::builder().name("subnet-id").values(subnet_id).build())
                    .filter(Filter::builder().name("state").values("available").build())
                    .send()
                    .await
                    .map_err(|error| format!("failed to describe NAT Gateways: {error}"))?;
                Ok(response
                    .nat_gateways()
                    .iter()
                    .filter_map(|gateway| gateway.nat_gateway_id().map(str::to_string))
                    .collect())
            })
        })
    }

    fn nat_gateway_state(&self, nat_gateway_id: &str) -> Result<Option<GatewayState>, String> {
        let client = self.client.clone();
        let nat_gateway_id = nat_gateway_id.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let result = client
                    .describe_nat_gateways()
                    .nat_gateway_ids(nat_gateway_id)
                    .send()
                    .await;
                match result {
                    Ok(response) => Ok(response
                        .nat_gateways()
                        .first()
                        .and_then(|gateway| gateway.state())
                        .map(map_gateway_state)),
                    // Old gateways eventually stop being reported at all.
                    Err(error) if format!("{error:?}").contains("NatGatewayNotFound") => Ok(None),
                    Err(error) => Err(format!("failed to describe NAT Gateway: {error}")),
                }
            })
        })
    }

    fn delete_nat_gateway(&self, nat_gateway_id: &str) -> Result<(), String> {
        let client = self.client.clone();
        let nat_gateway_id = nat_gateway_id.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .delete_nat_gateway()
                    .nat_gateway_id(nat_gateway_id)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to delete NAT Gateway: {error}"))
            })
        })
    }

    fn tagged_address_allocation_ids(&self) -> Result<Vec<String>, String> {
        let client = self.client.clone();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let response = client
                    .describe_addresses()
                    .filters(
                        Filter::builder()
                            .name(format!("tag:{RESOURCE_TAG_KEY}"))
                            .values(ELASTIC_IP_TAG)
                            .build(),
                    )
                    .send()
                    .await
                    .map_err(|error| format!("failed to describe elastic addresses: {error}"))?;
                Ok(response
                    .addresses()
                    .iter()
                    .filter_map(|address| address.allocation_id().map(str::to_string))
                    .collect())
            })
        })
    }

    fn release_address(&self, allocation_id: &str) -> Result<(), String> {
        let client = self.client.clone();
        let allocation_id = allocation_id.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .release_address()
                    .allocation_id(allocation_id)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to release elastic address: {error}"))
            })
        })
    }

    fn route_tables_for_subnet(&self, subnet_id: &str) -> Result<Vec<RouteTableView>, String> {
        let client = self.client.clone();
        let subnet_id = subnet_id.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                let response = client
                    .describe_route_tables()
                    .filters(
                        Filter::builder()
                            .name("association.subnet-id")
                            .values(subnet_id)
                            .build(),
                    )
                    .send()
                    .await
                    .map_err(|error| format!("failed to describe route tables: {error}"))?;
                Ok(response
                    .route_tables()
                    .iter()
                    .filter_map(|table| {
                        let route_table_id = table.route_table_id()?.to_string();
                        let default_route = table
                            .routes()
                            .iter()
                            .find(|route| {
                                route.destination_cidr_block() == Some(DEFAULT_ROUTE_CIDR)
                            })
                            .map(|route| DefaultRoute {
                                nat_gateway_id: route.nat_gateway_id().map(str::to_string),
                            });
                        Some(RouteTableView {
                            route_table_id,
                            default_route,
                        })
                    })
                    .collect())
            })
        })
    }

    fn create_default_route(
        &self,
        route_table_id: &str,
        nat_gateway_id: &str,
    ) -> Result<(), String> {
        let client = self.client.clone();
        let route_table_id = route_table_id.to_string();
        let nat_gateway_id = nat_gateway_id.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .create_route()
                    .route_table_id(route_table_id)
                    .destination_cidr_block(DEFAULT_ROUTE_CIDR)
                    .nat_gateway_id(nat_gateway_id)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to create route: {error}"))
            })
        })
    }

    fn replace_default_route(
        &self,
        route_table_id: &str,
        nat_gateway_id: &str,
    ) -> Result<(), String> {
        let client = self.client.clone();
        let route_table_id = route_table_id.to_string();
        let nat_gateway_id = nat_gateway_id.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .replace_route()
                    .route_table_id(route_table_id)
                    .destination_cidr_block(DEFAULT_ROUTE_CIDR)
                    .nat_gateway_id(nat_gateway_id)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to replace route: {error}"))
            })
        })
    }

    fn delete_default_route(&self, route_table_id: &str) -> Result<(), String> {
        let client = self.client.clone();
        let route_table_id = route_table_id.to_string();

        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .delete_route()
                    .route_table_id(route_table_id)
                    .destination_cidr_block(DEFAULT_ROUTE_CIDR)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|error| format!("failed to delete route: {error}"))
            })
        })
    }
}

async fn handle_request(event: LambdaEvent<Value>) -> Result<LifecycleResponse, Error> {
    let config = LifecycleConfig {
        public_subnet_id: std::env::var("PUBLIC_SUBNET_ID")
            .map_err(|_| Error::from("PUBLIC_SUBNET_ID must be configured"))?,
        private_subnet_id: std::env::var("PRIVATE_SUBNET_ID")
            .map_err(|_| Error::from("PRIVATE_SUBNET_ID must be configured"))?,
        wait: WaitConfig::default(),
    };

    let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let ec2 = AwsEc2Api {
        client: aws_sdk_ec2::Client::new(&aws_config),
    };

    handle_lifecycle_event(event.payload, &config, &ec2).map_err(Error::from)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    lambda_runtime::run(service_fn(handle_request)).await
}
