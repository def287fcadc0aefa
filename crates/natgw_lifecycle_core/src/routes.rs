//! Pure planning for default-route reconciliation.
//!
//! The adapter reports each route table associated with the private subnet as
//! a [`RouteTableView`]; planning decides which mutations bring the default
//! routes in line with the desired gateway without touching routes that point
//! somewhere else.

/// Default route (`0.0.0.0/0`) of a route table, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultRoute {
    /// Gateway the route targets, `None` when the target is not a NAT gateway
    /// (an internet gateway, for example).
    pub nat_gateway_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTableView {
    pub route_table_id: String,
    pub default_route: Option<DefaultRoute>,
}

/// Mutation to apply to a route table's default route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAction {
    Create { route_table_id: String },
    Replace { route_table_id: String },
    Delete { route_table_id: String },
}

/// Compute the route mutations for one reconciliation pass.
///
/// Create flow: a missing default route is created, a default route with any
/// other target is replaced, and a route already on the gateway is left
/// alone. Delete flow: only routes targeting the gateway under delete are
/// removed. Planning over the post-application state yields no actions.
pub fn plan_route_actions(
    tables: &[RouteTableView],
    nat_gateway_id: &str,
    is_create: bool,
) -> Vec<RouteAction> {
    let mut actions = Vec::new();

    for table in tables {
        let targets_gateway = table
            .default_route
            .as_ref()
            .and_then(|route| route.nat_gateway_id.as_deref())
            == Some(nat_gateway_id);

        if is_create {
            match &table.default_route {
                None => actions.push(RouteAction::Create {
                    route_table_id: table.route_table_id.clone(),
                }),
                Some(_) if targets_gateway => {}
                Some(_) => actions.push(RouteAction::Replace {
                    route_table_id: table.route_table_id.clone(),
                }),
            }
        } else if targets_gateway {
            actions.push(RouteAction::Delete {
                route_table_id: table.route_table_id.clone(),
            });
        }
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(route_table_id: &str, target: Option<Option<&str>>) -> RouteTableView {
        RouteTableView {
            route_table_id: route_table_id.to_string(),
            default_route: target.map(|nat_gateway_id| DefaultRoute {
                nat_gateway_id: nat_gateway_id.map(str::to_string),
            }),
        }
    }

    /// Mirror the provider's behavior so idempotence can be checked in-plan.
    fn apply(tables: &mut [RouteTableView], actions: &[RouteAction], nat_gateway_id: &str) {
        for action in actions {
            let (route_table_id, new_route) = match action {
                RouteAction::Create { route_table_id }
                | RouteAction::Replace { route_table_id } => (
                    route_table_id,
                    Some(DefaultRoute {
                        nat_gateway_id: Some(nat_gateway_id.to_string()),
                    }),
                ),
                RouteAction::Delete { route_table_id } => (route_table_id, None),
            };
            let table = tables
                .iter_mut()
                .find(|table| &table.route_table_id == route_table_id)
                .expect("action should reference a known route table");
            table.default_route = new_route;
        }
    }

    #[test]
    fn create_adds_route_where_none_exists() {
        let tables = vec![table("rtb-1", None), table("rtb-2", None)];
        let actions = plan_route_actions(&tables, "nat-a", true);
        assert_eq!(
            actions,
            vec![
                RouteAction::Create {
                    route_table_id: "rtb-1".to_string()
                },
                RouteAction::Create {
                    route_table_id: "rtb-2".to_string()
                },
            ]
        );
    }

    #[test]
    fn create_replaces_route_on_another_gateway() {
        let tables = vec![table("rtb-1", Some(Some("nat-old")))];
        let actions = plan_route_actions(&tables, "nat-new", true);
        assert_eq!(
            actions,
            vec![RouteAction::Replace {
                route_table_id: "rtb-1".to_string()
            }]
        );
    }

    #[test]
    fn create_replaces_route_with_non_gateway_target() {
        // A default route through an internet gateway reports no NAT id.
        let tables = vec![table("rtb-1", Some(None))];
        let actions = plan_route_actions(&tables, "nat-a", true);
        assert_eq!(
            actions,
            vec![RouteAction::Replace {
                route_table_id: "rtb-1".to_string()
            }]
        );
    }

    #[test]
    fn create_leaves_matching_route_alone() {
        let tables = vec![table("rtb-1", Some(Some("nat-a")))];
        assert!(plan_route_actions(&tables, "nat-a", true).is_empty());
    }

    #[test]
    fn delete_removes_only_routes_on_the_gateway() {
        let tables = vec![
            table("rtb-1", Some(Some("nat-a"))),
            table("rtb-2", Some(Some("nat-other"))),
            table("rtb-3", None),
        ];
        let actions = plan_route_actions(&tables, "nat-a", false);
        assert_eq!(
            actions,
            vec![RouteAction::Delete {
                route_table_id: "rtb-1".to_string()
            }]
        );
    }

    #[test]
    fn reconciliation_is_idempotent_for_create() {
        let mut tables = vec![
            table("rtb-1", None),
            table("rtb-2", Some(Some("nat-old"))),
            table("rtb-3", Some(Some("nat-a"))),
        ];
        let actions = plan_route_actions(&tables, "nat-a", true);
        apply(&mut tables, &actions, "nat-a");
        assert!(plan_route_actions(&tables, "nat-a", true).is_empty());
    }

    #[test]
    fn reconciliation_is_idempotent_for_delete() {
        let mut tables = vec![
            table("rtb-1", Some(Some("nat-a"))),
            table("rtb-2", Some(Some("nat-other"))),
        ];
        let actions = plan_route_actions(&tables, "nat-a", false);
        apply(&mut tables, &actions, "nat-a");
        assert!(plan_route_actions(&tables, "nat-a", false).is_empty());

        // The untouched table still points at the other gateway.
        assert_eq!(
            tables[1].default_route,
            Some(DefaultRoute {
                nat_gateway_id: Some("nat-other".to_string())
            })
        );
    }
}
