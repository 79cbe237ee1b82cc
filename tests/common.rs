//! Common test utilities for building services, pipelines and repositories.
use vmflow::prelude::*;

/// A result name in the generated `result` + 32 hex form.
#[allow(dead_code)]
pub const RESULT_A: &str = "resultaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

#[allow(dead_code)]
pub const RESULT_B: &str = "resultbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

/// Input `{name, age, address{street, zip}}`, output `{greeting}`.
#[allow(dead_code)]
pub fn customer_pipeline() -> Pipeline {
    Pipeline::new(
        vec![
            Element::scalar("name", "string"),
            Element::scalar("age", "integer"),
            Element::complex(
                "address",
                vec![
                    Element::scalar("street", "string"),
                    Element::scalar("zip", "string"),
                ],
            ),
        ],
        vec![Element::scalar("greeting", "string")],
    )
}

/// Two services: `customers.lookup` (name -> id) and `customers.greet`
/// (id -> text), plus one known runner.
#[allow(dead_code)]
pub fn customer_repository() -> MemoryRepository {
    MemoryRepository::new()
        .with_service(
            "customers.lookup",
            ServiceSignature::new(
                vec![Element::scalar("name", "string")],
                vec![Element::scalar("id", "string")],
            ),
        )
        .with_service(
            "customers.greet",
            ServiceSignature::new(
                vec![Element::scalar("id", "string")],
                vec![Element::scalar("text", "string")],
            ),
        )
        .with_target("runner-eu")
}

/// A service with the customer pipeline and one empty map under the root.
#[allow(dead_code)]
pub fn service_with_map() -> (VmService, NodeId) {
    let mut service = VmService::new("customers.welcome").with_pipeline(customer_pipeline());
    let root = service.steps.root();
    let map = service
        .steps
        .add_child(root, Step::map())
        .expect("a sequence accepts a map");
    (service, map)
}

/// Adds an invoke with a fixed result name and order.
#[allow(dead_code)]
pub fn add_invoke(
    service: &mut VmService,
    map: NodeId,
    service_id: &str,
    result_name: &str,
    order: i32,
) -> NodeId {
    let mut step = Step::invoke(service_id);
    if let Some(invoke) = step.as_invoke_mut() {
        invoke.result_name = result_name.to_string();
        invoke.invocation_order = order;
    }
    service
        .steps
        .add_child(map, step)
        .expect("a map accepts an invoke")
}

/// Order of the invoke at `node`.
#[allow(dead_code)]
pub fn order_of(service: &VmService, node: NodeId) -> i32 {
    service
        .steps
        .step(node)
        .and_then(Step::as_invoke)
        .map(|i| i.invocation_order)
        .expect("node is an invoke")
}
