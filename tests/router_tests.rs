use http::Method;
use mimicd::load_spec_str;
use mimicd::router::{Resolution, RouteTable};

const SPEC: &str = r#"
openapi: 3.1.0
info:
  title: Router Test
  version: "1.0"
paths:
  /pets:
    get:
      operationId: list_pets
      responses:
        '200': { description: OK }
    post:
      operationId: add_pet
      responses:
        '201': { description: Created }
  /pets/{id}:
    get:
      operationId: get_pet
      responses:
        '200': { description: OK }
"#;

fn table() -> RouteTable {
    let doc = load_spec_str(SPEC, true).unwrap();
    RouteTable::from_routes(doc.routes)
}

#[test]
fn test_resolves_declared_operations() {
    let table = table();
    match table.resolve(&Method::GET, "/pets") {
        Resolution::Route(route) => assert_eq!(route.operation_id, "list_pets"),
        other => panic!("expected route, got {other:?}"),
    }
    match table.resolve(&Method::POST, "/pets") {
        Resolution::Route(route) => assert_eq!(route.operation_id, "add_pet"),
        other => panic!("expected route, got {other:?}"),
    }
}

#[test]
fn test_undefined_method_yields_405_with_exact_allow_set() {
    let table = table();
    match table.resolve(&Method::DELETE, "/pets") {
        Resolution::MethodNotAllowed(allowed) => {
            assert_eq!(allowed, vec![Method::GET, Method::POST]);
        }
        other => panic!("expected 405, got {other:?}"),
    }
}

#[test]
fn test_unknown_path_is_not_found() {
    let table = table();
    assert!(matches!(
        table.resolve(&Method::GET, "/missing"),
        Resolution::NotFound
    ));
    // Dispatch is an exact match on the declared template.
    assert!(matches!(
        table.resolve(&Method::GET, "/pets/42"),
        Resolution::NotFound
    ));
    assert!(matches!(
        table.resolve(&Method::GET, "/pets/{id}"),
        Resolution::Route(_)
    ));
}
