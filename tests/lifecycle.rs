//! End-to-end routing through `ContractChaincode`.

use std::cell::RefCell;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use chaincode_router::types::Value;
use chaincode_router::{
    describe_struct, Chaincode, Contract, ContractChaincode, ContractInterface, MockStub,
    Response, TransactionContext,
};

thread_local! {
    /// Phases run by the current test thread
    static LOG: RefCell<Vec<&'static str>> = const { RefCell::new(Vec::new()) };
}

fn record(entry: &'static str) {
    LOG.with(|log| log.borrow_mut().push(entry));
}

fn take_log() -> Vec<&'static str> {
    LOG.with(|log| std::mem::take(&mut *log.borrow_mut()))
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Point {
    x: i32,
    y: i32,
}
describe_struct!(Point { x: i32, y: i32 });

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Vehicle {
    wheels: u8,
    brand: String,
    active: bool,
}
describe_struct!(Vehicle { wheels: u8, brand: String, active: bool });

fn invoke(chaincode: &ContractChaincode, name: &str, args: &[&str]) -> Response {
    let args = args.iter().map(|s| (*s).to_string()).collect();
    chaincode.invoke(Arc::new(MockStub::new(name, args)))
}

fn serve(contract: impl ContractInterface + 'static) -> ContractChaincode {
    ContractChaincode::builder().contract(contract).build().unwrap()
}

/// Contract whose hooks log and whose named functions fail on request
fn logging_contract(fail_before: bool) -> Contract<TransactionContext> {
    Contract::builder("logged")
        .before(move || -> Result<(), String> {
            record("B");
            if fail_before {
                Err("before refused".into())
            } else {
                Ok(())
            }
        })
        .function("Named", |_: &mut TransactionContext| record("N"))
        .function("Failing", || -> Result<(), String> {
            record("N");
            Err("named refused".into())
        })
        .after(|_: &mut TransactionContext| record("A"))
        .build()
        .unwrap()
}

fn run_logged(fail_before: bool, function: &str) -> (Response, Vec<&'static str>) {
    take_log();
    let response = invoke(&serve(logging_contract(fail_before)), function, &[]);
    (response, take_log())
}

#[test]
fn test_phases_run_in_order() {
    let (response, log) = run_logged(false, "Named");
    assert!(response.is_ok());
    assert_eq!(log, vec!["B", "N", "A"]);
}

#[test]
fn test_before_error_aborts() {
    let (response, log) = run_logged(true, "Named");
    assert_eq!(response.message, "before refused");
    assert_eq!(log, vec!["B"]);
}

#[test]
fn test_named_error_skips_after() {
    let (response, log) = run_logged(false, "Failing");
    assert_eq!(response.message, "named refused");
    assert_eq!(log, vec!["B", "N"]);
}

#[test]
fn test_unknown_handler_replaces_missing_function() {
    let without = Contract::<TransactionContext>::builder("plain")
        .function("Known", || {})
        .build()
        .unwrap();
    let response = invoke(&serve(without), "Missing", &["ignored"]);
    assert_eq!(response.message, "Function Missing not found in contract plain");

    let with = Contract::<TransactionContext>::builder("plain")
        .function("Known", || {})
        .unknown(|| "handled by unknown".to_string())
        .build()
        .unwrap();
    let response = invoke(&serve(with), "Missing", &["ignored"]);
    assert!(response.is_ok());
    assert_eq!(response.payload_str(), "handled by unknown");
}

#[test]
fn test_after_receives_success_value() {
    let seen: Arc<Mutex<Option<String>>> = Arc::default();
    let sink = seen.clone();
    let contract = Contract::<TransactionContext>::builder("c")
        .function("Greet", |name: String| format!("hello {name}"))
        .function("Quiet", || {})
        .after(move |data: Value| {
            let text = if data.is_undefined() {
                "undefined".to_string()
            } else {
                data.to_text()
            };
            *sink.lock().unwrap() = Some(text);
        })
        .build()
        .unwrap();
    let chaincode = serve(contract);

    let response = invoke(&chaincode, "Greet", &["bob"]);
    assert_eq!(response.payload_str(), "hello bob");
    assert_eq!(seen.lock().unwrap().as_deref(), Some("hello bob"));

    invoke(&chaincode, "Quiet", &[]);
    assert_eq!(seen.lock().unwrap().as_deref(), Some("undefined"));
}

#[test]
fn test_string_and_error_responses() {
    let contract = Contract::<TransactionContext>::builder("c")
        .function("Hello", || -> Result<String, String> { Ok("hello".into()) })
        .function("Broken", || -> Result<String, String> { Err("some error".into()) })
        .build()
        .unwrap();
    let chaincode = serve(contract);

    let response = invoke(&chaincode, "Hello", &[]);
    assert!(response.is_ok());
    assert_eq!(response.payload_str(), "hello");

    let response = invoke(&chaincode, "Broken", &[]);
    assert!(!response.is_ok());
    assert_eq!(response.message, "some error");
    assert!(response.payload.is_empty());
}

#[test]
fn test_struct_and_slice_payloads_are_json() {
    let contract = Contract::<TransactionContext>::builder("c")
        .function("Origin", || Point { x: 0, y: 0 })
        .function("Line", |n: u8| -> Vec<Point> {
            (0..i32::from(n)).map(|i| Point { x: i, y: i * 2 }).collect()
        })
        .function("Sum", |points: Vec<Point>| -> i32 {
            points.iter().map(|p| p.x + p.y).sum()
        })
        .build()
        .unwrap();
    let chaincode = serve(contract);

    assert_eq!(invoke(&chaincode, "Origin", &[]).payload_str(), r#"{"x":0,"y":0}"#);
    assert_eq!(
        invoke(&chaincode, "Line", &["2"]).payload_str(),
        r#"[{"x":0,"y":0},{"x":1,"y":2}]"#
    );
    assert_eq!(
        invoke(&chaincode, "Sum", &[r#"[{"x":1,"y":2},{"x":3,"y":4}]"#]).payload_str(),
        "10"
    );
}

#[test]
fn test_payload_is_serde_json_text() {
    let contract = Contract::<TransactionContext>::builder("c")
        .function("Vehicle", || Vehicle {
            wheels: 4,
            brand: "volvo".into(),
            active: true,
        })
        .function("Readings", || vec![0.1_f32, 0.2, 3.0])
        .function("Echo", |v: Vehicle| v)
        .build()
        .unwrap();
    let chaincode = serve(contract);

    let expected = serde_json::to_string(&Vehicle {
        wheels: 4,
        brand: "volvo".into(),
        active: true,
    })
    .unwrap();
    assert_eq!(invoke(&chaincode, "Vehicle", &[]).payload_str(), expected);
    assert_eq!(expected, r#"{"wheels":4,"brand":"volvo","active":true}"#);
    assert_eq!(
        invoke(&chaincode, "Readings", &[]).payload_str(),
        serde_json::to_string(&vec![0.1_f32, 0.2, 3.0]).unwrap()
    );
    assert_eq!(
        invoke(&chaincode, "Echo", &[r#"{"active":false,"brand":"vw","wheels":3}"#]).payload_str(),
        r#"{"wheels":3,"brand":"vw","active":false}"#
    );
}

#[test]
fn test_param_count_and_extras() {
    let contract = Contract::<TransactionContext>::builder("c")
        .function("Pair", |a: String, b: bool| format!("{a}:{b}"))
        .build()
        .unwrap();
    let chaincode = serve(contract);

    let response = invoke(&chaincode, "Pair", &["x"]);
    assert_eq!(response.message, "Incorrect number of params. Expected 2, received 1");

    assert_eq!(invoke(&chaincode, "Pair", &["x", "T"]).payload_str(), "x:true");
    assert_eq!(invoke(&chaincode, "Pair", &["x", "0", "extra"]).payload_str(), "x:false");
}

#[test]
fn test_chaincode_keeps_serving_after_failures() {
    let contract = Contract::<TransactionContext>::builder("c")
        .function("Div", |a: i64, b: i64| -> Result<i64, String> {
            a.checked_div(b).ok_or_else(|| "division by zero".to_string())
        })
        .build()
        .unwrap();
    let chaincode = serve(contract);

    assert_eq!(invoke(&chaincode, "Div", &["1", "0"]).message, "division by zero");
    assert_eq!(
        invoke(&chaincode, "Div", &["x", "1"]).message,
        "Cannot convert passed value x to i64"
    );
    assert_eq!(invoke(&chaincode, "Div", &["9", "3"]).payload_str(), "3");
}
