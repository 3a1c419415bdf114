use vapi_rs::demo::{self, Arith};
use vapi_rs::{ApiServer, RequestContext};

fn server() -> ApiServer {
    let server = ApiServer::new("/rpc");
    demo::register_all(&server).unwrap();
    server
}

#[test]
fn demo_services_are_listed() {
    let services = server().services().list_all();
    let mut names: Vec<&str> = services.keys().map(String::as_str).collect();
    names.sort();
    assert_eq!(names, vec!["Arith", "Echo"]);
    assert_eq!(services["Arith"].method_names(), vec!["Add", "Divide"]);
    assert_eq!(services["Echo"].method_names(), vec!["Echo", "Upper"]);
}

#[tokio::test]
async fn echo_reads_request_headers() {
    let resp = server()
        .handle(
            RequestContext::new("POST", "/rpc/Echo.echo")
                .with_header("User-Agent", "probe/1")
                .with_body(r#"{"Message":"hi"}"#),
        )
        .await;
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.body_text(), r#"{"Message":"hi","Agent":"probe/1"}"#);
}

#[tokio::test]
async fn echo_over_get_query() {
    let resp = server()
        .handle(RequestContext::new("GET", "/rpc/Echo.upper").with_query("Message", "loud"))
        .await;
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.body_text(), r#"{"Message":"LOUD","Agent":""}"#);
}

#[tokio::test]
async fn arith_add_and_divide() {
    let srv = server();
    let resp = srv
        .handle(RequestContext::new("POST", "/rpc/Arith.add").with_body(r#"{"A":5,"B":-7}"#))
        .await;
    assert_eq!(resp.body_text(), "-2");

    let resp = srv
        .handle(RequestContext::new("POST", "/rpc/Arith.divide").with_body(r#"{"A":7,"B":2}"#))
        .await;
    assert_eq!(resp.body_text(), r#"{"Quo":3,"Rem":1}"#);
}

#[tokio::test]
async fn arith_add_over_get_query() {
    let resp = server()
        .handle(
            RequestContext::new("GET", "/rpc/Arith.add")
                .with_query("A", "1")
                .with_query("B", "2"),
        )
        .await;
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.body_text(), "3");

    let resp = server()
        .handle(RequestContext::new("GET", "/rpc/Arith.add").with_query("A", "one"))
        .await;
    assert_eq!(resp.status_code, 400);
}

#[tokio::test]
async fn failed_divide_returns_only_the_error() {
    let resp = server()
        .handle(RequestContext::new("POST", "/rpc/Arith.divide").with_body(r#"{"A":1,"B":0}"#))
        .await;
    assert_eq!(resp.status_code, 400);
    assert_eq!(resp.body_text(), r#"{"error":"divide by zero"}"#);
}

#[tokio::test]
async fn shared_receiver_keeps_state() {
    let srv = ApiServer::new("/rpc");
    let arith = std::sync::Arc::new(Arith::default());
    srv.register_shared_service(std::sync::Arc::clone(&arith), "").unwrap();
    for _ in 0..3 {
        srv.handle(RequestContext::new("POST", "/rpc/Arith.Add").with_body(r#"{"A":1,"B":1}"#))
            .await;
    }
    assert_eq!(arith.calls(), 3);
}
