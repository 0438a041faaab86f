// Copyright 2024 The Kubernetes Authors.
// Licensed under the Apache License, Version 2.0

//! End-to-end review of Dataset and Pod admission requests.

use k8s_access_webhook::admission::attributes::{GroupVersionKind, GroupVersionResource};
use k8s_access_webhook::admission::review::NO_MUTATION_MESSAGE;
use k8s_access_webhook::plugins::datasetaccess::DatasetAccess;
use k8s_access_webhook::plugins::podlabel::PodLabel;
use k8s_access_webhook::{
    AccessEntry, AdmissionRequest, BaselineSet, IdentifierKind, MutationInterface, Operation,
    Reconciled, Webhook,
};
use serde_json::{json, Value};
use std::sync::Arc;

const GROUP: &str = "bigquery.gcp.upbound.io";

fn webhook() -> Webhook {
    let baseline = BaselineSet::new(vec![
        AccessEntry::new(
            "OWNER",
            IdentifierKind::UserByEmail,
            "crossplane@example.iam.gserviceaccount.com",
        ),
        AccessEntry::new("OWNER", IdentifierKind::SpecialGroup, "projectOwners"),
        AccessEntry::new("READER", IdentifierKind::SpecialGroup, "projectReaders"),
        AccessEntry::new("WRITER", IdentifierKind::SpecialGroup, "projectWriters"),
    ]);
    Webhook::new(vec![
        Arc::new(DatasetAccess::new(baseline)) as Arc<dyn MutationInterface>,
        Arc::new(PodLabel::default()),
    ])
}

fn dataset_request(object: &str, operation: Operation) -> AdmissionRequest {
    let mut request = AdmissionRequest::new(
        "4b1c1f0e",
        GroupVersionKind::new(GROUP, "v1beta1", "Dataset"),
        GroupVersionResource::new(GROUP, "v1beta1", "datasets"),
        operation,
        object.as_bytes().to_vec(),
    );
    request.name = "analytics".to_string();
    request
}

fn pod_request(object: &str) -> AdmissionRequest {
    let mut request = AdmissionRequest::new(
        "9a7e",
        GroupVersionKind::new("", "v1", "Pod"),
        GroupVersionResource::new("", "v1", "pods"),
        Operation::Create,
        object.as_bytes().to_vec(),
    );
    request.namespace = "default".to_string();
    request
}

fn patched(request: &AdmissionRequest, webhook: &Webhook) -> Value {
    let response = webhook.review(request);
    assert!(response.allowed, "{:?}", response.status);
    let mut object: Value = serde_json::from_slice(&request.object).unwrap();
    if let Some(patch) = response.patch {
        json_patch::patch(&mut object, patch.operations()).unwrap();
    }
    object
}

// Keys deliberately out of alphabetical order.
const DATASET: &str = r#"{"spec":{"forProvider":{"location":"EU","access":[{"specialGroup":"projectReaders","role":"READER"}],"description":"raw events"},"providerConfigRef":{"name":"default"}},"metadata":{"name":"analytics","annotations":{"z":"1","a":"2"}},"kind":"Dataset","apiVersion":"bigquery.gcp.upbound.io/v1beta1"}"#;

#[test]
fn dataset_patch_only_touches_access_list() {
    let webhook = webhook();
    let response = webhook.review(&dataset_request(DATASET, Operation::Create));

    let patch = response.patch.expect("dataset should be patched");
    assert_eq!(patch.len(), 3);
    let encoded = serde_json::to_value(&patch).unwrap();
    let paths: Vec<&str> = encoded
        .as_array()
        .unwrap()
        .iter()
        .map(|op| op["path"].as_str().unwrap())
        .collect();
    assert_eq!(
        paths,
        vec![
            "/spec/forProvider/access/1",
            "/spec/forProvider/access/2",
            "/spec/forProvider/access/3",
        ]
    );
    assert_eq!(
        encoded[0],
        json!({
            "op": "add",
            "path": "/spec/forProvider/access/1",
            "value": {"role": "OWNER", "userByEmail": "crossplane@example.iam.gserviceaccount.com"},
        })
    );
}

#[test]
fn dataset_unrelated_fields_round_trip_byte_identically() {
    let original: Value = serde_json::from_str(DATASET).unwrap();
    assert_eq!(serde_json::to_string(&original).unwrap(), DATASET);

    let mutated = patched(&dataset_request(DATASET, Operation::Create), &webhook());
    let mut expected = original.clone();
    let mut actual = mutated.clone();
    expected["spec"]["forProvider"]["access"] = Value::Null;
    actual["spec"]["forProvider"]["access"] = Value::Null;
    assert_eq!(
        serde_json::to_string(&actual).unwrap(),
        serde_json::to_string(&expected).unwrap()
    );

    let access = mutated["spec"]["forProvider"]["access"].as_array().unwrap();
    assert_eq!(access.len(), 4);
    assert_eq!(access[0], json!({"specialGroup": "projectReaders", "role": "READER"}));
}

#[test]
fn dataset_review_is_idempotent() {
    let webhook = webhook();
    let once = patched(&dataset_request(DATASET, Operation::Create), &webhook);
    let encoded = serde_json::to_string(&once).unwrap();

    let response = webhook.review(&dataset_request(&encoded, Operation::Update));
    assert_eq!(response.reconciled(), Some(Reconciled::Unchanged));
    assert_eq!(response.status.unwrap().message, NO_MUTATION_MESSAGE);
}

#[test]
fn dataset_with_empty_access_receives_baseline() {
    let object = r#"{"kind":"Dataset","spec":{"forProvider":{"access":[]}}}"#;
    let mutated = patched(&dataset_request(object, Operation::Create), &webhook());
    let roles: Vec<&str> = mutated["spec"]["forProvider"]["access"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["role"].as_str().unwrap())
        .collect();
    assert_eq!(roles, vec!["OWNER", "OWNER", "READER", "WRITER"]);
}

#[test]
fn dataset_with_malformed_access_passes_through() {
    let webhook = webhook();
    for object in [
        r#"{"kind":"Dataset","spec":{"forProvider":{"access":"projectOwners"}}}"#,
        r#"{"kind":"Dataset","spec":{"forProvider":{}}}"#,
        r#"{"kind":"Dataset","spec":"oops"}"#,
        r#"{"kind":"Dataset"}"#,
        r#"[]"#,
    ] {
        let response = webhook.review(&dataset_request(object, Operation::Create));
        assert!(response.allowed, "{}", object);
        assert_eq!(response.reconciled(), Some(Reconciled::Unchanged), "{}", object);
    }
}

#[test]
fn dataset_delete_is_not_mutated() {
    let response = webhook().review(&dataset_request(DATASET, Operation::Delete));
    assert_eq!(response.reconciled(), Some(Reconciled::Unchanged));
}

#[test]
fn undecodable_object_is_rejected() {
    let response = webhook().review(&dataset_request("{\"spec\":", Operation::Create));
    assert!(!response.allowed);
    assert_eq!(response.status.unwrap().code, 400);
}

#[test]
fn pod_receives_label() {
    let webhook = webhook();
    let object = r#"{"apiVersion":"v1","kind":"Pod","metadata":{"name":"web","labels":{"app":"web"}},"spec":{"containers":[]}}"#;
    let response = webhook.review(&pod_request(object));
    let patch = response.patch.expect("pod should be patched");
    let encoded = String::from_utf8(patch.to_json().unwrap()).unwrap();
    assert_eq!(
        encoded,
        r#"[{"op":"add","path":"/metadata/labels/mutated","value":"true"}]"#
    );
}

#[test]
fn pod_without_labels_gets_label_map() {
    let object = r#"{"kind":"Pod","metadata":{"name":"web"}}"#;
    let mutated = patched(&pod_request(object), &webhook());
    assert_eq!(mutated["metadata"]["labels"], json!({"mutated": "true"}));
}

#[test]
fn concurrent_reviews_do_not_interfere() {
    let webhook = webhook();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let webhook = &webhook;
                scope.spawn(move || {
                    let object = format!(
                        r#"{{"kind":"Dataset","metadata":{{"name":"d{}"}},"spec":{{"forProvider":{{"access":[]}}}}}}"#,
                        i
                    );
                    webhook
                        .review(&dataset_request(&object, Operation::Create))
                        .patch
                        .map(|p| p.len())
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), Some(4));
        }
    });
}
