// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Integration tests for the MySQL operator
//!
//! These tests talk to a real Kubernetes cluster and skip when none is reachable.
//!
//! Run with: cargo test --test simple_integration -- --ignored

#![allow(clippy::manual_let_else)]

use k8s_openapi::api::core::v1::{Namespace, Pod};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::client::Client;
use mysql_operator::crd::{IssuerReference, MySQLCluster, MySQLClusterSpec, TlsConfig};
use mysql_operator::errors::ErrorClass;
use mysql_operator::labeler::patcher::{KubePodLabeler, PodLabeler, RoleChange};
use mysql_operator::reconcilers::certificates::store::{CertificateStore, KubeCertificateStore};
use mysql_operator::reconcilers::certificates::IssuerKind;
use std::collections::BTreeMap;

// ============================================================================
// Helper Functions
// ============================================================================

/// Test helper to check if running in a Kubernetes cluster
async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => {
            println!("✓ Successfully connected to Kubernetes cluster");
            Some(client)
        }
        Err(e) => {
            eprintln!("⊘ Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Create a test namespace
async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    let mut labels = BTreeMap::new();
    labels.insert("test".to_string(), "integration".to_string());
    labels.insert("managed-by".to_string(), "mysql-operator-test".to_string());

    let test_ns = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    };

    match namespaces.create(&PostParams::default(), &test_ns).await {
        Ok(_) => {
            println!("✓ Created test namespace: {name}");
            Ok(())
        }
        Err(kube::Error::Api(ae)) if ae.code == 409 => {
            println!("  Test namespace already exists: {name}");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}

/// Delete a test namespace
async fn delete_test_namespace(client: &Client, name: &str) {
    let namespaces: Api<Namespace> = Api::all(client.clone());
    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => println!("✓ Deleted test namespace: {name}"),
        Err(kube::Error::Api(ae)) if ae.code == 404 => {
            println!("  Test namespace already deleted: {name}");
        }
        Err(e) => eprintln!("⚠ Failed to delete test namespace {name}: {e}"),
    }
}

// ============================================================================
// Basic Connectivity Tests
// ============================================================================

#[tokio::test]
#[ignore] // Run with: cargo test --test simple_integration -- --ignored
async fn test_kubernetes_connectivity() {
    println!("\n=== Test: Kubernetes Connectivity ===\n");

    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let namespaces: Api<Namespace> = Api::all(client);
    let lp = ListParams::default().limit(5);

    match namespaces.list(&lp).await {
        Ok(ns_list) => {
            println!("✓ Found {} namespaces", ns_list.items.len());
            assert!(!ns_list.items.is_empty(), "Expected at least one namespace");
        }
        Err(e) => panic!("Failed to list namespaces: {e}"),
    }

    println!("\n✓ Test passed\n");
}

#[tokio::test]
#[ignore]
async fn test_crd_installed() {
    println!("\n=== Test: MySQLCluster CRD Installed ===\n");

    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let crds: Api<CustomResourceDefinition> = Api::all(client);
    match crds.get_opt("mysqlclusters.mysql.firestoned.io").await {
        Ok(Some(crd)) => {
            println!("✓ Found CRD for kind {}", crd.spec.names.kind);
            assert_eq!(crd.spec.names.kind, "MySQLCluster");
        }
        Ok(None) => {
            println!("⚠ Warning: CRD not found. Install with: kubectl apply -f deploy/crds/");
        }
        Err(e) => {
            println!("⚠ Could not check CRDs: {e}");
            println!("  This is expected if you don't have CRD permissions");
        }
    }

    println!("\n✓ Test passed\n");
}

// ============================================================================
// Resource Tests
// ============================================================================

#[tokio::test]
#[ignore]
async fn test_mysqlcluster_create_read_delete() {
    println!("\n=== Test: MySQLCluster Create/Read/Delete ===\n");

    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let namespace = "mysql-operator-it-cluster";
    if let Err(e) = create_test_namespace(&client, namespace).await {
        panic!("Failed to create test namespace: {e}");
    }

    let api: Api<MySQLCluster> = Api::namespaced(client.clone(), namespace);
    let cluster = MySQLCluster::new(
        "db-0",
        MySQLClusterSpec {
            replicas: Some(3),
            version: Some("8.0.36".to_string()),
            tls: Some(TlsConfig {
                issuer_ref: IssuerReference {
                    name: "ca-issuer".to_string(),
                    kind: "ClusterIssuer".to_string(),
                    api_group: None,
                },
                certificate: None,
            }),
        },
    );

    match api.create(&PostParams::default(), &cluster).await {
        Ok(created) => {
            println!("✓ Created MySQLCluster db-0");
            assert_eq!(created.spec.replicas, Some(3));

            let fetched = api.get("db-0").await.expect("MySQLCluster should exist");
            assert_eq!(
                fetched.spec.tls.map(|tls| tls.issuer_ref.kind),
                Some("ClusterIssuer".to_string())
            );

            api.delete("db-0", &DeleteParams::default())
                .await
                .expect("MySQLCluster should be deletable");
            println!("✓ Deleted MySQLCluster db-0");
        }
        Err(e) => println!("⚠ Could not create MySQLCluster (is the CRD installed?): {e}"),
    }

    delete_test_namespace(&client, namespace).await;
    println!("\n✓ Test passed\n");
}

#[tokio::test]
#[ignore]
async fn test_missing_issuer_reported_absent() {
    println!("\n=== Test: Missing Issuer Lookup ===\n");

    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let store = KubeCertificateStore::new(client);
    match store
        .issuer_exists(IssuerKind::ClusterIssuer, "", "does-not-exist-issuer")
        .await
    {
        Ok(found) => assert!(!found, "nonexistent issuer must be reported absent"),
        Err(e) => println!("⚠ Could not look up issuer (is cert-manager installed?): {e}"),
    }

    println!("\n✓ Test passed\n");
}

#[tokio::test]
#[ignore]
async fn test_label_patch_on_missing_pod_is_not_found() {
    println!("\n=== Test: Role Label Patch On Missing Pod ===\n");

    let client = match get_kube_client_or_skip().await {
        Some(c) => c,
        None => return,
    };

    let namespace = "mysql-operator-it-labeler";
    if let Err(e) = create_test_namespace(&client, namespace).await {
        panic!("Failed to create test namespace: {e}");
    }

    let pod = Pod {
        metadata: ObjectMeta {
            name: Some("db-0-0".to_string()),
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        ..Default::default()
    };
    let labeler = KubePodLabeler::new(client.clone());
    let err = labeler
        .apply(&pod, RoleChange::SetPrimary)
        .await
        .expect_err("patching a missing pod must fail");
    assert_eq!(err.class(), ErrorClass::NotFound);

    delete_test_namespace(&client, namespace).await;
    println!("\n✓ Test passed\n");
}
