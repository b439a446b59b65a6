// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `main.rs` - command line parsing and signal handling

#[cfg(test)]
mod tests {
    use super::super::*;
    use clap::CommandFactory;
    use std::time::Duration as StdDuration;
    use tokio::time::timeout;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_operator_defaults() {
        let cli = Cli::try_parse_from(["mysql-operator", "operator"]).unwrap();
        let Commands::Operator(args) = cli.command else {
            panic!("expected operator subcommand");
        };

        assert_eq!(args.request_timeout_secs, 30);
        assert_eq!(args.requeue_ready_secs, 300);
        assert_eq!(args.requeue_pending_secs, 30);
        assert_eq!(args.metrics_bind_address.to_string(), "0.0.0.0:8080");
    }

    #[test]
    fn test_labeler_flags() {
        let cli = Cli::try_parse_from([
            "mysql-operator",
            "labeler",
            "--workers",
            "4",
            "--max-requeues",
            "3",
            "--pod-name",
            "db-0-1",
            "--watch-namespace",
            "ns",
        ])
        .unwrap();
        let Commands::Labeler(args) = cli.command else {
            panic!("expected labeler subcommand");
        };

        assert_eq!(args.workers, 4);
        assert_eq!(args.max_requeues, 3);
        assert_eq!(args.pod_name.as_deref(), Some("db-0-1"));
        assert_eq!(args.watch_namespace.as_deref(), Some("ns"));
        assert_eq!(args.mysql_port, 3306);
        assert_eq!(args.probe_timeout_secs, 10);
    }

    #[test]
    fn test_invalid_metrics_address_rejected() {
        let result = Cli::try_parse_from([
            "mysql-operator",
            "operator",
            "--metrics-bind-address",
            "not-an-address",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["mysql-operator"]).is_err());
    }

    /// Test that SIGTERM signal handler can be created on Unix platforms
    #[tokio::test]
    #[cfg(unix)]
    async fn test_sigterm_signal_handler_creation() {
        use tokio::signal::unix::{signal, SignalKind};

        let result = signal(SignalKind::terminate());
        assert!(
            result.is_ok(),
            "Should be able to create SIGTERM signal handler"
        );
    }

    #[tokio::test]
    async fn test_shutdown_signal_waits_for_a_signal() {
        let result = timeout(StdDuration::from_millis(100), shutdown_signal()).await;
        assert!(
            result.is_err(),
            "shutdown_signal() should not complete when no signal is sent"
        );
    }
}
