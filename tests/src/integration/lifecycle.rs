//! # Endpoint Lifecycle
//!
//! Connection sharing through scopes, teardown, connect failures, and the
//! single-use rule for providers.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::StreamExt;
    use logbus::{
        ConnectionError, ConnectionScope, EndpointError, EndpointProvider, FailurePolicy,
        PublishError, SourceError,
    };
    use tokio::time::timeout;

    use crate::contract::*;

    const WAIT: Duration = Duration::from_secs(2);

    fn setup_tracing() {
        logbus_telemetry::init_test_tracing();
    }

    // =============================================================================
    // SINGLE USE
    // =============================================================================

    #[test]
    fn test_provider_hands_out_one_endpoint_across_threads() -> anyhow::Result<()> {
        setup_tracing();
        let (_store, connector) = memory_store();
        let provider = EndpointProvider::new(config(&connector).build()?)?;

        let created = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|i| {
                    let provider = &provider;
                    s.spawn(move || {
                        if i % 2 == 0 {
                            provider.create_endpoint().is_ok()
                        } else {
                            provider.create_endpoint_client().is_ok()
                        }
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or(false))
                .filter(|ok| *ok)
                .count()
        });

        assert_eq!(created, 1);
        assert!(matches!(
            provider.create_endpoint(),
            Err(EndpointError::AlreadyCreated { ref service }) if service == SERVICE
        ));
        assert_eq!(connector.attempts(), 0);
        Ok(())
    }

    // =============================================================================
    // SHARED CONNECTION SCOPE
    // =============================================================================

    #[tokio::test]
    async fn test_scope_shares_one_connection() -> anyhow::Result<()> {
        setup_tracing();
        let (_store, connector) = memory_store();
        let scope = ConnectionScope::new("memory://shared", connector.clone())?;
        let scoped = || {
            EndpointProvider::new(
                logbus::EndpointConfig::<TestService>::builder(SERVICE)
                    .scope(scope.clone())
                    .catalog(catalog())
                    .build()?,
            )
        };

        let server = scoped()?.create_endpoint()?;
        let client = scoped()?.create_endpoint_client()?;

        let mut commands = server.commands().await?;
        client.send(&Command::Test(TestCommand { id: 1 })).await?;
        let received = timeout(WAIT, commands.next()).await?;
        assert!(matches!(received, Some(Ok(Command::Test(TestCommand { id: 1 })))));
        assert_eq!(connector.attempts(), 1);

        client.dispose();
        drop(server);
        assert!(!connector.connections()[0].is_closed());

        scope.close();
        assert!(connector.connections()[0].is_closed());
        Ok(())
    }

    #[tokio::test]
    async fn test_scope_applies_its_failure_policy_and_metrics() -> anyhow::Result<()> {
        setup_tracing();
        let (_store, connector) = memory_store();
        let metrics = Arc::new(logbus::BusMetrics::new());
        let scope = ConnectionScope::builder("memory://shared", connector.clone())
            .failure_policy(FailurePolicy::Sticky)
            .metrics(metrics.clone())
            .build()?;
        connector.fail_next(1);

        let client = EndpointProvider::new(
            logbus::EndpointConfig::<TestService>::builder(SERVICE)
                .scope(scope)
                .catalog(catalog())
                .failure_policy(FailurePolicy::Sticky)
                .build()?,
        )?
        .create_endpoint_client()?;

        for id in 0..2 {
            let result = client.send(&Command::Test(TestCommand { id })).await;
            assert!(matches!(result, Err(PublishError::Connection(_))));
        }
        assert_eq!(connector.attempts(), 1);
        assert_eq!(metrics.snapshot().connect_attempts, 1);
        Ok(())
    }

    #[test]
    fn test_scope_rejects_conflicting_endpoint_policy() -> anyhow::Result<()> {
        let (_store, connector) = memory_store();
        let scope = ConnectionScope::new("memory://shared", connector)?;
        let err = logbus::EndpointConfig::<TestService>::builder(SERVICE)
            .scope(scope)
            .failure_policy(FailurePolicy::Sticky)
            .build()
            .expect_err("scope policy is Retry");
        assert!(matches!(err, logbus::ConfigError::ScopeConflict { .. }));
        Ok(())
    }

    // =============================================================================
    // TEARDOWN
    // =============================================================================

    #[tokio::test]
    async fn test_dispose_ends_open_subscriptions() -> anyhow::Result<()> {
        setup_tracing();
        let (_store, connector) = memory_store();
        let client = EndpointProvider::new(config(&connector).build()?)?.create_endpoint_client()?;
        let mut events = client.events().await?;

        client.dispose();

        match timeout(WAIT, events.next()).await? {
            Some(Err(SourceError::Terminated { reason, .. })) => {
                assert_eq!(reason, "connection closed");
            }
            other => panic!("expected termination, got {other:?}"),
        }
        assert!(events.next().await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_disposed_client_sends_nothing() -> anyhow::Result<()> {
        setup_tracing();
        let (store, connector) = memory_store();
        let client = EndpointProvider::new(config(&connector).build()?)?.create_endpoint_client()?;

        client.dispose();
        let err = client
            .send(&Command::Test(TestCommand { id: 1 }))
            .await
            .expect_err("disposed client must not send");

        assert!(matches!(err, PublishError::Disposed { .. }));
        assert_eq!(store.append_count(), 0);
        assert_eq!(connector.attempts(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_subscription_dispose_stops_delivery() -> anyhow::Result<()> {
        setup_tracing();
        let (_store, connector) = memory_store();
        let server = EndpointProvider::new(config(&connector).build()?)?.create_endpoint()?;
        let client = EndpointProvider::new(config(&connector).build()?)?.create_endpoint_client()?;

        let mut events = client.events().await?;
        let handle = events.handle();
        server.publish(&Event::Test(TestEvent { id: 1 })).await?;
        assert!(timeout(WAIT, events.next()).await?.is_some());

        handle.dispose();
        handle.dispose();
        server.publish(&Event::Test(TestEvent { id: 2 })).await?;
        assert!(events.next().await.is_none());
        Ok(())
    }

    // =============================================================================
    // CONNECT FAILURES
    // =============================================================================

    #[tokio::test]
    async fn test_retry_policy_recovers() -> anyhow::Result<()> {
        setup_tracing();
        let (store, connector) = memory_store();
        connector.fail_next(1);
        let client = EndpointProvider::new(config(&connector).build()?)?.create_endpoint_client()?;

        let first = client.send(&Command::Test(TestCommand { id: 1 })).await;
        assert!(matches!(
            first,
            Err(PublishError::Connection(ConnectionError::Failed { .. }))
        ));
        client.send(&Command::Test(TestCommand { id: 2 })).await?;

        assert_eq!(connector.attempts(), 2);
        assert_eq!(store.append_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_sticky_policy_keeps_failing() -> anyhow::Result<()> {
        setup_tracing();
        let (_store, connector) = memory_store();
        connector.fail_next(1);
        let client = EndpointProvider::new(
            config(&connector)
                .failure_policy(FailurePolicy::Sticky)
                .build()?,
        )?
        .create_endpoint_client()?;

        for id in 0..3 {
            let result = client.send(&Command::Test(TestCommand { id })).await;
            assert!(matches!(result, Err(PublishError::Connection(_))));
        }
        assert!(matches!(
            client.responses().await,
            Err(SourceError::Connection(ConnectionError::Failed { .. }))
        ));
        assert_eq!(connector.attempts(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_connect_timeout_surfaces() -> anyhow::Result<()> {
        setup_tracing();
        let store = Arc::new(logbus::InMemoryLogStore::new());
        let connector = Arc::new(
            logbus::InMemoryConnector::new(store).with_delay(Duration::from_millis(300)),
        );
        let client = EndpointProvider::new(
            config(&connector)
                .connect_timeout(Duration::from_millis(20))
                .build()?,
        )?
        .create_endpoint_client()?;

        let err = client
            .send(&Command::Test(TestCommand { id: 1 }))
            .await
            .expect_err("connect should time out");
        assert!(matches!(
            err,
            PublishError::Connection(ConnectionError::Timeout { timeout_ms: 20, .. })
        ));
        Ok(())
    }
}
