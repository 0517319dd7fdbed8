//! # Client/Server Round Trips
//!
//! A fake service subscribes to commands and requests on the server
//! endpoint. Every command is answered with an event carrying the same id and
//! every request with a response carrying its correlation ids. The client
//! endpoint drives it and observes the results.

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use futures::StreamExt;
    use logbus::{BusMetrics, EndpointProvider, PayloadFormat, ServiceEndpoint, Subscription};
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use uuid::Uuid;

    use crate::contract::*;

    const WAIT: Duration = Duration::from_secs(2);

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Start the fake service. Subscriptions are open when this returns.
    async fn spawn_fake_service(
        server: Arc<ServiceEndpoint<TestService>>,
    ) -> anyhow::Result<JoinHandle<()>> {
        let mut commands = server.commands().await?;
        let mut requests = server.requests().await?;

        Ok(tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(Ok(command)) = commands.next() => {
                        let id = match command {
                            Command::Test(c) => c.id,
                            Command::Test2(c) => c.id,
                        };
                        if server.publish(&Event::Test(TestEvent { id })).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Request::Test(request))) = requests.next() => {
                        let response = Response::Test(TestResponse {
                            id: request.id,
                            request_id: request.request_id,
                            requester_id: request.requester_id,
                        });
                        if server.reply(&response).await.is_err() {
                            break;
                        }
                    }
                    else => break,
                }
            }
        }))
    }

    async fn next<T>(sub: &mut Subscription<T>) -> anyhow::Result<T> {
        let item = timeout(WAIT, sub.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("subscription ended"))?;
        Ok(item?)
    }

    async fn round_trip(format: PayloadFormat) -> anyhow::Result<()> {
        let (_store, connector) = memory_store();
        let server = EndpointProvider::new(config(&connector).payload_format(format).build()?)?
            .create_endpoint()?;
        let client = EndpointProvider::new(config(&connector).payload_format(format).build()?)?
            .create_endpoint_client()?;
        let service = spawn_fake_service(Arc::new(server)).await?;

        // Command -> event
        let mut events = client.events().await?;
        client.send(&Command::Test(TestCommand { id: 123 })).await?;
        assert_eq!(next(&mut events).await?, Event::Test(TestEvent { id: 123 }));

        // Request -> response
        let mut responses = client.responses().await?;
        let request_id = Uuid::new_v4().to_string();
        client
            .send_request(&Request::Test(TestRequest {
                id: 456,
                request_id: request_id.clone(),
                requester_id: "client-1".to_string(),
            }))
            .await?;
        let Response::Test(response) = next(&mut responses).await?;
        assert_eq!(response.id, 456);
        assert_eq!(response.request_id, request_id);
        assert_eq!(response.requester_id, "client-1");

        service.abort();
        Ok(())
    }

    // =============================================================================
    // ROUND TRIPS
    // =============================================================================

    #[tokio::test]
    async fn test_round_trip_json() -> anyhow::Result<()> {
        round_trip(PayloadFormat::Json).await
    }

    #[tokio::test]
    async fn test_round_trip_bincode() -> anyhow::Result<()> {
        round_trip(PayloadFormat::Bincode).await
    }

    #[tokio::test]
    async fn test_second_command_type_dispatched_by_tag() -> anyhow::Result<()> {
        let (store, connector) = memory_store();
        let server = EndpointProvider::new(config(&connector).build()?)?.create_endpoint()?;
        let client = EndpointProvider::new(config(&connector).build()?)?.create_endpoint_client()?;

        let mut commands = server.commands().await?;
        client.send(&Command::Test2(Test2Command { id: 9 })).await?;
        client.send(&Command::Test(TestCommand { id: 10 })).await?;

        assert_eq!(next(&mut commands).await?, Command::Test2(Test2Command { id: 9 }));
        assert_eq!(next(&mut commands).await?, Command::Test(TestCommand { id: 10 }));

        let tags: Vec<_> = store
            .records("LogBus.Test.Commands")
            .into_iter()
            .map(|r| r.type_tag)
            .collect();
        assert_eq!(tags, vec!["Test2Command", "TestCommand"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_every_client_sees_every_event() -> anyhow::Result<()> {
        let (_store, connector) = memory_store();
        let server = EndpointProvider::new(config(&connector).build()?)?.create_endpoint()?;
        let clients = (0..3)
            .map(|_| {
                EndpointProvider::new(config(&connector).build()?)?
                    .create_endpoint_client()
                    .map_err(anyhow::Error::from)
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let mut feeds = Vec::new();
        for client in &clients {
            feeds.push(client.events().await?);
        }

        server.publish(&Event::Test(TestEvent { id: 77 })).await?;

        for feed in &mut feeds {
            assert_eq!(next(feed).await?, Event::Test(TestEvent { id: 77 }));
        }
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_senders_share_one_connection() -> anyhow::Result<()> {
        let (store, connector) = memory_store();
        let metrics = Arc::new(BusMetrics::new());
        let server = EndpointProvider::new(config(&connector).build()?)?.create_endpoint()?;
        let client = Arc::new(
            EndpointProvider::new(config(&connector).metrics(metrics.clone()).build()?)?
                .create_endpoint_client()?,
        );

        let mut commands = server.commands().await?;
        let senders: Vec<_> = (0..50)
            .map(|id| {
                let client = Arc::clone(&client);
                tokio::spawn(async move { client.send(&Command::Test(TestCommand { id })).await })
            })
            .collect();
        for sender in senders {
            sender.await??;
        }

        let mut ids = Vec::new();
        for _ in 0..50 {
            if let Command::Test(c) = next(&mut commands).await? {
                ids.push(c.id);
            }
        }
        ids.sort_unstable();
        assert_eq!(ids, (0..50).collect::<Vec<_>>());

        // One connect for the client, one for the server.
        assert_eq!(connector.attempts(), 2);
        assert_eq!(store.records("LogBus.Test.Commands").len(), 50);
        assert_eq!(metrics.snapshot().records_appended, 50);
        assert_eq!(metrics.snapshot().connect_attempts, 1);
        Ok(())
    }
}
