//! # Projection Streams
//!
//! Projection streams are written by an external projector, always as JSON,
//! and merged into the client's event feed next to the primary events
//! stream.

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use futures::StreamExt;
    use logbus::{
        ConnectionDescriptor, ConnectionGateway, EndpointProvider, InMemoryConnector,
        PayloadFormat, ProjectionBinding, PropertyMap, Publisher, SourceError, StreamName,
        Subscription,
    };
    use logbus_types::ProposedRecord;
    use tokio::time::timeout;

    use crate::contract::*;

    const STOCK: &str = "projections.stock-levels";
    const WAIT: Duration = Duration::from_secs(2);

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// A projector writing `StockProjected` records with its own connection.
    fn projector(connector: &Arc<InMemoryConnector>) -> Publisher<Event> {
        let gateway = ConnectionGateway::new(
            ConnectionDescriptor::new("memory://projector").expect("descriptor"),
            connector.clone(),
        );
        Publisher::new(
            StreamName::external(STOCK),
            Arc::new(gateway),
            PayloadFormat::Json,
        )
    }

    fn stock(sku: &str, on_hand: u32) -> Event {
        Event::Projected(StockProjected {
            sku: sku.to_string(),
            on_hand,
        })
    }

    async fn take(sub: &mut Subscription<Event>, n: usize) -> anyhow::Result<Vec<Event>> {
        let mut items = Vec::with_capacity(n);
        for _ in 0..n {
            let item = timeout(WAIT, sub.next())
                .await?
                .ok_or_else(|| anyhow::anyhow!("subscription ended"))?;
            items.push(item?);
        }
        Ok(items)
    }

    // =============================================================================
    // MERGING
    // =============================================================================

    #[tokio::test]
    async fn test_projection_merged_with_primary_events() -> anyhow::Result<()> {
        let (_store, connector) = memory_store();
        let server = EndpointProvider::new(config(&connector).build()?)?.create_endpoint()?;
        let client = EndpointProvider::new(
            config(&connector)
                .projection(ProjectionBinding::new::<StockProjected>(STOCK))
                .build()?,
        )?
        .create_endpoint_client()?;
        let projector = projector(&connector);

        let mut events = client.events().await?;
        server.publish(&Event::Test(TestEvent { id: 1 })).await?;
        projector.publish(&stock("bolt", 40)).await?;
        server.publish(&Event::Test(TestEvent { id: 2 })).await?;

        let received = take(&mut events, 3).await?;
        let ids: Vec<i32> = received
            .iter()
            .filter_map(|e| match e {
                Event::Test(t) => Some(t.id),
                Event::Projected(_) => None,
            })
            .collect();
        assert_eq!(ids, vec![1, 2]);
        assert!(received.contains(&stock("bolt", 40)));
        Ok(())
    }

    #[tokio::test]
    async fn test_projection_is_json_under_binary_endpoint() -> anyhow::Result<()> {
        let (store, connector) = memory_store();
        let client = EndpointProvider::new(
            config(&connector)
                .payload_format(PayloadFormat::Bincode)
                .projection(ProjectionBinding::new::<StockProjected>(STOCK))
                .build()?,
        )?
        .create_endpoint_client()?;

        let mut events = client.events().await?;
        projector(&connector).publish(&stock("nut", 7)).await?;

        assert_eq!(take(&mut events, 1).await?, vec![stock("nut", 7)]);
        assert!(store.records(STOCK)[0].is_json);
        Ok(())
    }

    #[tokio::test]
    async fn test_several_projections() -> anyhow::Result<()> {
        let (_store, connector) = memory_store();
        let other = "projections.reorders";
        let client = EndpointProvider::new(
            config(&connector)
                .projection(ProjectionBinding::new::<StockProjected>(STOCK))
                .projection(ProjectionBinding::new::<StockProjected>(other))
                .build()?,
        )?
        .create_endpoint_client()?;
        assert_eq!(client.event_source().projections().len(), 2);

        let mut events = client.events().await?;
        projector(&connector).publish(&stock("a", 1)).await?;
        let second = Publisher::new(
            StreamName::external(other),
            Arc::new(ConnectionGateway::new(
                ConnectionDescriptor::new("memory://reorders").expect("descriptor"),
                connector.clone(),
            )),
            PayloadFormat::Json,
        );
        second.publish(&stock("b", 2)).await?;

        let received: HashSet<String> = take(&mut events, 2)
            .await?
            .into_iter()
            .filter_map(|e| match e {
                Event::Projected(p) => Some(p.sku),
                Event::Test(_) => None,
            })
            .collect();
        assert_eq!(received, HashSet::from(["a".to_string(), "b".to_string()]));
        Ok(())
    }

    #[tokio::test]
    async fn test_foreign_tag_on_projection_ends_feed() -> anyhow::Result<()> {
        let (store, connector) = memory_store();
        let server = EndpointProvider::new(config(&connector).build()?)?.create_endpoint()?;
        let client = EndpointProvider::new(
            config(&connector)
                .projection(ProjectionBinding::new::<StockProjected>(STOCK))
                .build()?,
        )?
        .create_endpoint_client()?;

        let mut events = client.events().await?;
        store.append_record(STOCK, ProposedRecord::new("PriceProjected", b"{}".to_vec(), true));

        let item = timeout(WAIT, events.next()).await?;
        assert!(matches!(
            item,
            Some(Err(SourceError::UnknownTypeTag { ref tag, .. })) if tag == "PriceProjected"
        ));

        server.publish(&Event::Test(TestEvent { id: 5 })).await?;
        assert!(events.next().await.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_property_filter_applies_to_projections() -> anyhow::Result<()> {
        let (store, connector) = memory_store();
        let client = EndpointProvider::new(
            config(&connector)
                .projection(ProjectionBinding::new::<StockProjected>(STOCK))
                .property_filter(|props: &PropertyMap| props.get("warehouse") == Some("north"))
                .build()?,
        )?
        .create_endpoint_client()?;
        let mut events = client.events().await?;

        for (sku, warehouse) in [("x", "south"), ("y", "north")] {
            let payload = serde_json::to_vec(&StockProjected {
                sku: sku.to_string(),
                on_hand: 1,
            })?;
            let metadata = PropertyMap::new().with("warehouse", warehouse).to_metadata()?;
            store.append_record(
                STOCK,
                ProposedRecord::new("StockProjected", payload, true).with_metadata(metadata),
            );
        }

        assert_eq!(take(&mut events, 1).await?, vec![stock("y", 1)]);
        Ok(())
    }
}
