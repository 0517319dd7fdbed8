//! The test service: two commands, an event, and a request/response pair,
//! plus a projected event type that only appears on projection streams.

use std::any::Any;
use std::sync::Arc;

use logbus::{
    EndpointConfig, EndpointConfigBuilder, InMemoryConnector, InMemoryLogStore, MessageCatalog,
    ServiceContract,
};
use logbus_types::{Message, MessageType};
use serde::{Deserialize, Serialize};

pub const SERVICE: &str = "LogBus.Test";

macro_rules! concrete_message {
    ($name:ident) => {
        impl MessageType for $name {
            const TYPE_TAG: &'static str = stringify!($name);
        }

        impl Message for $name {
            fn type_tag(&self) -> &str {
                Self::TYPE_TAG
            }

            fn as_any(&self) -> &dyn Any {
                self
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCommand {
    pub id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Test2Command {
    pub id: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestEvent {
    pub id: i32,
}

/// Only ever written by an external projector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockProjected {
    pub sku: String,
    pub on_hand: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRequest {
    pub id: i32,
    pub request_id: String,
    pub requester_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResponse {
    pub id: i32,
    pub request_id: String,
    pub requester_id: String,
}

concrete_message!(TestCommand);
concrete_message!(Test2Command);
concrete_message!(TestEvent);
concrete_message!(StockProjected);
concrete_message!(TestRequest);
concrete_message!(TestResponse);

macro_rules! role_enum {
    ($role:ident { $($variant:ident($ty:ident)),+ }) => {
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(untagged)]
        pub enum $role {
            $($variant($ty)),+
        }

        impl Message for $role {
            fn type_tag(&self) -> &str {
                match self {
                    $($role::$variant(inner) => inner.type_tag()),+
                }
            }

            fn as_any(&self) -> &dyn Any {
                match self {
                    $($role::$variant(inner) => inner as &dyn Any),+
                }
            }
        }

        $(
            impl From<$ty> for $role {
                fn from(inner: $ty) -> Self {
                    $role::$variant(inner)
                }
            }
        )+
    };
}

role_enum!(Command {
    Test(TestCommand),
    Test2(Test2Command)
});
role_enum!(Event {
    Test(TestEvent),
    Projected(StockProjected)
});
role_enum!(Request { Test(TestRequest) });
role_enum!(Response { Test(TestResponse) });

/// The service contract under test.
pub struct TestService;

impl ServiceContract for TestService {
    type Command = Command;
    type Event = Event;
    type Request = Request;
    type Response = Response;
}

/// Every concrete type of the service, by role.
pub fn catalog() -> MessageCatalog<TestService> {
    MessageCatalog::new()
        .command::<TestCommand>()
        .command::<Test2Command>()
        .event::<TestEvent>()
        .request::<TestRequest>()
        .response::<TestResponse>()
}

/// A store plus a connector that counts connects to it.
pub fn memory_store() -> (Arc<InMemoryLogStore>, Arc<InMemoryConnector>) {
    let store = Arc::new(InMemoryLogStore::new());
    let connector = Arc::new(InMemoryConnector::new(store.clone()));
    (store, connector)
}

/// Builder for the test service on an endpoint-local connection.
pub fn config(connector: &Arc<InMemoryConnector>) -> EndpointConfigBuilder<TestService> {
    EndpointConfig::builder(SERVICE)
        .connection("memory://logbus-test")
        .connector(connector.clone())
        .catalog(catalog())
}
