//! Test doubles for driving the engine without a bus or a database.

#![allow(missing_docs)]

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    //! A scripted transport and an in-memory sink. Together they let a
    //! test run whole cycles and inspect the rows that would have been
    //! inserted.

    use std::collections::HashMap;
    use std::io;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use fieldscan_codec::Value;
    use fieldscan_config::{Connection, FunctionCode};

    use crate::error::LinkError;
    use crate::link::{Link, RawResponse, Transport};
    use crate::writer::RowSink;

    /// One scripted reply, keyed by `(function, address)`.
    #[derive(Debug, Clone)]
    pub enum Reply {
        Words(Vec<u16>),
        Bits(Vec<bool>),
        Fault(String),
    }

    /// Behavior of one fake endpoint.
    #[derive(Debug, Clone, Default)]
    pub struct FakeEndpoint {
        refuse_connect: bool,
        delay: Duration,
        replies: HashMap<(u8, u16), Reply>,
    }

    impl FakeEndpoint {
        pub fn new() -> Self {
            Self::default()
        }

        /// Every connect attempt is refused.
        pub fn refuse_connect(mut self) -> Self {
            self.refuse_connect = true;
            self
        }

        /// Every read takes this long before answering.
        pub fn delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn words(mut self, function: FunctionCode, address: u16, words: Vec<u16>) -> Self {
            self.replies.insert((function.code(), address), Reply::Words(words));
            self
        }

        pub fn bits(mut self, function: FunctionCode, address: u16, bits: Vec<bool>) -> Self {
            self.replies.insert((function.code(), address), Reply::Bits(bits));
            self
        }

        pub fn fault(mut self, function: FunctionCode, address: u16, message: &str) -> Self {
            self.replies
                .insert((function.code(), address), Reply::Fault(message.to_owned()));
            self
        }
    }

    /// Scripted [`Transport`]: endpoints keyed by `src`.
    #[derive(Debug, Default)]
    pub struct FakeTransport {
        endpoints: Mutex<HashMap<String, FakeEndpoint>>,
        connects: Arc<Mutex<HashMap<String, usize>>>,
    }

    impl FakeTransport {
        pub fn endpoint(self, src: &str, endpoint: FakeEndpoint) -> Self {
            self.endpoints
                .lock()
                .expect("poisoned")
                .insert(src.to_owned(), endpoint);
            self
        }

        /// How many times `src` has been connected so far.
        pub fn connect_count(&self, src: &str) -> usize {
            *self
                .connects
                .lock()
                .expect("poisoned")
                .get(src)
                .unwrap_or(&0)
        }

        /// Shared connect counter, for assertions after the transport has
        /// moved into the engine.
        pub fn connect_counts(&self) -> Arc<Mutex<HashMap<String, usize>>> {
            Arc::clone(&self.connects)
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        type Link = FakeLink;

        async fn connect(&self, connection: &Connection) -> Result<FakeLink, LinkError> {
            *self
                .connects
                .lock()
                .expect("poisoned")
                .entry(connection.src.clone())
                .or_default() += 1;
            let endpoint = self
                .endpoints
                .lock()
                .expect("poisoned")
                .get(&connection.src)
                .cloned()
                .unwrap_or_default();
            if endpoint.refuse_connect {
                return Err(LinkError::Connect {
                    endpoint: connection.src.clone(),
                    source: io::Error::new(io::ErrorKind::ConnectionRefused, "scripted refusal"),
                });
            }
            Ok(FakeLink { endpoint })
        }
    }

    /// Link handed out by [`FakeTransport`].
    #[derive(Debug)]
    pub struct FakeLink {
        endpoint: FakeEndpoint,
    }

    #[async_trait]
    impl Link for FakeLink {
        async fn read(
            &mut self,
            function: FunctionCode,
            address: u16,
            _count: u16,
            _slave: u8,
        ) -> Result<RawResponse, LinkError> {
            if !self.endpoint.delay.is_zero() {
                tokio::time::sleep(self.endpoint.delay).await;
            }
            match self.endpoint.replies.get(&(function.code(), address)) {
                Some(Reply::Words(words)) => Ok(RawResponse::Words(words.clone())),
                Some(Reply::Bits(bits)) => Ok(RawResponse::Bits(bits.clone())),
                Some(Reply::Fault(message)) => Err(LinkError::Protocol(message.clone())),
                None => Err(LinkError::Protocol(format!(
                    "no scripted reply for {function} @{address}"
                ))),
            }
        }

        async fn close(&mut self) {}
    }

    /// [`RowSink`] collecting rows in memory.
    #[derive(Debug, Default, Clone)]
    pub struct MemorySink {
        rows: Arc<Mutex<Vec<Vec<Value>>>>,
        fail: Arc<Mutex<bool>>,
    }

    impl MemorySink {
        pub fn new() -> Self {
            Self::default()
        }

        /// Everything inserted so far.
        pub fn rows(&self) -> Vec<Vec<Value>> {
            self.rows.lock().expect("poisoned").clone()
        }

        /// Make subsequent inserts fail (or succeed again).
        pub fn set_failing(&self, failing: bool) {
            *self.fail.lock().expect("poisoned") = failing;
        }
    }

    #[async_trait]
    impl RowSink for MemorySink {
        type Error = String;

        async fn insert(&self, row: &[Value]) -> Result<(), String> {
            if *self.fail.lock().expect("poisoned") {
                return Err("scripted sink failure".to_owned());
            }
            self.rows.lock().expect("poisoned").push(row.to_vec());
            Ok(())
        }
    }
}
